//! Recording stand-ins for the board hardware
//!
//! Every fake appends to one shared journal so tests can assert the order in
//! which the cycle touched the radio, mDNS, HTTP and the strip.

#![allow(dead_code)]

use std::cell::RefCell;
use std::net::Ipv4Addr;
use std::rc::Rc;

use embedded_hal_async::delay::DelayNs;
use presence_board::http::{HttpClient, HttpError, HttpResponse};
use presence_board::led_control::LedStrip;
use presence_board::resolver::ServiceDiscovery;
use presence_board::wifi::WifiLink;
use presence_board::{Board, DeviceConfig};
use rgb::RGB8;

pub type Journal = Rc<RefCell<Vec<String>>>;

pub struct FakeLink {
    pub journal: Journal,
    pub connected: bool,
}

impl WifiLink for FakeLink {
    type Error = ();

    fn begin(&mut self, ssid: &str, _psk: &str) -> Result<(), ()> {
        self.journal.borrow_mut().push(format!("wifi.begin {}", ssid));
        Ok(())
    }

    fn is_connected(&mut self) -> bool {
        self.connected
    }

    fn mac_address(&self) -> [u8; 6] {
        [0x24, 0x0a, 0xc4, 0x00, 0x00, 0x01]
    }

    fn disconnect(&mut self) {
        self.journal.borrow_mut().push("wifi.disconnect".into());
    }
}

pub struct FakeDiscovery {
    pub journal: Journal,
    pub answer: Option<Ipv4Addr>,
}

impl ServiceDiscovery for FakeDiscovery {
    type Error = ();

    async fn begin(&mut self, hostname: &str) -> Result<(), ()> {
        self.journal.borrow_mut().push(format!("mdns.begin {}", hostname));
        Ok(())
    }

    async fn query_host(&mut self, host: &str) -> Option<Ipv4Addr> {
        self.journal.borrow_mut().push(format!("mdns.query {}", host));
        self.answer
    }

    fn end(&mut self) {
        self.journal.borrow_mut().push("mdns.end".into());
    }
}

pub struct FakeHttp {
    pub journal: Journal,
    pub reply: Result<HttpResponse, HttpError>,
}

impl HttpClient for FakeHttp {
    type Error = HttpError;

    async fn get(&mut self, url: &str) -> Result<HttpResponse, HttpError> {
        self.journal.borrow_mut().push(format!("http.get {}", url));
        self.reply.clone()
    }
}

pub struct FakeStrip {
    pub journal: Journal,
    pub pixels: Option<Vec<RGB8>>,
    /// Reject every write
    pub broken: bool,
}

impl LedStrip for FakeStrip {
    type Error = ();

    fn write(&mut self, pixels: &[RGB8]) -> Result<(), ()> {
        self.journal.borrow_mut().push("led.write".into());
        if self.broken {
            return Err(());
        }
        self.pixels = Some(pixels.to_vec());
        Ok(())
    }
}

pub struct NoDelay;

impl DelayNs for NoDelay {
    async fn delay_ns(&mut self, _ns: u32) {}
}

pub type FakeBoard = Board<FakeLink, FakeDiscovery, FakeHttp, FakeStrip, NoDelay>;

/// Which parts of the hardware misbehave
#[derive(Clone, Copy, Default)]
pub struct Faults {
    pub link_never_up: bool,
    pub strip_broken: bool,
}

pub fn board(reply: Result<HttpResponse, HttpError>, mdns_answer: Option<Ipv4Addr>) -> (FakeBoard, Journal) {
    board_with(reply, mdns_answer, Faults::default())
}

pub fn board_with(
    reply: Result<HttpResponse, HttpError>,
    mdns_answer: Option<Ipv4Addr>,
    faults: Faults,
) -> (FakeBoard, Journal) {
    let journal: Journal = Rc::default();
    let board = Board::new(
        FakeLink {
            journal: journal.clone(),
            connected: !faults.link_never_up,
        },
        FakeDiscovery {
            journal: journal.clone(),
            answer: mdns_answer,
        },
        FakeHttp {
            journal: journal.clone(),
            reply,
        },
        FakeStrip {
            journal: journal.clone(),
            pixels: None,
            broken: faults.strip_broken,
        },
        NoDelay,
    );
    (board, journal)
}

/// Settings used by the scenarios
pub fn front_door() -> DeviceConfig {
    DeviceConfig::from_json(
        br#"{
            "SSID": "home-net",
            "PSK": "hunter22",
            "influx_ip_addr": "192.168.1.50",
            "influx_port": 8086,
            "db_name": "home",
            "measurement": "presence",
            "id": "front-door"
        }"#,
    )
}

pub fn influx_reply(value: &str) -> Result<HttpResponse, HttpError> {
    let body = format!(
        r#"{{"results":[{{"statement_id":0,"series":[{{"name":"presence","columns":["time","value","id"],"values":[["2024-05-01T12:00:00Z",{},"front-door"]]}}]}}]}}"#,
        value
    );
    Ok(HttpResponse {
        status: 200,
        body: body.into_bytes(),
    })
}

pub const FRONT_DOOR_URL: &str = "http://192.168.1.50:8086/query?db=home&q=SELECT%20*%20FROM%20presence%20WHERE%20id='front-door'%20ORDER%20BY%20time%20DESC%20LIMIT%201";
