//! HTTP GET with reqwless over embassy-net

use alloc::vec::Vec;
use embassy_net::Stack;
use embassy_net::dns::DnsSocket;
use embassy_net::tcp::client::{TcpClient, TcpClientState};
use embassy_time::{Duration, with_timeout};
use log::{debug, warn};
use presence_board::http::{HttpClient, HttpError, HttpResponse};
use reqwless::client::HttpClient as Reqwless;
use reqwless::request::Method;

/// Largest response kept in memory, headers included
pub const MAX_RESPONSE_SIZE: usize = 4096;

/// Give up on a silent server after this long, connect included
const RESPONSE_TIMEOUT_MS: u64 = 10_000;

pub type TcpState = TcpClientState<1, 1024, 1024>;

pub struct ReqwlessClient {
    stack: Stack<'static>,
    tcp_state: &'static TcpState,
    rx_buf: &'static mut [u8; MAX_RESPONSE_SIZE],
}

impl ReqwlessClient {
    pub fn new(
        stack: Stack<'static>,
        tcp_state: &'static TcpState,
        rx_buf: &'static mut [u8; MAX_RESPONSE_SIZE],
    ) -> Self {
        Self {
            stack,
            tcp_state,
            rx_buf,
        }
    }

    async fn fetch(&mut self, url: &str) -> Result<HttpResponse, HttpError> {
        let tcp = TcpClient::new(self.stack, self.tcp_state);
        let dns = DnsSocket::new(self.stack);
        let mut client = Reqwless::new(&tcp, &dns);

        let mut request = client.request(Method::GET, url).await.map_err(|e| {
            warn!("[HTTP] Connect failed: {:?}", e);
            HttpError::Connect
        })?;
        let response = request.send(&mut self.rx_buf[..]).await.map_err(|e| {
            warn!("[HTTP] Request failed: {:?}", e);
            HttpError::Request
        })?;

        let status = response.status.0;
        let body = response.body().read_to_end().await.map_err(|e| {
            warn!("[HTTP] Body read failed: {:?}", e);
            HttpError::Body
        })?;
        debug!("[HTTP] Status {}, {} body bytes", status, body.len());

        Ok(HttpResponse {
            status,
            body: Vec::from(&body[..]),
        })
    }
}

impl HttpClient for ReqwlessClient {
    type Error = HttpError;

    async fn get(&mut self, url: &str) -> Result<HttpResponse, HttpError> {
        match with_timeout(Duration::from_millis(RESPONSE_TIMEOUT_MS), self.fetch(url)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("[HTTP] No response within {} ms", RESPONSE_TIMEOUT_MS);
                Err(HttpError::Timeout(RESPONSE_TIMEOUT_MS))
            }
        }
    }
}
