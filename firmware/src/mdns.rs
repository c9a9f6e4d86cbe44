//! mDNS over an embassy-net UDP socket
//!
//! Joins 224.0.0.251 on port 5353, announces the board under its MAC identity
//! and multicasts the A queries built by `presence_board::mdns`. While a query
//! waits for its answer, queries for the board's own name get a reply.

use core::net::Ipv4Addr;
use embassy_net::udp::UdpSocket;
use embassy_net::{IpAddress, IpEndpoint, Stack};
use embassy_time::{Duration, Instant, with_timeout};
use log::{debug, info, warn};
use presence_board::mdns::{
    MAX_MDNS_PACKET_SIZE, MDNS_MULTICAST_ADDR, MDNS_PORT, answer_query, encode_announcement,
    encode_query, host_record, parse_a_record,
};
use presence_board::resolver::ServiceDiscovery;

/// How long one host query waits for answers
const QUERY_TIMEOUT: Duration = Duration::from_millis(2000);

#[derive(Debug)]
pub enum DiscoveryError {
    /// Port 5353 could not be bound
    Bind,
    /// The interface refused the multicast group
    Multicast,
    /// Identity longer than a MAC string
    Identity,
}

pub struct UdpDiscovery {
    stack: Stack<'static>,
    socket: UdpSocket<'static>,
    bound: bool,
    joined: bool,
    identity: Option<heapless::String<17>>,
}

fn group() -> IpEndpoint {
    IpEndpoint::new(IpAddress::Ipv4(MDNS_MULTICAST_ADDR), MDNS_PORT)
}

impl UdpDiscovery {
    pub fn new(stack: Stack<'static>, socket: UdpSocket<'static>) -> Self {
        Self {
            stack,
            socket,
            bound: false,
            joined: false,
            identity: None,
        }
    }

    fn own_address(&self) -> Option<Ipv4Addr> {
        self.stack.config_v4().map(|config| config.address.address())
    }

    async fn send(&mut self, packet: &[u8], to: IpEndpoint) {
        if let Err(e) = self.socket.send_to(packet, to).await {
            warn!("[MDNS] Failed to send to {}: {:?}", to, e);
        }
    }

    /// Reply to `packet` if it asks for this board, on the group and to the sender
    async fn answer(&mut self, packet: &[u8], from: IpEndpoint) {
        let Some(ip) = self.own_address() else {
            return;
        };
        let reply = match self.identity.as_deref() {
            Some(identity) => answer_query(packet, &host_record(identity, ip)),
            None => None,
        };
        if let Some(reply) = reply {
            debug!("[MDNS] Answering {} for our name", from);
            self.send(&reply, group()).await;
            self.send(&reply, from).await;
        }
    }
}

impl ServiceDiscovery for UdpDiscovery {
    type Error = DiscoveryError;

    async fn begin(&mut self, hostname: &str) -> Result<(), DiscoveryError> {
        if !self.bound {
            self.socket.bind(MDNS_PORT).map_err(|e| {
                warn!("[MDNS] Failed to bind port {}: {:?}", MDNS_PORT, e);
                DiscoveryError::Bind
            })?;
            self.bound = true;
        }
        if !self.joined {
            self.stack
                .join_multicast_group(IpAddress::Ipv4(MDNS_MULTICAST_ADDR))
                .map_err(|e| {
                    warn!("[MDNS] Failed to join {}: {:?}", MDNS_MULTICAST_ADDR, e);
                    DiscoveryError::Multicast
                })?;
            self.joined = true;
        }

        let mut identity = heapless::String::new();
        identity
            .push_str(hostname)
            .map_err(|_| DiscoveryError::Identity)?;

        if let Some(ip) = self.own_address() {
            match encode_announcement(&host_record(&identity, ip)) {
                Ok(announcement) => self.send(&announcement, group()).await,
                Err(e) => warn!("[MDNS] Cannot announce {}: {}", identity, e),
            }
        }

        info!("[MDNS] Started as {}.local", identity);
        self.identity = Some(identity);
        Ok(())
    }

    async fn query_host(&mut self, host: &str) -> Option<Ipv4Addr> {
        let query = match encode_query(0, host) {
            Ok(query) => query,
            Err(e) => {
                warn!("[MDNS] Cannot query {}: {}", host, e);
                return None;
            }
        };
        if let Err(e) = self.socket.send_to(&query, group()).await {
            warn!("[MDNS] Failed to send query: {:?}", e);
            return None;
        }

        let deadline = Instant::now() + QUERY_TIMEOUT;
        let mut buffer = [0u8; MAX_MDNS_PACKET_SIZE];
        while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
            let (len, meta) = match with_timeout(remaining, self.socket.recv_from(&mut buffer)).await {
                Ok(Ok(received)) => received,
                Ok(Err(e)) => {
                    debug!("[MDNS] Receive error: {:?}", e);
                    continue;
                }
                Err(_) => break,
            };
            debug!("[MDNS] Received {} bytes from {}", len, meta.endpoint);

            let packet = &buffer[..len];
            if let Some(ip) = parse_a_record(packet, host) {
                return Some(ip);
            }
            self.answer(packet, meta.endpoint).await;
        }

        debug!("[MDNS] No answer for {}.local", host);
        None
    }

    fn end(&mut self) {
        if self.joined {
            if let Err(e) = self
                .stack
                .leave_multicast_group(IpAddress::Ipv4(MDNS_MULTICAST_ADDR))
            {
                debug!("[MDNS] Leave group: {:?}", e);
            }
            self.joined = false;
        }
        if self.bound {
            self.socket.close();
            self.bound = false;
        }
        if self.identity.take().is_some() {
            debug!("[MDNS] Stopped");
        }
    }
}
