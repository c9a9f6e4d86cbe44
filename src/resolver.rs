//! InfluxDB address resolution
//!
//! The server is found either by an mDNS host query or by a literal address
//! from the settings. The mDNS name wins when both are set.

use crate::config::{DeviceConfig, InfluxTarget, PollPolicy};
use alloc::string::{String, ToString};
use core::fmt::{self, Write};
use core::net::Ipv4Addr;
use embedded_hal_async::delay::DelayNs;
use log::{debug, info, warn};

/// mDNS responder/querier owned by the network session
#[allow(async_fn_in_trait)]
pub trait ServiceDiscovery {
    type Error: fmt::Debug;

    /// Start the subsystem, announcing `hostname` as this device's identity
    async fn begin(&mut self, hostname: &str) -> Result<(), Self::Error>;

    /// Look up the A record of `host` (without the `.local` suffix)
    ///
    /// Queries for this device's identity that arrive meanwhile are answered.
    async fn query_host(&mut self, host: &str) -> Option<Ipv4Addr>;

    /// Stop the subsystem. Must be safe to call when never started.
    fn end(&mut self);
}

/// Address resolution failures, all of which restart the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    #[error("neither influx_mdns_addr nor influx_ip_addr is set")]
    NoTargetConfigured,
    #[error("InfluxDB host did not resolve to a usable address")]
    UnresolvedAddress,
    #[error("mDNS did not start after {attempts} attempts")]
    DiscoveryTimeout { attempts: u32 },
}

/// A usable InfluxDB address, valid for the current cycle only
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAddress(String);

impl ResolvedAddress {
    /// Rejects the empty string and the unspecified address
    pub fn new(addr: &str) -> Option<Self> {
        if addr.is_empty() || addr == "0.0.0.0" {
            None
        } else {
            Some(Self(addr.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResolvedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Format a MAC address the way the board announces itself over mDNS
pub fn mac_identity(mac: &[u8; 6]) -> heapless::String<17> {
    let mut identity = heapless::String::new();
    for (i, byte) in mac.iter().enumerate() {
        if i > 0 {
            identity.push(':').ok();
        }
        write!(identity, "{:02X}", byte).ok();
    }
    identity
}

/// Strip a trailing `.local` so the querier can append its own suffix
pub fn mdns_host(name: &str) -> &str {
    let name = name.strip_suffix('.').unwrap_or(name);
    match name.len().checked_sub(".local".len()) {
        Some(cut) if name.is_char_boundary(cut) && name[cut..].eq_ignore_ascii_case(".local") => {
            &name[..cut]
        }
        _ => name,
    }
}

/// Resolve the InfluxDB address for this cycle
pub async fn resolve<D, T>(
    discovery: &mut D,
    mac: [u8; 6],
    config: &DeviceConfig,
    delay: &mut T,
    policy: &PollPolicy,
) -> Result<ResolvedAddress, ResolutionError>
where
    D: ServiceDiscovery,
    T: DelayNs,
{
    match config.influx_target() {
        Some(InfluxTarget::Mdns(name)) => {
            start_discovery(discovery, &mac_identity(&mac), delay, policy).await?;

            let host = mdns_host(name);
            info!("[MDNS] Querying {}.local", host);
            let ip = discovery.query_host(host).await.unwrap_or(Ipv4Addr::UNSPECIFIED);
            if ip.is_unspecified() {
                warn!("[MDNS] {}.local did not resolve", host);
                return Err(ResolutionError::UnresolvedAddress);
            }

            let mut addr = heapless::String::<15>::new();
            write!(addr, "{}", ip).ok();
            info!("[MDNS] {}.local is at {}", host, addr);
            ResolvedAddress::new(&addr).ok_or(ResolutionError::UnresolvedAddress)
        }
        Some(InfluxTarget::Literal(addr)) => {
            debug!("[MDNS] Using configured address {}", addr);
            ResolvedAddress::new(addr).ok_or(ResolutionError::UnresolvedAddress)
        }
        None => {
            warn!("[MDNS] No InfluxDB address configured");
            Err(ResolutionError::NoTargetConfigured)
        }
    }
}

async fn start_discovery<D, T>(
    discovery: &mut D,
    identity: &str,
    delay: &mut T,
    policy: &PollPolicy,
) -> Result<(), ResolutionError>
where
    D: ServiceDiscovery,
    T: DelayNs,
{
    let mut attempts = 0;
    loop {
        attempts += 1;
        match discovery.begin(identity).await {
            Ok(()) => {
                debug!("[MDNS] Started as {} (attempt {})", identity, attempts);
                return Ok(());
            }
            Err(e) if attempts >= policy.max_attempts => {
                warn!("[MDNS] Failed to start after {} attempts: {:?}", attempts, e);
                return Err(ResolutionError::DiscoveryTimeout { attempts });
            }
            Err(_) => delay.delay_ms(policy.interval_ms).await,
        }
    }
}
