//! WiFi module for the presence board
//!
//! Brings the station link up for one cycle and hands out a [`NetworkSession`]
//! guard. Dropping the guard stops mDNS and disconnects, so every exit path of
//! the cycle tears the radio down.

use crate::config::{DeviceConfig, PollPolicy};
use crate::resolver::{self, ResolutionError, ResolvedAddress, ServiceDiscovery};
use core::fmt;
use embedded_hal_async::delay::DelayNs;
use log::{debug, info, warn};

/// Station mode radio link
pub trait WifiLink {
    type Error: fmt::Debug;

    /// Configure station mode with the given credentials and start associating
    fn begin(&mut self, ssid: &str, psk: &str) -> Result<(), Self::Error>;

    /// True once associated and holding an IPv4 lease
    fn is_connected(&mut self) -> bool;

    /// Station MAC address
    fn mac_address(&self) -> [u8; 6];

    /// Drop the association and stop the station
    fn disconnect(&mut self);
}

/// WiFi bring-up failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConnectError {
    #[error("SSID or PSK not configured")]
    MissingCredentials,
    #[error("radio rejected the station configuration")]
    Link,
    #[error("link not up after {polls} polls")]
    Timeout { polls: u32 },
}

/// WiFi manager owning the radio link and the mDNS subsystem
pub struct WiFiManager<L, D> {
    link: L,
    discovery: D,
    connect_policy: PollPolicy,
    discovery_policy: PollPolicy,
}

impl<L, D> WiFiManager<L, D>
where
    L: WifiLink,
    D: ServiceDiscovery,
{
    /// Create a new WiFi manager with the default wait budgets
    pub fn new(link: L, discovery: D) -> Self {
        Self::with_policies(link, discovery, PollPolicy::WIFI_CONNECT, PollPolicy::MDNS_START)
    }

    pub fn with_policies(
        link: L,
        discovery: D,
        connect_policy: PollPolicy,
        discovery_policy: PollPolicy,
    ) -> Self {
        Self {
            link,
            discovery,
            connect_policy,
            discovery_policy,
        }
    }

    /// Connect to the configured network
    ///
    /// Fails without touching the radio when either credential is empty.
    pub async fn connect<T: DelayNs>(
        &mut self,
        config: &DeviceConfig,
        delay: &mut T,
    ) -> Result<NetworkSession<'_, L, D>, ConnectError> {
        if !config.has_credentials() {
            warn!("[WIFI] SSID or PSK missing, not connecting");
            return Err(ConnectError::MissingCredentials);
        }

        info!("[WIFI] Connecting to WiFi network: {}", config.ssid);
        if let Err(e) = self.link.begin(&config.ssid, &config.psk) {
            warn!("[WIFI] Failed to start station mode: {:?}", e);
            self.link.disconnect();
            return Err(ConnectError::Link);
        }

        let mut polls = 0;
        while !self.link.is_connected() {
            if polls >= self.connect_policy.max_attempts {
                warn!("[WIFI] Failed to connect to WiFi network after {} polls", polls);
                self.link.disconnect();
                return Err(ConnectError::Timeout { polls });
            }
            delay.delay_ms(self.connect_policy.interval_ms).await;
            polls += 1;
        }

        info!("[WIFI] Successfully connected to WiFi network");
        debug!("[WIFI] Link came up after {} polls", polls);
        Ok(NetworkSession { manager: self })
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn discovery(&self) -> &D {
        &self.discovery
    }

    pub fn into_parts(self) -> (L, D) {
        (self.link, self.discovery)
    }
}

/// An established link, torn down on drop
pub struct NetworkSession<'a, L, D>
where
    L: WifiLink,
    D: ServiceDiscovery,
{
    manager: &'a mut WiFiManager<L, D>,
}

impl<L, D> NetworkSession<'_, L, D>
where
    L: WifiLink,
    D: ServiceDiscovery,
{
    /// Resolve the InfluxDB address over this link
    pub async fn resolve<T: DelayNs>(
        &mut self,
        config: &DeviceConfig,
        delay: &mut T,
    ) -> Result<ResolvedAddress, ResolutionError> {
        let manager = &mut *self.manager;
        let mac = manager.link.mac_address();
        resolver::resolve(
            &mut manager.discovery,
            mac,
            config,
            delay,
            &manager.discovery_policy,
        )
        .await
    }

    /// Explicit teardown, same as dropping the session
    pub fn disconnect(self) {}
}

impl<L, D> Drop for NetworkSession<'_, L, D>
where
    L: WifiLink,
    D: ServiceDiscovery,
{
    fn drop(&mut self) {
        info!("[WIFI] Disconnecting");
        self.manager.discovery.end();
        self.manager.link.disconnect();
    }
}
