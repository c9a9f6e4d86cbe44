//! WiFi module for ESP32-C3 board
//!
//! Station link on esp-wifi 0.14.1 with embassy-net doing DHCP. The link only
//! counts as connected once DHCP has handed out an address.

use embassy_net::Stack;
use esp_wifi::wifi::{ClientConfiguration, Configuration, WifiController, WifiError};
use log::{debug, info, warn};
use presence_board::wifi::WifiLink;

#[derive(Debug)]
pub enum LinkError {
    /// SSID or PSK does not fit the driver's configuration
    Credentials,
    Radio(WifiError),
}

/// esp-wifi station plus the network stack that rides on it
pub struct EspWifiLink {
    controller: WifiController<'static>,
    stack: Stack<'static>,
    mac: [u8; 6],
    started: bool,
}

impl EspWifiLink {
    pub fn new(controller: WifiController<'static>, stack: Stack<'static>, mac: [u8; 6]) -> Self {
        Self {
            controller,
            stack,
            mac,
            started: false,
        }
    }
}

impl WifiLink for EspWifiLink {
    type Error = LinkError;

    fn begin(&mut self, ssid: &str, psk: &str) -> Result<(), LinkError> {
        let client_config = ClientConfiguration {
            ssid: ssid.try_into().map_err(|_| LinkError::Credentials)?,
            password: psk.try_into().map_err(|_| LinkError::Credentials)?,
            ..Default::default()
        };

        self.controller
            .set_configuration(&Configuration::Client(client_config))
            .map_err(LinkError::Radio)?;
        self.controller.start().map_err(LinkError::Radio)?;
        self.started = true;
        self.controller.connect().map_err(LinkError::Radio)?;

        debug!("[WIFI] Station started, waiting for association and DHCP");
        Ok(())
    }

    fn is_connected(&mut self) -> bool {
        let associated = self.controller.is_connected().unwrap_or(false);
        if !associated || !self.stack.is_config_up() {
            return false;
        }
        if let Some(config) = self.stack.config_v4() {
            info!("[WIFI] DHCP assigned IP address: {}", config.address.address());
        }
        true
    }

    fn mac_address(&self) -> [u8; 6] {
        self.mac
    }

    fn disconnect(&mut self) {
        if !self.started {
            return;
        }
        if let Err(e) = self.controller.disconnect() {
            debug!("[WIFI] Disconnect: {:?}", e);
        }
        if let Err(e) = self.controller.stop() {
            warn!("[WIFI] Failed to stop station: {:?}", e);
        }
        self.started = false;
    }
}
