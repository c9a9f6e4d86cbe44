#![cfg_attr(not(test), no_std)]

//! ESP32-C3 Presence Indicator Board Library
//!
//! This library implements the poll-and-indicate cycle of a battery powered
//! presence light: join WiFi, locate the InfluxDB host, read the latest value
//! for the board's id, show it on an 8 pixel WS2812 strip, then sleep or restart.
//!
//! Everything here is written against small hardware traits so the whole cycle
//! runs on the host under test; the `firmware` package binds them to esp-hal.

extern crate alloc;

pub mod config;
pub mod http;
pub mod influx;
pub mod led_control;
pub mod lifecycle;
pub mod mdns;
pub mod resolver;
pub mod state_machine;
pub mod wifi;

pub use config::DeviceConfig;
pub use influx::QueryResult;
pub use lifecycle::{Board, CycleReport, run_cycle};
pub use state_machine::{CycleState, TerminalAction};

/// Project version information
pub const VERSION: &str = "0.1.0";

/// Error types for the presence board
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    /// WiFi session could not be established
    #[error("wifi: {0}")]
    WiFi(#[from] wifi::ConnectError),
    /// No usable InfluxDB address
    #[error("address resolution: {0}")]
    Resolution(#[from] resolver::ResolutionError),
    /// HTTP exchange failed
    #[error("http: {0}")]
    Http(#[from] http::HttpError),
    /// LED strip write failed
    #[error("led strip write failed")]
    LedError,
}
