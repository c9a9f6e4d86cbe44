//! One wake cycle, end to end
//!
//! connect → resolve → query → render → disconnect, then sleep on success or
//! restart on failure. The session guard is dropped before the terminal
//! decision is returned, so the radio is always down by the time the power
//! controller acts.

use crate::BoardError;
use crate::config::DeviceConfig;
use crate::http::HttpClient;
use crate::influx::{LatestValueQuery, QueryResult};
use crate::led_control::{Indicator, LedStrip};
use crate::resolver::ServiceDiscovery;
use crate::state_machine::{CycleEvent, CycleState, CycleStateMachine, TerminalAction};
use crate::wifi::{WiFiManager, WifiLink};
use embedded_hal_async::delay::DelayNs;
use log::{info, warn};

/// Everything the cycle drives
pub struct Board<L, D, H, S, T> {
    pub wifi: WiFiManager<L, D>,
    pub http: H,
    pub indicator: Indicator<S>,
    pub delay: T,
}

impl<L, D, H, S, T> Board<L, D, H, S, T>
where
    L: WifiLink,
    D: ServiceDiscovery,
    H: HttpClient,
    S: LedStrip,
    T: DelayNs,
{
    pub fn new(link: L, discovery: D, http: H, strip: S, delay: T) -> Self {
        Self {
            wifi: WiFiManager::new(link, discovery),
            http,
            indicator: Indicator::new(strip),
            delay,
        }
    }
}

/// How a cycle went
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub terminal: TerminalAction,
    /// Set once the query step ran
    pub reading: Option<QueryResult>,
    /// The failure that sent the cycle to restart, or a strip write error
    pub failure: Option<BoardError>,
    pub states: heapless::Vec<CycleState, { crate::state_machine::MAX_CYCLE_STATES }>,
}

/// Run one wake cycle and report the terminal action
pub async fn run_cycle<L, D, H, S, T>(config: &DeviceConfig, board: &mut Board<L, D, H, S, T>) -> CycleReport
where
    L: WifiLink,
    D: ServiceDiscovery,
    H: HttpClient,
    S: LedStrip,
    T: DelayNs,
{
    let mut sm = CycleStateMachine::new();
    let mut reading = None;
    let mut failure = None;

    sm.handle_event(CycleEvent::ConfigLoaded);

    match board.wifi.connect(config, &mut board.delay).await {
        Err(e) => {
            warn!("[STATE] WiFi failed: {}", e);
            failure = Some(BoardError::from(e));
            sm.handle_event(CycleEvent::ConnectFailed);
        }
        Ok(mut session) => {
            sm.handle_event(CycleEvent::Connected);

            match session.resolve(config, &mut board.delay).await {
                Err(e) => {
                    warn!("[STATE] Address resolution failed: {}", e);
                    failure = Some(BoardError::from(e));
                    drop(session);
                    sm.handle_event(CycleEvent::ResolveFailed);
                }
                Ok(address) => {
                    sm.handle_event(CycleEvent::Resolved);

                    let result = LatestValueQuery::new(
                        address.as_str(),
                        config.port,
                        &config.db_name,
                        &config.measurement,
                        &config.id,
                    )
                    .run(&mut board.http)
                    .await;
                    reading = Some(result);
                    sm.handle_event(CycleEvent::QueryFinished);

                    // A failed strip write is logged but does not fail the cycle
                    if let Err(e) = board.indicator.render(result.is_on()) {
                        failure = Some(e);
                    }
                    drop(session);
                    sm.handle_event(CycleEvent::Rendered);
                }
            }
        }
    }

    let terminal = sm.terminal_action().unwrap_or(TerminalAction::Restart);
    info!("[STATE] Cycle finished: {:?}", terminal);

    let mut states = heapless::Vec::new();
    for state in sm.history() {
        states.push(*state).ok();
    }

    CycleReport {
        terminal,
        reading,
        failure,
        states,
    }
}
