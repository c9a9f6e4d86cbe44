//! InfluxDB 1.x latest-value lookup
//!
//! One `GET /query` per wake, asking for the newest row carrying this board's
//! `id` tag. Whatever goes wrong on the way (socket, status, JSON shape) the
//! caller gets [`QueryResult::Absent`], never an error.

use crate::http::HttpClient;
use alloc::string::String;
use core::fmt::Write;
use log::{debug, info, warn};
use serde_json::Value;

/// JSON pointer to the newest row's first value column
const LATEST_VALUE_POINTER: &str = "/results/0/series/0/values/0/1";

/// Outcome of the latest-value query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryResult {
    /// Newest value, zero is `false`
    Present(bool),
    /// No row, unreadable payload or transport failure
    Absent,
}

impl QueryResult {
    /// What the indicator shows; an unknown reading shows as off
    pub fn is_on(self) -> bool {
        matches!(self, QueryResult::Present(true))
    }
}

/// Target of the latest-value query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatestValueQuery<'a> {
    pub address: &'a str,
    pub port: u16,
    pub db: &'a str,
    pub measurement: &'a str,
    pub id: &'a str,
}

impl<'a> LatestValueQuery<'a> {
    pub fn new(address: &'a str, port: u16, db: &'a str, measurement: &'a str, id: &'a str) -> Self {
        Self {
            address,
            port,
            db,
            measurement,
            id,
        }
    }

    /// InfluxQL text of the query
    ///
    /// TODO: escape `'` and `\` in the id as `\'` / `\\`; today a quote in the
    /// id ends the string literal early.
    pub fn statement(&self) -> String {
        let mut q = String::new();
        write!(
            q,
            "SELECT * FROM {} WHERE id='{}' ORDER BY time DESC LIMIT 1",
            self.measurement, self.id
        )
        .ok();
        q
    }

    /// Full request URL, spaces in the statement sent as `%20`
    pub fn url(&self) -> String {
        let mut url = String::new();
        write!(url, "http://{}:{}/query?db={}&q=", self.address, self.port, self.db).ok();
        for ch in self.statement().chars() {
            match ch {
                ' ' => url.push_str("%20"),
                c => url.push(c),
            }
        }
        url
    }

    /// Run the query; never fails, see [`QueryResult`]
    pub async fn run<H: HttpClient>(&self, http: &mut H) -> QueryResult {
        let url = self.url();
        info!("[INFLUX] GET {}", url);

        let response = match http.get(&url).await {
            Ok(response) if response.is_received() => response,
            Ok(response) => {
                warn!("[INFLUX] Bad status {}", response.status);
                return QueryResult::Absent;
            }
            Err(e) => {
                warn!("[INFLUX] Request failed: {:?}", e);
                return QueryResult::Absent;
            }
        };

        let result = parse_latest(&response.body);
        info!("[INFLUX] Status {}, latest value: {:?}", response.status, result);
        result
    }
}

/// Extract `results[0].series[0].values[0][1]` and coerce it to a flag
pub fn parse_latest(body: &[u8]) -> QueryResult {
    let document: Value = match serde_json::from_slice(body) {
        Ok(document) => document,
        Err(e) => {
            debug!("[INFLUX] Response is not JSON: {}", e);
            return QueryResult::Absent;
        }
    };

    match document.pointer(LATEST_VALUE_POINTER) {
        Some(Value::Number(n)) => {
            let nonzero = match (n.as_i64(), n.as_u64(), n.as_f64()) {
                (Some(i), _, _) => i != 0,
                (_, Some(u), _) => u != 0,
                (_, _, Some(f)) => f != 0.0,
                _ => false,
            };
            QueryResult::Present(nonzero)
        }
        Some(Value::Bool(b)) => QueryResult::Present(*b),
        Some(other) => {
            debug!("[INFLUX] Latest value is not numeric: {}", other);
            QueryResult::Absent
        }
        None => {
            debug!("[INFLUX] No row for this id");
            QueryResult::Absent
        }
    }
}
