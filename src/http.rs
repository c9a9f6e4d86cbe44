//! HTTP transport seam
//!
//! The board issues one GET per wake. The wire side lives behind [`HttpClient`]
//! so the firmware can plug in reqwless over embassy-net and tests can hand
//! back canned responses.

use alloc::vec::Vec;
use core::fmt;

/// Async HTTP GET transport
#[allow(async_fn_in_trait)]
pub trait HttpClient {
    type Error: fmt::Debug;

    /// Fetch `url`, returning the status and the whole body
    async fn get(&mut self, url: &str) -> Result<HttpResponse, Self::Error>;
}

/// A complete response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Any status line the server sent; transport failures never get here
    pub fn is_received(&self) -> bool {
        self.status > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HttpError {
    #[error("connection failed")]
    Connect,
    #[error("request failed")]
    Request,
    #[error("reading the body failed")]
    Body,
    #[error("no complete response within {0} ms")]
    Timeout(u64),
}
