use crate::model::Response;
use crate::Result;
use std::time::Duration;

#[cfg(test)]
mod tests;

pub mod reqwest;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub ssl_check: bool,
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(ssl_check: bool) -> Self {
        ClientConfig {
            ssl_check,
            ..Default::default()
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            ssl_check: true,
            timeout: None,
        }
    }
}

/// A request ready to go on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub follow_redirects: bool,
    pub use_cookie_jar: bool,
}

#[derive(Debug, Clone)]
pub struct Exchange {
    pub response: Response,
    /// Time until the response head arrived.
    pub latency: Duration,
}

pub trait HttpClient {
    fn create(config: ClientConfig) -> Result<Self>
    where
        Self: Sized;

    fn execute(&self, request: &OutgoingRequest) -> Result<Exchange>;
}
