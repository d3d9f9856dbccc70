//! REST transport used by remote accelerators.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, header};
use tracing::debug;

use crate::error::{HalError, HalResult};

/// String-keyed, string-valued request headers.
pub type Headers = BTreeMap<String, String>;

/// User-Agent sent with requests.
const USER_AGENT: &str = concat!("qpipe/", env!("CARGO_PKG_VERSION"));

/// Bound on establishing a connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Minimal HTTP capability consumed by
/// [`RemoteAccelerator`](crate::RemoteAccelerator).
#[async_trait]
pub trait RestClient: Send + Sync {
    /// POST `body` to `url` + `path`, returning the response text.
    async fn post(&self, url: &str, path: &str, body: &str, headers: &Headers) -> HalResult<String>;

    /// GET `url` + `path`, returning the response text.
    async fn get(&self, url: &str, path: &str, headers: &Headers) -> HalResult<String>;
}

/// Join a base URL and a path with exactly one slash between them.
pub fn join_url(url: &str, path: &str) -> String {
    match (url.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{url}{}", &path[1..]),
        (false, false) if !path.is_empty() => format!("{url}/{path}"),
        _ => format!("{url}{path}"),
    }
}

/// [`RestClient`] over `reqwest`.
///
/// Only connection setup is bounded here. The overall call timeout belongs
/// to the caller, so [`RemoteAccelerator`](crate::RemoteAccelerator)
/// settings are never capped by the client.
#[derive(Debug, Clone)]
pub struct HttpRestClient {
    client: Client,
}

impl HttpRestClient {
    /// Build the client.
    pub fn new() -> HalResult<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| HalError::Configuration(format!("HTTP client: {e}")))?;
        Ok(Self { client })
    }

    async fn send(&self, target: &str, request: RequestBuilder, headers: &Headers) -> HalResult<String> {
        let request = headers
            .iter()
            .fold(request, |req, (k, v)| req.header(k.as_str(), v.as_str()))
            .header(header::ACCEPT, "application/json");

        let response = request.send().await.map_err(|e| map_error(target, &e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| map_error(target, &e))?;
        debug!(target, %status, bytes = text.len(), "Response received");

        if !status.is_success() {
            return Err(HalError::Transport(format!("{target} returned {status}: {text}")));
        }
        Ok(text)
    }
}

fn map_error(target: &str, e: &reqwest::Error) -> HalError {
    if e.is_connect() && e.is_timeout() {
        HalError::Transport(format!(
            "{target}: no connection within {}s",
            CONNECT_TIMEOUT.as_secs()
        ))
    } else {
        HalError::Transport(format!("{target}: {e}"))
    }
}

#[async_trait]
impl RestClient for HttpRestClient {
    async fn post(&self, url: &str, path: &str, body: &str, headers: &Headers) -> HalResult<String> {
        let target = join_url(url, path);
        let request = self
            .client
            .post(&target)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.to_string());
        self.send(&target, request, headers).await
    }

    async fn get(&self, url: &str, path: &str, headers: &Headers) -> HalResult<String> {
        let target = join_url(url, path);
        let request = self.client.get(&target);
        self.send(&target, request, headers).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("http://h", "/jobs"), "http://h/jobs");
        assert_eq!(join_url("http://h/", "/jobs"), "http://h/jobs");
        assert_eq!(join_url("http://h/", "jobs"), "http://h/jobs");
        assert_eq!(join_url("http://h", "jobs"), "http://h/jobs");
        assert_eq!(join_url("http://h", ""), "http://h");
    }

    #[test]
    fn test_client_builds() {
        assert!(HttpRestClient::new().is_ok());
    }
}
