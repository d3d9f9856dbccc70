//! Remote dispatch.
//!
//! A [`RemoteAccelerator`] turns a [`RemoteBackend`]'s three extension
//! points into a full [`Accelerator`]:
//!
//! ```text
//!   process_input() ──→ POST url+path ──→ [follow_up() ──→ GET] ──→ process_response()
//! ```
//!
//! Every HTTP call goes through one error boundary that applies the
//! configured timeout, logs each failed attempt, and retries transient
//! failures according to the [`RetryPolicy`]. The default policy makes a
//! single attempt. The timeout is the only bound on a call; the transport
//! itself only limits connection setup.

use std::fmt;
use std::slice;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use qpipe_ir::Function;
use qpipe_registry::parse_option;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use crate::accelerator::{Accelerator, AcceleratorType, attach_children};
use crate::buffer::AcceleratorBuffer;
use crate::config::AcceleratorConfig;
use crate::error::{HalError, HalResult};
use crate::transport::{Headers, HttpRestClient, RestClient, join_url};

/// Default timeout for one remote call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const SUBMITTED_AT: &str = "submitted-at";

/// Backend-specific half of a remote accelerator.
pub trait RemoteBackend: Send + Sync {
    /// Registry name.
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str {
        ""
    }

    /// Base URL of the service.
    fn url(&self) -> String;

    /// Path that jobs are POSTed to.
    fn post_path(&self) -> String;

    /// Headers sent with every request.
    fn headers(&self) -> Headers {
        Headers::new()
    }

    /// Apply configuration.
    fn initialize(&self, config: &AcceleratorConfig) -> HalResult<()> {
        let _ = config;
        Ok(())
    }

    /// Execution model.
    fn accelerator_type(&self) -> AcceleratorType {
        AcceleratorType::GateModel
    }

    /// Register size of [`Accelerator::create_buffer`].
    fn default_buffer_size(&self) -> usize;

    /// True if `size` qubits fit the device.
    fn is_valid_buffer_size(&self, size: usize) -> bool {
        size > 0 && size <= self.default_buffer_size()
    }

    /// Device coupling map.
    fn connectivity(&self) -> Vec<(usize, usize)> {
        Vec::new()
    }

    /// Marshal kernels and buffer metadata into a request body.
    fn process_input(&self, buffer: &AcceleratorBuffer, functions: &[Function]) -> HalResult<String>;

    /// Given the POST response, the path to GET for results, if the service
    /// answers asynchronously.
    fn follow_up(&self, submission: &str) -> HalResult<Option<String>> {
        let _ = submission;
        Ok(None)
    }

    /// Unmarshal one result buffer per submitted kernel, in submission
    /// order.
    fn process_response(
        &self,
        buffer: &AcceleratorBuffer,
        response: &str,
    ) -> HalResult<Vec<AcceleratorBuffer>>;
}

/// Bounded retry with fixed backoff for transient transport failures.
///
/// A POST that timed out is never retried: the service may already have
/// accepted the job, and resubmitting would run it twice. POSTs are retried
/// only on [`HalError::Transport`]; GETs are retried on any transient error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Single attempt.
    pub fn fail_fast() -> Self {
        Self::default()
    }

    /// Up to `max_attempts` attempts spaced by `backoff`.
    pub fn bounded(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RemoteSettings {
    timeout: Duration,
    retry: RetryPolicy,
}

#[derive(Clone, Copy)]
enum Call<'a> {
    Post { path: &'a str, body: &'a str },
    Get { path: &'a str },
}

impl Call<'_> {
    fn may_retry(&self, error: &HalError) -> bool {
        match self {
            Call::Post { .. } => matches!(error, HalError::Transport(_)),
            Call::Get { .. } => error.is_transient(),
        }
    }
}

/// An [`Accelerator`] that executes through a REST service.
pub struct RemoteAccelerator<B: RemoteBackend> {
    backend: B,
    client: Arc<dyn RestClient>,
    settings: RwLock<RemoteSettings>,
}

impl<B: RemoteBackend> RemoteAccelerator<B> {
    /// Remote accelerator over an explicit transport.
    pub fn new(backend: B, client: Arc<dyn RestClient>) -> Self {
        Self {
            backend,
            client,
            settings: RwLock::new(RemoteSettings {
                timeout: DEFAULT_TIMEOUT,
                retry: RetryPolicy::default(),
            }),
        }
    }

    /// Remote accelerator over [`HttpRestClient`].
    pub fn with_http(backend: B) -> HalResult<Self> {
        let client = HttpRestClient::new()?;
        Ok(Self::new(backend, Arc::new(client)))
    }

    /// Set the timeout applied to every call.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.write_settings(|s| s.timeout = timeout);
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub fn with_retry(self, retry: RetryPolicy) -> Self {
        self.write_settings(|s| s.retry = retry);
        self
    }

    /// The backend half.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Current call timeout.
    pub fn timeout(&self) -> Duration {
        self.settings().timeout
    }

    /// Current retry policy.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.settings().retry
    }

    fn settings(&self) -> RemoteSettings {
        *self.settings.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_settings(&self, update: impl FnOnce(&mut RemoteSettings)) {
        update(&mut self.settings.write().unwrap_or_else(PoisonError::into_inner));
    }

    async fn call(&self, url: &str, call: Call<'_>, headers: &Headers) -> HalResult<String> {
        let settings = self.settings();
        let target = match call {
            Call::Post { path, .. } | Call::Get { path } => join_url(url, path),
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            let request = match call {
                Call::Post { path, body } => self.client.post(url, path, body, headers),
                Call::Get { path } => self.client.get(url, path, headers),
            };
            let outcome = match tokio::time::timeout(settings.timeout, request).await {
                Ok(result) => result,
                Err(_) => Err(HalError::RemoteTimeout {
                    target: target.clone(),
                    seconds: settings.timeout.as_secs(),
                }),
            };

            match outcome {
                Ok(text) => return Ok(text),
                Err(e) => {
                    warn!(target = %target, attempt, "Remote call failed: {e}");
                    if call.may_retry(&e) && attempt < settings.retry.max_attempts {
                        tokio::time::sleep(settings.retry.backoff).await;
                        continue;
                    }
                    error!(target = %target, attempts = attempt, "Giving up on remote call: {e}");
                    return Err(e);
                }
            }
        }
    }

    async fn submit(
        &self,
        buffer: &AcceleratorBuffer,
        functions: &[Function],
    ) -> HalResult<Vec<AcceleratorBuffer>> {
        let body = self.backend.process_input(buffer, functions)?;
        let url = self.backend.url();
        let post_path = self.backend.post_path();
        let headers = self.backend.headers();

        let mut response = self
            .call(
                &url,
                Call::Post {
                    path: &post_path,
                    body: &body,
                },
                &headers,
            )
            .await?;
        if let Some(path) = self.backend.follow_up(&response)? {
            response = self.call(&url, Call::Get { path: &path }, &headers).await?;
        }

        let results = self.backend.process_response(buffer, &response)?;
        if results.len() != functions.len() {
            return Err(HalError::ResponseMismatch {
                expected: functions.len(),
                got: results.len(),
            });
        }
        info!(
            backend = self.backend.name(),
            kernels = functions.len(),
            "Remote execution complete"
        );
        Ok(results)
    }
}

impl<B: RemoteBackend> fmt::Debug for RemoteAccelerator<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteAccelerator")
            .field("backend", &self.backend.name())
            .field("settings", &self.settings())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<B: RemoteBackend> Accelerator for RemoteAccelerator<B> {
    fn name(&self) -> &str {
        self.backend.name()
    }

    fn description(&self) -> &str {
        self.backend.description()
    }

    fn initialize(&self, config: &AcceleratorConfig) -> HalResult<()> {
        self.backend.initialize(config)?;
        let options = config.options();
        let timeout = parse_option::<u64>(&options, "timeout-seconds")?;
        let attempts = parse_option::<u32>(&options, "max-attempts")?;
        let backoff = parse_option::<u64>(&options, "backoff-millis")?;
        self.write_settings(|s| {
            if let Some(secs) = timeout {
                s.timeout = Duration::from_secs(secs);
            }
            if let Some(n) = attempts {
                s.retry.max_attempts = n.max(1);
            }
            if let Some(ms) = backoff {
                s.retry.backoff = Duration::from_millis(ms);
            }
        });
        Ok(())
    }

    fn accelerator_type(&self) -> AcceleratorType {
        self.backend.accelerator_type()
    }

    fn default_buffer_size(&self) -> usize {
        self.backend.default_buffer_size()
    }

    fn is_valid_buffer_size(&self, size: usize) -> bool {
        self.backend.is_valid_buffer_size(size)
    }

    fn connectivity(&self) -> Vec<(usize, usize)> {
        self.backend.connectivity()
    }

    fn is_remote(&self) -> bool {
        true
    }

    #[instrument(skip_all, fields(backend = self.backend.name(), kernel = function.name()))]
    async fn execute(&self, buffer: &mut AcceleratorBuffer, function: &Function) -> HalResult<()> {
        let results = self.submit(buffer, slice::from_ref(function)).await?;
        if let Some(result) = results.first() {
            buffer.absorb(result);
        }
        buffer.add_extra_info(SUBMITTED_AT, chrono::Utc::now().to_rfc3339());
        Ok(())
    }

    #[instrument(skip_all, fields(backend = self.backend.name(), kernels = functions.len()))]
    async fn execute_batch(
        &self,
        buffer: &mut AcceleratorBuffer,
        functions: &[Function],
    ) -> HalResult<Vec<AcceleratorBuffer>> {
        let results = self.submit(buffer, functions).await?;
        attach_children(buffer, &results);
        buffer.add_extra_info(SUBMITTED_AT, chrono::Utc::now().to_rfc3339());
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy() {
        assert_eq!(RetryPolicy::default().max_attempts, 1);
        assert_eq!(RetryPolicy::fail_fast(), RetryPolicy::default());
        assert_eq!(RetryPolicy::bounded(0, Duration::ZERO).max_attempts, 1);
    }

    #[test]
    fn test_post_retries_only_transport_errors() {
        let timeout = HalError::RemoteTimeout {
            target: "http://h/jobs".into(),
            seconds: 1,
        };
        let reset = HalError::Transport("connection reset".into());
        let post = Call::Post { path: "/jobs", body: "" };
        let get = Call::Get { path: "/jobs/1" };

        assert!(!post.may_retry(&timeout));
        assert!(post.may_retry(&reset));
        assert!(get.may_retry(&timeout));
        assert!(get.may_retry(&reset));
        assert!(!get.may_retry(&HalError::Execution("bad".into())));
    }
}
