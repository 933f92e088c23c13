//! Retry with exponential backoff for transient provider failures
//!
//! [`ResilientInvoker`] wraps a single remote operation. Failures whose kind is
//! retryable under the active [`RetryPolicy`] are repeated after a backoff
//! delay; anything else, or the last failure once attempts run out, is
//! translated into a [`DomainError`] for the call site.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::error;

use super::CallSite;
use crate::error::mapping::translate;
use crate::error::{DomainError, FailureKind, ProviderError, Result};
use crate::observability::{NoopAnnotator, TraceAnnotator};

/// Jitter spread as a fraction of the computed delay
const JITTER_FACTOR: f64 = 0.1;

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,

    /// Delay before the second attempt
    pub base_delay: Duration,

    /// Upper bound for any single delay
    pub max_delay: Duration,

    /// Growth factor between consecutive delays
    pub multiplier: f64,

    /// Perturb each delay by up to ±10%
    pub jitter: bool,

    /// Failure kinds worth repeating
    pub retryable_kinds: HashSet<FailureKind>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: false,
            retryable_kinds: [
                FailureKind::Connection,
                FailureKind::Timeout,
                FailureKind::Throttling,
                FailureKind::ServiceFault,
                FailureKind::Client,
            ]
            .into_iter()
            .collect(),
        }
    }
}

impl fmt::Display for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RetryPolicy {{ max_attempts: {}, base_delay: {:?}, max_delay: {:?}, multiplier: {}, jitter: {} }}",
            self.max_attempts, self.base_delay, self.max_delay, self.multiplier, self.jitter
        )
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_delays(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_retryable_kinds(mut self, kinds: impl IntoIterator<Item = FailureKind>) -> Self {
        self.retryable_kinds = kinds.into_iter().collect();
        self
    }

    /// Whether a failure of this kind may be repeated
    ///
    /// Not-found failures never are, whatever the configured set says.
    pub fn is_retryable(&self, kind: FailureKind) -> bool {
        kind != FailureKind::NotFound && self.retryable_kinds.contains(&kind)
    }

    /// Un-jittered delay after the given failed attempt (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let base = self.base_delay.as_nanos() as f64;
        let max = self.max_delay.as_nanos() as f64;

        let delay = (base * self.multiplier.powi(exponent)).min(max);
        Duration::from_nanos(delay.max(0.0) as u64)
    }

    /// Attempts actually made; a zero setting still makes one
    fn attempt_limit(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay before the next attempt, or `None` when the failure is terminal
    fn next_delay(&self, kind: FailureKind, attempt: u32) -> Option<Duration> {
        if attempt >= self.attempt_limit() || !self.is_retryable(kind) {
            return None;
        }

        let delay = self.delay_for(attempt);
        if !self.jitter || delay.is_zero() {
            return Some(delay);
        }

        let spread = delay.as_nanos() as f64 * JITTER_FACTOR;
        let offset = rand::thread_rng().gen_range(-spread..=spread);
        let jittered = (delay.as_nanos() as f64 + offset)
            .clamp(0.0, self.max_delay.as_nanos() as f64);
        Some(Duration::from_nanos(jittered as u64))
    }
}

/// Executes remote operations under a retry policy
#[derive(Clone)]
pub struct ResilientInvoker {
    annotator: Arc<dyn TraceAnnotator>,
}

impl Default for ResilientInvoker {
    fn default() -> Self {
        Self::new(Arc::new(NoopAnnotator))
    }
}

impl fmt::Debug for ResilientInvoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilientInvoker").finish_non_exhaustive()
    }
}

impl ResilientInvoker {
    /// Create an invoker reporting terminal failures to the given sink
    pub fn new(annotator: Arc<dyn TraceAnnotator>) -> Self {
        Self { annotator }
    }

    /// Run an async operation, retrying transient failures
    ///
    /// The delay between attempts is a `tokio` sleep, so dropping the returned
    /// future cancels any pending retry.
    pub async fn run<T, F, Fut>(&self, call: &CallSite, policy: &RetryPolicy, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, ProviderError>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => match policy.next_delay(err.kind(), attempt) {
                    Some(delay) => {
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                        attempt += 1;
                    }
                    None => return Err(self.fail(call, &err, attempt)),
                },
            }
        }
    }

    /// Blocking twin of [`run`](Self::run) for callers on plain threads
    pub fn run_blocking<T, F>(&self, call: &CallSite, policy: &RetryPolicy, mut operation: F) -> Result<T>
    where
        F: FnMut() -> std::result::Result<T, ProviderError>,
    {
        let mut attempt = 1;
        loop {
            match operation() {
                Ok(value) => return Ok(value),
                Err(err) => match policy.next_delay(err.kind(), attempt) {
                    Some(delay) => {
                        if !delay.is_zero() {
                            std::thread::sleep(delay);
                        }
                        attempt += 1;
                    }
                    None => return Err(self.fail(call, &err, attempt)),
                },
            }
        }
    }

    fn fail(&self, call: &CallSite, err: &ProviderError, attempts: u32) -> DomainError {
        let domain = translate(err, call.resource_type(), call.resource(), call.fallback())
            .with_detail("operation", call.operation())
            .with_detail("resource", call.resource())
            .with_detail("attempts", attempts);

        error!(
            operation = %call.operation(),
            resource = %call.resource(),
            attempts = attempts,
            code = %domain.code(),
            failure = %err.kind(),
            provider_code = ?err.code(),
            error = %err.redacted_message(),
            "Remote operation failed"
        );

        self.annotator.annotate("error", domain.message());
        self.annotator.annotate("error_code", domain.code());

        domain
    }
}
