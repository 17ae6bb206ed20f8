//! Bounded polling until an observed state satisfies a predicate.
//!
//! Used for every "wait until" in the pipeline: instance readiness, monitor and
//! manager availability, OSD count.
//!
//! # Example
//!
//! ```ignore
//! use cephlab_core::poll::{poll, PollPolicy};
//!
//! let status = poll(
//!     "OSD convergence",
//!     &PollPolicy::new(Duration::from_secs(60), 10),
//!     || async { fetch_status(&shell).await },
//!     |status| status.osd_count() >= 3,
//! ).await?;
//! ```

use crate::error::{CephlabError, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How often and how many times to probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Seconds to sleep between attempts
    pub interval_secs: u64,

    /// Total number of probe invocations before giving up
    pub max_attempts: u32,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self { interval_secs: interval.as_secs(), max_attempts }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Probe until `predicate` accepts the probed value.
///
/// - Predicate true: the value is returned at once, without sleeping.
/// - Predicate false or transient probe error: sleep `interval` and retry.
/// - Non-transient probe error: returned immediately.
/// - `max_attempts` probes without success: `ConvergenceTimeout` carrying the last
///   observed value, and the last error if the final probe failed.
pub async fn poll<T, F, Fut, P>(
    what: &str,
    policy: &PollPolicy,
    mut probe: F,
    mut predicate: P,
) -> Result<T>
where
    T: Debug,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: FnMut(&T) -> bool,
{
    if policy.max_attempts == 0 {
        return Err(CephlabError::InvalidConfig {
            reason: format!("poll policy for {} allows zero attempts", what),
        });
    }

    let mut last_observed = String::from("nothing");
    let mut last_error = None;

    for attempt in 1..=policy.max_attempts {
        match probe().await {
            Ok(value) => {
                if predicate(&value) {
                    debug!(what, attempt, "Converged");
                    return Ok(value);
                }
                last_observed = format!("{:?}", value);
                last_error = None;
                info!(
                    what,
                    attempt,
                    max_attempts = policy.max_attempts,
                    observed = %last_observed,
                    "Not converged yet"
                );
            }
            Err(e) if e.is_transient() => {
                warn!(
                    what,
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    "Probe failed, treating as not ready"
                );
                last_observed = format!("error: {}", e);
                last_error = Some(Box::new(e));
            }
            Err(e) => return Err(e),
        }

        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.interval()).await;
        }
    }

    Err(CephlabError::ConvergenceTimeout {
        what: what.to_string(),
        attempts: policy.max_attempts,
        last_observed,
        last_error,
    })
}
