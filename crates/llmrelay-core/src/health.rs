//! Backend health: status machine and rolling request counters.
//!
//! Every adapter embeds one [`BackendHealth`]. It is mutated only through
//! [`BackendHealth::record_success`], [`BackendHealth::record_failure`] and
//! the router's probe path, and is safe to share across tasks.
//!
//! ```text
//!            success (any state)
//!   +---------------------------------------------+
//!   v                                             |
//! Healthy --failure--> Degraded --N failures--> Unavailable
//!   |                     |                          ^
//!   +----rate limited-----+---> RateLimited ---------+
//!                                        N failures
//! ```

use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::ErrorKind;

/// Consecutive non-rate-limit failures that make a backend unavailable.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// Health status of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendStatus {
    #[default]
    Healthy,
    Degraded,
    Unavailable,
    RateLimited,
}

impl std::fmt::Display for BackendStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendStatus::Healthy => write!(f, "healthy"),
            BackendStatus::Degraded => write!(f, "degraded"),
            BackendStatus::Unavailable => write!(f, "unavailable"),
            BackendStatus::RateLimited => write!(f, "rate_limited"),
        }
    }
}

/// Read-only projection of one backend's counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendStats {
    pub name: String,
    pub status: BackendStatus,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub success_rate: f64,
    pub consecutive_failures: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_success: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct HealthState {
    status: BackendStatus,
    last_success: Option<DateTime<Utc>>,
    last_failure: Option<DateTime<Utc>>,
    /// Monotonic twin of `last_failure`, used for cooldown arithmetic.
    last_failure_at: Option<Instant>,
    consecutive_failures: u32,
    total_requests: u64,
    successful_requests: u64,
}

/// Status and counters for a single backend.
#[derive(Debug)]
pub struct BackendHealth {
    name: String,
    failure_threshold: u32,
    state: Mutex<HealthState>,
}

impl BackendHealth {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_threshold(name, DEFAULT_FAILURE_THRESHOLD)
    }

    /// A threshold of 0 is treated as 1.
    pub fn with_threshold(name: impl Into<String>, failure_threshold: u32) -> Self {
        Self {
            name: name.into(),
            failure_threshold: failure_threshold.max(1),
            state: Mutex::new(HealthState::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    pub fn status(&self) -> BackendStatus {
        self.state.lock().status
    }

    pub fn is_healthy(&self) -> bool {
        self.status() == BackendStatus::Healthy
    }

    /// Record a successful request.
    pub fn record_success(&self) {
        let mut state = self.state.lock();
        state.last_success = Some(Utc::now());
        state.successful_requests += 1;
        state.total_requests += 1;
        state.consecutive_failures = 0;

        if state.status != BackendStatus::Healthy {
            tracing::info!(
                backend = %self.name,
                previous = %state.status,
                "Backend recovered"
            );
            state.status = BackendStatus::Healthy;
        }
    }

    /// Record a failed request and advance the status machine.
    pub fn record_failure(&self, kind: ErrorKind) {
        let mut state = self.state.lock();
        state.last_failure = Some(Utc::now());
        state.last_failure_at = Some(Instant::now());
        state.consecutive_failures += 1;
        state.total_requests += 1;

        state.status = match (state.status, kind) {
            (BackendStatus::Unavailable, _) => BackendStatus::Unavailable,
            (_, ErrorKind::RateLimited) => BackendStatus::RateLimited,
            _ if state.consecutive_failures >= self.failure_threshold => {
                BackendStatus::Unavailable
            }
            _ => BackendStatus::Degraded,
        };

        tracing::warn!(
            backend = %self.name,
            status = %state.status,
            consecutive_failures = state.consecutive_failures,
            kind = %kind,
            "Backend failure recorded"
        );
    }

    /// Apply the outcome of a health probe.
    ///
    /// Probe traffic never touches the request counters. A passing probe
    /// clears the consecutive-failure streak so the backend starts over.
    pub fn record_probe(&self, healthy: bool) {
        let mut state = self.state.lock();
        let next = if healthy {
            state.consecutive_failures = 0;
            BackendStatus::Healthy
        } else {
            BackendStatus::Unavailable
        };
        if state.status != next {
            tracing::info!(
                backend = %self.name,
                from = %state.status,
                to = %next,
                "Probe changed backend status"
            );
        }
        state.status = next;
    }

    /// Whether a rate-limited backend is still inside its cooldown window.
    ///
    /// Only the `RateLimited` status is gated; other statuses never cool down.
    pub fn in_cooldown(&self, cooldown: Duration) -> bool {
        let state = self.state.lock();
        match (state.status, state.last_failure_at) {
            (BackendStatus::RateLimited, Some(at)) => at.elapsed() < cooldown,
            _ => false,
        }
    }

    /// Whether the router may send a request here right now.
    ///
    /// `Unavailable` never is; `RateLimited` is once the cooldown has passed.
    /// Status and failure time are read together.
    pub fn is_eligible(&self, cooldown: Duration) -> bool {
        let state = self.state.lock();
        match (state.status, state.last_failure_at) {
            (BackendStatus::Unavailable, _) => false,
            (BackendStatus::RateLimited, Some(at)) => at.elapsed() >= cooldown,
            _ => true,
        }
    }

    /// `successful / total`, or 1.0 before the first request.
    pub fn success_rate(&self) -> f64 {
        let state = self.state.lock();
        rate(state.successful_requests, state.total_requests)
    }

    pub fn total_requests(&self) -> u64 {
        self.state.lock().total_requests
    }

    pub fn successful_requests(&self) -> u64 {
        self.state.lock().successful_requests
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.state.lock().consecutive_failures
    }

    pub fn snapshot(&self) -> BackendStats {
        let state = self.state.lock();
        BackendStats {
            name: self.name.clone(),
            status: state.status,
            total_requests: state.total_requests,
            successful_requests: state.successful_requests,
            success_rate: rate(state.successful_requests, state.total_requests),
            consecutive_failures: state.consecutive_failures,
            last_success: state.last_success,
            last_failure: state.last_failure,
        }
    }

    #[cfg(test)]
    pub(crate) fn force_status(&self, status: BackendStatus) {
        self.state.lock().status = status;
    }

    #[cfg(test)]
    pub(crate) fn force_counts(&self, successful: u64, total: u64) {
        let mut state = self.state.lock();
        state.successful_requests = successful;
        state.total_requests = total;
    }
}

fn rate(successful: u64, total: u64) -> f64 {
    if total == 0 {
        1.0
    } else {
        successful as f64 / total as f64
    }
}
