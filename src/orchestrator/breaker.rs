//! Circuit breaker around upstream calls

use crate::api::ApiError;
use crate::config::BreakerSettings;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls flow normally
    Closed,
    /// Calls are rejected until the cooldown passes
    Open,
    /// One probe call is allowed through
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub open_count: u32,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    half_open_successes: u32,
    probe_in_flight: bool,
    opened_at: Option<Instant>,
    open_count: u32,
}

/// Trips open after `failure_threshold` consecutive failures and probes again
/// once `cooldown` has passed.
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    success_threshold: u32,
    cooldown: Duration,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, cooldown: Duration, success_threshold: u32) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            success_threshold: success_threshold.max(1),
            cooldown,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                half_open_successes: 0,
                probe_in_flight: false,
                opened_at: None,
                open_count: 0,
            }),
        }
    }

    pub fn from_settings(settings: &BreakerSettings) -> Self {
        Self::new(
            settings.failure_threshold,
            Duration::from_secs(settings.cooldown_secs),
            settings.success_threshold,
        )
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // the state stays consistent even if a holder panicked
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let inner = self.lock();
        CircuitSnapshot {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            open_count: inner.open_count,
        }
    }

    /// Admit a call or reject it with `CircuitOpen`
    fn acquire(&self) -> Result<(), ApiError> {
        let mut inner = self.lock();
        let state = inner.state;
        match state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let elapsed = inner.opened_at.map(|at| at.elapsed()).unwrap_or(self.cooldown);
                if elapsed >= self.cooldown {
                    info!("Circuit half-open, probing upstream");
                    inner.state = CircuitState::HalfOpen;
                    inner.half_open_successes = 0;
                    inner.probe_in_flight = true;
                    Ok(())
                } else {
                    Err(ApiError::CircuitOpen {
                        retry_after_secs: (self.cooldown - elapsed).as_secs().max(1),
                    })
                }
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    Err(ApiError::CircuitOpen { retry_after_secs: 1 })
                } else {
                    inner.probe_in_flight = true;
                    Ok(())
                }
            }
        }
    }

    fn open(&self, inner: &mut Inner) {
        inner.state = CircuitState::Open;
        inner.opened_at = Some(Instant::now());
        inner.probe_in_flight = false;
        inner.half_open_successes = 0;
        inner.open_count += 1;
        warn!(
            "Circuit opened after {} consecutive failures; cooling down for {:?}",
            inner.consecutive_failures, self.cooldown
        );
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        inner.consecutive_failures = 0;
        if inner.state == CircuitState::HalfOpen {
            inner.probe_in_flight = false;
            inner.half_open_successes += 1;
            if inner.half_open_successes >= self.success_threshold {
                inner.state = CircuitState::Closed;
                inner.opened_at = None;
                inner.half_open_successes = 0;
                info!("Circuit closed");
            }
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.consecutive_failures += 1;
        let state = inner.state;
        match state {
            CircuitState::HalfOpen => self.open(&mut inner),
            CircuitState::Closed if inner.consecutive_failures >= self.failure_threshold => {
                self.open(&mut inner)
            }
            _ => {}
        }
    }

    /// Run `call` unless the circuit is open, recording its outcome
    pub async fn call<T, F, Fut>(&self, call: F) -> Result<T, ApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        self.acquire()?;
        let result = call().await;
        match &result {
            Ok(_) => self.record_success(),
            Err(_) => self.record_failure(),
        }
        result
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::from_settings(&BreakerSettings::default())
    }
}
