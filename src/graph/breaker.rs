// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Three-state circuit breaker guarding graph store calls.
//!
//! State machine:
//! * `Closed` — calls pass through; consecutive failures are counted.
//! * `Open` — every call is rejected immediately with
//!   [`StoreError::CircuitOpen`] until the recovery timeout elapses.
//! * `HalfOpen` — one probe call is allowed; success closes the breaker,
//!   failure re-opens it.
//!
//! Only errors the store classifies as its own (`trips_breaker`) count
//! against the threshold; anything else passes through untouched. Each
//! worker owns its breaker — state is never shared across workers.

use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::BreakerSettings;
use crate::errors::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    failure_count: u32,
    last_failure: Option<Instant>,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    recovery_timeout: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, recovery_timeout: Duration) -> Self {
        CircuitBreaker {
            failure_threshold: failure_threshold.max(1),
            recovery_timeout,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                failure_count: 0,
                last_failure: None,
            }),
        }
    }

    pub fn from_settings(settings: &BreakerSettings) -> Self {
        CircuitBreaker::new(
            settings.failure_threshold,
            Duration::from_secs(settings.recovery_timeout_sec),
        )
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().expect("breaker lock poisoned").state
    }

    /// Probe on entry. In `Open`, either rejects or, once the recovery
    /// timeout has elapsed, moves to `HalfOpen` and lets one call through.
    pub fn try_acquire(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        match inner.state {
            BreakerState::Closed | BreakerState::HalfOpen => Ok(()),
            BreakerState::Open => {
                let recovered = inner
                    .last_failure
                    .map(|at| at.elapsed() >= self.recovery_timeout)
                    .unwrap_or(true);
                if recovered {
                    inner.state = BreakerState::HalfOpen;
                    info!("circuit breaker entering half-open state");
                    Ok(())
                } else {
                    Err(StoreError::CircuitOpen)
                }
            }
        }
    }

    /// Record a successful call; closes a half-open breaker.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        if inner.state == BreakerState::HalfOpen {
            info!("circuit breaker closed after successful recovery");
        }
        inner.state = BreakerState::Closed;
        inner.failure_count = 0;
    }

    /// Record a failed call; opens the breaker at the threshold or on any
    /// half-open failure.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        inner.failure_count += 1;
        inner.last_failure = Some(Instant::now());
        let tripped = inner.state == BreakerState::HalfOpen
            || inner.failure_count >= self.failure_threshold;
        if tripped && inner.state != BreakerState::Open {
            warn!(
                failure_count = inner.failure_count,
                threshold = self.failure_threshold,
                "circuit breaker opened"
            );
        }
        if tripped {
            inner.state = BreakerState::Open;
        }
    }

    /// Run one store call under the breaker: probe on entry, record the
    /// outcome on exit. Errors that do not belong to the store pass
    /// through without touching the failure count.
    pub async fn call<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        self.try_acquire()?;
        match op.await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                if err.trips_breaker() {
                    self.record_failure();
                }
                Err(err)
            }
        }
    }

    /// Force the breaker back to `Closed`.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        inner.state = BreakerState::Closed;
        inner.failure_count = 0;
        inner.last_failure = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failing() -> Result<(), StoreError> {
        Err(StoreError::Transient("boom".into()))
    }

    #[tokio::test]
    async fn opens_after_threshold_consecutive_failures() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(60));
        for _ in 0..2 {
            let _ = breaker.call(async { failing() }).await;
            assert_eq!(breaker.state(), BreakerState::Closed);
        }
        let _ = breaker.call(async { failing() }).await;
        assert_eq!(breaker.state(), BreakerState::Open);

        let rejected = breaker.call(async { Ok(()) }).await;
        assert!(matches!(rejected, Err(StoreError::CircuitOpen)));
    }

    #[tokio::test]
    async fn success_resets_the_failure_count() {
        let breaker = CircuitBreaker::new(2, Duration::from_secs(60));
        let _ = breaker.call(async { failing() }).await;
        let _ = breaker.call(async { Ok(()) }).await;
        let _ = breaker.call(async { failing() }).await;
        // one failure after the reset, still below the threshold
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn half_open_probe_closes_on_success() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(5));
        let _ = breaker.call(async { failing() }).await;
        assert_eq!(breaker.state(), BreakerState::Open);

        std::thread::sleep(Duration::from_millis(10));
        assert!(breaker.try_acquire().is_ok());
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn half_open_probe_reopens_on_failure() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(5));
        let _ = breaker.call(async { failing() }).await;
        std::thread::sleep(Duration::from_millis(10));
        let _ = breaker.call(async { failing() }).await;
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[tokio::test]
    async fn non_store_errors_do_not_trip_the_breaker() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(60));
        let _ = breaker
            .call(async { Err::<(), _>(StoreError::Record("bad column".into())) })
            .await;
        assert_eq!(breaker.state(), BreakerState::Closed);
    }
}
