// [libs/infra/coordination/src/circuit_breaker.rs]
/*!
 * APARATO: CIRCUIT BREAKER
 * Maquina de tres estados por subsistema (base de datos, servidor IPC,
 * interfaz PROFINET, almacen persistente): CLOSED -> OPEN tras
 * `failure_threshold` fallos consecutivos -> HALF_OPEN tras un
 * enfriamiento -> una sonda exitosa cierra, una fallida reabre.
 */

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    cooldown: Duration,
    consecutive_failures: AtomicU32,
    state: std::sync::RwLock<BreakerState>,
    opened_at: std::sync::RwLock<Option<Instant>>,
    trip_count: AtomicU64,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            name: name.into(),
            failure_threshold,
            cooldown,
            consecutive_failures: AtomicU32::new(0),
            state: std::sync::RwLock::new(BreakerState::Closed),
            opened_at: std::sync::RwLock::new(None),
            trip_count: AtomicU64::new(0),
        }
    }

    /// Debe consultarse antes de cada intento de operacion. Si el
    /// circuito esta OPEN pero ya transcurrio el enfriamiento, la
    /// llamada lo mueve a HALF_OPEN y permite exactamente una sonda.
    pub fn allow_request(&self) -> bool {
        let current = *self.state.read().expect("LOCK_POISONED");
        match current {
            BreakerState::Closed => true,
            BreakerState::HalfOpen => true,
            BreakerState::Open => {
                let elapsed_past_cooldown = self
                    .opened_at
                    .read()
                    .expect("LOCK_POISONED")
                    .map(|t| t.elapsed() >= self.cooldown)
                    .unwrap_or(false);
                if elapsed_past_cooldown {
                    *self.state.write().expect("LOCK_POISONED") = BreakerState::HalfOpen;
                    info!(breaker = %self.name, "circuit breaker: cooldown elapsed, probing");
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        let mut state = self.state.write().expect("LOCK_POISONED");
        if *state != BreakerState::Closed {
            info!(breaker = %self.name, "circuit breaker: probe succeeded, closing");
        }
        *state = BreakerState::Closed;
        *self.opened_at.write().expect("LOCK_POISONED") = None;
    }

    pub fn record_failure(&self) {
        let mut state = self.state.write().expect("LOCK_POISONED");
        if *state == BreakerState::HalfOpen {
            warn!(breaker = %self.name, "circuit breaker: probe failed, reopening");
            *state = BreakerState::Open;
            *self.opened_at.write().expect("LOCK_POISONED") = Some(Instant::now());
            self.trip_count.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= self.failure_threshold && *state == BreakerState::Closed {
            warn!(breaker = %self.name, failures, "circuit breaker: threshold exceeded, opening");
            *state = BreakerState::Open;
            *self.opened_at.write().expect("LOCK_POISONED") = Some(Instant::now());
            self.trip_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn state(&self) -> BreakerState {
        *self.state.read().expect("LOCK_POISONED")
    }

    pub fn trip_count(&self) -> u64 {
        self.trip_count.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_consecutive_failures() {
        let breaker = CircuitBreaker::new("store", 3, Duration::from_millis(20));
        assert!(breaker.allow_request());
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Closed);
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(!breaker.allow_request());
    }

    #[test]
    fn half_open_probe_can_close_or_reopen() {
        let breaker = CircuitBreaker::new("ipc", 1, Duration::from_millis(5));
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
        std::thread::sleep(Duration::from_millis(10));
        assert!(breaker.allow_request());
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }
}
