// [libs/core/ar/src/manager.rs]
/*!
 * APARATO: AR MANAGER
 * Dueno exclusivo de los registros AR y de sus buffers ciclicos.
 */

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use hydroscada_domain_models::{ArRecord, ArState};
use tracing::{info, warn};

use crate::buffer::CyclicBuffer;
use crate::errors::ArError;
use crate::state::{transition, ArEvent};

struct ArEntry {
    record: ArRecord,
    input_buffer: CyclicBuffer,
    output_buffer: CyclicBuffer,
    consecutive_watchdog_misses: u32,
    reconnect_delay: Duration,
}

/// Dueno de todas las Application Relationships activas. Unico punto
/// de verdad sobre el estado de sesion y los buffers ciclicos asociados.
pub struct ArManager {
    entries: RwLock<HashMap<String, ArEntry>>,
    /// Invariante 5: solo un AR puede estar CONNECTING a la vez.
    connecting_guard: AtomicBool,
    base_reconnect_delay_ms: u64,
    max_reconnect_delay_ms: u64,
}

impl ArManager {
    pub fn new(base_reconnect_delay_ms: u64, max_reconnect_delay_ms: u64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            connecting_guard: AtomicBool::new(false),
            base_reconnect_delay_ms,
            max_reconnect_delay_ms,
        }
    }

    /// Reserva el cupo unico de conexion. Devuelve `false` si otro AR ya
    /// esta conectando.
    pub fn try_acquire_connecting_slot(&self) -> bool {
        self.connecting_guard.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_ok()
    }

    pub fn release_connecting_slot(&self) {
        self.connecting_guard.store(false, Ordering::Release);
    }

    /// Registra un nuevo AR en INIT, con buffers del tamano declarado por
    /// el dispositivo (conocido recien tras CONNECT_CNF en un flujo real;
    /// aqui se pasa ya resuelto porque la negociacion vive en el Controller).
    pub fn register(&self, station_name: &str, session_key: u32, watchdog_interval_ms: u32, input_len: usize, output_len: usize) {
        let mut entries = self.entries.write().expect("LOCK_POISONED");
        entries.insert(
            station_name.to_string(),
            ArEntry {
                record: ArRecord::new(station_name, session_key, watchdog_interval_ms),
                input_buffer: CyclicBuffer::new(input_len),
                output_buffer: CyclicBuffer::new(output_len),
                consecutive_watchdog_misses: 0,
                reconnect_delay: Duration::from_millis(self.base_reconnect_delay_ms),
            },
        );
    }

    /// Aplica un evento de la maquina de estados a un AR existente.
    pub fn apply_event(&self, station_name: &str, event: ArEvent) -> Result<ArState, ArError> {
        let mut entries = self.entries.write().expect("LOCK_POISONED");
        let entry = entries.get_mut(station_name).ok_or(ArError::UnknownSlot(0))?;

        let previous = entry.record.state;
        if let Some(next) = transition(previous, &event) {
            entry.record.state = next;
            if next == ArState::Abort && previous != ArState::Abort {
                warn!(station_name, ?previous, "ar: transitioned to ABORT");
                entry.consecutive_watchdog_misses = 0;
            }
            if next == ArState::Run {
                info!(station_name, "ar: reached RUN");
                entry.reconnect_delay = Duration::from_millis(self.base_reconnect_delay_ms);
            }
            Ok(next)
        } else {
            Ok(previous)
        }
    }

    /// Comprueba si el AR debe abortar por ausencia de trama ciclica
    /// dentro de `watchdog_factor * cycle_time`.
    pub fn check_watchdog(&self, station_name: &str, watchdog_factor: u32, cycle_time: Duration) -> Result<Option<ArState>, ArError> {
        let mut entries = self.entries.write().expect("LOCK_POISONED");
        let entry = entries.get_mut(station_name).ok_or(ArError::UnknownSlot(0))?;

        if entry.record.state != ArState::Run {
            return Ok(None);
        }

        let age = entry.input_buffer.age().unwrap_or(Duration::MAX);
        let limit = cycle_time * watchdog_factor;
        if age >= limit {
            entry.record.state = ArState::Abort;
            return Ok(Some(ArState::Abort));
        }
        Ok(None)
    }

    /// Retardo de reconexion tras ABORT, con backoff exponencial acotado.
    pub fn next_reconnect_delay(&self, station_name: &str) -> Duration {
        let mut entries = self.entries.write().expect("LOCK_POISONED");
        let Some(entry) = entries.get_mut(station_name) else {
            return Duration::from_millis(self.base_reconnect_delay_ms);
        };
        let current = entry.reconnect_delay;
        let doubled = current.as_millis().saturating_mul(2) as u64;
        entry.reconnect_delay = Duration::from_millis(doubled.min(self.max_reconnect_delay_ms));
        current
    }

    pub fn write_output(&self, station_name: &str, bytes: &[u8]) -> Result<(), ArError> {
        let entries = self.entries.read().expect("LOCK_POISONED");
        let entry = entries.get(station_name).ok_or(ArError::UnknownSlot(0))?;
        entry.output_buffer.write(bytes)
    }

    pub fn read_input(&self, station_name: &str) -> Result<std::sync::Arc<Vec<u8>>, ArError> {
        let entries = self.entries.read().expect("LOCK_POISONED");
        let entry = entries.get(station_name).ok_or(ArError::UnknownSlot(0))?;
        Ok(entry.input_buffer.read())
    }

    pub fn read_output(&self, station_name: &str) -> Result<std::sync::Arc<Vec<u8>>, ArError> {
        let entries = self.entries.read().expect("LOCK_POISONED");
        let entry = entries.get(station_name).ok_or(ArError::UnknownSlot(0))?;
        Ok(entry.output_buffer.read())
    }

    pub fn latch_input(&self, station_name: &str, bytes: &[u8]) -> Result<(), ArError> {
        let entries = self.entries.read().expect("LOCK_POISONED");
        let entry = entries.get(station_name).ok_or(ArError::UnknownSlot(0))?;
        entry.input_buffer.write(bytes)
    }

    pub fn state_of(&self, station_name: &str) -> Option<ArState> {
        self.entries.read().expect("LOCK_POISONED").get(station_name).map(|e| e.record.state)
    }

    pub fn remove(&self, station_name: &str) {
        self.entries.write().expect("LOCK_POISONED").remove(station_name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_one_ar_may_hold_the_connecting_slot() {
        let manager = ArManager::new(100, 5000);
        assert!(manager.try_acquire_connecting_slot());
        assert!(!manager.try_acquire_connecting_slot());
        manager.release_connecting_slot();
        assert!(manager.try_acquire_connecting_slot());
    }

    #[test]
    fn reconnect_delay_doubles_up_to_cap() {
        let manager = ArManager::new(100, 1000);
        manager.register("rtu-1", 1, 1000, 4, 2);
        let first = manager.next_reconnect_delay("rtu-1");
        let second = manager.next_reconnect_delay("rtu-1");
        let third = manager.next_reconnect_delay("rtu-1");
        assert_eq!(first, Duration::from_millis(100));
        assert_eq!(second, Duration::from_millis(200));
        assert_eq!(third, Duration::from_millis(400));
    }

    #[test]
    fn write_output_rejects_length_mismatch() {
        let manager = ArManager::new(100, 5000);
        manager.register("rtu-1", 1, 1000, 4, 2);
        assert!(manager.write_output("rtu-1", &[1]).is_err());
        assert!(manager.write_output("rtu-1", &[1, 2]).is_ok());
    }
}
