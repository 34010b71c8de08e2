// [libs/core/controller/src/stats.rs]
/*!
 * APARATO: CYCLE STATISTICS
 * Estadisticas de tiempo de ciclo observadas por el pump principal.
 */

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct CycleStats {
    current_us: AtomicU64,
    min_us: AtomicU64,
    max_us: AtomicU64,
    sum_us: AtomicU64,
    count: AtomicU64,
    overruns: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStatsSnapshot {
    pub current_us: u64,
    pub min_us: u64,
    pub max_us: u64,
    pub avg_us: u64,
    pub overruns: u64,
}

impl CycleStats {
    pub fn new() -> Self {
        Self { min_us: AtomicU64::new(u64::MAX), ..Default::default() }
    }

    /// Registra la duracion observada de un ciclo; marca overrun si excede
    /// `nominal` en mas del 10% de tolerancia de jitter.
    pub fn record(&self, elapsed: Duration, nominal: Duration) {
        let us = elapsed.as_micros() as u64;
        self.current_us.store(us, Ordering::Relaxed);
        self.sum_us.fetch_add(us, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.min_us.fetch_min(us, Ordering::Relaxed);
        self.max_us.fetch_max(us, Ordering::Relaxed);

        let tolerance = nominal.as_micros() as u64 / 10;
        if us > nominal.as_micros() as u64 + tolerance {
            self.overruns.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> CycleStatsSnapshot {
        let count = self.count.load(Ordering::Relaxed).max(1);
        let min = self.min_us.load(Ordering::Relaxed);
        CycleStatsSnapshot {
            current_us: self.current_us.load(Ordering::Relaxed),
            min_us: if min == u64::MAX { 0 } else { min },
            max_us: self.max_us.load(Ordering::Relaxed),
            avg_us: self.sum_us.load(Ordering::Relaxed) / count,
            overruns: self.overruns.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrun_counted_past_jitter_tolerance() {
        let stats = CycleStats::new();
        let nominal = Duration::from_millis(1);
        stats.record(Duration::from_micros(1000), nominal);
        stats.record(Duration::from_micros(1200), nominal);
        assert_eq!(stats.snapshot().overruns, 1);
    }
}
