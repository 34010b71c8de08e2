// [libs/core/frame/src/counters.rs]
/*!
 * APARATO: FRAME DROP COUNTERS
 * Un parser que falla nunca propaga el error hacia arriba; en su lugar
 * incrementa uno de estos contadores y continua.
 */

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct FrameDropCounters {
    pub bad_crc: AtomicU64,
    pub truncated: AtomicU64,
    pub unknown_kind: AtomicU64,
    pub malformed_tlv: AtomicU64,
}

impl FrameDropCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_bad_crc(&self) {
        self.bad_crc.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_truncated(&self) {
        self.truncated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unknown_kind(&self) {
        self.unknown_kind.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed_tlv(&self) {
        self.malformed_tlv.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> FrameDropSnapshot {
        FrameDropSnapshot {
            bad_crc: self.bad_crc.load(Ordering::Relaxed),
            truncated: self.truncated.load(Ordering::Relaxed),
            unknown_kind: self.unknown_kind.load(Ordering::Relaxed),
            malformed_tlv: self.malformed_tlv.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameDropSnapshot {
    pub bad_crc: u64,
    pub truncated: u64,
    pub unknown_kind: u64,
    pub malformed_tlv: u64,
}
