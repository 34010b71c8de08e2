// [libs/core/ar/src/errors.rs]
/*!
 * APARATO: AR MANAGER ERROR CATALOG
 */

use hydroscada_domain_models::ArState;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArError {
    #[error("[AR_CONNECT_FAULT]: STALLED_AT_STATE -> reached {reached:?} instead of Run")]
    ConnectStalled { reached: ArState },

    #[error("[AR_IO_FAULT]: OUTPUT_LENGTH_MISMATCH -> slot {slot} expected {expected} got {got}")]
    OutputLengthMismatch { slot: u16, expected: usize, got: usize },

    #[error("[AR_IO_FAULT]: UNKNOWN_SLOT -> slot {0}")]
    UnknownSlot(u16),

    #[error("[AR_WATCHDOG_FAULT]: EXPIRED -> no cyclic frame within {0} ms")]
    WatchdogExpired(u64),

    #[error("[AR_CONCURRENCY_FAULT]: ANOTHER_AR_CONNECTING -> only one AR may connect at a time")]
    AnotherArConnecting,
}
