// [libs/infra/coordination/src/errors.rs]
/*!
 * APARATO: COORDINATION ERROR CATALOG
 * Fallos del protocolo de handoff de autoridad y del circuit breaker.
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoordinationError {
    #[error("[COORD_EPOCH_FAULT]: comando con epoca de autoridad obsoleta (recibida={received}, vigente={current})")]
    StaleEpoch { received: u64, current: u64 },

    #[error("[COORD_HANDOFF_FAULT]: transicion de handoff invalida ({0:?} -> {1:?})")]
    InvalidHandoffTransition(crate::authority::HandoffState, crate::authority::HandoffState),

    #[error("[COORD_HANDOFF_FAULT]: ya hay un handoff en curso")]
    HandoffAlreadyInProgress,

    #[error("[COORD_BREAKER_FAULT]: circuito abierto para '{0}', operacion rechazada")]
    BreakerOpen(String),
}
