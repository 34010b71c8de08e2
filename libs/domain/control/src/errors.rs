// [libs/domain/control/src/errors.rs]
/*!
 * APARATO: CONTROL ENGINE ERROR CATALOG
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ControlError {
    #[error("[CTRL_LOOP_FAULT]: UNKNOWN_LOOP -> {0}")]
    UnknownLoop(String),

    #[error("[CTRL_LOOP_FAULT]: DUPLICATE_LOOP -> {0} already registered")]
    DuplicateLoop(String),

    #[error("[CTRL_SEQ_FAULT]: UNKNOWN_SEQUENCE -> {0}")]
    UnknownSequence(String),

    #[error("[CTRL_SEQ_FAULT]: DUPLICATE_SEQUENCE -> {0} already registered")]
    DuplicateSequence(String),

    #[error("[CTRL_SEQ_FAULT]: STEP_TIMEOUT -> sequence {sequence} stalled at step {step}")]
    StepTimeout { sequence: String, step: usize },

    #[error("[CTRL_SEQ_FAULT]: FAULTED_REQUIRES_RESET -> sequence {0} is in fault state, operator reset required")]
    SequenceFaulted(String),

    #[error("[CTRL_REGISTRY_FAULT]: {0}")]
    Registry(#[from] hydroscada_domain_registry::RegistryError),
}
