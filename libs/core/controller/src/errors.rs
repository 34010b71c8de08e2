// [libs/core/controller/src/errors.rs]
/*!
 * APARATO: CONTROLLER ERROR CATALOG
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("[CTRL_IO_FAULT]: INTERFACE_UNAVAILABLE -> {0}")]
    InterfaceUnavailable(String),

    #[error("[CTRL_IO_FAULT]: FRAME_FAULT -> {0}")]
    Frame(#[from] hydroscada_core_frame::FrameError),

    #[error("[CTRL_AR_FAULT]: {0}")]
    Ar(#[from] hydroscada_core_ar::ArError),
}
