// [libs/core/frame/src/errors.rs]
/*!
 * APARATO: FRAME ENGINE ERROR CATALOG
 * Fallos en la construccion de tramas y en el descubrimiento DCP.
 * El parseo nunca propaga errores hacia arriba: eso se resuelve con contadores, no con este enum.
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("[FRAME_BUILD_FAULT]: PAYLOAD_EXCEEDS_MTU -> {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("[FRAME_IO_FAULT]: INTERFACE_UNAVAILABLE -> {0}")]
    InterfaceUnavailable(String),

    #[error("[FRAME_IO_FAULT]: SEND_FAILED -> {0}")]
    SendFailed(#[from] std::io::Error),

    #[error("[FRAME_DCP_FAULT]: DISCOVERY_PERMISSION_DENIED -> {0}")]
    DiscoveryPermissionDenied(String),
}
