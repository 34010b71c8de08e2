// [libs/infra/simulator/src/errors.rs]
/*!
 * APARATO: SIMULATOR ERROR CATALOG
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimulatorError {
    #[error("[SIM_CONFIG_FAULT]: UNKNOWN_STATION -> {0}")]
    UnknownStation(String),

    #[error("[SIM_CONFIG_FAULT]: UNKNOWN_SLOT -> estacion={station} slot={slot}")]
    UnknownSlot { station: String, slot: u16 },

    #[error("[SIM_CONFIG_FAULT]: DUPLICATE_STATION -> {0}")]
    DuplicateStation(String),

    #[error("[SIM_WIRE_FAULT]: {0}")]
    Frame(#[from] hydroscada_core_frame::FrameError),
}
