// [libs/domain/registry/src/errors.rs]
/*!
 * APARATO: REGISTRY ERROR CATALOG
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("[REG_DEVICE_FAULT]: DUPLICATE_STATION -> {0} already registered")]
    DuplicateStation(String),

    #[error("[REG_DEVICE_FAULT]: UNKNOWN_STATION -> {0}")]
    UnknownStation(String),

    #[error("[REG_DEVICE_FAULT]: DELETE_WHILE_CONNECTED -> {0} must be disconnected first")]
    DeleteWhileConnected(String),

    #[error("[REG_SLOT_FAULT]: UNKNOWN_SLOT -> {station}/{slot}")]
    UnknownSlot { station: String, slot: u16 },

    #[error("[REG_SLOT_FAULT]: LAYOUT_ALREADY_LOCKED -> {0} slot layout is immutable while the AR is open")]
    SlotLayoutLocked(String),

    #[error("[REG_TAG_FAULT]: DUPLICATE_TAG -> {0} already in use by another sensor or control")]
    DuplicateTag(String),

    #[error("[REG_TAG_FAULT]: UNKNOWN_TAG -> {0}")]
    UnknownTag(String),
}
