// [libs/domain/models/src/slot.rs]
/*!
 * APARATO: SLOT RECORD
 * Una posicion de modulo dentro de un dispositivo. El
 * dispositivo dicta este layout en el momento de conectar; el nucleo
 * nunca debe asumirlo de antemano (invariante de ownership del AR Manager).
 */

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotStatus {
    Ok,
    Substitute,
    Wrong,
    Empty,
    Fault,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slot {
    pub slot_number: u16,
    pub module_identity: u32,
    pub input_bytes: u16,
    pub output_bytes: u16,
    pub subslot_count: u16,
    pub status: SlotStatus,
}

impl Slot {
    pub fn new(slot_number: u16, module_identity: u32, input_bytes: u16, output_bytes: u16, subslot_count: u16) -> Self {
        Self {
            slot_number,
            module_identity,
            input_bytes,
            output_bytes,
            subslot_count,
            status: SlotStatus::Ok,
        }
    }
}
