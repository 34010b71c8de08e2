// [libs/core/frame/src/lib.rs]
/*!
 * Motor de tramas PROFINET: construccion/parseo de capa 2 y
 * descubrimiento DCP. El resto del nucleo nunca toca bytes de cable
 * directamente; pasa siempre por este crate.
 */

pub mod codec;
pub mod counters;
pub mod dcp;
pub mod errors;
pub mod frame;
pub mod wire;

pub use codec::{
    decode_actuator_field, decode_interlock_alarm, decode_sensor_field, encode_actuator_field, encode_interlock_alarm, encode_sensor_field, input_buffer_len,
    output_buffer_len,
};
pub use counters::{FrameDropCounters, FrameDropSnapshot};
pub use dcp::{dcp_discover, DcpIdentifyReply, LinkLayer};
pub use errors::FrameError;
pub use frame::{build_frame, parse_frame, ParsedFrame};
pub use wire::{DcpServiceId, FrameKind};
