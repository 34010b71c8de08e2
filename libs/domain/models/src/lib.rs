// [libs/domain/models/src/lib.rs]
/*!
 * Tipos de dominio compartidos por todo el nucleo: las entidades que
 * describen la planta (dispositivos, slots, canales), la sesion PROFINET
 * (AR), y los subsistemas de control/alarmas/historizacion que operan
 * sobre ellas. Ningun crate de infraestructura depende de otro crate de
 * dominio sin pasar por estos tipos.
 */

pub mod alarm;
pub mod ar;
pub mod channel;
pub mod command;
pub mod device;
pub mod historian_tag;
pub mod pid;
pub mod quality;
pub mod slot;

pub use alarm::{AlarmAuditRecord, AlarmEvent, AlarmEventState, AlarmRule, ConditionKind, Rationalization, Severity, ShelvingWindow};
pub use ar::{ArRecord, ArRole, ArState, IocrMeta};
pub use channel::{ChannelRef, Control, ControlKind, EquipmentType, LinearScale, Sensor};
pub use command::{Command, CommandPayload, CommandResult};
pub use device::{Device, DeviceConnectionState, DeviceIdentity};
pub use historian_tag::{CompressionPolicy, HistorianSample, HistorianTag};
pub use pid::{PidLoop, PidMode, PidRuntimeState, PidTuning};
pub use quality::Quality;
pub use slot::{Slot, SlotStatus};
