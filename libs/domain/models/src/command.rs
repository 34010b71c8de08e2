// [libs/domain/models/src/command.rs]
/*!
 * APARATO: COMMAND RECORD
 * Una solicitud de escritura proveniente del operador/control surface,
 * en transito hacia el dispositivo.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CommandPayload {
    WriteControl { tag: String, value: f64 },
    AcknowledgeAlarm { event_id: u64 },
    ShelveAlarm { event_id: u64, duration_secs: u64, reason: String },
    SetPidMode { loop_name: String, mode: crate::pid::PidMode },
    SetPidSetpoint { loop_name: String, setpoint: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CommandResult {
    Accepted,
    Rejected { reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub correlation_id: Uuid,
    pub station_name: String,
    pub slot_number: u16,
    pub payload: CommandPayload,
    pub submitted_at: DateTime<Utc>,
    /// Epoca de autoridad vigente al momento del envio; un handoff
    /// de primario/respaldo en curso invalida comandos de una epoca vieja.
    pub authority_epoch: u64,
    pub result: Option<CommandResult>,
}

impl Command {
    pub fn new(station_name: impl Into<String>, slot_number: u16, payload: CommandPayload, authority_epoch: u64) -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
            station_name: station_name.into(),
            slot_number,
            payload,
            submitted_at: Utc::now(),
            authority_epoch,
            result: None,
        }
    }
}
