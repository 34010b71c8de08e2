// [libs/domain/models/src/alarm.rs]
/*!
 * APARATO: ALARM RULE & EVENT RECORDS
 * Condiciones de alarma y sus instancias segun el modelo ISA-18.2.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::channel::ChannelRef;

/// Severidad transportada siempre por nombre simbolico a traves del
/// limite IPC — nunca como entero crudo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmRule {
    pub id: u64,
    pub target: ChannelRef,
    pub condition: ConditionKind,
    pub threshold: f64,
    /// Punto de referencia usado unicamente por `ConditionKind::Deviation`
    /// (|PV - deviation_reference| > threshold); ignorado por las demas condiciones.
    pub deviation_reference: f64,
    pub severity: Severity,
    pub debounce_delay_ms: u64,
    pub hysteresis_deadband: f64,
    pub message_template: String,
    pub enabled: bool,
    /// Campos de racionalizacion ISA-18.2 (texto libre: causa probable,
    /// accion del operador, consecuencia).
    pub rationalization: Rationalization,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionKind {
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
    Equal,
    Deviation,
    RateOfChange,
    BadQuality,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Rationalization {
    pub probable_cause: String,
    pub operator_action: String,
    pub consequence_of_inaction: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmEventState {
    ActiveUnacknowledged,
    ActiveAcknowledged,
    ClearedUnacknowledged,
    Cleared,
    Shelved,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShelvingWindow {
    pub until: DateTime<Utc>,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmEvent {
    pub id: u64,
    pub rule_id: u64,
    pub state: AlarmEventState,
    /// Estado previo a un SHELVED temporal, para poder restaurarlo.
    pub pre_shelve_state: Option<AlarmEventState>,
    pub value_at_activation: f64,
    pub activated_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub acknowledged_by: Option<String>,
    pub cleared_at: Option<DateTime<Utc>>,
    pub shelving: Option<ShelvingWindow>,
    pub suppressed: bool,
    pub is_first_out: bool,
    /// Conteo acumulado cuando el evento colapsa activaciones repetidas
    /// en modo "chattering".
    pub chattering_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmAuditRecord {
    pub timestamp: DateTime<Utc>,
    pub user: String,
    pub action: String,
    pub event_id: Option<u64>,
    pub rule_id: Option<u64>,
}
