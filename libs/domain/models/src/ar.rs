// [libs/domain/models/src/ar.rs]
/*!
 * APARATO: APPLICATION RELATIONSHIP (AR) RECORD
 * Estado de sesion con un dispositivo.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArState {
    Init,
    ConnectReq,
    ConnectCnf,
    PrmSrv,
    Ready,
    Run,
    Abort,
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArRole {
    Controller,
    Supervisor,
}

/// Metadatos de un IOCR (flujo ciclico direccional dentro de un AR).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IocrMeta {
    pub length_bytes: u16,
    pub last_frame_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArRecord {
    pub id: Uuid,
    pub station_name: String,
    pub session_key: u32,
    pub role: ArRole,
    pub state: ArState,
    pub input_iocr: IocrMeta,
    pub output_iocr: IocrMeta,
    pub watchdog_interval_ms: u32,
}

impl ArRecord {
    pub fn new(station_name: impl Into<String>, session_key: u32, watchdog_interval_ms: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            station_name: station_name.into(),
            session_key,
            role: ArRole::Controller,
            state: ArState::Init,
            input_iocr: IocrMeta { length_bytes: 0, last_frame_at: None },
            output_iocr: IocrMeta { length_bytes: 0, last_frame_at: None },
            watchdog_interval_ms,
        }
    }
}
