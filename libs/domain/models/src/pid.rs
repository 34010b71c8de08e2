// [libs/domain/models/src/pid.rs]
/*!
 * APARATO: PID LOOP RECORD
 * Configuracion y estado persistente de un lazo de control.
 */

use serde::{Deserialize, Serialize};

use crate::channel::ChannelRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PidMode {
    Manual,
    Auto,
    Cascade,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PidTuning {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    pub derivative_filter: f64,
}

/// Estado interno que sobrevive entre ciclos de scan.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PidRuntimeState {
    pub integral: f64,
    pub previous_pv: f64,
    pub previous_derivative: f64,
    pub last_output: f64,
    pub frozen: bool,
    pub quality_recovery_cycles: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PidLoop {
    pub name: String,
    pub input: ChannelRef,
    pub output: ChannelRef,
    pub tuning: PidTuning,
    pub setpoint: f64,
    pub output_min: f64,
    pub output_max: f64,
    pub integral_limit: f64,
    pub deadband: f64,
    pub mode: PidMode,
    pub state: PidRuntimeState,
}
