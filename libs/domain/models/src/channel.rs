// [libs/domain/models/src/channel.rs]
/*!
 * APARATO: CHANNEL RECORDS (SENSOR / CONTROL)
 * Puntos logicos dentro de un slot. Los tags son unicos
 * globalmente entre sensores y controles (invariante 1).
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::quality::Quality;

/// Referencia debil a un canal, resuelta siempre a traves del Registry
/// (nunca almacenada como puntero directo).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelRef {
    pub station_name: String,
    pub slot_number: u16,
    pub tag: String,
}

/// Par de escalas para la conversion lineal raw -> ingenieril.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LinearScale {
    pub raw_low: f64,
    pub raw_high: f64,
    pub engineering_low: f64,
    pub engineering_high: f64,
}

impl LinearScale {
    pub fn convert(&self, raw_value: f64) -> f64 {
        let raw_span = self.raw_high - self.raw_low;
        if raw_span.abs() < f64::EPSILON {
            return self.engineering_low;
        }
        let fraction = (raw_value - self.raw_low) / raw_span;
        self.engineering_low + fraction * (self.engineering_high - self.engineering_low)
    }
}

/// Un punto de medida (sensor).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sensor {
    /// Tag globalmente unico, <=32 caracteres.
    pub tag: String,
    pub engineering_unit: String,
    pub scale: LinearScale,
    pub value: f64,
    pub quality: Quality,
    pub last_update: DateTime<Utc>,
}

impl Sensor {
    pub fn new(tag: impl Into<String>, engineering_unit: impl Into<String>, scale: LinearScale) -> Self {
        Self {
            tag: tag.into(),
            engineering_unit: engineering_unit.into(),
            scale,
            value: 0.0,
            quality: Quality::NotConnected,
            last_update: Utc::now(),
        }
    }

    /// Aplica una nueva lectura cruda, convirtiendola a unidades ingenieriles.
    pub fn apply_raw_reading(&mut self, raw_value: f32, quality: Quality) {
        self.value = self.scale.convert(raw_value as f64);
        self.quality = quality;
        self.last_update = Utc::now();
    }

    /// Valor utilizable por control/alarmas, o `None` si la calidad no lo permite
    /// (invariante 3: BAD/NOT_CONNECTED nunca alimentan esos motores).
    pub fn usable_value(&self) -> Option<f64> {
        self.quality.is_usable().then_some(self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlKind {
    Discrete,
    Analog,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EquipmentType {
    Pump,
    Valve,
    Blower,
    Mixer,
    Generic,
}

/// Un punto de actuacion (control).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Control {
    pub tag: String,
    pub kind: ControlKind,
    pub equipment_type: EquipmentType,
    pub range_min: f64,
    pub range_max: f64,
    pub commanded_value: f64,
    pub forced: bool,
    /// Verdadero si el dispositivo reporto un enclavamiento activo para este control.
    pub interlock_blocked: bool,
}

impl Control {
    pub fn new(tag: impl Into<String>, kind: ControlKind, equipment_type: EquipmentType, range_min: f64, range_max: f64) -> Self {
        Self {
            tag: tag.into(),
            kind,
            equipment_type,
            range_min,
            range_max,
            commanded_value: 0.0,
            forced: false,
            interlock_blocked: false,
        }
    }

    /// Revierte el valor comandado al ultimo valor reportado por el dispositivo,
    /// tal como exige el invariante 7 ante un rechazo por enclavamiento.
    pub fn revert_to_device_value(&mut self, device_reported_value: f64) {
        self.commanded_value = device_reported_value;
        self.forced = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_scale_converts_midpoint() {
        let scale = LinearScale { raw_low: 0.0, raw_high: 1000.0, engineering_low: 0.0, engineering_high: 14.0 };
        assert!((scale.convert(500.0) - 7.0).abs() < 1e-9);
    }

    #[test]
    fn bad_quality_sensor_is_not_usable() {
        let scale = LinearScale { raw_low: 0.0, raw_high: 1.0, engineering_low: 0.0, engineering_high: 1.0 };
        let mut sensor = Sensor::new("pH_SENSOR_1", "pH", scale);
        sensor.apply_raw_reading(0.5, Quality::Bad);
        assert_eq!(sensor.usable_value(), None);
        sensor.apply_raw_reading(0.5, Quality::Good);
        assert!(sensor.usable_value().is_some());
    }

    #[test]
    fn interlock_rejection_reverts_commanded_value() {
        let mut control = Control::new("PUMP_1", ControlKind::Discrete, EquipmentType::Pump, 0.0, 1.0);
        control.commanded_value = 1.0;
        control.forced = true;
        control.revert_to_device_value(0.0);
        assert_eq!(control.commanded_value, 0.0);
        assert!(!control.forced);
    }
}
