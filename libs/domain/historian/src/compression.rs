// [libs/domain/historian/src/compression.rs]
/*!
 * APARATO: DEADBAND & SWINGING-DOOR COMPRESSION
 * Funciones puras sobre un flujo de muestras candidatas, unit-testeables
 * de forma aislada del motor con estado.
 */

use chrono::{DateTime, Utc};
use hydroscada_domain_models::HistorianSample;

/// Verdadero si la muestra debe considerarse *candidata* a archivo: o bien
/// supera el deadband respecto del ultimo valor archivado, o bien el
/// intervalo maximo del tag ha transcurrido desde el ultimo archivo.
pub fn is_candidate(sample: &HistorianSample, last_archived: Option<&HistorianSample>, deadband: f64, max_interval_ms: u32) -> bool {
    let Some(last) = last_archived else { return true };
    if (sample.value - last.value).abs() > deadband {
        return true;
    }
    let elapsed = (sample.timestamp - last.timestamp).num_milliseconds();
    max_interval_ms > 0 && elapsed >= max_interval_ms as i64
}

/// Estado de la "puerta oscilante" entre dos puntos archivados: las
/// pendientes maxima/minima que mantienen toda muestra intermedia dentro
/// de la tolerancia de compresion respecto del ancla.
#[derive(Debug, Clone)]
pub struct SwingingDoor {
    anchor_time: DateTime<Utc>,
    anchor_value: f64,
    upper_slope: f64,
    lower_slope: f64,
    pending: Option<HistorianSample>,
}

impl SwingingDoor {
    pub fn anchored_at(sample: &HistorianSample) -> Self {
        Self { anchor_time: sample.timestamp, anchor_value: sample.value, upper_slope: f64::INFINITY, lower_slope: f64::NEG_INFINITY, pending: None }
    }

    /// Evalua una nueva muestra contra el corredor vigente. Devuelve
    /// `Some(punto)` cuando el corredor se cierra y ese punto debe
    /// archivarse; en ese caso la puerta reinicia su ancla en ese punto.
    pub fn evaluate(&mut self, tolerance: f64, sample: HistorianSample) -> Option<HistorianSample> {
        let dt = (sample.timestamp - self.anchor_time).num_milliseconds() as f64 / 1000.0;
        if dt <= 0.0 {
            return None;
        }
        let slope_upper = (sample.value + tolerance - self.anchor_value) / dt;
        let slope_lower = (sample.value - tolerance - self.anchor_value) / dt;
        let new_upper = self.upper_slope.min(slope_upper);
        let new_lower = self.lower_slope.max(slope_lower);

        if new_upper < new_lower {
            let archived = self.pending.take();
            let reset_point = archived.unwrap_or(sample);
            self.anchor_time = reset_point.timestamp;
            self.anchor_value = reset_point.value;
            self.upper_slope = f64::INFINITY;
            self.lower_slope = f64::NEG_INFINITY;
            self.pending = Some(sample);
            Some(reset_point)
        } else {
            self.upper_slope = new_upper;
            self.lower_slope = new_lower;
            self.pending = Some(sample);
            None
        }
    }

    /// El punto pendiente todavia no archivado; usado al cerrar el tag o
    /// forzar un flush final.
    pub fn pending(&self) -> Option<HistorianSample> {
        self.pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydroscada_domain_models::Quality;

    fn sample(t_secs: i64, value: f64) -> HistorianSample {
        HistorianSample { timestamp: Utc::now() + chrono::Duration::seconds(t_secs), value, quality: Quality::Good }
    }

    #[test]
    fn deadband_rejects_small_changes() {
        let last = sample(0, 10.0);
        let candidate = sample(1, 10.2);
        assert!(!is_candidate(&candidate, Some(&last), 0.5, 0));
    }

    #[test]
    fn deadband_accepts_large_changes() {
        let last = sample(0, 10.0);
        let candidate = sample(1, 11.0);
        assert!(is_candidate(&candidate, Some(&last), 0.5, 0));
    }

    #[test]
    fn max_interval_forces_candidacy_even_within_deadband() {
        let last = sample(0, 10.0);
        let candidate = sample(100, 10.01);
        assert!(is_candidate(&candidate, Some(&last), 0.5, 5_000));
    }

    #[test]
    fn straight_line_run_stays_within_corridor() {
        let mut door = SwingingDoor::anchored_at(&sample(0, 0.0));
        for t in 1..10 {
            let archived = door.evaluate(0.1, sample(t, t as f64));
            assert!(archived.is_none(), "straight line should not force an archive");
        }
    }

    #[test]
    fn sharp_deviation_closes_the_door() {
        let mut door = SwingingDoor::anchored_at(&sample(0, 0.0));
        door.evaluate(0.1, sample(1, 1.0));
        door.evaluate(0.1, sample(2, 2.0));
        let archived = door.evaluate(0.1, sample(3, 50.0));
        assert!(archived.is_some());
    }
}
