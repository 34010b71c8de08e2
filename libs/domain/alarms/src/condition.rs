// [libs/domain/alarms/src/condition.rs]
/*!
 * APARATO: ALARM CONDITION EVALUATION
 * Funciones puras de evaluacion de condicion, separadas
 * del motor con estado para ser unit-testeables de forma aislada.
 */

use hydroscada_domain_models::ConditionKind;

/// Tolerancia por defecto para `ConditionKind::Equal` cuando la regla no
/// define una mas ajustada via `hysteresis_deadband`.
const DEFAULT_EQUAL_TOLERANCE: f64 = 1e-6;

/// Evalua si una condicion se cumple en el ciclo actual.
///
/// - `pv`: valor utilizable del canal, o `None` si la calidad lo excluye.
/// - `bad_quality_cycles`: ciclos consecutivos de calidad no utilizable.
/// - `rate`: tasa de cambio precomputada (unidades/segundo), solo para `RateOfChange`.
/// - `equal_tolerance`: tolerancia para `Equal` ("= within tolerance").
pub fn evaluate(
    condition: ConditionKind,
    pv: Option<f64>,
    bad_quality_cycles: u32,
    threshold: f64,
    deviation_reference: f64,
    rate: Option<f64>,
    equal_tolerance: f64,
) -> bool {
    match condition {
        ConditionKind::GreaterThan => pv.map(|v| v > threshold).unwrap_or(false),
        ConditionKind::LessThan => pv.map(|v| v < threshold).unwrap_or(false),
        ConditionKind::GreaterOrEqual => pv.map(|v| v >= threshold).unwrap_or(false),
        ConditionKind::LessOrEqual => pv.map(|v| v <= threshold).unwrap_or(false),
        ConditionKind::Equal => {
            let tolerance = if equal_tolerance > 0.0 { equal_tolerance } else { DEFAULT_EQUAL_TOLERANCE };
            pv.map(|v| (v - threshold).abs() <= tolerance).unwrap_or(false)
        }
        ConditionKind::Deviation => pv.map(|v| (v - deviation_reference).abs() > threshold).unwrap_or(false),
        ConditionKind::RateOfChange => rate.map(|r| r.abs() > threshold).unwrap_or(false),
        ConditionKind::BadQuality => bad_quality_cycles as f64 >= threshold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greater_than_triggers_above_threshold() {
        assert!(evaluate(ConditionKind::GreaterThan, Some(10.0), 0, 5.0, 0.0, None, 0.0));
        assert!(!evaluate(ConditionKind::GreaterThan, Some(3.0), 0, 5.0, 0.0, None, 0.0));
    }

    #[test]
    fn bad_pv_never_triggers_value_conditions() {
        assert!(!evaluate(ConditionKind::GreaterThan, None, 0, 5.0, 0.0, None, 0.0));
    }

    #[test]
    fn deviation_compares_against_reference_not_zero() {
        assert!(evaluate(ConditionKind::Deviation, Some(12.0), 0, 1.0, 10.0, None, 0.0));
        assert!(!evaluate(ConditionKind::Deviation, Some(10.5), 0, 1.0, 10.0, None, 0.0));
    }

    #[test]
    fn bad_quality_condition_counts_cycles_not_value() {
        assert!(!evaluate(ConditionKind::BadQuality, None, 2, 3.0, 0.0, None, 0.0));
        assert!(evaluate(ConditionKind::BadQuality, None, 3, 3.0, 0.0, None, 0.0));
    }

    #[test]
    fn rate_of_change_uses_precomputed_rate() {
        assert!(evaluate(ConditionKind::RateOfChange, Some(1.0), 0, 2.0, 0.0, Some(5.0), 0.0));
        assert!(!evaluate(ConditionKind::RateOfChange, Some(1.0), 0, 2.0, 0.0, Some(-1.0), 0.0));
    }
}
