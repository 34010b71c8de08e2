// [libs/domain/control/src/pid.rs]
/*!
 * APARATO: PID EVALUATION
 * Forma discreta con derivada sobre la medida (evita "derivative kick"
 * ante un cambio de setpoint), anti-windup por back-calculation, y
 * congelamiento ante mala calidad.
 */

use hydroscada_domain_models::{PidLoop, PidMode};

/// Numero de ciclos consecutivos de buena calidad requeridos antes de
/// descongelar un lazo que entro en modo "frozen".
const QUALITY_RECOVERY_CYCLES: u8 = 3;

/// Evalua un ciclo de scan para un lazo. `pv` es `None` cuando la calidad
/// del canal de entrada no es utilizable (BAD/NOT_CONNECTED); en ese caso
/// el lazo retiene su ultima salida (invariante de congelamiento).
pub fn step(loop_: &mut PidLoop, pv: Option<f64>, dt_secs: f64) -> f64 {
    let Some(value) = pv else {
        loop_.state.frozen = true;
        loop_.state.quality_recovery_cycles = 0;
        return loop_.state.last_output;
    };

    if loop_.state.frozen {
        loop_.state.quality_recovery_cycles = loop_.state.quality_recovery_cycles.saturating_add(1);
        if loop_.state.quality_recovery_cycles < QUALITY_RECOVERY_CYCLES {
            loop_.state.previous_pv = value;
            return loop_.state.last_output;
        }
        loop_.state.frozen = false;
        loop_.state.quality_recovery_cycles = 0;
    }

    if loop_.mode == PidMode::Manual {
        loop_.state.previous_pv = value;
        return loop_.state.last_output;
    }

    let dt = dt_secs.max(f64::EPSILON);
    let raw_error = loop_.setpoint - value;
    let error = if raw_error.abs() <= loop_.deadband { 0.0 } else { raw_error };

    let alpha = loop_.tuning.derivative_filter.clamp(0.0, 1.0);
    let derivative_raw = -loop_.tuning.kd * (value - loop_.state.previous_pv) / dt;
    let derivative = alpha * derivative_raw + (1.0 - alpha) * loop_.state.previous_derivative;

    let mut integral_candidate = loop_.state.integral + loop_.tuning.ki * error * dt;
    let unclamped = loop_.tuning.kp * error + integral_candidate + derivative;

    let saturated_high = unclamped > loop_.output_max;
    let saturated_low = unclamped < loop_.output_min;
    if (saturated_high && error > 0.0) || (saturated_low && error < 0.0) {
        // Back-calculation anti-windup: la salida ya satura y la integral
        // la empuja mas adentro de la saturacion, se descarta el avance de este ciclo.
        integral_candidate = loop_.state.integral;
    }
    integral_candidate = integral_candidate.clamp(-loop_.integral_limit, loop_.integral_limit);

    let output = unclamped.clamp(loop_.output_min, loop_.output_max);

    loop_.state.integral = integral_candidate;
    loop_.state.previous_pv = value;
    loop_.state.previous_derivative = derivative;
    loop_.state.last_output = output;
    output
}

/// Transicion MANUAL -> AUTO/CASCADE sin discontinuidad ("bumpless"): el
/// termino integral se inicializa para que la salida instantanea coincida
/// con la ultima salida manual.
pub fn transfer_to_auto(loop_: &mut PidLoop, pv: f64, manual_output: f64, next_mode: PidMode) {
    let raw_error = loop_.setpoint - pv;
    let error = if raw_error.abs() <= loop_.deadband { 0.0 } else { raw_error };
    let integral = manual_output - loop_.tuning.kp * error - loop_.state.previous_derivative;
    loop_.state.integral = integral.clamp(-loop_.integral_limit, loop_.integral_limit);
    loop_.state.previous_pv = pv;
    loop_.state.last_output = manual_output.clamp(loop_.output_min, loop_.output_max);
    loop_.mode = next_mode;
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydroscada_domain_models::{ChannelRef, PidRuntimeState, PidTuning};

    fn sample_loop() -> PidLoop {
        PidLoop {
            name: "pH_LOOP".into(),
            input: ChannelRef { station_name: "tank-1".into(), slot_number: 0, tag: "pH_PV".into() },
            output: ChannelRef { station_name: "tank-1".into(), slot_number: 9, tag: "DOSE_PUMP".into() },
            tuning: PidTuning { kp: 1.0, ki: 0.5, kd: 0.1, derivative_filter: 0.5 },
            setpoint: 7.0,
            output_min: 0.0,
            output_max: 100.0,
            integral_limit: 50.0,
            deadband: 0.05,
            mode: PidMode::Auto,
            state: PidRuntimeState::default(),
        }
    }

    #[test]
    fn bad_quality_freezes_output() {
        let mut loop_ = sample_loop();
        loop_.state.last_output = 42.0;
        let output = step(&mut loop_, None, 0.1);
        assert_eq!(output, 42.0);
        assert!(loop_.state.frozen);
    }

    #[test]
    fn frozen_loop_requires_three_good_cycles_to_resume() {
        let mut loop_ = sample_loop();
        loop_.state.last_output = 10.0;
        step(&mut loop_, None, 0.1);
        assert_eq!(step(&mut loop_, Some(7.0), 0.1), 10.0);
        assert_eq!(step(&mut loop_, Some(7.0), 0.1), 10.0);
        assert!(loop_.state.frozen);
        let resumed = step(&mut loop_, Some(7.0), 0.1);
        assert!(!loop_.state.frozen);
        let _ = resumed;
    }

    #[test]
    fn error_within_deadband_is_zeroed() {
        let mut loop_ = sample_loop();
        loop_.deadband = 1.0;
        loop_.setpoint = 7.0;
        let before = loop_.state.integral;
        step(&mut loop_, Some(7.5), 0.1);
        assert_eq!(loop_.state.integral, before);
    }

    #[test]
    fn output_clamps_to_configured_range() {
        let mut loop_ = sample_loop();
        loop_.tuning.kp = 1000.0;
        let output = step(&mut loop_, Some(0.0), 0.1);
        assert!(output <= loop_.output_max);
    }

    #[test]
    fn bumpless_transfer_preserves_manual_output() {
        let mut loop_ = sample_loop();
        loop_.mode = PidMode::Manual;
        let manual_output = 33.0;
        transfer_to_auto(&mut loop_, 7.0, manual_output, PidMode::Auto);
        assert_eq!(loop_.mode, PidMode::Auto);
        let next = step(&mut loop_, Some(7.0), 0.1);
        assert!((next - manual_output).abs() < 5.0);
    }
}
