// [libs/infra/simulator/src/processes.rs]
/*!
 * APARATO: STOCHASTIC SENSOR PROCESSES
 * Generadores de valor crudo por canal: paseo aleatorio acotado,
 * sinusoide y guion de escenario. El acople del actuador (planta
 * modelada) se suma como sesgo externo en cada muestreo.
 */

use std::f64::consts::PI;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::Rng;

/// Un tramo de un guion de escenario: mantiene `value` durante `hold`
/// antes de avanzar al siguiente tramo (el guion es ciclico).
#[derive(Debug, Clone)]
pub struct ScenarioStep {
    pub hold: Duration,
    pub value: f64,
}

/// Fuente de valores crudos para un sensor simulado.
#[derive(Debug, Clone)]
pub enum SensorProcess {
    RandomWalk { min: f64, max: f64, step_std_dev: f64 },
    Sinusoid { center: f64, amplitude: f64, period: Duration, phase_offset: f64 },
    Scenario { steps: Vec<ScenarioStep> },
}

/// Estado mutable de un proceso en ejecucion: valor actual y, para el
/// guion, el indice del tramo vigente.
pub struct ProcessCursor {
    process: SensorProcess,
    value: f64,
    started_at: Instant,
    scenario_index: usize,
    scenario_entered_at: Instant,
}

impl ProcessCursor {
    pub fn new(process: SensorProcess, initial_value: f64, now: Instant) -> Self {
        Self { process, value: initial_value, started_at: now, scenario_index: 0, scenario_entered_at: now }
    }

    /// Avanza el proceso un paso y devuelve el nuevo valor crudo.
    /// `actuator_bias` es la contribucion de la planta modelada (0.0 si el
    /// sensor no esta acoplado a ningun actuador).
    pub fn sample(&mut self, rng: &mut StdRng, now: Instant, actuator_bias: f64) -> f64 {
        match &self.process {
            SensorProcess::RandomWalk { min, max, step_std_dev } => {
                let perturbation = if *step_std_dev > 0.0 { rng.gen_range(-step_std_dev..=*step_std_dev) } else { 0.0 };
                self.value = (self.value + perturbation + actuator_bias).clamp(*min, *max);
            }
            SensorProcess::Sinusoid { center, amplitude, period, phase_offset } => {
                let elapsed = now.duration_since(self.started_at).as_secs_f64();
                let period_secs = period.as_secs_f64().max(1e-6);
                let angle = 2.0 * PI * elapsed / period_secs + phase_offset;
                self.value = center + actuator_bias + amplitude * angle.sin();
            }
            SensorProcess::Scenario { steps } => {
                if steps.is_empty() {
                    return self.value;
                }
                if now.duration_since(self.scenario_entered_at) >= steps[self.scenario_index].hold {
                    self.scenario_index = (self.scenario_index + 1) % steps.len();
                    self.scenario_entered_at = now;
                }
                self.value = steps[self.scenario_index].value + actuator_bias;
            }
        }
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn random_walk_stays_within_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let now = Instant::now();
        let mut cursor = ProcessCursor::new(SensorProcess::RandomWalk { min: 0.0, max: 10.0, step_std_dev: 5.0 }, 5.0, now);
        for _ in 0..200 {
            let value = cursor.sample(&mut rng, now, 0.0);
            assert!((0.0..=10.0).contains(&value));
        }
    }

    #[test]
    fn sinusoid_oscillates_around_center() {
        let mut rng = StdRng::seed_from_u64(1);
        let start = Instant::now();
        let mut cursor = ProcessCursor::new(
            SensorProcess::Sinusoid { center: 20.0, amplitude: 2.0, period: Duration::from_secs(1), phase_offset: 0.0 },
            20.0,
            start,
        );
        let value = cursor.sample(&mut rng, start, 0.0);
        assert!((value - 20.0).abs() < 1e-9);
    }

    #[test]
    fn scenario_advances_to_next_step_after_hold_elapses() {
        let mut rng = StdRng::seed_from_u64(3);
        let start = Instant::now();
        let steps = vec![ScenarioStep { hold: Duration::from_millis(5), value: 1.0 }, ScenarioStep { hold: Duration::from_millis(5), value: 9.0 }];
        let mut cursor = ProcessCursor::new(SensorProcess::Scenario { steps }, 1.0, start);
        assert_eq!(cursor.sample(&mut rng, start, 0.0), 1.0);
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(cursor.sample(&mut rng, Instant::now(), 0.0), 9.0);
    }
}
