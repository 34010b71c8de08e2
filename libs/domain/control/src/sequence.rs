// [libs/domain/control/src/sequence.rs]
/*!
 * APARATO: SEQUENCE STEP EXECUTOR
 * Pasos ejecutados uno a la vez por secuencia, con timeout, predicado de
 * transicion y accion asociada. Un timeout transiciona a
 * un estado de fallo nombrado que requiere reset explicito del operador.
 */

use chrono::{DateTime, Utc};
use hydroscada_domain_models::ChannelRef;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Predicate {
    /// Siempre verdadero: avanza en el primer scan.
    Immediate,
    SensorAbove { channel: ChannelRef, threshold: f64 },
    SensorBelow { channel: ChannelRef, threshold: f64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StepAction {
    WriteControl { channel: ChannelRef, value: f64 },
    SetPidSetpoint { loop_name: String, setpoint: f64 },
    /// Paso puramente temporal o de sincronizacion, sin efecto sobre planta.
    NoOp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceStep {
    pub name: String,
    pub timeout_secs: u64,
    pub predicate: Predicate,
    pub action: StepAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SequenceState {
    Idle,
    Running { step_index: usize },
    /// Estado de fallo nombrado; solo abandonable por `reset` explicito del operador.
    Fault { step_index: usize, reason: String },
    Complete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sequence {
    pub name: String,
    pub steps: Vec<SequenceStep>,
    pub state: SequenceState,
    pub step_started_at: DateTime<Utc>,
}

impl Sequence {
    pub fn new(name: impl Into<String>, steps: Vec<SequenceStep>) -> Self {
        Self { name: name.into(), steps, state: SequenceState::Idle, step_started_at: Utc::now() }
    }

    pub fn start(&mut self) {
        self.state = SequenceState::Running { step_index: 0 };
        self.step_started_at = Utc::now();
    }

    /// Reset explicito del operador tras un fallo; vuelve a Idle (no reanuda
    /// automaticamente, debe llamarse `start` de nuevo).
    pub fn reset(&mut self) {
        self.state = SequenceState::Idle;
        self.step_started_at = Utc::now();
    }

    pub fn is_faulted(&self) -> bool {
        matches!(self.state, SequenceState::Fault { .. })
    }

    fn current_step_index(&self) -> Option<usize> {
        match self.state {
            SequenceState::Running { step_index } => Some(step_index),
            _ => None,
        }
    }

    /// Evalua un timeout de paso. Devuelve `true` si el paso acaba de entrar
    /// en fallo en esta llamada.
    pub fn check_timeout(&mut self, now: DateTime<Utc>) -> bool {
        let Some(step_index) = self.current_step_index() else { return false };
        let step = &self.steps[step_index];
        let elapsed = (now - self.step_started_at).num_seconds().max(0) as u64;
        if elapsed >= step.timeout_secs {
            self.state = SequenceState::Fault { step_index, reason: format!("STEP_TIMEOUT: {}", step.name) };
            return true;
        }
        false
    }

    /// Avanza al siguiente paso si el predicado actual es verdadero. Devuelve
    /// la accion a ejecutar cuando se produce el avance.
    pub fn advance_if_ready(&mut self, predicate_satisfied: bool, now: DateTime<Utc>) -> Option<StepAction> {
        let step_index = self.current_step_index()?;
        if !predicate_satisfied {
            return None;
        }
        let action = self.steps[step_index].action.clone();
        let next_index = step_index + 1;
        if next_index >= self.steps.len() {
            self.state = SequenceState::Complete;
        } else {
            self.state = SequenceState::Running { step_index: next_index };
            self.step_started_at = now;
        }
        Some(action)
    }

    pub fn current_predicate(&self) -> Option<&Predicate> {
        self.current_step_index().map(|i| &self.steps[i].predicate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_sequence() -> Sequence {
        Sequence::new(
            "FILL_CYCLE",
            vec![
                SequenceStep { name: "OPEN_INLET".into(), timeout_secs: 30, predicate: Predicate::Immediate, action: StepAction::NoOp },
                SequenceStep {
                    name: "WAIT_LEVEL".into(),
                    timeout_secs: 10,
                    predicate: Predicate::SensorAbove { channel: ChannelRef { station_name: "tank-1".into(), slot_number: 0, tag: "LEVEL".into() }, threshold: 80.0 },
                    action: StepAction::NoOp,
                },
            ],
        )
    }

    #[test]
    fn timeout_transitions_to_named_fault_state() {
        let mut sequence = sample_sequence();
        sequence.start();
        let started = sequence.step_started_at;
        let later = started + chrono::Duration::seconds(31);
        assert!(sequence.check_timeout(later));
        assert!(sequence.is_faulted());
    }

    #[test]
    fn reset_clears_fault_back_to_idle() {
        let mut sequence = sample_sequence();
        sequence.start();
        sequence.check_timeout(sequence.step_started_at + chrono::Duration::seconds(31));
        assert!(sequence.is_faulted());
        sequence.reset();
        assert_eq!(sequence.state, SequenceState::Idle);
    }

    #[test]
    fn advance_moves_to_next_step_only_when_predicate_holds() {
        let mut sequence = sample_sequence();
        sequence.start();
        assert!(sequence.advance_if_ready(false, Utc::now()).is_none());
        assert!(sequence.advance_if_ready(true, Utc::now()).is_some());
        assert_eq!(sequence.state, SequenceState::Running { step_index: 1 });
    }

    #[test]
    fn final_step_completes_sequence() {
        let mut sequence = sample_sequence();
        sequence.start();
        sequence.advance_if_ready(true, Utc::now());
        sequence.advance_if_ready(true, Utc::now());
        assert_eq!(sequence.state, SequenceState::Complete);
    }
}
