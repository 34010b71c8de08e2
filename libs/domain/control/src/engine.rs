// [libs/domain/control/src/engine.rs]
/*!
 * APARATO: CONTROL ENGINE
 * Orquesta el scan periodico: evalua
 * todo lazo PID habilitado, avanza toda secuencia activa, y absorbe las
 * notificaciones de enclavamiento que llegan desde el flujo de alarmas
 * del AR. No evalua enclavamientos por si mismo -- esos son locales a
 * cada RTU.
 */

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;
use hydroscada_domain_models::{Command, CommandResult, PidLoop, PidMode};
use hydroscada_domain_registry::RtuRegistry;
use tracing::{info, warn};

use crate::errors::ControlError;
use crate::pid;
use crate::sequence::{Predicate, Sequence, StepAction};

#[derive(Debug, Default)]
pub struct ScanReport {
    pub loops_evaluated: usize,
    pub sequences_advanced: usize,
    pub sequences_faulted: Vec<String>,
}

/// Motor de control: duenio de los lazos PID y secuencias vigentes. No es
/// dueno de sensores/controles -- esos residen en el Registry y se
/// resuelven por `ChannelRef` en cada ciclo.
pub struct ControlEngine {
    loops: RwLock<HashMap<String, PidLoop>>,
    sequences: RwLock<HashMap<String, Sequence>>,
    /// Comandos en vuelo hacia el dispositivo, indexados por tag de control,
    /// a la espera de confirmacion o de un rechazo por enclavamiento.
    pending_commands: RwLock<HashMap<String, Vec<Command>>>,
}

impl Default for ControlEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlEngine {
    pub fn new() -> Self {
        Self { loops: RwLock::new(HashMap::new()), sequences: RwLock::new(HashMap::new()), pending_commands: RwLock::new(HashMap::new()) }
    }

    pub fn register_loop(&self, loop_: PidLoop) -> Result<(), ControlError> {
        let mut loops = self.loops.write().expect("LOCK_POISONED");
        if loops.contains_key(&loop_.name) {
            return Err(ControlError::DuplicateLoop(loop_.name));
        }
        loops.insert(loop_.name.clone(), loop_);
        Ok(())
    }

    pub fn loop_snapshot(&self, name: &str) -> Result<PidLoop, ControlError> {
        self.loops.read().expect("LOCK_POISONED").get(name).cloned().ok_or_else(|| ControlError::UnknownLoop(name.to_string()))
    }

    pub fn set_setpoint(&self, name: &str, setpoint: f64) -> Result<(), ControlError> {
        let mut loops = self.loops.write().expect("LOCK_POISONED");
        let loop_ = loops.get_mut(name).ok_or_else(|| ControlError::UnknownLoop(name.to_string()))?;
        loop_.setpoint = setpoint;
        Ok(())
    }

    /// Transicion de modo bumpless: al entrar en AUTO/CASCADE
    /// desde MANUAL, el termino integral se inicializa para que la salida
    /// instantanea coincida con la ultima salida manual.
    pub fn set_mode(&self, name: &str, next_mode: PidMode, registry: &RtuRegistry) -> Result<(), ControlError> {
        let mut loops = self.loops.write().expect("LOCK_POISONED");
        let loop_ = loops.get_mut(name).ok_or_else(|| ControlError::UnknownLoop(name.to_string()))?;

        let pv = registry.sensor(&loop_.input)?.usable_value();
        let manual_output = registry.control(&loop_.output)?.commanded_value;

        if loop_.mode == PidMode::Manual && next_mode != PidMode::Manual {
            if let Some(pv) = pv {
                pid::transfer_to_auto(loop_, pv, manual_output, next_mode);
            } else {
                loop_.mode = next_mode;
            }
        } else {
            loop_.mode = next_mode;
            if next_mode == PidMode::Manual {
                loop_.state.last_output = manual_output;
            }
        }
        info!(loop_name = name, mode = ?loop_.mode, "control: mode transition");
        Ok(())
    }

    pub fn register_sequence(&self, sequence: Sequence) -> Result<(), ControlError> {
        let mut sequences = self.sequences.write().expect("LOCK_POISONED");
        if sequences.contains_key(&sequence.name) {
            return Err(ControlError::DuplicateSequence(sequence.name));
        }
        sequences.insert(sequence.name.clone(), sequence);
        Ok(())
    }

    pub fn start_sequence(&self, name: &str) -> Result<(), ControlError> {
        let mut sequences = self.sequences.write().expect("LOCK_POISONED");
        let sequence = sequences.get_mut(name).ok_or_else(|| ControlError::UnknownSequence(name.to_string()))?;
        sequence.start();
        Ok(())
    }

    /// Reset explicito del operador sobre una secuencia en fallo.
    pub fn reset_sequence(&self, name: &str) -> Result<(), ControlError> {
        let mut sequences = self.sequences.write().expect("LOCK_POISONED");
        let sequence = sequences.get_mut(name).ok_or_else(|| ControlError::UnknownSequence(name.to_string()))?;
        sequence.reset();
        Ok(())
    }

    /// Registra un comando despachado al dispositivo, a la espera de
    /// confirmacion o de un rechazo por enclavamiento sobre su control destino.
    pub fn track_pending_command(&self, tag: &str, command: Command) {
        self.pending_commands.write().expect("LOCK_POISONED").entry(tag.to_string()).or_default().push(command);
    }

    /// El motor de control nunca evalua enclavamientos -- son locales al RTU.
    /// Recibe la notificacion de activacion/liberacion desde el flujo de
    /// alarmas PDU del AR, marca el control bloqueado en el Registry, y
    /// devuelve los comandos en vuelo que deben acknowledgearse negativamente.
    pub fn notify_interlock(&self, registry: &RtuRegistry, tag: &str, active: bool) -> Result<Vec<Command>, ControlError> {
        registry.set_interlock_blocked(tag, active)?;
        if !active {
            return Ok(Vec::new());
        }
        // El cableado RTC1 no lleva un canal de retorno del estado real del
        // actuador (invariante 7): la unica senal que el core recibe del
        // dispositivo es el enclavamiento mismo. `range_min` es el estado
        // desenergizado del control y el mejor sustituto disponible del
        // "valor reportado por el dispositivo" para revertir el comando.
        let _ = registry.mutate_control(tag, |control| {
            let range_min = control.range_min;
            control.revert_to_device_value(range_min);
        });
        let mut pending = self.pending_commands.write().expect("LOCK_POISONED");
        let Some(commands) = pending.remove(tag) else { return Ok(Vec::new()) };
        let rejected: Vec<Command> = commands
            .into_iter()
            .map(|mut command| {
                command.result = Some(CommandResult::Rejected { reason: format!("INTERLOCK_ACTIVE: {tag}") });
                command
            })
            .collect();
        warn!(tag, rejected_count = rejected.len(), "control: interlock active, pending commands rejected");
        Ok(rejected)
    }

    /// Confirma los comandos en vuelo cuyo control destino ya no esta
    /// bloqueado por enclavamiento. El unico rechazo que este diseño puede
    /// observar llega por `notify_interlock`; la ausencia de ese rechazo
    /// tras un ciclo de Control Scan completo es la confirmacion positiva
    /// (invariante 7). Sin este drenaje `pending_commands` crece sin cota
    /// sobre todo `WriteControl` aceptado (spec.md S5).
    fn confirm_unblocked_commands(&self, registry: &RtuRegistry) {
        let tags: Vec<String> = self.pending_commands.read().expect("LOCK_POISONED").keys().cloned().collect();
        for tag in tags {
            let blocked = registry.resolve_tag(&tag).and_then(|reference| registry.control(&reference).ok()).map(|control| control.interlock_blocked).unwrap_or(false);
            if blocked {
                continue;
            }
            if let Some(confirmed) = self.pending_commands.write().expect("LOCK_POISONED").remove(&tag) {
                if !confirmed.is_empty() {
                    info!(tag, confirmed = confirmed.len(), "control: pending commands confirmed, no interlock within one cycle");
                }
            }
        }
    }

    /// Un ciclo de Control Scan completo: evalua todos los lazos PID
    /// habilitados, avanza todas las secuencias activas, y confirma los
    /// comandos en vuelo que sobrevivieron el ciclo sin enclavamiento.
    pub fn scan(&self, registry: &RtuRegistry, dt_secs: f64) -> ScanReport {
        let mut report = ScanReport::default();

        let mut loops = self.loops.write().expect("LOCK_POISONED");
        for loop_ in loops.values_mut() {
            let pv = match registry.sensor(&loop_.input) {
                Ok(sensor) => sensor.usable_value(),
                Err(_) => None,
            };
            let output = pid::step(loop_, pv, dt_secs);
            report.loops_evaluated += 1;

            if loop_.mode == PidMode::Manual {
                continue;
            }
            let blocked = registry.control(&loop_.output).map(|c| c.interlock_blocked).unwrap_or(true);
            if blocked {
                continue;
            }
            let _ = registry.mutate_control(&loop_.output.tag, |control| {
                control.commanded_value = output;
                control.forced = false;
            });
        }
        drop(loops);

        let now = Utc::now();
        let mut sequences = self.sequences.write().expect("LOCK_POISONED");
        for sequence in sequences.values_mut() {
            if sequence.check_timeout(now) {
                report.sequences_faulted.push(sequence.name.clone());
                continue;
            }
            let Some(predicate) = sequence.current_predicate() else { continue };
            let satisfied = Self::evaluate_predicate(registry, predicate);
            if let Some(action) = sequence.advance_if_ready(satisfied, now) {
                Self::apply_step_action(registry, &self.loops, &action);
                report.sequences_advanced += 1;
            }
        }
        drop(sequences);

        self.confirm_unblocked_commands(registry);

        report
    }

    fn evaluate_predicate(registry: &RtuRegistry, predicate: &Predicate) -> bool {
        match predicate {
            Predicate::Immediate => true,
            Predicate::SensorAbove { channel, threshold } => {
                registry.sensor(channel).ok().and_then(|s| s.usable_value()).map(|v| v > *threshold).unwrap_or(false)
            }
            Predicate::SensorBelow { channel, threshold } => {
                registry.sensor(channel).ok().and_then(|s| s.usable_value()).map(|v| v < *threshold).unwrap_or(false)
            }
        }
    }

    fn apply_step_action(registry: &RtuRegistry, loops: &RwLock<HashMap<String, PidLoop>>, action: &StepAction) {
        match action {
            StepAction::WriteControl { channel, value } => {
                let _ = registry.mutate_control(&channel.tag, |control| {
                    control.commanded_value = *value;
                    control.forced = true;
                });
            }
            StepAction::SetPidSetpoint { loop_name, setpoint } => {
                if let Some(loop_) = loops.write().expect("LOCK_POISONED").get_mut(loop_name) {
                    loop_.setpoint = *setpoint;
                }
            }
            StepAction::NoOp => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::SequenceStep;
    use hydroscada_domain_models::{ChannelRef, Control, ControlKind, Device, DeviceIdentity, EquipmentType, LinearScale, PidRuntimeState, PidTuning, Quality, Sensor, Slot};
    use std::net::{IpAddr, Ipv4Addr};

    fn seeded_registry() -> RtuRegistry {
        let registry = RtuRegistry::new();
        registry
            .insert_device(Device::new(
                "tank-1",
                IpAddr::V4(Ipv4Addr::new(192, 168, 1, 50)),
                DeviceIdentity { vendor_id: 1, device_id: 1, vendor_name: "AquaControl".into(), device_name: "RTU".into() },
            ))
            .unwrap();
        registry.lock_slot_layout("tank-1", vec![Slot::new(0, 1, 5, 0, 1), Slot::new(9, 1, 0, 2, 1)]).unwrap();
        let scale = LinearScale { raw_low: 0.0, raw_high: 1.0, engineering_low: 0.0, engineering_high: 14.0 };
        let mut sensor = Sensor::new("pH_PV", "pH", scale);
        sensor.apply_raw_reading(0.5, Quality::Good);
        registry.insert_sensor("tank-1", 0, sensor).unwrap();
        registry.insert_control("tank-1", 9, Control::new("DOSE_PUMP", ControlKind::Analog, EquipmentType::Pump, 0.0, 100.0)).unwrap();
        registry
    }

    fn sample_loop() -> PidLoop {
        PidLoop {
            name: "pH_LOOP".into(),
            input: ChannelRef { station_name: "tank-1".into(), slot_number: 0, tag: "pH_PV".into() },
            output: ChannelRef { station_name: "tank-1".into(), slot_number: 9, tag: "DOSE_PUMP".into() },
            tuning: PidTuning { kp: 1.0, ki: 0.1, kd: 0.0, derivative_filter: 0.5 },
            setpoint: 7.0,
            output_min: 0.0,
            output_max: 100.0,
            integral_limit: 50.0,
            deadband: 0.0,
            mode: PidMode::Auto,
            state: PidRuntimeState::default(),
        }
    }

    #[test]
    fn scan_writes_computed_output_into_registry() {
        let registry = seeded_registry();
        let engine = ControlEngine::new();
        engine.register_loop(sample_loop()).unwrap();
        let report = engine.scan(&registry, 0.1);
        assert_eq!(report.loops_evaluated, 1);
        assert_ne!(registry.control(&ChannelRef { station_name: "tank-1".into(), slot_number: 9, tag: "DOSE_PUMP".into() }).unwrap().commanded_value, 0.0);
    }

    #[test]
    fn blocked_control_is_not_overwritten_by_scan() {
        let registry = seeded_registry();
        registry.set_interlock_blocked("DOSE_PUMP", true).unwrap();
        let engine = ControlEngine::new();
        engine.register_loop(sample_loop()).unwrap();
        engine.scan(&registry, 0.1);
        assert_eq!(registry.control(&ChannelRef { station_name: "tank-1".into(), slot_number: 9, tag: "DOSE_PUMP".into() }).unwrap().commanded_value, 0.0);
    }

    #[test]
    fn interlock_notification_rejects_pending_commands() {
        let registry = seeded_registry();
        let engine = ControlEngine::new();
        let command = Command::new("tank-1", 9, hydroscada_domain_models::CommandPayload::WriteControl { tag: "DOSE_PUMP".into(), value: 50.0 }, 1);
        engine.track_pending_command("DOSE_PUMP", command);
        registry.mutate_control("DOSE_PUMP", |control| {
            control.commanded_value = 50.0;
            control.forced = true;
        }).unwrap();

        let rejected = engine.notify_interlock(&registry, "DOSE_PUMP", true).unwrap();
        assert_eq!(rejected.len(), 1);
        assert!(matches!(rejected[0].result, Some(CommandResult::Rejected { .. })));

        let control = registry.control(&ChannelRef { station_name: "tank-1".into(), slot_number: 9, tag: "DOSE_PUMP".into() }).unwrap();
        assert_eq!(control.commanded_value, 0.0);
        assert!(!control.forced);
    }

    #[test]
    fn scan_confirms_pending_command_once_cycle_completes_without_interlock() {
        let registry = seeded_registry();
        let engine = ControlEngine::new();
        let command = Command::new("tank-1", 9, hydroscada_domain_models::CommandPayload::WriteControl { tag: "DOSE_PUMP".into(), value: 50.0 }, 1);
        engine.track_pending_command("DOSE_PUMP", command);

        engine.scan(&registry, 0.1);

        assert!(engine.pending_commands.read().unwrap().is_empty());
    }

    #[test]
    fn scan_keeps_pending_command_while_interlock_blocked() {
        let registry = seeded_registry();
        registry.set_interlock_blocked("DOSE_PUMP", true).unwrap();
        let engine = ControlEngine::new();
        let command = Command::new("tank-1", 9, hydroscada_domain_models::CommandPayload::WriteControl { tag: "DOSE_PUMP".into(), value: 50.0 }, 1);
        engine.track_pending_command("DOSE_PUMP", command);

        engine.scan(&registry, 0.1);

        assert_eq!(engine.pending_commands.read().unwrap().get("DOSE_PUMP").map(Vec::len), Some(1));
    }

    #[test]
    fn sequence_executes_steps_in_order() {
        let registry = seeded_registry();
        let engine = ControlEngine::new();
        let sequence = Sequence::new(
            "DOSE_CYCLE",
            vec![SequenceStep {
                name: "OPEN_DOSER".into(),
                timeout_secs: 10,
                predicate: Predicate::Immediate,
                action: StepAction::WriteControl { channel: ChannelRef { station_name: "tank-1".into(), slot_number: 9, tag: "DOSE_PUMP".into() }, value: 75.0 },
            }],
        );
        engine.register_sequence(sequence).unwrap();
        engine.start_sequence("DOSE_CYCLE").unwrap();
        let report = engine.scan(&registry, 0.1);
        assert_eq!(report.sequences_advanced, 1);
        assert_eq!(registry.control(&ChannelRef { station_name: "tank-1".into(), slot_number: 9, tag: "DOSE_PUMP".into() }).unwrap().commanded_value, 75.0);
    }
}
