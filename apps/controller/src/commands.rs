// [apps/controller/src/commands.rs]
/*!
 * APARATO: COMMAND DISPATCH
 * Traduce cada `Command` drenado de la cola IPC hacia el motor de
 * dominio que lo resuelve. Toda epoca de autoridad se valida antes de
 * tocar cualquier estado (invariante de rechazo de comandos obsoletos,
 * spec.md S4.8): un comando con una epoca vieja se rechaza entero, sin
 * efectos parciales.
 */

use hydroscada_domain_alarms::AlarmEngine;
use hydroscada_domain_control::ControlEngine;
use hydroscada_domain_models::{Command, CommandPayload, CommandResult};
use hydroscada_domain_registry::RtuRegistry;
use hydroscada_infra_coordination::AuthorityManager;
use tracing::warn;

/// Usuario simbolico usado cuando el comando llega por la cola IPC sin
/// una identidad de operador adjunta; la fachada HMI es responsable de
/// su propia autenticacion, fuera del alcance de este nucleo.
const IPC_OPERATOR: &str = "ipc-operator";

pub fn dispatch(
    command: Command,
    registry: &RtuRegistry,
    control_engine: &ControlEngine,
    alarm_engine: &AlarmEngine,
    authority: &AuthorityManager,
) -> CommandResult {
    if let Err(err) = authority.validate_epoch(command.authority_epoch) {
        warn!(correlation_id = %command.correlation_id, error = %err, "commands: rejected stale-epoch command");
        return CommandResult::Rejected { reason: err.to_string() };
    }

    match command.payload {
        CommandPayload::WriteControl { tag, value } => match registry.mutate_control(&tag, |control| {
            control.commanded_value = value;
            control.forced = true;
        }) {
            Ok(()) => {
                control_engine.track_pending_command(&tag, command);
                CommandResult::Accepted
            }
            Err(err) => CommandResult::Rejected { reason: err.to_string() },
        },
        CommandPayload::AcknowledgeAlarm { event_id } => match alarm_engine.acknowledge(event_id, IPC_OPERATOR) {
            Ok(()) => CommandResult::Accepted,
            Err(err) => CommandResult::Rejected { reason: err.to_string() },
        },
        CommandPayload::ShelveAlarm { event_id, duration_secs, reason } => {
            match alarm_engine.shelve(event_id, chrono::Duration::seconds(duration_secs as i64), &reason, IPC_OPERATOR) {
                Ok(()) => CommandResult::Accepted,
                Err(err) => CommandResult::Rejected { reason: err.to_string() },
            }
        }
        CommandPayload::SetPidMode { loop_name, mode } => match control_engine.set_mode(&loop_name, mode, registry) {
            Ok(()) => CommandResult::Accepted,
            Err(err) => CommandResult::Rejected { reason: err.to_string() },
        },
        CommandPayload::SetPidSetpoint { loop_name, setpoint } => match control_engine.set_setpoint(&loop_name, setpoint) {
            Ok(()) => CommandResult::Accepted,
            Err(err) => CommandResult::Rejected { reason: err.to_string() },
        },
    }
}
