// [libs/core/ar/src/state.rs]
/*!
 * APARATO: AR STATE MACHINE
 * Transiciones puras del grafo INIT -> CONNECT_REQ -> CONNECT_CNF ->
 * PRMSRV -> READY -> RUN (+ ABORT/CLOSE). Pura en el sentido de que no
 * toca red ni reloj: solo decide el proximo estado dado un evento.
 */

use hydroscada_domain_models::ArState;

/// Eventos que mueve la maquina de estados de un AR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArEvent {
    OperatorConnect,
    DeviceConnectConfirm,
    ParametersWritten,
    ParameterEnd,
    FirstCyclicFrame,
    WatchdogMiss,
    DeviceAbort,
    LocalError,
    QuenchElapsed,
    CloseRequested,
}

/// Aplica `event` sobre `current` y devuelve el nuevo estado, o `None`
/// si el evento no es valido en ese estado (se ignora, no es un error).
pub fn transition(current: ArState, event: &ArEvent) -> Option<ArState> {
    use ArEvent::*;
    use ArState::*;

    // cualquier estado puede abortar por timeout, abort explicito del
    // dispositivo, o error local.
    if matches!(event, WatchdogMiss | DeviceAbort | LocalError) && current != Abort && current != Close {
        return Some(Abort);
    }

    match (current, event) {
        (Init, OperatorConnect) => Some(ConnectReq),
        (ConnectReq, DeviceConnectConfirm) => Some(ConnectCnf),
        (ConnectCnf, ParametersWritten) => Some(PrmSrv),
        (PrmSrv, ParameterEnd) => Some(Ready),
        (Ready, FirstCyclicFrame) => Some(Run),
        (Run, CloseRequested) => Some(Close),
        (Abort, QuenchElapsed) => Some(Init),
        (Close, _) => Some(Init),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_reaches_run() {
        let mut state = ArState::Init;
        for event in [ArEvent::OperatorConnect, ArEvent::DeviceConnectConfirm, ArEvent::ParametersWritten, ArEvent::ParameterEnd, ArEvent::FirstCyclicFrame] {
            state = transition(state, &event).expect("valid transition");
        }
        assert_eq!(state, ArState::Run);
    }

    #[test]
    fn watchdog_miss_aborts_from_any_active_state() {
        assert_eq!(transition(ArState::Run, &ArEvent::WatchdogMiss), Some(ArState::Abort));
        assert_eq!(transition(ArState::PrmSrv, &ArEvent::WatchdogMiss), Some(ArState::Abort));
    }

    #[test]
    fn abort_returns_to_init_only_after_quench() {
        assert_eq!(transition(ArState::Abort, &ArEvent::OperatorConnect), None);
        assert_eq!(transition(ArState::Abort, &ArEvent::QuenchElapsed), Some(ArState::Init));
    }
}
