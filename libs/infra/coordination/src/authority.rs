// [libs/infra/coordination/src/authority.rs]
/*!
 * APARATO: AUTHORITY HANDOFF
 * Par primario/respaldo con epoca de autoridad monotona. El handoff es
 * un protocolo de cuatro pasos (request -> grant -> release ->
 * released); durante la ventana de handoff el respaldo solo toma el
 * mando despues de que el primario libera explicitamente. Si el
 * primario esta inalcanzable, el respaldo puede forzar el reclamo tras
 * un plazo configurable -- el rechazo de comandos con epoca obsoleta en
 * el propio dispositivo sigue siendo la ultima linea de defensa.
 */

use std::sync::RwLock;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::errors::CoordinationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Primary,
    Backup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffState {
    /// Sin handoff en curso; el rol actual tiene la autoridad plena.
    Idle,
    /// El respaldo solicito tomar la autoridad.
    Requested,
    /// El primario actual concedio la solicitud.
    Granted,
    /// El primario libero la autoridad; el respaldo puede asumir.
    Released,
}

struct AuthorityState {
    role: Role,
    epoch: u64,
    handoff: HandoffState,
    requested_at: Option<Instant>,
}

/// Sigue la epoca de autoridad vigente y el protocolo de handoff entre
/// el nodo primario y su respaldo.
pub struct AuthorityManager {
    state: RwLock<AuthorityState>,
    force_claim_stall: Duration,
}

impl AuthorityManager {
    pub fn new(initial_role: Role, force_claim_stall: Duration) -> Self {
        Self {
            state: RwLock::new(AuthorityState { role: initial_role, epoch: 0, handoff: HandoffState::Idle, requested_at: None }),
            force_claim_stall,
        }
    }

    pub fn role(&self) -> Role {
        self.state.read().expect("LOCK_POISONED").role
    }

    pub fn current_epoch(&self) -> u64 {
        self.state.read().expect("LOCK_POISONED").epoch
    }

    /// Rechaza cualquier comando estampado con una epoca anterior a la
    /// vigente (invariante de la seccion de autoridad: stale-command rejection).
    pub fn validate_epoch(&self, received_epoch: u64) -> Result<(), CoordinationError> {
        let current = self.current_epoch();
        if received_epoch < current {
            return Err(CoordinationError::StaleEpoch { received: received_epoch, current });
        }
        Ok(())
    }

    /// El respaldo solicita tomar la autoridad.
    pub fn request_handoff(&self) -> Result<(), CoordinationError> {
        let mut state = self.state.write().expect("LOCK_POISONED");
        if state.handoff != HandoffState::Idle {
            return Err(CoordinationError::HandoffAlreadyInProgress);
        }
        state.handoff = HandoffState::Requested;
        state.requested_at = Some(Instant::now());
        info!("coordination: handoff requested");
        Ok(())
    }

    /// El primario actual concede la solicitud del respaldo.
    pub fn grant(&self) -> Result<(), CoordinationError> {
        let mut state = self.state.write().expect("LOCK_POISONED");
        if state.handoff != HandoffState::Requested {
            return Err(CoordinationError::InvalidHandoffTransition(state.handoff, HandoffState::Granted));
        }
        state.handoff = HandoffState::Granted;
        info!("coordination: handoff granted");
        Ok(())
    }

    /// El primario libera la autoridad; el respaldo puede completar el
    /// handoff con `complete_handoff`.
    pub fn release(&self) -> Result<(), CoordinationError> {
        let mut state = self.state.write().expect("LOCK_POISONED");
        if state.handoff != HandoffState::Granted {
            return Err(CoordinationError::InvalidHandoffTransition(state.handoff, HandoffState::Released));
        }
        state.handoff = HandoffState::Released;
        info!("coordination: authority released by primary");
        Ok(())
    }

    /// El respaldo completa el handoff tras observar `Released`: pasa a
    /// primario y avanza la epoca de autoridad.
    pub fn complete_handoff(&self) -> Result<u64, CoordinationError> {
        let mut state = self.state.write().expect("LOCK_POISONED");
        if state.handoff != HandoffState::Released {
            return Err(CoordinationError::InvalidHandoffTransition(state.handoff, HandoffState::Idle));
        }
        state.role = Role::Primary;
        state.epoch += 1;
        state.handoff = HandoffState::Idle;
        state.requested_at = None;
        info!(new_epoch = state.epoch, "coordination: handoff complete, authority transferred");
        Ok(state.epoch)
    }

    /// Si el primario quedo inalcanzable durante mas de `force_claim_stall`
    /// desde la solicitud, el respaldo puede reclamar la autoridad sin
    /// esperar un `release` explicito. El rechazo de epoca obsoleta en el
    /// dispositivo sigue siendo la ultima linea de defensa contra un
    /// primario que reaparece tarde.
    pub fn force_claim_if_stalled(&self) -> Option<u64> {
        let mut state = self.state.write().expect("LOCK_POISONED");
        if state.handoff != HandoffState::Requested {
            return None;
        }
        let stalled = state.requested_at.map(|t| t.elapsed() >= self.force_claim_stall).unwrap_or(false);
        if !stalled {
            return None;
        }
        warn!("coordination: primary unreachable past stall window, force-claiming authority");
        state.role = Role::Primary;
        state.epoch += 1;
        state.handoff = HandoffState::Idle;
        state.requested_at = None;
        Some(state.epoch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_epoch_rejects_stale_commands() {
        let manager = AuthorityManager::new(Role::Primary, Duration::from_secs(5));
        manager.request_handoff().unwrap();
        manager.grant().unwrap();
        manager.release().unwrap();
        let new_epoch = manager.complete_handoff().unwrap();
        assert_eq!(new_epoch, 1);
        assert!(manager.validate_epoch(0).is_err());
        assert!(manager.validate_epoch(1).is_ok());
    }

    #[test]
    fn grant_out_of_order_is_rejected() {
        let manager = AuthorityManager::new(Role::Backup, Duration::from_secs(5));
        assert!(manager.grant().is_err());
    }

    #[test]
    fn force_claim_requires_stall_elapsed() {
        let manager = AuthorityManager::new(Role::Backup, Duration::from_millis(10));
        manager.request_handoff().unwrap();
        assert!(manager.force_claim_if_stalled().is_none());
        std::thread::sleep(Duration::from_millis(15));
        assert_eq!(manager.force_claim_if_stalled(), Some(1));
    }
}
