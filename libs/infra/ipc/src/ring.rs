// [libs/infra/ipc/src/ring.rs]
/*!
 * APARATO: BOUNDED RING
 * Cola acotada, un solo escritor conceptual por instancia (el IPC Writer
 * para notificaciones, la fachada externa via comandos reenviados), con
 * dos politicas de desborde: `RejectNew` (comandos: nunca bloquea, el
 * emisor recibe un error) y `DropOldest` (notificaciones/telemetria: la
 * entrada mas vieja se descarta silenciosamente para dar paso a la nueva).
 */

use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};

use crate::errors::IpcError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    RejectNew,
    DropOldest,
}

pub struct BoundedRing<T> {
    sender: Sender<T>,
    receiver: Receiver<T>,
    policy: OverflowPolicy,
}

impl<T> BoundedRing<T> {
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        let (sender, receiver) = crossbeam_channel::bounded(capacity.max(1));
        Self { sender, receiver, policy }
    }

    /// Encola un elemento segun la politica de desborde configurada.
    pub fn push(&self, item: T) -> Result<(), IpcError> {
        match self.sender.try_send(item) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(item)) => match self.policy {
                OverflowPolicy::RejectNew => Err(IpcError::CommandQueueFull),
                OverflowPolicy::DropOldest => {
                    // Libera un espacio descartando la entrada mas antigua
                    // y reintenta una vez; si el canal volvio a llenarse en
                    // el interin (productor concurrente), la entrada nueva
                    // se descarta en su lugar para mantener el tamano acotado.
                    let _ = self.receiver.try_recv();
                    match self.sender.try_send(item) {
                        Ok(()) => Ok(()),
                        Err(_) => Ok(()),
                    }
                }
            },
            Err(TrySendError::Disconnected(_)) => Err(IpcError::PeerDetached),
        }
    }

    /// Desencola el siguiente elemento sin bloquear.
    pub fn pop(&self) -> Option<T> {
        match self.receiver.try_recv() {
            Ok(item) => Some(item),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Desencola bloqueando hasta `timeout`, usado por el hilo consumidor
    /// dedicado (uno de los cuatro puntos de suspension del nucleo).
    pub fn pop_blocking(&self, timeout: std::time::Duration) -> Option<T> {
        self.receiver.recv_timeout(timeout).ok()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reject_new_errors_when_full() {
        let ring: BoundedRing<u32> = BoundedRing::new(2, OverflowPolicy::RejectNew);
        ring.push(1).unwrap();
        ring.push(2).unwrap();
        assert!(matches!(ring.push(3), Err(IpcError::CommandQueueFull)));
        assert_eq!(ring.pop(), Some(1));
    }

    #[test]
    fn drop_oldest_keeps_capacity_and_newest_entries() {
        let ring: BoundedRing<u32> = BoundedRing::new(2, OverflowPolicy::DropOldest);
        ring.push(1).unwrap();
        ring.push(2).unwrap();
        ring.push(3).unwrap();
        assert_eq!(ring.len(), 2);
        assert_eq!(ring.pop(), Some(2));
        assert_eq!(ring.pop(), Some(3));
    }
}
