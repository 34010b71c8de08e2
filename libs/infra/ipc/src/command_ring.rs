// [libs/infra/ipc/src/command_ring.rs]
/*!
 * APARATO: COMMAND RING
 * Cola acotada multi-productor (la fachada externa), un solo consumidor
 * (el AR Manager via el dispatcher del nucleo). Desborda con
 * `RejectNew`: un envio sobre una cola llena nunca bloquea, retorna
 * `CommandQueueFull` de inmediato.
 */

use hydroscada_domain_models::Command;

use crate::errors::IpcError;
use crate::ring::{BoundedRing, OverflowPolicy};

pub struct CommandRing {
    inner: BoundedRing<Command>,
}

impl CommandRing {
    pub fn new(capacity: usize) -> Self {
        Self { inner: BoundedRing::new(capacity, OverflowPolicy::RejectNew) }
    }

    /// Encola un comando entrante; nunca bloquea (spec boundary: cola
    /// llena retorna error en vez de esperar).
    pub fn submit(&self, command: Command) -> Result<(), IpcError> {
        self.inner.push(command)
    }

    /// Desencola el siguiente comando en orden de llegada por dispositivo
    /// (orden de sumision preservado por FIFO del canal subyacente).
    pub fn next(&self) -> Option<Command> {
        self.inner.pop()
    }

    pub fn next_blocking(&self, timeout: std::time::Duration) -> Option<Command> {
        self.inner.pop_blocking(timeout)
    }

    pub fn pending(&self) -> usize {
        self.inner.len()
    }
}
