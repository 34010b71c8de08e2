// [libs/infra/ipc/src/server.rs]
/*!
 * APARATO: IPC SERVER
 * Un escritor (el nucleo), muchos lectores (fachada HMI, gateway
 * Modbus): publica el snapshot vivo del Registry en memoria compartida,
 * recibe comandos de la fachada y reenvia notificaciones salientes.
 */

use std::path::PathBuf;
use std::sync::Arc;

use hydroscada_domain_models::Command;
use hydroscada_domain_registry::RtuRegistry;

use crate::command_ring::CommandRing;
use crate::errors::IpcError;
use crate::notification::{NotificationEvent, NotificationRing};
use crate::snapshot::{build_snapshot, SnapshotRegion};

pub struct IpcServerConfig {
    pub snapshot_path: PathBuf,
    pub snapshot_capacity_bytes: usize,
    pub command_queue_capacity: usize,
    pub notification_queue_capacity: usize,
}

impl Default for IpcServerConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from("/tmp/hydroscada/snapshot.shm"),
            snapshot_capacity_bytes: 4 * 1024 * 1024,
            command_queue_capacity: 1024,
            notification_queue_capacity: 4096,
        }
    }
}

/// Combina la region de snapshot, la cola de comandos, y el anillo de
/// notificaciones en una unica fachada usada por el hilo IPC Writer.
pub struct IpcServer {
    snapshot: SnapshotRegion,
    commands: CommandRing,
    notifications: NotificationRing,
    registry: Arc<RtuRegistry>,
}

impl IpcServer {
    pub fn open(config: IpcServerConfig, registry: Arc<RtuRegistry>) -> Result<Self, IpcError> {
        if let Some(parent) = config.snapshot_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let snapshot = SnapshotRegion::open(&config.snapshot_path, config.snapshot_capacity_bytes)?;
        Ok(Self {
            snapshot,
            commands: CommandRing::new(config.command_queue_capacity),
            notifications: NotificationRing::new(config.notification_queue_capacity),
            registry,
        })
    }

    /// Un tick del hilo IPC Writer: republica el snapshot vivo del
    /// Registry. Llamado en cadencia fija por el bucle del hilo dedicado.
    pub fn publish_snapshot_tick(&mut self) -> Result<(), IpcError> {
        let snapshot = build_snapshot(&self.registry);
        self.snapshot.publish(&snapshot)
    }

    pub fn submit_command(&self, command: Command) -> Result<(), IpcError> {
        self.commands.submit(command)
    }

    pub fn drain_next_command(&self) -> Option<Command> {
        self.commands.next()
    }

    pub fn publish_notification(&self, event: NotificationEvent) -> Result<(), IpcError> {
        self.notifications.publish(event)
    }

    pub fn pending_commands(&self) -> usize {
        self.commands.pending()
    }

    pub fn pending_notifications(&self) -> usize {
        self.notifications.pending()
    }
}
