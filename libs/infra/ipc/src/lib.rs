// [libs/infra/ipc/src/lib.rs]
/*!
 * Servidor de memoria compartida del nucleo: region de snapshot con
 * patron seqlock, cola acotada de comandos entrantes, y anillo acotado
 * de notificaciones salientes. Un solo escritor (este crate), muchos
 * lectores externos (fachada HTTP/HMI, gateway Modbus).
 */

pub mod command_ring;
pub mod errors;
pub mod notification;
pub mod ring;
pub mod server;
pub mod snapshot;

pub use command_ring::CommandRing;
pub use errors::IpcError;
pub use notification::{NotificationEvent, NotificationRing};
pub use ring::{BoundedRing, OverflowPolicy};
pub use server::{IpcServer, IpcServerConfig};
pub use snapshot::{build_snapshot, DeviceSnapshot, PlantSnapshot, SnapshotRegion, SNAPSHOT_SCHEMA_VERSION};
