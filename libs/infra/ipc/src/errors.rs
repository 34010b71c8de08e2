// [libs/infra/ipc/src/errors.rs]
/*!
 * APARATO: IPC ERROR CATALOG
 * Fallos de la region de memoria compartida y de las colas acotadas que
 * la fachada HTTP externa consume.
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IpcError {
    #[error("[IPC_MMAP_FAULT]: no se pudo abrir/crear el segmento de memoria compartida: {0}")]
    SegmentUnavailable(String),

    #[error("[IPC_SCHEMA_FAULT]: version de esquema incompatible (region={found}, lector={expected})")]
    SchemaMismatch { expected: u32, found: u32 },

    #[error("[IPC_CODEC_FAULT]: fallo de serializacion/deserializacion: {0}")]
    Codec(String),

    #[error("[IPC_CAPACITY_FAULT]: el snapshot excede el tamano de region reservado ({needed} > {capacity})")]
    SnapshotTooLarge { needed: usize, capacity: usize },

    #[error("[IPC_QUEUE_FAULT]: cola de comandos llena, se rechaza el envio")]
    CommandQueueFull,

    #[error("[IPC_PEER_FAULT]: el par remoto se desconecto del segmento")]
    PeerDetached,
}
