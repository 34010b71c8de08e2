// [libs/infra/ipc/src/snapshot.rs]
/*!
 * APARATO: SNAPSHOT REGION (SEQLOCK)
 * Region de memoria compartida, doble-buffer por escritura: el escritor
 * llena el buffer inactivo y publica con un contador de secuencia
 * monotono; los lectores reintentan hasta observar una copia completa
 * (nunca una mezcla a medio escribir entre dos publicaciones).
 *
 * Layout de bytes (offset => campo):
 *   0  -> schema_version: u32
 *   8  -> sequence: u64 (par = estable, el indice activo es sequence % 2)
 *   16 -> len_buffer_a: u64
 *   24 -> len_buffer_b: u64
 *   32 -> buffer_a: [u8; capacity]
 *   32+capacity -> buffer_b: [u8; capacity]
 */

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::atomic::{fence, AtomicU64, Ordering};

use hydroscada_domain_models::{Control, Device, DeviceConnectionState, Sensor, Slot};
use memmap2::MmapMut;
use serde::{Deserialize, Serialize};

use crate::errors::IpcError;

const SCHEMA_VERSION_OFFSET: usize = 0;
const SEQUENCE_OFFSET: usize = 8;
const LEN_A_OFFSET: usize = 16;
const LEN_B_OFFSET: usize = 24;
const HEADER_SIZE: usize = 32;

/// Numero de esquema del layout de bytes de esta region. Un lector con un
/// numero distinto debe desconectarse con un error claro en vez de
/// malinterpretar los bytes.
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

const MAX_SEQLOCK_RETRIES: u32 = 16;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    pub device: Device,
    pub connection_state: DeviceConnectionState,
    pub slots: Vec<Slot>,
    pub sensors: Vec<Sensor>,
    pub controls: Vec<Control>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PlantSnapshot {
    pub devices: Vec<DeviceSnapshot>,
    pub published_at_epoch_millis: i64,
}

fn seq_atomic(mmap: &MmapMut) -> &AtomicU64 {
    let ptr = unsafe { mmap.as_ptr().add(SEQUENCE_OFFSET) } as *const AtomicU64;
    unsafe { &*ptr }
}

fn write_u64_at(mmap: &mut MmapMut, offset: usize, value: u64) {
    mmap[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

fn read_u64_at(mmap: &MmapMut, offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&mmap[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

/// Segmento de memoria compartida respaldado por un archivo mapeado
/// (nombre Unix derivado de la instalacion, ver `spec` IPC).
pub struct SnapshotRegion {
    mmap: MmapMut,
    capacity_per_buffer: usize,
}

impl SnapshotRegion {
    /// Crea o reabre el segmento en `path`, dimensionado para alojar
    /// snapshots de hasta `capacity_per_buffer` bytes cada uno.
    pub fn open(path: &Path, capacity_per_buffer: usize) -> Result<Self, IpcError> {
        let total_size = HEADER_SIZE + 2 * capacity_per_buffer;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)
            .map_err(|e| IpcError::SegmentUnavailable(e.to_string()))?;
        file.set_len(total_size as u64)
            .map_err(|e| IpcError::SegmentUnavailable(e.to_string()))?;

        let mut mmap = unsafe { MmapMut::map_mut(&file) }
            .map_err(|e| IpcError::SegmentUnavailable(e.to_string()))?;

        let existing_version = {
            let mut bytes = [0u8; 4];
            bytes.copy_from_slice(&mmap[SCHEMA_VERSION_OFFSET..SCHEMA_VERSION_OFFSET + 4]);
            u32::from_le_bytes(bytes)
        };
        if existing_version == 0 {
            mmap[SCHEMA_VERSION_OFFSET..SCHEMA_VERSION_OFFSET + 4]
                .copy_from_slice(&SNAPSHOT_SCHEMA_VERSION.to_le_bytes());
        } else if existing_version != SNAPSHOT_SCHEMA_VERSION {
            return Err(IpcError::SchemaMismatch { expected: SNAPSHOT_SCHEMA_VERSION, found: existing_version });
        }

        Ok(Self { mmap, capacity_per_buffer })
    }

    fn buffer_offset(&self, index: u64) -> usize {
        HEADER_SIZE + (index as usize % 2) * self.capacity_per_buffer
    }

    /// Serializa el snapshot y lo publica en el buffer inactivo, luego
    /// avanza la secuencia para volverlo el activo.
    pub fn publish(&mut self, snapshot: &PlantSnapshot) -> Result<(), IpcError> {
        let bytes = bincode::serialize(snapshot).map_err(|e| IpcError::Codec(e.to_string()))?;
        if bytes.len() > self.capacity_per_buffer {
            return Err(IpcError::SnapshotTooLarge { needed: bytes.len(), capacity: self.capacity_per_buffer });
        }

        let current_seq = seq_atomic(&self.mmap).load(Ordering::Acquire);
        let inactive_index = current_seq.wrapping_add(1);
        let write_offset = self.buffer_offset(inactive_index);
        let len_offset = if inactive_index % 2 == 0 { LEN_A_OFFSET } else { LEN_B_OFFSET };

        self.mmap[write_offset..write_offset + bytes.len()].copy_from_slice(&bytes);
        write_u64_at(&mut self.mmap, len_offset, bytes.len() as u64);

        fence(Ordering::Release);
        seq_atomic(&self.mmap).fetch_add(1, Ordering::Release);
        Ok(())
    }

    /// Lee el snapshot actualmente activo, reintentando si una publicacion
    /// concurrente invalida la copia en curso.
    pub fn read(&self) -> Result<PlantSnapshot, IpcError> {
        for _ in 0..MAX_SEQLOCK_RETRIES {
            let seq_before = seq_atomic(&self.mmap).load(Ordering::Acquire);
            let index = seq_before;
            let offset = self.buffer_offset(index);
            let len_offset = if index % 2 == 0 { LEN_A_OFFSET } else { LEN_B_OFFSET };
            let len = read_u64_at(&self.mmap, len_offset) as usize;

            if len == 0 || len > self.capacity_per_buffer {
                // Aun no se publico nada; devolver un snapshot vacio es valido.
                return Ok(PlantSnapshot::default());
            }

            let candidate = self.mmap[offset..offset + len].to_vec();
            fence(Ordering::Acquire);
            let seq_after = seq_atomic(&self.mmap).load(Ordering::Acquire);

            if seq_after == seq_before {
                return bincode::deserialize(&candidate).map_err(|e| IpcError::Codec(e.to_string()));
            }
        }
        Err(IpcError::PeerDetached)
    }

    pub fn schema_version(&self) -> u32 {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.mmap[SCHEMA_VERSION_OFFSET..SCHEMA_VERSION_OFFSET + 4]);
        u32::from_le_bytes(bytes)
    }
}

pub fn build_snapshot(registry: &hydroscada_domain_registry::RtuRegistry) -> PlantSnapshot {
    let devices = registry
        .list_devices()
        .into_iter()
        .map(|device| {
            let slots = registry.slots(&device.station_name).unwrap_or_default();
            let sensors = registry.device_sensors(&device.station_name).unwrap_or_default();
            let controls = registry.device_controls(&device.station_name).unwrap_or_default();
            DeviceSnapshot {
                connection_state: device.connection_state,
                device,
                slots,
                sensors,
                controls,
            }
        })
        .collect();

    PlantSnapshot { devices, published_at_epoch_millis: chrono::Utc::now().timestamp_millis() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn publish_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot.shm");
        let mut region = SnapshotRegion::open(&path, 4096).unwrap();

        let snapshot = PlantSnapshot { devices: vec![], published_at_epoch_millis: 42 };
        region.publish(&snapshot).unwrap();

        let read_back = region.read().unwrap();
        assert_eq!(read_back.published_at_epoch_millis, 42);
    }

    #[test]
    fn reopen_with_mismatched_schema_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot.shm");
        {
            let _region = SnapshotRegion::open(&path, 64).unwrap();
        }

        // Corrupt the schema version byte manually to simulate an old reader.
        let file = OpenOptions::new().write(true).open(&path).unwrap();
        let mut mmap = unsafe { MmapMut::map_mut(&file) }.unwrap();
        mmap[0..4].copy_from_slice(&99u32.to_le_bytes());
        mmap.flush().unwrap();

        let result = SnapshotRegion::open(&path, 64);
        assert!(matches!(result, Err(IpcError::SchemaMismatch { .. })));
    }

    #[test]
    fn snapshot_too_large_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot.shm");
        let mut region = SnapshotRegion::open(&path, 4).unwrap();

        let snapshot = PlantSnapshot { devices: vec![], published_at_epoch_millis: 1 };
        let result = region.publish(&snapshot);
        assert!(matches!(result, Err(IpcError::SnapshotTooLarge { .. })));
    }
}
