// [libs/domain/models/src/historian_tag.rs]
/*!
 * APARATO: HISTORIAN TAG RECORD
 * Configuracion y buffer en anillo de un punto historizado.
 */

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::channel::ChannelRef;
use crate::quality::Quality;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompressionPolicy {
    None,
    Deadband,
    SwingingDoor,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HistorianSample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub quality: Quality,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorianTag {
    pub source: ChannelRef,
    pub sample_rate_ms: u32,
    pub deadband: f64,
    /// Intervalo maximo sin archivar una muestra, aun si el deadband no se
    /// supero.
    pub max_interval_ms: u32,
    pub compression: CompressionPolicy,
    pub retention_days: u32,
    /// Buffer acotado en memoria, previo al flush al almacen persistente.
    pub ring: VecDeque<HistorianSample>,
    pub ring_capacity: usize,
    /// Ultimos dos puntos archivados, necesarios para la puerta oscilante.
    pub last_archived: Option<HistorianSample>,
    pub penultimate_archived: Option<HistorianSample>,
}

impl HistorianTag {
    pub fn new(source: ChannelRef, sample_rate_ms: u32, deadband: f64, max_interval_ms: u32, compression: CompressionPolicy, retention_days: u32, ring_capacity: usize) -> Self {
        Self {
            source,
            sample_rate_ms,
            deadband,
            max_interval_ms,
            compression,
            retention_days,
            ring: VecDeque::with_capacity(ring_capacity),
            ring_capacity,
            last_archived: None,
            penultimate_archived: None,
        }
    }

    /// Empuja una muestra al anillo, descartando la mas vieja si esta lleno.
    pub fn push_sample(&mut self, sample: HistorianSample) {
        if self.ring.len() == self.ring_capacity {
            self.ring.pop_front();
        }
        self.ring.push_back(sample);
    }
}
