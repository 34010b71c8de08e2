// [libs/domain/historian/src/engine.rs]
/*!
 * APARATO: HISTORIAN MANAGER
 * Ingesta comprimida, anillo acotado en memoria, consulta fusionada con
 * el almacen persistente, y barrido de retencion perezoso.
 *
 * El almacen persistente se recibe como puerto (`PersistentStore`), nunca
 * como dependencia directa de `hydroscada-infra-store`: el adaptador
 * concreto se inyecta desde el arbol de composicion (`apps/controller`).
 */

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use hydroscada_domain_models::{CompressionPolicy, HistorianSample, HistorianTag};
use tracing::{error, info, warn};

use crate::aggregation::{self, AggregateFn, Bucket};
use crate::compression::{self, SwingingDoor};
use crate::errors::HistorianError;

const RETENTION_SWEEP_INTERVAL: Duration = Duration::minutes(10);

/// Puerto hacia el almacen persistente. Implementado por el crate de
/// infraestructura de persistencia, inyectado en tiempo de arranque.
pub trait PersistentStore: Send + Sync {
    fn append_samples(&self, tag: &str, samples: &[HistorianSample]) -> Result<(), HistorianError>;
    fn query_range(&self, tag: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<HistorianSample>, HistorianError>;
    fn purge_older_than(&self, tag: &str, cutoff: DateTime<Utc>) -> Result<u64, HistorianError>;
}

pub struct HistorianManager {
    tags: RwLock<HashMap<String, HistorianTag>>,
    doors: RwLock<HashMap<String, SwingingDoor>>,
    store: Option<Arc<dyn PersistentStore>>,
    degraded: AtomicBool,
    pending_drain: RwLock<HashMap<String, Vec<HistorianSample>>>,
    last_retention_sweep: RwLock<DateTime<Utc>>,
}

impl HistorianManager {
    pub fn new(store: Option<Arc<dyn PersistentStore>>) -> Self {
        Self {
            tags: RwLock::new(HashMap::new()),
            doors: RwLock::new(HashMap::new()),
            store,
            degraded: AtomicBool::new(false),
            pending_drain: RwLock::new(HashMap::new()),
            last_retention_sweep: RwLock::new(Utc::now()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    pub fn register_tag(&self, tag: HistorianTag) -> Result<(), HistorianError> {
        let mut tags = self.tags.write().expect("LOCK_POISONED");
        if tags.contains_key(&tag.source.tag) {
            return Err(HistorianError::DuplicateTag(tag.source.tag));
        }
        tags.insert(tag.source.tag.clone(), tag);
        Ok(())
    }

    /// Nombres de todos los tags configurados, usados por el hilo Historian
    /// Flush para saber que sensores muestrear en cada ciclo de ingesta.
    pub fn tag_names(&self) -> Vec<String> {
        self.tags.read().expect("LOCK_POISONED").keys().cloned().collect()
    }

    /// Ingresa una nueva lectura cruda; aplica deadband/puerta oscilante y
    /// decide si se archiva. Devuelve `true` si la muestra fue archivada.
    pub fn ingest(&self, tag_name: &str, sample: HistorianSample) -> Result<bool, HistorianError> {
        let mut tags = self.tags.write().expect("LOCK_POISONED");
        let tag = tags.get_mut(tag_name).ok_or_else(|| HistorianError::UnknownTag(tag_name.to_string()))?;

        let to_archive = match tag.compression {
            CompressionPolicy::None => Some(sample),
            CompressionPolicy::Deadband => {
                if compression::is_candidate(&sample, tag.last_archived.as_ref(), tag.deadband, tag.max_interval_ms) {
                    Some(sample)
                } else {
                    None
                }
            }
            CompressionPolicy::SwingingDoor => {
                let mut doors = self.doors.write().expect("LOCK_POISONED");
                let door = doors.entry(tag_name.to_string()).or_insert_with(|| SwingingDoor::anchored_at(&sample));
                if tag.last_archived.is_none() {
                    Some(sample)
                } else {
                    door.evaluate(tag.deadband, sample)
                }
            }
        };

        let Some(point) = to_archive else { return Ok(false) };
        tag.penultimate_archived = tag.last_archived;
        tag.last_archived = Some(point);
        tag.push_sample(point);
        drop(tags);

        self.persist(tag_name, &[point]);
        Ok(true)
    }

    /// Encola `samples` tras cualquier muestra ya pendiente para ese tag y
    /// reintenta el lote completo, preservando el orden temporal de drenaje
    /// que exige la recuperacion tras una caida del almacen.
    fn persist(&self, tag_name: &str, samples: &[HistorianSample]) {
        let Some(store) = &self.store else { return };

        self.pending_drain.write().expect("LOCK_POISONED").entry(tag_name.to_string()).or_default().extend_from_slice(samples);
        let queued = self.pending_drain.write().expect("LOCK_POISONED").remove(tag_name).unwrap_or_default();

        match store.append_samples(tag_name, &queued) {
            Ok(()) => {
                if self.degraded.swap(false, Ordering::Relaxed) {
                    info!(tag_name, drained = queued.len(), "historian: drained queued samples after store recovery");
                }
            }
            Err(err) => {
                if !self.degraded.swap(true, Ordering::Relaxed) {
                    warn!(tag_name, %err, "historian: persistent store unavailable, entering degraded mode");
                } else {
                    error!(tag_name, %err, "historian: store still unavailable, requeuing");
                }
                self.pending_drain.write().expect("LOCK_POISONED").insert(tag_name.to_string(), queued);
            }
        }
    }

    /// Devuelve la serie en [from, to), fusionando el anillo en memoria con
    /// una unica consulta indexada al almacen persistente cuando `from`
    /// precede a la muestra mas vieja en memoria.
    pub fn query(&self, tag_name: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<HistorianSample>, HistorianError> {
        if from >= to {
            return Err(HistorianError::InvalidRange);
        }
        let tags = self.tags.read().expect("LOCK_POISONED");
        let tag = tags.get(tag_name).ok_or_else(|| HistorianError::UnknownTag(tag_name.to_string()))?;

        let in_memory: Vec<HistorianSample> = tag.ring.iter().filter(|s| s.timestamp >= from && s.timestamp < to).copied().collect();
        let oldest_in_memory = tag.ring.front().map(|s| s.timestamp);
        drop(tags);

        let mut series = Vec::new();
        if let Some(oldest) = oldest_in_memory {
            if from < oldest {
                if let Some(store) = &self.store {
                    match store.query_range(tag_name, from, oldest) {
                        Ok(mut prefix) => series.append(&mut prefix),
                        Err(err) => warn!(tag_name, %err, "historian: persistent range query failed, returning in-memory only"),
                    }
                }
            }
        } else if let Some(store) = &self.store {
            if let Ok(mut prefix) = store.query_range(tag_name, from, to) {
                series.append(&mut prefix);
            }
        }
        series.extend(in_memory);
        Ok(series)
    }

    pub fn aggregate(&self, tag_name: &str, from: DateTime<Utc>, to: DateTime<Utc>, bucket_width: Duration, function: AggregateFn) -> Result<Vec<Bucket>, HistorianError> {
        let series = self.query(tag_name, from, to)?;
        Ok(aggregation::aggregate(&series, from, to, bucket_width, function))
    }

    /// Barrido de retencion perezoso: se ejecuta como maximo cada
    /// `RETENTION_SWEEP_INTERVAL`, nunca en cada ciclo, para evitar una
    /// tormenta de escrituras a medianoche.
    pub fn sweep_retention(&self, now: DateTime<Utc>) {
        {
            let mut last = self.last_retention_sweep.write().expect("LOCK_POISONED");
            if now - *last < RETENTION_SWEEP_INTERVAL {
                return;
            }
            *last = now;
        }

        let mut tags = self.tags.write().expect("LOCK_POISONED");
        for tag in tags.values_mut() {
            let cutoff = now - Duration::days(tag.retention_days as i64);
            while matches!(tag.ring.front(), Some(s) if s.timestamp < cutoff) {
                tag.ring.pop_front();
            }
            if let Some(store) = &self.store {
                if let Err(err) = store.purge_older_than(&tag.source.tag, cutoff) {
                    warn!(tag_name = %tag.source.tag, %err, "historian: retention purge against store failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydroscada_domain_models::{ChannelRef, Quality};
    use std::sync::Mutex;

    struct FlakyStore {
        fail_next: Mutex<bool>,
        received: Mutex<Vec<HistorianSample>>,
    }

    impl PersistentStore for FlakyStore {
        fn append_samples(&self, _tag: &str, samples: &[HistorianSample]) -> Result<(), HistorianError> {
            if *self.fail_next.lock().unwrap() {
                return Err(HistorianError::StoreUnavailable("simulated outage".into()));
            }
            self.received.lock().unwrap().extend_from_slice(samples);
            Ok(())
        }
        fn query_range(&self, _tag: &str, _from: DateTime<Utc>, _to: DateTime<Utc>) -> Result<Vec<HistorianSample>, HistorianError> {
            Ok(Vec::new())
        }
        fn purge_older_than(&self, _tag: &str, _cutoff: DateTime<Utc>) -> Result<u64, HistorianError> {
            Ok(0)
        }
    }

    fn tag(name: &str, policy: CompressionPolicy) -> HistorianTag {
        HistorianTag::new(ChannelRef { station_name: "tank-1".into(), slot_number: 0, tag: name.into() }, 100, 0.5, 0, policy, 30, 100)
    }

    #[test]
    fn deadband_tag_skips_small_changes() {
        let manager = HistorianManager::new(None);
        manager.register_tag(tag("pH_1", CompressionPolicy::Deadband)).unwrap();
        let base = Utc::now();
        assert!(manager.ingest("pH_1", HistorianSample { timestamp: base, value: 7.0, quality: Quality::Good }).unwrap());
        assert!(!manager.ingest("pH_1", HistorianSample { timestamp: base + Duration::seconds(1), value: 7.1, quality: Quality::Good }).unwrap());
    }

    #[test]
    fn store_outage_sets_degraded_and_queues_samples() {
        let store = Arc::new(FlakyStore { fail_next: Mutex::new(true), received: Mutex::new(Vec::new()) });
        let manager = HistorianManager::new(Some(store.clone()));
        manager.register_tag(tag("pH_1", CompressionPolicy::None)).unwrap();
        manager.ingest("pH_1", HistorianSample { timestamp: Utc::now(), value: 1.0, quality: Quality::Good }).unwrap();
        assert!(manager.is_degraded());

        *store.fail_next.lock().unwrap() = false;
        manager.ingest("pH_1", HistorianSample { timestamp: Utc::now(), value: 2.0, quality: Quality::Good }).unwrap();
        assert!(!manager.is_degraded());
        assert_eq!(store.received.lock().unwrap().len(), 2);
    }

    #[test]
    fn retention_sweep_is_throttled() {
        let manager = HistorianManager::new(None);
        manager.register_tag(tag("pH_1", CompressionPolicy::None)).unwrap();
        let now = Utc::now();
        manager.sweep_retention(now);
        let recorded = *manager.last_retention_sweep.read().unwrap();
        manager.sweep_retention(now + Duration::minutes(1));
        assert_eq!(recorded, *manager.last_retention_sweep.read().unwrap());
    }
}
