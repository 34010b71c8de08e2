// [libs/infra/store/src/repositories/historian_repository.rs]
/*!
 * APARATO: HISTORIAN REPOSITORY
 * Implementa el puerto `PersistentStore` que `hydroscada-domain-historian`
 * define, respaldando `historian_samples` indexada por (sensor_id,
 * timestamp) (spec.md S6). El motor de Historian consulta este
 * repositorio solo cuando el rango pedido precede a la muestra mas vieja
 * en memoria (spec.md S4.6).
 */

use std::sync::Arc;

use chrono::{DateTime, Utc};
use hydroscada_domain_historian::{HistorianError, PersistentStore};
use hydroscada_domain_models::{ChannelRef, CompressionPolicy, HistorianSample, HistorianTag};
use rusqlite::params;

use crate::client::StoreClient;
use crate::errors::StoreError;

fn quality_to_str(quality: hydroscada_domain_models::Quality) -> &'static str {
    match quality {
        hydroscada_domain_models::Quality::Good => "GOOD",
        hydroscada_domain_models::Quality::Uncertain => "UNCERTAIN",
        hydroscada_domain_models::Quality::Bad => "BAD",
        hydroscada_domain_models::Quality::NotConnected => "NOT_CONNECTED",
    }
}

fn quality_from_str(value: &str) -> hydroscada_domain_models::Quality {
    match value {
        "GOOD" => hydroscada_domain_models::Quality::Good,
        "UNCERTAIN" => hydroscada_domain_models::Quality::Uncertain,
        "BAD" => hydroscada_domain_models::Quality::Bad,
        _ => hydroscada_domain_models::Quality::NotConnected,
    }
}

fn compression_to_str(policy: CompressionPolicy) -> &'static str {
    match policy {
        CompressionPolicy::None => "NONE",
        CompressionPolicy::Deadband => "DEADBAND",
        CompressionPolicy::SwingingDoor => "SWINGING_DOOR",
    }
}

fn compression_from_str(value: &str) -> CompressionPolicy {
    match value {
        "DEADBAND" => CompressionPolicy::Deadband,
        "SWINGING_DOOR" => CompressionPolicy::SwingingDoor,
        _ => CompressionPolicy::None,
    }
}

pub struct HistorianRepository {
    client: Arc<StoreClient>,
}

impl HistorianRepository {
    /// Toma el `StoreClient` compartido (no uno propio) para que el arbol
    /// de composicion pueda reutilizar la misma conexion que los demas
    /// repositorios sin duplicar el archivo SQLite.
    pub fn new(client: Arc<StoreClient>) -> Self {
        Self { client }
    }

    /// Persiste la configuracion del tag (no el anillo en memoria, que es
    /// exclusivo del `HistorianManager`); usado al registrar un tag nuevo
    /// y para reconstruir la configuracion en un reinicio del proceso.
    pub fn upsert_tag_config(&self, tag: &HistorianTag) -> Result<(), StoreError> {
        self.client.with_connection(|conn| {
            conn.execute(
                "INSERT INTO historian_tags (tag, station_name, slot_number, sample_rate_ms, deadband, max_interval_ms, compression, retention_days, ring_capacity)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(tag) DO UPDATE SET
                    sample_rate_ms = excluded.sample_rate_ms, deadband = excluded.deadband, max_interval_ms = excluded.max_interval_ms,
                    compression = excluded.compression, retention_days = excluded.retention_days, ring_capacity = excluded.ring_capacity",
                params![
                    tag.source.tag,
                    tag.source.station_name,
                    tag.source.slot_number,
                    tag.sample_rate_ms,
                    tag.deadband,
                    tag.max_interval_ms,
                    compression_to_str(tag.compression),
                    tag.retention_days,
                    tag.ring_capacity as u32,
                ],
            )?;
            Ok(())
        })
    }

    pub fn list_tag_configs(&self) -> Result<Vec<HistorianTag>, StoreError> {
        self.client.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT tag, station_name, slot_number, sample_rate_ms, deadband, max_interval_ms, compression, retention_days, ring_capacity FROM historian_tags",
            )?;
            let rows = stmt.query_map([], |row| {
                let compression: String = row.get(6)?;
                let ring_capacity: u32 = row.get(8)?;
                Ok(HistorianTag::new(
                    ChannelRef { station_name: row.get(1)?, slot_number: row.get(2)?, tag: row.get(0)? },
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    compression_from_str(&compression),
                    row.get(7)?,
                    ring_capacity as usize,
                ))
            })?;
            rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
        })
    }

    fn append(&self, tag: &str, samples: &[HistorianSample]) -> Result<(), StoreError> {
        self.client.with_connection(|conn| {
            for sample in samples {
                conn.execute(
                    "INSERT INTO historian_samples (sensor_id, timestamp, value, quality) VALUES (?1, ?2, ?3, ?4)",
                    params![tag, sample.timestamp.to_rfc3339(), sample.value, quality_to_str(sample.quality)],
                )?;
            }
            Ok(())
        })
    }

    fn range(&self, tag: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<HistorianSample>, StoreError> {
        self.client.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT timestamp, value, quality FROM historian_samples WHERE sensor_id = ?1 AND timestamp >= ?2 AND timestamp < ?3 ORDER BY timestamp ASC",
            )?;
            let rows = stmt.query_map(params![tag, from.to_rfc3339(), to.to_rfc3339()], |row| {
                let timestamp: String = row.get(0)?;
                let quality: String = row.get(2)?;
                Ok(HistorianSample {
                    timestamp: DateTime::parse_from_rfc3339(&timestamp).map(|d| d.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now()),
                    value: row.get(1)?,
                    quality: quality_from_str(&quality),
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
        })
    }

    fn purge(&self, tag: &str, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        self.client.with_connection(|conn| {
            let affected = conn.execute("DELETE FROM historian_samples WHERE sensor_id = ?1 AND timestamp < ?2", params![tag, cutoff.to_rfc3339()])?;
            Ok(affected as u64)
        })
    }
}

impl PersistentStore for HistorianRepository {
    fn append_samples(&self, tag: &str, samples: &[HistorianSample]) -> Result<(), HistorianError> {
        self.append(tag, samples).map_err(Into::into)
    }

    fn query_range(&self, tag: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<HistorianSample>, HistorianError> {
        self.range(tag, from, to).map_err(Into::into)
    }

    fn purge_older_than(&self, tag: &str, cutoff: DateTime<Utc>) -> Result<u64, HistorianError> {
        self.purge(tag, cutoff).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use hydroscada_domain_models::Quality;

    #[test]
    fn appended_samples_are_returned_in_range_order() {
        let repo = HistorianRepository::new(Arc::new(StoreClient::open_in_memory().unwrap()));
        let base = Utc::now();
        repo.append_samples("pH_1", &[
            HistorianSample { timestamp: base, value: 7.0, quality: Quality::Good },
            HistorianSample { timestamp: base + Duration::seconds(1), value: 7.1, quality: Quality::Good },
        ]).unwrap();

        let series = repo.query_range("pH_1", base - Duration::seconds(1), base + Duration::seconds(10)).unwrap();
        assert_eq!(series.len(), 2);
        assert!(series[0].timestamp <= series[1].timestamp);
    }

    #[test]
    fn tag_config_roundtrips() {
        let repo = HistorianRepository::new(Arc::new(StoreClient::open_in_memory().unwrap()));
        let tag = HistorianTag::new(
            ChannelRef { station_name: "tank-1".into(), slot_number: 1, tag: "pH_SENSOR_1".into() },
            1000, 0.05, 60_000, hydroscada_domain_models::CompressionPolicy::Deadband, 30, 1000,
        );
        repo.upsert_tag_config(&tag).unwrap();
        let configs = repo.list_tag_configs().unwrap();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].source.tag, "pH_SENSOR_1");
        assert_eq!(configs[0].ring_capacity, 1000);
    }

    #[test]
    fn purge_removes_only_samples_before_cutoff() {
        let repo = HistorianRepository::new(Arc::new(StoreClient::open_in_memory().unwrap()));
        let base = Utc::now();
        repo.append_samples("pH_1", &[
            HistorianSample { timestamp: base - Duration::days(40), value: 1.0, quality: Quality::Good },
            HistorianSample { timestamp: base, value: 2.0, quality: Quality::Good },
        ]).unwrap();

        let purged = repo.purge_older_than("pH_1", base - Duration::days(30)).unwrap();
        assert_eq!(purged, 1);
        assert_eq!(repo.query_range("pH_1", base - Duration::days(60), base + Duration::days(1)).unwrap().len(), 1);
    }
}
