// [libs/infra/store/src/repositories/diagnostics_repository.rs]
/*!
 * APARATO: DIAGNOSTICS REPOSITORY
 * Persistencia de `profinet_diagnostics` (spec.md S6): contadores de
 * trama descartada, overruns de ciclo y demas eventos de diagnostico
 * que el Controller y el AR Manager reportan pero que no pertenecen al
 * modelo de alarmas operativo.
 */

use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::client::StoreClient;
use crate::errors::StoreError;

#[derive(Debug, Clone)]
pub struct DiagnosticRecord {
    pub station_name: String,
    pub timestamp: DateTime<Utc>,
    pub category: String,
    pub message: String,
}

pub struct DiagnosticsRepository<'a> {
    client: &'a StoreClient,
}

impl<'a> DiagnosticsRepository<'a> {
    pub fn new(client: &'a StoreClient) -> Self {
        Self { client }
    }

    pub fn record(&self, station_name: &str, category: &str, message: &str) -> Result<(), StoreError> {
        self.client.with_connection(|conn| {
            conn.execute(
                "INSERT INTO profinet_diagnostics (station_name, timestamp, category, message) VALUES (?1, ?2, ?3, ?4)",
                params![station_name, Utc::now().to_rfc3339(), category, message],
            )?;
            Ok(())
        })
    }

    pub fn recent(&self, station_name: &str, limit: u32) -> Result<Vec<DiagnosticRecord>, StoreError> {
        self.client.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT station_name, timestamp, category, message FROM profinet_diagnostics WHERE station_name = ?1 ORDER BY timestamp DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![station_name, limit], |row| {
                let timestamp: String = row.get(1)?;
                Ok(DiagnosticRecord {
                    station_name: row.get(0)?,
                    timestamp: DateTime::parse_from_rfc3339(&timestamp).map(|d| d.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now()),
                    category: row.get(2)?,
                    message: row.get(3)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_are_returned_most_recent_first() {
        let client = StoreClient::open_in_memory().unwrap();
        let repo = DiagnosticsRepository::new(&client);
        repo.record("tank-1", "WATCHDOG", "RTU Communication Failure: tank-1").unwrap();
        repo.record("tank-1", "FRAME_DROP", "bad CRC").unwrap();
        let records = repo.recent("tank-1", 10).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].category, "FRAME_DROP");
    }
}
