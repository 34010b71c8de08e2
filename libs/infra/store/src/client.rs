// [libs/infra/store/src/client.rs]
/*!
 * APARATO: STORE CLIENT
 * Enlace sincrono al almacen persistente embebido. Un unico escritor
 * (el nucleo); la conexion se guarda tras un Mutex porque
 * `rusqlite::Connection` no es `Sync` y el acceso concurrente desde los
 * hilos de Historian Flush / IPC Writer debe serializarse igualmente.
 */

use std::sync::Mutex;

use rusqlite::Connection;
use tracing::{info, instrument};

use crate::errors::StoreError;
use crate::schema;

pub struct StoreClient {
    connection: Mutex<Connection>,
}

impl StoreClient {
    /// Abre (o crea) el archivo SQLite en `path` y aplica el esquema.
    #[instrument]
    pub fn open(path: &str) -> Result<Self, StoreError> {
        info!(path, "store: opening connection");
        let connection = Connection::open(path).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        connection.pragma_update(None, "journal_mode", "WAL").map_err(|e| StoreError::Unavailable(e.to_string()))?;
        schema::apply_schema(&connection)?;
        Ok(Self { connection: Mutex::new(connection) })
    }

    /// Abre una base de datos en memoria (compartida entre hilos del
    /// proceso). Usada por la suite de pruebas y por el modo `simulation`.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let connection = Connection::open_in_memory().map_err(|e| StoreError::Unavailable(e.to_string()))?;
        schema::apply_schema(&connection)?;
        Ok(Self { connection: Mutex::new(connection) })
    }

    pub(crate) fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> Result<T, StoreError>) -> Result<T, StoreError> {
        let guard = self.connection.lock().map_err(|_| StoreError::Unavailable("LOCK_POISONED".into()))?;
        f(&guard)
    }
}
