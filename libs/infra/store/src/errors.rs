// [libs/infra/store/src/errors.rs]
/*!
 * APARATO: STORE ERROR CATALOG
 * Fallos de persistencia relacional. Ninguno de estos es fatal para el
 * proceso: el Historian/Registry se degradan a modo solo-memoria cuando
 * el almacen es inalcanzable (spec.md S7).
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("[STORE_CONN_FAULT]: PERSISTENCE_UNAVAILABLE -> {0}")]
    Unavailable(String),

    #[error("[STORE_SCHEMA_FAULT]: BOOTSTRAP_FAILED -> {0}")]
    SchemaBootstrap(String),

    #[error("[STORE_QUERY_FAULT]: {0}")]
    Query(String),

    #[error("[STORE_NOT_FOUND]: {0}")]
    NotFound(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Query(err.to_string())
    }
}

impl From<StoreError> for hydroscada_domain_historian::HistorianError {
    fn from(err: StoreError) -> Self {
        hydroscada_domain_historian::HistorianError::StoreUnavailable(err.to_string())
    }
}
