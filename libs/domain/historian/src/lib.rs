// [libs/domain/historian/src/lib.rs]
/*!
 * Historian: compresion deadband/puerta-oscilante, anillo acotado en
 * memoria, agregacion por buckets con huecos explicitos, y barrido de
 * retencion perezoso. El almacen persistente se recibe
 * como puerto (`PersistentStore`) inyectado desde el arbol de composicion.
 */

pub mod aggregation;
pub mod compression;
pub mod engine;
pub mod errors;

pub use aggregation::{AggregateFn, Bucket, QualityHistogram};
pub use engine::{HistorianManager, PersistentStore};
pub use errors::HistorianError;
