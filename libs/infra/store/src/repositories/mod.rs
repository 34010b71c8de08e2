// [libs/infra/store/src/repositories/mod.rs]
/*!
 * Repositorios de persistencia, uno por agrupacion de tablas del
 * esquema relacional (spec.md S6).
 */

pub mod alarm_repository;
pub mod diagnostics_repository;
pub mod historian_repository;
pub mod pid_repository;
pub mod rtu_repository;

pub use alarm_repository::AlarmRepository;
pub use diagnostics_repository::{DiagnosticRecord, DiagnosticsRepository};
pub use historian_repository::HistorianRepository;
pub use pid_repository::PidRepository;
pub use rtu_repository::RtuRepository;
