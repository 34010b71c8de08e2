// [libs/infra/store/src/lib.rs]
/*!
 * Adaptador de persistencia relacional para el nucleo del controlador.
 * Respalda el esquema descrito en spec.md S6 (`rtus`, `slots`, `sensors`,
 * `controls`, `alarm_rules`, `alarm_events`, `shelved_alarms`,
 * `pid_loops`, `historian_tags`, `historian_samples`,
 * `profinet_diagnostics`) sobre SQLite embebido via `rusqlite`.
 *
 * Este crate nunca se referencia directamente desde `hydroscada-domain-*`:
 * donde un motor de dominio necesita persistencia (el Historian), expone
 * un puerto (`PersistentStore`) que este crate implementa; el arbol de
 * composicion (`apps/controller`) es quien conecta ambos lados.
 */

pub mod client;
pub mod errors;
pub mod repositories;
pub mod schema;

pub use client::StoreClient;
pub use errors::StoreError;
pub use repositories::{AlarmRepository, DiagnosticsRepository, HistorianRepository, PidRepository, RtuRepository};
