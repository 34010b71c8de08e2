// [libs/infra/simulator/src/lib.rs]
/*!
 * Sustituto enteramente en memoria del stack PROFINET real. Implementa
 * `LinkLayer` (el mismo contrato que un socket crudo) para que el Frame
 * Engine, el AR Manager y el Controller no puedan distinguir esta
 * interfaz de una tarjeta de red fisica; las capas superiores del
 * nucleo son por tanto ajenas a la sustitucion (spec.md S4.9).
 */

pub mod errors;
pub mod link;
pub mod plant;
pub mod processes;

pub use errors::SimulatorError;
pub use link::{is_identify_request, DeviceDriver, SimulatedDeviceAnnouncement, SimulatedLink};
pub use plant::{ActuatorState, ControlSpec, PlantCoupling, SensorSpec, SimulatedStation, SlotSpec, StationSpec};
pub use processes::{ScenarioStep, SensorProcess};
