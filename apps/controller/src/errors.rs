// [apps/controller/src/errors.rs]
/*!
 * APARATO: CORE ERROR CATALOG
 * Union de los catalogos de error de cada crate del nucleo (spec.md S7).
 * Todo error conocido por el arbol de composicion aterriza aqui antes de
 * convertirse en un codigo de salida del proceso o en estado observable.
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("[CORE_CONFIG_FAULT]: CONFIG_INVALID -> {0}")]
    ConfigInvalid(String),

    #[error("[CORE_IO_FAULT]: INTERFACE_UNAVAILABLE -> {0}")]
    InterfaceUnavailable(String),

    #[error("[CORE_STORE_FAULT]: PERSISTENCE_UNAVAILABLE -> {0}")]
    PersistenceUnavailable(String),

    #[error("[CORE_IPC_FAULT]: IPC_INIT_FAILED -> {0}")]
    IpcInitFailed(String),

    #[error("[CORE_FATAL]: {0}")]
    Fatal(String),

    #[error(transparent)]
    Frame(#[from] hydroscada_core_frame::FrameError),

    #[error(transparent)]
    Ar(#[from] hydroscada_core_ar::ArError),

    #[error(transparent)]
    Controller(#[from] hydroscada_core_controller::ControllerError),

    #[error(transparent)]
    Registry(#[from] hydroscada_domain_registry::RegistryError),

    #[error(transparent)]
    Control(#[from] hydroscada_domain_control::ControlError),

    #[error(transparent)]
    Alarm(#[from] hydroscada_domain_alarms::AlarmError),

    #[error(transparent)]
    Historian(#[from] hydroscada_domain_historian::HistorianError),

    #[error(transparent)]
    Coordination(#[from] hydroscada_infra_coordination::CoordinationError),

    #[error(transparent)]
    Ipc(#[from] hydroscada_infra_ipc::IpcError),

    #[error(transparent)]
    Store(#[from] hydroscada_infra_store::StoreError),
}

/// Codigos de salida del proceso, segun la tabla de spec.md S6. Solo
/// `Fatal` (interfaz o memoria compartida inalcanzables al arrancar)
/// termina el proceso; todo lo demas se degrada a estado observable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Normal = 0,
    ConfigInvalid = 10,
    InterfaceUnavailable = 11,
    PersistentStoreUnreachable = 12,
    IpcInitFailed = 13,
    Fatal = 1,
}

impl From<&CoreError> for ExitCode {
    fn from(error: &CoreError) -> Self {
        match error {
            CoreError::ConfigInvalid(_) => ExitCode::ConfigInvalid,
            CoreError::InterfaceUnavailable(_) | CoreError::Frame(_) => ExitCode::InterfaceUnavailable,
            CoreError::PersistenceUnavailable(_) | CoreError::Store(_) => ExitCode::PersistentStoreUnreachable,
            CoreError::IpcInitFailed(_) | CoreError::Ipc(_) => ExitCode::IpcInitFailed,
            _ => ExitCode::Fatal,
        }
    }
}
