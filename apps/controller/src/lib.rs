// [apps/controller/src/lib.rs]
/*!
 * =================================================================
 * APARATO: CONTROLLER LIBRARY ROOT
 * CLASIFICACIÓN: CRATE ROOT (ESTRATO L3)
 * RESPONSABILIDAD: DEFINICIÓN DEL ÁRBOL DE MÓDULOS DEL ARBOL DE COMPOSICIÓN
 *
 * VISION HIPER-HOLÍSTICA:
 * 1. MODULE HIERARCHY HARDENING: establece la autoridad unica de
 *    modulos, para que `crate::` se resuelva de forma determinista
 *    tanto en la libreria como en los binarios (`main`, `migrator`,
 *    `seed`).
 * 2. PUBLIC INTERFACE: expone `prelude` para reducir el acoplamiento
 *    en los puntos de entrada del binario.
 * =================================================================
 */

// --- ESTRATO DE CONFIGURACION Y ARRANQUE ---
/// Resolucion de configuracion: CLI > entorno > archivo > defaults.
pub mod config;
/// Fase de ignicion: construye y enlaza todos los subsistemas del nucleo.
pub mod context;
/// Catalogo unificado de errores y codigos de salida del proceso.
pub mod errors;
/// Despacho de comandos IPC drenados hacia el motor de dominio correspondiente.
pub mod commands;

// --- ESTRATO DE E/S FISICA Y CICLICA ---
/// Implementacion de `LinkLayer` sobre una interfaz de red real.
pub mod interface;
/// Puente entre los buffers ciclicos del AR Manager y el Registry tipado.
pub mod cyclic;
/// Drenaje del canal de tramas aciclicas (RPC/DCP/alarma) del Controller.
pub mod alarms_intake;

// --- ESTRATO DE DATOS DE DEMOSTRACION ---
/// Carga de guiones de escenario TOML para el modo de simulacion.
pub mod scenario;

/**
 * PRELUDIO DEL CONTROLADOR
 *
 * Reexportacion de los tipos necesarios para la ignicion minima del
 * proceso. Reduce el acoplamiento en `main.rs` y en los binarios auxiliares.
 */
pub mod prelude {
    pub use crate::config::{Config, RawArgs};
    pub use crate::context::RuntimeContext;
    pub use crate::errors::{CoreError, ExitCode};
}
