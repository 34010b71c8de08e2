// [apps/controller/src/config.rs]
/*!
 * APARATO: CONFIGURATION LAYER
 * Precedencia CLI > entorno > archivo > valores por defecto (spec.md S9
 * REDESIGN FLAGS #3). `RawArgs` (clap, estrato CLI+entorno) se combina
 * con un `FileConfig` (toml, opcional) y los valores compilados por
 * defecto en una unica resolucion antes de construir cualquier
 * subsistema.
 */

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;

use crate::errors::CoreError;

#[derive(Parser, Debug)]
#[command(name = "hydroscada-controller", version, about = "PROFINET IO Controller Core")]
pub struct RawArgs {
    /// Ruta a un archivo de configuracion TOML opcional.
    #[arg(long, env = "HYDROSCADA_CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    /// Nombre de la interfaz de red fisica (ignorado en modo simulacion).
    #[arg(long, env = "HYDROSCADA_INTERFACE")]
    pub interface: Option<String>,

    /// Tiempo de ciclo en milisegundos (minimo 1ms per spec.md S6).
    #[arg(long, env = "HYDROSCADA_CYCLE_TIME_MS")]
    pub cycle_time_ms: Option<u64>,

    /// Ruta del archivo SQLite del almacen persistente.
    #[arg(long, env = "HYDROSCADA_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Activa el sustituto en memoria del stack PROFINET (spec.md S4.9).
    #[arg(long, env = "HYDROSCADA_SIMULATION_MODE")]
    pub simulation_mode: Option<bool>,

    /// Ruta de un guion de escenario TOML para el simulador.
    #[arg(long, env = "HYDROSCADA_SIMULATION_SCENARIO")]
    pub simulation_scenario: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    interface: Option<String>,
    cycle_time_ms: Option<u64>,
    database_url: Option<String>,
    simulation_mode: Option<bool>,
    simulation_scenario: Option<PathBuf>,
    base_reconnect_delay_ms: Option<u64>,
    max_reconnect_delay_ms: Option<u64>,
    watchdog_factor: Option<u32>,
    ipc_name: Option<String>,
    historian_flush_interval_ms: Option<u64>,
    retention_sweep_interval_secs: Option<u64>,
    force_claim_stall_secs: Option<u64>,
    breaker_failure_threshold: Option<u32>,
    breaker_cooldown_secs: Option<u64>,
}

/// Configuracion completamente resuelta. Construida una sola vez, al
/// arranque, antes de que cualquier hilo se levante.
#[derive(Debug, Clone)]
pub struct Config {
    pub interface: String,
    pub cycle_time_ms: u64,
    pub database_url: String,
    pub simulation_mode: bool,
    pub simulation_scenario: Option<PathBuf>,
    pub base_reconnect_delay_ms: u64,
    pub max_reconnect_delay_ms: u64,
    pub watchdog_factor: u32,
    pub ipc_name: String,
    pub historian_flush_interval_ms: u64,
    pub retention_sweep_interval_secs: u64,
    pub force_claim_stall_secs: u64,
    pub breaker_failure_threshold: u32,
    pub breaker_cooldown_secs: u64,
}

impl Config {
    /// Resuelve la configuracion combinando CLI, entorno (ya fusionado
    /// dentro de `RawArgs` por `clap`'s `env`), archivo y defaults, en
    /// ese orden de precedencia.
    pub fn resolve(args: RawArgs) -> Result<Self, CoreError> {
        let file = match &args.config_file {
            Some(path) => load_file_config(path)?,
            None => FileConfig::default(),
        };

        let simulation_mode = args.simulation_mode.or(file.simulation_mode).unwrap_or(false);

        let interface = args.interface.or(file.interface).unwrap_or_else(|| "eth0".to_string());
        if !simulation_mode && interface.trim().is_empty() {
            return Err(CoreError::ConfigInvalid("interface name is required when simulation_mode is false".into()));
        }

        let cycle_time_ms = args.cycle_time_ms.or(file.cycle_time_ms).unwrap_or(4);
        if cycle_time_ms == 0 {
            return Err(CoreError::ConfigInvalid("cycle_time_ms must be at least 1ms (spec.md S6)".into()));
        }

        let database_url = args
            .database_url
            .or(file.database_url)
            .ok_or_else(|| CoreError::ConfigInvalid("database_url is required (HYDROSCADA_DATABASE_URL or config file)".into()))?;

        Ok(Self {
            interface,
            cycle_time_ms,
            database_url,
            simulation_mode,
            simulation_scenario: args.simulation_scenario.or(file.simulation_scenario),
            base_reconnect_delay_ms: file.base_reconnect_delay_ms.unwrap_or(500),
            max_reconnect_delay_ms: file.max_reconnect_delay_ms.unwrap_or(30_000),
            watchdog_factor: file.watchdog_factor.unwrap_or(3),
            ipc_name: file.ipc_name.unwrap_or_else(|| "hydroscada-controller".to_string()),
            historian_flush_interval_ms: file.historian_flush_interval_ms.unwrap_or(1_000),
            retention_sweep_interval_secs: file.retention_sweep_interval_secs.unwrap_or(600),
            force_claim_stall_secs: file.force_claim_stall_secs.unwrap_or(15),
            breaker_failure_threshold: file.breaker_failure_threshold.unwrap_or(5),
            breaker_cooldown_secs: file.breaker_cooldown_secs.unwrap_or(30),
        })
    }

}

fn load_file_config(path: &PathBuf) -> Result<FileConfig, CoreError> {
    let raw = fs::read_to_string(path).map_err(|e| CoreError::ConfigInvalid(format!("cannot read config file {}: {e}", path.display())))?;
    toml::from_str(&raw).map_err(|e| CoreError::ConfigInvalid(format!("malformed config file {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_args() -> RawArgs {
        RawArgs { config_file: None, interface: None, cycle_time_ms: None, database_url: None, simulation_mode: None, simulation_scenario: None }
    }

    #[test]
    fn missing_database_url_is_config_invalid() {
        let args = bare_args();
        let result = Config::resolve(args);
        assert!(matches!(result, Err(CoreError::ConfigInvalid(_))));
    }

    #[test]
    fn simulation_mode_does_not_require_a_real_interface() {
        let mut args = bare_args();
        args.simulation_mode = Some(true);
        args.database_url = Some(":memory:".to_string());
        let config = Config::resolve(args).unwrap();
        assert!(config.simulation_mode);
        assert_eq!(config.cycle_time_ms, 4);
    }

    #[test]
    fn zero_cycle_time_is_rejected() {
        let mut args = bare_args();
        args.database_url = Some(":memory:".to_string());
        args.cycle_time_ms = Some(0);
        assert!(Config::resolve(args).is_err());
    }
}
