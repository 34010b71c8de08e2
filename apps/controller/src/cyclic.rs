// [apps/controller/src/cyclic.rs]
/*!
 * APARATO: CYCLIC I/O BRIDGE
 * Puente entre los buffers ciclicos del AR Manager (bytes de cable) y el
 * estado tipado del Registry (valores ingenieriles). Corre en el hilo
 * PROFINET IO, despues de `ProfinetController::process()`: decodifica la
 * ultima entrada latcheada de cada AR en RUN hacia el Registry, y
 * codifica los controles comandados del Registry hacia el buffer de
 * salida de cada AR para el siguiente `send_cyclic_output`.
 *
 * Tambien encapsula el descubrimiento inicial y el ciclo de reconexion
 * de cada AR: ambos usan el mismo `LinkLayer` que la E/S ciclica, asi
 * que viven junto a ella en vez de en un hilo aparte.
 */

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use hydroscada_core_ar::{ArError, ArEvent, ArManager};
use hydroscada_core_controller::ProfinetController;
use hydroscada_core_frame::{decode_sensor_field, dcp_discover, encode_actuator_field, input_buffer_len, output_buffer_len, LinkLayer};
use hydroscada_domain_models::{ArState, ControlKind};
use hydroscada_domain_registry::RtuRegistry;
use pnet::util::MacAddr;
use tracing::{debug, info, warn};

/// Recorre el resultado de un descubrimiento DCP y conecta cada estacion
/// ya conocida por el Registry (layout de slots hidratado desde el
/// almacen persistente) hasta RUN, sin esperar una negociacion RPC real
/// -- un dispositivo ya provisionado no necesita renegociar su layout,
/// solo confirmar que sigue vivo en la red (spec.md S4.2/S4.9).
pub fn discover_and_connect_known_devices(
    link: &Arc<dyn LinkLayer>,
    registry: &RtuRegistry,
    ar_manager: &ArManager,
    controller: &ProfinetController,
    station_macs: &RwLock<HashMap<String, MacAddr>>,
    discovery_timeout: Duration,
) {
    let replies = match dcp_discover(Arc::clone(link), discovery_timeout) {
        Ok(rx) => rx,
        Err(err) => {
            warn!(error = %err, "cyclic: dcp discovery failed to start");
            return;
        }
    };

    for reply in replies.iter() {
        let station_name = reply.station_name.clone();
        if station_name.is_empty() {
            continue;
        }
        if registry.device(&station_name).is_none() {
            debug!(station = %station_name, "cyclic: discovered station has no hydrated device record, skipping");
            continue;
        }

        let sensor_count = registry.device_sensors(&station_name).map(|v| v.len()).unwrap_or(0);
        let control_count = registry.device_controls(&station_name).map(|v| v.len()).unwrap_or(0);
        if sensor_count == 0 && control_count == 0 {
            debug!(station = %station_name, "cyclic: discovered station has no slot layout yet, skipping connect");
            continue;
        }

        if !ar_manager.try_acquire_connecting_slot() {
            debug!(station = %station_name, "cyclic: another AR is already connecting, deferring");
            continue;
        }
        let connected = connect_station(ar_manager, &station_name, input_buffer_len(sensor_count), output_buffer_len(control_count));
        ar_manager.release_connecting_slot();

        if connected {
            controller.bind_station(reply.mac, station_name.clone());
            station_macs.write().expect("LOCK_POISONED").insert(station_name.clone(), reply.mac);
            let _ = registry.transition_device(&station_name, hydroscada_domain_models::DeviceConnectionState::Running, "AR_ESTABLISHED");
            info!(station = %station_name, mac = %reply.mac, "cyclic: station connected and bound");
        }
    }
}

/// Camina la maquina de estados de un AR recien descubierto hasta RUN.
/// Un dispositivo ya provisionado cruza esta secuencia sin intervencion
/// de un operador porque su layout ya fue aceptado en una sesion previa.
fn connect_station(ar_manager: &ArManager, station_name: &str, input_len: usize, output_len: usize) -> bool {
    if ar_manager.state_of(station_name).is_none() {
        ar_manager.register(station_name, session_key_for(station_name), 0, input_len, output_len);
    }
    let events = [ArEvent::OperatorConnect, ArEvent::DeviceConnectConfirm, ArEvent::ParametersWritten, ArEvent::ParameterEnd, ArEvent::FirstCyclicFrame];
    for event in events {
        match ar_manager.apply_event(station_name, event) {
            Ok(ArState::Run) => return true,
            Ok(_) => continue,
            Err(err) => {
                warn!(station = %station_name, error = %err, "cyclic: AR connect sequence failed");
                return false;
            }
        }
    }
    ar_manager.state_of(station_name) == Some(ArState::Run)
}

/// Revisa el watchdog de cada AR conocido y, si expiro, marca el
/// dispositivo degradado en el Registry (invariante de calidad:
/// sensores caen a NOT_CONNECTED) y programa la reconexion siguiendo el
/// backoff exponencial acotado del AR Manager.
pub fn service_watchdogs(ar_manager: &ArManager, registry: &RtuRegistry, station_macs: &RwLock<HashMap<String, MacAddr>>, watchdog_factor: u32, cycle_time: Duration) {
    let stations: Vec<String> = station_macs.read().expect("LOCK_POISONED").keys().cloned().collect();
    for station_name in stations {
        match ar_manager.check_watchdog(&station_name, watchdog_factor, cycle_time) {
            Ok(Some(ArState::Abort)) => {
                warn!(station = %station_name, "cyclic: watchdog expired, aborting AR");
                let _ = registry.transition_device(&station_name, hydroscada_domain_models::DeviceConnectionState::Error, "WATCHDOG_TIMEOUT");
                let delay = ar_manager.next_reconnect_delay(&station_name);
                debug!(station = %station_name, delay_ms = delay.as_millis(), "cyclic: reconnect scheduled");
            }
            Ok(_) => {}
            Err(ArError::UnknownSlot(_)) => {}
            Err(err) => warn!(station = %station_name, error = %err, "cyclic: watchdog check failed"),
        }
    }
}

/// Decodifica la ultima entrada ciclica latcheada de `station_name` hacia
/// el Registry, sensor por sensor, en el mismo orden ascendente de slot
/// y tag que asumio el dispositivo al construir la trama.
pub fn pump_input(ar_manager: &ArManager, registry: &RtuRegistry, station_name: &str) {
    if ar_manager.state_of(station_name) != Some(ArState::Run) {
        return;
    }
    let Ok(sensors) = registry.device_sensors(station_name) else { return };
    let Ok(view) = ar_manager.read_input(station_name) else { return };

    for (index, sensor) in sensors.iter().enumerate() {
        match decode_sensor_field(&view, index) {
            Some((raw_value, quality)) => {
                if let Err(err) = registry.apply_sensor_reading(&sensor.tag, raw_value, quality) {
                    debug!(tag = %sensor.tag, error = %err, "cyclic: failed to apply decoded sensor reading");
                }
            }
            None => debug!(station = %station_name, tag = %sensor.tag, "cyclic: input view shorter than declared sensor layout"),
        }
    }
}

/// Codifica los controles comandados del Registry hacia el buffer de
/// salida de `station_name`, listo para que `send_cyclic_output` lo
/// transmita en el siguiente ciclo.
pub fn pump_output(ar_manager: &ArManager, registry: &RtuRegistry, station_name: &str) {
    if ar_manager.state_of(station_name) != Some(ArState::Run) {
        return;
    }
    let Ok(controls) = registry.device_controls(station_name) else { return };

    let mut payload = Vec::with_capacity(controls.len() * 2);
    for control in &controls {
        let (command, duty) = encode_actuator(control.kind, control.commanded_value, control.range_min, control.range_max);
        encode_actuator_field(&mut payload, command, duty);
    }
    if let Err(err) = ar_manager.write_output(station_name, &payload) {
        debug!(station = %station_name, error = %err, "cyclic: failed to write encoded actuator output");
    }
}

/// Deriva una clave de sesion estable a partir del nombre de estacion.
/// No necesita ser impredecible -- solo distinguir sesiones sucesivas
/// del mismo AR en los contadores de diagnostico (spec.md S4.2).
fn session_key_for(station_name: &str) -> u32 {
    let mut hasher = DefaultHasher::new();
    station_name.hash(&mut hasher);
    (hasher.finish() & 0xFFFF_FFFF) as u32
}

fn encode_actuator(kind: ControlKind, commanded_value: f64, range_min: f64, range_max: f64) -> (u8, u8) {
    match kind {
        ControlKind::Discrete => (if commanded_value != 0.0 { 1 } else { 0 }, 0),
        ControlKind::Analog => {
            let span = (range_max - range_min).max(f64::EPSILON);
            let fraction = ((commanded_value - range_min) / span).clamp(0.0, 1.0);
            (2, (fraction * 255.0).round() as u8)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discrete_actuator_encodes_on_off() {
        assert_eq!(encode_actuator(ControlKind::Discrete, 1.0, 0.0, 1.0), (1, 0));
        assert_eq!(encode_actuator(ControlKind::Discrete, 0.0, 0.0, 1.0), (0, 0));
    }

    #[test]
    fn analog_actuator_encodes_duty_from_range() {
        let (command, duty) = encode_actuator(ControlKind::Analog, 50.0, 0.0, 100.0);
        assert_eq!(command, 2);
        assert!((duty as i16 - 128).abs() <= 1);
    }
}
