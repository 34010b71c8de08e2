// [apps/controller/src/scenario.rs]
/*!
 * APARATO: SIMULATION SCENARIO LOADER
 * Traduce un guion TOML declarativo (estaciones, slots, sensores,
 * controles y sus procesos estocasticos) a los tipos de
 * `hydroscada_infra_simulator`, que por diseno no derivan
 * `serde::Deserialize` (viven detras del mismo puerto `LinkLayer` que un
 * socket crudo y no deberian acoplarse a un formato de archivo).
 */

use std::path::Path;
use std::time::Duration;

use hydroscada_infra_simulator::{ControlSpec, PlantCoupling, ScenarioStep, SensorProcess, SensorSpec, SlotSpec, StationSpec};
use pnet::util::MacAddr;
use serde::Deserialize;

use crate::errors::CoreError;

#[derive(Debug, Deserialize)]
struct ScenarioFile {
    #[serde(default)]
    station: Vec<ScenarioStation>,
}

#[derive(Debug, Deserialize)]
struct ScenarioStation {
    name: String,
    mac: String,
    #[serde(default)]
    slot: Vec<ScenarioSlot>,
}

#[derive(Debug, Deserialize)]
struct ScenarioSlot {
    slot_number: u16,
    #[serde(default)]
    sensor: Vec<ScenarioSensor>,
    #[serde(default)]
    control: Vec<ScenarioControl>,
}

#[derive(Debug, Deserialize)]
struct ScenarioSensor {
    tag: String,
    initial_value: f64,
    process: ScenarioProcess,
    #[serde(default)]
    coupled_to: Option<ScenarioCoupling>,
}

#[derive(Debug, Deserialize)]
struct ScenarioCoupling {
    control_tag: String,
    gain: f64,
    response_latency_ms: u64,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ScenarioProcess {
    RandomWalk { min: f64, max: f64, step_std_dev: f64 },
    Sinusoid { center: f64, amplitude: f64, period_ms: u64, phase_offset: f64 },
    Scenario { steps: Vec<ScenarioStepFile> },
}

#[derive(Debug, Deserialize)]
struct ScenarioStepFile {
    hold_ms: u64,
    value: f64,
}

#[derive(Debug, Deserialize)]
struct ScenarioControl {
    tag: String,
    #[serde(default)]
    interlocked: bool,
}

/// Carga y valida un guion de escenario, devolviendo especificaciones
/// listas para `SimulatedLink::add_station`. Un MAC malformado o un
/// archivo inexistente se reporta como `ConfigInvalid`, nunca como
/// `Fatal`: un escenario invalido deja el simulador sin estaciones, no
/// aborta el proceso (spec.md S7, `DeviceUnreachable` no cascada).
pub fn load_scenario(path: &Path) -> Result<Vec<StationSpec>, CoreError> {
    let raw = std::fs::read_to_string(path).map_err(|e| CoreError::ConfigInvalid(format!("cannot read scenario {}: {e}", path.display())))?;
    let file: ScenarioFile = toml::from_str(&raw).map_err(|e| CoreError::ConfigInvalid(format!("malformed scenario {}: {e}", path.display())))?;

    file.station.into_iter().map(convert_station).collect()
}

fn convert_station(station: ScenarioStation) -> Result<StationSpec, CoreError> {
    let mac = parse_mac(&station.mac)?;
    let slots = station.slot.into_iter().map(convert_slot).collect();
    Ok(StationSpec { station_name: station.name, mac, slots })
}

fn convert_slot(slot: ScenarioSlot) -> SlotSpec {
    SlotSpec {
        slot_number: slot.slot_number,
        sensors: slot.sensor.into_iter().map(convert_sensor).collect(),
        controls: slot.control.into_iter().map(|c| ControlSpec { tag: c.tag, interlocked: c.interlocked }).collect(),
    }
}

fn convert_sensor(sensor: ScenarioSensor) -> SensorSpec {
    SensorSpec {
        tag: sensor.tag,
        process: convert_process(sensor.process),
        initial_value: sensor.initial_value,
        coupled_to: sensor.coupled_to.map(|c| PlantCoupling { control_tag: c.control_tag, gain: c.gain, response_latency: Duration::from_millis(c.response_latency_ms) }),
    }
}

fn convert_process(process: ScenarioProcess) -> SensorProcess {
    match process {
        ScenarioProcess::RandomWalk { min, max, step_std_dev } => SensorProcess::RandomWalk { min, max, step_std_dev },
        ScenarioProcess::Sinusoid { center, amplitude, period_ms, phase_offset } => {
            SensorProcess::Sinusoid { center, amplitude, period: Duration::from_millis(period_ms), phase_offset }
        }
        ScenarioProcess::Scenario { steps } => {
            SensorProcess::Scenario { steps: steps.into_iter().map(|s| ScenarioStep { hold: Duration::from_millis(s.hold_ms), value: s.value }).collect() }
        }
    }
}

fn parse_mac(value: &str) -> Result<MacAddr, CoreError> {
    value.parse::<MacAddr>().map_err(|e| CoreError::ConfigInvalid(format!("invalid MAC address '{value}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_a_minimal_scenario_with_one_station() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [[station]]
            name = "tank-1"
            mac = "02:00:00:00:00:09"

            [[station.slot]]
            slot_number = 0

            [[station.slot.sensor]]
            tag = "LEVEL_1"
            initial_value = 50.0
            process = {{ kind = "random_walk", min = 0.0, max = 100.0, step_std_dev = 0.1 }}

            [[station.slot.control]]
            tag = "PUMP_1"
            "#
        )
        .unwrap();

        let stations = load_scenario(file.path()).unwrap();
        assert_eq!(stations.len(), 1);
        assert_eq!(stations[0].station_name, "tank-1");
        assert_eq!(stations[0].slots[0].sensors.len(), 1);
        assert_eq!(stations[0].slots[0].controls.len(), 1);
    }

    #[test]
    fn control_defaults_to_not_interlocked_when_field_is_absent() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [[station]]
            name = "tank-1"
            mac = "02:00:00:00:00:09"

            [[station.slot]]
            slot_number = 9

            [[station.slot.control]]
            tag = "PUMP_1"
            interlocked = true

            [[station.slot.control]]
            tag = "PUMP_2"
            "#
        )
        .unwrap();

        let stations = load_scenario(file.path()).unwrap();
        let controls = &stations[0].slots[0].controls;
        assert!(controls.iter().find(|c| c.tag == "PUMP_1").unwrap().interlocked);
        assert!(!controls.iter().find(|c| c.tag == "PUMP_2").unwrap().interlocked);
    }

    #[test]
    fn malformed_mac_address_is_config_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"[[station]]
name = "tank-1"
mac = "not-a-mac"
"#)
        .unwrap();
        assert!(load_scenario(file.path()).is_err());
    }
}
