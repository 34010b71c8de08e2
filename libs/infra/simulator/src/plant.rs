// [libs/infra/simulator/src/plant.rs]
/*!
 * APARATO: MODELED PLANT
 * Estado de un dispositivo simulado: su disposicion de slots, los
 * procesos estocasticos que alimentan cada sensor y el acople de
 * primer orden entre un control comandado y el sensor que responde a
 * el, con latencia configurable.
 */

use std::collections::HashMap;
use std::time::{Duration, Instant};

use hydroscada_core_frame::encode_sensor_field;
use hydroscada_domain_models::Quality;
use pnet::util::MacAddr;
use rand::rngs::StdRng;

use crate::processes::{ProcessCursor, SensorProcess};

/// Ultimo comando de actuador recibido por el simulador para un control.
/// Espejo del formato de cable S6: 1 byte comando (0=OFF,1=ON,2=PWM), 1
/// byte de ciclo de trabajo (0-255, solo significativo para PWM).
#[derive(Debug, Clone, Copy, Default)]
pub struct ActuatorState {
    pub command: u8,
    pub duty: u8,
}

impl ActuatorState {
    /// Senal normalizada 0.0-1.0 usada como entrada al modelo de planta.
    pub fn signal(&self) -> f64 {
        match self.command {
            0 => 0.0,
            1 => 1.0,
            2 => self.duty as f64 / 255.0,
            _ => 0.0,
        }
    }
}

/// Describe como un control influye sobre un sensor: ganancia en
/// unidades crudas por unidad de senal de actuador, y el tiempo que
/// tarda la planta en acercarse al nuevo valor objetivo.
#[derive(Debug, Clone)]
pub struct PlantCoupling {
    pub control_tag: String,
    pub gain: f64,
    pub response_latency: Duration,
}

/// Acople de primer orden: el sesgo persigue `gain * senal` con una
/// constante de tiempo `response_latency`, nunca saltando de golpe.
struct PlantBias {
    coupling: PlantCoupling,
    bias: f64,
    last_tick: Instant,
}

impl PlantBias {
    fn new(coupling: PlantCoupling, now: Instant) -> Self {
        Self { coupling, bias: 0.0, last_tick: now }
    }

    fn advance(&mut self, signal: f64, now: Instant) -> f64 {
        let dt = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;
        let target = self.coupling.gain * signal;
        let latency = self.coupling.response_latency.as_secs_f64().max(1e-6);
        let alpha = (dt.as_secs_f64() / latency).min(1.0);
        self.bias += (target - self.bias) * alpha;
        self.bias
    }
}

/// Especificacion declarativa de un sensor simulado.
pub struct SensorSpec {
    pub tag: String,
    pub process: SensorProcess,
    pub initial_value: f64,
    pub coupled_to: Option<PlantCoupling>,
}

/// Especificacion declarativa de un control simulado (el simulador solo
/// necesita el tag para correlacionar comandos entrantes).
pub struct ControlSpec {
    pub tag: String,
    /// Si es verdadero, todo comando distinto de OFF se rechaza
    /// localmente -- el actuador no se energiza -- y el dispositivo
    /// reporta enclavamiento activo, igual que una bomba con proteccion
    /// de marcha en seco real.
    pub interlocked: bool,
}

pub struct SlotSpec {
    pub slot_number: u16,
    pub sensors: Vec<SensorSpec>,
    pub controls: Vec<ControlSpec>,
}

pub struct StationSpec {
    pub station_name: String,
    pub mac: MacAddr,
    pub slots: Vec<SlotSpec>,
}

struct SimSensor {
    tag: String,
    cursor: ProcessCursor,
    coupling: Option<PlantBias>,
}

struct SimControl {
    tag: String,
    state: ActuatorState,
    interlocked: bool,
    /// Ultimo estado de enclavamiento ya informado aguas arriba, para
    /// emitir la transicion una sola vez en vez de en cada trama de salida.
    interlock_reported: bool,
}

struct SimSlot {
    slot_number: u16,
    sensors: Vec<SimSensor>,
    controls: Vec<SimControl>,
}

/// Un dispositivo PROFINET completo reconstruido en memoria: su layout
/// de slots, ascendente por numero, fija el orden de concatenacion de
/// campos en la trama ciclica igual que en un RTU real.
pub struct SimulatedStation {
    pub station_name: String,
    pub mac: MacAddr,
    slots: Vec<SimSlot>,
}

impl SimulatedStation {
    pub fn new(spec: StationSpec, now: Instant) -> Self {
        let mut slots: Vec<SimSlot> = spec
            .slots
            .into_iter()
            .map(|slot_spec| SimSlot {
                slot_number: slot_spec.slot_number,
                sensors: slot_spec
                    .sensors
                    .into_iter()
                    .map(|s| SimSensor {
                        tag: s.tag,
                        cursor: ProcessCursor::new(s.process, s.initial_value, now),
                        coupling: s.coupled_to.map(|c| PlantBias::new(c, now)),
                    })
                    .collect(),
                controls: slot_spec.controls.into_iter().map(|c| SimControl { tag: c.tag, state: ActuatorState::default(), interlocked: c.interlocked, interlock_reported: false }).collect(),
            })
            .collect();
        slots.sort_by_key(|slot| slot.slot_number);
        Self { station_name: spec.station_name, mac: spec.mac, slots }
    }

    /// Avanza todos los sensores un paso y devuelve el payload de una
    /// trama RTC1 de entrada: sensores en orden de slot ascendente, cada
    /// uno codificado como S6 dicta (float IEEE-754 + byte de calidad).
    pub fn sample_input_frame(&mut self, rng: &mut StdRng, now: Instant) -> Vec<u8> {
        let mut actuator_signal: HashMap<&str, f64> = HashMap::new();
        for slot in &self.slots {
            for control in &slot.controls {
                actuator_signal.insert(control.tag.as_str(), control.state.signal());
            }
        }

        let mut payload = Vec::new();
        for slot in &mut self.slots {
            for sensor in &mut slot.sensors {
                let bias = match &mut sensor.coupling {
                    Some(coupling) => {
                        let signal = actuator_signal.get(coupling.coupling.control_tag.as_str()).copied().unwrap_or(0.0);
                        coupling.advance(signal, now)
                    }
                    None => 0.0,
                };
                let raw_value = sensor.cursor.sample(rng, now, bias);
                encode_sensor_field(&mut payload, raw_value as f32, Quality::Good);
            }
        }
        payload
    }

    /// Decodifica una trama RTC1 de salida (comandos del controlador) y
    /// actualiza el estado de cada control, en el mismo orden de slot
    /// ascendente usado para el input frame. Un control marcado
    /// `interlocked` rechaza todo comando distinto de OFF: el estado del
    /// actuador no cambia y se devuelve la transicion de enclavamiento
    /// (tag, activo) para que el llamador la anuncie por el canal
    /// aciclico, igual que una alarma de dispositivo real.
    pub fn apply_output_frame(&mut self, view: &[u8], wire_width: usize) -> Vec<(String, bool)> {
        let mut transitions = Vec::new();
        let mut offset = 0;
        for slot in &mut self.slots {
            for control in &mut slot.controls {
                if offset + wire_width > view.len() {
                    return transitions;
                }
                let commanded = ActuatorState { command: view[offset], duty: view[offset + 1] };
                offset += wire_width;

                if control.interlocked && commanded.command != 0 {
                    if !control.interlock_reported {
                        control.interlock_reported = true;
                        transitions.push((control.tag.clone(), true));
                    }
                    continue;
                }
                if control.interlocked && control.interlock_reported {
                    control.interlock_reported = false;
                    transitions.push((control.tag.clone(), false));
                }
                control.state = commanded;
            }
        }
        transitions
    }

    pub fn sensor_tags(&self) -> Vec<&str> {
        self.slots.iter().flat_map(|s| s.sensors.iter().map(|sensor| sensor.tag.as_str())).collect()
    }

    pub fn control_tags(&self) -> Vec<&str> {
        self.slots.iter().flat_map(|s| s.controls.iter().map(|control| control.tag.as_str())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processes::SensorProcess;
    use hydroscada_core_frame::decode_sensor_field;
    use rand::SeedableRng;

    fn sample_station(now: Instant) -> SimulatedStation {
        let spec = StationSpec {
            station_name: "tank-1".into(),
            mac: MacAddr::new(0x02, 0, 0, 0, 0, 1),
            slots: vec![SlotSpec {
                slot_number: 0,
                sensors: vec![SensorSpec {
                    tag: "LEVEL_1".into(),
                    process: SensorProcess::RandomWalk { min: 0.0, max: 100.0, step_std_dev: 0.0 },
                    initial_value: 50.0,
                    coupled_to: Some(PlantCoupling { control_tag: "PUMP_1".into(), gain: 20.0, response_latency: Duration::from_millis(1) }),
                }],
                controls: vec![ControlSpec { tag: "PUMP_1".into(), interlocked: false }],
            }],
        };
        SimulatedStation::new(spec, now)
    }

    #[test]
    fn actuator_command_biases_coupled_sensor() {
        let mut rng = StdRng::seed_from_u64(11);
        let start = Instant::now();
        let mut station = sample_station(start);

        let baseline = station.sample_input_frame(&mut rng, start);
        assert_eq!(baseline.len(), 5);

        station.apply_output_frame(&[1, 0], 2);
        std::thread::sleep(Duration::from_millis(5));
        let after_command = station.sample_input_frame(&mut rng, Instant::now());

        let (baseline_value, _) = decode_sensor_field(&baseline, 0).unwrap();
        let (after_value, _) = decode_sensor_field(&after_command, 0).unwrap();
        assert!(after_value > baseline_value);
    }

    #[test]
    fn output_frame_shorter_than_declared_controls_is_ignored_safely() {
        let start = Instant::now();
        let mut station = sample_station(start);
        station.apply_output_frame(&[], 2);
    }

    fn interlocked_station(now: Instant) -> SimulatedStation {
        let spec = StationSpec {
            station_name: "tank-1".into(),
            mac: MacAddr::new(0x02, 0, 0, 0, 0, 1),
            slots: vec![SlotSpec { slot_number: 0, sensors: vec![], controls: vec![ControlSpec { tag: "PUMP_1".into(), interlocked: true }] }],
        };
        SimulatedStation::new(spec, now)
    }

    #[test]
    fn interlocked_control_rejects_on_command_and_reports_once() {
        let start = Instant::now();
        let mut station = interlocked_station(start);

        let first = station.apply_output_frame(&[1, 0], 2);
        assert_eq!(first, vec![("PUMP_1".to_string(), true)]);

        let second = station.apply_output_frame(&[1, 0], 2);
        assert!(second.is_empty());
    }

    #[test]
    fn interlocked_control_releases_on_off_command() {
        let start = Instant::now();
        let mut station = interlocked_station(start);

        station.apply_output_frame(&[1, 0], 2);
        let released = station.apply_output_frame(&[0, 0], 2);
        assert_eq!(released, vec![("PUMP_1".to_string(), false)]);
    }
}
