// [libs/infra/simulator/src/link.rs]
/*!
 * APARATO: SIMULATED LINK LAYER
 * Implementa `LinkLayer` exactamente como lo haria el socket crudo real,
 * de modo que el Frame Engine, el AR Manager y el Controller no pueden
 * distinguir esta interfaz de una tarjeta de red fisica. El unico "motor"
 * propio es `tick()`, impulsado por el reloj de pared del llamador, nunca
 * por un hilo que el simulador arranque por su cuenta.
 */

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use hydroscada_core_frame::wire::{ACTUATOR_WIRE_WIDTH, FRAME_ID_DCP_IDENTIFY};
use hydroscada_core_frame::{build_frame, encode_interlock_alarm, parse_frame, DcpServiceId, FrameDropCounters, FrameError, FrameKind, LinkLayer};
use pnet::util::MacAddr;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, warn};

use crate::errors::SimulatorError;
use crate::plant::{SimulatedStation, StationSpec};

/// Identidad declarada de una estacion simulada, tal como la expondria
/// un DCP-Identify real, mas el layout de slots que el Registry debe
/// aprender al conectar.
pub struct SimulatedDeviceAnnouncement {
    pub station_name: String,
    pub mac: MacAddr,
    pub vendor_id: u16,
    pub device_id: u16,
}

/// Contrato que el arranque del proceso usa para poblar el Registry sin
/// distinguir entre descubrimiento DCP real y estaciones simuladas
/// declaradas de antemano en un guion de escenario.
pub trait DeviceDriver: Send + Sync {
    fn known_stations(&self) -> Vec<SimulatedDeviceAnnouncement>;
}

/// Interfaz de red enteramente en memoria. Cada estacion dada de alta
/// corre sus propios procesos estocasticos; los comandos de actuador
/// llegan via `send_raw` y se reflejan en la siguiente muestra.
pub struct SimulatedLink {
    local_mac: MacAddr,
    stations: RwLock<HashMap<String, SimulatedStation>>,
    mac_index: RwLock<HashMap<MacAddr, String>>,
    inbox_tx: Sender<Vec<u8>>,
    inbox_rx: Receiver<Vec<u8>>,
    counters: FrameDropCounters,
    rng: Mutex<StdRng>,
}

impl SimulatedLink {
    pub fn new(local_mac: MacAddr) -> Self {
        let (inbox_tx, inbox_rx) = unbounded();
        Self {
            local_mac,
            stations: RwLock::new(HashMap::new()),
            mac_index: RwLock::new(HashMap::new()),
            inbox_tx,
            inbox_rx,
            counters: FrameDropCounters::new(),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn add_station(&self, spec: StationSpec) -> Result<(), SimulatorError> {
        let mut stations = self.stations.write().expect("LOCK_POISONED");
        if stations.contains_key(&spec.station_name) {
            return Err(SimulatorError::DuplicateStation(spec.station_name));
        }
        self.mac_index.write().expect("LOCK_POISONED").insert(spec.mac, spec.station_name.clone());
        let station = SimulatedStation::new(spec, Instant::now());
        stations.insert(station.station_name.clone(), station);
        Ok(())
    }

    pub fn remove_station(&self, station_name: &str) {
        if let Some(station) = self.stations.write().expect("LOCK_POISONED").remove(station_name) {
            self.mac_index.write().expect("LOCK_POISONED").remove(&station.mac);
        }
    }

    pub fn frame_drop_counters(&self) -> &FrameDropCounters {
        &self.counters
    }

    /// Avanza cada estacion dada de alta un paso de sus procesos
    /// estocasticos y publica la trama RTC1 de entrada resultante en la
    /// cola de recepcion. Un reloj de pared externo debe llamar esto a
    /// cada periodo declarado de ciclo; el simulador nunca se auto-impulsa.
    pub fn tick(&self, now: Instant) -> Result<(), SimulatorError> {
        let mut stations = self.stations.write().expect("LOCK_POISONED");
        let mut rng = self.rng.lock().expect("LOCK_POISONED");
        for station in stations.values_mut() {
            let payload = station.sample_input_frame(&mut rng, now);
            let frame = build_frame(FrameKind::Rtc1, &payload, station.mac, self.local_mac, None)?;
            if self.inbox_tx.send(frame).is_err() {
                warn!("simulator: inbox disconnected, dropping cyclic sample");
            }
        }
        Ok(())
    }

    fn handle_identify_request(&self) {
        let stations = self.stations.read().expect("LOCK_POISONED");
        for station in stations.values() {
            let payload = build_identify_reply_payload(&station.station_name);
            match build_frame(FrameKind::Dcp(DcpServiceId::Identify), &payload, station.mac, self.local_mac, None) {
                Ok(frame) => {
                    if self.inbox_tx.send(frame).is_err() {
                        warn!("simulator: inbox disconnected, dropping DCP reply");
                    }
                }
                Err(err) => debug!(error = %err, "simulator: failed to build identify reply"),
            }
        }
    }

    fn handle_rtc1_output(&self, dst_mac: MacAddr, view: &[u8]) {
        let station_name = self.mac_index.read().expect("LOCK_POISONED").get(&dst_mac).cloned();
        let Some(station_name) = station_name else {
            debug!(mac = %dst_mac, "simulator: output frame for unknown station");
            return;
        };
        let (station_mac, transitions) = {
            let mut stations = self.stations.write().expect("LOCK_POISONED");
            let Some(station) = stations.get_mut(&station_name) else {
                return;
            };
            (station.mac, station.apply_output_frame(view, ACTUATOR_WIRE_WIDTH))
        };
        for (tag, active) in transitions {
            self.emit_interlock_alarm(station_mac, &tag, active);
        }
    }

    /// Anuncia una transicion de enclavamiento como una trama de alarma,
    /// igual que un dispositivo real reportaria una protecion disparada.
    fn emit_interlock_alarm(&self, station_mac: MacAddr, tag: &str, active: bool) {
        let payload = encode_interlock_alarm(tag, active);
        match build_frame(FrameKind::Alarm, &payload, station_mac, self.local_mac, None) {
            Ok(frame) => {
                if self.inbox_tx.send(frame).is_err() {
                    warn!("simulator: inbox disconnected, dropping interlock alarm");
                }
            }
            Err(err) => debug!(error = %err, "simulator: failed to build interlock alarm frame"),
        }
    }
}

impl LinkLayer for SimulatedLink {
    fn send_raw(&self, frame: &[u8]) -> Result<(), FrameError> {
        let Some(parsed) = parse_frame(frame, &self.counters) else {
            return Ok(());
        };
        match parsed.kind {
            FrameKind::Dcp(DcpServiceId::Identify) => self.handle_identify_request(),
            FrameKind::Rtc1 => self.handle_rtc1_output(parsed.dst_mac, parsed.view),
            _ => {}
        }
        Ok(())
    }

    fn recv_raw(&self, timeout: Duration) -> Result<Option<Vec<u8>>, FrameError> {
        match self.inbox_rx.recv_timeout(timeout) {
            Ok(frame) => Ok(Some(frame)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(FrameError::InterfaceUnavailable("simulated inbox closed".into())),
        }
    }

    fn local_mac(&self) -> MacAddr {
        self.local_mac
    }
}

impl DeviceDriver for SimulatedLink {
    fn known_stations(&self) -> Vec<SimulatedDeviceAnnouncement> {
        self.stations
            .read()
            .expect("LOCK_POISONED")
            .values()
            .map(|s| SimulatedDeviceAnnouncement { station_name: s.station_name.clone(), mac: s.mac, vendor_id: 0x0042, device_id: 0x0001 })
            .collect()
    }
}

/// Minimo cuerpo DCP-Identify-Rsp valido: diez bytes de cabecera de
/// servicio seguidos por un unico bloque TLV de nombre de estacion,
/// exactamente lo que `parse_identify_payload` sabe interpretar.
fn build_identify_reply_payload(station_name: &str) -> Vec<u8> {
    let mut payload = vec![0u8; 10];
    let name_bytes = station_name.as_bytes();
    payload.push(0x02); // option: device properties
    payload.push(0x01); // suboption: name of station
    let len = name_bytes.len() as u16;
    payload.push((len >> 8) as u8);
    payload.push((len & 0xFF) as u8);
    payload.extend_from_slice(name_bytes);
    if name_bytes.len() % 2 != 0 {
        payload.push(0);
    }
    payload
}

/// Verdadero si el frame_id corresponde a una solicitud de descubrimiento,
/// util para diagnosticos del escenario de simulacion.
pub fn is_identify_request(frame_id: u16) -> bool {
    frame_id == FRAME_ID_DCP_IDENTIFY
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plant::{ControlSpec, SensorSpec, SlotSpec};
    use crate::processes::SensorProcess;

    fn station_spec() -> StationSpec {
        StationSpec {
            station_name: "tank-1".into(),
            mac: MacAddr::new(0x02, 0, 0, 0, 0, 9),
            slots: vec![SlotSpec {
                slot_number: 0,
                sensors: vec![SensorSpec {
                    tag: "LEVEL_1".into(),
                    process: SensorProcess::RandomWalk { min: 0.0, max: 100.0, step_std_dev: 0.1 },
                    initial_value: 50.0,
                    coupled_to: None,
                }],
                controls: vec![ControlSpec { tag: "PUMP_1".into(), interlocked: false }],
            }],
        }
    }

    fn interlocked_station_spec() -> StationSpec {
        StationSpec {
            station_name: "tank-1".into(),
            mac: MacAddr::new(0x02, 0, 0, 0, 0, 9),
            slots: vec![SlotSpec { slot_number: 0, sensors: vec![], controls: vec![ControlSpec { tag: "PUMP_1".into(), interlocked: true }] }],
        }
    }

    #[test]
    fn tick_publishes_a_cyclic_frame_per_station() {
        let link = SimulatedLink::new(MacAddr::new(0x02, 0, 0, 0, 0, 1));
        link.add_station(station_spec()).unwrap();
        link.tick(Instant::now()).unwrap();
        let frame = link.recv_raw(Duration::from_millis(50)).unwrap();
        assert!(frame.is_some());
    }

    #[test]
    fn identify_request_yields_a_reply_per_known_station() {
        let link = SimulatedLink::new(MacAddr::new(0x02, 0, 0, 0, 0, 1));
        link.add_station(station_spec()).unwrap();

        let request = build_frame(FrameKind::Dcp(DcpServiceId::Identify), &[], link.local_mac(), MacAddr::broadcast(), None).unwrap();
        link.send_raw(&request).unwrap();

        let reply = link.recv_raw(Duration::from_millis(50)).unwrap().expect("expected an identify reply");
        let counters = FrameDropCounters::new();
        let parsed = parse_frame(&reply, &counters).unwrap();
        assert_eq!(parsed.kind, FrameKind::Dcp(DcpServiceId::Identify));
    }

    #[test]
    fn duplicate_station_registration_is_rejected() {
        let link = SimulatedLink::new(MacAddr::new(0x02, 0, 0, 0, 0, 1));
        link.add_station(station_spec()).unwrap();
        assert!(link.add_station(station_spec()).is_err());
    }

    #[test]
    fn commanding_an_interlocked_control_emits_an_alarm_frame() {
        let link = SimulatedLink::new(MacAddr::new(0x02, 0, 0, 0, 0, 1));
        link.add_station(interlocked_station_spec()).unwrap();

        let output = build_frame(FrameKind::Rtc1, &[1, 0], link.local_mac(), MacAddr::new(0x02, 0, 0, 0, 0, 9), None).unwrap();
        link.send_raw(&output).unwrap();

        let alarm = link.recv_raw(Duration::from_millis(50)).unwrap().expect("expected an interlock alarm frame");
        let counters = FrameDropCounters::new();
        let parsed = parse_frame(&alarm, &counters).unwrap();
        assert_eq!(parsed.kind, FrameKind::Alarm);
        let (tag, active) = hydroscada_core_frame::decode_interlock_alarm(parsed.view).unwrap();
        assert_eq!(tag, "PUMP_1");
        assert!(active);
    }
}
