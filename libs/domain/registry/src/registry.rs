// [libs/domain/registry/src/registry.rs]
/*!
 * APARATO: RTU REGISTRY
 * Mapa autoritativo en memoria de dispositivos, slots y canales.
 * Todos los demas subsistemas resuelven
 * referencias debiles (station + slot + tag) a traves de este crate;
 * ninguno almacena un puntero directo a un Device/Slot/Channel.
 */

use std::collections::HashMap;
use std::sync::RwLock;

use hydroscada_domain_models::{
    ChannelRef, Control, Device, DeviceConnectionState, Quality, Sensor, Slot,
};
use tracing::{info, warn};

use crate::errors::RegistryError;

struct SlotEntry {
    slot: Slot,
    sensors: HashMap<String, Sensor>,
    controls: HashMap<String, Control>,
}

struct DeviceEntry {
    device: Device,
    slots: HashMap<u16, SlotEntry>,
    /// Verdadero desde la transicion a RUN hasta el cierre del AR
    /// (invariante 2: el layout de slots se fija una sola vez por sesion).
    slot_layout_locked: bool,
}

/// Dueno exclusivo de todo registro de Device/Slot/Channel. Guardado por un unico RwLock: lectores (scans, IPC writer)
/// toman el lock de lectura, escritores (PROFINET IO al cerrar ciclo,
/// mutaciones del operador) lo toman de escritura el tiempo minimo (S5).
pub struct RtuRegistry {
    devices: RwLock<HashMap<String, DeviceEntry>>,
    /// Indice global de tags, compartido por sensores y controles
    /// (invariante 1: unicidad global de tags).
    tag_index: RwLock<HashMap<String, ChannelRef>>,
}

impl Default for RtuRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RtuRegistry {
    pub fn new() -> Self {
        Self { devices: RwLock::new(HashMap::new()), tag_index: RwLock::new(HashMap::new()) }
    }

    /// Inserta un nuevo dispositivo, descubierto o dado de alta por el operador.
    pub fn insert_device(&self, device: Device) -> Result<(), RegistryError> {
        let mut devices = self.devices.write().expect("LOCK_POISONED");
        if devices.contains_key(&device.station_name) {
            return Err(RegistryError::DuplicateStation(device.station_name));
        }
        let station_name = device.station_name.clone();
        devices.insert(station_name.clone(), DeviceEntry { device, slots: HashMap::new(), slot_layout_locked: false });
        info!(station_name, "registry: device inserted");
        Ok(())
    }

    /// Destruye un dispositivo. Solo permitido mientras esta desconectado.
    pub fn remove_device(&self, station_name: &str) -> Result<(), RegistryError> {
        let mut devices = self.devices.write().expect("LOCK_POISONED");
        let entry = devices.get(station_name).ok_or_else(|| RegistryError::UnknownStation(station_name.to_string()))?;
        if entry.device.connection_state != DeviceConnectionState::Disconnected {
            return Err(RegistryError::DeleteWhileConnected(station_name.to_string()));
        }

        let tags: Vec<String> = entry
            .slots
            .values()
            .flat_map(|s| s.sensors.keys().cloned().chain(s.controls.keys().cloned()))
            .collect();
        devices.remove(station_name);

        let mut tag_index = self.tag_index.write().expect("LOCK_POISONED");
        for tag in tags {
            tag_index.remove(&tag);
        }
        info!(station_name, "registry: device removed");
        Ok(())
    }

    pub fn transition_device(&self, station_name: &str, next: DeviceConnectionState, reason: impl Into<String>) -> Result<(), RegistryError> {
        let mut devices = self.devices.write().expect("LOCK_POISONED");
        let entry = devices.get_mut(station_name).ok_or_else(|| RegistryError::UnknownStation(station_name.to_string()))?;
        entry.device.transition(next, reason);
        if next == DeviceConnectionState::Disconnected || next == DeviceConnectionState::Error {
            entry.slot_layout_locked = false;
            Self::degrade_sensors_locked(entry);
        }
        Ok(())
    }

    /// Marca todos los sensores del dispositivo como NOT_CONNECTED, como exige
    /// un watchdog abort.
    fn degrade_sensors_locked(entry: &mut DeviceEntry) {
        for slot in entry.slots.values_mut() {
            for sensor in slot.sensors.values_mut() {
                sensor.quality = Quality::NotConnected;
            }
        }
    }

    pub fn device(&self, station_name: &str) -> Option<Device> {
        self.devices.read().expect("LOCK_POISONED").get(station_name).map(|e| e.device.clone())
    }

    pub fn list_devices(&self) -> Vec<Device> {
        self.devices.read().expect("LOCK_POISONED").values().map(|e| e.device.clone()).collect()
    }

    /// Fija el layout de slots declarado por el dispositivo al entrar en RUN.
    /// Solo puede ocurrir una vez por sesion de AR (invariante 2).
    pub fn lock_slot_layout(&self, station_name: &str, slots: Vec<Slot>) -> Result<(), RegistryError> {
        let mut devices = self.devices.write().expect("LOCK_POISONED");
        let entry = devices.get_mut(station_name).ok_or_else(|| RegistryError::UnknownStation(station_name.to_string()))?;
        if entry.slot_layout_locked {
            return Err(RegistryError::SlotLayoutLocked(station_name.to_string()));
        }
        entry.slots = slots
            .into_iter()
            .map(|slot| (slot.slot_number, SlotEntry { slot, sensors: HashMap::new(), controls: HashMap::new() }))
            .collect();
        entry.slot_layout_locked = true;
        info!(station_name, slot_count = entry.slots.len(), "registry: slot layout locked for AR session");
        Ok(())
    }

    pub fn slots(&self, station_name: &str) -> Result<Vec<Slot>, RegistryError> {
        let devices = self.devices.read().expect("LOCK_POISONED");
        let entry = devices.get(station_name).ok_or_else(|| RegistryError::UnknownStation(station_name.to_string()))?;
        Ok(entry.slots.values().map(|s| s.slot.clone()).collect())
    }

    fn reserve_tag(&self, tag: &str, reference: ChannelRef) -> Result<(), RegistryError> {
        let mut tag_index = self.tag_index.write().expect("LOCK_POISONED");
        if tag_index.contains_key(tag) {
            return Err(RegistryError::DuplicateTag(tag.to_string()));
        }
        tag_index.insert(tag.to_string(), reference);
        Ok(())
    }

    pub fn insert_sensor(&self, station_name: &str, slot_number: u16, sensor: Sensor) -> Result<(), RegistryError> {
        self.reserve_tag(&sensor.tag, ChannelRef { station_name: station_name.to_string(), slot_number, tag: sensor.tag.clone() })?;
        let mut devices = self.devices.write().expect("LOCK_POISONED");
        let entry = devices.get_mut(station_name).ok_or_else(|| RegistryError::UnknownStation(station_name.to_string()))?;
        let slot = entry.slots.get_mut(&slot_number).ok_or_else(|| RegistryError::UnknownSlot { station: station_name.to_string(), slot: slot_number })?;
        slot.sensors.insert(sensor.tag.clone(), sensor);
        Ok(())
    }

    pub fn insert_control(&self, station_name: &str, slot_number: u16, control: Control) -> Result<(), RegistryError> {
        self.reserve_tag(&control.tag, ChannelRef { station_name: station_name.to_string(), slot_number, tag: control.tag.clone() })?;
        let mut devices = self.devices.write().expect("LOCK_POISONED");
        let entry = devices.get_mut(station_name).ok_or_else(|| RegistryError::UnknownStation(station_name.to_string()))?;
        let slot = entry.slots.get_mut(&slot_number).ok_or_else(|| RegistryError::UnknownSlot { station: station_name.to_string(), slot: slot_number })?;
        slot.controls.insert(control.tag.clone(), control);
        Ok(())
    }

    /// Aplica una nueva lectura cruda a un sensor por tag (resolucion via
    /// indice global, no requiere conocer station/slot).
    pub fn apply_sensor_reading(&self, tag: &str, raw_value: f32, quality: Quality) -> Result<(), RegistryError> {
        let reference = self.tag_index.read().expect("LOCK_POISONED").get(tag).cloned().ok_or_else(|| RegistryError::UnknownTag(tag.to_string()))?;
        let mut devices = self.devices.write().expect("LOCK_POISONED");
        let entry = devices.get_mut(&reference.station_name).ok_or_else(|| RegistryError::UnknownStation(reference.station_name.clone()))?;
        let slot = entry.slots.get_mut(&reference.slot_number).ok_or_else(|| RegistryError::UnknownSlot { station: reference.station_name.clone(), slot: reference.slot_number })?;
        let sensor = slot.sensors.get_mut(tag).ok_or_else(|| RegistryError::UnknownTag(tag.to_string()))?;
        sensor.apply_raw_reading(raw_value, quality);
        Ok(())
    }

    pub fn sensor(&self, reference: &ChannelRef) -> Result<Sensor, RegistryError> {
        let devices = self.devices.read().expect("LOCK_POISONED");
        let entry = devices.get(&reference.station_name).ok_or_else(|| RegistryError::UnknownStation(reference.station_name.clone()))?;
        let slot = entry.slots.get(&reference.slot_number).ok_or_else(|| RegistryError::UnknownSlot { station: reference.station_name.clone(), slot: reference.slot_number })?;
        slot.sensors.get(&reference.tag).cloned().ok_or_else(|| RegistryError::UnknownTag(reference.tag.clone()))
    }

    pub fn sensor_by_tag(&self, tag: &str) -> Result<Sensor, RegistryError> {
        let reference = self.tag_index.read().expect("LOCK_POISONED").get(tag).cloned().ok_or_else(|| RegistryError::UnknownTag(tag.to_string()))?;
        self.sensor(&reference)
    }

    pub fn control(&self, reference: &ChannelRef) -> Result<Control, RegistryError> {
        let devices = self.devices.read().expect("LOCK_POISONED");
        let entry = devices.get(&reference.station_name).ok_or_else(|| RegistryError::UnknownStation(reference.station_name.clone()))?;
        let slot = entry.slots.get(&reference.slot_number).ok_or_else(|| RegistryError::UnknownSlot { station: reference.station_name.clone(), slot: reference.slot_number })?;
        slot.controls.get(&reference.tag).cloned().ok_or_else(|| RegistryError::UnknownTag(reference.tag.clone()))
    }

    /// Aplica una mutacion arbitraria sobre un control existente (usada por
    /// el motor de control para comandar, forzar, o revertir valores).
    pub fn mutate_control<F>(&self, tag: &str, mutator: F) -> Result<(), RegistryError>
    where
        F: FnOnce(&mut Control),
    {
        let reference = self.tag_index.read().expect("LOCK_POISONED").get(tag).cloned().ok_or_else(|| RegistryError::UnknownTag(tag.to_string()))?;
        let mut devices = self.devices.write().expect("LOCK_POISONED");
        let entry = devices.get_mut(&reference.station_name).ok_or_else(|| RegistryError::UnknownStation(reference.station_name.clone()))?;
        let slot = entry.slots.get_mut(&reference.slot_number).ok_or_else(|| RegistryError::UnknownSlot { station: reference.station_name.clone(), slot: reference.slot_number })?;
        let control = slot.controls.get_mut(tag).ok_or_else(|| RegistryError::UnknownTag(tag.to_string()))?;
        mutator(control);
        Ok(())
    }

    /// Marca un control como bloqueado por enclavamiento, segun notificacion
    /// recibida del flujo de alarmas PDU del AR.
    pub fn set_interlock_blocked(&self, tag: &str, blocked: bool) -> Result<(), RegistryError> {
        if blocked {
            warn!(tag, "registry: control blocked by device interlock");
        }
        self.mutate_control(tag, |control| control.interlock_blocked = blocked)
    }

    pub fn resolve_tag(&self, tag: &str) -> Option<ChannelRef> {
        self.tag_index.read().expect("LOCK_POISONED").get(tag).cloned()
    }

    pub fn all_sensor_tags(&self) -> Vec<String> {
        let devices = self.devices.read().expect("LOCK_POISONED");
        devices.values().flat_map(|e| e.slots.values().flat_map(|s| s.sensors.keys().cloned())).collect()
    }

    /// Todos los sensores de un dispositivo, en orden de slot ascendente y,
    /// dentro de cada slot, por tag ascendente -- el mismo orden que
    /// `hydroscada_controller::cyclic` asume al decodificar el campo de
    /// entrada ciclico, para que el offset de cada sensor en la trama sea
    /// estable entre ciclos (spec.md S5: "en orden de slot").
    pub fn device_sensors(&self, station_name: &str) -> Result<Vec<Sensor>, RegistryError> {
        let devices = self.devices.read().expect("LOCK_POISONED");
        let entry = devices.get(station_name).ok_or_else(|| RegistryError::UnknownStation(station_name.to_string()))?;
        let mut slot_numbers: Vec<_> = entry.slots.keys().copied().collect();
        slot_numbers.sort_unstable();
        Ok(slot_numbers
            .into_iter()
            .flat_map(|n| {
                let mut sensors: Vec<Sensor> = entry.slots[&n].sensors.values().cloned().collect();
                sensors.sort_by(|a, b| a.tag.cmp(&b.tag));
                sensors
            })
            .collect())
    }

    /// Todos los controles de un dispositivo, en orden de slot ascendente y,
    /// dentro de cada slot, por tag ascendente (mismo orden estable que
    /// `device_sensors`).
    pub fn device_controls(&self, station_name: &str) -> Result<Vec<Control>, RegistryError> {
        let devices = self.devices.read().expect("LOCK_POISONED");
        let entry = devices.get(station_name).ok_or_else(|| RegistryError::UnknownStation(station_name.to_string()))?;
        let mut slot_numbers: Vec<_> = entry.slots.keys().copied().collect();
        slot_numbers.sort_unstable();
        Ok(slot_numbers
            .into_iter()
            .flat_map(|n| {
                let mut controls: Vec<Control> = entry.slots[&n].controls.values().cloned().collect();
                controls.sort_by(|a, b| a.tag.cmp(&b.tag));
                controls
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydroscada_domain_models::{ControlKind, DeviceIdentity, EquipmentType, LinearScale};
    use std::net::{IpAddr, Ipv4Addr};

    fn sample_device(name: &str) -> Device {
        Device::new(
            name,
            IpAddr::V4(Ipv4Addr::new(192, 168, 1, 100)),
            DeviceIdentity { vendor_id: 1, device_id: 1, vendor_name: "AquaControl".into(), device_name: "RTU".into() },
        )
    }

    #[test]
    fn duplicate_station_insertion_fails() {
        let registry = RtuRegistry::new();
        registry.insert_device(sample_device("tank-1")).unwrap();
        assert!(matches!(registry.insert_device(sample_device("tank-1")), Err(RegistryError::DuplicateStation(_))));
    }

    #[test]
    fn duplicate_tag_across_devices_fails() {
        let registry = RtuRegistry::new();
        registry.insert_device(sample_device("tank-1")).unwrap();
        registry.insert_device(sample_device("tank-2")).unwrap();
        registry.lock_slot_layout("tank-1", vec![Slot::new(0, 1, 5, 0, 1)]).unwrap();
        registry.lock_slot_layout("tank-2", vec![Slot::new(0, 1, 5, 0, 1)]).unwrap();

        let scale = LinearScale { raw_low: 0.0, raw_high: 1.0, engineering_low: 0.0, engineering_high: 14.0 };
        registry.insert_sensor("tank-1", 0, Sensor::new("pH_SENSOR_1", "pH", scale)).unwrap();
        let err = registry.insert_sensor("tank-2", 0, Sensor::new("pH_SENSOR_1", "pH", scale));
        assert!(matches!(err, Err(RegistryError::DuplicateTag(_))));
    }

    #[test]
    fn slot_layout_locks_after_first_set() {
        let registry = RtuRegistry::new();
        registry.insert_device(sample_device("tank-1")).unwrap();
        registry.lock_slot_layout("tank-1", vec![Slot::new(0, 1, 5, 0, 1)]).unwrap();
        let err = registry.lock_slot_layout("tank-1", vec![Slot::new(0, 1, 5, 0, 1)]);
        assert!(matches!(err, Err(RegistryError::SlotLayoutLocked(_))));
    }

    #[test]
    fn delete_while_connected_is_rejected() {
        let registry = RtuRegistry::new();
        registry.insert_device(sample_device("tank-1")).unwrap();
        registry.transition_device("tank-1", DeviceConnectionState::Running, "RUN").unwrap();
        assert!(matches!(registry.remove_device("tank-1"), Err(RegistryError::DeleteWhileConnected(_))));
        registry.transition_device("tank-1", DeviceConnectionState::Disconnected, "OPERATOR_DISCONNECT").unwrap();
        assert!(registry.remove_device("tank-1").is_ok());
    }

    #[test]
    fn watchdog_abort_marks_sensors_not_connected() {
        let registry = RtuRegistry::new();
        registry.insert_device(sample_device("pump-station")).unwrap();
        registry.lock_slot_layout("pump-station", vec![Slot::new(1, 1, 5, 0, 1)]).unwrap();
        let scale = LinearScale { raw_low: 0.0, raw_high: 1.0, engineering_low: 0.0, engineering_high: 1.0 };
        let mut sensor = Sensor::new("FLOW_1", "m3/h", scale);
        sensor.quality = Quality::Good;
        registry.insert_sensor("pump-station", 1, sensor).unwrap();

        registry.transition_device("pump-station", DeviceConnectionState::Error, "WATCHDOG_EXPIRED").unwrap();
        assert_eq!(registry.sensor_by_tag("FLOW_1").unwrap().quality, Quality::NotConnected);
    }

    #[test]
    fn interlock_block_is_observable_via_control() {
        let registry = RtuRegistry::new();
        registry.insert_device(sample_device("tank-1")).unwrap();
        registry.lock_slot_layout("tank-1", vec![Slot::new(9, 1, 0, 2, 1)]).unwrap();
        registry.insert_control("tank-1", 9, Control::new("PUMP_1", ControlKind::Discrete, EquipmentType::Pump, 0.0, 1.0)).unwrap();

        registry.set_interlock_blocked("PUMP_1", true).unwrap();
        assert!(registry.control(&ChannelRef { station_name: "tank-1".into(), slot_number: 9, tag: "PUMP_1".into() }).unwrap().interlock_blocked);
    }
}
