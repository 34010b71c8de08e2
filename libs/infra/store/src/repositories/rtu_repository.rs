// [libs/infra/store/src/repositories/rtu_repository.rs]
/*!
 * APARATO: RTU REPOSITORY
 * Persistencia de `rtus`, `slots`, `sensors` y `controls`. Usado por el
 * arbol de composicion para sembrar el Registry al arrancar y para
 * reflejar mutaciones de inventario durante la operacion.
 */

use chrono::{DateTime, Utc};
use hydroscada_domain_models::{
    ChannelRef, Control, ControlKind, Device, DeviceConnectionState, DeviceIdentity, EquipmentType, LinearScale,
    Quality, Sensor, Slot, SlotStatus,
};
use rusqlite::params;
use std::net::IpAddr;
use std::str::FromStr;

use crate::client::StoreClient;
use crate::errors::StoreError;

fn connection_state_to_str(state: DeviceConnectionState) -> &'static str {
    match state {
        DeviceConnectionState::Disconnected => "DISCONNECTED",
        DeviceConnectionState::Discovering => "DISCOVERING",
        DeviceConnectionState::Connecting => "CONNECTING",
        DeviceConnectionState::Parameterizing => "PARAMETERIZING",
        DeviceConnectionState::Running => "RUNNING",
        DeviceConnectionState::Error => "ERROR",
    }
}

fn connection_state_from_str(value: &str) -> DeviceConnectionState {
    match value {
        "DISCOVERING" => DeviceConnectionState::Discovering,
        "CONNECTING" => DeviceConnectionState::Connecting,
        "PARAMETERIZING" => DeviceConnectionState::Parameterizing,
        "RUNNING" => DeviceConnectionState::Running,
        "ERROR" => DeviceConnectionState::Error,
        _ => DeviceConnectionState::Disconnected,
    }
}

fn slot_status_to_str(status: SlotStatus) -> &'static str {
    match status {
        SlotStatus::Ok => "OK",
        SlotStatus::Substitute => "SUBSTITUTE",
        SlotStatus::Wrong => "WRONG",
        SlotStatus::Empty => "EMPTY",
        SlotStatus::Fault => "FAULT",
    }
}

fn slot_status_from_str(value: &str) -> SlotStatus {
    match value {
        "SUBSTITUTE" => SlotStatus::Substitute,
        "WRONG" => SlotStatus::Wrong,
        "EMPTY" => SlotStatus::Empty,
        "FAULT" => SlotStatus::Fault,
        _ => SlotStatus::Ok,
    }
}

fn quality_to_str(quality: Quality) -> &'static str {
    match quality {
        Quality::Good => "GOOD",
        Quality::Uncertain => "UNCERTAIN",
        Quality::Bad => "BAD",
        Quality::NotConnected => "NOT_CONNECTED",
    }
}

fn quality_from_str(value: &str) -> Quality {
    match value {
        "GOOD" => Quality::Good,
        "UNCERTAIN" => Quality::Uncertain,
        "BAD" => Quality::Bad,
        _ => Quality::NotConnected,
    }
}

pub struct RtuRepository<'a> {
    client: &'a StoreClient,
}

impl<'a> RtuRepository<'a> {
    pub fn new(client: &'a StoreClient) -> Self {
        Self { client }
    }

    pub fn upsert_device(&self, device: &Device) -> Result<(), StoreError> {
        self.client.with_connection(|conn| {
            conn.execute(
                "INSERT INTO rtus (station_name, network_address, vendor_id, device_id, vendor_name, device_name, declared_cycle_time_us, connection_state, last_state_change, reason, firmware_version)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT(station_name) DO UPDATE SET
                    network_address = excluded.network_address,
                    vendor_id = excluded.vendor_id,
                    device_id = excluded.device_id,
                    vendor_name = excluded.vendor_name,
                    device_name = excluded.device_name,
                    declared_cycle_time_us = excluded.declared_cycle_time_us,
                    connection_state = excluded.connection_state,
                    last_state_change = excluded.last_state_change,
                    reason = excluded.reason,
                    firmware_version = excluded.firmware_version",
                params![
                    device.station_name,
                    device.network_address.to_string(),
                    device.identity.vendor_id,
                    device.identity.device_id,
                    device.identity.vendor_name,
                    device.identity.device_name,
                    device.declared_cycle_time_us,
                    connection_state_to_str(device.connection_state),
                    device.last_state_change.to_rfc3339(),
                    device.reason,
                    device.firmware_version,
                ],
            )?;
            Ok(())
        })
    }

    pub fn delete_device(&self, station_name: &str) -> Result<(), StoreError> {
        self.client.with_connection(|conn| {
            conn.execute("DELETE FROM controls WHERE station_name = ?1", params![station_name])?;
            conn.execute("DELETE FROM sensors WHERE station_name = ?1", params![station_name])?;
            conn.execute("DELETE FROM slots WHERE station_name = ?1", params![station_name])?;
            conn.execute("DELETE FROM rtus WHERE station_name = ?1", params![station_name])?;
            Ok(())
        })
    }

    pub fn list_devices(&self) -> Result<Vec<Device>, StoreError> {
        self.client.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT station_name, network_address, vendor_id, device_id, vendor_name, device_name, declared_cycle_time_us, connection_state, last_state_change, reason, firmware_version FROM rtus",
            )?;
            let rows = stmt.query_map([], |row| {
                let network_address: String = row.get(1)?;
                let last_state_change: String = row.get(8)?;
                let connection_state: String = row.get(7)?;
                Ok(Device {
                    station_name: row.get(0)?,
                    network_address: IpAddr::from_str(&network_address).unwrap_or(IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED)),
                    identity: DeviceIdentity { vendor_id: row.get(2)?, device_id: row.get(3)?, vendor_name: row.get(4)?, device_name: row.get(5)? },
                    declared_cycle_time_us: row.get(6)?,
                    connection_state: connection_state_from_str(&connection_state),
                    last_state_change: DateTime::parse_from_rfc3339(&last_state_change).map(|d| d.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now()),
                    reason: row.get(9)?,
                    firmware_version: row.get(10)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
        })
    }

    pub fn upsert_slot(&self, station_name: &str, slot: &Slot) -> Result<(), StoreError> {
        self.client.with_connection(|conn| {
            conn.execute(
                "INSERT INTO slots (station_name, slot_number, module_identity, input_bytes, output_bytes, subslot_count, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(station_name, slot_number) DO UPDATE SET
                    module_identity = excluded.module_identity,
                    input_bytes = excluded.input_bytes,
                    output_bytes = excluded.output_bytes,
                    subslot_count = excluded.subslot_count,
                    status = excluded.status",
                params![station_name, slot.slot_number, slot.module_identity, slot.input_bytes, slot.output_bytes, slot.subslot_count, slot_status_to_str(slot.status)],
            )?;
            Ok(())
        })
    }

    pub fn list_slots(&self, station_name: &str) -> Result<Vec<Slot>, StoreError> {
        self.client.with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT slot_number, module_identity, input_bytes, output_bytes, subslot_count, status FROM slots WHERE station_name = ?1")?;
            let rows = stmt.query_map(params![station_name], |row| {
                let status: String = row.get(5)?;
                Ok(Slot { slot_number: row.get(0)?, module_identity: row.get(1)?, input_bytes: row.get(2)?, output_bytes: row.get(3)?, subslot_count: row.get(4)?, status: slot_status_from_str(&status) })
            })?;
            rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
        })
    }

    pub fn upsert_sensor(&self, reference: &ChannelRef, sensor: &Sensor) -> Result<(), StoreError> {
        self.client.with_connection(|conn| {
            conn.execute(
                "INSERT INTO sensors (tag, station_name, slot_number, engineering_unit, raw_low, raw_high, engineering_low, engineering_high, value, quality, last_update)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT(tag) DO UPDATE SET value = excluded.value, quality = excluded.quality, last_update = excluded.last_update",
                params![
                    sensor.tag,
                    reference.station_name,
                    reference.slot_number,
                    sensor.engineering_unit,
                    sensor.scale.raw_low,
                    sensor.scale.raw_high,
                    sensor.scale.engineering_low,
                    sensor.scale.engineering_high,
                    sensor.value,
                    quality_to_str(sensor.quality),
                    sensor.last_update.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    /// Devuelve cada sensor junto al numero de slot que lo aloja, para que
    /// el llamador pueda repoblar el Registry sin una segunda consulta.
    pub fn list_sensors(&self, station_name: &str) -> Result<Vec<(u16, Sensor)>, StoreError> {
        self.client.with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT tag, slot_number, engineering_unit, raw_low, raw_high, engineering_low, engineering_high, value, quality, last_update FROM sensors WHERE station_name = ?1")?;
            let rows = stmt.query_map(params![station_name], |row| {
                let slot_number: u16 = row.get(1)?;
                let quality: String = row.get(8)?;
                let last_update: String = row.get(9)?;
                Ok((
                    slot_number,
                    Sensor {
                        tag: row.get(0)?,
                        engineering_unit: row.get(2)?,
                        scale: LinearScale { raw_low: row.get(3)?, raw_high: row.get(4)?, engineering_low: row.get(5)?, engineering_high: row.get(6)? },
                        value: row.get(7)?,
                        quality: quality_from_str(&quality),
                        last_update: DateTime::parse_from_rfc3339(&last_update).map(|d| d.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now()),
                    },
                ))
            })?;
            rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
        })
    }

    pub fn upsert_control(&self, reference: &ChannelRef, control: &Control) -> Result<(), StoreError> {
        self.client.with_connection(|conn| {
            conn.execute(
                "INSERT INTO controls (tag, station_name, slot_number, kind, equipment_type, range_min, range_max, commanded_value, forced, interlock_blocked)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(tag) DO UPDATE SET commanded_value = excluded.commanded_value, forced = excluded.forced, interlock_blocked = excluded.interlock_blocked",
                params![
                    control.tag,
                    reference.station_name,
                    reference.slot_number,
                    control_kind_to_str(control.kind),
                    equipment_type_to_str(control.equipment_type),
                    control.range_min,
                    control.range_max,
                    control.commanded_value,
                    control.forced,
                    control.interlock_blocked,
                ],
            )?;
            Ok(())
        })
    }

    pub fn list_controls(&self, station_name: &str) -> Result<Vec<(u16, Control)>, StoreError> {
        self.client.with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT tag, slot_number, kind, equipment_type, range_min, range_max, commanded_value, forced, interlock_blocked FROM controls WHERE station_name = ?1")?;
            let rows = stmt.query_map(params![station_name], |row| {
                let slot_number: u16 = row.get(1)?;
                let kind: String = row.get(2)?;
                let equipment_type: String = row.get(3)?;
                Ok((
                    slot_number,
                    Control {
                        tag: row.get(0)?,
                        kind: control_kind_from_str(&kind),
                        equipment_type: equipment_type_from_str(&equipment_type),
                        range_min: row.get(4)?,
                        range_max: row.get(5)?,
                        commanded_value: row.get(6)?,
                        forced: row.get(7)?,
                        interlock_blocked: row.get(8)?,
                    },
                ))
            })?;
            rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
        })
    }
}

fn control_kind_to_str(kind: ControlKind) -> &'static str {
    match kind {
        ControlKind::Discrete => "DISCRETE",
        ControlKind::Analog => "ANALOG",
    }
}

fn control_kind_from_str(value: &str) -> ControlKind {
    match value {
        "ANALOG" => ControlKind::Analog,
        _ => ControlKind::Discrete,
    }
}

fn equipment_type_to_str(kind: EquipmentType) -> &'static str {
    match kind {
        EquipmentType::Pump => "PUMP",
        EquipmentType::Valve => "VALVE",
        EquipmentType::Blower => "BLOWER",
        EquipmentType::Mixer => "MIXER",
        EquipmentType::Generic => "GENERIC",
    }
}

fn equipment_type_from_str(value: &str) -> EquipmentType {
    match value {
        "PUMP" => EquipmentType::Pump,
        "VALVE" => EquipmentType::Valve,
        "BLOWER" => EquipmentType::Blower,
        "MIXER" => EquipmentType::Mixer,
        _ => EquipmentType::Generic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn sample_device() -> Device {
        Device::new("tank-1", IpAddr::V4(Ipv4Addr::new(192, 168, 1, 100)), DeviceIdentity { vendor_id: 1, device_id: 2, vendor_name: "AquaControl".into(), device_name: "RTU".into() })
    }

    #[test]
    fn upsert_then_list_roundtrips_device() {
        let client = StoreClient::open_in_memory().unwrap();
        let repo = RtuRepository::new(&client);
        repo.upsert_device(&sample_device()).unwrap();
        let devices = repo.list_devices().unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].station_name, "tank-1");
    }

    #[test]
    fn delete_device_cascades_children() {
        let client = StoreClient::open_in_memory().unwrap();
        let repo = RtuRepository::new(&client);
        repo.upsert_device(&sample_device()).unwrap();
        repo.upsert_slot("tank-1", &Slot::new(0, 1, 5, 0, 1)).unwrap();
        repo.delete_device("tank-1").unwrap();
        assert!(repo.list_devices().unwrap().is_empty());
        assert!(repo.list_slots("tank-1").unwrap().is_empty());
    }
}
