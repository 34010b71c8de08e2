// [libs/domain/models/src/device.rs]
/*!
 * APARATO: DEVICE RECORD (RTU)
 * Representa un equipo remoto fisico.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Estado de conexion observable de un dispositivo, espejo del estado de su AR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceConnectionState {
    Disconnected,
    Discovering,
    Connecting,
    Parameterizing,
    Running,
    Error,
}

/// Identidad de vendor/dispositivo tal como se reporta via DCP/I&M.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub vendor_id: u16,
    pub device_id: u16,
    pub vendor_name: String,
    pub device_name: String,
}

/// Un RTU fisico dado de alta en el Registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    /// Nombre de estacion, unico, <=64 caracteres.
    pub station_name: String,
    pub network_address: IpAddr,
    pub identity: DeviceIdentity,
    /// Tiempo de ciclo declarado en microsegundos.
    pub declared_cycle_time_us: u32,
    pub connection_state: DeviceConnectionState,
    pub last_state_change: DateTime<Utc>,
    pub reason: String,
    pub firmware_version: String,
}

impl Device {
    pub fn new(station_name: impl Into<String>, network_address: IpAddr, identity: DeviceIdentity) -> Self {
        Self {
            station_name: station_name.into(),
            network_address,
            identity,
            declared_cycle_time_us: 0,
            connection_state: DeviceConnectionState::Disconnected,
            last_state_change: Utc::now(),
            reason: String::from("INITIAL_INSERTION"),
            firmware_version: String::new(),
        }
    }

    pub fn transition(&mut self, next: DeviceConnectionState, reason: impl Into<String>) {
        self.connection_state = next;
        self.reason = reason.into();
        self.last_state_change = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn sample_identity() -> DeviceIdentity {
        DeviceIdentity {
            vendor_id: 0x002A,
            device_id: 0x0101,
            vendor_name: "AquaControl".into(),
            device_name: "pH-RTU-100".into(),
        }
    }

    #[test]
    fn new_device_starts_disconnected() {
        let device = Device::new("tank-1", IpAddr::V4(Ipv4Addr::new(192, 168, 1, 100)), sample_identity());
        assert_eq!(device.connection_state, DeviceConnectionState::Disconnected);
    }

    #[test]
    fn transition_updates_reason_and_timestamp() {
        let mut device = Device::new("tank-1", IpAddr::V4(Ipv4Addr::new(192, 168, 1, 100)), sample_identity());
        let before = device.last_state_change;
        std::thread::sleep(std::time::Duration::from_millis(2));
        device.transition(DeviceConnectionState::Running, "RUN_REACHED");
        assert_eq!(device.connection_state, DeviceConnectionState::Running);
        assert_eq!(device.reason, "RUN_REACHED");
        assert!(device.last_state_change >= before);
    }
}
