// [apps/controller/src/alarms_intake.rs]
/*!
 * APARATO: ACYCLIC ALARM INTAKE
 * Drena el `Receiver` de tramas aciclicas que el Controller enruta fuera
 * del tight loop de tiempo real y traduce cada PDU de alarma de
 * enclavamiento en una notificacion al motor de control (spec.md S4.1,
 * S4.4). DCP y RPC comparten el mismo canal pero aun no tienen un
 * consumidor de dominio propio; se registran y se descartan.
 */

use crossbeam_channel::Receiver;
use hydroscada_core_controller::AcyclicFrame;
use hydroscada_core_frame::{decode_interlock_alarm, FrameKind};
use hydroscada_domain_control::ControlEngine;
use hydroscada_domain_registry::RtuRegistry;
use tracing::{debug, warn};

/// Drena todas las tramas ya disponibles sin bloquear. Se llama una vez
/// por periodo desde el hilo de intake aciclico.
pub fn drain_acyclic_frames(acyclic_rx: &Receiver<AcyclicFrame>, registry: &RtuRegistry, control_engine: &ControlEngine) {
    while let Ok(frame) = acyclic_rx.try_recv() {
        match frame.kind {
            FrameKind::Alarm => apply_interlock_alarm(&frame.payload, registry, control_engine),
            FrameKind::Dcp(_) | FrameKind::RpcUdp => {
                debug!(mac = %frame.src_mac, "acyclic-intake: RPC/DCP frame received, no domain consumer wired yet");
            }
            FrameKind::Rtc1 | FrameKind::Unknown(_) => {}
        }
    }
}

fn apply_interlock_alarm(payload: &[u8], registry: &RtuRegistry, control_engine: &ControlEngine) {
    let Some((tag, active)) = decode_interlock_alarm(payload) else {
        warn!("acyclic-intake: malformed interlock alarm payload, dropping");
        return;
    };
    if let Err(err) = control_engine.notify_interlock(registry, &tag, active) {
        warn!(tag, error = %err, "acyclic-intake: failed to apply interlock notification");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydroscada_core_frame::encode_interlock_alarm;
    use hydroscada_domain_models::{Control, ControlKind, Device, DeviceIdentity, EquipmentType, Slot};
    use pnet::util::MacAddr;
    use std::net::{IpAddr, Ipv4Addr};

    fn registry_with_pump() -> RtuRegistry {
        let registry = RtuRegistry::new();
        registry
            .insert_device(Device::new(
                "tank-1",
                IpAddr::V4(Ipv4Addr::new(192, 168, 1, 50)),
                DeviceIdentity { vendor_id: 1, device_id: 1, vendor_name: "AquaControl".into(), device_name: "RTU".into() },
            ))
            .unwrap();
        registry.lock_slot_layout("tank-1", vec![Slot::new(9, 1, 0, 2, 1)]).unwrap();
        registry.insert_control("tank-1", 9, Control::new("PUMP_1", ControlKind::Discrete, EquipmentType::Pump, 0.0, 1.0)).unwrap();
        registry
    }

    fn bounded_channel() -> (crossbeam_channel::Sender<AcyclicFrame>, Receiver<AcyclicFrame>) {
        crossbeam_channel::bounded(8)
    }

    #[test]
    fn interlock_alarm_frame_blocks_the_named_control() {
        let registry = registry_with_pump();
        let control_engine = ControlEngine::new();
        let (tx, rx) = bounded_channel();

        let payload = encode_interlock_alarm("PUMP_1", true);
        tx.send(AcyclicFrame { kind: FrameKind::Alarm, src_mac: MacAddr::new(2, 0, 0, 0, 0, 9), payload }).unwrap();

        drain_acyclic_frames(&rx, &registry, &control_engine);

        assert!(registry.control(&registry.resolve_tag("PUMP_1").unwrap()).unwrap().interlock_blocked);
    }

    #[test]
    fn malformed_alarm_payload_is_dropped_without_panicking() {
        let registry = registry_with_pump();
        let control_engine = ControlEngine::new();
        let (tx, rx) = bounded_channel();

        tx.send(AcyclicFrame { kind: FrameKind::Alarm, src_mac: MacAddr::new(2, 0, 0, 0, 0, 9), payload: Vec::new() }).unwrap();

        drain_acyclic_frames(&rx, &registry, &control_engine);

        assert!(!registry.control(&registry.resolve_tag("PUMP_1").unwrap()).unwrap().interlock_blocked);
    }

    #[test]
    fn non_alarm_frames_are_ignored() {
        let registry = registry_with_pump();
        let control_engine = ControlEngine::new();
        let (tx, rx) = bounded_channel();

        tx.send(AcyclicFrame { kind: FrameKind::RpcUdp, src_mac: MacAddr::new(2, 0, 0, 0, 0, 9), payload: vec![0xAB] }).unwrap();

        drain_acyclic_frames(&rx, &registry, &control_engine);

        assert!(!registry.control(&registry.resolve_tag("PUMP_1").unwrap()).unwrap().interlock_blocked);
    }
}
