// INICIO DEL ARCHIVO [apps/controller/src/bin/seed.rs]
//! =================================================================
//! APARATO: GENESIS FORGE SEEDER (V140.2 - DOCS FIXED)
//! CLASIFICACIÓN: INFRASTRUCTURE UTILITY (ESTRATO L3)
//! RESPONSABILIDAD: SEMBRADO DE UN INVENTARIO DE DESARROLLO PLAUSIBLE
//!
//! Puebla el almacen persistente con el escenario de referencia de
//! spec.md S8 (`tank-1`, `pH_SENSOR_1`, `PUMP_1`) mas un segundo
//! dispositivo y un lazo PID, para que `--simulation-mode` tenga
//! inventario real que espejar sin depender de un descubrimiento DCP.
//! =================================================================

use std::net::{IpAddr, Ipv4Addr};

use dotenvy::dotenv;
use hydroscada_domain_models::{
    ChannelRef, Control, ControlKind, Device, DeviceIdentity, EquipmentType, LinearScale, PidLoop, PidMode,
    PidRuntimeState, PidTuning, Quality, Sensor, Slot,
};
use hydroscada_infra_store::{PidRepository, RtuRepository, StoreClient};
use tracing::info;

fn main() -> anyhow::Result<()> {
    dotenv().ok();
    hydroscada_shared_telemetry::init_tracing("hydroscada_seed");

    info!("💠 [GENESIS_FORGE]: Initiating development inventory hydration...");

    let database_url =
        std::env::var("HYDROSCADA_DATABASE_URL").unwrap_or_else(|_| "hydroscada.sqlite".to_string());
    let store = StoreClient::open(&database_url)?;
    let rtus = RtuRepository::new(&store);
    let pids = PidRepository::new(&store);

    info!("⚙️  [FORGE]: Seeding station `tank-1` (pH dosing skid)...");
    let tank_one = Device::new(
        "tank-1",
        IpAddr::V4(Ipv4Addr::new(192, 168, 1, 100)),
        DeviceIdentity { vendor_id: 0x002A, device_id: 0x0101, vendor_name: "AquaControl".into(), device_name: "pH-RTU-100".into() },
    );
    rtus.upsert_device(&tank_one)?;

    let ph_slot = Slot::new(1, 0x1001, 5, 0, 1);
    rtus.upsert_slot("tank-1", &ph_slot)?;
    let pump_slot = Slot::new(9, 0x2001, 0, 2, 1);
    rtus.upsert_slot("tank-1", &pump_slot)?;

    let ph_sensor = Sensor::new("pH_SENSOR_1", "pH", LinearScale { raw_low: 0.0, raw_high: 14.0, engineering_low: 0.0, engineering_high: 14.0 });
    rtus.upsert_sensor(&ChannelRef { station_name: "tank-1".into(), slot_number: 1, tag: "pH_SENSOR_1".into() }, &ph_sensor)?;

    let mut pump_one = Control::new("PUMP_1", ControlKind::Discrete, EquipmentType::Pump, 0.0, 1.0);
    pump_one.commanded_value = 0.0;
    rtus.upsert_control(&ChannelRef { station_name: "tank-1".into(), slot_number: 9, tag: "PUMP_1".into() }, &pump_one)?;

    info!("⚙️  [FORGE]: Seeding station `pump-station` (transfer pump skid)...");
    let pump_station = Device::new(
        "pump-station",
        IpAddr::V4(Ipv4Addr::new(192, 168, 1, 101)),
        DeviceIdentity { vendor_id: 0x002A, device_id: 0x0205, vendor_name: "AquaControl".into(), device_name: "Transfer-RTU-200".into() },
    );
    rtus.upsert_device(&pump_station)?;

    let flow_slot = Slot::new(1, 0x1002, 5, 0, 1);
    rtus.upsert_slot("pump-station", &flow_slot)?;
    let mut flow_sensor = Sensor::new("FLOW_SENSOR_1", "L/min", LinearScale { raw_low: 0.0, raw_high: 500.0, engineering_low: 0.0, engineering_high: 500.0 });
    flow_sensor.quality = Quality::NotConnected;
    rtus.upsert_sensor(&ChannelRef { station_name: "pump-station".into(), slot_number: 1, tag: "FLOW_SENSOR_1".into() }, &flow_sensor)?;

    info!("🧪 [FORGE]: Planting a bumpless-transfer-ready PID loop...");
    let ph_loop = PidLoop {
        name: "PH_DOSING_LOOP".into(),
        input: ChannelRef { station_name: "tank-1".into(), slot_number: 1, tag: "pH_SENSOR_1".into() },
        output: ChannelRef { station_name: "tank-1".into(), slot_number: 9, tag: "PUMP_1".into() },
        tuning: PidTuning { kp: 2.0, ki: 0.1, kd: 0.05, derivative_filter: 0.2 },
        setpoint: 7.0,
        output_min: 0.0,
        output_max: 1.0,
        integral_limit: 50.0,
        deadband: 0.05,
        mode: PidMode::Manual,
        state: PidRuntimeState::default(),
    };
    pids.upsert(&ph_loop)?;

    info!("✅ [GENESIS_COMPLETE]: Inventory seeded. Controller ready for `--simulation-mode`.");
    Ok(())
}
// FIN DEL ARCHIVO [apps/controller/src/bin/seed.rs]
