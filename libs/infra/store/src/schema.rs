// [libs/infra/store/src/schema.rs]
/*!
 * APARATO: RELATIONAL SCHEMA
 * Tablas preservadas bit-exactas segun spec.md S6: `rtus`, `slots`,
 * `sensors`, `controls`, `alarm_rules`, `alarm_events`, `shelved_alarms`,
 * `pid_loops`, `historian_tags`, `historian_samples`,
 * `profinet_diagnostics`. Indices: (sensor_id, timestamp) en samples,
 * (state, activated_at) en events.
 */

use rusqlite::Connection;
use tracing::{debug, info, instrument};

use crate::errors::StoreError;

const TABLES: &[(&str, &str)] = &[
    ("rtus", r#"
        CREATE TABLE IF NOT EXISTS rtus (
            station_name TEXT PRIMARY KEY,
            network_address TEXT NOT NULL,
            vendor_id INTEGER NOT NULL,
            device_id INTEGER NOT NULL,
            vendor_name TEXT NOT NULL,
            device_name TEXT NOT NULL,
            declared_cycle_time_us INTEGER NOT NULL DEFAULT 0,
            connection_state TEXT NOT NULL,
            last_state_change TEXT NOT NULL,
            reason TEXT NOT NULL DEFAULT '',
            firmware_version TEXT NOT NULL DEFAULT ''
        );
    "#),
    ("slots", r#"
        CREATE TABLE IF NOT EXISTS slots (
            station_name TEXT NOT NULL REFERENCES rtus(station_name),
            slot_number INTEGER NOT NULL,
            module_identity INTEGER NOT NULL,
            input_bytes INTEGER NOT NULL,
            output_bytes INTEGER NOT NULL,
            subslot_count INTEGER NOT NULL,
            status TEXT NOT NULL,
            PRIMARY KEY (station_name, slot_number)
        );
    "#),
    ("sensors", r#"
        CREATE TABLE IF NOT EXISTS sensors (
            tag TEXT PRIMARY KEY,
            station_name TEXT NOT NULL REFERENCES rtus(station_name),
            slot_number INTEGER NOT NULL,
            engineering_unit TEXT NOT NULL,
            raw_low REAL NOT NULL,
            raw_high REAL NOT NULL,
            engineering_low REAL NOT NULL,
            engineering_high REAL NOT NULL,
            value REAL NOT NULL DEFAULT 0,
            quality TEXT NOT NULL,
            last_update TEXT NOT NULL
        );
    "#),
    ("controls", r#"
        CREATE TABLE IF NOT EXISTS controls (
            tag TEXT PRIMARY KEY,
            station_name TEXT NOT NULL REFERENCES rtus(station_name),
            slot_number INTEGER NOT NULL,
            kind TEXT NOT NULL,
            equipment_type TEXT NOT NULL,
            range_min REAL NOT NULL,
            range_max REAL NOT NULL,
            commanded_value REAL NOT NULL DEFAULT 0,
            forced INTEGER NOT NULL DEFAULT 0,
            interlock_blocked INTEGER NOT NULL DEFAULT 0
        );
    "#),
    ("alarm_rules", r#"
        CREATE TABLE IF NOT EXISTS alarm_rules (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            station_name TEXT NOT NULL,
            slot_number INTEGER NOT NULL,
            tag TEXT NOT NULL,
            condition TEXT NOT NULL,
            threshold REAL NOT NULL,
            deviation_reference REAL NOT NULL DEFAULT 0,
            severity TEXT NOT NULL,
            debounce_delay_ms INTEGER NOT NULL,
            hysteresis_deadband REAL NOT NULL DEFAULT 0,
            message_template TEXT NOT NULL,
            enabled INTEGER NOT NULL DEFAULT 1,
            probable_cause TEXT NOT NULL DEFAULT '',
            operator_action TEXT NOT NULL DEFAULT '',
            consequence_of_inaction TEXT NOT NULL DEFAULT ''
        );
    "#),
    ("alarm_events", r#"
        CREATE TABLE IF NOT EXISTS alarm_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            rule_id INTEGER NOT NULL REFERENCES alarm_rules(id),
            state TEXT NOT NULL,
            pre_shelve_state TEXT,
            value_at_activation REAL NOT NULL,
            activated_at TEXT NOT NULL,
            acknowledged_at TEXT,
            acknowledged_by TEXT,
            cleared_at TEXT,
            suppressed INTEGER NOT NULL DEFAULT 0,
            is_first_out INTEGER NOT NULL DEFAULT 0,
            chattering_count INTEGER NOT NULL DEFAULT 0
        );
    "#),
    ("shelved_alarms", r#"
        CREATE TABLE IF NOT EXISTS shelved_alarms (
            event_id INTEGER PRIMARY KEY REFERENCES alarm_events(id),
            until TEXT NOT NULL,
            reason TEXT NOT NULL
        );
    "#),
    ("pid_loops", r#"
        CREATE TABLE IF NOT EXISTS pid_loops (
            name TEXT PRIMARY KEY,
            input_station TEXT NOT NULL,
            input_slot INTEGER NOT NULL,
            input_tag TEXT NOT NULL,
            output_station TEXT NOT NULL,
            output_slot INTEGER NOT NULL,
            output_tag TEXT NOT NULL,
            kp REAL NOT NULL,
            ki REAL NOT NULL,
            kd REAL NOT NULL,
            derivative_filter REAL NOT NULL,
            setpoint REAL NOT NULL,
            output_min REAL NOT NULL,
            output_max REAL NOT NULL,
            integral_limit REAL NOT NULL,
            deadband REAL NOT NULL DEFAULT 0,
            mode TEXT NOT NULL
        );
    "#),
    ("historian_tags", r#"
        CREATE TABLE IF NOT EXISTS historian_tags (
            tag TEXT PRIMARY KEY,
            station_name TEXT NOT NULL,
            slot_number INTEGER NOT NULL,
            sample_rate_ms INTEGER NOT NULL,
            deadband REAL NOT NULL,
            max_interval_ms INTEGER NOT NULL,
            compression TEXT NOT NULL,
            retention_days INTEGER NOT NULL,
            ring_capacity INTEGER NOT NULL
        );
    "#),
    ("historian_samples", r#"
        CREATE TABLE IF NOT EXISTS historian_samples (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sensor_id TEXT NOT NULL REFERENCES historian_tags(tag),
            timestamp TEXT NOT NULL,
            value REAL NOT NULL,
            quality TEXT NOT NULL
        );
    "#),
    ("profinet_diagnostics", r#"
        CREATE TABLE IF NOT EXISTS profinet_diagnostics (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            station_name TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            category TEXT NOT NULL,
            message TEXT NOT NULL
        );
    "#),
];

const INDEXES: &[(&str, &str)] = &[
    ("idx_historian_samples_sensor_ts", "CREATE INDEX IF NOT EXISTS idx_historian_samples_sensor_ts ON historian_samples(sensor_id, timestamp);"),
    ("idx_alarm_events_state_activated", "CREATE INDEX IF NOT EXISTS idx_alarm_events_state_activated ON alarm_events(state, activated_at);"),
    ("idx_slots_station", "CREATE INDEX IF NOT EXISTS idx_slots_station ON slots(station_name);"),
    ("idx_sensors_station", "CREATE INDEX IF NOT EXISTS idx_sensors_station ON sensors(station_name);"),
    ("idx_controls_station", "CREATE INDEX IF NOT EXISTS idx_controls_station ON controls(station_name);"),
    ("idx_diagnostics_station_ts", "CREATE INDEX IF NOT EXISTS idx_diagnostics_station_ts ON profinet_diagnostics(station_name, timestamp);"),
];

/// Aplica el esquema completo de forma idempotente (CREATE IF NOT EXISTS).
#[instrument(skip(connection))]
pub fn apply_schema(connection: &Connection) -> Result<(), StoreError> {
    info!("store: applying relational schema");
    for (name, sql) in TABLES {
        debug!(table = *name, "store: ensuring table");
        connection.execute_batch(sql).map_err(|e| StoreError::SchemaBootstrap(format!("{name}: {e}")))?;
    }
    for (name, sql) in INDEXES {
        debug!(index = *name, "store: ensuring index");
        connection.execute_batch(sql).map_err(|e| StoreError::SchemaBootstrap(format!("{name}: {e}")))?;
    }
    Ok(())
}
