// [libs/infra/store/src/repositories/pid_repository.rs]
/*!
 * APARATO: PID LOOP REPOSITORY
 * Persistencia de `pid_loops` (spec.md S6): tuning, setpoint, modo y
 * limites de salida. El estado transitorio por ciclo (integral,
 * PV anterior, ...) nunca se persiste — se reconstruye al entrar en AUTO
 * via transferencia sin salto (spec.md S4.4).
 */

use hydroscada_domain_models::{ChannelRef, PidLoop, PidMode, PidRuntimeState, PidTuning};
use rusqlite::params;

use crate::client::StoreClient;
use crate::errors::StoreError;

fn mode_to_str(mode: PidMode) -> &'static str {
    match mode {
        PidMode::Manual => "MANUAL",
        PidMode::Auto => "AUTO",
        PidMode::Cascade => "CASCADE",
    }
}

fn mode_from_str(value: &str) -> PidMode {
    match value {
        "AUTO" => PidMode::Auto,
        "CASCADE" => PidMode::Cascade,
        _ => PidMode::Manual,
    }
}

pub struct PidRepository<'a> {
    client: &'a StoreClient,
}

impl<'a> PidRepository<'a> {
    pub fn new(client: &'a StoreClient) -> Self {
        Self { client }
    }

    pub fn upsert(&self, pid: &PidLoop) -> Result<(), StoreError> {
        self.client.with_connection(|conn| {
            conn.execute(
                "INSERT INTO pid_loops (name, input_station, input_slot, input_tag, output_station, output_slot, output_tag, kp, ki, kd, derivative_filter, setpoint, output_min, output_max, integral_limit, deadband, mode)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
                 ON CONFLICT(name) DO UPDATE SET
                    kp = excluded.kp, ki = excluded.ki, kd = excluded.kd, derivative_filter = excluded.derivative_filter,
                    setpoint = excluded.setpoint, output_min = excluded.output_min, output_max = excluded.output_max,
                    integral_limit = excluded.integral_limit, deadband = excluded.deadband, mode = excluded.mode",
                params![
                    pid.name,
                    pid.input.station_name, pid.input.slot_number, pid.input.tag,
                    pid.output.station_name, pid.output.slot_number, pid.output.tag,
                    pid.tuning.kp, pid.tuning.ki, pid.tuning.kd, pid.tuning.derivative_filter,
                    pid.setpoint, pid.output_min, pid.output_max, pid.integral_limit, pid.deadband,
                    mode_to_str(pid.mode),
                ],
            )?;
            Ok(())
        })
    }

    pub fn delete(&self, name: &str) -> Result<(), StoreError> {
        self.client.with_connection(|conn| {
            conn.execute("DELETE FROM pid_loops WHERE name = ?1", params![name])?;
            Ok(())
        })
    }

    pub fn list(&self) -> Result<Vec<PidLoop>, StoreError> {
        self.client.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT name, input_station, input_slot, input_tag, output_station, output_slot, output_tag, kp, ki, kd, derivative_filter, setpoint, output_min, output_max, integral_limit, deadband, mode FROM pid_loops",
            )?;
            let rows = stmt.query_map([], |row| {
                let mode: String = row.get(16)?;
                Ok(PidLoop {
                    name: row.get(0)?,
                    input: ChannelRef { station_name: row.get(1)?, slot_number: row.get(2)?, tag: row.get(3)? },
                    output: ChannelRef { station_name: row.get(4)?, slot_number: row.get(5)?, tag: row.get(6)? },
                    tuning: PidTuning { kp: row.get(7)?, ki: row.get(8)?, kd: row.get(9)?, derivative_filter: row.get(10)? },
                    setpoint: row.get(11)?,
                    output_min: row.get(12)?,
                    output_max: row.get(13)?,
                    integral_limit: row.get(14)?,
                    deadband: row.get(15)?,
                    mode: mode_from_str(&mode),
                    state: PidRuntimeState::default(),
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_loop() -> PidLoop {
        PidLoop {
            name: "pH_TRIM".into(),
            input: ChannelRef { station_name: "tank-1".into(), slot_number: 1, tag: "pH_SENSOR_1".into() },
            output: ChannelRef { station_name: "tank-1".into(), slot_number: 9, tag: "DOSE_PUMP".into() },
            tuning: PidTuning { kp: 1.2, ki: 0.3, kd: 0.05, derivative_filter: 0.1 },
            setpoint: 7.2,
            output_min: 0.0,
            output_max: 100.0,
            integral_limit: 50.0,
            deadband: 0.02,
            mode: PidMode::Auto,
            state: PidRuntimeState::default(),
        }
    }

    #[test]
    fn loop_roundtrips_without_runtime_state() {
        let client = StoreClient::open_in_memory().unwrap();
        let repo = PidRepository::new(&client);
        repo.upsert(&sample_loop()).unwrap();
        let loops = repo.list().unwrap();
        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].mode, PidMode::Auto);
        assert_eq!(loops[0].state.integral, 0.0);
    }
}
