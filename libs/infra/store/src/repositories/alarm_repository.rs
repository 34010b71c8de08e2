// [libs/infra/store/src/repositories/alarm_repository.rs]
/*!
 * APARATO: ALARM REPOSITORY
 * Persistencia de `alarm_rules`, `alarm_events` y `shelved_alarms`
 * (spec.md S6). El motor de alarmas en memoria sigue siendo la fuente de
 * verdad en caliente; este repositorio respalda reinicios del proceso y
 * consultas historicas de eventos.
 */

use chrono::{DateTime, Utc};
use hydroscada_domain_models::{
    AlarmEvent, AlarmEventState, AlarmRule, ChannelRef, ConditionKind, Rationalization, Severity, ShelvingWindow,
};
use rusqlite::params;

use crate::client::StoreClient;
use crate::errors::StoreError;

fn condition_to_str(condition: ConditionKind) -> &'static str {
    match condition {
        ConditionKind::GreaterThan => "GT",
        ConditionKind::LessThan => "LT",
        ConditionKind::GreaterOrEqual => "GE",
        ConditionKind::LessOrEqual => "LE",
        ConditionKind::Equal => "EQ",
        ConditionKind::Deviation => "DEVIATION",
        ConditionKind::RateOfChange => "RATE_OF_CHANGE",
        ConditionKind::BadQuality => "BAD_QUALITY",
    }
}

fn condition_from_str(value: &str) -> ConditionKind {
    match value {
        "LT" => ConditionKind::LessThan,
        "GE" => ConditionKind::GreaterOrEqual,
        "LE" => ConditionKind::LessOrEqual,
        "EQ" => ConditionKind::Equal,
        "DEVIATION" => ConditionKind::Deviation,
        "RATE_OF_CHANGE" => ConditionKind::RateOfChange,
        "BAD_QUALITY" => ConditionKind::BadQuality,
        _ => ConditionKind::GreaterThan,
    }
}

fn severity_to_str(severity: Severity) -> &'static str {
    match severity {
        Severity::Low => "LOW",
        Severity::Medium => "MEDIUM",
        Severity::High => "HIGH",
        Severity::Critical => "CRITICAL",
    }
}

fn severity_from_str(value: &str) -> Severity {
    match value {
        "MEDIUM" => Severity::Medium,
        "HIGH" => Severity::High,
        "CRITICAL" => Severity::Critical,
        _ => Severity::Low,
    }
}

fn event_state_to_str(state: AlarmEventState) -> &'static str {
    match state {
        AlarmEventState::ActiveUnacknowledged => "ACTIVE_UNACK",
        AlarmEventState::ActiveAcknowledged => "ACTIVE_ACK",
        AlarmEventState::ClearedUnacknowledged => "CLEARED_UNACK",
        AlarmEventState::Cleared => "CLEARED",
        AlarmEventState::Shelved => "SHELVED",
    }
}

fn event_state_from_str(value: &str) -> AlarmEventState {
    match value {
        "ACTIVE_ACK" => AlarmEventState::ActiveAcknowledged,
        "CLEARED_UNACK" => AlarmEventState::ClearedUnacknowledged,
        "CLEARED" => AlarmEventState::Cleared,
        "SHELVED" => AlarmEventState::Shelved,
        _ => AlarmEventState::ActiveUnacknowledged,
    }
}

fn to_rfc3339_opt(value: Option<DateTime<Utc>>) -> Option<String> {
    value.map(|v| v.to_rfc3339())
}

fn from_rfc3339_opt(value: Option<String>) -> Option<DateTime<Utc>> {
    value.and_then(|v| DateTime::parse_from_rfc3339(&v).ok()).map(|d| d.with_timezone(&Utc))
}

pub struct AlarmRepository<'a> {
    client: &'a StoreClient,
}

impl<'a> AlarmRepository<'a> {
    pub fn new(client: &'a StoreClient) -> Self {
        Self { client }
    }

    pub fn upsert_rule(&self, rule: &AlarmRule) -> Result<(), StoreError> {
        self.client.with_connection(|conn| {
            conn.execute(
                "INSERT INTO alarm_rules (id, station_name, slot_number, tag, condition, threshold, deviation_reference, severity, debounce_delay_ms, hysteresis_deadband, message_template, enabled, probable_cause, operator_action, consequence_of_inaction)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
                 ON CONFLICT(id) DO UPDATE SET
                    condition = excluded.condition, threshold = excluded.threshold, deviation_reference = excluded.deviation_reference,
                    severity = excluded.severity, debounce_delay_ms = excluded.debounce_delay_ms, hysteresis_deadband = excluded.hysteresis_deadband,
                    message_template = excluded.message_template, enabled = excluded.enabled, probable_cause = excluded.probable_cause,
                    operator_action = excluded.operator_action, consequence_of_inaction = excluded.consequence_of_inaction",
                params![
                    rule.id,
                    rule.target.station_name,
                    rule.target.slot_number,
                    rule.target.tag,
                    condition_to_str(rule.condition),
                    rule.threshold,
                    rule.deviation_reference,
                    severity_to_str(rule.severity),
                    rule.debounce_delay_ms,
                    rule.hysteresis_deadband,
                    rule.message_template,
                    rule.enabled,
                    rule.rationalization.probable_cause,
                    rule.rationalization.operator_action,
                    rule.rationalization.consequence_of_inaction,
                ],
            )?;
            Ok(())
        })
    }

    pub fn delete_rule(&self, id: u64) -> Result<(), StoreError> {
        self.client.with_connection(|conn| {
            conn.execute("DELETE FROM alarm_rules WHERE id = ?1", params![id])?;
            Ok(())
        })
    }

    pub fn list_rules(&self) -> Result<Vec<AlarmRule>, StoreError> {
        self.client.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, station_name, slot_number, tag, condition, threshold, deviation_reference, severity, debounce_delay_ms, hysteresis_deadband, message_template, enabled, probable_cause, operator_action, consequence_of_inaction FROM alarm_rules",
            )?;
            let rows = stmt.query_map([], |row| {
                let condition: String = row.get(4)?;
                let severity: String = row.get(7)?;
                Ok(AlarmRule {
                    id: row.get(0)?,
                    target: ChannelRef { station_name: row.get(1)?, slot_number: row.get(2)?, tag: row.get(3)? },
                    condition: condition_from_str(&condition),
                    threshold: row.get(5)?,
                    deviation_reference: row.get(6)?,
                    severity: severity_from_str(&severity),
                    debounce_delay_ms: row.get(8)?,
                    hysteresis_deadband: row.get(9)?,
                    message_template: row.get(10)?,
                    enabled: row.get(11)?,
                    rationalization: Rationalization { probable_cause: row.get(12)?, operator_action: row.get(13)?, consequence_of_inaction: row.get(14)? },
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
        })
    }

    pub fn upsert_event(&self, event: &AlarmEvent) -> Result<(), StoreError> {
        self.client.with_connection(|conn| {
            conn.execute(
                "INSERT INTO alarm_events (id, rule_id, state, pre_shelve_state, value_at_activation, activated_at, acknowledged_at, acknowledged_by, cleared_at, suppressed, is_first_out, chattering_count)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                 ON CONFLICT(id) DO UPDATE SET
                    state = excluded.state, pre_shelve_state = excluded.pre_shelve_state, acknowledged_at = excluded.acknowledged_at,
                    acknowledged_by = excluded.acknowledged_by, cleared_at = excluded.cleared_at, suppressed = excluded.suppressed,
                    is_first_out = excluded.is_first_out, chattering_count = excluded.chattering_count",
                params![
                    event.id,
                    event.rule_id,
                    event_state_to_str(event.state),
                    event.pre_shelve_state.map(event_state_to_str),
                    event.value_at_activation,
                    event.activated_at.to_rfc3339(),
                    to_rfc3339_opt(event.acknowledged_at),
                    event.acknowledged_by,
                    to_rfc3339_opt(event.cleared_at),
                    event.suppressed,
                    event.is_first_out,
                    event.chattering_count,
                ],
            )?;
            if let Some(shelving) = &event.shelving {
                conn.execute(
                    "INSERT INTO shelved_alarms (event_id, until, reason) VALUES (?1, ?2, ?3)
                     ON CONFLICT(event_id) DO UPDATE SET until = excluded.until, reason = excluded.reason",
                    params![event.id, shelving.until.to_rfc3339(), shelving.reason],
                )?;
            } else {
                conn.execute("DELETE FROM shelved_alarms WHERE event_id = ?1", params![event.id])?;
            }
            Ok(())
        })
    }

    pub fn list_events(&self, state: Option<AlarmEventState>) -> Result<Vec<AlarmEvent>, StoreError> {
        self.client.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT e.id, e.rule_id, e.state, e.pre_shelve_state, e.value_at_activation, e.activated_at, e.acknowledged_at, e.acknowledged_by, e.cleared_at, e.suppressed, e.is_first_out, e.chattering_count, s.until, s.reason
                 FROM alarm_events e LEFT JOIN shelved_alarms s ON s.event_id = e.id
                 WHERE ?1 IS NULL OR e.state = ?1
                 ORDER BY e.activated_at DESC",
            )?;
            let filter = state.map(event_state_to_str);
            let rows = stmt.query_map(params![filter], |row| {
                let event_state: String = row.get(2)?;
                let pre_shelve: Option<String> = row.get(3)?;
                let acknowledged_at: Option<String> = row.get(6)?;
                let cleared_at: Option<String> = row.get(8)?;
                let until: Option<String> = row.get(12)?;
                let reason: Option<String> = row.get(13)?;
                Ok(AlarmEvent {
                    id: row.get(0)?,
                    rule_id: row.get(1)?,
                    state: event_state_from_str(&event_state),
                    pre_shelve_state: pre_shelve.map(|s| event_state_from_str(&s)),
                    value_at_activation: row.get(4)?,
                    activated_at: DateTime::parse_from_rfc3339(&row.get::<_, String>(5)?).map(|d| d.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now()),
                    acknowledged_at: from_rfc3339_opt(acknowledged_at),
                    acknowledged_by: row.get(7)?,
                    cleared_at: from_rfc3339_opt(cleared_at),
                    shelving: until.map(|until| ShelvingWindow { until: DateTime::parse_from_rfc3339(&until).map(|d| d.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now()), reason: reason.unwrap_or_default() }),
                    suppressed: row.get(9)?,
                    is_first_out: row.get(10)?,
                    chattering_count: row.get(11)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydroscada_domain_models::Rationalization;

    fn sample_rule() -> AlarmRule {
        AlarmRule {
            id: 1,
            target: ChannelRef { station_name: "tank-1".into(), slot_number: 1, tag: "pH_SENSOR_1".into() },
            condition: ConditionKind::GreaterThan,
            threshold: 8.5,
            deviation_reference: 0.0,
            severity: Severity::High,
            debounce_delay_ms: 5000,
            hysteresis_deadband: 0.1,
            message_template: "pH high".into(),
            enabled: true,
            rationalization: Rationalization::default(),
        }
    }

    #[test]
    fn rule_roundtrips_through_list() {
        let client = StoreClient::open_in_memory().unwrap();
        let repo = AlarmRepository::new(&client);
        repo.upsert_rule(&sample_rule()).unwrap();
        let rules = repo.list_rules().unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].threshold, 8.5);
    }

    #[test]
    fn delete_removes_rule_from_list() {
        let client = StoreClient::open_in_memory().unwrap();
        let repo = AlarmRepository::new(&client);
        repo.upsert_rule(&sample_rule()).unwrap();
        repo.delete_rule(1).unwrap();
        assert!(repo.list_rules().unwrap().is_empty());
    }

    #[test]
    fn event_with_shelving_roundtrips() {
        let client = StoreClient::open_in_memory().unwrap();
        let repo = AlarmRepository::new(&client);
        let event = AlarmEvent {
            id: 1,
            rule_id: 1,
            state: AlarmEventState::Shelved,
            pre_shelve_state: Some(AlarmEventState::ActiveUnacknowledged),
            value_at_activation: 8.7,
            activated_at: Utc::now(),
            acknowledged_at: None,
            acknowledged_by: None,
            cleared_at: None,
            shelving: Some(ShelvingWindow { until: Utc::now(), reason: "maintenance".into() }),
            suppressed: true,
            is_first_out: true,
            chattering_count: 0,
        };
        repo.upsert_event(&event).unwrap();
        let loaded = repo.list_events(None).unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded[0].shelving.is_some());
    }
}
