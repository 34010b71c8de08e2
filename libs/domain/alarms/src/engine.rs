// [libs/domain/alarms/src/engine.rs]
/*!
 * APARATO: ALARM ENGINE
 * Evaluacion de reglas ISA-18.2 en el Alarm Scan, despues
 * de que el control engine computa sus salidas en el mismo ciclo.
 */

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use hydroscada_domain_models::{
    AlarmAuditRecord, AlarmEvent, AlarmEventState, AlarmRule, ConditionKind, ShelvingWindow,
};
use hydroscada_domain_registry::RtuRegistry;
use tracing::{info, warn};

use crate::condition;
use crate::errors::AlarmError;

/// Parametros operativos del motor de alarmas, ninguno fijado en el
/// modelo de regla porque son politicas del motor, no de la regla
/// individual.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_alarms_per_10min: u32,
    pub flood_window_secs: i64,
    pub chattering_cooloff_secs: i64,
    pub first_out_window_secs: i64,
    pub audit_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { max_alarms_per_10min: 10, flood_window_secs: 600, chattering_cooloff_secs: 300, first_out_window_secs: 1, audit_capacity: 2000 }
    }
}

#[derive(Debug, Default)]
struct RuleRuntime {
    condition_true_since: Option<DateTime<Utc>>,
    condition_false_since: Option<DateTime<Utc>>,
    previous_value: Option<f64>,
    previous_time: Option<DateTime<Utc>>,
    bad_quality_cycles: u32,
    active_event_id: Option<u64>,
    chattering_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct ScanReport {
    pub rules_evaluated: usize,
    pub events_activated: u64,
    pub rules_disabled: Vec<u64>,
}

pub struct AlarmEngine {
    config: EngineConfig,
    rules: RwLock<HashMap<u64, AlarmRule>>,
    runtime: RwLock<HashMap<u64, RuleRuntime>>,
    events: RwLock<HashMap<u64, AlarmEvent>>,
    next_event_id: AtomicU64,
    next_rule_id: AtomicU64,
    audit: RwLock<VecDeque<AlarmAuditRecord>>,
    flood_windows: RwLock<HashMap<String, VecDeque<DateTime<Utc>>>>,
    first_out_groups: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl AlarmEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            rules: RwLock::new(HashMap::new()),
            runtime: RwLock::new(HashMap::new()),
            events: RwLock::new(HashMap::new()),
            next_event_id: AtomicU64::new(1),
            next_rule_id: AtomicU64::new(1),
            audit: RwLock::new(VecDeque::new()),
            flood_windows: RwLock::new(HashMap::new()),
            first_out_groups: RwLock::new(HashMap::new()),
        }
    }

    fn audit(&self, user: impl Into<String>, action: impl Into<String>, event_id: Option<u64>, rule_id: Option<u64>) {
        let mut audit = self.audit.write().expect("LOCK_POISONED");
        if audit.len() >= self.config.audit_capacity {
            audit.pop_front();
        }
        audit.push_back(AlarmAuditRecord { timestamp: Utc::now(), user: user.into(), action: action.into(), event_id, rule_id });
    }

    pub fn audit_trail(&self) -> Vec<AlarmAuditRecord> {
        self.audit.read().expect("LOCK_POISONED").iter().cloned().collect()
    }

    pub fn create_rule(&self, mut rule: AlarmRule) -> u64 {
        if rule.id == 0 {
            rule.id = self.next_rule_id.fetch_add(1, Ordering::Relaxed);
        }
        let id = rule.id;
        self.rules.write().expect("LOCK_POISONED").insert(id, rule);
        self.runtime.write().expect("LOCK_POISONED").insert(id, RuleRuntime::default());
        self.audit("system", "CREATE_RULE", None, Some(id));
        id
    }

    pub fn list_rules(&self) -> Vec<AlarmRule> {
        self.rules.read().expect("LOCK_POISONED").values().cloned().collect()
    }

    pub fn update_rule(&self, rule: AlarmRule, user: &str) -> Result<(), AlarmError> {
        let mut rules = self.rules.write().expect("LOCK_POISONED");
        if !rules.contains_key(&rule.id) {
            return Err(AlarmError::UnknownRule(rule.id));
        }
        let id = rule.id;
        rules.insert(id, rule);
        drop(rules);
        self.audit(user, "UPDATE_RULE", None, Some(id));
        Ok(())
    }

    pub fn delete_rule(&self, rule_id: u64, user: &str) -> Result<(), AlarmError> {
        let mut rules = self.rules.write().expect("LOCK_POISONED");
        rules.remove(&rule_id).ok_or(AlarmError::UnknownRule(rule_id))?;
        drop(rules);
        self.runtime.write().expect("LOCK_POISONED").remove(&rule_id);
        self.audit(user, "DELETE_RULE", None, Some(rule_id));
        Ok(())
    }

    pub fn acknowledge(&self, event_id: u64, user: &str) -> Result<(), AlarmError> {
        let mut events = self.events.write().expect("LOCK_POISONED");
        let event = events.get_mut(&event_id).ok_or(AlarmError::UnknownEvent(event_id))?;
        match event.state {
            AlarmEventState::ActiveUnacknowledged => {
                event.state = AlarmEventState::ActiveAcknowledged;
                event.acknowledged_at = Some(Utc::now());
                event.acknowledged_by = Some(user.to_string());
            }
            AlarmEventState::ClearedUnacknowledged => {
                event.state = AlarmEventState::Cleared;
                event.acknowledged_at = Some(Utc::now());
                event.acknowledged_by = Some(user.to_string());
                let rule_id = event.rule_id;
                drop(events);
                self.clear_active_event(rule_id, event_id);
                self.audit(user, "ACKNOWLEDGE", Some(event_id), Some(rule_id));
                return Ok(());
            }
            _ => return Err(AlarmError::AlreadyAcknowledged(event_id)),
        }
        let rule_id = event.rule_id;
        drop(events);
        self.audit(user, "ACKNOWLEDGE", Some(event_id), Some(rule_id));
        Ok(())
    }

    pub fn shelve(&self, event_id: u64, duration: Duration, reason: &str, user: &str) -> Result<(), AlarmError> {
        let mut events = self.events.write().expect("LOCK_POISONED");
        let event = events.get_mut(&event_id).ok_or(AlarmError::UnknownEvent(event_id))?;
        if event.state == AlarmEventState::Shelved {
            return Err(AlarmError::NotShelvableInState(event_id));
        }
        event.pre_shelve_state = Some(event.state);
        event.state = AlarmEventState::Shelved;
        event.shelving = Some(ShelvingWindow { until: Utc::now() + duration, reason: reason.to_string() });
        let rule_id = event.rule_id;
        drop(events);
        self.audit(user, format!("SHELVE: {reason}"), Some(event_id), Some(rule_id));
        Ok(())
    }

    pub fn unshelve(&self, event_id: u64, user: &str) -> Result<(), AlarmError> {
        let mut events = self.events.write().expect("LOCK_POISONED");
        let event = events.get_mut(&event_id).ok_or(AlarmError::UnknownEvent(event_id))?;
        if event.state != AlarmEventState::Shelved {
            return Err(AlarmError::NotShelved(event_id));
        }
        event.state = event.pre_shelve_state.take().unwrap_or(AlarmEventState::Cleared);
        event.shelving = None;
        let rule_id = event.rule_id;
        drop(events);
        self.audit(user, "UNSHELVE", Some(event_id), Some(rule_id));
        Ok(())
    }

    fn clear_active_event(&self, rule_id: u64, event_id: u64) {
        let mut runtime = self.runtime.write().expect("LOCK_POISONED");
        if let Some(state) = runtime.get_mut(&rule_id) {
            if state.active_event_id == Some(event_id) {
                state.active_event_id = None;
            }
        }
    }

    pub fn event(&self, event_id: u64) -> Option<AlarmEvent> {
        self.events.read().expect("LOCK_POISONED").get(&event_id).cloned()
    }

    pub fn active_events(&self) -> Vec<AlarmEvent> {
        self.events
            .read()
            .expect("LOCK_POISONED")
            .values()
            .filter(|e| !matches!(e.state, AlarmEventState::Cleared))
            .cloned()
            .collect()
    }

    fn clear_ready(rule: &AlarmRule, pv: Option<f64>) -> bool {
        match rule.condition {
            ConditionKind::RateOfChange | ConditionKind::BadQuality => true,
            ConditionKind::Deviation => pv.map(|v| (v - rule.deviation_reference).abs() < rule.threshold - rule.hysteresis_deadband).unwrap_or(true),
            _ => pv.map(|v| (v - rule.threshold).abs() >= rule.hysteresis_deadband).unwrap_or(true),
        }
    }

    fn first_out(&self, station_name: &str, now: DateTime<Utc>) -> bool {
        let mut groups = self.first_out_groups.write().expect("LOCK_POISONED");
        match groups.get(station_name) {
            Some(anchor) if (now - *anchor).num_seconds() <= self.config.first_out_window_secs => false,
            _ => {
                groups.insert(station_name.to_string(), now);
                true
            }
        }
    }

    fn record_flood(&self, tag: &str, now: DateTime<Utc>) -> bool {
        let mut windows = self.flood_windows.write().expect("LOCK_POISONED");
        let window = windows.entry(tag.to_string()).or_default();
        window.push_back(now);
        let cutoff = now - Duration::seconds(self.config.flood_window_secs);
        while matches!(window.front(), Some(t) if *t < cutoff) {
            window.pop_front();
        }
        window.len() as u32 > self.config.max_alarms_per_10min
    }

    /// Un ciclo de Alarm Scan completo: evalua toda regla habilitada,
    /// despues de que el control engine calculo sus salidas en el mismo ciclo.
    pub fn scan(&self, registry: &RtuRegistry, now: DateTime<Utc>) -> ScanReport {
        let mut report = ScanReport::default();
        let mut disabled_ids = Vec::new();

        let rule_ids: Vec<u64> = self.rules.read().expect("LOCK_POISONED").keys().copied().collect();
        for rule_id in rule_ids {
            let mut rules = self.rules.write().expect("LOCK_POISONED");
            let Some(rule) = rules.get_mut(&rule_id) else { continue };
            if !rule.enabled {
                continue;
            }

            let sensor = match registry.sensor(&rule.target) {
                Ok(sensor) => sensor,
                Err(_) => {
                    rule.enabled = false;
                    disabled_ids.push(rule_id);
                    warn!(rule_id, "alarm: bound channel missing, rule disabled");
                    continue;
                }
            };
            let rule_snapshot = rule.clone();
            drop(rules);
            report.rules_evaluated += 1;

            let pv = sensor.usable_value();
            let quality_bad = !sensor.quality.is_usable();

            let mut runtime_guard = self.runtime.write().expect("LOCK_POISONED");
            let runtime = runtime_guard.entry(rule_id).or_default();
            runtime.bad_quality_cycles = if quality_bad { runtime.bad_quality_cycles.saturating_add(1) } else { 0 };

            let rate = match (pv, runtime.previous_value, runtime.previous_time) {
                (Some(v), Some(pv_prev), Some(t_prev)) => {
                    let dt = (now - t_prev).num_milliseconds() as f64 / 1000.0;
                    (dt > 0.0).then(|| (v - pv_prev) / dt)
                }
                _ => None,
            };
            if let Some(v) = pv {
                runtime.previous_value = Some(v);
                runtime.previous_time = Some(now);
            }

            let holds = condition::evaluate(
                rule_snapshot.condition,
                pv,
                runtime.bad_quality_cycles,
                rule_snapshot.threshold,
                rule_snapshot.deviation_reference,
                rate,
                rule_snapshot.hysteresis_deadband,
            );

            if holds {
                runtime.condition_true_since.get_or_insert(now);
                runtime.condition_false_since = None;
            } else {
                runtime.condition_false_since.get_or_insert(now);
                runtime.condition_true_since = None;
            }

            let activate_ready = runtime
                .condition_true_since
                .map(|since| (now - since).num_milliseconds() as u64 >= rule_snapshot.debounce_delay_ms)
                .unwrap_or(false);
            let clear_ready = runtime
                .condition_false_since
                .map(|since| (now - since).num_milliseconds() as u64 >= rule_snapshot.debounce_delay_ms && Self::clear_ready(&rule_snapshot, pv))
                .unwrap_or(false);

            let active_event_id = runtime.active_event_id;
            let chattering_active = runtime.chattering_until.map(|until| now < until).unwrap_or(false);
            drop(runtime_guard);

            match active_event_id {
                None if activate_ready => {
                    let is_flooding = self.record_flood(&rule_snapshot.target.tag, now);
                    if is_flooding {
                        let mut runtime_guard = self.runtime.write().expect("LOCK_POISONED");
                        let runtime = runtime_guard.entry(rule_id).or_default();
                        runtime.chattering_until = Some(now + Duration::seconds(self.config.chattering_cooloff_secs));
                    }
                    let event_id = self.next_event_id.fetch_add(1, Ordering::Relaxed);
                    let is_first_out = self.first_out(&rule_snapshot.target.station_name, now);
                    let event = AlarmEvent {
                        id: event_id,
                        rule_id,
                        state: AlarmEventState::ActiveUnacknowledged,
                        pre_shelve_state: None,
                        value_at_activation: pv.unwrap_or(0.0),
                        activated_at: now,
                        acknowledged_at: None,
                        acknowledged_by: None,
                        cleared_at: None,
                        shelving: None,
                        suppressed: false,
                        is_first_out,
                        chattering_count: if is_flooding { 1 } else { 0 },
                    };
                    self.events.write().expect("LOCK_POISONED").insert(event_id, event);
                    self.runtime.write().expect("LOCK_POISONED").entry(rule_id).or_default().active_event_id = Some(event_id);
                    report.events_activated += 1;
                    info!(rule_id, event_id, first_out = is_first_out, "alarm: activated");
                }
                Some(event_id) if chattering_active && holds => {
                    let mut events = self.events.write().expect("LOCK_POISONED");
                    if let Some(event) = events.get_mut(&event_id) {
                        event.chattering_count += 1;
                    }
                }
                Some(event_id) if clear_ready => {
                    let mut events = self.events.write().expect("LOCK_POISONED");
                    if let Some(event) = events.get_mut(&event_id) {
                        match event.state {
                            AlarmEventState::ActiveUnacknowledged => {
                                event.state = AlarmEventState::ClearedUnacknowledged;
                                event.cleared_at = Some(now);
                            }
                            AlarmEventState::ActiveAcknowledged => {
                                event.state = AlarmEventState::Cleared;
                                event.cleared_at = Some(now);
                            }
                            _ => {}
                        }
                    }
                    drop(events);
                    self.clear_active_event(rule_id, event_id);
                }
                Some(event_id) => {
                    // Todavia shelved, o esperando el delay de clear: restaurar
                    // un shelve temporal vencido.
                    let mut events = self.events.write().expect("LOCK_POISONED");
                    if let Some(event) = events.get_mut(&event_id) {
                        if event.state == AlarmEventState::Shelved {
                            if let Some(window) = &event.shelving {
                                if now >= window.until {
                                    event.state = event.pre_shelve_state.take().unwrap_or(AlarmEventState::ActiveUnacknowledged);
                                    event.shelving = None;
                                }
                            }
                        }
                    }
                }
                None => {}
            }
        }

        report.rules_disabled = disabled_ids;
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydroscada_domain_models::{ChannelRef, Device, DeviceIdentity, LinearScale, Quality, Rationalization, Sensor, Severity, Slot};
    use std::net::{IpAddr, Ipv4Addr};

    fn seeded_registry(tag: &str) -> RtuRegistry {
        let registry = RtuRegistry::new();
        registry
            .insert_device(Device::new("tank-1", IpAddr::V4(Ipv4Addr::new(192, 168, 1, 50)), DeviceIdentity { vendor_id: 1, device_id: 1, vendor_name: "A".into(), device_name: "B".into() }))
            .unwrap();
        registry.lock_slot_layout("tank-1", vec![Slot::new(0, 1, 5, 0, 1)]).unwrap();
        let scale = LinearScale { raw_low: 0.0, raw_high: 1.0, engineering_low: 0.0, engineering_high: 14.0 };
        let mut sensor = Sensor::new(tag, "pH", scale);
        sensor.apply_raw_reading(0.9, Quality::Good);
        registry.insert_sensor("tank-1", 0, sensor).unwrap();
        registry
    }

    fn high_ph_rule(tag: &str) -> AlarmRule {
        AlarmRule {
            id: 0,
            target: ChannelRef { station_name: "tank-1".into(), slot_number: 0, tag: tag.into() },
            condition: ConditionKind::GreaterThan,
            threshold: 8.0,
            deviation_reference: 0.0,
            severity: Severity::High,
            debounce_delay_ms: 0,
            hysteresis_deadband: 0.2,
            message_template: "pH too high".into(),
            enabled: true,
            rationalization: Rationalization::default(),
        }
    }

    #[test]
    fn rule_activates_when_condition_holds_past_debounce() {
        let registry = seeded_registry("pH_1");
        let engine = AlarmEngine::new(EngineConfig::default());
        let id = engine.create_rule(high_ph_rule("pH_1"));
        let report = engine.scan(&registry, Utc::now());
        assert_eq!(report.events_activated, 1);
        assert_eq!(engine.active_events().len(), 1);
        let _ = id;
    }

    #[test]
    fn missing_channel_disables_rule() {
        let registry = seeded_registry("pH_1");
        let engine = AlarmEngine::new(EngineConfig::default());
        engine.create_rule(high_ph_rule("NONEXISTENT_TAG"));
        let report = engine.scan(&registry, Utc::now());
        assert_eq!(report.rules_disabled.len(), 1);
    }

    #[test]
    fn acknowledge_transitions_active_to_acknowledged() {
        let registry = seeded_registry("pH_1");
        let engine = AlarmEngine::new(EngineConfig::default());
        engine.create_rule(high_ph_rule("pH_1"));
        engine.scan(&registry, Utc::now());
        let event_id = engine.active_events()[0].id;
        engine.acknowledge(event_id, "operator1").unwrap();
        assert_eq!(engine.event(event_id).unwrap().state, AlarmEventState::ActiveAcknowledged);
    }

    #[test]
    fn shelve_suppresses_without_altering_condition() {
        let registry = seeded_registry("pH_1");
        let engine = AlarmEngine::new(EngineConfig::default());
        engine.create_rule(high_ph_rule("pH_1"));
        engine.scan(&registry, Utc::now());
        let event_id = engine.active_events()[0].id;
        engine.shelve(event_id, Duration::minutes(5), "noisy sensor", "operator1").unwrap();
        assert_eq!(engine.event(event_id).unwrap().state, AlarmEventState::Shelved);
    }

    #[test]
    fn first_alarm_in_window_is_tagged_first_out() {
        let registry = seeded_registry("pH_1");
        let engine = AlarmEngine::new(EngineConfig::default());
        engine.create_rule(high_ph_rule("pH_1"));
        engine.scan(&registry, Utc::now());
        assert!(engine.active_events()[0].is_first_out);
    }
}
