// [libs/infra/ipc/src/notification.rs]
/*!
 * APARATO: NOTIFICATION RING
 * Cola acotada de un solo productor (el IPC Writer), multiples
 * consumidores logicos (HMI, gateway Modbus): eventos salientes de
 * alarma, cambio de estado de RTU, y failover. Desborda con
 * `DropOldest` -- la telemetria de notificaciones nunca bloquea al
 * productor.
 */

use hydroscada_domain_models::Severity;
use serde::{Deserialize, Serialize};

use crate::errors::IpcError;
use crate::ring::{BoundedRing, OverflowPolicy};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NotificationEvent {
    AlarmRaised { event_id: u64, tag: String, severity: Severity, message: String },
    AlarmCleared { event_id: u64, tag: String },
    AlarmAcknowledged { event_id: u64, user: String },
    DeviceStateChanged { station_name: String, state: String, reason: String },
    AuthorityHandoff { from_epoch: u64, to_epoch: u64, reason: String },
}

pub struct NotificationRing {
    inner: BoundedRing<NotificationEvent>,
}

impl NotificationRing {
    pub fn new(capacity: usize) -> Self {
        Self { inner: BoundedRing::new(capacity, OverflowPolicy::DropOldest) }
    }

    pub fn publish(&self, event: NotificationEvent) -> Result<(), IpcError> {
        self.inner.push(event)
    }

    pub fn next(&self) -> Option<NotificationEvent> {
        self.inner.pop()
    }

    pub fn pending(&self) -> usize {
        self.inner.len()
    }
}
