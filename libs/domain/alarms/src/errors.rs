// [libs/domain/alarms/src/errors.rs]
/*!
 * APARATO: ALARM MANAGER ERROR CATALOG
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AlarmError {
    #[error("[ALM_RULE_FAULT]: UNKNOWN_RULE -> {0}")]
    UnknownRule(u64),

    #[error("[ALM_RULE_FAULT]: BOUND_CHANNEL_MISSING -> rule {0} disabled, target channel not found")]
    BoundChannelMissing(u64),

    #[error("[ALM_EVENT_FAULT]: UNKNOWN_EVENT -> {0}")]
    UnknownEvent(u64),

    #[error("[ALM_EVENT_FAULT]: ALREADY_ACKNOWLEDGED -> event {0}")]
    AlreadyAcknowledged(u64),

    #[error("[ALM_EVENT_FAULT]: NOT_SHELVABLE_IN_STATE -> event {0}")]
    NotShelvableInState(u64),

    #[error("[ALM_EVENT_FAULT]: NOT_SHELVED -> event {0}")]
    NotShelved(u64),
}
