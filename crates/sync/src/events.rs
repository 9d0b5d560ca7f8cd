//! Sync outcome events.
//!
//! Debounced syncs run on a timer and never return to the caller, so the
//! scheduler broadcasts a [`SyncEvent`] for every attempt. UI code
//! subscribes to show save status.

use serde::Serialize;

use journey_core::ObjectId;

/// What started a sync attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTrigger {
    Debounced,
    Immediate,
}

/// Why an attempt did not reach the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Another sync was already in flight.
    InFlight,
    /// The draft lacks a journey or modules.
    Incomplete,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    Synced {
        trigger: SyncTrigger,
        draft_id: ObjectId,
        created: bool,
    },
    Skipped {
        trigger: SyncTrigger,
        reason: SkipReason,
    },
    Failed {
        trigger: SyncTrigger,
        error: String,
    },
}

impl SyncEvent {
    pub fn trigger(&self) -> SyncTrigger {
        match self {
            Self::Synced { trigger, .. }
            | Self::Skipped { trigger, .. }
            | Self::Failed { trigger, .. } => *trigger,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn serializes_tagged() {
        let event = SyncEvent::Skipped {
            trigger: SyncTrigger::Debounced,
            reason: SkipReason::InFlight,
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "skipped", "trigger": "debounced", "reason": "in_flight"})
        );
        assert_eq!(event.trigger(), SyncTrigger::Debounced);
    }
}
