//! Event sinks for committed transitions

use approval_types::ApprovalEvent;
use std::sync::Mutex;

/// Receives events after the transition that produced them is committed.
///
/// Delivery failures belong to the sink; they never roll back the
/// transition.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: &ApprovalEvent);
}

/// Logs each event as a structured `tracing` record
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn publish(&self, event: &ApprovalEvent) {
        let context = event.context();
        tracing::info!(
            event = event.kind(),
            request_id = %context.request_id,
            institution_id = %context.institution_id,
            submitter = %context.submitter_id,
            actor = %context.actor_id,
            "Approval event"
        );
    }
}

/// Keeps every event in memory, in publish order
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<ApprovalEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded events
    pub fn events(&self) -> Vec<ApprovalEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Drain the recorded events
    pub fn take(&self) -> Vec<ApprovalEvent> {
        self.events
            .lock()
            .map(|mut events| std::mem::take(&mut *events))
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|events| events.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for RecordingEventSink {
    fn publish(&self, event: &ApprovalEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(_) => tracing::error!(event = event.kind(), "Event recorder lock poisoned"),
        }
    }
}
