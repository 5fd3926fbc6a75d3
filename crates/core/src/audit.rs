//! Audit event recording.
//!
//! Producers hold an `Arc<dyn EventRecorder>` and go through [`record_best_effort`], which never
//! lets a recorder failure reach the caller: a failed audit write is logged and the primary
//! operation carries on.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit log unavailable: {0}")]
    Unavailable(String),
}

/// Result of the audited operation, as seen by the recorder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditOutcome {
    Success,
    Rejected,
    Failed,
}

impl AuditOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Rejected => "REJECTED",
            Self::Failed => "FAILED",
        }
    }

    /// Classifies an HTTP status code.
    pub fn from_status(status: u16) -> Self {
        match status {
            200..=399 => Self::Success,
            400..=499 => Self::Rejected,
            _ => Self::Failed,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AuditEvent {
    pub at: DateTime<Utc>,
    pub actor_role: Option<String>,
    /// What happened, e.g. `POST /patient-states/transition` or `patient.transition`.
    pub action: String,
    /// What it happened to, e.g. a patient id or a request path.
    pub resource: String,
    pub outcome: AuditOutcome,
}

pub trait EventRecorder: Send + Sync {
    fn record(&self, event: &AuditEvent) -> Result<(), AuditError>;
}

/// Records `event`, logging rather than returning any failure.
pub fn record_best_effort(recorder: &dyn EventRecorder, event: AuditEvent) {
    if let Err(e) = recorder.record(&event) {
        tracing::warn!(
            action = %event.action,
            resource = %event.resource,
            "failed to record audit event: {}",
            e
        );
    }
}

/// Bounded in-memory audit trail; the oldest events are dropped once `capacity` is reached.
pub struct AuditLog {
    capacity: usize,
    events: Mutex<VecDeque<AuditEvent>>,
}

impl AuditLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            events: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
        }
    }

    /// Up to `limit` events, newest first.
    pub fn recent(&self, limit: usize) -> Vec<AuditEvent> {
        match self.events.lock() {
            Ok(events) => events.iter().rev().take(limit).cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventRecorder for AuditLog {
    fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        tracing::info!(
            target: "hms::audit",
            action = %event.action,
            resource = %event.resource,
            role = event.actor_role.as_deref().unwrap_or("-"),
            outcome = ?event.outcome,
            "audit"
        );

        let mut events = self
            .events
            .lock()
            .map_err(|_| AuditError::Unavailable("audit log lock poisoned".into()))?;
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(event.clone());
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Recorder that always fails.
    pub(crate) struct BrokenRecorder;

    impl EventRecorder for BrokenRecorder {
        fn record(&self, _event: &AuditEvent) -> Result<(), AuditError> {
            Err(AuditError::Unavailable("disk on fire".into()))
        }
    }

    fn event(action: &str) -> AuditEvent {
        AuditEvent {
            at: Utc::now(),
            actor_role: Some("ADMIN".into()),
            action: action.into(),
            resource: "/patients".into(),
            outcome: AuditOutcome::Success,
        }
    }

    #[test]
    fn ring_drops_oldest_and_returns_newest_first() {
        let log = AuditLog::new(2);
        assert!(log.is_empty());
        log.record(&event("a")).unwrap();
        log.record(&event("b")).unwrap();
        log.record(&event("c")).unwrap();

        let actions: Vec<String> = log.recent(10).into_iter().map(|e| e.action).collect();
        assert_eq!(actions, vec!["c", "b"]);
        assert_eq!(log.recent(1).len(), 1);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn best_effort_swallows_failures() {
        record_best_effort(&BrokenRecorder, event("ignored"));
    }

    #[test]
    fn outcome_from_status() {
        assert_eq!(AuditOutcome::from_status(201), AuditOutcome::Success);
        assert_eq!(AuditOutcome::from_status(404), AuditOutcome::Rejected);
        assert_eq!(AuditOutcome::from_status(503), AuditOutcome::Failed);
    }
}
