//! Patient clinical state, patient rows and the transition log entry type.
//!
//! The state graph is deliberately unconstrained: any state may move to any other state, and the
//! only rejected move is a self-transition. There is no terminal state; a discharged patient can
//! be moved back to `WAITING`.

use crate::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use hms_types::NonEmptyText;
use hms_uuid::ShardableUuid;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Coarse clinical-workflow stage of a patient.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatientState {
    #[default]
    Waiting,
    InAppointment,
    InOperation,
    InWard,
    Admitted,
    Discharged,
}

impl PatientState {
    /// Every state, in declaration order.
    pub const ALL: [PatientState; 6] = [
        Self::Waiting,
        Self::InAppointment,
        Self::InOperation,
        Self::InWard,
        Self::Admitted,
        Self::Discharged,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "WAITING",
            Self::InAppointment => "IN_APPOINTMENT",
            Self::InOperation => "IN_OPERATION",
            Self::InWard => "IN_WARD",
            Self::Admitted => "ADMITTED",
            Self::Discharged => "DISCHARGED",
        }
    }
}

impl fmt::Display for PatientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PatientState {
    type Err = CoreError;

    /// Parses the SCREAMING_SNAKE_CASE name, ignoring case and surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| CoreError::InvalidInput(format!("unknown patient state '{wanted}'")))
    }
}

/// Checks whether `current -> target` is permitted.
///
/// # Errors
///
/// Returns [`CoreError::InvalidTransition`] when `target == current`.
pub fn validate_transition(current: PatientState, target: PatientState) -> CoreResult<()> {
    if current == target {
        return Err(CoreError::InvalidTransition(current));
    }
    Ok(())
}

/// A patient row as held by the repository.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Patient {
    pub id: ShardableUuid,
    pub given_name: NonEmptyText,
    pub family_name: NonEmptyText,
    pub current_state: PatientState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One immutable row of a patient's transition history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatientStateLogEntry {
    pub patient_id: ShardableUuid,
    /// `None` only for rows imported without a known prior state.
    pub from_state: Option<PatientState>,
    pub to_state: PatientState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<NonEmptyText>,
    pub created_at: DateTime<Utc>,
}

/// Orders log entries newest first.
///
/// `entries` must be in append order. The log is append-only and `created_at` is stamped under the
/// repository's write lock, never earlier than the previous entry, so reversed append order is
/// also `created_at` descending with ties broken newest-appended first.
pub(crate) fn newest_first(entries: &[PatientStateLogEntry]) -> Vec<PatientStateLogEntry> {
    entries.iter().rev().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn every_distinct_pair_is_a_valid_transition() {
        let mut edges = 0;
        for from in PatientState::ALL {
            for to in PatientState::ALL {
                let result = validate_transition(from, to);
                if from == to {
                    assert!(matches!(result, Err(CoreError::InvalidTransition(s)) if s == from));
                } else {
                    assert!(result.is_ok(), "{from} -> {to} should be allowed");
                    edges += 1;
                }
            }
        }
        assert_eq!(edges, 30);
    }

    #[test]
    fn discharged_is_not_terminal() {
        assert!(validate_transition(PatientState::Discharged, PatientState::Waiting).is_ok());
    }

    #[test]
    fn parses_state_names() {
        assert_eq!(
            "IN_APPOINTMENT".parse::<PatientState>().unwrap(),
            PatientState::InAppointment
        );
        assert_eq!(" in_ward ".parse::<PatientState>().unwrap(), PatientState::InWard);
        assert!(matches!(
            "SLEEPING".parse::<PatientState>(),
            Err(CoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn serializes_as_screaming_snake_case() {
        let yaml = serde_yaml::to_string(&PatientState::InOperation).unwrap();
        assert_eq!(yaml.trim(), "IN_OPERATION");
        for state in PatientState::ALL {
            assert_eq!(state.to_string(), state.as_str());
        }
    }

    fn entry(to: PatientState, secs: i64) -> PatientStateLogEntry {
        PatientStateLogEntry {
            patient_id: ShardableUuid::parse("550e8400e29b41d4a716446655440000").unwrap(),
            from_state: Some(PatientState::Waiting),
            to_state: to,
            context: None,
            created_at: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    #[test]
    fn newest_first_follows_append_order_not_timestamps() {
        let log = vec![
            entry(PatientState::InAppointment, 100),
            entry(PatientState::Admitted, 200),
            entry(PatientState::InWard, 200),
            // Stamped earlier than its predecessor, e.g. after a clock step.
            entry(PatientState::Discharged, 150),
        ];

        let ordered: Vec<PatientState> = newest_first(&log).iter().map(|e| e.to_state).collect();
        assert_eq!(
            ordered,
            vec![
                PatientState::Discharged,
                PatientState::InWard,
                PatientState::Admitted,
                PatientState::InAppointment,
            ]
        );
    }
}
