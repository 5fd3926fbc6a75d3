//! Dashboard KPI aggregation.

use crate::patient_state::PatientState;
use crate::staff::{StaffDirectory, StaffRole};
use crate::state_store::PatientStateStore;
use crate::CoreResult;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatientKpis {
    pub total: usize,
    pub by_state: BTreeMap<PatientState, usize>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoleKpis {
    pub total: usize,
    pub on_shift: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StaffKpis {
    pub doctors: RoleKpis,
    pub nurses: RoleKpis,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DashboardKpis {
    pub patients: PatientKpis,
    pub staff: StaffKpis,
    pub generated_at: DateTime<Utc>,
}

impl DashboardKpis {
    /// Aggregates patient and staff counts.
    ///
    /// `local_now` is the wall-clock instant used for on-shift evaluation; `generated_at` is only
    /// reported back.
    pub fn compute(
        store: &PatientStateStore,
        directory: &StaffDirectory,
        local_now: NaiveDateTime,
        generated_at: DateTime<Utc>,
    ) -> CoreResult<Self> {
        let by_state = store.state_counts()?;
        let total = by_state.values().sum();

        let role_kpis = |role: StaffRole| -> CoreResult<RoleKpis> {
            Ok(RoleKpis {
                total: directory.list(Some(role))?.len(),
                on_shift: directory.on_shift(Some(role), local_now)?.len(),
            })
        };

        Ok(Self {
            patients: PatientKpis { total, by_state },
            staff: StaffKpis {
                doctors: role_kpis(StaffRole::Doctor)?,
                nurses: role_kpis(StaffRole::Nurse)?,
            },
            generated_at,
        })
    }
}
