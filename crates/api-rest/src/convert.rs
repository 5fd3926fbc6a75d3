//! Mapping between domain types and wire DTOs.

use api_shared::dto;
use hms_core::{
    AuditEvent, DashboardKpis, Patient, PatientStateLogEntry, StaffMember, WindowSpec,
    WindowStatus,
};

pub fn patient(p: &Patient) -> dto::Patient {
    dto::Patient {
        id: p.id.to_string(),
        given_name: p.given_name.to_string(),
        family_name: p.family_name.to_string(),
        current_state: p.current_state.to_string(),
        created_at: p.created_at.to_rfc3339(),
        updated_at: p.updated_at.to_rfc3339(),
    }
}

pub fn history_entry(e: &PatientStateLogEntry) -> dto::HistoryEntry {
    dto::HistoryEntry {
        patient_id: e.patient_id.to_string(),
        from_state: e.from_state.map(|s| s.to_string()),
        to_state: e.to_state.to_string(),
        context: e.context.as_ref().map(|c| c.to_string()),
        created_at: e.created_at.to_rfc3339(),
    }
}

pub fn staff_member(m: &StaffMember) -> dto::StaffMember {
    dto::StaffMember {
        id: m.id.to_string(),
        name: m.name.to_string(),
        role: m.role.to_string(),
        windows: m
            .windows
            .iter()
            .map(|w| dto::Window {
                day_of_week: w.day_of_week,
                start_time: w.start_time.clone(),
                end_time: w.end_time.clone(),
                status: Some(w.status.to_string()),
                is_available: None,
            })
            .collect(),
    }
}

/// Converts a wire window; `status` wins over `isAvailable`, and both absent means active.
pub fn window_spec(w: dto::Window) -> Result<WindowSpec, String> {
    let status = match (w.status.as_deref(), w.is_available) {
        (Some(s), _) => s.parse::<WindowStatus>().map_err(|e| e.to_string())?,
        (None, Some(available)) => WindowStatus::from(available),
        (None, None) => WindowStatus::default(),
    };
    Ok(WindowSpec {
        day_of_week: w.day_of_week,
        start_time: w.start_time,
        end_time: w.end_time,
        status,
    })
}

pub fn kpis(k: &DashboardKpis) -> dto::KpisRes {
    let role = |r: &hms_core::kpi::RoleKpis| dto::RoleKpis {
        total: r.total,
        on_shift: r.on_shift,
    };
    dto::KpisRes {
        patients: dto::PatientKpis {
            total: k.patients.total,
            by_state: k
                .patients
                .by_state
                .iter()
                .map(|(state, count)| (state.to_string(), *count))
                .collect(),
        },
        staff: dto::StaffKpis {
            doctors: role(&k.staff.doctors),
            nurses: role(&k.staff.nurses),
        },
        generated_at: k.generated_at.to_rfc3339(),
    }
}

pub fn audit_event(e: &AuditEvent) -> dto::AuditEvent {
    dto::AuditEvent {
        at: e.at.to_rfc3339(),
        actor_role: e.actor_role.clone(),
        action: e.action.clone(),
        resource: e.resource.clone(),
        outcome: e.outcome.as_str().into(),
    }
}
