//! HTTP handlers.
//!
//! Every handler except `health` checks the caller's API key and role first, then maps core
//! errors to a status code and a fixed message; the underlying error is only logged.

use api_shared::{
    auth::{self, API_KEY_HEADER, USER_ROLE_HEADER},
    dto, HealthService, Role,
};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use hms_core::{CoreError, NonEmptyText, PatientState, ShardableUuid, StaffRole, WindowSpec};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{convert, AppState};

type ApiError = (StatusCode, &'static str);

const DEFAULT_AUDIT_LIMIT: usize = 100;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RoleQuery {
    /// `DOCTOR` or `NURSE`
    pub role: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LimitQuery {
    /// Maximum number of events, newest first (default 100)
    pub limit: Option<usize>,
}

/// Checks the API key, then that the caller's role is one of `allowed`.
fn authorise(headers: &HeaderMap, state: &AppState, allowed: &[Role]) -> Result<Role, ApiError> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    auth::validate_api_key(header(API_KEY_HEADER), state.api_key.as_deref())
        .and_then(|()| auth::authorise(header(USER_ROLE_HEADER), allowed))
        .map_err(|e| {
            tracing::warn!("Rejected request: {}", e);
            if e.is_unauthenticated() {
                (StatusCode::UNAUTHORIZED, "Unauthorised")
            } else {
                (StatusCode::FORBIDDEN, "Forbidden")
            }
        })
}

fn core_error(e: CoreError) -> ApiError {
    if e.is_not_found() {
        tracing::warn!("{}", e);
        let message = match e {
            CoreError::StaffNotFound(_) => "Staff member not found",
            _ => "Patient not found",
        };
        return (StatusCode::NOT_FOUND, message);
    }
    if e.is_bad_request() {
        tracing::warn!("Invalid input: {}", e);
        let message = match e {
            CoreError::InvalidTransition(_) => "Patient is already in the requested state",
            _ => "Invalid input",
        };
        return (StatusCode::BAD_REQUEST, message);
    }
    tracing::error!("Storage error: {:?}", e);
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
}

fn parse_id(raw: &str) -> Result<ShardableUuid, ApiError> {
    ShardableUuid::parse(raw).map_err(|e| core_error(e.into()))
}

fn text(raw: String) -> Result<NonEmptyText, ApiError> {
    NonEmptyText::new(raw).map_err(|e| core_error(e.into()))
}

fn staff_role(raw: Option<&str>) -> Result<Option<StaffRole>, ApiError> {
    raw.filter(|r| !r.trim().is_empty())
        .map(|r| r.parse::<StaffRole>())
        .transpose()
        .map_err(core_error)
}

fn window_specs(windows: Vec<dto::Window>) -> Result<Vec<WindowSpec>, ApiError> {
    windows
        .into_iter()
        .map(convert::window_spec)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| core_error(CoreError::InvalidInput(e)))
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = dto::HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Open to unauthenticated callers; used for monitoring and load balancer health checks.
#[axum::debug_handler]
pub async fn health(State(_state): State<AppState>) -> Json<dto::HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    post,
    path = "/patients",
    request_body = dto::CreatePatientReq,
    responses(
        (status = 201, description = "Patient registered", body = dto::Patient),
        (status = 400, description = "Bad request"),
        (status = 401, description = "Unauthorised"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    )
)]
/// Register a new patient
///
/// The patient starts in `initialState` (default `WAITING`) with an empty history.
#[axum::debug_handler]
pub async fn create_patient(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<dto::CreatePatientReq>,
) -> Result<(StatusCode, Json<dto::Patient>), ApiError> {
    authorise(&headers, &state, &Role::CLINICAL)?;

    let given_name = text(req.given_name)?;
    let family_name = text(req.family_name)?;
    let initial_state = req
        .initial_state
        .as_deref()
        .map(str::parse::<PatientState>)
        .transpose()
        .map_err(core_error)?;

    let patient = state
        .services
        .store
        .register_patient(given_name, family_name, initial_state)
        .map_err(core_error)?;
    Ok((StatusCode::CREATED, Json(convert::patient(&patient))))
}

#[utoipa::path(
    get,
    path = "/patients",
    responses(
        (status = 200, description = "List of patients", body = dto::ListPatientsRes),
        (status = 401, description = "Unauthorised"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    )
)]
/// List all patients, oldest registration first
#[axum::debug_handler]
pub async fn list_patients(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<dto::ListPatientsRes>, ApiError> {
    authorise(&headers, &state, &Role::CLINICAL)?;

    let patients = state.services.store.list_patients().map_err(core_error)?;
    Ok(Json(dto::ListPatientsRes {
        patients: patients.iter().map(convert::patient).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/patients/{patient_id}",
    params(("patient_id" = String, Path, description = "Canonical patient id")),
    responses(
        (status = 200, description = "Patient", body = dto::Patient),
        (status = 400, description = "Bad request"),
        (status = 404, description = "Patient not found")
    )
)]
#[axum::debug_handler]
pub async fn get_patient(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(patient_id): Path<String>,
) -> Result<Json<dto::Patient>, ApiError> {
    authorise(&headers, &state, &Role::CLINICAL)?;

    let id = parse_id(&patient_id)?;
    let patient = state.services.store.patient(&id).map_err(core_error)?;
    Ok(Json(convert::patient(&patient)))
}

#[utoipa::path(
    post,
    path = "/patient-states/transition",
    request_body = dto::TransitionReq,
    responses(
        (status = 200, description = "Patient after the transition", body = dto::Patient),
        (status = 400, description = "Same-state transition or invalid input"),
        (status = 401, description = "Unauthorised"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Patient not found"),
        (status = 500, description = "Internal server error; nothing was applied")
    )
)]
/// Move a patient to a new clinical state
///
/// Appends one history entry and updates the patient's current state together. A request for
/// the state the patient is already in is rejected and writes nothing.
#[axum::debug_handler]
pub async fn transition_patient(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<dto::TransitionReq>,
) -> Result<Json<dto::Patient>, ApiError> {
    authorise(&headers, &state, &Role::CLINICAL)?;

    let id = parse_id(&req.patient_id)?;
    let to_state = req.to_state.parse::<PatientState>().map_err(core_error)?;
    let context = NonEmptyText::optional(req.context);

    let patient = state
        .services
        .store
        .transition(&id, to_state, context)
        .map_err(core_error)?;
    Ok(Json(convert::patient(&patient)))
}

#[utoipa::path(
    get,
    path = "/patient-states/{patient_id}/history",
    params(("patient_id" = String, Path, description = "Canonical patient id")),
    responses(
        (status = 200, description = "Transition history, newest first", body = dto::HistoryRes),
        (status = 400, description = "Bad request"),
        (status = 404, description = "Patient not found")
    )
)]
#[axum::debug_handler]
pub async fn patient_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(patient_id): Path<String>,
) -> Result<Json<dto::HistoryRes>, ApiError> {
    authorise(&headers, &state, &Role::CLINICAL)?;

    let id = parse_id(&patient_id)?;
    let entries = state.services.store.history(&id).map_err(core_error)?;
    Ok(Json(dto::HistoryRes {
        patient_id: id.to_string(),
        entries: entries.iter().map(convert::history_entry).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/staff",
    params(RoleQuery),
    responses(
        (status = 200, description = "Staff members sorted by name", body = dto::ListStaffRes),
        (status = 400, description = "Unknown role")
    )
)]
#[axum::debug_handler]
pub async fn list_staff(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<RoleQuery>,
) -> Result<Json<dto::ListStaffRes>, ApiError> {
    authorise(&headers, &state, &Role::CLINICAL)?;

    let role = staff_role(query.role.as_deref())?;
    let staff = state.services.staff.list(role).map_err(core_error)?;
    Ok(Json(dto::ListStaffRes {
        staff: staff.iter().map(convert::staff_member).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/staff",
    request_body = dto::RegisterStaffReq,
    responses(
        (status = 201, description = "Staff member registered", body = dto::StaffMember),
        (status = 400, description = "Invalid role or window"),
        (status = 403, description = "Forbidden")
    )
)]
/// Register a doctor or nurse with their weekly availability windows
#[axum::debug_handler]
pub async fn register_staff(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<dto::RegisterStaffReq>,
) -> Result<(StatusCode, Json<dto::StaffMember>), ApiError> {
    authorise(&headers, &state, &[Role::Admin])?;

    let name = text(req.name)?;
    let role = req.role.parse::<StaffRole>().map_err(core_error)?;
    let windows = window_specs(req.windows)?;

    let member = state
        .services
        .staff
        .register(name, role, windows)
        .map_err(core_error)?;
    Ok((StatusCode::CREATED, Json(convert::staff_member(&member))))
}

#[utoipa::path(
    put,
    path = "/staff/{staff_id}/windows",
    params(("staff_id" = String, Path, description = "Canonical staff id")),
    request_body = dto::ReplaceWindowsReq,
    responses(
        (status = 200, description = "Staff member with the new windows", body = dto::StaffMember),
        (status = 400, description = "Invalid window"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Staff member not found")
    )
)]
#[axum::debug_handler]
pub async fn replace_windows(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(staff_id): Path<String>,
    Json(req): Json<dto::ReplaceWindowsReq>,
) -> Result<Json<dto::StaffMember>, ApiError> {
    authorise(&headers, &state, &[Role::Admin])?;

    let id = parse_id(&staff_id)?;
    let windows = window_specs(req.windows)?;
    let member = state
        .services
        .staff
        .replace_windows(&id, windows)
        .map_err(core_error)?;
    Ok(Json(convert::staff_member(&member)))
}

#[utoipa::path(
    get,
    path = "/staff/on-shift",
    params(RoleQuery),
    responses(
        (status = 200, description = "Staff members on shift now", body = dto::ListStaffRes),
        (status = 400, description = "Unknown role")
    )
)]
#[axum::debug_handler]
pub async fn staff_on_shift(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<RoleQuery>,
) -> Result<Json<dto::ListStaffRes>, ApiError> {
    authorise(&headers, &state, &Role::CLINICAL)?;

    let role = staff_role(query.role.as_deref())?;
    let now = state.services.clock.local_now();
    let staff = state
        .services
        .staff
        .on_shift(role, now)
        .map_err(core_error)?;
    Ok(Json(dto::ListStaffRes {
        staff: staff.iter().map(convert::staff_member).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/staff/{staff_id}/on-shift",
    params(("staff_id" = String, Path, description = "Canonical staff id")),
    responses(
        (status = 200, description = "On-shift badge", body = dto::OnShiftRes),
        (status = 404, description = "Staff member not found")
    )
)]
/// On-shift badge for one staff member; available to every authenticated role
#[axum::debug_handler]
pub async fn staff_member_on_shift(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(staff_id): Path<String>,
) -> Result<Json<dto::OnShiftRes>, ApiError> {
    authorise(&headers, &state, &Role::ALL)?;

    let id = parse_id(&staff_id)?;
    let now = state.services.clock.local_now();
    let on_shift = state
        .services
        .staff
        .is_on_shift(&id, now)
        .map_err(core_error)?;
    Ok(Json(dto::OnShiftRes {
        staff_id: id.to_string(),
        on_shift,
    }))
}

#[utoipa::path(
    get,
    path = "/audit/kpis",
    responses(
        (status = 200, description = "Dashboard KPIs", body = dto::KpisRes),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    )
)]
/// Dashboard KPIs: patients per state and staff on shift now
#[axum::debug_handler]
pub async fn kpis(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<dto::KpisRes>, ApiError> {
    authorise(&headers, &state, &[Role::Admin])?;

    let kpis = state.services.kpis().map_err(core_error)?;
    Ok(Json(convert::kpis(&kpis)))
}

#[utoipa::path(
    get,
    path = "/audit/events",
    params(LimitQuery),
    responses(
        (status = 200, description = "Recent audit events, newest first", body = dto::AuditEventsRes),
        (status = 403, description = "Forbidden")
    )
)]
#[axum::debug_handler]
pub async fn audit_events(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<LimitQuery>,
) -> Result<Json<dto::AuditEventsRes>, ApiError> {
    authorise(&headers, &state, &[Role::Admin])?;

    let limit = query.limit.unwrap_or(DEFAULT_AUDIT_LIMIT);
    let events = state.services.audit.recent(limit);
    Ok(Json(dto::AuditEventsRes {
        events: events.iter().map(convert::audit_event).collect(),
    }))
}
