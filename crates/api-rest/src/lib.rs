//! # API REST
//!
//! REST API implementation for HMS.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - API key and role checks on every endpoint except `/health`
//! - audit events for every mutating request
//! - OpenAPI/Swagger documentation
//!
//! Uses `api-shared` for wire types and auth, `hms-core` for everything else.

#![warn(rust_2018_idioms)]

pub mod audit;
pub mod config;
mod convert;
pub mod handlers;

use api_shared::dto;
use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use hms_core::CoreServices;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Application state for the REST API server
///
/// Shared by all request handlers. `api_key` is `None` when no key is configured.
#[derive(Clone)]
pub struct AppState {
    pub services: CoreServices,
    pub api_key: Option<String>,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::create_patient,
        handlers::list_patients,
        handlers::get_patient,
        handlers::transition_patient,
        handlers::patient_history,
        handlers::list_staff,
        handlers::register_staff,
        handlers::replace_windows,
        handlers::staff_on_shift,
        handlers::staff_member_on_shift,
        handlers::kpis,
        handlers::audit_events,
    ),
    components(schemas(
        dto::HealthRes,
        dto::Patient,
        dto::CreatePatientReq,
        dto::ListPatientsRes,
        dto::TransitionReq,
        dto::HistoryEntry,
        dto::HistoryRes,
        dto::Window,
        dto::StaffMember,
        dto::ListStaffRes,
        dto::RegisterStaffReq,
        dto::ReplaceWindowsReq,
        dto::OnShiftRes,
        dto::PatientKpis,
        dto::RoleKpis,
        dto::StaffKpis,
        dto::KpisRes,
        dto::AuditEvent,
        dto::AuditEventsRes,
    ))
)]
pub struct ApiDoc;

/// Builds the full application router, docs included.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/patients",
            get(handlers::list_patients).post(handlers::create_patient),
        )
        .route("/patients/:patient_id", get(handlers::get_patient))
        .route(
            "/patient-states/transition",
            post(handlers::transition_patient),
        )
        .route(
            "/patient-states/:patient_id/history",
            get(handlers::patient_history),
        )
        .route(
            "/staff",
            get(handlers::list_staff).post(handlers::register_staff),
        )
        .route("/staff/on-shift", get(handlers::staff_on_shift))
        .route("/staff/:staff_id/windows", put(handlers::replace_windows))
        .route(
            "/staff/:staff_id/on-shift",
            get(handlers::staff_member_on_shift),
        )
        .route("/audit/kpis", get(handlers::kpis))
        .route("/audit/events", get(handlers::audit_events))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            audit::record_mutations,
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
