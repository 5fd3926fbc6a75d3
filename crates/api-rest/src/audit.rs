//! Request audit middleware.
//!
//! Every mutating request (anything other than GET, HEAD, OPTIONS or TRACE) produces one audit
//! event once the response is known, whatever its status. Recording is best effort and never
//! changes the response.

use api_shared::{auth::USER_ROLE_HEADER, Role};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use hms_core::{record_best_effort, AuditEvent, AuditOutcome};

use crate::AppState;

pub async fn record_mutations(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    if method.is_safe() {
        return next.run(request).await;
    }

    let path = request.uri().path().to_string();
    let actor_role = request
        .headers()
        .get(USER_ROLE_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<Role>().ok())
        .map(|role| role.to_string());

    let response = next.run(request).await;

    record_best_effort(
        state.services.audit.as_ref(),
        AuditEvent {
            at: state.services.clock.now(),
            actor_role,
            action: format!("{method} {path}"),
            resource: path,
            outcome: AuditOutcome::from_status(response.status().as_u16()),
        },
    );
    response
}
