//! # API Shared
//!
//! Shared utilities and definitions for HMS APIs.
//!
//! Contains:
//! - Wire types (`dto` module), serialised as camelCase JSON with OpenAPI schemas
//! - Shared services like `HealthService`
//! - Authentication and role checks
//!
//! Used by `api-rest` and available to any further API surface.

pub mod auth;
pub mod dto;
pub mod health;

pub use auth::{authorise, validate_api_key, AuthError, Role};
pub use dto::*;
pub use health::HealthService;
