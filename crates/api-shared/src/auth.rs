//! API key and role checks.
//!
//! Callers identify themselves with two headers: `x-api-key` (checked only when a key is
//! configured) and `x-user-role`. Both checks are pure so each API surface can map the error to
//! its own status type.

use std::fmt;
use std::str::FromStr;

pub const API_KEY_HEADER: &str = "x-api-key";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("missing or invalid API key")]
    InvalidApiKey,
    #[error("missing user role")]
    MissingRole,
    #[error("unknown user role '{0}'")]
    UnknownRole(String),
    #[error("role {0} is not permitted")]
    Forbidden(Role),
}

impl AuthError {
    /// True for failures that mean "who are you?" rather than "you may not".
    pub fn is_unauthenticated(&self) -> bool {
        !matches!(self, Self::Forbidden(_))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    Doctor,
    Nurse,
    Patient,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Doctor, Role::Nurse, Role::Patient];
    pub const CLINICAL: [Role; 3] = [Role::Admin, Role::Doctor, Role::Nurse];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Doctor => "DOCTOR",
            Self::Nurse => "NURSE",
            Self::Patient => "PATIENT",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| AuthError::UnknownRole(trimmed.to_string()))
    }
}

/// Validates the provided API key against the configured one.
///
/// With no key configured every request passes.
pub fn validate_api_key(provided: Option<&str>, expected: Option<&str>) -> Result<(), AuthError> {
    match expected {
        None => Ok(()),
        Some(expected) if provided == Some(expected) => Ok(()),
        Some(_) => Err(AuthError::InvalidApiKey),
    }
}

/// Parses the caller's role header and checks it against `allowed`.
pub fn authorise(role_header: Option<&str>, allowed: &[Role]) -> Result<Role, AuthError> {
    let raw = role_header
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(AuthError::MissingRole)?;
    let role = Role::from_str(raw)?;
    if allowed.contains(&role) {
        Ok(role)
    } else {
        Err(AuthError::Forbidden(role))
    }
}
