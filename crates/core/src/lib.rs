//! # HMS Core
//!
//! Core business logic for the HMS hospital information system.
//!
//! This crate contains pure data operations:
//! - patient registration and the clinical state transition log ([`PatientStateStore`])
//! - on-shift evaluation over weekly availability windows ([`ShiftAvailabilityEvaluator`])
//! - the staff directory, dashboard KPIs and audit recording
//! - file-backed and in-memory persistence
//!
//! **No API concerns**: authentication, HTTP servers and wire formats belong in `api-rest` and
//! `api-shared`.

pub mod audit;
pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod kpi;
pub mod patient_state;
pub mod repositories;
pub mod services;
pub mod shift;
pub mod staff;
pub mod state_store;

pub use audit::{record_best_effort, AuditEvent, AuditLog, AuditOutcome, EventRecorder};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{CoreConfig, StorageBackend};
pub use constants::DEFAULT_DATA_DIR;
pub use error::{CoreError, CoreResult};
pub use kpi::DashboardKpis;
pub use patient_state::{Patient, PatientState, PatientStateLogEntry};
pub use services::CoreServices;
pub use shift::{AvailabilityWindow, ShiftAvailabilityEvaluator, WindowStatus};
pub use staff::{StaffDirectory, StaffMember, StaffRole, WindowSpec};
pub use state_store::PatientStateStore;

pub use hms_types::{NonEmptyText, TextError};
pub use hms_uuid::ShardableUuid;
