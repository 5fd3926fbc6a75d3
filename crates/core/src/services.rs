//! Wiring of the core services from a [`CoreConfig`].

use crate::audit::AuditLog;
use crate::clock::Clock;
use crate::config::{CoreConfig, StorageBackend};
use crate::kpi::DashboardKpis;
use crate::repositories::open_repository;
use crate::staff::StaffDirectory;
use crate::state_store::PatientStateStore;
use crate::CoreResult;
use std::sync::Arc;

/// Everything a front end (REST, CLI) needs, sharing one audit log and one clock.
#[derive(Clone)]
pub struct CoreServices {
    pub cfg: Arc<CoreConfig>,
    pub store: PatientStateStore,
    pub staff: Arc<StaffDirectory>,
    pub audit: Arc<AuditLog>,
    pub clock: Arc<dyn Clock>,
}

impl CoreServices {
    /// Opens the configured repository and staff roster.
    ///
    /// With the memory backend the roster is in-memory too; with the file backend it is loaded
    /// from (and written back to) the configured staff file.
    pub fn open(cfg: Arc<CoreConfig>, clock: Arc<dyn Clock>) -> CoreResult<Self> {
        let audit = Arc::new(AuditLog::new(cfg.audit_capacity()));
        let repo = open_repository(&cfg)?;
        let staff = match cfg.storage_backend() {
            StorageBackend::Memory => StaffDirectory::in_memory(),
            StorageBackend::File => StaffDirectory::load(cfg.staff_file().to_path_buf())?,
        };
        let store = PatientStateStore::new(repo, audit.clone(), clock.clone());

        Ok(Self {
            cfg,
            store,
            staff: Arc::new(staff),
            audit,
            clock,
        })
    }

    /// KPIs as of the clock's current time.
    pub fn kpis(&self) -> CoreResult<DashboardKpis> {
        DashboardKpis::compute(
            &self.store,
            &self.staff,
            self.clock.local_now(),
            self.clock.now(),
        )
    }
}
