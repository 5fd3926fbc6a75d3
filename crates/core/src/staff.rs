//! Staff directory: doctors and nurses with their weekly availability windows.
//!
//! The roster lives in memory and, when bound to a path, is mirrored to a YAML file:
//!
//! ```yaml
//! staff:
//!   - id: 550e8400e29b41d4a716446655440000
//!     name: Dr Jane Doe
//!     role: DOCTOR
//!     windows:
//!       - day_of_week: 1
//!         start_time: "21:00"
//!         end_time: "05:00"
//!         status: ACTIVE
//! ```
//!
//! Windows in the file carry no owner id; the owner is the enclosing member. The file is parsed
//! strictly (unknown keys are rejected) but window times are not validated on load, so a roster
//! edited by hand with a malformed window still loads and that window simply never matches.

use crate::repositories::file::replace_file;
use crate::shift::{AvailabilityWindow, ShiftAvailabilityEvaluator, WindowStatus};
use crate::{CoreError, CoreResult};
use chrono::NaiveDateTime;
use hms_types::NonEmptyText;
use hms_uuid::ShardableUuid;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::RwLock;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StaffRole {
    Doctor,
    Nurse,
}

impl StaffRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Doctor => "DOCTOR",
            Self::Nurse => "NURSE",
        }
    }
}

impl fmt::Display for StaffRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StaffRole {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DOCTOR" => Ok(Self::Doctor),
            "NURSE" => Ok(Self::Nurse),
            other => Err(CoreError::InvalidInput(format!("unknown staff role '{other}'"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StaffMember {
    pub id: ShardableUuid,
    pub name: NonEmptyText,
    pub role: StaffRole,
    pub windows: Vec<AvailabilityWindow>,
}

/// A window as supplied by a caller, before it is attached to an owner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WindowSpec {
    pub day_of_week: u8,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub status: WindowStatus,
}

impl WindowSpec {
    fn into_window(self, owner_id: &ShardableUuid) -> AvailabilityWindow {
        AvailabilityWindow {
            owner_id: owner_id.clone(),
            day_of_week: self.day_of_week,
            start_time: self.start_time,
            end_time: self.end_time,
            status: self.status,
        }
    }
}

/// Attaches `specs` to `owner_id`, rejecting any window that could never match.
fn build_windows(
    owner_id: &ShardableUuid,
    specs: Vec<WindowSpec>,
) -> CoreResult<Vec<AvailabilityWindow>> {
    specs
        .into_iter()
        .map(|spec| {
            let window = spec.into_window(owner_id);
            window.validate()?;
            Ok(window)
        })
        .collect()
}

pub struct StaffDirectory {
    members: RwLock<BTreeMap<ShardableUuid, StaffMember>>,
    path: Option<PathBuf>,
}

impl StaffDirectory {
    /// An empty directory that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            members: RwLock::new(BTreeMap::new()),
            path: None,
        }
    }

    /// Loads the roster at `path`, or starts empty if the file does not exist yet.
    ///
    /// Later changes are written back to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::FileRead`] if the file exists but cannot be read, and
    /// [`CoreError::Translation`] if it does not match the roster schema.
    pub fn load(path: PathBuf) -> CoreResult<Self> {
        let members = match fs::read_to_string(&path) {
            Ok(text) => StaffRoster::parse(&text)?,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(CoreError::FileRead(e)),
        };
        tracing::info!(
            "loaded {} staff member(s) from {}",
            members.len(),
            path.display()
        );

        Ok(Self {
            members: RwLock::new(
                members
                    .into_iter()
                    .map(|m| (m.id.clone(), m))
                    .collect(),
            ),
            path: Some(path),
        })
    }

    /// Adds a member with a fresh id.
    pub fn register(
        &self,
        name: NonEmptyText,
        role: StaffRole,
        windows: Vec<WindowSpec>,
    ) -> CoreResult<StaffMember> {
        let id = ShardableUuid::new();
        let member = StaffMember {
            windows: build_windows(&id, windows)?,
            id,
            name,
            role,
        };

        self.update(|members| {
            members.insert(member.id.clone(), member.clone());
            Ok(())
        })?;
        tracing::info!("registered {} {}", member.role, member.id);
        Ok(member)
    }

    /// Replaces all windows of an existing member.
    pub fn replace_windows(
        &self,
        id: &ShardableUuid,
        windows: Vec<WindowSpec>,
    ) -> CoreResult<StaffMember> {
        let windows = build_windows(id, windows)?;
        let mut updated = None;
        self.update(|members| {
            let member = members
                .get_mut(id)
                .ok_or_else(|| CoreError::StaffNotFound(id.to_string()))?;
            member.windows = windows;
            updated = Some(member.clone());
            Ok(())
        })?;
        updated.ok_or_else(|| CoreError::StaffNotFound(id.to_string()))
    }

    pub fn get(&self, id: &ShardableUuid) -> CoreResult<StaffMember> {
        let members = self.members.read().map_err(|_| CoreError::LockPoisoned)?;
        members
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::StaffNotFound(id.to_string()))
    }

    /// Members sorted by name, optionally restricted to one role.
    pub fn list(&self, role: Option<StaffRole>) -> CoreResult<Vec<StaffMember>> {
        let members = self.members.read().map_err(|_| CoreError::LockPoisoned)?;
        let mut list: Vec<StaffMember> = members
            .values()
            .filter(|m| role.map_or(true, |r| m.role == r))
            .cloned()
            .collect();
        list.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(list)
    }

    pub fn is_on_shift(&self, id: &ShardableUuid, now: NaiveDateTime) -> CoreResult<bool> {
        let member = self.get(id)?;
        Ok(ShiftAvailabilityEvaluator::is_on_shift_at(&member.windows, now))
    }

    /// Members on shift at `now`, sorted by name.
    pub fn on_shift(
        &self,
        role: Option<StaffRole>,
        now: NaiveDateTime,
    ) -> CoreResult<Vec<StaffMember>> {
        Ok(self
            .list(role)?
            .into_iter()
            .filter(|m| ShiftAvailabilityEvaluator::is_on_shift_at(&m.windows, now))
            .collect())
    }

    /// Applies `change` to a copy of the roster, persists it if file-bound, then publishes it.
    fn update<F>(&self, change: F) -> CoreResult<()>
    where
        F: FnOnce(&mut BTreeMap<ShardableUuid, StaffMember>) -> CoreResult<()>,
    {
        let mut members = self.members.write().map_err(|_| CoreError::LockPoisoned)?;
        let mut next = members.clone();
        change(&mut next)?;

        if let Some(path) = &self.path {
            let list: Vec<StaffMember> = next.values().cloned().collect();
            let text = StaffRoster::render(&list)?;
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(CoreError::StorageDirCreation)?;
            }
            replace_file(path, &text)?;
        }

        *members = next;
        Ok(())
    }
}

/// Roster (de)serialisation.
///
/// Zero-sized type used for namespacing; all methods are associated functions.
pub struct StaffRoster;

impl StaffRoster {
    /// Parse a roster from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Translation`] naming the failing field path when the YAML does not
    /// match the schema, or when two members share an id.
    pub fn parse(yaml_text: &str) -> CoreResult<Vec<StaffMember>> {
        let deserializer = serde_yaml::Deserializer::from_str(yaml_text);
        let wire = match serde_path_to_error::deserialize::<_, RosterWire>(deserializer) {
            Ok(parsed) => parsed,
            Err(err) => {
                let path = err.path().to_string();
                let source = err.into_inner();
                let path = if path.is_empty() {
                    "<root>"
                } else {
                    path.as_str()
                };
                return Err(CoreError::Translation(format!(
                    "Staff roster schema mismatch at {path}: {source}"
                )));
            }
        };

        let mut seen = std::collections::BTreeSet::new();
        let mut members = Vec::with_capacity(wire.staff.len());
        for member in wire.staff {
            if !seen.insert(member.id.clone()) {
                return Err(CoreError::Translation(format!(
                    "Staff roster lists id {} more than once",
                    member.id
                )));
            }
            let windows = member
                .windows
                .into_iter()
                .map(|spec| spec.into_window(&member.id))
                .collect();
            members.push(StaffMember {
                id: member.id,
                name: member.name,
                role: member.role,
                windows,
            });
        }
        Ok(members)
    }

    /// Render a roster as YAML text.
    pub fn render(members: &[StaffMember]) -> CoreResult<String> {
        let wire = RosterWire {
            staff: members
                .iter()
                .map(|m| StaffMemberWire {
                    id: m.id.clone(),
                    name: m.name.clone(),
                    role: m.role,
                    windows: m
                        .windows
                        .iter()
                        .map(|w| WindowSpec {
                            day_of_week: w.day_of_week,
                            start_time: w.start_time.clone(),
                            end_time: w.end_time.clone(),
                            status: w.status,
                        })
                        .collect(),
                })
                .collect(),
        };
        serde_yaml::to_string(&wire).map_err(CoreError::YamlSerialization)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RosterWire {
    #[serde(default)]
    staff: Vec<StaffMemberWire>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct StaffMemberWire {
    id: ShardableUuid,
    name: NonEmptyText,
    role: StaffRole,
    #[serde(default)]
    windows: Vec<WindowSpec>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    // 2024-01-01 is a Monday.
    fn at(day_of_month: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day_of_month)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn spec(day: u8, start: &str, end: &str) -> WindowSpec {
        WindowSpec {
            day_of_week: day,
            start_time: start.into(),
            end_time: end.into(),
            status: WindowStatus::Active,
        }
    }

    const ROSTER: &str = r#"staff:
  - id: 550e8400e29b41d4a716446655440000
    name: Dr Night
    role: DOCTOR
    windows:
      - day_of_week: 1
        start_time: "21:00"
        end_time: "05:00"
        status: ACTIVE
  - id: 7f4c2e9d4b0a4f3a9a2c0e9a6b5d1c88
    name: Nurse Day
    role: NURSE
    windows:
      - day_of_week: 2
        start_time: "08:00"
        end_time: "16:00"
"#;

    #[test]
    fn parses_roster_and_attaches_owner() {
        let members = StaffRoster::parse(ROSTER).expect("parse roster");
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].role, StaffRole::Doctor);
        assert_eq!(members[0].windows[0].owner_id, members[0].id);
        assert_eq!(members[1].windows[0].status, WindowStatus::Active);
    }

    #[test]
    fn roster_round_trips() {
        let members = StaffRoster::parse(ROSTER).unwrap();
        let rendered = StaffRoster::render(&members).unwrap();
        assert_eq!(StaffRoster::parse(&rendered).unwrap(), members);
    }

    #[test]
    fn roster_rejects_unknown_keys_with_path() {
        let input = ROSTER.replace("role: NURSE", "role: NURSE\n    ward: 3");
        match StaffRoster::parse(&input) {
            Err(CoreError::Translation(msg)) => assert!(msg.contains("staff[1]"), "{msg}"),
            other => panic!("expected Translation error, got {other:?}"),
        }
    }

    #[test]
    fn roster_rejects_duplicate_ids() {
        let input = ROSTER.replace(
            "7f4c2e9d4b0a4f3a9a2c0e9a6b5d1c88",
            "550e8400e29b41d4a716446655440000",
        );
        assert!(matches!(
            StaffRoster::parse(&input),
            Err(CoreError::Translation(msg)) if msg.contains("more than once")
        ));
    }

    #[test]
    fn on_shift_filters_by_role_and_time() {
        let dir = StaffDirectory::in_memory();
        let night = dir
            .register(
                NonEmptyText::new("Dr Night").unwrap(),
                StaffRole::Doctor,
                vec![spec(1, "21:00", "05:00")],
            )
            .unwrap();
        dir.register(
            NonEmptyText::new("Nurse Day").unwrap(),
            StaffRole::Nurse,
            vec![spec(2, "00:00", "12:00")],
        )
        .unwrap();

        // Tuesday 02:00: both on shift.
        assert_eq!(dir.on_shift(None, at(2, 2, 0)).unwrap().len(), 2);
        let doctors = dir.on_shift(Some(StaffRole::Doctor), at(2, 2, 0)).unwrap();
        assert_eq!(doctors.len(), 1);
        assert_eq!(doctors[0].id, night.id);

        // Tuesday 10:00: only the nurse.
        assert!(!dir.is_on_shift(&night.id, at(2, 10, 0)).unwrap());
        assert_eq!(dir.on_shift(None, at(2, 10, 0)).unwrap().len(), 1);
    }

    #[test]
    fn register_rejects_invalid_windows_and_keeps_roster_unchanged() {
        let dir = StaffDirectory::in_memory();
        let err = dir
            .register(
                NonEmptyText::new("Dr Typo").unwrap(),
                StaffRole::Doctor,
                vec![spec(8, "09:00", "17:00")],
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
        assert!(dir.list(None).unwrap().is_empty());
    }

    #[test]
    fn unknown_member_is_not_found() {
        let dir = StaffDirectory::in_memory();
        let id = ShardableUuid::new();
        assert!(matches!(dir.get(&id), Err(CoreError::StaffNotFound(_))));
        assert!(matches!(
            dir.is_on_shift(&id, at(1, 9, 0)),
            Err(CoreError::StaffNotFound(_))
        ));
        assert!(matches!(
            dir.replace_windows(&id, vec![]),
            Err(CoreError::StaffNotFound(_))
        ));
    }

    #[test]
    fn file_bound_directory_persists_changes() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("roster").join("staff.yaml");

        let dir = StaffDirectory::load(path.clone()).unwrap();
        assert!(dir.list(None).unwrap().is_empty());
        let member = dir
            .register(
                NonEmptyText::new("Dr Persist").unwrap(),
                StaffRole::Doctor,
                vec![spec(3, "09:00", "17:00")],
            )
            .unwrap();
        dir.replace_windows(&member.id, vec![spec(4, "10:00", "11:00")])
            .unwrap();

        let reloaded = StaffDirectory::load(path).unwrap();
        let stored = reloaded.get(&member.id).unwrap();
        assert_eq!(stored.name.as_str(), "Dr Persist");
        assert_eq!(stored.windows.len(), 1);
        assert_eq!(stored.windows[0].day_of_week, 4);
    }

    #[test]
    fn hand_edited_malformed_window_loads_but_never_matches() {
        let input = ROSTER.replace("end_time: \"05:00\"", "end_time: \"late\"");
        let members = StaffRoster::parse(&input).unwrap();
        assert!(!ShiftAvailabilityEvaluator::is_on_shift_at(
            &members[0].windows,
            at(1, 22, 0)
        ));
    }
}
