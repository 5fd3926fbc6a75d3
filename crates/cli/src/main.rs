use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use hms_core::{
    Clock, CoreConfig, CoreServices, NonEmptyText, PatientState, ShardableUuid, StaffMember,
    StaffRole, StorageBackend, SystemClock, WindowSpec, WindowStatus, DEFAULT_DATA_DIR,
};

#[derive(Parser)]
#[command(name = "hms")]
#[command(about = "HMS patient state and staff roster CLI")]
struct Cli {
    /// Data directory (defaults to $HMS_DATA_DIR, then "hms_data")
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Staff roster file (defaults to $HMS_STAFF_FILE, then <data-dir>/staff.yaml)
    #[arg(long, global = true)]
    staff_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List all patients
    List,
    /// Register a new patient
    Register {
        given_name: String,
        family_name: String,
        /// Initial state (default WAITING)
        #[arg(long)]
        state: Option<String>,
    },
    /// Move a patient to a new state
    Transition {
        patient_id: String,
        /// Target state, e.g. IN_WARD
        to_state: String,
        /// Free-text note stored on the history entry
        #[arg(long)]
        context: Option<String>,
    },
    /// Show a patient's state history, newest first
    History { patient_id: String },
    /// List staff on shift
    OnShift {
        /// DOCTOR or NURSE
        #[arg(long)]
        role: Option<String>,
        /// Local time to evaluate at, "YYYY-MM-DD HH:MM" (default: now)
        #[arg(long)]
        at: Option<String>,
    },
    /// Manage the staff roster
    Staff {
        #[command(subcommand)]
        command: StaffCommands,
    },
}

#[derive(Subcommand)]
enum StaffCommands {
    /// List staff members
    List {
        #[arg(long)]
        role: Option<String>,
    },
    /// Add a staff member
    Add {
        name: String,
        /// DOCTOR or NURSE
        role: String,
        /// Weekly window "<day>@<HH:MM>-<HH:MM>", day 0 = Sunday; repeatable
        #[arg(long = "window")]
        windows: Vec<String>,
    },
    /// Replace all windows of a staff member
    SetWindows {
        staff_id: String,
        #[arg(long = "window")]
        windows: Vec<String>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("No command given; see --help.");
        return Ok(());
    };

    let data_dir = cli
        .data_dir
        .or_else(|| std::env::var("HMS_DATA_DIR").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
    let staff_file = cli
        .staff_file
        .or_else(|| std::env::var("HMS_STAFF_FILE").ok().map(PathBuf::from));
    let cfg = CoreConfig::new(data_dir, StorageBackend::File, staff_file, 1)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let services = CoreServices::open(Arc::new(cfg), clock.clone())?;

    match command {
        Commands::List => {
            let patients = services.store.list_patients()?;
            if patients.is_empty() {
                println!("No patients found.");
            }
            for patient in patients {
                println!(
                    "ID: {}, Name: {} {}, State: {}, Created: {}",
                    patient.id,
                    patient.given_name,
                    patient.family_name,
                    patient.current_state,
                    patient.created_at.to_rfc3339()
                );
            }
        }
        Commands::Register {
            given_name,
            family_name,
            state,
        } => {
            let initial_state = state.map(|s| s.parse::<PatientState>()).transpose()?;
            let patient = services.store.register_patient(
                NonEmptyText::new(given_name)?,
                NonEmptyText::new(family_name)?,
                initial_state,
            )?;
            println!(
                "Registered patient {} in {}",
                patient.id, patient.current_state
            );
        }
        Commands::Transition {
            patient_id,
            to_state,
            context,
        } => {
            let id = ShardableUuid::parse(&patient_id)?;
            let patient = services.store.transition(
                &id,
                to_state.parse::<PatientState>()?,
                NonEmptyText::optional(context),
            )?;
            println!("Patient {} is now {}", patient.id, patient.current_state);
        }
        Commands::History { patient_id } => {
            let id = ShardableUuid::parse(&patient_id)?;
            let entries = services.store.history(&id)?;
            if entries.is_empty() {
                println!("No transitions recorded.");
            }
            for entry in entries {
                let from = entry
                    .from_state
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "-".into());
                let context = entry
                    .context
                    .map(|c| format!(" ({c})"))
                    .unwrap_or_default();
                println!(
                    "{} {} -> {}{}",
                    entry.created_at.to_rfc3339(),
                    from,
                    entry.to_state,
                    context
                );
            }
        }
        Commands::OnShift { role, at } => {
            let role = role.map(|r| r.parse::<StaffRole>()).transpose()?;
            let now = match at {
                Some(at) => NaiveDateTime::parse_from_str(&at, "%Y-%m-%d %H:%M")?,
                None => clock.local_now(),
            };
            let members = services.staff.on_shift(role, now)?;
            if members.is_empty() {
                println!("Nobody is on shift.");
            }
            for member in members {
                print_member(&member);
            }
        }
        Commands::Staff { command } => match command {
            StaffCommands::List { role } => {
                let role = role.map(|r| r.parse::<StaffRole>()).transpose()?;
                for member in services.staff.list(role)? {
                    print_member(&member);
                }
            }
            StaffCommands::Add {
                name,
                role,
                windows,
            } => {
                let member = services.staff.register(
                    NonEmptyText::new(name)?,
                    role.parse::<StaffRole>()?,
                    parse_windows(&windows)?,
                )?;
                println!("Added {} {}", member.role, member.id);
            }
            StaffCommands::SetWindows { staff_id, windows } => {
                let id = ShardableUuid::parse(&staff_id)?;
                let member = services
                    .staff
                    .replace_windows(&id, parse_windows(&windows)?)?;
                println!(
                    "{} now has {} window(s)",
                    member.id,
                    member.windows.len()
                );
            }
        },
    }

    Ok(())
}

fn print_member(member: &StaffMember) {
    println!("ID: {}, Name: {}, Role: {}", member.id, member.name, member.role);
    for w in &member.windows {
        let status = if w.status.is_active() { "" } else { " (inactive)" };
        println!(
            "    day {} {}-{}{}",
            w.day_of_week, w.start_time, w.end_time, status
        );
    }
}

fn parse_windows(raw: &[String]) -> Result<Vec<WindowSpec>, String> {
    raw.iter().map(|r| parse_window(r)).collect()
}

/// Parses `<day>@<start>-<end>`, e.g. `1@21:00-05:00`.
fn parse_window(raw: &str) -> Result<WindowSpec, String> {
    let invalid = || format!("window must look like 1@21:00-05:00, got '{raw}'");
    let (day, times) = raw.split_once('@').ok_or_else(invalid)?;
    let (start, end) = times.split_once('-').ok_or_else(invalid)?;
    let day_of_week = day.trim().parse::<u8>().map_err(|_| invalid())?;

    Ok(WindowSpec {
        day_of_week,
        start_time: start.trim().to_string(),
        end_time: end.trim().to_string(),
        status: WindowStatus::Active,
    })
}
