use std::path::PathBuf;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use vigil_core::config::{appointment_window_from_env_value, glycemic_policy_from_env_value};
use vigil_core::interpretation::{bmi, format_blood_pressure, format_hba1c, format_ldl, format_lvef};
use vigil_core::{
    dashboard_stats, Actor, CoreConfig, EmailAddress, Gender, NewPatient, NonEmptyText,
    PatientRepository, PatientSnapshot, PatientStatus, Role, DEFAULT_PATIENT_DATA_DIR,
};

#[derive(Parser)]
#[command(name = "vigil")]
#[command(about = "Vigil post-PCI follow-up CLI")]
struct Cli {
    /// Patient data directory
    #[arg(long, env = "PATIENT_DATA_DIR", default_value = DEFAULT_PATIENT_DATA_DIR)]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a risk snapshot without touching stored patients
    Evaluate {
        #[arg(long)]
        baseline_ldl: Option<f64>,
        /// Current LDL (mg/dL)
        #[arg(long)]
        ldl: Option<f64>,
        #[arg(long)]
        diabetic: bool,
        /// Current HbA1c (%)
        #[arg(long)]
        hba1c: Option<f64>,
        #[arg(long)]
        baseline_lvef: Option<f64>,
        /// Current LVEF (%)
        #[arg(long)]
        lvef: Option<f64>,
        /// Visit number (the LVEF check only runs at visit 5)
        #[arg(long)]
        visit: Option<u32>,
        /// Weight (kg), for BMI
        #[arg(long)]
        weight: Option<f64>,
        /// Height (cm), for BMI
        #[arg(long)]
        height: Option<f64>,
    },
    /// Register a new patient
    Register {
        first_name: String,
        last_name: String,
        /// Date of birth (YYYY-MM-DD)
        date_of_birth: NaiveDate,
        /// MALE, FEMALE or OTHER
        gender: String,
        #[arg(long)]
        diabetic: bool,
        #[arg(long)]
        baseline_ldl: Option<f64>,
        #[arg(long)]
        baseline_lvef: Option<f64>,
        /// Date of the PCI (YYYY-MM-DD)
        #[arg(long)]
        intervention_date: Option<NaiveDate>,
    },
    /// List patients
    List {
        /// ACTIVE, INACTIVE or DISCHARGED
        #[arg(long)]
        status: Option<String>,
    },
    /// Show a patient with their latest interpreted values
    Show {
        /// Patient id
        id: String,
    },
    /// Show protocol progress and step availability
    Protocol {
        /// Patient id
        id: String,
    },
    /// Lift protocol gating for a patient (admin)
    Unlock {
        id: String,
        /// Admin name
        name: String,
        /// Admin email
        email: String,
    },
    /// Restore protocol gating for a patient (admin)
    Lock {
        id: String,
        name: String,
        email: String,
    },
    /// Dashboard statistics over active patients
    Dashboard,
}

fn repository(data_dir: PathBuf) -> Result<PatientRepository, Box<dyn std::error::Error>> {
    let policy = glycemic_policy_from_env_value(std::env::var("VIGIL_GLYCEMIC_POLICY").ok())?;
    let window =
        appointment_window_from_env_value(std::env::var("VIGIL_APPOINTMENT_WINDOW_DAYS").ok())?;
    let cfg = CoreConfig::new(data_dir, policy, window)?;
    Ok(PatientRepository::new(Arc::new(cfg)))
}

fn admin(name: String, email: &str) -> Result<Actor, Box<dyn std::error::Error>> {
    Ok(Actor::new(
        NonEmptyText::new(name)?,
        EmailAddress::parse(email)?,
        Role::Admin,
    ))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let repo = repository(cli.data_dir)?;

    match cli.command {
        Some(Commands::Evaluate {
            baseline_ldl,
            ldl,
            diabetic,
            hba1c,
            baseline_lvef,
            lvef,
            visit,
            weight,
            height,
        }) => {
            let snapshot = PatientSnapshot {
                baseline_ldl,
                current_ldl: ldl,
                is_diabetic: diabetic,
                current_hba1c: hba1c,
                baseline_lvef,
                current_lvef: lvef,
                visit_number: visit,
            };
            vigil_core::validation::validate_snapshot(&snapshot)?;
            let risk = repo.config().risk_evaluator().evaluate(&snapshot);

            println!("Risk level: {}", risk.risk_level.as_str());
            println!("LDL:   {}", format_ldl(ldl));
            println!("HbA1c: {}", format_hba1c(hba1c));
            println!("LVEF:  {}", format_lvef(lvef));
            if let Some(b) = bmi(weight, height) {
                println!("BMI:   {} ({})", b.value, b.category);
            }
            for alert in &risk.alerts {
                println!("ALERT: {}", alert);
            }
            for rec in &risk.recommendations {
                println!("- {}", rec);
            }
        }
        Some(Commands::Register {
            first_name,
            last_name,
            date_of_birth,
            gender,
            diabetic,
            baseline_ldl,
            baseline_lvef,
            intervention_date,
        }) => {
            let new = NewPatient {
                first_name,
                last_name,
                date_of_birth,
                gender: gender.parse::<Gender>()?,
                email: None,
                phone: None,
                is_diabetic: diabetic,
                baseline_ldl,
                baseline_lvef,
                intervention_date,
                next_appointment: None,
                primary_diagnosis: None,
                general_notes: None,
            };
            match repo.create(new, Utc::now()) {
                Ok(patient) => println!("Registered patient with ID: {}", patient.id),
                Err(e) => eprintln!("Error registering patient: {}", e),
            }
        }
        Some(Commands::List { status }) => {
            let status = status.map(|s| s.parse::<PatientStatus>()).transpose()?;
            let patients = repo.list(status)?;
            if patients.is_empty() {
                println!("No patients found.");
            } else {
                for patient in patients {
                    println!(
                        "ID: {}, Name: {}, Status: {}, Visits: {}",
                        patient.id,
                        patient.full_name(),
                        patient.status.as_str(),
                        patient.visits.len()
                    );
                }
            }
        }
        Some(Commands::Show { id }) => {
            let patient = repo.get(&id)?;
            let today = Utc::now().date_naive();
            println!("{} ({} years)", patient.full_name(), patient.age(today));
            println!("Status: {}", patient.status.as_str());
            println!("Diabetic: {}", if patient.is_diabetic { "yes" } else { "no" });
            match patient.last_visit() {
                Some(visit) => {
                    println!("Last visit #{} on {}", visit.visit_number, visit.visit_date);
                    println!("  LDL:   {}", format_ldl(visit.ldl));
                    println!("  HbA1c: {}", format_hba1c(visit.hba1c));
                    println!("  LVEF:  {}", format_lvef(visit.lvef));
                    println!(
                        "  BP:    {}",
                        format_blood_pressure(visit.systolic_bp, visit.diastolic_bp)
                    );
                }
                None => println!("No visits recorded."),
            }
            if let Some(snapshot) = patient.current_snapshot() {
                let risk = repo.config().risk_evaluator().evaluate(&snapshot);
                println!("Risk level: {}", risk.risk_level.as_str());
            }
        }
        Some(Commands::Protocol { id }) => {
            let view = repo.protocol(&id, Utc::now())?;
            println!(
                "Completed {}/{} steps; active step {}",
                view.progress.completed, view.progress.total, view.active_step
            );
            if view.record.is_unlocked() {
                println!("Gating lifted by an administrator.");
            }
            for step in vigil_core::protocol::StepId::all() {
                let i = step.index();
                let state = if view.record.is_completed(step) {
                    "completed"
                } else if view.availability.locked[i] {
                    "locked"
                } else if view.availability.available[i] {
                    "available"
                } else {
                    "blocked"
                };
                println!("  [{}] {:<32} {}", step, step.definition().label, state);
            }
        }
        Some(Commands::Unlock { id, name, email }) => {
            let actor = admin(name, &email)?;
            repo.set_protocol_lock(&id, true, &actor, Utc::now())?;
            println!("Protocol unlocked for patient: {}", id);
        }
        Some(Commands::Lock { id, name, email }) => {
            let actor = admin(name, &email)?;
            repo.set_protocol_lock(&id, false, &actor, Utc::now())?;
            println!("Protocol locked for patient: {}", id);
        }
        Some(Commands::Dashboard) => {
            let patients = repo.list(None)?;
            let cfg = repo.config();
            let stats = dashboard_stats(
                &cfg.risk_evaluator(),
                &patients,
                Utc::now(),
                cfg.appointment_window_days(),
            );
            println!("Active patients:       {}", stats.active_patients);
            println!("LDL control:           {}%", stats.ldl_control_percentage);
            println!("Upcoming appointments: {}", stats.upcoming_appointments);
            println!("High-risk patients:    {}", stats.high_risk_patients);
            for series in &stats.chart_data {
                println!(
                    "  {:<10} in target {:>4}, out of target {:>4}",
                    series.name, series.in_target, series.out_of_target
                );
            }
        }
        None => {
            println!("Use 'vigil --help' for commands");
        }
    }

    Ok(())
}
