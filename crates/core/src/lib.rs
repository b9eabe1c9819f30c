//! # Vigil Core
//!
//! Core business logic for the Vigil post-PCI follow-up system.
//!
//! This crate contains pure decision logic and file-based storage:
//! - Risk evaluation and population statistics ([`risk`], [`population`], [`dashboard`])
//! - The 12-month follow-up protocol and its progression gate ([`protocol`])
//! - Patient records and visits with sharded JSON storage ([`patient`], [`repositories`])
//!
//! **No API concerns**: HTTP/gRPC servers and wire types belong in `api-grpc`, `api-rest`, or
//! `api-shared`.

pub mod actor;
pub mod config;
pub mod constants;
pub mod dashboard;
pub mod error;
pub mod interpretation;
pub mod patient;
pub mod population;
pub mod protocol;
pub mod repositories;
pub mod risk;
pub mod validation;

pub use actor::{Actor, Role};
pub use config::CoreConfig;
pub use constants::DEFAULT_PATIENT_DATA_DIR;
pub use dashboard::{dashboard_stats, ChartSeries, DashboardStats};
pub use error::{PatientError, PatientResult};
pub use patient::{
    Gender, Medication, NewPatient, Patient, PatientStatus, PatientUpdate, Visit, VisitInput,
};
pub use population::{aggregate_population, aggregate_population_with, PopulationStats};
pub use repositories::{PatientRepository, ProtocolView};
pub use risk::{
    evaluate_risk, is_in_target, GlycemicPolicy, PatientSnapshot, RiskEvaluator, RiskLevel,
    RiskResult, RuleStatus,
};

pub use vigil_types::{EmailAddress, NonEmptyText, TextError};
pub use vigil_uuid::ShardableUuid;
