//! Patient records and visit history.
//!
//! A [`Patient`] is the unit of storage: demographics, baseline clinical values, the follow-up
//! protocol and every recorded visit live in one JSON document.

use crate::protocol::{ProtocolRecord, WallMotion};
use crate::risk::{PatientSnapshot, RiskResult};
use crate::{EmailAddress, NonEmptyText, ShardableUuid};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "MALE",
            Gender::Female => "FEMALE",
            Gender::Other => "OTHER",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MALE" | "M" => Ok(Gender::Male),
            "FEMALE" | "F" => Ok(Gender::Female),
            "OTHER" => Ok(Gender::Other),
            other => Err(format!("unknown gender '{}'", other)),
        }
    }
}

/// Lifecycle status. Deactivation is a soft delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatientStatus {
    #[default]
    Active,
    Inactive,
    Discharged,
}

impl PatientStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatientStatus::Active => "ACTIVE",
            PatientStatus::Inactive => "INACTIVE",
            PatientStatus::Discharged => "DISCHARGED",
        }
    }
}

impl fmt::Display for PatientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PatientStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(PatientStatus::Active),
            "INACTIVE" => Ok(PatientStatus::Inactive),
            "DISCHARGED" => Ok(PatientStatus::Discharged),
            other => Err(format!("unknown patient status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medication {
    pub name: String,
    #[serde(default)]
    pub dosage: String,
}

/// One clinic visit, with the control flags and alerts computed when it was recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visit {
    pub visit_date: DateTime<Utc>,
    pub visit_number: u32,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default, rename = "systolicBP")]
    pub systolic_bp: Option<f64>,
    #[serde(default, rename = "diastolicBP")]
    pub diastolic_bp: Option<f64>,
    #[serde(default)]
    pub ldl: Option<f64>,
    #[serde(default)]
    pub hba1c: Option<f64>,
    #[serde(default)]
    pub lvef: Option<f64>,
    #[serde(default)]
    pub glucose: Option<f64>,
    #[serde(default)]
    pub wall_motion: Option<WallMotion>,
    #[serde(default)]
    pub outcomes: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub medications: Vec<Medication>,
    #[serde(default)]
    pub lipid_control: bool,
    #[serde(default)]
    pub glycemic_control: bool,
    #[serde(default)]
    pub alerts: Vec<String>,
}

/// Visit data as submitted, before numbering and risk evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisitInput {
    pub visit_date: Option<DateTime<Utc>>,
    pub visit_number: Option<u32>,
    pub weight: Option<f64>,
    pub systolic_bp: Option<f64>,
    pub diastolic_bp: Option<f64>,
    pub ldl: Option<f64>,
    pub hba1c: Option<f64>,
    pub lvef: Option<f64>,
    pub glucose: Option<f64>,
    pub wall_motion: Option<WallMotion>,
    pub outcomes: Option<String>,
    pub notes: Option<String>,
    pub medications: Vec<Medication>,
}

impl Visit {
    /// Builds a visit from `input`, stamping the derived fields from `risk`.
    pub fn from_input(
        input: VisitInput,
        visit_number: u32,
        now: DateTime<Utc>,
        risk: &RiskResult,
    ) -> Self {
        Self {
            visit_date: input.visit_date.unwrap_or(now),
            visit_number,
            weight: input.weight,
            systolic_bp: input.systolic_bp,
            diastolic_bp: input.diastolic_bp,
            ldl: input.ldl,
            hba1c: input.hba1c,
            lvef: input.lvef,
            glucose: input.glucose,
            wall_motion: input.wall_motion,
            outcomes: input.outcomes.and_then(|o| NonEmptyText::optional(o).map(String::from)),
            notes: input.notes.and_then(|n| NonEmptyText::optional(n).map(String::from)),
            medications: input
                .medications
                .into_iter()
                .filter(|m| !m.name.trim().is_empty())
                .collect(),
            lipid_control: risk.lipid_control,
            glycemic_control: risk.glycemic_control,
            alerts: risk.alerts.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: ShardableUuid,
    pub first_name: NonEmptyText,
    pub last_name: NonEmptyText,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    #[serde(default)]
    pub email: Option<EmailAddress>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub is_diabetic: bool,
    #[serde(default, rename = "baselineLDL")]
    pub baseline_ldl: Option<f64>,
    #[serde(default, rename = "baselineLVEF")]
    pub baseline_lvef: Option<f64>,
    #[serde(default)]
    pub intervention_date: Option<NaiveDate>,
    #[serde(default)]
    pub protocol: ProtocolRecord,
    #[serde(default)]
    pub visits: Vec<Visit>,
    #[serde(default)]
    pub next_appointment: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: PatientStatus,
    #[serde(default)]
    pub primary_diagnosis: Option<String>,
    #[serde(default)]
    pub general_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Patient {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Age in whole years on `today`.
    pub fn age(&self, today: NaiveDate) -> i32 {
        let dob = self.date_of_birth;
        let mut age = today.year() - dob.year();
        if (today.month(), today.day()) < (dob.month(), dob.day()) {
            age -= 1;
        }
        age
    }

    pub fn last_visit(&self) -> Option<&Visit> {
        self.visits.last()
    }

    pub fn is_active(&self) -> bool {
        self.status == PatientStatus::Active
    }

    /// Snapshot of the baselines and the most recent visit, or `None` without visits.
    pub fn current_snapshot(&self) -> Option<PatientSnapshot> {
        let last = self.last_visit()?;
        Some(PatientSnapshot {
            baseline_ldl: self.baseline_ldl,
            current_ldl: last.ldl,
            is_diabetic: self.is_diabetic,
            current_hba1c: last.hba1c,
            baseline_lvef: self.baseline_lvef,
            current_lvef: last.lvef,
            visit_number: Some(last.visit_number),
        })
    }

    /// Snapshot for a visit that is about to be recorded.
    pub fn snapshot_for(&self, input: &VisitInput, visit_number: u32) -> PatientSnapshot {
        PatientSnapshot {
            baseline_ldl: self.baseline_ldl,
            current_ldl: input.ldl,
            is_diabetic: self.is_diabetic,
            current_hba1c: input.hba1c,
            baseline_lvef: self.baseline_lvef,
            current_lvef: input.lvef,
            visit_number: Some(visit_number),
        }
    }
}

/// Fields accepted when registering a patient.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPatient {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub is_diabetic: bool,
    pub baseline_ldl: Option<f64>,
    pub baseline_lvef: Option<f64>,
    pub intervention_date: Option<NaiveDate>,
    pub next_appointment: Option<DateTime<Utc>>,
    pub primary_diagnosis: Option<String>,
    pub general_notes: Option<String>,
}

/// Partial update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatientUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub is_diabetic: Option<bool>,
    pub baseline_ldl: Option<f64>,
    pub baseline_lvef: Option<f64>,
    pub intervention_date: Option<NaiveDate>,
    pub next_appointment: Option<DateTime<Utc>>,
    pub status: Option<PatientStatus>,
    pub primary_diagnosis: Option<String>,
    pub general_notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn patient() -> Patient {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        Patient {
            id: ShardableUuid::new(),
            first_name: NonEmptyText::new("Lucia").unwrap(),
            last_name: NonEmptyText::new("Ferrer").unwrap(),
            date_of_birth: NaiveDate::from_ymd_opt(1961, 7, 14).unwrap(),
            gender: Gender::Female,
            email: None,
            phone: None,
            is_diabetic: true,
            baseline_ldl: Some(150.0),
            baseline_lvef: Some(55.0),
            intervention_date: NaiveDate::from_ymd_opt(2026, 1, 10),
            protocol: ProtocolRecord::default(),
            visits: Vec::new(),
            next_appointment: None,
            status: PatientStatus::Active,
            primary_diagnosis: None,
            general_notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn visit(number: u32, ldl: f64) -> Visit {
        Visit::from_input(
            VisitInput {
                ldl: Some(ldl),
                hba1c: Some(6.8),
                lvef: Some(50.0),
                ..VisitInput::default()
            },
            number,
            Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
            &crate::risk::evaluate_risk(&PatientSnapshot::default()),
        )
    }

    #[test]
    fn snapshot_requires_a_visit() {
        assert!(patient().current_snapshot().is_none());
    }

    #[test]
    fn snapshot_uses_last_visit() {
        let mut p = patient();
        p.visits.push(visit(1, 120.0));
        p.visits.push(visit(2, 95.0));

        let snapshot = p.current_snapshot().unwrap();
        assert_eq!(snapshot.current_ldl, Some(95.0));
        assert_eq!(snapshot.baseline_ldl, Some(150.0));
        assert_eq!(snapshot.visit_number, Some(2));
        assert!(snapshot.is_diabetic);
    }

    #[test]
    fn age_counts_completed_years() {
        let p = patient();
        assert_eq!(p.age(NaiveDate::from_ymd_opt(2026, 7, 13).unwrap()), 64);
        assert_eq!(p.age(NaiveDate::from_ymd_opt(2026, 7, 14).unwrap()), 65);
        assert_eq!(p.full_name(), "Lucia Ferrer");
    }

    #[test]
    fn stored_json_round_trips() {
        let mut p = patient();
        p.visits.push(visit(1, 120.0));
        let json = serde_json::to_value(&p).unwrap();

        assert_eq!(json["baselineLDL"], 150.0);
        assert_eq!(json["status"], "ACTIVE");
        assert_eq!(json["protocol"]["override"]["unlocked"], false);
        let back: Patient = serde_json::from_value(json).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn parses_enums_case_insensitively() {
        assert_eq!("female".parse::<Gender>(), Ok(Gender::Female));
        assert_eq!("Discharged".parse::<PatientStatus>(), Ok(PatientStatus::Discharged));
        assert!("unknown".parse::<PatientStatus>().is_err());
    }
}
