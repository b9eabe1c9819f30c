//! Patient store.
//!
//! Patients are stored as JSON in a sharded structure:
//!
//! ```text
//! patients/
//!   <s1>/
//!     <s2>/
//!       <uuid>/
//!         patient.json
//! ```
//!
//! where `s1` and `s2` are the first four hex characters of the UUID.
//!
//! All writes are read-modify-write cycles under a single writer lock, and each document is
//! replaced atomically (write to a temporary file, then rename). Reads take no lock.

use super::storage;
use crate::config::CoreConfig;
use crate::error::{PatientError, PatientResult};
use crate::patient::{NewPatient, Patient, PatientStatus, PatientUpdate, Visit, VisitInput};
use crate::protocol::{ProtocolError, ProtocolRecord};
use crate::risk::RiskResult;
use crate::validation;
use crate::{EmailAddress, NonEmptyText, ShardableUuid};
use chrono::{DateTime, NaiveDate, Utc};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

const NAMES_REQUIRED: &str = "first_name and last_name are required";

/// Storage and lifecycle operations for patient records.
#[derive(Clone, Debug)]
pub struct PatientRepository {
    cfg: Arc<CoreConfig>,
    writer: Arc<Mutex<()>>,
}

impl PatientRepository {
    pub fn new(cfg: Arc<CoreConfig>) -> Self {
        Self {
            cfg,
            writer: Arc::new(Mutex::new(())),
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }

    fn patients_dir(&self) -> PathBuf {
        self.cfg.patients_dir()
    }

    /// Registers a new, active patient with an empty protocol and no visits.
    ///
    /// # Errors
    ///
    /// Returns `PatientError::InvalidInput` if either name is blank or a baseline value is not a
    /// finite, non-negative number, and `PatientError::Text` for a malformed email.
    pub fn create(&self, new: NewPatient, now: DateTime<Utc>) -> PatientResult<Patient> {
        let first_name = required_name(&new.first_name)?;
        let last_name = required_name(&new.last_name)?;
        validation::validate_new_patient(&new)?;
        let email = optional_email(new.email)?;

        let _guard = self.writer.lock().map_err(|_| PatientError::LockPoisoned)?;
        let (id, _dir) =
            storage::create_uuid_and_shard_dir(&self.patients_dir(), ShardableUuid::new)?;

        let patient = Patient {
            id,
            first_name,
            last_name,
            date_of_birth: new.date_of_birth,
            gender: new.gender,
            email,
            phone: optional_text(new.phone),
            is_diabetic: new.is_diabetic,
            baseline_ldl: new.baseline_ldl,
            baseline_lvef: new.baseline_lvef,
            intervention_date: new.intervention_date,
            protocol: ProtocolRecord::default(),
            visits: Vec::new(),
            next_appointment: new.next_appointment,
            status: PatientStatus::Active,
            primary_diagnosis: optional_text(new.primary_diagnosis),
            general_notes: optional_text(new.general_notes),
            created_at: now,
            updated_at: now,
        };

        let path = storage::patient_file(&self.patients_dir(), &patient.id);
        storage::write_patient(&path, &patient)?;
        tracing::debug!(patient_id = %patient.id, "patient created");
        Ok(patient)
    }

    /// Loads one patient by canonical identifier.
    pub fn get(&self, id: &str) -> PatientResult<Patient> {
        let id = ShardableUuid::parse(id)?;
        self.load(&id)
    }

    fn load(&self, id: &ShardableUuid) -> PatientResult<Patient> {
        let path = storage::patient_file(&self.patients_dir(), id);
        if !path.is_file() {
            return Err(PatientError::NotFound(id.to_string()));
        }
        storage::read_patient(&path)
    }

    /// Lists patients, optionally filtered by status, sorted by last then first name.
    ///
    /// Files that cannot be parsed are logged and skipped.
    pub fn list(&self, status: Option<PatientStatus>) -> PatientResult<Vec<Patient>> {
        let mut patients: Vec<Patient> = storage::patient_files(&self.patients_dir())
            .into_iter()
            .filter_map(|path| match storage::read_patient(&path) {
                Ok(p) => Some(p),
                Err(e) => {
                    tracing::warn!("failed to read patient {}: {}", path.display(), e);
                    None
                }
            })
            .filter(|p| status.map_or(true, |s| p.status == s))
            .collect();

        patients.sort_by(|a, b| {
            a.last_name
                .as_str()
                .cmp(b.last_name.as_str())
                .then_with(|| a.first_name.as_str().cmp(b.first_name.as_str()))
        });
        Ok(patients)
    }

    /// Applies a partial update; absent fields are left unchanged.
    pub fn update(
        &self,
        id: &str,
        update: PatientUpdate,
        now: DateTime<Utc>,
    ) -> PatientResult<Patient> {
        validation::validate_update(&update)?;
        let first_name = update.first_name.as_deref().map(required_name).transpose()?;
        let last_name = update.last_name.as_deref().map(required_name).transpose()?;
        let email = optional_email(update.email)?;

        self.modify(id, now, |patient| {
            if let Some(v) = first_name {
                patient.first_name = v;
            }
            if let Some(v) = last_name {
                patient.last_name = v;
            }
            if let Some(v) = update.date_of_birth {
                patient.date_of_birth = v;
            }
            if let Some(v) = update.gender {
                patient.gender = v;
            }
            if email.is_some() {
                patient.email = email;
            }
            if let Some(v) = update.phone {
                patient.phone = optional_text(Some(v));
            }
            if let Some(v) = update.is_diabetic {
                patient.is_diabetic = v;
            }
            if update.baseline_ldl.is_some() {
                patient.baseline_ldl = update.baseline_ldl;
            }
            if update.baseline_lvef.is_some() {
                patient.baseline_lvef = update.baseline_lvef;
            }
            if update.intervention_date.is_some() {
                patient.intervention_date = update.intervention_date;
            }
            if update.next_appointment.is_some() {
                patient.next_appointment = update.next_appointment;
            }
            if let Some(v) = update.status {
                patient.status = v;
            }
            if let Some(v) = update.primary_diagnosis {
                patient.primary_diagnosis = optional_text(Some(v));
            }
            if let Some(v) = update.general_notes {
                patient.general_notes = optional_text(Some(v));
            }
            Ok(patient.clone())
        })
    }

    /// Soft delete: marks the patient inactive and keeps the record.
    pub fn deactivate(&self, id: &str, now: DateTime<Utc>) -> PatientResult<Patient> {
        self.modify(id, now, |patient| {
            patient.status = PatientStatus::Inactive;
            Ok(patient.clone())
        })
    }

    /// Records a visit, evaluating risk against the patient's baselines.
    ///
    /// The visit number defaults to one past the number of recorded visits. Returns the stored
    /// visit and the full evaluation.
    pub fn add_visit(
        &self,
        id: &str,
        input: VisitInput,
        now: DateTime<Utc>,
    ) -> PatientResult<(Visit, RiskResult)> {
        validation::validate_visit(&input)?;
        let evaluator = self.cfg.risk_evaluator();

        self.modify(id, now, |patient| {
            let number = input
                .visit_number
                .unwrap_or(patient.visits.len() as u32 + 1);
            let risk = evaluator.evaluate(&patient.snapshot_for(&input, number));
            let visit = Visit::from_input(input, number, now, &risk);
            patient.visits.push(visit.clone());
            tracing::debug!(
                patient_id = %patient.id,
                visit_number = number,
                risk_level = risk.risk_level.as_str(),
                "visit recorded"
            );
            Ok((visit, risk))
        })
    }

    /// Read-modify-write of the protocol record under the writer lock.
    ///
    /// `f` works on a copy; the copy is stored only when `f` succeeds.
    pub fn update_protocol<T>(
        &self,
        id: &str,
        now: DateTime<Utc>,
        f: impl FnOnce(Option<NaiveDate>, &mut ProtocolRecord) -> Result<T, ProtocolError>,
    ) -> PatientResult<T> {
        self.modify(id, now, |patient| {
            let mut protocol = patient.protocol.clone();
            match f(patient.intervention_date, &mut protocol) {
                Ok(value) => {
                    patient.protocol = protocol;
                    Ok(value)
                }
                Err(e) => {
                    tracing::warn!(patient_id = %patient.id, "protocol change refused: {}", e);
                    Err(e.into())
                }
            }
        })
    }

    fn modify<T>(
        &self,
        id: &str,
        now: DateTime<Utc>,
        f: impl FnOnce(&mut Patient) -> PatientResult<T>,
    ) -> PatientResult<T> {
        let id = ShardableUuid::parse(id)?;
        let _guard = self.writer.lock().map_err(|_| PatientError::LockPoisoned)?;

        let mut patient = self.load(&id)?;
        patient.updated_at = now;
        let value = f(&mut patient)?;
        storage::write_patient(&storage::patient_file(&self.patients_dir(), &id), &patient)?;
        tracing::debug!(patient_id = %id, "patient updated");
        Ok(value)
    }
}

fn required_name(value: &str) -> PatientResult<NonEmptyText> {
    NonEmptyText::new(value).map_err(|_| PatientError::InvalidInput(NAMES_REQUIRED.into()))
}

fn optional_email(value: Option<String>) -> PatientResult<Option<EmailAddress>> {
    optional_text(value)
        .map(EmailAddress::parse)
        .transpose()
        .map_err(PatientError::from)
}

fn optional_text(value: Option<String>) -> Option<String> {
    value.and_then(|v| NonEmptyText::optional(v).map(String::from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patient::Gender;
    use crate::risk::{GlycemicPolicy, RiskLevel, HEART_FAILURE_ALERT};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn repo(tmp: &TempDir) -> PatientRepository {
        let cfg = CoreConfig::new(tmp.path().to_path_buf(), GlycemicPolicy::Legacy, 7).unwrap();
        PatientRepository::new(Arc::new(cfg))
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 2, 9, 30, 0).unwrap()
    }

    fn new_patient(first: &str, last: &str) -> NewPatient {
        NewPatient {
            first_name: first.into(),
            last_name: last.into(),
            date_of_birth: NaiveDate::from_ymd_opt(1955, 10, 2).unwrap(),
            gender: Gender::Male,
            email: Some(" J.Soto@Example.org ".into()),
            phone: Some("".into()),
            is_diabetic: true,
            baseline_ldl: Some(150.0),
            baseline_lvef: Some(55.0),
            intervention_date: NaiveDate::from_ymd_opt(2026, 1, 12),
            next_appointment: None,
            primary_diagnosis: Some("NSTEMI".into()),
            general_notes: None,
        }
    }

    #[test]
    fn create_stores_sharded_json() {
        let tmp = TempDir::new().unwrap();
        let repo = repo(&tmp);

        let patient = repo.create(new_patient("Jorge", "Soto"), now()).unwrap();

        let path = patient
            .id
            .sharded_dir(&tmp.path().join("patients"))
            .join("patient.json");
        assert!(path.is_file());
        assert_eq!(patient.status, PatientStatus::Active);
        assert_eq!(patient.email.as_ref().unwrap().as_str(), "j.soto@example.org");
        assert_eq!(patient.phone, None);
        assert_eq!(repo.get(&patient.id.to_string()).unwrap(), patient);
    }

    #[test]
    fn create_requires_names() {
        let tmp = TempDir::new().unwrap();
        let err = repo(&tmp)
            .create(new_patient("  ", "Soto"), now())
            .unwrap_err();
        assert!(matches!(err, PatientError::InvalidInput(_)));
    }

    #[test]
    fn get_distinguishes_invalid_and_missing_ids() {
        let tmp = TempDir::new().unwrap();
        let repo = repo(&tmp);

        assert!(matches!(repo.get("not-a-uuid"), Err(PatientError::Uuid(_))));
        let missing = ShardableUuid::new().to_string();
        assert!(matches!(repo.get(&missing), Err(PatientError::NotFound(_))));
    }

    #[test]
    fn list_sorts_and_filters_by_status() {
        let tmp = TempDir::new().unwrap();
        let repo = repo(&tmp);
        repo.create(new_patient("Marta", "Vidal"), now()).unwrap();
        let ana = repo.create(new_patient("Ana", "Alonso"), now()).unwrap();
        repo.create(new_patient("Berta", "Alonso"), now()).unwrap();

        let names: Vec<String> = repo
            .list(None)
            .unwrap()
            .iter()
            .map(Patient::full_name)
            .collect();
        assert_eq!(names, ["Ana Alonso", "Berta Alonso", "Marta Vidal"]);

        repo.deactivate(&ana.id.to_string(), now()).unwrap();
        assert_eq!(repo.list(Some(PatientStatus::Active)).unwrap().len(), 2);
        assert_eq!(repo.list(Some(PatientStatus::Inactive)).unwrap().len(), 1);
    }

    #[test]
    fn update_changes_only_given_fields() {
        let tmp = TempDir::new().unwrap();
        let repo = repo(&tmp);
        let patient = repo.create(new_patient("Jorge", "Soto"), now()).unwrap();
        let later = now() + chrono::Duration::hours(1);

        let updated = repo
            .update(
                &patient.id.to_string(),
                PatientUpdate {
                    baseline_ldl: Some(140.0),
                    status: Some(PatientStatus::Discharged),
                    ..PatientUpdate::default()
                },
                later,
            )
            .unwrap();

        assert_eq!(updated.baseline_ldl, Some(140.0));
        assert_eq!(updated.status, PatientStatus::Discharged);
        assert_eq!(updated.first_name, patient.first_name);
        assert_eq!(updated.primary_diagnosis.as_deref(), Some("NSTEMI"));
        assert_eq!(updated.updated_at, later);
        assert_eq!(updated.created_at, patient.created_at);
        assert_eq!(repo.get(&patient.id.to_string()).unwrap(), updated);
    }

    #[test]
    fn deactivate_returns_the_stored_record() {
        let tmp = TempDir::new().unwrap();
        let repo = repo(&tmp);
        let patient = repo.create(new_patient("Lucia", "Mena"), now()).unwrap();
        let later = now() + chrono::Duration::days(2);

        let inactive = repo.deactivate(&patient.id.to_string(), later).unwrap();

        assert_eq!(inactive.status, PatientStatus::Inactive);
        assert_eq!(inactive.updated_at, later);
        assert_eq!(repo.get(&patient.id.to_string()).unwrap(), inactive);
    }

    #[test]
    fn add_visit_numbers_and_evaluates() {
        let tmp = TempDir::new().unwrap();
        let repo = repo(&tmp);
        let id = repo
            .create(new_patient("Jorge", "Soto"), now())
            .unwrap()
            .id
            .to_string();

        for _ in 0..4 {
            repo.add_visit(&id, VisitInput::default(), now()).unwrap();
        }
        let (visit, risk) = repo
            .add_visit(
                &id,
                VisitInput {
                    ldl: Some(90.0),
                    hba1c: Some(6.5),
                    lvef: Some(48.0),
                    ..VisitInput::default()
                },
                now(),
            )
            .unwrap();

        assert_eq!(visit.visit_number, 5);
        assert!(visit.lipid_control);
        assert!(visit.glycemic_control);
        assert_eq!(visit.alerts, vec![HEART_FAILURE_ALERT.to_string()]);
        assert_eq!(risk.risk_level, RiskLevel::High);
        assert_eq!(repo.get(&id).unwrap().visits.len(), 5);
    }

    #[test]
    fn add_visit_rejects_negative_values() {
        let tmp = TempDir::new().unwrap();
        let repo = repo(&tmp);
        let id = repo
            .create(new_patient("Jorge", "Soto"), now())
            .unwrap()
            .id
            .to_string();

        let err = repo
            .add_visit(
                &id,
                VisitInput {
                    ldl: Some(-5.0),
                    ..VisitInput::default()
                },
                now(),
            )
            .unwrap_err();
        assert!(matches!(err, PatientError::InvalidInput(_)));
        assert!(repo.get(&id).unwrap().visits.is_empty());
    }

    #[test]
    fn failed_protocol_update_persists_nothing() {
        let tmp = TempDir::new().unwrap();
        let repo = repo(&tmp);
        let patient = repo.create(new_patient("Jorge", "Soto"), now()).unwrap();
        let id = patient.id.to_string();

        let err = repo
            .update_protocol(&id, now(), |_, protocol| {
                protocol.unlock.unlocked = true;
                Err::<(), _>(ProtocolError::Forbidden)
            })
            .unwrap_err();

        assert!(matches!(err, PatientError::Protocol(ProtocolError::Forbidden)));
        let stored = repo.get(&id).unwrap();
        assert!(!stored.protocol.is_unlocked());
        assert_eq!(stored.updated_at, patient.updated_at);
    }
}
