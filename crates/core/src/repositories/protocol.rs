//! Follow-up protocol operations on stored patients.
//!
//! Each call opens a [`ProtocolSession`] on the stored record, applies one transition and
//! persists the result. Refused transitions leave the stored record untouched.

use super::patients::PatientRepository;
use crate::actor::Actor;
use crate::error::PatientResult;
use crate::protocol::{
    ProtocolProgress, ProtocolRecord, ProtocolSession, ProtocolStepRecord, StepAvailability,
    StepForm, StepId,
};
use crate::validation;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::mem;

/// Read-only view of a patient's protocol on a given day.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolView {
    pub patient_id: String,
    pub intervention_date: Option<NaiveDate>,
    pub active_step: StepId,
    pub record: ProtocolRecord,
    pub availability: StepAvailability,
    pub progress: ProtocolProgress,
}

impl PatientRepository {
    pub fn protocol(&self, id: &str, now: DateTime<Utc>) -> PatientResult<ProtocolView> {
        let patient = self.get(id)?;
        let session = ProtocolSession::new(patient.intervention_date, patient.protocol);
        Ok(ProtocolView {
            patient_id: patient.id.to_string(),
            intervention_date: patient.intervention_date,
            active_step: session.active_step(),
            availability: session.availability(now),
            progress: session.protocol().progress(),
            record: session.into_record(),
        })
    }

    /// Saves progress on `step` without completing it.
    pub fn save_step(
        &self,
        id: &str,
        step: StepId,
        form: StepForm,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> PatientResult<ProtocolStepRecord> {
        validation::validate_form(&form)?;
        self.update_protocol(id, now, |intervention_date, protocol| {
            let mut session =
                ProtocolSession::at_step(intervention_date, mem::take(protocol), step, now)?;
            let saved = session.try_save(step, form, notes, now)?;
            *protocol = session.into_record();
            Ok(saved)
        })
    }

    /// Completes `step` once its critical fields are present.
    pub fn complete_step(
        &self,
        id: &str,
        step: StepId,
        form: StepForm,
        notes: Option<String>,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> PatientResult<ProtocolStepRecord> {
        validation::validate_form(&form)?;
        self.update_protocol(id, now, |intervention_date, protocol| {
            let mut session =
                ProtocolSession::at_step(intervention_date, mem::take(protocol), step, now)?;
            let completed = session.try_complete(step, form, notes, actor, now)?;
            *protocol = session.into_record();
            Ok(completed)
        })
    }

    /// Checks that the patient may move on from `from` and returns the next step with its form.
    ///
    /// Nothing is persisted; the active step is a client-side concern.
    pub fn advance_step(
        &self,
        id: &str,
        from: StepId,
        now: DateTime<Utc>,
    ) -> PatientResult<(StepId, StepForm)> {
        let patient = self.get(id)?;
        let mut session =
            ProtocolSession::at_step(patient.intervention_date, patient.protocol, from, now)?;
        let next = session.try_advance().inspect_err(|e| {
            tracing::warn!(patient_id = %patient.id, "advance refused: {}", e);
        })?;
        Ok((next, session.form().clone()))
    }

    /// Sets or clears the administrative override. Only admins may do this.
    pub fn set_protocol_lock(
        &self,
        id: &str,
        unlocked: bool,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> PatientResult<ProtocolRecord> {
        self.update_protocol(id, now, |intervention_date, protocol| {
            let mut session = ProtocolSession::new(intervention_date, mem::take(protocol));
            if unlocked {
                session.unlock(actor, now)?;
            } else {
                session.lock(actor, now)?;
            }
            *protocol = session.into_record();
            Ok(protocol.clone())
        })
    }
}
