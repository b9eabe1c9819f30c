//! Step-by-step editing of a patient's protocol.
//!
//! A [`ProtocolSession`] holds a working copy of the protocol record, the active step and the
//! form currently loaded for it. Every operation either succeeds and updates the working copy,
//! or returns a [`ProtocolError`] and leaves it untouched. Callers persist
//! [`ProtocolSession::into_record`] afterwards.

use super::error::{GateReason, ProtocolError};
use super::form::StepForm;
use super::gate::{Gate, StepAvailability};
use super::record::{ProtocolRecord, ProtocolStepRecord};
use super::steps::StepId;
use crate::actor::Actor;
use chrono::{DateTime, NaiveDate, Utc};

#[derive(Debug, Clone)]
pub struct ProtocolSession {
    intervention_date: Option<NaiveDate>,
    protocol: ProtocolRecord,
    active: StepId,
    form: StepForm,
}

impl ProtocolSession {
    /// Opens a session on the first step that is not yet completed.
    ///
    /// When every step is completed the session opens on the final step.
    pub fn new(intervention_date: Option<NaiveDate>, protocol: ProtocolRecord) -> Self {
        let active = StepId::all()
            .find(|step| !protocol.is_completed(*step))
            .unwrap_or(StepId::MONTH_12);
        let form = Self::load_form(&protocol, active);
        Self {
            intervention_date,
            protocol,
            active,
            form,
        }
    }

    /// Opens a session directly on `step`, which must be accessible on `now`.
    ///
    /// A step still locked by date only opens if it was saved before.
    pub fn at_step(
        intervention_date: Option<NaiveDate>,
        protocol: ProtocolRecord,
        step: StepId,
        now: DateTime<Utc>,
    ) -> Result<Self, ProtocolError> {
        let mut session = Self::new(intervention_date, protocol);
        session.check_writable(step, now)?;
        session.select(step, now)?;
        Ok(session)
    }

    pub fn active_step(&self) -> StepId {
        self.active
    }

    /// The form loaded for the active step.
    pub fn form(&self) -> &StepForm {
        &self.form
    }

    pub fn protocol(&self) -> &ProtocolRecord {
        &self.protocol
    }

    pub fn into_record(self) -> ProtocolRecord {
        self.protocol
    }

    pub fn gate(&self, now: DateTime<Utc>) -> Gate<'_> {
        Gate::new(&self.protocol, self.intervention_date, now.date_naive())
    }

    pub fn availability(&self, now: DateTime<Utc>) -> StepAvailability {
        self.gate(now).availability(self.active)
    }

    /// True when `form` and `notes` differ from what is stored for the active step.
    pub fn has_unsaved_changes(&self, form: &StepForm, notes: Option<&str>) -> bool {
        match self.protocol.step(self.active) {
            Some(saved) => &saved.form != form || saved.notes.as_deref() != notes,
            None => true,
        }
    }

    /// Jumps to `step` if it is accessible, loading its saved form or a blank one.
    pub fn select(&mut self, step: StepId, now: DateTime<Utc>) -> Result<(), ProtocolError> {
        self.gate(now).check_access(step, self.active)?;
        self.move_to(step);
        Ok(())
    }

    /// Saves progress on the active step without completing it.
    ///
    /// Saving a step that is already completed keeps it completed, along with its completion
    /// time and author.
    pub fn try_save(
        &mut self,
        step: StepId,
        form: StepForm,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<ProtocolStepRecord, ProtocolError> {
        self.check_target(step, &form)?;
        self.check_writable(step, now)?;
        let notes = normalise_notes(notes);
        if !self.has_unsaved_changes(&form, notes.as_deref()) {
            return Err(ProtocolError::NoUnsavedChanges(step));
        }

        let previous = self.protocol.step(step).filter(|r| r.completed);
        let record = ProtocolStepRecord {
            step_id: step,
            label: step.definition().label.to_string(),
            form,
            completed: previous.is_some(),
            completed_at: previous.and_then(|r| r.completed_at),
            completed_by: previous.and_then(|r| r.completed_by.clone()),
            notes,
            updated_at: now,
        };

        tracing::debug!(step = %step, completed = record.completed, "protocol step saved");
        Ok(self.store(record))
    }

    /// Completes the active step once every critical field is filled.
    ///
    /// An existing completion time is preserved; it is only set when previously absent.
    pub fn try_complete(
        &mut self,
        step: StepId,
        form: StepForm,
        notes: Option<String>,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<ProtocolStepRecord, ProtocolError> {
        self.check_target(step, &form)?;
        self.check_writable(step, now)?;

        let missing = form.missing_critical_fields();
        if !missing.is_empty() {
            return Err(ProtocolError::Validation {
                missing_fields: missing.into_iter().map(String::from).collect(),
            });
        }

        let completed_at = self
            .protocol
            .step(step)
            .filter(|r| r.completed)
            .and_then(|r| r.completed_at)
            .unwrap_or(now);

        let record = ProtocolStepRecord {
            step_id: step,
            label: step.definition().label.to_string(),
            form,
            completed: true,
            completed_at: Some(completed_at),
            completed_by: Some(actor.identity()),
            notes: normalise_notes(notes),
            updated_at: now,
        };

        tracing::debug!(step = %step, by = %actor.identity(), "protocol step completed");
        Ok(self.store(record))
    }

    /// Moves to the next step.
    ///
    /// The active step must be saved, and completed unless the protocol is unlocked.
    pub fn try_advance(&mut self) -> Result<StepId, ProtocolError> {
        let current = self.active;
        let Some(saved) = self.protocol.step(current) else {
            return Err(ProtocolError::gate(current, GateReason::NotSaved));
        };
        if !saved.completed && !self.protocol.is_unlocked() {
            return Err(ProtocolError::gate(current, GateReason::NotCompleted));
        }
        let next = current
            .next()
            .ok_or(ProtocolError::EndOfProtocol(current))?;

        self.move_to(next);
        Ok(next)
    }

    /// Moves to the previous step; stays put on the first step.
    pub fn go_back(&mut self) -> StepId {
        if let Some(previous) = self.active.previous() {
            self.move_to(previous);
        }
        self.active
    }

    /// Lifts date and sequence gating for the whole patient.
    pub fn unlock(&mut self, actor: &Actor, now: DateTime<Utc>) -> Result<(), ProtocolError> {
        self.set_unlocked(true, actor, now)
    }

    /// Restores date and sequence gating.
    pub fn lock(&mut self, actor: &Actor, now: DateTime<Utc>) -> Result<(), ProtocolError> {
        self.set_unlocked(false, actor, now)
    }

    fn set_unlocked(
        &mut self,
        unlocked: bool,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<(), ProtocolError> {
        if !actor.is_admin() {
            return Err(ProtocolError::Forbidden);
        }
        self.protocol.unlock.unlocked = unlocked;
        self.protocol.unlock.unlocked_by = Some(actor.identity());
        self.protocol.unlock.unlocked_at = Some(now);
        tracing::info!(unlocked, by = %actor.identity(), "protocol lock changed");
        Ok(())
    }

    fn check_target(&self, step: StepId, form: &StepForm) -> Result<(), ProtocolError> {
        if step != self.active {
            return Err(ProtocolError::NotActiveStep {
                requested: step,
                active: self.active,
            });
        }
        if form.step_id() != step {
            return Err(ProtocolError::FormMismatch {
                step,
                form_step: form.step_id(),
            });
        }
        Ok(())
    }

    /// The active step counts as accessible, so the date lock is checked separately.
    fn check_writable(&self, step: StepId, now: DateTime<Utc>) -> Result<(), ProtocolError> {
        if self.gate(now).is_locked_by_date(step) && !self.protocol.is_saved(step) {
            return Err(ProtocolError::gate(step, GateReason::LockedByDate));
        }
        Ok(())
    }

    fn store(&mut self, record: ProtocolStepRecord) -> ProtocolStepRecord {
        self.form = record.form.clone();
        self.protocol.upsert(record.clone());
        record
    }

    fn move_to(&mut self, step: StepId) {
        self.active = step;
        self.form = Self::load_form(&self.protocol, step);
    }

    fn load_form(protocol: &ProtocolRecord, step: StepId) -> StepForm {
        protocol
            .step(step)
            .map(|r| r.form.clone())
            .unwrap_or_else(|| StepForm::blank(step))
    }
}

fn normalise_notes(notes: Option<String>) -> Option<String> {
    notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::Role;
    use crate::protocol::form::{FormInput, Vitals};
    use crate::{EmailAddress, NonEmptyText};
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 10, 0, 0).unwrap()
    }

    fn actor(role: Role) -> Actor {
        Actor::new(
            NonEmptyText::new("Dr Ortega").unwrap(),
            EmailAddress::parse("ortega@clinic.org").unwrap(),
            role,
        )
    }

    fn filled(step: StepId) -> StepForm {
        StepForm::from_input(
            step,
            FormInput {
                vitals: Vitals {
                    weight: Some(80.0),
                    systolic_bp: Some(125.0),
                    diastolic_bp: Some(78.0),
                    ldl: Some(92.0),
                },
                glucose: Some(101.0),
                hba1c: Some(6.4),
                lvef: Some(55.0),
                wall_motion: Some(crate::protocol::form::WallMotion::Normal),
                ..FormInput::default()
            },
        )
    }

    fn partial(step: StepId) -> StepForm {
        StepForm::from_input(
            step,
            FormInput {
                vitals: Vitals {
                    weight: Some(80.0),
                    ..Vitals::default()
                },
                ..FormInput::default()
            },
        )
    }

    #[test]
    fn new_session_opens_first_incomplete_step() {
        let session = ProtocolSession::new(None, ProtocolRecord::default());
        assert_eq!(session.active_step(), StepId::BASELINE);
        assert_eq!(session.form(), &StepForm::blank(StepId::BASELINE));
    }

    #[test]
    fn save_persists_incomplete_record_without_advancing() {
        let mut session = ProtocolSession::new(None, ProtocolRecord::default());
        let record = session
            .try_save(StepId::BASELINE, partial(StepId::BASELINE), None, at(2026, 1, 5))
            .unwrap();

        assert!(!record.completed);
        assert!(record.completed_at.is_none());
        assert_eq!(session.active_step(), StepId::BASELINE);
        assert!(session.protocol().is_saved(StepId::BASELINE));
    }

    #[test]
    fn save_without_changes_is_rejected() {
        let mut session = ProtocolSession::new(None, ProtocolRecord::default());
        let form = partial(StepId::BASELINE);
        session
            .try_save(StepId::BASELINE, form.clone(), None, at(2026, 1, 5))
            .unwrap();

        assert_eq!(
            session.try_save(StepId::BASELINE, form, None, at(2026, 1, 6)),
            Err(ProtocolError::NoUnsavedChanges(StepId::BASELINE))
        );
    }

    #[test]
    fn save_rejects_other_steps_and_mismatched_forms() {
        let mut session = ProtocolSession::new(None, ProtocolRecord::default());

        assert!(matches!(
            session.try_save(StepId::MONTH_1, partial(StepId::MONTH_1), None, at(2026, 1, 5)),
            Err(ProtocolError::NotActiveStep { .. })
        ));
        assert!(matches!(
            session.try_save(StepId::BASELINE, partial(StepId::MONTH_1), None, at(2026, 1, 5)),
            Err(ProtocolError::FormMismatch { .. })
        ));
    }

    #[test]
    fn complete_lists_missing_critical_fields_and_persists_nothing() {
        let mut session = ProtocolSession::new(None, ProtocolRecord::default());
        let err = session
            .try_complete(
                StepId::BASELINE,
                partial(StepId::BASELINE),
                None,
                &actor(Role::Resident),
                at(2026, 1, 5),
            )
            .unwrap_err();

        assert_eq!(
            err,
            ProtocolError::Validation {
                missing_fields: vec!["systolicBP".into(), "diastolicBP".into(), "ldl".into()]
            }
        );
        assert!(!session.protocol().is_saved(StepId::BASELINE));
    }

    #[test]
    fn recompleting_keeps_original_completion_time() {
        let mut session = ProtocolSession::new(None, ProtocolRecord::default());
        let resident = actor(Role::Resident);
        let first = session
            .try_complete(
                StepId::BASELINE,
                filled(StepId::BASELINE),
                None,
                &resident,
                at(2026, 1, 5),
            )
            .unwrap();

        let mut changed = filled(StepId::BASELINE);
        if let StepForm::Baseline(ref mut f) = changed {
            f.vitals.weight = Some(79.0);
        }
        let second = session
            .try_complete(StepId::BASELINE, changed.clone(), None, &resident, at(2026, 2, 9))
            .unwrap();

        assert_eq!(second.completed_at, first.completed_at);
        assert_eq!(second.form, changed);
        assert_eq!(second.updated_at, at(2026, 2, 9));
        assert_eq!(second.completed_by.as_deref(), Some("ortega@clinic.org"));
    }

    #[test]
    fn saving_a_completed_step_keeps_it_completed() {
        let mut session = ProtocolSession::new(None, ProtocolRecord::default());
        let first = session
            .try_complete(
                StepId::BASELINE,
                filled(StepId::BASELINE),
                None,
                &actor(Role::Resident),
                at(2026, 1, 5),
            )
            .unwrap();
        let saved = session
            .try_save(
                StepId::BASELINE,
                filled(StepId::BASELINE),
                Some("rechecked BP".into()),
                at(2026, 1, 8),
            )
            .unwrap();

        assert!(saved.completed);
        assert_eq!(saved.completed_at, first.completed_at);
        assert_eq!(saved.notes.as_deref(), Some("rechecked BP"));
    }

    #[test]
    fn advance_requires_save_then_completion() {
        let mut session = ProtocolSession::new(None, ProtocolRecord::default());

        assert_eq!(
            session.try_advance().unwrap_err().gate_reason(),
            Some(GateReason::NotSaved)
        );

        session
            .try_save(StepId::BASELINE, partial(StepId::BASELINE), None, at(2026, 1, 5))
            .unwrap();
        assert_eq!(
            session.try_advance().unwrap_err().gate_reason(),
            Some(GateReason::NotCompleted)
        );

        session
            .try_complete(
                StepId::BASELINE,
                filled(StepId::BASELINE),
                None,
                &actor(Role::Resident),
                at(2026, 1, 5),
            )
            .unwrap();
        assert_eq!(session.try_advance(), Ok(StepId::MONTH_1));
        assert_eq!(session.form(), &StepForm::blank(StepId::MONTH_1));
    }

    #[test]
    fn unlocked_protocol_advances_past_incomplete_step() {
        let mut session = ProtocolSession::new(None, ProtocolRecord::default());
        session.unlock(&actor(Role::Admin), at(2026, 1, 2)).unwrap();
        session
            .try_save(StepId::BASELINE, partial(StepId::BASELINE), None, at(2026, 1, 5))
            .unwrap();

        assert_eq!(session.try_advance(), Ok(StepId::MONTH_1));
    }

    #[test]
    fn advance_stops_at_last_step() {
        let mut protocol = ProtocolRecord::default();
        protocol.unlock.unlocked = true;
        let mut session =
            ProtocolSession::at_step(None, protocol, StepId::MONTH_12, at(2026, 1, 1)).unwrap();
        session
            .try_save(StepId::MONTH_12, partial(StepId::MONTH_12), None, at(2026, 1, 1))
            .unwrap();

        assert_eq!(
            session.try_advance(),
            Err(ProtocolError::EndOfProtocol(StepId::MONTH_12))
        );
    }

    #[test]
    fn going_back_loads_saved_form() {
        let mut session = ProtocolSession::new(None, ProtocolRecord::default());
        let form = filled(StepId::BASELINE);
        session
            .try_complete(
                StepId::BASELINE,
                form.clone(),
                None,
                &actor(Role::Resident),
                at(2026, 1, 5),
            )
            .unwrap();
        session.try_advance().unwrap();

        assert_eq!(session.go_back(), StepId::BASELINE);
        assert_eq!(session.form(), &form);
        assert_eq!(session.go_back(), StepId::BASELINE);
    }

    #[test]
    fn only_admins_toggle_the_lock() {
        let mut session = ProtocolSession::new(None, ProtocolRecord::default());

        assert_eq!(
            session.unlock(&actor(Role::Resident), at(2026, 1, 2)),
            Err(ProtocolError::Forbidden)
        );
        assert!(!session.protocol().is_unlocked());

        session.unlock(&actor(Role::Admin), at(2026, 1, 2)).unwrap();
        let unlock = &session.protocol().unlock;
        assert!(unlock.unlocked);
        assert_eq!(unlock.unlocked_by.as_deref(), Some("ortega@clinic.org"));
        assert_eq!(unlock.unlocked_at, Some(at(2026, 1, 2)));

        session.lock(&actor(Role::Admin), at(2026, 1, 3)).unwrap();
        assert!(!session.protocol().is_unlocked());
        assert_eq!(session.protocol().unlock.unlocked_at, Some(at(2026, 1, 3)));
    }

    #[test]
    fn at_step_enforces_date_lock() {
        let intervention = NaiveDate::from_ymd_opt(2026, 1, 15);
        let mut session = ProtocolSession::new(intervention, ProtocolRecord::default());
        session
            .try_complete(
                StepId::BASELINE,
                filled(StepId::BASELINE),
                None,
                &actor(Role::Resident),
                at(2026, 1, 16),
            )
            .unwrap();
        let protocol = session.into_record();

        let err = ProtocolSession::at_step(
            intervention,
            protocol.clone(),
            StepId::MONTH_1,
            at(2026, 1, 30),
        )
        .unwrap_err();
        assert_eq!(err.gate_reason(), Some(GateReason::LockedByDate));

        let session =
            ProtocolSession::at_step(intervention, protocol, StepId::MONTH_1, at(2026, 2, 1))
                .unwrap();
        assert_eq!(session.active_step(), StepId::MONTH_1);
        assert!(session.availability(at(2026, 2, 1)).available[1]);
    }

    #[test]
    fn active_step_locked_by_date_refuses_writes() {
        let intervention = NaiveDate::from_ymd_opt(2026, 1, 15);
        let mut protocol = ProtocolRecord::default();
        let mut session = ProtocolSession::new(intervention, protocol.clone());
        session
            .try_complete(
                StepId::BASELINE,
                filled(StepId::BASELINE),
                None,
                &actor(Role::Resident),
                at(2026, 1, 16),
            )
            .unwrap();
        protocol = session.into_record();

        // Month 1 is the first incomplete step, so a fresh session opens on it.
        let mut session = ProtocolSession::new(intervention, protocol);
        assert_eq!(session.active_step(), StepId::MONTH_1);

        let saved = session.try_save(
            StepId::MONTH_1,
            partial(StepId::MONTH_1),
            None,
            at(2026, 1, 30),
        );
        assert_eq!(saved.unwrap_err().gate_reason(), Some(GateReason::LockedByDate));
        let completed = session.try_complete(
            StepId::MONTH_1,
            filled(StepId::MONTH_1),
            None,
            &actor(Role::Resident),
            at(2026, 1, 30),
        );
        assert_eq!(completed.unwrap_err().gate_reason(), Some(GateReason::LockedByDate));
        assert!(!session.protocol().is_saved(StepId::MONTH_1));

        assert!(session
            .try_save(StepId::MONTH_1, partial(StepId::MONTH_1), None, at(2026, 2, 1))
            .is_ok());
    }
}
