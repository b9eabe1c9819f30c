//! Step availability decisions.
//!
//! Gating has two levels: the patient-wide administrative override, and per-step date and
//! sequence rules. When the override is set every step is open.

use super::error::{GateReason, ProtocolError};
use super::record::ProtocolRecord;
use super::steps::{StepId, STEP_COUNT};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;

/// Whole calendar months between `from` and `to` (`year * 12 + month` arithmetic).
///
/// Day of month is ignored, and the result is negative when `to` precedes `from`.
pub fn months_elapsed(from: NaiveDate, to: NaiveDate) -> i32 {
    (to.year() - from.year()) * 12 + (to.month() as i32 - from.month() as i32)
}

/// Per-step availability flags, indexed by step id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepAvailability {
    /// Open for fresh entry.
    pub available: [bool; STEP_COUNT],
    /// Closed because too little time has passed since the intervention.
    pub locked: [bool; STEP_COUNT],
    /// Viewable/editable: available, already touched, or active.
    pub accessible: [bool; STEP_COUNT],
}

/// Read-only view of a patient's protocol at a given date.
#[derive(Debug, Clone, Copy)]
pub struct Gate<'a> {
    protocol: &'a ProtocolRecord,
    intervention_date: Option<NaiveDate>,
    today: NaiveDate,
}

impl<'a> Gate<'a> {
    pub fn new(
        protocol: &'a ProtocolRecord,
        intervention_date: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Self {
        Self {
            protocol,
            intervention_date,
            today,
        }
    }

    pub fn is_locked_by_date(&self, step: StepId) -> bool {
        let Some(intervention) = self.intervention_date else {
            return false;
        };
        if self.protocol.is_unlocked() {
            return false;
        }
        months_elapsed(intervention, self.today) < step.definition().month as i32
    }

    pub fn is_available(&self, step: StepId) -> bool {
        if self.protocol.is_unlocked() {
            return true;
        }
        if self.is_locked_by_date(step) {
            return false;
        }
        match step.previous() {
            None => true,
            Some(previous) => self.protocol.is_completed(previous),
        }
    }

    pub fn is_accessible(&self, step: StepId, active: StepId) -> bool {
        self.is_available(step)
            || self.protocol.is_saved(step)
            || self.protocol.is_completed(step)
            || step == active
    }

    /// Checks that `step` may be opened while `active` is the current step.
    pub fn check_access(&self, step: StepId, active: StepId) -> Result<(), ProtocolError> {
        if self.is_accessible(step, active) {
            return Ok(());
        }
        let reason = if self.is_locked_by_date(step) {
            GateReason::LockedByDate
        } else {
            GateReason::OutOfSequence
        };
        Err(ProtocolError::gate(step, reason))
    }

    pub fn availability(&self, active: StepId) -> StepAvailability {
        let mut flags = StepAvailability {
            available: [false; STEP_COUNT],
            locked: [false; STEP_COUNT],
            accessible: [false; STEP_COUNT],
        };
        for step in StepId::all() {
            let i = step.index();
            flags.available[i] = self.is_available(step);
            flags.locked[i] = self.is_locked_by_date(step);
            flags.accessible[i] = self.is_accessible(step, active);
        }
        flags
    }
}

/// Availability of every step for a patient on `today`.
pub fn step_availability(
    protocol: &ProtocolRecord,
    intervention_date: Option<NaiveDate>,
    active: StepId,
    today: NaiveDate,
) -> StepAvailability {
    Gate::new(protocol, intervention_date, today).availability(active)
}
