//! Persisted protocol state for one patient.

use super::form::StepForm;
use super::steps::{StepId, STEP_COUNT};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One saved attempt at a protocol step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolStepRecord {
    pub step_id: StepId,
    pub label: String,
    pub form: StepForm,
    pub completed: bool,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_by: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Patient-wide administrative override of date and sequence gating.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolOverride {
    pub unlocked: bool,
    /// Identity of whoever last toggled the override, in either direction.
    #[serde(default)]
    pub unlocked_by: Option<String>,
    #[serde(default)]
    pub unlocked_at: Option<DateTime<Utc>>,
}

/// Override plus step records, as stored on the patient.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolRecord {
    #[serde(default, rename = "override")]
    pub unlock: ProtocolOverride,
    #[serde(default)]
    pub steps: Vec<ProtocolStepRecord>,
}

/// Summary of completion across the protocol.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolProgress {
    pub completed: usize,
    pub total: usize,
    pub steps: Vec<ProtocolStepRecord>,
    pub last_completed: Option<ProtocolStepRecord>,
}

impl ProtocolRecord {
    pub fn is_unlocked(&self) -> bool {
        self.unlock.unlocked
    }

    /// The governing record for `step`. If several exist, the last one wins.
    pub fn step(&self, step: StepId) -> Option<&ProtocolStepRecord> {
        self.steps.iter().rev().find(|r| r.step_id == step)
    }

    pub fn is_saved(&self, step: StepId) -> bool {
        self.step(step).is_some()
    }

    pub fn is_completed(&self, step: StepId) -> bool {
        self.step(step).is_some_and(|r| r.completed)
    }

    /// Replaces the record for `record.step_id`, or appends it.
    ///
    /// Older duplicates for the same step are dropped; the replacement keeps the position of the
    /// first one.
    pub fn upsert(&mut self, record: ProtocolStepRecord) {
        let step = record.step_id;
        match self.steps.iter().position(|r| r.step_id == step) {
            Some(pos) => {
                self.steps.retain(|r| r.step_id != step);
                self.steps.insert(pos, record);
            }
            None => self.steps.push(record),
        }
    }

    pub fn progress(&self) -> ProtocolProgress {
        let mut steps: Vec<ProtocolStepRecord> = StepId::all()
            .filter_map(|id| self.step(id).cloned())
            .collect();
        steps.sort_by_key(|r| r.step_id);

        let completed: Vec<&ProtocolStepRecord> = steps.iter().filter(|r| r.completed).collect();
        ProtocolProgress {
            completed: completed.len(),
            total: STEP_COUNT,
            last_completed: completed.last().map(|r| (*r).clone()),
            steps,
        }
    }
}
