use super::steps::StepId;
use std::fmt;

/// Why the gate refused a navigation or access request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateReason {
    NotSaved,
    NotCompleted,
    LockedByDate,
    OutOfSequence,
}

impl GateReason {
    /// Stable reason code surfaced to API clients.
    pub fn code(&self) -> &'static str {
        match self {
            GateReason::NotSaved => "not-saved",
            GateReason::NotCompleted => "not-completed",
            GateReason::LockedByDate => "locked-by-date",
            GateReason::OutOfSequence => "out-of-sequence",
        }
    }
}

impl fmt::Display for GateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Recoverable protocol errors. None of them mutate state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("missing required fields: {}", .missing_fields.join(", "))]
    Validation { missing_fields: Vec<String> },
    #[error("step {step} refused: {reason}")]
    Gate { step: StepId, reason: GateReason },
    #[error("step {0} does not exist")]
    StepOutOfRange(u32),
    #[error("step {requested} is not the active step (active: {active})")]
    NotActiveStep { requested: StepId, active: StepId },
    #[error("form for step {form_step} submitted against step {step}")]
    FormMismatch { step: StepId, form_step: StepId },
    #[error("step {0} has no unsaved changes")]
    NoUnsavedChanges(StepId),
    #[error("step {0} is the last protocol step")]
    EndOfProtocol(StepId),
    #[error("only administrators may lock or unlock the protocol")]
    Forbidden,
}

impl ProtocolError {
    pub(crate) fn gate(step: StepId, reason: GateReason) -> Self {
        ProtocolError::Gate { step, reason }
    }

    /// The gate reason, if this is a gate refusal.
    pub fn gate_reason(&self) -> Option<GateReason> {
        match self {
            ProtocolError::Gate { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}
