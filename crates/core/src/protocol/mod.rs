//! The 12-month post-PCI follow-up protocol.
//!
//! - [`steps`]: the fixed schedule and its form fields
//! - [`form`]: typed per-step form payloads
//! - [`record`]: what is persisted on the patient
//! - [`gate`]: date and sequence gating
//! - [`session`]: save, complete and advance through the steps

pub mod error;
pub mod form;
pub mod gate;
pub mod record;
pub mod session;
pub mod steps;

pub use error::{GateReason, ProtocolError};
pub use form::{
    BaselineForm, ClosureForm, FormInput, MetabolicScreeningForm, MonthOneForm, StepForm,
    StructuralForm, Vitals, WallMotion,
};
pub use gate::{months_elapsed, step_availability, Gate, StepAvailability};
pub use record::{ProtocolOverride, ProtocolProgress, ProtocolRecord, ProtocolStepRecord};
pub use session::ProtocolSession;
pub use steps::{FieldDescriptor, FieldKind, StepDefinition, StepId, PROTOCOL_STEPS, STEP_COUNT};
