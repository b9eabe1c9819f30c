//! The fixed 12-month follow-up schedule.

use super::error::ProtocolError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of steps in the follow-up protocol.
pub const STEP_COUNT: usize = 7;

/// Vital-sign fields every step requires before it can be completed.
const VITALS: [&str; 4] = ["weight", "systolicBP", "diastolicBP", "ldl"];

/// Identifier of a protocol step, guaranteed to be in `0..STEP_COUNT`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct StepId(u8);

impl StepId {
    pub const BASELINE: StepId = StepId(0);
    pub const MONTH_1: StepId = StepId(1);
    pub const MONTH_3: StepId = StepId(2);
    pub const MONTH_5: StepId = StepId(3);
    pub const MONTH_7: StepId = StepId(4);
    pub const MONTH_10: StepId = StepId(5);
    pub const MONTH_12: StepId = StepId(6);

    pub fn new(id: u32) -> Result<Self, ProtocolError> {
        if (id as usize) < STEP_COUNT {
            Ok(Self(id as u8))
        } else {
            Err(ProtocolError::StepOutOfRange(id))
        }
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn next(self) -> Option<StepId> {
        StepId::new(u32::from(self.0) + 1).ok()
    }

    pub fn previous(self) -> Option<StepId> {
        self.0.checked_sub(1).map(StepId)
    }

    /// All steps in protocol order.
    pub fn all() -> impl Iterator<Item = StepId> {
        (0..STEP_COUNT as u8).map(StepId)
    }

    pub fn definition(self) -> &'static StepDefinition {
        &PROTOCOL_STEPS[self.index()]
    }
}

impl TryFrom<u32> for StepId {
    type Error = ProtocolError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        StepId::new(value)
    }
}

impl From<StepId> for u32 {
    fn from(id: StepId) -> Self {
        u32::from(id.0)
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a form field is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "options", rename_all = "snake_case")]
pub enum FieldKind {
    Number,
    Text,
    Select(&'static [&'static str]),
}

/// A renderable form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub label: &'static str,
    pub unit: Option<&'static str>,
    pub kind: FieldKind,
}

/// Static configuration of one protocol step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDefinition {
    pub id: u8,
    pub label: &'static str,
    /// Whole months after the intervention before the step opens.
    pub month: u32,
    pub description: &'static str,
    pub critical_fields: &'static [&'static str],
    pub fields: &'static [FieldDescriptor],
}

const fn number(name: &'static str, label: &'static str, unit: &'static str) -> FieldDescriptor {
    FieldDescriptor {
        name,
        label,
        unit: Some(unit),
        kind: FieldKind::Number,
    }
}

const fn text(name: &'static str, label: &'static str) -> FieldDescriptor {
    FieldDescriptor {
        name,
        label,
        unit: None,
        kind: FieldKind::Text,
    }
}

const WEIGHT: FieldDescriptor = number("weight", "Weight", "kg");
const SYSTOLIC: FieldDescriptor = number("systolicBP", "Systolic BP", "mmHg");
const DIASTOLIC: FieldDescriptor = number("diastolicBP", "Diastolic BP", "mmHg");
const LDL: FieldDescriptor = number("ldl", "LDL", "mg/dL");

/// Labels offered for the wall-motion select, in [`super::form::WallMotion`] order.
pub const WALL_MOTION_OPTIONS: &[&str] = &[
    "Normal",
    "Mild hypokinesia",
    "Moderate hypokinesia",
    "Severe hypokinesia",
    "Akinesia",
    "Dyskinesia",
];

pub static PROTOCOL_STEPS: [StepDefinition; STEP_COUNT] = [
    StepDefinition {
        id: 0,
        label: "Baseline (discharge)",
        month: 0,
        description: "Initial assessment at hospital discharge",
        critical_fields: &VITALS,
        fields: &[
            WEIGHT,
            SYSTOLIC,
            DIASTOLIC,
            LDL,
            number("baselineLVEF", "Baseline LVEF", "%"),
        ],
    },
    StepDefinition {
        id: 1,
        label: "Month 1",
        month: 1,
        description: "First post-intervention check",
        critical_fields: &VITALS,
        fields: &[
            WEIGHT,
            SYSTOLIC,
            DIASTOLIC,
            LDL,
            text("medications", "Medications"),
        ],
    },
    StepDefinition {
        id: 2,
        label: "Month 3 (metabolic screening)",
        month: 3,
        description: "Metabolic screening; glucose and HbA1c are mandatory",
        critical_fields: &[
            "weight",
            "systolicBP",
            "diastolicBP",
            "ldl",
            "glucose",
            "hba1c",
        ],
        fields: &[
            WEIGHT,
            SYSTOLIC,
            DIASTOLIC,
            LDL,
            number("glucose", "Glucose", "mg/dL"),
            number("hba1c", "HbA1c", "%"),
        ],
    },
    StepDefinition {
        id: 3,
        label: "Month 5 (structural)",
        month: 5,
        description: "Structural assessment; echocardiogram is mandatory",
        critical_fields: &[
            "weight",
            "systolicBP",
            "diastolicBP",
            "ldl",
            "lvef",
            "wallMotion",
        ],
        fields: &[
            WEIGHT,
            SYSTOLIC,
            DIASTOLIC,
            LDL,
            number("lvef", "LVEF", "%"),
            FieldDescriptor {
                name: "wallMotion",
                label: "Wall motion",
                unit: None,
                kind: FieldKind::Select(WALL_MOTION_OPTIONS),
            },
        ],
    },
    StepDefinition {
        id: 4,
        label: "Month 7",
        month: 7,
        description: "General check",
        critical_fields: &VITALS,
        fields: &[WEIGHT, SYSTOLIC, DIASTOLIC, LDL],
    },
    StepDefinition {
        id: 5,
        label: "Month 10",
        month: 10,
        description: "General check",
        critical_fields: &VITALS,
        fields: &[WEIGHT, SYSTOLIC, DIASTOLIC, LDL],
    },
    StepDefinition {
        id: 6,
        label: "Month 12 (closure)",
        month: 12,
        description: "Final protocol assessment",
        critical_fields: &[
            "weight",
            "systolicBP",
            "diastolicBP",
            "ldl",
            "hba1c",
            "lvef",
        ],
        fields: &[
            WEIGHT,
            SYSTOLIC,
            DIASTOLIC,
            LDL,
            number("hba1c", "HbA1c", "%"),
            number("lvef", "Final LVEF", "%"),
            text("outcomes", "Final outcomes"),
        ],
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_ids_match_their_position() {
        for (index, step) in PROTOCOL_STEPS.iter().enumerate() {
            assert_eq!(step.id as usize, index);
        }
    }

    #[test]
    fn months_are_strictly_increasing() {
        let months: Vec<u32> = PROTOCOL_STEPS.iter().map(|s| s.month).collect();
        assert_eq!(months, vec![0, 1, 3, 5, 7, 10, 12]);
    }

    #[test]
    fn every_critical_field_is_rendered() {
        for step in &PROTOCOL_STEPS {
            for critical in step.critical_fields {
                assert!(
                    step.fields.iter().any(|f| f.name == *critical),
                    "step {} lacks a field for {}",
                    step.id,
                    critical
                );
            }
        }
    }

    #[test]
    fn step_id_bounds() {
        assert!(StepId::new(6).is_ok());
        assert_eq!(StepId::new(7), Err(ProtocolError::StepOutOfRange(7)));
        assert_eq!(StepId::MONTH_12.next(), None);
        assert_eq!(StepId::BASELINE.previous(), None);
        assert_eq!(StepId::MONTH_1.previous(), Some(StepId::BASELINE));
        assert_eq!(StepId::all().count(), STEP_COUNT);
    }

    #[test]
    fn step_id_deserialize_rejects_out_of_range() {
        let ok: StepId = serde_json::from_str("3").unwrap();
        assert_eq!(ok, StepId::MONTH_5);
        assert!(serde_json::from_str::<StepId>("9").is_err());
    }
}
