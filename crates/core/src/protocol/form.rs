//! Typed form payloads, one variant per protocol step.
//!
//! API layers submit a flat [`FormInput`]; [`StepForm::from_input`] selects the variant for the
//! step and drops any field that does not belong to it. Critical-field checks then run against
//! the typed variant.

use super::steps::StepId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Regional wall-motion finding from the month-5 echocardiogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WallMotion {
    Normal,
    MildHypokinesia,
    ModerateHypokinesia,
    SevereHypokinesia,
    Akinesia,
    Dyskinesia,
}

impl WallMotion {
    pub const ALL: [WallMotion; 6] = [
        WallMotion::Normal,
        WallMotion::MildHypokinesia,
        WallMotion::ModerateHypokinesia,
        WallMotion::SevereHypokinesia,
        WallMotion::Akinesia,
        WallMotion::Dyskinesia,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            WallMotion::Normal => "Normal",
            WallMotion::MildHypokinesia => "Mild hypokinesia",
            WallMotion::ModerateHypokinesia => "Moderate hypokinesia",
            WallMotion::SevereHypokinesia => "Severe hypokinesia",
            WallMotion::Akinesia => "Akinesia",
            WallMotion::Dyskinesia => "Dyskinesia",
        }
    }

    fn key(&self) -> &'static str {
        match self {
            WallMotion::Normal => "normal",
            WallMotion::MildHypokinesia => "mild_hypokinesia",
            WallMotion::ModerateHypokinesia => "moderate_hypokinesia",
            WallMotion::SevereHypokinesia => "severe_hypokinesia",
            WallMotion::Akinesia => "akinesia",
            WallMotion::Dyskinesia => "dyskinesia",
        }
    }
}

impl fmt::Display for WallMotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Accepts either the snake_case key or the display label, case-insensitively.
impl FromStr for WallMotion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        WallMotion::ALL
            .into_iter()
            .find(|wm| wm.key() == wanted || wm.label().to_ascii_lowercase() == wanted)
            .ok_or_else(|| format!("unknown wall motion '{}'", s.trim()))
    }
}

/// Measurements captured at every visit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vitals {
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default, rename = "systolicBP")]
    pub systolic_bp: Option<f64>,
    #[serde(default, rename = "diastolicBP")]
    pub diastolic_bp: Option<f64>,
    #[serde(default)]
    pub ldl: Option<f64>,
}

impl Vitals {
    fn collect_missing(&self, missing: &mut Vec<&'static str>) {
        push_if_none(missing, "weight", self.weight);
        push_if_none(missing, "systolicBP", self.systolic_bp);
        push_if_none(missing, "diastolicBP", self.diastolic_bp);
        push_if_none(missing, "ldl", self.ldl);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineForm {
    #[serde(flatten)]
    pub vitals: Vitals,
    #[serde(default, rename = "baselineLVEF")]
    pub baseline_lvef: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthOneForm {
    #[serde(flatten)]
    pub vitals: Vitals,
    #[serde(default)]
    pub medications: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetabolicScreeningForm {
    #[serde(flatten)]
    pub vitals: Vitals,
    #[serde(default)]
    pub glucose: Option<f64>,
    #[serde(default)]
    pub hba1c: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuralForm {
    #[serde(flatten)]
    pub vitals: Vitals,
    #[serde(default)]
    pub lvef: Option<f64>,
    #[serde(default)]
    pub wall_motion: Option<WallMotion>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosureForm {
    #[serde(flatten)]
    pub vitals: Vitals,
    #[serde(default)]
    pub hba1c: Option<f64>,
    #[serde(default)]
    pub lvef: Option<f64>,
    #[serde(default)]
    pub outcomes: Option<String>,
}

/// Form data for one protocol step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum StepForm {
    Baseline(BaselineForm),
    MonthOne(MonthOneForm),
    MetabolicScreening(MetabolicScreeningForm),
    Structural(StructuralForm),
    MonthSeven(Vitals),
    MonthTen(Vitals),
    Closure(ClosureForm),
}

/// Flat, untyped form submission as delivered by the API layers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormInput {
    #[serde(flatten)]
    pub vitals: Vitals,
    #[serde(default, rename = "baselineLVEF")]
    pub baseline_lvef: Option<f64>,
    #[serde(default)]
    pub medications: Option<String>,
    #[serde(default)]
    pub glucose: Option<f64>,
    #[serde(default)]
    pub hba1c: Option<f64>,
    #[serde(default)]
    pub lvef: Option<f64>,
    #[serde(default)]
    pub wall_motion: Option<WallMotion>,
    #[serde(default)]
    pub outcomes: Option<String>,
}

impl StepForm {
    /// Empty form for `step`.
    pub fn blank(step: StepId) -> Self {
        Self::from_input(step, FormInput::default())
    }

    /// Builds the typed form for `step`, discarding fields the step does not collect.
    ///
    /// Blank free-text values are normalised to `None`.
    pub fn from_input(step: StepId, input: FormInput) -> Self {
        let vitals = input.vitals;
        let medications = non_blank(input.medications);
        let outcomes = non_blank(input.outcomes);

        match step.index() {
            0 => StepForm::Baseline(BaselineForm {
                vitals,
                baseline_lvef: input.baseline_lvef,
            }),
            1 => StepForm::MonthOne(MonthOneForm {
                vitals,
                medications,
            }),
            2 => StepForm::MetabolicScreening(MetabolicScreeningForm {
                vitals,
                glucose: input.glucose,
                hba1c: input.hba1c,
            }),
            3 => StepForm::Structural(StructuralForm {
                vitals,
                lvef: input.lvef,
                wall_motion: input.wall_motion,
            }),
            4 => StepForm::MonthSeven(vitals),
            5 => StepForm::MonthTen(vitals),
            _ => StepForm::Closure(ClosureForm {
                vitals,
                hba1c: input.hba1c,
                lvef: input.lvef,
                outcomes,
            }),
        }
    }

    /// Flattens the form back into a [`FormInput`].
    pub fn to_input(&self) -> FormInput {
        let mut input = FormInput {
            vitals: self.vitals().clone(),
            ..FormInput::default()
        };
        match self {
            StepForm::Baseline(f) => input.baseline_lvef = f.baseline_lvef,
            StepForm::MonthOne(f) => input.medications = f.medications.clone(),
            StepForm::MetabolicScreening(f) => {
                input.glucose = f.glucose;
                input.hba1c = f.hba1c;
            }
            StepForm::Structural(f) => {
                input.lvef = f.lvef;
                input.wall_motion = f.wall_motion;
            }
            StepForm::MonthSeven(_) | StepForm::MonthTen(_) => {}
            StepForm::Closure(f) => {
                input.hba1c = f.hba1c;
                input.lvef = f.lvef;
                input.outcomes = f.outcomes.clone();
            }
        }
        input
    }

    pub fn step_id(&self) -> StepId {
        match self {
            StepForm::Baseline(_) => StepId::BASELINE,
            StepForm::MonthOne(_) => StepId::MONTH_1,
            StepForm::MetabolicScreening(_) => StepId::MONTH_3,
            StepForm::Structural(_) => StepId::MONTH_5,
            StepForm::MonthSeven(_) => StepId::MONTH_7,
            StepForm::MonthTen(_) => StepId::MONTH_10,
            StepForm::Closure(_) => StepId::MONTH_12,
        }
    }

    pub fn vitals(&self) -> &Vitals {
        match self {
            StepForm::Baseline(f) => &f.vitals,
            StepForm::MonthOne(f) => &f.vitals,
            StepForm::MetabolicScreening(f) => &f.vitals,
            StepForm::Structural(f) => &f.vitals,
            StepForm::MonthSeven(v) | StepForm::MonthTen(v) => v,
            StepForm::Closure(f) => &f.vitals,
        }
    }

    /// Names of critical fields that are still empty, in definition order.
    pub fn missing_critical_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        self.vitals().collect_missing(&mut missing);
        match self {
            StepForm::MetabolicScreening(f) => {
                push_if_none(&mut missing, "glucose", f.glucose);
                push_if_none(&mut missing, "hba1c", f.hba1c);
            }
            StepForm::Structural(f) => {
                push_if_none(&mut missing, "lvef", f.lvef);
                push_if_none(&mut missing, "wallMotion", f.wall_motion);
            }
            StepForm::Closure(f) => {
                push_if_none(&mut missing, "hba1c", f.hba1c);
                push_if_none(&mut missing, "lvef", f.lvef);
            }
            StepForm::Baseline(_)
            | StepForm::MonthOne(_)
            | StepForm::MonthSeven(_)
            | StepForm::MonthTen(_) => {}
        }
        missing
    }
}

fn push_if_none<T>(missing: &mut Vec<&'static str>, name: &'static str, value: Option<T>) {
    if value.is_none() {
        missing.push(name);
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
