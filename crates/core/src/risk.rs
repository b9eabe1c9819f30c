//! Risk evaluation for post-intervention follow-up.
//!
//! [`RiskEvaluator::evaluate`] turns a [`PatientSnapshot`] into a [`RiskResult`]. It is a pure
//! function: no I/O, no clock, and the same snapshot always yields the same result.
//!
//! Rules run in a fixed order because the risk level is built up progressively:
//!
//! 1. Lipid control (needs `current_ldl`)
//! 2. Glycemic control (needs `is_diabetic` and `current_hba1c`)
//! 3. Heart-failure alert (structural visit only, needs both LVEF values)
//! 4. Reconciliation of the level against the control flags and alerts
//!
//! Missing inputs disable the matching rule; they are never an error.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// LDL below this value (mg/dL) counts as controlled regardless of the baseline.
pub const LDL_TARGET_MG_DL: f64 = 70.0;

/// Fractional LDL reduction from baseline that counts as controlled (inclusive).
pub const LDL_REDUCTION_TARGET: f64 = 0.30;

/// HbA1c (%) strictly below this value counts as controlled.
pub const HBA1C_TARGET_PERCENT: f64 = 7.0;

/// Visit number at which the structural (echocardiogram) evaluation happens.
pub const STRUCTURAL_VISIT_NUMBER: u32 = 5;

/// Alert appended when LVEF drops at the structural visit.
pub const HEART_FAILURE_ALERT: &str = "Possible heart failure";

/// Risk classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single control rule.
///
/// `NotEvaluated` means the rule had no input to work with, which is distinct from a rule that
/// ran and found the patient out of target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    #[default]
    NotEvaluated,
    Controlled,
    Uncontrolled,
}

/// How the final reconciliation treats glycemic control for non-diabetic patients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GlycemicPolicy {
    /// Glycemic control stays `false` when not applicable, so a non-diabetic patient can never
    /// reconcile to `Low`. Matches the behaviour of records produced before the policy existed.
    #[default]
    Legacy,
    /// Non-diabetic patients are treated as glycemically controlled during reconciliation.
    NotApplicableControlled,
}

impl GlycemicPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            GlycemicPolicy::Legacy => "legacy",
            GlycemicPolicy::NotApplicableControlled => "not-applicable-controlled",
        }
    }
}

impl FromStr for GlycemicPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" => Ok(GlycemicPolicy::Legacy),
            "not-applicable-controlled" => Ok(GlycemicPolicy::NotApplicableControlled),
            other => Err(format!(
                "unknown glycemic policy '{}' (expected 'legacy' or 'not-applicable-controlled')",
                other
            )),
        }
    }
}

/// Clinical values needed to evaluate risk at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientSnapshot {
    #[serde(default, rename = "baselineLDL")]
    pub baseline_ldl: Option<f64>,
    #[serde(default, rename = "currentLDL")]
    pub current_ldl: Option<f64>,
    #[serde(default)]
    pub is_diabetic: bool,
    #[serde(default, rename = "currentHbA1c")]
    pub current_hba1c: Option<f64>,
    #[serde(default, rename = "baselineLVEF")]
    pub baseline_lvef: Option<f64>,
    #[serde(default, rename = "currentLVEF")]
    pub current_lvef: Option<f64>,
    #[serde(default)]
    pub visit_number: Option<u32>,
}

/// Structured outcome of one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskResult {
    pub lipid_control: bool,
    pub glycemic_control: bool,
    pub lipid: RuleStatus,
    pub glycemic: RuleStatus,
    pub alerts: Vec<String>,
    pub risk_level: RiskLevel,
    pub recommendations: Vec<String>,
}

impl RiskResult {
    fn empty() -> Self {
        Self {
            lipid_control: false,
            glycemic_control: false,
            lipid: RuleStatus::NotEvaluated,
            glycemic: RuleStatus::NotEvaluated,
            alerts: Vec::new(),
            risk_level: RiskLevel::Low,
            recommendations: Vec::new(),
        }
    }
}

/// Evaluates snapshots under a fixed [`GlycemicPolicy`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskEvaluator {
    glycemic_policy: GlycemicPolicy,
}

impl RiskEvaluator {
    pub const fn new(glycemic_policy: GlycemicPolicy) -> Self {
        Self { glycemic_policy }
    }

    pub fn glycemic_policy(&self) -> GlycemicPolicy {
        self.glycemic_policy
    }

    /// Computes a fresh [`RiskResult`] for `snapshot`.
    pub fn evaluate(&self, snapshot: &PatientSnapshot) -> RiskResult {
        let mut result = RiskResult::empty();

        if let Some(current) = snapshot.current_ldl {
            let reduction = match snapshot.baseline_ldl {
                Some(baseline) if baseline > 0.0 => (baseline - current) / baseline,
                _ => 0.0,
            };

            if current < LDL_TARGET_MG_DL || reduction >= LDL_REDUCTION_TARGET {
                result.lipid_control = true;
                result.lipid = RuleStatus::Controlled;
                result
                    .recommendations
                    .push("LDL control achieved. Continue current therapy.".into());
            } else {
                result.lipid = RuleStatus::Uncontrolled;
                result.risk_level = result.risk_level.max(RiskLevel::Medium);
                result.recommendations.push(format!(
                    "Current LDL: {} mg/dL. Target: <70 mg/dL or ≥30% reduction. \
                     Consider intensifying lipid-lowering therapy.",
                    current
                ));
            }
        }

        if let (true, Some(hba1c)) = (snapshot.is_diabetic, snapshot.current_hba1c) {
            if hba1c < HBA1C_TARGET_PERCENT {
                result.glycemic_control = true;
                result.glycemic = RuleStatus::Controlled;
                result
                    .recommendations
                    .push("Optimal glycemic control. Maintain current regimen.".into());
            } else {
                result.glycemic = RuleStatus::Uncontrolled;
                result.risk_level = if result.risk_level == RiskLevel::Medium {
                    RiskLevel::High
                } else {
                    result.risk_level.max(RiskLevel::Medium)
                };
                result.recommendations.push(format!(
                    "Current HbA1c: {}%. Target: <7.0%. \
                     Review adherence and adjust antidiabetic therapy.",
                    hba1c
                ));
            }
        }

        if snapshot.visit_number == Some(STRUCTURAL_VISIT_NUMBER) {
            if let (Some(baseline), Some(current)) = (snapshot.baseline_lvef, snapshot.current_lvef)
            {
                if current < baseline {
                    result.alerts.push(HEART_FAILURE_ALERT.into());
                    result.risk_level = RiskLevel::High;
                    result.recommendations.push(format!(
                        "ALERT: LVEF fell from {}% to {}% ({:.1}% reduction). \
                         Assess for signs of heart failure. Consider a follow-up echocardiogram \
                         and optimisation of heart-failure therapy.",
                        baseline,
                        current,
                        baseline - current
                    ));
                } else {
                    result.recommendations.push(format!(
                        "LVEF stable or improved: {}% (baseline: {}%).",
                        current, baseline
                    ));
                }
            }
        }

        self.reconcile(snapshot, &mut result);
        result
    }

    fn reconcile(&self, snapshot: &PatientSnapshot, result: &mut RiskResult) {
        let glycemic_ok = result.glycemic_control
            || (self.glycemic_policy == GlycemicPolicy::NotApplicableControlled
                && !snapshot.is_diabetic);
        let lipid_ok = result.lipid_control;

        if !lipid_ok && !glycemic_ok && !result.alerts.is_empty() {
            result.risk_level = RiskLevel::High;
        } else if !lipid_ok || !glycemic_ok {
            if result.risk_level != RiskLevel::High {
                result.risk_level = RiskLevel::Medium;
            }
        } else if result.alerts.is_empty() {
            result.risk_level = RiskLevel::Low;
        }
    }

    /// Whether the patient meets every applicable therapeutic target.
    ///
    /// Glycemic control only counts for diabetic patients here, independent of the
    /// evaluator's [`GlycemicPolicy`].
    pub fn is_in_target(&self, snapshot: &PatientSnapshot, is_diabetic: bool) -> bool {
        let risk = self.evaluate(snapshot);
        let glycemic_ok = if is_diabetic {
            risk.glycemic_control
        } else {
            true
        };
        risk.lipid_control && glycemic_ok && risk.risk_level != RiskLevel::High
    }
}

/// Evaluates `snapshot` with the default ([`GlycemicPolicy::Legacy`]) evaluator.
pub fn evaluate_risk(snapshot: &PatientSnapshot) -> RiskResult {
    RiskEvaluator::default().evaluate(snapshot)
}

/// Target-attainment predicate using the default evaluator.
pub fn is_in_target(snapshot: &PatientSnapshot, is_diabetic: bool) -> bool {
    RiskEvaluator::default().is_in_target(snapshot, is_diabetic)
}
