//! Population-level adherence statistics.

use crate::risk::{PatientSnapshot, RiskEvaluator, RiskLevel};
use serde::{Deserialize, Serialize};

/// Aggregated control rates over a set of snapshots.
///
/// Percentages are in the range 0-100, rounded to one decimal place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulationStats {
    pub total: usize,
    pub in_target: usize,
    pub out_of_target: usize,
    pub percentage_in_target: f64,
    pub ldl_control_rate: f64,
    /// Computed over diabetic patients only.
    pub glycemic_control_rate: f64,
    pub high_risk_count: usize,
    pub diabetic_count: usize,
}

/// Aggregates `snapshots` with the default evaluator.
pub fn aggregate_population(snapshots: &[PatientSnapshot]) -> PopulationStats {
    aggregate_population_with(&RiskEvaluator::default(), snapshots)
}

/// Aggregates `snapshots` using `evaluator` for every risk computation.
pub fn aggregate_population_with(
    evaluator: &RiskEvaluator,
    snapshots: &[PatientSnapshot],
) -> PopulationStats {
    if snapshots.is_empty() {
        return PopulationStats::default();
    }

    let mut in_target = 0usize;
    let mut ldl_controlled = 0usize;
    let mut glycemic_controlled = 0usize;
    let mut diabetic_count = 0usize;
    let mut high_risk_count = 0usize;

    for snapshot in snapshots {
        let risk = evaluator.evaluate(snapshot);

        if evaluator.is_in_target(snapshot, snapshot.is_diabetic) {
            in_target += 1;
        }
        if risk.lipid_control {
            ldl_controlled += 1;
        }
        if snapshot.is_diabetic {
            diabetic_count += 1;
            if risk.glycemic_control {
                glycemic_controlled += 1;
            }
        }
        if risk.risk_level == RiskLevel::High {
            high_risk_count += 1;
        }
    }

    let total = snapshots.len();
    PopulationStats {
        total,
        in_target,
        out_of_target: total - in_target,
        percentage_in_target: percentage(in_target, total),
        ldl_control_rate: percentage(ldl_controlled, total),
        glycemic_control_rate: percentage(glycemic_controlled, diabetic_count),
        high_risk_count,
        diabetic_count,
    }
}

/// `part / whole` as a percentage rounded to one decimal; 0 when `whole` is 0.
pub(crate) fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round_one_decimal(part as f64 / whole as f64 * 100.0)
}

pub(crate) fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
