//! Dashboard statistics over the active patient population.

use crate::patient::Patient;
use crate::population::{aggregate_population_with, PopulationStats};
use crate::risk::{PatientSnapshot, RiskEvaluator};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// In-target versus out-of-target counts for one chart bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSeries {
    pub name: &'static str,
    pub in_target: usize,
    pub out_of_target: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub active_patients: usize,
    pub ldl_control_percentage: f64,
    pub upcoming_appointments: usize,
    pub high_risk_patients: usize,
    pub population_stats: PopulationStats,
    pub chart_data: Vec<ChartSeries>,
}

/// Summarises active patients as of `now`.
///
/// Only patients with at least one visit contribute to the control statistics. Every active
/// patient counts towards `active_patients` and the appointment window.
pub fn dashboard_stats(
    evaluator: &RiskEvaluator,
    patients: &[Patient],
    now: DateTime<Utc>,
    window_days: u32,
) -> DashboardStats {
    let active: Vec<&Patient> = patients.iter().filter(|p| p.is_active()).collect();
    let snapshots: Vec<PatientSnapshot> =
        active.iter().filter_map(|p| p.current_snapshot()).collect();

    let stats = aggregate_population_with(evaluator, &snapshots);

    let window_end = now + Duration::days(i64::from(window_days));
    let upcoming_appointments = active
        .iter()
        .filter_map(|p| p.next_appointment)
        .filter(|at| *at >= now && *at <= window_end)
        .count();

    let mut ldl_in = 0usize;
    let mut glycemic_in = 0usize;
    for snapshot in &snapshots {
        let risk = evaluator.evaluate(snapshot);
        if risk.lipid_control {
            ldl_in += 1;
        }
        if snapshot.is_diabetic && risk.glycemic_control {
            glycemic_in += 1;
        }
    }

    let chart_data = vec![
        ChartSeries {
            name: "LDL",
            in_target: ldl_in,
            out_of_target: snapshots.len() - ldl_in,
        },
        ChartSeries {
            name: "HbA1c",
            in_target: glycemic_in,
            out_of_target: stats.diabetic_count - glycemic_in,
        },
        ChartSeries {
            name: "Global",
            in_target: stats.in_target,
            out_of_target: stats.out_of_target,
        },
    ];

    DashboardStats {
        active_patients: active.len(),
        ldl_control_percentage: stats.ldl_control_rate,
        upcoming_appointments,
        high_risk_patients: stats.high_risk_count,
        population_stats: stats,
        chart_data,
    }
}
