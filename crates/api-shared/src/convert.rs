//! Conversions between wire types (`pb`) and `vigil-core` domain types.
//!
//! Inbound conversions validate and can fail with [`PatientError`]; outbound conversions are
//! infallible `From` impls.

use crate::pb;
use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Utc};
use vigil_core::dashboard::{ChartSeries, DashboardStats};
use vigil_core::protocol::{
    FieldKind, FormInput, ProtocolStepRecord, StepDefinition, StepForm, StepId, Vitals,
    WallMotion,
};
use vigil_core::{
    Gender, Medication, NewPatient, Patient, PatientError, PatientResult, PatientSnapshot,
    PatientStatus, PatientUpdate, PopulationStats, ProtocolView, RiskResult, RuleStatus, Visit,
    VisitInput,
};

// ---------------------------------------------------------------------------------------------
// Scalars
// ---------------------------------------------------------------------------------------------

/// Parses a `YYYY-MM-DD` date.
pub fn parse_date(field: &str, value: &str) -> PatientResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        PatientError::InvalidInput(format!("{} must be a date (YYYY-MM-DD)", field))
    })
}

/// Parses an RFC 3339 timestamp, or a bare date taken as midnight UTC.
pub fn parse_timestamp(field: &str, value: &str) -> PatientResult<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|d| d.and_time(NaiveTime::MIN).and_utc())
        .map_err(|_| {
            PatientError::InvalidInput(format!(
                "{} must be an RFC 3339 timestamp or a date (YYYY-MM-DD)",
                field
            ))
        })
}

fn optional_date(field: &str, value: Option<String>) -> PatientResult<Option<NaiveDate>> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(|v| parse_date(field, &v))
        .transpose()
}

fn optional_timestamp(field: &str, value: Option<String>) -> PatientResult<Option<DateTime<Utc>>> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(|v| parse_timestamp(field, &v))
        .transpose()
}

fn optional_wall_motion(value: Option<String>) -> PatientResult<Option<WallMotion>> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(|v| v.parse::<WallMotion>().map_err(PatientError::InvalidInput))
        .transpose()
}

pub fn parse_gender(value: &str) -> PatientResult<Gender> {
    value.parse().map_err(PatientError::InvalidInput)
}

/// Parses an optional status filter; blank means "any".
pub fn parse_status(value: Option<&str>) -> PatientResult<Option<PatientStatus>> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(|v| v.parse().map_err(PatientError::InvalidInput))
        .transpose()
}

pub fn step_id(value: u32) -> PatientResult<StepId> {
    Ok(StepId::new(value)?)
}

fn timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn date(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

fn rule_status(status: RuleStatus) -> String {
    let code = match status {
        RuleStatus::NotEvaluated => "not_evaluated",
        RuleStatus::Controlled => "controlled",
        RuleStatus::Uncontrolled => "uncontrolled",
    };
    code.to_string()
}

// ---------------------------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------------------------

impl pb::CreatePatientReq {
    pub fn into_new_patient(self) -> PatientResult<NewPatient> {
        Ok(NewPatient {
            first_name: self.first_name,
            last_name: self.last_name,
            date_of_birth: parse_date("date_of_birth", &self.date_of_birth)?,
            gender: parse_gender(&self.gender)?,
            email: self.email,
            phone: self.phone,
            is_diabetic: self.is_diabetic,
            baseline_ldl: self.baseline_ldl,
            baseline_lvef: self.baseline_lvef,
            intervention_date: optional_date("intervention_date", self.intervention_date)?,
            next_appointment: optional_timestamp("next_appointment", self.next_appointment)?,
            primary_diagnosis: self.primary_diagnosis,
            general_notes: self.general_notes,
        })
    }
}

impl pb::UpdatePatientReq {
    pub fn into_update(self) -> PatientResult<PatientUpdate> {
        Ok(PatientUpdate {
            first_name: self.first_name,
            last_name: self.last_name,
            date_of_birth: optional_date("date_of_birth", self.date_of_birth)?,
            gender: self.gender.as_deref().map(parse_gender).transpose()?,
            email: self.email,
            phone: self.phone,
            is_diabetic: self.is_diabetic,
            baseline_ldl: self.baseline_ldl,
            baseline_lvef: self.baseline_lvef,
            intervention_date: optional_date("intervention_date", self.intervention_date)?,
            next_appointment: optional_timestamp("next_appointment", self.next_appointment)?,
            status: parse_status(self.status.as_deref())?,
            primary_diagnosis: self.primary_diagnosis,
            general_notes: self.general_notes,
        })
    }
}

impl pb::AddVisitReq {
    pub fn into_visit_input(self) -> PatientResult<VisitInput> {
        Ok(VisitInput {
            visit_date: optional_timestamp("visit_date", self.visit_date)?,
            visit_number: self.visit_number,
            weight: self.weight,
            systolic_bp: self.systolic_bp,
            diastolic_bp: self.diastolic_bp,
            ldl: self.ldl,
            hba1c: self.hba1c,
            lvef: self.lvef,
            glucose: self.glucose,
            wall_motion: optional_wall_motion(self.wall_motion)?,
            outcomes: self.outcomes,
            notes: self.notes,
            medications: self
                .medications
                .into_iter()
                .map(|m| Medication {
                    name: m.name,
                    dosage: m.dosage,
                })
                .collect(),
        })
    }
}

impl pb::StepForm {
    /// Typed form for `step`; fields the step does not collect are dropped.
    pub fn into_step_form(self, step: StepId) -> PatientResult<StepForm> {
        let input = FormInput {
            vitals: Vitals {
                weight: self.weight,
                systolic_bp: self.systolic_bp,
                diastolic_bp: self.diastolic_bp,
                ldl: self.ldl,
            },
            baseline_lvef: self.baseline_lvef,
            medications: self.medications,
            glucose: self.glucose,
            hba1c: self.hba1c,
            lvef: self.lvef,
            wall_motion: optional_wall_motion(self.wall_motion)?,
            outcomes: self.outcomes,
        };
        Ok(StepForm::from_input(step, input))
    }
}

impl From<pb::PatientSnapshot> for PatientSnapshot {
    fn from(s: pb::PatientSnapshot) -> Self {
        PatientSnapshot {
            baseline_ldl: s.baseline_ldl,
            current_ldl: s.current_ldl,
            is_diabetic: s.is_diabetic,
            current_hba1c: s.current_hba1c,
            baseline_lvef: s.baseline_lvef,
            current_lvef: s.current_lvef,
            visit_number: s.visit_number,
        }
    }
}

// ---------------------------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------------------------

impl From<&Visit> for pb::Visit {
    fn from(v: &Visit) -> Self {
        pb::Visit {
            visit_date: timestamp(v.visit_date),
            visit_number: v.visit_number,
            weight: v.weight,
            systolic_bp: v.systolic_bp,
            diastolic_bp: v.diastolic_bp,
            ldl: v.ldl,
            hba1c: v.hba1c,
            lvef: v.lvef,
            glucose: v.glucose,
            wall_motion: v.wall_motion.map(|w| w.label().to_string()),
            outcomes: v.outcomes.clone(),
            notes: v.notes.clone(),
            medications: v
                .medications
                .iter()
                .map(|m| pb::Medication {
                    name: m.name.clone(),
                    dosage: m.dosage.clone(),
                })
                .collect(),
            lipid_control: v.lipid_control,
            glycemic_control: v.glycemic_control,
            alerts: v.alerts.clone(),
        }
    }
}

impl From<&Patient> for pb::Patient {
    fn from(p: &Patient) -> Self {
        pb::Patient {
            id: p.id.to_string(),
            first_name: p.first_name.to_string(),
            last_name: p.last_name.to_string(),
            date_of_birth: date(p.date_of_birth),
            gender: p.gender.to_string(),
            email: p.email.as_ref().map(|e| e.to_string()),
            phone: p.phone.clone(),
            is_diabetic: p.is_diabetic,
            baseline_ldl: p.baseline_ldl,
            baseline_lvef: p.baseline_lvef,
            intervention_date: p.intervention_date.map(date),
            next_appointment: p.next_appointment.map(timestamp),
            status: p.status.to_string(),
            primary_diagnosis: p.primary_diagnosis.clone(),
            general_notes: p.general_notes.clone(),
            visits: p.visits.iter().map(pb::Visit::from).collect(),
            protocol_completed: count(p.protocol.progress().completed),
            protocol_unlocked: p.protocol.is_unlocked(),
            created_at: timestamp(p.created_at),
            updated_at: timestamp(p.updated_at),
        }
    }
}

impl From<&RiskResult> for pb::RiskResult {
    fn from(r: &RiskResult) -> Self {
        pb::RiskResult {
            lipid_control: r.lipid_control,
            glycemic_control: r.glycemic_control,
            lipid_status: rule_status(r.lipid),
            glycemic_status: rule_status(r.glycemic),
            alerts: r.alerts.clone(),
            risk_level: r.risk_level.as_str().to_string(),
            recommendations: r.recommendations.clone(),
        }
    }
}

impl From<&PopulationStats> for pb::PopulationStatsRes {
    fn from(s: &PopulationStats) -> Self {
        pb::PopulationStatsRes {
            total: count(s.total),
            in_target: count(s.in_target),
            out_of_target: count(s.out_of_target),
            percentage_in_target: s.percentage_in_target,
            ldl_control_rate: s.ldl_control_rate,
            glycemic_control_rate: s.glycemic_control_rate,
            high_risk_count: count(s.high_risk_count),
            diabetic_count: count(s.diabetic_count),
        }
    }
}

impl From<&ChartSeries> for pb::ChartSeries {
    fn from(c: &ChartSeries) -> Self {
        pb::ChartSeries {
            name: c.name.to_string(),
            in_target: count(c.in_target),
            out_of_target: count(c.out_of_target),
        }
    }
}

impl From<&DashboardStats> for pb::DashboardRes {
    fn from(d: &DashboardStats) -> Self {
        pb::DashboardRes {
            active_patients: count(d.active_patients),
            ldl_control_percentage: d.ldl_control_percentage,
            upcoming_appointments: count(d.upcoming_appointments),
            high_risk_patients: count(d.high_risk_patients),
            population_stats: Some((&d.population_stats).into()),
            chart_data: d.chart_data.iter().map(pb::ChartSeries::from).collect(),
        }
    }
}

impl From<&StepForm> for pb::StepForm {
    fn from(form: &StepForm) -> Self {
        let input = form.to_input();
        pb::StepForm {
            weight: input.vitals.weight,
            systolic_bp: input.vitals.systolic_bp,
            diastolic_bp: input.vitals.diastolic_bp,
            ldl: input.vitals.ldl,
            baseline_lvef: input.baseline_lvef,
            medications: input.medications,
            glucose: input.glucose,
            hba1c: input.hba1c,
            lvef: input.lvef,
            wall_motion: input.wall_motion.map(|w| w.label().to_string()),
            outcomes: input.outcomes,
        }
    }
}

impl From<&ProtocolStepRecord> for pb::ProtocolStep {
    fn from(r: &ProtocolStepRecord) -> Self {
        pb::ProtocolStep {
            step_id: r.step_id.into(),
            label: r.label.clone(),
            form: Some((&r.form).into()),
            completed: r.completed,
            completed_at: r.completed_at.map(timestamp),
            completed_by: r.completed_by.clone(),
            notes: r.notes.clone(),
            updated_at: timestamp(r.updated_at),
        }
    }
}

impl From<&ProtocolView> for pb::ProtocolRes {
    fn from(v: &ProtocolView) -> Self {
        let availability = StepId::all()
            .map(|step| {
                let i = step.index();
                pb::StepStatus {
                    step_id: step.into(),
                    available: v.availability.available[i],
                    locked: v.availability.locked[i],
                    accessible: v.availability.accessible[i],
                    saved: v.record.is_saved(step),
                    completed: v.record.is_completed(step),
                }
            })
            .collect();

        pb::ProtocolRes {
            patient_id: v.patient_id.clone(),
            intervention_date: v.intervention_date.map(date),
            unlocked: v.record.unlock.unlocked,
            unlocked_by: v.record.unlock.unlocked_by.clone(),
            unlocked_at: v.record.unlock.unlocked_at.map(timestamp),
            active_step: v.active_step.into(),
            completed: count(v.progress.completed),
            total: count(v.progress.total),
            steps: v.progress.steps.iter().map(pb::ProtocolStep::from).collect(),
            availability,
        }
    }
}

impl From<&StepDefinition> for pb::StepDefinition {
    fn from(d: &StepDefinition) -> Self {
        pb::StepDefinition {
            step_id: u32::from(d.id),
            label: d.label.to_string(),
            month: d.month,
            description: d.description.to_string(),
            critical_fields: d.critical_fields.iter().map(|f| f.to_string()).collect(),
            fields: d
                .fields
                .iter()
                .map(|f| {
                    let (kind, options) = match f.kind {
                        FieldKind::Number => ("number", Vec::new()),
                        FieldKind::Text => ("text", Vec::new()),
                        FieldKind::Select(options) => {
                            ("select", options.iter().map(|o| o.to_string()).collect())
                        }
                    };
                    pb::FieldDescriptor {
                        name: f.name.to_string(),
                        label: f.label.to_string(),
                        unit: f.unit.map(str::to_string),
                        kind: kind.into(),
                        options,
                    }
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::protocol::PROTOCOL_STEPS;
    use vigil_core::RiskLevel;

    #[test]
    fn parses_dates_and_timestamps() {
        assert_eq!(
            parse_date("dob", "1960-02-29").unwrap(),
            NaiveDate::from_ymd_opt(1960, 2, 29).unwrap()
        );
        assert!(parse_date("dob", "29/02/1960").is_err());

        let ts = parse_timestamp("at", "2026-05-04T10:00:00+02:00").unwrap();
        assert_eq!(timestamp(ts), "2026-05-04T08:00:00Z");
        let midnight = parse_timestamp("at", "2026-05-04").unwrap();
        assert_eq!(timestamp(midnight), "2026-05-04T00:00:00Z");
    }

    #[test]
    fn create_request_requires_valid_gender_and_date() {
        let req = pb::CreatePatientReq {
            first_name: "Rosa".into(),
            last_name: "Gil".into(),
            date_of_birth: "1950-01-01".into(),
            gender: "female".into(),
            ..Default::default()
        };
        let new = req.clone().into_new_patient().unwrap();
        assert_eq!(new.gender, Gender::Female);
        assert_eq!(new.intervention_date, None);

        let bad = pb::CreatePatientReq {
            gender: "unknown".into(),
            ..req
        };
        assert!(matches!(
            bad.into_new_patient(),
            Err(PatientError::InvalidInput(_))
        ));
    }

    #[test]
    fn step_form_drops_foreign_fields() {
        let wire = pb::StepForm {
            weight: Some(70.0),
            glucose: Some(99.0),
            wall_motion: Some("Akinesia".into()),
            ..Default::default()
        };

        let form = wire.clone().into_step_form(StepId::MONTH_1).unwrap();
        let back = pb::StepForm::from(&form);
        assert_eq!(back.weight, Some(70.0));
        assert_eq!(back.glucose, None);
        assert_eq!(back.wall_motion, None);

        let structural = wire.into_step_form(StepId::MONTH_5).unwrap();
        assert_eq!(
            pb::StepForm::from(&structural).wall_motion.as_deref(),
            Some("Akinesia")
        );
    }

    #[test]
    fn invalid_wall_motion_is_rejected() {
        let wire = pb::StepForm {
            wall_motion: Some("wobbly".into()),
            ..Default::default()
        };
        assert!(wire.into_step_form(StepId::MONTH_5).is_err());
    }

    #[test]
    fn risk_result_uses_wire_codes() {
        let risk = vigil_core::evaluate_risk(&PatientSnapshot {
            current_ldl: Some(120.0),
            baseline_ldl: Some(130.0),
            ..PatientSnapshot::default()
        });
        let wire = pb::RiskResult::from(&risk);
        assert_eq!(risk.risk_level, RiskLevel::Medium);
        assert_eq!(wire.risk_level, "MEDIUM");
        assert_eq!(wire.lipid_status, "uncontrolled");
        assert_eq!(wire.glycemic_status, "not_evaluated");
    }

    #[test]
    fn step_definitions_expose_select_options() {
        let structural = pb::StepDefinition::from(&PROTOCOL_STEPS[3]);
        let wall_motion = structural
            .fields
            .iter()
            .find(|f| f.name == "wallMotion")
            .unwrap();
        assert_eq!(wall_motion.kind, "select");
        assert_eq!(wall_motion.options.len(), 6);
        assert_eq!(structural.month, 5);
    }

    #[test]
    fn out_of_range_step_is_a_protocol_error() {
        assert!(matches!(step_id(7), Err(PatientError::Protocol(_))));
        assert_eq!(step_id(6).unwrap(), StepId::MONTH_12);
    }
}
