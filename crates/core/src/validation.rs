//! Input validation utilities.
//!
//! Clinical measurements must be finite and non-negative before they are stored or evaluated.
//! Missing values are always accepted; they simply disable the rules that need them.

use crate::patient::{NewPatient, PatientUpdate, VisitInput};
use crate::protocol::StepForm;
use crate::risk::PatientSnapshot;
use crate::{PatientError, PatientResult};

/// Rejects NaN, infinities and negative values for the named measurement.
pub fn validate_measurement(field: &str, value: Option<f64>) -> PatientResult<()> {
    match value {
        Some(v) if !v.is_finite() => Err(PatientError::InvalidInput(format!(
            "{} must be a finite number",
            field
        ))),
        Some(v) if v < 0.0 => Err(PatientError::InvalidInput(format!(
            "{} cannot be negative",
            field
        ))),
        _ => Ok(()),
    }
}

fn validate_all(values: &[(&str, Option<f64>)]) -> PatientResult<()> {
    values
        .iter()
        .try_for_each(|(field, value)| validate_measurement(field, *value))
}

pub fn validate_snapshot(snapshot: &PatientSnapshot) -> PatientResult<()> {
    validate_all(&[
        ("baselineLDL", snapshot.baseline_ldl),
        ("currentLDL", snapshot.current_ldl),
        ("currentHbA1c", snapshot.current_hba1c),
        ("baselineLVEF", snapshot.baseline_lvef),
        ("currentLVEF", snapshot.current_lvef),
    ])
}

pub fn validate_visit(input: &VisitInput) -> PatientResult<()> {
    if input.visit_number == Some(0) {
        return Err(PatientError::InvalidInput(
            "visit number starts at 1".into(),
        ));
    }
    validate_all(&[
        ("weight", input.weight),
        ("systolicBP", input.systolic_bp),
        ("diastolicBP", input.diastolic_bp),
        ("ldl", input.ldl),
        ("hba1c", input.hba1c),
        ("lvef", input.lvef),
        ("glucose", input.glucose),
    ])
}

pub fn validate_form(form: &StepForm) -> PatientResult<()> {
    let input = form.to_input();
    validate_all(&[
        ("weight", input.vitals.weight),
        ("systolicBP", input.vitals.systolic_bp),
        ("diastolicBP", input.vitals.diastolic_bp),
        ("ldl", input.vitals.ldl),
        ("baselineLVEF", input.baseline_lvef),
        ("glucose", input.glucose),
        ("hba1c", input.hba1c),
        ("lvef", input.lvef),
    ])
}

pub fn validate_new_patient(new: &NewPatient) -> PatientResult<()> {
    validate_all(&[
        ("baselineLDL", new.baseline_ldl),
        ("baselineLVEF", new.baseline_lvef),
    ])
}

pub fn validate_update(update: &PatientUpdate) -> PatientResult<()> {
    validate_all(&[
        ("baselineLDL", update.baseline_ldl),
        ("baselineLVEF", update.baseline_lvef),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_missing_and_zero() {
        assert!(validate_measurement("ldl", None).is_ok());
        assert!(validate_measurement("ldl", Some(0.0)).is_ok());
    }

    #[test]
    fn rejects_nan_infinite_and_negative() {
        assert!(validate_measurement("ldl", Some(f64::NAN)).is_err());
        assert!(validate_measurement("ldl", Some(f64::INFINITY)).is_err());
        let err = validate_measurement("lvef", Some(-1.0)).unwrap_err();
        assert_eq!(err.to_string(), "invalid input: lvef cannot be negative");
    }

    #[test]
    fn visit_numbers_start_at_one() {
        let input = VisitInput {
            visit_number: Some(0),
            ..VisitInput::default()
        };
        assert!(validate_visit(&input).is_err());
    }
}
