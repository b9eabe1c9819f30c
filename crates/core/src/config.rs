//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into core services. Request
//! handling never reads process-wide environment variables.

use crate::constants::{DEFAULT_APPOINTMENT_WINDOW_DAYS, PATIENTS_DIR_NAME};
use crate::risk::{GlycemicPolicy, RiskEvaluator};
use crate::{PatientError, PatientResult};
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    patient_data_dir: PathBuf,
    glycemic_policy: GlycemicPolicy,
    appointment_window_days: u32,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    pub fn new(
        patient_data_dir: PathBuf,
        glycemic_policy: GlycemicPolicy,
        appointment_window_days: u32,
    ) -> PatientResult<Self> {
        if patient_data_dir.as_os_str().is_empty() {
            return Err(PatientError::InvalidInput(
                "patient data directory cannot be empty".into(),
            ));
        }

        Ok(Self {
            patient_data_dir,
            glycemic_policy,
            appointment_window_days,
        })
    }

    pub fn patient_data_dir(&self) -> &Path {
        &self.patient_data_dir
    }

    pub fn patients_dir(&self) -> PathBuf {
        self.patient_data_dir.join(PATIENTS_DIR_NAME)
    }

    pub fn glycemic_policy(&self) -> GlycemicPolicy {
        self.glycemic_policy
    }

    /// Evaluator configured with this deployment's glycemic policy.
    pub fn risk_evaluator(&self) -> RiskEvaluator {
        RiskEvaluator::new(self.glycemic_policy)
    }

    pub fn appointment_window_days(&self) -> u32 {
        self.appointment_window_days
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse the glycemic policy from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`GlycemicPolicy::Legacy`].
pub fn glycemic_policy_from_env_value(value: Option<String>) -> PatientResult<GlycemicPolicy> {
    non_blank(value)
        .map(|v| v.parse::<GlycemicPolicy>())
        .transpose()
        .map_err(PatientError::InvalidInput)
        .map(Option::unwrap_or_default)
}

/// Parse the dashboard appointment window (days) from an optional string value.
pub fn appointment_window_from_env_value(value: Option<String>) -> PatientResult<u32> {
    let Some(value) = non_blank(value) else {
        return Ok(DEFAULT_APPOINTMENT_WINDOW_DAYS);
    };
    value.parse::<u32>().map_err(|e| {
        PatientError::InvalidInput(format!(
            "VIGIL_APPOINTMENT_WINDOW_DAYS must be a whole number of days: {}",
            e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glycemic_policy_defaults_to_legacy() {
        assert_eq!(
            glycemic_policy_from_env_value(None).unwrap(),
            GlycemicPolicy::Legacy
        );
        assert_eq!(
            glycemic_policy_from_env_value(Some("  ".into())).unwrap(),
            GlycemicPolicy::Legacy
        );
        assert_eq!(
            glycemic_policy_from_env_value(Some("Not-Applicable-Controlled".into())).unwrap(),
            GlycemicPolicy::NotApplicableControlled
        );
        assert!(matches!(
            glycemic_policy_from_env_value(Some("strict".into())),
            Err(PatientError::InvalidInput(_))
        ));
    }

    #[test]
    fn appointment_window_parses_days() {
        assert_eq!(appointment_window_from_env_value(None).unwrap(), 7);
        assert_eq!(appointment_window_from_env_value(Some("14".into())).unwrap(), 14);
        assert!(appointment_window_from_env_value(Some("a week".into())).is_err());
    }

    #[test]
    fn rejects_empty_data_dir() {
        assert!(CoreConfig::new(PathBuf::new(), GlycemicPolicy::Legacy, 7).is_err());
        let cfg = CoreConfig::new(PathBuf::from("/tmp/vigil"), GlycemicPolicy::Legacy, 7).unwrap();
        assert_eq!(cfg.patients_dir(), PathBuf::from("/tmp/vigil/patients"));
    }
}
