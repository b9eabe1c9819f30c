//! Startup configuration shared by the server binaries.

use std::path::PathBuf;
use std::sync::Arc;

use vigil_core::config::{appointment_window_from_env_value, glycemic_policy_from_env_value};
use vigil_core::{CoreConfig, PatientError, PatientResult, DEFAULT_PATIENT_DATA_DIR};

/// Resolves [`CoreConfig`] from `PATIENT_DATA_DIR`, `VIGIL_GLYCEMIC_POLICY` and
/// `VIGIL_APPOINTMENT_WINDOW_DAYS`.
///
/// The data directory must already exist.
pub fn core_config_from_env() -> PatientResult<Arc<CoreConfig>> {
    let patient_data_dir = std::env::var("PATIENT_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_PATIENT_DATA_DIR));
    if !patient_data_dir.is_dir() {
        return Err(PatientError::InvalidInput(format!(
            "Patient data directory does not exist: {}",
            patient_data_dir.display()
        )));
    }

    let glycemic_policy =
        glycemic_policy_from_env_value(std::env::var("VIGIL_GLYCEMIC_POLICY").ok())?;
    let window_days =
        appointment_window_from_env_value(std::env::var("VIGIL_APPOINTMENT_WINDOW_DAYS").ok())?;

    tracing::info!(
        data_dir = %patient_data_dir.display(),
        ?glycemic_policy,
        window_days,
        "configuration resolved"
    );

    Ok(Arc::new(CoreConfig::new(
        patient_data_dir,
        glycemic_policy,
        window_days,
    )?))
}
