//! Constants used throughout the Vigil core crate.
//!
//! Path and filename constants live here so the storage layout is defined in one place.

/// Default directory for patient data storage when no explicit directory is configured.
pub const DEFAULT_PATIENT_DATA_DIR: &str = "patient_data";

/// Directory name for patient records storage.
pub const PATIENTS_DIR_NAME: &str = "patients";

/// Filename for patient JSON files.
pub const PATIENT_JSON_FILENAME: &str = "patient.json";

/// Default look-ahead window for upcoming appointments on the dashboard.
pub const DEFAULT_APPOINTMENT_WINDOW_DAYS: u32 = 7;
