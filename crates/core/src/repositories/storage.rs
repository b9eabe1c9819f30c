//! Sharded JSON storage primitives.

use crate::constants::PATIENT_JSON_FILENAME;
use crate::error::{PatientError, PatientResult};
use crate::patient::Patient;
use crate::ShardableUuid;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

/// Creates a unique sharded directory within `base_dir`.
///
/// Retries with a fresh identifier if the directory already exists, up to 5 times.
pub(crate) fn create_uuid_and_shard_dir(
    base_dir: &Path,
    mut uuid_source: impl FnMut() -> ShardableUuid,
) -> PatientResult<(ShardableUuid, PathBuf)> {
    for _attempt in 0..5 {
        let uuid = uuid_source();
        let candidate = uuid.sharded_dir(base_dir);

        if candidate.exists() {
            continue;
        }

        if let Some(parent) = candidate.parent() {
            fs::create_dir_all(parent).map_err(PatientError::PatientDirCreation)?;
        }

        match fs::create_dir(&candidate) {
            Ok(()) => return Ok((uuid, candidate)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(PatientError::PatientDirCreation(e)),
        }
    }

    Err(PatientError::PatientDirCreation(io::Error::new(
        ErrorKind::AlreadyExists,
        "failed to allocate a unique patient directory after 5 attempts",
    )))
}

pub(crate) fn patient_file(base_dir: &Path, id: &ShardableUuid) -> PathBuf {
    id.sharded_dir(base_dir).join(PATIENT_JSON_FILENAME)
}

pub(crate) fn read_patient(path: &Path) -> PatientResult<Patient> {
    let contents = fs::read_to_string(path).map_err(PatientError::FileRead)?;
    serde_json::from_str(&contents).map_err(PatientError::Deserialization)
}

/// Writes `patient` next to `path` and renames it into place.
pub(crate) fn write_patient(path: &Path, patient: &Patient) -> PatientResult<()> {
    let json = serde_json::to_string_pretty(patient).map_err(PatientError::Serialization)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(PatientError::FileWrite)?;
    fs::rename(&tmp, path).map_err(PatientError::FileWrite)
}

/// Every `patient.json` under `<base_dir>/<s1>/<s2>/<uuid>/`.
pub(crate) fn patient_files(base_dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let Ok(s1_iter) = fs::read_dir(base_dir) else {
        return files;
    };
    for s1 in s1_iter.flatten() {
        let Ok(s2_iter) = fs::read_dir(s1.path()) else {
            continue;
        };
        for s2 in s2_iter.flatten() {
            let Ok(id_iter) = fs::read_dir(s2.path()) else {
                continue;
            };
            for id_ent in id_iter.flatten() {
                let candidate = id_ent.path().join(PATIENT_JSON_FILENAME);
                if candidate.is_file() {
                    files.push(candidate);
                }
            }
        }
    }

    files
}
