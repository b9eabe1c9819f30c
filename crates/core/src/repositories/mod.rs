//! Repository management modules.
//!
//! Patients are stored one JSON document per patient. [`patients`] owns storage and the patient
//! lifecycle; [`protocol`] layers the follow-up protocol operations on top of it.

pub mod patients;
pub mod protocol;
mod storage;

pub use patients::PatientRepository;
pub use protocol::ProtocolView;
