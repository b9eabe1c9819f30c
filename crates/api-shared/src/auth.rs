//! Caller checks shared by both APIs.
//!
//! Authentication proper is out of scope: gRPC callers present a shared API key, and every caller
//! names itself with an [`Actor`] used for audit fields and the admin check.

use vigil_core::{Actor, EmailAddress, NonEmptyText, PatientError, PatientResult, Role};

/// Validates the provided API key against the key configured at startup.
#[allow(clippy::result_large_err)]
pub fn validate_api_key(provided_key: &str, expected_key: &str) -> Result<(), tonic::Status> {
    if provided_key == expected_key {
        Ok(())
    } else {
        Err(tonic::Status::unauthenticated("Invalid API key"))
    }
}

/// Builds an [`Actor`] from untrusted name, email and role strings.
pub fn actor_from_parts(name: &str, email: &str, role: &str) -> PatientResult<Actor> {
    let name = NonEmptyText::new(name)
        .map_err(|_| PatientError::InvalidInput("actor name is required".into()))?;
    let email = EmailAddress::parse(email)?;
    let role = role.parse::<Role>().map_err(PatientError::InvalidInput)?;
    Ok(Actor::new(name, email, role))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_must_match() {
        assert!(validate_api_key("s3cret", "s3cret").is_ok());
        let err = validate_api_key("guess", "s3cret").unwrap_err();
        assert_eq!(err.code(), tonic::Code::Unauthenticated);
    }

    #[test]
    fn builds_actor_from_strings() {
        let actor = actor_from_parts("Dr Vega", "Vega@Clinic.org", "admin").unwrap();
        assert!(actor.is_admin());
        assert_eq!(actor.identity(), "vega@clinic.org");

        assert!(matches!(
            actor_from_parts("", "vega@clinic.org", "ADMIN"),
            Err(PatientError::InvalidInput(_))
        ));
        assert!(matches!(
            actor_from_parts("Dr Vega", "not-an-email", "ADMIN"),
            Err(PatientError::Text(_))
        ));
        assert!(actor_from_parts("Dr Vega", "vega@clinic.org", "nurse").is_err());
    }
}
