//! The clinician or administrator performing an operation.

use crate::{EmailAddress, NonEmptyText};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Account role. Only administrators may override protocol gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Resident,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Resident => "RESIDENT",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "RESIDENT" => Ok(Role::Resident),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Identity attached to protocol writes and lock changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub name: NonEmptyText,
    pub email: EmailAddress,
    pub role: Role,
}

impl Actor {
    pub fn new(name: NonEmptyText, email: EmailAddress, role: Role) -> Self {
        Self { name, email, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Value stored in `completed_by` / `unlocked_by` audit fields.
    pub fn identity(&self) -> String {
        self.email.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
        assert_eq!(" Resident ".parse::<Role>(), Ok(Role::Resident));
        assert!("nurse".parse::<Role>().is_err());
    }

    #[test]
    fn identity_is_the_email() {
        let actor = Actor::new(
            NonEmptyText::new("Dr Vega").unwrap(),
            EmailAddress::parse("Vega@Clinic.org").unwrap(),
            Role::Resident,
        );
        assert_eq!(actor.identity(), "vega@clinic.org");
        assert!(!actor.is_admin());
    }
}
