//! Identity and role model.
//!
//! Every authorization decision is made against an [`Identity`]. Roles
//! form a total privilege order (`SuperAdmin > Admin > User`) and
//! [`Role::at_least`] is the only place that ordering is consulted.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ArchiveError;

/// Privilege level of an identity.
///
/// Variant order matters: the derived `Ord` is the privilege order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    User,
    Admin,
    SuperAdmin,
}

impl Role {
    /// Returns `true` if this role carries at least the privileges of
    /// `other`.
    pub fn at_least(self, other: Role) -> bool {
        self >= other
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::SuperAdmin => "super-admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ArchiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            "super-admin" => Ok(Role::SuperAdmin),
            other => Err(ArchiveError::validation(format!("unknown role: {other}"))),
        }
    }
}

/// Reference to a [`ServiceScope`](super::service_scope::ServiceScope)
/// by its unique code.
///
/// Codes are trimmed and never empty. Whether a code names an existing
/// service is a lookup against the service scope repository.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct ServiceCode(String);

impl ServiceCode {
    pub fn new(code: impl Into<String>) -> Result<Self, ArchiveError> {
        let code = code.into();
        let trimmed = code.trim();
        if trimmed.is_empty() {
            return Err(ArchiveError::validation("service code must not be empty"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ServiceCode {
    type Error = ArchiveError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ServiceCode> for String {
    fn from(code: ServiceCode) -> Self {
        code.0
    }
}

/// The authenticated subject of an operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
    pub role: Role,
    /// The service this identity belongs to.
    pub service: ServiceCode,
    pub is_active: bool,
}

/// Per-request acting context, passed explicitly to every service
/// operation.
#[derive(Debug, Clone)]
pub struct Actor {
    pub identity: Identity,
    /// Network address the request originated from, if known.
    pub source_address: Option<String>,
}

impl Actor {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            source_address: None,
        }
    }

    pub fn with_source_address(mut self, address: impl Into<String>) -> Self {
        self.source_address = Some(address.into());
        self
    }

    pub fn id(&self) -> Uuid {
        self.identity.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_order_is_total() {
        assert!(Role::SuperAdmin.at_least(Role::Admin));
        assert!(Role::SuperAdmin.at_least(Role::User));
        assert!(Role::Admin.at_least(Role::User));
        assert!(Role::Admin.at_least(Role::Admin));
        assert!(!Role::User.at_least(Role::Admin));
        assert!(!Role::Admin.at_least(Role::SuperAdmin));
    }

    #[test]
    fn role_string_forms() {
        for role in [Role::User, Role::Admin, Role::SuperAdmin] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert_eq!(
            serde_json::to_string(&Role::SuperAdmin).unwrap(),
            "\"super-admin\""
        );
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn service_code_is_trimmed_and_non_empty() {
        assert_eq!(ServiceCode::new("  RH ").unwrap().as_str(), "RH");
        assert!(ServiceCode::new("   ").is_err());
        assert!(serde_json::from_str::<ServiceCode>("\"\"").is_err());
    }
}
