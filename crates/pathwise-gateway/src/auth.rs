//! Role-based access control.
//!
//! Roles form the hierarchy `viewer < operator < admin`. Reads need any
//! role; anything that creates or advances a job needs `operator`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Caller role, ordered by privilege.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Read-only.
    Viewer,
    /// May submit and drive jobs.
    Operator,
    /// Everything.
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Viewer => "viewer",
            Self::Operator => "operator",
            Self::Admin => "admin",
        })
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "viewer" => Ok(Self::Viewer),
            "operator" => Ok(Self::Operator),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Per-request caller context, supplied by the auth layer in front of
/// the gateway. Read-only here.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GatewayContext {
    /// Caller role; `None` when the request is unauthenticated.
    pub role: Option<Role>,
    /// Hide artifact lists even from authorised callers.
    pub redacted: bool,
}

impl GatewayContext {
    /// Context carrying `role`, unredacted.
    pub fn new(role: Role) -> Self {
        Self {
            role: Some(role),
            redacted: false,
        }
    }

    /// Same context with redaction switched on.
    pub fn redacted(mut self) -> Self {
        self.redacted = true;
        self
    }
}

/// Fail unless `ctx` carries a role at or above `required`.
pub fn assert_role(ctx: &GatewayContext, required: Role) -> Result<Role, AuthError> {
    let actual = ctx.role.ok_or(AuthError::MissingRole)?;
    if actual < required {
        return Err(AuthError::Forbidden { required, actual });
    }
    Ok(actual)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hierarchy_is_ordered() {
        assert!(Role::Viewer < Role::Operator);
        assert!(Role::Operator < Role::Admin);
    }

    #[test]
    fn viewer_cannot_mutate() {
        let err = assert_role(&GatewayContext::new(Role::Viewer), Role::Operator).unwrap_err();
        assert_eq!(
            err,
            AuthError::Forbidden {
                required: Role::Operator,
                actual: Role::Viewer
            }
        );
    }

    #[test]
    fn higher_roles_pass() {
        for role in [Role::Operator, Role::Admin] {
            assert_eq!(
                assert_role(&GatewayContext::new(role), Role::Operator),
                Ok(role)
            );
        }
        assert!(assert_role(&GatewayContext::new(Role::Viewer), Role::Viewer).is_ok());
    }

    #[test]
    fn missing_role_is_rejected_even_for_reads() {
        assert_eq!(
            assert_role(&GatewayContext::default(), Role::Viewer),
            Err(AuthError::MissingRole)
        );
    }

    #[test]
    fn roles_parse_from_wire_names() {
        assert_eq!("operator".parse::<Role>(), Ok(Role::Operator));
        assert!("root".parse::<Role>().is_err());
        assert_eq!(Role::Admin.to_string(), "admin");
    }
}
