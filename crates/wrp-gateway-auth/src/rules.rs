//! Validation rules applied after a principal is produced.

use crate::capability::CapabilityRule;
use crate::error::{AuthError, Result};
use crate::principal::Principal;

/// The request facts rules are evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct RequestInfo<'a> {
    /// HTTP method.
    pub method: &'a str,
    /// Request path with the API base prefix removed.
    pub path: &'a str,
}

/// One validation rule.
#[derive(Clone)]
pub enum Rule {
    /// The subject must be non-empty.
    NonEmptyPrincipal,
    /// The token type must be non-empty.
    NonEmptyType,
    /// The token type must be one of the listed values.
    ValidType(Vec<String>),
    /// Always passes.
    AllowAll,
    /// Capability check.
    Capability(CapabilityRule),
}

impl Rule {
    /// The baseline rules every Bearer principal must satisfy.
    #[must_use]
    pub fn bearer_defaults() -> Vec<Self> {
        vec![
            Self::NonEmptyPrincipal,
            Self::NonEmptyType,
            Self::ValidType(vec![Principal::JWT_TYPE.to_string()]),
        ]
    }

    /// Evaluate the rule.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::RuleFailed`] or [`AuthError::CapabilityDenied`]
    /// if the principal does not satisfy the rule.
    pub fn check(&self, principal: &Principal, request: &RequestInfo<'_>) -> Result<()> {
        match self {
            Self::NonEmptyPrincipal if principal.subject.is_empty() => {
                Err(AuthError::RuleFailed("empty principal"))
            }
            Self::NonEmptyType if principal.token_type.is_empty() => {
                Err(AuthError::RuleFailed("empty token type"))
            }
            Self::ValidType(types) if !types.iter().any(|t| *t == principal.token_type) => {
                Err(AuthError::RuleFailed("invalid token type"))
            }
            Self::Capability(rule) => rule.evaluate(principal, request),
            _ => Ok(()),
        }
    }
}
