//! Authenticated principals.

use std::fmt;

/// Authorization scheme a principal was authenticated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// `Authorization: Basic ...`
    Basic,
    /// `Authorization: Bearer ...`
    Bearer,
}

impl Scheme {
    /// Match a header scheme token, case-insensitively.
    #[must_use]
    pub fn from_header(token: &str) -> Option<Self> {
        if token.eq_ignore_ascii_case("basic") {
            Some(Self::Basic)
        } else if token.eq_ignore_ascii_case("bearer") {
            Some(Self::Bearer)
        } else {
            None
        }
    }

    /// Canonical name, also used as a metric label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Bearer => "bearer",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated caller of one request.
///
/// Lives in the request extensions for the duration of the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Scheme that produced this principal.
    pub scheme: Scheme,
    /// Basic user name or JWT `sub`.
    pub subject: String,
    /// Token type (`basic` or `jwt`).
    pub token_type: String,
    /// Raw capability strings; empty for Basic.
    pub capabilities: Vec<String>,
}

impl Principal {
    /// Token type assigned to Basic principals.
    pub const BASIC_TYPE: &'static str = "basic";
    /// Token type assigned to Bearer principals.
    pub const JWT_TYPE: &'static str = "jwt";

    /// A Basic principal.
    #[must_use]
    pub fn basic(subject: impl Into<String>) -> Self {
        Self {
            scheme: Scheme::Basic,
            subject: subject.into(),
            token_type: Self::BASIC_TYPE.to_string(),
            capabilities: Vec::new(),
        }
    }

    /// A Bearer principal carrying capabilities.
    #[must_use]
    pub fn bearer(subject: impl Into<String>, capabilities: Vec<String>) -> Self {
        Self {
            scheme: Scheme::Bearer,
            subject: subject.into(),
            token_type: Self::JWT_TYPE.to_string(),
            capabilities,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_matching_is_case_insensitive() {
        assert_eq!(Scheme::from_header("Basic"), Some(Scheme::Basic));
        assert_eq!(Scheme::from_header("BEARER"), Some(Scheme::Bearer));
        assert_eq!(Scheme::from_header("Digest"), None);
    }

    #[test]
    fn constructors_set_token_type() {
        assert_eq!(Principal::basic("user").token_type, "basic");
        let p = Principal::bearer("svc", vec!["x1:a:all".into()]);
        assert_eq!(p.token_type, "jwt");
        assert_eq!(p.capabilities.len(), 1);
    }
}
