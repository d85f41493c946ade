//! Shared primitives for all Rust crates in Elevia.

#![forbid(unsafe_code)]

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across Elevia crates.
pub type AppResult<T> = Result<T, AppError>;

/// One problem found while validating a policy document.
///
/// Validation collects every issue before failing so policy authors see all
/// problems in one pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyIssue {
    /// Stable machine-readable code, e.g. `duplicate-group-id`.
    pub code: String,
    /// Path to the offending element, e.g. `prod/network/admins/access[2]`.
    pub location: String,
    /// Human-readable description of the problem.
    pub detail: String,
}

impl PolicyIssue {
    /// Creates a policy issue.
    #[must_use]
    pub fn new(
        code: impl Into<String>,
        location: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            location: location.into(),
            detail: detail.into(),
        }
    }
}

impl Display for PolicyIssue {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "[{}] {}: {}",
            self.code, self.location, self.detail
        )
    }
}

/// Failures of one or more concurrent sub-operations, all causes preserved.
#[derive(Debug)]
pub struct AggregateError {
    failures: Vec<(String, AppError)>,
}

impl AggregateError {
    /// Creates an aggregate from labeled failures. Must not be empty.
    #[must_use]
    pub fn new(failures: Vec<(String, AppError)>) -> Self {
        Self { failures }
    }

    /// Returns the labeled failures.
    #[must_use]
    pub fn failures(&self) -> &[(String, AppError)] {
        &self.failures
    }
}

impl Display for AggregateError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{} sub-operation(s) failed:", self.failures.len())?;
        for (label, error) in &self.failures {
            write!(formatter, "\n- {label}: {error}")?;
        }
        Ok(())
    }
}

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Authenticated but not authorized. Also covers entitlements whose
    /// existence must not leak to the caller.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Caller identity could not be established.
    #[error("not authenticated: {0}")]
    NotAuthenticated(String),

    /// Policy document failed validation; carries every issue found.
    #[error("policy validation failed:{}", format_issues(.0))]
    Policy(Vec<PolicyIssue>),

    /// Duration, peer count, or custom expression outside declared bounds.
    #[error("constraint violated: {0}")]
    ConstraintViolation(String),

    /// A custom constraint expression failed to compile or evaluate.
    #[error("invalid expression: {0}")]
    InvalidExpression(String),

    /// One or more concurrent sub-operations failed.
    #[error("aggregate failure: {0}")]
    Aggregate(AggregateError),

    /// External-service communication failure. Retryable by the caller,
    /// never retried by this engine.
    #[error("transient failure: {0}")]
    Transient(String),

    /// Requested resource does not exist (non-sensitive lookups only).
    #[error("not found: {0}")]
    NotFound(String),

    /// Internal unexpected error or violated programming contract.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns whether a retry of the failed operation could succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transient(_) => true,
            Self::Aggregate(aggregate) => aggregate
                .failures()
                .iter()
                .any(|(_, error)| error.is_retryable()),
            _ => false,
        }
    }
}

fn format_issues(issues: &[PolicyIssue]) -> String {
    issues
        .iter()
        .map(|issue| format!("\n- {issue}"))
        .collect::<String>()
}

#[cfg(test)]
mod tests {
    use super::{AggregateError, AppError, PolicyIssue};

    #[test]
    fn policy_error_lists_every_issue() {
        let error = AppError::Policy(vec![
            PolicyIssue::new("empty-acl", "prod/net/admins", "access list is empty"),
            PolicyIssue::new("bad-duration", "prod/net/admins", "min exceeds max"),
        ]);

        let rendered = error.to_string();
        assert!(rendered.contains("empty-acl"));
        assert!(rendered.contains("bad-duration"));
    }

    #[test]
    fn aggregate_error_is_retryable_when_any_cause_is() {
        let aggregate = AppError::Aggregate(AggregateError::new(vec![
            (
                "projects/a".to_owned(),
                AppError::AccessDenied("nope".to_owned()),
            ),
            (
                "projects/b".to_owned(),
                AppError::Transient("timeout".to_owned()),
            ),
        ]));

        assert!(aggregate.is_retryable());
        assert!(!AppError::AccessDenied("nope".to_owned()).is_retryable());
    }
}
