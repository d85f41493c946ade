use std::fmt::{Display, Formatter};
use std::str::FromStr;

use elevia_core::AppError;
use serde::{Deserialize, Serialize};

/// A user or group identity as declared in policy and resolved by the
/// directory.
///
/// Groups are expandable to their transitive user membership by the
/// directory collaborator; this type only carries the identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PrincipalId {
    /// An individual end user, identified by email.
    User(String),
    /// A directory group, identified by email.
    Group(String),
}

impl PrincipalId {
    /// Creates a user principal from an email address.
    pub fn user(email: impl Into<String>) -> Self {
        Self::User(normalize(email.into()))
    }

    /// Creates a group principal from an email address.
    pub fn group(email: impl Into<String>) -> Self {
        Self::Group(normalize(email.into()))
    }

    /// Returns the bare email address of the principal.
    #[must_use]
    pub fn email(&self) -> &str {
        match self {
            Self::User(email) | Self::Group(email) => email.as_str(),
        }
    }

    /// Returns whether this principal is an individual user.
    #[must_use]
    pub fn is_user(&self) -> bool {
        matches!(self, Self::User(_))
    }
}

impl Display for PrincipalId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User(email) => write!(formatter, "user:{email}"),
            Self::Group(email) => write!(formatter, "group:{email}"),
        }
    }
}

impl FromStr for PrincipalId {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (kind, email) = value.split_once(':').ok_or_else(|| {
            AppError::Internal(format!(
                "principal '{value}' must use 'user:<email>' or 'group:<email>' syntax"
            ))
        })?;

        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(AppError::Internal(format!(
                "principal '{value}' does not carry a valid email address"
            )));
        }

        match kind {
            "user" => Ok(Self::user(email)),
            "group" => Ok(Self::group(email)),
            _ => Err(AppError::Internal(format!(
                "unknown principal kind '{kind}' in '{value}'"
            ))),
        }
    }
}

impl From<PrincipalId> for String {
    fn from(value: PrincipalId) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for PrincipalId {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

fn normalize(email: String) -> String {
    email.trim().to_ascii_lowercase()
}
