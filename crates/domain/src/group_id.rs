use std::fmt::{Display, Formatter};
use std::str::FromStr;

use elevia_core::AppError;
use serde::{Deserialize, Serialize};

/// Identifier of a declared JIT group: (environment, system, name).
///
/// Case-normalized and globally unique; identifies the group independent of
/// whether it has been provisioned yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JitGroupId {
    environment: String,
    system: String,
    name: String,
}

impl JitGroupId {
    /// Creates a group id from validated segments.
    pub fn new(
        environment: impl Into<String>,
        system: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Self, AppError> {
        let environment = validate_segment("environment", environment.into())?;
        let system = validate_segment("system", system.into())?;
        let name = validate_segment("name", name.into())?;

        Ok(Self {
            environment,
            system,
            name,
        })
    }

    /// Returns the environment segment.
    #[must_use]
    pub fn environment(&self) -> &str {
        self.environment.as_str()
    }

    /// Returns the system segment.
    #[must_use]
    pub fn system(&self) -> &str {
        self.system.as_str()
    }

    /// Returns the group name segment.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }
}

impl Display for JitGroupId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}.{}.{}",
            self.environment, self.system, self.name
        )
    }
}

impl FromStr for JitGroupId {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut segments = value.split('.');
        match (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) {
            (Some(environment), Some(system), Some(name), None) => {
                Self::new(environment, system, name)
            }
            _ => Err(AppError::Internal(format!(
                "group id '{value}' must use '<environment>.<system>.<name>' syntax"
            ))),
        }
    }
}

impl From<JitGroupId> for String {
    fn from(value: JitGroupId) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for JitGroupId {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Segments must start with a letter and use lowercase letters, digits, or
/// dashes, at most 63 characters.
fn validate_segment(label: &str, value: String) -> Result<String, AppError> {
    let value = value.trim().to_ascii_lowercase();

    let mut characters = value.chars();
    let starts_with_letter = characters
        .next()
        .map(|first| first.is_ascii_lowercase())
        .unwrap_or(false);
    let rest_valid =
        characters.all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-');

    if !starts_with_letter || !rest_valid || value.len() > 63 {
        return Err(AppError::Internal(format!(
            "{label} segment '{value}' must match [a-z][a-z0-9-]{{0,62}}"
        )));
    }

    Ok(value)
}
