use chrono::Duration;
use elevia_core::{AppError, AppResult};

/// Declared activation duration bounds for a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationBounds {
    min: Duration,
    default: Duration,
    max: Duration,
}

impl DurationBounds {
    /// Creates duration bounds, rejecting inconsistent values.
    pub fn new(min: Duration, default: Duration, max: Duration) -> AppResult<Self> {
        if min <= Duration::zero() {
            return Err(AppError::Internal(
                "minimum activation duration must be positive".to_owned(),
            ));
        }
        if min > default {
            return Err(AppError::Internal(format!(
                "minimum activation duration {min} exceeds default {default}"
            )));
        }
        if default > max {
            return Err(AppError::Internal(format!(
                "default activation duration {default} exceeds maximum {max}"
            )));
        }

        Ok(Self { min, default, max })
    }

    /// Returns the minimum activation duration.
    #[must_use]
    pub fn min(&self) -> Duration {
        self.min
    }

    /// Returns the default activation duration.
    #[must_use]
    pub fn default_duration(&self) -> Duration {
        self.default
    }

    /// Returns the maximum activation duration.
    #[must_use]
    pub fn max(&self) -> Duration {
        self.max
    }

    /// Checks a requested duration against the declared bounds.
    ///
    /// Failures name the specific bound that was violated.
    pub fn check(&self, requested: Duration) -> AppResult<()> {
        if requested < self.min {
            return Err(AppError::ConstraintViolation(format!(
                "requested duration {requested} is below the minimum of {}",
                self.min
            )));
        }
        if requested > self.max {
            return Err(AppError::ConstraintViolation(format!(
                "requested duration {requested} exceeds the maximum of {}",
                self.max
            )));
        }

        Ok(())
    }
}

impl Default for DurationBounds {
    /// One minute minimum, fifteen minute default, one day maximum.
    fn default() -> Self {
        Self {
            min: Duration::minutes(1),
            default: Duration::minutes(15),
            max: Duration::days(1),
        }
    }
}

/// Declared bounds on the number of peer reviewers to notify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApprovalBounds {
    minimum_peers_to_notify: u32,
    maximum_peers_to_notify: u32,
}

impl ApprovalBounds {
    /// Creates approval bounds, rejecting inconsistent values.
    pub fn new(minimum_peers_to_notify: u32, maximum_peers_to_notify: u32) -> AppResult<Self> {
        if maximum_peers_to_notify == 0 {
            return Err(AppError::Internal(
                "maximum_peers_to_notify must be greater than zero".to_owned(),
            ));
        }
        if minimum_peers_to_notify > maximum_peers_to_notify {
            return Err(AppError::Internal(format!(
                "minimum_peers_to_notify {minimum_peers_to_notify} exceeds \
                 maximum_peers_to_notify {maximum_peers_to_notify}"
            )));
        }

        Ok(Self {
            minimum_peers_to_notify,
            maximum_peers_to_notify,
        })
    }

    /// Returns the minimum number of peers to notify.
    #[must_use]
    pub fn minimum_peers_to_notify(&self) -> u32 {
        self.minimum_peers_to_notify
    }

    /// Returns the maximum number of peers to notify.
    #[must_use]
    pub fn maximum_peers_to_notify(&self) -> u32 {
        self.maximum_peers_to_notify
    }

    /// Checks a reviewer count against the declared bounds.
    pub fn check(&self, reviewer_count: usize) -> AppResult<()> {
        let count = u32::try_from(reviewer_count).unwrap_or(u32::MAX);
        if count < self.minimum_peers_to_notify {
            return Err(AppError::ConstraintViolation(format!(
                "{count} reviewer(s) selected, at least {} required",
                self.minimum_peers_to_notify
            )));
        }
        if count > self.maximum_peers_to_notify {
            return Err(AppError::ConstraintViolation(format!(
                "{count} reviewer(s) selected, at most {} allowed",
                self.maximum_peers_to_notify
            )));
        }

        Ok(())
    }
}

impl Default for ApprovalBounds {
    fn default() -> Self {
        Self {
            minimum_peers_to_notify: 1,
            maximum_peers_to_notify: 10,
        }
    }
}

/// Constraints declared on a group: duration bounds, approval bounds, and
/// custom boolean expressions evaluated at join time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraints {
    duration: DurationBounds,
    approval: ApprovalBounds,
    expressions: Vec<String>,
}

impl Constraints {
    /// Creates a constraints record.
    #[must_use]
    pub fn new(
        duration: DurationBounds,
        approval: ApprovalBounds,
        expressions: Vec<String>,
    ) -> Self {
        Self {
            duration,
            approval,
            expressions,
        }
    }

    /// Returns the activation duration bounds.
    #[must_use]
    pub fn duration(&self) -> &DurationBounds {
        &self.duration
    }

    /// Returns the peer approval bounds.
    #[must_use]
    pub fn approval(&self) -> &ApprovalBounds {
        &self.approval
    }

    /// Returns the custom join-time expressions.
    #[must_use]
    pub fn expressions(&self) -> &[String] {
        &self.expressions
    }
}

/// Parses an ISO-8601 duration such as `PT15M`, `P1D`, or `P1DT12H`.
///
/// Supports days, hours, minutes, and seconds; years and months are
/// rejected because activation windows never reach that scale.
pub fn parse_iso8601_duration(text: &str) -> AppResult<Duration> {
    let trimmed = text.trim();
    let rest = trimmed
        .strip_prefix('P')
        .or_else(|| trimmed.strip_prefix('p'))
        .ok_or_else(|| invalid_duration(text))?;

    if rest.is_empty() {
        return Err(invalid_duration(text));
    }

    let (date_part, time_part) = match rest.split_once(['T', 't']) {
        Some((date, time)) => (date, Some(time)),
        None => (rest, None),
    };

    let mut total = Duration::zero();
    let mut saw_component = false;

    for (value, unit) in components(date_part)? {
        let component = match unit {
            'D' => Duration::try_days(value),
            'W' => Duration::try_weeks(value),
            _ => None,
        }
        .ok_or_else(|| invalid_duration(text))?;
        total = total
            .checked_add(&component)
            .ok_or_else(|| invalid_duration(text))?;
        saw_component = true;
    }

    if let Some(time_part) = time_part {
        if time_part.is_empty() {
            return Err(invalid_duration(text));
        }
        for (value, unit) in components(time_part)? {
            let component = match unit {
                'H' => Duration::try_hours(value),
                'M' => Duration::try_minutes(value),
                'S' => Duration::try_seconds(value),
                _ => None,
            }
            .ok_or_else(|| invalid_duration(text))?;
            total = total
                .checked_add(&component)
                .ok_or_else(|| invalid_duration(text))?;
            saw_component = true;
        }
    }

    if !saw_component {
        return Err(invalid_duration(text));
    }

    Ok(total)
}

fn components(part: &str) -> AppResult<Vec<(i64, char)>> {
    let mut result = Vec::new();
    let mut digits = String::new();

    for ch in part.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
        } else {
            let value = digits
                .parse::<i64>()
                .map_err(|_| invalid_duration(part))?;
            result.push((value, ch.to_ascii_uppercase()));
            digits.clear();
        }
    }

    if !digits.is_empty() {
        return Err(invalid_duration(part));
    }

    Ok(result)
}

fn invalid_duration(text: &str) -> AppError {
    AppError::Internal(format!("'{text}' is not a valid ISO-8601 duration"))
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::{ApprovalBounds, DurationBounds, parse_iso8601_duration};

    #[test]
    fn parses_common_durations() {
        assert_eq!(
            parse_iso8601_duration("PT15M").ok(),
            Some(Duration::minutes(15))
        );
        assert_eq!(parse_iso8601_duration("P1D").ok(), Some(Duration::days(1)));
        assert_eq!(
            parse_iso8601_duration("P1DT12H30M").ok(),
            Some(Duration::days(1) + Duration::hours(12) + Duration::minutes(30))
        );
        assert_eq!(parse_iso8601_duration("P2W").ok(), Some(Duration::weeks(2)));
    }

    #[test]
    fn rejects_malformed_durations() {
        assert!(parse_iso8601_duration("15M").is_err());
        assert!(parse_iso8601_duration("P").is_err());
        assert!(parse_iso8601_duration("PT").is_err());
        assert!(parse_iso8601_duration("P1X").is_err());
        assert!(parse_iso8601_duration("PT15").is_err());
        assert!(parse_iso8601_duration("P1M").is_err(), "months are rejected");
    }

    #[test]
    fn duration_bounds_reject_inconsistent_values() {
        let min = Duration::minutes(10);
        let default = Duration::minutes(5);
        let max = Duration::hours(1);
        assert!(DurationBounds::new(min, default, max).is_err());
        assert!(
            DurationBounds::new(Duration::zero(), Duration::minutes(5), max).is_err()
        );
    }

    #[test]
    fn duration_bounds_name_the_violated_bound() {
        let bounds = DurationBounds::new(
            Duration::minutes(1),
            Duration::minutes(15),
            Duration::days(1),
        );
        assert!(bounds.is_ok());
        let Ok(bounds) = bounds else {
            return;
        };

        let below = bounds.check(Duration::seconds(30));
        assert!(below.is_err());
        let above = bounds.check(Duration::days(2));
        assert!(above.is_err());
        assert!(bounds.check(Duration::minutes(10)).is_ok());
    }

    #[test]
    fn approval_bounds_check_reviewer_count() {
        let bounds = ApprovalBounds::new(1, 3);
        assert!(bounds.is_ok());
        let Ok(bounds) = bounds else {
            return;
        };

        assert!(bounds.check(0).is_err());
        assert!(bounds.check(2).is_ok());
        assert!(bounds.check(4).is_err());
    }

    #[test]
    fn approval_bounds_reject_zero_maximum() {
        assert!(ApprovalBounds::new(0, 0).is_err());
        assert!(ApprovalBounds::new(3, 1).is_err());
    }
}
