use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use elevia_core::{AppError, AppResult};

use crate::group_id::JitGroupId;
use crate::principal::PrincipalId;

/// A pending peer-activation, externalized as a signed token between
/// issuance and acceptance. There is no persisted proposal row; the token
/// is the only durable representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    requesting_user: PrincipalId,
    group_id: JitGroupId,
    recipients: BTreeSet<PrincipalId>,
    expiry: DateTime<Utc>,
    input: BTreeMap<String, String>,
}

impl Proposal {
    /// Creates a proposal.
    ///
    /// The recipient set must be non-empty and must never contain the
    /// requesting user; the catalog filters reviewers before a proposal is
    /// derived, so a violation here is a programming-contract failure.
    pub fn new(
        requesting_user: PrincipalId,
        group_id: JitGroupId,
        recipients: BTreeSet<PrincipalId>,
        expiry: DateTime<Utc>,
        input: BTreeMap<String, String>,
    ) -> AppResult<Self> {
        if recipients.is_empty() {
            return Err(AppError::Internal(
                "proposal recipients must not be empty".to_owned(),
            ));
        }
        if recipients.contains(&requesting_user) {
            return Err(AppError::Internal(format!(
                "proposal recipients must not contain the requesting user '{requesting_user}'"
            )));
        }

        Ok(Self {
            requesting_user,
            group_id,
            recipients,
            expiry,
            input,
        })
    }

    /// Returns the requesting user.
    #[must_use]
    pub fn requesting_user(&self) -> &PrincipalId {
        &self.requesting_user
    }

    /// Returns the target group.
    #[must_use]
    pub fn group_id(&self) -> &JitGroupId {
        &self.group_id
    }

    /// Returns the recipients, in stable sorted order.
    #[must_use]
    pub fn recipients(&self) -> &BTreeSet<PrincipalId> {
        &self.recipients
    }

    /// Returns the proposal expiry.
    #[must_use]
    pub fn expiry(&self) -> DateTime<Utc> {
        self.expiry
    }

    /// Returns the string-keyed input parameters captured at request time.
    #[must_use]
    pub fn input(&self) -> &BTreeMap<String, String> {
        &self.input
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use chrono::{Duration, Utc};

    use crate::group_id::JitGroupId;
    use crate::principal::PrincipalId;

    use super::Proposal;

    #[test]
    fn proposal_rejects_empty_recipients() {
        let group = JitGroupId::new("prod", "network", "admins");
        assert!(group.is_ok());
        let Ok(group) = group else {
            return;
        };

        let result = Proposal::new(
            PrincipalId::user("bob@example.com"),
            group,
            BTreeSet::new(),
            Utc::now() + Duration::hours(1),
            BTreeMap::new(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn proposal_rejects_requester_in_recipients() {
        let group = JitGroupId::new("prod", "network", "admins");
        assert!(group.is_ok());
        let Ok(group) = group else {
            return;
        };

        let bob = PrincipalId::user("bob@example.com");
        let result = Proposal::new(
            bob.clone(),
            group,
            BTreeSet::from([bob, PrincipalId::user("carol@example.com")]),
            Utc::now() + Duration::hours(1),
            BTreeMap::new(),
        );
        assert!(result.is_err());
    }
}
