use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use chrono::DateTime;
use elevia_core::AppResult;
use elevia_domain::{JitGroupId, PrincipalId, Proposal};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::token_rejected;

/// Claims carried by a proposal token.
///
/// Recipients are stored in stable sorted order; the `jti` claim is a
/// random collision-resistant nonce; the token's own `exp` claim is the
/// proposal expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct ProposalClaims {
    pub(super) jti: String,
    pub(super) iss: String,
    pub(super) aud: String,
    pub(super) iat: i64,
    pub(super) exp: i64,
    pub(super) user: String,
    pub(super) group: String,
    pub(super) recipients: Vec<String>,
    pub(super) input: BTreeMap<String, String>,
}

impl ProposalClaims {
    /// Encodes a proposal as token claims.
    pub(super) fn from_proposal(proposal: &Proposal, issuer: &str) -> Self {
        // BTreeSet iteration already yields a stable sorted order.
        let recipients = proposal
            .recipients()
            .iter()
            .map(ToString::to_string)
            .collect();

        Self {
            jti: Uuid::new_v4().to_string(),
            iss: issuer.to_owned(),
            aud: issuer.to_owned(),
            iat: chrono::Utc::now().timestamp(),
            exp: proposal.expiry().timestamp(),
            user: proposal.requesting_user().to_string(),
            group: proposal.group_id().to_string(),
            recipients,
            input: proposal.input().clone(),
        }
    }

    /// Re-validates every claim and rebuilds the live proposal.
    pub(super) fn into_proposal(self) -> AppResult<Proposal> {
        let user = PrincipalId::from_str(self.user.as_str()).map_err(|_| token_rejected())?;
        if !user.is_user() {
            return Err(token_rejected());
        }

        let group = JitGroupId::from_str(self.group.as_str()).map_err(|_| token_rejected())?;

        let mut recipients = BTreeSet::new();
        for recipient in &self.recipients {
            let principal =
                PrincipalId::from_str(recipient.as_str()).map_err(|_| token_rejected())?;
            recipients.insert(principal);
        }

        let expiry = DateTime::from_timestamp(self.exp, 0).ok_or_else(token_rejected)?;

        Proposal::new(user, group, recipients, expiry, self.input)
            .map_err(|_| token_rejected())
    }
}
