//! Proposal protocol: minting and accepting signed peer-activation tokens.
//!
//! A proposal is self-contained and stateless: the signed token is its only
//! durable representation between issuance and acceptance, so there is no
//! proposal table to consult and acceptance is idempotent up to
//! re-provisioning. A proposal that is never accepted simply expires via
//! the token's own expiry claim; no background sweep exists.

mod claims;

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use elevia_core::{AppError, AppResult};
use elevia_domain::{ActivationRequest, JitGroupId, PrincipalId, Proposal};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::settings::Settings;

use claims::ProposalClaims;

/// Notification about a newly minted proposal, sent to its reviewers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalNotification {
    /// Requesting user.
    pub requesting_user: PrincipalId,
    /// Target group.
    pub group_id: JitGroupId,
    /// Reviewers to notify.
    pub recipients: Vec<PrincipalId>,
    /// Justification given by the requester.
    pub justification: String,
    /// Externally reachable action URL embedding the token.
    pub action_url: String,
    /// When the proposal expires.
    pub expiry: DateTime<Utc>,
}

/// Notification about a completed activation, sent after approval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionNotification {
    /// Requesting user.
    pub requesting_user: PrincipalId,
    /// Target group.
    pub group_id: JitGroupId,
    /// Reviewers that were involved.
    pub recipients: Vec<PrincipalId>,
    /// Start of the granted window.
    pub start: DateTime<Utc>,
    /// End of the granted window.
    pub end: DateTime<Utc>,
}

/// Port for delivering notifications. Delivery mechanics are an adapter
/// concern.
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Notifies reviewers about a pending proposal.
    async fn notify_proposal(&self, notification: &ProposalNotification) -> AppResult<()>;

    /// Notifies participants that an activation completed.
    async fn notify_completion(&self, notification: &CompletionNotification) -> AppResult<()>;
}

/// A minted proposal: the live object, its opaque token, and the action
/// URL handed to reviewers.
#[derive(Debug, Clone)]
pub struct PendingProposal {
    /// The derived proposal.
    pub proposal: Proposal,
    /// Signed, self-contained token.
    pub token: String,
    /// Externally reachable approval URL.
    pub action_url: String,
}

/// Service minting and verifying proposal tokens.
#[derive(Clone)]
pub struct ProposalService {
    notifications: Arc<dyn NotificationService>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    token_lifetime: Duration,
    action_base_url: String,
}

impl ProposalService {
    /// Creates a proposal service signing with the given secret.
    #[must_use]
    pub fn new(
        notifications: Arc<dyn NotificationService>,
        signing_secret: &[u8],
        settings: &Settings,
    ) -> Self {
        Self {
            notifications,
            encoding_key: EncodingKey::from_secret(signing_secret),
            decoding_key: DecodingKey::from_secret(signing_secret),
            issuer: settings.provisioning_identity.clone(),
            token_lifetime: settings.proposal_token_lifetime,
            action_base_url: settings.action_base_url.clone(),
        }
    }

    /// Derives a proposal from an authorized peer request, signs it, and
    /// notifies the reviewers.
    ///
    /// The catalog has already filtered reviewers, so an empty or
    /// requester-containing recipient set is a programming-contract
    /// failure, not a user-facing error.
    pub async fn propose(&self, request: &ActivationRequest) -> AppResult<PendingProposal> {
        let reviewers = request.reviewers().ok_or_else(|| {
            AppError::Internal(
                "a self-approval request cannot be turned into a proposal".to_owned(),
            )
        })?;

        let mut input = BTreeMap::new();
        input.insert(
            "justification".to_owned(),
            request.justification().to_owned(),
        );
        input.insert("start".to_owned(), request.start().to_rfc3339());
        input.insert("end".to_owned(), request.end().to_rfc3339());

        let proposal = Proposal::new(
            request.principal().clone(),
            request.group_id().clone(),
            reviewers.clone(),
            Utc::now() + self.token_lifetime,
            input,
        )?;

        let claims = ProposalClaims::from_proposal(&proposal, self.issuer.as_str());
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding_key,
        )
        .map_err(|error| AppError::Internal(format!("failed to sign proposal: {error}")))?;

        let action_url = format!(
            "{}/approve?proposal={}",
            self.action_base_url,
            obfuscate_token(token.as_str())
        );

        self.notifications
            .notify_proposal(&ProposalNotification {
                requesting_user: proposal.requesting_user().clone(),
                group_id: proposal.group_id().clone(),
                recipients: proposal.recipients().iter().cloned().collect(),
                justification: request.justification().to_owned(),
                action_url: action_url.clone(),
                expiry: proposal.expiry(),
            })
            .await?;

        Ok(PendingProposal {
            proposal,
            token,
            action_url,
        })
    }

    /// Verifies a token and decodes it back into a live proposal.
    ///
    /// Any verification failure, an invalid signature, an expired token,
    /// a wrong audience, or an unparsable claim, fails with
    /// [`AppError::AccessDenied`].
    pub fn accept(&self, token: &str) -> AppResult<Proposal> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[self.issuer.as_str()]);

        let decoded =
            jsonwebtoken::decode::<ProposalClaims>(token, &self.decoding_key, &validation)
                .map_err(|_| token_rejected())?;

        decoded.claims.into_proposal()
    }

    /// Sends the post-approval notification for an accepted proposal.
    pub async fn complete(
        &self,
        proposal: &Proposal,
        request: &ActivationRequest,
    ) -> AppResult<()> {
        self.notifications
            .notify_completion(&CompletionNotification {
                requesting_user: proposal.requesting_user().clone(),
                group_id: proposal.group_id().clone(),
                recipients: proposal.recipients().iter().cloned().collect(),
                start: request.start(),
                end: request.end(),
            })
            .await
    }
}

/// Obfuscates a token for embedding in a URL.
///
/// Obfuscation is cosmetic; the signature is the actual integrity control.
#[must_use]
pub fn obfuscate_token(token: &str) -> String {
    URL_SAFE_NO_PAD.encode(token.as_bytes())
}

/// Reverses [`obfuscate_token`].
pub fn clarify_token(obfuscated: &str) -> AppResult<String> {
    let bytes = URL_SAFE_NO_PAD
        .decode(obfuscated.as_bytes())
        .map_err(|_| token_rejected())?;
    String::from_utf8(bytes).map_err(|_| token_rejected())
}

pub(crate) fn token_rejected() -> AppError {
    AppError::AccessDenied("proposal token was rejected".to_owned())
}
