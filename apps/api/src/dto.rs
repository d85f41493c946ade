use elevia_domain::{Entitlement, EntitlementSet};
use serde::{Deserialize, Serialize};

/// Query parameters for entitlement listing.
#[derive(Debug, Deserialize)]
pub struct EntitlementsQuery {
    /// Evaluation scope; defaults to the configured organization scope.
    pub scope: Option<String>,
}

/// Query parameters for reviewer listing.
#[derive(Debug, Deserialize)]
pub struct ReviewersQuery {
    /// Target group id in `env.system.name` form.
    pub group: String,
}

/// One entitlement row.
#[derive(Debug, Serialize)]
pub struct EntitlementDto {
    /// Group id in `env.system.name` form.
    pub group: String,
    /// Human-readable name.
    pub display_name: String,
    /// `self_approval` or `peer_approval`; absent for orphaned grants.
    pub activation_type: Option<String>,
    /// `available`, `active`, or `activation_pending`.
    pub status: String,
    /// Start of the active window, if any.
    pub valid_from: Option<String>,
    /// End of the active window, if any.
    pub valid_until: Option<String>,
    /// Set when the owning policy node no longer exists.
    pub orphaned: bool,
}

impl From<Entitlement> for EntitlementDto {
    fn from(entitlement: Entitlement) -> Self {
        Self {
            group: entitlement.group_id.to_string(),
            display_name: entitlement.display_name,
            activation_type: entitlement
                .activation_type
                .map(|activation| activation.as_str().to_owned()),
            status: entitlement.status.as_str().to_owned(),
            valid_from: entitlement
                .validity
                .map(|(start, _)| start.to_rfc3339()),
            valid_until: entitlement.validity.map(|(_, end)| end.to_rfc3339()),
            orphaned: entitlement.orphaned,
        }
    }
}

/// Entitlement listing response.
#[derive(Debug, Serialize)]
pub struct EntitlementSetDto {
    /// Entitlements sorted by group id.
    pub entitlements: Vec<EntitlementDto>,
    /// Non-fatal resolution warnings.
    pub warnings: Vec<String>,
}

impl From<EntitlementSet> for EntitlementSetDto {
    fn from(set: EntitlementSet) -> Self {
        Self {
            entitlements: set.entitlements.into_iter().map(Into::into).collect(),
            warnings: set.warnings,
        }
    }
}

/// Body of a self-approval activation request.
#[derive(Debug, Deserialize)]
pub struct SelfActivationBody {
    /// Target group id in `env.system.name` form.
    pub group: String,
    /// Free-text justification.
    pub justification: String,
    /// Requested duration; the configured default applies when absent.
    pub duration_minutes: Option<i64>,
}

/// Body of a peer-approval proposal request.
#[derive(Debug, Deserialize)]
pub struct ProposeActivationBody {
    /// Target group id in `env.system.name` form.
    pub group: String,
    /// Free-text justification.
    pub justification: String,
    /// Requested duration; the configured default applies when absent.
    pub duration_minutes: Option<i64>,
    /// Reviewers to notify, as `user:<email>` or bare emails.
    pub reviewers: Vec<String>,
}

/// Body of a proposal approval.
#[derive(Debug, Deserialize)]
pub struct ApproveActivationBody {
    /// Obfuscated proposal token from the action URL.
    pub proposal: String,
}

/// Response for a completed activation.
#[derive(Debug, Serialize)]
pub struct ActivationDto {
    /// Target group id.
    pub group: String,
    /// Activated member.
    pub member: String,
    /// When the membership expires.
    pub expires_at: String,
}

/// Response for a minted proposal.
#[derive(Debug, Serialize)]
pub struct ProposalDto {
    /// Target group id.
    pub group: String,
    /// Externally reachable approval URL.
    pub action_url: String,
    /// When the proposal expires.
    pub expires_at: String,
    /// Notified reviewers.
    pub recipients: Vec<String>,
}

/// Response for reviewer listing.
#[derive(Debug, Serialize)]
pub struct ReviewersDto {
    /// Eligible reviewers, requester excluded.
    pub reviewers: Vec<String>,
}

/// One provisioned directory group.
#[derive(Debug, Serialize)]
pub struct ProvisionedGroupDto {
    /// Directory group key.
    pub key: String,
    /// Declared group id the key maps to.
    pub group: String,
    /// Set when the policy no longer declares the group.
    pub orphaned: bool,
}
