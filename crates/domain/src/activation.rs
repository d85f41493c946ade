use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use elevia_core::{AppError, AppResult};
use uuid::Uuid;

use crate::group_id::JitGroupId;
use crate::principal::PrincipalId;

/// How an entitlement is activated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationType {
    /// The requester's own justification suffices.
    SelfApproval,
    /// One or more other eligible principals must approve.
    PeerApproval,
}

impl ActivationType {
    /// Returns a stable storage value for this activation type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SelfApproval => "self_approval",
            Self::PeerApproval => "peer_approval",
        }
    }
}

/// Status of an entitlement relative to the acting principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntitlementStatus {
    /// Eligible but not currently active.
    Available,
    /// An active grant currently backs the entitlement.
    Active,
    /// A proposal is pending peer approval.
    ActivationPending,
}

impl EntitlementStatus {
    /// Returns a stable storage value for this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Active => "active",
            Self::ActivationPending => "activation_pending",
        }
    }
}

/// An existing time-bound group membership the directory already reflects.
///
/// Validity is the half-open window `[start, expiry)`. The directory is the
/// source of truth for when access ends; this engine only reads grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveGrant {
    /// The JIT group the membership maps to.
    pub group_id: JitGroupId,
    /// Start of the validity window.
    pub start: DateTime<Utc>,
    /// End of the validity window (exclusive).
    pub expiry: DateTime<Utc>,
}

impl ActiveGrant {
    /// Returns whether the grant is valid at an instant.
    #[must_use]
    pub fn is_active_at(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.expiry
    }
}

/// One entitlement computed for a (principal, policy) pair. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entitlement {
    /// The declared group.
    pub group_id: JitGroupId,
    /// Human-readable name.
    pub display_name: String,
    /// How the entitlement activates. `None` for orphaned grants whose
    /// policy node no longer exists.
    pub activation_type: Option<ActivationType>,
    /// Current status for the acting principal.
    pub status: EntitlementStatus,
    /// Validity window when an active grant backs the entitlement.
    pub validity: Option<(DateTime<Utc>, DateTime<Utc>)>,
    /// Set when an active grant maps to no current policy node. Orphaned
    /// access stays visible so it can be audited while it expires.
    pub orphaned: bool,
}

/// The set of entitlements visible to a principal, with non-fatal warnings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntitlementSet {
    /// Entitlements sorted by group id.
    pub entitlements: Vec<Entitlement>,
    /// Non-fatal problems encountered while resolving, e.g. unreadable
    /// grant rows.
    pub warnings: Vec<String>,
}

/// How a request is to be approved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalMode {
    /// No extra reviewers; the requester approves their own request.
    SelfApproval,
    /// Peer approval by the carried reviewer set.
    PeerApproval {
        /// Reviewers to notify; non-empty, never contains the requester.
        reviewers: BTreeSet<PrincipalId>,
    },
}

/// A principal's request to join a group for a bounded time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationRequest {
    id: Uuid,
    principal: PrincipalId,
    group_id: JitGroupId,
    justification: String,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    approval: ApprovalMode,
}

impl ActivationRequest {
    /// Creates a self-approval request.
    pub fn self_approval(
        principal: PrincipalId,
        group_id: JitGroupId,
        justification: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Self> {
        Self::build(
            principal,
            group_id,
            justification.into(),
            start,
            end,
            ApprovalMode::SelfApproval,
        )
    }

    /// Creates a peer-approval request carrying reviewers.
    ///
    /// The reviewer set must be non-empty and must not contain the
    /// requester.
    pub fn peer_approval(
        principal: PrincipalId,
        group_id: JitGroupId,
        justification: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        reviewers: BTreeSet<PrincipalId>,
    ) -> AppResult<Self> {
        if reviewers.is_empty() {
            return Err(AppError::ConstraintViolation(
                "a peer-approval request must carry at least one reviewer".to_owned(),
            ));
        }
        if reviewers.contains(&principal) {
            return Err(AppError::ConstraintViolation(
                "the requesting principal cannot review their own request".to_owned(),
            ));
        }

        Self::build(
            principal,
            group_id,
            justification.into(),
            start,
            end,
            ApprovalMode::PeerApproval { reviewers },
        )
    }

    fn build(
        principal: PrincipalId,
        group_id: JitGroupId,
        justification: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        approval: ApprovalMode,
    ) -> AppResult<Self> {
        if end <= start {
            return Err(AppError::ConstraintViolation(
                "activation end must be after its start".to_owned(),
            ));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            principal,
            group_id,
            justification,
            start,
            end,
            approval,
        })
    }

    /// Returns the request id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the requesting principal.
    #[must_use]
    pub fn principal(&self) -> &PrincipalId {
        &self.principal
    }

    /// Returns the target group.
    #[must_use]
    pub fn group_id(&self) -> &JitGroupId {
        &self.group_id
    }

    /// Returns the free-text justification.
    #[must_use]
    pub fn justification(&self) -> &str {
        self.justification.as_str()
    }

    /// Returns the requested start instant.
    #[must_use]
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Returns the requested end instant.
    #[must_use]
    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Returns the requested activation duration.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Returns the approval mode.
    #[must_use]
    pub fn approval(&self) -> &ApprovalMode {
        &self.approval
    }

    /// Returns the reviewers of a peer-approval request.
    #[must_use]
    pub fn reviewers(&self) -> Option<&BTreeSet<PrincipalId>> {
        match &self.approval {
            ApprovalMode::SelfApproval => None,
            ApprovalMode::PeerApproval { reviewers } => Some(reviewers),
        }
    }
}
