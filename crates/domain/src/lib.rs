//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod activation;
mod checksum;
mod constraints;
mod document;
mod group_id;
mod policy;
mod principal;
mod proposal;

pub use activation::{
    ActivationRequest, ActivationType, ActiveGrant, ApprovalMode, Entitlement, EntitlementSet,
    EntitlementStatus,
};
pub use checksum::Checksum;
pub use constraints::{
    ApprovalBounds, Constraints, DurationBounds, parse_iso8601_duration,
};
pub use document::{
    AccessEntryDocument, ActivationDurationDocument, ApprovalDocument, ConstraintsDocument,
    GroupDocument, PolicyDocument, PrivilegeDocument, SystemDocument,
};
pub use group_id::JitGroupId;
pub use policy::{
    AccessControlList, AccessRight, AccessRights, AclEntry, Effect, GroupPolicy, Policy,
    Privilege, SystemPolicy,
};
pub use principal::PrincipalId;
pub use proposal::Proposal;
