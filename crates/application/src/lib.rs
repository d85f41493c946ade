//! Application services and ports for the Elevia engine.

#![forbid(unsafe_code)]

mod catalog_service;
mod constraint_engine;
mod directory;
mod policy_cache;
mod proposal_service;
mod provisioning_service;
mod settings;

pub use catalog_service::{CatalogService, classify_binding_condition};
pub use constraint_engine::{
    ConstraintEngine, ContextValue, EvaluationContext, ExpressionIssue,
};
pub use directory::{
    DirectoryMembership, DirectoryRepository, GroupKey, PrincipalSet,
};
pub use policy_cache::{PolicyDocumentSource, PolicyStore};
pub use proposal_service::{
    CompletionNotification, NotificationService, PendingProposal, ProposalNotification,
    ProposalService, clarify_token, obfuscate_token,
};
pub use provisioning_service::{
    GroupDirectory, ProvisionedGroup, ProvisioningService, ResourceAuthority, ResourceBinding,
};
pub use settings::Settings;
