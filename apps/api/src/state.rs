use std::sync::Arc;

use elevia_application::{CatalogService, ProposalService, ProvisioningService, Settings};

/// Shared services handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    /// Entitlement resolution and authorization.
    pub catalog: CatalogService,
    /// Proposal minting and acceptance.
    pub proposals: ProposalService,
    /// Group provisioning and reconciliation.
    pub provisioning: ProvisioningService,
    /// Engine configuration.
    pub settings: Arc<Settings>,
}
