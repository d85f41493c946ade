//! Entitlement resolution and request/approval authorization.

mod authorize;
mod eligibility;
mod entitlements;
mod reviewers;


use std::sync::Arc;

use elevia_core::{AppError, AppResult};
use regex::Regex;

use crate::constraint_engine::ConstraintEngine;
use crate::directory::DirectoryRepository;
use crate::policy_cache::PolicyStore;
use crate::settings::Settings;

pub use eligibility::classify_binding_condition;

/// Read-only service answering "who may request what" against the policy
/// snapshot.
///
/// All operations are pure reads: one directory resolution of the acting
/// principal per operation, reused for every ACL check within it.
#[derive(Clone)]
pub struct CatalogService {
    policy_store: Arc<PolicyStore>,
    directory: Arc<dyn DirectoryRepository>,
    constraint_engine: Arc<ConstraintEngine>,
    settings: Settings,
    justification_pattern: Option<Regex>,
}

impl CatalogService {
    /// Creates a catalog service, compiling the configured justification
    /// pattern once.
    pub fn new(
        policy_store: Arc<PolicyStore>,
        directory: Arc<dyn DirectoryRepository>,
        constraint_engine: Arc<ConstraintEngine>,
        settings: Settings,
    ) -> AppResult<Self> {
        let justification_pattern = settings
            .justification_pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|error| {
                AppError::Internal(format!("invalid justification pattern: {error}"))
            })?;

        Ok(Self {
            policy_store,
            directory,
            constraint_engine,
            settings,
            justification_pattern,
        })
    }

    /// Enumerates the evaluation scopes visible to a principal.
    ///
    /// The current design has exactly one pseudo-scope per organization.
    #[must_use]
    pub fn list_scopes(&self) -> Vec<String> {
        vec![self.settings.resource_scope.clone()]
    }

    fn require_known_scope(&self, scope: &str) -> AppResult<()> {
        if scope != self.settings.resource_scope {
            return Err(AppError::NotFound(format!("unknown scope '{scope}'")));
        }
        Ok(())
    }
}
