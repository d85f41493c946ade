//! Group provisioning and binding reconciliation.

mod reconcile;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use elevia_core::{AppError, AppResult};
use elevia_domain::{JitGroupId, PrincipalId};
use tracing::info;

use crate::directory::GroupKey;
use crate::policy_cache::PolicyStore;
use crate::settings::Settings;

/// One authorization binding on a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceBinding {
    /// Principal the binding grants to.
    pub principal: PrincipalId,
    /// Granted role.
    pub role: String,
    /// Optional binding condition, including time-scoped ones.
    pub condition: Option<String>,
}

/// Port for the external authorization and inventory services.
#[async_trait]
pub trait ResourceAuthority: Send + Sync {
    /// Read-modify-writes one resource's authorization policy: removes
    /// every existing binding for `principal` and adds exactly `bindings`.
    /// Replacement is a full overwrite and therefore idempotent per
    /// resource.
    async fn replace_principal_bindings(
        &self,
        resource: &str,
        principal: &PrincipalId,
        bindings: Vec<ResourceBinding>,
    ) -> AppResult<()>;

    /// Lists the resources that currently carry bindings for a principal.
    async fn resources_bound_to(&self, principal: &PrincipalId) -> AppResult<Vec<String>>;
}

/// Port for managing backing directory groups during provisioning.
///
/// Adapters configure the access profile of created groups (member
/// restrictions, hidden membership) to match JIT usage; the engine only
/// names the group.
#[async_trait]
pub trait GroupDirectory: Send + Sync {
    /// Creates the backing group when absent. Returns whether it was
    /// created by this call.
    async fn ensure_group(
        &self,
        key: &GroupKey,
        display_name: &str,
        description: &str,
    ) -> AppResult<bool>;

    /// Returns whether the backing group exists.
    async fn group_exists(&self, key: &GroupKey) -> AppResult<bool>;

    /// Adds a time-bound membership with a directory-native expiry. Adding
    /// an already present member keeps the call idempotent.
    async fn add_membership(
        &self,
        key: &GroupKey,
        member: &PrincipalId,
        expiry: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Reads the group description.
    async fn group_description(&self, key: &GroupKey) -> AppResult<String>;

    /// Rewrites the group description.
    async fn set_group_description(&self, key: &GroupKey, description: &str) -> AppResult<()>;

    /// Lists directory group keys starting with a naming prefix.
    async fn list_groups_by_prefix(&self, prefix: &str) -> AppResult<Vec<String>>;
}

/// One provisioned directory group recognized as JIT-managed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedGroup {
    /// Directory group key.
    pub key: String,
    /// Declared group id the key maps to.
    pub group_id: JitGroupId,
    /// Set when the policy no longer declares the group.
    pub orphaned: bool,
}

/// Service translating accepted requests into durable, idempotent grants.
#[derive(Clone)]
pub struct ProvisioningService {
    groups: Arc<dyn GroupDirectory>,
    resources: Arc<dyn ResourceAuthority>,
    policy_store: Arc<PolicyStore>,
    group_domain: String,
    reconcile_fanout: usize,
}

impl ProvisioningService {
    /// Creates a provisioning service.
    #[must_use]
    pub fn new(
        groups: Arc<dyn GroupDirectory>,
        resources: Arc<dyn ResourceAuthority>,
        policy_store: Arc<PolicyStore>,
        settings: &Settings,
    ) -> Self {
        Self {
            groups,
            resources,
            policy_store,
            group_domain: settings.group_domain.clone(),
            reconcile_fanout: settings.reconcile_fanout.max(1),
        }
    }

    /// Provisions a time-bound membership for an accepted request.
    ///
    /// Creates the backing group when absent, adds the membership with its
    /// directory-native expiry, then reconciles resource bindings so that
    /// provisioning a first member also brings bindings up to date. Every
    /// step is idempotent; re-running a consumed approval is harmless.
    pub async fn provision_membership(
        &self,
        group_id: &JitGroupId,
        member: &PrincipalId,
        expiry: DateTime<Utc>,
    ) -> AppResult<()> {
        let policy = self.policy_store.current().await?;
        let group = policy.lookup(group_id).ok_or_else(|| {
            AppError::AccessDenied(format!(
                "entitlement '{group_id}' does not exist or is not accessible"
            ))
        })?;

        let key = GroupKey::for_group(group_id, self.group_domain.as_str());
        let created = self
            .groups
            .ensure_group(&key, group_id.to_string().as_str(), group.description())
            .await?;
        if created {
            info!(group = %group_id, key = key.email(), "created backing directory group");
        }

        self.groups.add_membership(&key, member, expiry).await?;
        info!(
            group = %group_id,
            member = %member,
            expiry = %expiry,
            "provisioned time-bound membership"
        );

        self.reconcile_bindings(group, &key).await
    }

    /// Re-synchronizes provisioned bindings with current policy.
    ///
    /// A group that has never been provisioned is a no-op: nothing can be
    /// out of sync before it exists. Otherwise the binding reconciliation
    /// runs unconditionally, so policy edits propagate to
    /// already-provisioned groups on the next membership event.
    pub async fn reconcile(&self, group_id: &JitGroupId) -> AppResult<()> {
        let policy = self.policy_store.current().await?;
        let group = policy.lookup(group_id).ok_or_else(|| {
            AppError::NotFound(format!("group '{group_id}' is not declared by policy"))
        })?;

        let key = GroupKey::for_group(group_id, self.group_domain.as_str());
        if !self.groups.group_exists(&key).await? {
            return Ok(());
        }

        self.reconcile_bindings(group, &key).await
    }

    /// Lists all provisioned groups recognized as JIT-managed, including
    /// orphans no longer declared by policy, so operators can audit and
    /// clean up stale groups.
    pub async fn provisioned_groups(&self) -> AppResult<Vec<ProvisionedGroup>> {
        let policy = self.policy_store.current().await?;
        let keys = self.groups.list_groups_by_prefix(GroupKey::PREFIX).await?;

        let mut provisioned = Vec::new();
        for key in keys {
            // Keys under the prefix that do not map to a declared group id
            // are naturally colliding names, not ours.
            let Some(group_id) = GroupKey::parse(key.as_str()) else {
                continue;
            };

            let orphaned = policy.lookup(&group_id).is_none();
            provisioned.push(ProvisionedGroup {
                key,
                group_id,
                orphaned,
            });
        }

        provisioned.sort_by(|left, right| left.key.cmp(&right.key));
        Ok(provisioned)
    }
}
