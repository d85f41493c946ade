use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use elevia_core::{AggregateError, AppError, AppResult};
use elevia_domain::{Checksum, GroupPolicy};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::info;

use crate::directory::GroupKey;

use super::{ProvisioningService, ResourceBinding};

impl ProvisioningService {
    /// Brings one group's resource bindings in line with declared policy.
    ///
    /// The expected checksum over declared privileges is compared with the
    /// checksum last recorded in the group description. When they match,
    /// no authorization-service call is made at all; this is the dominant
    /// case and the reason the checksum exists. On drift, every affected
    /// resource is rewritten concurrently, and the recorded checksum only
    /// advances after all writes succeed, so a partial failure retries the
    /// same drift on the next attempt. At-least-once is safe because
    /// binding replacement is idempotent per resource.
    pub(super) async fn reconcile_bindings(
        &self,
        group: &GroupPolicy,
        key: &GroupKey,
    ) -> AppResult<()> {
        let expected = Checksum::of(group.privileges());
        let description = self.groups.group_description(key).await?;
        let actual = Checksum::from_description(description.as_str());

        if expected == actual {
            return Ok(());
        }

        let principal = key.as_principal();

        let mut declared: BTreeMap<String, Vec<ResourceBinding>> = BTreeMap::new();
        for privilege in group.privileges() {
            declared
                .entry(privilege.resource().to_owned())
                .or_default()
                .push(ResourceBinding {
                    principal: principal.clone(),
                    role: privilege.role().to_owned(),
                    condition: privilege.condition().map(ToOwned::to_owned),
                });
        }

        // Resources that carry stale bindings but lost all their declared
        // privileges still need a visit to be cleared.
        let mut targets: BTreeSet<String> = declared.keys().cloned().collect();
        for resource in self.resources.resources_bound_to(&principal).await? {
            targets.insert(resource);
        }

        let semaphore = Arc::new(Semaphore::new(self.reconcile_fanout));
        let mut tasks = JoinSet::new();
        for resource in targets {
            let bindings = declared.remove(resource.as_str()).unwrap_or_default();
            let resources = Arc::clone(&self.resources);
            let semaphore = Arc::clone(&semaphore);
            let principal = principal.clone();

            tasks.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => {
                        resources
                            .replace_principal_bindings(resource.as_str(), &principal, bindings)
                            .await
                    }
                    Err(error) => Err(AppError::Internal(format!(
                        "reconciliation pool closed: {error}"
                    ))),
                };
                (resource, result)
            });
        }

        let mut updated = 0usize;
        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(()))) => updated += 1,
                Ok((resource, Err(error))) => failures.push((resource, error)),
                Err(error) => failures.push((
                    "<join>".to_owned(),
                    AppError::Internal(format!("binding update task failed: {error}")),
                )),
            }
        }

        if !failures.is_empty() {
            return Err(AppError::Aggregate(AggregateError::new(failures)));
        }

        let tagged = expected.tag_description(description.as_str());
        self.groups
            .set_group_description(key, tagged.as_str())
            .await?;

        info!(
            group = key.email(),
            resources = updated,
            checksum = %expected,
            "reconciled resource bindings"
        );

        Ok(())
    }
}
