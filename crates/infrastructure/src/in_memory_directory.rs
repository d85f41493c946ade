use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use elevia_application::{
    DirectoryMembership, DirectoryRepository, GroupDirectory, GroupKey,
};
use elevia_core::{AppError, AppResult};
use elevia_domain::PrincipalId;
use tokio::sync::RwLock;

struct StoredGroup {
    description: String,
    members: Vec<(PrincipalId, DateTime<Utc>)>,
}

/// In-memory directory implementation backing both the catalog's read port
/// and the provisioner's group-management port.
#[derive(Default)]
pub struct InMemoryDirectory {
    /// Static (non-JIT) group memberships, e.g. `alice -> [managers]`.
    static_memberships: RwLock<HashMap<PrincipalId, Vec<PrincipalId>>>,
    /// Members of static groups, e.g. `managers -> [alice, dave]`.
    static_members: RwLock<HashMap<PrincipalId, Vec<PrincipalId>>>,
    /// JIT-provisioned groups keyed by directory group email.
    jit_groups: RwLock<HashMap<String, StoredGroup>>,
}

impl InMemoryDirectory {
    /// Creates an empty in-memory directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a static group membership for a user.
    pub async fn seed_membership(&self, user: PrincipalId, group: PrincipalId) {
        self.static_memberships
            .write()
            .await
            .entry(user.clone())
            .or_default()
            .push(group.clone());
        self.static_members
            .write()
            .await
            .entry(group)
            .or_default()
            .push(user);
    }
}

#[async_trait]
impl DirectoryRepository for InMemoryDirectory {
    async fn resolve_transitive_groups(
        &self,
        user: &PrincipalId,
    ) -> AppResult<Vec<PrincipalId>> {
        Ok(self
            .static_memberships
            .read()
            .await
            .get(user)
            .cloned()
            .unwrap_or_default())
    }

    async fn expand_group_members(&self, group: &PrincipalId) -> AppResult<Vec<PrincipalId>> {
        Ok(self
            .static_members
            .read()
            .await
            .get(group)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_active_memberships(
        &self,
        user: &PrincipalId,
    ) -> AppResult<Vec<DirectoryMembership>> {
        let now = Utc::now();
        let groups = self.jit_groups.read().await;

        let mut memberships = Vec::new();
        for (key, group) in groups.iter() {
            for (member, expiry) in &group.members {
                if member == user && *expiry > now {
                    // Membership start times are not stored; report the
                    // window as starting now, like a directory that only
                    // exposes expirations.
                    memberships.push(DirectoryMembership {
                        group_key: key.clone(),
                        start: now,
                        expiry: *expiry,
                    });
                }
            }
        }

        Ok(memberships)
    }
}

#[async_trait]
impl GroupDirectory for InMemoryDirectory {
    async fn ensure_group(
        &self,
        key: &GroupKey,
        _display_name: &str,
        description: &str,
    ) -> AppResult<bool> {
        let mut groups = self.jit_groups.write().await;
        if groups.contains_key(key.email()) {
            return Ok(false);
        }

        groups.insert(
            key.email().to_owned(),
            StoredGroup {
                description: description.to_owned(),
                members: Vec::new(),
            },
        );
        Ok(true)
    }

    async fn group_exists(&self, key: &GroupKey) -> AppResult<bool> {
        Ok(self.jit_groups.read().await.contains_key(key.email()))
    }

    async fn add_membership(
        &self,
        key: &GroupKey,
        member: &PrincipalId,
        expiry: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut groups = self.jit_groups.write().await;
        let group = groups
            .get_mut(key.email())
            .ok_or_else(|| AppError::NotFound(format!("group '{}'", key.email())))?;

        group.members.retain(|(existing, _)| existing != member);
        group.members.push((member.clone(), expiry));
        Ok(())
    }

    async fn group_description(&self, key: &GroupKey) -> AppResult<String> {
        self.jit_groups
            .read()
            .await
            .get(key.email())
            .map(|group| group.description.clone())
            .ok_or_else(|| AppError::NotFound(format!("group '{}'", key.email())))
    }

    async fn set_group_description(&self, key: &GroupKey, description: &str) -> AppResult<()> {
        let mut groups = self.jit_groups.write().await;
        let group = groups
            .get_mut(key.email())
            .ok_or_else(|| AppError::NotFound(format!("group '{}'", key.email())))?;
        group.description = description.to_owned();
        Ok(())
    }

    async fn list_groups_by_prefix(&self, prefix: &str) -> AppResult<Vec<String>> {
        let mut keys: Vec<String> = self
            .jit_groups
            .read()
            .await
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}
