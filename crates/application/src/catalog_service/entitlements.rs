use std::collections::BTreeMap;
use std::collections::BTreeSet;

use elevia_core::AppResult;
use elevia_domain::{
    AccessRight, ActivationType, ActiveGrant, Entitlement, EntitlementSet, EntitlementStatus,
    JitGroupId, PrincipalId,
};

use crate::directory::{GroupKey, PrincipalSet};

use super::CatalogService;

impl CatalogService {
    /// Computes the entitlements visible to a principal within a scope.
    ///
    /// Covers every policy node whose effective ACL grants JOIN to the
    /// resolved principal set, then surfaces active grants the policy no
    /// longer covers, so expiring access stays visible after a policy edit
    /// removes its definition.
    pub async fn list_entitlements(
        &self,
        principal: &PrincipalId,
        scope: &str,
    ) -> AppResult<EntitlementSet> {
        self.require_known_scope(scope)?;

        let policy = self.policy_store.current().await?;
        let principal_set = PrincipalSet::resolve(self.directory.as_ref(), principal).await?;

        let mut warnings = Vec::new();
        let mut grants: BTreeMap<JitGroupId, ActiveGrant> = BTreeMap::new();
        for membership in self.directory.list_active_memberships(principal).await? {
            match GroupKey::parse(membership.group_key.as_str()) {
                Some(group_id) => {
                    grants.insert(
                        group_id.clone(),
                        ActiveGrant {
                            group_id,
                            start: membership.start,
                            expiry: membership.expiry,
                        },
                    );
                }
                None if membership.group_key.starts_with(GroupKey::PREFIX) => {
                    warnings.push(format!(
                        "membership in '{}' uses the JIT naming prefix but does not map \
                         to a declared group",
                        membership.group_key
                    ));
                }
                // Memberships in unrelated directory groups are not ours.
                None => {}
            }
        }

        let mut entitlements = Vec::new();
        let mut covered: BTreeSet<JitGroupId> = BTreeSet::new();

        for group in policy.groups() {
            let rights = group.acl().effective_rights(principal_set.principals());
            if !rights.contains(AccessRight::Join) {
                continue;
            }

            let activation_type = if rights.contains(AccessRight::ApproveSelf) {
                ActivationType::SelfApproval
            } else {
                ActivationType::PeerApproval
            };

            let (status, validity) = match grants.get(group.id()) {
                Some(grant) => {
                    covered.insert(group.id().clone());
                    (
                        EntitlementStatus::Active,
                        Some((grant.start, grant.expiry)),
                    )
                }
                None => (EntitlementStatus::Available, None),
            };

            entitlements.push(Entitlement {
                group_id: group.id().clone(),
                display_name: display_name(group.description(), group.id()),
                activation_type: Some(activation_type),
                status,
                validity,
                orphaned: false,
            });
        }

        // Grants with no JOIN-granting policy node are still reported so
        // that orphaned access remains visible while it expires.
        for (group_id, grant) in grants {
            if covered.contains(&group_id) {
                continue;
            }

            let node = policy.lookup(&group_id);
            entitlements.push(Entitlement {
                display_name: node
                    .map(|group| display_name(group.description(), &group_id))
                    .unwrap_or_else(|| group_id.to_string()),
                group_id,
                activation_type: None,
                status: EntitlementStatus::Active,
                validity: Some((grant.start, grant.expiry)),
                orphaned: node.is_none(),
            });
        }

        entitlements.sort_by(|left, right| left.group_id.cmp(&right.group_id));

        Ok(EntitlementSet {
            entitlements,
            warnings,
        })
    }
}

fn display_name(description: &str, id: &JitGroupId) -> String {
    if description.trim().is_empty() {
        id.to_string()
    } else {
        description.to_owned()
    }
}
