use std::collections::BTreeSet;

use elevia_core::{AppError, AppResult};
use elevia_domain::{AccessRight, JitGroupId, PrincipalId};

use crate::directory::PrincipalSet;

use super::CatalogService;

impl CatalogService {
    /// Lists the principals eligible to review a peer request for a group.
    ///
    /// Fails fast, without leaking the reviewer population, unless the
    /// node activates by peer approval for the requester and the requester
    /// itself holds JOIN. Group principals holding APPROVE_OTHERS are
    /// expanded to their transitive user members; the requester is always
    /// excluded.
    pub async fn list_reviewers(
        &self,
        requester: &PrincipalId,
        group_id: &JitGroupId,
    ) -> AppResult<BTreeSet<PrincipalId>> {
        let policy = self.policy_store.current().await?;
        let group = policy.lookup(group_id).ok_or_else(|| {
            AppError::AccessDenied(format!(
                "entitlement '{group_id}' does not exist or is not accessible"
            ))
        })?;

        let principal_set = PrincipalSet::resolve(self.directory.as_ref(), requester).await?;
        let rights = group.acl().effective_rights(principal_set.principals());

        if !rights.contains(AccessRight::Join) {
            return Err(AppError::AccessDenied(format!(
                "'{requester}' may not request '{group_id}'"
            )));
        }
        if rights.contains(AccessRight::ApproveSelf) {
            return Err(AppError::AccessDenied(format!(
                "'{group_id}' activates by self-approval for '{requester}', \
                 no reviewers apply"
            )));
        }

        let mut reviewers: BTreeSet<PrincipalId> = BTreeSet::new();
        for holder in group.acl().principals_holding(AccessRight::ApproveOthers) {
            if holder.is_user() {
                reviewers.insert(holder);
                continue;
            }

            for member in self.directory.expand_group_members(&holder).await? {
                reviewers.insert(member);
            }
        }

        reviewers.remove(requester);
        Ok(reviewers)
    }
}
