use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use elevia_core::AppResult;
use elevia_domain::{JitGroupId, PrincipalId};

/// One time-bound membership row as the directory reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryMembership {
    /// Raw directory group key (email).
    pub group_key: String,
    /// Start of the membership window.
    pub start: DateTime<Utc>,
    /// Directory-native expiry of the membership.
    pub expiry: DateTime<Utc>,
}

/// Read-side port for the external directory service, as consumed by the
/// catalog. Group management during provisioning uses its own port.
#[async_trait]
pub trait DirectoryRepository: Send + Sync {
    /// Resolves the transitive group memberships of a user principal.
    async fn resolve_transitive_groups(&self, user: &PrincipalId)
    -> AppResult<Vec<PrincipalId>>;

    /// Expands a group principal to its transitive user members.
    async fn expand_group_members(&self, group: &PrincipalId) -> AppResult<Vec<PrincipalId>>;

    /// Lists the current time-bound memberships of a user.
    async fn list_active_memberships(
        &self,
        user: &PrincipalId,
    ) -> AppResult<Vec<DirectoryMembership>>;
}

/// Deterministic mapping between a [`JitGroupId`] and the key of its
/// backing directory group.
///
/// Keys use the form `jit.<environment>.<system>.<name>@<domain>`, so the
/// same declared group always maps to the same directory group and group
/// creation stays idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    email: String,
}

impl GroupKey {
    /// Naming prefix identifying JIT-managed directory groups.
    pub const PREFIX: &'static str = "jit.";

    /// Maps a declared group to its backing directory group key.
    #[must_use]
    pub fn for_group(id: &JitGroupId, domain: &str) -> Self {
        Self {
            email: format!(
                "{}{}.{}.{}@{}",
                Self::PREFIX,
                id.environment(),
                id.system(),
                id.name(),
                domain
            ),
        }
    }

    /// Recognizes a directory group key as JIT-managed and maps it back to
    /// the declared group id.
    ///
    /// Returns `None` for keys outside the naming scheme, which defends
    /// against naturally colliding group names under the same prefix.
    #[must_use]
    pub fn parse(email: &str) -> Option<JitGroupId> {
        let (local, _domain) = email.split_once('@')?;
        let rest = local.strip_prefix(Self::PREFIX)?;

        let mut segments = rest.split('.');
        let environment = segments.next()?;
        let system = segments.next()?;
        let name = segments.next()?;
        if segments.next().is_some() {
            return None;
        }

        JitGroupId::new(environment, system, name).ok()
    }

    /// Returns the directory group key as an email address.
    #[must_use]
    pub fn email(&self) -> &str {
        self.email.as_str()
    }

    /// Returns the key as a group principal for authorization bindings.
    #[must_use]
    pub fn as_principal(&self) -> PrincipalId {
        PrincipalId::group(self.email.as_str())
    }
}

/// The acting principal with its transitive group memberships, resolved
/// once per operation and reused for every ACL check within it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalSet {
    user: PrincipalId,
    principals: BTreeSet<PrincipalId>,
}

impl PrincipalSet {
    /// Resolves a user's principal set through the directory.
    pub async fn resolve(
        directory: &dyn DirectoryRepository,
        user: &PrincipalId,
    ) -> AppResult<Self> {
        let mut principals: BTreeSet<PrincipalId> = directory
            .resolve_transitive_groups(user)
            .await?
            .into_iter()
            .collect();
        principals.insert(user.clone());

        Ok(Self {
            user: user.clone(),
            principals,
        })
    }

    /// Returns the acting user.
    #[must_use]
    pub fn user(&self) -> &PrincipalId {
        &self.user
    }

    /// Returns the full principal set: the user plus transitive groups.
    #[must_use]
    pub fn principals(&self) -> &BTreeSet<PrincipalId> {
        &self.principals
    }
}
