use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use elevia_core::AppError;

use crate::constraints::Constraints;
use crate::group_id::JitGroupId;
use crate::principal::PrincipalId;

/// A single access right grantable on a JIT group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessRight {
    /// Request to join the group.
    Join,
    /// Approve one's own join request (self-activation).
    ApproveSelf,
    /// Approve join requests made by other principals.
    ApproveOthers,
}

impl AccessRight {
    /// Returns a stable storage value for this right.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Join => "join",
            Self::ApproveSelf => "approve_self",
            Self::ApproveOthers => "approve_others",
        }
    }

    fn mask(self) -> u8 {
        match self {
            Self::Join => 0b001,
            Self::ApproveSelf => 0b010,
            Self::ApproveOthers => 0b100,
        }
    }
}

impl FromStr for AccessRight {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "join" | "request" => Ok(Self::Join),
            "approve_self" => Ok(Self::ApproveSelf),
            "approve_others" => Ok(Self::ApproveOthers),
            _ => Err(AppError::Internal(format!("unknown action '{value}'"))),
        }
    }
}

impl Display for AccessRight {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.as_str())
    }
}

/// A set of access rights, stored as a bitset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccessRights(u8);

impl AccessRights {
    /// Returns the empty set.
    #[must_use]
    pub fn none() -> Self {
        Self(0)
    }

    /// Returns a set containing a single right.
    #[must_use]
    pub fn of(right: AccessRight) -> Self {
        Self(right.mask())
    }

    /// Adds a right to the set.
    #[must_use]
    pub fn with(self, right: AccessRight) -> Self {
        Self(self.0 | right.mask())
    }

    /// Returns whether the set contains a right.
    #[must_use]
    pub fn contains(&self, right: AccessRight) -> bool {
        self.0 & right.mask() != 0
    }

    /// Returns the union of two sets.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns this set with another set's rights removed.
    #[must_use]
    pub fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }
}

/// Whether an access-control entry grants or revokes its rights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// The entry grants its rights.
    Allow,
    /// The entry revokes its rights, overriding any allow entry.
    Deny,
}

impl FromStr for Effect {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "allow" => Ok(Self::Allow),
            "deny" => Ok(Self::Deny),
            _ => Err(AppError::Internal(format!("unknown effect '{value}'"))),
        }
    }
}

/// One access-control entry: a principal, an effect, and a set of rights.
#[derive(Debug, Clone, PartialEq)]
pub struct AclEntry {
    principal: PrincipalId,
    effect: Effect,
    rights: AccessRights,
}

impl AclEntry {
    /// Creates an access-control entry.
    #[must_use]
    pub fn new(principal: PrincipalId, effect: Effect, rights: AccessRights) -> Self {
        Self {
            principal,
            effect,
            rights,
        }
    }

    /// Returns the entry's principal.
    #[must_use]
    pub fn principal(&self) -> &PrincipalId {
        &self.principal
    }

    /// Returns the entry's effect.
    #[must_use]
    pub fn effect(&self) -> Effect {
        self.effect
    }

    /// Returns the entry's rights.
    #[must_use]
    pub fn rights(&self) -> AccessRights {
        self.rights
    }
}

/// Ordered access-control list of a JIT group.
///
/// A right is effective for a principal set when some allow entry grants it
/// to a member of the set and no deny entry revokes it from a member of the
/// set; deny always wins.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AccessControlList {
    entries: Vec<AclEntry>,
}

impl AccessControlList {
    /// Creates an access-control list from ordered entries.
    #[must_use]
    pub fn new(entries: Vec<AclEntry>) -> Self {
        Self { entries }
    }

    /// Returns the ordered entries.
    #[must_use]
    pub fn entries(&self) -> &[AclEntry] {
        &self.entries
    }

    /// Computes the effective rights for a resolved principal set.
    #[must_use]
    pub fn effective_rights(&self, principals: &BTreeSet<PrincipalId>) -> AccessRights {
        let mut allowed = AccessRights::none();
        let mut denied = AccessRights::none();

        for entry in &self.entries {
            if !principals.contains(entry.principal()) {
                continue;
            }
            match entry.effect() {
                Effect::Allow => allowed = allowed.union(entry.rights()),
                Effect::Deny => denied = denied.union(entry.rights()),
            }
        }

        allowed.difference(denied)
    }

    /// Returns whether a resolved principal set holds a right.
    #[must_use]
    pub fn is_allowed(&self, principals: &BTreeSet<PrincipalId>, right: AccessRight) -> bool {
        self.effective_rights(principals).contains(right)
    }

    /// Returns the principals of all allow entries carrying a right.
    ///
    /// Deny entries are honored: a principal that is also denied the right
    /// is excluded.
    #[must_use]
    pub fn principals_holding(&self, right: AccessRight) -> Vec<PrincipalId> {
        let denied: BTreeSet<&PrincipalId> = self
            .entries
            .iter()
            .filter(|entry| entry.effect() == Effect::Deny && entry.rights().contains(right))
            .map(AclEntry::principal)
            .collect();

        let mut holders: Vec<PrincipalId> = Vec::new();
        for entry in &self.entries {
            if entry.effect() == Effect::Allow
                && entry.rights().contains(right)
                && !denied.contains(entry.principal())
                && !holders.contains(entry.principal())
            {
                holders.push(entry.principal().clone());
            }
        }

        holders
    }
}

/// A resource-level privilege granted to a group's members upon
/// provisioning: a resource, a role, and an optional time-bound condition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Privilege {
    resource: String,
    role: String,
    condition: Option<String>,
}

impl Privilege {
    /// Creates a privilege.
    #[must_use]
    pub fn new(
        resource: impl Into<String>,
        role: impl Into<String>,
        condition: Option<String>,
    ) -> Self {
        Self {
            resource: resource.into(),
            role: role.into(),
            condition,
        }
    }

    /// Returns the target resource, e.g. `projects/my-project`.
    #[must_use]
    pub fn resource(&self) -> &str {
        self.resource.as_str()
    }

    /// Returns the granted role, e.g. `roles/compute.admin`.
    #[must_use]
    pub fn role(&self) -> &str {
        self.role.as_str()
    }

    /// Returns the optional binding condition expression.
    #[must_use]
    pub fn condition(&self) -> Option<&str> {
        self.condition.as_deref()
    }

    /// Returns a canonical text form used for fingerprinting.
    #[must_use]
    pub fn canonical(&self) -> String {
        format!(
            "{}\n{}\n{}",
            self.resource,
            self.role,
            self.condition.as_deref().unwrap_or("")
        )
    }
}

/// Policy of one declared JIT group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupPolicy {
    id: JitGroupId,
    description: String,
    acl: AccessControlList,
    constraints: Constraints,
    privileges: Vec<Privilege>,
}

impl GroupPolicy {
    /// Creates a group policy.
    #[must_use]
    pub fn new(
        id: JitGroupId,
        description: impl Into<String>,
        acl: AccessControlList,
        constraints: Constraints,
        privileges: Vec<Privilege>,
    ) -> Self {
        Self {
            id,
            description: description.into(),
            acl,
            constraints,
            privileges,
        }
    }

    /// Returns the group id.
    #[must_use]
    pub fn id(&self) -> &JitGroupId {
        &self.id
    }

    /// Returns the group description.
    #[must_use]
    pub fn description(&self) -> &str {
        self.description.as_str()
    }

    /// Returns the access-control list.
    #[must_use]
    pub fn acl(&self) -> &AccessControlList {
        &self.acl
    }

    /// Returns the declared constraints.
    #[must_use]
    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    /// Returns the declared privileges.
    #[must_use]
    pub fn privileges(&self) -> &[Privilege] {
        &self.privileges
    }
}

/// Policy of one declared system within an environment.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemPolicy {
    name: String,
    description: String,
    groups: BTreeMap<String, GroupPolicy>,
}

impl SystemPolicy {
    /// Creates a system policy from its groups.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        groups: Vec<GroupPolicy>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            groups: groups
                .into_iter()
                .map(|group| (group.id().name().to_owned(), group))
                .collect(),
        }
    }

    /// Returns the system name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the system description.
    #[must_use]
    pub fn description(&self) -> &str {
        self.description.as_str()
    }

    /// Returns the system's groups.
    pub fn groups(&self) -> impl Iterator<Item = &GroupPolicy> {
        self.groups.values()
    }
}

/// Immutable, in-memory policy snapshot for one environment.
///
/// Constructed once at load time and shared read-only; a reload produces a
/// new instance behind an atomic reference swap, never in-place mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    environment: String,
    systems: BTreeMap<String, SystemPolicy>,
}

impl Policy {
    /// Creates a policy snapshot from its systems.
    #[must_use]
    pub fn new(environment: impl Into<String>, systems: Vec<SystemPolicy>) -> Self {
        Self {
            environment: environment.into(),
            systems: systems
                .into_iter()
                .map(|system| (system.name().to_owned(), system))
                .collect(),
        }
    }

    /// Returns the environment name.
    #[must_use]
    pub fn environment(&self) -> &str {
        self.environment.as_str()
    }

    /// Returns the policy's systems.
    pub fn systems(&self) -> impl Iterator<Item = &SystemPolicy> {
        self.systems.values()
    }

    /// Returns every declared group across all systems.
    pub fn groups(&self) -> impl Iterator<Item = &GroupPolicy> {
        self.systems.values().flat_map(SystemPolicy::groups)
    }

    /// Looks up one group policy by id.
    #[must_use]
    pub fn lookup(&self, id: &JitGroupId) -> Option<&GroupPolicy> {
        if id.environment() != self.environment {
            return None;
        }

        self.systems
            .get(id.system())
            .and_then(|system| system.groups.get(id.name()))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use crate::principal::PrincipalId;

    use super::{AccessControlList, AccessRight, AccessRights, AclEntry, Effect};

    fn principal_set(principals: &[PrincipalId]) -> BTreeSet<PrincipalId> {
        principals.iter().cloned().collect()
    }

    #[test]
    fn allow_entry_grants_right_to_member() {
        let alice = PrincipalId::user("alice@example.com");
        let acl = AccessControlList::new(vec![AclEntry::new(
            alice.clone(),
            Effect::Allow,
            AccessRights::of(AccessRight::Join).with(AccessRight::ApproveSelf),
        )]);

        let set = principal_set(&[alice]);
        assert!(acl.is_allowed(&set, AccessRight::Join));
        assert!(acl.is_allowed(&set, AccessRight::ApproveSelf));
        assert!(!acl.is_allowed(&set, AccessRight::ApproveOthers));
    }

    #[test]
    fn deny_overrides_allow_regardless_of_order() {
        let alice = PrincipalId::user("alice@example.com");
        let team = PrincipalId::group("team@example.com");
        let acl = AccessControlList::new(vec![
            AclEntry::new(
                alice.clone(),
                Effect::Deny,
                AccessRights::of(AccessRight::Join),
            ),
            AclEntry::new(
                team.clone(),
                Effect::Allow,
                AccessRights::of(AccessRight::Join),
            ),
        ]);

        let set = principal_set(&[alice, team]);
        assert!(!acl.is_allowed(&set, AccessRight::Join));
    }

    #[test]
    fn rights_resolve_through_group_membership() {
        let alice = PrincipalId::user("alice@example.com");
        let managers = PrincipalId::group("managers@example.com");
        let acl = AccessControlList::new(vec![AclEntry::new(
            managers.clone(),
            Effect::Allow,
            AccessRights::of(AccessRight::ApproveOthers),
        )]);

        let without_group = principal_set(&[alice.clone()]);
        assert!(!acl.is_allowed(&without_group, AccessRight::ApproveOthers));

        let with_group = principal_set(&[alice, managers]);
        assert!(acl.is_allowed(&with_group, AccessRight::ApproveOthers));
    }

    #[test]
    fn principals_holding_excludes_denied_entries() {
        let managers = PrincipalId::group("managers@example.com");
        let mallory = PrincipalId::user("mallory@example.com");
        let acl = AccessControlList::new(vec![
            AclEntry::new(
                managers.clone(),
                Effect::Allow,
                AccessRights::of(AccessRight::ApproveOthers),
            ),
            AclEntry::new(
                mallory.clone(),
                Effect::Allow,
                AccessRights::of(AccessRight::ApproveOthers),
            ),
            AclEntry::new(
                mallory,
                Effect::Deny,
                AccessRights::of(AccessRight::ApproveOthers),
            ),
        ]);

        let holders = acl.principals_holding(AccessRight::ApproveOthers);
        assert_eq!(holders, vec![managers]);
    }
}
