use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use elevia_core::{AppError, AppResult};
use elevia_domain::{
    AccessEntryDocument, Checksum, ConstraintsDocument, DurationBounds, GroupDocument,
    JitGroupId, PolicyDocument, PrincipalId, Privilege, PrivilegeDocument, SystemDocument,
};

use crate::constraint_engine::ConstraintEngine;
use crate::directory::GroupKey;
use crate::policy_cache::{PolicyDocumentSource, PolicyStore};
use crate::settings::Settings;

use super::{
    GroupDirectory, ProvisioningService, ResourceAuthority, ResourceBinding,
};

fn lock_failed(error: impl std::fmt::Display) -> AppError {
    AppError::Internal(format!("failed to lock state: {error}"))
}

#[derive(Default)]
struct FakeGroup {
    description: String,
    members: Vec<(PrincipalId, DateTime<Utc>)>,
}

#[derive(Default)]
struct FakeGroupDirectory {
    groups: Mutex<HashMap<String, FakeGroup>>,
}

impl FakeGroupDirectory {
    fn description_of(&self, key: &GroupKey) -> Option<String> {
        self.groups
            .lock()
            .ok()
            .and_then(|groups| groups.get(key.email()).map(|group| group.description.clone()))
    }

    fn members_of(&self, key: &GroupKey) -> Vec<(PrincipalId, DateTime<Utc>)> {
        self.groups
            .lock()
            .ok()
            .and_then(|groups| groups.get(key.email()).map(|group| group.members.clone()))
            .unwrap_or_default()
    }
}

#[async_trait]
impl GroupDirectory for FakeGroupDirectory {
    async fn ensure_group(
        &self,
        key: &GroupKey,
        _display_name: &str,
        description: &str,
    ) -> AppResult<bool> {
        let mut groups = self.groups.lock().map_err(lock_failed)?;
        if groups.contains_key(key.email()) {
            return Ok(false);
        }

        groups.insert(
            key.email().to_owned(),
            FakeGroup {
                description: description.to_owned(),
                members: Vec::new(),
            },
        );
        Ok(true)
    }

    async fn group_exists(&self, key: &GroupKey) -> AppResult<bool> {
        Ok(self
            .groups
            .lock()
            .map_err(lock_failed)?
            .contains_key(key.email()))
    }

    async fn add_membership(
        &self,
        key: &GroupKey,
        member: &PrincipalId,
        expiry: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut groups = self.groups.lock().map_err(lock_failed)?;
        let group = groups
            .get_mut(key.email())
            .ok_or_else(|| AppError::NotFound(format!("group '{}'", key.email())))?;

        group.members.retain(|(existing, _)| existing != member);
        group.members.push((member.clone(), expiry));
        Ok(())
    }

    async fn group_description(&self, key: &GroupKey) -> AppResult<String> {
        self.groups
            .lock()
            .map_err(lock_failed)?
            .get(key.email())
            .map(|group| group.description.clone())
            .ok_or_else(|| AppError::NotFound(format!("group '{}'", key.email())))
    }

    async fn set_group_description(&self, key: &GroupKey, description: &str) -> AppResult<()> {
        let mut groups = self.groups.lock().map_err(lock_failed)?;
        let group = groups
            .get_mut(key.email())
            .ok_or_else(|| AppError::NotFound(format!("group '{}'", key.email())))?;
        group.description = description.to_owned();
        Ok(())
    }

    async fn list_groups_by_prefix(&self, prefix: &str) -> AppResult<Vec<String>> {
        Ok(self
            .groups
            .lock()
            .map_err(lock_failed)?
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
struct FakeResourceAuthority {
    policies: Mutex<HashMap<String, Vec<ResourceBinding>>>,
    write_calls: AtomicUsize,
    failing: Mutex<HashSet<String>>,
}

impl FakeResourceAuthority {
    fn bindings_on(&self, resource: &str) -> Vec<ResourceBinding> {
        self.policies
            .lock()
            .ok()
            .and_then(|policies| policies.get(resource).cloned())
            .unwrap_or_default()
    }

    fn fail_resource(&self, resource: &str) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(resource.to_owned());
        }
    }

    fn heal_resource(&self, resource: &str) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.remove(resource);
        }
    }
}

#[async_trait]
impl ResourceAuthority for FakeResourceAuthority {
    async fn replace_principal_bindings(
        &self,
        resource: &str,
        principal: &PrincipalId,
        bindings: Vec<ResourceBinding>,
    ) -> AppResult<()> {
        if self.failing.lock().map_err(lock_failed)?.contains(resource) {
            return Err(AppError::Transient(format!(
                "authorization service unavailable for '{resource}'"
            )));
        }

        self.write_calls.fetch_add(1, Ordering::SeqCst);

        let mut policies = self.policies.lock().map_err(lock_failed)?;
        let entry = policies.entry(resource.to_owned()).or_default();
        entry.retain(|binding| &binding.principal != principal);
        entry.extend(bindings);
        Ok(())
    }

    async fn resources_bound_to(&self, principal: &PrincipalId) -> AppResult<Vec<String>> {
        Ok(self
            .policies
            .lock()
            .map_err(lock_failed)?
            .iter()
            .filter(|(_, bindings)| {
                bindings
                    .iter()
                    .any(|binding| &binding.principal == principal)
            })
            .map(|(resource, _)| resource.clone())
            .collect())
    }
}

struct StaticSource {
    document: PolicyDocument,
}

#[async_trait]
impl PolicyDocumentSource for StaticSource {
    async fn load(&self) -> AppResult<PolicyDocument> {
        Ok(self.document.clone())
    }
}

fn document(privileges: Vec<PrivilegeDocument>) -> PolicyDocument {
    PolicyDocument {
        environment: "prod".to_owned(),
        systems: vec![SystemDocument {
            name: "network".to_owned(),
            description: String::new(),
            groups: vec![GroupDocument {
                name: "admins".to_owned(),
                description: "Network admin JIT group".to_owned(),
                access: vec![AccessEntryDocument {
                    principal: "user:alice@example.com".to_owned(),
                    effect: "allow".to_owned(),
                    action: "join".to_owned(),
                }],
                constraints: ConstraintsDocument::default(),
                privileges,
            }],
        }],
    }
}

fn privilege_document(resource: &str, role: &str) -> PrivilegeDocument {
    PrivilegeDocument {
        resource: resource.to_owned(),
        role: role.to_owned(),
        condition: None,
    }
}

fn service(
    document: PolicyDocument,
    groups: Arc<FakeGroupDirectory>,
    resources: Arc<FakeResourceAuthority>,
) -> ProvisioningService {
    let store = Arc::new(PolicyStore::new(
        Arc::new(StaticSource { document }),
        Arc::new(ConstraintEngine::new()),
        DurationBounds::default(),
        Duration::minutes(5),
    ));

    ProvisioningService::new(
        groups,
        resources,
        store,
        &Settings::for_scope("organizations/1234", "example.com"),
    )
}

fn admins_id() -> JitGroupId {
    match JitGroupId::new("prod", "network", "admins") {
        Ok(id) => id,
        Err(error) => panic!("invalid group id: {error}"),
    }
}

fn admins_key() -> GroupKey {
    GroupKey::for_group(&admins_id(), "example.com")
}

fn alice() -> PrincipalId {
    PrincipalId::user("alice@example.com")
}

#[tokio::test]
async fn provisioning_creates_group_membership_and_bindings() {
    let groups = Arc::new(FakeGroupDirectory::default());
    let resources = Arc::new(FakeResourceAuthority::default());
    let service = service(
        document(vec![privilege_document(
            "projects/net-prod",
            "roles/compute.networkAdmin",
        )]),
        Arc::clone(&groups),
        Arc::clone(&resources),
    );

    let expiry = Utc::now() + Duration::minutes(10);
    let result = service
        .provision_membership(&admins_id(), &alice(), expiry)
        .await;
    assert!(result.is_ok());

    let members = groups.members_of(&admins_key());
    assert_eq!(members, vec![(alice(), expiry)]);

    let bindings = resources.bindings_on("projects/net-prod");
    assert_eq!(bindings.len(), 1);
    assert_eq!(bindings[0].principal, admins_key().as_principal());
    assert_eq!(bindings[0].role, "roles/compute.networkAdmin");

    let description = groups.description_of(&admins_key()).unwrap_or_default();
    let expected = Checksum::of(&[Privilege::new(
        "projects/net-prod",
        "roles/compute.networkAdmin",
        None,
    )]);
    assert_eq!(Checksum::from_description(description.as_str()), expected);
    assert!(description.starts_with("Network admin JIT group #"));
}

#[tokio::test]
async fn second_reconcile_without_drift_issues_zero_writes() {
    let groups = Arc::new(FakeGroupDirectory::default());
    let resources = Arc::new(FakeResourceAuthority::default());
    let service = service(
        document(vec![privilege_document(
            "projects/net-prod",
            "roles/compute.networkAdmin",
        )]),
        Arc::clone(&groups),
        Arc::clone(&resources),
    );

    let expiry = Utc::now() + Duration::minutes(10);
    let provisioned = service
        .provision_membership(&admins_id(), &alice(), expiry)
        .await;
    assert!(provisioned.is_ok());

    let writes_after_first = resources.write_calls.load(Ordering::SeqCst);
    let reconciled = service.reconcile(&admins_id()).await;
    assert!(reconciled.is_ok());

    assert_eq!(
        resources.write_calls.load(Ordering::SeqCst),
        writes_after_first
    );
}

#[tokio::test]
async fn reconcile_of_never_provisioned_group_is_a_no_op() {
    let groups = Arc::new(FakeGroupDirectory::default());
    let resources = Arc::new(FakeResourceAuthority::default());
    let service = service(
        document(vec![privilege_document(
            "projects/net-prod",
            "roles/compute.networkAdmin",
        )]),
        Arc::clone(&groups),
        Arc::clone(&resources),
    );

    let result = service.reconcile(&admins_id()).await;
    assert!(result.is_ok());
    assert_eq!(resources.write_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn reconcile_of_undeclared_group_is_not_found() {
    let groups = Arc::new(FakeGroupDirectory::default());
    let resources = Arc::new(FakeResourceAuthority::default());
    let service = service(
        document(Vec::new()),
        Arc::clone(&groups),
        Arc::clone(&resources),
    );

    let unknown = match JitGroupId::new("prod", "network", "unknown") {
        Ok(id) => id,
        Err(error) => panic!("invalid group id: {error}"),
    };
    let result = service.reconcile(&unknown).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn removing_a_privilege_clears_its_binding_on_reconcile() {
    let groups = Arc::new(FakeGroupDirectory::default());
    let resources = Arc::new(FakeResourceAuthority::default());

    // Provision with two privileges on two resources.
    let before = service(
        document(vec![
            privilege_document("projects/net-prod", "roles/compute.networkAdmin"),
            privilege_document("projects/log-prod", "roles/logging.viewer"),
        ]),
        Arc::clone(&groups),
        Arc::clone(&resources),
    );
    let expiry = Utc::now() + Duration::minutes(10);
    let provisioned = before
        .provision_membership(&admins_id(), &alice(), expiry)
        .await;
    assert!(provisioned.is_ok());
    assert_eq!(resources.bindings_on("projects/log-prod").len(), 1);

    // The policy is edited to drop the logging privilege.
    let after = service(
        document(vec![privilege_document(
            "projects/net-prod",
            "roles/compute.networkAdmin",
        )]),
        Arc::clone(&groups),
        Arc::clone(&resources),
    );
    let reconciled = after.reconcile(&admins_id()).await;
    assert!(reconciled.is_ok());

    assert!(resources.bindings_on("projects/log-prod").is_empty());
    assert_eq!(resources.bindings_on("projects/net-prod").len(), 1);

    let description = groups.description_of(&admins_key()).unwrap_or_default();
    let expected = Checksum::of(&[Privilege::new(
        "projects/net-prod",
        "roles/compute.networkAdmin",
        None,
    )]);
    assert_eq!(Checksum::from_description(description.as_str()), expected);
}

#[tokio::test]
async fn partial_failure_aggregates_and_leaves_checksum_unadvanced() {
    let groups = Arc::new(FakeGroupDirectory::default());
    let resources = Arc::new(FakeResourceAuthority::default());
    resources.fail_resource("projects/log-prod");

    let service = service(
        document(vec![
            privilege_document("projects/net-prod", "roles/compute.networkAdmin"),
            privilege_document("projects/log-prod", "roles/logging.viewer"),
        ]),
        Arc::clone(&groups),
        Arc::clone(&resources),
    );

    let expiry = Utc::now() + Duration::minutes(10);
    let result = service
        .provision_membership(&admins_id(), &alice(), expiry)
        .await;

    let Err(AppError::Aggregate(aggregate)) = result else {
        panic!("expected an aggregate failure");
    };
    assert_eq!(aggregate.failures().len(), 1);
    assert_eq!(aggregate.failures()[0].0, "projects/log-prod");

    // The checksum must not advance, so the next attempt retries.
    let description = groups.description_of(&admins_key()).unwrap_or_default();
    assert_eq!(
        Checksum::from_description(description.as_str()),
        Checksum::ZERO
    );

    // Once the resource heals, reconcile retries every resource and
    // advances the checksum.
    resources.heal_resource("projects/log-prod");
    let retried = service.reconcile(&admins_id()).await;
    assert!(retried.is_ok());

    assert_eq!(resources.bindings_on("projects/log-prod").len(), 1);
    let description = groups.description_of(&admins_key()).unwrap_or_default();
    assert_ne!(
        Checksum::from_description(description.as_str()),
        Checksum::ZERO
    );
}

#[tokio::test]
async fn concurrent_reconciliations_converge_to_the_same_checksum() {
    let groups = Arc::new(FakeGroupDirectory::default());
    let resources = Arc::new(FakeResourceAuthority::default());
    let service = service(
        document(vec![privilege_document(
            "projects/net-prod",
            "roles/compute.networkAdmin",
        )]),
        Arc::clone(&groups),
        Arc::clone(&resources),
    );

    let expiry = Utc::now() + Duration::minutes(10);
    let provisioned = service
        .provision_membership(&admins_id(), &alice(), expiry)
        .await;
    assert!(provisioned.is_ok());

    // Force drift, then reconcile twice concurrently. Last writer wins
    // deterministically; both calls must converge on the same checksum.
    let cleared = groups
        .set_group_description(&admins_key(), "Network admin JIT group")
        .await;
    assert!(cleared.is_ok());

    let reconcile_id = admins_id();
    let (first, second) = tokio::join!(
        service.reconcile(&reconcile_id),
        service.reconcile(&reconcile_id)
    );
    assert!(first.is_ok());
    assert!(second.is_ok());

    let description = groups.description_of(&admins_key()).unwrap_or_default();
    let expected = Checksum::of(&[Privilege::new(
        "projects/net-prod",
        "roles/compute.networkAdmin",
        None,
    )]);
    assert_eq!(Checksum::from_description(description.as_str()), expected);
}

#[tokio::test]
async fn provisioned_groups_lists_recognized_groups_including_orphans() {
    let groups = Arc::new(FakeGroupDirectory::default());
    let resources = Arc::new(FakeResourceAuthority::default());

    // One declared group, one orphan, one naturally colliding name.
    for (key, description) in [
        ("jit.prod.network.admins@example.com", "declared"),
        ("jit.prod.storage.readers@example.com", "orphan"),
        ("jit.not-a-group@example.com", "collision"),
    ] {
        let mut directory = groups.groups.lock().unwrap_or_else(|e| e.into_inner());
        directory.insert(
            key.to_owned(),
            FakeGroup {
                description: description.to_owned(),
                members: Vec::new(),
            },
        );
    }

    let service = service(
        document(vec![privilege_document(
            "projects/net-prod",
            "roles/compute.networkAdmin",
        )]),
        Arc::clone(&groups),
        Arc::clone(&resources),
    );

    let provisioned = service.provisioned_groups().await;
    assert!(provisioned.is_ok());
    let Ok(provisioned) = provisioned else {
        return;
    };

    assert_eq!(provisioned.len(), 2);
    assert_eq!(provisioned[0].key, "jit.prod.network.admins@example.com");
    assert!(!provisioned[0].orphaned);
    assert_eq!(provisioned[1].key, "jit.prod.storage.readers@example.com");
    assert!(provisioned[1].orphaned);
}
