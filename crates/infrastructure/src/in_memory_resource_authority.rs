use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use elevia_application::{ResourceAuthority, ResourceBinding};
use elevia_core::AppResult;
use elevia_domain::PrincipalId;
use tokio::sync::RwLock;

/// In-memory resource authorization store.
///
/// Tracks the number of write calls so callers can observe the
/// skip-if-unchanged contract of reconciliation.
#[derive(Default)]
pub struct InMemoryResourceAuthority {
    policies: RwLock<HashMap<String, Vec<ResourceBinding>>>,
    write_calls: AtomicUsize,
}

impl InMemoryResourceAuthority {
    /// Creates an empty resource authority.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of binding writes performed so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    /// Returns the current bindings of a resource.
    pub async fn bindings_on(&self, resource: &str) -> Vec<ResourceBinding> {
        self.policies
            .read()
            .await
            .get(resource)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ResourceAuthority for InMemoryResourceAuthority {
    async fn replace_principal_bindings(
        &self,
        resource: &str,
        principal: &PrincipalId,
        bindings: Vec<ResourceBinding>,
    ) -> AppResult<()> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);

        let mut policies = self.policies.write().await;
        let entry = policies.entry(resource.to_owned()).or_default();
        entry.retain(|binding| &binding.principal != principal);
        entry.extend(bindings);
        Ok(())
    }

    async fn resources_bound_to(&self, principal: &PrincipalId) -> AppResult<Vec<String>> {
        Ok(self
            .policies
            .read()
            .await
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
