//! Read-through cache for the policy snapshot.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use elevia_core::{AppError, AppResult, PolicyIssue};
use elevia_domain::{DurationBounds, Policy, PolicyDocument};
use tokio::sync::{Mutex, RwLock};
use tracing::warn;

use crate::constraint_engine::ConstraintEngine;

/// Port for loading the current policy document from storage.
#[async_trait]
pub trait PolicyDocumentSource: Send + Sync {
    /// Loads the current policy document.
    async fn load(&self) -> AppResult<PolicyDocument>;
}

struct Snapshot {
    policy: Arc<Policy>,
    loaded_at: DateTime<Utc>,
}

/// Caching store for the immutable policy snapshot.
///
/// A cached snapshot stays valid for the configured cache duration. A
/// reader past the deadline triggers a reload, but when another reader is
/// already reloading, or the reload itself fails, the stale snapshot is
/// still served for that call: bounded staleness, not strict consistency.
/// Replacement is an atomic reference swap; an in-flight request always
/// sees one consistent snapshot.
pub struct PolicyStore {
    source: Arc<dyn PolicyDocumentSource>,
    engine: Arc<ConstraintEngine>,
    fallback_duration: DurationBounds,
    cache_ttl: Duration,
    state: RwLock<Option<Snapshot>>,
    refresh: Mutex<()>,
}

impl PolicyStore {
    /// Creates a policy store.
    #[must_use]
    pub fn new(
        source: Arc<dyn PolicyDocumentSource>,
        engine: Arc<ConstraintEngine>,
        fallback_duration: DurationBounds,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            source,
            engine,
            fallback_duration,
            cache_ttl,
            state: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    /// Returns the current policy snapshot, reloading when stale.
    pub async fn current(&self) -> AppResult<Arc<Policy>> {
        let now = Utc::now();

        let stale = {
            let state = self.state.read().await;
            match state.as_ref() {
                Some(snapshot) if now < snapshot.loaded_at + self.cache_ttl => {
                    return Ok(Arc::clone(&snapshot.policy));
                }
                Some(snapshot) => Some(Arc::clone(&snapshot.policy)),
                None => None,
            }
        };

        match self.refresh.try_lock() {
            Ok(_guard) => match self.load().await {
                Ok(policy) => {
                    let mut state = self.state.write().await;
                    *state = Some(Snapshot {
                        policy: Arc::clone(&policy),
                        loaded_at: Utc::now(),
                    });
                    Ok(policy)
                }
                Err(error) => match stale {
                    Some(policy) => {
                        warn!(error = %error, "policy reload failed, serving stale snapshot");
                        Ok(policy)
                    }
                    None => Err(error),
                },
            },
            // Another reader is already reloading.
            Err(_) => match stale {
                Some(policy) => Ok(policy),
                None => {
                    // First load is contended; wait for it to finish.
                    let _guard = self.refresh.lock().await;
                    let state = self.state.read().await;
                    match state.as_ref() {
                        Some(snapshot) => Ok(Arc::clone(&snapshot.policy)),
                        None => Err(AppError::Transient(
                            "policy snapshot is not available".to_owned(),
                        )),
                    }
                }
            },
        }
    }

    /// Drops the cached snapshot so the next reader reloads.
    pub async fn invalidate(&self) {
        let mut state = self.state.write().await;
        *state = None;
    }

    async fn load(&self) -> AppResult<Arc<Policy>> {
        let document = self.source.load().await?;
        let expression_issues = self.lint_expressions(&document);

        match document.to_policy(self.fallback_duration) {
            Ok(policy) if expression_issues.is_empty() => Ok(Arc::new(policy)),
            Ok(_) => Err(AppError::Policy(expression_issues)),
            Err(AppError::Policy(mut issues)) => {
                issues.extend(expression_issues);
                Err(AppError::Policy(issues))
            }
            Err(other) => Err(other),
        }
    }

    /// Lints every declared custom expression so authoring mistakes are
    /// reported at load time alongside structural issues.
    fn lint_expressions(&self, document: &PolicyDocument) -> Vec<PolicyIssue> {
        let mut issues = Vec::new();
        for system in &document.systems {
            for group in &system.groups {
                for (index, expression) in
                    group.constraints.expressions.iter().enumerate()
                {
                    for issue in self.engine.lint(expression) {
                        issues.push(PolicyIssue::new(
                            "invalid-expression",
                            format!(
                                "{}/{}/{}/constraints/expressions[{index}]",
                                document.environment, system.name, group.name
                            ),
                            issue.message,
                        ));
                    }
                }
            }
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Duration;
    use elevia_core::{AppError, AppResult};
    use elevia_domain::{
        AccessEntryDocument, DurationBounds, GroupDocument, PolicyDocument, SystemDocument,
    };

    use crate::constraint_engine::ConstraintEngine;

    use super::{PolicyDocumentSource, PolicyStore};

    struct CountingSource {
        loads: AtomicUsize,
        expressions: Vec<String>,
    }

    impl CountingSource {
        fn new(expressions: Vec<String>) -> Self {
            Self {
                loads: AtomicUsize::new(0),
                expressions,
            }
        }
    }

    #[async_trait]
    impl PolicyDocumentSource for CountingSource {
        async fn load(&self) -> AppResult<PolicyDocument> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(PolicyDocument {
                environment: "prod".to_owned(),
                systems: vec![SystemDocument {
                    name: "network".to_owned(),
                    description: String::new(),
                    groups: vec![GroupDocument {
                        name: "admins".to_owned(),
                        description: String::new(),
                        access: vec![AccessEntryDocument {
                            principal: "user:alice@example.com".to_owned(),
                            effect: "allow".to_owned(),
                            action: "join".to_owned(),
                        }],
                        constraints: elevia_domain::ConstraintsDocument {
                            activation_duration: None,
                            approval: None,
                            expressions: self.expressions.clone(),
                        },
                        privileges: Vec::new(),
                    }],
                }],
            })
        }
    }

    fn store(source: Arc<CountingSource>, ttl: Duration) -> PolicyStore {
        PolicyStore::new(
            source,
            Arc::new(ConstraintEngine::new()),
            DurationBounds::default(),
            ttl,
        )
    }

    #[tokio::test]
    async fn fresh_snapshot_is_served_without_reload() {
        let source = Arc::new(CountingSource::new(Vec::new()));
        let store = store(Arc::clone(&source), Duration::minutes(5));

        let first = store.current().await;
        assert!(first.is_ok());
        let second = store.current().await;
        assert!(second.is_ok());

        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_snapshot_triggers_reload() {
        let source = Arc::new(CountingSource::new(Vec::new()));
        let store = store(Arc::clone(&source), Duration::zero());

        let first = store.current().await;
        assert!(first.is_ok());
        let second = store.current().await;
        assert!(second.is_ok());

        assert_eq!(source.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_reload() {
        let source = Arc::new(CountingSource::new(Vec::new()));
        let store = store(Arc::clone(&source), Duration::minutes(5));

        assert!(store.current().await.is_ok());
        store.invalidate().await;
        assert!(store.current().await.is_ok());

        assert_eq!(source.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn malformed_expression_fails_the_load_with_policy_issues() {
        let source = Arc::new(CountingSource::new(vec!["subject.email == ".to_owned()]));
        let store = store(source, Duration::minutes(5));

        let result = store.current().await;
        let Err(AppError::Policy(issues)) = result else {
            panic!("expected policy validation failure");
        };
        assert!(issues.iter().any(|issue| issue.code == "invalid-expression"));
    }
}
