use chrono::Duration;
use elevia_domain::DurationBounds;

/// Configuration values consumed by the engine.
///
/// How values are discovered (environment, files, metadata server) is the
/// composition root's concern; the engine only consumes this struct.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Resource scope the engine operates in, e.g. `organizations/1234`.
    pub resource_scope: String,
    /// Domain backing provisioned directory groups, e.g. `example.com`.
    pub group_domain: String,
    /// Fallback activation duration bounds for groups that declare none.
    pub default_activation: DurationBounds,
    /// Hint shown to users when a justification is required.
    pub justification_hint: String,
    /// Optional regex a justification must match.
    pub justification_pattern: Option<String>,
    /// Service-account identity used for provisioning and token issuance.
    pub provisioning_identity: String,
    /// How long a loaded policy snapshot stays fresh.
    pub policy_cache_ttl: Duration,
    /// Lifetime of a proposal token.
    pub proposal_token_lifetime: Duration,
    /// Externally reachable base URL for proposal action links.
    pub action_base_url: String,
    /// Maximum concurrent resource writes during reconciliation.
    pub reconcile_fanout: usize,
}

impl Settings {
    /// Returns conservative settings for the given scope and group domain,
    /// suitable as a starting point for composition roots and tests.
    #[must_use]
    pub fn for_scope(resource_scope: impl Into<String>, group_domain: impl Into<String>) -> Self {
        Self {
            resource_scope: resource_scope.into(),
            group_domain: group_domain.into(),
            default_activation: DurationBounds::default(),
            justification_hint: "Bug or case number".to_owned(),
            justification_pattern: None,
            provisioning_identity: "elevia@localhost".to_owned(),
            policy_cache_ttl: Duration::minutes(5),
            proposal_token_lifetime: Duration::hours(1),
            action_base_url: "http://localhost:3001".to_owned(),
            reconcile_fanout: 8,
        }
    }
}
