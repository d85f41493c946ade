//! Elevia API composition root.

#![forbid(unsafe_code)]

mod dto;
mod error;
mod handlers;
mod state;

use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use chrono::Duration;
use elevia_application::{
    CatalogService, ConstraintEngine, DirectoryRepository, GroupDirectory, PolicyStore,
    ProposalService, ProvisioningService, Settings,
};
use elevia_core::AppError;
use elevia_infrastructure::{
    ConsoleNotificationService, InMemoryDirectory, InMemoryResourceAuthority,
    YamlPolicySource,
};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let settings = load_settings()?;
    let policy_file = required_env("ELEVIA_POLICY_FILE")?;
    let signing_secret = required_env("ELEVIA_SIGNING_SECRET")?;
    if signing_secret.len() < 32 {
        return Err(AppError::Internal(
            "ELEVIA_SIGNING_SECRET must be at least 32 characters".to_owned(),
        ));
    }

    let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
    let api_port = env::var("API_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(3001);

    let constraint_engine = Arc::new(ConstraintEngine::new());
    let policy_store = Arc::new(PolicyStore::new(
        Arc::new(YamlPolicySource::new(policy_file)),
        Arc::clone(&constraint_engine),
        settings.default_activation,
        settings.policy_cache_ttl,
    ));
    let directory = Arc::new(InMemoryDirectory::new());
    let directory_clone: Arc<InMemoryDirectory> = Arc::clone(&directory);
    let directory_repository: Arc<dyn DirectoryRepository> = directory_clone;
    let directory_groups: Arc<dyn GroupDirectory> = directory;
    let resources = Arc::new(InMemoryResourceAuthority::new());
    let notifications = Arc::new(ConsoleNotificationService::new());

    let catalog = CatalogService::new(
        Arc::clone(&policy_store),
        directory_repository,
        constraint_engine,
        settings.clone(),
    )?;
    let proposals = ProposalService::new(notifications, signing_secret.as_bytes(), &settings);
    let provisioning =
        ProvisioningService::new(directory_groups, resources, policy_store, &settings);

    let state = AppState {
        catalog,
        proposals,
        provisioning,
        settings: Arc::new(settings),
    };

    let router = build_router(state);

    let host = IpAddr::from_str(api_host.as_str())
        .map_err(|error| AppError::Internal(format!("invalid API_HOST: {error}")))?;
    let address = SocketAddr::new(host, api_port);

    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind {address}: {error}")))?;

    info!(address = %address, "elevia-api started");

    axum::serve(listener, router)
        .await
        .map_err(|error| AppError::Internal(format!("server error: {error}")))
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/catalog/scopes", get(handlers::list_scopes))
        .route("/catalog/entitlements", get(handlers::list_entitlements))
        .route("/catalog/reviewers", get(handlers::list_reviewers))
        .route("/activations/request", post(handlers::request_activation))
        .route("/activations/propose", post(handlers::propose_activation))
        .route("/activations/approve", post(handlers::approve_activation))
        .route("/groups", get(handlers::provisioned_groups))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn load_settings() -> Result<Settings, AppError> {
    let scope = required_env("ELEVIA_SCOPE")?;
    let group_domain = required_env("ELEVIA_GROUP_DOMAIN")?;

    let mut settings = Settings::for_scope(scope, group_domain);

    if let Ok(value) = env::var("ELEVIA_ACTION_BASE_URL") {
        settings.action_base_url = value;
    }
    if let Ok(value) = env::var("ELEVIA_PROVISIONING_IDENTITY") {
        settings.provisioning_identity = value;
    }
    if let Ok(value) = env::var("ELEVIA_JUSTIFICATION_HINT") {
        settings.justification_hint = value;
    }
    if let Ok(value) = env::var("ELEVIA_JUSTIFICATION_PATTERN") {
        settings.justification_pattern = Some(value);
    }
    if let Some(seconds) = optional_seconds_env("ELEVIA_POLICY_CACHE_SECONDS")? {
        settings.policy_cache_ttl = seconds;
    }
    if let Some(seconds) = optional_seconds_env("ELEVIA_TOKEN_LIFETIME_SECONDS")? {
        settings.proposal_token_lifetime = seconds;
    }

    Ok(settings)
}

fn optional_seconds_env(name: &str) -> Result<Option<Duration>, AppError> {
    let Ok(value) = env::var(name) else {
        return Ok(None);
    };

    value
        .parse::<i64>()
        .map(Duration::seconds)
        .map(Some)
        .map_err(|error| AppError::Internal(format!("invalid {name}: {error}")))
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| {
        AppError::Internal(format!("missing required environment variable {name}"))
    })
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}
