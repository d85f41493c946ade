use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use elevia_core::{AppError, AppResult};
use elevia_domain::{ActivationRequest, JitGroupId, PrincipalId};

use crate::settings::Settings;

use super::{
    CompletionNotification, NotificationService, ProposalNotification, ProposalService,
    clarify_token, obfuscate_token,
};

#[derive(Default)]
struct FakeNotifications {
    proposals: Mutex<Vec<ProposalNotification>>,
    completions: Mutex<Vec<CompletionNotification>>,
}

#[async_trait]
impl NotificationService for FakeNotifications {
    async fn notify_proposal(&self, notification: &ProposalNotification) -> AppResult<()> {
        self.proposals
            .lock()
            .map_err(|error| AppError::Internal(format!("failed to lock state: {error}")))?
            .push(notification.clone());
        Ok(())
    }

    async fn notify_completion(&self, notification: &CompletionNotification) -> AppResult<()> {
        self.completions
            .lock()
            .map_err(|error| AppError::Internal(format!("failed to lock state: {error}")))?
            .push(notification.clone());
        Ok(())
    }
}

const SECRET: &[u8] = b"proposal-signing-secret-for-tests";

fn service(notifications: Arc<FakeNotifications>) -> ProposalService {
    ProposalService::new(
        notifications,
        SECRET,
        &Settings::for_scope("organizations/1234", "example.com"),
    )
}

fn peer_request() -> ActivationRequest {
    let group = match JitGroupId::new("prod", "network", "admins") {
        Ok(group) => group,
        Err(error) => panic!("invalid group id: {error}"),
    };
    let now = Utc::now();
    let reviewers = BTreeSet::from([
        PrincipalId::user("carol@example.com"),
        PrincipalId::user("dave@example.com"),
    ]);

    match ActivationRequest::peer_approval(
        PrincipalId::user("bob@example.com"),
        group,
        "BUG-1234",
        now,
        now + Duration::minutes(30),
        reviewers,
    ) {
        Ok(request) => request,
        Err(error) => panic!("invalid request: {error}"),
    }
}

#[tokio::test]
async fn token_round_trip_preserves_the_proposal() {
    let notifications = Arc::new(FakeNotifications::default());
    let service = service(Arc::clone(&notifications));
    let request = peer_request();

    let pending = service.propose(&request).await;
    assert!(pending.is_ok());
    let Ok(pending) = pending else {
        return;
    };

    let accepted = service.accept(pending.token.as_str());
    assert!(accepted.is_ok());
    let Ok(accepted) = accepted else {
        return;
    };

    assert_eq!(accepted.requesting_user(), request.principal());
    assert_eq!(accepted.group_id(), request.group_id());
    assert_eq!(Some(accepted.recipients()), request.reviewers());
    assert_eq!(
        accepted.input().get("justification").map(String::as_str),
        Some("BUG-1234")
    );
}

#[tokio::test]
async fn tampered_token_is_rejected() {
    let service = service(Arc::new(FakeNotifications::default()));
    let pending = service.propose(&peer_request()).await;
    assert!(pending.is_ok());
    let Ok(pending) = pending else {
        return;
    };

    // Flip one character in the middle of the signed payload.
    let mut tampered: Vec<char> = pending.token.chars().collect();
    let middle = tampered.len() / 2;
    tampered[middle] = if tampered[middle] == 'x' { 'y' } else { 'x' };
    let tampered: String = tampered.into_iter().collect();

    let result = service.accept(tampered.as_str());
    assert!(matches!(result, Err(AppError::AccessDenied(_))));
}

#[tokio::test]
async fn token_signed_with_another_secret_is_rejected() {
    let minting = service(Arc::new(FakeNotifications::default()));
    let pending = minting.propose(&peer_request()).await;
    assert!(pending.is_ok());
    let Ok(pending) = pending else {
        return;
    };

    let verifying = ProposalService::new(
        Arc::new(FakeNotifications::default()),
        b"a-different-secret-entirely",
        &Settings::for_scope("organizations/1234", "example.com"),
    );

    let result = verifying.accept(pending.token.as_str());
    assert!(matches!(result, Err(AppError::AccessDenied(_))));
}

#[tokio::test]
async fn token_for_another_audience_is_rejected() {
    let mut settings = Settings::for_scope("organizations/1234", "example.com");
    settings.provisioning_identity = "elevia-prod@example.com".to_owned();
    let minting = ProposalService::new(
        Arc::new(FakeNotifications::default()),
        SECRET,
        &settings,
    );

    let pending = minting.propose(&peer_request()).await;
    assert!(pending.is_ok());
    let Ok(pending) = pending else {
        return;
    };

    // Same secret, different service identity.
    let verifying = service(Arc::new(FakeNotifications::default()));
    let result = verifying.accept(pending.token.as_str());
    assert!(matches!(result, Err(AppError::AccessDenied(_))));
}

#[tokio::test]
async fn expired_token_is_rejected() {
    let mut settings = Settings::for_scope("organizations/1234", "example.com");
    settings.proposal_token_lifetime = Duration::minutes(-5);
    let service = ProposalService::new(
        Arc::new(FakeNotifications::default()),
        SECRET,
        &settings,
    );

    let pending = service.propose(&peer_request()).await;
    assert!(pending.is_ok());
    let Ok(pending) = pending else {
        return;
    };

    let result = service.accept(pending.token.as_str());
    assert!(matches!(result, Err(AppError::AccessDenied(_))));
}

#[tokio::test]
async fn self_approval_request_cannot_be_proposed() {
    let service = service(Arc::new(FakeNotifications::default()));
    let group = match JitGroupId::new("prod", "network", "admins") {
        Ok(group) => group,
        Err(error) => panic!("invalid group id: {error}"),
    };
    let now = Utc::now();
    let request = ActivationRequest::self_approval(
        PrincipalId::user("alice@example.com"),
        group,
        "BUG-1234",
        now,
        now + Duration::minutes(10),
    );
    let Ok(request) = request else {
        panic!("request construction should succeed");
    };

    let result = service.propose(&request).await;
    assert!(matches!(result, Err(AppError::Internal(_))));
}

#[tokio::test]
async fn propose_notifies_every_reviewer() {
    let notifications = Arc::new(FakeNotifications::default());
    let service = service(Arc::clone(&notifications));

    let pending = service.propose(&peer_request()).await;
    assert!(pending.is_ok());

    let recorded = notifications
        .proposals
        .lock()
        .ok()
        .map(|guard| guard.clone())
        .unwrap_or_default();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].recipients.len(), 2);
    assert!(recorded[0].action_url.contains("/approve?proposal="));
}

#[tokio::test]
async fn completion_notification_reaches_participants() {
    let notifications = Arc::new(FakeNotifications::default());
    let service = service(Arc::clone(&notifications));
    let request = peer_request();

    let pending = service.propose(&request).await;
    assert!(pending.is_ok());
    let Ok(pending) = pending else {
        return;
    };

    let result = service.complete(&pending.proposal, &request).await;
    assert!(result.is_ok());

    let completions = notifications
        .completions
        .lock()
        .ok()
        .map(|guard| guard.len())
        .unwrap_or(0);
    assert_eq!(completions, 1);
}

#[test]
fn obfuscation_round_trips_and_stays_cosmetic() {
    let token = "eyJhbGciOiJIUzI1NiJ9.payload.signature";
    let obfuscated = obfuscate_token(token);

    assert_ne!(obfuscated, token);
    assert!(!obfuscated.contains('.'));
    assert_eq!(clarify_token(obfuscated.as_str()).ok().as_deref(), Some(token));
}

#[test]
fn clarify_rejects_garbage() {
    assert!(clarify_token("!!not-base64!!").is_err());
}
