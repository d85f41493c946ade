use std::str::FromStr;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use chrono::{DateTime, Duration, Utc};
use elevia_application::clarify_token;
use elevia_core::AppError;
use elevia_domain::{ActivationRequest, JitGroupId, PrincipalId, Proposal};

use crate::dto::{
    ActivationDto, ApproveActivationBody, EntitlementSetDto, EntitlementsQuery,
    ProposalDto, ProposeActivationBody, ProvisionedGroupDto, ReviewersDto, ReviewersQuery,
    SelfActivationBody,
};
use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying the proxy-authenticated principal.
const PRINCIPAL_HEADER: &str = "x-elevia-principal";

/// Liveness probe.
pub async fn healthz() -> &'static str {
    "ok"
}

/// Lists the evaluation scopes visible to the caller.
pub async fn list_scopes(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<String>>, ApiError> {
    let _principal = authenticated_user(&headers)?;
    Ok(Json(state.catalog.list_scopes()))
}

/// Lists the caller's entitlements.
pub async fn list_entitlements(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<EntitlementsQuery>,
) -> Result<Json<EntitlementSetDto>, ApiError> {
    let principal = authenticated_user(&headers)?;
    let scope = query
        .scope
        .unwrap_or_else(|| state.settings.resource_scope.clone());

    let set = state.catalog.list_entitlements(&principal, scope.as_str()).await?;
    Ok(Json(set.into()))
}

/// Lists eligible reviewers for a peer-approval group.
pub async fn list_reviewers(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ReviewersQuery>,
) -> Result<Json<ReviewersDto>, ApiError> {
    let principal = authenticated_user(&headers)?;
    let group = parse_group(query.group.as_str())?;

    let reviewers = state.catalog.list_reviewers(&principal, &group).await?;
    Ok(Json(ReviewersDto {
        reviewers: reviewers.iter().map(ToString::to_string).collect(),
    }))
}

/// Requests and provisions a self-approval activation.
pub async fn request_activation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SelfActivationBody>,
) -> Result<Json<ActivationDto>, ApiError> {
    let principal = authenticated_user(&headers)?;
    let group = parse_group(body.group.as_str())?;
    let (start, end) = activation_window(&state, body.duration_minutes);

    let request = ActivationRequest::self_approval(
        principal.clone(),
        group.clone(),
        body.justification,
        start,
        end,
    )?;

    state.catalog.verify_user_can_request(&request).await?;
    state
        .provisioning
        .provision_membership(&group, &principal, end)
        .await?;

    Ok(Json(ActivationDto {
        group: group.to_string(),
        member: principal.to_string(),
        expires_at: end.to_rfc3339(),
    }))
}

/// Requests a peer-approval activation and mints the proposal.
pub async fn propose_activation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ProposeActivationBody>,
) -> Result<Json<ProposalDto>, ApiError> {
    let principal = authenticated_user(&headers)?;
    let group = parse_group(body.group.as_str())?;
    let (start, end) = activation_window(&state, body.duration_minutes);

    let reviewers = body
        .reviewers
        .iter()
        .map(|reviewer| parse_reviewer(reviewer.as_str()))
        .collect::<Result<_, _>>()?;

    let request = ActivationRequest::peer_approval(
        principal,
        group.clone(),
        body.justification,
        start,
        end,
        reviewers,
    )?;

    state.catalog.verify_user_can_request(&request).await?;
    let pending = state.proposals.propose(&request).await?;

    Ok(Json(ProposalDto {
        group: group.to_string(),
        action_url: pending.action_url,
        expires_at: pending.proposal.expiry().to_rfc3339(),
        recipients: pending
            .proposal
            .recipients()
            .iter()
            .map(ToString::to_string)
            .collect(),
    }))
}

/// Accepts a proposal token and provisions the requested membership.
pub async fn approve_activation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ApproveActivationBody>,
) -> Result<Json<ActivationDto>, ApiError> {
    let approver = authenticated_user(&headers)?;

    let token = clarify_token(body.proposal.as_str())?;
    let proposal = state.proposals.accept(token.as_str())?;
    let request = request_from_proposal(&proposal)?;

    state
        .catalog
        .verify_user_can_approve(&approver, &request)
        .await?;
    state
        .provisioning
        .provision_membership(
            request.group_id(),
            request.principal(),
            request.end(),
        )
        .await?;
    state.proposals.complete(&proposal, &request).await?;

    Ok(Json(ActivationDto {
        group: request.group_id().to_string(),
        member: request.principal().to_string(),
        expires_at: request.end().to_rfc3339(),
    }))
}

/// Lists provisioned JIT groups, including orphans, for auditing.
pub async fn provisioned_groups(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ProvisionedGroupDto>>, ApiError> {
    let _principal = authenticated_user(&headers)?;

    let groups = state.provisioning.provisioned_groups().await?;
    Ok(Json(
        groups
            .into_iter()
            .map(|group| ProvisionedGroupDto {
                key: group.key,
                group: group.group_id.to_string(),
                orphaned: group.orphaned,
            })
            .collect(),
    ))
}

/// Extracts the proxy-authenticated user from request headers.
fn authenticated_user(headers: &HeaderMap) -> Result<PrincipalId, ApiError> {
    let value = headers
        .get(PRINCIPAL_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            AppError::NotAuthenticated(format!("missing {PRINCIPAL_HEADER} header"))
        })?;

    let principal = PrincipalId::from_str(format!("user:{value}").as_str())
        .map_err(|_| AppError::NotAuthenticated(format!("invalid principal '{value}'")))?;
    Ok(principal)
}

fn parse_group(value: &str) -> Result<JitGroupId, ApiError> {
    JitGroupId::from_str(value)
        .map_err(|_| AppError::NotFound(format!("unknown group '{value}'")).into())
}

fn parse_reviewer(value: &str) -> Result<PrincipalId, ApiError> {
    let canonical = if value.contains(':') {
        value.to_owned()
    } else {
        format!("user:{value}")
    };

    PrincipalId::from_str(canonical.as_str())
        .map_err(|_| AppError::NotFound(format!("invalid reviewer '{value}'")).into())
}

fn activation_window(
    state: &AppState,
    duration_minutes: Option<i64>,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = Utc::now();
    let duration = duration_minutes
        .map(Duration::minutes)
        .unwrap_or_else(|| state.settings.default_activation.default_duration());
    (start, start + duration)
}

/// Rebuilds the activation request a proposal was minted from. The input
/// map was written by this service at proposal time, so an unreadable
/// claim means the token was not ours.
fn request_from_proposal(proposal: &Proposal) -> Result<ActivationRequest, ApiError> {
    let justification = proposal
        .input()
        .get("justification")
        .cloned()
        .ok_or_else(token_rejected)?;
    let start = parse_instant(proposal.input().get("start"))?;
    let end = parse_instant(proposal.input().get("end"))?;

    let request = ActivationRequest::peer_approval(
        proposal.requesting_user().clone(),
        proposal.group_id().clone(),
        justification,
        start,
        end,
        proposal.recipients().clone(),
    )?;
    Ok(request)
}

fn parse_instant(value: Option<&String>) -> Result<DateTime<Utc>, ApiError> {
    let value = value.ok_or_else(token_rejected)?;
    DateTime::parse_from_rfc3339(value.as_str())
        .map(|instant| instant.with_timezone(&Utc))
        .map_err(|_| token_rejected())
}

fn token_rejected() -> ApiError {
    AppError::AccessDenied("proposal token was rejected".to_owned()).into()
}
