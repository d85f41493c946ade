use elevia_core::{AppError, AppResult};
use elevia_domain::{
    AccessRight, ActivationRequest, ApprovalMode, GroupPolicy, JitGroupId, PrincipalId,
};

use crate::constraint_engine::EvaluationContext;
use crate::directory::PrincipalSet;

use super::CatalogService;

/// Maximum accepted justification length.
const JUSTIFICATION_MAX_LENGTH: usize = 1024;

impl CatalogService {
    /// Authorizes an activation request.
    ///
    /// Re-resolves the policy node, checks the requested duration and, for
    /// peer requests, the reviewer count against the node's constraints,
    /// evaluates custom join constraints, then checks the ACL:
    /// self-activation requires JOIN and APPROVE_SELF, peer-activation
    /// requires JOIN.
    pub async fn verify_user_can_request(&self, request: &ActivationRequest) -> AppResult<()> {
        let policy = self.policy_store.current().await?;
        let group = policy
            .lookup(request.group_id())
            .ok_or_else(|| entitlement_denied(request.group_id()))?;

        self.check_justification(request)?;
        self.check_constraints(group, request)?;

        let principal_set =
            PrincipalSet::resolve(self.directory.as_ref(), request.principal()).await?;
        let rights = group.acl().effective_rights(principal_set.principals());

        if !rights.contains(AccessRight::Join) {
            return Err(entitlement_denied(request.group_id()));
        }
        if matches!(request.approval(), ApprovalMode::SelfApproval)
            && !rights.contains(AccessRight::ApproveSelf)
        {
            return Err(AppError::AccessDenied(format!(
                "'{}' requires peer approval for '{}'",
                request.principal(),
                request.group_id()
            )));
        }

        Ok(())
    }

    /// Authorizes an approval of someone else's activation request.
    ///
    /// Runs the same constraint checks as the request path, then requires
    /// the approving principal, never the requester, to hold
    /// APPROVE_OTHERS.
    pub async fn verify_user_can_approve(
        &self,
        approver: &PrincipalId,
        request: &ActivationRequest,
    ) -> AppResult<()> {
        let policy = self.policy_store.current().await?;
        let group = policy
            .lookup(request.group_id())
            .ok_or_else(|| entitlement_denied(request.group_id()))?;

        if approver == request.principal() {
            return Err(AppError::AccessDenied(format!(
                "'{approver}' cannot approve their own request"
            )));
        }

        self.check_justification(request)?;
        self.check_constraints(group, request)?;

        let principal_set = PrincipalSet::resolve(self.directory.as_ref(), approver).await?;
        if !group
            .acl()
            .is_allowed(principal_set.principals(), AccessRight::ApproveOthers)
        {
            return Err(AppError::AccessDenied(format!(
                "'{approver}' may not approve requests for '{}'",
                request.group_id()
            )));
        }

        Ok(())
    }

    fn check_justification(&self, request: &ActivationRequest) -> AppResult<()> {
        let justification = request.justification().trim();
        if justification.is_empty() {
            return Err(AppError::ConstraintViolation(format!(
                "a justification is required ({})",
                self.settings.justification_hint
            )));
        }
        if justification.len() > JUSTIFICATION_MAX_LENGTH {
            return Err(AppError::ConstraintViolation(format!(
                "justification exceeds {JUSTIFICATION_MAX_LENGTH} characters"
            )));
        }
        if let Some(pattern) = &self.justification_pattern
            && !pattern.is_match(justification)
        {
            return Err(AppError::ConstraintViolation(format!(
                "justification does not match the required format ({})",
                self.settings.justification_hint
            )));
        }

        Ok(())
    }

    fn check_constraints(
        &self,
        group: &GroupPolicy,
        request: &ActivationRequest,
    ) -> AppResult<()> {
        group.constraints().duration().check(request.duration())?;

        if let Some(reviewers) = request.reviewers() {
            group.constraints().approval().check(reviewers.len())?;
        }

        let context = request_context(request);
        for expression in group.constraints().expressions() {
            if !self.constraint_engine.evaluate(expression, &context)? {
                return Err(AppError::ConstraintViolation(format!(
                    "join constraint '{expression}' was not satisfied"
                )));
            }
        }

        Ok(())
    }
}

/// Variables visible to custom join constraints.
fn request_context(request: &ActivationRequest) -> EvaluationContext {
    let mut context = EvaluationContext::new();
    context.set_text("subject.email", request.principal().email());
    context.set_text("group.environment", request.group_id().environment());
    context.set_text("group.system", request.group_id().system());
    context.set_text("group.name", request.group_id().name());
    context.set_int(
        "request.duration_minutes",
        request.duration().num_minutes(),
    );
    context.set_text("request.justification", request.justification());
    context
}

/// Missing nodes and denied nodes are deliberately indistinguishable so
/// existence does not leak.
fn entitlement_denied(group_id: &JitGroupId) -> AppError {
    AppError::AccessDenied(format!(
        "entitlement '{group_id}' does not exist or is not accessible"
    ))
}
