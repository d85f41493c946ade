use elevia_domain::ActivationType;

/// Marker predicate identifying self-approval eligible bindings in scanned
/// authorization policies.
const SELF_APPROVAL_MARKER: &str = "jitaccessconstraint";

/// Marker predicate identifying peer-approval eligible bindings.
const PEER_APPROVAL_MARKER: &str = "multipartyapprovalconstraint";

/// Classifies a scanned binding condition by its eligibility marker.
///
/// The two markers are distinct; a binding carrying the self-approval
/// marker activates as self-approval even when both are present. Bindings
/// without either marker are not JIT-eligible.
#[must_use]
pub fn classify_binding_condition(condition: Option<&str>) -> Option<ActivationType> {
    let condition = condition?.to_ascii_lowercase();

    if condition.contains(SELF_APPROVAL_MARKER) {
        return Some(ActivationType::SelfApproval);
    }
    if condition.contains(PEER_APPROVAL_MARKER) {
        return Some(ActivationType::PeerApproval);
    }

    None
}
