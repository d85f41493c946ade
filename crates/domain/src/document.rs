use std::collections::BTreeSet;
use std::str::FromStr;

use elevia_core::{AppError, AppResult, PolicyIssue};
use serde::{Deserialize, Serialize};

use crate::constraints::{
    ApprovalBounds, Constraints, DurationBounds, parse_iso8601_duration,
};
use crate::group_id::JitGroupId;
use crate::policy::{
    AccessControlList, AccessRight, AccessRights, AclEntry, Effect, GroupPolicy, Policy,
    Privilege, SystemPolicy,
};
use crate::principal::PrincipalId;

/// Structured policy document as consumed from storage.
///
/// Loading and parsing the raw bytes is an adapter concern; this module owns
/// the structural validation that turns the document into an immutable
/// [`Policy`], collecting every violation before failing so policy authors
/// see all problems in one pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDocument {
    /// Environment the document declares groups for.
    pub environment: String,
    /// Declared systems.
    #[serde(default)]
    pub systems: Vec<SystemDocument>,
}

/// One system in a policy document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemDocument {
    /// System name.
    pub name: String,
    /// Optional human-readable description.
    #[serde(default)]
    pub description: String,
    /// Declared groups.
    #[serde(default)]
    pub groups: Vec<GroupDocument>,
}

/// One group in a policy document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupDocument {
    /// Group name.
    pub name: String,
    /// Optional human-readable description.
    #[serde(default)]
    pub description: String,
    /// Access-control entries.
    #[serde(default)]
    pub access: Vec<AccessEntryDocument>,
    /// Declared constraints.
    #[serde(default)]
    pub constraints: ConstraintsDocument,
    /// Privileges granted upon provisioning.
    #[serde(default)]
    pub privileges: Vec<PrivilegeDocument>,
}

/// One access entry in a policy document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessEntryDocument {
    /// Principal in `user:<email>` or `group:<email>` syntax.
    pub principal: String,
    /// `allow` or `deny`.
    pub effect: String,
    /// `join`/`request`, `approve_self`, or `approve_others`.
    pub action: String,
}

/// Constraints section of a group document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConstraintsDocument {
    /// Activation duration bounds as ISO-8601 durations.
    #[serde(default)]
    pub activation_duration: Option<ActivationDurationDocument>,
    /// Peer-notification bounds.
    #[serde(default)]
    pub approval: Option<ApprovalDocument>,
    /// Custom boolean expressions evaluated at join time.
    #[serde(default)]
    pub expressions: Vec<String>,
}

/// Activation duration bounds as declared in a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivationDurationDocument {
    /// Minimum activation duration.
    pub min: String,
    /// Default activation duration.
    pub default: String,
    /// Maximum activation duration.
    pub max: String,
}

/// Peer-notification bounds as declared in a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalDocument {
    /// Minimum number of peers to notify.
    pub minimum_peers_to_notify: u32,
    /// Maximum number of peers to notify.
    pub maximum_peers_to_notify: u32,
}

/// One privilege in a policy document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivilegeDocument {
    /// Target resource.
    pub resource: String,
    /// Granted role.
    pub role: String,
    /// Optional binding condition.
    #[serde(default)]
    pub condition: Option<String>,
}

impl PolicyDocument {
    /// Validates the document and builds an immutable policy snapshot.
    ///
    /// `fallback_duration` applies to groups that declare no activation
    /// duration bounds. Every violation found is collected and surfaced
    /// together as [`AppError::Policy`].
    pub fn to_policy(&self, fallback_duration: DurationBounds) -> AppResult<Policy> {
        let mut issues = Vec::new();
        let mut systems = Vec::new();

        if self.environment.trim().is_empty() {
            issues.push(PolicyIssue::new(
                "blank-environment",
                "<document>",
                "environment name must not be blank",
            ));
        }
        if self.systems.is_empty() {
            issues.push(PolicyIssue::new(
                "empty-systems",
                self.environment.as_str(),
                "policy declares no systems",
            ));
        }

        let mut seen_systems = BTreeSet::new();
        for system in &self.systems {
            let location = format!("{}/{}", self.environment, system.name);
            if !seen_systems.insert(system.name.to_ascii_lowercase()) {
                issues.push(PolicyIssue::new(
                    "duplicate-system",
                    location.as_str(),
                    format!("system '{}' is declared more than once", system.name),
                ));
                continue;
            }

            systems.push(self.build_system(system, fallback_duration, &mut issues));
        }

        if issues.is_empty() {
            Ok(Policy::new(self.environment.to_ascii_lowercase(), systems))
        } else {
            Err(AppError::Policy(issues))
        }
    }

    fn build_system(
        &self,
        system: &SystemDocument,
        fallback_duration: DurationBounds,
        issues: &mut Vec<PolicyIssue>,
    ) -> SystemPolicy {
        let location = format!("{}/{}", self.environment, system.name);

        if system.groups.is_empty() {
            issues.push(PolicyIssue::new(
                "empty-groups",
                location.as_str(),
                format!("system '{}' declares no groups", system.name),
            ));
        }

        let mut groups = Vec::new();
        let mut seen_groups = BTreeSet::new();
        for group in &system.groups {
            let group_location = format!("{location}/{}", group.name);
            if !seen_groups.insert(group.name.to_ascii_lowercase()) {
                issues.push(PolicyIssue::new(
                    "duplicate-group",
                    group_location.as_str(),
                    format!("group '{}' is declared more than once", group.name),
                ));
                continue;
            }

            let id = match JitGroupId::new(
                self.environment.as_str(),
                system.name.as_str(),
                group.name.as_str(),
            ) {
                Ok(id) => id,
                Err(error) => {
                    issues.push(PolicyIssue::new(
                        "invalid-group-id",
                        group_location.as_str(),
                        error.to_string(),
                    ));
                    continue;
                }
            };

            let acl = build_acl(group, &group_location, issues);
            let constraints =
                build_constraints(group, &group_location, fallback_duration, issues);
            let privileges = build_privileges(group, &group_location, issues);

            groups.push(GroupPolicy::new(
                id,
                group.description.as_str(),
                acl,
                constraints,
                privileges,
            ));
        }

        SystemPolicy::new(
            system.name.to_ascii_lowercase(),
            system.description.as_str(),
            groups,
        )
    }
}

fn build_acl(
    group: &GroupDocument,
    location: &str,
    issues: &mut Vec<PolicyIssue>,
) -> AccessControlList {
    if group.access.is_empty() {
        issues.push(PolicyIssue::new(
            "empty-acl",
            location,
            format!("group '{}' declares no access entries", group.name),
        ));
    }

    let mut entries = Vec::new();
    for (index, entry) in group.access.iter().enumerate() {
        let entry_location = format!("{location}/access[{index}]");

        let principal = match PrincipalId::from_str(entry.principal.as_str()) {
            Ok(principal) => principal,
            Err(_) => {
                issues.push(PolicyIssue::new(
                    "invalid-principal",
                    entry_location.as_str(),
                    format!(
                        "principal '{}' must use 'user:<email>' or 'group:<email>' syntax",
                        entry.principal
                    ),
                ));
                continue;
            }
        };

        let effect = match Effect::from_str(entry.effect.as_str()) {
            Ok(effect) => effect,
            Err(_) => {
                issues.push(PolicyIssue::new(
                    "unknown-effect",
                    entry_location.as_str(),
                    format!("effect '{}' must be 'allow' or 'deny'", entry.effect),
                ));
                continue;
            }
        };

        let right = match AccessRight::from_str(entry.action.as_str()) {
            Ok(right) => right,
            Err(_) => {
                issues.push(PolicyIssue::new(
                    "unknown-action",
                    entry_location.as_str(),
                    format!(
                        "action '{}' must be 'join', 'approve_self', or 'approve_others'",
                        entry.action
                    ),
                ));
                continue;
            }
        };

        entries.push(AclEntry::new(principal, effect, AccessRights::of(right)));
    }

    AccessControlList::new(entries)
}

fn build_constraints(
    group: &GroupDocument,
    location: &str,
    fallback_duration: DurationBounds,
    issues: &mut Vec<PolicyIssue>,
) -> Constraints {
    let duration = match &group.constraints.activation_duration {
        None => fallback_duration,
        Some(declared) => {
            let mut parse = |label: &str, text: &str| match parse_iso8601_duration(text) {
                Ok(duration) => Some(duration),
                Err(_) => {
                    issues.push(PolicyIssue::new(
                        "invalid-duration",
                        format!("{location}/constraints/activation_duration/{label}"),
                        format!("'{text}' is not a valid ISO-8601 duration"),
                    ));
                    None
                }
            };

            let min = parse("min", declared.min.as_str());
            let default = parse("default", declared.default.as_str());
            let max = parse("max", declared.max.as_str());

            match (min, default, max) {
                (Some(min), Some(default), Some(max)) => {
                    match DurationBounds::new(min, default, max) {
                        Ok(bounds) => bounds,
                        Err(error) => {
                            issues.push(PolicyIssue::new(
                                "inconsistent-duration-bounds",
                                format!("{location}/constraints/activation_duration"),
                                error.to_string(),
                            ));
                            fallback_duration
                        }
                    }
                }
                _ => fallback_duration,
            }
        }
    };

    let approval = match &group.constraints.approval {
        None => ApprovalBounds::default(),
        Some(declared) => match ApprovalBounds::new(
            declared.minimum_peers_to_notify,
            declared.maximum_peers_to_notify,
        ) {
            Ok(bounds) => bounds,
            Err(error) => {
                issues.push(PolicyIssue::new(
                    "invalid-approval-bounds",
                    format!("{location}/constraints/approval"),
                    error.to_string(),
                ));
                ApprovalBounds::default()
            }
        },
    };

    Constraints::new(
        duration,
        approval,
        group.constraints.expressions.clone(),
    )
}

fn build_privileges(
    group: &GroupDocument,
    location: &str,
    issues: &mut Vec<PolicyIssue>,
) -> Vec<Privilege> {
    let mut privileges = Vec::new();
    for (index, privilege) in group.privileges.iter().enumerate() {
        let entry_location = format!("{location}/privileges[{index}]");
        if privilege.resource.trim().is_empty() {
            issues.push(PolicyIssue::new(
                "blank-privilege-resource",
                entry_location.as_str(),
                "privilege resource must not be blank",
            ));
            continue;
        }
        if privilege.role.trim().is_empty() {
            issues.push(PolicyIssue::new(
                "blank-privilege-role",
                entry_location.as_str(),
                "privilege role must not be blank",
            ));
            continue;
        }

        privileges.push(Privilege::new(
            privilege.resource.trim(),
            privilege.role.trim(),
            privilege.condition.clone(),
        ));
    }

    privileges
}
