use std::path::PathBuf;

use async_trait::async_trait;
use elevia_application::PolicyDocumentSource;
use elevia_core::{AppError, AppResult, PolicyIssue};
use elevia_domain::PolicyDocument;

/// Policy document source reading a YAML file from disk.
///
/// The file is re-read on every load; caching is the policy store's
/// concern. Malformed YAML is reported as a policy issue list, matching
/// how structural validation reports its findings.
pub struct YamlPolicySource {
    path: PathBuf,
}

impl YamlPolicySource {
    /// Creates a source reading from the given file path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Parses a YAML policy document from text.
    pub fn parse(text: &str, location: &str) -> AppResult<PolicyDocument> {
        serde_yaml::from_str(text).map_err(|error| {
            AppError::Policy(vec![PolicyIssue::new(
                "malformed-document",
                location,
                error.to_string(),
            )])
        })
    }
}

#[async_trait]
impl PolicyDocumentSource for YamlPolicySource {
    async fn load(&self) -> AppResult<PolicyDocument> {
        let location = self.path.display().to_string();
        let text = tokio::fs::read_to_string(self.path.as_path())
            .await
            .map_err(|error| {
                AppError::Transient(format!("failed to read policy file '{location}': {error}"))
            })?;

        Self::parse(text.as_str(), location.as_str())
    }
}

#[cfg(test)]
mod tests {
    use elevia_core::AppError;

    use super::YamlPolicySource;

    const SAMPLE: &str = r#"
environment: prod
systems:
  - name: network
    description: Network infrastructure
    groups:
      - name: admins
        description: Network admin JIT group
        access:
          - principal: user:alice@example.com
            effect: allow
            action: join
          - principal: user:alice@example.com
            effect: allow
            action: approve_self
        constraints:
          activation_duration:
            min: PT1M
            default: PT15M
            max: P1D
          approval:
            minimum_peers_to_notify: 1
            maximum_peers_to_notify: 5
          expressions:
            - request.duration_minutes <= 60
        privileges:
          - resource: projects/net-prod
            role: roles/compute.networkAdmin
"#;

    #[test]
    fn sample_document_parses() {
        let document = YamlPolicySource::parse(SAMPLE, "<test>");
        assert!(document.is_ok());
        let Ok(document) = document else {
            return;
        };

        assert_eq!(document.environment, "prod");
        assert_eq!(document.systems.len(), 1);
        assert_eq!(document.systems[0].groups.len(), 1);
        assert_eq!(document.systems[0].groups[0].access.len(), 2);
        assert_eq!(document.systems[0].groups[0].privileges.len(), 1);
    }

    #[test]
    fn malformed_yaml_reports_a_policy_issue() {
        let result = YamlPolicySource::parse("environment: [unclosed", "<test>");
        let Err(AppError::Policy(issues)) = result else {
            panic!("expected a policy issue list");
        };
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, "malformed-document");
    }

    #[tokio::test]
    async fn missing_file_is_a_transient_failure() {
        use elevia_application::PolicyDocumentSource;

        let source = YamlPolicySource::new("/nonexistent/policy.yaml");
        let result = source.load().await;
        assert!(matches!(result, Err(AppError::Transient(_))));
    }
}
