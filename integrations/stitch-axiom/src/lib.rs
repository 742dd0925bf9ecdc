use crate::api::{AxiomApi, AxiomError};
use async_trait::async_trait;
use std::sync::Arc;
use stitch_core::credentials::Credentials;
use stitch_core::descriptor::{
    ActionDescriptor, ConfigField, ConfigFieldKind, CredentialTest, FormField, FormFieldKind,
    OutputField, PluginDescriptor, SelectOption, TestOutcome,
};

pub mod api;
mod steps;

pub const TYPE: &str = "axiom";

pub(crate) struct AxiomCredentials {
    token: Option<String>,
    org_id: Option<String>,
}

impl From<&Credentials> for AxiomCredentials {
    fn from(credentials: &Credentials) -> Self {
        Self {
            token: credentials.get("AXIOM_TOKEN").map(str::to_owned),
            org_id: credentials.get("AXIOM_ORG_ID").map(str::to_owned),
        }
    }
}

impl AxiomCredentials {
    pub(crate) fn into_api(self) -> Option<AxiomApi> {
        self.token.map(|token| AxiomApi::new(token, self.org_id))
    }
}

/// Validates a credential set by fetching the token's own user.
struct AxiomTest;

#[async_trait]
impl CredentialTest for AxiomTest {
    async fn test(&self, credentials: &Credentials) -> TestOutcome {
        let Some(api) = AxiomCredentials::from(credentials).into_api() else {
            return TestOutcome::failed("AXIOM_TOKEN is required");
        };

        match api.current_user().await {
            Ok(_) => TestOutcome::ok(),
            Err(AxiomError::Api { status: 401, .. }) => TestOutcome::failed("Invalid API token"),
            Err(AxiomError::Api { status: 403, .. }) => {
                TestOutcome::failed("Access denied. Check your token permissions.")
            }
            Err(AxiomError::Api { message, .. }) => {
                TestOutcome::failed(format!("API error: {message}"))
            }
            Err(fault) => TestOutcome::failed(fault.to_string()),
        }
    }
}

pub fn descriptor() -> PluginDescriptor {
    PluginDescriptor {
        r#type: TYPE.into(),
        label: "Axiom".into(),
        description: "Query logs, ingest events, and create annotations in Axiom".into(),
        form_fields: vec![
            FormField::new("token", "API Token", FormFieldKind::Password, "AXIOM_TOKEN")
                .placeholder("xaat-...")
                .help_text("Get your API token from ")
                .help_link(
                    "app.axiom.co/settings/api-tokens",
                    "https://app.axiom.co/settings/api-tokens",
                ),
            FormField::new("orgId", "Organization ID", FormFieldKind::Text, "AXIOM_ORG_ID")
                .placeholder("my-org-123")
                .help_text("Required for personal tokens. Find it in your org settings."),
        ],
        test: Some(Arc::new(AxiomTest)),
        actions: vec![
            ActionDescriptor {
                slug: "query-logs".into(),
                label: "Query Logs".into(),
                description: "Run an APL query against an Axiom dataset".into(),
                category: "Axiom".into(),
                handler: Arc::new(steps::QueryLogs),
                config_fields: vec![
                    ConfigField::new("dataset", "Dataset", ConfigFieldKind::Template)
                        .placeholder("my-dataset")
                        .example("vercel")
                        .required(),
                    ConfigField::new("apl", "APL Query", ConfigFieldKind::TemplateTextarea)
                        .placeholder("['my-dataset'] | where level == 'error' | limit 100")
                        .example("['vercel'] | where level == 'error' | limit 10")
                        .required(),
                    ConfigField::new("startTime", "Start Time", ConfigFieldKind::Template)
                        .placeholder("2024-01-01T00:00:00Z or -1h")
                        .example("-1h"),
                    ConfigField::new("endTime", "End Time", ConfigFieldKind::Template)
                        .placeholder("2024-01-01T23:59:59Z or now")
                        .example("now"),
                ],
                output_fields: vec![
                    OutputField::new("matches", "Array of matching log entries"),
                    OutputField::new("count", "Number of results returned"),
                    OutputField::new("status.elapsedTime", "Query execution time"),
                ],
            },
            ActionDescriptor {
                slug: "ingest-events".into(),
                label: "Ingest Events".into(),
                description: "Send log events to an Axiom dataset".into(),
                category: "Axiom".into(),
                handler: Arc::new(steps::IngestEvents),
                config_fields: vec![
                    ConfigField::new("dataset", "Dataset", ConfigFieldKind::Template)
                        .placeholder("my-dataset")
                        .example("workflow-logs")
                        .required(),
                    ConfigField::new("events", "Events (JSON)", ConfigFieldKind::TemplateTextarea)
                        .placeholder(r#"[{"level": "info", "message": "Hello"}] or {{NodeName.data}}"#)
                        .example(r#"[{"level": "info", "message": "Workflow executed"}]"#)
                        .required(),
                ],
                output_fields: vec![
                    OutputField::new("ingested", "Number of events ingested"),
                    OutputField::new("processedBytes", "Bytes processed"),
                ],
            },
            ActionDescriptor {
                slug: "create-annotation".into(),
                label: "Create Annotation".into(),
                description: "Create an annotation to mark deployments, incidents, or events".into(),
                category: "Axiom".into(),
                handler: Arc::new(steps::CreateAnnotation),
                config_fields: vec![
                    ConfigField::new("datasets", "Datasets", ConfigFieldKind::Template)
                        .placeholder("dataset1,dataset2")
                        .example("vercel,api-logs")
                        .required(),
                    ConfigField::new(
                        "type",
                        "Type",
                        ConfigFieldKind::Select {
                            options: vec![
                                SelectOption::new("deploy", "Deployment"),
                                SelectOption::new("incident", "Incident"),
                                SelectOption::new("config-change", "Config Change"),
                                SelectOption::new("alert", "Alert"),
                                SelectOption::new("other", "Other"),
                            ],
                            default: Some("deploy".into()),
                        },
                    ),
                    ConfigField::new("title", "Title", ConfigFieldKind::Template)
                        .placeholder("Production deployment v1.2.3")
                        .example("Deployed v1.2.3")
                        .required(),
                    ConfigField::new("description", "Description", ConfigFieldKind::TemplateTextarea)
                        .placeholder("Additional details about this annotation")
                        .example("Deployed new feature: user authentication"),
                    ConfigField::new("url", "URL", ConfigFieldKind::Template)
                        .placeholder("https://github.com/org/repo/releases/tag/v1.2.3")
                        .example("https://github.com/myorg/myrepo/releases"),
                ],
                output_fields: vec![
                    OutputField::new("id", "Annotation ID"),
                    OutputField::new("time", "Annotation timestamp"),
                ],
            },
            ActionDescriptor {
                slug: "list-datasets".into(),
                label: "List Datasets".into(),
                description: "Get all available datasets in your Axiom organization".into(),
                category: "Axiom".into(),
                handler: Arc::new(steps::ListDatasets),
                config_fields: vec![],
                output_fields: vec![
                    OutputField::new("datasets", "Array of dataset objects"),
                    OutputField::new("count", "Number of datasets"),
                ],
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_is_valid() {
        descriptor().validate().unwrap();
    }

    #[tokio::test]
    async fn test_without_token_fails_fast() {
        let outcome = AxiomTest.test(&Credentials::new()).await;
        assert_eq!(outcome, TestOutcome::failed("AXIOM_TOKEN is required"));
    }
}
