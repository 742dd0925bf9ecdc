use crate::credentials::Credentials;
use crate::error::CoreError;
use crate::step::StepHandler;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Static declaration of one integration type: display metadata, credential
/// form fields, an optional connection test, and the actions it exposes.
///
/// The `type` value is the stable identity; it must never change once
/// published, since workflow nodes reference actions as `(type, slug)`.
pub struct PluginDescriptor {
    pub r#type: String,
    pub label: String,
    pub description: String,
    pub form_fields: Vec<FormField>,
    pub test: Option<Arc<dyn CredentialTest>>,
    pub actions: Vec<ActionDescriptor>,
}

impl Debug for PluginDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("type", &self.r#type)
            .field("label", &self.label)
            .field("actions", &self.actions.iter().map(|a| &a.slug).collect::<Vec<_>>())
            .finish()
    }
}

impl PluginDescriptor {
    pub fn action(&self, slug: &str) -> Option<&ActionDescriptor> {
        self.actions.iter().find(|action| action.slug == slug)
    }

    /// Structural validation, run once at registration time.
    pub fn validate(&self) -> Result<(), CoreError> {
        let invalid = |reason: String| Err(CoreError::InvalidDescriptor(reason));

        if self.r#type.is_empty() {
            return invalid("empty plugin type".into());
        }
        if self.label.is_empty() {
            return invalid(format!("{}: empty label", self.r#type));
        }

        let mut field_ids = HashSet::new();
        for field in &self.form_fields {
            if !field_ids.insert(field.id.as_str()) {
                return invalid(format!("{}: duplicate form field id {}", self.r#type, field.id));
            }
            if field.config_key.is_empty() {
                return invalid(format!("{}: form field {} has no config key", self.r#type, field.id));
            }
            if let FormFieldKind::Select(options) = &field.kind {
                if options.is_empty() {
                    return invalid(format!("{}: select field {} has no options", self.r#type, field.id));
                }
            }
        }

        let mut slugs = HashSet::new();
        for action in &self.actions {
            if action.slug.is_empty() {
                return invalid(format!("{}: empty action slug", self.r#type));
            }
            if !slugs.insert(action.slug.as_str()) {
                return invalid(format!("{}: duplicate action slug {}", self.r#type, action.slug));
            }
            for field in &action.config_fields {
                if let ConfigFieldKind::Select { options, default } = &field.kind {
                    if options.is_empty() {
                        return invalid(format!(
                            "{}/{}: select field {} has no options",
                            self.r#type, action.slug, field.key
                        ));
                    }
                    if let Some(default) = default {
                        if !options.iter().any(|option| &option.value == default) {
                            return invalid(format!(
                                "{}/{}: select field {} defaults to undeclared option {default}",
                                self.r#type, action.slug, field.key
                            ));
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

/// One invocable capability of a plugin. `(plugin type, slug)` is the stable
/// identifier a workflow node references.
pub struct ActionDescriptor {
    pub slug: String,
    pub label: String,
    pub description: String,
    /// Display grouping only, not semantically load-bearing.
    pub category: String,
    pub handler: Arc<dyn StepHandler>,
    pub config_fields: Vec<ConfigField>,
    /// Documentation of the fields a successful result is expected to carry.
    pub output_fields: Vec<OutputField>,
}

impl Debug for ActionDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionDescriptor")
            .field("slug", &self.slug)
            .field("label", &self.label)
            .finish()
    }
}

/// Validates a freshly entered credential set without executing a real
/// action.
#[async_trait]
pub trait CredentialTest: Send + Sync {
    async fn test(&self, credentials: &Credentials) -> TestOutcome;
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TestOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TestOutcome {
    pub fn ok() -> Self {
        Self { success: true, error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self { success: false, error: Some(error.into()) }
    }
}

/// Credential-input field shown when creating or editing an integration.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FormField {
    pub id: String,
    pub label: String,
    pub kind: FormFieldKind,
    /// Key the entered value is stored under in the credential payload.
    pub config_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help_link: Option<HelpLink>,
}

impl FormField {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        kind: FormFieldKind,
        config_key: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind,
            config_key: config_key.into(),
            placeholder: None,
            help_text: None,
            help_link: None,
        }
    }

    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn help_text(mut self, help_text: impl Into<String>) -> Self {
        self.help_text = Some(help_text.into());
        self
    }

    pub fn help_link(mut self, text: impl Into<String>, url: impl Into<String>) -> Self {
        self.help_link = Some(HelpLink { text: text.into(), url: url.into() });
        self
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "snake_case")]
pub enum FormFieldKind {
    Text,
    Password,
    Select(Vec<SelectOption>),
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HelpLink {
    pub text: String,
    pub url: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

impl SelectOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self { value: value.into(), label: label.into() }
    }
}

/// Configuration field of one action, filled per workflow node.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ConfigField {
    pub key: String,
    pub label: String,
    pub kind: ConfigFieldKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
    #[serde(default)]
    pub required: bool,
}

impl ConfigField {
    pub fn new(key: impl Into<String>, label: impl Into<String>, kind: ConfigFieldKind) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            kind,
            placeholder: None,
            example: None,
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn example(mut self, example: impl Into<String>) -> Self {
        self.example = Some(example.into());
        self
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "snake_case")]
pub enum ConfigFieldKind {
    Text,
    Textarea,
    /// May contain placeholder expressions resolved by the external
    /// templating engine before the step runs.
    Template,
    TemplateTextarea,
    Select {
        options: Vec<SelectOption>,
        default: Option<String>,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OutputField {
    pub field: String,
    pub description: String,
}

impl OutputField {
    pub fn new(field: impl Into<String>, description: impl Into<String>) -> Self {
        Self { field: field.into(), description: description.into() }
    }
}
