use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

#[derive(Debug)]
pub enum CoreError {
    PluginNotFound(String),
    ActionNotFound { plugin: String, slug: String },
    DuplicatePlugin(String),
    InvalidDescriptor(String),
    UnknownIntegrationType(String),
    IntegrationNotFound(Uuid),
    StoreUnavailable(Box<dyn Error + Send + Sync>),
    InvalidInput(serde_json::Error),
}

impl Display for CoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CoreError::PluginNotFound(plugin) => {
                write!(f, "plugin not registered: {plugin}")
            }
            CoreError::ActionNotFound { plugin, slug } => {
                write!(f, "plugin {plugin} has no action {slug}")
            }
            CoreError::DuplicatePlugin(plugin) => {
                write!(f, "plugin type already registered: {plugin}")
            }
            CoreError::InvalidDescriptor(reason) => {
                write!(f, "invalid plugin descriptor: {reason}")
            }
            CoreError::UnknownIntegrationType(r#type) => {
                write!(f, "unknown integration type: {}", r#type)
            }
            CoreError::IntegrationNotFound(id) => {
                write!(f, "integration not found: {id}")
            }
            CoreError::StoreUnavailable(source) => {
                write!(f, "integration store unavailable: {source}")
            }
            CoreError::InvalidInput(source) => {
                write!(f, "invalid step input: {source}")
            }
        }
    }
}

impl Error for CoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CoreError::StoreUnavailable(source) => Some(source.as_ref()),
            CoreError::InvalidInput(source) => Some(source),
            _ => None,
        }
    }
}
