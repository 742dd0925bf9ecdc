use crate::credentials::Credentials;
use crate::error::CoreError;
use async_trait::async_trait;
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type HandlerError = Box<dyn Error + Send + Sync>;

/// One action handler. Handlers report business failures as
/// [`StepOutcome::Failure`]; an `Err` is an unexpected fault and is
/// converted to a structured failure at the execution wrapper, so either
/// signaling style is safe to use internally.
#[async_trait]
pub trait StepHandler: Send + Sync {
    async fn execute(
        &self,
        input: &StepInput,
        credentials: &Credentials,
    ) -> Result<StepOutcome, HandlerError>;
}

/// Uniform input envelope for every action invocation: the action's config
/// field values, plus the integration instance whose credentials the
/// wrapper should resolve. An absent `integration_id` means "no credentials
/// required/available" and the handler receives an empty credential map.
#[derive(Serialize, Deserialize, Default, Clone, Debug)]
pub struct StepInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integration_id: Option<Uuid>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl StepInput {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { integration_id: None, fields }
    }

    pub fn with_integration(mut self, integration_id: Uuid) -> Self {
        self.integration_id = Some(integration_id);
        self
    }

    /// String value of one config field. Non-string values and absent
    /// fields both read as `None`.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Deserializes the config fields into the handler's own input type.
    pub fn parse<T>(&self) -> Result<T, CoreError>
    where
        T: for<'de> Deserialize<'de>,
    {
        T::deserialize(Value::Object(self.fields.clone())).map_err(CoreError::InvalidInput)
    }

    /// View of the input safe to log: field keys only, never values, never
    /// credentials.
    pub fn redacted(&self) -> RedactedInput {
        RedactedInput {
            field_keys: self.fields.keys().cloned().collect(),
            has_integration: self.integration_id.is_some(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedactedInput {
    pub field_keys: Vec<String>,
    pub has_integration: bool,
}

impl Display for RedactedInput {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "fields=[{}] integration={}",
            self.field_keys.join(","),
            self.has_integration
        )
    }
}

/// Discriminated result of one action invocation. On the wire this is
/// `{"success": true, ...fields}` or `{"success": false, "error": "..."}`;
/// every handler must produce exactly this shape and the wrapper never
/// edits a handler's own payload.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Success(Map<String, Value>),
    Failure(String),
}

impl StepOutcome {
    pub fn success(fields: Map<String, Value>) -> Self {
        StepOutcome::Success(fields)
    }

    /// Builds a success outcome from any serializable value. Fails if the
    /// value does not serialize to a JSON object.
    pub fn success_from<T: Serialize>(value: &T) -> Result<Self, HandlerError> {
        match serde_json::to_value(value)? {
            Value::Object(fields) => Ok(StepOutcome::Success(fields)),
            other => Err(format!("step output must be a JSON object, got {other}").into()),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        StepOutcome::Failure(error.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StepOutcome::Success(_))
    }
}

impl Serialize for StepOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            StepOutcome::Success(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len() + 1))?;
                map.serialize_entry("success", &true)?;
                for (key, value) in fields {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            StepOutcome::Failure(error) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("success", &false)?;
                map.serialize_entry("error", error)?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for StepOutcome {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OutcomeVisitor;

        impl<'de> Visitor<'de> for OutcomeVisitor {
            type Value = StepOutcome;

            fn expecting(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                f.write_str("a map with a boolean `success` discriminant")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut success: Option<bool> = None;
                let mut fields = Map::new();

                while let Some(key) = access.next_key::<String>()? {
                    if key == "success" {
                        success = Some(access.next_value()?);
                    } else {
                        fields.insert(key, access.next_value()?);
                    }
                }

                match success {
                    Some(true) => Ok(StepOutcome::Success(fields)),
                    Some(false) => {
                        let error = fields
                            .get("error")
                            .and_then(Value::as_str)
                            .ok_or_else(|| de::Error::missing_field("error"))?;
                        Ok(StepOutcome::Failure(error.to_owned()))
                    }
                    None => Err(de::Error::missing_field("success")),
                }
            }
        }

        deserializer.deserialize_map(OutcomeVisitor)
    }
}
