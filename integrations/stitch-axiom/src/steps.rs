use crate::api::{AnnotationRequest, AxiomApi, AxiomError, QueryRequest};
use crate::AxiomCredentials;
use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use stitch_core::credentials::Credentials;
use stitch_core::step::{HandlerError, StepHandler, StepInput, StepOutcome};

const TOKEN_MISSING: &str =
    "AXIOM_TOKEN is not configured. Please add it in Project Integrations.";

/// Resolves `now` / relative bounds like `-1h`, `-30m`, `-7d`, `-2w` to
/// RFC 3339 timestamps; anything else is passed through as given.
fn parse_time_bound(value: &str, now: DateTime<Utc>) -> String {
    let rfc3339 = |at: DateTime<Utc>| at.to_rfc3339_opts(SecondsFormat::Secs, true);

    if value.is_empty() || value == "now" {
        return rfc3339(now);
    }

    if let Some(rest) = value.strip_prefix('-') {
        if let Some(unit) = rest.chars().last() {
            if let Ok(amount) = rest[..rest.len() - unit.len_utf8()].parse::<i64>() {
                let delta = match unit {
                    'm' => Duration::minutes(amount),
                    'h' => Duration::hours(amount),
                    'd' => Duration::days(amount),
                    'w' => Duration::weeks(amount),
                    _ => return value.to_owned(),
                };
                return rfc3339(now - delta);
            }
        }
    }

    value.to_owned()
}

/// Runs an APL query against an Axiom dataset.
pub struct QueryLogs;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryLogsInput {
    apl: String,
    start_time: Option<String>,
    end_time: Option<String>,
}

#[async_trait]
impl StepHandler for QueryLogs {
    async fn execute(
        &self,
        input: &StepInput,
        credentials: &Credentials,
    ) -> Result<StepOutcome, HandlerError> {
        let Some(api) = AxiomCredentials::from(credentials).into_api() else {
            return Ok(StepOutcome::failure(TOKEN_MISSING));
        };
        let step: QueryLogsInput = input.parse()?;

        let now = Utc::now();
        let request = QueryRequest {
            apl: step.apl,
            start_time: step.start_time.map(|bound| parse_time_bound(&bound, now)),
            end_time: step.end_time.map(|bound| parse_time_bound(&bound, now)),
        };

        match api.query(&request).await {
            Ok(result) => StepOutcome::success_from(&json!({
                "matches": result.matches,
                "count": result.matches.len(),
                "status": result.status,
            }))
            .map_err(Into::into),
            Err(AxiomError::Api { message, .. }) => {
                Ok(StepOutcome::failure(format!("Query failed: {message}")))
            }
            Err(fault) => Err(fault.into()),
        }
    }
}

/// Sends log events to an Axiom dataset.
pub struct IngestEvents;

#[derive(Deserialize)]
struct IngestEventsInput {
    dataset: String,
    events: String,
}

#[async_trait]
impl StepHandler for IngestEvents {
    async fn execute(
        &self,
        input: &StepInput,
        credentials: &Credentials,
    ) -> Result<StepOutcome, HandlerError> {
        let Some(api) = AxiomCredentials::from(credentials).into_api() else {
            return Ok(StepOutcome::failure(TOKEN_MISSING));
        };
        let step: IngestEventsInput = input.parse()?;

        // The events field arrives as text, possibly produced by the
        // templating engine. Accept a single object or an array.
        let events: Vec<Value> = match serde_json::from_str::<Value>(&step.events) {
            Ok(Value::Array(events)) => events,
            Ok(event @ Value::Object(_)) => vec![event],
            _ => {
                return Ok(StepOutcome::failure(
                    "Invalid JSON in events field. Expected an array of objects or a single object.",
                ));
            }
        };
        if events.is_empty() {
            return Ok(StepOutcome::failure("No events to ingest. Events array is empty."));
        }

        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let events: Vec<Value> = events
            .into_iter()
            .map(|mut event| {
                if let Value::Object(fields) = &mut event {
                    if !fields.contains_key("_time") && !fields.contains_key("timestamp") {
                        fields.insert("_time".into(), Value::String(now.clone()));
                    }
                }
                event
            })
            .collect();

        match api.ingest(&step.dataset, &events).await {
            Ok(result) => {
                if result.failed > 0 {
                    if let Some(failure) = result.failures.first() {
                        return Ok(StepOutcome::failure(format!(
                            "Ingest partially failed: {}",
                            failure.error
                        )));
                    }
                }
                StepOutcome::success_from(&json!({
                    "ingested": result.ingested,
                    "failed": result.failed,
                    "processedBytes": result.processed_bytes,
                }))
                .map_err(Into::into)
            }
            Err(AxiomError::Api { message, .. }) => {
                Ok(StepOutcome::failure(format!("Ingest failed: {message}")))
            }
            Err(fault) => Err(fault.into()),
        }
    }
}

/// Creates an annotation marking a deployment, incident or other event.
pub struct CreateAnnotation;

#[derive(Deserialize)]
struct CreateAnnotationInput {
    datasets: String,
    #[serde(default = "default_annotation_type")]
    r#type: String,
    title: String,
    description: Option<String>,
    url: Option<String>,
}

fn default_annotation_type() -> String {
    "deploy".to_owned()
}

#[async_trait]
impl StepHandler for CreateAnnotation {
    async fn execute(
        &self,
        input: &StepInput,
        credentials: &Credentials,
    ) -> Result<StepOutcome, HandlerError> {
        let Some(api) = AxiomCredentials::from(credentials).into_api() else {
            return Ok(StepOutcome::failure(TOKEN_MISSING));
        };
        let step: CreateAnnotationInput = input.parse()?;

        let datasets: Vec<String> = step
            .datasets
            .split(',')
            .map(str::trim)
            .filter(|dataset| !dataset.is_empty())
            .map(str::to_owned)
            .collect();
        if datasets.is_empty() {
            return Ok(StepOutcome::failure("At least one dataset is required"));
        }

        let request = AnnotationRequest {
            datasets,
            r#type: step.r#type,
            title: step.title,
            description: step.description.filter(|text| !text.is_empty()),
            url: step.url.filter(|text| !text.is_empty()),
        };

        match api.create_annotation(&request).await {
            Ok(result) => StepOutcome::success_from(&json!({
                "id": result.id,
                "time": result.time,
                "datasets": result.datasets,
            }))
            .map_err(Into::into),
            Err(AxiomError::Api { message, .. }) => {
                Ok(StepOutcome::failure(format!("Failed to create annotation: {message}")))
            }
            Err(fault) => Err(fault.into()),
        }
    }
}

/// Lists the datasets available to the credential's organization.
pub struct ListDatasets;

#[async_trait]
impl StepHandler for ListDatasets {
    async fn execute(
        &self,
        _input: &StepInput,
        credentials: &Credentials,
    ) -> Result<StepOutcome, HandlerError> {
        let Some(api) = AxiomCredentials::from(credentials).into_api() else {
            return Ok(StepOutcome::failure(TOKEN_MISSING));
        };

        match api.datasets().await {
            Ok(datasets) => StepOutcome::success_from(&json!({
                "datasets": datasets
                    .iter()
                    .map(|dataset| json!({
                        "name": dataset.name,
                        "description": dataset.description,
                    }))
                    .collect::<Vec<_>>(),
                "count": datasets.len(),
            }))
            .map_err(Into::into),
            Err(AxiomError::Api { message, .. }) => {
                Ok(StepOutcome::failure(format!("Failed to list datasets: {message}")))
            }
            Err(fault) => Err(fault.into()),
        }
    }
}
