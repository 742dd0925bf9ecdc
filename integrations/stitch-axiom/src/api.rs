use reqwest::{Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

const AXIOM_API_URL: &str = "https://api.axiom.co";

#[derive(Error, Debug)]
pub enum AxiomError {
    #[error("{0}")]
    Request(#[from] reqwest::Error),
    #[error("{message}")]
    Api { status: u16, message: String },
}

#[derive(Deserialize, Debug)]
struct ApiErrorBody {
    message: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct AxiomUser {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub apl: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    #[serde(default)]
    pub matches: Vec<Value>,
    pub status: Value,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub ingested: u64,
    pub failed: u64,
    #[serde(default)]
    pub failures: Vec<IngestFailure>,
    pub processed_bytes: u64,
}

#[derive(Deserialize, Debug)]
pub struct IngestFailure {
    pub timestamp: Option<String>,
    pub error: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationRequest {
    pub datasets: Vec<String>,
    pub r#type: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationResponse {
    pub id: String,
    pub time: String,
    #[serde(default)]
    pub datasets: Vec<String>,
}

#[derive(Deserialize, Debug)]
pub struct Dataset {
    pub name: String,
    pub description: Option<String>,
}

/// Thin client for the Axiom HTTP API.
pub struct AxiomApi {
    client: reqwest::Client,
    token: String,
    org_id: Option<String>,
}

impl AxiomApi {
    pub fn new(token: impl Into<String>, org_id: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            token: token.into(),
            org_id,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{AXIOM_API_URL}{path}"))
            .bearer_auth(&self.token);
        // Required for personal tokens.
        if let Some(org_id) = &self.org_id {
            builder = builder.header("X-Axiom-Org-Id", org_id);
        }
        builder
    }

    async fn check(response: Response) -> Result<Response, AxiomError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&text)
            .ok()
            .and_then(|body| body.message)
            .unwrap_or_else(|| {
                if text.is_empty() {
                    format!("HTTP {}", status.as_u16())
                } else {
                    text
                }
            });
        Err(AxiomError::Api { status: status.as_u16(), message })
    }

    pub async fn current_user(&self) -> Result<AxiomUser, AxiomError> {
        let response = self.request(Method::GET, "/v1/user").send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn query(&self, request: &QueryRequest) -> Result<QueryResponse, AxiomError> {
        let response = self
            .request(Method::POST, "/v1/datasets/_apl")
            .json(request)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn ingest(&self, dataset: &str, events: &[Value]) -> Result<IngestResponse, AxiomError> {
        let path = format!("/v1/datasets/{dataset}/ingest");
        let response = self.request(Method::POST, &path).json(&events).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn create_annotation(
        &self,
        request: &AnnotationRequest,
    ) -> Result<AnnotationResponse, AxiomError> {
        let response = self
            .request(Method::POST, "/v2/annotations")
            .json(request)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn datasets(&self) -> Result<Vec<Dataset>, AxiomError> {
        let response = self.request(Method::GET, "/v1/datasets").send().await?;
        Ok(Self::check(response).await?.json().await?)
    }
}
