use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

const FIRECRAWL_API_URL: &str = "https://api.firecrawl.dev";

#[derive(Error, Debug)]
pub enum FirecrawlError {
    #[error("{0}")]
    Request(#[from] reqwest::Error),
    #[error("Firecrawl API returned error: {error}")]
    Api { error: String },
}

#[derive(Deserialize, Debug)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

impl<T> Envelope<T> {
    fn into_result(self) -> Result<T, FirecrawlError> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            (_, _) => Err(FirecrawlError::Api {
                error: self.error.unwrap_or_else(|| "empty response".to_owned()),
            }),
        }
    }
}

#[derive(Serialize, Debug)]
pub struct ScrapeRequest {
    pub url: String,
    pub formats: Vec<String>,
}

#[derive(Deserialize, Debug)]
pub struct ScrapeData {
    pub markdown: Option<String>,
    pub html: Option<String>,
    pub links: Option<Vec<String>>,
    pub metadata: Option<Value>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

#[derive(Deserialize, Debug)]
pub struct SearchData {
    #[serde(default)]
    pub web: Vec<Value>,
}

pub struct FirecrawlApi {
    client: reqwest::Client,
    api_key: String,
}

impl FirecrawlApi {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
        }
    }

    pub async fn scrape(&self, request: &ScrapeRequest) -> Result<ScrapeData, FirecrawlError> {
        let envelope = self
            .client
            .post(format!("{FIRECRAWL_API_URL}/v2/scrape"))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?
            .json::<Envelope<ScrapeData>>()
            .await?;
        envelope.into_result()
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<SearchData, FirecrawlError> {
        let envelope = self
            .client
            .post(format!("{FIRECRAWL_API_URL}/v2/search"))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?
            .json::<Envelope<SearchData>>()
            .await?;
        envelope.into_result()
    }
}
