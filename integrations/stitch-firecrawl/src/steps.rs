use crate::api::{FirecrawlApi, ScrapeRequest, SearchRequest};
use crate::API_KEY_MISSING;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use stitch_core::credentials::Credentials;
use stitch_core::step::{HandlerError, StepHandler, StepInput, StepOutcome};

fn api_for(credentials: &Credentials) -> Option<FirecrawlApi> {
    credentials.get("FIRECRAWL_API_KEY").map(FirecrawlApi::new)
}

/// Scrapes content from a URL.
pub struct Scrape;

#[derive(Deserialize)]
struct ScrapeInput {
    url: String,
    formats: Option<String>,
}

#[async_trait]
impl StepHandler for Scrape {
    async fn execute(
        &self,
        input: &StepInput,
        credentials: &Credentials,
    ) -> Result<StepOutcome, HandlerError> {
        let Some(api) = api_for(credentials) else {
            return Ok(StepOutcome::failure(API_KEY_MISSING));
        };
        let step: ScrapeInput = input.parse()?;

        let formats: Vec<String> = step
            .formats
            .as_deref()
            .unwrap_or("markdown")
            .split(',')
            .map(str::trim)
            .filter(|format| !format.is_empty())
            .map(str::to_owned)
            .collect();

        let result = api
            .scrape(&ScrapeRequest { url: step.url, formats })
            .await
            .map_err(|fault| format!("Failed to scrape: {fault}"))?;

        StepOutcome::success_from(&json!({
            "markdown": result.markdown,
            "html": result.html,
            "links": result.links,
            "metadata": result.metadata,
        }))
        .map_err(Into::into)
    }
}

/// Searches the web.
pub struct Search;

#[derive(Deserialize)]
struct SearchInput {
    query: String,
    limit: Option<String>,
}

#[async_trait]
impl StepHandler for Search {
    async fn execute(
        &self,
        input: &StepInput,
        credentials: &Credentials,
    ) -> Result<StepOutcome, HandlerError> {
        let Some(api) = api_for(credentials) else {
            return Ok(StepOutcome::failure(API_KEY_MISSING));
        };
        let step: SearchInput = input.parse()?;

        // The limit arrives as template-expanded text.
        let limit = match step.limit.as_deref().filter(|limit| !limit.is_empty()) {
            None => None,
            Some(limit) => match limit.parse::<u32>() {
                Ok(limit) => Some(limit),
                Err(_) => {
                    return Ok(StepOutcome::failure(format!(
                        "Result limit must be a number, got: {limit}"
                    )));
                }
            },
        };

        let result = api
            .search(&SearchRequest { query: step.query, limit })
            .await
            .map_err(|fault| format!("Failed to search: {fault}"))?;

        StepOutcome::success_from(&json!({
            "web": result.web,
            "count": result.web.len(),
        }))
        .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_api_key_is_a_business_failure() {
        let input = StepInput::new(
            json!({"url": "https://example.com"}).as_object().unwrap().clone(),
        );
        let outcome = Scrape.execute(&input, &Credentials::new()).await.unwrap();
        assert_eq!(outcome, StepOutcome::failure(API_KEY_MISSING));
    }

    #[tokio::test]
    async fn non_numeric_limit_is_rejected_before_any_request() {
        let mut credentials = Credentials::new();
        credentials.insert("FIRECRAWL_API_KEY", "fc-test");

        let input = StepInput::new(
            json!({"query": "rust workflows", "limit": "lots"}).as_object().unwrap().clone(),
        );
        let outcome = Search.execute(&input, &credentials).await.unwrap();
        assert!(matches!(outcome, StepOutcome::Failure(error) if error.contains("must be a number")));
    }
}
