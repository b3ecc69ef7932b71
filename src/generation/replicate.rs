use super::{assemble_output, build_prompt, DescriptionGenerator, GenerationError};
use crate::config::GenerationConfig;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

/// Client for a Replicate-compatible predictions API.
///
/// One call creates a prediction with `Prefer: wait`; if the service answers before the
/// prediction finished, its `urls.get` link is polled until a terminal status. The whole
/// attempt is bounded by `timeout_secs` and is never retried.
#[derive(Clone)]
pub struct ReplicateGenerator {
    client: reqwest::Client,
    config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct CreatePrediction<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<&'a str>,
    input: PredictionInput<'a>,
}

#[derive(Debug, Serialize)]
struct PredictionInput<'a> {
    prompt: &'a str,
    max_new_tokens: u32,
    min_new_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum PredictionStatus {
    #[default]
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PredictionOutput {
    Fragments(Vec<Option<String>>),
    Text(String),
}

#[derive(Debug, Default, Deserialize)]
struct PredictionUrls {
    get: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    status: PredictionStatus,
    #[serde(default)]
    output: Option<PredictionOutput>,
    #[serde(default)]
    error: Option<serde_json::Value>,
    #[serde(default)]
    urls: PredictionUrls,
}

impl ReplicateGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("product-copy-api/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: reqwest::Client, config: &GenerationConfig) -> Self {
        Self {
            client,
            config: config.clone(),
        }
    }

    /// Versioned models (`owner/name:version`) go through the generic predictions
    /// endpoint; bare `owner/name` uses the model-scoped one.
    fn create_url(&self) -> (String, Option<&str>) {
        let base = self.config.base_url.trim_end_matches('/');
        match self.config.model.split_once(':') {
            Some((_, version)) => (format!("{}/predictions", base), Some(version)),
            None => (
                format!("{}/models/{}/predictions", base, self.config.model),
                None,
            ),
        }
    }

    /// The bearer token is only ever sent to the configured API origin.
    fn is_trusted_poll_url(&self, poll_url: &str) -> bool {
        match (Url::parse(&self.config.base_url), Url::parse(poll_url)) {
            (Ok(base), Ok(poll)) => base.origin() == poll.origin(),
            _ => false,
        }
    }

    fn auth_headers(&self, token: &str) -> Result<HeaderMap, GenerationError> {
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|e| {
            warn!("Invalid generation API token header value: {}", e);
            GenerationError::NotConfigured
        })?;
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }

    async fn read_prediction(response: reqwest::Response) -> Result<Prediction, GenerationError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "Generation service rejected the request");
            return Err(remote_error_from_body(&body).unwrap_or(GenerationError::Status(status)));
        }
        Ok(response.json::<Prediction>().await?)
    }

    async fn run_prediction(&self, token: &str, prompt: &str) -> Result<String, GenerationError> {
        let headers = self.auth_headers(token)?;
        let (url, version) = self.create_url();
        let payload = CreatePrediction {
            version,
            input: PredictionInput {
                prompt,
                max_new_tokens: self.config.max_new_tokens,
                min_new_tokens: self.config.min_new_tokens,
                temperature: self.config.temperature,
            },
        };

        debug!(url = %url, model = %self.config.model, "Creating prediction");
        let response = self
            .client
            .post(&url)
            .headers(headers.clone())
            .header("Prefer", "wait")
            .json(&payload)
            .send()
            .await?;
        let mut prediction = Self::read_prediction(response).await?;
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);

        loop {
            match prediction.status {
                PredictionStatus::Succeeded => {
                    return match prediction.output {
                        Some(PredictionOutput::Fragments(fragments)) => {
                            assemble_output(fragments.into_iter().flatten())
                        }
                        Some(PredictionOutput::Text(text)) => assemble_output([text]),
                        None => Err(GenerationError::EmptyOutput),
                    };
                }
                PredictionStatus::Failed | PredictionStatus::Canceled => {
                    return Err(GenerationError::Remote(
                        prediction
                            .error
                            .as_ref()
                            .and_then(error_text)
                            .unwrap_or_default(),
                    ));
                }
                PredictionStatus::Starting
                | PredictionStatus::Processing
                | PredictionStatus::Unknown => {
                    let Some(poll_url) = prediction.urls.get.take() else {
                        return Err(GenerationError::Remote(String::new()));
                    };
                    if !self.is_trusted_poll_url(&poll_url) {
                        warn!(poll_url = %poll_url, "Refusing to poll a prediction outside the API origin");
                        return Err(GenerationError::ForeignPollUrl(poll_url));
                    }
                    debug!(prediction_id = ?prediction.id, "Prediction not finished; polling");
                    tokio::time::sleep(poll_interval).await;
                    let response = self
                        .client
                        .get(&poll_url)
                        .headers(headers.clone())
                        .send()
                        .await?;
                    prediction = Self::read_prediction(response).await?;
                }
            }
        }
    }
}

fn error_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

/// Pulls the `detail` or `error` text out of an error body.
fn remote_error_from_body(body: &str) -> Option<GenerationError> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["detail", "error"]
        .iter()
        .filter_map(|key| value.get(*key).and_then(error_text))
        .find(|text| !text.trim().is_empty())
        .map(GenerationError::Remote)
}

#[async_trait]
impl DescriptionGenerator for ReplicateGenerator {
    async fn generate(&self, name: &str, attributes: &str) -> Result<String, GenerationError> {
        let token = self.config.api_token().ok_or(GenerationError::NotConfigured)?;
        let prompt = build_prompt(name, attributes);
        let limit = Duration::from_secs(self.config.timeout_secs);
        let start = Instant::now();

        let text = tokio::time::timeout(limit, self.run_prediction(token, &prompt))
            .await
            .map_err(|_| GenerationError::Timeout(limit))??;

        info!(
            model = %self.config.model,
            chars = text.chars().count(),
            duration = ?start.elapsed(),
            "Generated product description"
        );
        Ok(text)
    }
}
