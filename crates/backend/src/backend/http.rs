//! HTTP API backend.
//!
//! Talks to a running generation application over its web API: a liveness
//! probe against the root path, then one prediction request per prompt.

use crate::backend::{GenerationBackend, Receipt};
use crate::error::{ErrorKind, Result};
use crate::GenerationParams;
use async_trait::async_trait;
use exn::ResultExt;
use promptdrop_prompts::{Batch, Prompt};
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:7865";
const DEFAULT_PREDICT_PATH: &str = "/api/predict";
const DEFAULT_LIVENESS_TIMEOUT_SECS: u64 = 5;
const PREVIEW_CHARS: usize = 60;

/// Settings for [`HttpBackend`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Base URL of the generation application.
    pub api_url: String,
    /// Path of the prediction endpoint, relative to `api_url`.
    pub predict_path: String,
    pub liveness_timeout_secs: u64,
    /// Per-request timeout for predictions; `None` waits as long as it takes.
    pub request_timeout_secs: Option<u64>,
    /// Pause between consecutive prediction requests.
    pub request_delay_ms: u64,
}
impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            predict_path: DEFAULT_PREDICT_PATH.to_string(),
            liveness_timeout_secs: DEFAULT_LIVENESS_TIMEOUT_SECS,
            request_timeout_secs: None,
            request_delay_ms: 0,
        }
    }
}

/// Generation backend reached over HTTP.
///
/// # Examples
///
/// ```no_run
/// use promptdrop_backend::{GenerationBackend, GenerationParams, HttpBackend, HttpSettings};
///
/// # async fn example() {
/// let backend = HttpBackend::new(HttpSettings::default(), GenerationParams::default()).unwrap();
/// let live = backend.check_liveness().await.is_ok();
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct HttpBackend {
    name: String,
    client: Client,
    root_url: String,
    predict_url: String,
    settings: HttpSettings,
    params: GenerationParams,
}
impl HttpBackend {
    /// Create a new HTTP backend.
    ///
    /// # Errors
    ///
    /// Returns [`Configuration`](ErrorKind::Configuration) if `api_url` is
    /// not an absolute `http(s)` URL or the HTTP client cannot be built.
    pub fn new(settings: HttpSettings, params: GenerationParams) -> Result<Self> {
        let url = Url::parse(&settings.api_url)
            .or_raise(|| ErrorKind::Configuration(format!("invalid API URL `{}`", settings.api_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            exn::bail!(ErrorKind::Configuration(format!("unsupported URL scheme `{}`", url.scheme())));
        }
        let mut builder = Client::builder();
        if let Some(secs) = settings.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().or_raise(|| ErrorKind::Configuration("could not build HTTP client".to_string()))?;
        let base = settings.api_url.trim_end_matches('/');
        let predict_path = settings.predict_path.trim_start_matches('/');
        Ok(Self {
            name: "http".to_string(),
            client,
            root_url: format!("{base}/"),
            predict_url: format!("{base}/{predict_path}"),
            settings,
            params,
        })
    }

    /// Positional payload understood by the prediction endpoint.
    fn payload(&self, prompt: &Prompt) -> Value {
        let params = &self.params;
        json!({
            "data": [
                prompt.as_str(),
                params.negative_prompt,
                params.styles,
                params.performance,
                params.aspect_ratio,
                1,
                params.output_format,
                params.seed,
                params.random_seed,
            ]
        })
    }

    async fn predict(&self, prompt: &Prompt) -> Result<()> {
        let response = self
            .client
            .post(&self.predict_url)
            .json(&self.payload(prompt))
            .send()
            .await
            .or_raise(|| ErrorKind::Request(self.predict_url.clone()))?;
        let status = response.status();
        if !status.is_success() {
            exn::bail!(ErrorKind::Rejected {
                url: self.predict_url.clone(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl GenerationBackend for HttpBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check_liveness(&self) -> Result<()> {
        let response = self
            .client
            .get(&self.root_url)
            .timeout(Duration::from_secs(self.settings.liveness_timeout_secs))
            .send()
            .await
            .or_raise(|| ErrorKind::Unavailable(format!("cannot connect to {}", self.settings.api_url)))?;
        match response.status() {
            StatusCode::OK => {
                tracing::debug!(url = %self.root_url, "Generation API is reachable");
                Ok(())
            },
            status => exn::bail!(ErrorKind::Unavailable(format!("{} responded with HTTP {}", self.root_url, status))),
        }
    }

    async fn submit_batch(&self, batch: &Batch<'_>) -> Result<Receipt> {
        let delay = Duration::from_millis(self.settings.request_delay_ms);
        for (position, (index, prompt)) in batch.numbered().enumerate() {
            if position > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            tracing::info!(batch = batch.number, index, "[{}/{}] {}", position + 1, batch.len(), prompt.preview(PREVIEW_CHARS));
            self.predict(prompt).await?;
        }
        Ok(Receipt {
            prompts: batch.len(),
            submissions: batch.len(),
        })
    }
}
