//! OpenAI-compatible chat completions advisor (DashScope compatible mode by default)

use crate::prompt::{self, ANALYSIS_SYSTEM, MAINTENANCE_SYSTEM, SUMMARY_SYSTEM};
use crate::provider::{AdvisoryError, AdvisoryResult, InsightGenerator, SummaryContext};
use reqwest::Client;
use rigscan_core::{CorrosionFinding, Metadata, RiskAssessment, SensorReading};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error};

pub const DEFAULT_BASE_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";
pub const DEFAULT_MODEL: &str = "qwen-plus";
const DEFAULT_RETRY_AFTER_MS: u64 = 60_000;

pub struct RemoteAdvisor {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl RemoteAdvisor {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> AdvisoryResult<Self> {
        // Connections must not outlive the per-request runtime that opened them.
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(0)
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Blocking call usable from any thread, including one that is already
    /// driving a tokio runtime.
    fn complete(&self, system: &str, user: String, temperature: f32, max_tokens: u32) -> AdvisoryResult<String> {
        run_detached(self.request(system, user, temperature, max_tokens))
    }

    async fn request(&self, system: &str, user: String, temperature: f32, max_tokens: u32) -> AdvisoryResult<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: system.to_string() },
                ChatMessage { role: "user", content: user },
            ],
            temperature,
            max_tokens,
        };

        debug!("advisory request: model={}", body.model);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let retry_after_ms = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1000)
                .unwrap_or(DEFAULT_RETRY_AFTER_MS);
            let error_text = response.text().await.unwrap_or_default();
            error!("advisory error {}: {}", status, error_text);

            return Err(match status.as_u16() {
                401 | 403 => AdvisoryError::AuthFailed(error_text),
                429 => AdvisoryError::RateLimited { retry_after_ms },
                _ => AdvisoryError::RequestFailed(format!("{}: {}", status, error_text)),
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AdvisoryError::InvalidResponse(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| AdvisoryError::InvalidResponse("reply has no content".into()))
    }
}

/// Drive `future` on a scoped worker thread with its own current-thread
/// runtime. The caller's thread never enters or drops a runtime.
fn run_detached<T, F>(future: F) -> AdvisoryResult<T>
where
    T: Send,
    F: Future<Output = AdvisoryResult<T>> + Send,
{
    std::thread::scope(|scope| {
        scope
            .spawn(move || {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .map_err(|e| AdvisoryError::Unavailable(format!("advisory runtime: {}", e)))?;
                runtime.block_on(future)
            })
            .join()
    })
    .unwrap_or_else(|_| Err(AdvisoryError::Unavailable("advisory worker panicked".into())))
}

impl InsightGenerator for RemoteAdvisor {
    fn name(&self) -> &str {
        "remote"
    }

    fn analyze(
        &self,
        readings: &[SensorReading],
        findings: &[CorrosionFinding],
    ) -> AdvisoryResult<Metadata> {
        let reply = self.complete(
            ANALYSIS_SYSTEM,
            prompt::analysis_prompt(readings, findings),
            0.1,
            1500,
        )?;
        Ok(prompt::parse_analysis(&reply))
    }

    fn summarize(&self, context: &SummaryContext<'_>) -> AdvisoryResult<String> {
        let reply = self.complete(SUMMARY_SYSTEM, prompt::summary_prompt(context), 0.2, 1000)?;
        Ok(reply.trim().to_string())
    }

    fn maintenance_insights(&self, assessment: &RiskAssessment) -> AdvisoryResult<Vec<String>> {
        let reply = self.complete(
            MAINTENANCE_SYSTEM,
            prompt::maintenance_prompt(assessment),
            0.3,
            800,
        )?;
        let insights = prompt::parse_insights(&reply);
        if insights.is_empty() {
            return Ok(assessment.recommendations.clone());
        }
        Ok(insights)
    }
}

// Chat completions wire types

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}
