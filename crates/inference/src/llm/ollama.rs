use {
    super::{ChatMessage, ChatModel, ChatRequest},
    crate::InferError,
    base::log,
    reqwest::StatusCode,
    serde::{Deserialize, Serialize},
    std::time::Duration,
};

const REGION_HEADER: &str = "X-Region";
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Clone, PartialEq)]
pub struct OllamaConfig {
    /// Base URL, e.g. `http://127.0.0.1:11434`.
    pub host: String,
    pub model: String,
    /// Sent as a bearer token when set.
    pub api_key: Option<String>,
    /// Sent as `X-Region` when set, for hosted gateways that route by region.
    pub region: Option<String>,
    pub timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "http://127.0.0.1:11434".to_string(),
            model: "qwen3-vl:4b".to_string(),
            api_key: None,
            region: None,
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Serialize)]
struct Options {
    temperature: f32,
}

#[derive(Serialize)]
struct Envelope<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a serde_json::Value>,
    options: Options,
    stream: bool,
}

#[derive(Deserialize)]
struct Reply {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: String,
}

/// Client for an Ollama-compatible `/api/chat` endpoint.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    endpoint: String,
    config: OllamaConfig,
}

impl OllamaClient {
    pub fn new(config: OllamaConfig) -> Result<Self, InferError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| InferError::Transport(format!("failed to build HTTP client: {e}")))?;
        let endpoint = format!("{}/api/chat", config.host.trim_end_matches('/'));
        Ok(Self {
            http,
            endpoint,
            config,
        })
    }
}

fn truncate(text: &str) -> &str {
    match text.char_indices().nth(MAX_ERROR_BODY) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

/// Map a non-success status to the error the caller can act on.
fn classify(status: StatusCode, body: &str, model: &str) -> InferError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            InferError::Unauthorized(format!("{}: {}", status.as_u16(), truncate(body)))
        }
        StatusCode::NOT_FOUND => InferError::ModelNotFound(model.to_string()),
        _ => InferError::Backend {
            status: status.as_u16(),
            message: truncate(body).to_string(),
        },
    }
}

impl ChatModel for OllamaClient {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn chat(&self, request: &ChatRequest) -> Result<String, InferError> {
        let envelope = Envelope {
            model: &self.config.model,
            messages: &request.messages,
            format: request.format.as_ref(),
            options: Options {
                temperature: request.temperature,
            },
            stream: false,
        };

        let mut builder = self.http.post(&self.endpoint).json(&envelope);
        if let Some(api_key) = &self.config.api_key {
            builder = builder.bearer_auth(api_key);
        }
        if let Some(region) = &self.config.region {
            builder = builder.header(REGION_HEADER, region);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::warn!("chat backend answered {status}: {}", truncate(&body));
            return Err(classify(status, &body, &self.config.model));
        }

        let body = response.text().await?;
        let reply: Reply = serde_json::from_str(&body)?;
        Ok(reply.message.content)
    }
}
