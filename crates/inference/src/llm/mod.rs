mod ollama;
pub use ollama::*;

use {crate::InferError, serde::Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// One non-streaming chat completion.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    /// JSON schema the reply must follow, if any.
    pub format: Option<serde_json::Value>,
    pub temperature: f32,
}

/// A language model answering chat requests with plain text.
#[allow(async_fn_in_trait)]
pub trait ChatModel {
    /// Name of the model, for logs and diagnostics.
    fn model(&self) -> &str;

    async fn chat(&self, request: &ChatRequest) -> Result<String, InferError>;
}
