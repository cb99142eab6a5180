//! Ollama chat API backend.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::catalog::FunctionSpec;
use crate::model::{Backend, Message, ModelError, ModelRequest, ModelResponse, ToolCall};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const CHAT_PATH: &str = "/api/chat";

// ─────────────────────────────────────────────────────────────────────────────
// API Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage<'a>>,
    #[serde(skip_serializing_if = "no_tools")]
    tools: &'a [FunctionSpec],
    stream: bool,
}

fn no_tools(tools: &&[FunctionSpec]) -> bool {
    tools.is_empty()
}

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> From<&'a Message> for ApiMessage<'a> {
    fn from(msg: &'a Message) -> Self {
        Self {
            role: msg.role.as_str(),
            content: &msg.content,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    message: ApiResponseMessage,
}

#[derive(Debug, Default, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Vec<ApiToolCall>,
}

#[derive(Debug, Deserialize)]
struct ApiToolCall {
    function: ApiFunctionCall,
}

#[derive(Debug, Deserialize)]
struct ApiFunctionCall {
    name: String,
    #[serde(default)]
    arguments: Map<String, Value>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend Implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for creating an Ollama backend.
#[derive(Debug, Clone)]
pub struct OllamaBackendBuilder {
    model: String,
    base_url: String,
}

impl OllamaBackendBuilder {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn build(self) -> OllamaBackend {
        OllamaBackend {
            client: reqwest::Client::new(),
            model: self.model,
            chat_url: format!("{}{CHAT_PATH}", self.base_url.trim_end_matches('/')),
        }
    }
}

/// Backend speaking Ollama's `/api/chat` endpoint.
pub struct OllamaBackend {
    client: reqwest::Client,
    model: String,
    chat_url: String,
}

impl OllamaBackend {
    pub fn builder(model: impl Into<String>) -> OllamaBackendBuilder {
        OllamaBackendBuilder::new(model)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn response_to_model(message: ApiResponseMessage) -> ModelResponse {
        let tool_calls = message
            .tool_calls
            .into_iter()
            .map(|call| ToolCall {
                name: call.function.name,
                arguments: call.function.arguments,
            })
            .collect();
        ModelResponse {
            content: message.content,
            tool_calls,
        }
    }
}

impl std::fmt::Display for OllamaBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ollama({})", self.model)
    }
}

impl Backend for OllamaBackend {
    async fn call(&self, request: ModelRequest<'_>) -> Result<ModelResponse, ModelError> {
        let api_request = ApiRequest {
            model: &self.model,
            messages: request.messages.iter().map(ApiMessage::from).collect(),
            tools: request.tools,
            stream: false,
        };

        let response = self
            .client
            .post(&self.chat_url)
            .json(&api_request)
            .send()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Api(format!("{status}: {body}")));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

        Ok(Self::response_to_model(api_response.message))
    }
}
