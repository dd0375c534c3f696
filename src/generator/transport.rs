// HTTP transport for the OpenAI-compatible image and chat endpoints

use crate::error::TransportError;
use log::debug;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::time::Duration;
use url::Url;

/// Upper bound on a downloaded image payload.
const MAX_IMAGE_BYTES: u64 = 64 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImagesRequest {
    pub model: String,
    pub prompt: String,
    pub n: u32,
    pub size: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImagesResponse {
    #[serde(default)]
    pub data: Vec<ImageData>,
}

/// One generated image: a URL to dereference or an inline base64 payload.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ImageData {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub b64_json: Option<String>,
    #[serde(default)]
    pub revised_prompt: Option<String>,
}

/// Remote image-generation service.
pub trait ImageApi: Send + Sync {
    fn create_images(&self, request: &ImagesRequest) -> Result<ImagesResponse, TransportError>;

    /// Fetch the bytes behind an image URL.
    fn download(&self, url: &str) -> Result<Vec<u8>, TransportError>;
}

/// Remote text-inference service; returns the reply text of one chat turn.
pub trait ChatApi: Send + Sync {
    fn complete(&self, model: &str, system: &str, user: &str) -> Result<String, TransportError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible client over `ureq` with a per-call timeout.
pub struct OpenAiHttp {
    agent: ureq::Agent,
    base_url: Url,
    api_key: String,
}

impl OpenAiHttp {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, TransportError> {
        // Endpoint paths carry `v1/`; accept bases given with or without it.
        let trimmed = base_url.trim().trim_end_matches('/');
        let mut base = trimmed.strip_suffix("/v1").unwrap_or(trimmed).to_string();
        base.push('/');
        let base_url = Url::parse(&base)
            .map_err(|e| TransportError::Malformed(format!("invalid base URL '{}': {}", base_url, e)))?;

        let agent = ureq::AgentBuilder::new().timeout(timeout).build();

        Ok(Self {
            agent,
            base_url,
            api_key: api_key.to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        self.base_url
            .join(path)
            .map_err(|e| TransportError::Malformed(format!("invalid endpoint '{}': {}", path, e)))
    }

    fn post_json<T: Serialize>(&self, path: &str, body: &T) -> Result<ureq::Response, TransportError> {
        let url = self.endpoint(path)?;
        debug!("POST {}", url);
        self.agent
            .post(url.as_str())
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .set("Content-Type", "application/json")
            .send_json(body)
            .map_err(map_ureq_error)
    }
}

impl ImageApi for OpenAiHttp {
    fn create_images(&self, request: &ImagesRequest) -> Result<ImagesResponse, TransportError> {
        let response = self.post_json("v1/images/generations", request)?;
        response
            .into_json::<ImagesResponse>()
            .map_err(|e| TransportError::Malformed(format!("image response: {}", e)))
    }

    fn download(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        debug!("GET {}", url);
        let response = self.agent.get(url).call().map_err(map_ureq_error)?;

        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_IMAGE_BYTES)
            .read_to_end(&mut bytes)
            .map_err(|e| TransportError::Network(format!("reading image body: {}", e)))?;

        if bytes.is_empty() {
            return Err(TransportError::Malformed(format!("empty image body from {}", url)));
        }
        Ok(bytes)
    }
}

impl ChatApi for OpenAiHttp {
    fn complete(&self, model: &str, system: &str, user: &str) -> Result<String, TransportError> {
        let request = ChatRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.0,
        };

        let response: ChatResponse = self
            .post_json("v1/chat/completions", &request)?
            .into_json()
            .map_err(|e| TransportError::Malformed(format!("chat response: {}", e)))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| TransportError::Malformed("no choices in chat response".to_string()))
    }
}

fn map_ureq_error(err: ureq::Error) -> TransportError {
    match err {
        ureq::Error::Status(code, response) => TransportError::Status {
            code,
            body: response.into_string().unwrap_or_default(),
        },
        ureq::Error::Transport(transport) => TransportError::Network(transport.to_string()),
    }
}
