//! Per-provider request shaping and reply extraction

use super::prompts::{inline_prompt, SYSTEM_PROMPT};
use super::provider::{ProviderConfig, RequestShape};
use super::transport::HttpRequest;
use super::CompletionError;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

pub const TEMPERATURE: f32 = 0.7;

const CHAT_MAX_TOKENS: u32 = 200;
const GEMINI_TOP_K: u32 = 40;
const GEMINI_TOP_P: f32 = 0.95;
const GEMINI_MAX_OUTPUT_TOKENS: u32 = 1024;

#[derive(Debug, Serialize)]
struct GenerateContentReq<'a> {
    contents: Vec<ContentReq<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct ContentReq<'a> {
    parts: Vec<PartReq<'a>>,
}

#[derive(Debug, Serialize)]
struct PartReq<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_k: u32,
    top_p: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResp {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatReq<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResp {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Build the POST for `text` against `config`
pub fn build_request(
    config: &ProviderConfig,
    credential: &SecretString,
    text: &str,
) -> Result<HttpRequest, CompletionError> {
    let (headers, body) = match config.shape {
        RequestShape::GenerateContent => {
            let prompt = inline_prompt(text);
            let req = GenerateContentReq {
                contents: vec![ContentReq {
                    parts: vec![PartReq { text: &prompt }],
                }],
                generation_config: GenerationConfig {
                    temperature: TEMPERATURE,
                    top_k: GEMINI_TOP_K,
                    top_p: GEMINI_TOP_P,
                    max_output_tokens: GEMINI_MAX_OUTPUT_TOKENS,
                },
            };
            let headers = vec![(
                "x-goog-api-key".to_string(),
                credential.expose_secret().to_string(),
            )];
            (headers, serde_json::to_string(&req))
        }
        RequestShape::ChatCompletions => {
            let req = ChatReq {
                model: &config.model,
                messages: vec![
                    ChatMessage {
                        role: "system",
                        content: SYSTEM_PROMPT,
                    },
                    ChatMessage {
                        role: "user",
                        content: text,
                    },
                ],
                max_tokens: CHAT_MAX_TOKENS,
                temperature: TEMPERATURE,
                stream: false,
            };
            let headers = vec![(
                "Authorization".to_string(),
                format!("Bearer {}", credential.expose_secret()),
            )];
            (headers, serde_json::to_string(&req))
        }
    };

    let body = body.map_err(|e| CompletionError::TransportError(format!("encode request: {e}")))?;
    Ok(HttpRequest {
        url: config.endpoint.clone(),
        headers,
        body,
    })
}

/// Pull the reply text out of a 2xx body
pub fn extract_reply(shape: RequestShape, body: &str) -> Result<String, CompletionError> {
    let reply = match shape {
        RequestShape::GenerateContent => {
            let resp: GenerateContentResp = serde_json::from_str(body)
                .map_err(|e| CompletionError::MalformedResponse(e.to_string()))?;
            resp.candidates
                .into_iter()
                .next()
                .and_then(|c| c.content)
                .and_then(|c| c.parts.into_iter().next())
                .and_then(|p| p.text)
        }
        RequestShape::ChatCompletions => {
            let resp: ChatResp = serde_json::from_str(body)
                .map_err(|e| CompletionError::MalformedResponse(e.to_string()))?;
            resp.choices
                .into_iter()
                .next()
                .and_then(|c| c.message)
                .and_then(|m| m.content)
        }
    };

    let reply = reply.ok_or_else(|| {
        CompletionError::MalformedResponse("reply field missing".to_string())
    })?;
    let reply = reply.trim();
    if reply.is_empty() {
        return Err(CompletionError::MalformedResponse("reply is empty".to_string()));
    }
    Ok(reply.to_string())
}
