// SPDX-License-Identifier: MIT

//! Client for the local LLM host's chat API, plus the multi-stage parser
//! that recovers a usable image prompt and scene description from
//! whatever the model actually returned.

use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum LlmClientError {
    #[error("llm host at {base_url} is unreachable: {source}")]
    Unreachable {
        base_url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("llm host at {base_url} returned HTTP {status}")]
    HttpStatus { base_url: String, status: u16 },
    #[error("llm host returned an empty or unparseable chat response")]
    EmptyResponse,
}

/// The structured scene description the system prompt asks the model to
/// return as a single JSON object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneDescription {
    pub szenenbeschreibung: String,
    pub dndstyle_prompt: String,
    #[serde(default)]
    pub wichtige_elemente: Vec<String>,
    #[serde(default)]
    pub stimmung: String,
}

/// The trigger token every usable image prompt must begin with to invoke
/// the diffusion model's trained style.
pub const TRIGGER_TOKEN: &str = "dndstyle";

/// Which stage of the fallback ladder produced a usable prompt.
///
/// `Structured` is the direct JSON parse of a [`SceneDescription`].
/// `Raw` covers every recovery path below it — regex-recovered
/// `(prompt, name)` pairs, the bare-`dndstyle` span, and the hardcoded
/// literal — collapsed into one variant since none of them carry the
/// full structured fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmResponse {
    Structured(SceneDescription),
    Raw { prompt: String, name: String },
}

impl LlmResponse {
    pub fn prompt(&self) -> &str {
        match self {
            LlmResponse::Structured(desc) => &desc.dndstyle_prompt,
            LlmResponse::Raw { prompt, .. } => prompt,
        }
    }

    /// `true` once parsing fell through the primary JSON path onto any of
    /// the regex/hardcoded recovery stages.
    pub fn is_fallback(&self) -> bool {
        matches!(self, LlmResponse::Raw { .. })
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    format: &'a str,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize, Clone)]
struct ChatOptions {
    temperature: f64,
    top_p: f64,
    num_predict: i64,
    num_ctx: i64,
}

#[derive(Debug, Deserialize)]
struct ChatResponseEnvelope {
    #[serde(default)]
    message: Option<ChatResponseMessage>,
    #[serde(default)]
    response: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

pub struct LlmClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    options: ChatOptions,
    chat_retry_count: u32,
    chat_retry_backoff: Duration,
}

impl LlmClient {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        base_url: &str,
        model: &str,
        deadline: Duration,
        chat_retry_count: u32,
        chat_retry_backoff: Duration,
        temperature: f64,
        top_p: f64,
        num_predict: i64,
        num_ctx: i64,
    ) -> Result<Self, LlmClientError> {
        let http = reqwest::Client::builder()
            .timeout(deadline)
            .build()
            .map_err(|source| LlmClientError::Unreachable {
                base_url: base_url.to_string(),
                source,
            })?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            options: ChatOptions {
                temperature,
                top_p,
                num_predict,
                num_ctx,
            },
            chat_retry_count,
            chat_retry_backoff,
        })
    }

    /// Send `full_prompt` as a single user message and retry on transport
    /// failure up to `chat_retry_count` times, sleeping `chat_retry_backoff`
    /// between attempts.
    pub async fn chat(&self, full_prompt: &str) -> Result<String, LlmClientError> {
        let mut last_err = None;
        for attempt in 0..self.chat_retry_count.max(1) {
            match self.chat_once(full_prompt).await {
                Ok(text) => return Ok(text),
                Err(err) => {
                    warn!(attempt = attempt + 1, error = %err, "llm chat attempt failed");
                    last_err = Some(err);
                    if attempt + 1 < self.chat_retry_count.max(1) {
                        tokio::time::sleep(self.chat_retry_backoff).await;
                    }
                }
            }
        }
        Err(last_err.unwrap_or(LlmClientError::EmptyResponse))
    }

    async fn chat_once(&self, full_prompt: &str) -> Result<String, LlmClientError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: full_prompt,
            }],
            format: "json",
            options: self.options.clone(),
        };

        let url = format!("{}/api/chat", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|source| LlmClientError::Unreachable {
                base_url: self.base_url.clone(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(LlmClientError::HttpStatus {
                base_url: self.base_url.clone(),
                status: response.status().as_u16(),
            });
        }

        let envelope: ChatResponseEnvelope =
            response
                .json()
                .await
                .map_err(|source| LlmClientError::Unreachable {
                    base_url: self.base_url.clone(),
                    source,
                })?;

        let text = envelope
            .message
            .map(|m| m.content)
            .or(envelope.response)
            .filter(|s| !s.trim().is_empty());

        text.ok_or(LlmClientError::EmptyResponse)
    }
}

const PROMPT_PATTERNS: &[&str] = &[
    r"(?is)DNDSTYLE IMAGE PROMPT:\s*(.+?)(?=\nIMAGE NAME:|$)",
    r"(?is)IMAGE PROMPT:\s*(.+?)(?=\nIMAGE NAME:|$)",
    r"(?is)PROMPT:\s*(.+?)(?=\nIMAGE NAME:|$)",
    r"(?is)dndstyle[,\s]+(.+?)(?=\nIMAGE NAME:|$)",
];

const NAME_PATTERNS: &[&str] = &[
    r"(?i)IMAGE NAME:\s*(.+?)(?=\n|$)",
    r"(?i)NAME:\s*(.+?)(?=\n|$)",
    r"(?i)FILENAME:\s*(.+?)(?=\n|$)",
];

const DNDSTYLE_BARE_SPAN: &str = r"(?i)(dndstyle[^.!?\n]+)";

/// Strip a chain-of-thought preamble wrapped in `<think>...</think>`,
/// keeping only what follows the last `</think>` tag.
fn strip_think_tags(text: &str) -> &str {
    if let Some(idx) = text.rfind("</think>") {
        return text[idx + "</think>".len()..].trim();
    }
    text
}

fn extract_prompt(clean: &str) -> Option<String> {
    for pattern in PROMPT_PATTERNS {
        let re = Regex::new(pattern).ok()?;
        if let Some(caps) = re.captures(clean) {
            let captured = caps.get(1)?.as_str().trim();
            let stripped = Regex::new(r"^\*+\s*")
                .ok()?
                .replace(captured, "")
                .into_owned();
            if !stripped.is_empty() {
                return Some(stripped);
            }
        }
    }
    None
}

fn extract_name(clean: &str) -> Option<String> {
    for pattern in NAME_PATTERNS {
        let re = Regex::new(pattern).ok()?;
        if let Some(caps) = re.captures(clean) {
            let raw = caps.get(1)?.as_str().trim();
            if !raw.is_empty() {
                return Some(raw.to_string());
            }
        }
    }
    None
}

/// Sanitize a raw scene name recovered by the secondary/tertiary parse
/// stages into a safe filename stem: strip a layer of markdown emphasis
/// and parentheticals, fold non-ASCII and non-alphanumeric characters to
/// underscores, collapse runs, enforce a minimum length, truncate to 35
/// characters, and prefix the current `HHMM`.
#[allow(clippy::expect_used)]
pub fn sanitize_scene_name(raw: &str, hhmm_prefix: &str) -> String {
    let mut name = Regex::new(r"^\*+\s*|\s*\*+$")
        .expect("valid regex")
        .replace_all(raw, "")
        .into_owned();
    name = Regex::new(r"\s*\([^)]*\)")
        .expect("valid regex")
        .replace_all(&name, "")
        .into_owned();
    name = name
        .chars()
        .map(|c| if c.is_ascii() { c } else { '_' })
        .collect();
    name = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    name = Regex::new(r"_{2,}")
        .expect("valid regex")
        .replace_all(&name, "_")
        .into_owned();
    name = name.trim_matches('_').to_string();

    if name.len() < 3 {
        name = "generated_scene".to_string();
    }
    if name.len() > 35 {
        name.truncate(35);
        name = name.trim_end_matches('_').to_string();
    }

    format!("{}_{}", hhmm_prefix, name)
}

/// A structured `dndstyle_prompt` must begin with the trigger token
/// (case-sensitive) and be ASCII, or it can't be trusted to invoke the
/// diffusion model's trained style.
fn is_valid_prompt(prompt: &str) -> bool {
    prompt.starts_with(TRIGGER_TOKEN) && prompt.is_ascii()
}

fn tertiary_fallback(clean: &str, hhmm_prefix: &str) -> LlmResponse {
    if let Ok(re) = Regex::new(DNDSTYLE_BARE_SPAN) {
        if let Some(caps) = re.captures(clean) {
            if let Some(m) = caps.get(1) {
                warn!("llm response recovered via bare dndstyle span fallback");
                return LlmResponse::Raw {
                    prompt: m.as_str().trim().to_string(),
                    name: sanitize_scene_name("generated_scene", hhmm_prefix),
                };
            }
        }
    }

    warn!("no usable prompt found in llm response, using hardcoded fallback");
    LlmResponse::Raw {
        prompt: "dndstyle fantasy adventure scene, dungeons and dragons style illustration"
            .to_string(),
        name: sanitize_scene_name("fallback_scene", hhmm_prefix),
    }
}

/// Run the full parse ladder over a raw LLM response: think-tag strip,
/// primary JSON parse of a [`SceneDescription`], secondary regex
/// prompt/name recovery, tertiary bare-`dndstyle` span, and finally a
/// hardcoded placeholder. This never fails — it always returns a usable
/// prompt.
pub fn parse_llm_response(response_text: &str, hhmm_prefix: &str) -> LlmResponse {
    let clean = strip_think_tags(response_text);
    debug!(chars = clean.len(), "parsing llm response");

    if let Ok(desc) = serde_json::from_str::<SceneDescription>(clean) {
        if is_valid_prompt(&desc.dndstyle_prompt) {
            return LlmResponse::Structured(desc);
        }
        warn!("structured llm response failed trigger-token/ascii validation, falling through");
        return tertiary_fallback(clean, hhmm_prefix);
    }

    let prompt = extract_prompt(clean);
    let name = extract_name(clean);

    if let (Some(prompt), Some(name)) = (prompt, name) {
        let sanitized = sanitize_scene_name(&name, hhmm_prefix);
        return LlmResponse::Raw {
            prompt,
            name: sanitized,
        };
    }

    tertiary_fallback(clean, hhmm_prefix)
}

#[cfg(test)]
#[path = "llm_client_tests.rs"]
mod tests;
