// SPDX-License-Identifier: MIT

//! Scene processor: turns one parsed transcript into a generated image
//! plus a metadata (or error) artifact, retrying the image renderer on
//! transient unreachability.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{error, info, warn};

use dnd_adapters::image_client::{ImageClient, ImageClientError, ImageRequest, ImageResponse};
use dnd_adapters::llm_client::{parse_llm_response, LlmClient, LlmResponse, SceneDescription};
use dnd_core::config::FallbackMode;
use dnd_core::time_fmt::{hhmm_prefix, now_iso8601};

use crate::artifact::ArtifactPaths;
use crate::parser::{parse_transcript, ParseError, SceneTranscript};

#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("failed to write artifact {path}: {source}")]
    WriteArtifact {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize metadata: {0}")]
    Serialize(#[from] serde_json::Error),
}

const SYSTEM_PROMPT: &str = r#"You are an expert Dungeons & Dragons scene analyst and image prompt generator specialized for the "dndstyle" LoRA model.

Given a transcript excerpt from the last few minutes of a session, identify the current scene and respond with a single JSON object, no surrounding prose:

{"szenenbeschreibung": "...", "dndstyle_prompt": "dndstyle, ...", "wichtige_elemente": ["..."], "stimmung": "..."}

The "dndstyle_prompt" field MUST start with the word "dndstyle" as the trigger word, followed by a detailed image generation prompt."#;

fn build_full_prompt(transcript: &SceneTranscript) -> String {
    let transcript_content = transcript.segmente_als_text();
    format!(
        "{system}\n\nHere is a D&D session transcript excerpt from the last 5 minutes:\n\n{content}\n\nPlease analyze this transcript and respond with the JSON object described above.",
        system = SYSTEM_PROMPT,
        content = transcript_content,
    )
}

pub struct ProcessorServices {
    pub llm: LlmClient,
    pub image: ImageClient,
    pub fallback_mode: FallbackMode,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

#[derive(Debug, Serialize)]
struct SceneMetadata<'a> {
    scene_name: &'a str,
    transcript_file: String,
    generation_timestamp: String,
    generation_time_seconds: f64,
    transcript_metadata: &'a crate::parser::TranscriptMetadata,
    segmente_count: usize,
    segmente_text: String,
    llm_result: Option<&'a SceneDescription>,
    llm_full_response: &'a str,
    dndstyle_prompt: &'a str,
    szenenbeschreibung: &'a str,
    #[serde(skip_serializing_if = "is_empty_slice")]
    wichtige_elemente: &'a [String],
    #[serde(skip_serializing_if = "is_empty_str")]
    stimmung: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_file: Option<String>,
    image_generation_result: Option<&'a ImageResponse>,
    generation_attempts: u32,
}

#[derive(Debug, Serialize)]
struct ErrorMetadata<'a> {
    scene_name: &'a str,
    error: &'a str,
    timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    dndstyle_prompt: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    szenenbeschreibung: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    llm_result: Option<&'a SceneDescription>,
    failed_attempts: u32,
}

/// What happened to a scene after one processing pass. The caller (the
/// reconciler) is the one that writes this back into the tracking store;
/// the processor only ever touches artifact files.
#[derive(Debug)]
pub enum ProcessOutcome {
    Completed {
        attempts: u32,
        /// Observability note for the tracking record, e.g. set when the
        /// image was produced via `prompt_only`/`mock` fallback or when
        /// the LLM response had to be recovered via fallback parsing.
        details: Option<String>,
    },
    Failed {
        reason: String,
    },
}

pub struct SceneProcessor {
    watched_dir: std::path::PathBuf,
    output_dir: std::path::PathBuf,
    services: ProcessorServices,
}

impl SceneProcessor {
    pub fn new(watched_dir: std::path::PathBuf, output_dir: std::path::PathBuf, services: ProcessorServices) -> Self {
        Self {
            watched_dir,
            output_dir,
            services,
        }
    }

    pub async fn process(&self, scene_id: &dnd_core::SceneId) -> Result<ProcessOutcome, ProcessorError> {
        let paths = ArtifactPaths::for_scene(&self.watched_dir, &self.output_dir, scene_id);
        let transcript = parse_transcript(&paths.transcript)?;

        let full_prompt = build_full_prompt(&transcript);
        let raw_response = match self.services.llm.chat(&full_prompt).await {
            Ok(text) => text,
            Err(err) => {
                error!(scene = %scene_id, error = %err, "llm chat failed after its own retries, scene terminally failed");
                let reason = err.to_string();
                self.write_error_metadata(scene_id, &paths, &reason, None, None, None)?;
                return Ok(ProcessOutcome::Failed { reason });
            }
        };

        let hhmm = hhmm_prefix();
        let parsed = parse_llm_response(&raw_response, &hhmm);

        self.generate_image(scene_id, &paths, &transcript, &raw_response, &parsed)
            .await
    }

    async fn generate_image(
        &self,
        scene_id: &dnd_core::SceneId,
        paths: &ArtifactPaths,
        transcript: &SceneTranscript,
        full_response: &str,
        parsed: &LlmResponse,
    ) -> Result<ProcessOutcome, ProcessorError> {
        let image_filename = scene_id.image_filename();
        let dndstyle_prompt = parsed.prompt().to_string();
        let szenenbeschreibung = szenenbeschreibung_of(parsed, full_response);
        let llm_details = llm_fallback_details(parsed);
        let start = Instant::now();

        let mut last_err: Option<ImageClientError> = None;
        for attempt in 1..=self.services.max_retries.max(1) {
            let request = ImageRequest {
                prompt: dndstyle_prompt.clone(),
                file: image_filename.clone(),
            };

            match self.services.image.generate(&request).await {
                Ok(response) => {
                    let generation_time = start.elapsed().as_secs_f64();
                    self.write_success_metadata(
                        paths,
                        transcript,
                        full_response,
                        &dndstyle_prompt,
                        &szenenbeschreibung,
                        parsed,
                        Some(image_filename.clone()),
                        Some(&response),
                        generation_time,
                        attempt,
                    )?;
                    let _ = std::fs::remove_file(&paths.error);
                    info!(scene = %scene_id, attempt, "scene processed successfully");
                    return Ok(ProcessOutcome::Completed {
                        attempts: attempt,
                        details: llm_details,
                    });
                }
                Err(err @ ImageClientError::Unreachable { .. }) if attempt < self.services.max_retries => {
                    warn!(scene = %scene_id, attempt, error = %err, "image server unreachable, retrying");
                    last_err = Some(err);
                    tokio::time::sleep(self.services.retry_delay).await;
                }
                Err(err) => {
                    error!(scene = %scene_id, error = %err, "image generation failed");
                    last_err = Some(err);
                    break;
                }
            }
        }

        let reason = last_err
            .map(|e| e.to_string())
            .unwrap_or_else(|| "image generation failed for an unknown reason".to_string());

        match self.services.fallback_mode {
            FallbackMode::Mock => {
                std::fs::write(&paths.image, []).map_err(|source| ProcessorError::WriteArtifact {
                    path: paths.image.display().to_string(),
                    source,
                })?;
                let generation_time = start.elapsed().as_secs_f64();
                self.write_success_metadata(
                    paths,
                    transcript,
                    full_response,
                    &dndstyle_prompt,
                    &szenenbeschreibung,
                    parsed,
                    Some(image_filename.clone()),
                    None,
                    generation_time,
                    self.services.max_retries,
                )?;
                let _ = std::fs::remove_file(&paths.error);
                Ok(ProcessOutcome::Completed {
                    attempts: self.services.max_retries,
                    details: Some(combine_details("mock fallback used in place of a rendered image", llm_details)),
                })
            }
            FallbackMode::PromptOnly => {
                let _ = std::fs::remove_file(&paths.image);
                let generation_time = start.elapsed().as_secs_f64();
                self.write_success_metadata(
                    paths,
                    transcript,
                    full_response,
                    &dndstyle_prompt,
                    &szenenbeschreibung,
                    parsed,
                    None,
                    None,
                    generation_time,
                    self.services.max_retries,
                )?;
                let _ = std::fs::remove_file(&paths.error);
                Ok(ProcessOutcome::Completed {
                    attempts: self.services.max_retries,
                    details: Some(combine_details("prompt_only fallback used, no image generated", llm_details)),
                })
            }
            FallbackMode::Skip => {
                self.write_error_metadata(
                    scene_id,
                    paths,
                    &reason,
                    Some(&dndstyle_prompt),
                    Some(&szenenbeschreibung),
                    structured_llm_result(parsed),
                )?;
                Ok(ProcessOutcome::Failed { reason })
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn write_success_metadata(
        &self,
        paths: &ArtifactPaths,
        transcript: &SceneTranscript,
        full_response: &str,
        dndstyle_prompt: &str,
        szenenbeschreibung: &str,
        parsed: &LlmResponse,
        image_filename: Option<String>,
        image_generation_result: Option<&ImageResponse>,
        generation_time_seconds: f64,
        attempts: u32,
    ) -> Result<(), ProcessorError> {
        let (wichtige_elemente, stimmung): (&[String], &str) = match parsed {
            LlmResponse::Structured(SceneDescription {
                wichtige_elemente,
                stimmung,
                ..
            }) => (wichtige_elemente.as_slice(), stimmung.as_str()),
            LlmResponse::Raw { .. } => (&[], ""),
        };

        let metadata = SceneMetadata {
            scene_name: transcript.scene_id.as_str(),
            transcript_file: paths
                .transcript
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            generation_timestamp: now_iso8601(),
            generation_time_seconds,
            transcript_metadata: &transcript.metadata,
            segmente_count: transcript.segmente.len(),
            segmente_text: transcript.segmente_als_text(),
            llm_result: structured_llm_result(parsed),
            llm_full_response: full_response,
            dndstyle_prompt,
            szenenbeschreibung,
            wichtige_elemente,
            stimmung,
            image_file: image_filename,
            image_generation_result,
            generation_attempts: attempts,
        };

        let rendered = serde_json::to_string_pretty(&metadata)?;
        std::fs::write(&paths.metadata, rendered).map_err(|source| ProcessorError::WriteArtifact {
            path: paths.metadata.display().to_string(),
            source,
        })
    }

    fn write_error_metadata(
        &self,
        scene_id: &dnd_core::SceneId,
        paths: &ArtifactPaths,
        reason: &str,
        dndstyle_prompt: Option<&str>,
        szenenbeschreibung: Option<&str>,
        llm_result: Option<&SceneDescription>,
    ) -> Result<(), ProcessorError> {
        let metadata = ErrorMetadata {
            scene_name: scene_id.as_str(),
            error: reason,
            timestamp: now_iso8601(),
            dndstyle_prompt,
            szenenbeschreibung,
            llm_result,
            failed_attempts: self.services.max_retries,
        };
        let rendered = serde_json::to_string_pretty(&metadata)?;
        std::fs::write(&paths.error, rendered).map_err(|source| ProcessorError::WriteArtifact {
            path: paths.error.display().to_string(),
            source,
        })
    }
}

/// The structured LLM result, when the parser's primary JSON path
/// succeeded. `None` on the raw-fallback path, where there is no
/// structured object to report.
fn structured_llm_result(parsed: &LlmResponse) -> Option<&SceneDescription> {
    match parsed {
        LlmResponse::Structured(desc) => Some(desc),
        LlmResponse::Raw { .. } => None,
    }
}

/// The German "scene description" field: taken straight from the model's
/// structured response, or reconstructed from the cleaned full response
/// when the parser had to fall through to a recovery stage.
fn szenenbeschreibung_of(parsed: &LlmResponse, full_response: &str) -> String {
    match parsed {
        LlmResponse::Structured(desc) => desc.szenenbeschreibung.clone(),
        LlmResponse::Raw { .. } => {
            let trimmed = full_response.trim();
            if trimmed.is_empty() {
                "No description available".to_string()
            } else {
                trimmed.to_string()
            }
        }
    }
}

fn llm_fallback_details(parsed: &LlmResponse) -> Option<String> {
    if parsed.is_fallback() {
        Some("llm response recovered via fallback parsing".to_string())
    } else {
        None
    }
}

fn is_empty_slice(v: &&[String]) -> bool {
    v.is_empty()
}

fn is_empty_str(v: &&str) -> bool {
    v.is_empty()
}

fn combine_details(primary: &str, llm_details: Option<String>) -> String {
    match llm_details {
        Some(extra) => format!("{primary}; {extra}"),
        None => primary.to_string(),
    }
}

#[cfg(test)]
#[path = "processor_tests.rs"]
mod tests;
