// SPDX-License-Identifier: MIT

//! Transcript parser: extracts metadata and timestamped segments from a
//! `*_transkript.txt` file.

use std::path::Path;

use regex::Regex;
use serde::Serialize;

use dnd_core::SceneId;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("transcript file {path} not found")]
    NotFound { path: String },
    #[error("failed to read transcript file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TranscriptMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datum: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sprache: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub konfidenz: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dauer: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptSegment {
    pub start: String,
    pub ende: String,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct SceneTranscript {
    pub scene_id: SceneId,
    pub metadata: TranscriptMetadata,
    /// Last non-blank line under the `VOLLTEXT:` header. The original
    /// parser only keeps the final line it sees there, not the whole
    /// block — preserved here rather than "fixed" since downstream
    /// consumers only ever read `volltext` for a short summary line.
    pub volltext: String,
    pub segmente: Vec<TranscriptSegment>,
}

impl SceneTranscript {
    pub fn segmente_als_text(&self) -> String {
        self.segmente
            .iter()
            .map(|s| format!("[{} - {}] {}", s.start, s.ende, s.text))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn nur_text(&self) -> String {
        self.segmente
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[allow(clippy::expect_used)]
fn segment_regex() -> Regex {
    // Compiling fresh per parse is cheap relative to file I/O and keeps
    // this function free of lazy-static plumbing.
    Regex::new(r"^\[(\d{2}:\d{2}\.\d{2}) - (\d{2}:\d{2}\.\d{2})\] (.+)").expect("valid regex")
}

/// Parse a transcript file at `path`. `filename` drives scene id
/// derivation independently of the full path so callers can parse
/// content read from elsewhere while still naming the scene correctly.
pub fn parse_transcript(path: &Path) -> Result<SceneTranscript, ParseError> {
    if !path.exists() {
        return Err(ParseError::NotFound {
            path: path.display().to_string(),
        });
    }

    let contents = std::fs::read_to_string(path).map_err(|source| ParseError::Read {
        path: path.display().to_string(),
        source,
    })?;

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let scene_id = SceneId::from_transcript_filename(&filename);

    Ok(parse_transcript_str(&scene_id, &contents))
}

fn parse_transcript_str(scene_id: &SceneId, contents: &str) -> SceneTranscript {
    let lines: Vec<&str> = contents.trim().split('\n').collect();
    let segment_re = segment_regex();

    let mut metadata = TranscriptMetadata::default();
    for line in lines
        .iter()
        .take_while(|line| line.trim() != "VOLLTEXT:" && line.trim() != "ZEITGESTEMPELTE SEGMENTE:")
    {
        if let Some(rest) = line.strip_prefix("Transkript für:") {
            metadata.audio_file = Some(strip_value(rest));
        } else if let Some(rest) = line.strip_prefix("Datum:") {
            metadata.datum = Some(strip_value(rest));
        } else if let Some(rest) = line.strip_prefix("Sprache:") {
            metadata.sprache = Some(strip_value(rest));
        } else if let Some(rest) = line.strip_prefix("Konfidenz:") {
            metadata.konfidenz = Some(strip_value(rest));
        } else if let Some(rest) = line.strip_prefix("Dauer:") {
            metadata.dauer = Some(strip_value(rest));
        }
    }

    let mut volltext_active = false;
    let mut zeitstempel_active = false;
    let mut volltext = String::new();
    let mut segmente = Vec::new();

    for line in &lines {
        let trimmed = line.trim();
        if trimmed == "VOLLTEXT:" {
            volltext_active = true;
            continue;
        } else if trimmed == "ZEITGESTEMPELTE SEGMENTE:" {
            volltext_active = false;
            zeitstempel_active = true;
            continue;
        } else if line.starts_with("=====") {
            continue;
        }

        if volltext_active && !trimmed.is_empty() {
            volltext = trimmed.to_string();
        }

        if zeitstempel_active && !trimmed.is_empty() {
            if let Some(caps) = segment_re.captures(line) {
                segmente.push(TranscriptSegment {
                    start: caps[1].to_string(),
                    ende: caps[2].to_string(),
                    text: caps[3].trim().to_string(),
                });
            }
        }
    }

    SceneTranscript {
        scene_id: scene_id.clone(),
        metadata,
        volltext,
        segmente,
    }
}

/// `rest` is everything after the metadata key's trailing colon; the
/// separating space before the value is trimmed here.
fn strip_value(rest: &str) -> String {
    rest.trim().to_string()
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
