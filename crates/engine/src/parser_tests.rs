// SPDX-License-Identifier: MIT

use super::*;
use tempfile::tempdir;

const SAMPLE: &str = "Transkript für: session_20250620.wav\nDatum: 2025-06-20\nSprache: de\nKonfidenz: 0.92\nDauer: 312.4s\n\nVOLLTEXT:\nDie Abenteurer betreten die Ruine.\nSie entdecken eine goldene Statue.\n\nZEITGESTEMPELTE SEGMENTE:\n[00:00.00 - 00:05.20] Die Tür knarrt laut.\n[00:05.20 - 00:12.80] Ein kalter Wind weht durch den Gang.\n";

fn write_transcript(dir: &Path, filename: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(filename);
    std::fs::write(&path, contents).expect("write transcript");
    path
}

#[test]
fn parses_metadata_fields() {
    let dir = tempdir().expect("tempdir");
    let path = write_transcript(dir.path(), "scene_001_transkript.txt", SAMPLE);

    let transcript = parse_transcript(&path).expect("parse");
    assert_eq!(transcript.metadata.audio_file.as_deref(), Some("session_20250620.wav"));
    assert_eq!(transcript.metadata.datum.as_deref(), Some("2025-06-20"));
    assert_eq!(transcript.metadata.sprache.as_deref(), Some("de"));
    assert_eq!(transcript.metadata.konfidenz.as_deref(), Some("0.92"));
    assert_eq!(transcript.metadata.dauer.as_deref(), Some("312.4s"));
}

#[test]
fn keeps_only_last_volltext_line() {
    let dir = tempdir().expect("tempdir");
    let path = write_transcript(dir.path(), "scene_001_transkript.txt", SAMPLE);

    let transcript = parse_transcript(&path).expect("parse");
    assert_eq!(transcript.volltext, "Sie entdecken eine goldene Statue.");
}

#[test]
fn parses_timestamped_segments() {
    let dir = tempdir().expect("tempdir");
    let path = write_transcript(dir.path(), "scene_001_transkript.txt", SAMPLE);

    let transcript = parse_transcript(&path).expect("parse");
    assert_eq!(transcript.segmente.len(), 2);
    assert_eq!(transcript.segmente[0].start, "00:00.00");
    assert_eq!(transcript.segmente[0].ende, "00:05.20");
    assert_eq!(transcript.segmente[0].text, "Die Tür knarrt laut.");
}

#[test]
fn derives_scene_id_from_filename() {
    let dir = tempdir().expect("tempdir");
    let path = write_transcript(dir.path(), "scene_20250620_sz007_transkript.txt", SAMPLE);

    let transcript = parse_transcript(&path).expect("parse");
    assert_eq!(transcript.scene_id.as_str(), "scene_20250620_sz007");
}

#[test]
fn segmente_als_text_reconstructs_bracketed_lines() {
    let dir = tempdir().expect("tempdir");
    let path = write_transcript(dir.path(), "scene_001_transkript.txt", SAMPLE);

    let transcript = parse_transcript(&path).expect("parse");
    let text = transcript.segmente_als_text();
    assert!(text.contains("[00:00.00 - 00:05.20] Die Tür knarrt laut."));
}

#[test]
fn nur_text_joins_segments_with_spaces() {
    let dir = tempdir().expect("tempdir");
    let path = write_transcript(dir.path(), "scene_001_transkript.txt", SAMPLE);

    let transcript = parse_transcript(&path).expect("parse");
    assert_eq!(
        transcript.nur_text(),
        "Die Tür knarrt laut. Ein kalter Wind weht durch den Gang."
    );
}

#[test]
fn missing_file_is_reported() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("does_not_exist_transkript.txt");
    let result = parse_transcript(&path);
    assert!(matches!(result, Err(ParseError::NotFound { .. })));
}
