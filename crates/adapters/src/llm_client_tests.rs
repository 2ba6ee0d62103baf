// SPDX-License-Identifier: MIT

use super::*;

const HHMM: &str = "1430";

#[test]
fn parses_structured_json_response() {
    let response = r#"{"szenenbeschreibung": "a dragon guards a hoard", "dndstyle_prompt": "dndstyle, a dragon guarding a hoard of gold, dramatic lighting", "wichtige_elemente": ["dragon", "gold"], "stimmung": "tense"}"#;
    let parsed = parse_llm_response(response, HHMM);
    assert!(!parsed.is_fallback());
    match parsed {
        LlmResponse::Structured(desc) => {
            assert!(desc.dndstyle_prompt.starts_with("dndstyle, a dragon"));
            assert_eq!(desc.wichtige_elemente, vec!["dragon", "gold"]);
            assert_eq!(desc.stimmung, "tense");
        }
        other => panic!("expected Structured, got {other:?}"),
    }
}

#[test]
fn strips_think_tags_before_parsing() {
    let response = "<think>the party is in a cave, I should describe it</think>\n{\"szenenbeschreibung\": \"a cave\", \"dndstyle_prompt\": \"dndstyle, adventurers in a dark cave\", \"wichtige_elemente\": [], \"stimmung\": \"ominous\"}";
    let parsed = parse_llm_response(response, HHMM);
    assert_eq!(parsed.prompt(), "dndstyle, adventurers in a dark cave");
}

#[test]
fn structured_prompt_missing_trigger_token_falls_through() {
    let response = r#"{"szenenbeschreibung": "x", "dndstyle_prompt": "a dragon guarding gold", "wichtige_elemente": [], "stimmung": "x"}"#;
    let parsed = parse_llm_response(response, HHMM);
    assert!(parsed.is_fallback());
}

#[test]
fn recovers_structured_text_prompt_and_name_as_secondary_fallback() {
    let response = "DNDSTYLE IMAGE PROMPT: dndstyle, a dragon guarding a hoard of gold, dramatic lighting\nIMAGE NAME: Dragon Hoard (Secret Chamber)";
    let parsed = parse_llm_response(response, HHMM);
    match parsed {
        LlmResponse::Raw { prompt, name } => {
            assert!(prompt.starts_with("dndstyle, a dragon"));
            assert_eq!(name, "1430_Dragon_Hoard");
        }
        other => panic!("expected Raw, got {other:?}"),
    }
}

#[test]
fn falls_back_to_bare_dndstyle_match() {
    let response = "I think the scene shows dndstyle a knight fighting a troll in the woods. The end.";
    let parsed = parse_llm_response(response, HHMM);
    match parsed {
        LlmResponse::Raw { prompt, name } => {
            assert!(prompt.starts_with("dndstyle a knight fighting a troll in the woods"));
            assert_eq!(name, "1430_generated_scene");
        }
        other => panic!("expected Raw, got {other:?}"),
    }
}

#[test]
fn falls_back_to_hardcoded_when_nothing_matches() {
    let response = "The weather was nice today and nothing much happened.";
    let parsed = parse_llm_response(response, HHMM);
    match parsed {
        LlmResponse::Raw { prompt, name } => {
            assert_eq!(
                prompt,
                "dndstyle fantasy adventure scene, dungeons and dragons style illustration"
            );
            assert_eq!(name, "1430_fallback_scene");
        }
        other => panic!("expected Raw, got {other:?}"),
    }
}

#[yare::parameterized(
    too_short = { "**", "1430_generated_scene" },
    collapses_underscores = { "throne   room!!!hall", "1430_throne_room_hall" },
)]
fn sanitize_scene_name_exact_cases(raw: &str, expected: &str) {
    assert_eq!(sanitize_scene_name(raw, HHMM), expected);
}

#[test]
fn sanitizes_non_ascii_and_punctuation() {
    let sanitized = sanitize_scene_name("Düsterer Tempel!!", HHMM);
    assert!(sanitized.starts_with("1430_"));
    assert!(sanitized.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
}

#[test]
fn truncates_long_names_to_35_chars_plus_prefix() {
    let long_name = "a".repeat(60);
    let sanitized = sanitize_scene_name(&long_name, HHMM);
    let without_prefix = sanitized.strip_prefix("1430_").expect("has prefix");
    assert!(without_prefix.len() <= 35);
}
