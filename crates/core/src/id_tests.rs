// SPDX-License-Identifier: MIT

use super::*;

#[test]
fn strips_transkript_suffix() {
    let id = SceneId::from_transcript_filename("scene_20250620_sz001_transkript.txt");
    assert_eq!(id.as_str(), "scene_20250620_sz001");
}

#[test]
fn round_trips_through_filenames() {
    let id = SceneId::new("scene_20250620_sz001");
    assert_eq!(id.transcript_filename(), "scene_20250620_sz001_transkript.txt");
    assert_eq!(id.metadata_filename(), "scene_20250620_sz001_metadata.json");
    assert_eq!(id.image_filename(), "scene_20250620_sz001_image.png");
    assert_eq!(id.error_filename(), "scene_20250620_sz001_error.json");
}

#[test]
fn display_matches_as_str() {
    let id = SceneId::new("scene_x");
    assert_eq!(id.to_string(), id.as_str());
}
