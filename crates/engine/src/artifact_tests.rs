// SPDX-License-Identifier: MIT

use super::*;

#[test]
fn derives_all_artifact_paths_from_scene_id() {
    let watched_dir = Path::new("/tmp/sessions/transkripte");
    let output_dir = Path::new("/tmp/sessions/scene");
    let scene_id = SceneId::new("scene_20250620_sz001");
    let paths = ArtifactPaths::for_scene(watched_dir, output_dir, &scene_id);

    assert_eq!(paths.transcript, watched_dir.join("scene_20250620_sz001_transkript.txt"));
    assert_eq!(paths.metadata, output_dir.join("scene_20250620_sz001_metadata.json"));
    assert_eq!(paths.image, output_dir.join("scene_20250620_sz001_image.png"));
    assert_eq!(paths.error, output_dir.join("scene_20250620_sz001_error.json"));
}

#[test]
fn output_pair_complete_requires_both_metadata_and_image() {
    let dir = tempfile::tempdir().expect("tempdir");
    let scene_id = SceneId::new("scene_001");
    let paths = ArtifactPaths::for_scene(dir.path(), dir.path(), &scene_id);
    assert!(!paths.output_pair_complete());

    std::fs::write(&paths.metadata, "{}").expect("write metadata");
    assert!(!paths.output_pair_complete());

    std::fs::write(&paths.image, []).expect("write image");
    assert!(paths.output_pair_complete());
}
