//! End-to-end run against a system ffmpeg/ffprobe.
//!
//! Needs both tools on PATH, built with libwebp:
//! `cargo test -p sprite_core --test ffmpeg_smoke -- --ignored`

use std::process::Command;

use sprite_core::engine::{FfmpegEngine, MediaEngine};
use sprite_core::{SpriteJobParams, SpritePipeline, VideoAsset};

fn make_test_video(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("testsrc.mp4");
    let status = Command::new("ffmpeg")
        .args(["-hide_banner", "-loglevel", "error", "-f", "lavfi", "-i"])
        .arg("testsrc=duration=4:size=320x240:rate=25")
        .args(["-pix_fmt", "yuv420p", "-y"])
        .arg(&path)
        .status()
        .expect("ffmpeg on PATH");
    assert!(status.success(), "failed to create test video");
    path
}

#[test]
#[ignore = "requires ffmpeg and ffprobe on PATH"]
fn generates_webp_sprite_sheet() {
    let dir = tempfile::tempdir().unwrap();
    let video = make_test_video(dir.path());

    let mut engine = FfmpegEngine::new("ffmpeg", "ffprobe", false).unwrap();
    let asset = VideoAsset::from_path(&video).unwrap();
    let params = SpriteJobParams::new(4, 3).unwrap();

    let sprite = SpritePipeline::default()
        .process(&mut engine, asset, params, |_| {})
        .unwrap();

    assert_eq!(&sprite.bytes[0..4], b"RIFF");
    assert_eq!(&sprite.bytes[8..12], b"WEBP");
    // 100 frames / 12 cells
    assert_eq!(sprite.frame_step, 8);
    assert!(engine.list_files().unwrap().is_empty());
}

#[test]
#[ignore = "requires ffmpeg and ffprobe on PATH"]
fn corrupt_input_fails_without_poisoning_engine() {
    let dir = tempfile::tempdir().unwrap();
    let video = make_test_video(dir.path());
    let mut engine = FfmpegEngine::new("ffmpeg", "ffprobe", false).unwrap();
    let params = SpriteJobParams::new(2, 2).unwrap();

    let garbage = VideoAsset::new("broken.mp4", "video/mp4", vec![0u8; 4096]);
    assert!(SpritePipeline::default()
        .process(&mut engine, garbage, params, |_| {})
        .is_err());

    let asset = VideoAsset::from_path(&video).unwrap();
    let sprite = SpritePipeline::default()
        .process(&mut engine, asset, params, |_| {})
        .unwrap();
    assert!(!sprite.bytes.is_empty());
}
