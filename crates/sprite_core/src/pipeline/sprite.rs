//! Sprite pipeline runner.

use tracing::{debug, info, warn};

use crate::engine::{EngineError, MediaEngine};
use crate::models::{SpriteJobParams, SpriteResult, VideoAsset, SPRITE_MEDIA_TYPE};

use super::errors::{ProcessError, Stage};
use super::selection::FrameSelection;

/// Fixed output options for the two jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpriteOptions {
    /// Width of each thumbnail in pixels.
    pub thumbnail_width: u32,
    /// Height of each thumbnail in pixels.
    pub thumbnail_height: u32,
    /// WebP quality (0-100).
    pub webp_quality: u8,
}

impl Default for SpriteOptions {
    fn default() -> Self {
        Self {
            thumbnail_width: 320,
            thumbnail_height: 240,
            webp_quality: 80,
        }
    }
}

/// Names of the three working entries of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingNames {
    pub input: String,
    pub intermediate: String,
    pub output: String,
}

impl WorkingNames {
    /// Deterministic names for an asset: `input.<ext>`, `sprite.png`, `sprite.webp`.
    pub fn for_asset(asset: &VideoAsset) -> Self {
        Self {
            input: format!("input.{}", asset.extension()),
            intermediate: "sprite.png".to_string(),
            output: "sprite.webp".to_string(),
        }
    }

    fn all(&self) -> [&str; 3] {
        [&self.input, &self.intermediate, &self.output]
    }
}

/// Runs the two-job sprite pipeline against an engine.
#[derive(Debug, Clone, Default)]
pub struct SpritePipeline {
    options: SpriteOptions,
}

impl SpritePipeline {
    pub fn new(options: SpriteOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SpriteOptions {
        &self.options
    }

    /// Produce a sprite sheet from `asset`.
    ///
    /// `on_stage` is called as each stage starts. The asset is consumed;
    /// its bytes are released as soon as they have been handed to the
    /// engine.
    pub fn process<E: MediaEngine + ?Sized>(
        &self,
        engine: &mut E,
        asset: VideoAsset,
        params: SpriteJobParams,
        on_stage: impl Fn(Stage),
    ) -> Result<SpriteResult, ProcessError> {
        if !asset.is_video() {
            return Err(ProcessError::invalid_input(format!(
                "{} is not a video file ({})",
                asset.name, asset.media_type
            )));
        }

        let names = WorkingNames::for_asset(&asset);
        info!(
            "Generating {}x{} sprite sheet from {} ({} bytes)",
            params.columns(),
            params.rows(),
            asset.name,
            asset.size()
        );

        let result = self.run_stages(engine, asset, params, &names, &on_stage);
        cleanup(engine, &names);

        match &result {
            Ok(sprite) => info!("Sprite sheet ready ({} bytes)", sprite.bytes.len()),
            Err(e) => warn!("Sprite generation failed: {}", e),
        }
        result
    }

    fn run_stages<E: MediaEngine + ?Sized>(
        &self,
        engine: &mut E,
        asset: VideoAsset,
        params: SpriteJobParams,
        names: &WorkingNames,
        on_stage: &impl Fn(Stage),
    ) -> Result<SpriteResult, ProcessError> {
        on_stage(Stage::WriteInput);
        engine
            .write_file(&names.input, &asset.bytes)
            .map_err(|e| stage_error(Stage::WriteInput, e))?;
        drop(asset);

        on_stage(Stage::ProbeFrames);
        let frame_count = engine
            .count_frames(&names.input)
            .map_err(|e| stage_error(Stage::ProbeFrames, e))?;
        let selection = FrameSelection::plan(frame_count, params)?;
        debug!(
            "Frame selection: {} source frames, step {}, {} cells filled",
            selection.source_frames,
            selection.step,
            selection.filled_cells()
        );

        on_stage(Stage::TileFrames);
        engine
            .exec(&self.tile_args(names, &selection, params))
            .map_err(|e| stage_error(Stage::TileFrames, e))?;

        on_stage(Stage::EncodeWebp);
        engine
            .exec(&self.encode_args(names))
            .map_err(|e| stage_error(Stage::EncodeWebp, e))?;

        on_stage(Stage::ReadOutput);
        let bytes = engine
            .read_file(&names.output)
            .map_err(|e| stage_error(Stage::ReadOutput, e))?;
        if bytes.is_empty() {
            return Err(ProcessError::job_failed(
                Stage::ReadOutput,
                "engine produced an empty image",
            ));
        }

        Ok(SpriteResult {
            bytes,
            media_type: SPRITE_MEDIA_TYPE,
            params,
            frame_step: selection.step,
        })
    }

    /// Arguments of job 1: select, scale and tile into a single still.
    pub fn tile_args(
        &self,
        names: &WorkingNames,
        selection: &FrameSelection,
        params: SpriteJobParams,
    ) -> Vec<String> {
        vec![
            "-i".to_string(),
            names.input.clone(),
            "-vf".to_string(),
            selection.filter(
                self.options.thumbnail_width,
                self.options.thumbnail_height,
                params,
            ),
            "-frames:v".to_string(),
            "1".to_string(),
            "-fps_mode".to_string(),
            "vfr".to_string(),
            "-y".to_string(),
            names.intermediate.clone(),
        ]
    }

    /// Arguments of job 2: re-encode the still as WebP.
    pub fn encode_args(&self, names: &WorkingNames) -> Vec<String> {
        vec![
            "-i".to_string(),
            names.intermediate.clone(),
            "-quality".to_string(),
            self.options.webp_quality.to_string(),
            "-y".to_string(),
            names.output.clone(),
        ]
    }
}

fn stage_error(stage: Stage, error: EngineError) -> ProcessError {
    ProcessError::job_failed(stage, error.user_message())
}

/// Delete every working entry that exists. Never fails.
fn cleanup<E: MediaEngine + ?Sized>(engine: &mut E, names: &WorkingNames) {
    for entry in names.all() {
        match engine.delete_file(entry) {
            Ok(()) => debug!("Removed working file {}", entry),
            Err(EngineError::FileNotFound(_)) => {}
            Err(e) => {
                let err = ProcessError::CleanupFailed {
                    entry: entry.to_string(),
                    message: e.to_string(),
                };
                warn!("{}", err);
            }
        }
    }
}
