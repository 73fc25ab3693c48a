//! Even frame selection across a video.
//!
//! The tile job keeps frame `n` when `n mod step == 0`, where
//! `step = floor(source_frames / total_frames)`. The step is clamped to at
//! least 1, so a video shorter than the grid uses every frame and leaves
//! the remaining cells blank instead of dividing by zero.

use crate::models::SpriteJobParams;

use super::errors::ProcessError;

/// Selection plan for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSelection {
    /// Frames in the source video.
    pub source_frames: u64,
    /// Thumbnails requested (columns × rows).
    pub total_frames: u32,
    /// Keep every `step`-th frame. Always ≥ 1.
    pub step: u64,
}

impl FrameSelection {
    /// Plan a selection for a probed frame count.
    pub fn plan(source_frames: Option<u64>, params: SpriteJobParams) -> Result<Self, ProcessError> {
        let source_frames = match source_frames {
            Some(0) => {
                return Err(ProcessError::invalid_input(
                    "the video contains no decodable frames",
                ))
            }
            Some(n) => n,
            None => {
                return Err(ProcessError::invalid_input(
                    "could not determine the video's frame count",
                ))
            }
        };

        let total_frames = params.total_frames();
        let step = (source_frames / u64::from(total_frames)).max(1);

        if source_frames < u64::from(total_frames) {
            tracing::warn!(
                "Video has {} frames for {} thumbnails; {} cells will stay blank",
                source_frames,
                total_frames,
                u64::from(total_frames) - source_frames
            );
        }

        Ok(Self {
            source_frames,
            total_frames,
            step,
        })
    }

    /// Number of thumbnails that will actually be filled.
    pub fn filled_cells(&self) -> u64 {
        let selected = self.source_frames.div_ceil(self.step);
        selected.min(u64::from(self.total_frames))
    }

    /// Filtergraph for the tile job.
    pub fn filter(&self, thumb_width: u32, thumb_height: u32, params: SpriteJobParams) -> String {
        format!(
            "select=not(mod(n\\,{})),scale={}:{},tile={}x{}",
            self.step,
            thumb_width,
            thumb_height,
            params.columns(),
            params.rows()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(columns: u32, rows: u32) -> SpriteJobParams {
        SpriteJobParams::new(columns, rows).unwrap()
    }

    #[test]
    fn even_division() {
        let plan = FrameSelection::plan(Some(1200), params(4, 3)).unwrap();
        assert_eq!(plan.step, 100);
        assert_eq!(plan.filled_cells(), 12);
    }

    #[test]
    fn uneven_division_floors() {
        let plan = FrameSelection::plan(Some(130), params(4, 3)).unwrap();
        assert_eq!(plan.step, 10);
        // 13 frames qualify but only 12 cells exist
        assert_eq!(plan.filled_cells(), 12);
    }

    #[test]
    fn short_video_clamps_step() {
        let plan = FrameSelection::plan(Some(5), params(4, 3)).unwrap();
        assert_eq!(plan.step, 1);
        assert_eq!(plan.filled_cells(), 5);
    }

    #[test]
    fn step_never_zero_for_any_grid() {
        for frames in [1u64, 2, 7, 11, 12, 13, 999] {
            for (columns, rows) in [(1, 1), (4, 3), (10, 10), (100, 100)] {
                let plan = FrameSelection::plan(Some(frames), params(columns, rows)).unwrap();
                assert!(plan.step >= 1);
                assert!(plan.filled_cells() <= u64::from(columns * rows));
                assert!(plan.filled_cells() >= 1);
            }
        }
    }

    #[test]
    fn rejects_zero_or_unknown_frames() {
        assert!(matches!(
            FrameSelection::plan(Some(0), params(2, 2)),
            Err(ProcessError::InvalidInput(_))
        ));
        assert!(matches!(
            FrameSelection::plan(None, params(2, 2)),
            Err(ProcessError::InvalidInput(_))
        ));
    }

    #[test]
    fn filter_expression() {
        let plan = FrameSelection::plan(Some(240), params(4, 3)).unwrap();
        assert_eq!(
            plan.filter(320, 240, params(4, 3)),
            "select=not(mod(n\\,20)),scale=320:240,tile=4x3"
        );
    }
}
