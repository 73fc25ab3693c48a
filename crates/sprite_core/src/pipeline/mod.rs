//! Command pipeline that turns a video into a WebP sprite sheet.
//!
//! A run issues these stages against a loaded engine, in order:
//!
//! ```text
//! SpritePipeline
//!     ├── write-input   copy the video into the engine's working directory
//!     ├── probe-frames  count frames and plan the selection step
//!     ├── tile-frames   select, scale and tile into sprite.png
//!     ├── encode-webp   re-encode sprite.png as sprite.webp
//!     └── read-output   retrieve the WebP bytes
//! ```
//!
//! All working entries are removed afterwards, whether the run succeeded
//! or not. Cleanup failures are logged and never change the outcome.

mod errors;
mod selection;
mod sprite;

pub use errors::{ProcessError, Stage};
pub use selection::FrameSelection;
pub use sprite::{SpriteOptions, SpritePipeline, WorkingNames};
