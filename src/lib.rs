//! # reframe
//!
//! Turn a sequence of frames into an animation. Frames come from a
//! directory of still images, an animated GIF, or a video file; each frame
//! can be resized, overlaid, rotated, and padded; the result is written as
//! an animated GIF or a video, optionally split into several files.
//!
//! Decoding and video encoding go through FFmpeg via the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate; still
//! images and GIFs use [`image`] and [`gif`](https://crates.io/crates/gif).
//!
//! ## Quick Start
//!
//! ### Image folder to GIF
//!
//! ```no_run
//! use reframe::{ExtractionRange, PipelineConfig, PipelineDriver};
//!
//! let config = PipelineConfig::new("shots/")
//!     .with_extension("png")
//!     .with_range(ExtractionRange::new(0, Some(49)));
//! let report = PipelineDriver::new(config).run()?;
//! println!("{:?}", report.outputs);
//! # Ok::<(), reframe::ReframeError>(())
//! ```
//!
//! ### Every fourth video frame, half size, rotated, as an MP4
//!
//! ```no_run
//! use reframe::{ContainerKind, OutputSpec, PipelineConfig, PipelineDriver, Resize, TransformSpec};
//!
//! let transforms = TransformSpec::new()
//!     .with_resize(Resize::Factor(0.5))
//!     .with_rotation(90.0);
//! let config = PipelineConfig::new("clip.mov")
//!     .with_skip(4)
//!     .with_transforms(transforms)
//!     .with_output(OutputSpec::new(ContainerKind::Video).with_fps(24.0));
//! PipelineDriver::new(config).run()?;
//! # Ok::<(), reframe::ReframeError>(())
//! ```
//!
//! ### Split a GIF into three GIFs
//!
//! ```no_run
//! use reframe::{OutputSpec, PipelineConfig, PipelineDriver};
//!
//! let config = PipelineConfig::new("long.gif")
//!     .with_output(OutputSpec::default().with_partitions(3).with_suffix("part"));
//! let report = PipelineDriver::new(config).run()?;
//! assert_eq!(report.outputs.len(), 3);
//! # Ok::<(), reframe::ReframeError>(())
//! ```
//!
//! ## Pipeline
//!
//! `FrameSource -> TransformChain -> FrameSink`, driven by
//! [`PipelineDriver`]. Container sources are decoded into a temporary
//! frame cache in buffered mode; streaming mode (the default) keeps one
//! frame in flight. Every failure aborts the run and reports the stage it
//! happened in.
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `rayon` | Transform buffered frames on the rayon thread pool |
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

pub mod animated;
pub mod cache;
pub mod codec;
pub mod concat;
pub mod config;
mod conversion;
pub mod directory;
pub mod error;
pub mod frame;
pub mod padding;
#[cfg(feature = "rayon")]
mod parallel;
pub mod pipeline;
pub mod progress;
pub mod sink;
pub mod source;
pub mod transform;
pub mod video;

pub use animated::AnimatedImageSource;
pub use cache::{TempFrameCache, frame_file_name};
pub use codec::{CodecLogLevel, set_codec_log_level};
pub use concat::ConcatSource;
pub use config::{
    ContainerKind, ExtractionRange, OutputSpec, PipelineConfig, ProcessingMode, TailImage,
};
pub use directory::DirectorySource;
pub use error::{PipelineStage, ReframeError};
pub use frame::{Frame, IndexedFrame, MAX_FRAME_PIXELS, read_frame, write_frame};
pub use padding::{BorderMode, Padding};
pub use pipeline::{PipelineDriver, RunReport};
pub use progress::{CancellationToken, ProgressCallback, ProgressInfo};
pub use sink::{FrameEncoder, FrameSink, GifWriter, VideoCodec, VideoWriter, partition_sizes};
pub use source::{FrameSelection, FrameSource, FrameStream, SourceKind, open_source};
pub use transform::{
    DEFAULT_OVERLAY_CUTOFF, Overlay, Resize, Rotation, TransformChain, TransformSpec,
    TransformStep,
};
pub use video::VideoSource;
