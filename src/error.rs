//! Error types for the `reframe` crate.
//!
//! This module defines [`ReframeError`], the unified error type returned by
//! every fallible operation in the crate, and [`PipelineStage`], which the
//! pipeline driver attaches to a failure so the caller can tell which stage
//! gave up. Variants carry the offending path or frame index.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    io::Error as IoError,
    path::PathBuf,
};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

/// A state of the [`PipelineDriver`](crate::PipelineDriver).
///
/// Also used as error context: a failure is reported together with the
/// stage that was active when it happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    /// Nothing has run yet.
    Idle,
    /// Decoding a container source into the temporary frame cache.
    Extracting,
    /// Listing the ordered frame files to process.
    Reading,
    /// Applying the transform chain.
    Transforming,
    /// Appending repeated copies of the end image.
    TailAppend,
    /// Writing output animations.
    Encoding,
    /// Removing (or keeping) the temporary frame cache.
    Cleanup,
    /// The run completed.
    Done,
    /// The run failed.
    Errored,
}

impl Display for PipelineStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            PipelineStage::Idle => "idle",
            PipelineStage::Extracting => "extracting",
            PipelineStage::Reading => "reading",
            PipelineStage::Transforming => "transforming",
            PipelineStage::TailAppend => "tail-append",
            PipelineStage::Encoding => "encoding",
            PipelineStage::Cleanup => "cleanup",
            PipelineStage::Done => "done",
            PipelineStage::Errored => "errored",
        };
        f.write_str(name)
    }
}

/// The unified error type for all `reframe` operations.
///
/// Every error is fatal for the run that produced it: the pipeline never
/// retries or skips a frame.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReframeError {
    /// The source path does not resolve to a file or directory.
    #[error("Source not found: {path}")]
    SourceNotFound {
        /// The path that was given as source.
        path: PathBuf,
    },

    /// The source contains zero decodable frames.
    #[error("Source {path} contains no decodable frames")]
    SourceEmpty {
        /// The empty source.
        path: PathBuf,
    },

    /// Extension, range, and decimation filtering left no frame to process.
    #[error("No frames match {pattern} in {location}")]
    NoFramesMatchFilter {
        /// The listed directory or container file.
        location: PathBuf,
        /// Human-readable description of the filter that matched nothing.
        pattern: String,
    },

    /// A frame cannot be brought to the established output size.
    #[error(
        "Frame {index} has size {}x{}, expected {}x{}: {reason}",
        .actual.0, .actual.1, .expected.0, .expected.1
    )]
    DimensionMismatch {
        /// Source index of the offending frame.
        index: u64,
        /// Established `(width, height)`.
        expected: (u32, u32),
        /// `(width, height)` of the offending frame.
        actual: (u32, u32),
        /// What went wrong.
        reason: String,
    },

    /// An output file could not be written.
    #[error("Failed to encode {path}: {reason}")]
    EncodeFailure {
        /// The output file.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// A frame could not be decoded from its source.
    #[error("Failed to decode frame {index} of {path}: {reason}")]
    DecodeFailure {
        /// The source file.
        path: PathBuf,
        /// Index of the frame being decoded.
        index: u64,
        /// Underlying reason.
        reason: String,
    },

    /// The configuration is inconsistent (zero skip, inverted range, ...).
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A frame index does not fit the fixed-width cache file names.
    #[error("Frame index {index} exceeds the frame cache naming limit")]
    CacheLimitExceeded {
        /// The index that overflowed.
        index: u64,
    },

    /// The run was cancelled via a [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,

    /// A failure annotated with the pipeline stage it happened in.
    #[error("{stage} stage failed: {source}")]
    Stage {
        /// The active stage.
        stage: PipelineStage,
        /// The underlying error.
        #[source]
        source: Box<ReframeError>,
    },

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),
}

impl ReframeError {
    /// Attach stage context. Errors that already carry a stage are kept as-is.
    pub(crate) fn in_stage(self, stage: PipelineStage) -> Self {
        match self {
            ReframeError::Stage { .. } => self,
            other => ReframeError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, with any stage wrapping removed.
    pub fn root(&self) -> &ReframeError {
        match self {
            ReframeError::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    /// The stage this error was reported from, if known.
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            ReframeError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

impl From<FfmpegError> for ReframeError {
    fn from(error: FfmpegError) -> Self {
        ReframeError::FfmpegError(error.to_string())
    }
}
