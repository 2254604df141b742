//! Run configuration.
//!
//! [`PipelineConfig`] is a by-value builder holding everything one run of
//! the [`PipelineDriver`](crate::PipelineDriver) needs: which frames to
//! read, how to transform them, and where to write them. There is no
//! process-wide state; two drivers with two configs never interfere.
//!
//! # Example
//!
//! ```no_run
//! use reframe::{
//!     ContainerKind, ExtractionRange, OutputSpec, PipelineConfig, PipelineDriver, Resize,
//!     TransformSpec,
//! };
//!
//! let config = PipelineConfig::new("clip.mp4")
//!     .with_skip(4)
//!     .with_range(ExtractionRange::new(0, Some(199)))
//!     .with_transforms(TransformSpec::new().with_resize(Resize::Factor(0.5)))
//!     .with_output(OutputSpec::new(ContainerKind::Gif).with_fps(15.0));
//!
//! let report = PipelineDriver::new(config).run()?;
//! println!("wrote {:?}", report.outputs);
//! # Ok::<(), reframe::ReframeError>(())
//! ```

use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::error::ReframeError;
use crate::progress::{CancellationToken, NoOpProgress, ProgressCallback};
use crate::sink::VideoCodec;
use crate::source::SourceKind;
use crate::transform::TransformSpec;

/// Default output frame rate.
pub const DEFAULT_FPS: f64 = 30.0;

/// Default output file name.
pub const DEFAULT_OUTPUT_NAME: &str = "result.gif";

/// Inclusive bounds on the source indices to materialise.
///
/// `end = None` means "until the source runs out".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExtractionRange {
    pub start: u64,
    pub end: Option<u64>,
}

impl ExtractionRange {
    pub fn new(start: u64, end: Option<u64>) -> Self {
        Self { start, end }
    }

    /// Every index of the source.
    pub fn full() -> Self {
        Self::default()
    }

    pub fn contains(&self, index: u64) -> bool {
        index >= self.start && self.end.is_none_or(|end| index <= end)
    }

    /// `true` once `index` lies beyond the end bound.
    pub fn is_past_end(&self, index: u64) -> bool {
        self.end.is_some_and(|end| index > end)
    }

    pub(crate) fn validate(&self) -> Result<(), ReframeError> {
        match self.end {
            Some(end) if self.start > end => Err(ReframeError::InvalidConfiguration(format!(
                "start index {} is greater than end index {end}",
                self.start
            ))),
            _ => Ok(()),
        }
    }
}

impl Display for ExtractionRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self.end {
            Some(end) => write!(f, "{}..={end}", self.start),
            None => write!(f, "{}..", self.start),
        }
    }
}

/// Output animation family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContainerKind {
    /// Palette-based animated GIF.
    #[default]
    Gif,
    /// A video container (MP4, MKV, AVI, MOV).
    Video,
}

impl ContainerKind {
    /// Infer the kind from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "gif" => Some(ContainerKind::Gif),
            "mp4" | "m4v" | "mov" | "mkv" | "avi" => Some(ContainerKind::Video),
            _ => None,
        }
    }

    /// Extension used when the output name has none.
    pub fn default_extension(self) -> &'static str {
        match self {
            ContainerKind::Gif => "gif",
            ContainerKind::Video => "mp4",
        }
    }
}

/// Where and how the output animations are written.
#[derive(Debug, Clone)]
pub struct OutputSpec {
    pub kind: ContainerKind,
    /// Frames per second. Must be finite and positive.
    pub fps: f64,
    /// Explicit output file, or the directory to place `name` in. `None`
    /// places the output next to the source.
    pub path: Option<PathBuf>,
    /// File name used when `path` is not a file path.
    pub name: String,
    /// Number of sibling output files to split the frames into.
    pub partition_count: usize,
    /// Appended to each output file stem.
    pub suffix: Option<String>,
    /// Video codec. `None` picks one from the output extension.
    pub codec: Option<VideoCodec>,
    /// GIF loop count. `None` loops forever.
    pub repeat: Option<u16>,
}

impl Default for OutputSpec {
    fn default() -> Self {
        Self::new(ContainerKind::Gif)
    }
}

impl OutputSpec {
    pub fn new(kind: ContainerKind) -> Self {
        Self {
            kind,
            fps: DEFAULT_FPS,
            path: None,
            name: DEFAULT_OUTPUT_NAME.to_string(),
            partition_count: 1,
            suffix: None,
            codec: None,
            repeat: None,
        }
    }

    #[must_use]
    pub fn with_fps(mut self, fps: f64) -> Self {
        self.fps = fps;
        self
    }

    #[must_use]
    pub fn with_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_partitions(mut self, count: usize) -> Self {
        self.partition_count = count;
        self
    }

    #[must_use]
    pub fn with_suffix<S: Into<String>>(mut self, suffix: S) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    #[must_use]
    pub fn with_codec(mut self, codec: VideoCodec) -> Self {
        self.codec = Some(codec);
        self
    }

    #[must_use]
    pub fn with_repeat(mut self, repeat: Option<u16>) -> Self {
        self.repeat = repeat;
        self
    }

    /// Resolve the output file for a run reading from `source`.
    ///
    /// - an explicit `path` with an animation extension is the output file;
    /// - an explicit `path` without one is a directory holding `name`;
    /// - otherwise `name` goes next to a source file, or next to a source
    ///   directory (in its parent).
    ///
    /// The file always carries an extension of `kind`: a missing one is
    /// appended, and one of the other kind is replaced (`anim.gif` becomes
    /// `anim.mp4` for video output, `clip.mp4` becomes `clip.gif` for GIF).
    pub fn resolved_path(&self, source: &Path) -> PathBuf {
        if let Some(path) = &self.path {
            if ContainerKind::from_path(path).is_some() {
                return self.with_kind_extension(path);
            }
            return path.join(self.with_kind_extension(Path::new(&self.name)));
        }

        // A directory source's parent is where the directory itself lives.
        let directory = source
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        directory.join(self.with_kind_extension(Path::new(&self.name)))
    }

    fn with_kind_extension(&self, file: &Path) -> PathBuf {
        let extension = self.kind.default_extension();
        match ContainerKind::from_path(file) {
            Some(kind) if kind == self.kind => file.to_path_buf(),
            Some(_) => {
                log::debug!("Switching {} to .{extension} for {:?} output", file.display(), self.kind);
                file.with_extension(extension)
            }
            None => {
                let mut name = file.as_os_str().to_owned();
                name.push(".");
                name.push(extension);
                PathBuf::from(name)
            }
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ReframeError> {
        if !(self.fps.is_finite() && self.fps > 0.0) {
            return Err(ReframeError::InvalidConfiguration(format!(
                "fps {} must be > 0",
                self.fps
            )));
        }
        if self.partition_count == 0 {
            return Err(ReframeError::InvalidConfiguration(
                "partition count must be at least 1".to_string(),
            ));
        }
        if self.name.trim().is_empty() {
            return Err(ReframeError::InvalidConfiguration(
                "output name is empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// How frames travel from transform to encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingMode {
    /// Each frame is transformed and encoded before the next one is read.
    /// Memory stays bounded by one frame.
    #[default]
    Streaming,
    /// Every container frame is extracted to the frame cache, then all
    /// frames are transformed into memory before encoding. Required for
    /// multi-file output.
    Buffered,
}

/// An image appended `times` times after the last frame, resized to the
/// output size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailImage {
    pub path: PathBuf,
    pub times: usize,
}

impl TailImage {
    pub fn new<P: Into<PathBuf>>(path: P, times: usize) -> Self {
        Self {
            path: path.into(),
            times,
        }
    }
}

impl FromStr for TailImage {
    type Err = ReframeError;

    /// Parse `path,times`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (path, times) = value.rsplit_once(',').ok_or_else(|| {
            ReframeError::InvalidConfiguration(format!("tail image '{value}' must be path,times"))
        })?;
        let times = times.trim().parse::<usize>().map_err(|_| {
            ReframeError::InvalidConfiguration(format!(
                "tail image repeat count '{times}' is not a number"
            ))
        })?;
        Ok(TailImage::new(path.trim(), times))
    }
}

/// Everything one pipeline run needs.
#[derive(Clone)]
pub struct PipelineConfig {
    /// A directory of still images, or an animated-image / video file.
    pub(crate) source: PathBuf,
    /// Only list directory files with this extension.
    pub(crate) extension: Option<String>,
    /// Overrides extension-based source detection.
    pub(crate) source_kind: Option<SourceKind>,
    pub(crate) range: ExtractionRange,
    /// Keep every `skip`-th frame of a container source.
    pub(crate) skip: u64,
    /// Also decimate image-directory sources.
    pub(crate) decimate_directories: bool,
    pub(crate) transforms: TransformSpec,
    pub(crate) tail: Option<TailImage>,
    pub(crate) output: OutputSpec,
    pub(crate) mode: ProcessingMode,
    /// Keep the extracted frame cache after a successful run.
    pub(crate) keep_extracted: bool,
    /// Parent directory for the frame cache. Defaults to the source's.
    pub(crate) cache_root: Option<PathBuf>,
    pub(crate) progress: Arc<dyn ProgressCallback>,
    pub(crate) cancellation: Option<CancellationToken>,
    pub(crate) batch_size: u64,
}

impl Debug for PipelineConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("PipelineConfig")
            .field("source", &self.source)
            .field("extension", &self.extension)
            .field("source_kind", &self.source_kind)
            .field("range", &self.range)
            .field("skip", &self.skip)
            .field("decimate_directories", &self.decimate_directories)
            .field("transforms", &self.transforms)
            .field("tail", &self.tail)
            .field("output", &self.output)
            .field("mode", &self.mode)
            .field("keep_extracted", &self.keep_extracted)
            .field("cache_root", &self.cache_root)
            .field("has_cancellation", &self.cancellation.is_some())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl PipelineConfig {
    /// A config reading every frame of `source` into `result.gif` at 30 fps.
    pub fn new<P: Into<PathBuf>>(source: P) -> Self {
        Self {
            source: source.into(),
            extension: None,
            source_kind: None,
            range: ExtractionRange::full(),
            skip: 1,
            decimate_directories: false,
            transforms: TransformSpec::default(),
            tail: None,
            output: OutputSpec::default(),
            mode: ProcessingMode::default(),
            keep_extracted: false,
            cache_root: None,
            progress: Arc::new(NoOpProgress),
            cancellation: None,
            batch_size: 1,
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn output(&self) -> &OutputSpec {
        &self.output
    }

    /// Only list files with this extension (with or without the dot).
    /// `".*"` and `"*"` mean every file.
    #[must_use]
    pub fn with_extension<S: AsRef<str>>(mut self, extension: S) -> Self {
        let extension = extension.as_ref().trim().trim_start_matches('.');
        self.extension = match extension {
            "" | "*" => None,
            other => Some(other.to_string()),
        };
        self
    }

    #[must_use]
    pub fn with_source_kind(mut self, kind: SourceKind) -> Self {
        self.source_kind = Some(kind);
        self
    }

    #[must_use]
    pub fn with_range(mut self, range: ExtractionRange) -> Self {
        self.range = range;
        self
    }

    /// Keep one frame out of `skip`. Zero is rejected when the run starts.
    #[must_use]
    pub fn with_skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    /// Apply `skip` to image directories as well. Off by default:
    /// directories are never decimated unless asked.
    #[must_use]
    pub fn with_decimate_directories(mut self, decimate: bool) -> Self {
        self.decimate_directories = decimate;
        self
    }

    #[must_use]
    pub fn with_transforms(mut self, transforms: TransformSpec) -> Self {
        self.transforms = transforms;
        self
    }

    #[must_use]
    pub fn with_tail(mut self, tail: TailImage) -> Self {
        self.tail = Some(tail);
        self
    }

    #[must_use]
    pub fn with_output(mut self, output: OutputSpec) -> Self {
        self.output = output;
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: ProcessingMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_keep_extracted(mut self, keep: bool) -> Self {
        self.keep_extracted = keep;
        self
    }

    #[must_use]
    pub fn with_cache_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.cache_root = Some(root.into());
        self
    }

    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Fire the progress callback every `size` frames. Clamped to 1.
    #[must_use]
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// The mode the run will actually use: multi-file output needs the
    /// whole frame list up front.
    pub fn effective_mode(&self) -> ProcessingMode {
        if self.output.partition_count > 1 {
            ProcessingMode::Buffered
        } else {
            self.mode
        }
    }

    /// Check the settings that do not depend on the source.
    ///
    /// # Errors
    ///
    /// [`ReframeError::InvalidConfiguration`] naming the bad setting.
    pub fn validate(&self) -> Result<(), ReframeError> {
        if self.skip == 0 {
            return Err(ReframeError::InvalidConfiguration(
                "decimation factor must be at least 1".to_string(),
            ));
        }
        self.range.validate()?;
        self.output.validate()?;
        if let Some(tail) = &self.tail {
            if tail.times == 0 {
                return Err(ReframeError::InvalidConfiguration(
                    "tail image repeat count must be at least 1".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }
}
