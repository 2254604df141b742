//! The pipeline driver.
//!
//! [`PipelineDriver`] runs one configured job through its stages:
//!
//! ```text
//! Idle -> Extracting -> Reading -> Transforming -> TailAppend -> Encoding -> Cleanup -> Done
//!                                  any failure -> Errored
//! ```
//!
//! `Extracting` only runs for container sources and `TailAppend` only when
//! a tail image is configured. In [streaming](ProcessingMode::Streaming)
//! mode frames flow one at a time from decoder to encoder, so encoding
//! overlaps with `Transforming`; `Encoding` then only closes the outputs.
//! In [buffered](ProcessingMode::Buffered) mode each stage completes
//! before the next one starts.
//!
//! The temporary frame cache is owned by the run. It is removed on every
//! exit path, including errors and cancellation, and only survives a
//! successful run that asked to keep it.

use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};

use crate::cache::TempFrameCache;
use crate::config::{PipelineConfig, ProcessingMode, TailImage};
use crate::error::{PipelineStage, ReframeError};
use crate::frame::{Frame, IndexedFrame, read_frame};
use crate::progress::ProgressTracker;
use crate::sink::FrameSink;
use crate::source::{FrameSelection, FrameSource, open_source};
use crate::transform::TransformChain;

#[cfg(feature = "rayon")]
use crate::parallel::transform_files;

/// What a finished run did.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// The mode the run actually used.
    pub mode: ProcessingMode,
    /// Source frames that entered the transform chain.
    pub frames_read: u64,
    /// Frames written across all outputs, tail copies included.
    pub frames_encoded: u64,
    /// Output size shared by every frame.
    pub dimensions: Option<(u32, u32)>,
    /// Files written, in partition order.
    pub outputs: Vec<PathBuf>,
    /// The frame cache directory, when it was kept.
    pub kept_cache: Option<PathBuf>,
    /// Every stage the driver entered, in order.
    pub stages: Vec<PipelineStage>,
}

impl RunReport {
    fn new(mode: ProcessingMode) -> Self {
        Self {
            mode,
            frames_read: 0,
            frames_encoded: 0,
            dimensions: None,
            outputs: Vec::new(),
            kept_cache: None,
            stages: Vec::new(),
        }
    }
}

/// Current stage plus the stages visited so far.
#[derive(Debug, Clone)]
struct StageLog {
    current: PipelineStage,
    history: Vec<PipelineStage>,
}

impl StageLog {
    fn new() -> Self {
        Self {
            current: PipelineStage::Idle,
            history: vec![PipelineStage::Idle],
        }
    }

    fn enter(&mut self, stage: PipelineStage) {
        log::info!("Pipeline stage {} -> {stage}", self.current);
        self.current = stage;
        self.history.push(stage);
    }
}

/// Runs one pipeline job.
///
/// A driver runs once; create a new one for the next job.
///
/// # Example
///
/// ```no_run
/// use reframe::{ExtractionRange, PipelineConfig, PipelineDriver};
///
/// let config = PipelineConfig::new("frames/")
///     .with_extension("png")
///     .with_range(ExtractionRange::new(1, Some(3)));
/// let mut driver = PipelineDriver::new(config);
/// let report = driver.run()?;
/// assert_eq!(report.frames_encoded, 3);
/// # Ok::<(), reframe::ReframeError>(())
/// ```
#[derive(Debug)]
pub struct PipelineDriver {
    config: PipelineConfig,
    source: Option<Box<dyn FrameSource>>,
    stages: StageLog,
}

impl PipelineDriver {
    /// A driver that opens the config's source path when it runs.
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            source: None,
            stages: StageLog::new(),
        }
    }

    /// A driver reading from an already constructed source, such as a
    /// [`ConcatSource`](crate::ConcatSource). The config's source path
    /// still decides where default outputs go.
    pub fn with_source(config: PipelineConfig, source: Box<dyn FrameSource>) -> Self {
        Self {
            config,
            source: Some(source),
            stages: StageLog::new(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The stage the driver is in (or stopped in).
    pub fn state(&self) -> PipelineStage {
        self.stages.current
    }

    /// Every stage entered so far.
    pub fn history(&self) -> &[PipelineStage] {
        &self.stages.history
    }

    /// Run the job to completion.
    ///
    /// # Errors
    ///
    /// Any failure stops the run. The error is wrapped in
    /// [`ReframeError::Stage`] naming the stage that was active, and the
    /// driver ends in [`PipelineStage::Errored`].
    pub fn run(&mut self) -> Result<RunReport, ReframeError> {
        if self.stages.current != PipelineStage::Idle {
            return Err(ReframeError::InvalidConfiguration(
                "this driver has already run".to_string(),
            ));
        }

        match self.execute() {
            Ok(mut report) => {
                self.stages.enter(PipelineStage::Done);
                report.stages = self.stages.history.clone();
                log::info!(
                    "Encoded {} frame(s) into {} file(s)",
                    report.frames_encoded,
                    report.outputs.len()
                );
                Ok(report)
            }
            Err(error) => {
                let stage = self.stages.current;
                self.stages.enter(PipelineStage::Errored);
                log::debug!("Pipeline failed in {stage} stage: {error}");
                Err(error.in_stage(stage))
            }
        }
    }

    fn execute(&mut self) -> Result<RunReport, ReframeError> {
        let config = &self.config;
        config.validate()?;

        if let Some(tail) = &config.tail {
            if !tail.path.is_file() {
                return Err(ReframeError::SourceNotFound {
                    path: tail.path.clone(),
                });
            }
        }

        let source = match self.source.take() {
            Some(source) => source,
            None => open_source(
                &config.source,
                config.source_kind,
                config.extension.as_deref(),
            )?,
        };
        let chain = TransformChain::from_spec(&config.transforms)?;

        let is_container = source.kind().is_container();
        let selection = if is_container || config.decimate_directories {
            FrameSelection::new(config.range, config.skip)
        } else {
            FrameSelection::new(config.range, 1)
        };

        let run = Run {
            config,
            source: source.as_ref(),
            chain: &chain,
            selection,
            output_path: config.output.resolved_path(&config.source),
            cache_root: cache_root(config, source.path()),
        };
        log::debug!(
            "Running {:?} pipeline on {} ({} transform step(s)) -> {}",
            config.effective_mode(),
            source.path().display(),
            chain.steps().len(),
            run.output_path.display()
        );

        match config.effective_mode() {
            ProcessingMode::Streaming => run.streaming(&mut self.stages),
            ProcessingMode::Buffered => run.buffered(&mut self.stages),
        }
    }
}

fn cache_root(config: &PipelineConfig, source: &Path) -> PathBuf {
    if let Some(root) = &config.cache_root {
        return root.clone();
    }
    source
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// Borrowed state of one execution.
struct Run<'a> {
    config: &'a PipelineConfig,
    source: &'a dyn FrameSource,
    chain: &'a TransformChain,
    selection: FrameSelection,
    output_path: PathBuf,
    cache_root: PathBuf,
}

impl Run<'_> {
    fn tracker(&self, stage: PipelineStage, total: Option<u64>) -> ProgressTracker {
        ProgressTracker::new(
            self.config.progress.clone(),
            stage,
            total,
            self.config.batch_size,
        )
    }

    fn check_cancelled(&self) -> Result<(), ReframeError> {
        if self.config.is_cancelled() {
            return Err(ReframeError::Cancelled);
        }
        Ok(())
    }

    fn nothing_selected(&self) -> ReframeError {
        ReframeError::NoFramesMatchFilter {
            location: self.source.path().to_path_buf(),
            pattern: format!(
                "frames {} every {}",
                self.selection.range, self.selection.skip
            ),
        }
    }

    /// One frame at a time from source to encoder.
    fn streaming(&self, stages: &mut StageLog) -> Result<RunReport, ReframeError> {
        let mut report = RunReport::new(ProcessingMode::Streaming);
        let is_container = self.source.kind().is_container();

        // Decoded frames are only written to disk when they are to be kept.
        let mut cache = None;
        let read_stage = if is_container {
            stages.enter(PipelineStage::Extracting);
            if self.config.keep_extracted {
                cache = Some(TempFrameCache::create_in(&self.cache_root)?);
            }
            PipelineStage::Extracting
        } else {
            PipelineStage::Reading
        };
        stages.enter(PipelineStage::Reading);
        let frames = self.source.frames(&self.selection)?;

        stages.enter(PipelineStage::Transforming);
        let mut sink = FrameSink::new(self.config.output.clone(), self.output_path.clone());
        let mut tracker = self.tracker(PipelineStage::Transforming, None);
        let mut last_index = None;

        for frame in frames {
            self.check_cancelled()?;
            let frame = frame.map_err(|error| error.in_stage(read_stage))?;
            if let Some(cache) = cache.as_mut() {
                cache
                    .store(&frame)
                    .map_err(|error| error.in_stage(PipelineStage::Extracting))?;
            }
            report.frames_read += 1;

            let frame = self.chain.apply(frame)?;
            last_index = Some(frame.index);
            encode_frame(&mut sink, &frame)?;
            tracker.advance(Some(frame.index));
        }
        tracker.finish();

        let Some(last_index) = last_index else {
            return Err(self.nothing_selected());
        };

        if let Some(tail) = &self.config.tail {
            stages.enter(PipelineStage::TailAppend);
            let dimensions = sink.dimensions().unwrap_or_default();
            for frame in tail_frames(tail, dimensions, last_index)? {
                self.check_cancelled()?;
                encode_frame(&mut sink, &frame)?;
            }
        }

        stages.enter(PipelineStage::Encoding);
        report.dimensions = sink.dimensions();
        report.frames_encoded = sink.frames_written();
        report.outputs = sink.finish()?;

        stages.enter(PipelineStage::Cleanup);
        report.kept_cache = cache.map(TempFrameCache::keep);
        Ok(report)
    }

    /// Each stage runs to completion before the next starts.
    fn buffered(&self, stages: &mut StageLog) -> Result<RunReport, ReframeError> {
        let mut report = RunReport::new(ProcessingMode::Buffered);

        let (files, cache) = if self.source.kind().is_container() {
            stages.enter(PipelineStage::Extracting);
            let cache = self.extract()?;
            stages.enter(PipelineStage::Reading);
            (cache.entries()?, Some(cache))
        } else {
            stages.enter(PipelineStage::Reading);
            let files = self.source.frame_files(&self.selection)?.ok_or_else(|| {
                ReframeError::InvalidConfiguration(format!(
                    "{} cannot be listed as frame files",
                    self.source.path().display()
                ))
            })?;
            (files, None)
        };
        if files.is_empty() {
            return Err(self.nothing_selected());
        }
        report.frames_read = files.len() as u64;

        stages.enter(PipelineStage::Transforming);
        let mut tracker = self.tracker(PipelineStage::Transforming, Some(report.frames_read));
        let mut frames = transform_files(
            self.chain,
            files,
            self.config.cancellation.as_ref(),
            &mut tracker,
        )?;
        tracker.finish();

        if let Some(tail) = &self.config.tail {
            stages.enter(PipelineStage::TailAppend);
            let first = frames.first().map(IndexedFrame::dimensions).unwrap_or_default();
            let last_index = frames.last().map_or(0, |frame| frame.index);
            frames.extend(tail_frames(tail, first, last_index)?);
        }

        stages.enter(PipelineStage::Encoding);
        let mut sink = FrameSink::new(self.config.output.clone(), self.output_path.clone());
        let mut tracker = self.tracker(PipelineStage::Encoding, Some(frames.len() as u64));
        sink.write_partitioned(&frames, |frame| {
            self.check_cancelled()?;
            tracker.advance(Some(frame.index));
            Ok(())
        })?;
        tracker.finish();
        report.dimensions = sink.dimensions();
        report.frames_encoded = sink.frames_written();
        report.outputs = sink.finish()?;

        stages.enter(PipelineStage::Cleanup);
        if let Some(cache) = cache {
            if self.config.keep_extracted {
                report.kept_cache = Some(cache.keep());
            } else {
                cache.close()?;
            }
        }
        Ok(report)
    }

    /// Decode the selected frames into a fresh cache.
    fn extract(&self) -> Result<TempFrameCache, ReframeError> {
        let mut cache = TempFrameCache::create_in(&self.cache_root)?;
        let mut tracker = self.tracker(PipelineStage::Extracting, None);
        for frame in self.source.frames(&self.selection)? {
            self.check_cancelled()?;
            let frame = frame?;
            cache.store(&frame)?;
            tracker.advance(Some(frame.index));
        }
        tracker.finish();
        log::debug!(
            "Extracted {} frame(s) to {}",
            cache.len(),
            cache.path().display()
        );
        Ok(cache)
    }
}

#[cfg(not(feature = "rayon"))]
fn transform_files(
    chain: &TransformChain,
    files: Vec<(u64, PathBuf)>,
    cancellation: Option<&crate::progress::CancellationToken>,
    tracker: &mut ProgressTracker,
) -> Result<Vec<IndexedFrame>, ReframeError> {
    let mut frames = Vec::with_capacity(files.len());
    for (index, path) in files {
        if cancellation.is_some_and(|token| token.is_cancelled()) {
            return Err(ReframeError::Cancelled);
        }
        frames.push(chain.apply(IndexedFrame::new(index, read_frame(&path)?))?);
        tracker.advance(Some(index));
    }
    Ok(frames)
}

/// Hand one frame to the sink. Sink failures belong to the encoding stage,
/// whichever stage produced the frame.
fn encode_frame(sink: &mut FrameSink, frame: &IndexedFrame) -> Result<(), ReframeError> {
    sink.push(frame).map_err(|error| error.in_stage(PipelineStage::Encoding))
}

/// The tail image resized to the output size, repeated `times` times.
/// Indices continue after `last_index`.
fn tail_frames(
    tail: &TailImage,
    (width, height): (u32, u32),
    last_index: u64,
) -> Result<Vec<IndexedFrame>, ReframeError> {
    let image = read_frame(&tail.path)?;
    let image: Frame = if image.dimensions() == (width, height) {
        image
    } else {
        imageops::resize(&image, width, height, FilterType::Triangle)
    };
    log::debug!(
        "Appending {} ({}x{}) {} time(s)",
        tail.path.display(),
        width,
        height,
        tail.times
    );
    Ok((1..=tail.times as u64)
        .map(|offset| IndexedFrame::new(last_index + offset, image.clone()))
        .collect())
}

#[cfg(test)]
mod tests {
    use image::{Rgb, RgbImage};

    use super::*;
    use crate::config::{ContainerKind, ExtractionRange, OutputSpec};

    fn frame_directory(count: u8) -> tempfile::TempDir {
        let directory = tempfile::tempdir().unwrap();
        let frames = directory.path().join("frames");
        std::fs::create_dir(&frames).unwrap();
        for index in 0..count {
            RgbImage::from_pixel(4, 4, Rgb([index * 10, 0, 0]))
                .save(frames.join(format!("{index:03}.png")))
                .unwrap();
        }
        directory
    }

    #[test]
    fn sink_failures_are_tagged_as_encoding() {
        let directory = tempfile::tempdir().unwrap();
        let mut sink = FrameSink::new(OutputSpec::default(), directory.path().join("result.gif"));
        encode_frame(&mut sink, &IndexedFrame::new(0, RgbImage::new(4, 4))).unwrap();

        let error =
            encode_frame(&mut sink, &IndexedFrame::new(1, RgbImage::new(2, 2))).unwrap_err();
        assert_eq!(error.stage(), Some(PipelineStage::Encoding));
        assert!(matches!(error.root(), ReframeError::DimensionMismatch { index: 1, .. }));
    }

    #[test]
    fn stages_are_recorded_in_order() {
        let directory = frame_directory(3);
        let mut driver = PipelineDriver::new(PipelineConfig::new(directory.path().join("frames")));
        let report = driver.run().unwrap();
        assert_eq!(
            report.stages,
            [
                PipelineStage::Idle,
                PipelineStage::Reading,
                PipelineStage::Transforming,
                PipelineStage::Encoding,
                PipelineStage::Cleanup,
                PipelineStage::Done
            ]
        );
        assert_eq!(driver.state(), PipelineStage::Done);
        assert_eq!(report.outputs, [directory.path().join("result.gif")]);
    }

    #[test]
    fn driver_runs_only_once() {
        let directory = frame_directory(1);
        let mut driver = PipelineDriver::new(PipelineConfig::new(directory.path().join("frames")));
        driver.run().unwrap();
        assert!(matches!(driver.run(), Err(ReframeError::InvalidConfiguration(_))));
    }

    #[test]
    fn errors_carry_the_failing_stage() {
        let mut driver = PipelineDriver::new(PipelineConfig::new("/no/such/source"));
        let error = driver.run().unwrap_err();
        assert_eq!(error.stage(), Some(PipelineStage::Idle));
        assert!(matches!(error.root(), ReframeError::SourceNotFound { .. }));
        assert_eq!(driver.state(), PipelineStage::Errored);
    }

    #[test]
    fn buffered_and_streaming_agree() {
        let directory = frame_directory(6);
        let base = PipelineConfig::new(directory.path().join("frames"))
            .with_range(ExtractionRange::new(1, Some(4)));

        let streaming = PipelineDriver::new(
            base.clone()
                .with_output(OutputSpec::new(ContainerKind::Gif).with_name("s.gif")),
        )
        .run()
        .unwrap();
        let buffered = PipelineDriver::new(
            base.with_mode(ProcessingMode::Buffered)
                .with_output(OutputSpec::new(ContainerKind::Gif).with_name("b.gif")),
        )
        .run()
        .unwrap();

        assert_eq!(streaming.frames_encoded, 4);
        assert_eq!(buffered.frames_encoded, 4);
        assert_eq!(streaming.dimensions, buffered.dimensions);
        assert!(buffered.stages.contains(&PipelineStage::Reading));
    }

    #[test]
    fn tail_frames_match_output_size() {
        let directory = tempfile::tempdir().unwrap();
        let card = directory.path().join("card.png");
        RgbImage::from_pixel(10, 10, Rgb([1, 2, 3])).save(&card).unwrap();

        let frames = tail_frames(&TailImage::new(&card, 3), (4, 6), 9).unwrap();
        let indices: Vec<u64> = frames.iter().map(|frame| frame.index).collect();
        assert_eq!(indices, [10, 11, 12]);
        assert!(frames.iter().all(|frame| frame.dimensions() == (4, 6)));
    }

    #[test]
    fn cancellation_stops_the_run() {
        let directory = frame_directory(3);
        let token = crate::progress::CancellationToken::new();
        token.cancel();
        let config = PipelineConfig::new(directory.path().join("frames")).with_cancellation(token);
        let error = PipelineDriver::new(config).run().unwrap_err();
        assert!(matches!(error.root(), ReframeError::Cancelled));
        assert!(!directory.path().join("result.gif").exists());
    }
}
