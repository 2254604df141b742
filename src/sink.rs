//! Animation output.
//!
//! [`FrameSink`] turns the transformed frame sequence into one animation,
//! or into `N` sibling animations when partitioning is requested. It fixes
//! the output size from the first frame and rejects any later frame of a
//! different size. Two encoders implement [`FrameEncoder`]:
//!
//! - [`GifWriter`] writes palette GIFs with the `gif` crate;
//! - [`VideoWriter`] writes video containers through FFmpeg.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ffmpeg_next::codec::Id;
use ffmpeg_next::codec::context::Context as CodecContext;
use ffmpeg_next::codec::encoder::video::Encoder as OpenVideoEncoder;
use ffmpeg_next::format::context::Output;
use ffmpeg_next::format::{Flags as FormatFlags, Pixel};
use ffmpeg_next::frame::Video as VideoFrame;
use ffmpeg_next::software::scaling::{Context as ScalingContext, Flags as ScalingFlags};
use ffmpeg_next::{Packet, Rational};
use gif::{Encoder, Frame as GifFrame, Repeat};

use crate::codec::Direction;
use crate::config::{ContainerKind, OutputSpec};
use crate::conversion::buffer_to_rgb_frame;
use crate::error::ReframeError;
use crate::frame::{Frame, IndexedFrame};

/// Quantizer speed handed to the GIF palette builder (1 = best, 30 = fastest).
const GIF_QUANTIZER_SPEED: i32 = 10;

/// Video codec for [`ContainerKind::Video`] output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    /// H.264 / AVC. Needs an FFmpeg build with an H.264 encoder.
    H264,
    /// H.265 / HEVC.
    H265,
    /// MPEG-4 Part 2. Built into every FFmpeg.
    Mpeg4,
    /// FFV1, lossless.
    Ffv1,
}

impl VideoCodec {
    /// The codec picked when none is configured: FFV1 for `.mkv`, MPEG-4
    /// for `.avi`, H.264 otherwise.
    pub fn for_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|extension| extension.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("mkv") => VideoCodec::Ffv1,
            Some("avi") => VideoCodec::Mpeg4,
            _ => VideoCodec::H264,
        }
    }

    fn to_codec_id(self) -> Id {
        match self {
            VideoCodec::H264 => Id::H264,
            VideoCodec::H265 => Id::HEVC,
            VideoCodec::Mpeg4 => Id::MPEG4,
            VideoCodec::Ffv1 => Id::FFV1,
        }
    }

    fn input_pixel_format(self) -> Pixel {
        match self {
            // Planar RGB keeps FFV1 output bit-exact.
            VideoCodec::Ffv1 => Pixel::GBRP,
            _ => Pixel::YUV420P,
        }
    }

    /// 4:2:0 chroma subsampling needs even frame sizes.
    pub fn requires_even_dimensions(self) -> bool {
        self.input_pixel_format() == Pixel::YUV420P
    }
}

impl FromStr for VideoCodec {
    type Err = ReframeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "h264" | "avc" | "x264" => Ok(VideoCodec::H264),
            "h265" | "hevc" | "x265" => Ok(VideoCodec::H265),
            "mpeg4" | "mp4v" => Ok(VideoCodec::Mpeg4),
            "ffv1" | "lossless" => Ok(VideoCodec::Ffv1),
            other => Err(ReframeError::InvalidConfiguration(format!(
                "unknown video codec '{other}'"
            ))),
        }
    }
}

/// GIF frame delay for `fps`, in hundredths of a second.
pub fn gif_frame_delay(fps: f64) -> u16 {
    (100.0 / fps).round().clamp(1.0, f64::from(u16::MAX)) as u16
}

/// Sizes of `parts` contiguous chunks of `total` frames.
///
/// The first `total % parts` chunks get one extra frame, so sizes differ by
/// at most one and their sum is always `total`.
pub fn partition_sizes(total: usize, parts: usize) -> Vec<usize> {
    if parts == 0 {
        return Vec::new();
    }
    let base = total / parts;
    let extra = total % parts;
    (0..parts)
        .map(|part| base + usize::from(part < extra))
        .collect()
}

/// Output files for `parts` partitions of `base`.
///
/// One part keeps the base name (plus `_suffix`); several parts get their
/// 0-based number: `result_0.gif`, `result_1_suffix.gif`, ...
pub fn partition_paths(base: &Path, parts: usize, suffix: Option<&str>) -> Vec<PathBuf> {
    let stem = base
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = base
        .extension()
        .map(|extension| format!(".{}", extension.to_string_lossy()))
        .unwrap_or_default();
    let suffix = suffix
        .filter(|suffix| !suffix.is_empty())
        .map(|suffix| format!("_{suffix}"))
        .unwrap_or_default();

    if parts <= 1 {
        return vec![base.with_file_name(format!("{stem}{suffix}{extension}"))];
    }
    (0..parts)
        .map(|part| base.with_file_name(format!("{stem}_{part}{suffix}{extension}")))
        .collect()
}

/// Writes frames of one fixed size into one output file.
pub trait FrameEncoder {
    /// Encode the next frame.
    fn push(&mut self, frame: &Frame) -> Result<(), ReframeError>;

    /// Flush and close the file, returning its path.
    fn finish(self: Box<Self>) -> Result<PathBuf, ReframeError>;
}

/// Open the encoder `output` calls for at `path`.
pub fn create_encoder(
    path: &Path,
    output: &OutputSpec,
    width: u32,
    height: u32,
) -> Result<Box<dyn FrameEncoder>, ReframeError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    match output.kind {
        ContainerKind::Gif => Ok(Box::new(GifWriter::create(
            path,
            width,
            height,
            gif_frame_delay(output.fps),
            output.repeat,
        )?)),
        ContainerKind::Video => Ok(Box::new(VideoWriter::create(
            path,
            width,
            height,
            output.fps,
            output.codec,
        )?)),
    }
}

fn encode_failure(path: &Path, reason: impl Into<String>) -> ReframeError {
    ReframeError::EncodeFailure {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Animated GIF output.
pub struct GifWriter {
    path: PathBuf,
    encoder: Encoder<BufWriter<File>>,
    width: u16,
    height: u16,
    delay: u16,
}

impl GifWriter {
    pub fn create(
        path: &Path,
        width: u32,
        height: u32,
        delay: u16,
        repeat: Option<u16>,
    ) -> Result<Self, ReframeError> {
        let (Ok(gif_width), Ok(gif_height)) = (u16::try_from(width), u16::try_from(height)) else {
            return Err(encode_failure(
                path,
                format!("{width}x{height} exceeds the GIF size limit of 65535x65535"),
            ));
        };

        let file = File::create(path)
            .map_err(|e| encode_failure(path, format!("Failed to create GIF file: {e}")))?;
        let mut encoder = Encoder::new(BufWriter::new(file), gif_width, gif_height, &[])
            .map_err(|e| encode_failure(path, format!("Failed to create GIF encoder: {e}")))?;

        let repeat = match repeat {
            None => Repeat::Infinite,
            Some(n) => Repeat::Finite(n),
        };
        encoder
            .set_repeat(repeat)
            .map_err(|e| encode_failure(path, format!("Failed to set GIF repeat: {e}")))?;

        log::debug!(
            "Writing GIF {} ({width}x{height}, delay={delay}cs)",
            path.display()
        );
        Ok(Self {
            path: path.to_path_buf(),
            encoder,
            width: gif_width,
            height: gif_height,
            delay,
        })
    }
}

impl FrameEncoder for GifWriter {
    fn push(&mut self, frame: &Frame) -> Result<(), ReframeError> {
        let mut gif_frame =
            GifFrame::from_rgb_speed(self.width, self.height, frame.as_raw(), GIF_QUANTIZER_SPEED);
        gif_frame.delay = self.delay;
        self.encoder
            .write_frame(&gif_frame)
            .map_err(|e| encode_failure(&self.path, format!("Failed to write GIF frame: {e}")))
    }

    fn finish(self: Box<Self>) -> Result<PathBuf, ReframeError> {
        let GifWriter { path, encoder, .. } = *self;
        let mut writer = encoder
            .into_inner()
            .map_err(|e| encode_failure(&path, format!("Failed to finish GIF: {e}")))?;
        writer.flush()?;
        Ok(path)
    }
}

/// Video container output.
pub struct VideoWriter {
    path: PathBuf,
    output: Output,
    encoder: OpenVideoEncoder,
    scaler: ScalingContext,
    stream_index: usize,
    encoder_time_base: Rational,
    stream_time_base: Rational,
    next_pts: i64,
}

impl VideoWriter {
    /// Open `path` and write the container header.
    ///
    /// With `codec = None` the codec follows the extension, falling back to
    /// MPEG-4 when this FFmpeg build has no H.264 encoder.
    ///
    /// # Errors
    ///
    /// [`ReframeError::EncodeFailure`] for odd frame sizes with a 4:2:0
    /// codec, a missing encoder, or any FFmpeg setup failure.
    pub fn create(
        path: &Path,
        width: u32,
        height: u32,
        fps: f64,
        codec: Option<VideoCodec>,
    ) -> Result<Self, ReframeError> {
        crate::codec::init(path, Direction::Encode)?;

        let (codec, encoder_codec) = match codec {
            Some(codec) => {
                let found = ffmpeg_next::encoder::find(codec.to_codec_id()).ok_or_else(|| {
                    encode_failure(path, format!("codec {codec:?} not available"))
                })?;
                (codec, found)
            }
            None => {
                let preferred = VideoCodec::for_path(path);
                match ffmpeg_next::encoder::find(preferred.to_codec_id()) {
                    Some(found) => (preferred, found),
                    None => {
                        log::warn!("No {preferred:?} encoder in this FFmpeg build, using MPEG-4");
                        let found = ffmpeg_next::encoder::find(Id::MPEG4).ok_or_else(|| {
                            encode_failure(path, "no MPEG-4 encoder available")
                        })?;
                        (VideoCodec::Mpeg4, found)
                    }
                }
            }
        };

        if codec.requires_even_dimensions() && (width % 2 != 0 || height % 2 != 0) {
            return Err(encode_failure(
                path,
                format!(
                    "{codec:?} needs even frame dimensions, got {width}x{height}; \
                     add one pixel of padding to the odd side"
                ),
            ));
        }

        let target_pixel = codec.input_pixel_format();
        let frame_rate = Rational::from(fps);
        let encoder_time_base = frame_rate.invert();

        let mut output = ffmpeg_next::format::output(path)
            .map_err(|e| encode_failure(path, format!("cannot open output: {e}")))?;

        let needs_global_header = output.format().flags().contains(FormatFlags::GLOBAL_HEADER);

        let mut stream = output
            .add_stream(encoder_codec)
            .map_err(|e| encode_failure(path, format!("cannot add stream: {e}")))?;
        let stream_index = stream.index();

        let mut encoder = CodecContext::from_parameters(stream.parameters())
            .and_then(|context| context.encoder().video())
            .map_err(|e| encode_failure(path, format!("cannot create video encoder: {e}")))?;

        encoder.set_width(width);
        encoder.set_height(height);
        encoder.set_format(target_pixel);
        encoder.set_time_base(encoder_time_base);
        encoder.set_frame_rate(Some(frame_rate));

        if needs_global_header {
            unsafe {
                (*encoder.as_mut_ptr()).flags |=
                    ffmpeg_sys_next::AV_CODEC_FLAG_GLOBAL_HEADER as i32;
            }
        }

        let encoder = encoder
            .open_as(encoder_codec)
            .map_err(|e| encode_failure(path, format!("cannot open {codec:?} encoder: {e}")))?;
        stream.set_parameters(&encoder);

        output
            .write_header()
            .map_err(|e| encode_failure(path, format!("cannot write header: {e}")))?;

        // The muxer may change the stream time base while writing the header.
        let stream_time_base = output
            .stream(stream_index)
            .map(|stream| stream.time_base())
            .ok_or_else(|| encode_failure(path, "output stream disappeared"))?;

        let scaler = ScalingContext::get(
            Pixel::RGB24,
            width,
            height,
            target_pixel,
            width,
            height,
            ScalingFlags::BILINEAR,
        )
        .map_err(|e| encode_failure(path, format!("cannot create scaler: {e}")))?;

        log::debug!(
            "Writing video {} ({width}x{height}, {codec:?}, {fps} fps)",
            path.display()
        );
        Ok(Self {
            path: path.to_path_buf(),
            output,
            encoder,
            scaler,
            stream_index,
            encoder_time_base,
            stream_time_base,
            next_pts: 0,
        })
    }

    fn write_pending_packets(&mut self) -> Result<(), ReframeError> {
        let mut packet = Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.stream_index);
            packet.rescale_ts(self.encoder_time_base, self.stream_time_base);
            packet
                .write_interleaved(&mut self.output)
                .map_err(|e| encode_failure(&self.path, format!("write packet failed: {e}")))?;
        }
        Ok(())
    }
}

impl FrameEncoder for VideoWriter {
    fn push(&mut self, frame: &Frame) -> Result<(), ReframeError> {
        let source = buffer_to_rgb_frame(frame);
        let mut scaled = VideoFrame::empty();
        self.scaler
            .run(&source, &mut scaled)
            .map_err(|e| encode_failure(&self.path, format!("scaling failed: {e}")))?;

        scaled.set_pts(Some(self.next_pts));
        self.next_pts += 1;

        self.encoder
            .send_frame(&scaled)
            .map_err(|e| encode_failure(&self.path, format!("send_frame failed: {e}")))?;
        self.write_pending_packets()
    }

    fn finish(mut self: Box<Self>) -> Result<PathBuf, ReframeError> {
        self.encoder
            .send_eof()
            .map_err(|e| encode_failure(&self.path, format!("send_eof failed: {e}")))?;
        self.write_pending_packets()?;
        self.output
            .write_trailer()
            .map_err(|e| encode_failure(&self.path, format!("cannot write trailer: {e}")))?;
        Ok(self.path)
    }
}

/// Writes the frame sequence to one or more output files.
///
/// An encoder left unfinished when the sink is dropped (because the run
/// failed) has its partial file removed.
pub struct FrameSink {
    output: OutputSpec,
    base_path: PathBuf,
    dimensions: Option<(u32, u32)>,
    current: Option<(PathBuf, Box<dyn FrameEncoder>)>,
    outputs: Vec<PathBuf>,
    frames_written: u64,
}

impl FrameSink {
    /// A sink writing to `base_path`, or to partitions derived from it.
    pub fn new(output: OutputSpec, base_path: PathBuf) -> Self {
        Self {
            output,
            base_path,
            dimensions: None,
            current: None,
            outputs: Vec::new(),
            frames_written: 0,
        }
    }

    /// The established output size, once the first frame has been seen.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Fix the output size from the first frame; reject any other size.
    fn check_dimensions(&mut self, frame: &IndexedFrame) -> Result<(u32, u32), ReframeError> {
        let actual = frame.dimensions();
        match self.dimensions {
            None => {
                self.dimensions = Some(actual);
                Ok(actual)
            }
            Some(expected) if expected == actual => Ok(expected),
            Some(expected) => Err(ReframeError::DimensionMismatch {
                index: frame.index,
                expected,
                actual,
                reason: "every output frame must share the first frame's size".to_string(),
            }),
        }
    }

    /// Append one frame to the single output file, opening it on the
    /// first call.
    pub fn push(&mut self, frame: &IndexedFrame) -> Result<(), ReframeError> {
        let (width, height) = self.check_dimensions(frame)?;
        if self.current.is_none() {
            let path = partition_paths(&self.base_path, 1, self.output.suffix.as_deref())
                .into_iter()
                .next()
                .unwrap_or_else(|| self.base_path.clone());
            let encoder = create_encoder(&path, &self.output, width, height)?;
            self.current = Some((path, encoder));
        }
        if let Some((_, encoder)) = self.current.as_mut() {
            encoder.push(&frame.image)?;
        }
        self.frames_written += 1;
        Ok(())
    }

    /// Split `frames` into the configured number of partitions and write
    /// each to its own file, calling `on_frame` after every frame.
    ///
    /// Sizes are checked for every frame before any file is created.
    ///
    /// # Errors
    ///
    /// [`ReframeError::InvalidConfiguration`] if there are fewer frames
    /// than partitions.
    pub fn write_partitioned<F>(
        &mut self,
        frames: &[IndexedFrame],
        mut on_frame: F,
    ) -> Result<(), ReframeError>
    where
        F: FnMut(&IndexedFrame) -> Result<(), ReframeError>,
    {
        let parts = self.output.partition_count.max(1);
        if frames.len() < parts {
            return Err(ReframeError::InvalidConfiguration(format!(
                "cannot split {} frame(s) into {parts} files",
                frames.len()
            )));
        }
        for frame in frames {
            self.check_dimensions(frame)?;
        }
        let Some((width, height)) = self.dimensions else {
            return Ok(());
        };

        let paths = partition_paths(&self.base_path, parts, self.output.suffix.as_deref());
        let mut remaining = frames;
        for (size, path) in partition_sizes(frames.len(), parts).into_iter().zip(paths) {
            let (chunk, rest) = remaining.split_at(size);
            remaining = rest;

            log::debug!("Writing {} frame(s) to {}", chunk.len(), path.display());
            let encoder = create_encoder(&path, &self.output, width, height)?;
            self.current = Some((path, encoder));
            for frame in chunk {
                if let Some((_, encoder)) = self.current.as_mut() {
                    encoder.push(&frame.image)?;
                }
                self.frames_written += 1;
                on_frame(frame)?;
            }
            self.finish_current()?;
        }
        Ok(())
    }

    fn finish_current(&mut self) -> Result<(), ReframeError> {
        if let Some((_, encoder)) = self.current.take() {
            let path = encoder.finish()?;
            log::info!("Wrote {}", path.display());
            self.outputs.push(path);
        }
        Ok(())
    }

    /// Close the open output file and return every file written.
    pub fn finish(mut self) -> Result<Vec<PathBuf>, ReframeError> {
        self.finish_current()?;
        Ok(std::mem::take(&mut self.outputs))
    }
}

impl Drop for FrameSink {
    fn drop(&mut self) {
        if let Some((path, encoder)) = self.current.take() {
            drop(encoder);
            log::warn!("Removing incomplete output {}", path.display());
            if let Err(error) = std::fs::remove_file(&path) {
                log::warn!("Could not remove {}: {error}", path.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use image::{Rgb, RgbImage};

    use super::*;

    fn solid(index: u64, width: u32, height: u32) -> IndexedFrame {
        IndexedFrame::new(index, RgbImage::from_pixel(width, height, Rgb([index as u8, 0, 0])))
    }

    #[test]
    fn partition_sizes_follow_array_split() {
        assert_eq!(partition_sizes(10, 3), [4, 3, 3]);
        assert_eq!(partition_sizes(9, 3), [3, 3, 3]);
        assert_eq!(partition_sizes(2, 1), [2]);
        for total in 0..40 {
            for parts in 1..7 {
                let sizes = partition_sizes(total, parts);
                assert_eq!(sizes.len(), parts);
                assert_eq!(sizes.iter().sum::<usize>(), total);
                let max = sizes.iter().max().unwrap();
                let min = sizes.iter().min().unwrap();
                assert!(max - min <= 1);
            }
        }
    }

    #[test]
    fn partition_paths_number_and_suffix() {
        let base = Path::new("out/result.gif");
        assert_eq!(partition_paths(base, 1, None), [PathBuf::from("out/result.gif")]);
        assert_eq!(
            partition_paths(base, 1, Some("v2")),
            [PathBuf::from("out/result_v2.gif")]
        );
        assert_eq!(
            partition_paths(base, 2, Some("v2")),
            [
                PathBuf::from("out/result_0_v2.gif"),
                PathBuf::from("out/result_1_v2.gif")
            ]
        );
    }

    #[test]
    fn gif_delay_from_fps() {
        assert_eq!(gif_frame_delay(30.0), 3);
        assert_eq!(gif_frame_delay(10.0), 10);
        assert_eq!(gif_frame_delay(1000.0), 1);
        assert_eq!(gif_frame_delay(0.001), u16::MAX);
    }

    #[test]
    fn codec_follows_extension() {
        assert_eq!(VideoCodec::for_path(Path::new("a.MKV")), VideoCodec::Ffv1);
        assert_eq!(VideoCodec::for_path(Path::new("a.avi")), VideoCodec::Mpeg4);
        assert_eq!(VideoCodec::for_path(Path::new("a.mp4")), VideoCodec::H264);
        assert!(!VideoCodec::Ffv1.requires_even_dimensions());
        assert!(VideoCodec::H264.requires_even_dimensions());
        assert_eq!("HEVC".parse::<VideoCodec>().unwrap(), VideoCodec::H265);
    }

    #[test]
    fn gif_sink_writes_every_frame() {
        let directory = tempfile::tempdir().unwrap();
        let base = directory.path().join("result.gif");
        let mut sink = FrameSink::new(OutputSpec::new(ContainerKind::Gif), base.clone());
        for index in 0..4 {
            sink.push(&solid(index, 6, 4)).unwrap();
        }
        assert_eq!(sink.dimensions(), Some((6, 4)));
        let outputs = sink.finish().unwrap();
        assert_eq!(outputs, [base.clone()]);

        let decoder = gif::DecodeOptions::new();
        let mut reader = decoder.read_info(File::open(&base).unwrap()).unwrap();
        let mut count = 0;
        while reader.read_next_frame().unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 4);
    }

    #[test]
    fn size_change_is_rejected_and_partial_file_removed() {
        let directory = tempfile::tempdir().unwrap();
        let base = directory.path().join("result.gif");
        let mut sink = FrameSink::new(OutputSpec::new(ContainerKind::Gif), base.clone());
        sink.push(&solid(0, 4, 4)).unwrap();
        let error = sink.push(&solid(1, 5, 4)).unwrap_err();
        assert!(matches!(
            error,
            ReframeError::DimensionMismatch {
                index: 1,
                expected: (4, 4),
                actual: (5, 4),
                ..
            }
        ));
        drop(sink);
        assert!(!base.exists());
    }

    #[test]
    fn partitions_cover_all_frames_in_order() {
        let directory = tempfile::tempdir().unwrap();
        let base = directory.path().join("result.gif");
        let output = OutputSpec::new(ContainerKind::Gif).with_partitions(3);
        let frames: Vec<IndexedFrame> = (0..10).map(|i| solid(i, 2, 2)).collect();

        let mut seen = Vec::new();
        let mut sink = FrameSink::new(output, base);
        sink.write_partitioned(&frames, |frame| {
            seen.push(frame.index);
            Ok(())
        })
        .unwrap();
        let outputs = sink.finish().unwrap();

        assert_eq!(seen, (0..10).collect::<Vec<_>>());
        assert_eq!(outputs.len(), 3);
        assert!(outputs[0].ends_with("result_0.gif"));
        assert!(outputs.iter().all(|path| path.exists()));
    }

    #[test]
    fn more_partitions_than_frames_is_rejected() {
        let directory = tempfile::tempdir().unwrap();
        let output = OutputSpec::new(ContainerKind::Gif).with_partitions(5);
        let frames: Vec<IndexedFrame> = (0..3).map(|i| solid(i, 2, 2)).collect();
        let mut sink = FrameSink::new(output, directory.path().join("result.gif"));
        assert!(matches!(
            sink.write_partitioned(&frames, |_| Ok(())),
            Err(ReframeError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn odd_sizes_are_rejected_for_yuv420_codecs() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("odd.avi");
        let result = VideoWriter::create(&path, 5, 4, 10.0, Some(VideoCodec::Mpeg4));
        assert!(matches!(result, Err(ReframeError::EncodeFailure { .. })));
    }
}
