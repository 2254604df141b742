//! Video-file sources decoded through FFmpeg.
//!
//! Frames are decoded sequentially from the start of the best video stream
//! and numbered by a decode counter, not by presentation timestamps, so a
//! variable-frame-rate file still yields indices `0, 1, 2, ...` with no
//! gaps. Every decoded frame is converted to RGB24 with an FFmpeg scaling
//! context before it leaves this module.

use std::path::{Path, PathBuf};

use ffmpeg_next::{
    Error as FfmpegError, Packet,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::{Pixel, context::Input},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use image::RgbImage;

use crate::codec;
use crate::conversion::rgb_frame_to_buffer;
use crate::error::ReframeError;
use crate::frame::{Frame, IndexedFrame};
use crate::source::{FrameSelection, FrameSource, FrameStream, SourceKind};

/// Frames of the best video stream of one file.
#[derive(Debug, Clone)]
pub struct VideoSource {
    path: PathBuf,
}

impl VideoSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Coded `(width, height)` of the video stream, without decoding.
    pub fn dimensions(&self) -> Result<(u32, u32), ReframeError> {
        let (_, decoder, _) = self.open()?;
        Ok((decoder.width(), decoder.height()))
    }

    fn open(&self) -> Result<(Input, VideoDecoder, usize), ReframeError> {
        if !self.path.is_file() {
            return Err(ReframeError::SourceNotFound {
                path: self.path.clone(),
            });
        }
        codec::init(&self.path, codec::Direction::Decode)?;

        let decode_failure = |reason: String| ReframeError::DecodeFailure {
            path: self.path.clone(),
            index: 0,
            reason,
        };

        let input = ffmpeg_next::format::input(&self.path)
            .map_err(|error| decode_failure(format!("cannot open container: {error}")))?;
        let stream = input
            .streams()
            .best(Type::Video)
            .ok_or_else(|| ReframeError::SourceEmpty {
                path: self.path.clone(),
            })?;
        let stream_index = stream.index();
        let decoder = CodecContext::from_parameters(stream.parameters())
            .and_then(|context| context.decoder().video())
            .map_err(|error| decode_failure(format!("cannot open decoder: {error}")))?;

        log::debug!(
            "Opened video stream {stream_index} of {} ({}x{}, {:?})",
            self.path.display(),
            decoder.width(),
            decoder.height(),
            decoder.format()
        );
        Ok((input, decoder, stream_index))
    }
}

impl FrameSource for VideoSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Video
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn frames(&self, selection: &FrameSelection) -> Result<FrameStream, ReframeError> {
        let (input, decoder, stream_index) = self.open()?;
        Ok(Box::new(VideoFrames {
            input,
            decoder,
            converter: RgbConverter::new(),
            stream_index,
            path: self.path.clone(),
            selection: *selection,
            next_index: 0,
            decoded_frame: VideoFrame::empty(),
            eof_sent: false,
            done: false,
        }))
    }
}

/// Scaler plus the input geometry it was built for.
struct Scaler {
    context: ScalingContext,
    format: Pixel,
    width: u32,
    height: u32,
}

/// Converts decoded frames to RGB24, rebuilding the scaler and its output
/// frame whenever the decoded geometry changes.
struct RgbConverter {
    scaler: Option<Scaler>,
    rgb_frame: VideoFrame,
}

impl RgbConverter {
    fn new() -> Self {
        Self {
            scaler: None,
            rgb_frame: VideoFrame::empty(),
        }
    }

    /// `None` when the converted buffer is smaller than the frame claims.
    fn convert(&mut self, decoded: &VideoFrame) -> Result<Option<Frame>, FfmpegError> {
        let format = decoded.format();
        let width = decoded.width();
        let height = decoded.height();

        let scaler = match self.scaler.take() {
            Some(scaler)
                if scaler.format == format && scaler.width == width && scaler.height == height =>
            {
                scaler
            }
            previous => {
                if previous.is_some() {
                    log::debug!("Decoded geometry changed to {width}x{height} {format:?}");
                }
                // The old output frame is sized for the old geometry.
                self.rgb_frame = VideoFrame::empty();
                let context = ScalingContext::get(
                    format,
                    width,
                    height,
                    Pixel::RGB24,
                    width,
                    height,
                    ScalingFlags::BILINEAR,
                )?;
                Scaler {
                    context,
                    format,
                    width,
                    height,
                }
            }
        };
        let scaler = self.scaler.insert(scaler);
        scaler.context.run(decoded, &mut self.rgb_frame)?;

        let buffer = rgb_frame_to_buffer(&self.rgb_frame, width, height);
        Ok(RgbImage::from_raw(width, height, buffer))
    }
}

/// A lazy decode loop over one video stream.
struct VideoFrames {
    input: Input,
    decoder: VideoDecoder,
    converter: RgbConverter,
    stream_index: usize,
    path: PathBuf,
    selection: FrameSelection,
    next_index: u64,
    decoded_frame: VideoFrame,
    eof_sent: bool,
    done: bool,
}

impl VideoFrames {
    fn convert_current_frame(&mut self, index: u64) -> Result<Frame, ReframeError> {
        self.converter
            .convert(&self.decoded_frame)?
            .ok_or_else(|| ReframeError::DecodeFailure {
                path: self.path.clone(),
                index,
                reason: "decoded frame buffer is smaller than its dimensions".to_string(),
            })
    }

    fn fail(&mut self, error: FfmpegError) -> Option<Result<IndexedFrame, ReframeError>> {
        self.done = true;
        Some(Err(ReframeError::DecodeFailure {
            path: self.path.clone(),
            index: self.next_index,
            reason: error.to_string(),
        }))
    }
}

impl Iterator for VideoFrames {
    type Item = Result<IndexedFrame, ReframeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            if self.decoder.receive_frame(&mut self.decoded_frame).is_ok() {
                let index = self.next_index;
                self.next_index += 1;

                if self.selection.is_exhausted_at(index) {
                    self.done = true;
                    return None;
                }
                if !self.selection.keeps(index) {
                    continue;
                }

                return match self.convert_current_frame(index) {
                    Ok(image) => Some(Ok(IndexedFrame::new(index, image))),
                    Err(error) => {
                        self.done = true;
                        Some(Err(error))
                    }
                };
            }

            // Decoder is drained; feed it more packets.
            if self.eof_sent {
                self.done = true;
                if self.next_index == 0 {
                    return Some(Err(ReframeError::SourceEmpty {
                        path: self.path.clone(),
                    }));
                }
                return None;
            }

            let mut packet = Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) => {
                    if packet.stream() == self.stream_index {
                        if let Err(error) = self.decoder.send_packet(&packet) {
                            return self.fail(error);
                        }
                    }
                }
                Err(FfmpegError::Eof) => {
                    if let Err(error) = self.decoder.send_eof() {
                        return self.fail(error);
                    }
                    self.eof_sent = true;
                }
                Err(error) => return self.fail(error),
            }
        }
    }
}
