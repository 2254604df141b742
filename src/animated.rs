//! Animated-image sources.
//!
//! GIF frames are decoded with `image`'s [`GifDecoder`], which composites
//! each frame onto the canvas according to its disposal method, so every
//! yielded frame is a full picture rather than a partial delta.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, DynamicImage, Frames};

use crate::error::ReframeError;
use crate::frame::IndexedFrame;
use crate::source::{FrameSelection, FrameSource, FrameStream, SourceKind};

/// Frames of one animated GIF, in display order.
#[derive(Debug, Clone)]
pub struct AnimatedImageSource {
    path: PathBuf,
}

impl AnimatedImageSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    fn open_decoder(&self) -> Result<GifDecoder<BufReader<File>>, ReframeError> {
        let file = File::open(&self.path).map_err(|error| match error.kind() {
            std::io::ErrorKind::NotFound => ReframeError::SourceNotFound {
                path: self.path.clone(),
            },
            _ => ReframeError::IoError(error),
        })?;
        GifDecoder::new(BufReader::new(file)).map_err(|error| ReframeError::DecodeFailure {
            path: self.path.clone(),
            index: 0,
            reason: error.to_string(),
        })
    }
}

impl FrameSource for AnimatedImageSource {
    fn kind(&self) -> SourceKind {
        SourceKind::AnimatedImage
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn frames(&self, selection: &FrameSelection) -> Result<FrameStream, ReframeError> {
        let decoder = self.open_decoder()?;
        Ok(Box::new(AnimatedFrames {
            frames: decoder.into_frames(),
            path: self.path.clone(),
            selection: *selection,
            next_index: 0,
            done: false,
        }))
    }
}

/// Decodes on demand and applies the selection as it goes.
struct AnimatedFrames {
    frames: Frames<'static>,
    path: PathBuf,
    selection: FrameSelection,
    next_index: u64,
    done: bool,
}

impl Iterator for AnimatedFrames {
    type Item = Result<IndexedFrame, ReframeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let Some(decoded) = self.frames.next() else {
                self.done = true;
                if self.next_index == 0 {
                    return Some(Err(ReframeError::SourceEmpty {
                        path: self.path.clone(),
                    }));
                }
                return None;
            };

            let index = self.next_index;
            self.next_index += 1;

            let frame = match decoded {
                Ok(frame) => frame,
                Err(error) => {
                    self.done = true;
                    return Some(Err(ReframeError::DecodeFailure {
                        path: self.path.clone(),
                        index,
                        reason: error.to_string(),
                    }));
                }
            };

            if self.selection.is_exhausted_at(index) {
                self.done = true;
                return None;
            }
            if !self.selection.keeps(index) {
                continue;
            }

            let image = DynamicImage::ImageRgba8(frame.into_buffer()).to_rgb8();
            return Some(Ok(IndexedFrame::new(index, image)));
        }
    }
}
