//! Several container files read as one source.
//!
//! Frames of the parts are numbered consecutively: if the first part has
//! 120 frames, the first frame of the second part has index 120. Range and
//! decimation apply to these joined indices.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::vec::IntoIter;

use crate::animated::AnimatedImageSource;
use crate::config::ContainerKind;
use crate::error::ReframeError;
use crate::frame::IndexedFrame;
use crate::source::{FrameSelection, FrameSource, FrameStream, SourceKind};
use crate::video::VideoSource;

/// Container files played back to back.
#[derive(Debug, Clone)]
pub struct ConcatSource {
    parts: Vec<Arc<dyn FrameSource>>,
}

impl ConcatSource {
    /// Join `paths` in order. Each must be an animated image or a video.
    ///
    /// # Errors
    ///
    /// [`ReframeError::InvalidConfiguration`] for an empty list or a
    /// directory among the parts, [`ReframeError::SourceNotFound`] for a
    /// missing part.
    pub fn new<P: AsRef<Path>>(paths: &[P]) -> Result<Self, ReframeError> {
        if paths.is_empty() {
            return Err(ReframeError::InvalidConfiguration(
                "nothing to concatenate".to_string(),
            ));
        }

        let mut parts: Vec<Arc<dyn FrameSource>> = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            match SourceKind::detect(path)? {
                SourceKind::AnimatedImage => parts.push(Arc::new(AnimatedImageSource::new(path))),
                SourceKind::Video => parts.push(Arc::new(VideoSource::new(path))),
                _ => {
                    return Err(ReframeError::InvalidConfiguration(format!(
                        "{} is not a video or animated image",
                        path.display()
                    )));
                }
            }
        }
        Ok(Self { parts })
    }

    /// Join every GIF and video file directly inside `directory`, in
    /// lexicographic order of their names.
    pub fn from_directory(directory: &Path) -> Result<Self, ReframeError> {
        if !directory.is_dir() {
            return Err(ReframeError::SourceNotFound {
                path: directory.to_path_buf(),
            });
        }
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(directory)? {
            let path = entry?.path();
            if path.is_file() && ContainerKind::from_path(&path).is_some() {
                paths.push(path);
            }
        }
        paths.sort();
        if paths.is_empty() {
            return Err(ReframeError::NoFramesMatchFilter {
                location: directory.to_path_buf(),
                pattern: "*.{gif,mp4,m4v,mov,mkv,avi}".to_string(),
            });
        }
        Self::new(&paths)
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.parts.iter().map(|part| part.path())
    }

    /// Frame size of the first part, read from its first frame.
    pub fn first_dimensions(&self) -> Result<(u32, u32), ReframeError> {
        let first = self
            .parts
            .first()
            .ok_or_else(|| ReframeError::InvalidConfiguration("nothing to concatenate".to_string()))?;
        match first.frames(&FrameSelection::all())?.next() {
            Some(frame) => Ok(frame?.dimensions()),
            None => Err(ReframeError::SourceEmpty {
                path: first.path().to_path_buf(),
            }),
        }
    }
}

impl FrameSource for ConcatSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Concatenation
    }

    fn path(&self) -> &Path {
        self.parts
            .first()
            .map_or_else(|| Path::new(""), |part| part.path())
    }

    fn frames(&self, selection: &FrameSelection) -> Result<FrameStream, ReframeError> {
        Ok(Box::new(ConcatFrames {
            pending: self.parts.clone().into_iter(),
            current: None,
            current_path: PathBuf::new(),
            selection: *selection,
            offset: 0,
            next_index: 0,
            done: false,
        }))
    }
}

struct ConcatFrames {
    pending: IntoIter<Arc<dyn FrameSource>>,
    current: Option<FrameStream>,
    current_path: PathBuf,
    selection: FrameSelection,
    /// Joined index of the current part's first frame.
    offset: u64,
    /// Joined index of the next frame to come out of the current part.
    next_index: u64,
    done: bool,
}

impl Iterator for ConcatFrames {
    type Item = Result<IndexedFrame, ReframeError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }

            let Some(stream) = self.current.as_mut() else {
                let Some(part) = self.pending.next() else {
                    self.done = true;
                    return None;
                };
                self.offset = self.next_index;
                self.current_path = part.path().to_path_buf();
                log::debug!(
                    "Concatenating {} at frame {}",
                    self.current_path.display(),
                    self.offset
                );
                match part.frames(&FrameSelection::all()) {
                    Ok(stream) => self.current = Some(stream),
                    Err(error) => {
                        self.done = true;
                        return Some(Err(error));
                    }
                }
                continue;
            };

            match stream.next() {
                None => self.current = None,
                Some(Err(error)) => {
                    self.done = true;
                    return Some(Err(error));
                }
                Some(Ok(frame)) => {
                    let index = self.offset + frame.index;
                    self.next_index = index + 1;
                    if self.selection.is_exhausted_at(index) {
                        self.done = true;
                        return None;
                    }
                    if self.selection.keeps(index) {
                        return Some(Ok(IndexedFrame::new(index, frame.image)));
                    }
                }
            }
        }
    }
}
