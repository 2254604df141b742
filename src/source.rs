//! Frame sources.
//!
//! A [`FrameSource`] yields [`IndexedFrame`]s in increasing index order,
//! already filtered by a [`FrameSelection`]. Three backends exist:
//!
//! | Kind | Backend | Indices |
//! |------|---------|---------|
//! | [`SourceKind::ImageDirectory`] | [`DirectorySource`](crate::DirectorySource) | position in the sorted listing |
//! | [`SourceKind::AnimatedImage`] | [`AnimatedImageSource`](crate::AnimatedImageSource) | decode order |
//! | [`SourceKind::Video`] | [`VideoSource`](crate::VideoSource) | decode order |
//!
//! [`ConcatSource`](crate::ConcatSource) joins several container sources
//! into one index space.

use std::fmt::Debug;
use std::path::{Path, PathBuf};

use crate::animated::AnimatedImageSource;
use crate::config::ExtractionRange;
use crate::directory::DirectorySource;
use crate::error::ReframeError;
use crate::frame::IndexedFrame;
use crate::video::VideoSource;

/// A lazily decoded, filtered run of frames.
pub type FrameStream = Box<dyn Iterator<Item = Result<IndexedFrame, ReframeError>>>;

/// Which backend reads a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// A directory of still images, one frame per file.
    ImageDirectory,
    /// An animated image file (GIF).
    AnimatedImage,
    /// A video file decoded through FFmpeg.
    Video,
    /// Several container files read back to back.
    Concatenation,
}

impl SourceKind {
    /// Classify `path`: directories hold still images, `.gif` files are
    /// animated images, and every other file is handed to FFmpeg.
    ///
    /// # Errors
    ///
    /// [`ReframeError::SourceNotFound`] if nothing exists at `path`.
    pub fn detect(path: &Path) -> Result<Self, ReframeError> {
        if path.is_dir() {
            return Ok(SourceKind::ImageDirectory);
        }
        if !path.is_file() {
            return Err(ReframeError::SourceNotFound {
                path: path.to_path_buf(),
            });
        }
        let is_gif = path
            .extension()
            .and_then(|extension| extension.to_str())
            .is_some_and(|extension| extension.eq_ignore_ascii_case("gif"));
        Ok(if is_gif {
            SourceKind::AnimatedImage
        } else {
            SourceKind::Video
        })
    }

    /// `true` for sources that must be decoded rather than listed.
    pub fn is_container(self) -> bool {
        !matches!(self, SourceKind::ImageDirectory)
    }
}

/// Which source indices are kept: those inside `range` that are also a
/// multiple of `skip`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSelection {
    pub range: ExtractionRange,
    pub skip: u64,
}

impl Default for FrameSelection {
    fn default() -> Self {
        Self::all()
    }
}

impl FrameSelection {
    pub fn new(range: ExtractionRange, skip: u64) -> Self {
        Self {
            range,
            skip: skip.max(1),
        }
    }

    /// Every frame.
    pub fn all() -> Self {
        Self::new(ExtractionRange::full(), 1)
    }

    pub fn keeps(&self, index: u64) -> bool {
        self.range.contains(index) && index % self.skip == 0
    }

    /// Once this is `true` no later index can be kept either.
    pub fn is_exhausted_at(&self, index: u64) -> bool {
        self.range.is_past_end(index)
    }
}

/// Produces the frames of one source.
pub trait FrameSource: Debug {
    fn kind(&self) -> SourceKind;

    /// The file or directory being read.
    fn path(&self) -> &Path;

    /// Start a fresh pass over the source, yielding only the frames
    /// `selection` keeps, in index order.
    ///
    /// # Errors
    ///
    /// Opening errors are returned directly. Errors hit while decoding are
    /// yielded by the stream, after which it ends.
    fn frames(&self, selection: &FrameSelection) -> Result<FrameStream, ReframeError>;

    /// For sources already stored as one file per frame, the files
    /// `selection` keeps. Container sources return `None` and must be
    /// decoded through [`frames`](FrameSource::frames).
    fn frame_files(
        &self,
        _selection: &FrameSelection,
    ) -> Result<Option<Vec<(u64, PathBuf)>>, ReframeError> {
        Ok(None)
    }
}

/// Open `path` with the backend its kind calls for.
///
/// `extension` filters image directories and is ignored by containers.
pub fn open_source(
    path: &Path,
    kind: Option<SourceKind>,
    extension: Option<&str>,
) -> Result<Box<dyn FrameSource>, ReframeError> {
    let kind = match kind {
        Some(kind) => {
            if !path.exists() {
                return Err(ReframeError::SourceNotFound {
                    path: path.to_path_buf(),
                });
            }
            kind
        }
        None => SourceKind::detect(path)?,
    };
    log::debug!("Opening {} as {kind:?}", path.display());

    match kind {
        SourceKind::ImageDirectory => Ok(Box::new(DirectorySource::new(path, extension))),
        SourceKind::AnimatedImage => Ok(Box::new(AnimatedImageSource::new(path))),
        SourceKind::Video => Ok(Box::new(VideoSource::new(path))),
        SourceKind::Concatenation => Err(ReframeError::InvalidConfiguration(
            "a concatenation needs a list of files; use ConcatSource".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_keeps_multiples_inside_range() {
        let selection = FrameSelection::new(ExtractionRange::new(2, Some(10)), 4);
        let kept: Vec<u64> = (0..20).filter(|&i| selection.keeps(i)).collect();
        assert_eq!(kept, [4, 8]);
        assert!(!selection.is_exhausted_at(10));
        assert!(selection.is_exhausted_at(11));
    }

    #[test]
    fn zero_skip_is_clamped() {
        assert_eq!(FrameSelection::new(ExtractionRange::full(), 0).skip, 1);
    }

    #[test]
    fn detect_by_path() {
        let directory = tempfile::tempdir().unwrap();
        assert_eq!(SourceKind::detect(directory.path()).unwrap(), SourceKind::ImageDirectory);

        let gif = directory.path().join("a.GIF");
        std::fs::write(&gif, b"").unwrap();
        assert_eq!(SourceKind::detect(&gif).unwrap(), SourceKind::AnimatedImage);

        let video = directory.path().join("a.mkv");
        std::fs::write(&video, b"").unwrap();
        assert_eq!(SourceKind::detect(&video).unwrap(), SourceKind::Video);

        assert!(matches!(
            SourceKind::detect(&directory.path().join("missing.mp4")),
            Err(ReframeError::SourceNotFound { .. })
        ));
    }

    #[test]
    fn open_missing_source_with_forced_kind_fails() {
        let result = open_source(Path::new("/definitely/not/here"), Some(SourceKind::Video), None);
        assert!(matches!(result, Err(ReframeError::SourceNotFound { .. })));
    }
}
