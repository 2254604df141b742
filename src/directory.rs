//! Image-directory sources.
//!
//! Each still image in a directory is one frame. Files are ordered by a
//! lexicographic sort of their names and a file's index is its position
//! in that order, so `frame_2.png` comes after `frame_10.png`. Zero-padded
//! names sort as expected.

use std::path::{Path, PathBuf};

use glob::{MatchOptions, glob_with};
use image::ImageFormat;

use crate::error::ReframeError;
use crate::frame::{IndexedFrame, read_frame};
use crate::source::{FrameSelection, FrameSource, FrameStream, SourceKind};

/// Frames read from the still images of one directory.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    directory: PathBuf,
    /// Extension without the dot. `None` accepts every still-image format.
    extension: Option<String>,
}

impl DirectorySource {
    pub fn new<P: Into<PathBuf>>(directory: P, extension: Option<&str>) -> Self {
        Self {
            directory: directory.into(),
            extension: extension
                .map(|extension| extension.trim_start_matches('.').to_string())
                .filter(|extension| !extension.is_empty() && extension != "*"),
        }
    }

    fn pattern(&self) -> String {
        format!("*.{}", self.extension.as_deref().unwrap_or("*"))
    }

    /// Every matching file, sorted by name.
    ///
    /// Without an extension filter, only files whose extension names a
    /// still-image format are listed; animated GIFs are skipped so a
    /// previous run's output in the same directory is not read back.
    pub fn list(&self) -> Result<Vec<PathBuf>, ReframeError> {
        if !self.directory.is_dir() {
            return Err(ReframeError::SourceNotFound {
                path: self.directory.clone(),
            });
        }

        let escaped = glob::Pattern::escape(&self.directory.to_string_lossy());
        let pattern = format!("{escaped}/{}", self.pattern());
        let options = MatchOptions {
            case_sensitive: false,
            ..MatchOptions::new()
        };
        let entries = glob_with(&pattern, options)
            .map_err(|error| ReframeError::InvalidConfiguration(error.to_string()))?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|error| ReframeError::IoError(error.into_error()))?;
            if !path.is_file() {
                continue;
            }
            if self.extension.is_none() && !is_still_image(&path) {
                continue;
            }
            files.push(path);
        }
        files.sort();
        log::debug!(
            "Listed {} file(s) matching {} in {}",
            files.len(),
            self.pattern(),
            self.directory.display()
        );
        Ok(files)
    }
}

fn is_still_image(path: &Path) -> bool {
    matches!(ImageFormat::from_path(path), Ok(format) if format != ImageFormat::Gif)
}

impl FrameSource for DirectorySource {
    fn kind(&self) -> SourceKind {
        SourceKind::ImageDirectory
    }

    fn path(&self) -> &Path {
        &self.directory
    }

    fn frames(&self, selection: &FrameSelection) -> Result<FrameStream, ReframeError> {
        let files = self.frame_files(selection)?.unwrap_or_default();
        Ok(Box::new(files.into_iter().map(|(index, path)| {
            read_frame(&path).map(|image| IndexedFrame::new(index, image))
        })))
    }

    /// # Errors
    ///
    /// [`ReframeError::NoFramesMatchFilter`] if the listing is empty, or if
    /// the selection keeps none of its files.
    fn frame_files(
        &self,
        selection: &FrameSelection,
    ) -> Result<Option<Vec<(u64, PathBuf)>>, ReframeError> {
        let files = self.list()?;
        if files.is_empty() {
            return Err(ReframeError::NoFramesMatchFilter {
                location: self.directory.clone(),
                pattern: self.pattern(),
            });
        }

        let total = files.len();
        let kept: Vec<(u64, PathBuf)> = files
            .into_iter()
            .enumerate()
            .map(|(position, path)| (position as u64, path))
            .filter(|(index, _)| selection.keeps(*index))
            .collect();
        if kept.is_empty() {
            return Err(ReframeError::NoFramesMatchFilter {
                location: self.directory.clone(),
                pattern: format!(
                    "{} (range {} of {total} file(s), every {})",
                    self.pattern(),
                    selection.range,
                    selection.skip
                ),
            });
        }
        Ok(Some(kept))
    }
}

#[cfg(test)]
mod tests {
    use image::{Rgb, RgbImage};

    use super::*;
    use crate::config::ExtractionRange;

    fn populate(directory: &Path, names: &[&str]) {
        for (shade, name) in names.iter().enumerate() {
            RgbImage::from_pixel(2, 2, Rgb([shade as u8; 3]))
                .save(directory.join(name))
                .unwrap();
        }
    }

    #[test]
    fn lists_sorted_and_filtered() {
        let directory = tempfile::tempdir().unwrap();
        populate(directory.path(), &["b.png", "a.png", "c.jpg", "out.gif"]);
        std::fs::write(directory.path().join("notes.txt"), b"x").unwrap();

        let all = DirectorySource::new(directory.path(), None).list().unwrap();
        let names: Vec<_> = all
            .iter()
            .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.png", "b.png", "c.jpg"]);

        let png = DirectorySource::new(directory.path(), Some(".png")).list().unwrap();
        assert_eq!(png.len(), 2);
    }

    #[test]
    fn range_is_inclusive_and_indices_are_positions() {
        let directory = tempfile::tempdir().unwrap();
        populate(directory.path(), &["0.png", "1.png", "2.png", "3.png", "4.png"]);

        let source = DirectorySource::new(directory.path(), None);
        let selection = FrameSelection::new(ExtractionRange::new(1, Some(3)), 1);
        let frames: Vec<IndexedFrame> = source
            .frames(&selection)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        let indices: Vec<u64> = frames.iter().map(|frame| frame.index).collect();
        assert_eq!(indices, [1, 2, 3]);
        assert_eq!(frames[0].image.get_pixel(0, 0), &Rgb([1, 1, 1]));
    }

    #[test]
    fn empty_listing_is_an_error() {
        let directory = tempfile::tempdir().unwrap();
        populate(directory.path(), &["a.png"]);
        let result = DirectorySource::new(directory.path(), Some("tiff")).frames(&FrameSelection::all());
        assert!(matches!(result, Err(ReframeError::NoFramesMatchFilter { .. })));
    }

    #[test]
    fn range_past_end_is_an_error() {
        let directory = tempfile::tempdir().unwrap();
        populate(directory.path(), &["a.png", "b.png"]);
        let selection = FrameSelection::new(ExtractionRange::new(5, None), 1);
        let result = DirectorySource::new(directory.path(), None).frame_files(&selection);
        assert!(matches!(result, Err(ReframeError::NoFramesMatchFilter { .. })));
    }

    #[test]
    fn missing_directory_is_not_found() {
        let result = DirectorySource::new("/no/such/frames", None).list();
        assert!(matches!(result, Err(ReframeError::SourceNotFound { .. })));
    }
}
