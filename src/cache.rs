//! Temporary on-disk frame cache.
//!
//! Container sources are decoded into a per-run directory of lossless PNG
//! files named `frame_00000000.png`, `frame_00000001.png`, ... so that a
//! lexicographic listing returns frames in index order. The directory is
//! created with a unique name and is removed when the cache is dropped,
//! whichever way the run ends, unless [`TempFrameCache::keep`] is called.

use std::path::{Path, PathBuf};

use tempfile::{Builder, TempDir};

use crate::error::ReframeError;
use crate::frame::{IndexedFrame, write_frame};

/// Prefix of every cache directory name.
pub const CACHE_DIRECTORY_PREFIX: &str = "tmp_images_";

/// Digits in a cache file index. Indices up to `10^8 - 1` fit.
pub const CACHE_INDEX_DIGITS: usize = 8;

const MAX_CACHE_INDEX: u64 = 99_999_999;
const FRAME_FILE_PREFIX: &str = "frame_";
const FRAME_FILE_EXTENSION: &str = "png";

/// File name for the frame extracted at `index`.
///
/// # Errors
///
/// [`ReframeError::CacheLimitExceeded`] when `index` needs more than
/// [`CACHE_INDEX_DIGITS`] digits, which would break lexicographic order.
pub fn frame_file_name(index: u64) -> Result<String, ReframeError> {
    if index > MAX_CACHE_INDEX {
        return Err(ReframeError::CacheLimitExceeded { index });
    }
    Ok(format!(
        "{FRAME_FILE_PREFIX}{index:0width$}.{FRAME_FILE_EXTENSION}",
        width = CACHE_INDEX_DIGITS
    ))
}

/// Recover the index from a cache file name.
pub fn parse_frame_file_name(name: &str) -> Option<u64> {
    let digits = name
        .strip_prefix(FRAME_FILE_PREFIX)?
        .strip_suffix(FRAME_FILE_EXTENSION)?
        .strip_suffix('.')?;
    if digits.len() != CACHE_INDEX_DIGITS || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// A uniquely named directory of extracted frames, owned by one run.
#[derive(Debug)]
pub struct TempFrameCache {
    directory: TempDir,
    stored: u64,
}

impl TempFrameCache {
    /// Create a fresh cache directory under `root`.
    ///
    /// # Errors
    ///
    /// [`ReframeError::IoError`] if the directory cannot be created.
    pub fn create_in(root: &Path) -> Result<Self, ReframeError> {
        let directory = Builder::new()
            .prefix(CACHE_DIRECTORY_PREFIX)
            .tempdir_in(root)?;
        log::debug!("Created frame cache {}", directory.path().display());
        Ok(Self {
            directory,
            stored: 0,
        })
    }

    pub fn path(&self) -> &Path {
        self.directory.path()
    }

    /// Number of frames written so far.
    pub fn len(&self) -> u64 {
        self.stored
    }

    pub fn is_empty(&self) -> bool {
        self.stored == 0
    }

    /// Write `frame` as a lossless PNG named after its index.
    pub fn store(&mut self, frame: &IndexedFrame) -> Result<PathBuf, ReframeError> {
        let path = self.directory.path().join(frame_file_name(frame.index)?);
        write_frame(&frame.image, &path)?;
        self.stored += 1;
        Ok(path)
    }

    /// The cached frames as `(index, path)`, in index order.
    ///
    /// Files that do not follow the cache naming scheme are ignored.
    pub fn entries(&self) -> Result<Vec<(u64, PathBuf)>, ReframeError> {
        let mut entries = Vec::with_capacity(self.stored as usize);
        for entry in std::fs::read_dir(self.directory.path())? {
            let path = entry?.path();
            let index = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(parse_frame_file_name);
            if let Some(index) = index {
                entries.push((index, path));
            }
        }
        entries.sort_by_key(|(index, _)| *index);
        Ok(entries)
    }

    /// Detach the directory from the cache so it survives the run.
    pub fn keep(self) -> PathBuf {
        let path = self.directory.keep();
        log::info!("Keeping extracted frames in {}", path.display());
        path
    }

    /// Remove the directory now, reporting failures instead of ignoring
    /// them as the drop path does.
    pub fn close(self) -> Result<(), ReframeError> {
        let path = self.directory.path().to_path_buf();
        self.directory.close()?;
        log::debug!("Removed frame cache {}", path.display());
        Ok(())
    }
}
