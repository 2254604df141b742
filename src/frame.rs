//! The unit of data moving through the pipeline.
//!
//! A [`Frame`] is an 8-bit RGB raster. Each stage owns the frames it holds
//! and hands them to the next stage by value.

use std::path::Path;

use image::RgbImage;

use crate::error::ReframeError;

/// One decoded raster image, RGB channel order, 8 bits per channel.
pub type Frame = RgbImage;

/// Largest frame, in pixels, a transform may produce.
pub const MAX_FRAME_PIXELS: u64 = 1 << 28;

/// Narrow a computed `width × height` to a frame size that can be
/// allocated, or fail with [`ReframeError::InvalidConfiguration`].
pub(crate) fn checked_dimensions(
    width: u64,
    height: u64,
    operation: &str,
) -> Result<(u32, u32), ReframeError> {
    match (u32::try_from(width), u32::try_from(height)) {
        (Ok(narrow_width), Ok(narrow_height))
            if width.saturating_mul(height) <= MAX_FRAME_PIXELS =>
        {
            Ok((narrow_width, narrow_height))
        }
        _ => Err(ReframeError::InvalidConfiguration(format!(
            "{operation} would produce a {width}x{height} frame, above the {MAX_FRAME_PIXELS} pixel limit"
        ))),
    }
}

/// A frame tagged with the index it was extracted at.
///
/// The index defines output order and drives decimation, range filtering,
/// and overlay eligibility.
#[derive(Debug, Clone)]
pub struct IndexedFrame {
    /// Source index, assigned at extraction time.
    pub index: u64,
    /// The pixels.
    pub image: Frame,
}

impl IndexedFrame {
    pub fn new(index: u64, image: Frame) -> Self {
        Self { index, image }
    }

    /// `(width, height)` of the frame.
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Read a still image from disk as an RGB frame.
///
/// Alpha is dropped; grayscale and palette images are expanded to RGB.
pub fn read_frame<P: AsRef<Path>>(path: P) -> Result<Frame, ReframeError> {
    let path = path.as_ref();
    log::trace!("Reading still image {}", path.display());
    Ok(image::open(path)?.to_rgb8())
}

/// Write an RGB frame to disk. The format follows the file extension.
pub fn write_frame<P: AsRef<Path>>(frame: &Frame, path: P) -> Result<(), ReframeError> {
    frame.save(path.as_ref())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use image::Rgb;

    use super::*;

    #[test]
    fn write_then_read_png_is_lossless() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("pixel.png");
        let frame = RgbImage::from_pixel(3, 2, Rgb([10, 200, 30]));

        write_frame(&frame, &path).unwrap();
        let read = read_frame(&path).unwrap();
        assert_eq!(read, frame);
    }

    #[test]
    fn oversized_dimensions_are_rejected() {
        assert_eq!(checked_dimensions(640, 480, "resize").unwrap(), (640, 480));
        assert!(matches!(
            checked_dimensions(u64::from(u32::MAX) + 1, 1, "pad"),
            Err(ReframeError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            checked_dimensions(1 << 20, 1 << 20, "resize"),
            Err(ReframeError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn read_missing_file_fails() {
        assert!(read_frame("does/not/exist.png").is_err());
    }
}
