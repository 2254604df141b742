//! Per-frame geometric and visual transforms.
//!
//! A [`TransformSpec`] names which steps to run; [`TransformChain`] is the
//! compiled, ordered list of non-identity steps. The order is fixed:
//!
//! 1. resize
//! 2. overlay (only for frames with index below the overlay cutoff)
//! 3. rotate
//! 4. pad
//!
//! Each step is a pure function of the frame (plus the read-only overlay
//! image), so frames can be transformed independently and in any order.
//!
//! # Example
//!
//! ```
//! use image::{Rgb, RgbImage};
//! use reframe::{IndexedFrame, Padding, Resize, TransformChain, TransformSpec};
//!
//! let spec = TransformSpec::new()
//!     .with_resize(Resize::Factor(0.5))
//!     .with_rotation(90.0)
//!     .with_padding(Padding::new(1, 1, 1, 1));
//! let chain = TransformChain::from_spec(&spec)?;
//!
//! let frame = IndexedFrame::new(0, RgbImage::from_pixel(40, 20, Rgb([255, 0, 0])));
//! let out = chain.apply(frame)?;
//! assert_eq!(out.dimensions(), (12, 22));
//! # Ok::<(), reframe::ReframeError>(())
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::Path;
use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage, RgbaImage};

use crate::error::ReframeError;
use crate::frame::{Frame, IndexedFrame, checked_dimensions};
use crate::padding::Padding;

/// Frames with an index at or above this value are never overlaid.
pub const DEFAULT_OVERLAY_CUTOFF: u64 = 38;

/// Tolerance used when rounding rotated canvas sizes up.
const CANVAS_EPSILON: f64 = 1e-6;

/// How to resize a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resize {
    /// Scale both dimensions by a factor. Fractional pixel sizes are
    /// truncated.
    Factor(f64),
    /// Resize to an exact size.
    Exact {
        width: u32,
        height: u32,
    },
}

impl Resize {
    /// `true` when the step never changes a frame.
    pub fn is_identity(&self) -> bool {
        matches!(self, Resize::Factor(factor) if *factor == 1.0)
    }

    /// Size of a `width × height` frame after resizing.
    ///
    /// # Errors
    ///
    /// [`ReframeError::InvalidConfiguration`] when the target exceeds
    /// [`MAX_FRAME_PIXELS`](crate::frame::MAX_FRAME_PIXELS).
    pub fn target_dimensions(&self, width: u32, height: u32) -> Result<(u32, u32), ReframeError> {
        match *self {
            // Float to int casts saturate, so huge factors land above the limit.
            Resize::Factor(factor) => checked_dimensions(
                (width as f64 * factor) as u64,
                (height as f64 * factor) as u64,
                "resize",
            ),
            Resize::Exact { width, height } => {
                checked_dimensions(u64::from(width), u64::from(height), "resize")
            }
        }
    }

    fn validate(&self) -> Result<(), ReframeError> {
        match *self {
            Resize::Factor(factor) if !(factor.is_finite() && factor > 0.0) => Err(
                ReframeError::InvalidConfiguration(format!("resize factor {factor} must be > 0")),
            ),
            Resize::Exact { width, height } if width == 0 || height == 0 => {
                Err(ReframeError::InvalidConfiguration(format!(
                    "resize target {width}x{height} must be non-empty"
                )))
            }
            Resize::Exact { width, height } => {
                checked_dimensions(u64::from(width), u64::from(height), "resize").map(|_| ())
            }
            Resize::Factor(_) => Ok(()),
        }
    }

    fn apply(&self, frame: IndexedFrame) -> Result<IndexedFrame, ReframeError> {
        let (width, height) = frame.dimensions();
        let (target_width, target_height) = self.target_dimensions(width, height)?;
        if (target_width, target_height) == (width, height) {
            return Ok(frame);
        }
        if target_width == 0 || target_height == 0 {
            return Err(ReframeError::DimensionMismatch {
                index: frame.index,
                expected: (target_width, target_height),
                actual: (width, height),
                reason: "resize would produce an empty frame".to_string(),
            });
        }

        let image = imageops::resize(&frame.image, target_width, target_height, FilterType::Triangle);
        Ok(IndexedFrame::new(frame.index, image))
    }
}

/// A static RGBA image alpha-composited onto the first frames of a run.
///
/// The image is placed at the top-left corner and clipped to the frame.
/// Its own alpha channel is the blend mask.
#[derive(Clone)]
pub struct Overlay {
    image: Arc<RgbaImage>,
    cutoff: u64,
}

impl Debug for Overlay {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Overlay")
            .field("dimensions", &self.image.dimensions())
            .field("cutoff", &self.cutoff)
            .finish()
    }
}

impl Overlay {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image: Arc::new(image),
            cutoff: DEFAULT_OVERLAY_CUTOFF,
        }
    }

    /// Load the overlay image from disk. Images without alpha are opaque.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ReframeError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ReframeError::SourceNotFound {
                path: path.to_path_buf(),
            });
        }
        Ok(Self::new(image::open(path)?.to_rgba8()))
    }

    /// Only frames with `index < cutoff` receive the overlay.
    #[must_use]
    pub fn with_cutoff(mut self, cutoff: u64) -> Self {
        self.cutoff = cutoff;
        self
    }

    pub fn cutoff(&self) -> u64 {
        self.cutoff
    }

    pub fn applies_to(&self, index: u64) -> bool {
        index < self.cutoff
    }

    fn apply(&self, mut frame: IndexedFrame) -> Result<IndexedFrame, ReframeError> {
        let (overlay_width, overlay_height) = self.image.dimensions();
        if overlay_width == 0 || overlay_height == 0 {
            return Err(ReframeError::DimensionMismatch {
                index: frame.index,
                expected: frame.dimensions(),
                actual: (overlay_width, overlay_height),
                reason: "overlay image is empty".to_string(),
            });
        }

        let (width, height) = frame.dimensions();
        for y in 0..height.min(overlay_height) {
            for x in 0..width.min(overlay_width) {
                let top = self.image.get_pixel(x, y);
                let alpha = top[3] as u32;
                if alpha == 0 {
                    continue;
                }
                let bottom = frame.image.get_pixel_mut(x, y);
                for channel in 0..3 {
                    let blended =
                        top[channel] as u32 * alpha + bottom[channel] as u32 * (255 - alpha);
                    bottom[channel] = ((blended + 127) / 255) as u8;
                }
            }
        }
        Ok(frame)
    }
}

/// Rotation about the frame centre with an expanded canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rotation {
    /// Counter-clockwise angle in degrees.
    pub angle_degrees: f64,
    /// Colour of the exposed corners.
    pub fill: Rgb<u8>,
}

impl Rotation {
    /// Rotation with black corners.
    pub fn new(angle_degrees: f64) -> Self {
        Self {
            angle_degrees,
            fill: Rgb([0, 0, 0]),
        }
    }

    #[must_use]
    pub fn with_fill(mut self, fill: Rgb<u8>) -> Self {
        self.fill = fill;
        self
    }

    /// `true` for whole turns.
    pub fn is_identity(&self) -> bool {
        self.angle_degrees.rem_euclid(360.0) == 0.0
    }

    /// Smallest canvas holding a rotated `width × height` frame.
    ///
    /// `new_w = h·|sin θ| + w·|cos θ|`, `new_h = h·|cos θ| + w·|sin θ|`,
    /// rounded up.
    pub fn rotated_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        let radians = self.angle_degrees.to_radians();
        let (sin, cos) = (radians.sin().abs(), radians.cos().abs());
        let (width, height) = (width as f64, height as f64);
        let new_width = height * sin + width * cos;
        let new_height = height * cos + width * sin;
        (
            ((new_width - CANVAS_EPSILON).ceil() as u32).max(1),
            ((new_height - CANVAS_EPSILON).ceil() as u32).max(1),
        )
    }

    fn apply(&self, frame: IndexedFrame) -> IndexedFrame {
        let index = frame.index;
        let turned = match self.angle_degrees.rem_euclid(360.0) {
            angle if angle == 0.0 => return frame,
            // Counter-clockwise quarter turns map to exact pixel permutations.
            angle if angle == 90.0 => imageops::rotate270(&frame.image),
            angle if angle == 180.0 => imageops::rotate180(&frame.image),
            angle if angle == 270.0 => imageops::rotate90(&frame.image),
            _ => self.rotate_bilinear(&frame.image),
        };
        IndexedFrame::new(index, turned)
    }

    fn rotate_bilinear(&self, frame: &Frame) -> Frame {
        let (width, height) = frame.dimensions();
        let (new_width, new_height) = self.rotated_dimensions(width, height);
        let radians = self.angle_degrees.to_radians();
        let (sin, cos) = radians.sin_cos();

        let source_center = (width as f64 / 2.0, height as f64 / 2.0);
        let target_center = (new_width as f64 / 2.0, new_height as f64 / 2.0);

        RgbImage::from_fn(new_width, new_height, |x, y| {
            let dx = x as f64 + 0.5 - target_center.0;
            let dy = y as f64 + 0.5 - target_center.1;
            // Inverse of a counter-clockwise rotation in y-down coordinates.
            let source_x = cos * dx - sin * dy + source_center.0 - 0.5;
            let source_y = sin * dx + cos * dy + source_center.1 - 0.5;
            sample_bilinear(frame, source_x, source_y, self.fill)
        })
    }
}

/// Bilinear sample; pixels outside the frame read as `fill`.
fn sample_bilinear(frame: &Frame, x: f64, y: f64, fill: Rgb<u8>) -> Rgb<u8> {
    let (width, height) = frame.dimensions();
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;

    let pixel = |px: f64, py: f64| -> Option<Rgb<u8>> {
        if px < 0.0 || py < 0.0 || px >= width as f64 || py >= height as f64 {
            None
        } else {
            Some(*frame.get_pixel(px as u32, py as u32))
        }
    };

    let corners = [
        (pixel(x0, y0), (1.0 - fx) * (1.0 - fy)),
        (pixel(x0 + 1.0, y0), fx * (1.0 - fy)),
        (pixel(x0, y0 + 1.0), (1.0 - fx) * fy),
        (pixel(x0 + 1.0, y0 + 1.0), fx * fy),
    ];
    if corners.iter().all(|(value, _)| value.is_none()) {
        return fill;
    }

    let mut accumulated = [0.0_f64; 3];
    for (value, weight) in corners {
        let value = value.unwrap_or(fill);
        for channel in 0..3 {
            accumulated[channel] += value[channel] as f64 * weight;
        }
    }
    Rgb(accumulated.map(|value| value.round().clamp(0.0, 255.0) as u8))
}

/// Which transforms to run. Absent fields are identity.
#[derive(Debug, Clone, Default)]
pub struct TransformSpec {
    pub resize: Option<Resize>,
    pub overlay: Option<Overlay>,
    pub rotation: Option<Rotation>,
    pub padding: Option<Padding>,
}

impl TransformSpec {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_resize(mut self, resize: Resize) -> Self {
        self.resize = Some(resize);
        self
    }

    #[must_use]
    pub fn with_overlay(mut self, overlay: Overlay) -> Self {
        self.overlay = Some(overlay);
        self
    }

    /// Rotate counter-clockwise by `angle_degrees` with black corners.
    #[must_use]
    pub fn with_rotation(mut self, angle_degrees: f64) -> Self {
        self.rotation = Some(Rotation::new(angle_degrees));
        self
    }

    #[must_use]
    pub fn with_rotation_fill(mut self, rotation: Rotation) -> Self {
        self.rotation = Some(rotation);
        self
    }

    #[must_use]
    pub fn with_padding(mut self, padding: Padding) -> Self {
        self.padding = Some(padding);
        self
    }
}

/// A single compiled step.
#[derive(Debug, Clone)]
pub enum TransformStep {
    Resize(Resize),
    Overlay(Overlay),
    Rotate(Rotation),
    Pad(Padding),
}

/// The ordered, non-identity steps of a [`TransformSpec`].
///
/// Holds no per-frame state; share it freely between threads.
#[derive(Debug, Clone, Default)]
pub struct TransformChain {
    steps: Vec<TransformStep>,
}

impl TransformChain {
    /// Compile a spec, dropping identity steps.
    ///
    /// # Errors
    ///
    /// [`ReframeError::InvalidConfiguration`] for a non-positive resize
    /// factor, an empty exact size, or a non-finite angle.
    pub fn from_spec(spec: &TransformSpec) -> Result<Self, ReframeError> {
        let mut steps = Vec::with_capacity(4);

        if let Some(resize) = spec.resize {
            resize.validate()?;
            if !resize.is_identity() {
                steps.push(TransformStep::Resize(resize));
            }
        }
        if let Some(overlay) = &spec.overlay {
            steps.push(TransformStep::Overlay(overlay.clone()));
        }
        if let Some(rotation) = spec.rotation {
            if !rotation.angle_degrees.is_finite() {
                return Err(ReframeError::InvalidConfiguration(format!(
                    "rotation angle {} is not finite",
                    rotation.angle_degrees
                )));
            }
            if !rotation.is_identity() {
                steps.push(TransformStep::Rotate(rotation));
            }
        }
        if let Some(padding) = spec.padding {
            if !padding.is_identity() {
                steps.push(TransformStep::Pad(padding));
            }
        }

        log::debug!("Compiled transform chain with {} step(s): {steps:?}", steps.len());
        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[TransformStep] {
        &self.steps
    }

    pub fn is_identity(&self) -> bool {
        self.steps.is_empty()
    }

    /// Output size for a `width × height` input. Overlays never change size.
    pub fn output_dimensions(&self, width: u32, height: u32) -> Result<(u32, u32), ReframeError> {
        self.steps
            .iter()
            .try_fold((width, height), |(width, height), step| match step {
                TransformStep::Resize(resize) => resize.target_dimensions(width, height),
                TransformStep::Overlay(_) => Ok((width, height)),
                TransformStep::Rotate(rotation) => {
                    let angle = rotation.angle_degrees.rem_euclid(360.0);
                    if angle == 90.0 || angle == 270.0 {
                        Ok((height, width))
                    } else if angle == 180.0 {
                        Ok((width, height))
                    } else {
                        Ok(rotation.rotated_dimensions(width, height))
                    }
                }
                TransformStep::Pad(padding) => padding.padded_dimensions(width, height),
            })
    }

    /// Run every step on one frame. The index is preserved.
    pub fn apply(&self, frame: IndexedFrame) -> Result<IndexedFrame, ReframeError> {
        self.steps.iter().try_fold(frame, |frame, step| match step {
            TransformStep::Resize(resize) => resize.apply(frame),
            TransformStep::Overlay(overlay) if overlay.applies_to(frame.index) => {
                overlay.apply(frame)
            }
            TransformStep::Overlay(_) => Ok(frame),
            TransformStep::Rotate(rotation) => Ok(rotation.apply(frame)),
            TransformStep::Pad(padding) => {
                let image = padding.apply(&frame.image)?;
                Ok(IndexedFrame::new(frame.index, image))
            }
        })
    }
}
