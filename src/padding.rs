//! Border padding.
//!
//! [`Padding`] adds fixed borders around a frame. The border content is
//! chosen by [`BorderMode`]; only [`BorderMode::Constant`] uses the fill
//! colour. Paddings are usually parsed from the compact spec string
//! `top,bottom,left,right,mode,r,g,b`.

use std::str::FromStr;

use image::{Rgb, RgbImage};

use crate::error::ReframeError;
use crate::frame::{Frame, checked_dimensions};

/// How border pixels are produced.
///
/// The numeric codes `0..=4` match the conventional border-type constants
/// used by image processing toolkits, so spec strings written for those
/// tools keep working.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BorderMode {
    /// Solid fill colour (`0`).
    #[default]
    Constant,
    /// Repeat the edge pixel: `aaa|abcd|ddd` (`1`).
    Replicate,
    /// Mirror including the edge pixel: `cba|abcd|dcb` (`2`).
    Reflect,
    /// Tile the frame: `bcd|abcd|abc` (`3`).
    Wrap,
    /// Mirror excluding the edge pixel: `dcb|abcd|cba` (`4`).
    Reflect101,
}

impl FromStr for BorderMode {
    type Err = ReframeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "0" | "constant" => Ok(BorderMode::Constant),
            "1" | "replicate" => Ok(BorderMode::Replicate),
            "2" | "reflect" => Ok(BorderMode::Reflect),
            "3" | "wrap" => Ok(BorderMode::Wrap),
            "4" | "reflect101" | "reflect_101" | "default" => Ok(BorderMode::Reflect101),
            other => Err(ReframeError::InvalidConfiguration(format!(
                "unknown border mode '{other}'"
            ))),
        }
    }
}

impl BorderMode {
    /// Map an out-of-range coordinate onto `0..len`.
    ///
    /// Returns `None` for [`BorderMode::Constant`], whose border pixels do
    /// not come from the frame.
    fn source_coordinate(self, position: i64, len: i64) -> Option<i64> {
        if (0..len).contains(&position) {
            return Some(position);
        }
        match self {
            BorderMode::Constant => None,
            BorderMode::Replicate => Some(position.clamp(0, len - 1)),
            BorderMode::Wrap => Some(position.rem_euclid(len)),
            BorderMode::Reflect => {
                let period = 2 * len;
                let folded = position.rem_euclid(period);
                Some(if folded < len { folded } else { period - 1 - folded })
            }
            BorderMode::Reflect101 => {
                if len == 1 {
                    return Some(0);
                }
                let period = 2 * (len - 1);
                let folded = position.rem_euclid(period);
                Some(if folded < len { folded } else { period - folded })
            }
        }
    }
}

/// Fixed pixel borders around a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Padding {
    pub top: u32,
    pub bottom: u32,
    pub left: u32,
    pub right: u32,
    pub mode: BorderMode,
    /// Fill colour for [`BorderMode::Constant`].
    pub color: Rgb<u8>,
}

impl Padding {
    /// Constant black borders of the given widths.
    pub fn new(top: u32, bottom: u32, left: u32, right: u32) -> Self {
        Self {
            top,
            bottom,
            left,
            right,
            mode: BorderMode::Constant,
            color: Rgb([0, 0, 0]),
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: BorderMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_color(mut self, color: Rgb<u8>) -> Self {
        self.color = color;
        self
    }

    /// `true` when every border is zero wide.
    pub fn is_identity(&self) -> bool {
        self.top == 0 && self.bottom == 0 && self.left == 0 && self.right == 0
    }

    /// Size of a `width × height` frame after padding.
    ///
    /// # Errors
    ///
    /// [`ReframeError::InvalidConfiguration`] when the padded frame would
    /// exceed [`MAX_FRAME_PIXELS`](crate::frame::MAX_FRAME_PIXELS).
    pub fn padded_dimensions(&self, width: u32, height: u32) -> Result<(u32, u32), ReframeError> {
        checked_dimensions(
            u64::from(width) + u64::from(self.left) + u64::from(self.right),
            u64::from(height) + u64::from(self.top) + u64::from(self.bottom),
            "padding",
        )
    }

    /// Return a new frame with the borders added.
    pub fn apply(&self, frame: &Frame) -> Result<Frame, ReframeError> {
        let (width, height) = frame.dimensions();
        let (out_width, out_height) = self.padded_dimensions(width, height)?;

        Ok(RgbImage::from_fn(out_width, out_height, |x, y| {
            let source_x = self
                .mode
                .source_coordinate(x as i64 - self.left as i64, width as i64);
            let source_y = self
                .mode
                .source_coordinate(y as i64 - self.top as i64, height as i64);
            match (source_x, source_y) {
                (Some(sx), Some(sy)) => *frame.get_pixel(sx as u32, sy as u32),
                _ => self.color,
            }
        }))
    }
}

impl FromStr for Padding {
    type Err = ReframeError;

    /// Parse `top,bottom,left,right[,mode[,r,g,b]]`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = value.split(',').map(str::trim).collect();
        if !matches!(parts.len(), 4 | 5 | 8) {
            return Err(ReframeError::InvalidConfiguration(format!(
                "padding '{value}' must be top,bottom,left,right[,mode[,r,g,b]]"
            )));
        }

        let number = |text: &str| -> Result<u32, ReframeError> {
            text.parse::<u32>().map_err(|_| {
                ReframeError::InvalidConfiguration(format!(
                    "padding value '{text}' is not a non-negative integer"
                ))
            })
        };
        let channel = |text: &str| -> Result<u8, ReframeError> {
            text.parse::<u8>().map_err(|_| {
                ReframeError::InvalidConfiguration(format!(
                    "padding colour channel '{text}' is not in 0..=255"
                ))
            })
        };

        let mut padding = Padding::new(
            number(parts[0])?,
            number(parts[1])?,
            number(parts[2])?,
            number(parts[3])?,
        );
        if parts.len() >= 5 {
            padding.mode = parts[4].parse()?;
        }
        if parts.len() == 8 {
            padding.color = Rgb([channel(parts[5])?, channel(parts[6])?, channel(parts[7])?]);
        }
        Ok(padding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(values: &[u8]) -> Frame {
        RgbImage::from_fn(values.len() as u32, 1, |x, _| Rgb([values[x as usize]; 3]))
    }

    fn red_channel(frame: &Frame) -> Vec<u8> {
        frame.pixels().map(|pixel| pixel[0]).collect()
    }

    #[test]
    fn parse_full_spec() {
        let padding: Padding = "1,2,3,4,0,255,128,0".parse().unwrap();
        assert_eq!((padding.top, padding.bottom, padding.left, padding.right), (1, 2, 3, 4));
        assert_eq!(padding.mode, BorderMode::Constant);
        assert_eq!(padding.color, Rgb([255, 128, 0]));
    }

    #[test]
    fn parse_named_mode_without_color() {
        let padding: Padding = "0,0,2,2,reflect".parse().unwrap();
        assert_eq!(padding.mode, BorderMode::Reflect);
        assert_eq!(padding.color, Rgb([0, 0, 0]));
    }

    #[test]
    fn parse_rejects_malformed_specs() {
        assert!("1,2,3".parse::<Padding>().is_err());
        assert!("1,2,3,-4".parse::<Padding>().is_err());
        assert!("1,2,3,4,9".parse::<Padding>().is_err());
        assert!("1,2,3,4,0,256,0,0".parse::<Padding>().is_err());
        assert!("1,2,3,4,0,1,2".parse::<Padding>().is_err());
    }

    #[test]
    fn constant_fills_borders() {
        let frame = RgbImage::from_pixel(2, 2, Rgb([9, 9, 9]));
        let padded = Padding::new(1, 0, 0, 1)
            .with_color(Rgb([1, 2, 3]))
            .apply(&frame)
            .unwrap();
        assert_eq!(padded.dimensions(), (3, 3));
        assert_eq!(*padded.get_pixel(0, 0), Rgb([1, 2, 3]));
        assert_eq!(*padded.get_pixel(2, 1), Rgb([1, 2, 3]));
        assert_eq!(*padded.get_pixel(0, 1), Rgb([9, 9, 9]));
    }

    #[test]
    fn border_modes_sample_like_their_names() {
        let frame = row(&[1, 2, 3, 4]);
        let pad = |mode| {
            red_channel(&Padding::new(0, 0, 3, 3).with_mode(mode).apply(&frame).unwrap())
        };

        assert_eq!(pad(BorderMode::Replicate), [1, 1, 1, 1, 2, 3, 4, 4, 4, 4]);
        assert_eq!(pad(BorderMode::Reflect), [3, 2, 1, 1, 2, 3, 4, 4, 3, 2]);
        assert_eq!(pad(BorderMode::Wrap), [2, 3, 4, 1, 2, 3, 4, 1, 2, 3]);
        assert_eq!(pad(BorderMode::Reflect101), [4, 3, 2, 1, 2, 3, 4, 3, 2, 1]);
    }

    #[test]
    fn reflect101_on_single_pixel_repeats_it() {
        let frame = row(&[7]);
        let padded = Padding::new(0, 0, 2, 2)
            .with_mode(BorderMode::Reflect101)
            .apply(&frame)
            .unwrap();
        assert_eq!(red_channel(&padded), [7, 7, 7, 7, 7]);
    }

    #[test]
    fn oversized_borders_are_invalid_configuration() {
        let padding: Padding = "0,0,4294967295,1".parse().unwrap();
        assert!(matches!(
            padding.padded_dimensions(2, 2),
            Err(ReframeError::InvalidConfiguration(_))
        ));
        let frame = RgbImage::from_pixel(2, 2, Rgb([0, 0, 0]));
        assert!(padding.apply(&frame).is_err());
    }
}
