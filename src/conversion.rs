//! Pixel copies between `image` buffers and FFmpeg frames.
//!
//! FFmpeg frames usually carry per-row padding (stride > width × 3), while
//! [`image::RgbImage`] is tightly packed. These helpers copy row by row
//! when the strides differ.

use ffmpeg_next::{format::Pixel, frame::Video as VideoFrame};

use crate::frame::Frame;

const RGB_BYTES_PER_PIXEL: usize = 3;

/// Copy an RGB24 FFmpeg frame into a tightly packed buffer.
pub(crate) fn rgb_frame_to_buffer(video_frame: &VideoFrame, width: u32, height: u32) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let expected_stride = (width as usize) * RGB_BYTES_PER_PIXEL;
    let data = video_frame.data(0);

    if stride == expected_stride {
        data[..expected_stride * (height as usize)].to_vec()
    } else {
        let mut buffer = Vec::with_capacity(expected_stride * (height as usize));
        for row in 0..(height as usize) {
            let row_start = row * stride;
            buffer.extend_from_slice(&data[row_start..row_start + expected_stride]);
        }
        buffer
    }
}

/// Build an RGB24 FFmpeg frame holding a copy of `frame`.
pub(crate) fn buffer_to_rgb_frame(frame: &Frame) -> VideoFrame {
    let (width, height) = frame.dimensions();
    let mut video_frame = VideoFrame::new(Pixel::RGB24, width, height);
    let stride = video_frame.stride(0);
    let row_len = (width as usize) * RGB_BYTES_PER_PIXEL;
    let source = frame.as_raw();
    let destination = video_frame.data_mut(0);

    for row in 0..(height as usize) {
        let source_start = row * row_len;
        let destination_start = row * stride;
        destination[destination_start..destination_start + row_len]
            .copy_from_slice(&source[source_start..source_start + row_len]);
    }

    video_frame
}
