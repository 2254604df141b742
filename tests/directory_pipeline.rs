//! End-to-end runs over image-directory sources.

use std::fs::File;
use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage, Rgba, RgbaImage};
use reframe::{
    ContainerKind, ExtractionRange, Overlay, OutputSpec, Padding, PipelineConfig, PipelineDriver,
    PipelineStage, ProcessingMode, ReframeError, Resize, TailImage, TransformSpec,
};

/// `count` solid frames named `000.png`, `001.png`, ... in `<root>/frames`.
fn frame_directory(root: &Path, count: u8, width: u32, height: u32) -> PathBuf {
    let frames = root.join("frames");
    std::fs::create_dir_all(&frames).expect("create frames dir");
    for index in 0..count {
        RgbImage::from_pixel(width, height, Rgb([index * 20, 100, 200 - index * 20]))
            .save(frames.join(format!("{index:03}.png")))
            .expect("write frame");
    }
    frames
}

fn gif_frames(path: &Path) -> Vec<(u16, u16, u16)> {
    let mut options = gif::DecodeOptions::new();
    options.set_color_output(gif::ColorOutput::RGBA);
    let mut decoder = options
        .read_info(File::open(path).expect("open gif"))
        .expect("read gif header");
    let mut frames = Vec::new();
    while let Some(frame) = decoder.read_next_frame().expect("read gif frame") {
        frames.push((frame.width, frame.height, frame.delay));
    }
    frames
}

#[test]
fn selected_range_becomes_gif() {
    let root = tempfile::tempdir().expect("tempdir");
    let frames = frame_directory(root.path(), 5, 8, 6);

    let config = PipelineConfig::new(&frames)
        .with_extension(".png")
        .with_range(ExtractionRange::new(1, Some(3)))
        .with_output(OutputSpec::new(ContainerKind::Gif).with_fps(10.0));
    let report = PipelineDriver::new(config).run().expect("run");

    assert_eq!(report.frames_read, 3);
    assert_eq!(report.frames_encoded, 3);
    assert_eq!(report.outputs, [root.path().join("result.gif")]);

    let written = gif_frames(&report.outputs[0]);
    assert_eq!(written.len(), 3);
    assert!(written.iter().all(|&(w, h, delay)| (w, h, delay) == (8, 6, 10)));
}

#[test]
fn directories_ignore_skip_unless_asked() {
    let root = tempfile::tempdir().expect("tempdir");
    let frames = frame_directory(root.path(), 6, 4, 4);

    let plain = PipelineDriver::new(
        PipelineConfig::new(&frames)
            .with_skip(2)
            .with_output(OutputSpec::default().with_name("plain.gif")),
    )
    .run()
    .expect("run");
    assert_eq!(plain.frames_encoded, 6);

    let decimated = PipelineDriver::new(
        PipelineConfig::new(&frames)
            .with_skip(2)
            .with_decimate_directories(true)
            .with_output(OutputSpec::default().with_name("decimated.gif")),
    )
    .run()
    .expect("run");
    assert_eq!(decimated.frames_encoded, 3);
}

#[test]
fn partitions_split_ten_frames_four_three_three() {
    let root = tempfile::tempdir().expect("tempdir");
    let frames = frame_directory(root.path(), 10, 4, 4);
    let out = root.path().join("parts");

    let config = PipelineConfig::new(&frames).with_output(
        OutputSpec::new(ContainerKind::Gif)
            .with_path(&out)
            .with_partitions(3)
            .with_suffix("clip"),
    );
    let report = PipelineDriver::new(config).run().expect("run");

    assert_eq!(report.mode, ProcessingMode::Buffered);
    let names: Vec<String> = report
        .outputs
        .iter()
        .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, ["result_0_clip.gif", "result_1_clip.gif", "result_2_clip.gif"]);

    let counts: Vec<usize> = report.outputs.iter().map(|path| gif_frames(path).len()).collect();
    assert_eq!(counts, [4, 3, 3]);
}

#[test]
fn transforms_set_output_size() {
    let root = tempfile::tempdir().expect("tempdir");
    let frames = frame_directory(root.path(), 3, 20, 10);

    let transforms = TransformSpec::new()
        .with_resize(Resize::Factor(0.5))
        .with_rotation(90.0)
        .with_padding(Padding::new(1, 1, 2, 2));
    let config = PipelineConfig::new(&frames).with_transforms(transforms);
    let report = PipelineDriver::new(config).run().expect("run");

    // 20x10 -> 10x5 -> 5x10 -> 9x12
    assert_eq!(report.dimensions, Some((9, 12)));
    assert!(gif_frames(&report.outputs[0]).iter().all(|&(w, h, _)| (w, h) == (9, 12)));
}

#[test]
fn overlay_only_touches_early_frames() {
    let root = tempfile::tempdir().expect("tempdir");
    let frames = frame_directory(root.path(), 4, 4, 4);
    let out = root.path().join("out");

    let overlay = Overlay::new(RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 255]))).with_cutoff(2);
    let config = PipelineConfig::new(&frames)
        .with_transforms(TransformSpec::new().with_overlay(overlay))
        .with_mode(ProcessingMode::Buffered)
        .with_keep_extracted(true)
        .with_output(OutputSpec::default().with_path(&out).with_partitions(4));
    let report = PipelineDriver::new(config).run().expect("run");
    assert_eq!(report.outputs.len(), 4);
    // Directories are never extracted, so there is no cache to keep.
    assert_eq!(report.kept_cache, None);

    let first_pixel = |path: &Path| {
        let decoder = image::codecs::gif::GifDecoder::new(std::io::BufReader::new(
            File::open(path).expect("open"),
        ))
        .expect("decoder");
        let frame = image::AnimationDecoder::into_frames(decoder)
            .next()
            .expect("one frame")
            .expect("decode");
        *frame.buffer().get_pixel(0, 0)
    };
    assert_eq!(first_pixel(&report.outputs[0]), Rgba([255, 255, 255, 255]));
    assert_eq!(first_pixel(&report.outputs[1]), Rgba([255, 255, 255, 255]));
    assert_ne!(first_pixel(&report.outputs[2]), Rgba([255, 255, 255, 255]));
    assert_ne!(first_pixel(&report.outputs[3]), Rgba([255, 255, 255, 255]));
}

#[test]
fn tail_image_is_appended_at_output_size() {
    let root = tempfile::tempdir().expect("tempdir");
    let frames = frame_directory(root.path(), 2, 6, 4);
    let card = root.path().join("card.png");
    RgbImage::from_pixel(30, 30, Rgb([0, 0, 0])).save(&card).expect("write card");

    let config = PipelineConfig::new(&frames).with_tail(TailImage::new(&card, 5));
    let report = PipelineDriver::new(config).run().expect("run");

    assert_eq!(report.frames_read, 2);
    assert_eq!(report.frames_encoded, 7);
    assert!(report.stages.contains(&PipelineStage::TailAppend));
    assert!(gif_frames(&report.outputs[0]).iter().all(|&(w, h, _)| (w, h) == (6, 4)));
}

#[test]
fn mixed_frame_sizes_fail_with_dimension_mismatch() {
    let root = tempfile::tempdir().expect("tempdir");
    let frames = frame_directory(root.path(), 2, 4, 4);
    RgbImage::new(5, 4).save(frames.join("002.png")).expect("write odd frame");

    let error = PipelineDriver::new(PipelineConfig::new(&frames))
        .run()
        .expect_err("sizes differ");
    assert!(matches!(
        error.root(),
        ReframeError::DimensionMismatch { index: 2, .. }
    ));
    assert!(!root.path().join("result.gif").exists());
}

#[test]
fn empty_filter_is_reported() {
    let root = tempfile::tempdir().expect("tempdir");
    let frames = frame_directory(root.path(), 2, 4, 4);

    let error = PipelineDriver::new(PipelineConfig::new(&frames).with_extension("jpg"))
        .run()
        .expect_err("no jpg files");
    assert_eq!(error.stage(), Some(PipelineStage::Reading));
    assert!(matches!(error.root(), ReframeError::NoFramesMatchFilter { .. }));
}

#[test]
fn missing_source_is_reported() {
    let root = tempfile::tempdir().expect("tempdir");
    let error = PipelineDriver::new(PipelineConfig::new(root.path().join("nothing")))
        .run()
        .expect_err("missing");
    assert!(matches!(error.root(), ReframeError::SourceNotFound { .. }));
}

#[test]
fn invalid_configuration_is_rejected_before_reading() {
    let root = tempfile::tempdir().expect("tempdir");
    let frames = frame_directory(root.path(), 2, 4, 4);

    let error = PipelineDriver::new(
        PipelineConfig::new(&frames).with_range(ExtractionRange::new(3, Some(1))),
    )
    .run()
    .expect_err("inverted range");
    assert!(matches!(error.root(), ReframeError::InvalidConfiguration(_)));
    assert_eq!(error.stage(), Some(PipelineStage::Idle));
}
