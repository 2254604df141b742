use std::{path::PathBuf, sync::Arc};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use image::Rgb;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use reframe::{
    CodecLogLevel, ConcatSource, ContainerKind, ExtractionRange, FrameSource, Overlay,
    OutputSpec, Padding, PipelineConfig, PipelineDriver, PipelineStage, ProcessingMode,
    ProgressCallback, ProgressInfo, Resize, Rotation, RunReport, TailImage, TransformSpec,
    VideoCodec,
};

const CLI_AFTER_HELP: &str = "Examples:\n  reframe make shots/ --ext png --start 0 --end 49 --fps 12\n  reframe make clip.mp4 --skip 4 --resize 0.5 --rotate 90 --video\n  reframe make long.gif --partitions 3 --suffix part --progress\n  reframe concat a.mp4 b.mp4 --resize 0.5 --output joined.gif\n  reframe completions zsh > _reframe";

#[derive(Debug, Parser)]
#[command(
    name = "reframe",
    version,
    about = "Turn image folders, GIFs, and videos into GIF or video animations",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show debug logging output.
    #[arg(long, global = true)]
    verbose: bool,

    /// Show a progress bar.
    #[arg(long, global = true)]
    progress: bool,

    /// Print the run report as JSON.
    #[arg(long, global = true)]
    json: bool,

    /// FFmpeg log level (quiet, fatal, error, warning, info, debug).
    #[arg(long, global = true)]
    log_level: Option<String>,
}

/// Options shared by every command that writes an animation.
#[derive(Debug, Parser, Clone)]
struct OutputOptions {
    /// Output file, or directory to place the output in.
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Output file name (default result.gif).
    #[arg(long)]
    name: Option<String>,

    /// Frames per second of the output.
    #[arg(long, default_value_t = 30.0)]
    fps: f64,

    /// Write a video instead of a GIF.
    #[arg(long)]
    video: bool,

    /// Video codec (h264, h265, mpeg4, ffv1). Default follows the extension.
    #[arg(long)]
    codec: Option<String>,

    /// GIF loop count. Loops forever when omitted.
    #[arg(long)]
    repeat: Option<u16>,

    /// Split the frames evenly into this many output files.
    #[arg(long, default_value_t = 1)]
    partitions: usize,

    /// Suffix appended to each output file name.
    #[arg(long)]
    suffix: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Build an animation from one source.
    #[command(
        about = "Build an animation from a folder, GIF, or video",
        after_help = "Examples:\n  reframe make shots/ --ext jpg --overlay logo.png --overlay-cutoff 10\n  reframe make clip.mkv --start 100 --end 400 --pad 0,0,0,1 --video --output out.mp4"
    )]
    Make {
        /// Image directory, GIF, or video file.
        source: PathBuf,

        /// Only use directory files with this extension.
        #[arg(long)]
        ext: Option<String>,

        /// First frame index (inclusive).
        #[arg(long, default_value_t = 0)]
        start: u64,

        /// Last frame index (inclusive).
        #[arg(long)]
        end: Option<u64>,

        /// Keep every Nth frame of a GIF or video.
        #[arg(long, default_value_t = 1)]
        skip: u64,

        /// Also apply --skip to image directories.
        #[arg(long)]
        skip_directories: bool,

        /// Scale factor (0.5) or exact size (320x240).
        #[arg(long)]
        resize: Option<String>,

        /// RGBA image blended over the first frames.
        #[arg(long)]
        overlay: Option<PathBuf>,

        /// Overlay frames with index below this value.
        #[arg(long, default_value_t = reframe::DEFAULT_OVERLAY_CUTOFF)]
        overlay_cutoff: u64,

        /// Rotation in degrees, counter-clockwise.
        #[arg(long, allow_negative_numbers = true)]
        rotate: Option<f64>,

        /// Colour of the corners uncovered by rotation (r,g,b).
        #[arg(long)]
        rotate_fill: Option<String>,

        /// Borders: top,bottom,left,right[,mode[,r,g,b]].
        #[arg(long)]
        pad: Option<String>,

        /// Image appended after the last frame: path,times.
        #[arg(long)]
        tail: Option<String>,

        /// Extract every frame to disk before transforming.
        #[arg(long)]
        buffered: bool,

        /// Keep the extracted frames after a successful run.
        #[arg(long)]
        keep: bool,

        #[command(flatten)]
        output: OutputOptions,
    },

    /// Join several videos or GIFs into one animation.
    #[command(
        about = "Concatenate videos or GIFs",
        after_help = "Writes a video (result.mp4) unless --output names a .gif file.\n\
                      --resize multiplies the first input's size: 0.5 halves it.\n\n\
                      Examples:\n  reframe concat a.mp4 b.mp4 --resize 0.5 --output joined.mp4\n  \
                      reframe concat clips/ --output joined.gif"
    )]
    Concat {
        /// Files to join, in order, or one directory of them.
        #[arg(required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,

        /// Scale factor applied to the first input's size (0.5 halves it).
        #[arg(long, default_value_t = 1.0)]
        resize: f64,

        /// Keep every Nth frame of the joined sequence.
        #[arg(long, default_value_t = 1)]
        skip: u64,

        #[command(flatten)]
        output: OutputOptions,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_resize(value: &str) -> Result<Resize, String> {
    if let Some((width, height)) = value.split_once(['x', 'X']) {
        let width = width
            .trim()
            .parse::<u32>()
            .map_err(|_| format!("invalid resize width: {width}"))?;
        let height = height
            .trim()
            .parse::<u32>()
            .map_err(|_| format!("invalid resize height: {height}"))?;
        return Ok(Resize::Exact { width, height });
    }
    value
        .trim()
        .parse::<f64>()
        .map(Resize::Factor)
        .map_err(|_| format!("--resize must be a factor or WIDTHxHEIGHT, got {value}"))
}

fn parse_color(value: &str) -> Result<Rgb<u8>, String> {
    let channels: Vec<u8> = value
        .split(',')
        .map(|channel| channel.trim().parse::<u8>())
        .collect::<Result<_, _>>()
        .map_err(|_| format!("invalid colour: {value}"))?;
    match channels.as_slice() {
        [r, g, b] => Ok(Rgb([*r, *g, *b])),
        _ => Err(format!("colour must be r,g,b, got {value}")),
    }
}

/// `--video` wins, then the `--output` extension, then `default_kind`.
fn build_output(
    options: &OutputOptions,
    default_kind: ContainerKind,
) -> Result<OutputSpec, Box<dyn std::error::Error>> {
    let explicit_kind = options.output.as_deref().and_then(ContainerKind::from_path);
    let kind = match (options.video, explicit_kind) {
        (true, _) => ContainerKind::Video,
        (false, Some(kind)) => kind,
        (false, None) => default_kind,
    };

    let mut output = OutputSpec::new(kind)
        .with_fps(options.fps)
        .with_partitions(options.partitions)
        .with_repeat(options.repeat);
    if let Some(path) = &options.output {
        output = output.with_path(path);
    }
    if let Some(name) = &options.name {
        output = output.with_name(name);
    }
    if let Some(suffix) = &options.suffix {
        output = output.with_suffix(suffix);
    }
    if let Some(codec) = &options.codec {
        output = output.with_codec(codec.parse::<VideoCodec>()?);
    }
    Ok(output)
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    let default_level = if global.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();

    if let Some(level) = &global.log_level {
        let parsed =
            CodecLogLevel::parse(level).ok_or(format!("unsupported --log-level: {level}"))?;
        reframe::set_codec_log_level(parsed);
    }
    Ok(())
}

/// Drives an indicatif bar from pipeline progress.
struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new_spinner();
        let style =
            ProgressStyle::with_template("{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg}")?;
        bar.set_style(style.progress_chars("##-"));
        Ok(Self { bar })
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        if let Some(total) = info.total {
            self.bar.set_length(total);
        }
        self.bar.set_position(info.current);
        self.bar.set_message(info.stage.to_string());
    }
}

fn execute(
    driver: &mut PipelineDriver,
    global: &GlobalOptions,
    progress: Option<&TerminalProgress>,
) -> Result<RunReport, Box<dyn std::error::Error>> {
    let result = driver.run();
    if let Some(progress) = progress {
        progress.bar.finish_and_clear();
    }
    let report = result?;

    if global.json {
        let payload = json!({
            "mode": format!("{:?}", report.mode).to_ascii_lowercase(),
            "frames_read": report.frames_read,
            "frames_encoded": report.frames_encoded,
            "width": report.dimensions.map(|(width, _)| width),
            "height": report.dimensions.map(|(_, height)| height),
            "outputs": report.outputs.iter().map(|path| path.display().to_string()).collect::<Vec<_>>(),
            "kept_cache": report.kept_cache.as_ref().map(|path| path.display().to_string()),
            "stages": report.stages.iter().map(PipelineStage::to_string).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        for output in &report.outputs {
            println!(
                "{} {} ({} frame(s))",
                "success:".green().bold(),
                output.display(),
                report.frames_encoded
            );
        }
        if let Some(cache) = &report.kept_cache {
            println!("{} {}", "kept frames:".cyan().bold(), cache.display());
        }
    }
    Ok(report)
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    apply_global_options(&cli.global)?;

    let progress = if cli.global.progress {
        Some(Arc::new(TerminalProgress::new()?))
    } else {
        None
    };

    match cli.command {
        Commands::Make {
            source,
            ext,
            start,
            end,
            skip,
            skip_directories,
            resize,
            overlay,
            overlay_cutoff,
            rotate,
            rotate_fill,
            pad,
            tail,
            buffered,
            keep,
            output,
        } => {
            let mut transforms = TransformSpec::new();
            if let Some(resize) = &resize {
                transforms = transforms.with_resize(parse_resize(resize)?);
            }
            if let Some(path) = &overlay {
                transforms = transforms.with_overlay(Overlay::open(path)?.with_cutoff(overlay_cutoff));
            }
            if let Some(angle) = rotate {
                let mut rotation = Rotation::new(angle);
                if let Some(fill) = &rotate_fill {
                    rotation = rotation.with_fill(parse_color(fill)?);
                }
                transforms = transforms.with_rotation_fill(rotation);
            }
            if let Some(pad) = &pad {
                transforms = transforms.with_padding(pad.parse::<Padding>()?);
            }

            let mut config = PipelineConfig::new(&source)
                .with_range(ExtractionRange::new(start, end))
                .with_skip(skip)
                .with_decimate_directories(skip_directories)
                .with_transforms(transforms)
                .with_output(build_output(&output, ContainerKind::Gif)?)
                .with_keep_extracted(keep);
            if let Some(ext) = &ext {
                config = config.with_extension(ext);
            }
            if let Some(tail) = &tail {
                config = config.with_tail(tail.parse::<TailImage>()?);
            }
            if buffered {
                config = config.with_mode(ProcessingMode::Buffered);
            }
            if let Some(progress) = &progress {
                config = config.with_progress(progress.clone());
            }

            let mut driver = PipelineDriver::new(config);
            execute(&mut driver, &cli.global, progress.as_deref())?;
        }
        Commands::Concat {
            inputs,
            resize,
            skip,
            output,
        } => {
            let source = match inputs.as_slice() {
                [directory] if directory.is_dir() => ConcatSource::from_directory(directory)?,
                _ => ConcatSource::new(&inputs)?,
            };
            let (width, height) = source.first_dimensions()?;
            let target = Resize::Factor(resize).target_dimensions(width, height)?;
            log::debug!("Concatenating {} file(s) at {}x{}", source.len(), target.0, target.1);

            let mut config = PipelineConfig::new(source.path().to_path_buf())
                .with_skip(skip)
                .with_transforms(TransformSpec::new().with_resize(Resize::Exact {
                    width: target.0,
                    height: target.1,
                }))
                .with_output(build_output(&output, ContainerKind::Video)?);
            if let Some(progress) = &progress {
                config = config.with_progress(progress.clone());
            }

            let mut driver = PipelineDriver::with_source(config, Box::new(source));
            execute(&mut driver, &cli.global, progress.as_deref())?;
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "reframe", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    #[test]
    fn parse_resize_forms() {
        assert_eq!(parse_resize("0.5").unwrap(), Resize::Factor(0.5));
        assert_eq!(
            parse_resize("320x240").unwrap(),
            Resize::Exact {
                width: 320,
                height: 240
            }
        );
        assert!(parse_resize("big").is_err());
        assert!(parse_resize("320x").is_err());
    }

    #[test]
    fn parse_color_triplets() {
        assert_eq!(parse_color("255, 0,10").unwrap(), Rgb([255, 0, 10]));
        assert!(parse_color("1,2").is_err());
        assert!(parse_color("1,2,300").is_err());
    }

    #[test]
    fn output_kind_follows_flag_then_extension() {
        let cli = Cli::parse_from(["reframe", "make", "a.gif", "--output", "out/x.mkv"]);
        let Commands::Make { output, .. } = cli.command else {
            panic!("expected make");
        };
        let spec = build_output(&output, ContainerKind::Gif).unwrap();
        assert_eq!(spec.kind, ContainerKind::Video);

        let cli = Cli::parse_from(["reframe", "make", "a.gif", "--video"]);
        let Commands::Make { output, .. } = cli.command else {
            panic!("expected make");
        };
        let spec = build_output(&output, ContainerKind::Gif).unwrap();
        assert_eq!(spec.kind, ContainerKind::Video);
    }

    #[test]
    fn concat_writes_video_unless_a_gif_is_named() {
        let cli = Cli::parse_from(["reframe", "concat", "a.mp4", "b.mp4"]);
        let Commands::Concat { output, .. } = cli.command else {
            panic!("expected concat");
        };
        let spec = build_output(&output, ContainerKind::Video).unwrap();
        assert_eq!(spec.kind, ContainerKind::Video);
        assert_eq!(spec.resolved_path(Path::new("a.mp4")), PathBuf::from("./result.mp4"));

        let cli = Cli::parse_from(["reframe", "concat", "a.mp4", "--output", "joined.gif"]);
        let Commands::Concat { output, .. } = cli.command else {
            panic!("expected concat");
        };
        let spec = build_output(&output, ContainerKind::Video).unwrap();
        assert_eq!(spec.kind, ContainerKind::Gif);
    }

    #[test]
    fn negative_rotation_is_accepted() {
        let cli = Cli::parse_from(["reframe", "make", "a.gif", "--rotate", "-90"]);
        let Commands::Make { rotate, .. } = cli.command else {
            panic!("expected make");
        };
        assert_eq!(rotate, Some(-90.0));
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
