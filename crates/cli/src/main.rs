use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::Parser;

use facemark_core::annotation::domain::frame_annotator::FrameAnnotator;
use facemark_core::annotation::domain::marker_style::MarkerStyle;
use facemark_core::annotation::infrastructure::stamp_image::StampImage;
use facemark_core::detection::domain::face_detector::FaceDetector;
use facemark_core::detection::domain::face_locator::FaceLocator;
use facemark_core::detection::infrastructure::model_resolver;
use facemark_core::detection::infrastructure::onnx_yolo_detector::OnnxYoloDetector;
use facemark_core::detection::infrastructure::replay_face_detector::ReplayFaceDetector;
use facemark_core::pipeline::annotate_sequence_use_case::{AnnotateSequenceUseCase, ProgressFn};
use facemark_core::pipeline::frame_pipeline::FramePipeline;
use facemark_core::pipeline::infrastructure::threaded_frame_pipeline::ThreadedFramePipeline;
use facemark_core::pipeline::pipeline_logger::StatsPipelineLogger;
use facemark_core::shared::constants::{YOLO_MODEL_NAME, YOLO_MODEL_URL};
use facemark_core::shared::orientation::{DeviceOrientation, Orientation};
use facemark_core::shared::settings::Settings;
use facemark_core::video::domain::frame_reader::FrameReader;
use facemark_core::video::domain::image_writer::ImageWriter;
use facemark_core::video::infrastructure::image_file_reader::ImageFileReader;
use facemark_core::video::infrastructure::image_file_writer::ImageFileWriter;

/// Draws a marker over every face in a frame sequence.
#[derive(Parser)]
#[command(name = "facemark")]
struct Cli {
    /// Input image, or a directory of images read in file-name order.
    input: PathBuf,

    /// Directory that receives the annotated frames.
    output: PathBuf,

    /// Marker style: outline, stamp or mosaic.
    #[arg(long)]
    style: Option<MarkerStyle>,

    /// Image drawn by the stamp and mosaic styles.
    #[arg(long)]
    stamp: Option<PathBuf>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long)]
    confidence: Option<f64>,

    /// Display orientation applied to written frames: up, down, left or right.
    #[arg(long)]
    orientation: Option<Orientation>,

    /// Derive the display orientation from how the capturing device was
    /// held: portrait, portrait-upside-down, landscape-left,
    /// landscape-right or unknown.
    #[arg(long, conflicts_with = "orientation")]
    device_orientation: Option<DeviceOrientation>,

    /// Replay recorded detections (JSON) instead of running the model.
    #[arg(long)]
    detections: Option<PathBuf>,

    /// Settings file; defaults to the user config directory.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Store the effective settings back to the settings file.
    #[arg(long)]
    save_config: bool,

    /// Feed frames through the background worker as a live source would,
    /// keeping only the newest result when detection falls behind.
    #[arg(long)]
    live: bool,

    /// With --live, switch to the next marker style every N frames.
    #[arg(long, requires = "live")]
    cycle_style: Option<usize>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let settings = effective_settings(&cli)?;
    if cli.save_config {
        save_settings(&cli, &settings)?;
    }

    let pipeline = build_pipeline(&cli, &settings)?;
    if cli.live {
        run_live(&cli.input, &cli.output, pipeline, cli.cycle_style)
    } else {
        run_sequence(&cli.input, &cli.output, pipeline)
    }
}

fn run_sequence(
    input: &Path,
    output: &Path,
    pipeline: FramePipeline,
) -> Result<(), Box<dyn std::error::Error>> {
    let progress: ProgressFn = Box::new(|current, total| {
        eprint!("\rAnnotating frame {current}/{total}");
        true
    });

    let mut use_case = AnnotateSequenceUseCase::new(
        Box::new(ImageFileReader::new()),
        Box::new(ImageFileWriter::new()),
        pipeline,
        Some(progress),
        Arc::new(AtomicBool::new(false)),
    );
    let summary = use_case.execute(input, output)?;
    eprintln!();
    log::info!(
        "Wrote {}/{} frames ({} dropped, {} markers) to {}",
        summary.frames_written,
        summary.frames_read,
        summary.frames_dropped,
        summary.markers_drawn,
        output.display()
    );
    Ok(())
}

fn run_live(
    input: &Path,
    output: &Path,
    pipeline: FramePipeline,
    cycle_style: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut reader = ImageFileReader::new();
    let metadata = reader.open(input)?;
    let writer = ImageFileWriter::new();
    let mut style = pipeline.style();
    let mut live = ThreadedFramePipeline::spawn(pipeline);
    let mut submitted = 0usize;
    let mut written = 0usize;

    for frame in reader.frames() {
        let frame = frame?;
        submitted += 1;
        if let Some(n) = cycle_style.filter(|&n| submitted % n == 0) {
            style = style.next();
            log::debug!("Cycling style after {n} frames");
            live.set_style(style);
        }
        live.submit(frame);

        if let Some(annotated) = live.latest() {
            let path = AnnotateSequenceUseCase::output_path(output, annotated.index());
            writer.write(&path, &annotated)?;
            written += 1;
        }
    }
    reader.close();

    let pipeline = live.shutdown();
    if let Some(annotated) = live.latest() {
        let path = AnnotateSequenceUseCase::output_path(output, annotated.index());
        writer.write(&path, &annotated)?;
        written += 1;
    }
    if let Some(pipeline) = pipeline {
        pipeline.logger().summary();
    }

    log::info!(
        "Live run: {submitted}/{} frames submitted, {} skipped as stale, {} results replaced unread, {written} written to {}",
        metadata.total_frames,
        live.dropped_frames(),
        live.superseded_results(),
        output.display()
    );
    Ok(())
}

fn effective_settings(cli: &Cli) -> Result<Settings, Box<dyn std::error::Error>> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load(),
    };
    if let Some(style) = cli.style {
        settings.style = style;
    }
    if let Some(stamp) = &cli.stamp {
        settings.stamp_path = Some(stamp.clone());
    }
    if let Some(orientation) = cli.orientation {
        settings.orientation = orientation;
    }
    if let Some(device) = cli.device_orientation {
        match Orientation::from_device(device) {
            Some(orientation) => settings.orientation = orientation,
            None => log::warn!(
                "Device orientation unknown; keeping '{}'",
                settings.orientation
            ),
        }
    }
    if let Some(confidence) = cli.confidence {
        settings.confidence = confidence;
    }
    validate_settings(&settings)?;
    Ok(settings)
}

fn save_settings(cli: &Cli, settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => Settings::config_path().ok_or("could not determine config directory")?,
    };
    settings.save_to(&path)?;
    log::info!("Settings saved to {}", path.display());
    Ok(())
}

fn build_pipeline(
    cli: &Cli,
    settings: &Settings,
) -> Result<FramePipeline, Box<dyn std::error::Error>> {
    let detector = build_detector(cli, settings)?;
    let stamp = StampImage::load_optional(settings.stamp_path.as_deref());
    if settings.style.uses_stamp() && stamp.is_none() {
        log::warn!(
            "Style '{}' needs a stamp image (--stamp); faces will not be marked",
            settings.style
        );
    }

    let annotator =
        FrameAnnotator::new(settings.style, stamp).with_orientation(settings.orientation);
    Ok(
        FramePipeline::new(FaceLocator::new(detector), annotator)
            .with_logger(Box::new(StatsPipelineLogger::default())),
    )
}

fn build_detector(
    cli: &Cli,
    settings: &Settings,
) -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>> {
    if let Some(path) = &cli.detections {
        return Ok(Box::new(ReplayFaceDetector::from_json_file(path)?));
    }

    log::info!("Resolving model: {YOLO_MODEL_NAME}");
    let model_path = model_resolver::resolve(
        YOLO_MODEL_NAME,
        YOLO_MODEL_URL,
        None,
        Some(Box::new(download_progress)),
    )?;
    eprintln!();

    Ok(Box::new(OnnxYoloDetector::new(
        &model_path,
        settings.confidence,
    )?))
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.input.exists() {
        return Err(format!("Input not found: {}", cli.input.display()).into());
    }
    if cli.output.is_file() {
        return Err(format!(
            "Output must be a directory, got file {}",
            cli.output.display()
        )
        .into());
    }
    if let Some(stamp) = &cli.stamp {
        if !stamp.exists() {
            return Err(format!("Stamp image not found: {}", stamp.display()).into());
        }
    }
    if let Some(path) = &cli.detections {
        if !path.exists() {
            return Err(format!("Detections file not found: {}", path.display()).into());
        }
    }
    if cli.cycle_style == Some(0) {
        return Err("--cycle-style must be at least 1".into());
    }
    Ok(())
}

fn validate_settings(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    if !(0.0..=1.0).contains(&settings.confidence) {
        return Err(format!(
            "Confidence must be between 0.0 and 1.0, got {}",
            settings.confidence
        )
        .into());
    }
    Ok(())
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face detection model... {pct}%");
    } else {
        eprint!("\rDownloading face detection model... {downloaded} bytes");
    }
}
