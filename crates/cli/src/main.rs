use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use signal_hook::consts::{SIGINT, SIGTERM};

use noseline_core::capture::infrastructure::ffmpeg_capture::{CaptureInput, FfmpegCapture};
use noseline_core::config::{FaceBackend, TrackerConfig};
use noseline_core::detection::domain::detector::DetectorSet;
use noseline_core::detection::infrastructure::detector_factory::build_detectors;
use noseline_core::rendering::overlay;
use noseline_core::session::session_logger::StdoutSessionLogger;
use noseline_core::session::tracking_session::{SessionTick, TrackingSession};
use noseline_core::shared::constants::IMAGE_EXTENSIONS;
use noseline_core::shared::frame::Frame;
use noseline_core::tracking::domain::attention_tracker::AttentionTracker;
use noseline_core::tracking::domain::band::BandKind;
use noseline_core::tracking::domain::landmark_estimator::LandmarkEstimator;
use noseline_core::web::analysis_service::AnalysisService;
use noseline_core::web::infrastructure::http_server::{HttpServer, HttpServerConfig};
use noseline_core::web::session_registry::{SessionRegistry, DEFAULT_MAX_SESSIONS};
use noseline_core::web::wire::AnalyzeResponse;

/// Face and nose tracking against a movable attention band.
#[derive(Parser)]
#[command(name = "noseline")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// JSON tracker configuration; flags override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Face detector backend.
    #[arg(long, global = true)]
    backend: Option<Backend>,

    /// SeetaFace model file (seeta backend).
    #[arg(long, global = true)]
    face_model: Option<PathBuf>,

    /// YOLO-pose ONNX model file.
    #[arg(long, global = true)]
    pose_model: Option<PathBuf>,

    /// Disable nose landmark detection (always use the geometric proxy).
    #[arg(long, global = true)]
    no_nose: bool,

    /// Disable profile detection on face dropout.
    #[arg(long, global = true)]
    no_profile: bool,

    /// Pose detection confidence threshold (0.0-1.0).
    #[arg(long, global = true)]
    confidence: Option<f64>,

    /// Nose proxy position as a fraction of face height (0.5-0.6).
    #[arg(long, global = true)]
    proxy_fraction: Option<f64>,

    /// Band position in pixels from the top of the frame.
    #[arg(long, global = true)]
    band_y: Option<i32>,

    /// Use a strip of this height instead of a line.
    #[arg(long, global = true)]
    strip_height: Option<i32>,

    /// Smallest face side in pixels for the seeta backend (at least 20).
    #[arg(long, global = true)]
    min_face_size: Option<u32>,

    /// Fail instead of running when no face detector can be loaded.
    #[arg(long, global = true)]
    require_face: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Track a camera or video file, logging the verdict per frame.
    Watch {
        /// ffmpeg input device format (v4l2, avfoundation, dshow).
        #[arg(long)]
        input_format: Option<String>,

        /// Device name, e.g. /dev/video0.
        #[arg(long)]
        device: Option<String>,

        /// Play back a video file instead of a camera.
        #[arg(long, conflicts_with_all = ["device", "input_format"])]
        input: Option<PathBuf>,

        /// Requested camera resolution, e.g. 1280x720.
        #[arg(long, value_parser = parse_video_size, conflicts_with = "input")]
        video_size: Option<(u32, u32)>,

        /// Stop after this many frames. Without it, tracking runs until
        /// interrupted (Ctrl-C) or the input ends.
        #[arg(long)]
        max_frames: Option<usize>,

        /// Do not mirror frames horizontally.
        #[arg(long)]
        no_mirror: bool,

        /// Write the last annotated frame to this image file.
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
    /// Analyze one image and print the result as JSON.
    Analyze {
        image: PathBuf,

        /// Write the annotated image to this file.
        #[arg(long)]
        overlay: Option<PathBuf>,
    },
    /// Serve the browser client and the /analyze endpoint.
    Serve {
        #[arg(long, default_value = "127.0.0.1:8000")]
        bind: String,

        #[arg(long, default_value = "4")]
        workers: usize,

        /// Most concurrent client sessions kept in memory.
        #[arg(long, default_value_t = DEFAULT_MAX_SESSIONS)]
        max_sessions: usize,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Backend {
    Seeta,
    Pose,
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
    let config = build_config(&cli)?;

    match cli.command {
        Command::Watch {
            input_format,
            device,
            input,
            video_size,
            max_frames,
            no_mirror,
            snapshot,
        } => {
            let mut capture = FfmpegCapture::new(capture_input(input, input_format, device));
            if let Some((width, height)) = video_size {
                capture = capture.with_video_size(width, height);
            }
            run_watch(&config, capture, max_frames, !no_mirror && config.mirror, snapshot.as_deref())
        }
        Command::Analyze { image, overlay } => run_analyze(&config, &image, overlay.as_deref()),
        Command::Serve {
            bind,
            workers,
            max_sessions,
        } => run_serve(&config, HttpServerConfig { bind, workers }, max_sessions),
    }
}

fn run_watch(
    config: &TrackerConfig,
    capture: FfmpegCapture,
    max_frames: Option<usize>,
    mirror: bool,
    snapshot: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let detectors = build_detectors(&config.detectors, None)?;
    let estimator = LandmarkEstimator::new(config.nose_proxy_fraction)?;

    let mut session = TrackingSession::new(
        Box::new(capture),
        detectors,
        AttentionTracker::new(estimator),
        config.band_controller(),
        Box::new(StdoutSessionLogger::default()),
    )
    .with_mirror(mirror);

    // Ctrl-C ends the run so the source is released and the summary printed.
    let stop = Arc::new(AtomicBool::new(false));
    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(&stop))?;
    }
    let mut last: Option<SessionTick> = None;
    let frames = session.run(config.frame_interval(), max_frames, &stop, |tick| {
        log::debug!("frame {}: {}", tick.frame.index(), tick.result.status);
        if snapshot.is_some() {
            last = Some(tick.clone());
        }
    })?;

    if let (Some(path), Some(tick)) = (snapshot, last) {
        let mut frame = tick.frame;
        overlay::draw_tracking(&mut frame, &tick.result, &tick.band);
        save_frame(&frame, path)?;
        log::info!("Snapshot written to {}", path.display());
    }
    log::info!("Tracked {frames} frames");
    Ok(())
}

fn run_analyze(
    config: &TrackerConfig,
    image_path: &Path,
    overlay_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut detectors = build_detectors(&config.detectors, None)?;
    let frame = Frame::from_rgb_image(image::open(image_path)?.to_rgb8(), 0);
    let response = analyze_frame(config, &mut detectors, &frame, overlay_path)?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn analyze_frame(
    config: &TrackerConfig,
    detectors: &mut DetectorSet,
    frame: &Frame,
    overlay_path: Option<&Path>,
) -> Result<AnalyzeResponse, Box<dyn std::error::Error>> {
    let mut band = config.band_controller();
    band.sync_frame_height(frame.height());
    let band = band.band();

    let mut tracker = AttentionTracker::new(LandmarkEstimator::new(config.nose_proxy_fraction)?);
    let result = tracker.analyze_frame(detectors, frame, &band);

    if let Some(path) = overlay_path {
        let mut annotated = frame.clone();
        overlay::draw_tracking(&mut annotated, &result, &band);
        save_frame(&annotated, path)?;
    }
    Ok(AnalyzeResponse::from(&result))
}

fn run_serve(
    config: &TrackerConfig,
    server_config: HttpServerConfig,
    max_sessions: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let detectors = build_detectors(&config.detectors, None)?;
    let estimator = LandmarkEstimator::new(config.nose_proxy_fraction)?;
    let service = Arc::new(AnalysisService::new(
        detectors,
        SessionRegistry::new(estimator, max_sessions),
    ));

    let server = HttpServer::bind(&server_config).map_err(|e| e.to_string())?;
    if let Some(addr) = server.local_addr() {
        eprintln!("Open http://{addr}/ in a browser");
    }
    server.start(service).join();
    Ok(())
}

/// Loads the config file (if any) and applies flag overrides.
fn build_config(cli: &Cli) -> Result<TrackerConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => TrackerConfig::load(path)?,
        None => TrackerConfig::default(),
    };

    if let Some(backend) = cli.backend {
        config.detectors.backend = match backend {
            Backend::Seeta => FaceBackend::Seeta,
            Backend::Pose => FaceBackend::Pose,
        };
    }
    if cli.face_model.is_some() {
        config.detectors.face_model = cli.face_model.clone();
    }
    if cli.pose_model.is_some() {
        config.detectors.pose_model = cli.pose_model.clone();
    }
    if cli.no_nose {
        config.detectors.nose = false;
    }
    if cli.no_profile {
        config.detectors.profile = false;
    }
    if let Some(confidence) = cli.confidence {
        config.detectors.confidence = confidence;
    }
    if let Some(fraction) = cli.proxy_fraction {
        config.nose_proxy_fraction = fraction;
    }
    if let Some(height) = cli.strip_height {
        config.band_kind = BandKind::Strip;
        config.strip_height = height;
    }
    if cli.band_y.is_some() {
        config.band_y = cli.band_y;
    }
    if let Some(size) = cli.min_face_size {
        config.detectors.min_face_size = size;
    }
    config.detectors.require_face |= cli.require_face;

    config.validate()?;
    Ok(config)
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(path) = &cli.config {
        if !path.exists() {
            return Err(format!("Config file not found: {}", path.display()).into());
        }
    }
    if let Some(confidence) = cli.confidence {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(format!("Confidence must be between 0.0 and 1.0, got {confidence}").into());
        }
    }
    if let Some(y) = cli.band_y {
        if y < 0 {
            return Err(format!("Band position must not be negative, got {y}").into());
        }
    }
    if let Some(height) = cli.strip_height {
        if height <= 0 {
            return Err(format!("Strip height must be positive, got {height}").into());
        }
    }
    match &cli.command {
        Command::Watch { input: Some(path), .. } if !path.exists() => {
            Err(format!("Input file not found: {}", path.display()).into())
        }
        Command::Analyze { image, .. } if !image.exists() => {
            Err(format!("Image not found: {}", image.display()).into())
        }
        Command::Analyze { image, .. } if !is_image(image) => Err(format!(
            "Unsupported image type: {} (expected one of {})",
            image.display(),
            IMAGE_EXTENSIONS.join(", ")
        )
        .into()),
        Command::Serve { workers: 0, .. } => Err("Workers must be at least 1".into()),
        _ => Ok(()),
    }
}

fn capture_input(input: Option<PathBuf>, format: Option<String>, device: Option<String>) -> CaptureInput {
    match input {
        Some(path) => CaptureInput::File(path),
        None => CaptureInput::camera(format, device),
    }
}

/// Parses `WIDTHxHEIGHT`.
fn parse_video_size(value: &str) -> Result<(u32, u32), String> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {value}"))?;
    let parse = |part: &str| {
        part.trim()
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| format!("invalid dimension {part:?} in {value}"))
    };
    Ok((parse(width)?, parse(height)?))
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn save_frame(frame: &Frame, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let image = image::RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
        .ok_or("frame buffer does not match its dimensions")?;
    image.save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("noseline").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = parse(&[
            "--backend",
            "seeta",
            "--no-nose",
            "--strip-height",
            "60",
            "--band-y",
            "200",
            "serve",
        ]);
        let config = build_config(&cli).unwrap();
        assert_eq!(config.detectors.backend, FaceBackend::Seeta);
        assert!(!config.detectors.nose);
        assert!(config.detectors.profile);
        assert_eq!(config.band_kind, BandKind::Strip);
        assert_eq!(config.strip_height, 60);
        assert_eq!(config.band_y, Some(200));
    }

    #[test]
    fn test_config_file_then_flags() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("noseline.json");
        std::fs::write(&path, r#"{"nose_proxy_fraction": 0.55, "mirror": false}"#).unwrap();
        let cli = parse(&["--config", path.to_str().unwrap(), "--confidence", "0.7", "serve"]);
        let config = build_config(&cli).unwrap();
        assert_eq!(config.nose_proxy_fraction, 0.55);
        assert!(!config.mirror);
        assert_eq!(config.detectors.confidence, 0.7);
    }

    #[rstest]
    #[case(&["--confidence", "1.5", "serve"])]
    #[case(&["--band-y=-3", "serve"])]
    #[case(&["--strip-height", "0", "serve"])]
    #[case(&["serve", "--workers", "0"])]
    #[case(&["analyze", "/nonexistent/face.png"])]
    #[case(&["watch", "--input", "/nonexistent/clip.mp4"])]
    fn test_validate_rejects(#[case] args: &[&str]) {
        assert!(validate(&parse(args)).is_err());
    }

    #[rstest]
    #[case("1280x720", Ok((1280, 720)))]
    #[case("640X480", Ok((640, 480)))]
    #[case("1280", Err(()))]
    #[case("0x720", Err(()))]
    #[case("widexhigh", Err(()))]
    fn test_parse_video_size(#[case] value: &str, #[case] expected: Result<(u32, u32), ()>) {
        assert_eq!(parse_video_size(value).map_err(|_| ()), expected);
    }

    #[test]
    fn test_watch_accepts_video_size() {
        let cli = parse(&["watch", "--video-size", "1280x720", "--max-frames", "5"]);
        match cli.command {
            Command::Watch {
                video_size,
                max_frames,
                ..
            } => {
                assert_eq!(video_size, Some((1280, 720)));
                assert_eq!(max_frames, Some(5));
            }
            _ => panic!("expected watch"),
        }
    }

    #[test]
    fn test_min_face_size_flag() {
        let config = build_config(&parse(&["--min-face-size", "48", "serve"])).unwrap();
        assert_eq!(config.detectors.min_face_size, 48);
        assert!(build_config(&parse(&["--min-face-size", "8", "serve"])).is_err());
    }

    #[test]
    fn test_out_of_range_proxy_fraction_is_rejected() {
        let cli = parse(&["--proxy-fraction", "0.7", "serve"]);
        assert!(build_config(&cli).is_err());
    }

    #[test]
    fn test_capture_input_prefers_file() {
        let input = capture_input(Some(PathBuf::from("clip.mp4")), None, None);
        assert_eq!(input, CaptureInput::File(PathBuf::from("clip.mp4")));
    }

    #[test]
    fn test_capture_input_overrides_device() {
        let input = capture_input(None, Some("v4l2".into()), Some("/dev/video2".into()));
        assert_eq!(
            input,
            CaptureInput::Device {
                format: "v4l2".into(),
                name: "/dev/video2".into()
            }
        );
    }

    #[test]
    fn test_analyze_without_detectors_reports_unavailable() {
        let tmp = TempDir::new().unwrap();
        let overlay_path = tmp.path().join("out.png");
        let frame = Frame::from_rgb_image(image::RgbImage::new(64, 48), 0);
        let response = analyze_frame(
            &TrackerConfig::default(),
            &mut DetectorSet::new(),
            &frame,
            Some(&overlay_path),
        )
        .unwrap();
        assert!(response.tracking_bad);
        assert!(response.face.is_none());
        assert!(response.status.starts_with("Tracking unavailable"));
        assert!(overlay_path.exists());
    }
}
