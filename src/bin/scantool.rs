use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use barcode_live::orientation::SharedOrientation;
use barcode_live::permission::AuthorizationStatus;
use barcode_live::presentation::{TextSink, format_observation, rank};
use barcode_live::telemetry::init_tracing;
use barcode_live::tools::{load_frame, max_dim_from_env};
use barcode_live::{
    DeviceOrientation, FrameDetector, ImageOrientation, ImageSequenceProvider, ScanConfig,
    ScanController, ScanError, ScanPipeline, StaticPermission,
};
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "scantool", version, about = "Barcode scanning tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum Permission {
    Granted,
    Denied,
    Undetermined,
}

#[derive(Subcommand)]
enum Command {
    /// Detect barcodes in a single image
    Detect {
        #[arg(long)]
        image: PathBuf,
        /// Image orientation (EXIF number or name such as `down`)
        #[arg(long, default_value = "up")]
        orientation: ImageOrientation,
    },
    /// Stream a directory of images through the live pipeline
    Live {
        #[arg(long)]
        dir: PathBuf,
        #[arg(long, default_value_t = 15.0)]
        fps: f32,
        /// Stop after this many seconds instead of waiting for Ctrl-C
        #[arg(long)]
        duration_secs: Option<u64>,
        #[arg(long, default_value = "portrait")]
        device_orientation: DeviceOrientation,
        #[arg(long, value_enum, default_value_t = Permission::Granted)]
        permission: Permission,
        /// Answer the permission prompt with "allow"
        #[arg(long)]
        grant_on_prompt: bool,
        /// Also print frames where nothing was found
        #[arg(long)]
        show_empty: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Detect { image, orientation } => detect_cmd(&image, orientation),
        Command::Live {
            dir,
            fps,
            duration_secs,
            device_orientation,
            permission,
            grant_on_prompt,
            show_empty,
        } => {
            let status = match permission {
                Permission::Granted => AuthorizationStatus::Authorized,
                Permission::Denied => AuthorizationStatus::Denied,
                Permission::Undetermined => AuthorizationStatus::NotDetermined,
            };
            live_cmd(LiveArgs {
                dir,
                fps,
                duration: duration_secs.map(Duration::from_secs),
                device_orientation,
                permission: StaticPermission::new(status, grant_on_prompt),
                show_empty,
            })
            .await
        }
    }
}

fn detect_cmd(image: &Path, orientation: ImageOrientation) -> Result<()> {
    let frame = load_frame(image, max_dim_from_env())
        .with_context(|| format!("failed to load image {}", image.display()))?;
    let config = ScanConfig::from_env();
    let detector = FrameDetector::from_config(&config.detector);

    let start = Instant::now();
    let observations = detector.detect_blocking(&frame, orientation)?;
    let elapsed = start.elapsed();

    println!("Image: {} ({}x{})", image.display(), frame.width, frame.height);
    println!(
        "Found {} barcodes in {:.2}ms",
        observations.len(),
        elapsed.as_secs_f64() * 1000.0
    );
    for observation in rank(&observations) {
        println!("  {}", format_observation(observation));
    }
    Ok(())
}

struct LiveArgs {
    dir: PathBuf,
    fps: f32,
    duration: Option<Duration>,
    device_orientation: DeviceOrientation,
    permission: StaticPermission,
    show_empty: bool,
}

async fn live_cmd(args: LiveArgs) -> Result<()> {
    if !args.dir.is_dir() {
        bail!("{} is not a directory", args.dir.display());
    }
    let config = ScanConfig::from_env();
    let provider = ImageSequenceProvider::new(&args.dir).with_fps(args.fps);
    let detector = FrameDetector::from_config(&config.detector);
    let orientation = SharedOrientation::new(args.device_orientation);

    let pipeline = Arc::new(
        ScanPipeline::new(config, Arc::new(provider), Arc::new(detector))?
            .with_orientation(Arc::new(orientation)),
    );
    let sink = TextSink::new(std::io::stdout()).skip_empty(!args.show_empty);
    let mut controller = ScanController::new(Arc::clone(&pipeline), Arc::new(args.permission), sink);

    match controller.became_visible().await {
        Ok(()) => {}
        Err(ScanError::PermissionDenied) => {
            bail!("Camera permission denied, exiting");
        }
        Err(err) => {
            pipeline.shutdown().await;
            return Err(err.into());
        }
    }

    match args.duration {
        Some(duration) => {
            tokio::select! {
                _ = tokio::time::sleep(duration) => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        }
        None => {
            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for Ctrl-C")?;
        }
    }

    controller.became_hidden();
    pipeline.shutdown().await;

    let stats = pipeline.stats();
    eprintln!(
        "samples={} dropped_late={} without_image={} detections={} failures={} batches={}",
        stats.samples_received,
        stats.samples_dropped_late,
        stats.samples_without_image,
        stats.detections_dispatched,
        stats.detection_failures,
        stats.batches_delivered
    );
    Ok(())
}
