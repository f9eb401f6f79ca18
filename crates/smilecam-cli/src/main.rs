use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

mod client;

use client::{describe_detection, SmileClient};

#[derive(Parser)]
#[command(name = "smilecam", about = "smilecam webcam smile detector CLI")]
struct Cli {
    /// Base URL of the smilecamd server
    #[arg(long, global = true, default_value = "http://127.0.0.1:5000")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server's camera
    Start,
    /// Stop the server's camera
    Stop,
    /// Save the latest captured frame
    Frame {
        #[arg(short, long, default_value = "frame.jpg")]
        output: PathBuf,
    },
    /// Run smile detection once on the latest frame
    Detect,
    /// List recorded smiles, newest first
    List,
    /// Download a saved smile image
    Image {
        filename: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Start the camera and poll for smiles until interrupted
    Watch {
        /// Poll interval in milliseconds
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
        /// Stop after this many polls
        #[arg(long)]
        count: Option<u64>,
    },
    /// Show server status
    Status,
    /// List local V4L2 capture devices
    Devices,
    /// Run the smile detector on a local image file
    Scan {
        image: PathBuf,
        /// Directory containing the Haar cascade XML files
        #[arg(long)]
        cascade_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();
    tracing::debug!(server = %cli.server, "using server");
    let client = SmileClient::new(&cli.server)?;

    match cli.command {
        Commands::Start => println!("{}", client.start_camera().await?),
        Commands::Stop => println!("{}", client.stop_camera().await?),
        Commands::Frame { output } => {
            let jpeg = client.frame().await?;
            std::fs::write(&output, &jpeg)
                .with_context(|| format!("writing {}", output.display()))?;
            println!("saved frame to {} ({} bytes)", output.display(), jpeg.len());
        }
        Commands::Detect => println!("{}", describe_detection(&client.detect().await?)),
        Commands::List => print_smiles(&client).await?,
        Commands::Image { filename, output } => {
            let bytes = client.image(&filename).await?;
            let output = output.unwrap_or_else(|| PathBuf::from(&filename));
            std::fs::write(&output, &bytes)
                .with_context(|| format!("writing {}", output.display()))?;
            println!("saved {} to {}", filename, output.display());
        }
        Commands::Watch { interval_ms, count } => {
            watch(&client, Duration::from_millis(interval_ms.max(1)), count).await?
        }
        Commands::Status => {
            let s = client.status().await?;
            println!("smilecamd v{}", s.version);
            let camera = if s.camera_active { "active" } else { "stopped" };
            let frame = if s.frame_available { "available" } else { "none yet" };
            println!("  camera:  {camera}");
            println!("  frame:   {frame}");
            println!("  smiles:  {}", s.smiles_recorded);
        }
        Commands::Devices => list_devices(),
        Commands::Scan { image, cascade_dir } => scan(image, cascade_dir).await?,
    }
    Ok(())
}

async fn print_smiles(client: &SmileClient) -> Result<()> {
    let smiles = client.smiles().await?;
    if smiles.is_empty() {
        println!("No smiles recorded");
        return Ok(());
    }
    println!("{:<24} FILENAME", "TIMESTAMP");
    for s in smiles {
        println!("{:<24} {}", s.timestamp, s.filename);
    }
    Ok(())
}

/// Start the camera, poll detect-smile on an interval, then stop and list
/// what was captured.
async fn watch(client: &SmileClient, interval: Duration, count: Option<u64>) -> Result<()> {
    println!("{}", client.start_camera().await?);

    let mut ticker = tokio::time::interval(interval);
    let mut polls = 0u64;
    let mut detected = 0u64;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                match client.detect().await {
                    Ok(result) => {
                        if result.smile_detected {
                            detected += 1;
                        }
                        println!("{}", describe_detection(&result));
                    }
                    Err(e) => eprintln!("detect failed: {e:#}"),
                }
                polls += 1;
                if count.is_some_and(|n| polls >= n) {
                    break;
                }
            }
        }
    }

    println!("{}", client.stop_camera().await?);
    println!("{detected} smile(s) in {polls} poll(s)");
    print_smiles(client).await
}

fn list_devices() {
    let devices = smilecam_hw::Camera::list_devices();
    if devices.is_empty() {
        println!("No V4L2 capture devices found");
        return;
    }
    for d in devices {
        println!("{}  {} ({}, {})", d.path, d.name, d.driver, d.bus);
    }
}

async fn scan(image: PathBuf, cascade_dir: Option<PathBuf>) -> Result<()> {
    let cascade_dir = cascade_dir
        .or_else(|| std::env::var("SMILECAM_CASCADE_DIR").ok().map(PathBuf::from))
        .unwrap_or_else(smilecam_core::default_cascade_dir);

    let hit = tokio::task::spawn_blocking(move || -> Result<_> {
        let detector = smilecam_core::SmileDetector::load(&cascade_dir)
            .with_context(|| format!("loading cascades from {}", cascade_dir.display()))?;
        let rgb = image::open(&image)
            .with_context(|| format!("opening {}", image.display()))?
            .to_rgb8();
        Ok(detector.find_smile(&smilecam_hw::rgb_to_gray(&rgb))?)
    })
    .await??;

    match hit {
        Some(hit) => println!(
            "smile at {} (face {},{} {}x{})",
            hit.coordinates(),
            hit.face.x,
            hit.face.y,
            hit.face.width,
            hit.face.height
        ),
        None => println!("no smile"),
    }
    Ok(())
}
