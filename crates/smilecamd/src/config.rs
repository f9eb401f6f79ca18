use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Daemon configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address (default: 0.0.0.0).
    pub host: String,
    /// Listen port (default: 5000).
    pub port: u16,
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Requested capture width.
    pub frame_width: u32,
    /// Requested capture height.
    pub frame_height: u32,
    /// Pause between frame grabs while the camera is active.
    pub capture_interval: Duration,
    /// Path to the SQLite database file. Deleted and recreated at startup.
    pub db_path: PathBuf,
    /// Directory that receives annotated smile images.
    pub save_dir: PathBuf,
    /// Directory containing the Haar cascade XML files.
    pub cascade_dir: PathBuf,
    /// JPEG quality for served frames and saved images.
    pub jpeg_quality: u8,
}

impl Config {
    /// Load configuration from `SMILECAM_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let cascade_dir = std::env::var("SMILECAM_CASCADE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| smilecam_core::default_cascade_dir());

        Self {
            host: std::env::var("SMILECAM_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_parse("SMILECAM_PORT", 5000),
            camera_device: std::env::var("SMILECAM_CAMERA_DEVICE")
                .unwrap_or_else(|_| "/dev/video0".to_string()),
            frame_width: env_parse("SMILECAM_FRAME_WIDTH", 640),
            frame_height: env_parse("SMILECAM_FRAME_HEIGHT", 480),
            capture_interval: Duration::from_millis(env_parse(
                "SMILECAM_CAPTURE_INTERVAL_MS",
                1000,
            )),
            db_path: env_path("SMILECAM_DB_PATH", "smile_data.db"),
            save_dir: env_path("SMILECAM_SAVE_DIR", "smiles"),
            cascade_dir,
            jpeg_quality: env_parse::<u8>("SMILECAM_JPEG_QUALITY", 95).clamp(1, 100),
        }
    }

    /// Socket address the HTTP server binds to.
    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse()
            .map_err(|e| anyhow::anyhow!("invalid listen address {addr}: {e}"))
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_path(key: &str, default: &str) -> PathBuf {
    std::env::var(key)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}
