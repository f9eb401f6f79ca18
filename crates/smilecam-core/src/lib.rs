//! smilecam-core: face and smile detection engine.
//!
//! Runs the stock OpenCV Haar cascades through `opencv::objdetect`. Faces are
//! found first; smiles are searched inside each face.

pub mod annotate;
pub mod classifier;
pub mod detector;
pub mod types;

pub use classifier::CascadeDetector;
pub use detector::{DetectorError, RegionDetector, SmileDetector};
pub use types::{DetectParams, Region, SmileHit, FACE_PARAMS, SMILE_PARAMS};

/// File name of the frontal face cascade inside the cascade directory.
pub const FACE_CASCADE_FILE: &str = "haarcascade_frontalface_default.xml";
/// File name of the smile cascade inside the cascade directory.
pub const SMILE_CASCADE_FILE: &str = "haarcascade_smile.xml";

/// Default location of the stock OpenCV Haar cascades on Linux distributions.
pub fn default_cascade_dir() -> std::path::PathBuf {
    std::path::PathBuf::from("/usr/share/opencv4/haarcascades")
}
