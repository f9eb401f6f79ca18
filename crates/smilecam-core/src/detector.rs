//! Face-then-smile detection.
//!
//! Faces are located on the full grayscale frame; each face crop is then
//! searched for a smile. The first face that yields a smile wins.

use crate::classifier::CascadeDetector;
use crate::types::{DetectParams, Region, SmileHit, FACE_PARAMS, SMILE_PARAMS};
use crate::{FACE_CASCADE_FILE, SMILE_CASCADE_FILE};
use image::GrayImage;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("cascade file not found: {0}")]
    CascadeNotFound(String),
    #[error("detection failed: {0}")]
    DetectionFailed(String),
    #[error("opencv: {0}")]
    OpenCv(#[from] opencv::Error),
}

/// Anything that can find object regions in a grayscale image.
pub trait RegionDetector: Send + Sync {
    fn detect(
        &self,
        image: &GrayImage,
        params: &DetectParams,
    ) -> Result<Vec<Region>, DetectorError>;
}

/// Two-stage smile detector: faces on the frame, smiles inside each face.
pub struct SmileDetector {
    faces: Box<dyn RegionDetector>,
    smiles: Box<dyn RegionDetector>,
}

impl SmileDetector {
    pub fn new(faces: Box<dyn RegionDetector>, smiles: Box<dyn RegionDetector>) -> Self {
        Self { faces, smiles }
    }

    /// Load the stock face and smile cascades from `cascade_dir`.
    pub fn load(cascade_dir: &Path) -> Result<Self, DetectorError> {
        let faces = CascadeDetector::load(cascade_dir.join(FACE_CASCADE_FILE))?;
        let smiles = CascadeDetector::load(cascade_dir.join(SMILE_CASCADE_FILE))?;
        Ok(Self::new(Box::new(faces), Box::new(smiles)))
    }

    /// Search the frame for a smiling face.
    ///
    /// Returns the first smile found, with its region translated from
    /// face-local to frame coordinates.
    pub fn find_smile(&self, gray: &GrayImage) -> Result<Option<SmileHit>, DetectorError> {
        let (width, height) = gray.dimensions();
        let faces = self.faces.detect(gray, &FACE_PARAMS)?;
        tracing::debug!(faces = faces.len(), "face search complete");

        for face in faces {
            let face = face.clamp_to(width, height);
            if face.is_empty() {
                continue;
            }

            let roi =
                image::imageops::crop_imm(gray, face.x, face.y, face.width, face.height).to_image();
            let smiles = self.smiles.detect(&roi, &SMILE_PARAMS)?;

            if let Some(first) = smiles.first() {
                let hit = SmileHit {
                    face,
                    smile: first.offset(face.x, face.y),
                };
                tracing::info!(
                    face = ?hit.face,
                    smile = ?hit.smile,
                    candidates = smiles.len(),
                    "smile detected"
                );
                return Ok(Some(hit));
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Returns canned regions and records the image sizes and params it saw.
    struct StubDetector {
        responses: Mutex<Vec<Vec<Region>>>,
        calls: Mutex<Vec<((u32, u32), DetectParams)>>,
    }

    impl StubDetector {
        fn new(responses: Vec<Vec<Region>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl RegionDetector for StubDetector {
        fn detect(
            &self,
            image: &GrayImage,
            params: &DetectParams,
        ) -> Result<Vec<Region>, DetectorError> {
            self.calls.lock().unwrap().push((image.dimensions(), *params));
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok(Vec::new())
            } else {
                Ok(responses.remove(0))
            }
        }
    }

    impl RegionDetector for std::sync::Arc<StubDetector> {
        fn detect(
            &self,
            image: &GrayImage,
            params: &DetectParams,
        ) -> Result<Vec<Region>, DetectorError> {
            self.as_ref().detect(image, params)
        }
    }

    struct FailingDetector;

    impl RegionDetector for FailingDetector {
        fn detect(&self, _: &GrayImage, _: &DetectParams) -> Result<Vec<Region>, DetectorError> {
            Err(opencv::Error::new(opencv::core::StsError, "boom").into())
        }
    }

    fn frame() -> GrayImage {
        GrayImage::new(640, 480)
    }

    #[test]
    fn test_smile_translated_to_frame_coordinates() {
        let faces = StubDetector::new(vec![vec![Region::new(100, 50, 200, 200)]]);
        let smiles = StubDetector::new(vec![vec![Region::new(60, 130, 80, 40)]]);
        let detector = SmileDetector::new(Box::new(faces), Box::new(smiles));

        let hit = detector.find_smile(&frame()).unwrap().unwrap();
        assert_eq!(hit.face, Region::new(100, 50, 200, 200));
        assert_eq!(hit.smile, Region::new(160, 180, 80, 40));
        assert_eq!(hit.coordinates(), "160,180");
    }

    #[test]
    fn test_no_faces_means_no_smile() {
        let faces = StubDetector::new(vec![vec![]]);
        let smiles = std::sync::Arc::new(StubDetector::new(vec![]));
        let detector = SmileDetector::new(Box::new(faces), Box::new(smiles.clone()));

        assert!(detector.find_smile(&frame()).unwrap().is_none());
        assert!(smiles.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_second_face_can_win() {
        let faces = StubDetector::new(vec![vec![
            Region::new(0, 0, 100, 100),
            Region::new(300, 200, 120, 120),
        ]]);
        // First face: no smile. Second face: smile.
        let smiles = StubDetector::new(vec![vec![], vec![Region::new(10, 70, 50, 25)]]);
        let detector = SmileDetector::new(Box::new(faces), Box::new(smiles));

        let hit = detector.find_smile(&frame()).unwrap().unwrap();
        assert_eq!(hit.face, Region::new(300, 200, 120, 120));
        assert_eq!(hit.smile, Region::new(310, 270, 50, 25));
    }

    #[test]
    fn test_first_smile_of_face_is_used() {
        let faces = StubDetector::new(vec![vec![Region::new(0, 0, 100, 100)]]);
        let smiles = StubDetector::new(vec![vec![
            Region::new(5, 60, 30, 15),
            Region::new(40, 60, 30, 15),
        ]]);
        let detector = SmileDetector::new(Box::new(faces), Box::new(smiles));

        let hit = detector.find_smile(&frame()).unwrap().unwrap();
        assert_eq!(hit.smile, Region::new(5, 60, 30, 15));
    }

    #[test]
    fn test_params_and_crop_size_passed_through() {
        let faces = std::sync::Arc::new(StubDetector::new(vec![vec![Region::new(
            600, 400, 100, 100,
        )]]));
        let smiles = std::sync::Arc::new(StubDetector::new(vec![vec![]]));
        let detector = SmileDetector::new(Box::new(faces.clone()), Box::new(smiles.clone()));

        assert!(detector.find_smile(&frame()).unwrap().is_none());

        let face_calls = faces.calls.lock().unwrap();
        assert_eq!(face_calls.as_slice(), &[((640, 480), FACE_PARAMS)]);

        // The overhanging face is clipped to the frame before cropping.
        let smile_calls = smiles.calls.lock().unwrap();
        assert_eq!(smile_calls.as_slice(), &[((40, 80), SMILE_PARAMS)]);
    }

    #[test]
    fn test_detector_error_propagates() {
        let detector = SmileDetector::new(Box::new(FailingDetector), Box::new(FailingDetector));
        let err = detector.find_smile(&frame()).unwrap_err();
        assert!(matches!(err, DetectorError::OpenCv(_)));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_load_missing_dir() {
        let err = SmileDetector::load(Path::new("/nonexistent/cascades")).err().unwrap();
        assert!(matches!(err, DetectorError::CascadeNotFound(_)));
        assert!(err.to_string().contains(FACE_CASCADE_FILE));
    }

    #[test]
    fn test_stock_cascades_find_no_smile_on_blank_frame() {
        let Some(dir) = std::env::var_os("SMILECAM_CASCADE_DIR").map(std::path::PathBuf::from)
        else {
            eprintln!("SMILECAM_CASCADE_DIR not set; skipping");
            return;
        };

        let detector = SmileDetector::load(&dir).unwrap();
        assert!(detector.find_smile(&frame()).unwrap().is_none());
        let gray = GrayImage::from_pixel(640, 480, image::Luma([200]));
        assert!(detector.find_smile(&gray).unwrap().is_none());
    }
}
