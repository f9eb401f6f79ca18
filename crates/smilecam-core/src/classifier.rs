//! Haar cascade classifier backed by OpenCV's `objdetect` module.

use crate::detector::{DetectorError, RegionDetector};
use crate::types::{DetectParams, Region};
use image::GrayImage;
use opencv::core::{Mat, Rect, Size, Vector};
use opencv::objdetect::CascadeClassifier;
use opencv::prelude::*;
use std::path::Path;
use std::sync::Mutex;

/// `detectMultiScale` flags; 0 selects the default image pyramid.
const DETECT_FLAGS: i32 = 0;

/// One stock OpenCV cascade (e.g. `haarcascade_smile.xml`).
///
/// OpenCV mutates classifier scratch state during detection, so calls are
/// serialized through a mutex.
pub struct CascadeDetector {
    classifier: Mutex<CascadeClassifier>,
    name: String,
}

impl CascadeDetector {
    /// Load a cascade XML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DetectorError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DetectorError::CascadeNotFound(path.display().to_string()));
        }

        let name = path.display().to_string();
        let classifier = CascadeClassifier::new(&name)?;
        if classifier.empty()? {
            return Err(DetectorError::DetectionFailed(format!(
                "{name} did not load as a cascade classifier"
            )));
        }

        let window = classifier.get_original_window_size()?;
        tracing::info!(
            cascade = %name,
            window_width = window.width,
            window_height = window.height,
            "cascade loaded"
        );

        Ok(Self {
            classifier: Mutex::new(classifier),
            name,
        })
    }
}

impl RegionDetector for CascadeDetector {
    fn detect(
        &self,
        image: &GrayImage,
        params: &DetectParams,
    ) -> Result<Vec<Region>, DetectorError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Ok(Vec::new());
        }

        let mat = gray_to_mat(image)?;
        let mut found = Vector::<Rect>::new();
        let (min_w, min_h) = params.min_size;

        self.classifier
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .detect_multi_scale(
                &mat,
                &mut found,
                params.scale_factor,
                params.min_neighbors as i32,
                DETECT_FLAGS,
                Size::new(min_w as i32, min_h as i32),
                Size::default(),
            )?;

        let regions: Vec<Region> = found.iter().filter_map(rect_to_region).collect();
        tracing::trace!(cascade = %self.name, regions = regions.len(), "detect_multi_scale");
        Ok(regions)
    }
}

/// Copy an 8-bit grayscale image into a single-channel `Mat`.
fn gray_to_mat(image: &GrayImage) -> Result<Mat, DetectorError> {
    let (width, height) = image.dimensions();
    Ok(Mat::from_slice_rows_cols(image.as_raw(), height as usize, width as usize)?)
}

fn rect_to_region(rect: Rect) -> Option<Region> {
    if rect.x < 0 || rect.y < 0 || rect.width <= 0 || rect.height <= 0 {
        return None;
    }
    Some(Region::new(
        rect.x as u32,
        rect.y as u32,
        rect.width as u32,
        rect.height as u32,
    ))
}
