//! Vision Classifier
//!
//! Template matching over captured frames using zero-mean normalized
//! cross-correlation. Malformed input never errors; it classifies as
//! "no match" so the poll loops stay resilient.

use crate::capture::{crop, Frame, Rect};
use image::GrayImage;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// Template name for the helper "play" indicator (top band)
pub const PLAY_ICON: &str = "play_icon";
/// Template name for the helper "off" indicator (bottom band)
pub const HELPER_OFF: &str = "helper_off";
/// Template name for the incoming-message indicator (full frame)
pub const MESSAGE_ICON: &str = "message_icon";

/// Template file names and their regions of interest
const TEMPLATE_FILES: &[(&str, &str, RoiPolicy)] = &[
    (PLAY_ICON, "play_icon.png", RoiPolicy::TopBand),
    (HELPER_OFF, "helper_off.png", RoiPolicy::BottomBand),
    (MESSAGE_ICON, "message_icon.png", RoiPolicy::FullFrame),
];

/// Which part of a captured frame a template is searched in.
/// Indicator icons render in fixed screen regions, so restricting the
/// search cuts false positives and matching cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoiPolicy {
    FullFrame,
    /// Left half of the frame, top sixth
    TopBand,
    /// Left half of the frame, bottom seventh
    BottomBand,
}

impl RoiPolicy {
    /// Search region within a frame of the given size
    pub fn region(&self, width: u32, height: u32) -> Rect {
        let (w, h) = (width as i32, height as i32);
        match self {
            RoiPolicy::FullFrame => Rect::new(0, 0, w, h),
            RoiPolicy::TopBand => Rect::new(0, 0, w / 2, h / 6),
            RoiPolicy::BottomBand => {
                let band = h / 7;
                Rect::new(0, h - band, w / 2, band)
            }
        }
    }
}

/// A named reference image with its search region and match threshold
pub struct ClassificationTemplate {
    pub name: String,
    image: GrayImage,
    pub roi: RoiPolicy,
    pub threshold: f64,
}

impl ClassificationTemplate {
    pub fn new(
        name: impl Into<String>,
        image: GrayImage,
        roi: RoiPolicy,
        threshold: f64,
    ) -> Self {
        Self {
            name: name.into(),
            image,
            roi,
            threshold,
        }
    }

    /// True when the template matches inside its ROI above the threshold
    pub fn is_present(&self, frame: &Frame) -> bool {
        let region = self.roi.region(frame.width(), frame.height());
        let cropped = crop(frame, region);
        let gray = image::imageops::grayscale(&cropped);
        match_confidence(&gray, &self.image) >= self.threshold
    }
}

/// Maximum zero-mean normalized cross-correlation of `template` over all
/// placements inside `source`, clamped to [0, 1].
///
/// Returns 0.0 when either image is smaller than 2x2, the template does not
/// fit inside the source, or either image has no variance.
pub fn match_confidence(source: &GrayImage, template: &GrayImage) -> f64 {
    match best_match(source, template) {
        Some((score, _, _)) => score,
        None => 0.0,
    }
}

/// Locates the best placement of `template` inside `source`, if its
/// confidence reaches `threshold`. Used for board alignment.
pub fn find_region(source: &GrayImage, template: &GrayImage, threshold: f64) -> Option<Rect> {
    let (score, x, y) = best_match(source, template)?;
    (score >= threshold).then(|| {
        Rect::new(
            x as i32,
            y as i32,
            template.width() as i32,
            template.height() as i32,
        )
    })
}

fn best_match(source: &GrayImage, template: &GrayImage) -> Option<(f64, u32, u32)> {
    let (sw, sh) = source.dimensions();
    let (tw, th) = template.dimensions();

    if sw < 2 || sh < 2 || tw < 2 || th < 2 || tw > sw || th > sh {
        return None;
    }

    // Template statistics are placement-independent
    let tpix: Vec<f64> = template.pixels().map(|p| p.0[0] as f64).collect();
    let count = tpix.len() as f64;
    let tmean = tpix.iter().sum::<f64>() / count;
    let tdev: Vec<f64> = tpix.iter().map(|v| v - tmean).collect();
    let tnorm = tdev.iter().map(|v| v * v).sum::<f64>().sqrt();
    if tnorm == 0.0 {
        return None;
    }

    let mut best: Option<(f64, u32, u32)> = None;

    for oy in 0..=(sh - th) {
        for ox in 0..=(sw - tw) {
            let mut sum = 0.0;
            for y in 0..th {
                for x in 0..tw {
                    sum += source.get_pixel(ox + x, oy + y).0[0] as f64;
                }
            }
            let smean = sum / count;

            let mut cross = 0.0;
            let mut snorm = 0.0;
            let mut i = 0;
            for y in 0..th {
                for x in 0..tw {
                    let s = source.get_pixel(ox + x, oy + y).0[0] as f64 - smean;
                    cross += s * tdev[i];
                    snorm += s * s;
                    i += 1;
                }
            }
            if snorm == 0.0 {
                continue;
            }

            let score = (cross / (snorm.sqrt() * tnorm)).clamp(0.0, 1.0);
            if best.map_or(true, |(b, _, _)| score > b) {
                best = Some((score, ox, oy));
            }
        }
    }

    best
}

/// Reference templates resolved from a resource directory by file name.
/// A missing template file classifies as "not present" rather than erroring.
#[derive(Default)]
pub struct TemplateSet {
    templates: HashMap<String, ClassificationTemplate>,
}

impl TemplateSet {
    /// Loads the known template files from `dir` with the given threshold
    pub fn load(dir: &Path, threshold: f64) -> Self {
        let mut set = Self::default();
        for (name, file, roi) in TEMPLATE_FILES {
            let path = dir.join(file);
            match image::open(&path) {
                Ok(img) => {
                    debug!("Template {name} loaded from {}", path.display());
                    set.insert(ClassificationTemplate::new(
                        *name,
                        img.to_luma8(),
                        *roi,
                        threshold,
                    ));
                }
                Err(e) => {
                    warn!("Template {name} unavailable ({}): {e}", path.display());
                }
            }
        }
        set
    }

    pub fn insert(&mut self, template: ClassificationTemplate) {
        self.templates.insert(template.name.clone(), template);
    }

    /// True when the named template is loaded and matches the frame
    pub fn is_present(&self, name: &str, frame: &Frame) -> bool {
        self.templates
            .get(name)
            .map(|t| t.is_present(frame))
            .unwrap_or(false)
    }

    /// Helper liveness check: "play" icon in the top band OR "helper off"
    /// icon in the bottom band, first match wins.
    pub fn helper_inactive(&self, frame: &Frame) -> bool {
        self.is_present(PLAY_ICON, frame) || self.is_present(HELPER_OFF, frame)
    }

    /// Incoming-message check over the full frame
    pub fn message_received(&self, frame: &Frame) -> bool {
        self.is_present(MESSAGE_ICON, frame)
    }
}
