//! Rectangle math for annotations.
//!
//! ## Coordinate Spaces
//!
//! - **Widget space**: origin top-left of the viewport panel, +Y down (screen pixels).
//! - **Image space**: origin top-left of the image, +Y down (image pixels).
//! - **Normalized space**: image space divided by image size, `0..1` on both axes.
//!
//! Boxes are stored normalized ([`NormRect`]) and worked on in image space
//! (`egui::Rect`). Conversion to widget space lives in the viewport transform.
//!
//! ```text
//! drag points (image px)
//!     |  normalize_points()
//!     v
//! canonical Rect (min <= max)
//!     |  clamp_rect()
//!     v
//! Rect inside image bounds
//!     |  NormRect::from_pixel()
//!     v
//! NormRect (stored)
//! ```

use eframe::egui;
use serde::{Deserialize, Serialize};

/// Geometry failures. Never fatal: the caller drops the operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeometryError {
    /// Image has zero (or negative) width or height
    DegenerateImage { width: f32, height: f32 },
    /// Viewport panel has no area to fit the image into
    DegenerateViewport { width: f32, height: f32 },
}

impl std::fmt::Display for GeometryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeometryError::DegenerateImage { width, height } => {
                write!(f, "Degenerate image size {}x{}", width, height)
            }
            GeometryError::DegenerateViewport { width, height } => {
                write!(f, "Degenerate viewport size {}x{}", width, height)
            }
        }
    }
}

impl std::error::Error for GeometryError {}

/// Fail unless both image dimensions are usable divisors.
pub fn check_image_size(image_size: egui::Vec2) -> Result<(), GeometryError> {
    if image_size.x > 0.0 && image_size.y > 0.0 && image_size.is_finite() {
        Ok(())
    } else {
        Err(GeometryError::DegenerateImage {
            width: image_size.x,
            height: image_size.y,
        })
    }
}

/// Axis-aligned box in normalized image coordinates.
///
/// Invariant: `0 <= x1 <= x2 <= 1` and `0 <= y1 <= y2 <= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormRect {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl NormRect {
    /// Build from two arbitrary corners, reordering so min <= max.
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// Center/size form used by YOLO label files: (x_center, y_center, width, height).
    pub fn to_xywh(&self) -> [f32; 4] {
        [
            (self.x1 + self.x2) * 0.5,
            (self.y1 + self.y2) * 0.5,
            self.width(),
            self.height(),
        ]
    }

    /// Image space -> normalized space.
    ///
    /// Fails on a zero-sized image instead of producing NaN/Inf.
    /// Result is reordered and clamped into `0..1` to absorb float noise.
    pub fn from_pixel(rect: egui::Rect, image_size: egui::Vec2) -> Result<Self, GeometryError> {
        check_image_size(image_size)?;
        let r = normalize_points(rect.min, rect.max);
        Ok(Self {
            x1: (r.min.x / image_size.x).clamp(0.0, 1.0),
            y1: (r.min.y / image_size.y).clamp(0.0, 1.0),
            x2: (r.max.x / image_size.x).clamp(0.0, 1.0),
            y2: (r.max.y / image_size.y).clamp(0.0, 1.0),
        })
    }

    /// Normalized space -> image space.
    pub fn to_pixel(&self, image_size: egui::Vec2) -> egui::Rect {
        egui::Rect::from_min_max(
            egui::pos2(self.x1 * image_size.x, self.y1 * image_size.y),
            egui::pos2(self.x2 * image_size.x, self.y2 * image_size.y),
        )
    }
}

impl std::fmt::Display for NormRect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({:.4}, {:.4}, {:.4}, {:.4})",
            self.x1, self.y1, self.x2, self.y2
        )
    }
}

/// Reduce a two-point drag to `(min x, min y, max x, max y)`.
#[inline]
pub fn normalize_points(a: egui::Pos2, b: egui::Pos2) -> egui::Rect {
    egui::Rect::from_min_max(
        egui::pos2(a.x.min(b.x), a.y.min(b.y)),
        egui::pos2(a.x.max(b.x), a.y.max(b.y)),
    )
}

/// Keep a box inside `0..image_size`.
///
/// - `preserve_size = true` (body drag): translate only. A box larger than
///   the image pins to the origin.
/// - `preserve_size = false` (draw/resize): origin clamped into the image,
///   far edge clamped so `width <= W - x` and `height <= H - y`.
pub fn clamp_rect(rect: egui::Rect, image_size: egui::Vec2, preserve_size: bool) -> egui::Rect {
    let r = normalize_points(rect.min, rect.max);
    let (w, h) = (image_size.x, image_size.y);

    if preserve_size {
        let size = r.size();
        // min/max instead of clamp(): W - width may be negative
        let x = r.min.x.min(w - size.x).max(0.0);
        let y = r.min.y.min(h - size.y).max(0.0);
        egui::Rect::from_min_size(egui::pos2(x, y), size)
    } else {
        let x = r.min.x.clamp(0.0, w.max(0.0));
        let y = r.min.y.clamp(0.0, h.max(0.0));
        let width = (r.max.x - x).min(w - x).max(0.0);
        let height = (r.max.y - y).min(h - y).max(0.0);
        egui::Rect::from_min_size(egui::pos2(x, y), egui::vec2(width, height))
    }
}
