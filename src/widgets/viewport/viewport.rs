//! Viewport transform: fit-to-window mapping between widget and image space.
//!
//! The image is scaled uniformly to fit the panel and centered:
//!
//! ```text
//! scale   = min(Lw / W, Lh / H)
//! offset  = ((Lw - W*scale) / 2, (Lh - H*scale) / 2)
//! widget  = image * scale + offset
//! ```
//!
//! Widget coordinates are local to the panel (panel top-left = 0,0).

use eframe::egui;
use log::debug;

use crate::entities::rect::{GeometryError, check_image_size};

/// Fitted mapping for one (image size, panel size) pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    pub image_size: egui::Vec2,
    pub viewport_size: egui::Vec2,
    pub scale: f32,
    pub offset: egui::Vec2,
}

impl ViewTransform {
    /// Aspect-preserving fit of `image_size` into `viewport_size`.
    pub fn fit(image_size: egui::Vec2, viewport_size: egui::Vec2) -> Result<Self, GeometryError> {
        check_image_size(image_size)?;
        if viewport_size.x <= 0.0 || viewport_size.y <= 0.0 {
            return Err(GeometryError::DegenerateViewport {
                width: viewport_size.x,
                height: viewport_size.y,
            });
        }

        let scale_x = viewport_size.x / image_size.x;
        let scale_y = viewport_size.y / image_size.y;
        let scale = scale_x.min(scale_y);
        let scaled = image_size * scale;
        let offset = (viewport_size - scaled) * 0.5;

        Ok(Self {
            image_size,
            viewport_size,
            scale,
            offset,
        })
    }

    /// Size of the image on screen.
    pub fn scaled_size(&self) -> egui::Vec2 {
        self.image_size * self.scale
    }

    /// Image rectangle in widget space.
    pub fn image_screen_rect(&self) -> egui::Rect {
        egui::Rect::from_min_size(self.offset.to_pos2(), self.scaled_size())
    }

    /// Widget -> image space. `None` outside the displayed image (edges inclusive).
    ///
    /// Rejects rather than clamps so clicks beside the image are ignored.
    pub fn to_image(&self, widget_pos: egui::Pos2) -> Option<egui::Pos2> {
        if !self.image_screen_rect().contains(widget_pos) {
            debug!("[viewport] {:?} outside image", widget_pos);
            return None;
        }
        Some(self.to_image_unbounded(widget_pos))
    }

    /// Widget -> image space without bounds check (active gestures).
    pub fn to_image_unbounded(&self, widget_pos: egui::Pos2) -> egui::Pos2 {
        ((widget_pos - self.offset).to_vec2() / self.scale).to_pos2()
    }

    /// Image -> widget space, no bounds check.
    pub fn to_widget(&self, image_pos: egui::Pos2) -> egui::Pos2 {
        (image_pos.to_vec2() * self.scale + self.offset).to_pos2()
    }

    pub fn to_widget_rect(&self, image_rect: egui::Rect) -> egui::Rect {
        egui::Rect::from_min_max(self.to_widget(image_rect.min), self.to_widget(image_rect.max))
    }
}

/// Viewport sizes tracked across frames.
///
/// Panel size changes on window resize, image size when a new image loads.
/// The transform is derived on demand, never cached.
#[derive(Debug, Clone, Default)]
pub struct ViewportState {
    pub image_size: Option<egui::Vec2>,
    pub viewport_size: egui::Vec2,
}

impl ViewportState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update viewport size (called when window resizes)
    pub fn set_viewport_size(&mut self, size: egui::Vec2) {
        self.viewport_size = size;
    }

    /// Update image size (called when new image loads)
    pub fn set_image_size(&mut self, size: Option<egui::Vec2>) {
        self.image_size = size;
    }

    /// Current fitted transform, if an image is shown and the panel has area.
    pub fn transform(&self) -> Option<ViewTransform> {
        let image_size = self.image_size?;
        ViewTransform::fit(image_size, self.viewport_size).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_pos(a: egui::Pos2, b: egui::Pos2) -> bool {
        (a - b).length() < 1e-3
    }

    #[test]
    fn test_fit_letterbox_vertical() {
        // 1000x500 into 800x800: scale 0.8, bars top/bottom
        let t = ViewTransform::fit(egui::vec2(1000.0, 500.0), egui::vec2(800.0, 800.0)).unwrap();
        assert!((t.scale - 0.8).abs() < 1e-6);
        assert_eq!(t.scaled_size(), egui::vec2(800.0, 400.0));
        assert_eq!(t.offset, egui::vec2(0.0, 200.0));
    }

    #[test]
    fn test_fit_letterbox_horizontal() {
        let t = ViewTransform::fit(egui::vec2(500.0, 500.0), egui::vec2(1000.0, 250.0)).unwrap();
        assert!((t.scale - 0.5).abs() < 1e-6);
        assert_eq!(t.offset, egui::vec2(375.0, 0.0));
    }

    #[test]
    fn test_to_image_rejects_outside() {
        let t = ViewTransform::fit(egui::vec2(1000.0, 500.0), egui::vec2(800.0, 800.0)).unwrap();
        assert_eq!(t.to_image(egui::pos2(400.0, 100.0)), None);
        assert_eq!(t.to_image(egui::pos2(400.0, 700.0)), None);
        assert!(t.to_image(egui::pos2(400.0, 400.0)).is_some());
        // Edges are inside
        assert!(approx_pos(t.to_image(egui::pos2(800.0, 600.0)).unwrap(), egui::pos2(1000.0, 500.0)));
    }

    #[test]
    fn test_round_trip_widget_image() {
        let t = ViewTransform::fit(egui::vec2(1920.0, 1080.0), egui::vec2(1280.0, 1024.0)).unwrap();
        let p = egui::pos2(123.5, 987.25);
        let back = t.to_image(t.to_widget(p)).unwrap();
        assert!(approx_pos(back, p));
    }

    #[test]
    fn test_to_widget_unbounded() {
        let t = ViewTransform::fit(egui::vec2(1000.0, 500.0), egui::vec2(800.0, 800.0)).unwrap();
        let w = t.to_widget(egui::pos2(-100.0, 0.0));
        assert!(approx_pos(w, egui::pos2(-80.0, 200.0)));
        assert!(approx_pos(t.to_image_unbounded(w), egui::pos2(-100.0, 0.0)));
    }

    #[test]
    fn test_fit_rejects_degenerate() {
        assert!(matches!(
            ViewTransform::fit(egui::vec2(0.0, 10.0), egui::vec2(100.0, 100.0)),
            Err(GeometryError::DegenerateImage { .. })
        ));
        assert!(matches!(
            ViewTransform::fit(egui::vec2(10.0, 10.0), egui::vec2(0.0, 100.0)),
            Err(GeometryError::DegenerateViewport { .. })
        ));
    }

    #[test]
    fn test_viewport_state_transform() {
        let mut state = ViewportState::new();
        state.set_viewport_size(egui::vec2(800.0, 600.0));
        assert!(state.transform().is_none());
        state.set_image_size(Some(egui::vec2(400.0, 300.0)));
        let t = state.transform().unwrap();
        assert!((t.scale - 2.0).abs() < 1e-6);
    }
}
