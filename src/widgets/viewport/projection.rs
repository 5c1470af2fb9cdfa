//! Render projection: what the viewport paints this frame.
//!
//! Pure function of working set, interaction state and transform. All
//! rectangles come out in widget space; `viewport_ui::paint` only offsets
//! them by the panel origin.

use eframe::egui;

use super::hit_test::{Handle, HandleMetrics};
use super::interaction::{Gesture, InteractionState};
use super::viewport::ViewTransform;
use crate::entities::annotation::Annotation;
use crate::entities::rect::{clamp_rect, normalize_points};

/// Class label shown above the selected box.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelChip {
    /// Bottom-left corner of the chip
    pub anchor: egui::Pos2,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoxShape {
    /// Index into the working set
    pub index: usize,
    pub rect: egui::Rect,
    pub class_id: u32,
    pub selected: bool,
    /// Handle squares, selected box only
    pub handles: Vec<(Handle, egui::Rect)>,
    pub label: Option<LabelChip>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    /// Back to front (working set order)
    pub boxes: Vec<BoxShape>,
    /// Rubber band of an in-progress draw
    pub draft: Option<egui::Rect>,
}

impl Projection {
    pub fn selected(&self) -> Option<&BoxShape> {
        self.boxes.iter().find(|b| b.selected)
    }
}

/// Build the projection. `handles` is in widget pixels.
pub fn project(
    annotations: &[Annotation],
    state: &InteractionState,
    transform: &ViewTransform,
    handles: &HandleMetrics,
) -> Projection {
    let image_size = transform.image_size;
    let handle_size = egui::vec2(handles.handle_size, handles.handle_size);

    let boxes = annotations
        .iter()
        .enumerate()
        .map(|(index, ann)| {
            let rect = transform.to_widget_rect(ann.rect.to_pixel(image_size));
            let selected = state.selection == Some(index);
            let (handles, label) = if selected {
                let squares = Handle::ALL
                    .iter()
                    .map(|h| (*h, egui::Rect::from_center_size(h.anchor(rect), handle_size)))
                    .collect();
                let chip = LabelChip {
                    anchor: egui::pos2(rect.min.x, rect.min.y - 2.0),
                    text: ann.class_id.to_string(),
                };
                (squares, Some(chip))
            } else {
                (Vec::new(), None)
            };
            BoxShape {
                index,
                rect,
                class_id: ann.class_id,
                selected,
                handles,
                label,
            }
        })
        .collect();

    let draft = match state.gesture {
        Gesture::Drawing { anchor, current } => {
            let rect = clamp_rect(normalize_points(anchor, current), image_size, false);
            Some(transform.to_widget_rect(rect))
        }
        _ => None,
    };

    Projection { boxes, draft }
}
