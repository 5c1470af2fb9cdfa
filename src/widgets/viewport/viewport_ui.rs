//! Viewport widget - egui glue for the annotator
//!
//! Translates egui pointer/keyboard input into [`InputEvent`]s and paints the
//! image plus the annotator's [`Projection`]. Everything geometric happens in
//! panel-local coordinates; this file only adds/subtracts the panel origin.

use eframe::egui;
use log::{trace, warn};

use super::annotator::{Annotator, AnnotatorError, ClassPrompt};
use super::interaction::InputEvent;
use super::projection::Projection;

/// Box outline colors, picked by class id.
const CLASS_COLORS: [egui::Color32; 8] = [
    egui::Color32::from_rgb(255, 80, 80),
    egui::Color32::from_rgb(80, 200, 120),
    egui::Color32::from_rgb(90, 150, 255),
    egui::Color32::from_rgb(255, 200, 60),
    egui::Color32::from_rgb(200, 100, 255),
    egui::Color32::from_rgb(60, 220, 220),
    egui::Color32::from_rgb(255, 140, 40),
    egui::Color32::from_rgb(240, 240, 240),
];

const DRAFT_COLOR: egui::Color32 = egui::Color32::from_rgb(255, 255, 0);

pub fn class_color(class_id: u32) -> egui::Color32 {
    CLASS_COLORS[class_id as usize % CLASS_COLORS.len()]
}

/// Render viewport inside provided UI, feeding this frame's input to the
/// annotator. Returns store/geometry errors raised while handling input.
pub fn render(
    ui: &mut egui::Ui,
    annotator: &mut Annotator,
    texture: Option<&egui::TextureHandle>,
    prompt: &mut dyn ClassPrompt,
    label_font_size: f32,
) -> Vec<AnnotatorError> {
    let ctx = ui.ctx().clone();
    let panel_rect = ui.max_rect();
    let origin = panel_rect.min.to_vec2();
    ui.painter().rect_filled(panel_rect, 0.0, egui::Color32::from_gray(20));

    let response = ui.interact(
        panel_rect,
        ui.id().with("annotator_viewport"),
        egui::Sense::click_and_drag(),
    );

    annotator.set_widget_size(panel_rect.size());

    let mut errors = Vec::new();
    for event in collect_input(&ctx, &response, panel_rect) {
        trace!("[viewport] {:?}", event);
        if let Err(e) = annotator.handle_input(event, prompt) {
            errors.push(e);
        }
    }

    let Some(transform) = annotator.transform() else {
        ui.painter().text(
            panel_rect.center(),
            egui::Align2::CENTER_CENTER,
            "No image",
            egui::FontId::proportional(24.0),
            egui::Color32::from_rgba_unmultiplied(255, 255, 255, 160),
        );
        return errors;
    };

    if let Some(texture) = texture {
        let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
        ui.painter().image(
            texture.id(),
            transform.image_screen_rect().translate(origin),
            uv,
            egui::Color32::WHITE,
        );
    }

    if let Some(hover) = response.hover_pos() {
        ctx.set_cursor_icon(annotator.cursor_at(hover - origin));
    }

    if let Some(projection) = annotator.projection() {
        paint(ui.painter(), panel_rect.min, &projection, label_font_size);
    }

    errors
}

/// This frame's pointer and key input as state machine events (panel-local).
///
/// A release is never dropped: when the pointer leaves the window in the
/// same frame, the position comes from the button event itself, or from the
/// last position seen by this widget.
fn collect_input(
    ctx: &egui::Context,
    response: &egui::Response,
    panel_rect: egui::Rect,
) -> Vec<InputEvent> {
    let origin = panel_rect.min.to_vec2();
    let pressed_inside = response.contains_pointer();
    let last_pos_id = response.id.with("last_pointer_pos");
    let last_known: Option<egui::Pos2> = ctx.data(|d| d.get_temp(last_pos_id));

    let (events, latest) = ctx.input(|i| {
        let mut events = Vec::new();
        let latest = i.pointer.latest_pos();
        if let Some(pos) = latest {
            let local = pos - origin;
            if i.pointer.primary_pressed() && pressed_inside {
                events.push(InputEvent::PointerDown(local));
            }
            if i.pointer.delta() != egui::Vec2::ZERO {
                events.push(InputEvent::PointerMove(local));
            }
        }
        if i.pointer.primary_released() {
            match primary_release_pos(&i.events).or(latest).or(last_known) {
                Some(pos) => events.push(InputEvent::PointerUp(pos - origin)),
                None => warn!("[viewport] primary release with no known pointer position"),
            }
        }
        if i.key_pressed(egui::Key::Delete) || i.key_pressed(egui::Key::Backspace) {
            events.push(InputEvent::Delete);
        }
        (events, latest)
    });

    if let Some(pos) = latest {
        ctx.data_mut(|d| d.insert_temp(last_pos_id, pos));
    }
    events
}

/// Position carried by the last primary-button release in `events`.
fn primary_release_pos(events: &[egui::Event]) -> Option<egui::Pos2> {
    events.iter().rev().find_map(|e| match e {
        egui::Event::PointerButton {
            pos,
            button: egui::PointerButton::Primary,
            pressed: false,
            ..
        } => Some(*pos),
        _ => None,
    })
}

/// Paint a projection; `origin` is the panel's top-left in screen space.
pub fn paint(painter: &egui::Painter, origin: egui::Pos2, projection: &Projection, label_font_size: f32) {
    let offset = origin.to_vec2();

    for shape in &projection.boxes {
        let color = class_color(shape.class_id);
        let width = if shape.selected { 2.5 } else { 1.5 };
        painter.rect_stroke(
            shape.rect.translate(offset),
            0.0,
            egui::Stroke::new(width, color),
            egui::epaint::StrokeKind::Middle,
        );

        for (_, handle) in &shape.handles {
            let r = handle.translate(offset);
            painter.rect_filled(r, 1.0, egui::Color32::WHITE);
            painter.rect_stroke(r, 1.0, egui::Stroke::new(1.0, color), egui::epaint::StrokeKind::Inside);
        }

        if let Some(label) = &shape.label {
            let galley = painter.layout_no_wrap(
                label.text.clone(),
                egui::FontId::proportional(label_font_size),
                egui::Color32::BLACK,
            );
            let chip = egui::Align2::LEFT_BOTTOM
                .anchor_size(label.anchor + offset, galley.size())
                .expand(2.0);
            painter.rect_filled(chip, 2.0, color);
            painter.galley(chip.min + egui::vec2(2.0, 2.0), galley, egui::Color32::BLACK);
        }
    }

    if let Some(draft) = projection.draft {
        painter.rect_stroke(
            draft.translate(offset),
            0.0,
            egui::Stroke::new(1.5, DRAFT_COLOR),
            egui::epaint::StrokeKind::Middle,
        );
    }
}
