//! Interaction state machine for the annotation viewport.
//!
//! Pure transition function: `handle_event(state, event, scene)` returns the
//! next state plus a list of [`Effect`]s. Nothing here touches the store or
//! the working set; [`Annotator`](super::Annotator) applies the effects.
//!
//! ```text
//!                 down (Draw)                up
//!   Idle ─────────────────────> Drawing ──────────> Idle  + Create
//!    │  down (Select) on body                    up
//!    ├────────────────────────> DraggingBody ───> Idle  + Commit
//!    │  down (Select) on handle                  up
//!    └────────────────────────> Resizing ───────> Idle  + Commit
//! ```
//!
//! Pointer positions arrive in widget space. Pointer-down must land on the
//! image; moves and releases of an active gesture are mapped unbounded and
//! clamped, so dragging past the image edge pins the box to the edge.

use eframe::egui;
use log::{debug, warn};

use super::hit_test::{Handle, HandleMetrics, HitRegion, hit_test};
use super::tool::ToolMode;
use super::viewport::ViewTransform;
use crate::entities::annotation::Annotation;
use crate::entities::rect::{NormRect, clamp_rect, normalize_points};

/// Input delivered to the state machine (widget-local positions).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    PointerDown(egui::Pos2),
    PointerMove(egui::Pos2),
    PointerUp(egui::Pos2),
    Delete,
}

/// Gesture in progress. Points are in image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Gesture {
    #[default]
    Idle,
    Drawing {
        anchor: egui::Pos2,
        current: egui::Pos2,
    },
    DraggingBody {
        target: usize,
        last: egui::Pos2,
        /// Rect at gesture start, for rollback
        original: NormRect,
    },
    Resizing {
        target: usize,
        handle: Handle,
        last: egui::Pos2,
        original: NormRect,
    },
}

/// Side effects requested by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Repaint only
    Redraw,
    SelectionChanged(Option<usize>),
    /// Replace target's rect in the working set (not persisted yet)
    Move { target: usize, rect: NormRect },
    /// Persist target's current rect; `original` is what to restore on failure
    Commit { target: usize, original: NormRect },
    /// Restore target's rect without persisting (abandoned gesture)
    Revert { target: usize, original: NormRect },
    /// Finished draw: ask for a class id, then create
    Create { rect: NormRect },
    Delete { target: usize },
}

/// Read-only view of the world a transition needs.
#[derive(Debug, Clone, Copy)]
pub struct Scene<'a> {
    pub transform: &'a ViewTransform,
    pub annotations: &'a [Annotation],
    /// Handle metrics in image pixels
    pub handles: HandleMetrics,
    /// Drawn boxes smaller than this (image px, either axis) are dropped
    pub min_box_size: f32,
}

impl Scene<'_> {
    fn image_size(&self) -> egui::Vec2 {
        self.transform.image_size
    }
}

/// Tool, gesture and selection of one viewer.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InteractionState {
    pub tool: ToolMode,
    pub gesture: Gesture,
    pub selection: Option<usize>,
}

type Transition = (InteractionState, Vec<Effect>);

impl InteractionState {
    pub fn new(tool: ToolMode) -> Self {
        Self {
            tool,
            ..Default::default()
        }
    }

    pub fn is_idle(&self) -> bool {
        self.gesture == Gesture::Idle
    }

    /// Switch tool: always back to Idle with no selection.
    ///
    /// An abandoned drag/resize is reverted, an abandoned draw just dropped.
    pub fn set_tool(&self, tool: ToolMode) -> Transition {
        let mut effects = Vec::new();
        match self.gesture {
            Gesture::DraggingBody { target, original, .. }
            | Gesture::Resizing { target, original, .. } => {
                effects.push(Effect::Revert { target, original });
            }
            Gesture::Drawing { .. } | Gesture::Idle => {}
        }
        if self.selection.is_some() {
            effects.push(Effect::SelectionChanged(None));
        }
        effects.push(Effect::Redraw);
        (InteractionState::new(tool), effects)
    }

    /// Forget gesture and selection without effects (image switched).
    pub fn reset(&self) -> InteractionState {
        InteractionState::new(self.tool)
    }
}

/// Advance the state machine by one input event.
pub fn handle_event(state: &InteractionState, event: InputEvent, scene: &Scene) -> Transition {
    match (state.gesture, event) {
        (Gesture::Idle, InputEvent::PointerDown(p)) => pointer_down(state, p, scene),
        (Gesture::Idle, InputEvent::Delete) => delete(state),

        (Gesture::Drawing { anchor, .. }, InputEvent::PointerMove(p)) => {
            let current = scene.transform.to_image_unbounded(p);
            let next = InteractionState {
                gesture: Gesture::Drawing { anchor, current },
                ..*state
            };
            (next, vec![Effect::Redraw])
        }
        (Gesture::Drawing { anchor, .. }, InputEvent::PointerUp(p)) => {
            let end = scene.transform.to_image_unbounded(p);
            finish_drawing(state, anchor, end, scene)
        }

        (
            Gesture::DraggingBody {
                target, last, original,
            },
            InputEvent::PointerMove(p),
        ) => drag_body(state, target, last, original, p, scene),

        (
            Gesture::Resizing {
                target, handle, original, ..
            },
            InputEvent::PointerMove(p),
        ) => resize(state, target, handle, original, p, scene),

        (
            Gesture::DraggingBody { target, original, .. }
            | Gesture::Resizing { target, original, .. },
            InputEvent::PointerUp(_),
        ) => {
            let next = InteractionState {
                gesture: Gesture::Idle,
                ..*state
            };
            (next, vec![Effect::Commit { target, original }, Effect::Redraw])
        }

        // Hover moves, stray releases, presses during a gesture, delete mid-gesture
        _ => (*state, Vec::new()),
    }
}

fn pointer_down(state: &InteractionState, p: egui::Pos2, scene: &Scene) -> Transition {
    let Some(image_pos) = scene.transform.to_image(p) else {
        return (*state, Vec::new());
    };

    match state.tool {
        ToolMode::None => (*state, Vec::new()),
        ToolMode::Draw => {
            debug!("[fsm] start drawing at {:?}", image_pos);
            let next = InteractionState {
                gesture: Gesture::Drawing {
                    anchor: image_pos,
                    current: image_pos,
                },
                ..*state
            };
            (next, vec![Effect::Redraw])
        }
        ToolMode::Select => {
            let hit = hit_test(image_pos, scene.annotations, scene.image_size(), &scene.handles);
            let (Some(target), Some(region)) = (hit.target, hit.region) else {
                let mut effects = Vec::new();
                if state.selection.is_some() {
                    effects.push(Effect::SelectionChanged(None));
                    effects.push(Effect::Redraw);
                }
                let next = InteractionState {
                    selection: None,
                    ..*state
                };
                return (next, effects);
            };

            let original = scene.annotations[target].rect;
            let gesture = match region {
                HitRegion::Body => Gesture::DraggingBody {
                    target,
                    last: image_pos,
                    original,
                },
                HitRegion::Handle(handle) => Gesture::Resizing {
                    target,
                    handle,
                    last: image_pos,
                    original,
                },
            };
            debug!("[fsm] select [{}] {:?}", target, gesture);

            let mut effects = Vec::new();
            if state.selection != Some(target) {
                effects.push(Effect::SelectionChanged(Some(target)));
            }
            effects.push(Effect::Redraw);
            let next = InteractionState {
                gesture,
                selection: Some(target),
                ..*state
            };
            (next, effects)
        }
    }
}

fn finish_drawing(
    state: &InteractionState,
    anchor: egui::Pos2,
    end: egui::Pos2,
    scene: &Scene,
) -> Transition {
    let idle = InteractionState {
        gesture: Gesture::Idle,
        ..*state
    };

    let rect = clamp_rect(normalize_points(anchor, end), scene.image_size(), false);
    if rect.width() < scene.min_box_size || rect.height() < scene.min_box_size {
        debug!("[fsm] drop tiny box {:?}", rect);
        return (idle, vec![Effect::Redraw]);
    }

    match NormRect::from_pixel(rect, scene.image_size()) {
        Ok(norm) => (idle, vec![Effect::Create { rect: norm }, Effect::Redraw]),
        Err(e) => {
            warn!("Discarding drawn box: {}", e);
            (idle, vec![Effect::Redraw])
        }
    }
}

fn drag_body(
    state: &InteractionState,
    target: usize,
    last: egui::Pos2,
    original: NormRect,
    p: egui::Pos2,
    scene: &Scene,
) -> Transition {
    let Some(ann) = scene.annotations.get(target) else {
        return lost_target(state, target);
    };
    let pos = scene.transform.to_image_unbounded(p);
    let delta = pos - last;

    let moved = ann.rect.to_pixel(scene.image_size()).translate(delta);
    let clamped = clamp_rect(moved, scene.image_size(), true);
    let Ok(rect) = NormRect::from_pixel(clamped, scene.image_size()) else {
        return (*state, Vec::new());
    };

    let next = InteractionState {
        gesture: Gesture::DraggingBody {
            target,
            last: pos,
            original,
        },
        ..*state
    };
    (next, vec![Effect::Move { target, rect }, Effect::Redraw])
}

fn resize(
    state: &InteractionState,
    target: usize,
    handle: Handle,
    original: NormRect,
    p: egui::Pos2,
    scene: &Scene,
) -> Transition {
    let Some(ann) = scene.annotations.get(target) else {
        return lost_target(state, target);
    };
    let pos = scene.transform.to_image_unbounded(p);

    let raw = handle.drag_to(ann.rect.to_pixel(scene.image_size()), pos);
    // Pointer crossed the opposite edge: keep holding the edge under the pointer
    let handle = handle.flipped(raw.min.x > raw.max.x, raw.min.y > raw.max.y);
    let clamped = clamp_rect(normalize_points(raw.min, raw.max), scene.image_size(), false);
    let Ok(rect) = NormRect::from_pixel(clamped, scene.image_size()) else {
        return (*state, Vec::new());
    };

    let next = InteractionState {
        gesture: Gesture::Resizing {
            target,
            handle,
            last: pos,
            original,
        },
        ..*state
    };
    (next, vec![Effect::Move { target, rect }, Effect::Redraw])
}

fn delete(state: &InteractionState) -> Transition {
    match (state.tool, state.selection) {
        (ToolMode::Select, Some(target)) => (*state, vec![Effect::Delete { target }]),
        _ => (*state, Vec::new()),
    }
}

fn lost_target(state: &InteractionState, target: usize) -> Transition {
    warn!("Gesture target [{}] no longer in working set, resetting", target);
    let next = InteractionState {
        gesture: Gesture::Idle,
        selection: None,
        ..*state
    };
    (next, vec![Effect::SelectionChanged(None), Effect::Redraw])
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-4;

    // 1000x500 image in a 1000x500 panel: widget == image coords
    fn transform() -> ViewTransform {
        ViewTransform::fit(egui::vec2(1000.0, 500.0), egui::vec2(1000.0, 500.0)).unwrap()
    }

    fn scene<'a>(t: &'a ViewTransform, anns: &'a [Annotation]) -> Scene<'a> {
        Scene {
            transform: t,
            annotations: anns,
            handles: HandleMetrics::new(8.0, 3.0),
            min_box_size: 2.0,
        }
    }

    fn boxed(x1: f32, y1: f32, x2: f32, y2: f32) -> Annotation {
        Annotation::new(0, NormRect::new(x1 / 1000.0, y1 / 500.0, x2 / 1000.0, y2 / 500.0))
    }

    fn moved_rect(effects: &[Effect]) -> NormRect {
        effects
            .iter()
            .find_map(|e| match e {
                Effect::Move { rect, .. } => Some(*rect),
                _ => None,
            })
            .expect("no Move effect")
    }

    #[test]
    fn test_draw_scenario() {
        let t = transform();
        let anns: Vec<Annotation> = Vec::new();
        let sc = scene(&t, &anns);
        let s = InteractionState::new(ToolMode::Draw);

        let (s, _) = handle_event(&s, InputEvent::PointerDown(egui::pos2(100.0, 100.0)), &sc);
        assert!(matches!(s.gesture, Gesture::Drawing { .. }));
        let (s, fx) = handle_event(&s, InputEvent::PointerMove(egui::pos2(250.0, 180.0)), &sc);
        assert_eq!(fx, vec![Effect::Redraw]);
        let (s, fx) = handle_event(&s, InputEvent::PointerUp(egui::pos2(300.0, 200.0)), &sc);

        assert!(s.is_idle());
        let Effect::Create { rect } = fx[0] else {
            panic!("expected Create, got {:?}", fx);
        };
        assert!((rect.x1 - 0.10).abs() < EPS);
        assert!((rect.y1 - 0.20).abs() < EPS);
        assert!((rect.x2 - 0.30).abs() < EPS);
        assert!((rect.y2 - 0.40).abs() < EPS);
    }

    #[test]
    fn test_draw_reverse_and_past_edge() {
        let t = transform();
        let anns: Vec<Annotation> = Vec::new();
        let sc = scene(&t, &anns);
        let s = InteractionState::new(ToolMode::Draw);

        let (s, _) = handle_event(&s, InputEvent::PointerDown(egui::pos2(900.0, 400.0)), &sc);
        let (_, fx) = handle_event(&s, InputEvent::PointerUp(egui::pos2(1200.0, 800.0)), &sc);
        let Effect::Create { rect } = fx[0] else {
            panic!("expected Create");
        };
        assert!((rect.x1 - 0.9).abs() < EPS && (rect.y1 - 0.8).abs() < EPS);
        assert_eq!((rect.x2, rect.y2), (1.0, 1.0));
    }

    #[test]
    fn test_draw_outside_image_ignored() {
        // Letterboxed: 1000x500 image in 1000x1000 panel, image y in 250..750
        let t = ViewTransform::fit(egui::vec2(1000.0, 500.0), egui::vec2(1000.0, 1000.0)).unwrap();
        let anns: Vec<Annotation> = Vec::new();
        let sc = scene(&t, &anns);
        let s = InteractionState::new(ToolMode::Draw);
        let (s2, fx) = handle_event(&s, InputEvent::PointerDown(egui::pos2(500.0, 100.0)), &sc);
        assert_eq!(s2, s);
        assert!(fx.is_empty());
    }

    #[test]
    fn test_click_without_drag_draws_nothing() {
        let t = transform();
        let anns: Vec<Annotation> = Vec::new();
        let sc = scene(&t, &anns);
        let s = InteractionState::new(ToolMode::Draw);
        let (s, _) = handle_event(&s, InputEvent::PointerDown(egui::pos2(10.0, 10.0)), &sc);
        let (s, fx) = handle_event(&s, InputEvent::PointerUp(egui::pos2(11.0, 10.0)), &sc);
        assert!(s.is_idle());
        assert!(!fx.iter().any(|e| matches!(e, Effect::Create { .. })));
    }

    #[test]
    fn test_drag_body_scenario() {
        let t = transform();
        let anns = vec![boxed(100.0, 100.0, 300.0, 200.0)];
        let sc = scene(&t, &anns);
        let s = InteractionState::new(ToolMode::Select);

        let (s, fx) = handle_event(&s, InputEvent::PointerDown(egui::pos2(200.0, 150.0)), &sc);
        assert!(matches!(s.gesture, Gesture::DraggingBody { target: 0, .. }));
        assert_eq!(s.selection, Some(0));
        assert!(fx.contains(&Effect::SelectionChanged(Some(0))));

        let (s, fx) = handle_event(&s, InputEvent::PointerMove(egui::pos2(250.0, 150.0)), &sc);
        let rect = moved_rect(&fx);
        assert!((rect.x1 - 0.15).abs() < EPS && (rect.x2 - 0.35).abs() < EPS);
        assert!((rect.y1 - 0.2).abs() < EPS && (rect.y2 - 0.4).abs() < EPS);

        let (s, fx) = handle_event(&s, InputEvent::PointerUp(egui::pos2(250.0, 150.0)), &sc);
        assert!(s.is_idle());
        assert_eq!(s.selection, Some(0));
        assert!(matches!(fx[0], Effect::Commit { target: 0, .. }));
    }

    #[test]
    fn test_drag_body_clamps_preserving_size() {
        let t = transform();
        let anns = vec![boxed(800.0, 100.0, 950.0, 200.0)];
        let sc = scene(&t, &anns);
        let s = InteractionState::new(ToolMode::Select);

        let (s, _) = handle_event(&s, InputEvent::PointerDown(egui::pos2(850.0, 150.0)), &sc);
        let (_, fx) = handle_event(&s, InputEvent::PointerMove(egui::pos2(1100.0, 150.0)), &sc);
        let rect = moved_rect(&fx);
        assert!((rect.x2 - 1.0).abs() < EPS);
        assert!((rect.width() - 0.15).abs() < EPS);
    }

    #[test]
    fn test_resize_bottom_right_to_image_edge() {
        let t = transform();
        let anns = vec![boxed(100.0, 100.0, 300.0, 200.0)];
        let sc = scene(&t, &anns);
        let s = InteractionState::new(ToolMode::Select);

        let (s, _) = handle_event(&s, InputEvent::PointerDown(egui::pos2(300.0, 200.0)), &sc);
        assert!(matches!(
            s.gesture,
            Gesture::Resizing { handle: Handle::BottomRight, .. }
        ));
        let (_, fx) = handle_event(&s, InputEvent::PointerMove(egui::pos2(1000.0, 500.0)), &sc);
        let px = moved_rect(&fx).to_pixel(t.image_size);
        assert_eq!(px.max, egui::pos2(1000.0, 500.0));

        // Past the edge still pins to it
        let (_, fx) = handle_event(&s, InputEvent::PointerMove(egui::pos2(1300.0, 900.0)), &sc);
        let px = moved_rect(&fx).to_pixel(t.image_size);
        assert_eq!(px.max, egui::pos2(1000.0, 500.0));
    }

    #[test]
    fn test_resize_edge_moves_one_side() {
        let t = transform();
        let anns = vec![boxed(100.0, 100.0, 300.0, 200.0)];
        let sc = scene(&t, &anns);
        let s = InteractionState::new(ToolMode::Select);

        let (s, _) = handle_event(&s, InputEvent::PointerDown(egui::pos2(200.0, 100.0)), &sc);
        assert!(matches!(s.gesture, Gesture::Resizing { handle: Handle::Top, .. }));
        let (_, fx) = handle_event(&s, InputEvent::PointerMove(egui::pos2(260.0, 50.0)), &sc);
        let rect = moved_rect(&fx);
        assert!((rect.y1 - 0.1).abs() < EPS);
        assert!((rect.x1 - 0.1).abs() < EPS && (rect.x2 - 0.3).abs() < EPS);
        assert!((rect.y2 - 0.4).abs() < EPS);
    }

    #[test]
    fn test_resize_inversion_remaps_handle() {
        let t = transform();
        let anns = vec![boxed(100.0, 100.0, 300.0, 200.0)];
        let sc = scene(&t, &anns);
        let s = InteractionState::new(ToolMode::Select);

        let (s, _) = handle_event(&s, InputEvent::PointerDown(egui::pos2(301.0, 150.0)), &sc);
        let (s, fx) = handle_event(&s, InputEvent::PointerMove(egui::pos2(50.0, 150.0)), &sc);
        assert!(matches!(s.gesture, Gesture::Resizing { handle: Handle::Left, .. }));
        let rect = moved_rect(&fx);
        assert!((rect.x1 - 0.05).abs() < EPS && (rect.x2 - 0.1).abs() < EPS);
    }

    #[test]
    fn test_select_miss_clears_selection() {
        let t = transform();
        let anns = vec![boxed(100.0, 100.0, 300.0, 200.0)];
        let sc = scene(&t, &anns);
        let s = InteractionState {
            selection: Some(0),
            ..InteractionState::new(ToolMode::Select)
        };
        let (s, fx) = handle_event(&s, InputEvent::PointerDown(egui::pos2(600.0, 400.0)), &sc);
        assert_eq!(s.selection, None);
        assert!(s.is_idle());
        assert_eq!(fx[0], Effect::SelectionChanged(None));
    }

    #[test]
    fn test_delete_requires_selection_and_select_tool() {
        let t = transform();
        let anns = vec![boxed(100.0, 100.0, 300.0, 200.0)];
        let sc = scene(&t, &anns);

        let s = InteractionState::new(ToolMode::Select);
        let (_, fx) = handle_event(&s, InputEvent::Delete, &sc);
        assert!(fx.is_empty());

        let s = InteractionState {
            selection: Some(0),
            ..InteractionState::new(ToolMode::Draw)
        };
        let (_, fx) = handle_event(&s, InputEvent::Delete, &sc);
        assert!(fx.is_empty());

        let s = InteractionState {
            selection: Some(0),
            ..InteractionState::new(ToolMode::Select)
        };
        let (_, fx) = handle_event(&s, InputEvent::Delete, &sc);
        assert_eq!(fx, vec![Effect::Delete { target: 0 }]);
    }

    #[test]
    fn test_set_tool_resets_and_reverts() {
        let t = transform();
        let anns = vec![boxed(100.0, 100.0, 300.0, 200.0)];
        let sc = scene(&t, &anns);
        let s = InteractionState::new(ToolMode::Select);
        let (s, _) = handle_event(&s, InputEvent::PointerDown(egui::pos2(200.0, 150.0)), &sc);

        let (s, fx) = s.set_tool(ToolMode::Draw);
        assert_eq!(s, InteractionState::new(ToolMode::Draw));
        assert_eq!(
            fx[0],
            Effect::Revert {
                target: 0,
                original: anns[0].rect
            }
        );
        assert!(fx.contains(&Effect::SelectionChanged(None)));
    }

    #[test]
    fn test_tool_none_ignores_pointer() {
        let t = transform();
        let anns = vec![boxed(100.0, 100.0, 300.0, 200.0)];
        let sc = scene(&t, &anns);
        let s = InteractionState::new(ToolMode::None);
        let (s2, fx) = handle_event(&s, InputEvent::PointerDown(egui::pos2(200.0, 150.0)), &sc);
        assert_eq!(s2, s);
        assert!(fx.is_empty());
    }

    #[test]
    fn test_lost_target_resets() {
        let t = transform();
        let anns: Vec<Annotation> = Vec::new();
        let sc = scene(&t, &anns);
        let s = InteractionState {
            tool: ToolMode::Select,
            gesture: Gesture::DraggingBody {
                target: 3,
                last: egui::pos2(0.0, 0.0),
                original: NormRect::new(0.0, 0.0, 0.1, 0.1),
            },
            selection: Some(3),
        };
        let (s, _) = handle_event(&s, InputEvent::PointerMove(egui::pos2(5.0, 5.0)), &sc);
        assert!(s.is_idle());
        assert_eq!(s.selection, None);
    }
}
