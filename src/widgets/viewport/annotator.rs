//! Annotator: the image-viewing component's controller.
//!
//! Owns the working set (annotations of the displayed image), the
//! interaction state and the persistence collaborator. Input goes through
//! the pure state machine in [`interaction`](super::interaction); the
//! resulting effects are applied here, in order:
//!
//! - `Move` / `Revert` mutate the working set in memory only
//! - `Commit` / `Create` / `Delete` go to the store first, the working set
//!   follows only on success
//! - every visible change is announced on the event bus
//!
//! Store failures are returned to the caller and also published as
//! [`PersistenceFailedEvent`] so the shell can show them. A failed commit of
//! a drag/resize rolls the box back to where the gesture started.

use std::path::{Path, PathBuf};

use eframe::egui;
use log::{debug, error, info, warn};

use super::hit_test::{HandleMetrics, HitRegion, hit_test};
use super::interaction::{Effect, Gesture, InputEvent, InteractionState, Scene, handle_event};
use super::projection::{Projection, project};
use super::tool::ToolMode;
use super::viewport::{ViewTransform, ViewportState};
use crate::core::event_bus::EventEmitter;
use crate::entities::annotation::{Annotation, ImageId};
use crate::entities::annotation_events::{
    AnnotationAddedEvent, AnnotationChangedEvent, AnnotationDeletedEvent, AnnotationsReloadedEvent,
    PersistenceFailedEvent, SelectionChangedEvent,
};
use crate::entities::rect::{GeometryError, NormRect, check_image_size};
use crate::store::{AnnotationStore, StoreError};

/// Image currently shown: path (store key) and natural size in pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedImage {
    pub path: PathBuf,
    pub size: egui::Vec2,
}

impl LoadedImage {
    pub fn new(path: impl Into<PathBuf>, size: egui::Vec2) -> Self {
        Self {
            path: path.into(),
            size,
        }
    }
}

/// Asks the user for a class id after a box is drawn. `None` cancels.
pub trait ClassPrompt {
    fn request_class_id(&mut self, rect: &NormRect) -> Option<u32>;
}

impl<F> ClassPrompt for F
where
    F: FnMut(&NormRect) -> Option<u32>,
{
    fn request_class_id(&mut self, rect: &NormRect) -> Option<u32> {
        self(rect)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnnotatorError {
    Geometry(GeometryError),
    Store(StoreError),
    /// Operation needs an image but none is loaded
    NoImage,
}

impl std::fmt::Display for AnnotatorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnnotatorError::Geometry(e) => write!(f, "{}", e),
            AnnotatorError::Store(e) => write!(f, "{}", e),
            AnnotatorError::NoImage => write!(f, "No image loaded"),
        }
    }
}

impl std::error::Error for AnnotatorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AnnotatorError::Geometry(e) => Some(e),
            AnnotatorError::Store(e) => Some(e),
            AnnotatorError::NoImage => None,
        }
    }
}

impl From<GeometryError> for AnnotatorError {
    fn from(e: GeometryError) -> Self {
        AnnotatorError::Geometry(e)
    }
}

impl From<StoreError> for AnnotatorError {
    fn from(e: StoreError) -> Self {
        AnnotatorError::Store(e)
    }
}

/// Tunables, usually filled from `AppSettings`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnnotatorOptions {
    /// Handle sizes in widget pixels (constant on screen)
    pub handles: HandleMetrics,
    /// Minimum drawn box side, image pixels
    pub min_box_size: f32,
}

impl Default for AnnotatorOptions {
    fn default() -> Self {
        Self {
            handles: HandleMetrics::new(8.0, 4.0),
            min_box_size: 4.0,
        }
    }
}

pub struct Annotator {
    image: Option<LoadedImage>,
    /// Store id of the image; `None` until the first write or a lookup hit
    image_id: Option<ImageId>,
    annotations: Vec<Annotation>,
    state: InteractionState,
    viewport: ViewportState,
    store: Box<dyn AnnotationStore>,
    emitter: EventEmitter,
    options: AnnotatorOptions,
}

impl std::fmt::Debug for Annotator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Annotator")
            .field("image", &self.image)
            .field("image_id", &self.image_id)
            .field("annotations", &self.annotations.len())
            .field("state", &self.state)
            .field("viewport", &self.viewport)
            .finish()
    }
}

impl Annotator {
    pub fn new(store: Box<dyn AnnotationStore>, emitter: EventEmitter, options: AnnotatorOptions) -> Self {
        Self {
            image: None,
            image_id: None,
            annotations: Vec::new(),
            state: InteractionState::default(),
            viewport: ViewportState::new(),
            store,
            emitter,
            options,
        }
    }

    // === Accessors ===

    pub fn tool(&self) -> ToolMode {
        self.state.tool
    }

    pub fn selected(&self) -> Option<usize> {
        self.state.selection
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    pub fn image(&self) -> Option<&LoadedImage> {
        self.image.as_ref()
    }

    pub fn image_id(&self) -> Option<ImageId> {
        self.image_id
    }

    pub fn transform(&self) -> Option<ViewTransform> {
        self.viewport.transform()
    }

    // === Setup ===

    /// Switch tool. Always ends any gesture and clears the selection.
    pub fn set_tool(&mut self, tool: ToolMode) {
        debug!("[annotator] tool {:?} -> {:?}", self.state.tool, tool);
        let (next, effects) = self.state.set_tool(tool);
        self.state = next;
        for effect in effects {
            self.apply_local(effect);
        }
    }

    /// Show another image (or none). Clears working set, gesture and
    /// selection; call [`load_annotations`](Self::load_annotations) next.
    pub fn set_image(&mut self, image: Option<LoadedImage>) -> Result<(), AnnotatorError> {
        let had_selection = self.state.selection.is_some();
        self.state = self.state.reset();
        self.annotations.clear();
        self.image_id = None;
        if had_selection {
            self.emit_selection(None);
        }

        if let Some(img) = &image
            && let Err(e) = check_image_size(img.size)
        {
            warn!("Rejecting image {}: {}", img.path.display(), e);
            self.image = None;
            self.viewport.set_image_size(None);
            return Err(e.into());
        }

        self.viewport.set_image_size(image.as_ref().map(|img| img.size));
        if let Some(img) = &image {
            info!("Image {} ({}x{})", img.path.display(), img.size.x, img.size.y);
        }
        self.image = image;
        Ok(())
    }

    /// Replace the working set with the stored annotations of the current
    /// image. Unknown images load empty and get no image row.
    pub fn load_annotations(&mut self) -> Result<usize, AnnotatorError> {
        let Some(image) = &self.image else {
            return Err(AnnotatorError::NoImage);
        };
        let path = image.path.clone();

        let loaded = self.store.find_image(&path).and_then(|id| match id {
            Some(id) => self.store.annotations_for_image(id).map(|anns| (Some(id), anns)),
            None => Ok((None, Vec::new())),
        });
        let (image_id, annotations) = match loaded {
            Ok(v) => v,
            Err(e) => {
                self.annotations.clear();
                self.image_id = None;
                return Err(self.report(e.into()));
            }
        };

        self.state = self.state.reset();
        self.image_id = image_id;
        self.annotations = annotations;
        debug!(
            "[annotator] loaded {} annotations for {} ({:?})",
            self.annotations.len(),
            path.display(),
            image_id
        );
        self.emitter.emit(AnnotationsReloadedEvent {
            image_path: Some(path),
            count: self.annotations.len(),
        });
        Ok(self.annotations.len())
    }

    /// Viewport panel size in widget pixels (on window resize).
    pub fn set_widget_size(&mut self, size: egui::Vec2) {
        self.viewport.set_viewport_size(size);
    }

    // === Input ===

    /// Feed one input event through the state machine and apply its effects.
    ///
    /// Ignored while no image is shown or the panel has no area.
    pub fn handle_input(&mut self, event: InputEvent, prompt: &mut dyn ClassPrompt) -> Result<(), AnnotatorError> {
        let Some(transform) = self.viewport.transform() else {
            return Ok(());
        };

        let (next, effects) = {
            let scene = Scene {
                transform: &transform,
                annotations: &self.annotations,
                handles: self.options.handles.for_scale(transform.scale),
                min_box_size: self.options.min_box_size,
            };
            handle_event(&self.state, event, &scene)
        };
        self.state = next;

        for effect in effects {
            match effect {
                Effect::Create { rect } => self.create(rect, prompt)?,
                Effect::Commit { target, original } => self.commit(target, original)?,
                Effect::Delete { target } => self.delete(target)?,
                other => self.apply_local(other),
            }
        }
        Ok(())
    }

    /// Cursor for a hover position: handle cursors over the boxes in Select,
    /// crosshair in Draw.
    pub fn cursor_at(&self, widget_pos: egui::Pos2) -> egui::CursorIcon {
        match (self.state.tool, self.state.gesture) {
            (_, Gesture::Resizing { handle, .. }) => return handle.cursor(),
            (_, Gesture::DraggingBody { .. }) => return egui::CursorIcon::Grabbing,
            (ToolMode::Draw, _) => return egui::CursorIcon::Crosshair,
            (ToolMode::None, _) => return egui::CursorIcon::Default,
            _ => {}
        }

        let Some(transform) = self.viewport.transform() else {
            return egui::CursorIcon::Default;
        };
        let Some(image_pos) = transform.to_image(widget_pos) else {
            return egui::CursorIcon::Default;
        };
        let metrics = self.options.handles.for_scale(transform.scale);
        match hit_test(image_pos, &self.annotations, transform.image_size, &metrics).region {
            Some(HitRegion::Handle(h)) => h.cursor(),
            Some(HitRegion::Body) => egui::CursorIcon::Grab,
            None => egui::CursorIcon::Default,
        }
    }

    /// What to paint this frame; `None` without an image.
    pub fn projection(&self) -> Option<Projection> {
        let transform = self.viewport.transform()?;
        Some(project(&self.annotations, &self.state, &transform, &self.options.handles))
    }

    // === Effects ===

    /// Effects that never touch the store.
    fn apply_local(&mut self, effect: Effect) {
        match effect {
            Effect::Redraw => {}
            Effect::SelectionChanged(index) => self.emit_selection(index),
            Effect::Move { target, rect } | Effect::Revert { target, original: rect } => {
                self.set_rect(target, rect);
            }
            Effect::Create { .. } | Effect::Commit { .. } | Effect::Delete { .. } => {
                warn!("[annotator] store effect {:?} outside input handling, dropped", effect);
            }
        }
    }

    fn set_rect(&mut self, target: usize, rect: NormRect) {
        let Some(ann) = self.annotations.get_mut(target) else {
            warn!("[annotator] no annotation [{}] to update", target);
            return;
        };
        if ann.rect == rect {
            return;
        }
        ann.rect = rect;
        let annotation = ann.clone();
        self.emitter.emit(AnnotationChangedEvent {
            index: target,
            annotation,
        });
    }

    fn create(&mut self, rect: NormRect, prompt: &mut dyn ClassPrompt) -> Result<(), AnnotatorError> {
        let Some(class_id) = prompt.request_class_id(&rect) else {
            info!("Box {} cancelled", rect);
            return Ok(());
        };
        let Some(path) = self.image.as_ref().map(|img| img.path.clone()) else {
            return Err(AnnotatorError::NoImage);
        };

        let saved = self.ensure_image_id(&path).and_then(|image_id| {
            self.store
                .create_annotation(image_id, class_id, &rect)
                .map(|id| (image_id, id))
        });
        let (image_id, id) = match saved {
            Ok(v) => v,
            Err(e) => return Err(self.report(e.into())),
        };

        let annotation = Annotation {
            id: Some(id),
            image_id: Some(image_id),
            class_id,
            rect,
        };
        info!("Added {}", annotation.summary());
        self.annotations.push(annotation.clone());
        self.emitter.emit(AnnotationAddedEvent {
            index: self.annotations.len() - 1,
            annotation,
        });
        Ok(())
    }

    fn ensure_image_id(&mut self, path: &Path) -> Result<ImageId, StoreError> {
        if let Some(id) = self.image_id {
            return Ok(id);
        }
        let id = self.store.get_or_create_image(path)?;
        self.image_id = Some(id);
        Ok(id)
    }

    /// Persist the end of a drag/resize; roll back on failure.
    fn commit(&mut self, target: usize, original: NormRect) -> Result<(), AnnotatorError> {
        let Some(ann) = self.annotations.get(target) else {
            warn!("[annotator] commit target [{}] gone", target);
            return Ok(());
        };
        if ann.rect == original {
            debug!("[annotator] [{}] unchanged, no write", target);
            return Ok(());
        }
        let Some(id) = ann.id else {
            warn!("[annotator] [{}] has no store id, not saved", target);
            return Ok(());
        };

        let (class_id, rect) = (ann.class_id, ann.rect);
        match self.store.update_annotation(id, class_id, &rect) {
            Ok(()) => {
                debug!("[annotator] saved {} {}", id, rect);
                Ok(())
            }
            Err(e) => {
                warn!("Rolling back {} to {}", id, original);
                self.set_rect(target, original);
                Err(self.report(e.into()))
            }
        }
    }

    fn delete(&mut self, target: usize) -> Result<(), AnnotatorError> {
        let Some(ann) = self.annotations.get(target) else {
            warn!("[annotator] delete target [{}] gone", target);
            return Ok(());
        };

        if let Some(id) = ann.id
            && let Err(e) = self.store.delete_annotation(id)
        {
            return Err(self.report(e.into()));
        }

        let removed = self.annotations.remove(target);
        info!("Deleted {}", removed.summary());
        self.state.selection = None;
        self.emitter.emit(AnnotationDeletedEvent {
            index: target,
            id: removed.id,
        });
        self.emit_selection(None);
        Ok(())
    }

    fn emit_selection(&self, index: Option<usize>) {
        let annotation = index.and_then(|i| self.annotations.get(i)).cloned();
        self.emitter.emit(SelectionChangedEvent { index, annotation });
    }

    /// Log and publish a failure, handing the error back for `?`/return.
    fn report(&self, err: AnnotatorError) -> AnnotatorError {
        error!("Annotation store: {}", err);
        self.emitter.emit(PersistenceFailedEvent {
            message: err.to_string(),
        });
        err
    }
}
