//! Annotation events for list/table views and status reporting.
//!
//! Emitted by [`Annotator`](crate::widgets::viewport::Annotator) through the
//! [`EventBus`](crate::core::event_bus::EventBus) after the working set
//! changes. Indices refer to the working set of the current image at the
//! time of emission.
//!
//! - [`AnnotationAddedEvent`]: new box drawn and saved.
//! - [`AnnotationChangedEvent`]: coordinates changed (live during drag/resize,
//!   and once more on rollback).
//! - [`AnnotationDeletedEvent`]: box removed from the working set (and the store, if saved).
//! - [`SelectionChangedEvent`]: selection moved to another box or cleared.
//! - [`PersistenceFailedEvent`]: a store call failed; shell shows the message.

use std::path::PathBuf;

use super::annotation::{Annotation, AnnotationId};

// === Working Set ===

#[derive(Clone, Debug)]
pub struct AnnotationAddedEvent {
    pub index: usize,
    pub annotation: Annotation,
}

#[derive(Clone, Debug)]
pub struct AnnotationChangedEvent {
    pub index: usize,
    pub annotation: Annotation,
}

#[derive(Clone, Debug)]
pub struct AnnotationDeletedEvent {
    pub index: usize,
    /// `None` for a box that never reached the store
    pub id: Option<AnnotationId>,
}

/// Emitted after `set_image`/`load_annotations` replaced the working set.
#[derive(Clone, Debug)]
pub struct AnnotationsReloadedEvent {
    pub image_path: Option<PathBuf>,
    pub count: usize,
}

// === Selection ===

#[derive(Clone, Debug)]
pub struct SelectionChangedEvent {
    pub index: Option<usize>,
    pub annotation: Option<Annotation>,
}

// === Errors ===

#[derive(Clone, Debug)]
pub struct PersistenceFailedEvent {
    pub message: String,
}
