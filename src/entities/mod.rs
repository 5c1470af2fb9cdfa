//! Entities - annotation data types, free of UI state
//!
//! - `rect`: normalized boxes and pixel-space rectangle math
//! - `annotation`: one labelled box and its store ids
//! - `annotation_events`: what the viewport announces on the event bus

pub mod annotation;
pub mod annotation_events;
pub mod rect;

pub use annotation::{Annotation, AnnotationId, ImageId};
pub use rect::{GeometryError, NormRect};
