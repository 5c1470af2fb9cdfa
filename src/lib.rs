//! Annotator - bounding-box image annotation library
//!
//! Re-exports all modules for use by the binary target.

// Event plumbing
pub mod core;

// App modules
pub mod cli;
pub mod config;
pub mod entities;
pub mod media;
pub mod store;
pub mod widgets;

pub use core::event_bus::{BoxedEvent, EventBus, EventEmitter, downcast_event};
pub use entities::{Annotation, AnnotationId, GeometryError, ImageId, NormRect};
pub use store::{AnnotationStore, JsonStore, MemoryStore, StoreError};
pub use widgets::viewport::{Annotator, AnnotatorError, LoadedImage, ToolMode};
