//! Viewport widget - image viewer with bounding-box annotation
//!
//! Layers, bottom up:
//! - `viewport`: fit-to-window transform (widget <-> image space)
//! - `hit_test`: box/handle picking in image space
//! - `interaction`: pure gesture state machine
//! - `projection`: what to paint, in widget space
//! - `annotator`: controller owning the working set and the store
//! - `viewport_ui`: egui input and painting

pub mod annotator;
pub mod interaction;
pub mod projection;
pub mod tool;
mod viewport;
mod viewport_ui;

pub use annotator::{Annotator, AnnotatorError, AnnotatorOptions, ClassPrompt, LoadedImage};
pub use hit_test::{Handle, HandleMetrics, Hit, HitRegion};
pub use interaction::{Effect, Gesture, InputEvent, InteractionState};
pub use projection::Projection;
pub use tool::ToolMode;
pub use viewport::{ViewTransform, ViewportState};
pub use viewport_ui::{class_color, paint, render};
