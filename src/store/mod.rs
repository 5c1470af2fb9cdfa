//! Annotation persistence.
//!
//! The viewer talks to storage through [`AnnotationStore`]; two backends:
//! - [`MemoryStore`]: two in-memory tables, also the on-disk data model
//! - [`JsonStore`]: `MemoryStore` mirrored to a JSON file after every write
//!
//! Data model (relational, like the original SQLite layout):
//!
//! ```text
//! images      (id PK, path UNIQUE)
//! annotations (id PK, image_id FK -> images.id, class_id, x1, y1, x2, y2)
//! ```
//!
//! Image ids are assigned lazily: only `get_or_create_image` inserts, and the
//! viewer calls it on the first annotation write for that image.

mod json_store;
mod memory;

pub use json_store::JsonStore;
pub use memory::MemoryStore;

use std::path::Path;

use crate::entities::annotation::{Annotation, AnnotationId, ImageId};
use crate::entities::rect::NormRect;

/// Storage failures. Recoverable: the viewer reports them and keeps running.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    Io(String),
    Parse(String),
    AnnotationNotFound(AnnotationId),
    ImageNotFound(ImageId),
    /// Rect outside 0..1, inverted, or not finite
    InvalidRect(NormRect),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io(msg) => write!(f, "Store I/O error: {}", msg),
            StoreError::Parse(msg) => write!(f, "Store parse error: {}", msg),
            StoreError::AnnotationNotFound(id) => write!(f, "Annotation {} not found", id),
            StoreError::ImageNotFound(id) => write!(f, "Image {} not found", id),
            StoreError::InvalidRect(r) => write!(f, "Invalid rectangle {}", r),
        }
    }
}

impl std::error::Error for StoreError {}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence collaborator consumed by the viewer.
pub trait AnnotationStore {
    /// Lookup without insert.
    fn find_image(&self, path: &Path) -> StoreResult<Option<ImageId>>;

    /// Idempotent lookup-or-insert keyed by path.
    fn get_or_create_image(&mut self, path: &Path) -> StoreResult<ImageId>;

    fn create_annotation(
        &mut self,
        image_id: ImageId,
        class_id: u32,
        rect: &NormRect,
    ) -> StoreResult<AnnotationId>;

    fn update_annotation(&mut self, id: AnnotationId, class_id: u32, rect: &NormRect) -> StoreResult<()>;

    fn delete_annotation(&mut self, id: AnnotationId) -> StoreResult<()>;

    /// All annotations of an image in insertion order.
    fn annotations_for_image(&self, image_id: ImageId) -> StoreResult<Vec<Annotation>>;
}

/// Reject rects that would store NaN/Inf or break the min <= max invariant.
pub(crate) fn validate_rect(rect: &NormRect) -> StoreResult<()> {
    let coords = [rect.x1, rect.y1, rect.x2, rect.y2];
    let in_range = coords.iter().all(|c| c.is_finite() && (0.0..=1.0).contains(c));
    if in_range && rect.x1 <= rect.x2 && rect.y1 <= rect.y2 {
        Ok(())
    } else {
        Err(StoreError::InvalidRect(*rect))
    }
}
