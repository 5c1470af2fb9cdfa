//! Annotation entity: one labelled box on one image.

use serde::{Deserialize, Serialize};

use super::rect::NormRect;

/// Store-assigned annotation identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationId(pub i64);

/// Store-assigned image identifier (assigned lazily on first annotation write).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(pub i64);

impl std::fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl std::fmt::Display for ImageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "img#{}", self.0)
    }
}

/// Bounding box annotation.
///
/// `id` and `image_id` stay `None` until the store accepts the first write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: Option<AnnotationId>,
    pub image_id: Option<ImageId>,
    pub class_id: u32,
    pub rect: NormRect,
}

impl Annotation {
    /// Transient annotation, not yet saved.
    pub fn new(class_id: u32, rect: NormRect) -> Self {
        Self {
            id: None,
            image_id: None,
            class_id,
            rect,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// One-line summary for logs and status text.
    pub fn summary(&self) -> String {
        let id = self
            .id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "unsaved".to_string());
        format!("{} class={} {}", id, self.class_id, self.rect)
    }
}
