//! In-memory annotation tables.

use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use super::{AnnotationStore, StoreError, StoreResult, validate_rect};
use crate::entities::annotation::{Annotation, AnnotationId, ImageId};
use crate::entities::rect::NormRect;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRow {
    pub id: ImageId,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRow {
    pub id: AnnotationId,
    pub image_id: ImageId,
    pub class_id: u32,
    #[serde(flatten)]
    pub rect: NormRect,
}

impl AnnotationRow {
    fn to_annotation(&self) -> Annotation {
        Annotation {
            id: Some(self.id),
            image_id: Some(self.image_id),
            class_id: self.class_id,
            rect: self.rect,
        }
    }
}

/// Two tables with auto-increment ids. Rows keep insertion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryStore {
    images: Vec<ImageRow>,
    annotations: Vec<AnnotationRow>,
    next_image_id: i64,
    next_annotation_id: i64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            images: Vec::new(),
            annotations: Vec::new(),
            next_image_id: 1,
            next_annotation_id: 1,
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn annotation_count(&self) -> usize {
        self.annotations.len()
    }

    fn image_exists(&self, id: ImageId) -> bool {
        self.images.iter().any(|row| row.id == id)
    }

    fn row_mut(&mut self, id: AnnotationId) -> StoreResult<&mut AnnotationRow> {
        self.annotations
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or(StoreError::AnnotationNotFound(id))
    }

    /// Re-derive id counters after loading rows from disk.
    pub(crate) fn repair_counters(&mut self) {
        let max_image = self.images.iter().map(|r| r.id.0).max().unwrap_or(0);
        let max_ann = self.annotations.iter().map(|r| r.id.0).max().unwrap_or(0);
        self.next_image_id = self.next_image_id.max(max_image + 1);
        self.next_annotation_id = self.next_annotation_id.max(max_ann + 1);
    }
}

impl AnnotationStore for MemoryStore {
    fn find_image(&self, path: &Path) -> StoreResult<Option<ImageId>> {
        Ok(self.images.iter().find(|row| row.path.as_path() == path).map(|row| row.id))
    }

    fn get_or_create_image(&mut self, path: &Path) -> StoreResult<ImageId> {
        if let Some(id) = self.find_image(path)? {
            return Ok(id);
        }
        let id = ImageId(self.next_image_id);
        self.next_image_id += 1;
        self.images.push(ImageRow {
            id,
            path: path.to_path_buf(),
        });
        debug!("[store] new image {} {}", id, path.display());
        Ok(id)
    }

    fn create_annotation(
        &mut self,
        image_id: ImageId,
        class_id: u32,
        rect: &NormRect,
    ) -> StoreResult<AnnotationId> {
        validate_rect(rect)?;
        if !self.image_exists(image_id) {
            return Err(StoreError::ImageNotFound(image_id));
        }
        let id = AnnotationId(self.next_annotation_id);
        self.next_annotation_id += 1;
        self.annotations.push(AnnotationRow {
            id,
            image_id,
            class_id,
            rect: *rect,
        });
        Ok(id)
    }

    fn update_annotation(&mut self, id: AnnotationId, class_id: u32, rect: &NormRect) -> StoreResult<()> {
        validate_rect(rect)?;
        let row = self.row_mut(id)?;
        row.class_id = class_id;
        row.rect = *rect;
        Ok(())
    }

    fn delete_annotation(&mut self, id: AnnotationId) -> StoreResult<()> {
        let before = self.annotations.len();
        self.annotations.retain(|row| row.id != id);
        if self.annotations.len() == before {
            return Err(StoreError::AnnotationNotFound(id));
        }
        Ok(())
    }

    fn annotations_for_image(&self, image_id: ImageId) -> StoreResult<Vec<Annotation>> {
        Ok(self
            .annotations
            .iter()
            .filter(|row| row.image_id == image_id)
            .map(AnnotationRow::to_annotation)
            .collect())
    }
}
