//! JSON-file annotation store.
//!
//! Holds a [`MemoryStore`] and rewrites the whole file after every successful
//! mutation (temp file + rename, so a crash mid-write keeps the old file).
//! A failed write rolls the in-memory tables back, keeping memory and disk
//! in agreement.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use super::{AnnotationStore, MemoryStore, StoreError, StoreResult};
use crate::entities::annotation::{Annotation, AnnotationId, ImageId};
use crate::entities::rect::NormRect;

#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    db: MemoryStore,
}

impl JsonStore {
    /// Open existing store file, or start empty if it doesn't exist yet.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let db = if path.exists() {
            let json = fs::read_to_string(&path)
                .map_err(|e| StoreError::Io(format!("Read {}: {}", path.display(), e)))?;
            let mut db: MemoryStore = serde_json::from_str(&json)
                .map_err(|e| StoreError::Parse(format!("{}: {}", path.display(), e)))?;
            db.repair_counters();
            info!(
                "Opened annotation store {} ({} images, {} annotations)",
                path.display(),
                db.image_count(),
                db.annotation_count()
            );
            db
        } else {
            info!("New annotation store {}", path.display());
            MemoryStore::new()
        };
        Ok(Self { path, db })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> StoreResult<()> {
        let json = serde_json::to_string_pretty(&self.db)
            .map_err(|e| StoreError::Parse(format!("Serialize store: {}", e)))?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .map_err(|e| StoreError::Io(format!("Create {}: {}", parent.display(), e)))?;
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| StoreError::Io(format!("Write {}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| StoreError::Io(format!("Rename to {}: {}", self.path.display(), e)))?;
        debug!("[store] flushed {}", self.path.display());
        Ok(())
    }

    /// Run a mutation; persist it or undo it.
    fn write<T>(&mut self, op: impl FnOnce(&mut MemoryStore) -> StoreResult<T>) -> StoreResult<T> {
        let snapshot = self.db.clone();
        let out = op(&mut self.db)?;
        if let Err(e) = self.flush() {
            self.db = snapshot;
            return Err(e);
        }
        Ok(out)
    }
}

impl AnnotationStore for JsonStore {
    fn find_image(&self, path: &Path) -> StoreResult<Option<ImageId>> {
        self.db.find_image(path)
    }

    fn get_or_create_image(&mut self, path: &Path) -> StoreResult<ImageId> {
        if let Some(id) = self.db.find_image(path)? {
            return Ok(id);
        }
        self.write(|db| db.get_or_create_image(path))
    }

    fn create_annotation(
        &mut self,
        image_id: ImageId,
        class_id: u32,
        rect: &NormRect,
    ) -> StoreResult<AnnotationId> {
        self.write(|db| db.create_annotation(image_id, class_id, rect))
    }

    fn update_annotation(&mut self, id: AnnotationId, class_id: u32, rect: &NormRect) -> StoreResult<()> {
        self.write(|db| db.update_annotation(id, class_id, rect))
    }

    fn delete_annotation(&mut self, id: AnnotationId) -> StoreResult<()> {
        self.write(|db| db.delete_annotation(id))
    }

    fn annotations_for_image(&self, image_id: ImageId) -> StoreResult<Vec<Annotation>> {
        self.db.annotations_for_image(image_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("annotator_test_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir.join("annotations.json")
    }

    #[test]
    fn test_persists_across_reopen() {
        let path = temp_store_path("reopen");
        let rect = NormRect::new(0.123_456_7, 0.2, 0.333_333_3, 0.4);

        let (img, id) = {
            let mut store = JsonStore::open(&path).unwrap();
            let img = store.get_or_create_image(Path::new("/data/a.jpg")).unwrap();
            let id = store.create_annotation(img, 4, &rect).unwrap();
            (img, id)
        };
        assert!(path.exists());

        let mut store = JsonStore::open(&path).unwrap();
        assert_eq!(store.find_image(Path::new("/data/a.jpg")).unwrap(), Some(img));
        let anns = store.annotations_for_image(img).unwrap();
        assert_eq!(anns.len(), 1);
        assert_eq!(anns[0].id, Some(id));
        // Full f32 precision survives the file
        assert_eq!(anns[0].rect, rect);

        // Counters continue after reopen
        let next = store.create_annotation(img, 1, &rect).unwrap();
        assert!(next.0 > id.0);

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_lookup_does_not_create_image() {
        let path = temp_store_path("lazy");
        let store = JsonStore::open(&path).unwrap();
        assert_eq!(store.find_image(Path::new("/data/a.jpg")).unwrap(), None);
        // Nothing was written
        assert!(!path.exists());
    }

    #[test]
    fn test_failed_op_leaves_file_untouched() {
        let path = temp_store_path("failed_op");
        let mut store = JsonStore::open(&path).unwrap();
        let img = store.get_or_create_image(Path::new("/data/a.jpg")).unwrap();
        let before = fs::read_to_string(&path).unwrap();

        assert!(store.delete_annotation(AnnotationId(99)).is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), before);
        assert!(store.annotations_for_image(img).unwrap().is_empty());

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_corrupt_file_is_parse_error() {
        let path = temp_store_path("corrupt");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(JsonStore::open(&path), Err(StoreError::Parse(_))));
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}
