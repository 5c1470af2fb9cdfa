//! Image discovery and decoding for the viewer.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use eframe::egui;
use log::{debug, info};

/// Extensions the viewer opens (case-insensitive).
pub const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// Images directly inside `folder`, sorted by path.
pub fn list_images(folder: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(folder).with_context(|| format!("Failed to read folder {}", folder.display()))?;

    let mut images = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("Failed to list {}", folder.display()))?
            .path();
        if path.is_file() && is_image_file(&path) {
            images.push(path);
        }
    }
    images.sort();
    debug!("[media] {} images in {}", images.len(), folder.display());
    Ok(images)
}

/// Expand CLI paths: folders to their images, files kept if they are images.
pub fn collect_images(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for path in paths {
        if path.is_dir() {
            images.extend(list_images(path)?);
        } else if is_image_file(path) {
            images.push(path.clone());
        } else {
            info!("Skipping {} (not a png/jpg image)", path.display());
        }
    }
    Ok(images)
}

/// Decode an image file into an egui texture source.
pub fn load_image(path: &Path) -> Result<egui::ColorImage> {
    let img = image::open(path)
        .with_context(|| format!("Failed to decode {}", path.display()))?
        .to_rgba8();
    let size = [img.width() as usize, img.height() as usize];
    Ok(egui::ColorImage::from_rgba_unmultiplied(size, img.as_raw()))
}
