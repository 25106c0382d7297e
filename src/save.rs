//! Persisting grid images with their metadata

use crate::error::Result;
use chrono::Local;
use image::DynamicImage;
use log::info;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Metadata that travels with a saved image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaveMeta {
    pub prefix: String,
    pub info: String,
    pub extension: String,
    pub prompt: String,
    pub seed: i64,
    pub grid: bool,
}

/// Save collaborator used for grids.
pub trait ImageSaver {
    fn save(&mut self, image: &DynamicImage, out_dir: &Path, meta: &SaveMeta) -> Result<PathBuf>;
}

/// Writes `NNNNN-prefix-seed.ext` files with a `.txt` infotext sidecar and
/// a `.json` sidecar describing the save.
#[derive(Debug, Clone)]
pub struct DiskSaver {
    pub write_txt: bool,
    pub write_json: bool,
}

impl Default for DiskSaver {
    fn default() -> Self {
        Self { write_txt: true, write_json: true }
    }
}

#[derive(Serialize)]
struct Sidecar<'a> {
    #[serde(flatten)]
    meta: &'a SaveMeta,
    file: String,
    width: u32,
    height: u32,
    saved_at: String,
}

impl DiskSaver {
    pub fn new() -> Self {
        Self::default()
    }

    /// One past the highest numeric file name prefix in `dir`.
    pub fn next_sequence_number(dir: &Path) -> Result<u32> {
        let mut next = 0;
        if !dir.exists() {
            return Ok(next);
        }
        for entry in fs::read_dir(dir)? {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            let number = name.split(['-', '.']).next().and_then(|n| n.parse::<u32>().ok());
            if let Some(n) = number {
                next = next.max(n + 1);
            }
        }
        Ok(next)
    }
}

impl ImageSaver for DiskSaver {
    fn save(&mut self, image: &DynamicImage, out_dir: &Path, meta: &SaveMeta) -> Result<PathBuf> {
        fs::create_dir_all(out_dir)?;
        let number = Self::next_sequence_number(out_dir)?;
        let extension = meta.extension.trim_start_matches('.');
        let path = out_dir.join(format!("{:05}-{}-{}.{}", number, meta.prefix, meta.seed, extension));

        image.save(&path)?;
        if self.write_txt && !meta.info.is_empty() {
            fs::write(path.with_extension("txt"), &meta.info)?;
        }
        if self.write_json {
            let sidecar = Sidecar {
                meta,
                file: path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
                width: image.width(),
                height: image.height(),
                saved_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            };
            let json = serde_json::to_string_pretty(&sidecar)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
            fs::write(path.with_extension("json"), json)?;
        }

        info!("Saved {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use tempfile::TempDir;

    fn meta(prefix: &str) -> SaveMeta {
        SaveMeta {
            prefix: prefix.into(),
            info: "a cat\nSteps: 20, Seed: 7".into(),
            extension: "png".into(),
            prompt: "a cat".into(),
            seed: 7,
            grid: true,
        }
    }

    #[test]
    fn test_disk_saver_writes_image_and_sidecars() {
        let dir = TempDir::new().unwrap();
        let image = DynamicImage::ImageRgb8(RgbImage::new(4, 3));
        let path = DiskSaver::new().save(&image, dir.path(), &meta("xyz_grid")).unwrap();

        assert_eq!(path.file_name().unwrap(), "00000-xyz_grid-7.png");
        assert_eq!(image::open(&path).unwrap().width(), 4);
        let info = fs::read_to_string(path.with_extension("txt")).unwrap();
        assert!(info.starts_with("a cat"));
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path.with_extension("json")).unwrap()).unwrap();
        assert_eq!(json["prefix"], "xyz_grid");
        assert_eq!(json["seed"], 7);
        assert_eq!(json["height"], 3);
    }

    #[test]
    fn test_sequence_numbers_increase() {
        let dir = TempDir::new().unwrap();
        let image = DynamicImage::ImageRgb8(RgbImage::new(2, 2));
        let mut saver = DiskSaver { write_txt: false, write_json: false };
        saver.save(&image, dir.path(), &meta("a")).unwrap();
        let second = saver.save(&image, dir.path(), &meta("b")).unwrap();
        assert_eq!(second.file_name().unwrap(), "00001-b-7.png");
        assert!(!second.with_extension("txt").exists());
    }

    #[test]
    fn test_missing_dir_starts_at_zero() {
        let dir = TempDir::new().unwrap();
        assert_eq!(DiskSaver::next_sequence_number(&dir.path().join("nope")).unwrap(), 0);
    }
}
