use std::fs;
use std::path::{Path, PathBuf};

use image::{DynamicImage, RgbImage};

use crate::error::{ImagesError, ImagesResult};
use crate::repository::ImageStore;

/// Filesystem layout configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory for generated artifacts
    pub image_dir: PathBuf,
    /// Directory for conditioning images
    pub control_image_dir: PathBuf,
}

impl StorageConfig {
    pub fn from_env() -> Self {
        let image_dir = std::env::var("IMAGE_DIR")
            .unwrap_or_else(|_| "data/generated_images".to_string())
            .into();
        let control_image_dir = std::env::var("CONTROL_IMAGE_DIR")
            .unwrap_or_else(|_| "data/control_images".to_string())
            .into();

        Self {
            image_dir,
            control_image_dir,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            image_dir: "data/generated_images".into(),
            control_image_dir: "data/control_images".into(),
        }
    }
}

/// Local-disk implementation of [`ImageStore`].
///
/// Both directories are created on construction. Filenames coming from the
/// outside are rejected when they would escape their directory.
pub struct LocalImageStore {
    image_dir: PathBuf,
    control_image_dir: PathBuf,
}

impl LocalImageStore {
    pub fn new(config: StorageConfig) -> ImagesResult<Self> {
        fs::create_dir_all(&config.image_dir)?;
        fs::create_dir_all(&config.control_image_dir)?;

        Ok(Self {
            image_dir: config.image_dir,
            control_image_dir: config.control_image_dir,
        })
    }

    fn resolve(&self, dir: &Path, filename: &str) -> ImagesResult<PathBuf> {
        if filename.is_empty()
            || filename.contains('/')
            || filename.contains('\\')
            || filename.contains("..")
        {
            return Err(ImagesError::Validation(format!(
                "invalid filename: {filename}"
            )));
        }
        Ok(dir.join(filename))
    }
}

impl ImageStore for LocalImageStore {
    fn save_image(&self, image: &RgbImage, image_filename: &str) -> ImagesResult<PathBuf> {
        let path = self.resolve(&self.image_dir, image_filename)?;
        image.save(&path)?;
        tracing::debug!(path = %path.display(), "Saved generated image");
        Ok(path)
    }

    fn load_control_image(&self, filename: &str) -> ImagesResult<DynamicImage> {
        let path = self.resolve(&self.control_image_dir, filename)?;
        if !path.exists() {
            return Err(ImagesError::ControlImageNotFound(filename.to_string()));
        }
        Ok(image::open(&path)?)
    }

    fn delete_image(&self, image_filename: &str) -> ImagesResult<bool> {
        let path = self.resolve(&self.image_dir, image_filename)?;
        if path.exists() {
            fs::remove_file(&path)?;
            return Ok(true);
        }
        Ok(false)
    }

    fn list_control_filenames(&self) -> ImagesResult<Vec<String>> {
        let mut filenames = Vec::new();
        for entry in fs::read_dir(&self.control_image_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                filenames.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        filenames.sort();
        Ok(filenames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn store() -> (tempfile::TempDir, LocalImageStore) {
        let tmp = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            image_dir: tmp.path().join("generated"),
            control_image_dir: tmp.path().join("control"),
        };
        let store = LocalImageStore::new(config).unwrap();
        (tmp, store)
    }

    fn white_image(width: u32, height: u32) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb([255, 255, 255]))
    }

    #[test]
    fn save_and_delete_roundtrip() {
        let (_tmp, store) = store();

        let path = store.save_image(&white_image(32, 32), "test_image.png").unwrap();
        assert!(path.exists());

        let reloaded = image::open(&path).unwrap();
        assert_eq!(reloaded.to_rgb8().dimensions(), (32, 32));

        assert!(store.delete_image("test_image.png").unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn delete_missing_image_returns_false() {
        let (_tmp, store) = store();
        assert!(!store.delete_image("absent.png").unwrap());
    }

    #[test]
    fn load_missing_control_image_is_an_error() {
        let (_tmp, store) = store();
        let err = store.load_control_image("absent.png").unwrap_err();
        assert!(matches!(err, ImagesError::ControlImageNotFound(_)));
    }

    #[test]
    fn lists_control_filenames_sorted() {
        let (tmp, store) = store();
        let control_dir = tmp.path().join("control");
        white_image(8, 8).save(control_dir.join("b.png")).unwrap();
        white_image(8, 8).save(control_dir.join("a.png")).unwrap();

        assert_eq!(store.list_control_filenames().unwrap(), vec!["a.png", "b.png"]);
    }

    #[test]
    fn rejects_path_traversal() {
        let (_tmp, store) = store();
        assert!(store.delete_image("../escape.png").is_err());
        assert!(store.load_control_image("nested/escape.png").is_err());
    }
}
