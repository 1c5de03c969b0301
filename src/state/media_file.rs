//! Media file records and the work done on every save

use chrono::{DateTime, Utc};
use std::fmt;
use std::io::{self, Read};
use tracing::{debug, error, info};

use super::category::Category;
use super::translation::{MediaFileTranslation, Translations};
use crate::config::DEFAULT_LANGUAGE;
use crate::error::{MediaError, Result};
use crate::media::filetype::{FileTypeRegistry, FALLBACK_NAME};
use crate::media::orientation::{self, Reorientation, Rotation};
use crate::media::storage::FileStorage;

/// Type key that triggers image processing
pub const IMAGE_TYPE: &str = "image";

pub const FILE_NAME_MAX_LENGTH: usize = 255;
pub const COPYRIGHT_MAX_LENGTH: usize = 200;

/// A stored asset with its inferred type, size, categories and captions
#[derive(Debug, Clone)]
pub struct MediaFile {
    /// Catalog ID, `None` until saved
    pub id: Option<i64>,
    /// Storage name of the file
    pub file: String,
    /// Type key, recomputed from `file` on every save
    pub file_type: String,
    pub created: Option<DateTime<Utc>>,
    pub copyright: String,
    /// Size in bytes, `None` when it could not be read
    pub file_size: Option<u64>,
    pub categories: Vec<Category>,
    pub translations: Translations<MediaFileTranslation>,
    /// Storage name as last persisted
    stored_file: Option<String>,
}

/// What a save did besides writing the record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveReport {
    /// Rotation baked into the stored image
    pub rotation: Option<Rotation>,
    /// The file claimed to be an image but did not decode
    pub demoted: bool,
    /// Superseded file removed from storage
    pub deleted: Option<String>,
}

impl MediaFile {
    /// Create an unsaved record for an already stored file
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            id: None,
            file: file.into(),
            file_type: String::new(),
            created: None,
            copyright: String::new(),
            file_size: None,
            categories: Vec::new(),
            translations: Translations::new(),
            stored_file: None,
        }
    }

    /// Rebuild a record read from the catalog
    pub(crate) fn from_stored(
        id: i64,
        file: String,
        file_type: String,
        created: Option<DateTime<Utc>>,
        copyright: String,
        file_size: Option<u64>,
    ) -> Self {
        Self {
            id: Some(id),
            stored_file: Some(file.clone()).filter(|f| !f.is_empty()),
            file,
            file_type,
            created,
            copyright,
            file_size,
            categories: Vec::new(),
            translations: Translations::new(),
        }
    }

    /// Storage name as last persisted, if any
    pub fn stored_file(&self) -> Option<&str> {
        self.stored_file.as_deref()
    }

    /// The file reference differs from what was last persisted
    pub fn file_replaced(&self) -> bool {
        self.stored_file
            .as_deref()
            .is_some_and(|stored| stored != self.file)
    }

    /// Last path segment of the file name
    pub fn basename(&self) -> &str {
        self.file.rsplit('/').next().unwrap_or(&self.file)
    }

    /// Caption of the best translation, or the file's base name
    pub fn display_name(&self, language: &str, default_language: &str) -> String {
        caption_or_basename(self.translations.resolve(language, default_language), self.basename())
    }

    pub fn absolute_url(&self, storage: &dyn FileStorage) -> String {
        storage.url(&self.file)
    }

    pub fn type_label<'a>(&self, filetypes: &'a FileTypeRegistry) -> Option<&'a str> {
        filetypes.label(&self.file_type)
    }

    pub fn validate(&self) -> Result<()> {
        if self.file.is_empty() {
            return Err(MediaError::Validation("a media file needs a file".to_string()));
        }
        if self.file.chars().count() > FILE_NAME_MAX_LENGTH {
            return Err(MediaError::Validation(format!(
                "file name is longer than {FILE_NAME_MAX_LENGTH} characters"
            )));
        }
        if self.copyright.chars().count() > COPYRIGHT_MAX_LENGTH {
            return Err(MediaError::Validation(format!(
                "copyright is longer than {COPYRIGHT_MAX_LENGTH} characters"
            )));
        }
        for translation in self.translations.iter() {
            translation.validate()?;
        }
        if let Some(category) = self.categories.iter().find(|c| c.id.is_none()) {
            return Err(MediaError::Validation(format!(
                "category {:?} must be saved first",
                category.title
            )));
        }
        Ok(())
    }

    /// Bring derived fields up to date before the record is written.
    ///
    /// Classifies the file, re-orients images and records the size. A
    /// superseded file is left in place; the library removes it once the
    /// record has been persisted. Only validation and storage write failures
    /// are errors.
    pub fn prepare_save(
        &mut self,
        storage: &dyn FileStorage,
        filetypes: &FileTypeRegistry,
    ) -> Result<SaveReport> {
        self.validate()?;
        let mut report = SaveReport::default();

        if self.id.is_none() && self.created.is_none() {
            self.created = Some(Utc::now());
        }

        self.file_type = filetypes.determine(&self.file).to_string();

        if self.file_type == IMAGE_TYPE {
            match self.reorient_image(storage)? {
                ImageCheck::Rotated(rotation) => report.rotation = Some(rotation),
                ImageCheck::Upright => {}
                ImageCheck::NotAnImage => {
                    self.file_type = filetypes.determine(FALLBACK_NAME).to_string();
                    report.demoted = true;
                }
            }
        }

        // measured after re-orientation, which rewrites the file
        self.file_size = match storage.size(&self.file) {
            Ok(size) => Some(size),
            Err(e) => {
                error!(file = %self, error = %e, "Unable to read file size");
                None
            }
        };

        Ok(report)
    }

    /// Delete the previously stored file when the reference has changed.
    ///
    /// Must only run after the new state is persisted; the remembered name
    /// is updated by `mark_saved`, so the old file is deleted exactly once.
    pub(crate) fn remove_superseded(&self, storage: &dyn FileStorage) -> Result<Option<String>> {
        let Some(stored) = self.stored_file.as_deref().filter(|_| self.file_replaced()) else {
            return Ok(None);
        };
        storage.delete(stored)?;
        info!(old = %stored, new = %self.file, "Removed superseded file");
        Ok(Some(stored.to_string()))
    }

    /// Apply the EXIF rotation to an image file
    fn reorient_image(&self, storage: &dyn FileStorage) -> Result<ImageCheck> {
        let bytes = match read_stored(storage, &self.file) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(file = %self.file, error = %e, "Cannot open image");
                return Ok(ImageCheck::NotAnImage);
            }
        };

        match orientation::reorient(&bytes)? {
            Reorientation::NotAnImage => {
                debug!(file = %self.file, "Not a decodable image");
                Ok(ImageCheck::NotAnImage)
            }
            Reorientation::Upright => Ok(ImageCheck::Upright),
            Reorientation::Rotated { rotation, bytes } => {
                storage.overwrite(&self.file, &bytes)?;
                info!(
                    file = %self.file,
                    degrees = rotation.degrees(),
                    "Rotated image from EXIF orientation"
                );
                Ok(ImageCheck::Rotated(rotation))
            }
        }
    }

    /// Record that the current state has been persisted
    pub(crate) fn mark_saved(&mut self) {
        self.stored_file = Some(self.file.clone()).filter(|f| !f.is_empty());
        self.translations.purge_cache();
    }
}

enum ImageCheck {
    NotAnImage,
    Upright,
    Rotated(Rotation),
}

/// Read a stored file through its handle, falling back to its local path
fn read_stored(storage: &dyn FileStorage, name: &str) -> io::Result<Vec<u8>> {
    let by_handle = storage.open(name).and_then(|mut reader| {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Ok(bytes)
    });
    match by_handle {
        Ok(bytes) => Ok(bytes),
        Err(e) => match storage.path(name) {
            Some(path) => std::fs::read(path),
            None => Err(e),
        },
    }
}

fn caption_or_basename(translation: Option<&MediaFileTranslation>, basename: &str) -> String {
    match translation {
        Some(t) if !t.caption.trim().is_empty() => t.caption.clone(),
        _ => basename.to_string(),
    }
}

impl fmt::Display for MediaFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let translation = self.translations.resolve(DEFAULT_LANGUAGE, DEFAULT_LANGUAGE);
        f.write_str(&caption_or_basename(translation, self.basename()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::orientation::tests::split_jpeg;
    use crate::media::storage::FileSystemStorage;

    fn storage() -> (tempfile::TempDir, FileSystemStorage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileSystemStorage::new(dir.path(), "/media/");
        (dir, storage)
    }

    #[test]
    fn test_type_is_rederived_every_save() {
        let (_dir, storage) = storage();
        let registry = FileTypeRegistry::with_defaults();
        let name = storage.save("report.pdf", b"%PDF-1.4").unwrap();

        let mut file = MediaFile::new(name);
        file.file_type = "video".to_string();
        file.prepare_save(&storage, &registry).unwrap();
        assert_eq!(file.file_type, "pdf");
        assert_eq!(file.file_size, Some(8));
        assert!(file.created.is_some());
        assert_eq!(file.type_label(&registry), Some("PDF document"));
    }

    #[test]
    fn test_fake_image_is_demoted() {
        let (_dir, storage) = storage();
        let registry = FileTypeRegistry::with_defaults();
        let name = storage.save("picture.jpg", b"this is not a jpeg").unwrap();

        let mut file = MediaFile::new(name);
        let report = file.prepare_save(&storage, &registry).unwrap();
        assert_eq!(file.file_type, "other");
        assert!(report.demoted);
        assert_eq!(report.rotation, None);
    }

    #[test]
    fn test_missing_file_keeps_size_empty() {
        let (_dir, storage) = storage();
        let registry = FileTypeRegistry::with_defaults();

        let mut file = MediaFile::new("gone/notes.txt");
        file.file_size = Some(99);
        file.prepare_save(&storage, &registry).unwrap();
        assert_eq!(file.file_type, "txt");
        assert_eq!(file.file_size, None);
    }

    #[test]
    fn test_rotation_rewrites_file() {
        let (_dir, storage) = storage();
        let registry = FileTypeRegistry::with_defaults();
        let name = storage.save("portrait.jpg", &split_jpeg(Some(6))).unwrap();

        let mut file = MediaFile::new(name.clone());
        let report = file.prepare_save(&storage, &registry).unwrap();
        assert_eq!(report.rotation, Some(Rotation::Ccw270));
        assert_eq!(file.file_type, "image");
        assert_eq!(file.file_size, Some(storage.size(&name).unwrap()));

        let rotated = image::open(storage.path(&name).unwrap()).unwrap();
        assert_eq!((rotated.width(), rotated.height()), (8, 16));
    }

    #[test]
    fn test_replaced_file_is_deleted_once() {
        let (_dir, storage) = storage();
        let registry = FileTypeRegistry::with_defaults();
        let old = storage.save("old.txt", b"old").unwrap();
        let new = storage.save("new.txt", b"new").unwrap();

        let created = Some(Utc::now());
        let mut file =
            MediaFile::from_stored(1, old.clone(), "txt".into(), created, String::new(), None);
        file.file = new.clone();
        assert!(file.file_replaced());

        // preparing never touches the stored file
        file.prepare_save(&storage, &registry).unwrap();
        assert!(storage.exists(&old));

        assert_eq!(file.remove_superseded(&storage).unwrap(), Some(old.clone()));
        assert!(!storage.exists(&old));
        file.mark_saved();

        assert!(!file.file_replaced());
        file.prepare_save(&storage, &registry).unwrap();
        assert_eq!(file.remove_superseded(&storage).unwrap(), None);
        assert!(storage.exists(&new));
    }

    #[test]
    fn test_unsaved_category_fails_validation() {
        let mut file = MediaFile::new("a.txt");
        file.categories.push(Category::new("Unsaved"));
        assert!(matches!(file.validate(), Err(MediaError::Validation(_))));

        file.categories[0].id = Some(4);
        assert!(file.validate().is_ok());
    }

    #[test]
    fn test_display_and_validation() {
        let mut file = MediaFile::new("medialibrary/2024/03/lake.jpg");
        assert_eq!(file.to_string(), "lake.jpg");
        assert_eq!(file.display_name("en", "en"), "lake.jpg");

        file.translations.attach(MediaFileTranslation::new("de", "Ein See"));
        assert_eq!(file.to_string(), "Ein See");
        assert_eq!(file.display_name("fr", "en"), "Ein See");

        // the default language wins over attachment order
        file.translations.attach(MediaFileTranslation::new("en", "A lake"));
        assert_eq!(file.to_string(), "A lake");
        assert_eq!(file.to_string(), file.display_name("fr", "en"));

        assert!(MediaFile::new("").validate().is_err());
        file.copyright = "c".repeat(COPYRIGHT_MAX_LENGTH + 1);
        assert!(file.validate().is_err());
    }
}
