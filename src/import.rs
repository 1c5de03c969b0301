//! Bulk import of a directory tree into the library

use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::error::{MediaError, Result};
use crate::state::category::Category;
use crate::state::library::Library;
use crate::state::media_file::MediaFile;

/// Result of a folder import operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportResult {
    pub imported_count: usize,
    pub failed_count: usize,
}

/// Import every regular file below `folder`.
///
/// The tree is listed up front, so files the import itself writes (when
/// the media root lives inside `folder`) are not picked up again. A file
/// that fails to import is logged and counted, it does not stop the run.
pub fn import_folder(
    library: &Library,
    folder: &Path,
    category: Option<&Category>,
) -> Result<ImportResult> {
    if !folder.is_dir() {
        return Err(MediaError::NotFound(format!("folder {}", folder.display())));
    }

    info!(folder = %folder.display(), "Scanning folder");

    // Walk the directory tree recursively
    let paths: Vec<PathBuf> = WalkDir::new(folder)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();

    let mut result = ImportResult::default();
    for path in paths {
        match import_file(library, &path, category) {
            Ok(_) => {
                result.imported_count += 1;
                if result.imported_count % 100 == 0 {
                    info!("Imported {} files...", result.imported_count);
                }
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Error importing file");
                result.failed_count += 1;
            }
        }
    }

    info!(
        imported = result.imported_count,
        failed = result.failed_count,
        "Import complete"
    );
    Ok(result)
}

/// Upload and save a single file
pub fn import_file(
    library: &Library,
    path: &Path,
    category: Option<&Category>,
) -> Result<MediaFile> {
    let content = std::fs::read(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut file = library.upload(&name, &content)?;
    if let Some(category) = category {
        file.categories.push(category.clone());
    }
    library.save_media_file(&mut file)?;
    Ok(file)
}
