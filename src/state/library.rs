use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::category::Category;
use super::extensions::{ExtensionRegistry, MediaFileExtension};
use super::media_file::{MediaFile, SaveReport};
use super::translation::MediaFileTranslation;
use crate::config::{upload_name, LibraryConfig};
use crate::error::{MediaError, Result};
use crate::media::filetype::{self, FileTypeRegistry};
use crate::media::storage::{valid_name, FileStorage, FileSystemStorage};

/// Columns of a category joined with its parent, see [`category_from_row`]
const CATEGORY_SELECT: &str = "SELECT c.id, c.title, c.slug, p.id, p.title, p.slug
     FROM categories c
     LEFT JOIN categories p ON p.id = c.parent_id";

/// Roots first, then by parent title and title
const CATEGORY_ORDER: &str = "ORDER BY p.id IS NOT NULL, p.title, c.title, c.id";

const MEDIA_FILE_SELECT: &str =
    "SELECT id, file, type, created, copyright, file_size FROM media_files";

/// The Library manages the SQLite catalog database.
/// It stores categories, media file records, their category links and
/// translations, and owns the storage holding the files themselves.
pub struct Library {
    conn: Connection,
    db_path: Option<PathBuf>,
    storage: Box<dyn FileStorage>,
    filetypes: Arc<FileTypeRegistry>,
    extensions: ExtensionRegistry,
    upload_to: String,
    default_language: String,
}

impl Library {
    /// Open (or create) the catalog and media root described by `config`.
    pub fn open(config: &LibraryConfig) -> Result<Self> {
        config.validate()?;

        // Ensure the parent directories exist
        if let Some(parent) = config.database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::create_dir_all(&config.media_root)?;

        let conn = Connection::open(&config.database_path)?;
        info!(path = %config.database_path.display(), "Catalog opened");

        let storage = FileSystemStorage::new(&config.media_root, config.media_url.clone());
        Self::with_connection(conn, Some(config.database_path.clone()), Box::new(storage), config)
    }

    /// Catalog in memory, files in `storage`. Used by tests and tools.
    pub fn open_in_memory(storage: impl FileStorage + 'static) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, None, Box::new(storage), &LibraryConfig::default())
    }

    fn with_connection(
        conn: Connection,
        db_path: Option<PathBuf>,
        storage: Box<dyn FileStorage>,
        config: &LibraryConfig,
    ) -> Result<Self> {
        let library = Library {
            conn,
            db_path,
            storage,
            filetypes: filetype::global(),
            extensions: ExtensionRegistry::new(),
            upload_to: config.upload_to.clone(),
            default_language: config.default_language.clone(),
        };
        library.init_schema()?;
        Ok(library)
    }

    /// Initialize the database schema.
    /// Creates all necessary tables and indexes if they don't exist.
    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS categories (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                title           TEXT NOT NULL,
                slug            TEXT NOT NULL,
                parent_id       INTEGER REFERENCES categories(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS media_files (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                file            TEXT NOT NULL,
                type            TEXT NOT NULL,
                created         INTEGER NOT NULL,
                copyright       TEXT NOT NULL DEFAULT '',
                file_size       INTEGER
            );

            CREATE TABLE IF NOT EXISTS media_file_categories (
                media_file_id   INTEGER NOT NULL REFERENCES media_files(id) ON DELETE CASCADE,
                category_id     INTEGER NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
                PRIMARY KEY (media_file_id, category_id)
            );

            CREATE TABLE IF NOT EXISTS media_file_translations (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                parent_id       INTEGER NOT NULL REFERENCES media_files(id) ON DELETE CASCADE,
                language_code   TEXT NOT NULL,
                caption         TEXT NOT NULL,
                description     TEXT NOT NULL DEFAULT '',
                UNIQUE (parent_id, language_code)
            );

            CREATE INDEX IF NOT EXISTS idx_categories_parent_id
                ON categories(parent_id);
            CREATE INDEX IF NOT EXISTS idx_media_files_created
                ON media_files(created DESC);
            CREATE INDEX IF NOT EXISTS idx_media_file_categories_category_id
                ON media_file_categories(category_id);",
        )?;

        debug!("Catalog schema initialized");
        Ok(())
    }

    /// Get the path to the database file (`None` for in-memory catalogs)
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    pub fn storage(&self) -> &dyn FileStorage {
        self.storage.as_ref()
    }

    pub fn filetypes(&self) -> &FileTypeRegistry {
        &self.filetypes
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    /// Classify with a registry other than the process-wide one
    pub fn with_filetypes(mut self, filetypes: Arc<FileTypeRegistry>) -> Self {
        self.filetypes = filetypes;
        self
    }

    /// Returns `false` if an extension with the same name was already registered
    pub fn register_extension(&mut self, extension: Box<dyn MediaFileExtension>) -> bool {
        self.extensions.register(extension)
    }

    pub fn extensions(&self) -> &ExtensionRegistry {
        &self.extensions
    }

    /// Swap the upload directory template and/or the storage backend
    pub fn reconfigure(
        &mut self,
        upload_to: Option<String>,
        storage: Option<Box<dyn FileStorage>>,
    ) -> Result<()> {
        if let Some(upload_to) = upload_to {
            let check = LibraryConfig {
                upload_to,
                ..LibraryConfig::default()
            };
            check.validate()?;
            self.upload_to = check.upload_to;
        }
        if let Some(storage) = storage {
            self.storage = storage;
        }
        Ok(())
    }

    // ========== Categories ==========

    /// Insert or update a category, deriving its slug on first save
    pub fn save_category(&self, category: &mut Category) -> Result<()> {
        category.prepare_save()?;

        if let Some(parent_id) = category.parent_id() {
            let grandparent: Option<Option<i64>> = self
                .conn
                .query_row(
                    "SELECT parent_id FROM categories WHERE id = ?1",
                    [parent_id],
                    |row| row.get(0),
                )
                .optional()?;
            match grandparent {
                None => return Err(MediaError::NotFound(format!("category {parent_id}"))),
                Some(Some(_)) => {
                    return Err(MediaError::Validation(format!(
                        "category {parent_id} already has a parent and cannot have children"
                    )))
                }
                Some(None) => {}
            }
            if let Some(id) = category.id {
                if self.has_children(id)? {
                    return Err(MediaError::Validation(format!(
                        "category {:?} has children and cannot be nested",
                        category.title
                    )));
                }
            }
        }

        match category.id {
            None => {
                self.conn.execute(
                    "INSERT INTO categories (title, slug, parent_id) VALUES (?1, ?2, ?3)",
                    params![category.title, category.slug, category.parent_id()],
                )?;
                category.id = Some(self.conn.last_insert_rowid());
            }
            Some(id) => {
                let changed = self.conn.execute(
                    "UPDATE categories SET title = ?1, slug = ?2, parent_id = ?3 WHERE id = ?4",
                    params![category.title, category.slug, category.parent_id(), id],
                )?;
                if changed == 0 {
                    return Err(MediaError::NotFound(format!("category {id}")));
                }
            }
        }

        debug!(category = %category, slug = %category.slug, "Saved category");
        Ok(())
    }

    fn has_children(&self, id: i64) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM categories WHERE parent_id = ?1",
            [id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Fetch a category with its parent
    pub fn category(&self, id: i64) -> Result<Category> {
        self.conn
            .query_row(
                &format!("{CATEGORY_SELECT} WHERE c.id = ?1"),
                [id],
                category_from_row,
            )
            .optional()?
            .ok_or_else(|| MediaError::NotFound(format!("category {id}")))
    }

    /// All categories, roots first, then by parent title and title
    pub fn categories(&self) -> Result<Vec<Category>> {
        self.query_categories(&format!("{CATEGORY_SELECT} {CATEGORY_ORDER}"), [])
    }

    /// Direct children of a category
    pub fn children(&self, id: i64) -> Result<Vec<Category>> {
        self.query_categories(
            &format!("{CATEGORY_SELECT} WHERE c.parent_id = ?1 {CATEGORY_ORDER}"),
            [id],
        )
    }

    fn query_categories<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<Category>> {
        let mut stmt = self.conn.prepare(sql)?;
        let category_iter = stmt.query_map(params, category_from_row)?;

        let mut categories = Vec::new();
        for category in category_iter {
            categories.push(category?);
        }
        Ok(categories)
    }

    /// Delete a category together with its children and their file links
    pub fn delete_category(&self, id: i64) -> Result<()> {
        let deleted = self.conn.execute("DELETE FROM categories WHERE id = ?1", [id])?;
        if deleted == 0 {
            return Err(MediaError::NotFound(format!("category {id}")));
        }
        Ok(())
    }

    // ========== Media files ==========

    /// Store uploaded bytes under the upload directory.
    /// Returns an unsaved record pointing at the stored file.
    pub fn upload(&self, original_name: &str, content: &[u8]) -> Result<MediaFile> {
        let name = upload_name(&self.upload_to, &valid_name(original_name), Utc::now())?;
        let stored = self.storage.save(&name, content)?;
        debug!(file = %stored, bytes = content.len(), "Stored upload");
        Ok(MediaFile::new(stored))
    }

    /// Run the save cycle for a media file and persist it.
    ///
    /// Extensions run first, then classification, re-orientation and size
    /// bookkeeping, then the record, its category links and translations are
    /// written in one transaction. A superseded file is removed from storage
    /// only once that transaction has committed.
    pub fn save_media_file(&self, file: &mut MediaFile) -> Result<SaveReport> {
        self.extensions.before_save(file)?;
        let mut report = file.prepare_save(self.storage.as_ref(), &self.filetypes)?;

        let created = file.created.unwrap_or_else(Utc::now).timestamp();
        let file_size = file.file_size.and_then(|size| i64::try_from(size).ok());

        let tx = self.conn.unchecked_transaction()?;
        let id = match file.id {
            None => {
                tx.execute(
                    "INSERT INTO media_files (file, type, created, copyright, file_size)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![file.file, file.file_type, created, file.copyright, file_size],
                )?;
                tx.last_insert_rowid()
            }
            Some(id) => {
                let changed = tx.execute(
                    "UPDATE media_files
                     SET file = ?1, type = ?2, created = ?3, copyright = ?4, file_size = ?5
                     WHERE id = ?6",
                    params![file.file, file.file_type, created, file.copyright, file_size, id],
                )?;
                if changed == 0 {
                    return Err(MediaError::NotFound(format!("media file {id}")));
                }
                id
            }
        };

        tx.execute("DELETE FROM media_file_categories WHERE media_file_id = ?1", [id])?;
        // validate() has already rejected unsaved categories
        for category_id in file.categories.iter().filter_map(|c| c.id) {
            tx.execute(
                "INSERT OR IGNORE INTO media_file_categories (media_file_id, category_id)
                 VALUES (?1, ?2)",
                params![id, category_id],
            )?;
        }

        tx.execute("DELETE FROM media_file_translations WHERE parent_id = ?1", [id])?;
        for translation in file.translations.iter() {
            tx.execute(
                "INSERT INTO media_file_translations
                     (parent_id, language_code, caption, description)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    id,
                    translation.language_code,
                    translation.caption,
                    translation.description
                ],
            )?;
        }
        tx.commit()?;

        file.id = Some(id);
        // on failure the old name is still remembered, so the next save retries
        report.deleted = file.remove_superseded(self.storage.as_ref())?;
        file.mark_saved();
        debug!(id, file = %file.file, file_type = %file.file_type, "Saved media file");

        self.extensions.after_save(file)?;
        Ok(report)
    }

    /// Fetch a media file with its categories and translations
    pub fn media_file(&self, id: i64) -> Result<MediaFile> {
        let file = self
            .conn
            .query_row(&format!("{MEDIA_FILE_SELECT} WHERE id = ?1"), [id], media_file_from_row)
            .optional()?
            .ok_or_else(|| MediaError::NotFound(format!("media file {id}")))?;
        self.load_relations(file)
    }

    /// All media files, newest first
    pub fn media_files(&self) -> Result<Vec<MediaFile>> {
        self.query_media_files(&format!("{MEDIA_FILE_SELECT} ORDER BY created DESC, id DESC"), [])
    }

    /// Media files linked to a category, newest first
    pub fn media_files_in_category(&self, category_id: i64) -> Result<Vec<MediaFile>> {
        self.query_media_files(
            &format!(
                "{MEDIA_FILE_SELECT}
                 WHERE id IN (
                     SELECT media_file_id FROM media_file_categories WHERE category_id = ?1
                 )
                 ORDER BY created DESC, id DESC"
            ),
            [category_id],
        )
    }

    fn query_media_files<P: rusqlite::Params>(
        &self,
        sql: &str,
        params: P,
    ) -> Result<Vec<MediaFile>> {
        let mut stmt = self.conn.prepare(sql)?;
        let file_iter = stmt.query_map(params, media_file_from_row)?;

        let mut files = Vec::new();
        for file in file_iter {
            files.push(self.load_relations(file?)?);
        }
        Ok(files)
    }

    fn load_relations(&self, mut file: MediaFile) -> Result<MediaFile> {
        let Some(id) = file.id else {
            return Ok(file);
        };

        file.categories = self.query_categories(
            &format!(
                "{CATEGORY_SELECT}
                 JOIN media_file_categories l ON l.category_id = c.id
                 WHERE l.media_file_id = ?1 {CATEGORY_ORDER}"
            ),
            [id],
        )?;

        let mut stmt = self.conn.prepare(
            "SELECT language_code, caption, description
             FROM media_file_translations WHERE parent_id = ?1 ORDER BY id",
        )?;
        let translation_iter = stmt.query_map([id], |row| {
            Ok(MediaFileTranslation {
                language_code: row.get(0)?,
                caption: row.get(1)?,
                description: row.get(2)?,
            })
        })?;
        for translation in translation_iter {
            file.translations.attach(translation?);
        }

        Ok(file)
    }

    /// Get a count of media files in the library
    pub fn media_file_count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM media_files", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Delete a media file record. The stored file is left in place.
    pub fn delete_media_file(&self, id: i64) -> Result<()> {
        let deleted = self.conn.execute("DELETE FROM media_files WHERE id = ?1", [id])?;
        if deleted == 0 {
            return Err(MediaError::NotFound(format!("media file {id}")));
        }
        Ok(())
    }
}

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<Category> {
    let parent_id: Option<i64> = row.get(3)?;
    let parent = match parent_id {
        Some(id) => Some(Box::new(Category {
            id: Some(id),
            title: row.get(4)?,
            slug: row.get(5)?,
            parent: None,
        })),
        None => None,
    };
    Ok(Category {
        id: Some(row.get(0)?),
        title: row.get(1)?,
        slug: row.get(2)?,
        parent,
    })
}

fn media_file_from_row(row: &Row<'_>) -> rusqlite::Result<MediaFile> {
    let created: i64 = row.get(3)?;
    let file_size: Option<i64> = row.get(5)?;
    Ok(MediaFile::from_stored(
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        DateTime::from_timestamp(created, 0),
        row.get(4)?,
        file_size.and_then(|size| u64::try_from(size).ok()),
    ))
}

// Implement Debug for better error messages
impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field("db_path", &self.db_path)
            .field("upload_to", &self.upload_to)
            .field("extensions", &self.extensions)
            .finish()
    }
}
