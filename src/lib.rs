//! Media library data layer.
//!
//! Categorized file assets with metadata and translations. Files are
//! classified by name on every save, images are turned upright from their
//! EXIF orientation, and replaced files are removed from storage.

pub mod config;
pub mod error;
pub mod import;
pub mod media;
pub mod state;

pub use config::LibraryConfig;
pub use error::{MediaError, Result};
pub use media::filetype::{FileType, FileTypeRegistry, Matcher};
pub use media::storage::{FileStorage, FileSystemStorage};
pub use state::category::Category;
pub use state::extensions::MediaFileExtension;
pub use state::library::Library;
pub use state::media_file::{MediaFile, SaveReport};
pub use state::translation::MediaFileTranslation;
