/// State management module
///
/// This module handles all catalog state, including:
/// - Database connections and queries (library.rs)
/// - Categories and their two-level tree (category.rs)
/// - Media file records and the save cycle (media_file.rs)
/// - Translated captions and descriptions (translation.rs)
/// - Save hooks registered by extensions (extensions.rs)

pub mod category;
pub mod extensions;
pub mod library;
pub mod media_file;
pub mod translation;
