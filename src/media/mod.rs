/// File handling module
///
/// This module handles:
/// - Classifying files by name (filetype.rs)
/// - Re-orienting images from their EXIF data (orientation.rs)
/// - Reading, writing and deleting stored files (storage.rs)

pub mod filetype;
pub mod orientation;
pub mod storage;
