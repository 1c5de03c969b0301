//! File-type classification by file name
//!
//! A registry is an ordered list of (key, label, matcher) rules. The first
//! rule whose matcher accepts the name wins; the last rule must accept
//! everything so every name gets a type.

use once_cell::sync::OnceCell;
use regex::{Regex, RegexBuilder};
use std::fmt;
use std::sync::Arc;

use crate::error::{MediaError, Result};

/// Longest type key the catalog column accepts
pub const MAX_KEY_LENGTH: usize = 12;

/// Name that matches no specific rule, used to demote a file to the catch-all type
pub const FALLBACK_NAME: &str = "***";

/// Predicate deciding whether a file name belongs to a type
pub enum Matcher {
    /// Case-insensitive regular expression searched anywhere in the name
    Pattern(Regex),
    /// Case-insensitive suffix (stored lowercase)
    Suffix(String),
    /// Accepts every name
    Any,
    /// Caller-supplied predicate
    Custom(Box<dyn Fn(&str) -> bool + Send + Sync>),
}

impl Matcher {
    /// Compile a case-insensitive pattern
    pub fn pattern(pattern: &str) -> Result<Self> {
        RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map(Matcher::Pattern)
            .map_err(|e| MediaError::Config(format!("invalid file type pattern {pattern:?}: {e}")))
    }

    pub fn suffix(suffix: &str) -> Self {
        Matcher::Suffix(suffix.to_lowercase())
    }

    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Matcher::Custom(Box::new(predicate))
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            Matcher::Pattern(regex) => regex.is_match(name),
            Matcher::Suffix(suffix) => name.to_lowercase().ends_with(suffix.as_str()),
            Matcher::Any => true,
            Matcher::Custom(predicate) => predicate(name),
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Pattern(regex) => f.debug_tuple("Pattern").field(&regex.as_str()).finish(),
            Matcher::Suffix(suffix) => f.debug_tuple("Suffix").field(suffix).finish(),
            Matcher::Any => f.write_str("Any"),
            Matcher::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// A single classification rule
#[derive(Debug)]
pub struct FileType {
    key: String,
    label: String,
    matcher: Matcher,
}

impl FileType {
    pub fn new(key: impl Into<String>, label: impl Into<String>, matcher: Matcher) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            matcher,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn matches(&self, name: &str) -> bool {
        self.matcher.matches(name)
    }

    fn is_catch_all(&self) -> bool {
        matches!(self.matcher, Matcher::Any)
    }
}

/// Ordered set of classification rules
#[derive(Debug)]
pub struct FileTypeRegistry {
    types: Vec<FileType>,
}

fn builtin(key: &str, label: &str, pattern: &str) -> FileType {
    let regex = RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .expect("built-in file type pattern should compile");
    FileType::new(key, label, Matcher::Pattern(regex))
}

impl Default for FileTypeRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl FileTypeRegistry {
    /// The built-in rules, ending with the `other` catch-all
    pub fn with_defaults() -> Self {
        let types = vec![
            builtin("image", "Image", r"\.(bmp|jpe?g|jp2|jxr|gif|png|tiff?)$"),
            builtin("video", "Video", r"\.(mov|m[14]v|mp4|avi|mpe?g|qt|ogv|wmv)$"),
            builtin("audio", "Audio", r"\.(au|mp3|m4a|wma|oga|ram|wav)$"),
            FileType::new("pdf", "PDF document", Matcher::suffix(".pdf")),
            FileType::new("swf", "Flash", Matcher::suffix(".swf")),
            FileType::new("txt", "Text", Matcher::suffix(".txt")),
            FileType::new("rtf", "Rich Text", Matcher::suffix(".rtf")),
            FileType::new("zip", "Zip archive", Matcher::suffix(".zip")),
            builtin("doc", "Microsoft Word", r"\.docx?$"),
            builtin("xls", "Microsoft Excel", r"\.xlsx?$"),
            builtin("ppt", "Microsoft PowerPoint", r"\.pptx?$"),
            FileType::new("other", "Binary", Matcher::Any),
        ];
        Self { types }
    }

    /// Build a registry from scratch. The last rule must be a catch-all.
    pub fn from_types(types: Vec<FileType>) -> Result<Self> {
        match types.last() {
            Some(last) if last.is_catch_all() => {}
            Some(last) => {
                return Err(MediaError::Config(format!(
                    "last file type {:?} must match every name",
                    last.key
                )))
            }
            None => return Err(MediaError::Config("file type registry is empty".to_string())),
        }
        validate_keys(&types)?;
        Ok(Self { types })
    }

    /// Prepend a group of rules, keeping the group's own order.
    ///
    /// Rules registered later take precedence over everything already present.
    pub fn register(&mut self, types: Vec<FileType>) -> Result<()> {
        validate_keys(&types)?;
        self.types.splice(0..0, types);
        Ok(())
    }

    /// Key of the first rule accepting `name`, or the catch-all key
    pub fn determine(&self, name: &str) -> &str {
        self.types
            .iter()
            .find(|t| t.matches(name))
            .map(|t| t.key())
            .unwrap_or_else(|| self.fallback_key())
    }

    /// Key of the last (catch-all) rule
    pub fn fallback_key(&self) -> &str {
        self.types.last().map(|t| t.key()).unwrap_or("other")
    }

    /// Display label for a key, first registration wins
    pub fn label(&self, key: &str) -> Option<&str> {
        self.types.iter().find(|t| t.key == key).map(|t| t.label())
    }

    /// Ordered (key, label) pairs
    pub fn choices(&self) -> Vec<(&str, &str)> {
        self.types.iter().map(|t| (t.key(), t.label())).collect()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

fn validate_keys(types: &[FileType]) -> Result<()> {
    for t in types {
        if t.key.is_empty() || t.key.chars().count() > MAX_KEY_LENGTH {
            return Err(MediaError::Config(format!(
                "file type key {:?} must be 1 to {} characters",
                t.key, MAX_KEY_LENGTH
            )));
        }
    }
    Ok(())
}

static GLOBAL: OnceCell<Arc<FileTypeRegistry>> = OnceCell::new();

/// Install the process-wide registry.
///
/// Must run before the first call to [`global`]; the registry is frozen
/// from then on.
pub fn configure(registry: FileTypeRegistry) -> Result<()> {
    GLOBAL
        .set(Arc::new(registry))
        .map_err(|_| MediaError::Config("file type registry is already installed".to_string()))
}

/// The process-wide registry, falling back to the built-in rules
pub fn global() -> Arc<FileTypeRegistry> {
    GLOBAL
        .get_or_init(|| Arc::new(FileTypeRegistry::with_defaults()))
        .clone()
}
