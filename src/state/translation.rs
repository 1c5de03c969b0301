//! Locale-keyed translations attached to a record

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

use crate::error::{MediaError, Result};

pub const CAPTION_MAX_LENGTH: usize = 200;
pub const LANGUAGE_CODE_MAX_LENGTH: usize = 10;

/// A record holding the translated fields for one language
pub trait Translation {
    fn language_code(&self) -> &str;
}

/// Translated caption and description of a media file
#[derive(Debug, Clone, PartialEq)]
pub struct MediaFileTranslation {
    pub language_code: String,
    pub caption: String,
    pub description: String,
}

impl MediaFileTranslation {
    pub fn new(language_code: impl Into<String>, caption: impl Into<String>) -> Self {
        Self {
            language_code: language_code.into(),
            caption: caption.into(),
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        let code_len = self.language_code.chars().count();
        if code_len == 0 || code_len > LANGUAGE_CODE_MAX_LENGTH {
            return Err(MediaError::Validation(format!(
                "invalid language code {:?}",
                self.language_code
            )));
        }
        if self.caption.trim().is_empty() {
            return Err(MediaError::Validation(format!(
                "caption is required ({})",
                self.language_code
            )));
        }
        if self.caption.chars().count() > CAPTION_MAX_LENGTH {
            return Err(MediaError::Validation(format!(
                "caption is longer than {CAPTION_MAX_LENGTH} characters"
            )));
        }
        Ok(())
    }
}

impl Translation for MediaFileTranslation {
    fn language_code(&self) -> &str {
        &self.language_code
    }
}

impl fmt::Display for MediaFileTranslation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.caption)
    }
}

/// "de-ch" and "de_CH" both belong to "de"
fn primary_language(code: &str) -> String {
    code.split(['-', '_']).next().unwrap_or(code).to_lowercase()
}

/// The translations of one record, at most one per language.
///
/// Lookups through [`Translations::resolve`] are memoized until the next
/// change or an explicit [`Translations::purge_cache`].
#[derive(Clone)]
pub struct Translations<T> {
    records: Vec<T>,
    cache: RefCell<HashMap<(String, String), Option<usize>>>,
}

impl<T> Default for Translations<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            cache: RefCell::new(HashMap::new()),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Translations<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.records).finish()
    }
}

impl<T: Translation> Translations<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a translation, replacing any existing one for the same language
    pub fn attach(&mut self, translation: T) {
        let code = translation.language_code().to_lowercase();
        self.records
            .retain(|t| t.language_code().to_lowercase() != code);
        self.records.push(translation);
        self.purge_cache();
    }

    /// Remove the translation for a language
    pub fn detach(&mut self, language_code: &str) -> Option<T> {
        let code = language_code.to_lowercase();
        let index = self
            .records
            .iter()
            .position(|t| t.language_code().to_lowercase() == code)?;
        self.purge_cache();
        Some(self.records.remove(index))
    }

    /// Exact-language lookup
    pub fn get(&self, language_code: &str) -> Option<&T> {
        let code = language_code.to_lowercase();
        self.records
            .iter()
            .find(|t| t.language_code().to_lowercase() == code)
    }

    /// Best translation for a language.
    ///
    /// Tries the exact code, then any translation sharing its primary
    /// language, then the default language, then whatever exists.
    pub fn resolve(&self, language_code: &str, default_language: &str) -> Option<&T> {
        let key = (language_code.to_lowercase(), default_language.to_lowercase());
        if let Some(index) = self.cache.borrow().get(&key) {
            return index.map(|i| &self.records[i]);
        }

        let index = self.lookup(&key.0, &key.1);
        self.cache.borrow_mut().insert(key, index);
        index.map(|i| &self.records[i])
    }

    fn lookup(&self, language: &str, default_language: &str) -> Option<usize> {
        let position = |code: &str| {
            self.records
                .iter()
                .position(|t| t.language_code().to_lowercase() == code)
        };
        let by_primary = |primary: &str| {
            self.records
                .iter()
                .position(|t| primary_language(t.language_code()) == primary)
        };

        position(language)
            .or_else(|| by_primary(&primary_language(language)))
            .or_else(|| position(default_language))
            .or_else(|| by_primary(&primary_language(default_language)))
            .or(if self.records.is_empty() { None } else { Some(0) })
    }

    pub fn purge_cache(&self) {
        self.cache.borrow_mut().clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.records.iter()
    }

    pub fn first(&self) -> Option<&T> {
        self.records.first()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[cfg(test)]
    fn cached_lookups(&self) -> usize {
        self.cache.borrow().len()
    }
}

impl<T: Translation> FromIterator<T> for Translations<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut translations = Self::new();
        for translation in iter {
            translations.attach(translation);
        }
        translations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Translations<MediaFileTranslation> {
        [
            MediaFileTranslation::new("en", "A lake"),
            MediaFileTranslation::new("de-CH", "Ein See").with_description("Zürichsee"),
            MediaFileTranslation::new("fr", "Un lac"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_resolution_order() {
        let translations = sample();
        assert_eq!(translations.resolve("fr", "en").unwrap().caption, "Un lac");
        assert_eq!(translations.resolve("FR", "en").unwrap().caption, "Un lac");
        // primary language match
        assert_eq!(translations.resolve("de", "en").unwrap().caption, "Ein See");
        assert_eq!(translations.resolve("de-at", "en").unwrap().caption, "Ein See");
        // default language
        assert_eq!(translations.resolve("it", "en").unwrap().caption, "A lake");
        // anything at all
        assert_eq!(translations.resolve("it", "es").unwrap().caption, "A lake");

        let empty: Translations<MediaFileTranslation> = Translations::new();
        assert!(empty.resolve("en", "en").is_none());
    }

    #[test]
    fn test_attach_replaces_same_language() {
        let mut translations = sample();
        translations.attach(MediaFileTranslation::new("EN", "The lake"));
        assert_eq!(translations.len(), 3);
        assert_eq!(translations.get("en").unwrap().caption, "The lake");
    }

    #[test]
    fn test_cache_is_purged_on_change() {
        let mut translations = sample();
        assert_eq!(translations.resolve("it", "en").unwrap().caption, "A lake");
        assert_eq!(translations.cached_lookups(), 1);

        translations.attach(MediaFileTranslation::new("it", "Un lago"));
        assert_eq!(translations.cached_lookups(), 0);
        assert_eq!(translations.resolve("it", "en").unwrap().caption, "Un lago");

        let removed = translations.detach("it").unwrap();
        assert_eq!(removed.caption, "Un lago");
        assert_eq!(translations.resolve("it", "en").unwrap().caption, "A lake");
        assert!(translations.detach("it").is_none());

        translations.purge_cache();
        assert_eq!(translations.cached_lookups(), 0);
    }

    #[test]
    fn test_validation() {
        assert!(MediaFileTranslation::new("en", "ok").validate().is_ok());
        assert!(MediaFileTranslation::new("", "ok").validate().is_err());
        assert!(MediaFileTranslation::new("en", "  ").validate().is_err());
        assert!(MediaFileTranslation::new("en", "c".repeat(201)).validate().is_err());
    }
}
