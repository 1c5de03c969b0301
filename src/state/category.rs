//! Media categories
//!
//! Categories form a tree at most two levels deep: a category either has
//! no parent, or its parent is a root category.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

use crate::error::{MediaError, Result};

pub const TITLE_MAX_LENGTH: usize = 200;
pub const SLUG_MAX_LENGTH: usize = 150;

/// Separator between ancestor titles in [`Category::path`]
pub const PATH_SEPARATOR: &str = " - ";

static NON_SLUG_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s-]").expect("slug regex should compile"));
static SLUG_SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[-\s]+").expect("slug separator regex should compile"));

/// URL-friendly form of a title: ASCII word characters joined by hyphens.
pub fn slugify(value: &str) -> String {
    let ascii: String = value.chars().filter(char::is_ascii).collect();
    let cleaned = NON_SLUG_CHARS.replace_all(&ascii, "");
    let lowered = cleaned.trim().to_lowercase();
    SLUG_SEPARATORS.replace_all(&lowered, "-").to_string()
}

/// A category for organizing media files.
///
/// The parent is held by value, the way the catalog loads it (one join),
/// so path formatting never needs another lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    /// Catalog ID, `None` until saved
    pub id: Option<i64>,
    pub title: String,
    /// Filled from the title on first save when left empty
    pub slug: String,
    pub parent: Option<Box<Category>>,
}

impl Category {
    /// Create an unsaved root category
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            slug: String::new(),
            parent: None,
        }
    }

    /// Create an unsaved category below `parent`
    pub fn with_parent(title: impl Into<String>, parent: &Category) -> Self {
        Self {
            parent: Some(Box::new(parent.clone())),
            ..Self::new(title)
        }
    }

    pub fn parent_id(&self) -> Option<i64> {
        self.parent.as_ref().and_then(|p| p.id)
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Chain from the root ancestor down to this category
    pub fn path_list(&self) -> Vec<&Category> {
        match &self.parent {
            None => vec![self],
            Some(parent) => {
                let mut path = parent.path_list();
                path.push(self);
                path
            }
        }
    }

    /// Titles of [`Self::path_list`] joined with `" - "`
    pub fn path(&self) -> String {
        self.path_list()
            .iter()
            .map(|c| c.title.as_str())
            .collect::<Vec<_>>()
            .join(PATH_SEPARATOR)
    }

    /// Fill in a missing slug and check the field constraints
    pub fn prepare_save(&mut self) -> Result<()> {
        if self.slug.is_empty() {
            self.slug = slugify(&self.title);
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(MediaError::Validation("category title is required".to_string()));
        }
        if self.title.chars().count() > TITLE_MAX_LENGTH {
            return Err(MediaError::Validation(format!(
                "category title is longer than {TITLE_MAX_LENGTH} characters"
            )));
        }
        if self.slug.is_empty() {
            return Err(MediaError::Validation(format!(
                "category {:?} has no usable slug",
                self.title
            )));
        }
        if self.slug.chars().count() > SLUG_MAX_LENGTH {
            return Err(MediaError::Validation(format!(
                "category slug is longer than {SLUG_MAX_LENGTH} characters"
            )));
        }
        if let Some(parent) = &self.parent {
            if parent.parent.is_some() {
                return Err(MediaError::Validation(format!(
                    "{:?} cannot be a parent: categories are at most two levels deep",
                    parent.path()
                )));
            }
            if parent.id.is_none() {
                return Err(MediaError::Validation(format!(
                    "parent category {:?} must be saved first",
                    parent.title
                )));
            }
            if parent.id == self.id {
                return Err(MediaError::Validation(
                    "a category cannot be its own parent".to_string(),
                ));
            }
        }
        Ok(())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.parent {
            Some(parent) => write!(f, "{}{}{}", parent.title, PATH_SEPARATOR, self.title),
            None => f.write_str(&self.title),
        }
    }
}
