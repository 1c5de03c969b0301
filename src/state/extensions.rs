//! Pluggable behaviour around media file saves

use std::fmt;
use tracing::debug;

use super::media_file::MediaFile;
use crate::error::Result;

/// Hook into the media file save cycle.
///
/// `before_save` runs ahead of classification and may change any field; an
/// error from it aborts the save before anything is written. `after_save`
/// runs once the record is committed, so its error reaches the caller with
/// the record (and any superseded-file removal) already done.
pub trait MediaFileExtension {
    /// Unique name; registering a second extension with the same name is a no-op
    fn name(&self) -> &str;

    fn before_save(&self, _file: &mut MediaFile) -> Result<()> {
        Ok(())
    }

    fn after_save(&self, _file: &MediaFile) -> Result<()> {
        Ok(())
    }
}

/// Extensions in registration order
#[derive(Default)]
pub struct ExtensionRegistry {
    extensions: Vec<Box<dyn MediaFileExtension>>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when an extension with that name is already registered
    pub fn register(&mut self, extension: Box<dyn MediaFileExtension>) -> bool {
        if self.contains(extension.name()) {
            debug!(extension = extension.name(), "extension already registered");
            return false;
        }
        debug!(extension = extension.name(), "registered media file extension");
        self.extensions.push(extension);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.extensions.iter().any(|e| e.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.extensions.iter().map(|e| e.name()).collect()
    }

    pub fn before_save(&self, file: &mut MediaFile) -> Result<()> {
        for extension in &self.extensions {
            extension.before_save(file)?;
        }
        Ok(())
    }

    pub fn after_save(&self, file: &MediaFile) -> Result<()> {
        for extension in &self.extensions {
            extension.after_save(file)?;
        }
        Ok(())
    }
}

impl fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionRegistry")
            .field("extensions", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MediaError;

    struct DefaultCopyright(&'static str);

    impl MediaFileExtension for DefaultCopyright {
        fn name(&self) -> &str {
            "default-copyright"
        }

        fn before_save(&self, file: &mut MediaFile) -> Result<()> {
            if file.copyright.is_empty() {
                file.copyright = self.0.to_string();
            }
            Ok(())
        }
    }

    struct RejectEverything;

    impl MediaFileExtension for RejectEverything {
        fn name(&self) -> &str {
            "reject"
        }

        fn before_save(&self, _file: &mut MediaFile) -> Result<()> {
            Err(MediaError::Validation("rejected".to_string()))
        }
    }

    #[test]
    fn test_duplicate_names_are_ignored() {
        let mut registry = ExtensionRegistry::new();
        assert!(registry.register(Box::new(DefaultCopyright("ACME"))));
        assert!(!registry.register(Box::new(DefaultCopyright("Other"))));
        assert_eq!(registry.names(), ["default-copyright"]);
    }

    #[test]
    fn test_hooks_run_in_order() {
        let mut registry = ExtensionRegistry::new();
        registry.register(Box::new(DefaultCopyright("ACME")));

        let mut file = MediaFile::new("a.txt");
        registry.before_save(&mut file).unwrap();
        assert_eq!(file.copyright, "ACME");

        registry.register(Box::new(RejectEverything));
        assert!(registry.before_save(&mut file).is_err());
        assert!(registry.after_save(&file).is_ok());
    }
}
