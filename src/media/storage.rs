//! Name-addressed blob storage for media files

use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};

static INVALID_NAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^-\w.]").expect("file name regex should compile"));

/// Storage backend holding the bytes behind a media file's name.
///
/// Names are relative, `/`-separated paths. Implementations decide where
/// the bytes actually live.
pub trait FileStorage {
    /// Open a stored file for reading
    fn open(&self, name: &str) -> io::Result<Box<dyn Read>>;

    /// Local filesystem path of a stored file, if the backend has one
    fn path(&self, name: &str) -> Option<PathBuf>;

    /// Store new content, returning the name actually used.
    ///
    /// Existing files are never clobbered; a free name is picked instead.
    fn save(&self, name: &str, content: &[u8]) -> io::Result<String>;

    /// Replace the content of an existing file in place
    fn overwrite(&self, name: &str, content: &[u8]) -> io::Result<()>;

    /// Remove a stored file. Removing a missing file is not an error.
    fn delete(&self, name: &str) -> io::Result<()>;

    /// Size in bytes
    fn size(&self, name: &str) -> io::Result<u64>;

    fn exists(&self, name: &str) -> bool;

    /// Public URL for a stored file
    fn url(&self, name: &str) -> String;
}

/// Turn an uploaded file name into something safe to store.
///
/// Keeps only the base name, replaces spaces with underscores and drops
/// everything that is not a word character, dot or hyphen.
pub fn valid_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let spaced = base.trim().replace(' ', "_");
    let cleaned = INVALID_NAME_CHARS.replace_all(&spaced, "").to_string();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "file".to_string()
    } else {
        cleaned
    }
}

/// Candidate names for `name`: itself, then `stem_1.ext`, `stem_2.ext`, ...
fn alternative_name(name: &str, attempt: usize) -> String {
    if attempt == 0 {
        return name.to_string();
    }
    let (dir, file) = match name.rfind('/') {
        Some(idx) => (&name[..=idx], &name[idx + 1..]),
        None => ("", name),
    };
    match file.rfind('.') {
        Some(dot) if dot > 0 => format!("{dir}{}_{attempt}{}", &file[..dot], &file[dot..]),
        _ => format!("{dir}{file}_{attempt}"),
    }
}

/// Storage rooted in a local directory
#[derive(Debug, Clone)]
pub struct FileSystemStorage {
    root: PathBuf,
    base_url: String,
}

impl FileSystemStorage {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a storage name onto the root, refusing anything that escapes it
    fn resolve(&self, name: &str) -> io::Result<PathBuf> {
        let relative = Path::new(name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if name.is_empty() || escapes {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid storage name: {name:?}"),
            ));
        }
        Ok(self.root.join(relative))
    }
}

impl FileStorage for FileSystemStorage {
    fn open(&self, name: &str) -> io::Result<Box<dyn Read>> {
        let file = File::open(self.resolve(name)?)?;
        Ok(Box::new(file))
    }

    fn path(&self, name: &str) -> Option<PathBuf> {
        self.resolve(name).ok()
    }

    fn save(&self, name: &str, content: &[u8]) -> io::Result<String> {
        let mut attempt = 0;
        loop {
            let candidate = alternative_name(name, attempt);
            let path = self.resolve(&candidate)?;
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(content)?;
                    return Ok(candidate);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(e),
            }
        }
    }

    fn overwrite(&self, name: &str, content: &[u8]) -> io::Result<()> {
        fs::write(self.resolve(name)?, content)
    }

    fn delete(&self, name: &str) -> io::Result<()> {
        match fs::remove_file(self.resolve(name)?) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    fn size(&self, name: &str) -> io::Result<u64> {
        Ok(fs::metadata(self.resolve(name)?)?.len())
    }

    fn exists(&self, name: &str) -> bool {
        self.resolve(name).map(|p| p.is_file()).unwrap_or(false)
    }

    fn url(&self, name: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), name.trim_start_matches('/'))
    }
}
