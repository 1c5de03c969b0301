#![allow(dead_code)]

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use medialib::media::storage::{FileStorage, FileSystemStorage};
use std::cell::RefCell;
use std::io::{self, Cursor, Read};
use std::path::PathBuf;
use std::rc::Rc;

/// Filesystem storage that records every delete
pub struct RecordingStorage {
    inner: FileSystemStorage,
    pub deleted: Rc<RefCell<Vec<String>>>,
}

impl RecordingStorage {
    pub fn new(root: &std::path::Path) -> Self {
        Self {
            inner: FileSystemStorage::new(root, "/media/"),
            deleted: Rc::new(RefCell::new(Vec::new())),
        }
    }
}

impl FileStorage for RecordingStorage {
    fn open(&self, name: &str) -> io::Result<Box<dyn Read>> {
        self.inner.open(name)
    }

    fn path(&self, name: &str) -> Option<PathBuf> {
        self.inner.path(name)
    }

    fn save(&self, name: &str, content: &[u8]) -> io::Result<String> {
        self.inner.save(name, content)
    }

    fn overwrite(&self, name: &str, content: &[u8]) -> io::Result<()> {
        self.inner.overwrite(name, content)
    }

    fn delete(&self, name: &str) -> io::Result<()> {
        self.deleted.borrow_mut().push(name.to_string());
        self.inner.delete(name)
    }

    fn size(&self, name: &str) -> io::Result<u64> {
        self.inner.size(name)
    }

    fn exists(&self, name: &str) -> bool {
        self.inner.exists(name)
    }

    fn url(&self, name: &str) -> String {
        self.inner.url(name)
    }
}

/// Storage whose handles never open, forcing the by-path fallback
pub struct PathOnlyStorage(pub FileSystemStorage);

impl FileStorage for PathOnlyStorage {
    fn open(&self, _name: &str) -> io::Result<Box<dyn Read>> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "no handles here"))
    }

    fn path(&self, name: &str) -> Option<PathBuf> {
        self.0.path(name)
    }

    fn save(&self, name: &str, content: &[u8]) -> io::Result<String> {
        self.0.save(name, content)
    }

    fn overwrite(&self, name: &str, content: &[u8]) -> io::Result<()> {
        self.0.overwrite(name, content)
    }

    fn delete(&self, name: &str) -> io::Result<()> {
        self.0.delete(name)
    }

    fn size(&self, name: &str) -> io::Result<u64> {
        self.0.size(name)
    }

    fn exists(&self, name: &str) -> bool {
        self.0.exists(name)
    }

    fn url(&self, name: &str) -> String {
        self.0.url(name)
    }
}

fn exif_segment(orientation: u16) -> Vec<u8> {
    let mut tiff = vec![b'I', b'I', 42, 0, 8, 0, 0, 0];
    tiff.extend_from_slice(&1u16.to_le_bytes());
    tiff.extend_from_slice(&0x0112u16.to_le_bytes());
    tiff.extend_from_slice(&3u16.to_le_bytes());
    tiff.extend_from_slice(&1u32.to_le_bytes());
    tiff.extend_from_slice(&orientation.to_le_bytes());
    tiff.extend_from_slice(&[0, 0]);
    tiff.extend_from_slice(&0u32.to_le_bytes());

    let mut payload = b"Exif\0\0".to_vec();
    payload.extend(tiff);

    let mut segment = vec![0xFF, 0xE1];
    segment.extend(((payload.len() + 2) as u16).to_be_bytes());
    segment.extend(payload);
    segment
}

/// 20x10 JPEG, optionally tagged with an EXIF orientation
pub fn landscape_jpeg(orientation: Option<u16>) -> Vec<u8> {
    let image = RgbImage::from_fn(20, 10, |x, y| Rgb([(x * 12) as u8, (y * 25) as u8, 128]));
    let mut jpeg = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)
        .unwrap();

    match orientation {
        Some(orientation) => {
            let mut out = jpeg[..2].to_vec();
            out.extend(exif_segment(orientation));
            out.extend_from_slice(&jpeg[2..]);
            out
        }
        None => jpeg,
    }
}

/// Dimensions of a stored image
pub fn dimensions(storage: &dyn FileStorage, name: &str) -> (u32, u32) {
    let bytes = std::fs::read(storage.path(name).unwrap()).unwrap();
    let image = image::load_from_memory(&bytes).unwrap();
    (image.width(), image.height())
}
