//! EXIF-driven re-orientation of stored images
//!
//! Cameras record how the sensor was held in the EXIF orientation tag
//! instead of rotating pixels. On save we bake that rotation into the
//! pixels and drop the tag, so browsers that ignore EXIF still show the
//! image upright.

use image::{DynamicImage, ImageFormat, ImageReader};
use std::io::Cursor;

use crate::error::Result;

/// Counter-clockwise rotation needed to display an image upright
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    None,
    Ccw90,
    Ccw180,
    Ccw270,
}

impl Rotation {
    /// Map an EXIF orientation value to a rotation.
    ///
    /// Only the pure rotations are honoured; mirrored orientations and
    /// unknown values leave the pixels alone.
    pub fn from_orientation(orientation: Option<u32>) -> Self {
        match orientation {
            Some(3) => Rotation::Ccw180,
            Some(6) => Rotation::Ccw270,
            Some(8) => Rotation::Ccw90,
            _ => Rotation::None,
        }
    }

    pub fn degrees(self) -> u16 {
        match self {
            Rotation::None => 0,
            Rotation::Ccw90 => 90,
            Rotation::Ccw180 => 180,
            Rotation::Ccw270 => 270,
        }
    }

    pub fn apply(self, image: DynamicImage) -> DynamicImage {
        // image's rotate90/rotate270 turn clockwise
        match self {
            Rotation::None => image,
            Rotation::Ccw90 => image.rotate270(),
            Rotation::Ccw180 => image.rotate180(),
            Rotation::Ccw270 => image.rotate90(),
        }
    }
}

/// Read the primary orientation tag from an encoded image.
///
/// Missing, unreadable and malformed EXIF all read as `None`.
pub fn read_orientation(bytes: &[u8]) -> Option<u32> {
    let exif = exif::Reader::new()
        .read_from_container(&mut Cursor::new(bytes))
        .ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    field.value.get_uint(0)
}

/// Result of inspecting a stored file that claims to be an image
#[derive(Debug)]
pub enum Reorientation {
    /// The bytes do not decode as any supported image format
    NotAnImage,
    /// Decodes fine and needs no rotation
    Upright,
    /// Rotated pixels, re-encoded in the original format
    Rotated { rotation: Rotation, bytes: Vec<u8> },
}

/// Inspect an encoded image and rotate it according to its EXIF orientation.
///
/// Decoding problems are reported as [`Reorientation::NotAnImage`]; only a
/// failure to re-encode the rotated pixels is an error.
pub fn reorient(bytes: &[u8]) -> Result<Reorientation> {
    let reader = match ImageReader::new(Cursor::new(bytes)).with_guessed_format() {
        Ok(reader) => reader,
        Err(_) => return Ok(Reorientation::NotAnImage),
    };
    let Some(format) = reader.format() else {
        return Ok(Reorientation::NotAnImage);
    };
    if reader.into_dimensions().is_err() {
        return Ok(Reorientation::NotAnImage);
    }

    let rotation = Rotation::from_orientation(read_orientation(bytes));
    if rotation == Rotation::None {
        return Ok(Reorientation::Upright);
    }

    let image = match image::load_from_memory_with_format(bytes, format) {
        Ok(image) => image,
        Err(_) => return Ok(Reorientation::NotAnImage),
    };
    let rotated = rotation.apply(image);
    let rotated = if format == ImageFormat::Jpeg && rotated.color().has_alpha() {
        DynamicImage::ImageRgb8(rotated.to_rgb8())
    } else {
        rotated
    };

    let mut encoded = Vec::new();
    rotated.write_to(&mut Cursor::new(&mut encoded), format)?;

    Ok(Reorientation::Rotated {
        rotation,
        bytes: encoded,
    })
}
