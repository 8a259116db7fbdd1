//! Optional package thumbnails.

use stowage_foundation::{Archive, Error, Result};

/// A small preview image stored at the tail of a package file.
///
/// Pixel encoding is opaque to this layer; editors decide what the bytes
/// mean. Width and height of zero with no pixels is valid.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Thumbnail {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Raw pixel bytes.
    pub pixels: Vec<u8>,
}

impl Thumbnail {
    /// Writes the thumbnail at the archive's current position.
    ///
    /// # Errors
    ///
    /// Propagates archive errors.
    pub fn write(&self, ar: &mut dyn Archive) -> Result<()> {
        let (mut width, mut height) = (self.width, self.height);
        ar.serialize_u32(&mut width)?;
        ar.serialize_u32(&mut height)?;
        let mut pixels = self.pixels.clone();
        ar.serialize_blob(&mut pixels)
    }

    /// Reads a thumbnail from the archive's current position.
    ///
    /// # Errors
    ///
    /// Returns `Corrupt` if the pixel count is inconsistent with the
    /// dimensions, and propagates archive errors.
    pub fn read(ar: &mut dyn Archive) -> Result<Self> {
        let (mut width, mut height) = (0u32, 0u32);
        ar.serialize_u32(&mut width)?;
        ar.serialize_u32(&mut height)?;
        let mut pixels = Vec::new();
        ar.serialize_blob(&mut pixels)?;
        if width == 0 && height == 0 && !pixels.is_empty() {
            return Err(Error::corrupt("thumbnail has pixels but no dimensions"));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }
}
