// source.rs — frame sources feeding the projection core

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use image::io::Reader as ImageReader;
use image::RgbaImage;

use crate::builder::FrameInfo;
use crate::error::FrameError;
use crate::surface::TextureRef;

static NEXT_TEXTURE: AtomicU64 = AtomicU64::new(1);

impl TextureRef {
    /// Fresh handle, unique for the lifetime of the process.
    pub fn allocate() -> Self {
        TextureRef(NEXT_TEXTURE.fetch_add(1, Ordering::Relaxed))
    }
}

/// The current decoded frame, owned by whoever decodes it.
///
/// Pixels are tightly packed RGBA8 rows.
pub trait FrameSource {
    fn texture(&self) -> TextureRef;

    fn dimensions(&self) -> (u32, u32);

    /// Enough data decoded to show a frame. Polled once per tick.
    fn has_enough_data(&self) -> bool;

    /// Bumped whenever the pixels change.
    fn frame_index(&self) -> u64;

    fn pixels(&self) -> Result<&[u8], FrameError>;

    fn info(&self) -> FrameInfo {
        let (width, height) = self.dimensions();
        FrameInfo {
            texture: self.texture(),
            width,
            height,
        }
    }
}

/// A single decoded image shown as a never-changing frame.
#[derive(Debug, Clone)]
pub struct StillFrame {
    texture: TextureRef,
    image: RgbaImage,
    origin: Option<PathBuf>,
    permitted: bool,
}

impl StillFrame {
    pub fn from_image(image: RgbaImage) -> Self {
        Self {
            texture: TextureRef::allocate(),
            image,
            origin: None,
            permitted: true,
        }
    }

    /// Decode an image file, guessing the format from its contents.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path)?;
        let mut reader = ImageReader::new(BufReader::new(file)).with_guessed_format()?;
        reader.no_limits();
        let image = reader.decode()?.to_rgba8();

        log::info!(
            "loaded {} ({}x{})",
            path.display(),
            image.width(),
            image.height()
        );

        Ok(Self {
            origin: Some(path.to_path_buf()),
            ..Self::from_image(image)
        })
    }

    /// Refuse pixel access, as a frame from a foreign origin would.
    pub fn restricted(mut self) -> Self {
        self.permitted = false;
        self
    }
}

impl FrameSource for StillFrame {
    fn texture(&self) -> TextureRef {
        self.texture
    }

    fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    fn has_enough_data(&self) -> bool {
        self.image.width() > 0 && self.image.height() > 0
    }

    fn frame_index(&self) -> u64 {
        0
    }

    fn pixels(&self) -> Result<&[u8], FrameError> {
        if !self.permitted {
            let name = self
                .origin
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| format!("texture {}", self.texture.0));
            return Err(FrameError::NotPermitted(name));
        }

        let raw: &[u8] = self.image.as_raw();
        let expected = self.image.width() as usize * self.image.height() as usize * 4;
        if raw.len() != expected {
            return Err(FrameError::SizeMismatch {
                expected,
                actual: raw.len(),
            });
        }
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_unique() {
        let a = StillFrame::from_image(RgbaImage::new(2, 1));
        let b = StillFrame::from_image(RgbaImage::new(2, 1));
        assert_ne!(a.texture(), b.texture());
    }

    #[test]
    fn still_frame_reports_size_and_pixels() {
        let frame = StillFrame::from_image(RgbaImage::new(4, 2));
        assert_eq!(frame.dimensions(), (4, 2));
        assert!(frame.has_enough_data());
        assert_eq!(frame.pixels().map(|p| p.len()), Ok(32));
        assert_eq!(frame.info().width, 4);
    }

    #[test]
    fn empty_image_is_not_ready() {
        let frame = StillFrame::from_image(RgbaImage::new(0, 0));
        assert!(!frame.has_enough_data());
    }

    #[test]
    fn restricted_frame_refuses_pixels() {
        let frame = StillFrame::from_image(RgbaImage::new(2, 2)).restricted();
        assert!(matches!(frame.pixels(), Err(FrameError::NotPermitted(_))));
    }
}
