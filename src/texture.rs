use std::path::Path;

use image::imageops::FilterType;
use image::RgbaImage;

use crate::error::RendererError;

/// How a texture is sampled once uploaded.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Sampling {
	/// Repeat on both axes, nearest magnification, nearest-mipmap-nearest minification.
	Pixelated,
	/// Clamp to edge, linear filtering, no mipmaps. Used for glyph atlases.
	Linear,
}

/// RGBA8 pixel data ready for upload, base level first.
#[derive(Debug, Clone)]
pub struct TextureImage {
	pub levels: Vec<RgbaImage>,
	pub sampling: Sampling,
	/// Channel count of the decoded source before conversion to RGBA.
	pub source_channels: u8,
}

impl TextureImage {
	pub fn single(image: RgbaImage, sampling: Sampling) -> Self {
		Self {
			levels: vec![image],
			sampling,
			source_channels: 4,
		}
	}

	/// Decodes an image file and builds its mip chain.
	pub fn load(path: &Path, flip_vertically: bool) -> Result<Self, RendererError> {
		let image = image::open(path).map_err(|source| RendererError::TextureDecode {
			path: path.to_path_buf(),
			source,
		})?;

		let source_channels = image.color().channel_count();
		let image = if flip_vertically { image.flipv() } else { image };
		let base = image.into_rgba8();

		Ok(Self {
			levels: generate_mipmaps(base),
			sampling: Sampling::Pixelated,
			source_channels,
		})
	}

	pub fn width(&self) -> u32 {
		self.levels[0].width()
	}

	pub fn height(&self) -> u32 {
		self.levels[0].height()
	}

	pub fn mip_level_count(&self) -> u32 {
		self.levels.len() as u32
	}
}

/// Halves the image until both sides reach one pixel.
pub fn generate_mipmaps(base: RgbaImage) -> Vec<RgbaImage> {
	let mut levels = vec![base];
	loop {
		let last = &levels[levels.len() - 1];
		let (width, height) = last.dimensions();
		if width <= 1 && height <= 1 {
			break;
		}
		let next = image::imageops::resize(last, (width / 2).max(1), (height / 2).max(1), FilterType::Nearest);
		levels.push(next);
	}
	levels
}
