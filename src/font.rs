//! Glyph rasterization and atlas packing.

use std::path::Path;

use cgmath::Vector2;
use hashbrown::HashMap;
use image::{Rgba, RgbaImage};

use crate::error::RendererError;

/// Printable ASCII, space through tilde.
pub const FIRST_GLYPH: char = ' ';
pub const LAST_GLYPH: char = '~';

pub const ATLAS_PADDING: u32 = 2;
pub const MIN_ATLAS_SIZE: u32 = 64;

/// A single rendered glyph, coverage stored one byte per pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterGlyph {
	pub width: u32,
	pub height: u32,
	/// Offset from the pen position to the left edge of the bitmap.
	pub xmin: i32,
	/// Offset from the baseline to the bottom edge of the bitmap, up is positive.
	pub ymin: i32,
	pub advance: f32,
	pub coverage: Vec<u8>,
}

/// Anything that can render characters at a fixed pixel size.
pub trait GlyphSource {
	fn pixel_size(&self) -> f32;

	/// Returns `None` when the character cannot be rendered.
	fn rasterize(&self, ch: char) -> Option<RasterGlyph>;
}

/// A TrueType/OpenType font opened through fontdue.
pub struct TrueTypeFont {
	font: fontdue::Font,
	pixel_size: f32,
}

impl TrueTypeFont {
	pub fn open(path: &Path, pixel_size: f32) -> Result<Self, RendererError> {
		let bytes = std::fs::read(path).map_err(|err| RendererError::FontOpen {
			path: path.to_path_buf(),
			reason: err.to_string(),
		})?;
		Self::from_bytes(&bytes, pixel_size).map_err(|reason| RendererError::FontOpen {
			path: path.to_path_buf(),
			reason,
		})
	}

	pub fn from_bytes(bytes: &[u8], pixel_size: f32) -> Result<Self, String> {
		if !(pixel_size > 0.0) {
			return Err(format!("invalid pixel size {}", pixel_size));
		}
		let settings = fontdue::FontSettings {
			scale: pixel_size,
			..fontdue::FontSettings::default()
		};
		let font = fontdue::Font::from_bytes(bytes, settings).map_err(|err| err.to_string())?;
		Ok(Self { font, pixel_size })
	}
}

impl GlyphSource for TrueTypeFont {
	fn pixel_size(&self) -> f32 {
		self.pixel_size
	}

	fn rasterize(&self, ch: char) -> Option<RasterGlyph> {
		// Index 0 is the font's .notdef box.
		if self.font.lookup_glyph_index(ch) == 0 {
			return None;
		}
		let (metrics, coverage) = self.font.rasterize(ch, self.pixel_size);
		Some(RasterGlyph {
			width: metrics.width as u32,
			height: metrics.height as u32,
			xmin: metrics.xmin,
			ymin: metrics.ymin,
			advance: metrics.advance_width,
			coverage,
		})
	}
}

/// Placement and metrics of one glyph inside an atlas.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Glyph {
	pub uv0: Vector2<f32>,
	pub uv1: Vector2<f32>,
	pub size: Vector2<u32>,
	/// `x` from pen to left edge, `y` from baseline up to the top edge.
	pub bearing: Vector2<i32>,
	pub advance: f32,
}

pub type GlyphTable = HashMap<char, Glyph>;

/// A packed square coverage texture and the glyphs it holds.
#[derive(Debug, Clone)]
pub struct GlyphAtlas {
	pub size: u32,
	pub coverage: Vec<u8>,
	pub glyphs: GlyphTable,
}

impl GlyphAtlas {
	/// White pixels with the glyph coverage in alpha.
	pub fn to_rgba(&self) -> RgbaImage {
		RgbaImage::from_fn(self.size, self.size, |x, y| {
			Rgba([255, 255, 255, self.coverage[coverage_index(self.size, x, y)]])
		})
	}
}

/// Picks a square power-of-two side for `glyphs`, never smaller than [`MIN_ATLAS_SIZE`].
///
/// Candidate area is the padded width of every glyph laid on one line times the
/// tallest glyph.
pub fn estimate_atlas_size(glyphs: &[RasterGlyph], padding: u32) -> u32 {
	let total_width: u64 = glyphs.iter().map(|g| (g.width + padding) as u64).sum();
	let max_height = glyphs.iter().map(|g| g.height as u64).max().unwrap_or(0);

	let area = total_width * max_height;
	let side = (area as f64).sqrt().ceil() as u32;

	side.max(1).next_power_of_two().max(MIN_ATLAS_SIZE)
}

/// Renders the printable ASCII range of `source` into a packed atlas.
///
/// Glyphs the source cannot render are left out of the table. When the estimate
/// turns out too small for row packing the side doubles until everything fits.
pub fn build_atlas(source: &dyn GlyphSource, padding: u32) -> GlyphAtlas {
	let rendered: Vec<(char, RasterGlyph)> = (FIRST_GLYPH..=LAST_GLYPH)
		.filter_map(|ch| match source.rasterize(ch) {
			Some(glyph) => Some((ch, glyph)),
			None => {
				log::debug!("glyph {:?} could not be rasterized, skipping", ch);
				None
			}
		})
		.collect();

	let rasters: Vec<RasterGlyph> = rendered.iter().map(|(_, glyph)| glyph.clone()).collect();
	let mut size = estimate_atlas_size(&rasters, padding);

	let positions = loop {
		match pack_rows(&rasters, size, padding) {
			Some(positions) => break positions,
			None => {
				log::debug!("atlas of {0}x{0} is too small, doubling", size);
				size *= 2;
			}
		}
	};

	let mut coverage = vec![0u8; size as usize * size as usize];
	let mut glyphs = GlyphTable::with_capacity(rendered.len());
	let extent = size as f32;

	for ((ch, raster), (x, y)) in rendered.iter().zip(positions) {
		for row in 0..raster.height {
			let src = row as usize * raster.width as usize;
			let dst = coverage_index(size, x, y + row);
			coverage[dst..dst + raster.width as usize]
				.copy_from_slice(&raster.coverage[src..src + raster.width as usize]);
		}

		glyphs.insert(
			*ch,
			Glyph {
				uv0: Vector2::new(x as f32 / extent, y as f32 / extent),
				uv1: Vector2::new(
					(x + raster.width) as f32 / extent,
					(y + raster.height) as f32 / extent,
				),
				size: Vector2::new(raster.width, raster.height),
				bearing: Vector2::new(raster.xmin, raster.ymin + raster.height as i32),
				advance: raster.advance,
			},
		);
	}

	log::debug!("packed {} glyphs into a {}x{} atlas", glyphs.len(), size, size);

	GlyphAtlas {
		size,
		coverage,
		glyphs,
	}
}

/// Offset of pixel `(x, y)` in a square coverage buffer of side `size`.
fn coverage_index(size: u32, x: u32, y: u32) -> usize {
	y as usize * size as usize + x as usize
}

/// Left-to-right, top-to-bottom placement; `None` if the glyphs overflow `size`.
fn pack_rows(glyphs: &[RasterGlyph], size: u32, padding: u32) -> Option<Vec<(u32, u32)>> {
	let mut positions = Vec::with_capacity(glyphs.len());
	let (mut x, mut y) = (0u32, 0u32);
	let mut row_height = 0u32;

	for glyph in glyphs {
		if glyph.width > size {
			return None;
		}
		if x + glyph.width > size {
			x = 0;
			y += row_height + padding;
			row_height = 0;
		}
		if y + glyph.height > size {
			return None;
		}

		positions.push((x, y));
		x += glyph.width + padding;
		row_height = row_height.max(glyph.height);
	}

	Some(positions)
}

#[cfg(test)]
pub(crate) mod tests {
	use approx::assert_relative_eq;

	use super::*;

	/// Every glyph is a solid `width x height` block; listed characters are missing.
	pub struct BlockFont {
		pub width: u32,
		pub height: u32,
		pub missing: Vec<char>,
	}

	impl GlyphSource for BlockFont {
		fn pixel_size(&self) -> f32 {
			self.height as f32
		}

		fn rasterize(&self, ch: char) -> Option<RasterGlyph> {
			if self.missing.contains(&ch) {
				return None;
			}
			Some(RasterGlyph {
				width: self.width,
				height: self.height,
				xmin: 1,
				ymin: -2,
				advance: self.width as f32 + 1.0,
				coverage: vec![255; (self.width * self.height) as usize],
			})
		}
	}

	#[test]
	fn empty_glyphs_floor_at_minimum() {
		let blank = RasterGlyph {
			width: 0,
			height: 0,
			xmin: 0,
			ymin: 0,
			advance: 4.0,
			coverage: Vec::new(),
		};
		assert_eq!(estimate_atlas_size(&vec![blank; 95], ATLAS_PADDING), MIN_ATLAS_SIZE);
		assert_eq!(estimate_atlas_size(&[], ATLAS_PADDING), MIN_ATLAS_SIZE);
	}

	#[test]
	fn estimate_rounds_up_to_power_of_two() {
		let glyph = RasterGlyph {
			width: 10,
			height: 20,
			xmin: 0,
			ymin: 0,
			advance: 10.0,
			coverage: vec![0; 200],
		};
		// 95 * 12 wide, 20 high: area 22800, side 151 -> 256.
		assert_eq!(estimate_atlas_size(&vec![glyph; 95], ATLAS_PADDING), 256);
	}

	#[test]
	fn atlas_holds_every_printable_glyph() {
		let atlas = build_atlas(&BlockFont { width: 6, height: 9, missing: vec![] }, ATLAS_PADDING);
		assert_eq!(atlas.glyphs.len(), 95);
		assert!(atlas.size.is_power_of_two());
		assert_eq!(atlas.coverage.len(), (atlas.size * atlas.size) as usize);

		let a = atlas.glyphs[&'A'];
		assert_eq!(a.size, Vector2::new(6, 9));
		assert_eq!(a.bearing, Vector2::new(1, 7));
		assert_relative_eq!(a.advance, 7.0);
		assert_relative_eq!(a.uv1.x - a.uv0.x, 6.0 / atlas.size as f32);
		assert_relative_eq!(a.uv1.y - a.uv0.y, 9.0 / atlas.size as f32);
	}

	#[test]
	fn glyph_rectangles_do_not_overlap() {
		let atlas = build_atlas(&BlockFont { width: 7, height: 11, missing: vec![] }, ATLAS_PADDING);
		let lit = atlas.coverage.iter().filter(|&&c| c == 255).count();
		// Overlapping glyphs would light fewer pixels than they cover in total.
		assert_eq!(lit, 95 * 7 * 11);
	}

	#[test]
	fn rows_wrap_at_the_atlas_edge() {
		let atlas = build_atlas(&BlockFont { width: 30, height: 5, missing: vec![] }, ATLAS_PADDING);
		let first = atlas.glyphs[&' '];
		let rows: hashbrown::HashSet<u32> = atlas
			.glyphs
			.values()
			.map(|g| (g.uv0.y * atlas.size as f32).round() as u32)
			.collect();

		assert_relative_eq!(first.uv0.x, 0.0);
		assert_relative_eq!(first.uv0.y, 0.0);
		assert!(rows.len() > 1);
		assert!(atlas.glyphs.values().all(|g| g.uv1.x <= 1.0 && g.uv1.y <= 1.0));
	}

	#[test]
	fn oversized_glyphs_grow_the_atlas() {
		let atlas = build_atlas(&BlockFont { width: 100, height: 3, missing: vec![] }, ATLAS_PADDING);
		assert!(atlas.size >= 128);
		assert_eq!(atlas.glyphs.len(), 95);
	}

	#[test]
	fn unrenderable_glyphs_are_absent() {
		let atlas = build_atlas(
			&BlockFont { width: 4, height: 4, missing: vec!['B', '~'] },
			ATLAS_PADDING,
		);
		assert_eq!(atlas.glyphs.len(), 93);
		assert!(!atlas.glyphs.contains_key(&'B'));
		assert!(atlas.glyphs.contains_key(&'A'));
	}

	#[test]
	fn rgba_expansion_keeps_coverage_in_alpha() {
		let atlas = build_atlas(&BlockFont { width: 2, height: 2, missing: vec![] }, ATLAS_PADDING);
		let rgba = atlas.to_rgba();
		assert_eq!(rgba.get_pixel(0, 0), &Rgba([255, 255, 255, 255]));
		assert_eq!(rgba.get_pixel(atlas.size - 1, atlas.size - 1)[3], 0);
	}

	#[test]
	fn coverage_offsets_do_not_wrap_for_huge_atlases() {
		assert_eq!(coverage_index(70_000, 5, 70_000), 70_000 * 70_000 + 5);
		assert_eq!(coverage_index(64, 3, 2), 131);
	}

	fn dejavu(pixel_size: f32) -> TrueTypeFont {
		let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data/DejaVuSansMono.ttf");
		TrueTypeFont::open(&path, pixel_size).unwrap()
	}

	#[test]
	fn truetype_glyphs_copy_font_metrics() {
		let font = dejavu(24.0);
		let glyph = font.rasterize('g').unwrap();
		let metrics = font.font.metrics('g', 24.0);

		assert!(glyph.width > 0 && glyph.height > 0);
		assert_eq!(glyph.coverage.len(), (glyph.width * glyph.height) as usize);
		assert_eq!(glyph.width, metrics.width as u32);
		assert_eq!(glyph.xmin, metrics.xmin);
		// 'g' hangs below the baseline.
		assert!(glyph.ymin < 0);
		assert_eq!(glyph.ymin, metrics.ymin);
		assert_relative_eq!(glyph.advance, metrics.advance_width);
		assert_relative_eq!(font.pixel_size(), 24.0);
	}

	#[test]
	fn unmapped_codepoints_are_not_rasterized() {
		let font = dejavu(16.0);
		assert!(font.rasterize('\u{10FFFD}').is_none());
		assert!(font.rasterize(' ').is_some());
	}

	#[test]
	fn truetype_atlas_covers_printable_ascii() {
		let atlas = build_atlas(&dejavu(16.0), ATLAS_PADDING);
		assert_eq!(atlas.glyphs.len(), 95);
		assert!(atlas.coverage.iter().any(|&c| c > 0));

		let bar = atlas.glyphs[&'|'];
		assert!(bar.bearing.y > 0);
		assert!(bar.size.y > 0);
	}

	#[test]
	fn opening_a_missing_file_reports_the_path() {
		let err = TrueTypeFont::open(Path::new("no/such/font.ttf"), 16.0).err().unwrap();
		assert!(matches!(err, RendererError::FontOpen { .. }));
	}

	#[test]
	fn garbage_bytes_are_not_a_font() {
		assert!(TrueTypeFont::from_bytes(b"not a font at all", 16.0).is_err());
		assert!(TrueTypeFont::from_bytes(&[], 0.0).is_err());
	}
}
