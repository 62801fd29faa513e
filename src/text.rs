//! Batched text drawing against a font's glyph atlas.

use std::path::Path;

use cgmath::Vector3;

use crate::backend::{Backend, TEXTURE_SLOTS};
use crate::font::{self, GlyphSource, GlyphTable, TrueTypeFont, ATLAS_PADDING};
use crate::handle::FontHandle;
use crate::mesh::{VertexLayout, TEXT_FLOATS_PER_VERTEX};
use crate::renderer::Renderer;
use crate::texture::{Sampling, TextureImage};

pub const PROJECTION_UNIFORM: &str = "u_Projection";

/// Floats per glyph quad.
pub const QUAD_FLOATS: usize = 6 * TEXT_FLOATS_PER_VERTEX;

/// Glyph used to measure the distance between two lines.
pub const LINE_REFERENCE_GLYPH: char = '|';

/// A rasterized font: glyph table, atlas texture and a reusable text mesh.
///
/// The atlas belongs to the font alone and never enters the texture pool.
pub struct VirtualFont<M, T> {
	pub glyphs: GlyphTable,
	pub pixel_size: f32,
	pub line_height: f32,
	pub atlas_size: u32,
	pub(crate) atlas: T,
	pub(crate) text_mesh: Option<M>,
}

/// Vertices accumulated between `batch_begin` and `batch_end`.
pub(crate) struct TextBatch {
	pub font: FontHandle,
	pub vertices: Vec<f32>,
}

pub fn line_height(glyphs: &GlyphTable, pixel_size: f32) -> f32 {
	glyphs
		.get(&LINE_REFERENCE_GLYPH)
		.map_or(pixel_size, |glyph| glyph.size.y as f32)
}

/// Appends six text vertices per drawable character of `text` to `out`.
///
/// `(x, y)` is the top-left of the first line in window pixels, y pointing down.
/// Characters missing from `glyphs` are skipped and do not move the cursor.
pub fn layout_text(
	glyphs: &GlyphTable,
	line_height: f32,
	text: &str,
	x: f32,
	y: f32,
	color: Vector3<f32>,
	out: &mut Vec<f32>,
) {
	let (mut cursor_x, mut cursor_y) = (x, y);

	for ch in text.chars() {
		if ch == '\n' {
			cursor_x = x;
			cursor_y += line_height;
			continue;
		}

		let glyph = match glyphs.get(&ch) {
			Some(glyph) => glyph,
			None => continue,
		};

		let x0 = cursor_x + glyph.bearing.x as f32;
		let y0 = cursor_y + line_height - glyph.bearing.y as f32;
		let x1 = x0 + glyph.size.x as f32;
		let y1 = y0 + glyph.size.y as f32;
		let (u0, v0, u1, v1) = (glyph.uv0.x, glyph.uv0.y, glyph.uv1.x, glyph.uv1.y);

		for (px, py, u, v) in [
			(x0, y0, u0, v0),
			(x0, y1, u0, v1),
			(x1, y1, u1, v1),
			(x0, y0, u0, v0),
			(x1, y1, u1, v1),
			(x1, y0, u1, v0),
		] {
			out.extend_from_slice(&[px, py, u, v, color.x, color.y, color.z]);
		}

		cursor_x += glyph.advance;
	}
}

impl<B: Backend> Renderer<B> {
	/// Opens a TrueType/OpenType font and builds its atlas.
	///
	/// Returns [`FontHandle::INVALID`] if the font cannot be opened.
	pub fn upload_font(&mut self, path: impl AsRef<Path>, pixel_size: f32) -> FontHandle {
		match TrueTypeFont::open(path.as_ref(), pixel_size) {
			Ok(font) => self.upload_font_source(&font),
			Err(err) => {
				log::warn!("{}", err);
				FontHandle::INVALID
			}
		}
	}

	pub fn upload_font_source(&mut self, source: &dyn GlyphSource) -> FontHandle {
		let atlas = font::build_atlas(source, ATLAS_PADDING);
		let texture = self
			.backend
			.create_texture(&TextureImage::single(atlas.to_rgba(), Sampling::Linear));
		let pixel_size = source.pixel_size();

		let index = self.fonts.insert(VirtualFont {
			line_height: line_height(&atlas.glyphs, pixel_size),
			glyphs: atlas.glyphs,
			pixel_size,
			atlas_size: atlas.size,
			atlas: texture,
			text_mesh: None,
		});

		log::debug!("uploaded font {} ({}px, {}x{} atlas)", index, pixel_size, atlas.size, atlas.size);
		FontHandle(index)
	}

	/// Deletes the font, its atlas texture and its text mesh. Unknown handles are ignored.
	pub fn delete_font(&mut self, handle: FontHandle) {
		let font = match self.fonts.release(handle.index()) {
			Some(font) => font,
			None => {
				log::trace!("delete_font: {:?} is not live", handle);
				return;
			}
		};

		self.backend.destroy_texture(font.atlas);
		if let Some(mesh) = font.text_mesh {
			self.backend.destroy_mesh(mesh);
		}
		if self.batch.as_ref().map_or(false, |batch| batch.font == handle) {
			self.batch = None;
		}
		log::debug!("deleted font {}", handle.index());
	}

	pub fn font_is_dead(&self, handle: FontHandle) -> bool {
		self.fonts.is_dead(handle.index())
	}

	pub fn font(&self, handle: FontHandle) -> Option<&VirtualFont<B::Mesh, B::Texture>> {
		self.fonts.get(handle.index())
	}

	/// Starts collecting text for `font`, dropping anything collected before.
	pub fn batch_begin(&mut self, font: FontHandle) {
		if self.fonts.get(font.index()).is_none() {
			log::warn!("batch_begin: {:?} is not a live font", font);
			self.batch = None;
			return;
		}

		self.batch = Some(TextBatch {
			font,
			vertices: Vec::new(),
		});
	}

	pub fn add_text(&mut self, text: &str, x: f32, y: f32, color: Vector3<f32>) {
		let batch = match self.batch.as_mut() {
			Some(batch) => batch,
			None => {
				log::error!("add_text called outside of batch_begin/batch_end");
				return;
			}
		};

		if let Some(font) = self.fonts.get(batch.font.index()) {
			layout_text(&font.glyphs, font.line_height, text, x, y, color, &mut batch.vertices);
		}
	}

	/// Uploads the collected text to the font's mesh and draws it in one call.
	///
	/// The text program and atlas are passed to the draw directly, so the bound
	/// shader and texture slots are the same afterwards as before.
	pub fn batch_end(&mut self) {
		let batch = match self.batch.take() {
			Some(batch) => batch,
			None => {
				log::debug!("batch_end called without batch_begin");
				return;
			}
		};

		let vertex_count = VertexLayout::Text.vertex_count(batch.vertices.len());
		if vertex_count == 0 {
			return;
		}

		let font = match self.fonts.get_mut(batch.font.index()) {
			Some(font) => font,
			None => return,
		};

		let mesh = match font.text_mesh.take() {
			Some(mut mesh) => {
				self.backend.update_mesh(&mut mesh, &batch.vertices, &[]);
				mesh
			}
			None => self.backend.create_mesh(VertexLayout::Text, &batch.vertices, &[]),
		};

		let (width, height) = self.backend.viewport_size();
		let projection = cgmath::ortho(0.0, width as f32, height as f32, 0.0, -1.0, 1.0);
		self.text_shader
			.set_uniform(&mut self.backend, PROJECTION_UNIFORM, &projection.into());

		let mut textures = [None; TEXTURE_SLOTS];
		textures[0] = Some(&font.atlas);

		self.backend
			.draw_arrays(Some(&self.text_shader.program), &mesh, &textures, vertex_count);

		font.text_mesh = Some(mesh);
	}

	pub fn render_text(&mut self, font: FontHandle, text: &str, x: f32, y: f32, color: Vector3<f32>) {
		self.batch_begin(font);
		self.add_text(text, x, y, color);
		self.batch_end();
	}

	/// Number of floats waiting in the open batch, if one is open.
	pub fn batch_len(&self) -> Option<usize> {
		self.batch.as_ref().map(|batch| batch.vertices.len())
	}
}
