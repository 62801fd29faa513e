//! The seam between the resource manager and whatever draws the pixels.

use std::ops::Range;

use crate::error::RendererError;
use crate::mesh::VertexLayout;
use crate::shader::{CompiledStage, ProgramLayout};
use crate::texture::TextureImage;
use crate::uniform::{UniformLocation, UniformValue};

pub mod headless;
pub mod gpu;

pub use self::headless::{HeadlessBackend, RenderCall};
pub use self::gpu::WgpuBackend;

/// Number of texture slots a draw can bind.
pub const TEXTURE_SLOTS: usize = 4;

/// Immediate-mode drawing backend.
///
/// Objects are owned by the caller once created and handed back by value to be
/// destroyed, so a destroyed object can never be used again.
pub trait Backend {
	type Mesh;
	type Program;
	type Texture;

	fn viewport_size(&self) -> (u32, u32);

	fn resize(&mut self, width: u32, height: u32);

	/// Clears color and depth and starts accepting draws.
	fn begin_frame(&mut self, clear_color: [f32; 4]) -> Result<(), RendererError>;

	fn end_frame(&mut self) -> Result<(), RendererError>;

	fn create_mesh(&mut self, layout: VertexLayout, vertices: &[f32], indices: &[u32]) -> Self::Mesh;

	/// Replaces the contents of `mesh`, growing its storage when needed.
	fn update_mesh(&mut self, mesh: &mut Self::Mesh, vertices: &[f32], indices: &[u32]);

	fn destroy_mesh(&mut self, mesh: Self::Mesh);

	/// Builds a program from two stages that already passed [`crate::shader::link`].
	fn link_program(
		&mut self,
		vertex: &CompiledStage,
		fragment: &CompiledStage,
		layout: VertexLayout,
		program: &ProgramLayout,
	) -> Result<Self::Program, String>;

	fn destroy_program(&mut self, program: Self::Program);

	fn uniform_location(&self, program: &Self::Program, name: &str) -> Option<UniformLocation>;

	/// Writes `value` at `location`. A location outside the program or a value of
	/// the wrong type is ignored.
	fn write_uniform(&mut self, program: &mut Self::Program, location: UniformLocation, value: &UniformValue);

	fn create_texture(&mut self, image: &TextureImage) -> Self::Texture;

	fn destroy_texture(&mut self, texture: Self::Texture);

	/// Draws `index_count` indices of `mesh` as a triangle list.
	///
	/// `textures[n]` is bound to texture slot `n`. A `None` program draws nothing.
	fn draw_indexed(
		&mut self,
		program: Option<&Self::Program>,
		mesh: &Self::Mesh,
		textures: &[Option<&Self::Texture>],
		index_count: u32,
	);

	/// Draws the first `vertex_count` vertices of `mesh` without indices.
	fn draw_arrays(
		&mut self,
		program: Option<&Self::Program>,
		mesh: &Self::Mesh,
		textures: &[Option<&Self::Texture>],
		vertex_count: u32,
	);
}

/// CPU copy of a program's uniform block.
#[derive(Debug, Clone)]
pub struct UniformBlock {
	layout: ProgramLayout,
	bytes: Vec<u8>,
}

impl UniformBlock {
	pub fn new(layout: ProgramLayout) -> Self {
		let bytes = vec![0; layout.uniform_block_size as usize];
		Self { layout, bytes }
	}

	pub fn layout(&self) -> &ProgramLayout {
		&self.layout
	}

	pub fn location(&self, name: &str) -> Option<UniformLocation> {
		self.layout.location(name)
	}

	/// Copies `value` into the block and returns the byte range that changed.
	pub fn write(&mut self, location: UniformLocation, value: &UniformValue) -> Option<Range<usize>> {
		let field = self.layout.field(location)?;
		if field.kind != value.kind() {
			log::trace!(
				"uniform `{}` is {:?}, ignoring a {:?} write",
				field.name,
				field.kind,
				value.kind()
			);
			return None;
		}

		let data = value.to_bytes();
		let range = field.offset as usize..field.offset as usize + data.len();
		self.bytes.get_mut(range.clone())?.copy_from_slice(&data);
		Some(range)
	}

	pub fn bytes(&self) -> &[u8] {
		&self.bytes
	}
}
