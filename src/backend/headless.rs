//! A backend that records what it is asked to do instead of drawing.

use crate::backend::{Backend, UniformBlock, TEXTURE_SLOTS};
use crate::error::RendererError;
use crate::mesh::VertexLayout;
use crate::shader::{CompiledStage, ProgramLayout};
use crate::texture::{Sampling, TextureImage};
use crate::uniform::{UniformLocation, UniformValue};

/// One recorded backend operation.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderCall {
	BeginFrame {
		clear_color: [f32; 4],
	},
	EndFrame,
	Resize {
		width: u32,
		height: u32,
	},
	CreateMesh {
		id: usize,
		layout: VertexLayout,
		vertex_count: u32,
		index_count: u32,
	},
	UpdateMesh {
		id: usize,
		vertex_count: u32,
		index_count: u32,
	},
	DestroyMesh {
		id: usize,
	},
	LinkProgram {
		id: usize,
		layout: VertexLayout,
	},
	DestroyProgram {
		id: usize,
	},
	WriteUniform {
		program: usize,
		location: UniformLocation,
		value: UniformValue,
	},
	CreateTexture {
		id: usize,
		width: u32,
		height: u32,
		mip_levels: u32,
		sampling: Sampling,
	},
	DestroyTexture {
		id: usize,
	},
	DrawIndexed {
		program: Option<usize>,
		mesh: usize,
		textures: Vec<Option<usize>>,
		index_count: u32,
	},
	DrawArrays {
		program: Option<usize>,
		mesh: usize,
		textures: Vec<Option<usize>>,
		vertex_count: u32,
	},
}

#[derive(Debug)]
pub struct HeadlessMesh {
	pub id: usize,
	pub layout: VertexLayout,
	pub vertices: Vec<f32>,
	pub indices: Vec<u32>,
}

#[derive(Debug)]
pub struct HeadlessProgram {
	pub id: usize,
	pub layout: VertexLayout,
	pub uniforms: UniformBlock,
}

#[derive(Debug)]
pub struct HeadlessTexture {
	pub id: usize,
	pub width: u32,
	pub height: u32,
	pub sampling: Sampling,
}

/// Records every call as a [`RenderCall`] and keeps object contents on the CPU.
#[derive(Debug)]
pub struct HeadlessBackend {
	calls: Vec<RenderCall>,
	size: (u32, u32),
	next_id: usize,
	live_meshes: usize,
	live_programs: usize,
	live_textures: usize,
}

impl HeadlessBackend {
	pub fn new(width: u32, height: u32) -> Self {
		Self {
			calls: Vec::new(),
			size: (width, height),
			next_id: 0,
			live_meshes: 0,
			live_programs: 0,
			live_textures: 0,
		}
	}

	pub fn calls(&self) -> &[RenderCall] {
		&self.calls
	}

	pub fn clear_calls(&mut self) {
		self.calls.clear();
	}

	/// Only the draw calls, in order.
	pub fn draws(&self) -> impl Iterator<Item = &RenderCall> {
		self.calls
			.iter()
			.filter(|call| matches!(call, RenderCall::DrawIndexed { .. } | RenderCall::DrawArrays { .. }))
	}

	pub fn last_draw(&self) -> Option<&RenderCall> {
		self.draws().last()
	}

	pub fn count_mesh_creates(&self) -> usize {
		self.calls
			.iter()
			.filter(|call| matches!(call, RenderCall::CreateMesh { .. }))
			.count()
	}

	pub fn count_texture_creates(&self) -> usize {
		self.calls
			.iter()
			.filter(|call| matches!(call, RenderCall::CreateTexture { .. }))
			.count()
	}

	pub fn live_meshes(&self) -> usize {
		self.live_meshes
	}

	pub fn live_programs(&self) -> usize {
		self.live_programs
	}

	pub fn live_textures(&self) -> usize {
		self.live_textures
	}

	fn next_id(&mut self) -> usize {
		let id = self.next_id;
		self.next_id += 1;
		id
	}

	fn slot_ids(textures: &[Option<&HeadlessTexture>]) -> Vec<Option<usize>> {
		textures
			.iter()
			.take(TEXTURE_SLOTS)
			.map(|texture| texture.map(|t| t.id))
			.collect()
	}
}

impl Default for HeadlessBackend {
	fn default() -> Self {
		Self::new(800, 600)
	}
}

impl Backend for HeadlessBackend {
	type Mesh = HeadlessMesh;
	type Program = HeadlessProgram;
	type Texture = HeadlessTexture;

	fn viewport_size(&self) -> (u32, u32) {
		self.size
	}

	fn resize(&mut self, width: u32, height: u32) {
		if width > 0 && height > 0 {
			self.size = (width, height);
			self.calls.push(RenderCall::Resize { width, height });
		}
	}

	fn begin_frame(&mut self, clear_color: [f32; 4]) -> Result<(), RendererError> {
		self.calls.push(RenderCall::BeginFrame { clear_color });
		Ok(())
	}

	fn end_frame(&mut self) -> Result<(), RendererError> {
		self.calls.push(RenderCall::EndFrame);
		Ok(())
	}

	fn create_mesh(&mut self, layout: VertexLayout, vertices: &[f32], indices: &[u32]) -> HeadlessMesh {
		let id = self.next_id();
		self.live_meshes += 1;
		self.calls.push(RenderCall::CreateMesh {
			id,
			layout,
			vertex_count: layout.vertex_count(vertices.len()),
			index_count: indices.len() as u32,
		});

		HeadlessMesh {
			id,
			layout,
			vertices: vertices.to_vec(),
			indices: indices.to_vec(),
		}
	}

	fn update_mesh(&mut self, mesh: &mut HeadlessMesh, vertices: &[f32], indices: &[u32]) {
		mesh.vertices.clear();
		mesh.vertices.extend_from_slice(vertices);
		mesh.indices.clear();
		mesh.indices.extend_from_slice(indices);

		self.calls.push(RenderCall::UpdateMesh {
			id: mesh.id,
			vertex_count: mesh.layout.vertex_count(vertices.len()),
			index_count: indices.len() as u32,
		});
	}

	fn destroy_mesh(&mut self, mesh: HeadlessMesh) {
		self.live_meshes -= 1;
		self.calls.push(RenderCall::DestroyMesh { id: mesh.id });
	}

	fn link_program(
		&mut self,
		_vertex: &CompiledStage,
		_fragment: &CompiledStage,
		layout: VertexLayout,
		program: &ProgramLayout,
	) -> Result<HeadlessProgram, String> {
		let id = self.next_id();
		self.live_programs += 1;
		self.calls.push(RenderCall::LinkProgram { id, layout });

		Ok(HeadlessProgram {
			id,
			layout,
			uniforms: UniformBlock::new(program.clone()),
		})
	}

	fn destroy_program(&mut self, program: HeadlessProgram) {
		self.live_programs -= 1;
		self.calls.push(RenderCall::DestroyProgram { id: program.id });
	}

	fn uniform_location(&self, program: &HeadlessProgram, name: &str) -> Option<UniformLocation> {
		program.uniforms.location(name)
	}

	fn write_uniform(&mut self, program: &mut HeadlessProgram, location: UniformLocation, value: &UniformValue) {
		if program.uniforms.write(location, value).is_some() {
			self.calls.push(RenderCall::WriteUniform {
				program: program.id,
				location,
				value: *value,
			});
		}
	}

	fn create_texture(&mut self, image: &TextureImage) -> HeadlessTexture {
		let id = self.next_id();
		self.live_textures += 1;
		self.calls.push(RenderCall::CreateTexture {
			id,
			width: image.width(),
			height: image.height(),
			mip_levels: image.mip_level_count(),
			sampling: image.sampling,
		});

		HeadlessTexture {
			id,
			width: image.width(),
			height: image.height(),
			sampling: image.sampling,
		}
	}

	fn destroy_texture(&mut self, texture: HeadlessTexture) {
		self.live_textures -= 1;
		self.calls.push(RenderCall::DestroyTexture { id: texture.id });
	}

	fn draw_indexed(
		&mut self,
		program: Option<&HeadlessProgram>,
		mesh: &HeadlessMesh,
		textures: &[Option<&HeadlessTexture>],
		index_count: u32,
	) {
		self.calls.push(RenderCall::DrawIndexed {
			program: program.map(|p| p.id),
			mesh: mesh.id,
			textures: Self::slot_ids(textures),
			index_count,
		});
	}

	fn draw_arrays(
		&mut self,
		program: Option<&HeadlessProgram>,
		mesh: &HeadlessMesh,
		textures: &[Option<&HeadlessTexture>],
		vertex_count: u32,
	) {
		self.calls.push(RenderCall::DrawArrays {
			program: program.map(|p| p.id),
			mesh: mesh.id,
			textures: Self::slot_ids(textures),
			vertex_count,
		});
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn ids_are_never_reused() {
		let mut backend = HeadlessBackend::default();
		let a = backend.create_mesh(VertexLayout::Mesh, &[], &[]);
		backend.destroy_mesh(a);
		let b = backend.create_mesh(VertexLayout::Mesh, &[], &[]);

		assert_eq!(b.id, 1);
		assert_eq!(backend.live_meshes(), 1);
		assert_eq!(backend.count_mesh_creates(), 2);
	}

	#[test]
	fn updates_replace_mesh_contents() {
		let mut backend = HeadlessBackend::default();
		let mut mesh = backend.create_mesh(VertexLayout::Text, &[0.0; 7], &[]);
		backend.update_mesh(&mut mesh, &[1.0; 14], &[]);

		assert_eq!(mesh.vertices.len(), 14);
		assert_eq!(
			backend.calls().last(),
			Some(&RenderCall::UpdateMesh {
				id: 0,
				vertex_count: 2,
				index_count: 0
			})
		);
	}

	#[test]
	fn resize_ignores_zero_sizes() {
		let mut backend = HeadlessBackend::new(640, 480);
		backend.resize(0, 100);
		assert_eq!(backend.viewport_size(), (640, 480));
		backend.resize(1024, 768);
		assert_eq!(backend.viewport_size(), (1024, 768));
	}
}
