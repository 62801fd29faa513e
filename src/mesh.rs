use cgmath::{Vector2, Vector3};

// vec3: Position
// vec3: Normal
// vec3: Color
// vec2: UV
pub const FLOATS_PER_VERTEX: usize = 11;

pub const OFFSET_OF_POSITION: usize = 0;
pub const OFFSET_OF_NORMAL: usize = 3 * std::mem::size_of::<f32>();
pub const OFFSET_OF_COLOR: usize = 6 * std::mem::size_of::<f32>();
pub const OFFSET_OF_UV: usize = 9 * std::mem::size_of::<f32>();

// vec2: Position
// vec2: UV
// vec3: Color
pub const TEXT_FLOATS_PER_VERTEX: usize = 7;

/// The two interleaved vertex formats a backend has to understand.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum VertexLayout {
	Mesh,
	Text,
}

impl VertexLayout {
	pub fn floats_per_vertex(&self) -> usize {
		match self {
			VertexLayout::Mesh => FLOATS_PER_VERTEX,
			VertexLayout::Text => TEXT_FLOATS_PER_VERTEX,
		}
	}

	/// Byte distance between two consecutive vertices.
	pub fn stride(&self) -> usize {
		self.floats_per_vertex() * std::mem::size_of::<f32>()
	}

	/// Number of vertex attributes, i.e. the valid `@location`s are `0..attribute_count`.
	pub fn attribute_count(&self) -> u32 {
		match self {
			VertexLayout::Mesh => 4,
			VertexLayout::Text => 3,
		}
	}

	pub fn vertex_count(&self, floats: usize) -> u32 {
		(floats / self.floats_per_vertex()) as u32
	}
}

/// CPU-side geometry waiting to be uploaded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshBuffer {
	pub vertices: Vec<f32>,
	pub indices: Vec<u32>,
}

impl MeshBuffer {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn vertex_count(&self) -> usize {
		self.vertices.len() / FLOATS_PER_VERTEX
	}
}

/// Appends vertices and indices to a borrowed [`MeshBuffer`].
///
/// Composite helpers index the vertices they just pushed by counting back from
/// the running vertex count, so nothing else may append to the buffer between
/// a helper's vertices and its indices.
pub struct MeshBuilder<'a> {
	buffer: &'a mut MeshBuffer,
	vertex_count: u32,
}

impl<'a> MeshBuilder<'a> {
	pub fn new(buffer: &'a mut MeshBuffer) -> Self {
		let vertex_count = buffer.vertex_count() as u32;
		Self {
			buffer,
			vertex_count,
		}
	}

	pub fn clear(&mut self) {
		self.buffer.vertices.clear();
		self.buffer.indices.clear();
		self.vertex_count = 0;
	}

	pub fn vertex_count(&self) -> u32 {
		self.vertex_count
	}

	pub fn add_vertex(
		&mut self,
		position: Vector3<f32>,
		normal: Vector3<f32>,
		color: Vector3<f32>,
		uv: Vector2<f32>,
	) {
		self.buffer.vertices.extend_from_slice(&[
			position.x, position.y, position.z,
			normal.x, normal.y, normal.z,
			color.x, color.y, color.z,
			uv.x, uv.y,
		]);
		self.vertex_count += 1;
	}

	pub fn add_index(&mut self, index: u32) {
		self.buffer.indices.push(index);
	}

	pub fn add_triangle(
		&mut self,
		positions: [Vector3<f32>; 3],
		colors: [Vector3<f32>; 3],
		uvs: [Vector2<f32>; 3],
		normal: Vector3<f32>,
	) {
		for i in 0..3 {
			self.add_vertex(positions[i], normal, colors[i], uvs[i]);
		}

		self.add_index(self.vertex_count - 3);
		self.add_index(self.vertex_count - 2);
		self.add_index(self.vertex_count - 1);
	}

	/// Adds four vertices split along the 0-2 diagonal into `{0, 1, 2}` and `{2, 1, 3}`.
	///
	/// Winding matches when the corners are given in "Z" order
	/// (bottom-left, bottom-right, top-left, top-right).
	pub fn add_quad(
		&mut self,
		positions: [Vector3<f32>; 4],
		colors: [Vector3<f32>; 4],
		uvs: [Vector2<f32>; 4],
		normal: Vector3<f32>,
	) {
		for i in 0..4 {
			self.add_vertex(positions[i], normal, colors[i], uvs[i]);
		}

		self.add_index(self.vertex_count - 4);
		self.add_index(self.vertex_count - 3);
		self.add_index(self.vertex_count - 2);

		self.add_index(self.vertex_count - 2);
		self.add_index(self.vertex_count - 3);
		self.add_index(self.vertex_count - 1);
	}
}
