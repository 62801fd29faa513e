use cgmath::{Matrix4, Vector2, Vector3, Vector4};
use hashbrown::HashMap;

/// Index of a member inside a program's uniform block.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub u32);

/// The uniform types the renderer knows how to write.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum UniformKind {
	Int,
	Vec2,
	Vec3,
	Vec4,
	Mat4,
	/// Anything else declared in a block; never writable.
	Other,
}

impl UniformKind {
	pub fn size(&self) -> Option<u32> {
		match self {
			UniformKind::Int => Some(4),
			UniformKind::Vec2 => Some(8),
			UniformKind::Vec3 => Some(12),
			UniformKind::Vec4 => Some(16),
			UniformKind::Mat4 => Some(64),
			UniformKind::Other => None,
		}
	}
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum UniformValue {
	Int(i32),
	Vec2(Vector2<f32>),
	Vec3(Vector3<f32>),
	Vec4(Vector4<f32>),
	Mat4(Matrix4<f32>),
}

impl UniformValue {
	pub fn kind(&self) -> UniformKind {
		match self {
			UniformValue::Int(_) => UniformKind::Int,
			UniformValue::Vec2(_) => UniformKind::Vec2,
			UniformValue::Vec3(_) => UniformKind::Vec3,
			UniformValue::Vec4(_) => UniformKind::Vec4,
			UniformValue::Mat4(_) => UniformKind::Mat4,
		}
	}

	/// Native-endian bytes as laid out in a uniform block (matrices column-major).
	pub fn to_bytes(&self) -> Vec<u8> {
		match self {
			UniformValue::Int(v) => bytemuck::bytes_of(v).to_vec(),
			UniformValue::Vec2(v) => {
				let components: [f32; 2] = (*v).into();
				bytemuck::cast_slice(&components).to_vec()
			}
			UniformValue::Vec3(v) => {
				let components: [f32; 3] = (*v).into();
				bytemuck::cast_slice(&components).to_vec()
			}
			UniformValue::Vec4(v) => {
				let components: [f32; 4] = (*v).into();
				bytemuck::cast_slice(&components).to_vec()
			}
			UniformValue::Mat4(m) => {
				let columns: [[f32; 4]; 4] = (*m).into();
				bytemuck::cast_slice(&columns).to_vec()
			}
		}
	}
}

impl From<i32> for UniformValue {
	fn from(value: i32) -> Self {
		UniformValue::Int(value)
	}
}

impl From<Vector2<f32>> for UniformValue {
	fn from(value: Vector2<f32>) -> Self {
		UniformValue::Vec2(value)
	}
}

impl From<Vector3<f32>> for UniformValue {
	fn from(value: Vector3<f32>) -> Self {
		UniformValue::Vec3(value)
	}
}

impl From<Vector4<f32>> for UniformValue {
	fn from(value: Vector4<f32>) -> Self {
		UniformValue::Vec4(value)
	}
}

impl From<Matrix4<f32>> for UniformValue {
	fn from(value: Matrix4<f32>) -> Self {
		UniformValue::Mat4(value)
	}
}

/// Name to location lookups already answered for one program.
///
/// Misses are cached as well, so a name the program does not declare is only
/// looked up once. The cache lives inside its shader slot and is dropped with it.
#[derive(Debug, Default)]
pub struct UniformCache {
	locations: HashMap<String, Option<UniformLocation>>,
}

impl UniformCache {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the cached answer for `name`, or asks `resolve` and remembers it.
	pub fn get_or_resolve(
		&mut self,
		name: &str,
		resolve: impl FnOnce(&str) -> Option<UniformLocation>,
	) -> Option<UniformLocation> {
		if let Some(location) = self.locations.get(name) {
			return *location;
		}

		let location = resolve(name);
		self.locations.insert(name.to_owned(), location);
		location
	}

	pub fn cached(&self, name: &str) -> Option<Option<UniformLocation>> {
		self.locations.get(name).copied()
	}

	pub fn len(&self) -> usize {
		self.locations.len()
	}

	pub fn is_empty(&self) -> bool {
		self.locations.is_empty()
	}
}
