//! Handle-based GPU resource manager and immediate-mode draw front end.

use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;

use instant::Instant;

use crate::backend::{Backend, TEXTURE_SLOTS};
use crate::error::RendererError;
use crate::handle::{MeshHandle, ShaderHandle, SlotPool, TextureHandle};
use crate::mesh::{MeshBuffer, VertexLayout};
use crate::shader::{self, Stage};
use crate::text::{TextBatch, VirtualFont};
use crate::texture::TextureImage;
use crate::uniform::{UniformCache, UniformLocation, UniformValue};

const TEXT_VERTEX_SHADER: &str = include_str!("shaders/text_vert.wgsl");
const TEXT_FRAGMENT_SHADER: &str = include_str!("shaders/text_frag.wgsl");

pub struct Mesh<B: Backend> {
	pub(crate) inner: B::Mesh,
	pub index_count: u32,
}

pub struct Shader<B: Backend> {
	pub(crate) program: B::Program,
	pub uniforms: UniformCache,
}

impl<B: Backend> Shader<B> {
	fn location(&mut self, backend: &B, name: &str) -> Option<UniformLocation> {
		let program = &self.program;
		self.uniforms
			.get_or_resolve(name, |name| backend.uniform_location(program, name))
	}

	pub(crate) fn set_uniform(&mut self, backend: &mut B, name: &str, value: &UniformValue) {
		if let Some(location) = self.location(backend, name) {
			backend.write_uniform(&mut self.program, location, value);
		}
	}
}

pub struct Texture<B: Backend> {
	pub(crate) inner: B::Texture,
	pub width: u32,
	pub height: u32,
	/// Channel count of the source image before conversion to RGBA.
	pub channels: u8,
}

/// Owns every GPU object behind a handle and the current bindings.
pub struct Renderer<B: Backend> {
	pub(crate) backend: B,

	meshes: SlotPool<Mesh<B>>,
	shaders: SlotPool<Shader<B>>,
	textures: SlotPool<Texture<B>>,
	pub(crate) fonts: SlotPool<VirtualFont<B::Mesh, B::Texture>>,

	bound_shader: Option<ShaderHandle>,
	bound_textures: [Option<TextureHandle>; TEXTURE_SLOTS],

	pub(crate) text_shader: Shader<B>,
	pub(crate) batch: Option<TextBatch>,
	clear_color: [f32; 4],
}

impl<B: Backend> Renderer<B> {
	/// Wraps `backend` and builds the text program.
	pub fn new(mut backend: B) -> Result<Self, RendererError> {
		let text_shader = build_shader(&mut backend, TEXT_VERTEX_SHADER, TEXT_FRAGMENT_SHADER, VertexLayout::Text)
			.map_err(|err| RendererError::Initialization(format!("built-in text shader: {}", err)))?;

		Ok(Self {
			backend,
			meshes: SlotPool::new(),
			shaders: SlotPool::new(),
			textures: SlotPool::new(),
			fonts: SlotPool::new(),
			bound_shader: None,
			bound_textures: [None; TEXTURE_SLOTS],
			text_shader,
			batch: None,
			clear_color: [0.1, 0.2, 0.3, 1.0],
		})
	}

	pub fn backend(&self) -> &B {
		&self.backend
	}

	pub fn backend_mut(&mut self) -> &mut B {
		&mut self.backend
	}

	pub fn upload_mesh(&mut self, buffer: &MeshBuffer) -> MeshHandle {
		let inner = self
			.backend
			.create_mesh(VertexLayout::Mesh, &buffer.vertices, &buffer.indices);
		let index = self.meshes.insert(Mesh {
			inner,
			index_count: buffer.indices.len() as u32,
		});

		log::debug!(
			"uploaded mesh {} ({} vertices, {} indices)",
			index,
			buffer.vertex_count(),
			buffer.indices.len()
		);
		MeshHandle(index)
	}

	/// Compiles and links a program. Nothing is allocated when this fails.
	pub fn upload_shader(&mut self, vertex: &str, fragment: &str) -> Result<ShaderHandle, RendererError> {
		let shader = build_shader(&mut self.backend, vertex, fragment, VertexLayout::Mesh)?;
		let index = self.shaders.insert(shader);

		log::debug!("uploaded shader {}", index);
		Ok(ShaderHandle(index))
	}

	/// Replaces the program used for text batches.
	pub fn create_text_shader(&mut self, vertex: &str, fragment: &str) -> Result<(), RendererError> {
		let shader = build_shader(&mut self.backend, vertex, fragment, VertexLayout::Text)?;
		let old = std::mem::replace(&mut self.text_shader, shader);
		self.backend.destroy_program(old.program);
		Ok(())
	}

	/// Decodes an image file into a texture.
	///
	/// Returns [`TextureHandle::INVALID`] if the file cannot be decoded.
	pub fn upload_texture(&mut self, path: impl AsRef<Path>, flip_vertically: bool) -> TextureHandle {
		match TextureImage::load(path.as_ref(), flip_vertically) {
			Ok(image) => self.insert_texture(&image),
			Err(err) => {
				log::warn!("{}", err);
				TextureHandle::INVALID
			}
		}
	}

	fn insert_texture(&mut self, image: &TextureImage) -> TextureHandle {
		let inner = self.backend.create_texture(image);
		let index = self.textures.insert(Texture {
			inner,
			width: image.width(),
			height: image.height(),
			channels: image.source_channels,
		});

		log::debug!(
			"uploaded texture {} ({}x{}, {} mip levels)",
			index,
			image.width(),
			image.height(),
			image.mip_level_count()
		);
		TextureHandle(index)
	}

	pub fn delete_mesh(&mut self, handle: MeshHandle) {
		match self.meshes.release(handle.index()) {
			Some(mesh) => {
				self.backend.destroy_mesh(mesh.inner);
				log::debug!("deleted mesh {}", handle.index());
			}
			None => log::trace!("delete_mesh: {:?} is not live", handle),
		}
	}

	/// Deletes the program and its uniform cache, unbinding it if bound.
	pub fn delete_shader(&mut self, handle: ShaderHandle) {
		match self.shaders.release(handle.index()) {
			Some(shader) => {
				self.backend.destroy_program(shader.program);
				if self.bound_shader == Some(handle) {
					self.bound_shader = None;
				}
				log::debug!("deleted shader {}", handle.index());
			}
			None => log::trace!("delete_shader: {:?} is not live", handle),
		}
	}

	/// Deletes the texture, clearing any slot it is bound to.
	pub fn delete_texture(&mut self, handle: TextureHandle) {
		match self.textures.release(handle.index()) {
			Some(texture) => {
				self.backend.destroy_texture(texture.inner);
				for slot in self.bound_textures.iter_mut() {
					if *slot == Some(handle) {
						*slot = None;
					}
				}
				log::debug!("deleted texture {}", handle.index());
			}
			None => log::trace!("delete_texture: {:?} is not live", handle),
		}
	}

	/// Deletes every mesh, shader, texture and font and resets the bindings.
	///
	/// The built-in text program survives. Handles issued before the call refer to
	/// nothing afterwards and new uploads start again from slot 0.
	pub fn delete_all(&mut self) {
		for mesh in self.meshes.drain() {
			self.backend.destroy_mesh(mesh.inner);
		}
		for shader in self.shaders.drain() {
			self.backend.destroy_program(shader.program);
		}
		for texture in self.textures.drain() {
			self.backend.destroy_texture(texture.inner);
		}
		for font in self.fonts.drain() {
			self.backend.destroy_texture(font.atlas);
			if let Some(mesh) = font.text_mesh {
				self.backend.destroy_mesh(mesh);
			}
		}

		self.bound_shader = None;
		self.bound_textures = [None; TEXTURE_SLOTS];
		self.batch = None;
		log::debug!("deleted all resources");
	}

	pub fn mesh_is_dead(&self, handle: MeshHandle) -> bool {
		self.meshes.is_dead(handle.index())
	}

	pub fn shader_is_dead(&self, handle: ShaderHandle) -> bool {
		self.shaders.is_dead(handle.index())
	}

	pub fn texture_is_dead(&self, handle: TextureHandle) -> bool {
		self.textures.is_dead(handle.index())
	}

	pub fn mesh(&self, handle: MeshHandle) -> Option<&Mesh<B>> {
		self.meshes.get(handle.index())
	}

	pub fn texture(&self, handle: TextureHandle) -> Option<&Texture<B>> {
		self.textures.get(handle.index())
	}

	pub fn shader(&self, handle: ShaderHandle) -> Option<&Shader<B>> {
		self.shaders.get(handle.index())
	}

	/// Binds `handle` for the following draws and uniform writes.
	///
	/// [`ShaderHandle::INVALID`] unbinds. Handles that are not live are ignored.
	pub fn use_shader(&mut self, handle: ShaderHandle) {
		if handle.is_invalid() {
			self.bound_shader = None;
		} else if self.shaders.get(handle.index()).is_some() {
			self.bound_shader = Some(handle);
		} else {
			log::debug!("use_shader: {:?} is not live, keeping the current binding", handle);
		}
	}

	pub fn bound_shader(&self) -> Option<ShaderHandle> {
		self.bound_shader
	}

	/// Location of `name` in the bound shader, resolved once and cached.
	pub fn get_location(&mut self, name: &str) -> Option<UniformLocation> {
		let handle = self.bound_shader?;
		let shader = self.shaders.get_mut(handle.index())?;
		shader.location(&self.backend, name)
	}

	/// Writes a uniform of the bound shader. Unknown names are ignored.
	pub fn set_uniform(&mut self, name: &str, value: impl Into<UniformValue>) {
		let value = value.into();
		let shader = match self.bound_shader.and_then(|handle| self.shaders.get_mut(handle.index())) {
			Some(shader) => shader,
			None => {
				log::trace!("set_uniform `{}` with no shader bound", name);
				return;
			}
		};
		shader.set_uniform(&mut self.backend, name, &value);
	}

	/// Binds `texture` to `slot` and points the sampler uniform `name` at it.
	pub fn set_sampler(&mut self, name: &str, slot: usize, texture: TextureHandle) {
		if slot >= TEXTURE_SLOTS {
			log::warn!("set_sampler: slot {} is out of range (0..{})", slot, TEXTURE_SLOTS);
			return;
		}
		if self.textures.get(texture.index()).is_none() {
			log::debug!("set_sampler: {:?} is not live", texture);
			return;
		}

		self.set_uniform(name, slot as i32);
		self.bound_textures[slot] = Some(texture);
	}

	pub fn bound_texture(&self, slot: usize) -> Option<TextureHandle> {
		self.bound_textures.get(slot).copied().flatten()
	}

	/// Draws the mesh with the bound shader and textures. Unknown handles draw nothing.
	pub fn render_mesh(&mut self, handle: MeshHandle) {
		let mesh = match self.meshes.get(handle.index()) {
			Some(mesh) => mesh,
			None => {
				log::trace!("render_mesh: {:?} is not live", handle);
				return;
			}
		};

		let program = self
			.bound_shader
			.and_then(|handle| self.shaders.get(handle.index()))
			.map(|shader| &shader.program);

		let mut textures = [None; TEXTURE_SLOTS];
		for (slot, bound) in self.bound_textures.iter().enumerate() {
			textures[slot] = bound
				.and_then(|handle| self.textures.get(handle.index()))
				.map(|texture| &texture.inner);
		}

		self.backend
			.draw_indexed(program, &mesh.inner, &textures, mesh.index_count);
	}

	pub fn set_clear_color(&mut self, color: [f32; 4]) {
		self.clear_color = color;
	}

	pub fn begin_frame(&mut self) -> Result<(), RendererError> {
		self.backend.begin_frame(self.clear_color)
	}

	pub fn end_frame(&mut self) -> Result<(), RendererError> {
		self.backend.end_frame()
	}

	pub fn resize(&mut self, width: u32, height: u32) {
		self.backend.resize(width, height);
	}

	pub fn viewport_size(&self) -> (u32, u32) {
		self.backend.viewport_size()
	}
}

fn build_shader<B: Backend>(
	backend: &mut B,
	vertex: &str,
	fragment: &str,
	layout: VertexLayout,
) -> Result<Shader<B>, RendererError> {
	let vertex = shader::compile(vertex, Stage::Vertex).map_err(|diagnostic| {
		log::error!("vertex shader failed to compile:\n{}", diagnostic);
		RendererError::VertexCompile(diagnostic)
	})?;
	let fragment = shader::compile(fragment, Stage::Fragment).map_err(|diagnostic| {
		log::error!("fragment shader failed to compile:\n{}", diagnostic);
		RendererError::FragmentCompile(diagnostic)
	})?;

	let link_error = |reason: String| {
		log::error!("shader program failed to link: {}", reason);
		RendererError::Link(reason)
	};
	let program_layout = shader::link(&vertex, &fragment, layout).map_err(link_error)?;
	let program = backend
		.link_program(&vertex, &fragment, layout, &program_layout)
		.map_err(link_error)?;

	Ok(Shader {
		program,
		uniforms: UniformCache::new(),
	})
}

/// Frames rendered during the last second.
#[derive(Debug)]
pub struct FpsCounter {
	pub last_second_frames: VecDeque<Instant>,
}

impl FpsCounter {
	pub fn new() -> FpsCounter {
		FpsCounter {
			last_second_frames: VecDeque::with_capacity(128),
		}
	}

	pub fn tick(&mut self) -> usize {
		self.tick_at(Instant::now())
	}

	pub fn tick_at(&mut self, now: Instant) -> usize {
		while self
			.last_second_frames
			.front()
			.map_or(false, |t| now.duration_since(*t) > Duration::from_secs(1))
		{
			self.last_second_frames.pop_front();
		}

		self.last_second_frames.push_back(now);
		self.last_second_frames.len()
	}

	pub fn fps(&self) -> usize {
		self.last_second_frames.len()
	}
}

impl Default for FpsCounter {
	fn default() -> Self {
		Self::new()
	}
}
