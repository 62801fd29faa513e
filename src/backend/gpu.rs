use std::iter;
use std::num::NonZeroU32;

use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::backend::{Backend, UniformBlock, TEXTURE_SLOTS};
use crate::error::RendererError;
use crate::mesh::VertexLayout;
use crate::shader::{CompiledStage, ProgramLayout, FRAGMENT_ENTRY_POINT, VERTEX_ENTRY_POINT};
use crate::texture::{Sampling, TextureImage};
use crate::uniform::{UniformLocation, UniformValue};

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
pub const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

pub trait Vertex {
	fn desc<'a>(&self) -> wgpu::VertexBufferLayout<'a>;
}

impl Vertex for VertexLayout {
	fn desc<'a>(&self) -> wgpu::VertexBufferLayout<'a> {
		static MESH_ATTRIBS: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
			0 => Float32x3,
			1 => Float32x3,
			2 => Float32x3,
			3 => Float32x2
		];
		static TEXT_ATTRIBS: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
			0 => Float32x2,
			1 => Float32x2,
			2 => Float32x3
		];

		wgpu::VertexBufferLayout {
			array_stride: self.stride() as wgpu::BufferAddress,
			step_mode: wgpu::VertexStepMode::Vertex,
			attributes: match self {
				VertexLayout::Mesh => &MESH_ATTRIBS,
				VertexLayout::Text => &TEXT_ATTRIBS,
			},
		}
	}
}

pub struct WgpuMesh {
	layout: VertexLayout,
	vertex_buffer: GrowableBuffer,
	index_buffer: GrowableBuffer,
}

struct GrowableBuffer {
	buffer: wgpu::Buffer,
	capacity: wgpu::BufferAddress,
	usage: wgpu::BufferUsages,
	label: &'static str,
}

impl GrowableBuffer {
	/// wgpu rejects zero-sized buffers, so empty data still gets one padding word.
	fn new<T: bytemuck::Pod>(device: &wgpu::Device, label: &'static str, data: &[T], usage: wgpu::BufferUsages) -> Self {
		let bytes: &[u8] = bytemuck::cast_slice(data);
		let padding = [0u8; 4];
		let contents = if bytes.is_empty() { &padding[..] } else { bytes };

		let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
			label: Some(label),
			contents,
			usage: usage | wgpu::BufferUsages::COPY_DST,
		});

		Self {
			buffer,
			capacity: contents.len() as wgpu::BufferAddress,
			usage,
			label,
		}
	}

	fn write<T: bytemuck::Pod>(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, data: &[T]) {
		let bytes: &[u8] = bytemuck::cast_slice(data);
		if bytes.is_empty() {
			return;
		}
		if bytes.len() as wgpu::BufferAddress <= self.capacity {
			queue.write_buffer(&self.buffer, 0, bytes);
		} else {
			log::trace!("growing {} to {} bytes", self.label, bytes.len());
			self.buffer.destroy();
			*self = Self::new(device, self.label, data, self.usage);
		}
	}

	fn slice(&self) -> wgpu::BufferSlice {
		self.buffer.slice(..)
	}
}

pub struct WgpuProgram {
	layout: VertexLayout,
	pipeline: wgpu::RenderPipeline,
	uniforms: UniformBlock,
	uniform_buffer: wgpu::Buffer,
	uniform_bind_group: wgpu::BindGroup,
}

pub struct WgpuTexture {
	texture: wgpu::Texture,
	view: wgpu::TextureView,
	sampler: wgpu::Sampler,
}

struct DepthTexture {
	_texture: wgpu::Texture,
	view: wgpu::TextureView,
}

struct Frame {
	output: wgpu::SurfaceTexture,
	view: wgpu::TextureView,
}

/// Draws through wgpu into a window surface.
///
/// Each draw is recorded into its own encoder and submitted right away, so buffer
/// and uniform writes issued between two draws are seen by the second one only.
pub struct WgpuBackend {
	surface: wgpu::Surface,
	device: wgpu::Device,
	queue: wgpu::Queue,
	config: wgpu::SurfaceConfiguration,

	depth_texture: DepthTexture,
	uniform_bind_group_layout: wgpu::BindGroupLayout,
	texture_bind_group_layout: wgpu::BindGroupLayout,
	pipeline_layout: wgpu::PipelineLayout,
	white: WgpuTexture,

	frame: Option<Frame>,
}

impl WgpuBackend {
	pub fn new(window: &Window) -> Result<Self, RendererError> {
		let size = window.inner_size();

		// Backends::all() => Vulkan + Metal + DX12 + Browser WebGPU
		let instance = wgpu::Instance::new(wgpu::Backends::all());
		let surface = unsafe { instance.create_surface(window) };
		let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
			power_preference: wgpu::PowerPreference::default(),
			compatible_surface: Some(&surface),
			force_fallback_adapter: false,
		}))
		.ok_or_else(|| RendererError::Initialization("no compatible graphics adapter".into()))?;

		let info = adapter.get_info();
		log::info!("using {} ({:?})", info.name, info.backend);

		let (device, queue) = pollster::block_on(adapter.request_device(
			&wgpu::DeviceDescriptor {
				label: None,
				features: wgpu::Features::empty(),
				limits: wgpu::Limits::default(),
			},
			None,
		))
		.map_err(|err| RendererError::Initialization(err.to_string()))?;

		let format = surface
			.get_supported_formats(&adapter)
			.first()
			.copied()
			.ok_or_else(|| RendererError::Initialization("surface supports no formats".into()))?;

		let config = wgpu::SurfaceConfiguration {
			usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
			format,
			width: size.width.max(1),
			height: size.height.max(1),
			present_mode: wgpu::PresentMode::Fifo,
		};
		surface.configure(&device, &config);

		let depth_texture = create_depth_texture(&device, &config);

		let uniform_bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
			entries: &[wgpu::BindGroupLayoutEntry {
				binding: 0,
				visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
				ty: wgpu::BindingType::Buffer {
					ty: wgpu::BufferBindingType::Uniform,
					has_dynamic_offset: false,
					min_binding_size: None,
				},
				count: None,
			}],
			label: Some("uniform bind group layout"),
		});

		let texture_entries: Vec<wgpu::BindGroupLayoutEntry> = (0..TEXTURE_SLOTS as u32)
			.flat_map(|slot| {
				[
					wgpu::BindGroupLayoutEntry {
						binding: slot * 2,
						visibility: wgpu::ShaderStages::FRAGMENT,
						ty: wgpu::BindingType::Texture {
							multisampled: false,
							view_dimension: wgpu::TextureViewDimension::D2,
							sample_type: wgpu::TextureSampleType::Float { filterable: true },
						},
						count: None,
					},
					wgpu::BindGroupLayoutEntry {
						binding: slot * 2 + 1,
						visibility: wgpu::ShaderStages::FRAGMENT,
						ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
						count: None,
					},
				]
			})
			.collect();

		let texture_bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
			entries: &texture_entries,
			label: Some("texture bind group layout"),
		});

		let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
			bind_group_layouts: &[&uniform_bind_group_layout, &texture_bind_group_layout],
			push_constant_ranges: &[],
			label: Some("render pipeline layout"),
		});

		let white = upload_texture(
			&device,
			&queue,
			&TextureImage::single(image::RgbaImage::from_pixel(1, 1, image::Rgba([255; 4])), Sampling::Linear),
		);

		Ok(Self {
			surface,
			device,
			queue,
			config,
			depth_texture,
			uniform_bind_group_layout,
			texture_bind_group_layout,
			pipeline_layout,
			white,
			frame: None,
		})
	}

	fn texture_bind_group(&self, textures: &[Option<&WgpuTexture>]) -> wgpu::BindGroup {
		let bound: Vec<&WgpuTexture> = (0..TEXTURE_SLOTS)
			.map(|slot| textures.get(slot).copied().flatten().unwrap_or(&self.white))
			.collect();

		let entries: Vec<wgpu::BindGroupEntry> = bound
			.iter()
			.enumerate()
			.flat_map(|(slot, texture)| {
				[
					wgpu::BindGroupEntry {
						binding: slot as u32 * 2,
						resource: wgpu::BindingResource::TextureView(&texture.view),
					},
					wgpu::BindGroupEntry {
						binding: slot as u32 * 2 + 1,
						resource: wgpu::BindingResource::Sampler(&texture.sampler),
					},
				]
			})
			.collect();

		self.device.create_bind_group(&wgpu::BindGroupDescriptor {
			layout: &self.texture_bind_group_layout,
			entries: &entries,
			label: Some("texture bind group"),
		})
	}

	/// Records one draw into its own render pass and submits it.
	fn submit_draw(
		&self,
		program: Option<&WgpuProgram>,
		mesh: &WgpuMesh,
		textures: &[Option<&WgpuTexture>],
		count: u32,
		indexed: bool,
	) {
		let program = match program {
			Some(program) => program,
			None => {
				log::trace!("no program bound, skipping draw");
				return;
			}
		};
		if count == 0 {
			return;
		}
		if program.layout != mesh.layout {
			log::warn!(
				"program expects {:?} vertices but the mesh is {:?}, skipping draw",
				program.layout,
				mesh.layout
			);
			return;
		}

		let frame = match &self.frame {
			Some(frame) => frame,
			None => {
				log::warn!("draw issued outside of a frame, skipping");
				return;
			}
		};

		let texture_bind_group = self.texture_bind_group(textures);

		let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
			label: Some("Draw Encoder"),
		});

		{
			let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
				label: Some("Draw Pass"),
				color_attachments: &[Some(wgpu::RenderPassColorAttachment {
					view: &frame.view,
					resolve_target: None,
					ops: wgpu::Operations {
						load: wgpu::LoadOp::Load,
						store: true,
					},
				})],
				depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
					view: &self.depth_texture.view,
					depth_ops: Some(wgpu::Operations {
						load: wgpu::LoadOp::Load,
						store: true,
					}),
					stencil_ops: None,
				}),
			});

			render_pass.set_pipeline(&program.pipeline);
			render_pass.set_bind_group(0, &program.uniform_bind_group, &[]);
			render_pass.set_bind_group(1, &texture_bind_group, &[]);
			render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice());

			if indexed {
				render_pass.set_index_buffer(mesh.index_buffer.slice(), wgpu::IndexFormat::Uint32);
				render_pass.draw_indexed(0..count, 0, 0..1);
			} else {
				render_pass.draw(0..count, 0..1);
			}
		}

		self.queue.submit(iter::once(encoder.finish()));
	}
}

impl Backend for WgpuBackend {
	type Mesh = WgpuMesh;
	type Program = WgpuProgram;
	type Texture = WgpuTexture;

	fn viewport_size(&self) -> (u32, u32) {
		(self.config.width, self.config.height)
	}

	fn resize(&mut self, width: u32, height: u32) {
		if width > 0 && height > 0 {
			self.config.width = width;
			self.config.height = height;

			self.surface.configure(&self.device, &self.config);

			self.depth_texture = create_depth_texture(&self.device, &self.config);
		}
	}

	fn begin_frame(&mut self, clear_color: [f32; 4]) -> Result<(), RendererError> {
		// A frame that was never ended is dropped without presenting.
		self.frame = None;

		let output = self.surface.get_current_texture()?;
		let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

		let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
			label: Some("Clear Encoder"),
		});

		{
			let [r, g, b, a] = clear_color;
			let _render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
				label: Some("Clear Pass"),
				color_attachments: &[Some(wgpu::RenderPassColorAttachment {
					view: &view,
					resolve_target: None,
					ops: wgpu::Operations {
						load: wgpu::LoadOp::Clear(wgpu::Color {
							r: r as f64,
							g: g as f64,
							b: b as f64,
							a: a as f64,
						}),
						store: true,
					},
				})],
				depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
					view: &self.depth_texture.view,
					depth_ops: Some(wgpu::Operations {
						load: wgpu::LoadOp::Clear(1.0),
						store: true,
					}),
					stencil_ops: None,
				}),
			});
		}

		self.queue.submit(iter::once(encoder.finish()));
		self.frame = Some(Frame { output, view });

		Ok(())
	}

	fn end_frame(&mut self) -> Result<(), RendererError> {
		match self.frame.take() {
			Some(frame) => frame.output.present(),
			None => log::warn!("end_frame called without begin_frame"),
		}
		Ok(())
	}

	fn create_mesh(&mut self, layout: VertexLayout, vertices: &[f32], indices: &[u32]) -> WgpuMesh {
		WgpuMesh {
			layout,
			vertex_buffer: GrowableBuffer::new(&self.device, "Vertex Buffer", vertices, wgpu::BufferUsages::VERTEX),
			index_buffer: GrowableBuffer::new(&self.device, "Index Buffer", indices, wgpu::BufferUsages::INDEX),
		}
	}

	fn update_mesh(&mut self, mesh: &mut WgpuMesh, vertices: &[f32], indices: &[u32]) {
		mesh.vertex_buffer.write(&self.device, &self.queue, vertices);
		mesh.index_buffer.write(&self.device, &self.queue, indices);
	}

	fn destroy_mesh(&mut self, mesh: WgpuMesh) {
		mesh.vertex_buffer.buffer.destroy();
		mesh.index_buffer.buffer.destroy();
	}

	fn link_program(
		&mut self,
		vertex: &CompiledStage,
		fragment: &CompiledStage,
		layout: VertexLayout,
		program: &ProgramLayout,
	) -> Result<WgpuProgram, String> {
		self.device.push_error_scope(wgpu::ErrorFilter::Validation);

		let pipeline = create_render_pipeline(
			&self.device,
			&self.pipeline_layout,
			self.config.format,
			layout,
			wgpu::ShaderModuleDescriptor {
				label: Some("Vertex Shader"),
				source: wgpu::ShaderSource::Wgsl(vertex.source.as_str().into()),
			},
			wgpu::ShaderModuleDescriptor {
				label: Some("Fragment Shader"),
				source: wgpu::ShaderSource::Wgsl(fragment.source.as_str().into()),
			},
		);

		if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
			return Err(err.to_string());
		}

		let uniforms = UniformBlock::new(program.clone());
		// Uniform buffers must be non-empty and 16-byte aligned in size.
		let size = ((program.uniform_block_size.max(16) + 15) / 16 * 16) as wgpu::BufferAddress;
		let uniform_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
			label: Some("Uniform Buffer"),
			size,
			usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
			mapped_at_creation: false,
		});

		let uniform_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
			layout: &self.uniform_bind_group_layout,
			entries: &[wgpu::BindGroupEntry {
				binding: 0,
				resource: uniform_buffer.as_entire_binding(),
			}],
			label: Some("uniform bind group"),
		});

		Ok(WgpuProgram {
			layout,
			pipeline,
			uniforms,
			uniform_buffer,
			uniform_bind_group,
		})
	}

	fn destroy_program(&mut self, program: WgpuProgram) {
		program.uniform_buffer.destroy();
	}

	fn uniform_location(&self, program: &WgpuProgram, name: &str) -> Option<UniformLocation> {
		program.uniforms.location(name)
	}

	fn write_uniform(&mut self, program: &mut WgpuProgram, location: UniformLocation, value: &UniformValue) {
		if let Some(range) = program.uniforms.write(location, value) {
			self.queue.write_buffer(
				&program.uniform_buffer,
				range.start as wgpu::BufferAddress,
				&program.uniforms.bytes()[range],
			);
		}
	}

	fn create_texture(&mut self, image: &TextureImage) -> WgpuTexture {
		upload_texture(&self.device, &self.queue, image)
	}

	fn destroy_texture(&mut self, texture: WgpuTexture) {
		texture.texture.destroy();
	}

	fn draw_indexed(
		&mut self,
		program: Option<&WgpuProgram>,
		mesh: &WgpuMesh,
		textures: &[Option<&WgpuTexture>],
		index_count: u32,
	) {
		self.submit_draw(program, mesh, textures, index_count, true);
	}

	fn draw_arrays(
		&mut self,
		program: Option<&WgpuProgram>,
		mesh: &WgpuMesh,
		textures: &[Option<&WgpuTexture>],
		vertex_count: u32,
	) {
		self.submit_draw(program, mesh, textures, vertex_count, false);
	}
}

fn create_depth_texture(device: &wgpu::Device, config: &wgpu::SurfaceConfiguration) -> DepthTexture {
	let texture = device.create_texture(&wgpu::TextureDescriptor {
		label: Some("depth texture"),
		size: wgpu::Extent3d {
			width: config.width,
			height: config.height,
			depth_or_array_layers: 1,
		},
		mip_level_count: 1,
		sample_count: 1,
		dimension: wgpu::TextureDimension::D2,
		format: DEPTH_FORMAT,
		usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
	});
	let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

	DepthTexture {
		_texture: texture,
		view,
	}
}

fn upload_texture(device: &wgpu::Device, queue: &wgpu::Queue, image: &TextureImage) -> WgpuTexture {
	let texture = device.create_texture(&wgpu::TextureDescriptor {
		label: Some("texture"),
		size: wgpu::Extent3d {
			width: image.width(),
			height: image.height(),
			depth_or_array_layers: 1,
		},
		mip_level_count: image.mip_level_count(),
		sample_count: 1,
		dimension: wgpu::TextureDimension::D2,
		format: TEXTURE_FORMAT,
		usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
	});

	for (level, pixels) in image.levels.iter().enumerate() {
		let (width, height) = pixels.dimensions();
		queue.write_texture(
			wgpu::ImageCopyTexture {
				texture: &texture,
				mip_level: level as u32,
				origin: wgpu::Origin3d::ZERO,
				aspect: wgpu::TextureAspect::All,
			},
			pixels.as_raw(),
			wgpu::ImageDataLayout {
				offset: 0,
				bytes_per_row: NonZeroU32::new(4 * width),
				rows_per_image: NonZeroU32::new(height),
			},
			wgpu::Extent3d {
				width,
				height,
				depth_or_array_layers: 1,
			},
		);
	}

	let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
	let sampler = device.create_sampler(&sampler_descriptor(image.sampling));

	WgpuTexture { texture, view, sampler }
}

fn sampler_descriptor<'a>(sampling: Sampling) -> wgpu::SamplerDescriptor<'a> {
	match sampling {
		Sampling::Pixelated => wgpu::SamplerDescriptor {
			label: Some("pixelated sampler"),
			address_mode_u: wgpu::AddressMode::Repeat,
			address_mode_v: wgpu::AddressMode::Repeat,
			address_mode_w: wgpu::AddressMode::Repeat,
			mag_filter: wgpu::FilterMode::Nearest,
			min_filter: wgpu::FilterMode::Nearest,
			mipmap_filter: wgpu::FilterMode::Nearest,
			..Default::default()
		},
		Sampling::Linear => wgpu::SamplerDescriptor {
			label: Some("linear sampler"),
			address_mode_u: wgpu::AddressMode::ClampToEdge,
			address_mode_v: wgpu::AddressMode::ClampToEdge,
			address_mode_w: wgpu::AddressMode::ClampToEdge,
			mag_filter: wgpu::FilterMode::Linear,
			min_filter: wgpu::FilterMode::Linear,
			mipmap_filter: wgpu::FilterMode::Nearest,
			..Default::default()
		},
	}
}

fn create_render_pipeline(
	device: &wgpu::Device,
	layout: &wgpu::PipelineLayout,
	color_format: wgpu::TextureFormat,
	vertex_layout: VertexLayout,
	vertex_shader: wgpu::ShaderModuleDescriptor,
	fragment_shader: wgpu::ShaderModuleDescriptor,
) -> wgpu::RenderPipeline {
	let vertex_shader = device.create_shader_module(vertex_shader);
	let fragment_shader = device.create_shader_module(fragment_shader);

	// Text is drawn flat on top of the scene.
	let (cull_mode, depth_write_enabled, depth_compare) = match vertex_layout {
		VertexLayout::Mesh => (Some(wgpu::Face::Back), true, wgpu::CompareFunction::Less),
		VertexLayout::Text => (None, false, wgpu::CompareFunction::Always),
	};

	device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
		label: Some("Render Pipeline"),
		layout: Some(layout),
		vertex: wgpu::VertexState {
			module: &vertex_shader,
			entry_point: VERTEX_ENTRY_POINT,
			buffers: &[vertex_layout.desc()],
		},
		fragment: Some(wgpu::FragmentState {
			module: &fragment_shader,
			entry_point: FRAGMENT_ENTRY_POINT,
			targets: &[Some(wgpu::ColorTargetState {
				format: color_format,
				blend: Some(wgpu::BlendState::ALPHA_BLENDING),
				write_mask: wgpu::ColorWrites::ALL,
			})],
		}),
		primitive: wgpu::PrimitiveState {
			topology: wgpu::PrimitiveTopology::TriangleList,
			strip_index_format: None,
			front_face: wgpu::FrontFace::Ccw,
			cull_mode,
			polygon_mode: wgpu::PolygonMode::Fill,
			unclipped_depth: false,
			conservative: false,
		},
		depth_stencil: Some(wgpu::DepthStencilState {
			format: DEPTH_FORMAT,
			depth_write_enabled,
			depth_compare,
			stencil: wgpu::StencilState::default(),
			bias: wgpu::DepthBiasState::default(),
		}),
		multisample: wgpu::MultisampleState::default(),
		multiview: None,
	})
}
