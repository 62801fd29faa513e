use anyhow::Context;
use cgmath::{Deg, Matrix4, Rad, Vector2, Vector3};
use winit::{
	dpi::PhysicalSize,
	event::*,
	event_loop::{ControlFlow, EventLoop},
	window::{Fullscreen, Window, WindowBuilder},
};

pub mod backend;
pub mod camera;
pub mod error;
pub mod font;
pub mod handle;
pub mod input;
pub mod mesh;
pub mod renderer;
pub mod settings;
pub mod shader;
pub mod text;
pub mod texture;
pub mod time;
pub mod uniform;

pub use backend::{Backend, HeadlessBackend, RenderCall, WgpuBackend};
pub use error::RendererError;
pub use handle::{FontHandle, MeshHandle, ShaderHandle, TextureHandle};
pub use mesh::{MeshBuffer, MeshBuilder, VertexLayout};
pub use renderer::{FpsCounter, Renderer};
pub use settings::Settings;
pub use uniform::UniformValue;

use camera::{Camera, Projection};
use input::{ActionButton, InputState};

pub const MESH_VERTEX_SHADER: &str = include_str!("shaders/mesh_vert.wgsl");
pub const MESH_FRAGMENT_SHADER: &str = include_str!("shaders/mesh_frag.wgsl");

const CAMERA_SPEED: f32 = 2.0;
const QUAD_SPIN: f32 = 0.5;

/// A quad spinning in front of a fly camera, with an FPS readout.
pub struct State<B: Backend> {
	pub renderer: Renderer<B>,
	pub input: InputState,
	camera: Camera,
	projection: Projection,
	mouse_sensitivity: f32,

	shader: ShaderHandle,
	quad: MeshHandle,
	texture: TextureHandle,
	font: FontHandle,

	time: time::Time,
	fps: FpsCounter,
}

impl<B: Backend> State<B> {
	pub fn new(mut renderer: Renderer<B>, settings: &Settings) -> Result<Self, RendererError> {
		renderer.set_clear_color(settings.clear_color);

		let shader = renderer.upload_shader(MESH_VERTEX_SHADER, MESH_FRAGMENT_SHADER)?;
		let quad = renderer.upload_mesh(&demo_quad());
		let texture = renderer.upload_texture(settings.asset("textures/quad.png"), true);
		let font = renderer.upload_font(settings.font_path(), settings.font.pixel_size);

		let (width, height) = renderer.viewport_size();

		Ok(Self {
			renderer,
			input: InputState::new(),
			camera: Camera::new((0.0, 0.0, 3.0), Deg(-90.0), Deg(0.0)),
			projection: Projection::new(width, height, Deg(45.0), 0.1, 100.0),
			mouse_sensitivity: settings.mouse_sensitivity,
			shader,
			quad,
			texture,
			font,
			time: Default::default(),
			fps: FpsCounter::new(),
		})
	}

	pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
		if new_size.width > 0 && new_size.height > 0 {
			self.renderer.resize(new_size.width, new_size.height);
			self.projection.resize(new_size.width, new_size.height);
		}
	}

	/// Returns `true` if the event was consumed.
	pub fn input(&mut self, event: &WindowEvent) -> bool {
		self.input.handle_window_event(event)
	}

	pub fn update(&mut self) {
		self.time.update();

		if self.input.action_just_pressed(ActionButton::Menu) {
			let captured = !self.input.mouse_captured();
			self.input.set_mouse_captured(captured);
		}

		self.camera
			.update(&self.input, self.mouse_sensitivity, CAMERA_SPEED, self.time.delta_seconds());
	}

	pub fn render(&mut self) -> Result<(), RendererError> {
		let result = self.draw();
		self.input.end_frame();
		result
	}

	fn draw(&mut self) -> Result<(), RendererError> {
		let fps = self.fps.tick();
		let spin = Rad(self.time.seconds_since_startup() as f32 * QUAD_SPIN);

		self.renderer.begin_frame()?;

		self.renderer.use_shader(self.shader);
		self.renderer
			.set_uniform("u_ViewProj", self.projection.calc_matrix() * self.camera.calc_matrix());
		self.renderer.set_uniform("u_Model", Matrix4::from_angle_z(spin));
		self.renderer.set_sampler("t_diffuse", 0, self.texture);
		self.renderer.render_mesh(self.quad);

		if !self.font.is_invalid() {
			self.renderer
				.render_text(self.font, &format!("FPS: {}", fps), 8.0, 8.0, Vector3::new(1.0, 1.0, 1.0));
		}

		self.renderer.end_frame()
	}

	pub fn font(&self) -> FontHandle {
		self.font
	}
}

fn demo_quad() -> MeshBuffer {
	let mut buffer = MeshBuffer::new();
	MeshBuilder::new(&mut buffer).add_quad(
		[
			Vector3::new(-0.5, -0.5, 0.0),
			Vector3::new(0.5, -0.5, 0.0),
			Vector3::new(-0.5, 0.5, 0.0),
			Vector3::new(0.5, 0.5, 0.0),
		],
		[
			Vector3::new(1.0, 0.2, 0.2),
			Vector3::new(0.2, 1.0, 0.2),
			Vector3::new(0.2, 0.2, 1.0),
			Vector3::new(1.0, 1.0, 1.0),
		],
		[
			Vector2::new(0.0, 1.0),
			Vector2::new(1.0, 1.0),
			Vector2::new(0.0, 0.0),
			Vector2::new(1.0, 0.0),
		],
		Vector3::unit_z(),
	);
	buffer
}

fn sync_cursor(window: &Window, captured: bool) {
	if let Err(err) = window.set_cursor_grab(captured) {
		log::warn!("could not change cursor grab: {}", err);
	}
	window.set_cursor_visible(!captured);
}

pub fn run() -> anyhow::Result<()> {
	env_logger::init();

	let settings = Settings::from_args(std::env::args())?;

	let event_loop = EventLoop::new();
	let mut builder = WindowBuilder::new()
		.with_title(&settings.window.title)
		.with_inner_size(PhysicalSize::new(settings.window.width, settings.window.height));
	if settings.window.fullscreen {
		builder = builder.with_fullscreen(Some(Fullscreen::Borderless(None)));
	}
	let window = builder.build(&event_loop).context("failed to create window")?;

	let renderer = Renderer::new(WgpuBackend::new(&window)?)?;
	let mut state = State::new(renderer, &settings)?;
	let mut cursor_captured = false;

	event_loop.run(move |event, _, control_flow| match event {
		Event::WindowEvent {
			ref event,
			window_id,
		} if window_id == window.id() && !state.input(event) => match event {
			WindowEvent::CloseRequested => *control_flow = ControlFlow::Exit,
			WindowEvent::Resized(size) => {
				state.resize(*size);
			}
			WindowEvent::ScaleFactorChanged { new_inner_size, .. } => {
				state.resize(**new_inner_size);
			}
			_ => {}
		},
		Event::DeviceEvent { ref event, .. } => {
			state.input.handle_device_event(event);
		}
		Event::RedrawRequested(window_id) if window_id == window.id() => {
			state.update();
			if state.input.mouse_captured() != cursor_captured {
				cursor_captured = state.input.mouse_captured();
				sync_cursor(&window, cursor_captured);
			}

			match state.render() {
				Ok(_) => {}
				// Reconfigure the surface if lost
				Err(RendererError::Surface(wgpu::SurfaceError::Lost)) => state.resize(window.inner_size()),
				Err(RendererError::Surface(wgpu::SurfaceError::OutOfMemory)) => *control_flow = ControlFlow::Exit,
				// Outdated and Timeout go away by the next frame
				Err(e) => log::error!("{}", e),
			}
		}
		Event::MainEventsCleared => {
			window.request_redraw();
		}
		_ => {}
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn demo_quad_is_two_triangles() {
		let quad = demo_quad();
		assert_eq!(quad.vertex_count(), 4);
		assert_eq!(quad.indices, vec![0, 1, 2, 2, 1, 3]);
	}
}
