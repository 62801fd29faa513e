use std::f32::consts::FRAC_PI_2;

use cgmath::{perspective, InnerSpace, Matrix4, Point3, Rad, Vector3};

use crate::input::InputState;

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
	1.0, 0.0, 0.0, 0.0,
	0.0, 1.0, 0.0, 0.0,
	0.0, 0.0, 0.5, 0.0,
	0.0, 0.0, 0.5, 1.0,
);

const SAFE_FRAC_PI_2: f32 = FRAC_PI_2 - 0.0001;

#[derive(Debug)]
pub struct Camera {
	pub position: Point3<f32>,
	yaw: Rad<f32>,
	pitch: Rad<f32>,
}

impl Camera {
	pub fn new<V: Into<Point3<f32>>, Y: Into<Rad<f32>>, P: Into<Rad<f32>>>(position: V, yaw: Y, pitch: P) -> Self {
		Self {
			position: position.into(),
			yaw: yaw.into(),
			pitch: pitch.into(),
		}
	}

	pub fn forward(&self) -> Vector3<f32> {
		let (sin_pitch, cos_pitch) = self.pitch.0.sin_cos();
		let (sin_yaw, cos_yaw) = self.yaw.0.sin_cos();
		Vector3::new(cos_pitch * cos_yaw, sin_pitch, cos_pitch * sin_yaw).normalize()
	}

	pub fn calc_matrix(&self) -> Matrix4<f32> {
		Matrix4::look_to_rh(self.position, self.forward(), Vector3::unit_y())
	}

	pub fn pitch(&self) -> Rad<f32> {
		self.pitch
	}

	/// Flies along the ground plane with WASD and turns with the captured mouse.
	pub fn update(&mut self, input: &InputState, sensitivity: f32, speed: f32, dt: f32) {
		let (yaw_sin, yaw_cos) = self.yaw.0.sin_cos();
		let forward = Vector3::new(yaw_cos, 0.0, yaw_sin);
		let right = Vector3::new(-yaw_sin, 0.0, yaw_cos);
		let movement = input.movement();
		self.position += (forward * movement.y + right * movement.x) * speed * dt;
		self.position.y += input.secondary_axis() * speed * 0.1;

		let turn = input.camera_axis();
		self.yaw += Rad(turn.x * sensitivity * dt);
		self.pitch += Rad(-turn.y * sensitivity * dt);

		if self.pitch < -Rad(SAFE_FRAC_PI_2) {
			self.pitch = -Rad(SAFE_FRAC_PI_2);
		} else if self.pitch > Rad(SAFE_FRAC_PI_2) {
			self.pitch = Rad(SAFE_FRAC_PI_2);
		}
	}
}

#[derive(Debug)]
pub struct Projection {
	aspect: f32,
	fovy: Rad<f32>,
	znear: f32,
	zfar: f32,
}

impl Projection {
	pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
		Self {
			aspect: width as f32 / height.max(1) as f32,
			fovy: fovy.into(),
			znear,
			zfar,
		}
	}

	pub fn resize(&mut self, width: u32, height: u32) {
		if height > 0 {
			self.aspect = width as f32 / height as f32;
		}
	}

	pub fn aspect(&self) -> f32 {
		self.aspect
	}

	pub fn calc_matrix(&self) -> Matrix4<f32> {
		OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar)
	}
}

#[cfg(test)]
mod tests {
	use approx::assert_relative_eq;
	use cgmath::{Deg, Vector4};
	use winit::event::VirtualKeyCode;

	use super::*;

	#[test]
	fn pitch_is_clamped_short_of_vertical() {
		let mut camera = Camera::new((0.0, 0.0, 0.0), Deg(-90.0), Deg(0.0));
		let mut input = InputState::new();
		input.set_mouse_captured(true);
		input.add_mouse_motion(0.0, -100_000.0);

		camera.update(&input, 1.0, 1.0, 1.0);
		assert_relative_eq!(camera.pitch().0, SAFE_FRAC_PI_2);
	}

	#[test]
	fn forward_key_moves_along_the_view_direction() {
		let mut camera = Camera::new((0.0, 0.0, 0.0), Deg(-90.0), Deg(0.0));
		let mut input = InputState::new();
		input.press_key(VirtualKeyCode::W);

		camera.update(&input, 1.0, 2.0, 0.5);
		assert_relative_eq!(camera.position.z, -1.0, epsilon = 1e-5);
		assert_relative_eq!(camera.position.x, 0.0, epsilon = 1e-5);
	}

	#[test]
	fn projection_maps_near_plane_to_zero_depth() {
		let projection = Projection::new(800, 600, Deg(45.0), 0.1, 100.0);
		let clip = projection.calc_matrix() * Vector4::new(0.0, 0.0, -0.1, 1.0);
		assert_relative_eq!(clip.z / clip.w, 0.0, epsilon = 1e-4);
	}

	#[test]
	fn resize_keeps_aspect_for_zero_height() {
		let mut projection = Projection::new(800, 600, Deg(45.0), 0.1, 100.0);
		projection.resize(1000, 0);
		assert_relative_eq!(projection.aspect(), 800.0 / 600.0);
		projection.resize(1000, 500);
		assert_relative_eq!(projection.aspect(), 2.0);
	}
}
