use std::hash::Hash;

use cgmath::{InnerSpace, Vector2, Zero};
use hashbrown::HashSet;
use winit::event::{DeviceEvent, ElementState, KeyboardInput, MouseScrollDelta, VirtualKeyCode, WindowEvent};

/// Pressed / just pressed / just released tracking for one kind of button.
pub struct Input<T: Eq + Hash> {
	pressed: HashSet<T>,
	just_pressed: HashSet<T>,
	just_released: HashSet<T>,
}

impl<T: Eq + Hash> Default for Input<T> {
	fn default() -> Self {
		Self {
			pressed: Default::default(),
			just_pressed: Default::default(),
			just_released: Default::default(),
		}
	}
}

impl<T> Input<T>
	where
		T: Copy + Eq + Hash,
{
	pub fn press(&mut self, input: T) {
		if self.pressed.insert(input) {
			self.just_pressed.insert(input);
		}
	}

	pub fn pressed(&self, input: T) -> bool {
		self.pressed.contains(&input)
	}

	pub fn release(&mut self, input: T) {
		if self.pressed.remove(&input) {
			self.just_released.insert(input);
		}
	}

	pub fn release_all(&mut self) {
		self.just_released.extend(self.pressed.drain());
	}

	pub fn just_pressed(&self, input: T) -> bool {
		self.just_pressed.contains(&input)
	}

	pub fn just_released(&self, input: T) -> bool {
		self.just_released.contains(&input)
	}

	pub fn clear(&mut self) {
		self.just_pressed.clear();
		self.just_released.clear();
	}

	pub fn get_pressed(&self) -> impl ExactSizeIterator<Item=&T> {
		self.pressed.iter()
	}
}

#[derive(Debug, Hash, Eq, PartialEq, Copy, Clone)]
pub enum MouseButton {
	Left,
	Right,
	Middle,
	Other(u16),
}

impl From<winit::event::MouseButton> for MouseButton {
	fn from(button: winit::event::MouseButton) -> Self {
		match button {
			winit::event::MouseButton::Left => MouseButton::Left,
			winit::event::MouseButton::Right => MouseButton::Right,
			winit::event::MouseButton::Middle => MouseButton::Middle,
			winit::event::MouseButton::Other(n) => MouseButton::Other(n),
		}
	}
}

/// Game-level buttons, independent of the physical key or mouse button behind them.
#[derive(Debug, Hash, Eq, PartialEq, Copy, Clone)]
pub enum ActionButton {
	Menu,
	Jump,
	InteractPrimary,
	InteractSecondary,
}

impl ActionButton {
	pub fn from_key(key: VirtualKeyCode) -> Option<Self> {
		match key {
			VirtualKeyCode::Escape => Some(ActionButton::Menu),
			VirtualKeyCode::Space => Some(ActionButton::Jump),
			_ => None,
		}
	}

	pub fn from_mouse(button: MouseButton) -> Option<Self> {
		match button {
			MouseButton::Left => Some(ActionButton::InteractPrimary),
			MouseButton::Right => Some(ActionButton::InteractSecondary),
			_ => None,
		}
	}
}

/// Everything the game reads from the keyboard and mouse in one frame.
pub struct InputState {
	keys: Input<VirtualKeyCode>,
	mouse_buttons: Input<MouseButton>,
	actions: Input<ActionButton>,
	camera_delta: Vector2<f32>,
	wheel_delta: f32,
	mouse_captured: bool,
}

impl Default for InputState {
	fn default() -> Self {
		Self {
			keys: Input::default(),
			mouse_buttons: Input::default(),
			actions: Input::default(),
			camera_delta: Vector2::zero(),
			wheel_delta: 0.0,
			mouse_captured: false,
		}
	}
}

impl InputState {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns `true` if the event was consumed.
	pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
		match event {
			WindowEvent::KeyboardInput {
				input:
					KeyboardInput {
						virtual_keycode: Some(key),
						state,
						..
					},
				..
			} => {
				match state {
					ElementState::Pressed => self.press_key(*key),
					ElementState::Released => self.release_key(*key),
				}
				true
			}
			WindowEvent::MouseInput { button, state, .. } => {
				match state {
					ElementState::Pressed => self.press_mouse((*button).into()),
					ElementState::Released => self.release_mouse((*button).into()),
				}
				true
			}
			WindowEvent::MouseWheel { delta, .. } => {
				self.wheel_delta += match delta {
					MouseScrollDelta::LineDelta(_, y) => *y,
					MouseScrollDelta::PixelDelta(position) => position.y as f32,
				};
				true
			}
			WindowEvent::Focused(false) => {
				self.release_all();
				false
			}
			_ => false,
		}
	}

	pub fn handle_device_event(&mut self, event: &DeviceEvent) {
		if let DeviceEvent::MouseMotion { delta } = event {
			self.add_mouse_motion(delta.0 as f32, delta.1 as f32);
		}
	}

	pub fn press_key(&mut self, key: VirtualKeyCode) {
		self.keys.press(key);
		if let Some(action) = ActionButton::from_key(key) {
			self.actions.press(action);
		}
	}

	pub fn release_key(&mut self, key: VirtualKeyCode) {
		self.keys.release(key);
		if let Some(action) = ActionButton::from_key(key) {
			self.actions.release(action);
		}
	}

	pub fn press_mouse(&mut self, button: MouseButton) {
		self.mouse_buttons.press(button);
		if let Some(action) = ActionButton::from_mouse(button) {
			self.actions.press(action);
		}
	}

	pub fn release_mouse(&mut self, button: MouseButton) {
		self.mouse_buttons.release(button);
		if let Some(action) = ActionButton::from_mouse(button) {
			self.actions.release(action);
		}
	}

	/// Raw mouse motion only moves the camera while the cursor is captured.
	pub fn add_mouse_motion(&mut self, dx: f32, dy: f32) {
		if self.mouse_captured {
			self.camera_delta += Vector2::new(dx, dy);
		}
	}

	pub fn release_all(&mut self) {
		self.keys.release_all();
		self.mouse_buttons.release_all();
		self.actions.release_all();
	}

	pub fn key(&self, key: VirtualKeyCode) -> bool {
		self.keys.pressed(key)
	}

	pub fn mouse_button(&self, button: MouseButton) -> bool {
		self.mouse_buttons.pressed(button)
	}

	pub fn action(&self, action: ActionButton) -> bool {
		self.actions.pressed(action)
	}

	pub fn action_just_pressed(&self, action: ActionButton) -> bool {
		self.actions.just_pressed(action)
	}

	pub fn action_just_released(&self, action: ActionButton) -> bool {
		self.actions.just_released(action)
	}

	fn axis(&self, positive: VirtualKeyCode, negative: VirtualKeyCode) -> f32 {
		self.key(positive) as i32 as f32 - self.key(negative) as i32 as f32
	}

	/// W minus S.
	pub fn vertical_axis(&self) -> f32 {
		self.axis(VirtualKeyCode::W, VirtualKeyCode::S)
	}

	/// D minus A.
	pub fn horizontal_axis(&self) -> f32 {
		self.axis(VirtualKeyCode::D, VirtualKeyCode::A)
	}

	/// `(horizontal, vertical)`, unit length when any movement key is held.
	pub fn movement(&self) -> Vector2<f32> {
		let axes = Vector2::new(self.horizontal_axis(), self.vertical_axis());
		if axes.is_zero() {
			axes
		} else {
			axes.normalize()
		}
	}

	/// Mouse motion accumulated this frame.
	pub fn camera_axis(&self) -> Vector2<f32> {
		self.camera_delta
	}

	/// Mouse wheel lines scrolled this frame.
	pub fn secondary_axis(&self) -> f32 {
		self.wheel_delta
	}

	pub fn mouse_captured(&self) -> bool {
		self.mouse_captured
	}

	pub fn set_mouse_captured(&mut self, captured: bool) {
		self.mouse_captured = captured;
		if !captured {
			self.camera_delta = Vector2::zero();
		}
	}

	/// Clears the per-frame state: just pressed/released sets and deltas.
	pub fn end_frame(&mut self) {
		self.keys.clear();
		self.mouse_buttons.clear();
		self.actions.clear();
		self.camera_delta = Vector2::zero();
		self.wheel_delta = 0.0;
	}

	pub fn pressed_keys(&self) -> impl ExactSizeIterator<Item=&VirtualKeyCode> {
		self.keys.get_pressed()
	}
}
