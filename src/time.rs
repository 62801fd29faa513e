use std::time::Duration;

use instant::Instant;

/// Frame timing, updated once per redraw.
#[derive(Debug, Clone)]
pub struct Time {
	delta: Duration,
	last_update: Option<Instant>,
	time_since_startup: Duration,
	startup: Instant,
}

impl Default for Time {
	fn default() -> Self {
		Self::starting_at(Instant::now())
	}
}

impl Time {
	pub fn starting_at(startup: Instant) -> Self {
		Self {
			delta: Duration::ZERO,
			last_update: None,
			time_since_startup: Duration::ZERO,
			startup,
		}
	}

	pub fn update(&mut self) {
		self.update_with_instant(Instant::now());
	}

	/// The first update after startup leaves the delta at zero.
	pub fn update_with_instant(&mut self, instant: Instant) {
		if let Some(last_update) = self.last_update {
			self.delta = instant.saturating_duration_since(last_update);
		}

		self.time_since_startup = instant.saturating_duration_since(self.startup);
		self.last_update = Some(instant);
	}

	pub fn delta(&self) -> Duration {
		self.delta
	}

	pub fn delta_seconds(&self) -> f32 {
		self.delta.as_secs_f32()
	}

	pub fn seconds_since_startup(&self) -> f64 {
		self.time_since_startup.as_secs_f64()
	}
}

#[cfg(test)]
mod tests {
	use approx::assert_relative_eq;

	use super::*;

	#[test]
	fn delta_tracks_the_previous_update() {
		let start = Instant::now();
		let mut time = Time::starting_at(start);

		time.update_with_instant(start + Duration::from_millis(100));
		assert_eq!(time.delta(), Duration::ZERO);

		time.update_with_instant(start + Duration::from_millis(350));
		assert_eq!(time.delta(), Duration::from_millis(250));
		assert_relative_eq!(time.delta_seconds(), 0.25);
		assert_relative_eq!(time.seconds_since_startup(), 0.35);
	}
}
