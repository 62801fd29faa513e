use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SETTINGS_PATH: &str = "settings.ron";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSettings {
	pub title: String,
	pub width: u32,
	pub height: u32,
	pub fullscreen: bool,
}

impl Default for WindowSettings {
	fn default() -> Self {
		Self {
			title: "Diggy".into(),
			width: 1080,
			height: 720,
			fullscreen: false,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontSettings {
	/// Relative to the asset root.
	pub path: PathBuf,
	pub pixel_size: f32,
}

impl Default for FontSettings {
	fn default() -> Self {
		Self {
			path: PathBuf::from("fonts/Silkscreen-Regular.ttf"),
			pixel_size: 16.0,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
	pub window: WindowSettings,
	pub clear_color: [f32; 4],
	pub asset_root: PathBuf,
	pub font: FontSettings,
	pub mouse_sensitivity: f32,
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			window: WindowSettings::default(),
			clear_color: [0.1, 0.2, 0.3, 1.0],
			asset_root: PathBuf::from("res"),
			font: FontSettings::default(),
			mouse_sensitivity: 0.4,
		}
	}
}

impl Settings {
	/// Reads a RON settings file. A missing file yields the defaults.
	pub fn load(path: &Path) -> anyhow::Result<Self> {
		if !path.exists() {
			log::info!("{} not found, using default settings", path.display());
			return Ok(Self::default());
		}

		let contents = std::fs::read_to_string(path)
			.with_context(|| format!("failed to read settings from {}", path.display()))?;
		let settings = ron::from_str(&contents)
			.with_context(|| format!("failed to parse settings in {}", path.display()))?;

		log::info!("loaded settings from {}", path.display());
		Ok(settings)
	}

	/// Loads from the path given as the first argument, or [`DEFAULT_SETTINGS_PATH`].
	pub fn from_args(mut args: impl Iterator<Item = String>) -> anyhow::Result<Self> {
		let path = args
			.nth(1)
			.map(PathBuf::from)
			.unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_PATH));
		Self::load(&path)
	}

	pub fn save(&self, path: &Path) -> anyhow::Result<()> {
		let contents = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
			.context("failed to serialize settings")?;
		std::fs::write(path, contents)
			.with_context(|| format!("failed to write settings to {}", path.display()))
	}

	pub fn asset(&self, relative: impl AsRef<Path>) -> PathBuf {
		self.asset_root.join(relative)
	}

	pub fn font_path(&self) -> PathBuf {
		self.asset(&self.font.path)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn missing_file_means_defaults() {
		let dir = tempfile::tempdir().unwrap();
		let settings = Settings::load(&dir.path().join("nope.ron")).unwrap();
		assert_eq!(settings, Settings::default());
	}

	#[test]
	fn partial_files_fill_in_defaults() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("settings.ron");
		std::fs::write(&path, "(window: (title: \"Test\"), mouse_sensitivity: 1.5)").unwrap();

		let settings = Settings::load(&path).unwrap();
		assert_eq!(settings.window.title, "Test");
		assert_eq!(settings.window.width, 1080);
		assert_eq!(settings.mouse_sensitivity, 1.5);
		assert_eq!(settings.font_path(), PathBuf::from("res/fonts/Silkscreen-Regular.ttf"));
	}

	#[test]
	fn malformed_files_are_errors() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("settings.ron");
		std::fs::write(&path, "(window: 12").unwrap();

		let err = Settings::load(&path).unwrap_err();
		assert!(format!("{:#}", err).contains("failed to parse settings"));
	}

	#[test]
	fn saved_settings_load_back() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("settings.ron");
		let mut settings = Settings::default();
		settings.window.fullscreen = true;
		settings.clear_color = [0.0, 0.0, 0.0, 1.0];

		settings.save(&path).unwrap();
		assert_eq!(Settings::load(&path).unwrap(), settings);
	}

	#[test]
	fn first_argument_names_the_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("custom.ron");
		std::fs::write(&path, "(asset_root: \"assets\")").unwrap();

		let args = vec!["diggy".to_string(), path.display().to_string()];
		let settings = Settings::from_args(args.into_iter()).unwrap();
		assert_eq!(settings.asset_root, PathBuf::from("assets"));
	}
}
