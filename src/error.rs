use std::path::PathBuf;

/// Failures reported by the renderer.
///
/// `Initialization` is fatal: the renderer cannot be constructed. Every other
/// variant is recoverable and leaves existing resources untouched.
#[derive(Debug, thiserror::Error)]
pub enum RendererError {
	#[error("renderer initialization failed: {0}")]
	Initialization(String),

	#[error("vertex shader failed to compile:\n{0}")]
	VertexCompile(String),

	#[error("fragment shader failed to compile:\n{0}")]
	FragmentCompile(String),

	#[error("shader program failed to link: {0}")]
	Link(String),

	#[error("could not decode texture {path:?}: {source}")]
	TextureDecode {
		path: PathBuf,
		#[source]
		source: image::ImageError,
	},

	#[error("could not open font {path:?}: {reason}")]
	FontOpen { path: PathBuf, reason: String },

	#[error("surface error: {0}")]
	Surface(#[from] wgpu::SurfaceError),
}
