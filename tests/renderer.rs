use cgmath::{Matrix4, SquareMatrix, Vector2, Vector3};

use diggy::font::{GlyphSource, RasterGlyph};
use diggy::{
	FontHandle, HeadlessBackend, MeshBuffer, MeshBuilder, RenderCall, Renderer, Settings, ShaderHandle, State,
	TextureHandle, MESH_FRAGMENT_SHADER, MESH_VERTEX_SHADER,
};

/// Every character is a solid box, except the ones listed in `missing`.
struct BoxFont {
	missing: &'static str,
}

impl GlyphSource for BoxFont {
	fn pixel_size(&self) -> f32 {
		12.0
	}

	fn rasterize(&self, ch: char) -> Option<RasterGlyph> {
		if self.missing.contains(ch) {
			return None;
		}
		Some(RasterGlyph {
			width: 6,
			height: 10,
			xmin: 0,
			ymin: 0,
			advance: 7.0,
			coverage: vec![255; 60],
		})
	}
}

fn renderer() -> Renderer<HeadlessBackend> {
	Renderer::new(HeadlessBackend::new(800, 600)).unwrap()
}

fn quad() -> MeshBuffer {
	let mut buffer = MeshBuffer::new();
	MeshBuilder::new(&mut buffer).add_quad(
		[
			Vector3::new(0.0, 0.0, 0.0),
			Vector3::new(1.0, 0.0, 0.0),
			Vector3::new(0.0, 1.0, 0.0),
			Vector3::new(1.0, 1.0, 0.0),
		],
		[Vector3::new(1.0, 1.0, 1.0); 4],
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

fn white() -> Vector3<f32> {
	Vector3::new(1.0, 1.0, 1.0)
}

#[test]
fn quad_draws_six_indices_with_the_bound_shader() {
	let mut renderer = renderer();
	let shader = renderer.upload_shader(MESH_VERTEX_SHADER, MESH_FRAGMENT_SHADER).unwrap();
	let mesh = renderer.upload_mesh(&quad());

	renderer.use_shader(shader);
	renderer.set_uniform("u_Model", Matrix4::identity());
	renderer.render_mesh(mesh);

	let calls = renderer.backend().calls();
	assert!(calls.iter().any(|call| matches!(call, RenderCall::WriteUniform { .. })));
	match renderer.backend().last_draw() {
		Some(RenderCall::DrawIndexed {
			program: Some(_),
			index_count,
			textures,
			..
		}) => {
			assert_eq!(*index_count, 6);
			assert!(textures.iter().all(Option::is_none));
		}
		other => panic!("unexpected draw {:?}", other),
	}
}

#[test]
fn empty_meshes_still_issue_a_draw() {
	let mut renderer = renderer();
	let mesh = renderer.upload_mesh(&MeshBuffer::new());
	renderer.render_mesh(mesh);

	assert!(matches!(
		renderer.backend().last_draw(),
		Some(RenderCall::DrawIndexed { index_count: 0, .. })
	));
}

#[test]
fn reuploaded_shader_reuses_the_slot_with_a_fresh_cache() {
	let mut renderer = renderer();
	let first = renderer.upload_shader(MESH_VERTEX_SHADER, MESH_FRAGMENT_SHADER).unwrap();
	renderer.use_shader(first);
	assert!(renderer.get_location("u_ViewProj").is_some());

	renderer.delete_shader(first);
	let second = renderer.upload_shader(MESH_VERTEX_SHADER, MESH_FRAGMENT_SHADER).unwrap();
	assert_eq!(first, second);
	assert!(!renderer.shader_is_dead(second));

	let cache = &renderer.shader(second).unwrap().uniforms;
	assert_eq!(cache.cached("u_ViewProj"), None);

	renderer.use_shader(second);
	assert!(renderer.get_location("u_ViewProj").is_some());
}

#[test]
fn text_batches_draw_once_with_the_atlas_in_slot_zero() {
	let mut renderer = renderer();
	let font = renderer.upload_font_source(&BoxFont { missing: "" });
	let atlas_id = renderer
		.backend()
		.calls()
		.iter()
		.rev()
		.find_map(|call| match call {
			RenderCall::CreateTexture { id, .. } => Some(*id),
			_ => None,
		})
		.unwrap();

	renderer.render_text(font, "AB", 10.0, 10.0, white());

	assert_eq!(renderer.backend().draws().count(), 1);
	match renderer.backend().last_draw() {
		Some(RenderCall::DrawArrays {
			program: Some(_),
			vertex_count,
			textures,
			..
		}) => {
			assert_eq!(*vertex_count, 12);
			assert_eq!(textures[0], Some(atlas_id));
		}
		other => panic!("unexpected draw {:?}", other),
	}
}

#[test]
fn text_does_not_disturb_mesh_bindings() {
	let mut renderer = renderer();
	let shader = renderer.upload_shader(MESH_VERTEX_SHADER, MESH_FRAGMENT_SHADER).unwrap();
	let font = renderer.upload_font_source(&BoxFont { missing: "" });
	renderer.use_shader(shader);

	renderer.render_text(font, "hi", 0.0, 0.0, white());

	assert_eq!(renderer.bound_shader(), Some(shader));
	assert_eq!(renderer.bound_texture(0), None);
}

#[test]
fn text_mesh_is_created_once_and_then_updated() {
	let mut renderer = renderer();
	let font = renderer.upload_font_source(&BoxFont { missing: "" });

	renderer.render_text(font, "one", 0.0, 0.0, white());
	assert_eq!(renderer.backend().count_mesh_creates(), 1);

	renderer.backend_mut().clear_calls();
	renderer.render_text(font, "three", 0.0, 0.0, white());

	let calls = renderer.backend().calls();
	assert_eq!(renderer.backend().count_mesh_creates(), 0);
	assert!(calls
		.iter()
		.any(|call| matches!(call, RenderCall::UpdateMesh { vertex_count: 30, .. })));
	assert!(matches!(
		renderer.backend().last_draw(),
		Some(RenderCall::DrawArrays { vertex_count: 30, .. })
	));
}

#[test]
fn batches_collect_several_strings() {
	let mut renderer = renderer();
	let font = renderer.upload_font_source(&BoxFont { missing: "?" });

	renderer.batch_begin(font);
	renderer.add_text("ab", 0.0, 0.0, white());
	renderer.add_text("c?", 0.0, 20.0, white());
	renderer.batch_end();

	assert_eq!(renderer.batch_len(), None);
	assert!(matches!(
		renderer.backend().last_draw(),
		Some(RenderCall::DrawArrays { vertex_count: 18, .. })
	));
}

#[test]
fn add_text_without_a_batch_does_nothing() {
	let mut renderer = renderer();
	let font = renderer.upload_font_source(&BoxFont { missing: "" });

	renderer.add_text("lost", 0.0, 0.0, white());
	renderer.batch_end();
	assert_eq!(renderer.backend().draws().count(), 0);

	renderer.batch_begin(FontHandle::INVALID);
	renderer.add_text("lost", 0.0, 0.0, white());
	assert_eq!(renderer.batch_len(), None);

	renderer.batch_begin(font);
	renderer.batch_end();
	assert_eq!(renderer.backend().draws().count(), 0);
}

#[test]
fn unreadable_assets_give_invalid_handles() {
	let dir = tempfile::tempdir().unwrap();
	let garbage = dir.path().join("garbage.bin");
	std::fs::write(&garbage, b"definitely not an image or a font").unwrap();

	let mut renderer = renderer();
	assert_eq!(renderer.upload_texture(dir.path().join("missing.png"), false), TextureHandle::INVALID);
	assert_eq!(renderer.upload_texture(&garbage, false), TextureHandle::INVALID);
	assert_eq!(renderer.upload_font(dir.path().join("missing.ttf"), 16.0), FontHandle::INVALID);
	assert_eq!(renderer.upload_font(&garbage, 16.0), FontHandle::INVALID);

	assert_eq!(renderer.backend().count_texture_creates(), 0);
}

#[test]
fn deleting_a_font_frees_its_atlas_and_mesh() {
	let mut renderer = renderer();
	let font = renderer.upload_font_source(&BoxFont { missing: "" });
	renderer.render_text(font, "x", 0.0, 0.0, white());

	assert_eq!(renderer.backend().live_textures(), 1);
	assert_eq!(renderer.backend().live_meshes(), 1);

	renderer.delete_font(font);
	renderer.delete_font(font);

	assert!(renderer.font_is_dead(font));
	assert_eq!(renderer.backend().live_textures(), 0);
	assert_eq!(renderer.backend().live_meshes(), 0);
}

#[test]
fn font_atlases_stay_out_of_the_texture_pool() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("user.png");
	image::RgbaImage::new(8, 8).save(&path).unwrap();

	let mut renderer = renderer();
	let font = renderer.upload_font_source(&BoxFont { missing: "" });
	let atlas_id = match renderer.backend().calls().last() {
		Some(RenderCall::CreateTexture { id, .. }) => *id,
		other => panic!("unexpected call {:?}", other),
	};

	// The first texture slot is free, so there is no atlas handle to delete.
	renderer.delete_texture(TextureHandle(0));
	let user = renderer.upload_texture(&path, false);
	assert_eq!(user, TextureHandle(0));

	renderer.render_text(font, "A", 0.0, 0.0, white());
	match renderer.backend().last_draw() {
		Some(RenderCall::DrawArrays { textures, .. }) => assert_eq!(textures[0], Some(atlas_id)),
		other => panic!("unexpected draw {:?}", other),
	}

	renderer.delete_font(font);
	assert!(renderer.texture(user).is_some());
	assert!(!renderer.texture_is_dead(user));
	assert_eq!(renderer.backend().live_textures(), 1);
}

#[test]
fn truetype_fonts_draw_through_the_batcher() {
	let path = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data/DejaVuSansMono.ttf");
	let mut renderer = renderer();
	let font = renderer.upload_font(path, 16.0);
	assert!(!font.is_invalid());
	assert_eq!(renderer.font(font).unwrap().glyphs.len(), 95);

	renderer.render_text(font, "Hi", 4.0, 4.0, white());
	assert!(matches!(
		renderer.backend().last_draw(),
		Some(RenderCall::DrawArrays { vertex_count: 12, .. })
	));
}

#[test]
fn delete_all_releases_every_resource() {
	let mut renderer = renderer();
	let shader = renderer.upload_shader(MESH_VERTEX_SHADER, MESH_FRAGMENT_SHADER).unwrap();
	let mesh = renderer.upload_mesh(&quad());
	let font = renderer.upload_font_source(&BoxFont { missing: "" });
	renderer.render_text(font, "x", 0.0, 0.0, white());
	renderer.use_shader(shader);

	renderer.delete_all();

	assert_eq!(renderer.backend().live_meshes(), 0);
	assert_eq!(renderer.backend().live_textures(), 0);
	assert_eq!(renderer.backend().live_programs(), 1);
	assert_eq!(renderer.bound_shader(), None);
	assert!(renderer.mesh(mesh).is_none());
	assert!(renderer.font(font).is_none());

	renderer.backend_mut().clear_calls();
	renderer.render_mesh(mesh);
	renderer.render_text(font, "x", 0.0, 0.0, white());
	assert_eq!(renderer.backend().draws().count(), 0);

	assert_eq!(renderer.upload_mesh(&quad()), mesh);
}

#[test]
fn deletes_are_idempotent() {
	let mut renderer = renderer();
	let shader = renderer.upload_shader(MESH_VERTEX_SHADER, MESH_FRAGMENT_SHADER).unwrap();
	let mesh = renderer.upload_mesh(&quad());

	renderer.delete_mesh(mesh);
	renderer.delete_mesh(mesh);
	renderer.delete_shader(shader);
	renderer.delete_shader(shader);
	renderer.delete_shader(ShaderHandle::INVALID);

	assert!(renderer.mesh_is_dead(mesh));
	assert_eq!(renderer.backend().live_meshes(), 0);
	// Only the built-in text program is left.
	assert_eq!(renderer.backend().live_programs(), 1);
}

#[test]
fn demo_state_renders_a_frame_without_assets() {
	let dir = tempfile::tempdir().unwrap();
	let settings = Settings {
		asset_root: dir.path().to_path_buf(),
		clear_color: [0.0, 0.0, 0.0, 1.0],
		..Settings::default()
	};

	let mut state = State::new(renderer(), &settings).unwrap();
	assert!(state.font().is_invalid());

	state.update();
	state.render().unwrap();

	let backend = state.renderer.backend();
	assert!(backend.calls().contains(&RenderCall::BeginFrame {
		clear_color: [0.0, 0.0, 0.0, 1.0]
	}));
	assert_eq!(backend.calls().last(), Some(&RenderCall::EndFrame));
	assert_eq!(backend.draws().count(), 1);
	assert!(matches!(
		backend.last_draw(),
		Some(RenderCall::DrawIndexed { index_count: 6, .. })
	));
}
