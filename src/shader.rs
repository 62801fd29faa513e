//! WGSL stage compilation and program linking.
//!
//! Both backends share this front half: a stage "compiles" when naga parses and
//! validates it, and a pair of stages "links" when their entry points, vertex
//! inputs and uniform blocks agree. The linked [`ProgramLayout`] is what uniform
//! locations are resolved against.

use naga::valid::{Capabilities, ValidationFlags, Validator};

use crate::mesh::VertexLayout;
use crate::uniform::{UniformKind, UniformLocation};

pub const VERTEX_ENTRY_POINT: &str = "vs_main";
pub const FRAGMENT_ENTRY_POINT: &str = "fs_main";

/// Uniform blocks live at `@group(0) @binding(0)`.
pub const UNIFORM_GROUP: u32 = 0;
pub const UNIFORM_BINDING: u32 = 0;
/// Largest uniform block a program may declare, in bytes.
pub const MAX_UNIFORM_BLOCK_SIZE: u32 = 1024;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Stage {
	Vertex,
	Fragment,
}

impl Stage {
	fn naga(&self) -> naga::ShaderStage {
		match self {
			Stage::Vertex => naga::ShaderStage::Vertex,
			Stage::Fragment => naga::ShaderStage::Fragment,
		}
	}

	fn entry_point(&self) -> &'static str {
		match self {
			Stage::Vertex => VERTEX_ENTRY_POINT,
			Stage::Fragment => FRAGMENT_ENTRY_POINT,
		}
	}
}

/// A parsed and validated shader stage.
#[derive(Debug)]
pub struct CompiledStage {
	pub stage: Stage,
	pub source: String,
	pub module: naga::Module,
}

/// One member of a program's uniform block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformField {
	pub name: String,
	pub offset: u32,
	pub kind: UniformKind,
}

/// What a linked program exposes to the renderer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramLayout {
	pub uniforms: Vec<UniformField>,
	/// Size in bytes of the uniform block, zero when the program declares none.
	pub uniform_block_size: u32,
}

impl ProgramLayout {
	pub fn location(&self, name: &str) -> Option<UniformLocation> {
		self.uniforms
			.iter()
			.position(|field| field.name == name)
			.map(|index| UniformLocation(index as u32))
	}

	pub fn field(&self, location: UniformLocation) -> Option<&UniformField> {
		self.uniforms.get(location.0 as usize)
	}
}

/// Parses and validates one stage, returning the diagnostic text on failure.
pub fn compile(source: &str, stage: Stage) -> Result<CompiledStage, String> {
	let module = naga::front::wgsl::parse_str(source).map_err(|err| err.emit_to_string(source))?;

	Validator::new(ValidationFlags::all(), Capabilities::empty())
		.validate(&module)
		.map_err(|err| format!("{:?}", err))?;

	if !module.entry_points.iter().any(|ep| ep.stage == stage.naga()) {
		return Err(format!("source has no {:?} entry point", stage));
	}

	Ok(CompiledStage {
		stage,
		source: source.to_owned(),
		module,
	})
}

/// Checks that two compiled stages form a usable program for `layout`.
pub fn link(
	vertex: &CompiledStage,
	fragment: &CompiledStage,
	layout: VertexLayout,
) -> Result<ProgramLayout, String> {
	if vertex.stage != Stage::Vertex || fragment.stage != Stage::Fragment {
		return Err(format!(
			"expected a vertex and a fragment stage, got {:?} and {:?}",
			vertex.stage, fragment.stage
		));
	}

	let vertex_entry = find_entry_point(vertex, Stage::Vertex)?;
	find_entry_point(fragment, Stage::Fragment)?;

	for location in input_locations(&vertex.module, vertex_entry) {
		if location >= layout.attribute_count() {
			return Err(format!(
				"vertex input @location({}) is outside the {:?} vertex layout",
				location, layout
			));
		}
	}

	let mut program = ProgramLayout::default();
	for compiled in [vertex, fragment] {
		if let Some((fields, size)) = uniform_block(&compiled.module) {
			merge_uniforms(&mut program, fields, size)?;
		}
	}

	if program.uniform_block_size > MAX_UNIFORM_BLOCK_SIZE {
		return Err(format!(
			"uniform block is {} bytes, the limit is {}",
			program.uniform_block_size, MAX_UNIFORM_BLOCK_SIZE
		));
	}

	Ok(program)
}

fn find_entry_point(compiled: &CompiledStage, stage: Stage) -> Result<&naga::EntryPoint, String> {
	compiled
		.module
		.entry_points
		.iter()
		.find(|ep| ep.name == stage.entry_point() && ep.stage == stage.naga())
		.ok_or_else(|| format!("{:?} stage has no `{}` entry point", stage, stage.entry_point()))
}

fn input_locations(module: &naga::Module, entry: &naga::EntryPoint) -> Vec<u32> {
	let mut locations = Vec::new();
	for argument in entry.function.arguments.iter() {
		match argument.binding {
			Some(naga::Binding::Location { location, .. }) => locations.push(location),
			Some(naga::Binding::BuiltIn(_)) => {}
			None => {
				if let naga::TypeInner::Struct { ref members, .. } = module.types[argument.ty].inner {
					for member in members {
						if let Some(naga::Binding::Location { location, .. }) = member.binding {
							locations.push(location);
						}
					}
				}
			}
		}
	}
	locations
}

/// Reflects the struct bound as `var<uniform>` at the uniform group and binding.
fn uniform_block(module: &naga::Module) -> Option<(Vec<UniformField>, u32)> {
	let (_, global) = module.global_variables.iter().find(|(_, var)| {
		var.space == naga::AddressSpace::Uniform
			&& var
				.binding
				.as_ref()
				.map_or(false, |b| b.group == UNIFORM_GROUP && b.binding == UNIFORM_BINDING)
	})?;

	match module.types[global.ty].inner {
		naga::TypeInner::Struct { ref members, span } => {
			let fields = members
				.iter()
				.filter_map(|member| {
					Some(UniformField {
						name: member.name.clone()?,
						offset: member.offset,
						kind: uniform_kind(&module.types[member.ty].inner),
					})
				})
				.collect();
			Some((fields, span))
		}
		ref other => Some((
			vec![UniformField {
				name: global.name.clone().unwrap_or_default(),
				offset: 0,
				kind: uniform_kind(other),
			}],
			uniform_kind(other).size().unwrap_or(0),
		)),
	}
}

fn uniform_kind(inner: &naga::TypeInner) -> UniformKind {
	use naga::{ScalarKind, TypeInner, VectorSize};

	match *inner {
		TypeInner::Scalar {
			kind: ScalarKind::Sint,
			width: 4,
		} => UniformKind::Int,
		TypeInner::Vector {
			size,
			kind: ScalarKind::Float,
			width: 4,
		} => match size {
			VectorSize::Bi => UniformKind::Vec2,
			VectorSize::Tri => UniformKind::Vec3,
			VectorSize::Quad => UniformKind::Vec4,
		},
		TypeInner::Matrix {
			columns: VectorSize::Quad,
			rows: VectorSize::Quad,
			width: 4,
		} => UniformKind::Mat4,
		_ => UniformKind::Other,
	}
}

fn merge_uniforms(program: &mut ProgramLayout, fields: Vec<UniformField>, size: u32) -> Result<(), String> {
	for field in fields {
		match program.uniforms.iter().find(|existing| existing.name == field.name) {
			Some(existing) if *existing != field => {
				return Err(format!(
					"uniform `{}` is declared differently by the vertex and fragment stages",
					field.name
				));
			}
			Some(_) => {}
			None => program.uniforms.push(field),
		}
	}
	program.uniform_block_size = program.uniform_block_size.max(size);
	Ok(())
}
