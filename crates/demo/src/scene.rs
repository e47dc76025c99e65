use bindless_renderer_core::descriptor::{BufferClass, SlotHandle};
use bindless_renderer_core::frame::{FrameError, FrameManager, FrameRecording, PushConstants};
use bindless_renderer_core::platform::{IndexType, PresentPlatform};
use bindless_renderer_core::resource::{Buffer, BufferUsage, Extent2D, Image};
use bindless_renderer_scene::entity::Entity;
use bindless_renderer_scene::world::World;
use bytemuck_derive::{Pod, Zeroable};
use glam::{Mat4, Vec3};

/// Model matrix of an entity
#[derive(Copy, Clone, Debug)]
pub struct Transform(pub Mat4);

/// A mesh whose vertices live in a storage buffer slot of the bindless table.
#[derive(Copy, Clone, Debug)]
pub struct MeshRef {
	pub vertices: SlotHandle,
	pub index_count: u32,
}

/// Rotation around the y axis in radians per second
#[derive(Copy, Clone, Debug)]
pub struct Spin(pub f32);

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Vertex {
	pub position: [f32; 4],
	pub uv: [f32; 4],
}

/// Lives in the first uniform buffer slot, so shaders find it at index 0 of binding 0.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct SceneGlobals {
	pub texture: u32,
	pub _pad: [u32; 3],
}

const SPACING: f32 = 2.5;
const CHECKER_SIZE: u32 = 8;

/// A unit cube with 4 vertices per face, so each face gets its own uv.
pub fn cube() -> (Vec<Vertex>, Vec<u16>) {
	let mut vertices = Vec::with_capacity(24);
	let mut indices = Vec::with_capacity(36);
	for normal in [Vec3::X, Vec3::NEG_X, Vec3::Y, Vec3::NEG_Y, Vec3::Z, Vec3::NEG_Z] {
		let tangent = if normal.y.abs() > 0.5 {
			Vec3::X
		} else {
			normal.cross(Vec3::Y)
		};
		let bitangent = normal.cross(tangent);
		let base = vertices.len() as u16;
		for (u, v) in [(0., 0.), (1., 0.), (1., 1.), (0., 1.)] {
			let p = (normal + tangent * (u * 2. - 1.) + bitangent * (v * 2. - 1.)) * 0.5;
			vertices.push(Vertex {
				position: [p.x, p.y, p.z, 1.],
				uv: [u, v, 0., 0.],
			});
		}
		indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
	}
	(vertices, indices)
}

fn checkerboard() -> Vec<u8> {
	(0..CHECKER_SIZE * CHECKER_SIZE)
		.map(|i| if (i % CHECKER_SIZE + i / CHECKER_SIZE) % 2 == 0 { 230 } else { 40 })
		.collect()
}

/// The demo's entities and the GPU resources they reference. The resources are owned here, the entities only hold
/// their table slots.
pub struct DemoScene<P: PresentPlatform> {
	world: World,
	vertices: Buffer<P>,
	indices: Buffer<P>,
	globals: Buffer<P>,
	texture: Image<P>,
	slots: Vec<SlotHandle>,
	time: f32,
}

impl<P: PresentPlatform> DemoScene<P> {
	pub fn new(manager: &FrameManager<P>, entities: u32) -> anyhow::Result<Self> {
		profiling::function_scope!();
		let platform = manager.platform();
		let table = manager.table();
		let (cube_vertices, cube_indices) = cube();
		let vertices = Buffer::from_slice(platform, BufferUsage::STORAGE, "cube vertices", &cube_vertices)?;
		let indices = Buffer::from_slice(platform, BufferUsage::INDEX, "cube indices", &cube_indices)?;
		let texture = manager.create_texture(
			&checkerboard(),
			Extent2D::new(CHECKER_SIZE, CHECKER_SIZE),
			1,
			"checkerboard",
		)?;

		let texture_slot = table.register_image(&texture, None)?;
		let globals = Buffer::from_slice(
			platform,
			BufferUsage::UNIFORM,
			"scene globals",
			&[SceneGlobals {
				texture: texture_slot.index(),
				_pad: [0; 3],
			}],
		)?;
		let globals_slot = table.register_buffer(&globals, 0, None, BufferClass::Uniform)?;
		let vertices_slot = table.register_buffer(&vertices, 0, None, BufferClass::Storage)?;

		let mut world = World::new();
		let mesh = MeshRef {
			vertices: vertices_slot,
			index_count: cube_indices.len() as u32,
		};
		let columns = (entities as f32).sqrt().ceil().max(1.) as u32;
		for i in 0..entities {
			let entity = world.spawn()?;
			let (x, y) = ((i % columns) as f32, (i / columns) as f32);
			let offset = (columns - 1) as f32 * SPACING * 0.5;
			let position = Vec3::new(x * SPACING - offset, y * SPACING - offset, 0.);
			world.insert(entity, Transform(Mat4::from_translation(position)))?;
			world.insert(entity, mesh)?;
			world.insert(entity, Spin(0.5 + (i % 7) as f32 * 0.25))?;
		}
		log::info!("spawned {} cubes", entities);

		Ok(Self {
			world,
			vertices,
			indices,
			globals,
			texture,
			slots: vec![texture_slot, globals_slot, vertices_slot],
			time: 0.,
		})
	}

	pub fn world(&self) -> &World {
		&self.world
	}

	pub fn world_mut(&mut self) -> &mut World {
		&mut self.world
	}

	pub fn update(&mut self, delta: f32) {
		self.time += delta;
		let spins = self
			.world
			.iter::<Spin>()
			.map(|(entity, spin)| (entity, spin.0))
			.collect::<Vec<(Entity, f32)>>();
		for (entity, speed) in spins {
			if let Some(transform) = self.world.get_mut::<Transform>(entity) {
				transform.0 *= Mat4::from_rotation_y(speed * delta);
			}
		}
	}

	fn view_projection(&self, extent: Extent2D) -> Mat4 {
		let aspect = extent.width as f32 / extent.height.max(1) as f32;
		let distance = 4. + self.world.entities().len() as f32 * 0.5;
		let mut projection = Mat4::perspective_rh(45f32.to_radians(), aspect, 0.1, distance * 4.);
		// vulkan clip space points y down
		projection.y_axis.y *= -1.;
		projection * Mat4::look_at_rh(Vec3::new(0., 0., distance), Vec3::ZERO, Vec3::Y)
	}

	/// Records one indexed draw per entity with a mesh and a transform. Without a pipeline nothing is drawn.
	pub fn draw(
		&self,
		manager: &FrameManager<P>,
		rec: &FrameRecording,
		pipeline: Option<&P::Pipeline>,
	) -> Result<u32, FrameError<P>> {
		profiling::function_scope!();
		let Some(pipeline) = pipeline else {
			return Ok(0);
		};
		manager.bind(rec, pipeline)?;
		let view_projection = self.view_projection(rec.extent());
		let mut drawn = 0;
		for (entity, mesh) in self.world.iter::<MeshRef>() {
			let Some(transform) = self.world.get::<Transform>(entity) else {
				continue;
			};
			manager.push(rec, &PushConstants::new(view_projection * transform.0, mesh.vertices.index()))?;
			// the index buffer lives as long as the scene, which is dropped after the frame manager waited idle
			unsafe { manager.draw_indexed(rec, &self.indices, IndexType::U16, mesh.index_count, 1)? };
			drawn += 1;
		}
		Ok(drawn)
	}

	/// Releases the table slots of the scene's resources.
	pub fn release(&mut self, manager: &FrameManager<P>) {
		for slot in self.slots.drain(..) {
			if let Err(e) = manager.table().release(slot) {
				log::warn!("failed to release {:?}: {}", slot, e);
			}
		}
		log::debug!(
			"released slots of {}, {}, {} and {}",
			self.vertices.name(),
			self.globals.name(),
			self.texture.name(),
			self.indices.name()
		);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use bindless_renderer_core::descriptor::ResourceClass;
	use bindless_renderer_core::frame::FrameManagerCreateInfo;
	use bindless_renderer_core::platform::dummy::{DummyCommand, DummyPipeline, DummyPlatform};
	use std::sync::Arc;

	fn manager(platform: &Arc<DummyPlatform>) -> anyhow::Result<FrameManager<DummyPlatform>> {
		Ok(FrameManager::new(
			platform,
			platform.create_surface(),
			&FrameManagerCreateInfo::default(),
			Extent2D::new(800, 600),
		)?)
	}

	#[test]
	fn test_cube() {
		let (vertices, indices) = cube();
		assert_eq!(vertices.len(), 24);
		assert_eq!(indices.len(), 36);
		assert!(indices.iter().all(|i| (*i as usize) < vertices.len()));
		assert!(vertices
			.iter()
			.all(|v| v.position[..3].iter().all(|p| (p.abs() - 0.5).abs() < 1e-6)));
	}

	#[test]
	fn test_scene_draws_every_entity() -> anyhow::Result<()> {
		let platform = Arc::new(DummyPlatform::new());
		let mut manager = manager(&platform)?;
		let mut scene = DemoScene::new(&manager, 5)?;
		assert_eq!(manager.table().live_count(ResourceClass::StorageBuffer), 1);
		assert_eq!(manager.table().live_count(ResourceClass::UniformBuffer), 1);
		assert_eq!(manager.table().live_count(ResourceClass::SampledImage), 1);

		scene.update(0.1);
		let rec = manager
			.begin_frame()?
			.recording()
			.ok_or_else(|| anyhow::anyhow!("frame was skipped"))?;
		let drawn = scene.draw(&manager, &rec, Some(&DummyPipeline))?;
		manager.end_frame(rec)?;
		assert_eq!(drawn, 5);

		let frames = platform.take_submitted();
		let commands = frames.last().ok_or_else(|| anyhow::anyhow!("nothing submitted"))?;
		let count = |f: fn(&DummyCommand) -> bool| commands.iter().filter(|c| f(c)).count();
		assert_eq!(count(|c| matches!(c, DummyCommand::Bind)), 1);
		assert_eq!(count(|c| matches!(c, DummyCommand::Push(_))), 5);
		assert_eq!(
			count(|c| matches!(
				c,
				DummyCommand::DrawIndexed {
					index_type: IndexType::U16,
					index_count: 36,
					instance_count: 1,
					..
				}
			)),
			5
		);

		scene.release(&manager);
		assert_eq!(manager.table().live_count(ResourceClass::StorageBuffer), 0);
		Ok(())
	}

	#[test]
	fn test_without_pipeline_only_clears() -> anyhow::Result<()> {
		let platform = Arc::new(DummyPlatform::new());
		let mut manager = manager(&platform)?;
		let mut scene = DemoScene::new(&manager, 3)?;
		let first = scene.world().entities().iter().next();
		if let Some(entity) = first {
			scene.world_mut().despawn(entity)?;
		}
		assert_eq!(scene.world().iter::<MeshRef>().count(), 2);

		let rec = manager
			.begin_frame()?
			.recording()
			.ok_or_else(|| anyhow::anyhow!("frame was skipped"))?;
		assert_eq!(scene.draw(&manager, &rec, None)?, 0);
		manager.end_frame(rec)?;
		let frames = platform.take_submitted();
		assert!(frames
			.iter()
			.flatten()
			.all(|c| !matches!(c, DummyCommand::Bind | DummyCommand::DrawIndexed { .. })));
		Ok(())
	}
}
