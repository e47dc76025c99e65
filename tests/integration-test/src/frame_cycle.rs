#![cfg(test)]

use approx::assert_relative_eq;
use bindless_renderer_core::descriptor::{BufferClass, RegisterError, SlotHandle};
use bindless_renderer_core::frame::{FrameManager, FrameManagerCreateInfo, FrameOutcome, PushConstants};
use bindless_renderer_core::platform::dummy::{DummyCommand, DummyPipeline, DummyPlatform};
use bindless_renderer_core::platform::{AcquireOutcome, IndexType, PresentOutcome};
use bindless_renderer_core::resource::{Buffer, BufferUsage, Extent2D};
use bindless_renderer_core::surface::{SurfaceCreateInfo, SurfaceStatus};
use bindless_renderer_scene::world::World;
use glam::{Mat4, Vec3};
use std::sync::Arc;

fn manager(platform: &Arc<DummyPlatform>, frames_in_flight: u32) -> anyhow::Result<FrameManager<DummyPlatform>> {
	Ok(FrameManager::new(
		platform,
		platform.create_surface(),
		&FrameManagerCreateInfo {
			surface: SurfaceCreateInfo {
				frames_in_flight,
				..SurfaceCreateInfo::default()
			},
			..FrameManagerCreateInfo::default()
		},
		Extent2D::new(800, 600),
	)?)
}

fn draw_empty_frame(manager: &mut FrameManager<DummyPlatform>) -> anyhow::Result<bool> {
	match manager.begin_frame()? {
		FrameOutcome::Recording(rec) => {
			manager.draw(&rec, 3, 1)?;
			manager.end_frame(rec)?;
			Ok(true)
		}
		FrameOutcome::Skip => Ok(false),
	}
}

#[test]
fn test_minimize_and_restore() -> anyhow::Result<()> {
	let platform = Arc::new(DummyPlatform::new());
	let mut manager = manager(&platform, 2)?;
	for _ in 0..3 {
		assert!(draw_empty_frame(&mut manager)?);
	}
	let before = platform.stats();

	manager.resize(0, 0);
	for _ in 0..5 {
		assert!(!draw_empty_frame(&mut manager)?);
	}
	let minimized = platform.stats();
	assert_eq!(minimized.acquires, before.acquires);
	assert_eq!(minimized.fence_waits, before.fence_waits);
	assert_eq!(minimized.swapchains_created, before.swapchains_created);
	assert_eq!(manager.surface().recreate_count(), 0);
	assert_eq!(manager.surface().status(), SurfaceStatus::Ready);

	manager.resize(640, 480);
	assert!(draw_empty_frame(&mut manager)?);
	assert_eq!(manager.surface().extent(), Some(Extent2D::new(640, 480)));
	assert_eq!(manager.surface().recreate_count(), 1);
	assert_eq!(platform.stats().presents, before.presents + 1);
	Ok(())
}

#[test]
fn test_stale_surface_recovers_without_blocking() -> anyhow::Result<()> {
	let platform = Arc::new(DummyPlatform::new());
	let mut manager = manager(&platform, 2)?;

	// the skipped frame leaves its slot's fence signaled, so retrying on that slot must not block
	platform.script_acquire(AcquireOutcome::OutOfDate);
	assert!(!draw_empty_frame(&mut manager)?);
	assert!(draw_empty_frame(&mut manager)?);
	assert!(draw_empty_frame(&mut manager)?);

	// stale at present only recreates on the next frame
	platform.script_present(PresentOutcome::OutOfDate);
	assert!(draw_empty_frame(&mut manager)?);
	let recreated = manager.surface().recreate_count();
	assert_eq!(manager.surface().status(), SurfaceStatus::Stale);
	assert!(draw_empty_frame(&mut manager)?);
	assert_eq!(manager.surface().recreate_count(), recreated + 1);

	// the platform dictating a new extent is picked up on recreation as well
	platform.set_current_extent(Some(Extent2D::new(1920, 1080)));
	platform.script_acquire(AcquireOutcome::Acquired {
		image_index: 0,
		suboptimal: true,
	});
	assert!(!draw_empty_frame(&mut manager)?);
	assert!(draw_empty_frame(&mut manager)?);
	assert_eq!(manager.surface().extent(), Some(Extent2D::new(1920, 1080)));

	// the out of date present never reached the screen
	let stats = platform.stats();
	assert_eq!(stats.submits, stats.presents + 1);
	Ok(())
}

struct Transform(Mat4);

struct Mesh {
	vertices: SlotHandle,
	index_count: u32,
}

#[test]
fn test_scene_frames() -> anyhow::Result<()> {
	let platform = Arc::new(DummyPlatform::new());
	let mut manager = manager(&platform, 2)?;
	let table = manager.table().clone();

	let vertices = Buffer::from_slice(&platform, BufferUsage::STORAGE, "vertices", &[[0f32; 4]; 3])?;
	let indices = Buffer::from_slice(&platform, BufferUsage::INDEX, "indices", &[0u32, 1, 2])?;
	let vertices_slot = table.register_buffer(&vertices, 0, None, BufferClass::Storage)?;

	let mut world = World::new();
	for i in 0..4 {
		let entity = world.spawn()?;
		world.insert(entity, Transform(Mat4::from_translation(Vec3::new(i as f32, 0., 0.))))?;
		world.insert(
			entity,
			Mesh {
				vertices: vertices_slot,
				index_count: 3,
			},
		)?;
	}
	let despawned = world.entities().iter().nth(1).ok_or_else(|| anyhow::anyhow!("no entities"))?;
	world.despawn(despawned)?;

	for _ in 0..3 {
		let rec = manager
			.begin_frame()?
			.recording()
			.ok_or_else(|| anyhow::anyhow!("frame was skipped"))?;
		manager.bind(&rec, &DummyPipeline)?;
		for (entity, mesh) in world.iter::<Mesh>() {
			let Some(transform) = world.get::<Transform>(entity) else {
				continue;
			};
			manager.push(&rec, &PushConstants::new(transform.0, mesh.vertices.index()))?;
			unsafe { manager.draw_indexed(&rec, &indices, IndexType::U32, mesh.index_count, 1)? };
		}
		manager.end_frame(rec)?;
	}

	let frames = platform.take_submitted();
	assert_eq!(frames.len(), 3);
	for commands in &frames {
		let pushes = commands
			.iter()
			.filter_map(|c| match c {
				DummyCommand::Push(bytes) => Some(bytemuck::pod_read_unaligned::<PushConstants>(bytes)),
				_ => None,
			})
			.collect::<Vec<_>>();
		assert_eq!(pushes.len(), 3);
		let mut xs = pushes.iter().map(|p| p.transform.w_axis.x).collect::<Vec<_>>();
		xs.sort_by(f32::total_cmp);
		for (x, expected) in xs.iter().zip([0., 2., 3.]) {
			assert_relative_eq!(*x, expected);
		}
		assert!(pushes.iter().all(|p| p.slot == vertices_slot.index()));
		let draws = commands
			.iter()
			.filter(|c| matches!(c, DummyCommand::DrawIndexed { index_count: 3, .. }))
			.count();
		assert_eq!(draws, 3);
	}

	// the slot is only reused once every frame that could reference it has completed
	let other = Buffer::from_slice(&platform, BufferUsage::STORAGE, "other", &[[1f32; 4]; 3])?;
	table.release(vertices_slot)?;
	drop(world);
	let early = table.register_buffer(&other, 0, None, BufferClass::Storage)?;
	assert_ne!(early.index(), vertices_slot.index());
	table.release(early)?;
	for _ in 0..2 {
		assert!(draw_empty_frame(&mut manager)?);
	}
	let reused = table.register_buffer(&other, 0, None, BufferClass::Storage)?;
	assert_eq!(reused.index(), vertices_slot.index());
	assert_ne!(reused, vertices_slot);
	assert!(!table.is_live(vertices_slot));
	assert!(matches!(table.release(vertices_slot), Err(RegisterError::InvalidHandle(_))));
	Ok(())
}
