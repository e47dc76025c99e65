#![cfg(test)]

use crate::ash_platform;
use bindless_renderer_core::descriptor::{
	BindlessTable, BufferClass, DescriptorCounts, RegisterError, ResourceClass, SlotHandle,
};
use bindless_renderer_core::platform::dummy::DummyPlatform;
use bindless_renderer_core::platform::BindlessPlatform;
use bindless_renderer_core::resource::{Buffer, BufferCreateInfo, BufferUsage, MemoryIntent};
use std::collections::HashSet;
use std::sync::Arc;

fn storage_buffer<P: BindlessPlatform>(platform: &Arc<P>, name: &str) -> anyhow::Result<Buffer<P>> {
	Ok(Buffer::new(
		platform,
		&BufferCreateInfo {
			size: 256,
			usage: BufferUsage::STORAGE | BufferUsage::UNIFORM,
			memory: MemoryIntent::Auto,
			name,
		},
	)?)
}

#[test]
fn test_capacity_exhausted_dummy() -> anyhow::Result<()> {
	test_capacity_exhausted(&Arc::new(DummyPlatform::new()))
}

#[test]
#[ignore = "requires a Vulkan 1.3 device"]
fn test_capacity_exhausted_ash() -> anyhow::Result<()> {
	test_capacity_exhausted(&ash_platform()?)
}

fn test_capacity_exhausted<P: BindlessPlatform>(platform: &Arc<P>) -> anyhow::Result<()> {
	let table = BindlessTable::new(
		platform,
		DescriptorCounts {
			uniform_buffers: 1,
			storage_buffers: 2,
			sampled_images: 1,
		},
	)?;
	let buffers = ["a", "b", "c"]
		.into_iter()
		.map(|name| storage_buffer(platform, name))
		.collect::<anyhow::Result<Vec<_>>>()?;

	let a = table.register_buffer(&buffers[0], 0, None, BufferClass::Storage)?;
	let b = table.register_buffer(&buffers[1], 0, None, BufferClass::Storage)?;
	assert_eq!((a.index(), b.index()), (0, 1));
	let c = table.register_buffer(&buffers[2], 0, None, BufferClass::Storage);
	assert!(matches!(
		c,
		Err(RegisterError::CapacityExhausted {
			class: ResourceClass::StorageBuffer,
			capacity: 2
		})
	));
	assert_eq!(table.live_count(ResourceClass::StorageBuffer), 2);

	// other classes are unaffected
	let uniform = table.register_buffer(&buffers[2], 0, None, BufferClass::Uniform)?;
	assert_eq!(uniform.index(), 0);
	assert_eq!(table.global_index(uniform), 0);
	assert_eq!(table.global_index(b), 2);

	table.publish_pending();
	Ok(())
}

#[test]
fn test_release_before_publish_dummy() -> anyhow::Result<()> {
	test_release_before_publish(&Arc::new(DummyPlatform::new()))
}

#[test]
#[ignore = "requires a Vulkan 1.3 device"]
fn test_release_before_publish_ash() -> anyhow::Result<()> {
	test_release_before_publish(&ash_platform()?)
}

fn test_release_before_publish<P: BindlessPlatform>(platform: &Arc<P>) -> anyhow::Result<()> {
	let table = BindlessTable::new(platform, DescriptorCounts::DEFAULT)?;
	let buffers = (0..4)
		.map(|i| storage_buffer(platform, &format!("buffer {}", i)))
		.collect::<anyhow::Result<Vec<_>>>()?;
	let handles = buffers
		.iter()
		.map(|buffer| table.register_buffer(buffer, 0, None, BufferClass::Storage))
		.collect::<Result<Vec<_>, _>>()?;

	let stats = table.publish_pending();
	assert_eq!((stats.records, stats.batches), (4, 1));
	assert!(table.publish_pending().is_empty());

	// a slot registered and released in between publishes is never written
	let late_buffer = storage_buffer(platform, "late")?;
	let late = table.register_buffer(&late_buffer, 0, None, BufferClass::Storage)?;
	table.release(late)?;
	assert!(table.publish_pending().is_empty());

	// updating slot 1 and releasing slot 2 writes slot 1 only
	table.update_buffer(handles[1], &buffers[3], 0, None)?;
	table.release(handles[2])?;
	let stats = table.publish_pending();
	assert_eq!((stats.records, stats.batches), (1, 1));
	assert!(table.publish_pending().is_empty());

	assert!(matches!(table.release(handles[2]), Err(RegisterError::InvalidHandle(_))));
	Ok(())
}

#[test]
fn test_live_slots_never_alias_dummy() -> anyhow::Result<()> {
	test_live_slots_never_alias(&Arc::new(DummyPlatform::new()))
}

#[test]
#[ignore = "requires a Vulkan 1.3 device"]
fn test_live_slots_never_alias_ash() -> anyhow::Result<()> {
	test_live_slots_never_alias(&ash_platform()?)
}

/// Registers and releases in a pseudo random order while frames are recorded and complete two frames later.
fn test_live_slots_never_alias<P: BindlessPlatform>(platform: &Arc<P>) -> anyhow::Result<()> {
	const CAPACITY: u32 = 8;
	let table = BindlessTable::new(
		platform,
		DescriptorCounts {
			uniform_buffers: CAPACITY,
			storage_buffers: CAPACITY,
			sampled_images: 1,
		},
	)?;
	let buffer = storage_buffer(platform, "shared")?;

	let mut live: Vec<SlotHandle> = Vec::new();
	let mut rng = 0x2545_f491_u32;
	let mut exhausted = 0;
	for step in 0..500u64 {
		rng ^= rng << 13;
		rng ^= rng >> 17;
		rng ^= rng << 5;

		let frame = step / 10;
		table.mark_frame_recording(frame);
		table.reclaim_completed(frame.saturating_sub(2));

		if rng % 3 != 0 || live.is_empty() {
			let class = if rng & 0x100 == 0 {
				BufferClass::Uniform
			} else {
				BufferClass::Storage
			};
			match table.register_buffer(&buffer, 0, None, class) {
				Ok(handle) => live.push(handle),
				Err(RegisterError::CapacityExhausted { .. }) => exhausted += 1,
				Err(e) => return Err(e.into()),
			}
		} else {
			let handle = live.swap_remove(rng as usize % live.len());
			table.release(handle)?;
			assert!(!table.is_live(handle));
		}
		if step % 7 == 0 {
			table.publish_pending();
		}

		let unique = live
			.iter()
			.map(|handle| (handle.class(), handle.index()))
			.collect::<HashSet<_>>();
		assert_eq!(unique.len(), live.len(), "two live handles share a slot at step {}", step);
		assert!(live.iter().all(|handle| table.is_live(*handle)));
		let counted = table.live_count(ResourceClass::UniformBuffer) + table.live_count(ResourceClass::StorageBuffer);
		assert_eq!(counted as usize, live.len());
	}
	assert!(exhausted > 0, "the sequence should have exhausted a class at least once");
	Ok(())
}
