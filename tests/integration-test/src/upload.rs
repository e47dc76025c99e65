#![cfg(test)]

use crate::ash_platform;
use bindless_renderer_core::descriptor::{BindlessTable, DescriptorCounts, ResourceClass};
use bindless_renderer_core::frame::{expand_to_rgba8, FrameError, OneShotWork};
use bindless_renderer_core::platform::dummy::DummyPlatform;
use bindless_renderer_core::platform::PresentPlatform;
use bindless_renderer_core::resource::{
	Buffer, BufferCreateInfo, BufferUsage, Extent2D, Format, Image, ImageCreateInfo, ImageLayout, ImageUsage,
	MemoryIntent, UsageError,
};
use std::sync::Arc;

#[test]
fn test_copy_buffer_dummy() -> anyhow::Result<()> {
	test_copy_buffer(&Arc::new(DummyPlatform::new()))
}

#[test]
#[ignore = "requires a Vulkan 1.3 device"]
fn test_copy_buffer_ash() -> anyhow::Result<()> {
	test_copy_buffer(&ash_platform()?)
}

/// Copies through a device local buffer and back into a host visible one.
fn test_copy_buffer<P: PresentPlatform>(platform: &Arc<P>) -> anyhow::Result<()> {
	let data = (0..256u32).collect::<Vec<_>>();
	let size = (data.len() * 4) as u64;
	let upload = Buffer::from_slice(platform, BufferUsage::TRANSFER_SRC, "upload", &data)?;
	let device = Buffer::new(
		platform,
		&BufferCreateInfo {
			size,
			usage: BufferUsage::TRANSFER_SRC | BufferUsage::TRANSFER_DST | BufferUsage::STORAGE,
			memory: MemoryIntent::DeviceLocal,
			name: "device",
		},
	)?;
	let mut download = Buffer::new(
		platform,
		&BufferCreateInfo {
			size,
			usage: BufferUsage::TRANSFER_DST,
			memory: MemoryIntent::HostVisible,
			name: "download",
		},
	)?;

	let mut work = OneShotWork::new(platform)?;
	assert!(matches!(
		work.copy_buffer(&download, &device, size),
		Err(FrameError::Usage(UsageError::MissingUsage { .. }))
	));
	work.copy_buffer(&upload, &device, size)?;
	work.submit()?;

	let mut work = OneShotWork::new(platform)?;
	work.copy_buffer(&device, &download, size)?;
	work.submit()?;

	let ptr = download.map()?;
	let result = unsafe { std::slice::from_raw_parts(ptr.as_ptr() as *const u32, data.len()) }.to_vec();
	assert_eq!(result, data);
	Ok(())
}

#[test]
fn test_upload_texture_dummy() -> anyhow::Result<()> {
	test_upload_texture(&Arc::new(DummyPlatform::new()))
}

#[test]
#[ignore = "requires a Vulkan 1.3 device"]
fn test_upload_texture_ash() -> anyhow::Result<()> {
	test_upload_texture(&ash_platform()?)
}

fn test_upload_texture<P: PresentPlatform>(platform: &Arc<P>) -> anyhow::Result<()> {
	let table = BindlessTable::new(platform, DescriptorCounts::DEFAULT)?;
	let extent = Extent2D::new(16, 8);
	let pixels = (0..extent.pixels() * 3).map(|i| i as u8).collect::<Vec<_>>();
	let rgba = expand_to_rgba8(&pixels, extent, 3)?;
	let staging = Buffer::from_slice(platform, BufferUsage::TRANSFER_SRC, "staging", &rgba)?;

	let mut textures = (0..3)
		.map(|i| {
			Image::new(
				platform,
				&ImageCreateInfo {
					extent,
					mip_levels: 1,
					format: Format::R8G8B8A8Srgb,
					usage: ImageUsage::SAMPLED | ImageUsage::TRANSFER_DST,
					memory: MemoryIntent::Auto,
					name: &format!("texture {}", i),
				},
			)
		})
		.collect::<Result<Vec<_>, _>>()?;

	let mut work = OneShotWork::new(platform)?;
	for texture in &mut textures {
		work.upload_image(&staging, texture)?;
	}
	work.submit()?;

	let mut handles = Vec::new();
	for texture in &textures {
		assert_eq!(texture.layout(), ImageLayout::ShaderReadOnly);
		handles.push(table.register_image(texture, None)?);
	}
	assert_eq!(table.live_count(ResourceClass::SampledImage), 3);
	let stats = table.publish_pending();
	assert_eq!((stats.records, stats.batches), (3, 1));
	for handle in handles {
		table.release(handle)?;
	}
	assert!(table.publish_pending().is_empty());
	Ok(())
}
