#![cfg(test)]

use crate::ash_platform;
use bindless_renderer_core::platform::dummy::DummyPlatform;
use bindless_renderer_core::platform::BindlessPlatform;
use bindless_renderer_core::resource::{
	Buffer, BufferCreateInfo, BufferUsage, Extent2D, Format, Image, ImageCreateInfo, ImageLayout, ImageUsage,
	MemoryIntent, ResourceError, UsageError,
};
use std::sync::Arc;

#[test]
fn test_mapping_dummy() -> anyhow::Result<()> {
	test_mapping(&Arc::new(DummyPlatform::new()))
}

#[test]
#[ignore = "requires a Vulkan 1.3 device"]
fn test_mapping_ash() -> anyhow::Result<()> {
	test_mapping(&ash_platform()?)
}

fn test_mapping<P: BindlessPlatform>(platform: &Arc<P>) -> anyhow::Result<()> {
	let mut buffer = Buffer::new(
		platform,
		&BufferCreateInfo {
			size: 16,
			usage: BufferUsage::STORAGE,
			memory: MemoryIntent::HostVisible,
			name: "mapped",
		},
	)?;
	buffer.upload(&[1; 16])?;

	let first = buffer.map()?;
	let second = buffer.map()?;
	assert_eq!(first, second);

	// too large or out of bounds writes fail without touching the buffer
	assert!(matches!(
		buffer.upload(&[2; 17]),
		Err(ResourceError::Size {
			requested: 17,
			capacity: 16,
			..
		})
	));
	assert!(matches!(buffer.upload_at(12, &[3; 8]), Err(ResourceError::Size { .. })));
	let contents = unsafe { std::slice::from_raw_parts(first.as_ptr(), 16) }.to_vec();
	assert_eq!(contents, [1; 16]);

	// an upload while mapped keeps the mapping
	buffer.upload_at(8, &[4; 8])?;
	assert!(buffer.is_mapped());
	let contents = unsafe { std::slice::from_raw_parts(buffer.map()?.as_ptr(), 16) }.to_vec();
	assert_eq!(contents[..8], [1; 8]);
	assert_eq!(contents[8..], [4; 8]);

	buffer.unmap();
	assert!(!buffer.is_mapped());
	buffer.destroy();
	Ok(())
}

#[test]
fn test_device_local_dummy() -> anyhow::Result<()> {
	test_device_local(&Arc::new(DummyPlatform::new()))
}

#[test]
#[ignore = "requires a Vulkan 1.3 device"]
fn test_device_local_ash() -> anyhow::Result<()> {
	test_device_local(&ash_platform()?)
}

fn test_device_local<P: BindlessPlatform>(platform: &Arc<P>) -> anyhow::Result<()> {
	let mut buffer = Buffer::new(
		platform,
		&BufferCreateInfo {
			size: 64,
			usage: BufferUsage::VERTEX | BufferUsage::TRANSFER_DST,
			memory: MemoryIntent::DeviceLocal,
			name: "device local",
		},
	)?;
	assert!(matches!(buffer.map(), Err(ResourceError::Mapping { .. })));
	assert!(matches!(buffer.upload(&[0; 4]), Err(ResourceError::Mapping { .. })));

	let create_info = |memory| ImageCreateInfo {
		extent: Extent2D::new(4, 4),
		mip_levels: 1,
		format: Format::R8G8B8A8Unorm,
		usage: ImageUsage::SAMPLED | ImageUsage::TRANSFER_DST,
		memory,
		name: "image",
	};
	assert!(matches!(
		Image::new(platform, &create_info(MemoryIntent::HostVisible)),
		Err(ResourceError::Usage(UsageError::HostVisibleImage { .. }))
	));

	let mut image = Image::new(platform, &create_info(MemoryIntent::Auto))?;
	assert_eq!(image.layout(), ImageLayout::Undefined);
	assert!(matches!(
		image.transition(ImageLayout::PresentSrc),
		Err(UsageError::UnsupportedLayoutTransition { .. })
	));
	assert_eq!(image.layout(), ImageLayout::Undefined);
	Ok(())
}
