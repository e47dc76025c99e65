use crate::frame::FrameError;
use crate::platform::PresentPlatform;
use crate::resource::{Buffer, BufferUsage, Image, ImageLayout, ImageUsage, UsageError};
use std::marker::PhantomData;
use std::mem::ManuallyDrop;
use std::sync::Arc;

/// A transient command buffer outside the frame rotation, for setup-time transfers. Submitting blocks until the queue
/// is idle, so everything recorded has completed once [`Self::submit`] returns.
///
/// Every resource a command references is borrowed for `'a`, so it can't be dropped before the work was submitted.
pub struct OneShotWork<'a, P: PresentPlatform> {
	platform: Arc<P>,
	cmd: ManuallyDrop<P::CommandBuffer>,
	_resources: PhantomData<&'a ()>,
}

impl<'a, P: PresentPlatform> OneShotWork<'a, P> {
	pub fn new(platform: &Arc<P>) -> Result<Self, FrameError<P>> {
		unsafe {
			let mut cmd = platform.create_command_buffer().map_err(FrameError::Platform)?;
			if let Err(e) = platform.begin_commands(&mut cmd) {
				platform.destroy_command_buffer(cmd);
				return Err(FrameError::Platform(e));
			}
			Ok(Self {
				platform: platform.clone(),
				cmd: ManuallyDrop::new(cmd),
				_resources: PhantomData,
			})
		}
	}

	/// Copies the first `size` bytes of `src` to the start of `dst`.
	pub fn copy_buffer(&mut self, src: &'a Buffer<P>, dst: &'a Buffer<P>, size: u64) -> Result<(), FrameError<P>> {
		src.require_usage(BufferUsage::TRANSFER_SRC, "TRANSFER_SRC")?;
		dst.require_usage(BufferUsage::TRANSFER_DST, "TRANSFER_DST")?;
		for buffer in [src, dst] {
			if size > buffer.size() {
				return Err(UsageError::RangeOutOfBounds {
					name: buffer.name().to_string(),
					offset: 0,
					end: size,
					size: buffer.size(),
				}
				.into());
			}
		}
		unsafe {
			self.platform
				.cmd_copy_buffer(&self.cmd, src.platform_buffer(), dst.platform_buffer(), 0, 0, size);
		}
		Ok(())
	}

	/// Copies tightly packed pixel data from `src` into the whole of `dst`, leaving it in
	/// [`ImageLayout::ShaderReadOnly`]. `dst` must not have been written before.
	pub fn upload_image(&mut self, src: &'a Buffer<P>, dst: &'a mut Image<P>) -> Result<(), FrameError<P>> {
		src.require_usage(BufferUsage::TRANSFER_SRC, "TRANSFER_SRC")?;
		if !dst.usage().contains(ImageUsage::TRANSFER_DST) {
			return Err(UsageError::MissingUsage {
				name: dst.name().to_string(),
				required: "TRANSFER_DST",
			}
			.into());
		}
		let required = dst.extent().pixels() * dst.format().bytes_per_pixel() as u64;
		if required > src.size() {
			return Err(UsageError::RangeOutOfBounds {
				name: src.name().to_string(),
				offset: 0,
				end: required,
				size: src.size(),
			}
			.into());
		}

		let from = dst.transition(ImageLayout::TransferDst)?;
		let to_shader = dst.transition(ImageLayout::ShaderReadOnly)?;
		unsafe {
			let image = dst.platform_image();
			self.platform
				.cmd_transition_image(&self.cmd, image, from, ImageLayout::TransferDst);
			self.platform
				.cmd_copy_buffer_to_image(&self.cmd, src.platform_buffer(), image, dst.extent());
			self.platform
				.cmd_transition_image(&self.cmd, image, to_shader, ImageLayout::ShaderReadOnly);
		}
		Ok(())
	}

	/// Submits all recorded commands and blocks until the queue is idle.
	pub fn submit(mut self) -> Result<(), FrameError<P>> {
		profiling::function_scope!();
		unsafe {
			self.platform
				.end_commands(&mut self.cmd)
				.map_err(FrameError::Platform)?;
			self.platform.submit_and_wait(&self.cmd).map_err(FrameError::Platform)
		}
	}
}

impl<P: PresentPlatform> Drop for OneShotWork<'_, P> {
	fn drop(&mut self) {
		// Safety: cmd is never accessed again, and either never submitted or submitted and waited on
		let cmd = unsafe { ManuallyDrop::take(&mut self.cmd) };
		unsafe { self.platform.destroy_command_buffer(cmd) }
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::platform::dummy::DummyPlatform;
	use crate::resource::{BufferCreateInfo, Extent2D, Format, ImageCreateInfo, MemoryIntent};

	#[test]
	fn test_copy_buffer() -> anyhow::Result<()> {
		let platform = Arc::new(DummyPlatform::new());
		let src = Buffer::from_slice(&platform, BufferUsage::TRANSFER_SRC, "src", &[1u32, 2, 3, 4])?;
		let dst = Buffer::new(
			&platform,
			&BufferCreateInfo {
				size: 16,
				usage: BufferUsage::TRANSFER_DST | BufferUsage::STORAGE,
				memory: MemoryIntent::HostVisible,
				name: "dst",
			},
		)?;

		let mut work = OneShotWork::new(&platform)?;
		work.copy_buffer(&src, &dst, 8)?;
		work.submit()?;

		let stats = platform.stats();
		assert_eq!(stats.one_shot_submits, 1);
		assert_eq!(stats.live_command_buffers, 0);
		assert_eq!(&platform.read_buffer(&dst)[..8], bytemuck::cast_slice::<u32, u8>(&[1, 2]));
		Ok(())
	}

	#[test]
	fn test_copy_buffer_validates() -> anyhow::Result<()> {
		let platform = Arc::new(DummyPlatform::new());
		let src = Buffer::from_slice(&platform, BufferUsage::TRANSFER_SRC, "src", &[0u8; 4])?;
		let dst = Buffer::from_slice(&platform, BufferUsage::TRANSFER_DST, "dst", &[0u8; 4])?;
		let mut work = OneShotWork::new(&platform)?;
		assert!(matches!(
			work.copy_buffer(&src, &dst, 5),
			Err(FrameError::Usage(UsageError::RangeOutOfBounds { .. }))
		));
		assert!(matches!(
			work.copy_buffer(&dst, &src, 4),
			Err(FrameError::Usage(UsageError::MissingUsage { required: "TRANSFER_SRC", .. }))
		));
		drop(work);
		assert_eq!(platform.stats().one_shot_submits, 0);
		assert_eq!(platform.stats().live_command_buffers, 0);
		Ok(())
	}

	#[test]
	fn test_upload_image() -> anyhow::Result<()> {
		let platform = Arc::new(DummyPlatform::new());
		let pixels = [7u8; 2 * 2 * 4];
		let staging = Buffer::from_slice(&platform, BufferUsage::TRANSFER_SRC, "staging", &pixels)?;
		let mut image = Image::new(
			&platform,
			&ImageCreateInfo {
				extent: Extent2D::new(2, 2),
				format: Format::R8G8B8A8Srgb,
				..ImageCreateInfo::default()
			},
		)?;

		let mut work = OneShotWork::new(&platform)?;
		work.upload_image(&staging, &mut image)?;
		work.submit()?;

		assert_eq!(image.layout(), ImageLayout::ShaderReadOnly);
		assert_eq!(platform.read_image(&image), pixels);

		// uploading twice would transition from ShaderReadOnly
		let mut work = OneShotWork::new(&platform)?;
		assert!(matches!(
			work.upload_image(&staging, &mut image),
			Err(FrameError::Usage(UsageError::UnsupportedLayoutTransition { .. }))
		));
		Ok(())
	}

	#[test]
	fn test_upload_image_too_little_data() -> anyhow::Result<()> {
		let platform = Arc::new(DummyPlatform::new());
		let staging = Buffer::from_slice(&platform, BufferUsage::TRANSFER_SRC, "staging", &[0u8; 4])?;
		let mut image = Image::new(
			&platform,
			&ImageCreateInfo {
				extent: Extent2D::new(2, 2),
				..ImageCreateInfo::default()
			},
		)?;
		let mut work = OneShotWork::new(&platform)?;
		let result = work.upload_image(&staging, &mut image);
		assert!(matches!(
			result,
			Err(FrameError::Usage(UsageError::RangeOutOfBounds { end: 16, .. }))
		));
		drop(work);
		assert_eq!(image.layout(), ImageLayout::Undefined);
		Ok(())
	}
}
