use crate::platform::ash::{Ash, AshCommandBuffer, AshPipeline, AshPresentError};
use crate::platform::{AcquireOutcome, IndexType, PresentOutcome, PresentPlatform, RenderTarget};
use crate::resource::{ColorSpace, Extent2D, Format, ImageLayout, PresentMode};
use crate::surface::{SurfaceCapabilities, SurfaceParams};
use ash::vk::{
	BufferCopy, BufferImageCopy, CommandBufferSubmitInfo, ComponentMapping, CompositeAlphaFlagsKHR, Fence,
	FenceCreateFlags, FenceCreateInfo, ImageSubresourceLayers, ImageSubresourceRange, ImageUsageFlags, ImageView,
	ImageViewCreateInfo, ImageViewType, PipelineStageFlags2, PresentInfoKHR, Semaphore, SemaphoreCreateInfo,
	SemaphoreSubmitInfo, SharingMode, SubmitInfo2, SurfaceKHR, SwapchainCreateInfoKHR, SwapchainKHR,
};
use std::sync::atomic::{AtomicBool, Ordering};

/// A surface created from a window, see `bindless-renderer-winit`
#[derive(Debug)]
pub struct AshSurface {
	pub surface: SurfaceKHR,
}

pub struct AshSwapchain {
	pub swapchain: SwapchainKHR,
	pub images: Vec<ash::vk::Image>,
	pub views: Vec<ImageView>,
	pub format: Format,
	pub extent: Extent2D,
}

impl AshSwapchain {
	pub fn subresource_range() -> ImageSubresourceRange {
		ImageSubresourceRange {
			aspect_mask: ash::vk::ImageAspectFlags::COLOR,
			base_mip_level: 0,
			level_count: 1,
			base_array_layer: 0,
			layer_count: 1,
		}
	}
}

/// Synchronization primitives of one frame slot
#[derive(Debug)]
pub struct AshFrameSync {
	/// signaled once the slot's last submit completed
	pub fence: Fence,
	pub image_available: Semaphore,
	pub render_finished: Semaphore,
	/// an acquire signals `image_available` that no submit has waited on yet
	pub acquired: AtomicBool,
}

unsafe impl PresentPlatform for Ash {
	type Surface = AshSurface;
	type Swapchain = AshSwapchain;
	type FrameSync = AshFrameSync;
	type CommandBuffer = AshCommandBuffer;
	type Pipeline = AshPipeline;
	type PresentError = AshPresentError;

	unsafe fn surface_capabilities(
		&self,
		surface: &Self::Surface,
	) -> Result<SurfaceCapabilities, Self::PresentError> {
		unsafe {
			let ext = self.extensions.surface()?;
			let caps = ext.get_physical_device_surface_capabilities(self.physical_device, surface.surface)?;
			let formats = ext
				.get_physical_device_surface_formats(self.physical_device, surface.surface)?
				.into_iter()
				.filter_map(|f| {
					Some((
						Format::from_ash_format(f.format)?,
						ColorSpace::from_ash_color_space(f.color_space)?,
					))
				})
				.collect();
			let present_modes = ext
				.get_physical_device_surface_present_modes(self.physical_device, surface.surface)?
				.into_iter()
				.filter_map(PresentMode::from_ash_present_mode)
				.collect();
			// u32::MAX means the surface size is determined by the swapchain extent
			let current_extent = (caps.current_extent.width != u32::MAX).then(|| caps.current_extent.into());
			Ok(SurfaceCapabilities {
				formats,
				present_modes,
				min_image_count: caps.min_image_count,
				max_image_count: caps.max_image_count,
				current_extent,
				min_extent: caps.min_image_extent.into(),
				max_extent: caps.max_image_extent.into(),
			})
		}
	}

	unsafe fn create_swapchain(
		&self,
		surface: &Self::Surface,
		params: &SurfaceParams,
		old: Option<&Self::Swapchain>,
	) -> Result<Self::Swapchain, Self::PresentError> {
		unsafe {
			let swapchain_ext = self.extensions.swapchain()?;
			let caps = self
				.extensions
				.surface()?
				.get_physical_device_surface_capabilities(self.physical_device, surface.surface)?;
			let swapchain = swapchain_ext.create_swapchain(
				&SwapchainCreateInfoKHR::default()
					.surface(surface.surface)
					.min_image_count(params.image_count)
					.image_format(params.format.to_ash_format())
					.image_color_space(params.color_space.to_ash_color_space())
					.image_extent(params.extent.into())
					.image_array_layers(1)
					.image_usage(ImageUsageFlags::COLOR_ATTACHMENT | ImageUsageFlags::TRANSFER_DST)
					.image_sharing_mode(SharingMode::EXCLUSIVE)
					.pre_transform(caps.current_transform)
					.composite_alpha(CompositeAlphaFlagsKHR::OPAQUE)
					.present_mode(params.present_mode.to_ash_present_mode())
					.clipped(true)
					.old_swapchain(old.map_or(SwapchainKHR::null(), |old| old.swapchain)),
				None,
			)?;

			let images = match swapchain_ext.get_swapchain_images(swapchain) {
				Ok(images) => images,
				Err(e) => {
					swapchain_ext.destroy_swapchain(swapchain, None);
					return Err(e.into());
				}
			};
			let mut views = Vec::with_capacity(images.len());
			for (i, image) in images.iter().enumerate() {
				let view = self.device.create_image_view(
					&ImageViewCreateInfo::default()
						.image(*image)
						.view_type(ImageViewType::TYPE_2D)
						.format(params.format.to_ash_format())
						.components(ComponentMapping::default())
						.subresource_range(AshSwapchain::subresource_range()),
					None,
				);
				match view {
					Ok(view) => {
						views.push(view);
						if let Err(e) = self.set_debug_object_name(view, &format!("swapchain image {i}")) {
							log::warn!("failed to name swapchain image view: {e}");
						}
					}
					Err(e) => {
						for view in views {
							self.device.destroy_image_view(view, None);
						}
						swapchain_ext.destroy_swapchain(swapchain, None);
						return Err(e.into());
					}
				}
			}

			Ok(AshSwapchain {
				swapchain,
				images,
				views,
				format: params.format,
				extent: params.extent,
			})
		}
	}

	unsafe fn destroy_swapchain(&self, swapchain: Self::Swapchain) {
		unsafe {
			for view in swapchain.views {
				self.device.destroy_image_view(view, None);
			}
			match self.extensions.swapchain() {
				Ok(ext) => ext.destroy_swapchain(swapchain.swapchain, None),
				Err(e) => log::error!("leaking swapchain: {e}"),
			}
		}
	}

	unsafe fn destroy_surface(&self, surface: Self::Surface) {
		unsafe {
			match self.extensions.surface() {
				Ok(ext) => ext.destroy_surface(surface.surface, None),
				Err(e) => log::error!("leaking surface: {e}"),
			}
		}
	}

	unsafe fn create_frame_sync(&self) -> Result<Self::FrameSync, Self::PresentError> {
		unsafe {
			let fence = self
				.device
				.create_fence(&FenceCreateInfo::default().flags(FenceCreateFlags::SIGNALED), None)?;
			let image_available = self.device.create_semaphore(&SemaphoreCreateInfo::default(), None);
			let render_finished = self.device.create_semaphore(&SemaphoreCreateInfo::default(), None);
			match (image_available, render_finished) {
				(Ok(image_available), Ok(render_finished)) => Ok(AshFrameSync {
					fence,
					image_available,
					render_finished,
					acquired: AtomicBool::new(false),
				}),
				(image_available, render_finished) => {
					self.device.destroy_fence(fence, None);
					let mut error = ash::vk::Result::ERROR_UNKNOWN;
					for semaphore in [image_available, render_finished] {
						match semaphore {
							Ok(semaphore) => self.device.destroy_semaphore(semaphore, None),
							Err(e) => error = e,
						}
					}
					Err(error.into())
				}
			}
		}
	}

	unsafe fn reset_acquire_signal(&self, sync: &mut Self::FrameSync) -> Result<(), Self::PresentError> {
		unsafe {
			if !std::mem::take(sync.acquired.get_mut()) {
				return Ok(());
			}
			// the presentation engine may still be about to signal, so consume it on the queue instead of
			// destroying the semaphore
			self.device.reset_fences(&[sync.fence])?;
			{
				let queue = self.queue.lock();
				self.device.queue_submit2(
					*queue,
					&[SubmitInfo2::default().wait_semaphore_infos(&[SemaphoreSubmitInfo::default()
						.semaphore(sync.image_available)
						.stage_mask(PipelineStageFlags2::ALL_COMMANDS)])],
					sync.fence,
				)?;
			}
			Ok(self.device.wait_for_fences(&[sync.fence], true, u64::MAX)?)
		}
	}

	unsafe fn destroy_frame_sync(&self, sync: Self::FrameSync) {
		unsafe {
			self.device.destroy_fence(sync.fence, None);
			self.device.destroy_semaphore(sync.image_available, None);
			self.device.destroy_semaphore(sync.render_finished, None);
		}
	}

	unsafe fn wait_frame_sync(&self, sync: &Self::FrameSync) -> Result<(), Self::PresentError> {
		unsafe {
			profiling::function_scope!();
			Ok(self.device.wait_for_fences(&[sync.fence], true, u64::MAX)?)
		}
	}

	unsafe fn acquire_next_image(
		&self,
		swapchain: &Self::Swapchain,
		sync: &Self::FrameSync,
	) -> Result<AcquireOutcome, Self::PresentError> {
		unsafe {
			profiling::function_scope!();
			let result = self.extensions.swapchain()?.acquire_next_image(
				swapchain.swapchain,
				u64::MAX,
				sync.image_available,
				Fence::null(),
			);
			match result {
				Ok((image_index, suboptimal)) => {
					sync.acquired.store(true, Ordering::Relaxed);
					Ok(AcquireOutcome::Acquired {
						image_index,
						suboptimal,
					})
				}
				Err(ash::vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
				Err(e) => Err(e.into()),
			}
		}
	}

	unsafe fn submit_frame(
		&self,
		sync: &Self::FrameSync,
		cmd: &Self::CommandBuffer,
	) -> Result<(), Self::PresentError> {
		unsafe {
			profiling::function_scope!();
			self.device.reset_fences(&[sync.fence])?;
			let queue = self.queue.lock();
			sync.acquired.store(false, Ordering::Relaxed);
			self.device.queue_submit2(
				*queue,
				&[SubmitInfo2::default()
					.wait_semaphore_infos(&[SemaphoreSubmitInfo::default()
						.semaphore(sync.image_available)
						.stage_mask(PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)])
					.command_buffer_infos(&[CommandBufferSubmitInfo::default().command_buffer(cmd.cmd)])
					.signal_semaphore_infos(&[SemaphoreSubmitInfo::default()
						.semaphore(sync.render_finished)
						.stage_mask(PipelineStageFlags2::ALL_COMMANDS)])],
				sync.fence,
			)?;
			Ok(())
		}
	}

	unsafe fn present(
		&self,
		swapchain: &Self::Swapchain,
		sync: &Self::FrameSync,
		image_index: u32,
	) -> Result<PresentOutcome, Self::PresentError> {
		unsafe {
			profiling::function_scope!();
			let queue = self.queue.lock();
			let result = self.extensions.swapchain()?.queue_present(
				*queue,
				&PresentInfoKHR::default()
					.wait_semaphores(&[sync.render_finished])
					.swapchains(&[swapchain.swapchain])
					.image_indices(&[image_index]),
			);
			match result {
				Ok(false) => Ok(PresentOutcome::Presented),
				Ok(true) => Ok(PresentOutcome::Suboptimal),
				Err(ash::vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
				Err(e) => Err(e.into()),
			}
		}
	}

	unsafe fn wait_idle(&self) -> Result<(), Self::PresentError> {
		unsafe {
			profiling::function_scope!();
			Ok(self.device.device_wait_idle()?)
		}
	}

	unsafe fn create_command_buffer(&self) -> Result<Self::CommandBuffer, Self::PresentError> {
		unsafe { AshCommandBuffer::new(self) }
	}

	unsafe fn destroy_command_buffer(&self, cmd: Self::CommandBuffer) {
		unsafe { cmd.destroy(self) }
	}

	unsafe fn begin_commands(&self, cmd: &mut Self::CommandBuffer) -> Result<(), Self::PresentError> {
		unsafe { cmd.begin(self) }
	}

	unsafe fn end_commands(&self, cmd: &mut Self::CommandBuffer) -> Result<(), Self::PresentError> {
		unsafe { cmd.end(self) }
	}

	unsafe fn submit_and_wait(&self, cmd: &Self::CommandBuffer) -> Result<(), Self::PresentError> {
		unsafe {
			profiling::function_scope!();
			let queue = self.queue.lock();
			self.device.queue_submit2(
				*queue,
				&[SubmitInfo2::default()
					.command_buffer_infos(&[CommandBufferSubmitInfo::default().command_buffer(cmd.cmd)])],
				Fence::null(),
			)?;
			self.device.queue_wait_idle(*queue)?;
			Ok(())
		}
	}

	unsafe fn cmd_begin_rendering(&self, cmd: &Self::CommandBuffer, target: &RenderTarget<Self>) {
		unsafe { cmd.begin_rendering(self, target) }
	}

	unsafe fn cmd_end_rendering(&self, cmd: &Self::CommandBuffer) {
		unsafe { self.device.cmd_end_rendering(cmd.cmd) }
	}

	unsafe fn cmd_transition_swapchain_image(
		&self,
		cmd: &Self::CommandBuffer,
		swapchain: &Self::Swapchain,
		image_index: u32,
		from: ImageLayout,
		to: ImageLayout,
	) {
		unsafe {
			cmd.transition(
				self,
				swapchain.images[image_index as usize],
				AshSwapchain::subresource_range(),
				from,
				to,
			)
		}
	}

	unsafe fn cmd_transition_image(
		&self,
		cmd: &Self::CommandBuffer,
		image: &Self::Image,
		from: ImageLayout,
		to: ImageLayout,
	) {
		unsafe { cmd.transition(self, image.image, image.subresource_range(), from, to) }
	}

	unsafe fn cmd_bind(&self, cmd: &Self::CommandBuffer, pipeline: &Self::Pipeline, set: &Self::DescriptorSet) {
		unsafe { cmd.bind(self, pipeline, set) }
	}

	unsafe fn cmd_push(&self, cmd: &Self::CommandBuffer, set: &Self::DescriptorSet, bytes: &[u8]) {
		unsafe {
			self.device
				.cmd_push_constants(cmd.cmd, set.pipeline_layout, self.shader_stages, 0, bytes)
		}
	}

	unsafe fn cmd_bind_vertex_buffer(&self, cmd: &Self::CommandBuffer, buffer: &Self::Buffer, offset: u64) {
		unsafe {
			self.device
				.cmd_bind_vertex_buffers(cmd.cmd, 0, &[buffer.buffer], &[offset])
		}
	}

	unsafe fn cmd_draw(&self, cmd: &Self::CommandBuffer, vertex_count: u32, instance_count: u32) {
		unsafe { self.device.cmd_draw(cmd.cmd, vertex_count, instance_count, 0, 0) }
	}

	unsafe fn cmd_draw_indexed(
		&self,
		cmd: &Self::CommandBuffer,
		index_buffer: &Self::Buffer,
		index_type: IndexType,
		index_count: u32,
		instance_count: u32,
	) {
		unsafe {
			self.device
				.cmd_bind_index_buffer(cmd.cmd, index_buffer.buffer, 0, index_type.to_ash_index_type());
			self.device
				.cmd_draw_indexed(cmd.cmd, index_count, instance_count, 0, 0, 0);
		}
	}

	unsafe fn cmd_copy_buffer(
		&self,
		cmd: &Self::CommandBuffer,
		src: &Self::Buffer,
		dst: &Self::Buffer,
		src_offset: u64,
		dst_offset: u64,
		size: u64,
	) {
		unsafe {
			self.device.cmd_copy_buffer(
				cmd.cmd,
				src.buffer,
				dst.buffer,
				&[BufferCopy {
					src_offset,
					dst_offset,
					size,
				}],
			)
		}
	}

	unsafe fn cmd_copy_buffer_to_image(
		&self,
		cmd: &Self::CommandBuffer,
		src: &Self::Buffer,
		dst: &Self::Image,
		extent: Extent2D,
	) {
		unsafe {
			self.device.cmd_copy_buffer_to_image(
				cmd.cmd,
				src.buffer,
				dst.image,
				ash::vk::ImageLayout::TRANSFER_DST_OPTIMAL,
				&[BufferImageCopy::default()
					.buffer_offset(0)
					.image_subresource(ImageSubresourceLayers {
						aspect_mask: dst.format.aspect(),
						mip_level: 0,
						base_array_layer: 0,
						layer_count: 1,
					})
					.image_extent(extent.into())],
			)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::platform::ash::init::{ash_init_single_graphics_queue, AshSingleGraphicsQueueCreateInfo};

	/// Signals `semaphore` from the queue, the way an acquire nobody waits on would.
	unsafe fn signal(ash: &Ash, semaphore: Semaphore) -> anyhow::Result<()> {
		unsafe {
			let queue = ash.queue.lock();
			ash.device.queue_submit2(
				*queue,
				&[SubmitInfo2::default().signal_semaphore_infos(&[SemaphoreSubmitInfo::default()
					.semaphore(semaphore)
					.stage_mask(PipelineStageFlags2::ALL_COMMANDS)])],
				Fence::null(),
			)?;
			Ok(())
		}
	}

	#[test]
	#[ignore = "requires a Vulkan 1.3 device"]
	fn test_reset_consumes_pending_acquire_signal() -> anyhow::Result<()> {
		let ash = Ash::new(ash_init_single_graphics_queue(AshSingleGraphicsQueueCreateInfo::default())?)?;
		unsafe {
			let mut sync = ash.create_frame_sync()?;
			let semaphore = sync.image_available;

			// nothing acquired, nothing to consume
			ash.reset_acquire_signal(&mut sync)?;
			assert!(ash.device.get_fence_status(sync.fence)?);

			signal(&ash, sync.image_available)?;
			sync.acquired.store(true, Ordering::Relaxed);
			ash.reset_acquire_signal(&mut sync)?;
			assert!(!sync.acquired.load(Ordering::Relaxed));
			assert_eq!(sync.image_available, semaphore);
			assert!(ash.device.get_fence_status(sync.fence)?);

			// consumed, so it may be signaled again
			signal(&ash, sync.image_available)?;
			sync.acquired.store(true, Ordering::Relaxed);
			ash.reset_acquire_signal(&mut sync)?;

			ash.wait_idle()?;
			ash.destroy_frame_sync(sync);
		}
		Ok(())
	}
}
