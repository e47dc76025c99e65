use crate::platform::ash::{Ash, AshBindlessDescriptorSet, AshPresentError};
use crate::platform::RenderTarget;
use crate::resource::ImageLayout;
use ash::vk::{
	AttachmentLoadOp, AttachmentStoreOp, ClearColorValue, ClearDepthStencilValue, ClearValue, CommandBuffer,
	CommandBufferAllocateInfo, CommandBufferBeginInfo, CommandBufferLevel, CommandBufferResetFlags,
	CommandBufferUsageFlags, DependencyInfo, ImageMemoryBarrier2, ImageSubresourceRange, Offset2D, Pipeline,
	PipelineBindPoint, Rect2D, RenderingAttachmentInfo, RenderingInfo, Viewport, QUEUE_FAMILY_IGNORED,
};

pub struct AshCommandBuffer {
	pub cmd: CommandBuffer,
}

impl AshCommandBuffer {
	pub unsafe fn new(ash: &Ash) -> Result<Self, AshPresentError> {
		unsafe {
			let pool = ash.command_pool.lock();
			let cmd = ash
				.device
				.allocate_command_buffers(
					&CommandBufferAllocateInfo::default()
						.command_pool(*pool)
						.level(CommandBufferLevel::PRIMARY)
						.command_buffer_count(1),
				)?
				.into_iter()
				.next()
				.ok_or(ash::vk::Result::ERROR_OUT_OF_POOL_MEMORY)?;
			Ok(Self { cmd })
		}
	}

	pub unsafe fn destroy(self, ash: &Ash) {
		unsafe {
			let pool = ash.command_pool.lock();
			ash.device.free_command_buffers(*pool, &[self.cmd]);
		}
	}

	pub unsafe fn begin(&mut self, ash: &Ash) -> Result<(), AshPresentError> {
		unsafe {
			ash.device
				.reset_command_buffer(self.cmd, CommandBufferResetFlags::empty())?;
			ash.device.begin_command_buffer(
				self.cmd,
				&CommandBufferBeginInfo::default().flags(CommandBufferUsageFlags::ONE_TIME_SUBMIT),
			)?;
			Ok(())
		}
	}

	pub unsafe fn end(&mut self, ash: &Ash) -> Result<(), AshPresentError> {
		unsafe { Ok(ash.device.end_command_buffer(self.cmd)?) }
	}

	/// A full barrier between the accesses implied by both layouts, transitioning the layout.
	pub unsafe fn transition(
		&self,
		ash: &Ash,
		image: ash::vk::Image,
		subresource_range: ImageSubresourceRange,
		from: ImageLayout,
		to: ImageLayout,
	) {
		unsafe {
			let src = from.to_ash_image_access();
			let dst = to.to_ash_image_access();
			ash.device.cmd_pipeline_barrier2(
				self.cmd,
				&DependencyInfo::default().image_memory_barriers(&[ImageMemoryBarrier2::default()
					.src_stage_mask(src.stage_mask)
					.src_access_mask(src.access_mask)
					.old_layout(src.image_layout)
					.dst_stage_mask(dst.stage_mask)
					.dst_access_mask(dst.access_mask)
					.new_layout(dst.image_layout)
					.src_queue_family_index(QUEUE_FAMILY_IGNORED)
					.dst_queue_family_index(QUEUE_FAMILY_IGNORED)
					.image(image)
					.subresource_range(subresource_range)]),
			);
		}
	}

	pub unsafe fn begin_rendering(&self, ash: &Ash, target: &RenderTarget<Ash>) {
		unsafe {
			let extent = ash::vk::Extent2D::from(target.extent);
			let color = [RenderingAttachmentInfo::default()
				.image_view(target.swapchain.views[target.image_index as usize])
				.image_layout(ash::vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
				.load_op(AttachmentLoadOp::CLEAR)
				.store_op(AttachmentStoreOp::STORE)
				.clear_value(ClearValue {
					color: ClearColorValue {
						float32: target.clear_color,
					},
				})];
			let depth = target.depth.as_ref().and_then(|depth| {
				Some(
					RenderingAttachmentInfo::default()
						.image_view(depth.image.image_view?)
						.image_layout(ash::vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
						.load_op(AttachmentLoadOp::CLEAR)
						.store_op(AttachmentStoreOp::DONT_CARE)
						.clear_value(ClearValue {
							depth_stencil: ClearDepthStencilValue {
								depth: depth.clear_depth,
								stencil: 0,
							},
						}),
				)
			});
			let render_area = Rect2D {
				offset: Offset2D { x: 0, y: 0 },
				extent,
			};
			let mut rendering_info = RenderingInfo::default()
				.render_area(render_area)
				.layer_count(1)
				.color_attachments(&color);
			if let Some(depth) = depth.as_ref() {
				rendering_info = rendering_info.depth_attachment(depth);
			}
			ash.device.cmd_begin_rendering(self.cmd, &rendering_info);

			ash.device.cmd_set_viewport(
				self.cmd,
				0,
				&[Viewport {
					x: 0.,
					y: 0.,
					width: extent.width as f32,
					height: extent.height as f32,
					min_depth: 0.,
					max_depth: 1.,
				}],
			);
			ash.device.cmd_set_scissor(self.cmd, 0, &[render_area]);
		}
	}

	pub unsafe fn bind(&self, ash: &Ash, pipeline: &AshPipeline, set: &AshBindlessDescriptorSet) {
		unsafe {
			ash.device
				.cmd_bind_pipeline(self.cmd, pipeline.bind_point, pipeline.pipeline);
			ash.device.cmd_bind_descriptor_sets(
				self.cmd,
				pipeline.bind_point,
				set.pipeline_layout,
				0,
				&[set.set],
				&[],
			);
		}
	}
}

/// A pipeline created with the pipeline layout of the bindless descriptor set, with viewport and scissor as dynamic
/// state. Creating pipelines from shaders is up to the application.
#[derive(Copy, Clone, Debug)]
pub struct AshPipeline {
	pub pipeline: Pipeline,
	pub bind_point: PipelineBindPoint,
}

impl AshPipeline {
	/// # Safety
	/// `pipeline` must have been created with [`AshBindlessDescriptorSet::pipeline_layout`].
	pub unsafe fn from_raw(pipeline: Pipeline, bind_point: PipelineBindPoint) -> Self {
		Self { pipeline, bind_point }
	}

	/// # Safety
	/// The GPU must no longer use the pipeline.
	pub unsafe fn destroy(self, ash: &Ash) {
		unsafe { ash.device.destroy_pipeline(self.pipeline, None) }
	}
}
