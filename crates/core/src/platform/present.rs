use crate::platform::BindlessPlatform;
use crate::resource::{Extent2D, Format, ImageLayout};
use crate::surface::{SurfaceCapabilities, SurfaceParams};
use std::error::Error;

/// Size of the push constant range shared by all pipelines, the minimum every Vulkan device supports.
pub const MAX_PUSH_CONSTANT_SIZE: u32 = 128;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AcquireOutcome {
	/// An image was acquired and the acquire signal of the frame slot will be signaled. A suboptimal swapchain still
	/// works, but should be recreated.
	Acquired { image_index: u32, suboptimal: bool },
	/// No image was acquired, the swapchain must be recreated.
	OutOfDate,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PresentOutcome {
	Presented,
	Suboptimal,
	OutOfDate,
}

impl PresentOutcome {
	pub fn is_stale(&self) -> bool {
		!matches!(self, PresentOutcome::Presented)
	}
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum IndexType {
	U16,
	#[default]
	U32,
}

impl IndexType {
	pub fn size(&self) -> u64 {
		match self {
			IndexType::U16 => 2,
			IndexType::U32 => 4,
		}
	}
}

pub struct DepthAttachment<'a, P: PresentPlatform> {
	pub image: &'a P::Image,
	pub format: Format,
	pub clear_depth: f32,
}

/// Everything required to begin rendering into a swapchain image.
pub struct RenderTarget<'a, P: PresentPlatform> {
	pub swapchain: &'a P::Swapchain,
	pub image_index: u32,
	pub extent: Extent2D,
	pub clear_color: [f32; 4],
	pub depth: Option<DepthAttachment<'a, P>>,
}

/// Internal interface for presenting to a surface and recording frames, may change at any time!
///
/// # Safety
/// All `cmd_*` functions must only be called on a command buffer between [`Self::begin_commands`] and
/// [`Self::end_commands`]. Any resource referenced by a recorded command must outlive the execution of the command
/// buffer.
pub unsafe trait PresentPlatform: BindlessPlatform {
	type Surface: 'static + Send + Sync;
	type Swapchain: 'static + Send + Sync;
	/// The per frame slot synchronization primitives: a host-waitable completion signal, an image acquired signal and
	/// a render complete signal.
	type FrameSync: 'static + Send + Sync;
	type CommandBuffer: 'static + Send + Sync;
	type Pipeline: 'static + Send + Sync;
	type PresentError: 'static + Error + Send + Sync;

	unsafe fn surface_capabilities(&self, surface: &Self::Surface)
		-> Result<SurfaceCapabilities, Self::PresentError>;

	/// Creates a swapchain, retiring `old` if present. `old` must be destroyed by the caller afterward.
	unsafe fn create_swapchain(
		&self,
		surface: &Self::Surface,
		params: &SurfaceParams,
		old: Option<&Self::Swapchain>,
	) -> Result<Self::Swapchain, Self::PresentError>;

	/// # Safety
	/// No image of the swapchain may be in use by the GPU.
	unsafe fn destroy_swapchain(&self, swapchain: Self::Swapchain);

	/// # Safety
	/// The swapchain of the surface must be destroyed already.
	unsafe fn destroy_surface(&self, surface: Self::Surface);

	/// Creates the primitives of a frame slot, with the completion signal already signaled.
	unsafe fn create_frame_sync(&self) -> Result<Self::FrameSync, Self::PresentError>;

	/// Returns the image acquired signal to unsignaled, waiting for a pending signal of an acquire that was never
	/// submitted to arrive and consuming it. Required after an acquire succeeded but the frame was skipped, as nothing
	/// else will ever wait on that signal. Leaves the completion signal signaled.
	///
	/// # Safety
	/// The device must be idle.
	unsafe fn reset_acquire_signal(&self, sync: &mut Self::FrameSync) -> Result<(), Self::PresentError>;

	/// # Safety
	/// The GPU must no longer use the primitives.
	unsafe fn destroy_frame_sync(&self, sync: Self::FrameSync);

	/// Blocks until the completion signal of the slot is signaled, without resetting it.
	unsafe fn wait_frame_sync(&self, sync: &Self::FrameSync) -> Result<(), Self::PresentError>;

	unsafe fn acquire_next_image(
		&self,
		swapchain: &Self::Swapchain,
		sync: &Self::FrameSync,
	) -> Result<AcquireOutcome, Self::PresentError>;

	/// Resets the completion signal and submits `cmd`, waiting on the image acquired signal and signaling both the
	/// render complete and completion signals.
	unsafe fn submit_frame(&self, sync: &Self::FrameSync, cmd: &Self::CommandBuffer)
		-> Result<(), Self::PresentError>;

	/// Presents `image_index` once the render complete signal is signaled.
	unsafe fn present(
		&self,
		swapchain: &Self::Swapchain,
		sync: &Self::FrameSync,
		image_index: u32,
	) -> Result<PresentOutcome, Self::PresentError>;

	unsafe fn wait_idle(&self) -> Result<(), Self::PresentError>;

	unsafe fn create_command_buffer(&self) -> Result<Self::CommandBuffer, Self::PresentError>;

	/// # Safety
	/// The GPU must no longer use the command buffer.
	unsafe fn destroy_command_buffer(&self, cmd: Self::CommandBuffer);

	/// Resets and begins recording the command buffer.
	unsafe fn begin_commands(&self, cmd: &mut Self::CommandBuffer) -> Result<(), Self::PresentError>;

	unsafe fn end_commands(&self, cmd: &mut Self::CommandBuffer) -> Result<(), Self::PresentError>;

	/// Submits `cmd` outside any frame slot and blocks until the queue is idle.
	unsafe fn submit_and_wait(&self, cmd: &Self::CommandBuffer) -> Result<(), Self::PresentError>;

	/// Begins rendering into the target, clearing all attachments and setting the viewport and scissor to the full
	/// extent.
	unsafe fn cmd_begin_rendering(&self, cmd: &Self::CommandBuffer, target: &RenderTarget<Self>);

	unsafe fn cmd_end_rendering(&self, cmd: &Self::CommandBuffer);

	unsafe fn cmd_transition_swapchain_image(
		&self,
		cmd: &Self::CommandBuffer,
		swapchain: &Self::Swapchain,
		image_index: u32,
		from: ImageLayout,
		to: ImageLayout,
	);

	unsafe fn cmd_transition_image(
		&self,
		cmd: &Self::CommandBuffer,
		image: &Self::Image,
		from: ImageLayout,
		to: ImageLayout,
	);

	/// Binds the pipeline and the bindless descriptor set at set 0.
	unsafe fn cmd_bind(&self, cmd: &Self::CommandBuffer, pipeline: &Self::Pipeline, set: &Self::DescriptorSet);

	/// Writes `bytes` to the push constant range shared by all pipelines using the layout of `set`, starting at
	/// offset 0.
	unsafe fn cmd_push(&self, cmd: &Self::CommandBuffer, set: &Self::DescriptorSet, bytes: &[u8]);

	unsafe fn cmd_bind_vertex_buffer(&self, cmd: &Self::CommandBuffer, buffer: &Self::Buffer, offset: u64);

	unsafe fn cmd_draw(&self, cmd: &Self::CommandBuffer, vertex_count: u32, instance_count: u32);

	unsafe fn cmd_draw_indexed(
		&self,
		cmd: &Self::CommandBuffer,
		index_buffer: &Self::Buffer,
		index_type: IndexType,
		index_count: u32,
		instance_count: u32,
	);

	unsafe fn cmd_copy_buffer(
		&self,
		cmd: &Self::CommandBuffer,
		src: &Self::Buffer,
		dst: &Self::Buffer,
		src_offset: u64,
		dst_offset: u64,
		size: u64,
	);

	/// Copies tightly packed texels of `src` into mip 0 of `dst`, which must be in [`ImageLayout::TransferDst`].
	unsafe fn cmd_copy_buffer_to_image(
		&self,
		cmd: &Self::CommandBuffer,
		src: &Self::Buffer,
		dst: &Self::Image,
		extent: Extent2D,
	);
}
