//! An in-memory platform without any GPU, for testing everything above the platform seam.
//!
//! Buffers and images live in host memory and copies execute eagerly while recording. Synchronization primitives
//! track their state like the device would and report misuse as [`DummyError`] instead of hanging: waiting on a
//! completion signal that no submit will ever signal returns [`DummyError::WouldDeadlock`].

use crate::descriptor::{DescriptorCounts, DescriptorWrite, ResourceClass};
use crate::platform::{
	AcquireOutcome, BindlessPlatform, IndexType, PresentOutcome, PresentPlatform, RenderTarget,
};
use crate::resource::{
	Buffer, BufferCreateInfo, ColorSpace, Extent2D, Format, Image, ImageCreateInfo, ImageLayout, ImageUsage,
	MemoryIntent, PresentMode,
};
use crate::surface::{SurfaceCapabilities, SurfaceParams};
use parking_lot::Mutex;
use std::cell::UnsafeCell;
use std::collections::VecDeque;
use std::fmt::{Debug, Display, Formatter};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use thiserror::Error;

/// Counters of everything the platform was asked to do
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct DummyStats {
	pub maps: u32,
	pub unmaps: u32,
	pub live_buffers: u32,
	pub live_images: u32,
	pub live_descriptor_sets: u32,
	pub descriptor_updates: u32,
	pub live_surfaces: u32,
	pub swapchains_created: u32,
	pub live_swapchains: u32,
	pub live_frame_syncs: u32,
	pub live_command_buffers: u32,
	pub acquires: u32,
	pub acquire_resets: u32,
	pub fence_waits: u32,
	pub submits: u32,
	pub presents: u32,
	pub one_shot_submits: u32,
	pub wait_idles: u32,
}

/// One [`BindlessPlatform::update_descriptor_set`] call
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DummyDescriptorUpdate {
	/// every written slot, in write order
	pub slots: Vec<(ResourceClass, u32)>,
	/// amount of contiguous runs
	pub batches: usize,
	/// amount of image slots written with the default sampler
	pub default_samplers: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DummyCommand {
	BeginRendering {
		image_index: u32,
		extent: Extent2D,
		clear_color: [f32; 4],
		depth: Option<Format>,
	},
	EndRendering,
	TransitionSwapchainImage {
		image_index: u32,
		from: ImageLayout,
		to: ImageLayout,
	},
	TransitionImage {
		image: u64,
		from: ImageLayout,
		to: ImageLayout,
	},
	Bind,
	Push(Vec<u8>),
	BindVertexBuffer {
		buffer: u64,
	},
	Draw {
		vertex_count: u32,
		instance_count: u32,
	},
	DrawIndexed {
		index_buffer: u64,
		index_type: IndexType,
		index_count: u32,
		instance_count: u32,
	},
	CopyBuffer {
		src: u64,
		dst: u64,
		size: u64,
	},
	CopyBufferToImage {
		src: u64,
		dst: u64,
	},
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct DummyBufferHandle(pub u64);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct DummyImageView(pub u64);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct DummySampler(pub u32);

impl DummySampler {
	pub const DEFAULT: Self = DummySampler(0);
}

pub struct DummyBuffer {
	id: u64,
	memory: MemoryIntent,
	data: UnsafeCell<Box<[u8]>>,
}

// Safety: data is only written through the mapping, which Buffer guards with `&mut self`, or by recorded copies
unsafe impl Send for DummyBuffer {}
unsafe impl Sync for DummyBuffer {}

impl DummyBuffer {
	fn ptr(&self) -> *mut u8 {
		unsafe { (&mut *self.data.get()).as_mut_ptr() }
	}

	fn len(&self) -> usize {
		unsafe { (&*self.data.get()).len() }
	}
}

pub struct DummyImage {
	id: u64,
	sampled: bool,
	data: Mutex<Vec<u8>>,
}

#[derive(Debug)]
pub struct DummyDescriptorSet {
	pub counts: DescriptorCounts,
}

#[derive(Debug)]
pub struct DummySurface {
	id: u64,
}

#[derive(Debug)]
pub struct DummySwapchain {
	id: u64,
	params: SurfaceParams,
	next_image: AtomicU32,
}

impl DummySwapchain {
	pub fn params(&self) -> &SurfaceParams {
		&self.params
	}
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Fence {
	Signaled,
	/// `pending` if a submit will eventually signal it
	Unsignaled { pending: bool },
}

#[derive(Debug)]
struct SyncState {
	fence: Fence,
	acquire_signaled: bool,
	render_signaled: bool,
}

#[derive(Debug)]
pub struct DummyFrameSync {
	id: u64,
	state: Mutex<SyncState>,
}

#[derive(Debug, Default)]
struct CommandState {
	recording: bool,
	commands: Vec<DummyCommand>,
}

#[derive(Debug)]
pub struct DummyCommandBuffer {
	id: u64,
	state: Mutex<CommandState>,
}

impl DummyCommandBuffer {
	fn record(&self, command: DummyCommand) {
		let mut state = self.state.lock();
		debug_assert!(state.recording, "command buffer {} is not recording", self.id);
		state.commands.push(command);
	}
}

#[derive(Debug, Default)]
pub struct DummyPipeline;

#[derive(Default)]
struct DummyState {
	stats: DummyStats,
	fail_next_allocation: bool,
	fail_next_submit: bool,
	descriptor_updates: Vec<DummyDescriptorUpdate>,
	submitted: Vec<Vec<DummyCommand>>,
	acquire_script: VecDeque<AcquireOutcome>,
	present_script: VecDeque<PresentOutcome>,
	current_extent: Option<Extent2D>,
}

pub struct DummyPlatform {
	state: Mutex<DummyState>,
	next_id: AtomicU64,
	depth_formats: Vec<Format>,
	limits: DescriptorCounts,
}

impl Default for DummyPlatform {
	fn default() -> Self {
		Self::new()
	}
}

impl DummyPlatform {
	pub fn new() -> Self {
		Self {
			state: Mutex::new(DummyState::default()),
			next_id: AtomicU64::new(1),
			depth_formats: Format::DEPTH_CANDIDATES.to_vec(),
			limits: DescriptorCounts {
				uniform_buffers: 1 << 16,
				storage_buffers: 1 << 16,
				sampled_images: 1 << 16,
			},
		}
	}

	pub fn with_depth_formats(self, formats: &[Format]) -> Self {
		Self {
			depth_formats: formats.to_vec(),
			..self
		}
	}

	pub fn with_limits(self, limits: DescriptorCounts) -> Self {
		Self { limits, ..self }
	}

	fn next_id(&self) -> u64 {
		self.next_id.fetch_add(1, Ordering::Relaxed)
	}

	pub fn stats(&self) -> DummyStats {
		self.state.lock().stats
	}

	/// The next buffer, image or descriptor set allocation fails with [`DummyError::AllocationFailed`].
	pub fn fail_next_allocation(&self) {
		self.state.lock().fail_next_allocation = true;
	}

	fn check_allocation(&self) -> Result<(), DummyError> {
		let mut state = self.state.lock();
		if state.fail_next_allocation {
			state.fail_next_allocation = false;
			Err(DummyError::AllocationFailed)
		} else {
			Ok(())
		}
	}

	/// The next frame submit resets the frame's completion signal and then fails with [`DummyError::SubmitFailed`],
	/// like a queue submit erroring after its fence was reset.
	pub fn fail_next_submit(&self) {
		self.state.lock().fail_next_submit = true;
	}

	pub fn take_descriptor_updates(&self) -> Vec<DummyDescriptorUpdate> {
		std::mem::take(&mut self.state.lock().descriptor_updates)
	}

	/// The commands of every frame submitted so far, excluding one-shot work
	pub fn take_submitted(&self) -> Vec<Vec<DummyCommand>> {
		std::mem::take(&mut self.state.lock().submitted)
	}

	pub fn read_buffer(&self, buffer: &Buffer<Self>) -> Vec<u8> {
		let buffer = buffer.platform_buffer();
		unsafe { (&*buffer.data.get()).to_vec() }
	}

	pub fn read_image(&self, image: &Image<Self>) -> Vec<u8> {
		image.platform_image().data.lock().clone()
	}

	pub fn create_surface(&self) -> DummySurface {
		self.state.lock().stats.live_surfaces += 1;
		DummySurface { id: self.next_id() }
	}

	/// Lets the surface dictate its extent, or leave it to the drawable if `None`.
	pub fn set_current_extent(&self, extent: Option<Extent2D>) {
		self.state.lock().current_extent = extent;
	}

	/// Queues the outcome of a future acquire. Unscripted acquires succeed.
	pub fn script_acquire(&self, outcome: AcquireOutcome) {
		self.state.lock().acquire_script.push_back(outcome);
	}

	/// Queues the outcome of a future present. Unscripted presents succeed.
	pub fn script_present(&self, outcome: PresentOutcome) {
		self.state.lock().present_script.push_back(outcome);
	}
}

unsafe impl BindlessPlatform for DummyPlatform {
	type Buffer = DummyBuffer;
	type Image = DummyImage;
	type BufferHandle = DummyBufferHandle;
	type ImageViewHandle = DummyImageView;
	type Sampler = DummySampler;
	type DescriptorSet = DummyDescriptorSet;
	type AllocationError = DummyError;

	unsafe fn descriptor_limits(&self) -> DescriptorCounts {
		self.limits
	}

	unsafe fn create_descriptor_set(&self, counts: DescriptorCounts) -> Result<Self::DescriptorSet, DummyError> {
		self.check_allocation()?;
		self.state.lock().stats.live_descriptor_sets += 1;
		Ok(DummyDescriptorSet { counts })
	}

	unsafe fn update_descriptor_set(&self, set: &Self::DescriptorSet, writes: &[DescriptorWrite<Self>]) {
		let mut update = DummyDescriptorUpdate {
			batches: writes.len(),
			..DummyDescriptorUpdate::default()
		};
		for write in writes {
			let class = write.class();
			debug_assert!(write.first_index() as usize + write.len() <= set.counts.get(class) as usize);
			update
				.slots
				.extend((0..write.len() as u32).map(|i| (class, write.first_index() + i)));
			if let DescriptorWrite::Images { images, .. } = write {
				update.default_samplers += images.iter().filter(|i| i.sampler == DummySampler::DEFAULT).count();
			}
		}
		let mut state = self.state.lock();
		state.stats.descriptor_updates += 1;
		state.descriptor_updates.push(update);
	}

	unsafe fn destroy_descriptor_set(&self, _set: Self::DescriptorSet) {
		self.state.lock().stats.live_descriptor_sets -= 1;
	}

	unsafe fn alloc_buffer(&self, create_info: &BufferCreateInfo) -> Result<Self::Buffer, DummyError> {
		self.check_allocation()?;
		self.state.lock().stats.live_buffers += 1;
		Ok(DummyBuffer {
			id: self.next_id(),
			memory: create_info.memory,
			data: UnsafeCell::new(vec![0; create_info.size as usize].into_boxed_slice()),
		})
	}

	fn buffer_handle(buffer: &Self::Buffer) -> Self::BufferHandle {
		DummyBufferHandle(buffer.id)
	}

	unsafe fn map_buffer(&self, buffer: &Self::Buffer) -> Option<NonNull<u8>> {
		if !buffer.memory.is_host_visible() {
			return None;
		}
		self.state.lock().stats.maps += 1;
		NonNull::new(buffer.ptr())
	}

	unsafe fn unmap_buffer(&self, _buffer: &Self::Buffer) {
		self.state.lock().stats.unmaps += 1;
	}

	unsafe fn destroy_buffer(&self, _buffer: Self::Buffer) {
		self.state.lock().stats.live_buffers -= 1;
	}

	unsafe fn alloc_image(&self, create_info: &ImageCreateInfo) -> Result<Self::Image, DummyError> {
		self.check_allocation()?;
		self.state.lock().stats.live_images += 1;
		let size = create_info.extent.pixels() as usize * create_info.format.bytes_per_pixel() as usize;
		Ok(DummyImage {
			id: self.next_id(),
			sampled: create_info.usage.contains(ImageUsage::SAMPLED),
			data: Mutex::new(vec![0; size]),
		})
	}

	fn image_sampled_view(image: &Self::Image) -> Option<Self::ImageViewHandle> {
		image.sampled.then_some(DummyImageView(image.id))
	}

	unsafe fn destroy_image(&self, _image: Self::Image) {
		self.state.lock().stats.live_images -= 1;
	}

	fn default_sampler(&self) -> Self::Sampler {
		DummySampler::DEFAULT
	}

	fn supports_depth_format(&self, format: Format) -> bool {
		self.depth_formats.contains(&format)
	}
}

unsafe impl PresentPlatform for DummyPlatform {
	type Surface = DummySurface;
	type Swapchain = DummySwapchain;
	type FrameSync = DummyFrameSync;
	type CommandBuffer = DummyCommandBuffer;
	type Pipeline = DummyPipeline;
	type PresentError = DummyError;

	unsafe fn surface_capabilities(&self, _surface: &Self::Surface) -> Result<SurfaceCapabilities, DummyError> {
		Ok(SurfaceCapabilities {
			formats: vec![
				(Format::B8G8R8A8Unorm, ColorSpace::SrgbNonlinear),
				(Format::B8G8R8A8Srgb, ColorSpace::SrgbNonlinear),
			],
			present_modes: vec![PresentMode::Fifo, PresentMode::Mailbox],
			min_image_count: 2,
			max_image_count: 8,
			current_extent: self.state.lock().current_extent,
			min_extent: Extent2D::new(1, 1),
			max_extent: Extent2D::new(16384, 16384),
		})
	}

	unsafe fn create_swapchain(
		&self,
		_surface: &Self::Surface,
		params: &SurfaceParams,
		_old: Option<&Self::Swapchain>,
	) -> Result<Self::Swapchain, DummyError> {
		let mut state = self.state.lock();
		state.stats.swapchains_created += 1;
		state.stats.live_swapchains += 1;
		Ok(DummySwapchain {
			id: self.next_id(),
			params: *params,
			next_image: AtomicU32::new(0),
		})
	}

	unsafe fn destroy_swapchain(&self, _swapchain: Self::Swapchain) {
		self.state.lock().stats.live_swapchains -= 1;
	}

	unsafe fn destroy_surface(&self, _surface: Self::Surface) {
		self.state.lock().stats.live_surfaces -= 1;
	}

	unsafe fn create_frame_sync(&self) -> Result<Self::FrameSync, DummyError> {
		self.state.lock().stats.live_frame_syncs += 1;
		Ok(DummyFrameSync {
			id: self.next_id(),
			state: Mutex::new(SyncState {
				fence: Fence::Signaled,
				acquire_signaled: false,
				render_signaled: false,
			}),
		})
	}

	unsafe fn reset_acquire_signal(&self, sync: &mut Self::FrameSync) -> Result<(), DummyError> {
		sync.state.lock().acquire_signaled = false;
		self.state.lock().stats.acquire_resets += 1;
		Ok(())
	}

	unsafe fn destroy_frame_sync(&self, _sync: Self::FrameSync) {
		self.state.lock().stats.live_frame_syncs -= 1;
	}

	unsafe fn wait_frame_sync(&self, sync: &Self::FrameSync) -> Result<(), DummyError> {
		self.state.lock().stats.fence_waits += 1;
		let mut sync_state = sync.state.lock();
		match sync_state.fence {
			Fence::Signaled => Ok(()),
			Fence::Unsignaled { pending: true } => {
				sync_state.fence = Fence::Signaled;
				Ok(())
			}
			Fence::Unsignaled { pending: false } => Err(DummyError::WouldDeadlock(sync.id)),
		}
	}

	unsafe fn acquire_next_image(
		&self,
		swapchain: &Self::Swapchain,
		sync: &Self::FrameSync,
	) -> Result<AcquireOutcome, DummyError> {
		let mut sync_state = sync.state.lock();
		if sync_state.acquire_signaled {
			return Err(DummyError::AcquireSignalInUse(sync.id));
		}
		let outcome = {
			let mut state = self.state.lock();
			state.stats.acquires += 1;
			state.acquire_script.pop_front()
		};
		let outcome = outcome.unwrap_or_else(|| AcquireOutcome::Acquired {
			image_index: swapchain.next_image.fetch_add(1, Ordering::Relaxed) % swapchain.params.image_count,
			suboptimal: false,
		});
		if let AcquireOutcome::Acquired { .. } = outcome {
			sync_state.acquire_signaled = true;
		}
		Ok(outcome)
	}

	unsafe fn submit_frame(&self, sync: &Self::FrameSync, cmd: &Self::CommandBuffer) -> Result<(), DummyError> {
		let commands = {
			let cmd_state = cmd.state.lock();
			if cmd_state.recording {
				return Err(DummyError::StillRecording(cmd.id));
			}
			cmd_state.commands.clone()
		};
		let mut sync_state = sync.state.lock();
		if std::mem::take(&mut self.state.lock().fail_next_submit) {
			sync_state.fence = Fence::Unsignaled { pending: false };
			return Err(DummyError::SubmitFailed(sync.id));
		}
		if !sync_state.acquire_signaled {
			return Err(DummyError::AcquireNotSignaled(sync.id));
		}
		sync_state.acquire_signaled = false;
		sync_state.render_signaled = true;
		sync_state.fence = Fence::Unsignaled { pending: true };

		let mut state = self.state.lock();
		state.stats.submits += 1;
		state.submitted.push(commands);
		Ok(())
	}

	unsafe fn present(
		&self,
		_swapchain: &Self::Swapchain,
		sync: &Self::FrameSync,
		_image_index: u32,
	) -> Result<PresentOutcome, DummyError> {
		let mut sync_state = sync.state.lock();
		if !sync_state.render_signaled {
			return Err(DummyError::RenderNotSignaled(sync.id));
		}
		sync_state.render_signaled = false;

		let mut state = self.state.lock();
		let outcome = state.present_script.pop_front().unwrap_or(PresentOutcome::Presented);
		if outcome != PresentOutcome::OutOfDate {
			state.stats.presents += 1;
		}
		Ok(outcome)
	}

	unsafe fn wait_idle(&self) -> Result<(), DummyError> {
		self.state.lock().stats.wait_idles += 1;
		Ok(())
	}

	unsafe fn create_command_buffer(&self) -> Result<Self::CommandBuffer, DummyError> {
		self.state.lock().stats.live_command_buffers += 1;
		Ok(DummyCommandBuffer {
			id: self.next_id(),
			state: Mutex::new(CommandState::default()),
		})
	}

	unsafe fn destroy_command_buffer(&self, _cmd: Self::CommandBuffer) {
		self.state.lock().stats.live_command_buffers -= 1;
	}

	unsafe fn begin_commands(&self, cmd: &mut Self::CommandBuffer) -> Result<(), DummyError> {
		let state = cmd.state.get_mut();
		if state.recording {
			return Err(DummyError::StillRecording(cmd.id));
		}
		state.recording = true;
		state.commands.clear();
		Ok(())
	}

	unsafe fn end_commands(&self, cmd: &mut Self::CommandBuffer) -> Result<(), DummyError> {
		let state = cmd.state.get_mut();
		if !state.recording {
			return Err(DummyError::NotRecording(cmd.id));
		}
		state.recording = false;
		Ok(())
	}

	unsafe fn submit_and_wait(&self, cmd: &Self::CommandBuffer) -> Result<(), DummyError> {
		if cmd.state.lock().recording {
			return Err(DummyError::StillRecording(cmd.id));
		}
		self.state.lock().stats.one_shot_submits += 1;
		Ok(())
	}

	unsafe fn cmd_begin_rendering(&self, cmd: &Self::CommandBuffer, target: &RenderTarget<Self>) {
		debug_assert!(target.image_index < target.swapchain.params.image_count);
		cmd.record(DummyCommand::BeginRendering {
			image_index: target.image_index,
			extent: target.extent,
			clear_color: target.clear_color,
			depth: target.depth.as_ref().map(|d| d.format),
		});
	}

	unsafe fn cmd_end_rendering(&self, cmd: &Self::CommandBuffer) {
		cmd.record(DummyCommand::EndRendering);
	}

	unsafe fn cmd_transition_swapchain_image(
		&self,
		cmd: &Self::CommandBuffer,
		_swapchain: &Self::Swapchain,
		image_index: u32,
		from: ImageLayout,
		to: ImageLayout,
	) {
		cmd.record(DummyCommand::TransitionSwapchainImage { image_index, from, to });
	}

	unsafe fn cmd_transition_image(&self, cmd: &Self::CommandBuffer, image: &Self::Image, from: ImageLayout, to: ImageLayout) {
		cmd.record(DummyCommand::TransitionImage {
			image: image.id,
			from,
			to,
		});
	}

	unsafe fn cmd_bind(&self, cmd: &Self::CommandBuffer, _pipeline: &Self::Pipeline, _set: &Self::DescriptorSet) {
		cmd.record(DummyCommand::Bind);
	}

	unsafe fn cmd_push(&self, cmd: &Self::CommandBuffer, _set: &Self::DescriptorSet, bytes: &[u8]) {
		cmd.record(DummyCommand::Push(bytes.to_vec()));
	}

	unsafe fn cmd_bind_vertex_buffer(&self, cmd: &Self::CommandBuffer, buffer: &Self::Buffer, _offset: u64) {
		cmd.record(DummyCommand::BindVertexBuffer { buffer: buffer.id });
	}

	unsafe fn cmd_draw(&self, cmd: &Self::CommandBuffer, vertex_count: u32, instance_count: u32) {
		cmd.record(DummyCommand::Draw {
			vertex_count,
			instance_count,
		});
	}

	unsafe fn cmd_draw_indexed(
		&self,
		cmd: &Self::CommandBuffer,
		index_buffer: &Self::Buffer,
		index_type: IndexType,
		index_count: u32,
		instance_count: u32,
	) {
		cmd.record(DummyCommand::DrawIndexed {
			index_buffer: index_buffer.id,
			index_type,
			index_count,
			instance_count,
		});
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
		debug_assert!((src_offset + size) as usize <= src.len() && (dst_offset + size) as usize <= dst.len());
		unsafe {
			std::ptr::copy(
				src.ptr().add(src_offset as usize),
				dst.ptr().add(dst_offset as usize),
				size as usize,
			);
		}
		cmd.record(DummyCommand::CopyBuffer {
			src: src.id,
			dst: dst.id,
			size,
		});
	}

	unsafe fn cmd_copy_buffer_to_image(
		&self,
		cmd: &Self::CommandBuffer,
		src: &Self::Buffer,
		dst: &Self::Image,
		_extent: Extent2D,
	) {
		{
			let mut data = dst.data.lock();
			let len = data.len().min(src.len());
			unsafe { std::ptr::copy_nonoverlapping(src.ptr(), data.as_mut_ptr(), len) };
		}
		cmd.record(DummyCommand::CopyBufferToImage {
			src: src.id,
			dst: dst.id,
		});
	}
}

#[derive(Error)]
pub enum DummyError {
	#[error("Allocation failed on request")]
	AllocationFailed,
	#[error("Waiting on frame sync {0} would deadlock, its fence was reset without a submit")]
	WouldDeadlock(u64),
	#[error("Acquire signal of frame sync {0} is still signaled from a previous acquire")]
	AcquireSignalInUse(u64),
	#[error("Submit on frame sync {0} failed on request")]
	SubmitFailed(u64),
	#[error("Submit on frame sync {0} waits on an acquire signal that will never be signaled")]
	AcquireNotSignaled(u64),
	#[error("Present on frame sync {0} waits on a render signal that will never be signaled")]
	RenderNotSignaled(u64),
	#[error("Command buffer {0} is still recording")]
	StillRecording(u64),
	#[error("Command buffer {0} is not recording")]
	NotRecording(u64),
}

impl Debug for DummyError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		Display::fmt(self, f)
	}
}
