use crate::backing::slot_pool::FrameNumber;
use crate::descriptor::{BindlessTable, DescriptorCounts};
use crate::frame::{FrameError, FrameOutcome, FrameRecording, OneShotWork};
use crate::platform::{DepthAttachment, IndexType, PresentPlatform, RenderTarget, MAX_PUSH_CONSTANT_SIZE};
use crate::resource::{Buffer, BufferUsage, DepthTarget, Extent2D, Format, ImageLayout, UsageError};
use crate::surface::{AcquiredImage, PresentationSurface, SurfaceCreateInfo, SurfaceError, SurfaceStatus};
use bytemuck::Pod;
use std::sync::{Arc, Weak};

#[derive(Copy, Clone, Debug)]
pub struct FrameManagerCreateInfo {
	pub surface: SurfaceCreateInfo,
	pub descriptor_counts: DescriptorCounts,
	pub clear_color: [f32; 4],
	pub clear_depth: f32,
	/// Whether to render with a depth attachment
	pub depth: bool,
}

impl Default for FrameManagerCreateInfo {
	fn default() -> Self {
		Self {
			surface: SurfaceCreateInfo::default(),
			descriptor_counts: DescriptorCounts::DEFAULT,
			clear_color: [0., 0., 0., 1.],
			clear_depth: 1.,
			depth: true,
		}
	}
}

struct FrameContext<P: PresentPlatform> {
	command_buffer: P::CommandBuffer,
	/// The last frame submitted from this slot, complete once the slot's completion signal was waited on
	last_submitted: FrameNumber,
}

/// The frame between [`FrameManager::begin_frame`] and [`FrameManager::end_frame`].
struct ActiveRecording {
	slot: usize,
	frame: FrameNumber,
	image: AcquiredImage,
	/// dead once the [`FrameRecording`] was dropped without being ended
	token: Weak<()>,
}

impl ActiveRecording {
	fn is_abandoned(&self) -> bool {
		self.token.strong_count() == 0
	}
}

/// Drives the per frame cycle of waiting on a frame slot, acquiring, recording, submitting and presenting.
///
/// Up to `frames_in_flight` frames may execute on the GPU while the next one is recorded. [`Self::begin_frame`] is the
/// only call that blocks, and only on the completion of the frame last submitted from the same slot. Every frame
/// publishes all pending bindless table changes before recording, and slots released in the table are only reused
/// once all frames that could have referenced them completed.
///
/// Buffers referenced by recorded commands must outlive the frame, see [`Self::bind_vertex_buffer`].
pub struct FrameManager<P: PresentPlatform> {
	platform: Arc<P>,
	frames: Vec<FrameContext<P>>,
	depth: Option<DepthTarget<P>>,
	depth_format: Option<Format>,
	surface: PresentationSurface<P>,
	table: Arc<BindlessTable<P>>,
	clear_color: [f32; 4],
	clear_depth: f32,
	desired_extent: Extent2D,
	resize_pending: bool,
	current_slot: usize,
	frame_counter: FrameNumber,
	recording: Option<ActiveRecording>,
}

impl<P: PresentPlatform> FrameManager<P> {
	/// Takes ownership of `surface`. A `drawable` of zero area defers creating the swapchain until the first
	/// [`Self::begin_frame`] after a nonzero [`Self::resize`].
	pub fn new(
		platform: &Arc<P>,
		surface: P::Surface,
		create_info: &FrameManagerCreateInfo,
		drawable: Extent2D,
	) -> Result<Self, FrameError<P>> {
		let surface = PresentationSurface::new(platform, surface, create_info.surface);
		if create_info.surface.frames_in_flight == 0 {
			return Err(FrameError::Surface(SurfaceError::NoFramesInFlight));
		}
		let table = Arc::new(BindlessTable::new(platform, create_info.descriptor_counts)?);
		let depth_format = if create_info.depth {
			Some(DepthTarget::select_format(&**platform)?)
		} else {
			None
		};

		let mut manager = Self {
			platform: platform.clone(),
			frames: Vec::new(),
			depth: None,
			depth_format,
			surface,
			table,
			clear_color: create_info.clear_color,
			clear_depth: create_info.clear_depth,
			desired_extent: drawable,
			resize_pending: false,
			current_slot: 0,
			frame_counter: 0,
			recording: None,
		};
		for _ in 0..create_info.surface.frames_in_flight {
			let command_buffer = unsafe { platform.create_command_buffer() }.map_err(FrameError::Platform)?;
			manager.frames.push(FrameContext {
				command_buffer,
				last_submitted: 0,
			});
		}
		if !drawable.is_zero_area() {
			manager.initialize()?;
		}
		Ok(manager)
	}

	#[inline]
	pub fn platform(&self) -> &Arc<P> {
		&self.platform
	}

	/// The bindless table shared by all frames. Clone the `Arc` to register resources from other threads.
	#[inline]
	pub fn table(&self) -> &Arc<BindlessTable<P>> {
		&self.table
	}

	#[inline]
	pub fn surface(&self) -> &PresentationSurface<P> {
		&self.surface
	}

	#[inline]
	pub fn depth(&self) -> Option<&DepthTarget<P>> {
		self.depth.as_ref()
	}

	/// The number of the last frame that began recording, 0 before the first one.
	#[inline]
	pub fn frame_counter(&self) -> FrameNumber {
		self.frame_counter
	}

	#[inline]
	pub fn frames_in_flight(&self) -> usize {
		self.frames.len()
	}

	#[inline]
	pub fn desired_extent(&self) -> Extent2D {
		self.desired_extent
	}

	/// Whether a [`FrameRecording`] handed out by [`Self::begin_frame`] is still alive and not ended.
	#[inline]
	pub fn is_recording(&self) -> bool {
		self.recording.as_ref().is_some_and(|active| !active.is_abandoned())
	}

	/// Records the new drawable size. A nonzero size different from the current swapchain extent recreates the
	/// swapchain on the next [`Self::begin_frame`], a zero area skips all frames until the next nonzero resize.
	pub fn resize(&mut self, width: u32, height: u32) {
		let extent = Extent2D::new(width, height);
		if extent != self.desired_extent {
			log::debug!("resize to {}x{}", width, height);
		}
		self.desired_extent = extent;
		self.resize_pending = !extent.is_zero_area() && self.surface.extent() != Some(extent);
	}

	fn initialize(&mut self) -> Result<(), FrameError<P>> {
		self.surface.init(self.desired_extent)?;
		self.resize_pending = false;
		self.resize_depth()
	}

	fn recreate(&mut self) -> Result<(), FrameError<P>> {
		if self.surface.recreate(self.desired_extent)? {
			self.resize_pending = false;
			self.resize_depth()?;
		}
		Ok(())
	}

	/// Matches the depth target to the swapchain extent. Must only be called while the device is idle.
	fn resize_depth(&mut self) -> Result<(), FrameError<P>> {
		let Some(extent) = self.surface.extent() else {
			return Ok(());
		};
		if let Some(depth) = &mut self.depth {
			depth.resize(&self.platform, extent)?;
		} else if let Some(format) = self.depth_format {
			self.depth = Some(DepthTarget::new(&self.platform, format, extent)?);
		}
		Ok(())
	}

	/// Waits for the current frame slot, acquires the next image and begins rendering into it with all attachments
	/// cleared. Returns [`FrameOutcome::Skip`] if the drawable has zero area or the swapchain turned out stale, in
	/// which case nothing was recorded and the swapchain was recreated if possible.
	///
	/// A previous [`FrameRecording`] that was dropped without [`Self::end_frame`] is ended and submitted first.
	pub fn begin_frame(&mut self) -> Result<FrameOutcome, FrameError<P>> {
		profiling::function_scope!();
		if let Some(active) = &self.recording {
			if !active.is_abandoned() {
				return Err(FrameError::AlreadyRecording);
			}
			let ActiveRecording { slot, frame, image, .. } = *active;
			self.recording = None;
			log::warn!("frame {} was dropped without being ended, submitting it as recorded", frame);
			self.finish_frame(slot, frame, image)?;
		}
		if self.desired_extent.is_zero_area() {
			log::trace!("skipping frame of zero area drawable");
			return Ok(FrameOutcome::Skip);
		}
		match self.surface.status() {
			SurfaceStatus::Uninitialized => self.initialize()?,
			SurfaceStatus::Stale => self.recreate()?,
			SurfaceStatus::Ready if self.resize_pending => self.recreate()?,
			SurfaceStatus::Ready => (),
			SurfaceStatus::Destroyed => return Err(FrameError::Surface(SurfaceError::Destroyed)),
		}

		let slot = self.current_slot;
		self.surface.begin_frame(slot)?;
		self.table.reclaim_completed(self.frames[slot].last_submitted);

		let Some(image) = self.surface.acquire_next_image(slot)? else {
			log::debug!("skipping frame, swapchain is stale");
			self.recreate()?;
			return Ok(FrameOutcome::Skip);
		};

		self.frame_counter += 1;
		let frame = self.frame_counter;
		self.table.mark_frame_recording(frame);
		let published = self.table.publish_pending();
		if !published.is_empty() {
			log::trace!("frame {}: published {:?}", frame, published);
		}

		let swapchain = self.surface.swapchain().ok_or(FrameError::Surface(SurfaceError::NotInitialized))?;
		let cmd = &mut self.frames[slot].command_buffer;
		unsafe {
			self.platform.begin_commands(cmd).map_err(FrameError::Platform)?;
			self.platform.cmd_transition_swapchain_image(
				cmd,
				swapchain,
				image.image_index,
				ImageLayout::Undefined,
				ImageLayout::ColorAttachment,
			);
			if let Some(depth) = &mut self.depth {
				let depth_image = depth.image_mut();
				depth_image.discard_contents();
				let from = depth_image.transition(ImageLayout::DepthAttachment)?;
				self.platform
					.cmd_transition_image(cmd, depth_image.platform_image(), from, ImageLayout::DepthAttachment);
			}
			self.platform.cmd_begin_rendering(
				cmd,
				&RenderTarget {
					swapchain,
					image_index: image.image_index,
					extent: image.extent,
					clear_color: self.clear_color,
					depth: self.depth.as_ref().map(|depth| DepthAttachment {
						image: depth.image().platform_image(),
						format: depth.format(),
						clear_depth: self.clear_depth,
					}),
				},
			);
		}

		let token = Arc::new(());
		self.recording = Some(ActiveRecording {
			slot,
			frame,
			image,
			token: Arc::downgrade(&token),
		});
		Ok(FrameOutcome::Recording(FrameRecording {
			slot,
			frame,
			image,
			token,
		}))
	}

	/// Finishes recording, submits and presents the frame and rotates to the next frame slot. A swapchain found stale
	/// while presenting is recreated by the next [`Self::begin_frame`].
	pub fn end_frame(&mut self, rec: FrameRecording) -> Result<(), FrameError<P>> {
		profiling::function_scope!();
		self.recording_cmd(&rec)?;
		self.recording = None;
		let FrameRecording { slot, frame, image, .. } = rec;
		self.finish_frame(slot, frame, image)
	}

	fn finish_frame(&mut self, slot: usize, frame: FrameNumber, image: AcquiredImage) -> Result<(), FrameError<P>> {
		let swapchain = self.surface.swapchain().ok_or(FrameError::Surface(SurfaceError::NotInitialized))?;
		let context = &mut self.frames[slot];
		unsafe {
			self.platform.cmd_end_rendering(&context.command_buffer);
			self.platform.cmd_transition_swapchain_image(
				&context.command_buffer,
				swapchain,
				image.image_index,
				ImageLayout::ColorAttachment,
				ImageLayout::PresentSrc,
			);
			self.platform
				.end_commands(&mut context.command_buffer)
				.map_err(FrameError::Platform)?;
		}

		if self.surface.submit(slot, &context.command_buffer)? {
			context.last_submitted = frame;
			self.surface.present(slot, image)?;
		} else {
			log::debug!("dropping frame {}, swapchain went stale while recording", frame);
		}
		self.current_slot = (slot + 1) % self.frames.len();
		Ok(())
	}

	fn recording_cmd(&self, rec: &FrameRecording) -> Result<&P::CommandBuffer, FrameError<P>> {
		if self.recording.as_ref().map(|active| active.frame) != Some(rec.frame) {
			return Err(FrameError::ForeignRecording(rec.frame));
		}
		self.frames
			.get(rec.slot)
			.map(|context| &context.command_buffer)
			.ok_or(FrameError::ForeignRecording(rec.frame))
	}

	/// Binds a pipeline together with the bindless descriptor set.
	pub fn bind(&self, rec: &FrameRecording, pipeline: &P::Pipeline) -> Result<(), FrameError<P>> {
		let cmd = self.recording_cmd(rec)?;
		unsafe { self.platform.cmd_bind(cmd, pipeline, self.table.descriptor_set()) };
		Ok(())
	}

	pub fn push<T: Pod>(&self, rec: &FrameRecording, push_constants: &T) -> Result<(), FrameError<P>> {
		let cmd = self.recording_cmd(rec)?;
		let bytes = bytemuck::bytes_of(push_constants);
		if bytes.len() > MAX_PUSH_CONSTANT_SIZE as usize {
			return Err(UsageError::PushConstantTooLarge {
				size: bytes.len(),
				max: MAX_PUSH_CONSTANT_SIZE as usize,
			}
			.into());
		}
		unsafe { self.platform.cmd_push(cmd, self.table.descriptor_set(), bytes) };
		Ok(())
	}

	/// # Safety
	/// `buffer` must not be dropped before the frame completed executing.
	pub unsafe fn bind_vertex_buffer(&self, rec: &FrameRecording, buffer: &Buffer<P>) -> Result<(), FrameError<P>> {
		let cmd = self.recording_cmd(rec)?;
		buffer.require_usage(BufferUsage::VERTEX, "VERTEX")?;
		unsafe { self.platform.cmd_bind_vertex_buffer(cmd, buffer.platform_buffer(), 0) };
		Ok(())
	}

	pub fn draw(&self, rec: &FrameRecording, vertex_count: u32, instance_count: u32) -> Result<(), FrameError<P>> {
		let cmd = self.recording_cmd(rec)?;
		unsafe { self.platform.cmd_draw(cmd, vertex_count, instance_count) };
		Ok(())
	}

	/// # Safety
	/// `index_buffer` must not be dropped before the frame completed executing.
	pub unsafe fn draw_indexed(
		&self,
		rec: &FrameRecording,
		index_buffer: &Buffer<P>,
		index_type: IndexType,
		index_count: u32,
		instance_count: u32,
	) -> Result<(), FrameError<P>> {
		let cmd = self.recording_cmd(rec)?;
		index_buffer.require_usage(BufferUsage::INDEX, "INDEX")?;
		let end = index_count as u64 * index_type.size();
		if end > index_buffer.size() {
			return Err(UsageError::RangeOutOfBounds {
				name: index_buffer.name().to_string(),
				offset: 0,
				end,
				size: index_buffer.size(),
			}
			.into());
		}
		unsafe {
			self.platform.cmd_draw_indexed(
				cmd,
				index_buffer.platform_buffer(),
				index_type,
				index_count,
				instance_count,
			)
		};
		Ok(())
	}

	/// Begins recording work outside the frame rotation, e.g. uploads during setup.
	pub fn begin_one_shot_work<'a>(&self) -> Result<OneShotWork<'a, P>, FrameError<P>> {
		OneShotWork::new(&self.platform)
	}

	/// Submits the work and blocks until the queue is idle, then frees its command buffer.
	pub fn end_one_shot_work(&self, work: OneShotWork<'_, P>) -> Result<(), FrameError<P>> {
		work.submit()
	}
}

impl<P: PresentPlatform> Drop for FrameManager<P> {
	fn drop(&mut self) {
		unsafe {
			if let Err(e) = self.platform.wait_idle() {
				log::error!("failed to wait for the device to be idle on shutdown: {}", e);
			}
			for context in self.frames.drain(..) {
				self.platform.destroy_command_buffer(context.command_buffer);
			}
		}
	}
}
