use crate::platform::{AcquireOutcome, PresentPlatform};
use crate::resource::Extent2D;
use crate::surface::{SurfaceCreateInfo, SurfaceParams, SurfaceState, SurfaceStatus};
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;
use thiserror::Error;

struct Swapchain<P: PresentPlatform> {
	swapchain: P::Swapchain,
	params: SurfaceParams,
}

/// An image acquired from the swapchain, valid until it is presented or the surface is recreated.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AcquiredImage {
	pub image_index: u32,
	pub extent: Extent2D,
}

/// The rotating set of presentable images of a window, plus the synchronization primitives of every frame slot.
///
/// Staleness is tracked by [`SurfaceState`]: acquiring or presenting on an out-of-date or suboptimal swapchain marks
/// it stale, after which [`Self::acquire_next_image`] returns `None` and [`Self::submit`] does nothing until
/// [`Self::recreate`] is called.
pub struct PresentationSurface<P: PresentPlatform> {
	platform: Arc<P>,
	surface: Option<P::Surface>,
	create_info: SurfaceCreateInfo,
	state: SurfaceState<Swapchain<P>>,
	frame_syncs: Vec<P::FrameSync>,
	recreate_count: u32,
}

impl<P: PresentPlatform> PresentationSurface<P> {
	/// Takes ownership of `surface`. Nothing is created until [`Self::init`].
	pub fn new(platform: &Arc<P>, surface: P::Surface, create_info: SurfaceCreateInfo) -> Self {
		Self {
			platform: platform.clone(),
			surface: Some(surface),
			create_info,
			state: SurfaceState::Uninitialized,
			frame_syncs: Vec::new(),
			recreate_count: 0,
		}
	}

	#[inline]
	pub fn platform(&self) -> &Arc<P> {
		&self.platform
	}

	#[inline]
	pub fn status(&self) -> SurfaceStatus {
		self.state.status()
	}

	#[inline]
	pub fn create_info(&self) -> &SurfaceCreateInfo {
		&self.create_info
	}

	pub fn params(&self) -> Option<&SurfaceParams> {
		self.state.swapchain().map(|s| &s.params)
	}

	pub fn extent(&self) -> Option<Extent2D> {
		self.params().map(|p| p.extent)
	}

	/// Amount of recreations since init
	#[inline]
	pub fn recreate_count(&self) -> u32 {
		self.recreate_count
	}

	#[inline]
	pub fn frames_in_flight(&self) -> u32 {
		self.create_info.frames_in_flight
	}

	/// The platform swapchain, if there is one.
	pub fn swapchain(&self) -> Option<&P::Swapchain> {
		self.state.swapchain().map(|s| &s.swapchain)
	}

	fn surface(&self) -> Result<&P::Surface, SurfaceError<P>> {
		self.surface.as_ref().ok_or(SurfaceError::Destroyed)
	}

	fn frame_sync(&self, slot: usize) -> Result<&P::FrameSync, SurfaceError<P>> {
		self.frame_syncs.get(slot).ok_or(SurfaceError::InvalidFrameSlot {
			slot,
			frames_in_flight: self.frame_syncs.len(),
		})
	}

	/// Selects format, present mode, image count and extent, then creates the swapchain and the primitives of every
	/// frame slot.
	pub fn init(&mut self, drawable: Extent2D) -> Result<(), SurfaceError<P>> {
		profiling::function_scope!();
		match self.state.status() {
			SurfaceStatus::Uninitialized => (),
			SurfaceStatus::Destroyed => return Err(SurfaceError::Destroyed),
			SurfaceStatus::Ready | SurfaceStatus::Stale => return Err(SurfaceError::AlreadyInitialized),
		}
		if drawable.is_zero_area() {
			return Err(SurfaceError::ZeroExtent);
		}
		if self.create_info.frames_in_flight == 0 {
			return Err(SurfaceError::NoFramesInFlight);
		}

		unsafe {
			let surface = self.surface()?;
			let capabilities = self
				.platform
				.surface_capabilities(surface)
				.map_err(SurfaceError::Platform)?;
			let params = SurfaceParams::select(&capabilities, &self.create_info, drawable)
				.ok_or(SurfaceError::NoSurfaceFormat)?;
			let swapchain = self
				.platform
				.create_swapchain(surface, &params, None)
				.map_err(SurfaceError::Platform)?;

			if self.frame_syncs.is_empty() {
				for _ in 0..self.create_info.frames_in_flight {
					match self.platform.create_frame_sync() {
						Ok(sync) => self.frame_syncs.push(sync),
						Err(e) => {
							self.platform.destroy_swapchain(swapchain);
							return Err(SurfaceError::Platform(e));
						}
					}
				}
			}

			log::info!(
				"created swapchain {}x{} with {} images, {:?} {:?} {:?}",
				params.extent.width,
				params.extent.height,
				params.image_count,
				params.format,
				params.color_space,
				params.present_mode
			);
			self.state.set_ready(Swapchain { swapchain, params });
		}
		Ok(())
	}

	/// Blocks until the GPU has finished the work last submitted from `slot`. Frames that were skipped never reset the
	/// completion signal, so this never waits on a submit that did not happen.
	pub fn begin_frame(&self, slot: usize) -> Result<(), SurfaceError<P>> {
		profiling::function_scope!();
		let sync = self.frame_sync(slot)?;
		unsafe { self.platform.wait_frame_sync(sync) }.map_err(SurfaceError::Platform)
	}

	/// Acquires the next image. Returns `None` and marks the surface stale if the swapchain is out of date or
	/// suboptimal, or if it was already stale.
	pub fn acquire_next_image(&mut self, slot: usize) -> Result<Option<AcquiredImage>, SurfaceError<P>> {
		profiling::function_scope!();
		let swapchain = match &self.state {
			SurfaceState::Ready(swapchain) => swapchain,
			SurfaceState::Stale(_) => return Ok(None),
			SurfaceState::Uninitialized => return Err(SurfaceError::NotInitialized),
			SurfaceState::Destroyed => return Err(SurfaceError::Destroyed),
		};
		let extent = swapchain.params.extent;
		let sync = self.frame_sync(slot)?;
		let outcome = unsafe { self.platform.acquire_next_image(&swapchain.swapchain, sync) }
			.map_err(SurfaceError::Platform)?;
		match outcome {
			AcquireOutcome::Acquired {
				image_index,
				suboptimal: false,
			} => Ok(Some(AcquiredImage { image_index, extent })),
			AcquireOutcome::Acquired { suboptimal: true, .. } => {
				log::debug!("swapchain suboptimal on acquire, marking stale");
				self.state.mark_stale();
				Ok(None)
			}
			AcquireOutcome::OutOfDate => {
				log::debug!("swapchain out of date on acquire, marking stale");
				self.state.mark_stale();
				Ok(None)
			}
		}
	}

	/// Submits the recorded work of `slot`. Does nothing and returns false if the surface is stale.
	pub fn submit(&self, slot: usize, cmd: &P::CommandBuffer) -> Result<bool, SurfaceError<P>> {
		profiling::function_scope!();
		match self.state.status() {
			SurfaceStatus::Ready => (),
			SurfaceStatus::Stale => return Ok(false),
			SurfaceStatus::Uninitialized => return Err(SurfaceError::NotInitialized),
			SurfaceStatus::Destroyed => return Err(SurfaceError::Destroyed),
		}
		let sync = self.frame_sync(slot)?;
		unsafe { self.platform.submit_frame(sync, cmd) }.map_err(SurfaceError::Platform)?;
		Ok(true)
	}

	/// Presents an image submitted from `slot`. An out-of-date or suboptimal result marks the surface stale.
	pub fn present(&mut self, slot: usize, image: AcquiredImage) -> Result<(), SurfaceError<P>> {
		profiling::function_scope!();
		let swapchain = match &self.state {
			SurfaceState::Ready(swapchain) => swapchain,
			SurfaceState::Stale(_) => return Ok(()),
			SurfaceState::Uninitialized => return Err(SurfaceError::NotInitialized),
			SurfaceState::Destroyed => return Err(SurfaceError::Destroyed),
		};
		let sync = self.frame_sync(slot)?;
		let outcome = unsafe { self.platform.present(&swapchain.swapchain, sync, image.image_index) }
			.map_err(SurfaceError::Platform)?;
		if outcome.is_stale() {
			log::debug!("swapchain {:?} on present, marking stale", outcome);
			self.state.mark_stale();
		}
		Ok(())
	}

	/// Forces a recreation before the next acquire, e.g. after the window was resized.
	pub fn mark_stale(&mut self) {
		self.state.mark_stale();
	}

	/// Waits for the device to be idle and rebuilds the swapchain at the new extent, keeping its format. A drawable of
	/// zero area is deferred: nothing happens and false is returned.
	pub fn recreate(&mut self, drawable: Extent2D) -> Result<bool, SurfaceError<P>> {
		profiling::function_scope!();
		match self.state.status() {
			SurfaceStatus::Ready | SurfaceStatus::Stale => (),
			SurfaceStatus::Uninitialized => return Err(SurfaceError::NotInitialized),
			SurfaceStatus::Destroyed => return Err(SurfaceError::Destroyed),
		}
		if drawable.is_zero_area() {
			log::debug!("deferring swapchain recreation of zero area drawable");
			return Ok(false);
		}

		unsafe {
			self.platform.wait_idle().map_err(SurfaceError::Platform)?;
			let surface = self.surface()?;
			let capabilities = self
				.platform
				.surface_capabilities(surface)
				.map_err(SurfaceError::Platform)?;
			let old = self.state.swapchain().ok_or(SurfaceError::NotInitialized)?;
			let params = old
				.params
				.with_extent(SurfaceParams::select_extent(&capabilities, drawable));
			let swapchain = self
				.platform
				.create_swapchain(surface, &params, Some(&old.swapchain))
				.map_err(SurfaceError::Platform)?;

			if let Some(old) = self.state.take_swapchain() {
				self.platform.destroy_swapchain(old.swapchain);
			}
			self.state.set_ready(Swapchain { swapchain, params });

			for sync in &mut self.frame_syncs {
				self.platform
					.reset_acquire_signal(sync)
					.map_err(SurfaceError::Platform)?;
			}
		}
		self.recreate_count += 1;
		log::info!(
			"recreated swapchain at {}x{} ({} recreations)",
			drawable.width,
			drawable.height,
			self.recreate_count
		);
		Ok(true)
	}

	/// Waits for the device to be idle and destroys the swapchain, all frame slot primitives and the surface.
	pub fn destroy(&mut self) -> Result<(), SurfaceError<P>> {
		if self.status() == SurfaceStatus::Destroyed {
			return Ok(());
		}
		unsafe {
			self.platform.wait_idle().map_err(SurfaceError::Platform)?;
			if let Some(swapchain) = self.state.destroy() {
				self.platform.destroy_swapchain(swapchain.swapchain);
			}
			for sync in self.frame_syncs.drain(..) {
				self.platform.destroy_frame_sync(sync);
			}
			if let Some(surface) = self.surface.take() {
				self.platform.destroy_surface(surface);
			}
		}
		log::debug!("destroyed presentation surface");
		Ok(())
	}
}

impl<P: PresentPlatform> Drop for PresentationSurface<P> {
	fn drop(&mut self) {
		if let Err(e) = self.destroy() {
			log::error!("failed to destroy presentation surface: {}", e);
		}
	}
}

#[derive(Error)]
pub enum SurfaceError<P: PresentPlatform> {
	#[error("Platform Error: {0}")]
	Platform(#[source] P::PresentError),
	#[error("Surface does not report any supported format")]
	NoSurfaceFormat,
	#[error("Surface can not be initialized with a zero area drawable")]
	ZeroExtent,
	#[error("Surface requires at least one frame in flight")]
	NoFramesInFlight,
	#[error("Surface is not initialized")]
	NotInitialized,
	#[error("Surface is already initialized")]
	AlreadyInitialized,
	#[error("Surface was destroyed")]
	Destroyed,
	#[error("Frame slot {slot} is out of bounds for {frames_in_flight} frames in flight")]
	InvalidFrameSlot { slot: usize, frames_in_flight: usize },
}

impl<P: PresentPlatform> Debug for SurfaceError<P> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		Display::fmt(self, f)
	}
}
