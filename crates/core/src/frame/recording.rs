use crate::backing::slot_pool::FrameNumber;
use crate::resource::Extent2D;
use crate::surface::AcquiredImage;
use bytemuck_derive::{Pod, Zeroable};
use glam::Mat4;
use std::sync::Arc;

/// Proof that a frame is being recorded, returned by [`FrameManager::begin_frame`] and consumed by
/// [`FrameManager::end_frame`]. Every recording operation requires it, so commands can only be recorded in between.
///
/// [`FrameManager::begin_frame`]: crate::frame::FrameManager::begin_frame
/// [`FrameManager::end_frame`]: crate::frame::FrameManager::end_frame
///
/// Dropping a recording without ending it does not wedge the manager: the next [`FrameManager::begin_frame`] ends,
/// submits and presents whatever was recorded so far.
#[must_use = "a dropped frame is only submitted by the next begin_frame"]
#[derive(Debug)]
pub struct FrameRecording {
	pub(crate) slot: usize,
	pub(crate) frame: FrameNumber,
	pub(crate) image: AcquiredImage,
	/// the manager holds a weak reference to notice the recording being dropped
	pub(crate) token: Arc<()>,
}

impl FrameRecording {
	#[inline]
	pub fn frame(&self) -> FrameNumber {
		self.frame
	}

	#[inline]
	pub fn slot(&self) -> usize {
		self.slot
	}

	/// Index of the swapchain image rendered into
	#[inline]
	pub fn image_index(&self) -> u32 {
		self.image.image_index
	}

	#[inline]
	pub fn extent(&self) -> Extent2D {
		self.image.extent
	}
}

#[must_use]
#[derive(Debug)]
pub enum FrameOutcome {
	Recording(FrameRecording),
	/// Nothing was acquired or recorded, try again next frame.
	Skip,
}

impl FrameOutcome {
	pub fn recording(self) -> Option<FrameRecording> {
		match self {
			FrameOutcome::Recording(rec) => Some(rec),
			FrameOutcome::Skip => None,
		}
	}
}

/// The push constants most draws need: a transform and the bindless table index of the data to draw.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PushConstants {
	pub transform: Mat4,
	pub slot: u32,
	pub _pad: [u32; 3],
}

impl PushConstants {
	pub fn new(transform: Mat4, slot: u32) -> Self {
		Self {
			transform,
			slot,
			_pad: [0; 3],
		}
	}
}

static_assertions::const_assert!(
	core::mem::size_of::<PushConstants>() <= crate::platform::MAX_PUSH_CONSTANT_SIZE as usize
);
