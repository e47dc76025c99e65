use crate::backing::slot_pool::FrameNumber;
use crate::descriptor::TableCreateError;
use crate::platform::PresentPlatform;
use crate::resource::{NoDepthFormatError, ResourceError, UsageError};
use crate::surface::SurfaceError;
use std::fmt::{Debug, Display, Formatter};
use thiserror::Error;

#[derive(Error)]
pub enum FrameError<P: PresentPlatform> {
	#[error("Surface Error: {0}")]
	Surface(#[from] SurfaceError<P>),
	#[error("Platform Error: {0}")]
	Platform(#[source] P::PresentError),
	#[error("Resource Error: {0}")]
	Resource(#[from] ResourceError<P>),
	#[error("Usage Error: {0}")]
	Usage(#[from] UsageError),
	#[error("Bindless Table Error: {0}")]
	Table(#[from] TableCreateError<P>),
	#[error("{0}")]
	NoDepthFormat(#[from] NoDepthFormatError),
	#[error("A frame is already being recorded, it must be ended before the next one can begin")]
	AlreadyRecording,
	#[error("Frame {0} is not the frame currently being recorded")]
	ForeignRecording(FrameNumber),
}

impl<P: PresentPlatform> Debug for FrameError<P> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		Display::fmt(self, f)
	}
}
