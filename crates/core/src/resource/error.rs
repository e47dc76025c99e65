use crate::platform::BindlessPlatform;
use crate::resource::ImageLayout;
use std::fmt::{Debug, Display, Formatter};
use thiserror::Error;

/// A caller violated a contract of the API. These are programming errors, not environmental failures.
#[derive(Error)]
pub enum UsageError {
	#[error("Resource {name} must have at least one usage declared")]
	NoUsageDeclared { name: String },
	#[error("Resource {name} must not be empty")]
	ZeroSize { name: String },
	#[error("Resource {name} is missing usage {required} for this operation")]
	MissingUsage { name: String, required: &'static str },
	#[error("Image {name} can not be host-visible, images are always optimally tiled")]
	HostVisibleImage { name: String },
	#[error("Image {name} does not support the layout transition {from:?} -> {to:?}")]
	UnsupportedLayoutTransition {
		name: String,
		from: ImageLayout,
		to: ImageLayout,
	},
	#[error("Range {offset}..{end} is out of bounds of buffer {name} with size {size}")]
	RangeOutOfBounds { name: String, offset: u64, end: u64, size: u64 },
	#[error("Push constant of {size} bytes exceeds the maximum of {max} bytes")]
	PushConstantTooLarge { size: usize, max: usize },
	#[error("Pixel data has {actual} bytes, but {expected} bytes are required for {width}x{height} with {channels} channels")]
	PixelDataMismatch {
		actual: usize,
		expected: usize,
		width: u32,
		height: u32,
		channels: u32,
	},
	#[error("Textures must have between 1 and 4 channels, not {0}")]
	UnsupportedChannelCount(u32),
}

impl Debug for UsageError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		Display::fmt(self, f)
	}
}

#[derive(Error)]
pub enum ResourceError<P: BindlessPlatform> {
	#[error("Platform Error: {0}")]
	Allocation(#[source] P::AllocationError),
	#[error("Resource {name} was not created host-visible and can not be mapped")]
	Mapping { name: String },
	#[error("Writing {requested} bytes at offset {offset} exceeds the capacity of {capacity} bytes of {name}")]
	Size {
		name: String,
		offset: u64,
		requested: u64,
		capacity: u64,
	},
	#[error("Usage Error: {0}")]
	Usage(#[from] UsageError),
}

impl<P: BindlessPlatform> Debug for ResourceError<P> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		Display::fmt(self, f)
	}
}
