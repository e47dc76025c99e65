use crate::descriptor::{BufferClass, ResourceClass};
use crate::platform::BindlessPlatform;
use std::fmt::{Debug, Formatter};

/// Payload of a buffer slot: a non-owning buffer handle and the byte range shaders can access.
pub struct BufferDescriptor<P: BindlessPlatform> {
	pub buffer: P::BufferHandle,
	pub offset: u64,
	pub range: u64,
}

impl<P: BindlessPlatform> Copy for BufferDescriptor<P> {}

impl<P: BindlessPlatform> Clone for BufferDescriptor<P> {
	fn clone(&self) -> Self {
		*self
	}
}

impl<P: BindlessPlatform> Debug for BufferDescriptor<P> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("BufferDescriptor")
			.field("buffer", &self.buffer)
			.field("offset", &self.offset)
			.field("range", &self.range)
			.finish()
	}
}

/// Payload of an image slot: a non-owning image view handle and the sampler to sample it with.
pub struct ImageDescriptor<P: BindlessPlatform> {
	pub view: P::ImageViewHandle,
	pub sampler: P::Sampler,
}

impl<P: BindlessPlatform> Copy for ImageDescriptor<P> {}

impl<P: BindlessPlatform> Clone for ImageDescriptor<P> {
	fn clone(&self) -> Self {
		*self
	}
}

impl<P: BindlessPlatform> Debug for ImageDescriptor<P> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ImageDescriptor")
			.field("view", &self.view)
			.field("sampler", &self.sampler)
			.finish()
	}
}

/// One contiguous run of table updates within a class, starting at `first_index`. All writes of a publish are handed
/// to the platform in a single [`BindlessPlatform::update_descriptor_set`] call.
pub enum DescriptorWrite<P: BindlessPlatform> {
	Buffers {
		class: BufferClass,
		first_index: u32,
		buffers: Vec<BufferDescriptor<P>>,
	},
	Images {
		first_index: u32,
		images: Vec<ImageDescriptor<P>>,
	},
}

impl<P: BindlessPlatform> DescriptorWrite<P> {
	pub fn class(&self) -> ResourceClass {
		match self {
			DescriptorWrite::Buffers { class, .. } => (*class).into(),
			DescriptorWrite::Images { .. } => ResourceClass::SampledImage,
		}
	}

	pub fn first_index(&self) -> u32 {
		match self {
			DescriptorWrite::Buffers { first_index, .. } | DescriptorWrite::Images { first_index, .. } => *first_index,
		}
	}

	/// Amount of slots this run updates
	pub fn len(&self) -> usize {
		match self {
			DescriptorWrite::Buffers { buffers, .. } => buffers.len(),
			DescriptorWrite::Images { images, .. } => images.len(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl<P: BindlessPlatform> Debug for DescriptorWrite<P> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			DescriptorWrite::Buffers {
				class,
				first_index,
				buffers,
			} => f
				.debug_struct("Buffers")
				.field("class", class)
				.field("first_index", first_index)
				.field("buffers", buffers)
				.finish(),
			DescriptorWrite::Images { first_index, images } => f
				.debug_struct("Images")
				.field("first_index", first_index)
				.field("images", images)
				.finish(),
		}
	}
}
