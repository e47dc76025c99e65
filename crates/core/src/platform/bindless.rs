use crate::descriptor::{DescriptorCounts, DescriptorWrite};
use crate::resource::{BufferCreateInfo, Format, ImageCreateInfo};
use std::error::Error;
use std::fmt::Debug;
use std::ptr::NonNull;

/// Internal interface for the device calls the bindless table and resources require, may change at any time!
///
/// # Safety
/// Handles returned by [`Self::buffer_handle`] and [`Self::image_sampled_view`] must stay valid for as long as the
/// resource they were derived from is alive.
pub unsafe trait BindlessPlatform: Sized + Send + Sync + 'static {
	type Buffer: 'static + Send + Sync;
	type Image: 'static + Send + Sync;
	/// A non-owning reference to a [`Self::Buffer`], as stored within the bindless table
	type BufferHandle: 'static + Copy + Debug + Send + Sync;
	/// A non-owning reference to the sampled view of a [`Self::Image`], as stored within the bindless table
	type ImageViewHandle: 'static + Copy + Debug + Send + Sync;
	type Sampler: 'static + Copy + Debug + Send + Sync;
	type DescriptorSet: 'static + Send + Sync;
	type AllocationError: 'static + Error + Send + Sync;

	/// The maximum descriptor counts of each class a single update-after-bind descriptor set may hold.
	unsafe fn descriptor_limits(&self) -> DescriptorCounts;

	unsafe fn create_descriptor_set(&self, counts: DescriptorCounts) -> Result<Self::DescriptorSet, Self::AllocationError>;

	/// Writes all `writes` to `set` with a single update.
	///
	/// # Safety
	/// Every handle within `writes` must reference a live resource. The caller must hold the table's lock.
	unsafe fn update_descriptor_set(&self, set: &Self::DescriptorSet, writes: &[DescriptorWrite<Self>]);

	/// # Safety
	/// The GPU must no longer use `set`.
	unsafe fn destroy_descriptor_set(&self, set: Self::DescriptorSet);

	/// Allocates a buffer. The memory intent of `create_info` has already been resolved.
	unsafe fn alloc_buffer(&self, create_info: &BufferCreateInfo) -> Result<Self::Buffer, Self::AllocationError>;

	fn buffer_handle(buffer: &Self::Buffer) -> Self::BufferHandle;

	/// Maps a host-visible buffer, returning `None` if the memory is not mappable.
	///
	/// # Safety
	/// The buffer must not be mapped already.
	unsafe fn map_buffer(&self, buffer: &Self::Buffer) -> Option<NonNull<u8>>;

	/// # Safety
	/// The buffer must be mapped and the pointer returned by [`Self::map_buffer`] not be used anymore.
	unsafe fn unmap_buffer(&self, buffer: &Self::Buffer);

	/// # Safety
	/// The buffer must be unmapped and the GPU must no longer use it.
	unsafe fn destroy_buffer(&self, buffer: Self::Buffer);

	/// Allocates an image. The memory intent of `create_info` has already been resolved.
	unsafe fn alloc_image(&self, create_info: &ImageCreateInfo) -> Result<Self::Image, Self::AllocationError>;

	fn image_sampled_view(image: &Self::Image) -> Option<Self::ImageViewHandle>;

	/// # Safety
	/// The GPU must no longer use the image.
	unsafe fn destroy_image(&self, image: Self::Image);

	/// The sampler images are registered with if the caller doesn't supply one.
	fn default_sampler(&self) -> Self::Sampler;

	fn supports_depth_format(&self, format: Format) -> bool;
}
