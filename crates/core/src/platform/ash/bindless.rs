use crate::descriptor::{DescriptorCounts, DescriptorWrite, ResourceClass};
use crate::platform::{BindlessPlatform, MAX_PUSH_CONSTANT_SIZE};
use crate::resource::{BufferCreateInfo, Format, ImageCreateInfo, ImageUsage};
use ash::ext::debug_utils;
use ash::khr::{surface, swapchain};
use ash::prelude::VkResult;
use ash::vk::{
	BorderColor, CommandPool, CommandPoolCreateFlags, CommandPoolCreateInfo, ComponentMapping,
	DebugUtilsObjectNameInfoEXT, DescriptorBindingFlags, DescriptorBufferInfo, DescriptorImageInfo, DescriptorPool,
	DescriptorPoolCreateFlags, DescriptorPoolCreateInfo, DescriptorPoolSize, DescriptorSet, DescriptorSetAllocateInfo,
	DescriptorSetLayout, DescriptorSetLayoutBindingFlagsCreateInfo, DescriptorSetLayoutCreateFlags,
	DescriptorSetLayoutCreateInfo, DescriptorType, Filter, FormatFeatureFlags, Handle, ImageSubresourceRange,
	ImageTiling, ImageViewCreateInfo, ImageViewType, LOD_CLAMP_NONE, PhysicalDeviceProperties2,
	PhysicalDeviceVulkan12Properties, PipelineCache, PipelineLayout, PipelineLayoutCreateInfo, PushConstantRange,
	Sampler, SamplerAddressMode, SamplerCreateInfo, SamplerMipmapMode, ShaderStageFlags, SharingMode,
	WriteDescriptorSet,
};
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator};
use gpu_allocator::AllocationError;
use parking_lot::lock_api::MutexGuard;
use parking_lot::{Mutex, RawMutex};
use static_assertions::assert_impl_all;
use std::cell::UnsafeCell;
use std::ffi::CString;
use std::ops::Deref;
use std::ptr::NonNull;
use thiserror::Error;

impl ResourceClass {
	pub fn to_ash_descriptor_type(&self) -> DescriptorType {
		match self {
			ResourceClass::UniformBuffer => DescriptorType::UNIFORM_BUFFER,
			ResourceClass::StorageBuffer => DescriptorType::STORAGE_BUFFER,
			ResourceClass::SampledImage => DescriptorType::COMBINED_IMAGE_SAMPLER,
		}
	}
}

pub struct Ash {
	pub create_info: AshCreateInfo,
	/// linear filtering, clamp to border and max anisotropy
	pub default_sampler: Sampler,
	/// All command buffers are allocated from this pool. Recording is externally synchronized by the frame loop.
	pub command_pool: Mutex<CommandPool>,
}
assert_impl_all!(Ash: Send, Sync);

impl Ash {
	pub fn new(create_info: AshCreateInfo) -> VkResult<Self> {
		unsafe {
			let properties = create_info
				.instance
				.get_physical_device_properties(create_info.physical_device);
			let default_sampler = create_info.device.create_sampler(
				&SamplerCreateInfo::default()
					.mag_filter(Filter::LINEAR)
					.min_filter(Filter::LINEAR)
					.mipmap_mode(SamplerMipmapMode::LINEAR)
					.address_mode_u(SamplerAddressMode::CLAMP_TO_BORDER)
					.address_mode_v(SamplerAddressMode::CLAMP_TO_BORDER)
					.address_mode_w(SamplerAddressMode::CLAMP_TO_BORDER)
					.border_color(BorderColor::FLOAT_TRANSPARENT_BLACK)
					.anisotropy_enable(true)
					.max_anisotropy(properties.limits.max_sampler_anisotropy)
					.min_lod(0.)
					.max_lod(LOD_CLAMP_NONE),
				None,
			)?;
			let command_pool = match create_info.device.create_command_pool(
				&CommandPoolCreateInfo::default()
					.flags(CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
					.queue_family_index(create_info.queue_family_index),
				None,
			) {
				Ok(pool) => pool,
				Err(e) => {
					create_info.device.destroy_sampler(default_sampler, None);
					return Err(e);
				}
			};
			Ok(Ash {
				create_info,
				default_sampler,
				command_pool: Mutex::new(command_pool),
			})
		}
	}

	pub unsafe fn set_debug_object_name(&self, handle: impl Handle, name: &str) -> VkResult<()> {
		unsafe {
			if let Some(debug_marker) = self.extensions.debug_utils.as_ref() {
				// names with interior nul bytes are not worth failing over
				let name = CString::new(name).unwrap_or_default();
				debug_marker.set_debug_utils_object_name(
					&DebugUtilsObjectNameInfoEXT::default()
						.object_handle(handle)
						.object_name(&name),
				)?;
			}
			Ok(())
		}
	}

	unsafe fn create_image_view(
		&self,
		image: ash::vk::Image,
		create_info: &ImageCreateInfo,
	) -> VkResult<Option<ash::vk::ImageView>> {
		unsafe {
			Ok(if create_info.usage.has_image_view() {
				let image_view = self.device.create_image_view(
					&ImageViewCreateInfo::default()
						.image(image)
						.view_type(ImageViewType::TYPE_2D)
						.format(create_info.format.to_ash_format())
						.components(ComponentMapping::default()) // identity
						.subresource_range(ImageSubresourceRange {
							aspect_mask: create_info.format.aspect(),
							base_mip_level: 0,
							level_count: create_info.mip_levels,
							base_array_layer: 0,
							layer_count: 1,
						}),
					None,
				)?;
				self.set_debug_object_name(image_view, create_info.name)?;
				Some(image_view)
			} else {
				None
			})
		}
	}

	unsafe fn free_allocation(&self, allocation: &AshMemoryAllocation) {
		if let Some(allocation) = allocation.take() {
			if let Err(e) = self.memory_allocator().free(allocation) {
				log::error!("failed to free allocation: {e}");
			}
		}
	}
}

impl Deref for Ash {
	type Target = AshCreateInfo;

	fn deref(&self) -> &Self::Target {
		&self.create_info
	}
}

impl Drop for Ash {
	fn drop(&mut self) {
		unsafe {
			if let Err(e) = self.device.device_wait_idle() {
				log::error!("device_wait_idle failed on shutdown: {e}");
			}
			let command_pool = *self.command_pool.get_mut();
			self.device.destroy_command_pool(command_pool, None);
			self.device.destroy_sampler(self.default_sampler, None);
		}
	}
}

pub struct AshCreateInfo {
	pub entry: ash::Entry,
	pub instance: ash::Instance,
	pub physical_device: ash::vk::PhysicalDevice,
	pub device: ash::Device,
	pub memory_allocator: Option<Mutex<Allocator>>,
	pub shader_stages: ShaderStageFlags,
	pub queue_family_index: u32,
	pub queue: Mutex<ash::vk::Queue>,
	pub cache: Option<PipelineCache>,
	pub extensions: AshExtensions,
	pub destroy: Option<AshDestroyFn>,
}

pub type AshDestroyFn = Box<dyn FnOnce(&mut AshCreateInfo) + Send + Sync>;

#[derive(Default)]
#[non_exhaustive]
pub struct AshExtensions {
	pub debug_utils: Option<debug_utils::Device>,
	pub surface: Option<surface::Instance>,
	pub swapchain: Option<swapchain::Device>,
}

impl AshExtensions {
	pub fn surface(&self) -> Result<&surface::Instance, AshPresentError> {
		self.surface
			.as_ref()
			.ok_or_else(|| AshPresentError::MissingExtension(surface::NAME.to_string_lossy().into_owned()))
	}

	pub fn swapchain(&self) -> Result<&swapchain::Device, AshPresentError> {
		self.swapchain
			.as_ref()
			.ok_or_else(|| AshPresentError::MissingExtension(swapchain::NAME.to_string_lossy().into_owned()))
	}
}

impl AshCreateInfo {
	/// # Panics
	/// if called during destruction
	pub fn memory_allocator(&self) -> MutexGuard<'_, RawMutex, Allocator> {
		match self.memory_allocator.as_ref() {
			Some(allocator) => allocator.lock(),
			None => unreachable!("memory allocator is only taken on destruction"),
		}
	}
}

impl Drop for AshCreateInfo {
	fn drop(&mut self) {
		if let Some(destroy) = self.destroy.take() {
			destroy(self);
		}
	}
}

/// Wraps gpu-allocator's Allocation to be able to [`Option::take`] it on destruction.
///
/// # Safety
/// UnsafeCell: Required to gain mutable access where it is safe to do so, see safety of interface methods.
#[derive(Debug)]
pub struct AshMemoryAllocation(UnsafeCell<Option<Allocation>>);

impl AshMemoryAllocation {
	/// Create a `AshMemoryAllocation` from a gpu-allocator Allocation
	///
	/// # Safety
	/// You must [`Self::take`] the Allocation and deallocate manually before dropping self
	pub unsafe fn new(allocation: Allocation) -> Self {
		Self(UnsafeCell::new(Some(allocation)))
	}

	/// The host pointer of a persistently mapped allocation
	pub fn mapped_ptr(&self) -> Option<NonNull<u8>> {
		unsafe { (*self.0.get()).as_ref()?.mapped_ptr().map(|ptr| ptr.cast()) }
	}

	/// Take the `AshMemoryAllocation`
	pub fn take(&self) -> Option<Allocation> {
		unsafe { (*self.0.get()).take() }
	}
}

/// Safety: Allocation is Send and Sync, it is only taken on destruction which requires exclusive access
unsafe impl Send for AshMemoryAllocation {}
unsafe impl Sync for AshMemoryAllocation {}

pub struct AshBuffer {
	pub buffer: ash::vk::Buffer,
	pub size: u64,
	pub allocation: AshMemoryAllocation,
}

pub struct AshImage {
	pub image: ash::vk::Image,
	pub image_view: Option<ash::vk::ImageView>,
	pub format: Format,
	pub mip_levels: u32,
	pub sampled: bool,
	pub allocation: AshMemoryAllocation,
}

impl AshImage {
	pub fn subresource_range(&self) -> ImageSubresourceRange {
		ImageSubresourceRange {
			aspect_mask: self.format.aspect(),
			base_mip_level: 0,
			level_count: self.mip_levels,
			base_array_layer: 0,
			layer_count: 1,
		}
	}
}

/// The single global descriptor set, with its layout shared by all pipelines
#[derive(Copy, Clone, Debug)]
pub struct AshBindlessDescriptorSet {
	pub pipeline_layout: PipelineLayout,
	pub set_layout: DescriptorSetLayout,
	pub pool: DescriptorPool,
	pub set: DescriptorSet,
}

impl Deref for AshBindlessDescriptorSet {
	type Target = DescriptorSet;

	fn deref(&self) -> &Self::Target {
		&self.set
	}
}

#[derive(Error)]
pub enum AshAllocationError {
	#[error("VkResult: {0}")]
	Vk(#[from] ash::vk::Result),
	#[error("gpu-allocator Error: {0}")]
	Allocation(#[from] AllocationError),
}

impl core::fmt::Debug for AshAllocationError {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		core::fmt::Display::fmt(self, f)
	}
}

#[derive(Error)]
pub enum AshPresentError {
	#[error("VkResult: {0}")]
	Vk(#[from] ash::vk::Result),
	#[error("Missing extension {0}")]
	MissingExtension(String),
}

impl core::fmt::Debug for AshPresentError {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		core::fmt::Display::fmt(self, f)
	}
}

unsafe impl BindlessPlatform for Ash {
	type Buffer = AshBuffer;
	type Image = AshImage;
	type BufferHandle = ash::vk::Buffer;
	type ImageViewHandle = ash::vk::ImageView;
	type Sampler = Sampler;
	type DescriptorSet = AshBindlessDescriptorSet;
	type AllocationError = AshAllocationError;

	unsafe fn descriptor_limits(&self) -> DescriptorCounts {
		unsafe {
			let mut vulkan12properties = PhysicalDeviceVulkan12Properties::default();
			let mut properties2 = PhysicalDeviceProperties2::default().push_next(&mut vulkan12properties);
			self.instance
				.get_physical_device_properties2(self.physical_device, &mut properties2);
			let p = vulkan12properties;
			DescriptorCounts {
				uniform_buffers: u32::min(
					p.max_descriptor_set_update_after_bind_uniform_buffers,
					p.max_per_stage_descriptor_update_after_bind_uniform_buffers,
				),
				storage_buffers: u32::min(
					p.max_descriptor_set_update_after_bind_storage_buffers,
					p.max_per_stage_descriptor_update_after_bind_storage_buffers,
				),
				// a combined image sampler counts as both
				sampled_images: [
					p.max_descriptor_set_update_after_bind_sampled_images,
					p.max_per_stage_descriptor_update_after_bind_sampled_images,
					p.max_descriptor_set_update_after_bind_samplers,
					p.max_per_stage_descriptor_update_after_bind_samplers,
				]
				.into_iter()
				.min()
				.unwrap_or(0),
			}
		}
	}

	unsafe fn create_descriptor_set(&self, counts: DescriptorCounts) -> Result<Self::DescriptorSet, Self::AllocationError> {
		unsafe {
			let bindings = ResourceClass::ALL.map(|class| {
				ash::vk::DescriptorSetLayoutBinding::default()
					.binding(class.binding())
					.descriptor_type(class.to_ash_descriptor_type())
					.descriptor_count(counts.get(class))
					.stage_flags(self.shader_stages)
			});
			let binding_flags = [DescriptorBindingFlags::UPDATE_AFTER_BIND
				| DescriptorBindingFlags::UPDATE_UNUSED_WHILE_PENDING
				| DescriptorBindingFlags::PARTIALLY_BOUND; ResourceClass::ALL.len()];

			let set_layout = self.device.create_descriptor_set_layout(
				&DescriptorSetLayoutCreateInfo::default()
					.flags(DescriptorSetLayoutCreateFlags::UPDATE_AFTER_BIND_POOL)
					.bindings(&bindings)
					.push_next(&mut DescriptorSetLayoutBindingFlagsCreateInfo::default().binding_flags(&binding_flags)),
				None,
			)?;

			let pipeline_layout = match self.device.create_pipeline_layout(
				&PipelineLayoutCreateInfo::default()
					.set_layouts(&[set_layout])
					.push_constant_ranges(&[PushConstantRange {
						offset: 0,
						size: MAX_PUSH_CONSTANT_SIZE,
						stage_flags: self.shader_stages,
					}]),
				None,
			) {
				Ok(layout) => layout,
				Err(e) => {
					self.device.destroy_descriptor_set_layout(set_layout, None);
					return Err(e.into());
				}
			};

			// pool sizes must not be empty
			let pool_sizes = bindings
				.iter()
				.filter(|b| b.descriptor_count > 0)
				.map(|b| {
					DescriptorPoolSize::default()
						.ty(b.descriptor_type)
						.descriptor_count(b.descriptor_count)
				})
				.collect::<Vec<_>>();
			let pool = match self.device.create_descriptor_pool(
				&DescriptorPoolCreateInfo::default()
					.flags(DescriptorPoolCreateFlags::UPDATE_AFTER_BIND)
					.pool_sizes(&pool_sizes)
					.max_sets(1),
				None,
			) {
				Ok(pool) => pool,
				Err(e) => {
					self.device.destroy_pipeline_layout(pipeline_layout, None);
					self.device.destroy_descriptor_set_layout(set_layout, None);
					return Err(e.into());
				}
			};

			let set = match self.device.allocate_descriptor_sets(
				&DescriptorSetAllocateInfo::default()
					.descriptor_pool(pool)
					.set_layouts(&[set_layout]),
			) {
				Ok(sets) => sets.into_iter().next(),
				Err(e) => {
					log::error!("failed to allocate the bindless descriptor set: {e}");
					None
				}
			};
			let Some(set) = set else {
				self.device.destroy_descriptor_pool(pool, None);
				self.device.destroy_pipeline_layout(pipeline_layout, None);
				self.device.destroy_descriptor_set_layout(set_layout, None);
				return Err(ash::vk::Result::ERROR_OUT_OF_POOL_MEMORY.into());
			};
			self.set_debug_object_name(set, "bindless descriptor set")?;

			Ok(AshBindlessDescriptorSet {
				pipeline_layout,
				set_layout,
				pool,
				set,
			})
		}
	}

	unsafe fn update_descriptor_set(&self, set: &Self::DescriptorSet, writes: &[DescriptorWrite<Self>]) {
		unsafe {
			profiling::function_scope!();
			let buffer_infos = writes
				.iter()
				.filter_map(|write| match write {
					DescriptorWrite::Buffers { buffers, .. } => Some(buffers.iter().map(|buffer| {
						DescriptorBufferInfo::default()
							.buffer(buffer.buffer)
							.offset(buffer.offset)
							.range(buffer.range)
					})),
					DescriptorWrite::Images { .. } => None,
				})
				.flatten()
				.collect::<Vec<_>>();
			let image_infos = writes
				.iter()
				.filter_map(|write| match write {
					DescriptorWrite::Images { images, .. } => Some(images.iter().map(|image| {
						DescriptorImageInfo::default()
							.image_view(image.view)
							.sampler(image.sampler)
							.image_layout(ash::vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
					})),
					DescriptorWrite::Buffers { .. } => None,
				})
				.flatten()
				.collect::<Vec<_>>();

			let mut buffer_info_index = 0;
			let mut image_info_index = 0;
			let vk_writes = writes
				.iter()
				.filter(|write| !write.is_empty())
				.map(|write| {
					let count = write.len();
					let vk_write = WriteDescriptorSet::default()
						.dst_set(set.set)
						.dst_binding(write.class().binding())
						.descriptor_type(write.class().to_ash_descriptor_type())
						.dst_array_element(write.first_index());
					match write {
						DescriptorWrite::Buffers { .. } => {
							let start = buffer_info_index;
							buffer_info_index += count;
							vk_write.buffer_info(&buffer_infos[start..start + count])
						}
						DescriptorWrite::Images { .. } => {
							let start = image_info_index;
							image_info_index += count;
							vk_write.image_info(&image_infos[start..start + count])
						}
					}
				})
				.collect::<Vec<_>>();
			self.device.update_descriptor_sets(&vk_writes, &[]);
		}
	}

	unsafe fn destroy_descriptor_set(&self, set: Self::DescriptorSet) {
		unsafe {
			// descriptor sets allocated from pool are freed implicitly
			self.device.destroy_descriptor_pool(set.pool, None);
			self.device.destroy_pipeline_layout(set.pipeline_layout, None);
			self.device.destroy_descriptor_set_layout(set.set_layout, None);
		}
	}

	unsafe fn alloc_buffer(&self, create_info: &BufferCreateInfo) -> Result<Self::Buffer, Self::AllocationError> {
		unsafe {
			let buffer = self.device.create_buffer(
				&ash::vk::BufferCreateInfo::default()
					.usage(create_info.usage.to_ash_buffer_usage_flags())
					.size(create_info.size)
					.sharing_mode(SharingMode::EXCLUSIVE),
				None,
			)?;
			self.set_debug_object_name(buffer, create_info.name)?;
			let requirements = self.device.get_buffer_memory_requirements(buffer);
			let memory_allocation = match self.memory_allocator().allocate(&AllocationCreateDesc {
				requirements,
				name: create_info.name,
				location: create_info.memory.to_gpu_allocator_memory_location(),
				allocation_scheme: AllocationScheme::GpuAllocatorManaged,
				linear: true,
			}) {
				Ok(allocation) => allocation,
				Err(e) => {
					self.device.destroy_buffer(buffer, None);
					return Err(e.into());
				}
			};
			if let Err(e) =
				self.device
					.bind_buffer_memory(buffer, memory_allocation.memory(), memory_allocation.offset())
			{
				self.free_allocation(&AshMemoryAllocation::new(memory_allocation));
				self.device.destroy_buffer(buffer, None);
				return Err(e.into());
			}
			Ok(AshBuffer {
				buffer,
				size: create_info.size,
				allocation: AshMemoryAllocation::new(memory_allocation),
			})
		}
	}

	fn buffer_handle(buffer: &Self::Buffer) -> Self::BufferHandle {
		buffer.buffer
	}

	unsafe fn map_buffer(&self, buffer: &Self::Buffer) -> Option<NonNull<u8>> {
		// gpu-allocator keeps host-visible memory persistently mapped
		buffer.allocation.mapped_ptr()
	}

	unsafe fn unmap_buffer(&self, _buffer: &Self::Buffer) {}

	unsafe fn destroy_buffer(&self, buffer: Self::Buffer) {
		unsafe {
			self.free_allocation(&buffer.allocation);
			self.device.destroy_buffer(buffer.buffer, None);
		}
	}

	unsafe fn alloc_image(&self, create_info: &ImageCreateInfo) -> Result<Self::Image, Self::AllocationError> {
		unsafe {
			let image = self.device.create_image(
				&ash::vk::ImageCreateInfo::default()
					.flags(ash::vk::ImageCreateFlags::empty())
					.image_type(ash::vk::ImageType::TYPE_2D)
					.format(create_info.format.to_ash_format())
					.extent(create_info.extent.into())
					.mip_levels(create_info.mip_levels)
					.array_layers(1)
					.samples(ash::vk::SampleCountFlags::TYPE_1)
					.tiling(ImageTiling::OPTIMAL)
					.usage(create_info.usage.to_ash_image_usage_flags())
					.sharing_mode(SharingMode::EXCLUSIVE)
					.initial_layout(ash::vk::ImageLayout::UNDEFINED),
				None,
			)?;
			self.set_debug_object_name(image, create_info.name)?;
			let requirements = self.device.get_image_memory_requirements(image);
			let memory_allocation = match self.memory_allocator().allocate(&AllocationCreateDesc {
				requirements,
				name: create_info.name,
				location: create_info.memory.to_gpu_allocator_memory_location(),
				allocation_scheme: AllocationScheme::GpuAllocatorManaged,
				linear: false,
			}) {
				Ok(allocation) => allocation,
				Err(e) => {
					self.device.destroy_image(image, None);
					return Err(e.into());
				}
			};
			if let Err(e) = self
				.device
				.bind_image_memory(image, memory_allocation.memory(), memory_allocation.offset())
			{
				self.free_allocation(&AshMemoryAllocation::new(memory_allocation));
				self.device.destroy_image(image, None);
				return Err(e.into());
			}
			let mut ash_image = AshImage {
				image,
				image_view: None,
				format: create_info.format,
				mip_levels: create_info.mip_levels,
				sampled: create_info.usage.contains(ImageUsage::SAMPLED),
				allocation: AshMemoryAllocation::new(memory_allocation),
			};
			match self.create_image_view(image, create_info) {
				Ok(view) => {
					ash_image.image_view = view;
					Ok(ash_image)
				}
				Err(e) => {
					self.destroy_image(ash_image);
					Err(e.into())
				}
			}
		}
	}

	fn image_sampled_view(image: &Self::Image) -> Option<Self::ImageViewHandle> {
		image.image_view.filter(|_| image.sampled)
	}

	unsafe fn destroy_image(&self, image: Self::Image) {
		unsafe {
			self.free_allocation(&image.allocation);
			if let Some(image_view) = image.image_view {
				self.device.destroy_image_view(image_view, None);
			}
			self.device.destroy_image(image.image, None);
		}
	}

	fn default_sampler(&self) -> Self::Sampler {
		self.default_sampler
	}

	fn supports_depth_format(&self, format: Format) -> bool {
		let properties = unsafe {
			self.instance
				.get_physical_device_format_properties(self.physical_device, format.to_ash_format())
		};
		properties
			.optimal_tiling_features
			.contains(FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
	}
}
