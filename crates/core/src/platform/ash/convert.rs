use crate::platform::IndexType;
use crate::resource::{BufferUsage, ColorSpace, Extent2D, Format, ImageUsage, MemoryIntent, PresentMode};
use ash::vk::{BufferUsageFlags, ColorSpaceKHR, Extent3D, ImageAspectFlags, ImageUsageFlags, PresentModeKHR};
use gpu_allocator::MemoryLocation;

impl BufferUsage {
	/// Bits equal `VkBufferUsageFlags`, see tests
	pub fn to_ash_buffer_usage_flags(&self) -> BufferUsageFlags {
		BufferUsageFlags::from_raw(self.bits())
	}
}

impl ImageUsage {
	/// Bits equal `VkImageUsageFlags`, see tests
	pub fn to_ash_image_usage_flags(&self) -> ImageUsageFlags {
		ImageUsageFlags::from_raw(self.bits())
	}

	/// Any usage besides transfers requires an image view.
	pub fn has_image_view(&self) -> bool {
		self.intersects(
			ImageUsage::SAMPLED
				| ImageUsage::STORAGE
				| ImageUsage::COLOR_ATTACHMENT
				| ImageUsage::DEPTH_STENCIL_ATTACHMENT,
		)
	}
}

impl MemoryIntent {
	/// [`MemoryIntent::Auto`] must be resolved before.
	pub fn to_gpu_allocator_memory_location(&self) -> MemoryLocation {
		match self {
			MemoryIntent::DeviceLocal => MemoryLocation::GpuOnly,
			MemoryIntent::HostVisible => MemoryLocation::CpuToGpu,
			MemoryIntent::Auto => MemoryLocation::Unknown,
		}
	}
}

impl Format {
	pub fn to_ash_format(&self) -> ash::vk::Format {
		ash::vk::Format::from_raw(i32::from(*self))
	}

	pub fn from_ash_format(format: ash::vk::Format) -> Option<Self> {
		Format::try_from(format.as_raw()).ok()
	}

	pub fn aspect(&self) -> ImageAspectFlags {
		if self.has_stencil() {
			ImageAspectFlags::DEPTH | ImageAspectFlags::STENCIL
		} else if self.is_depth() {
			ImageAspectFlags::DEPTH
		} else {
			ImageAspectFlags::COLOR
		}
	}
}

impl ColorSpace {
	pub fn to_ash_color_space(&self) -> ColorSpaceKHR {
		ColorSpaceKHR::from_raw(i32::from(*self))
	}

	pub fn from_ash_color_space(color_space: ColorSpaceKHR) -> Option<Self> {
		ColorSpace::try_from(color_space.as_raw()).ok()
	}
}

impl PresentMode {
	pub fn to_ash_present_mode(&self) -> PresentModeKHR {
		PresentModeKHR::from_raw(i32::from(*self))
	}

	pub fn from_ash_present_mode(present_mode: PresentModeKHR) -> Option<Self> {
		PresentMode::try_from(present_mode.as_raw()).ok()
	}
}

impl IndexType {
	pub fn to_ash_index_type(&self) -> ash::vk::IndexType {
		match self {
			IndexType::U16 => ash::vk::IndexType::UINT16,
			IndexType::U32 => ash::vk::IndexType::UINT32,
		}
	}
}

impl From<Extent2D> for ash::vk::Extent2D {
	fn from(value: Extent2D) -> Self {
		ash::vk::Extent2D {
			width: value.width,
			height: value.height,
		}
	}
}

impl From<ash::vk::Extent2D> for Extent2D {
	fn from(value: ash::vk::Extent2D) -> Self {
		Extent2D::new(value.width, value.height)
	}
}

impl From<Extent2D> for Extent3D {
	fn from(value: Extent2D) -> Self {
		Extent3D {
			width: value.width,
			height: value.height,
			depth: 1,
		}
	}
}
