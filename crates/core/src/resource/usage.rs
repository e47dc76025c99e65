bitflags::bitflags! {
	/// Buffer usage specify how you may use a buffer. The bits equal `VkBufferUsageFlags`.
	#[repr(transparent)]
	#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
	pub struct BufferUsage: u32 {
		/// Can be used as a source of transfer operations
		const TRANSFER_SRC = 0b1;
		/// Can be used as a destination of transfer operations
		const TRANSFER_DST = 0b10;
		/// Can be registered in the uniform buffer class of the bindless table
		const UNIFORM = 0b1_0000;
		/// Can be registered in the storage buffer class of the bindless table
		const STORAGE = 0b10_0000;
		/// Can be used as source of fixed-function index fetch (index buffer)
		const INDEX = 0b100_0000;
		/// Can be used as source of fixed-function vertex fetch (VBO)
		const VERTEX = 0b1000_0000;
		/// Can be the source of indirect parameters (e.g. indirect buffer, parameter buffer)
		const INDIRECT = 0b1_0000_0000;
	}
}

bitflags::bitflags! {
	/// Image usage specify how you may use an image. The bits equal `VkImageUsageFlags`.
	#[repr(transparent)]
	#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
	pub struct ImageUsage: u32 {
		/// Can be used as a source of transfer operations
		const TRANSFER_SRC = 0b1;
		/// Can be used as a destination of transfer operations
		const TRANSFER_DST = 0b10;
		/// Can be registered in the sampled image class of the bindless table
		const SAMPLED = 0b100;
		/// Can be used as storage image
		const STORAGE = 0b1000;
		/// Can be used as framebuffer color attachment
		const COLOR_ATTACHMENT = 0b1_0000;
		/// Can be used as framebuffer depth/stencil attachment
		const DEPTH_STENCIL_ATTACHMENT = 0b10_0000;
	}
}

/// Coarse memory residency the caller asks for when creating a resource.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum MemoryIntent {
	/// Fastest memory for the device, never mappable.
	DeviceLocal,
	/// Memory the host can map and write into.
	HostVisible,
	/// Buffers become [`MemoryIntent::HostVisible`] so they can be uploaded into directly, images become
	/// [`MemoryIntent::DeviceLocal`] as their tiling is opaque to the host anyway.
	#[default]
	Auto,
}

impl MemoryIntent {
	#[inline]
	pub fn resolve_buffer(self) -> Self {
		match self {
			MemoryIntent::Auto => MemoryIntent::HostVisible,
			other => other,
		}
	}

	#[inline]
	pub fn resolve_image(self) -> Self {
		match self {
			MemoryIntent::Auto => MemoryIntent::DeviceLocal,
			other => other,
		}
	}

	#[inline]
	pub fn is_host_visible(self) -> bool {
		matches!(self, MemoryIntent::HostVisible)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_memory_intent_auto() {
		assert_eq!(MemoryIntent::Auto.resolve_buffer(), MemoryIntent::HostVisible);
		assert_eq!(MemoryIntent::Auto.resolve_image(), MemoryIntent::DeviceLocal);
		assert_eq!(MemoryIntent::DeviceLocal.resolve_buffer(), MemoryIntent::DeviceLocal);
		assert!(!MemoryIntent::Auto.is_host_visible());
	}
}
