use crate::descriptor::ResourceClass;
use crate::platform::BindlessPlatform;

/// Capacity of each class of the bindless table. Capacities must be sized for the worst case of concurrently live
/// resources, they can not grow after creation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DescriptorCounts {
	pub uniform_buffers: u32,
	pub storage_buffers: u32,
	pub sampled_images: u32,
}

impl DescriptorCounts {
	pub const DEFAULT: Self = DescriptorCounts {
		uniform_buffers: 64,
		storage_buffers: 64,
		sampled_images: 256,
	};

	pub fn limits<P: BindlessPlatform>(platform: &P) -> Self {
		unsafe { P::descriptor_limits(platform) }
	}

	pub fn get(&self, class: ResourceClass) -> u32 {
		match class {
			ResourceClass::UniformBuffer => self.uniform_buffers,
			ResourceClass::StorageBuffer => self.storage_buffers,
			ResourceClass::SampledImage => self.sampled_images,
		}
	}

	/// The offset of `class` in the process-wide numbering of all slots, which lays out the classes back to back.
	pub fn base(&self, class: ResourceClass) -> u32 {
		ResourceClass::ALL
			.into_iter()
			.take_while(|c| *c != class)
			.map(|c| self.get(c))
			.sum()
	}

	pub fn total(&self) -> u32 {
		ResourceClass::ALL.into_iter().map(|c| self.get(c)).sum()
	}

	pub fn is_within_limit(&self, limit: Self) -> bool {
		// just to make sure this is updated as well
		let DescriptorCounts {
			uniform_buffers,
			storage_buffers,
			sampled_images,
		} = *self;
		uniform_buffers <= limit.uniform_buffers
			&& storage_buffers <= limit.storage_buffers
			&& sampled_images <= limit.sampled_images
	}

	pub fn min(self, other: Self) -> Self {
		Self {
			uniform_buffers: self.uniform_buffers.min(other.uniform_buffers),
			storage_buffers: self.storage_buffers.min(other.storage_buffers),
			sampled_images: self.sampled_images.min(other.sampled_images),
		}
	}
}

impl Default for DescriptorCounts {
	fn default() -> Self {
		Self::DEFAULT
	}
}
