use std::fmt::{Debug, Display, Formatter};

pub const BINDING_UNIFORM_BUFFER: u32 = 0;
pub const BINDING_STORAGE_BUFFER: u32 = 1;
pub const BINDING_SAMPLED_IMAGE: u32 = 2;

/// The classes of resources the bindless table holds. Each class is one unbounded array bound to a fixed binding.
#[repr(u32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum ResourceClass {
	UniformBuffer = BINDING_UNIFORM_BUFFER,
	StorageBuffer = BINDING_STORAGE_BUFFER,
	SampledImage = BINDING_SAMPLED_IMAGE,
}

impl ResourceClass {
	pub const ALL: [ResourceClass; 3] = [
		ResourceClass::UniformBuffer,
		ResourceClass::StorageBuffer,
		ResourceClass::SampledImage,
	];

	#[inline]
	pub const fn binding(self) -> u32 {
		self as u32
	}
}

impl Display for ResourceClass {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str(match self {
			ResourceClass::UniformBuffer => "uniform buffer",
			ResourceClass::StorageBuffer => "storage buffer",
			ResourceClass::SampledImage => "sampled image",
		})
	}
}

/// The classes a buffer can be registered as.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum BufferClass {
	Uniform,
	Storage,
}

impl From<BufferClass> for ResourceClass {
	fn from(value: BufferClass) -> Self {
		match value {
			BufferClass::Uniform => ResourceClass::UniformBuffer,
			BufferClass::Storage => ResourceClass::StorageBuffer,
		}
	}
}

/// Identifies a live slot in the bindless table. Shaders only ever see [`Self::index`], the generation makes handles
/// of released slots detectably stale even after their index was reused.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct SlotHandle {
	class: ResourceClass,
	index: u32,
	generation: u32,
}

impl SlotHandle {
	pub(crate) fn new(class: ResourceClass, index: u32, generation: u32) -> Self {
		Self {
			class,
			index,
			generation,
		}
	}

	#[inline]
	pub fn class(&self) -> ResourceClass {
		self.class
	}

	/// The array index within the class's binding, the value shaders index with
	#[inline]
	pub fn index(&self) -> u32 {
		self.index
	}

	#[inline]
	pub fn generation(&self) -> u32 {
		self.generation
	}
}

impl Debug for SlotHandle {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.debug_tuple("SlotHandle")
			.field(&self.class)
			.field(&self.index)
			.field(&self.generation)
			.finish()
	}
}

impl Display for SlotHandle {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{} {} (gen {})", self.class, self.index, self.generation)
	}
}
