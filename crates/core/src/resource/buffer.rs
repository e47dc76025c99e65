use crate::platform::BindlessPlatform;
use crate::resource::{BufferUsage, MemoryIntent, ResourceError, UsageError};
use bytemuck::Pod;
use presser::Slab;
use std::fmt::{Debug, Formatter};
use std::mem::ManuallyDrop;
use std::ptr::NonNull;
use std::sync::Arc;

#[derive(Copy, Clone, Debug)]
pub struct BufferCreateInfo<'a> {
	/// Size of the buffer in bytes
	pub size: u64,
	pub usage: BufferUsage,
	pub memory: MemoryIntent,
	/// Name of the buffer, for tracking and debugging purposes
	pub name: &'a str,
}

impl BufferCreateInfo<'_> {
	pub fn validate(&self) -> Result<(), UsageError> {
		if self.usage.is_empty() {
			Err(UsageError::NoUsageDeclared {
				name: self.name.to_string(),
			})
		} else if self.size == 0 {
			Err(UsageError::ZeroSize {
				name: self.name.to_string(),
			})
		} else {
			Ok(())
		}
	}
}

/// A host mapping of a buffer's memory, as a [`Slab`] presser can copy into.
struct MappedSlab {
	ptr: NonNull<u8>,
	size: usize,
}

unsafe impl Slab for MappedSlab {
	fn base_ptr(&self) -> *const u8 {
		self.ptr.as_ptr()
	}

	fn base_ptr_mut(&mut self) -> *mut u8 {
		self.ptr.as_ptr()
	}

	fn size(&self) -> usize {
		self.size
	}
}

/// A GPU buffer exclusively owned by whoever created it. Other subsystems only ever see it through a
/// [`SlotHandle`] of the bindless table.
///
/// [`SlotHandle`]: crate::descriptor::SlotHandle
pub struct Buffer<P: BindlessPlatform> {
	platform: Arc<P>,
	buffer: ManuallyDrop<P::Buffer>,
	size: u64,
	usage: BufferUsage,
	memory: MemoryIntent,
	mapped: Option<NonNull<u8>>,
	name: String,
}

// Safety: the mapped pointer is only dereferenced through `&mut self`
unsafe impl<P: BindlessPlatform> Send for Buffer<P> {}
unsafe impl<P: BindlessPlatform> Sync for Buffer<P> {}

impl<P: BindlessPlatform> Buffer<P> {
	pub fn new(platform: &Arc<P>, create_info: &BufferCreateInfo) -> Result<Self, ResourceError<P>> {
		create_info.validate()?;
		let memory = create_info.memory.resolve_buffer();
		let create_info = BufferCreateInfo {
			memory,
			..*create_info
		};
		let buffer = unsafe { platform.alloc_buffer(&create_info) }.map_err(ResourceError::Allocation)?;
		log::debug!(
			"allocated buffer {} with {} bytes, {:?}, {:?}",
			create_info.name,
			create_info.size,
			create_info.usage,
			memory
		);
		Ok(Self {
			platform: platform.clone(),
			buffer: ManuallyDrop::new(buffer),
			size: create_info.size,
			usage: create_info.usage,
			memory,
			mapped: None,
			name: create_info.name.to_string(),
		})
	}

	/// Creates a host-visible buffer exactly fitting `data` and uploads it.
	pub fn from_slice<T: Pod>(
		platform: &Arc<P>,
		usage: BufferUsage,
		name: &str,
		data: &[T],
	) -> Result<Self, ResourceError<P>> {
		let bytes: &[u8] = bytemuck::cast_slice(data);
		let mut buffer = Self::new(
			platform,
			&BufferCreateInfo {
				size: bytes.len() as u64,
				usage,
				memory: MemoryIntent::HostVisible,
				name,
			},
		)?;
		buffer.upload(bytes)?;
		Ok(buffer)
	}

	#[inline]
	pub fn size(&self) -> u64 {
		self.size
	}

	#[inline]
	pub fn usage(&self) -> BufferUsage {
		self.usage
	}

	#[inline]
	pub fn memory(&self) -> MemoryIntent {
		self.memory
	}

	#[inline]
	pub fn name(&self) -> &str {
		&self.name
	}

	#[inline]
	pub fn is_mapped(&self) -> bool {
		self.mapped.is_some()
	}

	/// The non-owning handle the bindless table stores.
	#[inline]
	pub fn handle(&self) -> P::BufferHandle {
		P::buffer_handle(&self.buffer)
	}

	#[inline]
	pub fn platform_buffer(&self) -> &P::Buffer {
		&self.buffer
	}

	pub(crate) fn require_usage(&self, usage: BufferUsage, required: &'static str) -> Result<(), UsageError> {
		if self.usage.contains(usage) {
			Ok(())
		} else {
			Err(UsageError::MissingUsage {
				name: self.name.clone(),
				required,
			})
		}
	}

	/// Maps the buffer into host memory. Mapping an already mapped buffer returns the same pointer again.
	pub fn map(&mut self) -> Result<NonNull<u8>, ResourceError<P>> {
		if let Some(ptr) = self.mapped {
			return Ok(ptr);
		}
		if !self.memory.is_host_visible() {
			return Err(ResourceError::Mapping {
				name: self.name.clone(),
			});
		}
		let ptr = unsafe { self.platform.map_buffer(&self.buffer) }.ok_or_else(|| ResourceError::Mapping {
			name: self.name.clone(),
		})?;
		self.mapped = Some(ptr);
		Ok(ptr)
	}

	pub fn unmap(&mut self) {
		if self.mapped.take().is_some() {
			unsafe { self.platform.unmap_buffer(&self.buffer) }
		}
	}

	pub fn upload(&mut self, bytes: &[u8]) -> Result<(), ResourceError<P>> {
		self.upload_at(0, bytes)
	}

	pub fn upload_slice<T: Pod>(&mut self, data: &[T]) -> Result<(), ResourceError<P>> {
		self.upload_at(0, bytemuck::cast_slice(data))
	}

	/// Maps, copies `bytes` to `offset` and unmaps again, unless the buffer was already mapped by the caller. Nothing
	/// is written if `bytes` does not fit.
	pub fn upload_at(&mut self, offset: u64, bytes: &[u8]) -> Result<(), ResourceError<P>> {
		profiling::function_scope!();
		let requested = bytes.len() as u64;
		match offset.checked_add(requested) {
			Some(end) if end <= self.size => (),
			_ => {
				return Err(ResourceError::Size {
					name: self.name.clone(),
					offset,
					requested,
					capacity: self.size,
				});
			}
		}

		let was_mapped = self.is_mapped();
		let ptr = self.map()?;
		let mut slab = MappedSlab {
			ptr,
			size: self.size as usize,
		};
		let result = presser::copy_from_slice_to_offset(bytes, &mut slab, offset as usize);
		if !was_mapped {
			self.unmap();
		}
		result.map(|_| ()).map_err(|_| ResourceError::Size {
			name: self.name.clone(),
			offset,
			requested,
			capacity: self.size,
		})
	}

	/// Releases the GPU memory, unmapping first if required. Same as dropping the buffer.
	pub fn destroy(self) {
		drop(self)
	}
}

impl<P: BindlessPlatform> Drop for Buffer<P> {
	fn drop(&mut self) {
		self.unmap();
		// Safety: buffer is never accessed again
		let buffer = unsafe { ManuallyDrop::take(&mut self.buffer) };
		unsafe { self.platform.destroy_buffer(buffer) }
	}
}

impl<P: BindlessPlatform> Debug for Buffer<P> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Buffer")
			.field("name", &self.name)
			.field("size", &self.size)
			.field("usage", &self.usage)
			.field("memory", &self.memory)
			.field("mapped", &self.is_mapped())
			.finish()
	}
}
