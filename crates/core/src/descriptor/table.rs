use crate::backing::range_set::IndexRangeSet;
use crate::backing::slot_pool::{FrameNumber, SlotAllocationError, SlotPool};
use crate::descriptor::{
	BufferClass, BufferDescriptor, DescriptorCounts, DescriptorWrite, ImageDescriptor, ResourceClass, SlotHandle,
};
use crate::platform::BindlessPlatform;
use crate::resource::{Buffer, BufferUsage, Image, ImageUsage, UsageError};
use parking_lot::Mutex;
use static_assertions::assert_impl_all;
use std::fmt::{Debug, Display, Formatter};
use std::mem::{take, ManuallyDrop};
use std::sync::Arc;
use thiserror::Error;

/// A slot is either fully used with a valid payload or fully free, there is no state in between.
enum SlotState<T> {
	Free,
	Used { payload: T, write: SlotWrite },
}

/// Whether the descriptor of a used slot still has to be written.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum SlotWrite {
	Clean,
	/// never published, so no frame can reference the slot yet
	Initial,
	/// rewrite of a published slot, held back until every frame up to this one has completed
	Deferred(FrameNumber),
}

impl SlotWrite {
	fn is_due(self, completed: FrameNumber) -> bool {
		match self {
			SlotWrite::Clean => false,
			SlotWrite::Initial => true,
			SlotWrite::Deferred(frame) => frame <= completed,
		}
	}
}

struct Slot<T> {
	generation: u32,
	state: SlotState<T>,
}

/// All slots of one resource class, with their index allocator and the indices waiting to be published.
struct ClassTable<T> {
	class: ResourceClass,
	pool: SlotPool,
	slots: Vec<Slot<T>>,
	pending: IndexRangeSet,
}

impl<T: Copy> ClassTable<T> {
	fn new(class: ResourceClass, capacity: u32) -> Self {
		Self {
			class,
			pool: SlotPool::new(capacity),
			slots: (0..capacity)
				.map(|_| Slot {
					generation: 0,
					state: SlotState::Free,
				})
				.collect(),
			pending: IndexRangeSet::new(),
		}
	}

	fn alloc(&mut self, payload: T, completed: FrameNumber) -> Result<SlotHandle, RegisterError> {
		self.pool.reclaim(completed);
		let index = self.pool.alloc().map_err(|err| match err {
			SlotAllocationError::NoMoreCapacity(capacity) => RegisterError::CapacityExhausted {
				class: self.class,
				capacity,
			},
		})?;
		let slot = &mut self.slots[index as usize];
		debug_assert!(matches!(slot.state, SlotState::Free), "allocated slot must be free");
		slot.state = SlotState::Used {
			payload,
			write: SlotWrite::Initial,
		};
		self.pending.insert(index);
		Ok(SlotHandle::new(self.class, index, slot.generation))
	}

	fn live_slot_mut(&mut self, handle: SlotHandle) -> Result<&mut Slot<T>, RegisterError> {
		if handle.class() != self.class {
			return Err(RegisterError::InvalidHandle(handle));
		}
		self.slots
			.get_mut(handle.index() as usize)
			.filter(|slot| slot.generation == handle.generation() && matches!(slot.state, SlotState::Used { .. }))
			.ok_or(RegisterError::InvalidHandle(handle))
	}

	/// Replaces the payload of a live slot. A slot that was already published may be read by any frame up to
	/// `recording`, so its rewrite is deferred until that frame has completed.
	fn update(&mut self, handle: SlotHandle, payload: T, recording: FrameNumber) -> Result<(), RegisterError> {
		let slot = self.live_slot_mut(handle)?;
		if let SlotState::Used {
			payload: current,
			write,
		} = &mut slot.state
		{
			*current = payload;
			if *write != SlotWrite::Initial {
				*write = SlotWrite::Deferred(recording);
			}
		}
		self.pending.insert(handle.index());
		Ok(())
	}

	fn release(&mut self, handle: SlotHandle, frame: FrameNumber) -> Result<(), RegisterError> {
		let slot = self.live_slot_mut(handle)?;
		slot.state = SlotState::Free;
		slot.generation = slot.generation.wrapping_add(1);
		self.pool.retire(handle.index(), frame);
		Ok(())
	}

	fn is_live(&self, handle: SlotHandle) -> bool {
		handle.class() == self.class
			&& self.slots.get(handle.index() as usize).is_some_and(|slot| {
				slot.generation == handle.generation() && matches!(slot.state, SlotState::Used { .. })
			})
	}

	/// Emits every pending slot whose write is due as contiguous runs, marking them clean. Deferred rewrites of
	/// frames newer than `completed` stay pending. Returns the amount of emitted and of held back slots.
	fn publish(&mut self, completed: FrameNumber, mut emit: impl FnMut(u32, Vec<T>)) -> (u32, u32) {
		let pending = self.pending.take();
		let mut records = 0;
		let mut held = Vec::new();
		let mut run = Vec::new();
		let mut run_start = 0;
		for range in pending.iter_ranges() {
			for index in range {
				let ready = match &mut self.slots[index as usize].state {
					SlotState::Used { payload, write } if write.is_due(completed) => {
						*write = SlotWrite::Clean;
						Some(*payload)
					}
					SlotState::Used {
						write: SlotWrite::Deferred(_),
						..
					} => {
						held.push(index);
						None
					}
					_ => None,
				};
				match ready {
					Some(payload) => {
						if run.is_empty() {
							run_start = index;
						}
						run.push(payload);
					}
					None => {
						if !run.is_empty() {
							records += run.len() as u32;
							emit(run_start, take(&mut run));
						}
					}
				}
			}
			if !run.is_empty() {
				records += run.len() as u32;
				emit(run_start, take(&mut run));
			}
		}
		for index in &held {
			self.pending.insert(*index);
		}
		(records, held.len() as u32)
	}
}

struct TableState<P: BindlessPlatform> {
	uniform_buffers: ClassTable<BufferDescriptor<P>>,
	storage_buffers: ClassTable<BufferDescriptor<P>>,
	sampled_images: ClassTable<ImageDescriptor<P>>,
	/// the newest frame that may reference any slot
	recording_frame: FrameNumber,
	/// all frames up to and including this one have finished executing
	completed_frame: FrameNumber,
}

impl<P: BindlessPlatform> TableState<P> {
	fn buffers_mut(&mut self, class: BufferClass) -> &mut ClassTable<BufferDescriptor<P>> {
		match class {
			BufferClass::Uniform => &mut self.uniform_buffers,
			BufferClass::Storage => &mut self.storage_buffers,
		}
	}

	fn pool(&self, class: ResourceClass) -> &SlotPool {
		match class {
			ResourceClass::UniformBuffer => &self.uniform_buffers.pool,
			ResourceClass::StorageBuffer => &self.storage_buffers.pool,
			ResourceClass::SampledImage => &self.sampled_images.pool,
		}
	}
}

/// Result of [`BindlessTable::publish_pending`]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct PublishStats {
	/// amount of slots written to the descriptor set
	pub records: u32,
	/// amount of contiguous runs the records were batched into
	pub batches: u32,
	/// amount of updated slots held back as in-flight frames may still read them
	pub deferred: u32,
}

impl PublishStats {
	pub fn is_empty(&self) -> bool {
		self.records == 0
	}
}

/// The bindless table: one descriptor set with an unbounded array per [`ResourceClass`], which shaders index into
/// with the index of a [`SlotHandle`].
///
/// Registering a resource allocates a slot and queues it for publishing, the descriptor set itself is only written
/// by [`Self::publish_pending`], once per frame before recording. All mutation is guarded by a single lock, so
/// resources may be registered and released from any thread.
pub struct BindlessTable<P: BindlessPlatform> {
	platform: Arc<P>,
	counts: DescriptorCounts,
	descriptor_set: ManuallyDrop<P::DescriptorSet>,
	state: Mutex<TableState<P>>,
}
assert_impl_all!(BindlessTable<crate::platform::dummy::DummyPlatform>: Send, Sync);

impl<P: BindlessPlatform> BindlessTable<P> {
	pub fn new(platform: &Arc<P>, counts: DescriptorCounts) -> Result<Self, TableCreateError<P>> {
		let limits = DescriptorCounts::limits(&**platform);
		if !counts.is_within_limit(limits) {
			return Err(TableCreateError::ExceedsLimits {
				requested: counts,
				limits,
			});
		}
		let descriptor_set = unsafe { platform.create_descriptor_set(counts) }.map_err(TableCreateError::Platform)?;
		log::debug!("created bindless table with {:?}", counts);
		Ok(Self {
			platform: platform.clone(),
			counts,
			descriptor_set: ManuallyDrop::new(descriptor_set),
			state: Mutex::new(TableState {
				uniform_buffers: ClassTable::new(ResourceClass::UniformBuffer, counts.uniform_buffers),
				storage_buffers: ClassTable::new(ResourceClass::StorageBuffer, counts.storage_buffers),
				sampled_images: ClassTable::new(ResourceClass::SampledImage, counts.sampled_images),
				recording_frame: 0,
				completed_frame: 0,
			}),
		})
	}

	#[inline]
	pub fn platform(&self) -> &Arc<P> {
		&self.platform
	}

	#[inline]
	pub fn counts(&self) -> DescriptorCounts {
		self.counts
	}

	#[inline]
	pub fn descriptor_set(&self) -> &P::DescriptorSet {
		&self.descriptor_set
	}

	#[inline]
	pub fn capacity(&self, class: ResourceClass) -> u32 {
		self.counts.get(class)
	}

	pub fn live_count(&self, class: ResourceClass) -> u32 {
		self.state.lock().pool(class).live()
	}

	pub fn is_live(&self, handle: SlotHandle) -> bool {
		let state = self.state.lock();
		match handle.class() {
			ResourceClass::UniformBuffer => state.uniform_buffers.is_live(handle),
			ResourceClass::StorageBuffer => state.storage_buffers.is_live(handle),
			ResourceClass::SampledImage => state.sampled_images.is_live(handle),
		}
	}

	/// The process-wide unique number of a slot, with all classes laid out back to back.
	pub fn global_index(&self, handle: SlotHandle) -> u32 {
		self.counts.base(handle.class()) + handle.index()
	}

	fn buffer_descriptor(
		buffer: &Buffer<P>,
		offset: u64,
		range: Option<u64>,
		class: BufferClass,
	) -> Result<BufferDescriptor<P>, UsageError> {
		match class {
			BufferClass::Uniform => buffer.require_usage(BufferUsage::UNIFORM, "UNIFORM")?,
			BufferClass::Storage => buffer.require_usage(BufferUsage::STORAGE, "STORAGE")?,
		}
		let size = buffer.size();
		let range = range.unwrap_or_else(|| size.saturating_sub(offset));
		match offset.checked_add(range) {
			Some(end) if range != 0 && end <= size => Ok(BufferDescriptor {
				buffer: buffer.handle(),
				offset,
				range,
			}),
			_ => Err(UsageError::RangeOutOfBounds {
				name: buffer.name().to_string(),
				offset,
				end: offset.saturating_add(range),
				size,
			}),
		}
	}

	fn image_descriptor(
		&self,
		image: &Image<P>,
		sampler: Option<P::Sampler>,
	) -> Result<ImageDescriptor<P>, RegisterError> {
		let view = image
			.usage()
			.contains(ImageUsage::SAMPLED)
			.then(|| image.sampled_view())
			.flatten()
			.ok_or_else(|| RegisterError::MissingSampledView {
				name: image.name().to_string(),
			})?;
		Ok(ImageDescriptor {
			view,
			sampler: sampler.unwrap_or_else(|| self.platform.default_sampler()),
		})
	}

	/// Registers `range` bytes of `buffer` starting at `offset` in `class`. A `range` of `None` spans the rest of the
	/// buffer. The table does not keep the buffer alive, it must outlive its slot.
	pub fn register_buffer(
		&self,
		buffer: &Buffer<P>,
		offset: u64,
		range: Option<u64>,
		class: BufferClass,
	) -> Result<SlotHandle, RegisterError> {
		let payload = Self::buffer_descriptor(buffer, offset, range, class)?;
		let mut state = self.state.lock();
		let completed = state.completed_frame;
		let result = state.buffers_mut(class).alloc(payload, completed);
		if let Err(RegisterError::CapacityExhausted { class, capacity }) = &result {
			log::warn!("can not register buffer {}: all {} {} slots in use", buffer.name(), capacity, class);
		}
		result
	}

	/// Registers the sampled view of `image`, sampled with `sampler` or the platform's default sampler. Fails with
	/// [`RegisterError::MissingSampledView`] if the image was not created with [`ImageUsage::SAMPLED`].
	pub fn register_image(&self, image: &Image<P>, sampler: Option<P::Sampler>) -> Result<SlotHandle, RegisterError> {
		let payload = self.image_descriptor(image, sampler)?;
		let mut state = self.state.lock();
		let completed = state.completed_frame;
		let result = state.sampled_images.alloc(payload, completed);
		if let Err(RegisterError::CapacityExhausted { class, capacity }) = &result {
			log::warn!("can not register image {}: all {} {} slots in use", image.name(), capacity, class);
		}
		result
	}

	/// Points a live buffer slot at another buffer range. The slot keeps its identity and is published again.
	///
	/// Frames recorded before the update keep reading the previous buffer, the new descriptor is only written once
	/// all of them have completed. The previous buffer must stay alive until then.
	pub fn update_buffer(
		&self,
		handle: SlotHandle,
		buffer: &Buffer<P>,
		offset: u64,
		range: Option<u64>,
	) -> Result<(), RegisterError> {
		let class = match handle.class() {
			ResourceClass::UniformBuffer => BufferClass::Uniform,
			ResourceClass::StorageBuffer => BufferClass::Storage,
			ResourceClass::SampledImage => return Err(RegisterError::InvalidHandle(handle)),
		};
		let payload = Self::buffer_descriptor(buffer, offset, range, class)?;
		let mut state = self.state.lock();
		let recording = state.recording_frame;
		state.buffers_mut(class).update(handle, payload, recording)
	}

	/// Points a live image slot at another image. Like [`Self::update_buffer`], the write is deferred until every
	/// frame recorded before the update has completed.
	pub fn update_image(
		&self,
		handle: SlotHandle,
		image: &Image<P>,
		sampler: Option<P::Sampler>,
	) -> Result<(), RegisterError> {
		let payload = self.image_descriptor(image, sampler)?;
		let mut state = self.state.lock();
		let recording = state.recording_frame;
		state.sampled_images.update(handle, payload, recording)
	}

	/// Frees a slot. Its index only becomes available to new registrations once every frame that was recorded up
	/// to now has completed, see [`Self::reclaim_completed`].
	pub fn release(&self, handle: SlotHandle) -> Result<(), RegisterError> {
		let mut state = self.state.lock();
		let frame = state.recording_frame;
		let result = match handle.class() {
			ResourceClass::UniformBuffer => state.uniform_buffers.release(handle, frame),
			ResourceClass::StorageBuffer => state.storage_buffers.release(handle, frame),
			ResourceClass::SampledImage => state.sampled_images.release(handle, frame),
		};
		if result.is_err() {
			log::debug!("ignoring release of stale slot {}", handle);
		}
		result
	}

	/// Declares that `frame` is being recorded and may reference every slot live at this point.
	pub fn mark_frame_recording(&self, frame: FrameNumber) {
		let mut state = self.state.lock();
		state.recording_frame = state.recording_frame.max(frame);
	}

	/// Declares that every frame up to and including `frame` has finished executing, so indices released while
	/// those were recorded can be reused.
	pub fn reclaim_completed(&self, frame: FrameNumber) {
		let mut state = self.state.lock();
		let completed = state.completed_frame.max(frame);
		state.completed_frame = completed;
		let reclaimed = state.uniform_buffers.pool.reclaim(completed)
			+ state.storage_buffers.pool.reclaim(completed)
			+ state.sampled_images.pool.reclaim(completed);
		if reclaimed > 0 {
			log::trace!("reclaimed {} slots up to frame {}", reclaimed, completed);
		}
	}

	/// Writes all registered or updated slots into the descriptor set with a single update call. Released slots are
	/// skipped, and calling this again without any changes in between writes nothing. Updates of slots that frames
	/// still in flight may read stay pending until [`Self::reclaim_completed`] reports those frames as done.
	pub fn publish_pending(&self) -> PublishStats {
		profiling::function_scope!();
		let mut state = self.state.lock();
		let state = &mut *state;
		let completed = state.completed_frame;
		let mut writes = Vec::new();
		let (uniform, uniform_held) = state.uniform_buffers.publish(completed, |first_index, buffers| {
			writes.push(DescriptorWrite::Buffers {
				class: BufferClass::Uniform,
				first_index,
				buffers,
			})
		});
		let (storage, storage_held) = state.storage_buffers.publish(completed, |first_index, buffers| {
			writes.push(DescriptorWrite::Buffers {
				class: BufferClass::Storage,
				first_index,
				buffers,
			})
		});
		let (images, images_held) = state
			.sampled_images
			.publish(completed, |first_index, images| writes.push(DescriptorWrite::Images { first_index, images }));

		if !writes.is_empty() {
			unsafe { self.platform.update_descriptor_set(&self.descriptor_set, &writes) };
		}
		PublishStats {
			records: uniform + storage + images,
			batches: writes.len() as u32,
			deferred: uniform_held + storage_held + images_held,
		}
	}
}

impl<P: BindlessPlatform> Drop for BindlessTable<P> {
	fn drop(&mut self) {
		// Safety: descriptor_set is never accessed again
		let set = unsafe { ManuallyDrop::take(&mut self.descriptor_set) };
		unsafe { self.platform.destroy_descriptor_set(set) }
	}
}

#[derive(Error)]
pub enum RegisterError {
	#[error("All {capacity} {class} slots are in use")]
	CapacityExhausted { class: ResourceClass, capacity: u32 },
	#[error("Image {name} has no sampled view and can not be registered")]
	MissingSampledView { name: String },
	#[error("Slot {0} is not live, it was either released or belongs to another class")]
	InvalidHandle(SlotHandle),
	#[error("Usage Error: {0}")]
	Usage(#[from] UsageError),
}

impl Debug for RegisterError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		Display::fmt(self, f)
	}
}

#[derive(Error)]
pub enum TableCreateError<P: BindlessPlatform> {
	#[error("Platform Error: {0}")]
	Platform(#[source] P::AllocationError),
	#[error("Requested descriptor counts {requested:?} exceed the platform limits {limits:?}")]
	ExceedsLimits {
		requested: DescriptorCounts,
		limits: DescriptorCounts,
	},
}

impl<P: BindlessPlatform> Debug for TableCreateError<P> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		Display::fmt(self, f)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::platform::dummy::{DummyDescriptorUpdate, DummyPlatform};
	use crate::resource::{BufferCreateInfo, ImageCreateInfo, MemoryIntent};
	use std::collections::HashSet;

	fn counts(n: u32) -> DescriptorCounts {
		DescriptorCounts {
			uniform_buffers: n,
			storage_buffers: n,
			sampled_images: n,
		}
	}

	fn buffer(platform: &Arc<DummyPlatform>, size: u64) -> anyhow::Result<Buffer<DummyPlatform>> {
		Ok(Buffer::new(
			platform,
			&BufferCreateInfo {
				size,
				usage: BufferUsage::UNIFORM | BufferUsage::STORAGE,
				memory: MemoryIntent::Auto,
				name: "buffer",
			},
		)?)
	}

	fn image(platform: &Arc<DummyPlatform>, usage: ImageUsage) -> anyhow::Result<Image<DummyPlatform>> {
		Ok(Image::new(
			platform,
			&ImageCreateInfo {
				usage,
				name: "image",
				..ImageCreateInfo::default()
			},
		)?)
	}

	fn written(updates: &[DummyDescriptorUpdate]) -> Vec<(ResourceClass, u32)> {
		updates.iter().flat_map(|u| u.slots.iter().copied()).collect()
	}

	#[test]
	fn test_capacity_exhausted() -> anyhow::Result<()> {
		let platform = Arc::new(DummyPlatform::new());
		let table = BindlessTable::new(&platform, counts(2))?;
		let buffer = buffer(&platform, 64)?;

		let a = table.register_buffer(&buffer, 0, None, BufferClass::Uniform)?;
		let b = table.register_buffer(&buffer, 0, None, BufferClass::Uniform)?;
		assert_eq!(a.index(), 0);
		assert_eq!(b.index(), 1);
		let c = table.register_buffer(&buffer, 0, None, BufferClass::Uniform);
		assert!(matches!(
			c,
			Err(RegisterError::CapacityExhausted {
				class: ResourceClass::UniformBuffer,
				capacity: 2
			})
		));

		// other classes are unaffected
		table.register_buffer(&buffer, 0, None, BufferClass::Storage)?;
		Ok(())
	}

	#[test]
	fn test_image_capacity_exhausted_is_consistent() -> anyhow::Result<()> {
		let platform = Arc::new(DummyPlatform::new());
		let table = BindlessTable::new(&platform, counts(1))?;
		let image = image(&platform, ImageUsage::SAMPLED)?;
		table.register_image(&image, None)?;
		assert!(matches!(
			table.register_image(&image, None),
			Err(RegisterError::CapacityExhausted {
				class: ResourceClass::SampledImage,
				capacity: 1
			})
		));
		Ok(())
	}

	#[test]
	fn test_register_image_without_view_fails() -> anyhow::Result<()> {
		let platform = Arc::new(DummyPlatform::new());
		let table = BindlessTable::new(&platform, counts(4))?;
		let image = image(&platform, ImageUsage::COLOR_ATTACHMENT)?;
		assert!(matches!(
			table.register_image(&image, None),
			Err(RegisterError::MissingSampledView { .. })
		));
		assert_eq!(table.live_count(ResourceClass::SampledImage), 0);
		Ok(())
	}

	#[test]
	fn test_register_image_default_sampler() -> anyhow::Result<()> {
		let platform = Arc::new(DummyPlatform::new());
		let table = BindlessTable::new(&platform, counts(4))?;
		let image = image(&platform, ImageUsage::SAMPLED)?;
		table.register_image(&image, None)?;
		table.publish_pending();
		let updates = platform.take_descriptor_updates();
		assert_eq!(updates.len(), 1);
		assert_eq!(updates[0].default_samplers, 1);
		Ok(())
	}

	#[test]
	fn test_buffer_range_validation() -> anyhow::Result<()> {
		let platform = Arc::new(DummyPlatform::new());
		let table = BindlessTable::new(&platform, counts(4))?;
		let buffer = buffer(&platform, 64)?;
		table.register_buffer(&buffer, 16, None, BufferClass::Storage)?;
		table.register_buffer(&buffer, 16, Some(48), BufferClass::Storage)?;
		assert!(matches!(
			table.register_buffer(&buffer, 16, Some(49), BufferClass::Storage),
			Err(RegisterError::Usage(UsageError::RangeOutOfBounds { .. }))
		));
		assert!(matches!(
			table.register_buffer(&buffer, 64, None, BufferClass::Storage),
			Err(RegisterError::Usage(UsageError::RangeOutOfBounds { .. }))
		));

		let vertex_only = Buffer::new(
			&platform,
			&BufferCreateInfo {
				size: 16,
				usage: BufferUsage::VERTEX,
				memory: MemoryIntent::Auto,
				name: "vertex",
			},
		)?;
		assert!(matches!(
			table.register_buffer(&vertex_only, 0, None, BufferClass::Uniform),
			Err(RegisterError::Usage(UsageError::MissingUsage { .. }))
		));
		Ok(())
	}

	#[test]
	fn test_release_then_publish_emits_nothing() -> anyhow::Result<()> {
		let platform = Arc::new(DummyPlatform::new());
		let table = BindlessTable::new(&platform, counts(4))?;
		let buffer = buffer(&platform, 64)?;
		let a = table.register_buffer(&buffer, 0, None, BufferClass::Uniform)?;
		let b = table.register_buffer(&buffer, 0, None, BufferClass::Uniform)?;
		table.release(a)?;

		let stats = table.publish_pending();
		assert_eq!(stats.records, 1);
		assert_eq!(
			written(&platform.take_descriptor_updates()),
			vec![(ResourceClass::UniformBuffer, b.index())]
		);

		table.release(b)?;
		assert!(table.publish_pending().is_empty());
		assert!(platform.take_descriptor_updates().is_empty());
		Ok(())
	}

	#[test]
	fn test_publish_is_idempotent() -> anyhow::Result<()> {
		let platform = Arc::new(DummyPlatform::new());
		let table = BindlessTable::new(&platform, counts(4))?;
		let buffer = buffer(&platform, 64)?;
		let image = image(&platform, ImageUsage::SAMPLED)?;
		table.register_buffer(&buffer, 0, None, BufferClass::Uniform)?;
		table.register_image(&image, None)?;

		assert_eq!(table.publish_pending().records, 2);
		assert_eq!(platform.take_descriptor_updates().len(), 1);
		assert_eq!(table.publish_pending(), PublishStats::default());
		assert!(platform.take_descriptor_updates().is_empty());
		Ok(())
	}

	#[test]
	fn test_publish_batches_contiguous_runs() -> anyhow::Result<()> {
		let platform = Arc::new(DummyPlatform::new());
		let table = BindlessTable::new(&platform, counts(8))?;
		let buffer = buffer(&platform, 64)?;
		let handles = (0..5)
			.map(|_| table.register_buffer(&buffer, 0, None, BufferClass::Storage))
			.collect::<Result<Vec<_>, _>>()?;
		table.release(handles[2])?;

		let stats = table.publish_pending();
		assert_eq!(
			stats,
			PublishStats {
				records: 4,
				batches: 2,
				deferred: 0
			}
		);
		let updates = platform.take_descriptor_updates();
		assert_eq!(updates.len(), 1, "all runs must be written with a single update call");
		assert_eq!(updates[0].batches, 2);
		Ok(())
	}

	#[test]
	fn test_update_in_place() -> anyhow::Result<()> {
		let platform = Arc::new(DummyPlatform::new());
		let table = BindlessTable::new(&platform, counts(4))?;
		let first = buffer(&platform, 64)?;
		let second = buffer(&platform, 32)?;
		let handle = table.register_buffer(&first, 0, None, BufferClass::Uniform)?;
		table.publish_pending();
		platform.take_descriptor_updates();

		table.update_buffer(handle, &second, 0, None)?;
		assert!(table.is_live(handle));
		let stats = table.publish_pending();
		assert_eq!(stats.records, 1);
		assert_eq!(
			written(&platform.take_descriptor_updates()),
			vec![(ResourceClass::UniformBuffer, handle.index())]
		);

		let image = image(&platform, ImageUsage::SAMPLED)?;
		assert!(matches!(
			table.update_image(handle, &image, None),
			Err(RegisterError::InvalidHandle(_))
		));
		Ok(())
	}

	#[test]
	fn test_update_waits_for_frames_in_flight() -> anyhow::Result<()> {
		let platform = Arc::new(DummyPlatform::new());
		let table = BindlessTable::new(&platform, counts(4))?;
		let first = buffer(&platform, 64)?;
		let second = buffer(&platform, 32)?;
		let handle = table.register_buffer(&first, 0, None, BufferClass::Uniform)?;
		table.mark_frame_recording(1);
		table.publish_pending();
		platform.take_descriptor_updates();

		// frame 1 reads the first buffer and has not completed yet
		table.update_buffer(handle, &second, 0, None)?;
		table.mark_frame_recording(2);
		let stats = table.publish_pending();
		assert_eq!((stats.records, stats.deferred), (0, 1));
		assert!(platform.take_descriptor_updates().is_empty());

		// updating again while frame 2 is recorded holds the write back behind frame 2
		table.update_buffer(handle, &first, 0, Some(16))?;
		table.reclaim_completed(1);
		let fresh = table.register_buffer(&first, 0, None, BufferClass::Uniform)?;
		table.update_buffer(fresh, &second, 0, None)?;
		let stats = table.publish_pending();
		assert_eq!((stats.records, stats.deferred), (1, 1));
		assert_eq!(
			written(&platform.take_descriptor_updates()),
			vec![(ResourceClass::UniformBuffer, fresh.index())]
		);

		table.reclaim_completed(2);
		let stats = table.publish_pending();
		assert_eq!((stats.records, stats.deferred), (1, 0));
		assert_eq!(
			written(&platform.take_descriptor_updates()),
			vec![(ResourceClass::UniformBuffer, handle.index())]
		);
		assert!(table.publish_pending().is_empty());

		// releasing a slot drops its deferred write
		table.mark_frame_recording(3);
		table.update_buffer(fresh, &first, 0, None)?;
		table.release(fresh)?;
		assert_eq!(table.publish_pending(), PublishStats::default());
		assert!(platform.take_descriptor_updates().is_empty());
		Ok(())
	}

	#[test]
	fn test_deferred_index_reuse() -> anyhow::Result<()> {
		let platform = Arc::new(DummyPlatform::new());
		let table = BindlessTable::new(&platform, counts(2))?;
		let buffer = buffer(&platform, 64)?;
		let a = table.register_buffer(&buffer, 0, None, BufferClass::Uniform)?;
		let _b = table.register_buffer(&buffer, 0, None, BufferClass::Uniform)?;

		table.mark_frame_recording(1);
		table.release(a)?;
		// frame 1 may still read index 0
		assert!(table.register_buffer(&buffer, 0, None, BufferClass::Uniform).is_err());

		table.reclaim_completed(1);
		let c = table.register_buffer(&buffer, 0, None, BufferClass::Uniform)?;
		assert_eq!(c.index(), a.index());
		assert_ne!(c.generation(), a.generation());

		// the stale handle must not release the new occupant
		assert!(matches!(table.release(a), Err(RegisterError::InvalidHandle(_))));
		assert!(table.is_live(c));
		Ok(())
	}

	#[test]
	fn test_release_before_any_frame_is_reusable() -> anyhow::Result<()> {
		let platform = Arc::new(DummyPlatform::new());
		let table = BindlessTable::new(&platform, counts(1))?;
		let buffer = buffer(&platform, 64)?;
		let a = table.register_buffer(&buffer, 0, None, BufferClass::Storage)?;
		table.release(a)?;
		assert!(matches!(table.release(a), Err(RegisterError::InvalidHandle(_))));
		let b = table.register_buffer(&buffer, 0, None, BufferClass::Storage)?;
		assert_eq!(b.index(), 0);
		Ok(())
	}

	#[test]
	fn test_global_index() -> anyhow::Result<()> {
		let platform = Arc::new(DummyPlatform::new());
		let table = BindlessTable::new(&platform, DescriptorCounts::DEFAULT)?;
		let buffer = buffer(&platform, 64)?;
		let image = image(&platform, ImageUsage::SAMPLED)?;
		let ubo = table.register_buffer(&buffer, 0, None, BufferClass::Uniform)?;
		let ssbo = table.register_buffer(&buffer, 0, None, BufferClass::Storage)?;
		let tex = table.register_image(&image, None)?;
		assert_eq!(table.global_index(ubo), 0);
		assert_eq!(table.global_index(ssbo), 64);
		assert_eq!(table.global_index(tex), 128);
		Ok(())
	}

	#[test]
	fn test_exceeding_limits_fails() {
		let platform = Arc::new(DummyPlatform::new().with_limits(counts(8)));
		assert!(matches!(
			BindlessTable::new(&platform, counts(9)),
			Err(TableCreateError::ExceedsLimits { .. })
		));
	}

	/// Runs a long pseudo-random sequence of registrations, releases and frames and checks that no two live slots
	/// ever share the same class and index.
	#[test]
	fn test_live_slots_never_alias() -> anyhow::Result<()> {
		let platform = Arc::new(DummyPlatform::new());
		let table = BindlessTable::new(&platform, counts(6))?;
		let buffer = buffer(&platform, 64)?;
		let image = image(&platform, ImageUsage::SAMPLED)?;

		let mut seed = 0x2545_f491_u32;
		let mut next = move || {
			seed ^= seed << 13;
			seed ^= seed >> 17;
			seed ^= seed << 5;
			seed
		};

		let mut live: Vec<SlotHandle> = Vec::new();
		let mut frame = 0;
		for _ in 0..2000 {
			match next() % 6 {
				0 | 1 => {
					let result = match next() % 3 {
						0 => table.register_buffer(&buffer, 0, None, BufferClass::Uniform),
						1 => table.register_buffer(&buffer, 0, None, BufferClass::Storage),
						_ => table.register_image(&image, None),
					};
					match result {
						Ok(handle) => live.push(handle),
						Err(RegisterError::CapacityExhausted { .. }) => (),
						Err(e) => return Err(e.into()),
					}
				}
				2 | 3 if !live.is_empty() => {
					let handle = live.swap_remove(next() as usize % live.len());
					table.release(handle)?;
				}
				4 => {
					frame += 1;
					table.mark_frame_recording(frame);
					table.reclaim_completed(frame.saturating_sub(2));
				}
				_ => {
					table.publish_pending();
				}
			}

			let unique = live.iter().map(|h| (h.class(), h.index())).collect::<HashSet<_>>();
			assert_eq!(unique.len(), live.len());
			assert!(live.iter().all(|h| table.is_live(*h)));
		}
		Ok(())
	}
}
