use std::collections::VecDeque;
use std::fmt::{Display, Formatter};

/// Frame counter value the bindless table stamps releases with. Frames are numbered starting at 1, 0 means no frame
/// has been recorded yet.
pub type FrameNumber = u64;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct Retired {
	/// the last frame that may reference the index
	frame: FrameNumber,
	index: u32,
}

/// Allocates the array indices of a single resource class.
///
/// Fresh indices come from a monotonic counter. Released indices are not handed out again immediately, as frames
/// still executing on the GPU may read them by number. Instead they are retired with the frame number they were
/// released in and only become allocatable again once that frame has completed, see [`Self::reclaim`].
#[derive(Debug)]
pub struct SlotPool {
	capacity: u32,
	next_free: u32,
	free: VecDeque<u32>,
	retired: VecDeque<Retired>,
	live: u32,
}

impl SlotPool {
	pub fn new(capacity: u32) -> Self {
		Self {
			capacity,
			next_free: 0,
			free: VecDeque::new(),
			retired: VecDeque::new(),
			live: 0,
		}
	}

	#[inline]
	pub fn capacity(&self) -> u32 {
		self.capacity
	}

	#[inline]
	pub fn live(&self) -> u32 {
		self.live
	}

	/// Indices released but not yet reclaimed
	#[inline]
	pub fn retired(&self) -> usize {
		self.retired.len()
	}

	pub fn alloc(&mut self) -> Result<u32, SlotAllocationError> {
		let index = if let Some(index) = self.free.pop_front() {
			index
		} else if self.next_free < self.capacity {
			let index = self.next_free;
			self.next_free += 1;
			index
		} else {
			return Err(SlotAllocationError::NoMoreCapacity(self.capacity));
		};
		self.live += 1;
		Ok(index)
	}

	/// Retires `index`, which may still be referenced by any frame up to and including `frame`.
	pub fn retire(&mut self, index: u32, frame: FrameNumber) {
		debug_assert!(index < self.next_free);
		debug_assert!(
			self.retired.back().map_or(true, |last| last.frame <= frame),
			"frame numbers must be monotonic"
		);
		self.live -= 1;
		self.retired.push_back(Retired { frame, index });
	}

	/// Moves every index retired in a frame up to and including `completed` back into the free list. Returns the
	/// amount of reclaimed indices.
	pub fn reclaim(&mut self, completed: FrameNumber) -> usize {
		let mut count = 0;
		while let Some(retired) = self.retired.front() {
			if retired.frame > completed {
				break;
			}
			self.free.push_back(retired.index);
			self.retired.pop_front();
			count += 1;
		}
		count
	}
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SlotAllocationError {
	NoMoreCapacity(u32),
}

impl Display for SlotAllocationError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			SlotAllocationError::NoMoreCapacity(cap) => {
				write!(f, "Ran out of slots, all {} slots are in use", cap)
			}
		}
	}
}

impl std::error::Error for SlotAllocationError {}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_alloc_slot() -> anyhow::Result<()> {
		const N: u32 = 4;
		let mut pool = SlotPool::new(N);
		for i in 0..N {
			assert_eq!(pool.alloc()?, i);
		}
		assert_eq!(pool.alloc(), Err(SlotAllocationError::NoMoreCapacity(N)));
		assert_eq!(pool.live(), N);
		Ok(())
	}

	#[test]
	fn test_retired_not_reused_before_completion() -> anyhow::Result<()> {
		let mut pool = SlotPool::new(2);
		let a = pool.alloc()?;
		let _b = pool.alloc()?;
		pool.retire(a, 3);
		assert_eq!(pool.live(), 1);
		assert!(pool.alloc().is_err());

		assert_eq!(pool.reclaim(2), 0);
		assert!(pool.alloc().is_err());

		assert_eq!(pool.reclaim(3), 1);
		assert_eq!(pool.alloc()?, a);
		Ok(())
	}

	#[test]
	fn test_reclaim_in_release_order() -> anyhow::Result<()> {
		let mut pool = SlotPool::new(8);
		let indices = (0..4).map(|_| pool.alloc()).collect::<Result<Vec<_>, _>>()?;
		pool.retire(indices[2], 1);
		pool.retire(indices[0], 1);
		pool.retire(indices[3], 2);
		assert_eq!(pool.reclaim(1), 2);
		assert_eq!(pool.retired(), 1);

		// reclaimed indices are preferred over fresh ones
		assert_eq!(pool.alloc()?, indices[2]);
		assert_eq!(pool.alloc()?, indices[0]);
		assert_eq!(pool.alloc()?, 4);
		Ok(())
	}
}
