use rangemap::RangeSet;
use std::ops::Range;

pub(crate) fn index_to_range(index: u32) -> Range<u32> {
	index..index + 1
}

pub fn range_to_indices(range: Range<u32>) -> impl Iterator<Item = u32> {
	range.start..range.end
}

/// A set of array indices, coalesced into contiguous ranges so that every range can be written with a single
/// descriptor write.
#[derive(Clone, Debug, Default)]
pub struct IndexRangeSet {
	range_set: RangeSet<u32>,
}

impl IndexRangeSet {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, index: u32) {
		self.range_set.insert(index_to_range(index));
	}

	pub fn contains(&self, index: u32) -> bool {
		self.range_set.contains(&index)
	}

	pub fn is_empty(&self) -> bool {
		self.range_set.is_empty()
	}

	/// Amount of indices, not ranges
	pub fn len(&self) -> usize {
		self.range_set.iter().map(|r| (r.end - r.start) as usize).sum()
	}

	pub fn iter_ranges(&self) -> impl Iterator<Item = Range<u32>> + '_ {
		self.range_set.iter().cloned()
	}

	pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
		self.iter_ranges().flat_map(range_to_indices)
	}

	pub fn take(&mut self) -> Self {
		std::mem::take(self)
	}
}

impl FromIterator<u32> for IndexRangeSet {
	fn from_iter<T: IntoIterator<Item = u32>>(iter: T) -> Self {
		Self {
			range_set: iter.into_iter().map(index_to_range).collect(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_coalesce_ranges() {
		let set = [5, 1, 2, 3, 9, 6].into_iter().collect::<IndexRangeSet>();
		assert_eq!(set.iter_ranges().collect::<Vec<_>>(), vec![1..4, 5..7, 9..10]);
		assert_eq!(set.iter().collect::<Vec<_>>(), vec![1, 2, 3, 5, 6, 9]);
		assert_eq!(set.len(), 6);
	}

	#[test]
	fn test_duplicate_insert() {
		let mut set = IndexRangeSet::new();
		set.insert(3);
		set.insert(3);
		assert_eq!(set.len(), 1);
		assert!(set.contains(3));
		assert!(!set.take().is_empty());
		assert!(set.is_empty());
	}
}
