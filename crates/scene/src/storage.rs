use crate::entity::Entity;
use std::any::Any;

/// Type erased access to a [`ComponentStorage`], so a world can remove an entity from all storages without knowing
/// their component types.
pub trait ErasedStorage: Send + Sync + 'static {
	/// Removes the component of `entity`, returns whether it had one.
	fn remove_entity(&mut self, entity: Entity) -> bool;

	fn len(&self) -> usize;

	fn as_any(&self) -> &dyn Any;

	fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A sparse set: components are tightly packed in `dense`, with `entities` holding the owner of each one and `sparse`
/// mapping an entity index to its position in `dense`.
#[derive(Debug)]
pub struct ComponentStorage<T> {
	dense: Vec<T>,
	entities: Vec<Entity>,
	sparse: Vec<Option<u32>>,
}

impl<T> Default for ComponentStorage<T> {
	fn default() -> Self {
		Self {
			dense: Vec::new(),
			entities: Vec::new(),
			sparse: Vec::new(),
		}
	}
}

impl<T> ComponentStorage<T> {
	pub fn new() -> Self {
		Self::default()
	}

	fn dense_index(&self, entity: Entity) -> Option<usize> {
		let dense = (*self.sparse.get(entity.index() as usize)?)? as usize;
		(self.entities[dense] == entity).then_some(dense)
	}

	/// Inserts the component of `entity`, returning the one it replaced.
	pub fn insert(&mut self, entity: Entity, component: T) -> Option<T> {
		if let Some(dense) = self.dense_index(entity) {
			return Some(std::mem::replace(&mut self.dense[dense], component));
		}
		// drops the component of an older generation of the same index
		self.remove_index(entity.index());

		let index = entity.index() as usize;
		if self.sparse.len() <= index {
			self.sparse.resize(index + 1, None);
		}
		self.sparse[index] = Some(self.dense.len() as u32);
		self.dense.push(component);
		self.entities.push(entity);
		None
	}

	pub fn get(&self, entity: Entity) -> Option<&T> {
		self.dense_index(entity).map(|dense| &self.dense[dense])
	}

	pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
		self.dense_index(entity).map(|dense| &mut self.dense[dense])
	}

	pub fn contains(&self, entity: Entity) -> bool {
		self.dense_index(entity).is_some()
	}

	pub fn remove(&mut self, entity: Entity) -> Option<T> {
		self.dense_index(entity)?;
		self.remove_index(entity.index())
	}

	/// Swap-removes whatever component is stored for `index`, moving the last component into its place.
	fn remove_index(&mut self, index: u32) -> Option<T> {
		let dense = self.sparse.get_mut(index as usize)?.take()? as usize;
		let component = self.dense.swap_remove(dense);
		self.entities.swap_remove(dense);
		if let Some(moved) = self.entities.get(dense) {
			self.sparse[moved.index() as usize] = Some(dense as u32);
		}
		Some(component)
	}

	#[inline]
	pub fn len(&self) -> usize {
		self.dense.len()
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.dense.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> + '_ {
		self.entities.iter().copied().zip(self.dense.iter())
	}

	pub fn iter_mut(&mut self) -> impl Iterator<Item = (Entity, &mut T)> + '_ {
		self.entities.iter().copied().zip(self.dense.iter_mut())
	}
}

impl<T: Send + Sync + 'static> ErasedStorage for ComponentStorage<T> {
	fn remove_entity(&mut self, entity: Entity) -> bool {
		self.remove(entity).is_some()
	}

	fn len(&self) -> usize {
		self.dense.len()
	}

	fn as_any(&self) -> &dyn Any {
		self
	}

	fn as_any_mut(&mut self) -> &mut dyn Any {
		self
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::entity::EntityAllocator;

	#[test]
	fn test_swap_remove_keeps_lookup_consistent() -> anyhow::Result<()> {
		let mut entities = EntityAllocator::new();
		let [a, b, c] = [entities.alloc()?, entities.alloc()?, entities.alloc()?];
		let mut storage = ComponentStorage::new();
		storage.insert(a, "a");
		storage.insert(b, "b");
		storage.insert(c, "c");

		assert_eq!(storage.remove(a), Some("a"));
		assert_eq!(storage.len(), 2);
		assert_eq!(storage.get(a), None);
		assert_eq!(storage.get(b), Some(&"b"));
		assert_eq!(storage.get(c), Some(&"c"));
		assert_eq!(storage.remove(a), None);

		let mut seen = storage.iter().map(|(e, s)| (e, *s)).collect::<Vec<_>>();
		seen.sort();
		assert_eq!(seen, [(b, "b"), (c, "c")]);
		Ok(())
	}

	#[test]
	fn test_insert_replaces() -> anyhow::Result<()> {
		let mut entities = EntityAllocator::new();
		let a = entities.alloc()?;
		let mut storage = ComponentStorage::new();
		assert_eq!(storage.insert(a, 1), None);
		assert_eq!(storage.insert(a, 2), Some(1));
		if let Some(value) = storage.get_mut(a) {
			*value += 1;
		}
		assert_eq!(storage.get(a), Some(&3));
		assert_eq!(storage.len(), 1);
		Ok(())
	}

	#[test]
	fn test_stale_generation_is_not_found() -> anyhow::Result<()> {
		let mut entities = EntityAllocator::new();
		let old = entities.alloc()?;
		entities.free(old)?;
		let new = entities.alloc()?;
		assert_eq!(old.index(), new.index());

		let mut storage = ComponentStorage::new();
		storage.insert(new, 42);
		assert!(!storage.contains(old));
		assert_eq!(storage.remove(old), None);
		assert_eq!(storage.get(new), Some(&42));
		Ok(())
	}

	#[test]
	fn test_erased_remove() -> anyhow::Result<()> {
		let mut entities = EntityAllocator::new();
		let a = entities.alloc()?;
		let mut storage: Box<dyn ErasedStorage> = Box::new(ComponentStorage::<u32>::new());
		storage
			.as_any_mut()
			.downcast_mut::<ComponentStorage<u32>>()
			.ok_or_else(|| anyhow::anyhow!("wrong storage type"))?
			.insert(a, 7);
		assert!(storage.remove_entity(a));
		assert!(!storage.remove_entity(a));
		assert_eq!(storage.len(), 0);
		Ok(())
	}
}
