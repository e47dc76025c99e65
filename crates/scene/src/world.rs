use crate::entity::{Entity, EntityAllocator, EntityError};
use crate::storage::{ComponentStorage, ErasedStorage};
use rustc_hash::FxHashMap;
use static_assertions::assert_impl_all;
use std::any::{type_name, TypeId};

/// All entities and a registry of one [`ComponentStorage`] per component type.
#[derive(Default)]
pub struct World {
	entities: EntityAllocator,
	storages: FxHashMap<TypeId, Box<dyn ErasedStorage>>,
}

assert_impl_all!(World: Send, Sync);

impl World {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn spawn(&mut self) -> Result<Entity, EntityError> {
		self.entities.alloc()
	}

	/// Frees the entity and removes all of its components.
	pub fn despawn(&mut self, entity: Entity) -> Result<(), EntityError> {
		self.entities.free(entity)?;
		let removed = self
			.storages
			.values_mut()
			.filter_map(|storage| storage.remove_entity(entity).then_some(()))
			.count();
		log::trace!("despawned {} with {} components", entity, removed);
		Ok(())
	}

	#[inline]
	pub fn is_alive(&self, entity: Entity) -> bool {
		self.entities.is_alive(entity)
	}

	pub fn entities(&self) -> &EntityAllocator {
		&self.entities
	}

	/// Inserts a component for an alive entity, returning the one it replaced.
	pub fn insert<T: Send + Sync + 'static>(&mut self, entity: Entity, component: T) -> Result<Option<T>, EntityError> {
		if !self.entities.is_alive(entity) {
			return Err(EntityError::NotAlive(entity));
		}
		Ok(self.storage_mut::<T>().insert(entity, component))
	}

	pub fn remove<T: Send + Sync + 'static>(&mut self, entity: Entity) -> Option<T> {
		self.storage_mut_opt::<T>()?.remove(entity)
	}

	pub fn get<T: Send + Sync + 'static>(&self, entity: Entity) -> Option<&T> {
		self.storage::<T>()?.get(entity)
	}

	pub fn get_mut<T: Send + Sync + 'static>(&mut self, entity: Entity) -> Option<&mut T> {
		self.storage_mut_opt::<T>()?.get_mut(entity)
	}

	/// The storage of `T`, if any component of it was ever inserted.
	pub fn storage<T: Send + Sync + 'static>(&self) -> Option<&ComponentStorage<T>> {
		self.storages
			.get(&TypeId::of::<T>())
			.and_then(|storage| storage.as_any().downcast_ref())
	}

	fn storage_mut_opt<T: Send + Sync + 'static>(&mut self) -> Option<&mut ComponentStorage<T>> {
		self.storages
			.get_mut(&TypeId::of::<T>())
			.and_then(|storage| storage.as_any_mut().downcast_mut())
	}

	/// The storage of `T`, registering an empty one if there is none yet.
	pub fn storage_mut<T: Send + Sync + 'static>(&mut self) -> &mut ComponentStorage<T> {
		let storage = self.storages.entry(TypeId::of::<T>()).or_insert_with(|| {
			log::debug!("registered component storage of {}", type_name::<T>());
			Box::new(ComponentStorage::<T>::new())
		});
		match storage.as_any_mut().downcast_mut() {
			Some(storage) => storage,
			None => unreachable!("storage of {} is registered under a foreign TypeId", type_name::<T>()),
		}
	}

	/// Iterates all components of `T` together with their entity.
	pub fn iter<T: Send + Sync + 'static>(&self) -> impl Iterator<Item = (Entity, &T)> + '_ {
		self.storage::<T>().into_iter().flat_map(|storage| storage.iter())
	}

	pub fn iter_mut<T: Send + Sync + 'static>(&mut self) -> impl Iterator<Item = (Entity, &mut T)> + '_ {
		self.storage_mut_opt::<T>()
			.into_iter()
			.flat_map(|storage| storage.iter_mut())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[derive(Debug, PartialEq)]
	struct Position(f32);

	#[derive(Debug, PartialEq)]
	struct Name(&'static str);

	#[test]
	fn test_despawn_removes_from_every_storage() -> anyhow::Result<()> {
		let mut world = World::new();
		let a = world.spawn()?;
		let b = world.spawn()?;
		world.insert(a, Position(1.))?;
		world.insert(a, Name("a"))?;
		world.insert(b, Position(2.))?;

		world.despawn(a)?;
		assert!(!world.is_alive(a));
		assert_eq!(world.get::<Position>(a), None);
		assert_eq!(world.get::<Name>(a), None);
		assert_eq!(world.get::<Position>(b), Some(&Position(2.)));
		assert_eq!(world.storage::<Name>().map(|s| s.len()), Some(0));
		assert!(matches!(world.despawn(a), Err(EntityError::NotAlive(_))));
		Ok(())
	}

	#[test]
	fn test_insert_requires_alive_entity() -> anyhow::Result<()> {
		let mut world = World::new();
		let a = world.spawn()?;
		world.despawn(a)?;
		assert!(matches!(world.insert(a, Position(0.)), Err(EntityError::NotAlive(_))));

		// the index is reused, but the old entity stays dead
		let b = world.spawn()?;
		world.insert(b, Position(3.))?;
		assert_eq!(world.get::<Position>(a), None);
		Ok(())
	}

	#[test]
	fn test_iter_mut() -> anyhow::Result<()> {
		let mut world = World::new();
		for i in 0..4 {
			let entity = world.spawn()?;
			world.insert(entity, Position(i as f32))?;
		}
		for (_, position) in world.iter_mut::<Position>() {
			position.0 *= 2.;
		}
		let sum: f32 = world.iter::<Position>().map(|(_, p)| p.0).sum();
		assert_eq!(sum, 12.);
		assert_eq!(world.iter::<Name>().count(), 0);
		let first = world.entities().iter().next().ok_or_else(|| anyhow::anyhow!("no entities"))?;
		assert_eq!(world.remove::<Position>(first), Some(Position(0.)));
		assert_eq!(world.iter::<Position>().count(), 3);
		Ok(())
	}
}
