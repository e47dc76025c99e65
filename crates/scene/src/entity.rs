use std::collections::VecDeque;
use std::fmt::{Debug, Display, Formatter};
use thiserror::Error;

pub const MAX_ENTITIES: u32 = 10000;

/// A generational index. The generation is bumped every time the index is freed, so an `Entity` kept around after
/// its despawn never aliases the entity reusing its index.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Entity {
	index: u32,
	generation: u32,
}

impl Entity {
	#[inline]
	pub fn index(&self) -> u32 {
		self.index
	}

	#[inline]
	pub fn generation(&self) -> u32 {
		self.generation
	}
}

impl Display for Entity {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "Entity({}v{})", self.index, self.generation)
	}
}

#[derive(Copy, Clone, Debug, Default)]
struct EntitySlot {
	generation: u32,
	alive: bool,
}

/// Hands out entities, reusing freed indices in the order they were freed.
#[derive(Debug, Default)]
pub struct EntityAllocator {
	slots: Vec<EntitySlot>,
	free: VecDeque<u32>,
	live: u32,
}

impl EntityAllocator {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn alloc(&mut self) -> Result<Entity, EntityError> {
		let index = match self.free.pop_front() {
			Some(index) => index,
			None if (self.slots.len() as u32) < MAX_ENTITIES => {
				self.slots.push(EntitySlot::default());
				self.slots.len() as u32 - 1
			}
			None => return Err(EntityError::CapacityExhausted(MAX_ENTITIES)),
		};
		let slot = &mut self.slots[index as usize];
		slot.alive = true;
		self.live += 1;
		Ok(Entity {
			index,
			generation: slot.generation,
		})
	}

	pub fn free(&mut self, entity: Entity) -> Result<(), EntityError> {
		if !self.is_alive(entity) {
			return Err(EntityError::NotAlive(entity));
		}
		let slot = &mut self.slots[entity.index as usize];
		slot.alive = false;
		slot.generation = slot.generation.wrapping_add(1);
		self.free.push_back(entity.index);
		self.live -= 1;
		Ok(())
	}

	pub fn is_alive(&self, entity: Entity) -> bool {
		self.slots
			.get(entity.index as usize)
			.is_some_and(|slot| slot.alive && slot.generation == entity.generation)
	}

	/// Amount of alive entities
	#[inline]
	pub fn len(&self) -> u32 {
		self.live
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.live == 0
	}

	pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
		self.slots.iter().enumerate().filter(|(_, slot)| slot.alive).map(|(index, slot)| Entity {
			index: index as u32,
			generation: slot.generation,
		})
	}
}

#[derive(Error)]
pub enum EntityError {
	#[error("All {0} entities are in use")]
	CapacityExhausted(u32),
	#[error("{0} is not alive")]
	NotAlive(Entity),
}

impl Debug for EntityError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		Display::fmt(self, f)
	}
}
