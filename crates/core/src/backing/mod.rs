//! Backing data structures for managing slots in the bindless descriptor set and their delayed reclamation.

pub mod range_set;
pub mod slot_pool;
