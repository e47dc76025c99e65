//! A minimal entity component store: entities are generational indices, and every component type lives in its own
//! dense array with a sparse entity lookup.

pub mod entity;
pub mod storage;
pub mod world;
