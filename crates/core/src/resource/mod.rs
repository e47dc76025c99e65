//! GPU resources with a single owner: buffers, images and the depth target.

mod buffer;
mod depth;
mod error;
mod format;
mod image;
mod usage;

pub use buffer::*;
pub use depth::*;
pub use error::*;
pub use format::*;
pub use image::*;
pub use usage::*;
