mod error;
mod manager;
mod one_shot;
mod recording;
mod texture;

pub use error::*;
pub use manager::*;
pub use one_shot::*;
pub use recording::*;
pub use texture::*;
