pub mod ash;
mod bindless;
pub mod dummy;
mod present;

pub use bindless::*;
pub use present::*;
