mod access_type;
mod bindless;
mod convert;
pub mod init;
mod present;
mod recording;

pub use access_type::*;
pub use bindless::*;
pub use present::*;
pub use recording::*;
