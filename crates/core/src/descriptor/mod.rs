mod descriptor_counts;
mod handle;
mod table;
mod write;

pub use descriptor_counts::*;
pub use handle::*;
pub use table::*;
pub use write::*;
