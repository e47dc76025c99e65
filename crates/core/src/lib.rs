pub mod backing;
pub mod descriptor;
pub mod frame;
pub mod platform;
pub mod resource;
pub mod surface;
