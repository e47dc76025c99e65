#[cfg(feature = "ash")]
pub mod ash;
pub mod window;
