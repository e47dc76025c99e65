mod params;
mod presentation;
mod state;

pub use params::*;
pub use presentation::*;
pub use state::*;
