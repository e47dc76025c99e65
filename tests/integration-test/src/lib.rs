use bindless_renderer_core::platform::ash::init::{
	ash_init_single_graphics_queue, AshSingleGraphicsQueueCreateInfo, Debuggers,
};
use bindless_renderer_core::platform::ash::Ash;
use std::sync::Arc;

pub mod frame_cycle;
pub mod resource;
pub mod table;
pub mod upload;

/// the global setting on which debugger to use for integration tests
pub fn debugger() -> Debuggers {
	Debuggers::Validation
}

/// A headless Vulkan platform on the first suitable GPU. Tests using it are ignored by default, as they require a
/// Vulkan 1.3 capable device.
pub fn ash_platform() -> anyhow::Result<Arc<Ash>> {
	Ok(Arc::new(Ash::new(ash_init_single_graphics_queue(
		AshSingleGraphicsQueueCreateInfo {
			debug: debugger(),
			..AshSingleGraphicsQueueCreateInfo::default()
		},
	)?)?))
}
