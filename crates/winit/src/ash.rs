use ash::ext::metal_surface;
use ash::khr::{android_surface, surface, wayland_surface, win32_surface, xcb_surface, xlib_surface};
use ash::prelude::VkResult;
use bindless_renderer_core::platform::ash::{Ash, AshSurface};
use std::ffi::CStr;
use std::fmt::{Debug, Display, Formatter};
use thiserror::Error;
use winit::raw_window_handle::{HandleError, HasDisplayHandle, HasWindowHandle, RawDisplayHandle};
use winit::window::Window;

/// The instance extensions required to create a surface on the display server of `display_handle`.
pub fn ash_enumerate_required_extensions(display_handle: RawDisplayHandle) -> VkResult<&'static [&'static CStr]> {
	Ok(match display_handle {
		RawDisplayHandle::Windows(_) => &[surface::NAME, win32_surface::NAME],
		RawDisplayHandle::Wayland(_) => &[surface::NAME, wayland_surface::NAME],
		RawDisplayHandle::Xlib(_) => &[surface::NAME, xlib_surface::NAME],
		RawDisplayHandle::Xcb(_) => &[surface::NAME, xcb_surface::NAME],
		RawDisplayHandle::Android(_) => &[surface::NAME, android_surface::NAME],
		RawDisplayHandle::AppKit(_) | RawDisplayHandle::UiKit(_) => &[surface::NAME, metal_surface::NAME],
		_ => return Err(ash::vk::Result::ERROR_EXTENSION_NOT_PRESENT),
	})
}

/// Creates a Vulkan surface presenting into `window`, to be handed to a presentation surface which takes ownership.
///
/// # Safety
/// The instance must have been created with the extensions of [`ash_enumerate_required_extensions`], and `window`
/// must outlive the surface.
pub unsafe fn create_ash_surface(ash: &Ash, window: &Window) -> Result<AshSurface, WindowSurfaceError> {
	unsafe {
		let surface = ash_window::create_surface(
			&ash.entry,
			&ash.instance,
			window.display_handle()?.as_raw(),
			window.window_handle()?.as_raw(),
			None,
		)?;
		log::debug!("created surface for window {:?}", window.id());
		Ok(AshSurface { surface })
	}
}

#[derive(Error)]
pub enum WindowSurfaceError {
	#[error("Vk Error: {0}")]
	Vk(#[from] ash::vk::Result),
	#[error("Window handle is unavailable: {0}")]
	Handle(#[from] HandleError),
}

impl Debug for WindowSurfaceError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		Display::fmt(self, f)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use winit::raw_window_handle::{WaylandDisplayHandle, WebDisplayHandle};

	#[test]
	fn test_required_extensions() -> anyhow::Result<()> {
		let wayland = WaylandDisplayHandle::new(std::ptr::NonNull::dangling());
		let extensions = ash_enumerate_required_extensions(RawDisplayHandle::Wayland(wayland))?;
		assert_eq!(extensions, [surface::NAME, wayland_surface::NAME]);

		assert_eq!(
			ash_enumerate_required_extensions(RawDisplayHandle::Web(WebDisplayHandle::new())),
			Err(ash::vk::Result::ERROR_EXTENSION_NOT_PRESENT)
		);
		Ok(())
	}
}
