use bindless_renderer_core::resource::Extent2D;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::window::Window;

#[inline]
pub fn extent_of(size: PhysicalSize<u32>) -> Extent2D {
	Extent2D::new(size.width, size.height)
}

/// The size of the drawable area in pixels. Some platforms report 0x0 while the window is minimized.
pub fn drawable_extent(window: &Window) -> Extent2D {
	extent_of(window.inner_size())
}

/// The new drawable size, if `event` resized the window.
pub fn resized_extent(event: &WindowEvent) -> Option<Extent2D> {
	match event {
		WindowEvent::Resized(size) => Some(extent_of(*size)),
		_ => None,
	}
}
