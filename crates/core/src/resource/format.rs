use num_enum::{IntoPrimitive, TryFromPrimitive};

/// The subset of pixel formats the renderer creates images, depth targets and swapchains with. Discriminants equal
/// the raw values of `VkFormat`, so the conversion to a backend is a plain cast. Formats reported by a surface that
/// are not listed here are never selected.
#[repr(i32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, TryFromPrimitive, IntoPrimitive)]
pub enum Format {
	R8Unorm = 9,
	R8G8Unorm = 16,
	R8G8B8A8Unorm = 37,
	R8G8B8A8Srgb = 43,
	B8G8R8A8Unorm = 44,
	B8G8R8A8Srgb = 50,
	R16G16B16A16Sfloat = 97,
	R32Sfloat = 100,
	R32G32B32Sfloat = 106,
	R32G32B32A32Sfloat = 109,
	D16Unorm = 124,
	D32Sfloat = 126,
	D24UnormS8Uint = 129,
	D32SfloatS8Uint = 130,
}

impl Format {
	/// Depth formats a [`DepthTarget`] is allowed to pick, in order of preference.
	///
	/// [`DepthTarget`]: crate::resource::DepthTarget
	pub const DEPTH_CANDIDATES: [Format; 3] = [Format::D32Sfloat, Format::D32SfloatS8Uint, Format::D24UnormS8Uint];

	pub fn is_depth(&self) -> bool {
		matches!(
			self,
			Format::D16Unorm | Format::D32Sfloat | Format::D24UnormS8Uint | Format::D32SfloatS8Uint
		)
	}

	pub fn has_stencil(&self) -> bool {
		matches!(self, Format::D24UnormS8Uint | Format::D32SfloatS8Uint)
	}

	pub fn is_srgb(&self) -> bool {
		matches!(self, Format::R8G8B8A8Srgb | Format::B8G8R8A8Srgb)
	}

	pub fn bytes_per_pixel(&self) -> u32 {
		match self {
			Format::R8Unorm => 1,
			Format::R8G8Unorm | Format::D16Unorm => 2,
			Format::R8G8B8A8Unorm
			| Format::R8G8B8A8Srgb
			| Format::B8G8R8A8Unorm
			| Format::B8G8R8A8Srgb
			| Format::R32Sfloat
			| Format::D32Sfloat
			| Format::D24UnormS8Uint => 4,
			Format::D32SfloatS8Uint | Format::R16G16B16A16Sfloat => 8,
			Format::R32G32B32Sfloat => 12,
			Format::R32G32B32A32Sfloat => 16,
		}
	}
}

/// Raw values equal `VkColorSpaceKHR`.
#[repr(i32)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, TryFromPrimitive, IntoPrimitive)]
pub enum ColorSpace {
	#[default]
	SrgbNonlinear = 0,
	DisplayP3Nonlinear = 1000104001,
	ExtendedSrgbLinear = 1000104002,
}

/// Raw values equal `VkPresentModeKHR`.
#[repr(i32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, TryFromPrimitive, IntoPrimitive)]
pub enum PresentMode {
	/// Presents immediately, may tear.
	Immediate = 0,
	/// Low latency without tearing, replaces the queued image instead of blocking.
	Mailbox = 1,
	/// Vsync, the only mode every platform must support.
	Fifo = 2,
	FifoRelaxed = 3,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Extent2D {
	pub width: u32,
	pub height: u32,
}

impl Extent2D {
	pub const fn new(width: u32, height: u32) -> Self {
		Self { width, height }
	}

	/// A minimized window reports a drawable area of zero, which no swapchain can be created for.
	pub fn is_zero_area(&self) -> bool {
		self.width == 0 || self.height == 0
	}

	pub fn clamp(self, min: Extent2D, max: Extent2D) -> Self {
		Self {
			width: self.width.clamp(min.width, max.width.max(min.width)),
			height: self.height.clamp(min.height, max.height.max(min.height)),
		}
	}

	pub fn pixels(&self) -> u64 {
		self.width as u64 * self.height as u64
	}
}

impl From<[u32; 2]> for Extent2D {
	fn from(value: [u32; 2]) -> Self {
		Self::new(value[0], value[1])
	}
}

impl From<Extent2D> for [u32; 2] {
	fn from(value: Extent2D) -> Self {
		[value.width, value.height]
	}
}
