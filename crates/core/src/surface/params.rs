use crate::resource::{ColorSpace, Extent2D, Format, PresentMode};

/// What a surface supports, as reported by the platform.
#[derive(Clone, Debug)]
pub struct SurfaceCapabilities {
	/// Supported format and color space pairs, in the order the platform reported them
	pub formats: Vec<(Format, ColorSpace)>,
	pub present_modes: Vec<PresentMode>,
	pub min_image_count: u32,
	/// 0 means there is no upper bound
	pub max_image_count: u32,
	/// Some platforms dictate the extent, others leave it to the application within `min_extent..=max_extent`.
	pub current_extent: Option<Extent2D>,
	pub min_extent: Extent2D,
	pub max_extent: Extent2D,
}

#[derive(Copy, Clone, Debug)]
pub struct SurfaceCreateInfo {
	pub preferred_format: Format,
	pub preferred_color_space: ColorSpace,
	pub preferred_present_mode: PresentMode,
	/// Must be supported by every surface, so [`PresentMode::Fifo`] unless you know better.
	pub fallback_present_mode: PresentMode,
	/// Amount of frame slots with their own synchronization primitives
	pub frames_in_flight: u32,
}

impl Default for SurfaceCreateInfo {
	fn default() -> Self {
		Self {
			preferred_format: Format::B8G8R8A8Unorm,
			preferred_color_space: ColorSpace::SrgbNonlinear,
			preferred_present_mode: PresentMode::Mailbox,
			fallback_present_mode: PresentMode::Fifo,
			frames_in_flight: 2,
		}
	}
}

/// The parameters a swapchain was created with. Image count, format and extent stay fixed until the next recreation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SurfaceParams {
	pub format: Format,
	pub color_space: ColorSpace,
	pub present_mode: PresentMode,
	pub image_count: u32,
	pub extent: Extent2D,
}

impl SurfaceParams {
	/// Picks the preferred format if supported, otherwise the first one reported. Picks the preferred present mode
	/// if supported, otherwise the fallback. Requests one image more than the minimum, bounded by the maximum.
	pub fn select(
		capabilities: &SurfaceCapabilities,
		create_info: &SurfaceCreateInfo,
		drawable: Extent2D,
	) -> Option<Self> {
		let preferred = (create_info.preferred_format, create_info.preferred_color_space);
		let (format, color_space) = capabilities
			.formats
			.iter()
			.copied()
			.find(|f| *f == preferred)
			.or_else(|| capabilities.formats.first().copied())?;

		let present_mode = if capabilities.present_modes.contains(&create_info.preferred_present_mode) {
			create_info.preferred_present_mode
		} else {
			create_info.fallback_present_mode
		};

		let mut image_count = capabilities.min_image_count + 1;
		if capabilities.max_image_count != 0 {
			image_count = image_count.min(capabilities.max_image_count);
		}

		Some(Self {
			format,
			color_space,
			present_mode,
			image_count,
			extent: Self::select_extent(capabilities, drawable),
		})
	}

	/// The platform's current extent if it dictates one, otherwise the drawable area clamped to the supported range.
	pub fn select_extent(capabilities: &SurfaceCapabilities, drawable: Extent2D) -> Extent2D {
		capabilities
			.current_extent
			.unwrap_or_else(|| drawable.clamp(capabilities.min_extent, capabilities.max_extent))
	}

	/// Same parameters at another extent, used on recreation.
	pub fn with_extent(self, extent: Extent2D) -> Self {
		Self { extent, ..self }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn capabilities() -> SurfaceCapabilities {
		SurfaceCapabilities {
			formats: vec![
				(Format::R8G8B8A8Srgb, ColorSpace::SrgbNonlinear),
				(Format::B8G8R8A8Unorm, ColorSpace::SrgbNonlinear),
			],
			present_modes: vec![PresentMode::Fifo, PresentMode::Mailbox],
			min_image_count: 2,
			max_image_count: 8,
			current_extent: None,
			min_extent: Extent2D::new(1, 1),
			max_extent: Extent2D::new(4096, 4096),
		}
	}

	#[test]
	fn test_select_preferred() -> anyhow::Result<()> {
		let params = SurfaceParams::select(&capabilities(), &SurfaceCreateInfo::default(), Extent2D::new(800, 600))
			.ok_or_else(|| anyhow::anyhow!("no params"))?;
		assert_eq!(params.format, Format::B8G8R8A8Unorm);
		assert_eq!(params.present_mode, PresentMode::Mailbox);
		assert_eq!(params.image_count, 3);
		assert_eq!(params.extent, Extent2D::new(800, 600));
		Ok(())
	}

	#[test]
	fn test_select_fallbacks() -> anyhow::Result<()> {
		let caps = SurfaceCapabilities {
			formats: vec![(Format::R8G8B8A8Srgb, ColorSpace::SrgbNonlinear)],
			present_modes: vec![PresentMode::Fifo],
			max_image_count: 2,
			..capabilities()
		};
		let params = SurfaceParams::select(&caps, &SurfaceCreateInfo::default(), Extent2D::new(9000, 10))
			.ok_or_else(|| anyhow::anyhow!("no params"))?;
		assert_eq!(params.format, Format::R8G8B8A8Srgb);
		assert_eq!(params.present_mode, PresentMode::Fifo);
		assert_eq!(params.image_count, 2);
		assert_eq!(params.extent, Extent2D::new(4096, 10));
		Ok(())
	}

	#[test]
	fn test_current_extent_wins() {
		let caps = SurfaceCapabilities {
			current_extent: Some(Extent2D::new(1920, 1080)),
			..capabilities()
		};
		assert_eq!(
			SurfaceParams::select_extent(&caps, Extent2D::new(800, 600)),
			Extent2D::new(1920, 1080)
		);
	}

	#[test]
	fn test_no_formats() {
		let caps = SurfaceCapabilities {
			formats: Vec::new(),
			..capabilities()
		};
		assert!(SurfaceParams::select(&caps, &SurfaceCreateInfo::default(), Extent2D::new(1, 1)).is_none());
	}
}
