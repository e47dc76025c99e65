use crate::platform::BindlessPlatform;
use crate::resource::{Extent2D, Format, Image, ImageCreateInfo, ImageUsage, MemoryIntent, ResourceError};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("None of the depth formats D32_SFLOAT, D32_SFLOAT_S8_UINT or D24_UNORM_S8_UINT are supported")]
pub struct NoDepthFormatError;

/// A size-dependent depth attachment, rebuilt whenever the presentation surface is recreated.
#[derive(Debug)]
pub struct DepthTarget<P: BindlessPlatform> {
	image: Image<P>,
}

impl<P: BindlessPlatform> DepthTarget<P> {
	/// Picks the first of [`Format::DEPTH_CANDIDATES`] the platform supports.
	pub fn select_format(platform: &P) -> Result<Format, NoDepthFormatError> {
		Format::DEPTH_CANDIDATES
			.into_iter()
			.find(|format| platform.supports_depth_format(*format))
			.ok_or(NoDepthFormatError)
	}

	pub fn new(platform: &Arc<P>, format: Format, extent: Extent2D) -> Result<Self, ResourceError<P>> {
		Ok(Self {
			image: Self::create_image(platform, format, extent)?,
		})
	}

	fn create_image(platform: &Arc<P>, format: Format, extent: Extent2D) -> Result<Image<P>, ResourceError<P>> {
		Image::new(
			platform,
			&ImageCreateInfo {
				extent,
				mip_levels: 1,
				format,
				usage: ImageUsage::DEPTH_STENCIL_ATTACHMENT,
				memory: MemoryIntent::DeviceLocal,
				name: "depth target",
			},
		)
	}

	/// Replaces the depth image with one of `extent`, keeping the format. The caller must ensure the device is idle.
	pub fn resize(&mut self, platform: &Arc<P>, extent: Extent2D) -> Result<(), ResourceError<P>> {
		if self.image.extent() != extent {
			self.image = Self::create_image(platform, self.image.format(), extent)?;
		}
		Ok(())
	}

	#[inline]
	pub fn format(&self) -> Format {
		self.image.format()
	}

	#[inline]
	pub fn has_stencil(&self) -> bool {
		self.image.format().has_stencil()
	}

	#[inline]
	pub fn extent(&self) -> Extent2D {
		self.image.extent()
	}

	#[inline]
	pub fn image(&self) -> &Image<P> {
		&self.image
	}

	#[inline]
	pub fn image_mut(&mut self) -> &mut Image<P> {
		&mut self.image
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::platform::dummy::DummyPlatform;

	#[test]
	fn test_select_prefers_first_supported() -> anyhow::Result<()> {
		let platform = DummyPlatform::new();
		assert_eq!(DepthTarget::select_format(&platform)?, Format::D32Sfloat);

		let platform = DummyPlatform::new().with_depth_formats(&[Format::D24UnormS8Uint]);
		assert_eq!(DepthTarget::select_format(&platform)?, Format::D24UnormS8Uint);

		let platform = DummyPlatform::new().with_depth_formats(&[]);
		assert!(DepthTarget::select_format(&platform).is_err());
		Ok(())
	}

	#[test]
	fn test_resize_keeps_format() -> anyhow::Result<()> {
		let platform = Arc::new(DummyPlatform::new());
		let mut depth = DepthTarget::new(&platform, Format::D32SfloatS8Uint, Extent2D::new(800, 600))?;
		assert!(depth.has_stencil());
		depth.resize(&platform, Extent2D::new(1024, 768))?;
		assert_eq!(depth.extent(), Extent2D::new(1024, 768));
		assert_eq!(depth.format(), Format::D32SfloatS8Uint);
		assert_eq!(platform.stats().live_images, 1);
		Ok(())
	}
}
