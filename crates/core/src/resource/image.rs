use crate::platform::BindlessPlatform;
use crate::resource::{Extent2D, Format, ImageUsage, MemoryIntent, ResourceError, UsageError};
use std::fmt::{Debug, Formatter};
use std::mem::ManuallyDrop;
use std::sync::Arc;

#[derive(Copy, Clone, Debug)]
pub struct ImageCreateInfo<'a> {
	pub extent: Extent2D,
	pub mip_levels: u32,
	pub format: Format,
	pub usage: ImageUsage,
	pub memory: MemoryIntent,
	/// Name of the image, for tracking and debugging purposes
	pub name: &'a str,
}

impl Default for ImageCreateInfo<'_> {
	fn default() -> Self {
		Self {
			extent: Extent2D::new(1, 1),
			mip_levels: 1,
			format: Format::R8G8B8A8Srgb,
			usage: ImageUsage::SAMPLED | ImageUsage::TRANSFER_DST,
			memory: MemoryIntent::Auto,
			name: "",
		}
	}
}

impl ImageCreateInfo<'_> {
	pub fn validate(&self) -> Result<(), UsageError> {
		if self.usage.is_empty() {
			Err(UsageError::NoUsageDeclared {
				name: self.name.to_string(),
			})
		} else if self.extent.is_zero_area() || self.mip_levels == 0 {
			Err(UsageError::ZeroSize {
				name: self.name.to_string(),
			})
		} else if self.memory.resolve_image().is_host_visible() {
			Err(UsageError::HostVisibleImage {
				name: self.name.to_string(),
			})
		} else {
			Ok(())
		}
	}
}

/// The layout an image's memory is currently in, tracked on the host.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum ImageLayout {
	/// Contents are undefined, any transition away from this discards them.
	#[default]
	Undefined,
	TransferDst,
	ShaderReadOnly,
	ColorAttachment,
	DepthAttachment,
	PresentSrc,
}

impl ImageLayout {
	pub fn can_transition_to(self, to: ImageLayout) -> bool {
		use ImageLayout::*;
		matches!(
			(self, to),
			(Undefined, TransferDst)
				| (TransferDst, ShaderReadOnly)
				| (Undefined, ColorAttachment)
				| (ColorAttachment, PresentSrc)
				| (Undefined, DepthAttachment)
		)
	}
}

/// A GPU image exclusively owned by whoever created it, e.g. a texture or a depth target.
pub struct Image<P: BindlessPlatform> {
	platform: Arc<P>,
	image: ManuallyDrop<P::Image>,
	extent: Extent2D,
	mip_levels: u32,
	format: Format,
	usage: ImageUsage,
	layout: ImageLayout,
	name: String,
}

impl<P: BindlessPlatform> Image<P> {
	pub fn new(platform: &Arc<P>, create_info: &ImageCreateInfo) -> Result<Self, ResourceError<P>> {
		create_info.validate()?;
		let create_info = ImageCreateInfo {
			memory: create_info.memory.resolve_image(),
			..*create_info
		};
		let image = unsafe { platform.alloc_image(&create_info) }.map_err(ResourceError::Allocation)?;
		log::debug!(
			"allocated image {} {}x{} {:?}",
			create_info.name,
			create_info.extent.width,
			create_info.extent.height,
			create_info.format
		);
		Ok(Self {
			platform: platform.clone(),
			image: ManuallyDrop::new(image),
			extent: create_info.extent,
			mip_levels: create_info.mip_levels,
			format: create_info.format,
			usage: create_info.usage,
			layout: ImageLayout::Undefined,
			name: create_info.name.to_string(),
		})
	}

	#[inline]
	pub fn extent(&self) -> Extent2D {
		self.extent
	}

	#[inline]
	pub fn mip_levels(&self) -> u32 {
		self.mip_levels
	}

	#[inline]
	pub fn format(&self) -> Format {
		self.format
	}

	#[inline]
	pub fn usage(&self) -> ImageUsage {
		self.usage
	}

	#[inline]
	pub fn layout(&self) -> ImageLayout {
		self.layout
	}

	#[inline]
	pub fn name(&self) -> &str {
		&self.name
	}

	#[inline]
	pub fn platform_image(&self) -> &P::Image {
		&self.image
	}

	/// The view shaders sample through, only present for images with [`ImageUsage::SAMPLED`].
	#[inline]
	pub fn sampled_view(&self) -> Option<P::ImageViewHandle> {
		P::image_sampled_view(&self.image)
	}

	/// Validates and records a layout transition, returning the previous layout. The caller is responsible for
	/// recording the matching barrier.
	pub fn transition(&mut self, to: ImageLayout) -> Result<ImageLayout, UsageError> {
		let from = self.layout;
		if from.can_transition_to(to) {
			self.layout = to;
			Ok(from)
		} else {
			Err(UsageError::UnsupportedLayoutTransition {
				name: self.name.clone(),
				from,
				to,
			})
		}
	}

	/// Declares the current contents as no longer needed, so the next transition starts from
	/// [`ImageLayout::Undefined`]. Used for attachments that are cleared every frame.
	pub fn discard_contents(&mut self) {
		self.layout = ImageLayout::Undefined;
	}

	pub fn destroy(self) {
		drop(self)
	}
}

impl<P: BindlessPlatform> Drop for Image<P> {
	fn drop(&mut self) {
		// Safety: image is never accessed again
		let image = unsafe { ManuallyDrop::take(&mut self.image) };
		unsafe { self.platform.destroy_image(image) }
	}
}

impl<P: BindlessPlatform> Debug for Image<P> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Image")
			.field("name", &self.name)
			.field("extent", &self.extent)
			.field("format", &self.format)
			.field("usage", &self.usage)
			.field("layout", &self.layout)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::platform::dummy::DummyPlatform;

	#[test]
	fn test_sampled_view_requires_sampled_usage() -> anyhow::Result<()> {
		let platform = Arc::new(DummyPlatform::new());
		let sampled = Image::new(&platform, &ImageCreateInfo::default())?;
		assert!(sampled.sampled_view().is_some());

		let attachment = Image::new(
			&platform,
			&ImageCreateInfo {
				usage: ImageUsage::COLOR_ATTACHMENT,
				..ImageCreateInfo::default()
			},
		)?;
		assert!(attachment.sampled_view().is_none());
		Ok(())
	}

	#[test]
	fn test_layout_transitions() -> anyhow::Result<()> {
		let platform = Arc::new(DummyPlatform::new());
		let mut image = Image::new(&platform, &ImageCreateInfo::default())?;
		assert_eq!(image.transition(ImageLayout::TransferDst)?, ImageLayout::Undefined);
		assert_eq!(image.transition(ImageLayout::ShaderReadOnly)?, ImageLayout::TransferDst);

		let err = image.transition(ImageLayout::PresentSrc).unwrap_err();
		assert!(matches!(err, UsageError::UnsupportedLayoutTransition { .. }));
		assert_eq!(image.layout(), ImageLayout::ShaderReadOnly);

		image.discard_contents();
		image.transition(ImageLayout::TransferDst)?;
		Ok(())
	}

	#[test]
	fn test_host_visible_image_rejected() {
		let platform = Arc::new(DummyPlatform::new());
		let result = Image::new(
			&platform,
			&ImageCreateInfo {
				memory: MemoryIntent::HostVisible,
				..ImageCreateInfo::default()
			},
		);
		assert!(matches!(
			result,
			Err(ResourceError::Usage(UsageError::HostVisibleImage { .. }))
		));
	}

	#[test]
	fn test_drop_releases_memory() -> anyhow::Result<()> {
		let platform = Arc::new(DummyPlatform::new());
		let image = Image::new(&platform, &ImageCreateInfo::default())?;
		assert_eq!(platform.stats().live_images, 1);
		image.destroy();
		assert_eq!(platform.stats().live_images, 0);
		Ok(())
	}
}
