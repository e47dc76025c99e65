use crate::frame::{FrameError, FrameManager};
use crate::platform::PresentPlatform;
use crate::resource::{
	Buffer, BufferUsage, Extent2D, Format, Image, ImageCreateInfo, ImageUsage, MemoryIntent, UsageError,
};

/// Expands tightly packed 8 bit pixels with 1 to 4 channels to RGBA. Grey is replicated into all color channels and
/// missing alpha is opaque.
pub fn expand_to_rgba8(pixels: &[u8], extent: Extent2D, channels: u32) -> Result<Vec<u8>, UsageError> {
	if !(1..=4).contains(&channels) {
		return Err(UsageError::UnsupportedChannelCount(channels));
	}
	let expected = extent.pixels() as usize * channels as usize;
	if pixels.len() != expected {
		return Err(UsageError::PixelDataMismatch {
			actual: pixels.len(),
			expected,
			width: extent.width,
			height: extent.height,
			channels,
		});
	}
	if channels == 4 {
		return Ok(pixels.to_vec());
	}

	let mut rgba = Vec::with_capacity(extent.pixels() as usize * 4);
	for pixel in pixels.chunks_exact(channels as usize) {
		let texel = match *pixel {
			[grey] => [grey, grey, grey, u8::MAX],
			[grey, alpha] => [grey, grey, grey, alpha],
			[r, g, b] => [r, g, b, u8::MAX],
			_ => unreachable!("channels are within 1..=3"),
		};
		rgba.extend_from_slice(&texel);
	}
	Ok(rgba)
}

impl<P: PresentPlatform> FrameManager<P> {
	/// Uploads 8 bit pixel data with 1 to 4 channels into a new sRGB texture, blocking until the upload completed. The
	/// returned image is ready to be registered in the bindless table.
	pub fn create_texture(
		&self,
		pixels: &[u8],
		extent: Extent2D,
		channels: u32,
		name: &str,
	) -> Result<Image<P>, FrameError<P>> {
		profiling::function_scope!();
		let rgba = expand_to_rgba8(pixels, extent, channels)?;
		let staging = Buffer::from_slice(
			self.platform(),
			BufferUsage::TRANSFER_SRC,
			&format!("{} staging", name),
			&rgba,
		)?;
		let mut image = Image::new(
			self.platform(),
			&ImageCreateInfo {
				extent,
				mip_levels: 1,
				format: Format::R8G8B8A8Srgb,
				usage: ImageUsage::SAMPLED | ImageUsage::TRANSFER_DST,
				memory: MemoryIntent::DeviceLocal,
				name,
			},
		)?;

		let mut work = self.begin_one_shot_work()?;
		work.upload_image(&staging, &mut image)?;
		self.end_one_shot_work(work)?;
		log::debug!("uploaded texture {} {}x{}", name, extent.width, extent.height);
		Ok(image)
	}
}
