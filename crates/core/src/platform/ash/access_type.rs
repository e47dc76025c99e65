use crate::resource::ImageLayout;
use ash::vk::{AccessFlags2, PipelineStageFlags2};

pub struct AshImageAccess {
	pub stage_mask: PipelineStageFlags2,
	pub access_mask: AccessFlags2,
	pub image_layout: ash::vk::ImageLayout,
}

impl AshImageAccess {
	pub const fn new(
		stage_mask: PipelineStageFlags2,
		access_mask: AccessFlags2,
		image_layout: ash::vk::ImageLayout,
	) -> Self {
		Self {
			stage_mask,
			access_mask,
			image_layout,
		}
	}
}

impl ImageLayout {
	pub fn to_ash_image_access(&self) -> AshImageAccess {
		match self {
			ImageLayout::Undefined => AshImageAccess::new(
				PipelineStageFlags2::ALL_COMMANDS,
				AccessFlags2::NONE,
				ash::vk::ImageLayout::UNDEFINED,
			),
			ImageLayout::TransferDst => AshImageAccess::new(
				PipelineStageFlags2::TRANSFER,
				AccessFlags2::TRANSFER_WRITE,
				ash::vk::ImageLayout::TRANSFER_DST_OPTIMAL,
			),
			ImageLayout::ShaderReadOnly => AshImageAccess::new(
				PipelineStageFlags2::ALL_GRAPHICS | PipelineStageFlags2::COMPUTE_SHADER,
				AccessFlags2::SHADER_SAMPLED_READ,
				ash::vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
			),
			ImageLayout::ColorAttachment => AshImageAccess::new(
				PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
				AccessFlags2::COLOR_ATTACHMENT_READ | AccessFlags2::COLOR_ATTACHMENT_WRITE,
				ash::vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
			),
			ImageLayout::DepthAttachment => AshImageAccess::new(
				PipelineStageFlags2::EARLY_FRAGMENT_TESTS | PipelineStageFlags2::LATE_FRAGMENT_TESTS,
				AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ | AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
				ash::vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
			),
			ImageLayout::PresentSrc => AshImageAccess::new(
				PipelineStageFlags2::ALL_COMMANDS,
				AccessFlags2::NONE,
				ash::vk::ImageLayout::PRESENT_SRC_KHR,
			),
		}
	}
}
