//! The demo's only pipeline. Shaders are loaded from a SPIR-V module with two entry points:
//! * `main_vs` pulls its vertices from the storage buffer at the index in [`PushConstants::slot`] and transforms them
//!   by [`PushConstants::transform`]
//! * `main_fs` samples the texture whose index it reads from the [`SceneGlobals`] in uniform buffer 0
//!
//! [`PushConstants::slot`]: bindless_renderer_core::frame::PushConstants
//! [`PushConstants::transform`]: bindless_renderer_core::frame::PushConstants
//! [`SceneGlobals`]: crate::scene::SceneGlobals

use ash::prelude::VkResult;
use ash::vk::{
	ColorComponentFlags, CompareOp, CullModeFlags, DynamicState, Extent2D, FrontFace, GraphicsPipelineCreateInfo,
	Offset2D, PipelineBindPoint, PipelineCache, PipelineColorBlendAttachmentState, PipelineColorBlendStateCreateInfo,
	PipelineDepthStencilStateCreateInfo, PipelineDynamicStateCreateInfo, PipelineInputAssemblyStateCreateInfo,
	PipelineMultisampleStateCreateInfo, PipelineRasterizationStateCreateInfo, PipelineRenderingCreateInfo,
	PipelineShaderStageCreateInfo, PipelineVertexInputStateCreateInfo, PipelineViewportStateCreateInfo, PolygonMode,
	PrimitiveTopology, Rect2D, SampleCountFlags, ShaderModule, ShaderModuleCreateInfo, ShaderStageFlags, Viewport,
};
use bindless_renderer_core::platform::ash::{Ash, AshBindlessDescriptorSet, AshPipeline};
use bindless_renderer_core::resource::Format;
use std::fs::File;
use std::path::Path;

pub struct DemoPipelineCreateInfo<'a> {
	pub shader: &'a Path,
	pub color_format: Format,
	pub depth_format: Option<Format>,
}

/// # Safety
/// The returned pipeline must be destroyed with [`AshPipeline::destroy`] once the GPU no longer uses it.
pub unsafe fn create_demo_pipeline(
	ash: &Ash,
	set: &AshBindlessDescriptorSet,
	create_info: &DemoPipelineCreateInfo,
) -> anyhow::Result<AshPipeline> {
	profiling::function_scope!();
	let code = ash::util::read_spv(&mut File::open(create_info.shader)?)?;
	unsafe {
		let module = ash
			.device
			.create_shader_module(&ShaderModuleCreateInfo::default().code(&code), None)?;
		let pipeline = create_graphics_pipeline(ash, set, module, create_info);
		ash.device.destroy_shader_module(module, None);
		let pipeline = pipeline?;
		ash.set_debug_object_name(pipeline.pipeline, "demo pipeline")?;
		log::info!("created pipeline from {}", create_info.shader.display());
		Ok(pipeline)
	}
}

unsafe fn create_graphics_pipeline(
	ash: &Ash,
	set: &AshBindlessDescriptorSet,
	module: ShaderModule,
	create_info: &DemoPipelineCreateInfo,
) -> VkResult<AshPipeline> {
	let stages = [
		PipelineShaderStageCreateInfo::default()
			.stage(ShaderStageFlags::VERTEX)
			.module(module)
			.name(c"main_vs"),
		PipelineShaderStageCreateInfo::default()
			.stage(ShaderStageFlags::FRAGMENT)
			.module(module)
			.name(c"main_fs"),
	];
	let color_formats = [create_info.color_format.to_ash_format()];
	let depth_format = create_info.depth_format.map(|f| f.to_ash_format()).unwrap_or_default();
	let depth_test = create_info.depth_format.is_some();
	let blend_attachments = [PipelineColorBlendAttachmentState::default().color_write_mask(ColorComponentFlags::RGBA)];

	unsafe {
		let pipelines = ash
			.device
			.create_graphics_pipelines(
				ash.cache.unwrap_or(PipelineCache::null()),
				&[GraphicsPipelineCreateInfo::default()
					.layout(set.pipeline_layout)
					.stages(&stages)
					.vertex_input_state(&PipelineVertexInputStateCreateInfo::default())
					.input_assembly_state(
						&PipelineInputAssemblyStateCreateInfo::default().topology(PrimitiveTopology::TRIANGLE_LIST),
					)
					.viewport_state(
						&PipelineViewportStateCreateInfo::default()
							.viewports(&[Viewport::default()])
							.scissors(&[Rect2D {
								offset: Offset2D { x: 0, y: 0 },
								extent: Extent2D {
									width: i32::MAX as u32,
									height: i32::MAX as u32,
								},
							}]),
					)
					.rasterization_state(
						&PipelineRasterizationStateCreateInfo::default()
							.polygon_mode(PolygonMode::FILL)
							.cull_mode(CullModeFlags::BACK)
							.front_face(FrontFace::COUNTER_CLOCKWISE)
							.line_width(1.0),
					)
					.multisample_state(
						&PipelineMultisampleStateCreateInfo::default().rasterization_samples(SampleCountFlags::TYPE_1),
					)
					.depth_stencil_state(
						&PipelineDepthStencilStateCreateInfo::default()
							.depth_test_enable(depth_test)
							.depth_write_enable(depth_test)
							.depth_compare_op(CompareOp::LESS),
					)
					.color_blend_state(&PipelineColorBlendStateCreateInfo::default().attachments(&blend_attachments))
					.dynamic_state(
						&PipelineDynamicStateCreateInfo::default()
							.dynamic_states(&[DynamicState::VIEWPORT, DynamicState::SCISSOR]),
					)
					.push_next(
						&mut PipelineRenderingCreateInfo::default()
							.color_attachment_formats(&color_formats)
							.depth_attachment_format(depth_format),
					)],
				None,
			)
			// as we only create one pipeline, there is nothing to clean up on failure
			.map_err(|e| e.1)?;
		Ok(AshPipeline::from_raw(pipelines[0], PipelineBindPoint::GRAPHICS))
	}
}
