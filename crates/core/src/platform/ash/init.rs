//! Instance and device creation for a single graphics queue, which is also used for presenting when surface
//! extensions are requested.

use crate::platform::ash::{AshCreateInfo, AshExtensions};
use anyhow::anyhow;
use ash::ext::debug_utils;
use ash::khr::{surface, swapchain};
use ash::prelude::VkResult;
use ash::vk::{
	ApplicationInfo, Bool32, DebugUtilsMessageSeverityFlagsEXT, DebugUtilsMessageTypeFlagsEXT,
	DebugUtilsMessengerCallbackDataEXT, DebugUtilsMessengerCreateInfoEXT, DeviceCreateInfo, DeviceQueueCreateInfo,
	InstanceCreateInfo, PhysicalDevice, PhysicalDeviceFeatures, PhysicalDeviceType, PhysicalDeviceVulkan11Features,
	PhysicalDeviceVulkan12Features, PhysicalDeviceVulkan13Features, PipelineCacheCreateInfo, QueueFlags,
	ShaderStageFlags, ValidationFeatureEnableEXT, ValidationFeaturesEXT, API_VERSION_1_3,
};
use ash::{Device, Entry, Instance};
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use gpu_allocator::{AllocationSizes, AllocatorDebugSettings};
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::borrow::Cow;
use std::ffi::{c_char, c_void, CStr};

pub const LAYER_VALIDATION: &CStr = c"VK_LAYER_KHRONOS_validation";

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Debuggers {
	#[default]
	None,
	/// Allows RenderDoc to attach, which does not support wayland.
	RenderDoc,
	Validation,
	GpuAssistedValidation,
	DebugPrintf,
}

impl Debuggers {
	pub fn validation_enabled(self) -> bool {
		matches!(
			self,
			Debuggers::Validation | Debuggers::GpuAssistedValidation | Debuggers::DebugPrintf
		)
	}

	fn validation_feature(self) -> Option<ValidationFeatureEnableEXT> {
		match self {
			Debuggers::GpuAssistedValidation => Some(ValidationFeatureEnableEXT::GPU_ASSISTED),
			Debuggers::DebugPrintf => Some(ValidationFeatureEnableEXT::DEBUG_PRINTF),
			_ => None,
		}
	}
}

/// The device features required by the bindless table and dynamic rendering.
#[derive(Copy, Clone)]
pub struct DeviceFeatures {
	pub base: PhysicalDeviceFeatures,
	pub vk11: PhysicalDeviceVulkan11Features<'static>,
	pub vk12: PhysicalDeviceVulkan12Features<'static>,
	pub vk13: PhysicalDeviceVulkan13Features<'static>,
}

impl Default for DeviceFeatures {
	fn default() -> Self {
		Self {
			base: PhysicalDeviceFeatures::default()
				.shader_uniform_buffer_array_dynamic_indexing(true)
				.shader_storage_buffer_array_dynamic_indexing(true)
				.shader_sampled_image_array_dynamic_indexing(true)
				.sampler_anisotropy(true),
			vk11: PhysicalDeviceVulkan11Features::default(),
			vk12: PhysicalDeviceVulkan12Features::default()
				.runtime_descriptor_array(true)
				.descriptor_binding_update_unused_while_pending(true)
				.descriptor_binding_partially_bound(true)
				.descriptor_indexing(true)
				.descriptor_binding_uniform_buffer_update_after_bind(true)
				.descriptor_binding_storage_buffer_update_after_bind(true)
				.descriptor_binding_sampled_image_update_after_bind(true)
				.shader_uniform_buffer_array_non_uniform_indexing(true)
				.shader_storage_buffer_array_non_uniform_indexing(true)
				.shader_sampled_image_array_non_uniform_indexing(true),
			vk13: PhysicalDeviceVulkan13Features::default()
				.synchronization2(true)
				.dynamic_rendering(true),
		}
	}
}

pub struct AppConfig<'a> {
	pub name: &'a CStr,
	pub version: u32,
}

impl Default for AppConfig<'_> {
	fn default() -> Self {
		Self {
			name: c"Unknown App",
			version: 0,
		}
	}
}

pub struct AshSingleGraphicsQueueCreateInfo<'a> {
	pub app: AppConfig<'a>,
	/// Stages that may read push constants.
	pub shader_stages: ShaderStageFlags,
	/// Instance extensions required to create surfaces, e.g. from `ash_window::enumerate_required_extensions`. If
	/// `VK_KHR_surface` is among them, only devices supporting `VK_KHR_swapchain` are considered and it is enabled.
	pub instance_extensions: &'a [&'a CStr],
	pub extensions: &'a [&'a CStr],
	pub features: DeviceFeatures,
	pub debug: Debuggers,
	pub debug_callback: Option<&'a DebugUtilsMessengerCreateInfoEXT<'a>>,
}

impl Default for AshSingleGraphicsQueueCreateInfo<'_> {
	fn default() -> Self {
		Self {
			app: Default::default(),
			shader_stages: ShaderStageFlags::ALL_GRAPHICS,
			instance_extensions: &[],
			extensions: &[],
			features: DeviceFeatures::default(),
			debug: Debuggers::default(),
			debug_callback: None,
		}
	}
}

/// Creates an [`AshCreateInfo`] on a Vulkan 1.3 GPU (preferring dedicated) with a single graphics queue.
///
/// If any of the steps were to fail during initialization, this method currently does not clean up after itself
/// correctly. It will only destroy itself correctly if the entire initialization succeeds.
pub fn ash_init_single_graphics_queue(create_info: AshSingleGraphicsQueueCreateInfo) -> anyhow::Result<AshCreateInfo> {
	profiling::function_scope!();
	let AshSingleGraphicsQueueCreateInfo {
		app,
		shader_stages,
		instance_extensions,
		extensions,
		mut features,
		debug,
		debug_callback,
	} = create_info;

	if debug == Debuggers::RenderDoc {
		std::env::remove_var("WAYLAND_DISPLAY");
		std::env::set_var("ENABLE_VULKAN_RENDERDOC_CAPTURE", "1");
	}
	if debug.validation_enabled() {
		// gpu assisted validation complains without these
		features.vk12 = features
			.vk12
			.vulkan_memory_model(true)
			.vulkan_memory_model_device_scope(true);
	}
	let wants_surface = instance_extensions.contains(&surface::NAME);

	unsafe {
		let entry = Entry::load()?;
		let instance = create_instance(&entry, &app, instance_extensions, debug)?;

		let debug_instance = debug_utils::Instance::new(&entry, &instance);
		let debug_messenger = debug_instance
			.create_debug_utils_messenger(debug_callback.unwrap_or(&default_messenger_create_info()), None)?;

		let (physical_device, queue_family_index) = select_physical_device(&instance, wants_surface)?;
		let device_extensions = extensions
			.iter()
			.copied()
			.chain(wants_surface.then_some(swapchain::NAME))
			.map(CStr::as_ptr)
			.collect::<SmallVec<[_; 4]>>();
		let device = create_device(
			&instance,
			physical_device,
			queue_family_index,
			&device_extensions,
			&mut features,
		)?;

		let queue = device.get_device_queue(queue_family_index, 0);
		let memory_allocator = Allocator::new(&AllocatorCreateDesc {
			instance: instance.clone(),
			device: device.clone(),
			physical_device,
			debug_settings: AllocatorDebugSettings::default(),
			buffer_device_address: false,
			allocation_sizes: AllocationSizes::default(),
		})?;
		let cache = device.create_pipeline_cache(&PipelineCacheCreateInfo::default(), None)?;

		let debug_utils = Some(debug_utils::Device::new(&instance, &device));
		let surface = wants_surface.then(|| surface::Instance::new(&entry, &instance));
		let swapchain = wants_surface.then(|| swapchain::Device::new(&instance, &device));

		Ok(AshCreateInfo {
			entry,
			instance,
			physical_device,
			device,
			queue_family_index,
			queue: Mutex::new(queue),
			memory_allocator: Some(Mutex::new(memory_allocator)),
			shader_stages,
			cache: Some(cache),
			extensions: AshExtensions {
				debug_utils,
				surface,
				swapchain,
			},
			destroy: Some(Box::new(move |create_info| {
				let device = &create_info.device;
				create_info.extensions = AshExtensions::default();
				if let Some(cache) = create_info.cache {
					device.destroy_pipeline_cache(cache, None);
				}
				drop(create_info.memory_allocator.take());
				device.destroy_device(None);
				debug_instance.destroy_debug_utils_messenger(debug_messenger, None);
				create_info.instance.destroy_instance(None);
			})),
		})
	}
}

unsafe fn create_instance(
	entry: &Entry,
	app: &AppConfig,
	instance_extensions: &[&CStr],
	debug: Debuggers,
) -> VkResult<Instance> {
	let layers = debug
		.validation_enabled()
		.then_some(LAYER_VALIDATION.as_ptr())
		.into_iter()
		.collect::<SmallVec<[_; 1]>>();
	let validation_features = match debug.validation_feature() {
		Some(feature) => SmallVec::<[_; 2]>::from_slice(&[
			feature,
			ValidationFeatureEnableEXT::GPU_ASSISTED_RESERVE_BINDING_SLOT,
		]),
		None => SmallVec::new(),
	};
	let extensions = instance_extensions
		.iter()
		.copied()
		.chain([debug_utils::NAME])
		.map(CStr::as_ptr)
		.collect::<SmallVec<[_; 4]>>();

	unsafe {
		entry.create_instance(
			&InstanceCreateInfo::default()
				.application_info(
					&ApplicationInfo::default()
						.application_name(app.name)
						.application_version(app.version)
						.engine_name(c"bindless-renderer")
						.engine_version(1)
						.api_version(API_VERSION_1_3),
				)
				.enabled_extension_names(&extensions)
				.enabled_layer_names(&layers)
				.push_next(&mut ValidationFeaturesEXT::default().enabled_validation_features(&validation_features)),
			None,
		)
	}
}

fn device_type_rank(device_type: PhysicalDeviceType) -> u32 {
	match device_type {
		PhysicalDeviceType::DISCRETE_GPU => 1,
		PhysicalDeviceType::VIRTUAL_GPU => 2,
		PhysicalDeviceType::INTEGRATED_GPU => 3,
		PhysicalDeviceType::CPU => 4,
		_ => 5,
	}
}

/// Picks the best ranked device supporting Vulkan 1.3 with a graphics queue, and swapchains if `wants_surface`.
/// Returns the device and the index of its first graphics queue family.
unsafe fn select_physical_device(instance: &Instance, wants_surface: bool) -> anyhow::Result<(PhysicalDevice, u32)> {
	let devices = unsafe { instance.enumerate_physical_devices()? };
	let (_, physical_device, queue_family_index, name) = devices
		.into_iter()
		.filter_map(|physical_device| unsafe {
			let properties = instance.get_physical_device_properties(physical_device);
			let name = properties
				.device_name_as_c_str()
				.map_or(Cow::Borrowed("unknown"), CStr::to_string_lossy)
				.into_owned();
			if properties.api_version < API_VERSION_1_3 {
				log::debug!("skipping {}: does not support Vulkan 1.3", name);
				return None;
			}
			if wants_surface && !supports_extension(instance, physical_device, swapchain::NAME) {
				log::debug!("skipping {}: does not support swapchains", name);
				return None;
			}
			let queue_family_index = instance
				.get_physical_device_queue_family_properties(physical_device)
				.iter()
				.position(|family| family.queue_flags.contains(QueueFlags::GRAPHICS))?;
			Some((
				device_type_rank(properties.device_type),
				physical_device,
				queue_family_index as u32,
				name,
			))
		})
		.min_by_key(|(rank, ..)| *rank)
		.ok_or_else(|| anyhow!("No physical device supports Vulkan 1.3 with a graphics queue"))?;
	log::info!(
		"selected physical device {} with graphics queue family {}",
		name,
		queue_family_index
	);
	Ok((physical_device, queue_family_index))
}

unsafe fn supports_extension(instance: &Instance, physical_device: PhysicalDevice, extension: &CStr) -> bool {
	match unsafe { instance.enumerate_device_extension_properties(physical_device) } {
		Ok(properties) => properties
			.iter()
			.any(|p| p.extension_name_as_c_str().is_ok_and(|name| name == extension)),
		Err(_) => false,
	}
}

unsafe fn create_device(
	instance: &Instance,
	physical_device: PhysicalDevice,
	queue_family_index: u32,
	extensions: &[*const c_char],
	features: &mut DeviceFeatures,
) -> VkResult<Device> {
	unsafe {
		instance.create_device(
			physical_device,
			&DeviceCreateInfo::default()
				.enabled_features(&features.base)
				.enabled_extension_names(extensions)
				.push_next(&mut features.vk11)
				.push_next(&mut features.vk12)
				.push_next(&mut features.vk13)
				.queue_create_infos(&[DeviceQueueCreateInfo::default()
					.queue_family_index(queue_family_index)
					.queue_priorities(&[1.])]),
			None,
		)
	}
}

fn default_messenger_create_info() -> DebugUtilsMessengerCreateInfoEXT<'static> {
	DebugUtilsMessengerCreateInfoEXT::default()
		.message_severity(
			DebugUtilsMessageSeverityFlagsEXT::ERROR
				| DebugUtilsMessageSeverityFlagsEXT::WARNING
				| DebugUtilsMessageSeverityFlagsEXT::INFO,
		)
		.message_type(
			DebugUtilsMessageTypeFlagsEXT::GENERAL
				| DebugUtilsMessageTypeFlagsEXT::VALIDATION
				| DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
		)
		.pfn_user_callback(Some(default_debug_callback))
}

/// All child objects created on device must have been destroyed prior to destroying device
/// https://vulkan.lunarg.com/doc/view/1.3.296.0/linux/1.3-extensions/vkspec.html#VUID-vkDestroyDevice-device-05137
const VUID_VK_DESTROY_DEVICE_DEVICE_05137: i32 = 0x4872eaa0;

const IGNORED_MSG_IDS: &[i32] = &[VUID_VK_DESTROY_DEVICE_DEVICE_05137];

unsafe extern "system" fn default_debug_callback(
	message_severity: DebugUtilsMessageSeverityFlagsEXT,
	message_type: DebugUtilsMessageTypeFlagsEXT,
	callback_data: *const DebugUtilsMessengerCallbackDataEXT<'_>,
	_p_user_data: *mut c_void,
) -> Bool32 {
	let callback_data = unsafe { *callback_data };
	let id = callback_data.message_id_number;
	if IGNORED_MSG_IDS.contains(&id) {
		return false.into();
	}
	let level = if message_severity.contains(DebugUtilsMessageSeverityFlagsEXT::ERROR) {
		log::Level::Error
	} else if message_severity.contains(DebugUtilsMessageSeverityFlagsEXT::WARNING) {
		log::Level::Warn
	} else {
		log::Level::Debug
	};
	if log::log_enabled!(target: "vulkan", level) {
		let (name, message) = unsafe {
			(
				callback_data
					.message_id_name_as_c_str()
					.map_or(Cow::Borrowed(""), CStr::to_string_lossy),
				callback_data
					.message_as_c_str()
					.map_or(Cow::Borrowed("No message"), CStr::to_string_lossy),
			)
		};
		log::log!(target: "vulkan", level, "{:?} [{} ({:#x})]: {}", message_type, name, id, message);
	}
	false.into()
}
