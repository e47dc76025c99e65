use crate::args::Args;
use crate::pipeline::{create_demo_pipeline, DemoPipelineCreateInfo};
use crate::scene::DemoScene;
use bindless_renderer_core::frame::{FrameManager, FrameManagerCreateInfo};
use bindless_renderer_core::platform::ash::init::{
	ash_init_single_graphics_queue, AppConfig, AshSingleGraphicsQueueCreateInfo,
};
use bindless_renderer_core::platform::ash::{Ash, AshPipeline};
use bindless_renderer_core::platform::PresentPlatform;
use bindless_renderer_core::surface::SurfaceCreateInfo;
use bindless_renderer_winit::ash::{ash_enumerate_required_extensions, create_ash_surface};
use bindless_renderer_winit::window::{drawable_extent, resized_extent};
use std::sync::Arc;
use std::time::Instant;
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow};
use winit::raw_window_handle::HasDisplayHandle;
use winit::window::{Window, WindowId};

struct Running {
	manager: FrameManager<Ash>,
	scene: DemoScene<Ash>,
	pipeline: Option<AshPipeline>,
	window: Arc<Window>,
	last_frame: Instant,
}

impl Running {
	fn new(args: &Args, event_loop: &ActiveEventLoop) -> anyhow::Result<Self> {
		profiling::function_scope!();
		let window = Arc::new(event_loop.create_window(
			Window::default_attributes().with_title("bindless renderer demo"),
		)?);
		let instance_extensions = ash_enumerate_required_extensions(event_loop.display_handle()?.as_raw())?;
		let ash = Arc::new(Ash::new(ash_init_single_graphics_queue(AshSingleGraphicsQueueCreateInfo {
			app: AppConfig {
				name: c"bindless-renderer-demo",
				version: 1,
			},
			instance_extensions,
			debug: args.debugger.into(),
			..AshSingleGraphicsQueueCreateInfo::default()
		})?)?);

		// the window outlives the surface, as the manager owning it is dropped first
		let surface = unsafe { create_ash_surface(&ash, &window)? };
		let manager = FrameManager::new(
			&ash,
			surface,
			&FrameManagerCreateInfo {
				surface: SurfaceCreateInfo {
					preferred_present_mode: args.present_mode.into(),
					frames_in_flight: args.frames_in_flight,
					..SurfaceCreateInfo::default()
				},
				depth: !args.no_depth,
				..FrameManagerCreateInfo::default()
			},
			drawable_extent(&window),
		)?;
		let scene = DemoScene::new(&manager, args.entities)?;
		if args.shader.is_none() {
			log::warn!("no shader given, frames will only be cleared");
		}

		Ok(Self {
			manager,
			scene,
			pipeline: None,
			window,
			last_frame: Instant::now(),
		})
	}

	fn ensure_pipeline(&mut self, args: &Args) -> anyhow::Result<()> {
		let (Some(shader), None) = (&args.shader, &self.pipeline) else {
			return Ok(());
		};
		// the color format is only known once the surface has been initialized with a nonzero drawable
		let Some(params) = self.manager.surface().params() else {
			return Ok(());
		};
		let create_info = DemoPipelineCreateInfo {
			shader,
			color_format: params.format,
			depth_format: self.manager.depth().map(|depth| depth.format()),
		};
		let platform = self.manager.platform();
		self.pipeline =
			Some(unsafe { create_demo_pipeline(platform, self.manager.table().descriptor_set(), &create_info)? });
		Ok(())
	}

	fn draw_frame(&mut self, args: &Args) -> anyhow::Result<()> {
		profiling::scope!("frame");
		self.ensure_pipeline(args)?;

		let now = Instant::now();
		self.scene.update((now - self.last_frame).as_secs_f32());
		self.last_frame = now;

		let Some(rec) = self.manager.begin_frame()?.recording() else {
			return Ok(());
		};
		let drawn = self.scene.draw(&self.manager, &rec, self.pipeline.as_ref());
		// the frame must be ended even if recording failed
		let ended = self.manager.end_frame(rec);
		drawn?;
		ended?;
		profiling::finish_frame!();
		Ok(())
	}
}

impl Drop for Running {
	fn drop(&mut self) {
		self.scene.release(&self.manager);
		if let Some(pipeline) = self.pipeline.take() {
			let platform = self.manager.platform();
			unsafe {
				if let Err(e) = platform.wait_idle() {
					log::error!("failed to wait for the device to be idle: {}", e);
				}
				pipeline.destroy(platform);
			}
		}
	}
}

pub struct DemoApp {
	args: Args,
	running: Option<Running>,
	error: Option<anyhow::Error>,
}

impl DemoApp {
	pub fn new(args: Args) -> Self {
		Self {
			args,
			running: None,
			error: None,
		}
	}

	/// The error that made the app exit, if any.
	pub fn finish(self) -> anyhow::Result<()> {
		match self.error {
			Some(e) => Err(e),
			None => Ok(()),
		}
	}

	fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
		log::error!("exiting: {:#}", error);
		self.running = None;
		self.error = Some(error);
		event_loop.exit();
	}
}

impl ApplicationHandler for DemoApp {
	fn resumed(&mut self, event_loop: &ActiveEventLoop) {
		if self.running.is_some() {
			return;
		}
		event_loop.set_control_flow(ControlFlow::Poll);
		match Running::new(&self.args, event_loop) {
			Ok(running) => self.running = Some(running),
			Err(e) => self.fail(event_loop, e),
		}
	}

	fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
		let Some(running) = &mut self.running else {
			return;
		};
		if running.window.id() != window_id {
			return;
		}
		if let Some(extent) = resized_extent(&event) {
			running.manager.resize(extent.width, extent.height);
		}
		match event {
			WindowEvent::CloseRequested => {
				log::info!("closing after {} frames", running.manager.frame_counter());
				self.running = None;
				event_loop.exit();
			}
			WindowEvent::RedrawRequested => {
				if let Err(e) = running.draw_frame(&self.args) {
					self.fail(event_loop, e);
				}
			}
			_ => {}
		}
	}

	fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
		if let Some(running) = &self.running {
			running.window.request_redraw();
		}
	}
}
