use crate::app::DemoApp;
use crate::args::Args;
use clap::Parser;
use winit::event_loop::EventLoop;

mod app;
mod args;
mod pipeline;
mod scene;

fn main() -> anyhow::Result<()> {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
	let args = Args::parse();
	log::debug!("{:?}", args);

	let event_loop = EventLoop::new()?;
	let mut app = DemoApp::new(args);
	event_loop.run_app(&mut app)?;
	app.finish()
}
