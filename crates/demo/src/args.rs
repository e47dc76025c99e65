use bindless_renderer_core::platform::ash::init::Debuggers;
use bindless_renderer_core::resource::PresentMode;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(about = "Draws a grid of spinning cubes through the bindless table", long_about = None)]
pub struct Args {
	/// Amount of frames the CPU may record ahead of the GPU
	#[arg(long, default_value_t = 2)]
	pub frames_in_flight: u32,

	/// Falls back to fifo if the surface does not support it
	#[arg(long, value_enum, default_value_t = DemoPresentMode::Mailbox)]
	pub present_mode: DemoPresentMode,

	#[arg(long, value_enum, default_value_t = DemoDebugger::None)]
	pub debugger: DemoDebugger,

	/// Render without a depth attachment
	#[arg(long)]
	pub no_depth: bool,

	/// Amount of cubes to spawn
	#[arg(long, default_value_t = 16)]
	pub entities: u32,

	/// SPIR-V module with the entry points `main_vs` and `main_fs`. Without it, frames are only cleared.
	#[arg(long)]
	pub shader: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum DemoPresentMode {
	Immediate,
	Mailbox,
	Fifo,
	FifoRelaxed,
}

impl From<DemoPresentMode> for PresentMode {
	fn from(value: DemoPresentMode) -> Self {
		match value {
			DemoPresentMode::Immediate => PresentMode::Immediate,
			DemoPresentMode::Mailbox => PresentMode::Mailbox,
			DemoPresentMode::Fifo => PresentMode::Fifo,
			DemoPresentMode::FifoRelaxed => PresentMode::FifoRelaxed,
		}
	}
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum DemoDebugger {
	None,
	/// Wayland is disabled, as renderdoc does not support it
	RenderDoc,
	Validation,
	GpuAssistedValidation,
	DebugPrintf,
}

impl From<DemoDebugger> for Debuggers {
	fn from(value: DemoDebugger) -> Self {
		match value {
			DemoDebugger::None => Debuggers::None,
			DemoDebugger::RenderDoc => Debuggers::RenderDoc,
			DemoDebugger::Validation => Debuggers::Validation,
			DemoDebugger::GpuAssistedValidation => Debuggers::GpuAssistedValidation,
			DemoDebugger::DebugPrintf => Debuggers::DebugPrintf,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_args() -> anyhow::Result<()> {
		let args = Args::try_parse_from([
			"demo",
			"--frames-in-flight",
			"3",
			"--present-mode",
			"fifo-relaxed",
			"--debugger",
			"validation",
			"--no-depth",
			"--entities",
			"100",
		])?;
		assert_eq!(args.frames_in_flight, 3);
		assert_eq!(PresentMode::from(args.present_mode), PresentMode::FifoRelaxed);
		assert!(matches!(Debuggers::from(args.debugger), Debuggers::Validation));
		assert!(args.no_depth);
		assert_eq!(args.entities, 100);
		assert_eq!(args.shader, None);

		let defaults = Args::try_parse_from(["demo"])?;
		assert_eq!(defaults.present_mode, DemoPresentMode::Mailbox);
		assert!(!defaults.no_depth);
		Ok(())
	}

	#[test]
	fn test_verify_cli() {
		use clap::CommandFactory;
		Args::command().debug_assert();
	}
}
