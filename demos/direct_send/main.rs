//! Direct-send compositing demo
//!
//! Simulates a small process group in a single process with
//! [`MockCommunicator`], renders a horizontal-stripe test pattern split
//! across the ranks, composites it with the direct-send strategy, and saves
//! the display node's result as a PNG.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example direct_send -- --ranks 4 --width 256 --height 256 out.png
//! cargo run --example direct_send -- --config scene.toml out.png
//! ```

use std::path::PathBuf;

use anyhow::{Context as _, Result, bail};
use clap::{Parser, ValueEnum};
use icet_rs::prelude::*;
use image::{ImageBuffer, Rgba, RgbaImage};
use serde::Deserialize;

#[derive(Parser)]
#[command(name = "direct_send")]
#[command(author = "icet-rs project")]
#[command(version = "1.0")]
#[command(about = "Direct-send compositing demo over an in-process mock process group", long_about = None)]
struct Cli {
	/// Output PNG file path
	#[arg(value_name = "OUTPUT")]
	output: PathBuf,

	/// Number of simulated ranks
	#[arg(long, default_value_t = 4)]
	ranks: i32,

	/// Frame width in pixels
	#[arg(long, default_value_t = 256)]
	width: u32,

	/// Frame height in pixels
	#[arg(long, default_value_t = 256)]
	height: u32,

	/// Compositing mode
	#[arg(long, value_enum, default_value_t = ModeArg::ZBuffer)]
	mode: ModeArg,

	/// Optional TOML scene configuration, overriding the flags above
	#[arg(long, value_name = "FILE")]
	config: Option<PathBuf>,

	/// Show per-rank progress
	#[arg(short, long)]
	verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
	/// Nearest-fragment wins by depth
	ZBuffer,
	/// Front-to-back alpha blend, in rank order
	Blend,
}

impl From<ModeArg> for CompositeMode {
	fn from(arg: ModeArg) -> Self {
		match arg {
			ModeArg::ZBuffer => CompositeMode::ZBuffer,
			ModeArg::Blend => CompositeMode::Blend,
		}
	}
}

/// Scene configuration loaded from an optional TOML file via the `config` crate.
#[derive(Debug, Deserialize)]
struct SceneConfig {
	ranks: i32,
	width: u32,
	height: u32,
	mode: String,
}

impl SceneConfig {
	fn mode(&self) -> Result<CompositeMode> {
		match self.mode.as_str() {
			"z_buffer" => Ok(CompositeMode::ZBuffer),
			"blend" => Ok(CompositeMode::Blend),
			other => bail!("unknown composite mode '{other}' in scene config"),
		}
	}
}

fn load_scene(path: &PathBuf) -> Result<SceneConfig> {
	let settings = config::Config::builder()
		.add_source(config::File::from(path.as_path()))
		.build()
		.with_context(|| format!("loading scene config from {}", path.display()))?;
	settings.try_deserialize().context("deserializing scene config")
}

/// Renders one horizontal stripe of the frame per rank: each rank owns the
/// rows `[rank * height/ranks, (rank+1) * height/ranks)` and leaves the rest
/// of the tile at the background/far-depth sentinel, so the composited
/// result is exactly the stacked stripes regardless of composite mode.
struct StripeDraw {
	rank: i32,
	num_ranks: i32,
	mode: CompositeMode,
}

impl DrawCallback for StripeDraw {
	fn draw(
		&self,
		_projection: &Matrix4,
		_modelview: &Matrix4,
		_background: BackgroundColor,
		viewport: Viewport,
		out_image: &mut Image,
	) -> icet_rs::prelude::Result<()> {
		let rows_per_rank = (viewport.height as i32 + self.num_ranks - 1) / self.num_ranks;
		let row_start = (self.rank * rows_per_rank).max(0) as u32;
		let row_end = ((self.rank + 1) * rows_per_rank).clamp(0, viewport.height as i32) as u32;

		let hue = ((self.rank as f32 + 1.0) / (self.num_ranks as f32 + 1.0) * 255.0) as u8;
		let color = [hue, 255 - hue, 128, 255];

		for row in row_start..row_end {
			for col in 0..viewport.width {
				let index = (row * viewport.width + col) as usize;
				out_image.set_color_rgba8(index, color);
				if self.mode == CompositeMode::ZBuffer && out_image.format().has_depth() {
					// Closer ranks sit nearer the camera, so higher ranks never
					// clobber a lower rank's stripe even though every rank
					// contributes to the whole tile.
					let depth = self.rank as f32 / (self.num_ranks as f32 + 1.0);
					out_image.set_depth_bits(index, depth.to_bits());
				}
			}
		}
		Ok(())
	}
}

fn run_frame(num_ranks: i32, width: u32, height: u32, mode: CompositeMode, verbose: bool) -> Result<Image> {
	let color_format = ColorFormat::Rgba8;
	let depth_format = if mode == CompositeMode::ZBuffer {
		DepthFormat::Float
	} else {
		DepthFormat::None
	};

	let comms = MockCommunicator::group(num_ranks);
	let layout = TileLayout::single_all_contribute(width, height, 0, num_ranks);
	let identity = [0.0f32; 16];

	let handles: Vec<_> = comms.iter().map(|comm| create_context(comm).context("creating context")).collect::<Result<_>>()?;
	for (rank, handle) in handles.iter().enumerate() {
		let mut ctx = handle.borrow_mut();
		ctx.state.set(StateName::ColorFormat, StateValue::I32(color_format as i32));
		ctx.state.set(StateName::DepthFormat, StateValue::I32(depth_format as i32));
		ctx.state.set(StateName::CompositeMode, StateValue::I32(mode as i32));
		if verbose {
			println!("rank {rank}: format color={color_format:?} depth={depth_format:?}, mode={mode:?}");
		}
	}

	// `ContextHandle` is `Rc`-backed and therefore not `Send`; every rank runs
	// sequentially on this one thread instead of on real OS threads. Driving
	// the non-display ranks first means the display node's `recv` calls
	// always find already-delivered messages, since the mock communicator
	// delivers synchronously.
	let mut order: Vec<i32> = (1..num_ranks).collect();
	order.push(0);

	let mut displayed = None;
	for rank in order {
		let draw = StripeDraw {
			rank,
			num_ranks,
			mode,
		};
		let mut ctx = handles[rank as usize].borrow_mut();
		if verbose {
			println!("rank {rank}: composing");
		}
		if let Some(image) = compose(&mut ctx, &layout, &draw, &identity, &identity)? {
			displayed = Some(image);
		}
	}

	displayed.context("display node produced no image")
}

fn save_png(image: &Image, output: &PathBuf) -> Result<()> {
	let width = image.width();
	let height = image.height();
	let mut buffer: RgbaImage = ImageBuffer::new(width, height);
	for y in 0..height {
		for x in 0..width {
			let index = (y * width + x) as usize;
			let [r, g, b, a] = image.color_rgba8(index).unwrap_or([0, 0, 0, 0]);
			buffer.put_pixel(x, y, Rgba([r, g, b, a]));
		}
	}
	buffer.save(output).with_context(|| format!("saving PNG to {}", output.display()))
}

fn main() -> Result<()> {
	env_logger::init();
	let cli = Cli::parse();

	let (ranks, width, height, mode) = match &cli.config {
		Some(path) => {
			let scene = load_scene(path)?;
			(scene.ranks, scene.width, scene.height, scene.mode()?)
		}
		None => (cli.ranks, cli.width, cli.height, cli.mode.into()),
	};

	if ranks < 1 {
		bail!("ranks must be at least 1, got {ranks}");
	}

	let image = run_frame(ranks, width, height, mode, cli.verbose)?;
	save_png(&image, &cli.output)?;
	println!("wrote {}x{} frame from {ranks} ranks -> {}", width, height, cli.output.display());
	Ok(())
}
