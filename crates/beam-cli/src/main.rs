use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use beam_core::{encode_record, PresetBank};
use beam_engine::{ControlCommand, Engine, EngineConfig};
use beam_render::{CpuFrameRenderer, HeadlessBackend, SurfaceKind};
use beam_transform::ImageSampler;
use clap::{Parser, Subcommand};
use crossbeam::channel;
use image::{Rgba, RgbaImage};

mod stats;

use stats::RunStats;

/// Offscreen size for CPU runs when neither a config nor a size is given.
const PREVIEW_SIZE: (u32, u32) = (320, 180);

#[derive(Parser, Debug)]
#[command(name = "spacebeam", version, about = "Real-time kaleidoscope engine, headless")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the engine headless and report how every parameter moved.
    Simulate(SimulateArgs),
    /// Render one still of an image through the transform.
    Render(RenderArgs),
    /// Print the eight preset slots.
    Presets(PresetsArgs),
    /// Print the default engine config as JSON.
    Config,
}

#[derive(Parser, Debug)]
struct SimulateArgs {
    /// Simulated run length.
    #[arg(long, default_value_t = 10.0)]
    seconds: f32,

    /// Ticks per simulated second.
    #[arg(long, default_value_t = 60)]
    fps: u32,

    /// Preset slot (1-8) to crossfade to at the start.
    #[arg(long)]
    preset: Option<usize>,

    /// Engine config JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Source image; a generated test pattern otherwise.
    #[arg(long)]
    source: Option<PathBuf>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    /// Record the run to this file (needs the `video` feature).
    #[arg(long)]
    record: Option<PathBuf>,

    /// Write the last frame as PNG.
    #[arg(long)]
    still: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Source image.
    #[arg(long)]
    input: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    output: PathBuf,

    /// Preset slot (1-8), applied without a crossfade.
    #[arg(long)]
    preset: Option<usize>,

    /// Seconds of motion and modulation to run before the capture.
    #[arg(long, default_value_t = 0.0)]
    time: f32,

    #[arg(long)]
    config: Option<PathBuf>,

    /// Output size; defaults to the input's.
    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,
}

#[derive(Parser, Debug)]
struct PresetsArgs {
    /// Directory of user preset records to merge over the factory slots.
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Print stored records instead of preset codes.
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    match cli.cmd {
        Command::Simulate(args) => cmd_simulate(args),
        Command::Render(args) => cmd_render(args),
        Command::Presets(args) => cmd_presets(args),
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&EngineConfig::default())?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path).with_context(|| format!("load config '{}'", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn load_source(path: &Path) -> anyhow::Result<RgbaImage> {
    let img = image::open(path).with_context(|| format!("open image '{}'", path.display()))?;
    Ok(img.to_rgba8())
}

/// Checkerboard over a colour ramp; asymmetric so folds are visible.
fn test_pattern(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        let check = ((x / 32) + (y / 32)) % 2 == 0;
        let r = (x * 255 / width.max(1)) as u8;
        let g = (y * 255 / height.max(1)) as u8;
        let b = if check { 230 } else { 40 };
        Rgba([r, g, b, 255])
    })
}

fn save_png(img: &RgbaImage, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    img.save(path).with_context(|| format!("write png '{}'", path.display()))?;
    log::info!("Wrote {}", path.display());
    Ok(())
}

fn cmd_simulate(args: SimulateArgs) -> anyhow::Result<()> {
    anyhow::ensure!(args.fps > 0, "fps must be positive");
    let mut cfg = load_config(args.config.as_deref())?;
    if args.config.is_none() {
        (cfg.offscreen_width, cfg.offscreen_height) = PREVIEW_SIZE;
    }
    cfg.offscreen_width = args.width.unwrap_or(cfg.offscreen_width);
    cfg.offscreen_height = args.height.unwrap_or(cfg.offscreen_height);
    let (width, height) = (cfg.offscreen_width, cfg.offscreen_height);

    let source = match &args.source {
        Some(path) => load_source(path)?,
        None => test_pattern(256, 256),
    };
    let mut renderer = CpuFrameRenderer::new(ImageSampler::new(source), width, height);
    let mut backend = HeadlessBackend::new();
    let mut engine: Engine<HeadlessBackend> = Engine::with_default_recorder(cfg)?;

    let handle = engine.handle();
    handle.surface_available(SurfaceKind::Screen, 1, width, height);
    if let Some(slot) = args.preset {
        handle.apply_preset(slot);
    }
    if let Some(path) = &args.record {
        handle.start_recording(path.clone());
    }

    let dt = 1.0 / args.fps as f32;
    let ticks = (args.seconds.max(0.0) * args.fps as f32).round() as u64;
    log::info!("Simulating {ticks} ticks at {width}x{height}");

    let mut stats = RunStats::default();
    let mut skipped = 0usize;
    for _ in 0..ticks {
        let report = engine.tick(dt, &mut renderer, &mut backend);
        stats.observe(&engine.state().resolved);
        skipped += report.fan_out.skipped.len();
        if report.crossfade_landed {
            log::info!("Crossfade landed at frame {}", report.frame);
        }
    }

    if args.record.is_some() {
        let (tx, rx) = channel::bounded(1);
        handle.stop_recording(Box::new(move |path| {
            let _ = tx.send(path);
        }));
        engine.tick(dt, &mut renderer, &mut backend);
        match rx.recv_timeout(Duration::from_secs(1)) {
            Ok(Some(path)) => println!("recorded {}", path.display()),
            _ => match engine.recorder().last_error() {
                Some(e) => log::error!("Recording failed: {e}"),
                None => log::error!("Recording produced no file"),
            },
        }
    }
    engine.shutdown(&mut backend);

    if let Some(path) = &args.still {
        save_png(renderer.frame(), path)?;
    }

    println!("{} ticks, {skipped} surface skips", stats.ticks());
    for line in stats.summary() {
        println!("{line}");
    }
    let bad = stats.out_of_range();
    anyhow::ensure!(bad.is_empty(), "resolved values left [0, 1]: {bad:?}");
    Ok(())
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let source = load_source(&args.input)?;
    let mut cfg = load_config(args.config.as_deref())?;
    cfg.offscreen_width = args.width.unwrap_or(source.width());
    cfg.offscreen_height = args.height.unwrap_or(source.height());
    let (width, height) = (cfg.offscreen_width, cfg.offscreen_height);

    let mut renderer = CpuFrameRenderer::new(ImageSampler::new(source), width, height);
    let mut backend = HeadlessBackend::new();
    let mut engine: Engine<HeadlessBackend> = Engine::with_default_recorder(cfg)?;

    let handle = engine.handle();
    handle.send(ControlCommand::SetTransition(0));
    if let Some(slot) = args.preset {
        anyhow::ensure!(engine.state().bank.get(slot).is_some(), "no preset in slot {slot}");
        handle.apply_preset(slot);
    }

    // Step motion and modulation at 60 Hz up to the requested time.
    let time = args.time.max(0.0);
    let steps = ((time * 60.0).ceil() as u32).max(1);
    let dt = time / steps as f32;
    for _ in 0..steps {
        engine.tick(dt, &mut renderer, &mut backend);
    }
    engine.shutdown(&mut backend);

    save_png(renderer.frame(), &args.output)
}

fn cmd_presets(args: PresetsArgs) -> anyhow::Result<()> {
    let mut bank = PresetBank::factory();
    if let Some(dir) = &args.dir {
        let loaded = bank.load_dir(dir);
        log::info!("{loaded} user presets from {}", dir.display());
    }
    for (slot, preset) in bank.iter() {
        if args.json {
            println!("{slot}: {}", encode_record(preset)?);
        } else {
            println!("{}", preset.preset_code(slot));
        }
    }
    Ok(())
}
