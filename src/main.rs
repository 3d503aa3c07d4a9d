use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

use nescycle::cartridge::Cartridge;
use nescycle::config::MachineConfig;
use nescycle::nes::Nes;

/// Cycle-accurate NES emulator
#[derive(Parser, Debug)]
#[command(name = "nescycle", about = "Cycle-accurate NES emulator", long_about = None)]
struct Args {
    /// Path to the iNES ROM file
    #[arg(short, long)]
    rom: PathBuf,

    /// Frames to run; 0 keeps the window open until it is closed
    #[arg(short, long, default_value_t = 600)]
    frames: u64,

    /// Run without a window and print a checksum of the last frame
    #[arg(long)]
    headless: bool,

    /// Battery save file, loaded at start and written back on exit
    #[arg(long)]
    save: Option<PathBuf>,

    /// CPU/PPU clock alignment (0-3)
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..4))]
    alignment: u8,

    /// Window scale factor
    #[arg(long, default_value_t = 3.0)]
    scale: f32,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).context("installing log subscriber")?;

    let rom = fs::read(&args.rom).with_context(|| format!("reading {}", args.rom.display()))?;
    let cartridge =
        Cartridge::from_ines(&rom).with_context(|| format!("parsing {}", args.rom.display()))?;

    let config = MachineConfig {
        alignment: args.alignment,
        ..MachineConfig::default()
    };
    let mut nes = Nes::with_cartridge(config, cartridge);

    if let Some(path) = &args.save {
        load_battery(&mut nes, path)?;
    }

    if args.headless {
        run_headless(&mut nes, args.frames);
    } else {
        run_window(&mut nes, &args)?;
    }

    if let Some(path) = &args.save {
        store_battery(&nes, path)?;
    }
    Ok(())
}

fn load_battery(nes: &mut Nes, path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    let data = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    nes.restore_battery_ram(&data);
    info!(path = %path.display(), bytes = data.len(), "battery RAM loaded");
    Ok(())
}

fn store_battery(nes: &Nes, path: &Path) -> Result<()> {
    match nes.battery_ram() {
        Some(data) => {
            fs::write(path, data).with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "battery RAM saved");
        }
        None => warn!("cartridge has no battery; nothing saved"),
    }
    Ok(())
}

fn run_headless(nes: &mut Nes, frames: u64) {
    for _ in 0..frames {
        nes.step_frame();
    }
    println!(
        "frames={} cpu_cycles={} checksum={:016x}",
        frames,
        nes.clock().cpu_cycles(),
        frame_checksum(nes)
    );
}

/// FNV-1a over the last complete frame
fn frame_checksum(nes: &Nes) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    nes.frame().fold(OFFSET, |hash, (_, _, pixel)| {
        pixel
            .to_le_bytes()
            .iter()
            .fold(hash, |hash, &byte| (hash ^ byte as u64).wrapping_mul(PRIME))
    })
}

#[cfg(feature = "frontend")]
fn run_window(nes: &mut Nes, args: &Args) -> Result<()> {
    let frames = (args.frames > 0).then_some(args.frames);
    let mut event_loop = nescycle::eventloop::EventLoop::new(args.scale).map_err(anyhow::Error::msg)?;
    event_loop.run(nes, frames).map_err(anyhow::Error::msg)
}

#[cfg(not(feature = "frontend"))]
fn run_window(nes: &mut Nes, args: &Args) -> Result<()> {
    warn!("built without the `frontend` feature; running headless");
    run_headless(nes, args.frames);
    Ok(())
}
