//! Headless CLI front-end: wires a disk-backed `BankReader`, a no-op audio
//! sink and an in-memory `HostSurface` to `awvm::Vm` and drives the tic loop.
//!
//! Parses a `Cli` struct with `clap`'s derive API, installs a
//! `tracing_subscriber::fmt` layer, then runs a bounded headless tic loop
//! (`--tics`) instead of a windowed one, since no windowing/audio backend
//! is part of this workspace.

mod bank;

use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use awvm::host::{HostSurface, NullAudioSink, Surface};
use awvm::input::InputState;
use awvm::resource::ResourceReader;
use awvm::video::font::StringTable;
use awvm::{GamePart, VmResult};

use bank::BankReader;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// The game part to start from (0..9)
    #[arg(short, long, value_name = "SCENE", default_value_t = 0)]
    scene: u8,
    /// Directory containing memlist.bin and bankNN files
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    data_dir: PathBuf,
    /// List all resource descriptors and exit
    #[arg(short, long)]
    list_resources: bool,
    /// Run a bounded number of tics headlessly, then exit
    #[arg(short, long, value_name = "N", default_value_t = 60)]
    tics: u32,
}

/// No text assets ship in this workspace; every string id resolves to a
/// placeholder so `DrawString` still exercises the glyph blitter end to end.
struct PlaceholderStrings;

impl StringTable for PlaceholderStrings {
    fn get(&self, _id: u16) -> VmResult<&str> {
        Ok("?")
    }
}

/// Headless `HostSurface`: keeps the most recent frame in memory and logs
/// its delay instead of presenting it to a window.
struct HeadlessHost {
    surface: Surface,
}

impl HeadlessHost {
    fn new() -> Self {
        HeadlessHost {
            surface: Surface::default(),
        }
    }
}

impl HostSurface for HeadlessHost {
    fn prepare_surface(&mut self) -> VmResult<&mut Surface> {
        Ok(&mut self.surface)
    }

    fn surface_ready(&mut self, _surface: &Surface, delay_ms: u32) {
        info!(delay_ms, "frame ready");
    }
}

fn list_resources(reader: &BankReader) {
    for (id, descriptor) in reader.descriptors().iter().enumerate() {
        println!(
            "{id:3} {:?} bank={:02x} offset=0x{:08x} compressed={} uncompressed={}",
            descriptor.res_type,
            descriptor.bank_id,
            descriptor.bank_offset,
            descriptor.compressed_size,
            descriptor.uncompressed_size,
        );
    }
}

fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let reader = BankReader::open(&cli.data_dir)?;

    if cli.list_resources {
        list_resources(&reader);
        return Ok(());
    }

    let start_part = *GamePart::ALL
        .get(cli.scene as usize)
        .ok_or_else(|| anyhow::anyhow!("invalid game part index {}", cli.scene))?;

    let mut vm = awvm::Vm::new(reader.descriptors().len());
    vm.schedule_game_part(start_part);

    let mut audio = NullAudioSink;
    let mut host = HeadlessHost::new();
    let strings = PlaceholderStrings;
    let input = InputState::default();

    for tic in 0..cli.tics {
        vm.run_tic(&reader, &strings, &input, &mut audio, &mut host)?;
        info!(tic, part = ?vm.current_part(), "tic complete");
    }

    Ok(())
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
