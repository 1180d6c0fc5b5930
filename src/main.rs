use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use arduous::config::{
    Timing, ATMEGA32U4_RAM_END, DEFAULT_CLOCK_HZ, DEFAULT_FRAME_RATE, DEFAULT_SAMPLE_RATE,
};
use arduous::firmware::Firmware;
use arduous::snapshot;
use arduous::video;
use arduous::{SCREEN_HEIGHT, SCREEN_WIDTH};

#[derive(Parser, Debug)]
#[command(name = "arduous", about = "Inspect Arduboy firmware images and save states.")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load an Intel HEX image and show how it maps to flash and frames.
    Firmware {
        path: PathBuf,

        #[arg(long, default_value_t = DEFAULT_CLOCK_HZ)]
        clock_hz: u32,

        #[arg(long, default_value_t = DEFAULT_FRAME_RATE)]
        frame_rate: u32,

        #[arg(long, default_value_t = DEFAULT_SAMPLE_RATE)]
        sample_rate: u32,
    },
    /// Work with save state files.
    Snapshot {
        #[command(subcommand)]
        command: SnapshotCommand,
    },
}

#[derive(Subcommand, Debug)]
enum SnapshotCommand {
    /// Print the CPU and display registers held in a save state.
    Info {
        path: PathBuf,

        /// Last data space address of the machine that wrote the snapshot.
        #[arg(long, default_value_t = ATMEGA32U4_RAM_END, value_parser = parse_address)]
        ram_end: u16,
    },
    /// Write the screen content of a save state as a PNG image.
    Render {
        path: PathBuf,

        #[arg(short, long, value_name = "PNG")]
        output: PathBuf,

        #[arg(long, default_value_t = 4)]
        scale: usize,

        #[arg(long, default_value_t = ATMEGA32U4_RAM_END, value_parser = parse_address)]
        ram_end: u16,
    },
}

fn main() -> Result<()> {
    env_logger::builder()
        .parse_filters("arduous=info")
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Firmware {
            path,
            clock_hz,
            frame_rate,
            sample_rate,
        } => show_firmware(&path, Timing::new(clock_hz, frame_rate, sample_rate)?),
        Command::Snapshot { command } => match command {
            SnapshotCommand::Info { path, ram_end } => show_snapshot(&path, ram_end),
            SnapshotCommand::Render {
                path,
                output,
                scale,
                ram_end,
            } => render_snapshot(&path, &output, scale, ram_end),
        },
    }
}

fn parse_address(s: &str) -> Result<u16, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid address {}: {}", s, e))
}

fn show_firmware(path: &Path, timing: Timing) -> Result<()> {
    let firmware = Firmware::load(path)?;

    println!("base:  0x{:05x}", firmware.base());
    println!("size:  {} bytes", firmware.len());
    println!("end:   0x{:05x}", firmware.end());
    println!(
        "frame: {} cycles, {} samples of {} cycles",
        timing.cycles_per_frame(),
        timing.samples_per_frame(),
        timing.cycles_per_sample()
    );
    Ok(())
}

fn read_snapshot(
    path: &Path,
    ram_end: u16,
) -> Result<(arduous::machine::MachineState, arduous::display::DisplayState)> {
    let buf = std::fs::read(path).with_context(|| format!("Unable to read {}", path.display()))?;
    let expected = snapshot::snapshot_size(ram_end as usize + 1);
    if buf.len() != expected {
        info!(
            "{} is {} bytes, a snapshot with RAMEND=0x{:04x} is {} bytes",
            path.display(),
            buf.len(),
            ram_end,
            expected
        );
    }

    snapshot::decode(&buf, ram_end)
        .with_context(|| format!("Unable to decode snapshot {}", path.display()))
}

fn show_snapshot(path: &Path, ram_end: u16) -> Result<()> {
    let (machine, display) = read_snapshot(path, ram_end)?;

    println!("CPU");
    println!("  state:     {:?}", machine.state);
    println!("  cycle:     {}", machine.cycle);
    println!("  PC:        0x{:05x} (reset 0x{:05x})", machine.pc, machine.reset_pc);
    println!("  SREG:      {:?}", machine.status());
    println!("  interrupt: {}", machine.interrupt_state);
    println!(
        "  run:       {} / {} cycles",
        machine.run_cycle_count, machine.run_cycle_limit
    );
    println!("Display");
    println!(
        "  cursor:    page {} column {}",
        display.cursor.page, display.cursor.column
    );
    println!("  flags:     {:?}", display.flags());
    println!("  mode:      {:?}", display.addr_mode);
    println!("  contrast:  0x{:02x}", display.contrast_register);
    println!("  command:   0x{:02x}", display.command_register);
    println!(
        "  pixels on: {}",
        video::extract_frame(&display).count_ones()
    );
    Ok(())
}

fn render_snapshot(path: &Path, output: &Path, scale: usize, ram_end: u16) -> Result<()> {
    anyhow::ensure!(scale > 0, "scale must be at least 1");
    let (_, display) = read_snapshot(path, ram_end)?;
    let frame = video::extract_frame(&display);
    let luma = video::to_luma(&frame, scale);

    let file = File::create(output)
        .with_context(|| format!("Unable to create {}", output.display()))?;
    let mut encoder = png::Encoder::new(
        BufWriter::new(file),
        (SCREEN_WIDTH * scale) as u32,
        (SCREEN_HEIGHT * scale) as u32,
    );
    encoder.set_color(png::ColorType::Grayscale);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer
        .write_image_data(&luma)
        .with_context(|| format!("Unable to write {}", output.display()))?;

    info!("Wrote {}x scaled frame to {}", scale, output.display());
    Ok(())
}
