//! Command-line front end for fami-expansion.
//!
//! - `seq`: normalize sequence text through the matching conversion
//! - `trace`: play a demo note on an N163 voice and dump its register writes
//! - `mul`: run the MMC5 hardware multiplier

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use tracing_subscriber::filter::LevelFilter;

use fami_expansion::channel::effects::{EffectCommand, EffectType};
use fami_expansion::instrument::{SequenceSetting, WaveTable};
use fami_expansion::pattern::{Note, PatternNote};
use fami_expansion::tables::note_name;
use fami_expansion::{
    EngineConfig, Instrument, InstrumentBank, InstrumentType, Mmc5, N163Channel, N163Ram,
    RegisterSink, RegisterTrace, Sequence, SequenceParser, SequenceType, SoundChip,
};

#[derive(Parser)]
#[command(name = "fami-expansion")]
#[command(about = "MMC5 and Namco 163 expansion audio tools")]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse sequence text and print it back normalized
    Seq {
        /// Sequence type
        #[arg(short, long, value_enum, default_value_t = SeqKind::Volume)]
        kind: SeqKind,

        /// Sequence setting
        #[arg(short, long, value_enum, default_value_t = SeqMode::Default)]
        mode: SeqMode,

        /// Instrument family owning the sequence
        #[arg(short, long, value_enum, default_value_t = Family::N163)]
        chip: Family,

        /// Sequence terms
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        text: Vec<String>,
    },

    /// Play a demo note on N163 voice 1 and print the register writes
    Trace {
        /// Engine configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Ticks to run after the note starts
        #[arg(short, long, default_value_t = 4)]
        ticks: usize,

        /// Note index (0-95)
        #[arg(short, long, default_value_t = 57)]
        note: u8,

        /// Effects on the note row, e.g. `Z10` or `047` (repeatable)
        #[arg(short, long)]
        effect: Vec<EffectCommand>,
    },

    /// Multiply two bytes on the MMC5
    Mul {
        /// Operand A
        a: u8,
        /// Operand B
        b: u8,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SeqKind {
    Volume,
    Arpeggio,
    Pitch,
    HiPitch,
    Duty,
}

impl From<SeqKind> for SequenceType {
    fn from(kind: SeqKind) -> Self {
        match kind {
            SeqKind::Volume => SequenceType::Volume,
            SeqKind::Arpeggio => SequenceType::Arpeggio,
            SeqKind::Pitch => SequenceType::Pitch,
            SeqKind::HiPitch => SequenceType::HiPitch,
            SeqKind::Duty => SequenceType::Duty,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SeqMode {
    Default,
    Fixed,
    Relative,
    Scheme,
    Absolute,
}

impl From<SeqMode> for SequenceSetting {
    fn from(mode: SeqMode) -> Self {
        match mode {
            SeqMode::Default => SequenceSetting::Default,
            SeqMode::Fixed => SequenceSetting::Fixed,
            SeqMode::Relative => SequenceSetting::Relative,
            SeqMode::Scheme => SequenceSetting::Scheme,
            SeqMode::Absolute => SequenceSetting::Absolute,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Family {
    Apu,
    Vrc6,
    Fds,
    N163,
    S5b,
}

impl From<Family> for InstrumentType {
    fn from(family: Family) -> Self {
        match family {
            Family::Apu => InstrumentType::Apu,
            Family::Vrc6 => InstrumentType::Vrc6,
            Family::Fds => InstrumentType::Fds,
            Family::N163 => InstrumentType::N163,
            Family::S5b => InstrumentType::S5b,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            LevelFilter::DEBUG
        } else {
            LevelFilter::WARN
        })
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::Seq {
            kind,
            mode,
            chip,
            text,
        } => run_seq(kind.into(), mode.into(), chip.into(), &text.join(" ")),
        Command::Trace {
            config,
            ticks,
            note,
            effect,
        } => run_trace(config, ticks, note, &effect),
        Command::Mul { a, b } => {
            run_mul(a, b);
            Ok(())
        }
    }
}

fn run_seq(
    kind: SequenceType,
    setting: SequenceSetting,
    family: InstrumentType,
    text: &str,
) -> Result<()> {
    let mut parser = SequenceParser::for_sequence(kind, setting, family);
    let mut seq = Sequence::new(setting);
    let report = parser.parse(&mut seq, text);

    println!("{}", parser.print(&seq));
    println!(
        "{} items, loop {}, release {}",
        seq.len(),
        seq.loop_point().map_or("-".to_string(), |p| p.to_string()),
        seq.release_point().map_or("-".to_string(), |p| p.to_string()),
    );
    if !report.skipped.is_empty() {
        eprintln!("skipped: {}", report.skipped.join(" "));
    }
    if report.overflow > 0 {
        eprintln!("dropped {} items past the sequence limit", report.overflow);
    }
    Ok(())
}

/// Sink that records writes and keeps an N163 RAM image in sync
struct Monitor {
    trace: RegisterTrace,
    ram: N163Ram,
}

impl RegisterSink for Monitor {
    fn write_register(&mut self, address: u16, value: u8) {
        self.trace.write_register(address, value);
        self.ram.write(address, value);
    }
}

fn demo_bank() -> InstrumentBank {
    let mut volume = Sequence::default();
    SequenceParser::for_sequence(
        SequenceType::Volume,
        SequenceSetting::Default,
        InstrumentType::N163,
    )
    .parse(&mut volume, "15 14 12 | 10 / 6:1:0");

    let triangle: Vec<u8> = (0..32u8)
        .map(|i| if i < 16 { i } else { 31 - i })
        .collect();
    let square: Vec<u8> = (0..32u8).map(|i| if i < 16 { 15 } else { 0 }).collect();
    let waves = WaveTable::new(32, 2)
        .with_wave(0, &triangle)
        .with_wave(1, &square);

    let mut bank = InstrumentBank::new();
    bank.insert(
        0,
        Instrument::new(InstrumentType::N163, "demo")
            .with_sequence(SequenceType::Volume, volume)
            .with_waves(waves),
    );
    bank
}

fn print_writes(trace: &RegisterTrace) {
    for (address, value) in trace.writes() {
        print!("${address:04X}<-${value:02X} ");
    }
    println!();
}

fn run_trace(
    config: Option<PathBuf>,
    ticks: usize,
    note: u8,
    effects: &[EffectCommand],
) -> Result<()> {
    let config = match config {
        Some(path) => EngineConfig::load(&path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    info!("Engine config: {config:?}");

    let bank = demo_bank();
    let mut channel = N163Channel::new(0);
    channel.configure(&config);

    let mut monitor = Monitor {
        trace: RegisterTrace::new(),
        ram: N163Ram::with_clock(config.cpu_clock()),
    };

    let row = effects
        .iter()
        .fold(PatternNote::note(note, 0), |row, &cmd| row.with_effect(cmd));
    let release = PatternNote {
        note: Note::Release,
        ..PatternNote::blank()
    }
    .with_effect(EffectCommand::new(EffectType::DutyCycle, 1));

    println!("row: {row}");
    channel.play_row(&row, &bank, &mut monitor);
    for tick in 0..ticks {
        if tick == ticks / 2 {
            println!("row: {release}");
            channel.play_row(&release, &bank, &mut monitor);
        }
        monitor.trace.clear();
        channel.process_tick(&mut monitor);
        print!("tick {tick:>3}: ");
        print_writes(&monitor.trace);
        println!(
            "          {} {:.2} Hz, volume {}",
            note_name(note.min(95)),
            monitor.ram.frequency(0),
            monitor.ram.ram()[0x7F] & 0x0F,
        );
    }
    Ok(())
}

fn run_mul(a: u8, b: u8) {
    let mut chip = Mmc5::new();
    chip.write(0x5205, a);
    chip.write(0x5206, b);
    let lo = chip.read(0x5205).unwrap_or(0);
    let hi = chip.read(0x5206).unwrap_or(0);
    println!("{a} * {b} = {} (${hi:02X}{lo:02X})", u16::from_le_bytes([lo, hi]));
}
