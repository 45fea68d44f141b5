//! NES expansion audio: MMC5 and Namco 163
//!
//! Register-level emulation of the MMC5 expansion chip (two pulse voices, the
//! 8×8 hardware multiplier and the ExRAM window) together with the channel
//! logic that drives Namco 163 wavetable voices from tracker instruments.
//!
//! # Features
//! - MMC5 register map with open-bus aware reads
//! - N163 channel state machine: slides under both pitch models, wave
//!   selection, explicit wave-buffer positioning and phase reset
//! - Instrument sequence playback (volume, arpeggio, pitch, hi-pitch, duty)
//! - Double-buffered waveform diffing so unchanged waves are never resent
//! - Sequence ↔ text conversion with per-sequence strategies
//! - Lazily allocated pattern rows feeding the channels
//!
//! # Crate feature flags
//! - `cli` (default): the `fami-expansion` command-line front end
//!
//! # Quick start
//! ## MMC5 multiplier
//! ```
//! use fami_expansion::mmc5::Mmc5;
//! use fami_expansion::chip::SoundChip;
//!
//! let mut chip = Mmc5::new();
//! chip.write(0x5205, 200);
//! chip.write(0x5206, 3);
//! assert_eq!(chip.read(0x5205), Some((600 & 0xFF) as u8));
//! assert_eq!(chip.read(0x5206), Some((600 >> 8) as u8));
//! assert_eq!(chip.read(0x4000), None);
//! ```
//!
//! ## Sequence text
//! ```
//! use fami_expansion::instrument::{Sequence, SequenceType, SequenceSetting, InstrumentType};
//! use fami_expansion::sequence_text::SequenceParser;
//!
//! let mut parser = SequenceParser::for_sequence(
//!     SequenceType::Volume,
//!     SequenceSetting::Default,
//!     InstrumentType::N163,
//! );
//! let mut seq = Sequence::new(SequenceSetting::Default);
//! parser.parse(&mut seq, "15 12 | 8 / 4 0");
//! assert_eq!(parser.print(&seq), "15 12 | 8 / 4 0");
//! ```

#![warn(missing_docs)]

pub mod bus;
pub mod channel;
pub mod chip;
pub mod config;
pub mod instrument;
pub mod mmc5;
pub mod pattern;
pub mod pulse;
pub mod sequence_text;
pub mod tables;

/// Error types for the fallible edges of the crate
///
/// Playback itself never fails: bad register addresses, out-of-budget wave
/// offsets and unparsable sequence tokens are absorbed. Only configuration
/// loading and instrument attachment report errors.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// IO error while reading configuration
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be deserialized
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    /// Configuration deserialized but holds an unusable value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Instrument family cannot be played on the target channel
    #[error("Unsupported instrument {instrument:?} on {channel}")]
    UnsupportedInstrument {
        /// Family of the rejected instrument
        instrument: instrument::InstrumentType,
        /// Channel that rejected it
        channel: channel::ChannelId,
    },
}

/// Result type for fallible operations
pub type Result<T> = std::result::Result<T, Error>;

// Public API exports
pub use bus::{ExpansionBus, N163Ram, RegisterSink, RegisterTrace};
pub use channel::n163::N163Channel;
pub use channel::{ChannelId, ChipKind, PitchModel};
pub use chip::SoundChip;
pub use config::EngineConfig;
pub use instrument::{Instrument, InstrumentBank, InstrumentType, Sequence, SequenceType};
pub use mmc5::Mmc5;
pub use pattern::{PatternData, PatternNote};
pub use sequence_text::SequenceParser;
