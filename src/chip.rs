//! Sound chip abstraction
//!
//! Every expansion chip sits on the CPU bus and is driven the same way by the
//! sequencer: register writes, optional reads, a time slice to run and an
//! end-of-frame marker. Frame-sequencer clocks (envelope and length counter)
//! are forwarded separately so the caller controls their timing.

use std::fmt;

/// Sound chip families known to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChipKind {
    /// Internal 2A03 APU
    Apu,
    /// Konami VRC6
    Vrc6,
    /// Nintendo MMC5
    Mmc5,
    /// Namco 163
    N163,
    /// Sunsoft 5B
    S5b,
}

impl fmt::Display for ChipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChipKind::Apu => "2A03",
            ChipKind::Vrc6 => "VRC6",
            ChipKind::Mmc5 => "MMC5",
            ChipKind::N163 => "N163",
            ChipKind::S5b => "5B",
        };
        f.write_str(name)
    }
}

/// Common interface for bus-attached sound chips
///
/// # Example
///
/// ```
/// use fami_expansion::{Mmc5, SoundChip};
///
/// fn key_on<C: SoundChip>(chip: &mut C) {
///     chip.write(0x5015, 0x01);
///     chip.write(0x5000, 0xBF);
///     chip.write(0x5002, 0xFD);
///     chip.write(0x5003, 0x08);
///     chip.process(1000);
///     chip.end_frame();
/// }
///
/// let mut chip = Mmc5::new();
/// key_on(&mut chip);
/// assert!(chip.frequency(0) > 0.0);
/// ```
pub trait SoundChip {
    /// Chip family
    fn id(&self) -> ChipKind;

    /// Reset the chip to its power-on register state
    fn reset(&mut self);

    /// Write a value to a CPU bus address
    ///
    /// Addresses the chip does not decode are ignored.
    fn write(&mut self, address: u16, value: u8);

    /// Read from a CPU bus address
    ///
    /// Returns `None` when the chip does not claim the address. Callers must
    /// treat that as open bus, not as a zero byte.
    fn read(&mut self, address: u16) -> Option<u8>;

    /// Run the chip for `time` CPU cycles
    fn process(&mut self, time: u32);

    /// Mark the end of the current audio frame
    fn end_frame(&mut self);

    /// Current output frequency of a channel in Hz, 0.0 for unknown channels
    fn frequency(&self, channel: usize) -> f64;

    /// Clock the envelope and length counter units once
    fn clock_sequence(&mut self) {}
}
