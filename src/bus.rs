//! CPU bus side of the expansion chips
//!
//! Channels never touch chip state directly; they emit `(address, value)`
//! pairs through a [`RegisterSink`]. The sinks here cover the N163's
//! indirect RAM port, a recorder used by tooling and tests, and a bus that
//! forwards writes to every attached chip.

use log::trace;

use crate::chip::{ChipKind, SoundChip};
use crate::mmc5::Mmc5;
use crate::tables::CPU_CLOCK_NTSC;

/// N163 address port (bit 7 enables auto-increment)
pub const N163_ADDRESS_PORT: u16 = 0xF800;
/// N163 data port
pub const N163_DATA_PORT: u16 = 0x4800;
/// N163 internal RAM size in bytes
pub const N163_RAM_SIZE: usize = 0x80;

/// Receiver of register writes
pub trait RegisterSink {
    /// Write a value to a CPU bus address
    fn write_register(&mut self, address: u16, value: u8);
}

impl<S: RegisterSink + ?Sized> RegisterSink for &mut S {
    fn write_register(&mut self, address: u16, value: u8) {
        (**self).write_register(address, value);
    }
}

/// Records every write in order
#[derive(Debug, Clone, Default)]
pub struct RegisterTrace {
    writes: Vec<(u16, u8)>,
}

impl RegisterTrace {
    /// Create an empty trace
    pub fn new() -> Self {
        Self::default()
    }

    /// All writes seen so far
    pub fn writes(&self) -> &[(u16, u8)] {
        &self.writes
    }

    /// Number of writes to a given address
    pub fn count_to(&self, address: u16) -> usize {
        self.writes.iter().filter(|(a, _)| *a == address).count()
    }

    /// Forget recorded writes
    pub fn clear(&mut self) {
        self.writes.clear();
    }

    /// Whether nothing has been written
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

impl RegisterSink for RegisterTrace {
    fn write_register(&mut self, address: u16, value: u8) {
        self.writes.push((address, value));
    }
}

/// Namco 163 internal RAM as seen through its address/data ports
///
/// The top 64 bytes hold the eight voice register blocks (`$40 + 8·n`); the
/// remaining space is shared waveform memory. Audio synthesis is not
/// modelled, but channel frequencies are derived from the register contents.
#[derive(Debug, Clone)]
pub struct N163Ram {
    ram: [u8; N163_RAM_SIZE],
    cursor: u8,
    auto_increment: bool,
    cpu_clock: f64,
}

impl N163Ram {
    /// Create a cleared RAM
    pub fn new() -> Self {
        Self::with_clock(CPU_CLOCK_NTSC)
    }

    /// Create a cleared RAM whose frequency readout uses a custom clock
    pub fn with_clock(cpu_clock: f64) -> Self {
        Self {
            ram: [0; N163_RAM_SIZE],
            cursor: 0,
            auto_increment: false,
            cpu_clock,
        }
    }

    /// Raw RAM contents
    pub fn ram(&self) -> &[u8; N163_RAM_SIZE] {
        &self.ram
    }

    /// Current port cursor
    pub fn cursor(&self) -> u8 {
        self.cursor
    }

    fn advance(&mut self) {
        if self.auto_increment {
            self.cursor = (self.cursor + 1) & 0x7F;
        }
    }

    /// Number of enabled voices from the `$7F` channel-count nibble
    pub fn active_channels(&self) -> usize {
        (((self.ram[0x7F] >> 4) & 0x07) + 1) as usize
    }

    /// Wave length in samples of hardware voice `hw` (0-7)
    pub fn wave_length(&self, hw: usize) -> usize {
        256 - (self.ram[0x40 + hw * 8 + 4] & 0xFC) as usize
    }

    /// 18-bit frequency register of hardware voice `hw`
    pub fn frequency_register(&self, hw: usize) -> u32 {
        let base = 0x40 + hw * 8;
        self.ram[base] as u32
            | (self.ram[base + 2] as u32) << 8
            | ((self.ram[base + 4] & 0x03) as u32) << 16
    }
}

impl Default for N163Ram {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterSink for N163Ram {
    fn write_register(&mut self, address: u16, value: u8) {
        self.write(address, value);
    }
}

impl SoundChip for N163Ram {
    fn id(&self) -> ChipKind {
        ChipKind::N163
    }

    fn reset(&mut self) {
        self.ram = [0; N163_RAM_SIZE];
        self.cursor = 0;
        self.auto_increment = false;
    }

    fn write(&mut self, address: u16, value: u8) {
        match address {
            0xF800..=0xFFFF => {
                self.cursor = value & 0x7F;
                self.auto_increment = value & 0x80 != 0;
            }
            0x4800..=0x4FFF => {
                trace!("N163 RAM ${:02X} = ${value:02X}", self.cursor);
                self.ram[self.cursor as usize] = value;
                self.advance();
            }
            _ => {}
        }
    }

    fn read(&mut self, address: u16) -> Option<u8> {
        match address {
            0x4800..=0x4FFF => {
                let value = self.ram[self.cursor as usize];
                self.advance();
                Some(value)
            }
            _ => None,
        }
    }

    fn process(&mut self, _time: u32) {}

    fn end_frame(&mut self) {}

    /// Channel `n` is the n-th voice from the top of the register area
    fn frequency(&self, channel: usize) -> f64 {
        if channel >= 8 {
            return 0.0;
        }
        let channels = self.active_channels();
        let hw = 7 - channel;
        if hw + channels < 8 {
            return 0.0;
        }
        let reg = self.frequency_register(hw) as f64;
        let length = self.wave_length(hw) as f64;
        self.cpu_clock * reg / (15.0 * 65536.0 * channels as f64 * length)
    }
}

/// Expansion bus with an MMC5 and an N163 attached
///
/// Writes are offered to both chips; each decodes its own addresses. Reads
/// return the first chip that claims the address.
#[derive(Debug, Clone, Default)]
pub struct ExpansionBus {
    /// MMC5 sound hardware
    pub mmc5: Mmc5,
    /// N163 RAM port
    pub n163: N163Ram,
}

impl ExpansionBus {
    /// Create a bus with freshly reset chips
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a bus address, `None` for open bus
    pub fn read(&mut self, address: u16) -> Option<u8> {
        self.mmc5.read(address).or_else(|| self.n163.read(address))
    }

    /// Run both chips for `time` CPU cycles
    pub fn process(&mut self, time: u32) {
        self.mmc5.process(time);
        self.n163.process(time);
    }

    /// Close the audio frame on both chips
    pub fn end_frame(&mut self) {
        self.mmc5.end_frame();
        self.n163.end_frame();
    }
}

impl RegisterSink for ExpansionBus {
    fn write_register(&mut self, address: u16, value: u8) {
        self.mmc5.write(address, value);
        self.n163.write(address, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_n163_port_auto_increment() {
        let mut ram = N163Ram::new();
        ram.write_register(N163_ADDRESS_PORT, 0x80 | 0x10);
        for value in [1, 2, 3] {
            ram.write_register(N163_DATA_PORT, value);
        }
        assert_eq!(&ram.ram()[0x10..0x13], &[1, 2, 3]);
        assert_eq!(ram.cursor(), 0x13);
    }

    #[test]
    fn test_n163_port_without_increment() {
        let mut ram = N163Ram::new();
        ram.write_register(N163_ADDRESS_PORT, 0x7F);
        ram.write_register(N163_DATA_PORT, 0x70);
        ram.write_register(N163_DATA_PORT, 0x30);
        assert_eq!(ram.ram()[0x7F], 0x30);
        assert_eq!(ram.cursor(), 0x7F);
        assert_eq!(ram.active_channels(), 4);
    }

    #[test]
    fn test_n163_cursor_wraps() {
        let mut ram = N163Ram::new();
        ram.write_register(N163_ADDRESS_PORT, 0xFF);
        ram.write_register(N163_DATA_PORT, 0xAA);
        ram.write_register(N163_DATA_PORT, 0xBB);
        assert_eq!(ram.ram()[0x7F], 0xAA);
        assert_eq!(ram.ram()[0x00], 0xBB);
    }

    #[test]
    fn test_n163_read_back() {
        let mut ram = N163Ram::new();
        ram.write_register(N163_ADDRESS_PORT, 0x80);
        ram.write_register(N163_DATA_PORT, 0x12);
        ram.write_register(N163_DATA_PORT, 0x34);
        ram.write_register(N163_ADDRESS_PORT, 0x80);
        assert_eq!(ram.read(N163_DATA_PORT), Some(0x12));
        assert_eq!(ram.read(N163_DATA_PORT), Some(0x34));
        assert_eq!(ram.read(N163_ADDRESS_PORT), None);
    }

    #[test]
    fn test_bus_routes_reads() {
        let mut bus = ExpansionBus::new();
        bus.write_register(0x5C10, 0x42);
        bus.write_register(N163_ADDRESS_PORT, 0x05);
        bus.write_register(N163_DATA_PORT, 0x99);
        assert_eq!(bus.read(0x5C10), Some(0x42));
        bus.write_register(N163_ADDRESS_PORT, 0x05);
        assert_eq!(bus.read(N163_DATA_PORT), Some(0x99));
        assert_eq!(bus.read(0x6000), None);
    }

    #[test]
    fn test_trace_counts() {
        let mut trace = RegisterTrace::new();
        trace.write_register(0x4800, 1);
        trace.write_register(0xF800, 2);
        trace.write_register(0x4800, 3);
        assert_eq!(trace.count_to(0x4800), 2);
        trace.clear();
        assert!(trace.is_empty());
    }
}
