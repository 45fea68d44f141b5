//! MMC5 expansion audio
//!
//! Two pulse voices, a write-only 8×8 unsigned multiplier whose product is
//! read back from the operand addresses, and the 1 KiB ExRAM window.
//!
//! | Address         | Write                         | Read                 |
//! |-----------------|-------------------------------|----------------------|
//! | `$5000-$5003`   | pulse 1 (`$5001` unused)      | open bus             |
//! | `$5004-$5007`   | pulse 2 (`$5005` unused)      | open bus             |
//! | `$5015`         | bit 0/1 enable pulse 1/2      | open bus             |
//! | `$5205`/`$5206` | multiplier operand A/B        | product low/high     |
//! | `$5C00-$5FF5`   | ExRAM                         | ExRAM                |

use bitflags::bitflags;
use log::trace;

use crate::chip::{ChipKind, SoundChip};
use crate::pulse::{AmplitudeEdge, PulseVoice};

/// First ExRAM address
pub const EXRAM_START: u16 = 0x5C00;
/// Last ExRAM address decoded by the audio side
pub const EXRAM_END: u16 = 0x5FF5;
/// ExRAM size in bytes
pub const EXRAM_SIZE: usize = 0x400;

const CONTROL: u16 = 0x5015;
const MUL_A: u16 = 0x5205;
const MUL_B: u16 = 0x5206;

/// Value forced into register 1 of each voice on reset
const RESET_DUTY_REGISTER: u8 = 0x08;

bitflags! {
    /// `$5015` channel enable register
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Mmc5Control: u8 {
        /// Pulse 1 enable
        const PULSE1 = 0x01;
        /// Pulse 2 enable
        const PULSE2 = 0x02;
    }
}

/// Write-side register log for the audio ranges
#[derive(Debug, Clone, Default)]
struct RegisterLog {
    pulse: [Option<u8>; 8],
    control: Option<u8>,
}

impl RegisterLog {
    fn record(&mut self, address: u16, value: u8) {
        match address {
            0x5000..=0x5007 => self.pulse[(address - 0x5000) as usize] = Some(value),
            CONTROL => self.control = Some(value),
            _ => {}
        }
    }

    fn get(&self, address: u16) -> Option<u8> {
        match address {
            0x5000..=0x5007 => self.pulse[(address - 0x5000) as usize],
            CONTROL => self.control,
            _ => None,
        }
    }
}

/// MMC5 sound hardware
#[derive(Debug, Clone)]
pub struct Mmc5 {
    square1: PulseVoice,
    square2: PulseVoice,
    mul_a: u8,
    mul_b: u8,
    exram: Box<[u8; EXRAM_SIZE]>,
    log: RegisterLog,
}

impl Mmc5 {
    /// Create a chip with NTSC-clocked voices
    pub fn new() -> Self {
        let mut chip = Self {
            square1: PulseVoice::new(),
            square2: PulseVoice::new(),
            mul_a: 0,
            mul_b: 0,
            exram: Box::new([0; EXRAM_SIZE]),
            log: RegisterLog::default(),
        };
        chip.reset();
        chip
    }

    /// Create a chip whose voices run from a custom CPU clock
    pub fn with_clock(cpu_clock: f64) -> Self {
        let mut chip = Self::new();
        chip.square1 = PulseVoice::with_clock(cpu_clock);
        chip.square2 = PulseVoice::with_clock(cpu_clock);
        chip.reset();
        chip
    }

    /// Access a pulse voice (0 or 1)
    pub fn voice(&self, index: usize) -> Option<&PulseVoice> {
        match index {
            0 => Some(&self.square1),
            1 => Some(&self.square2),
            _ => None,
        }
    }

    /// Mutable access to a pulse voice (0 or 1)
    pub fn voice_mut(&mut self, index: usize) -> Option<&mut PulseVoice> {
        match index {
            0 => Some(&mut self.square1),
            1 => Some(&mut self.square2),
            _ => None,
        }
    }

    /// Drain the output level changes of a voice for the current frame
    ///
    /// Call before [`end_frame`](SoundChip::end_frame); empty for voices
    /// other than 0 and 1.
    pub fn take_edges(&mut self, index: usize) -> Vec<AmplitudeEdge> {
        self.voice_mut(index)
            .map(PulseVoice::take_edges)
            .unwrap_or_default()
    }

    /// Latched multiplier operands (A, B)
    pub fn multiplier_operands(&self) -> (u8, u8) {
        (self.mul_a, self.mul_b)
    }

    /// Last value written to a logged audio register
    ///
    /// Only `$5000-$5007` and `$5015` are logged.
    pub fn logged_register(&self, address: u16) -> Option<u8> {
        self.log.get(address)
    }

    /// Current channel enable bits
    pub fn control(&self) -> Mmc5Control {
        let mut control = Mmc5Control::empty();
        control.set(Mmc5Control::PULSE1, self.square1.is_enabled());
        control.set(Mmc5Control::PULSE2, self.square2.is_enabled());
        control
    }

    fn product(&self) -> u16 {
        self.mul_a as u16 * self.mul_b as u16
    }

    /// Clock both voices' length counters
    pub fn length_counter_update(&mut self) {
        self.square1.length_counter_update();
        self.square2.length_counter_update();
    }

    /// Clock both voices' envelopes
    pub fn envelope_update(&mut self) {
        self.square1.envelope_update();
        self.square2.envelope_update();
    }
}

impl Default for Mmc5 {
    fn default() -> Self {
        Self::new()
    }
}

impl SoundChip for Mmc5 {
    fn id(&self) -> ChipKind {
        ChipKind::Mmc5
    }

    fn reset(&mut self) {
        self.square1.reset();
        self.square2.reset();

        self.square1.write(0x01, RESET_DUTY_REGISTER);
        self.square2.write(0x01, RESET_DUTY_REGISTER);
    }

    fn write(&mut self, address: u16, value: u8) {
        if (EXRAM_START..=EXRAM_END).contains(&address) {
            self.exram[(address & 0x3FF) as usize] = value;
            return;
        }

        trace!("MMC5 write ${address:04X} = ${value:02X}");
        self.log.record(address, value);

        match address {
            0x5000 => self.square1.write(0, value),
            0x5002 => self.square1.write(2, value),
            0x5003 => self.square1.write(3, value),
            0x5004 => self.square2.write(0, value),
            0x5006 => self.square2.write(2, value),
            0x5007 => self.square2.write(3, value),
            CONTROL => {
                let control = Mmc5Control::from_bits_truncate(value);
                self.square1.write_control(control.contains(Mmc5Control::PULSE1));
                self.square2.write_control(control.contains(Mmc5Control::PULSE2));
            }
            MUL_A => self.mul_a = value,
            MUL_B => self.mul_b = value,
            _ => {}
        }
    }

    fn read(&mut self, address: u16) -> Option<u8> {
        if (EXRAM_START..=EXRAM_END).contains(&address) {
            return Some(self.exram[(address & 0x3FF) as usize]);
        }

        match address {
            MUL_A => Some((self.product() & 0xFF) as u8),
            MUL_B => Some((self.product() >> 8) as u8),
            _ => None,
        }
    }

    fn process(&mut self, time: u32) {
        self.square1.process(time);
        self.square2.process(time);
    }

    fn end_frame(&mut self) {
        self.square1.end_frame();
        self.square2.end_frame();
    }

    fn frequency(&self, channel: usize) -> f64 {
        match channel {
            0 => self.square1.frequency(),
            1 => self.square2.frequency(),
            _ => 0.0,
        }
    }

    fn clock_sequence(&mut self) {
        self.envelope_update();
        self.length_counter_update();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_forces_duty_register() {
        let mut chip = Mmc5::new();
        chip.write(0x5000, 0xFF);
        chip.reset();
        for i in 0..2 {
            let voice = chip.voice(i).unwrap();
            assert_eq!(voice.register(1), 0x08);
            assert_eq!(voice.register(0), 0x00);
        }
    }

    #[test]
    fn test_control_gates_voices() {
        let mut chip = Mmc5::new();
        chip.write(0x5015, 0x02);
        assert_eq!(chip.control(), Mmc5Control::PULSE2);
        chip.write(0x5015, 0xFF);
        assert_eq!(chip.control(), Mmc5Control::all());
        chip.write(0x5015, 0x00);
        assert!(chip.control().is_empty());
    }

    #[test]
    fn test_unused_pulse_registers_do_not_reach_voices() {
        let mut chip = Mmc5::new();
        chip.write(0x5001, 0x55);
        chip.write(0x5005, 0x55);
        assert_eq!(chip.voice(0).unwrap().register(1), 0x08);
        assert_eq!(chip.voice(1).unwrap().register(1), 0x08);
    }

    #[test]
    fn test_frequency_unknown_channel() {
        let chip = Mmc5::new();
        assert_eq!(chip.frequency(2), 0.0);
        assert!(chip.voice(2).is_none());
    }

    #[test]
    fn test_register_log() {
        let mut chip = Mmc5::new();
        assert_eq!(chip.logged_register(0x5002), None);
        chip.write(0x5002, 0x7C);
        chip.write(0x5015, 0x03);
        chip.write(0x5205, 0x10);
        assert_eq!(chip.logged_register(0x5002), Some(0x7C));
        assert_eq!(chip.logged_register(0x5015), Some(0x03));
        assert_eq!(chip.logged_register(0x5205), None);
    }
}
