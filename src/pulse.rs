//! Pulse voice
//!
//! The 2A03-style square generator used twice by the MMC5. Each voice has a
//! 4-step duty selector over an 8-step sequence, an 11-bit timer, a decay
//! envelope and a length counter. The MMC5 variant has no sweep unit; its
//! register 1 is latched and otherwise ignored.

use crate::tables::{CPU_CLOCK_NTSC, LENGTH_TABLE};

/// Duty sequences, one bit per sequencer step
const DUTY_TABLE: [[u8; 8]; 4] = [
    [0, 1, 0, 0, 0, 0, 0, 0],
    [0, 1, 1, 0, 0, 0, 0, 0],
    [0, 1, 1, 1, 1, 0, 0, 0],
    [1, 0, 0, 1, 1, 1, 1, 1],
];

/// Timer periods below this are silenced by the hardware
const MIN_PERIOD: u16 = 8;

/// Output level change at a CPU cycle offset inside the current frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmplitudeEdge {
    /// Cycle offset from the start of the frame
    pub time: u32,
    /// Signed change in output level
    pub delta: i8,
}

/// Decay envelope shared by the pulse voices
#[derive(Debug, Clone, Default)]
struct Envelope {
    start: bool,
    divider: u8,
    decay: u8,
}

impl Envelope {
    fn clock(&mut self, period: u8, looping: bool) {
        if self.start {
            self.start = false;
            self.decay = 15;
            self.divider = period;
        } else if self.divider == 0 {
            self.divider = period;
            if self.decay > 0 {
                self.decay -= 1;
            } else if looping {
                self.decay = 15;
            }
        } else {
            self.divider -= 1;
        }
    }
}

/// Square-wave generator driven through four byte registers
#[derive(Debug, Clone)]
pub struct PulseVoice {
    registers: [u8; 4],
    cpu_clock: f64,
    enabled: bool,
    period: u16,
    counter: u32,
    step: usize,
    length: u8,
    envelope: Envelope,
    frame_time: u32,
    last_output: u8,
    edges: Vec<AmplitudeEdge>,
}

impl PulseVoice {
    /// Create a voice clocked at the NTSC CPU rate
    pub fn new() -> Self {
        Self::with_clock(CPU_CLOCK_NTSC)
    }

    /// Create a voice with a custom CPU clock in Hz
    pub fn with_clock(cpu_clock: f64) -> Self {
        Self {
            registers: [0; 4],
            cpu_clock,
            enabled: false,
            period: 0,
            counter: 0,
            step: 0,
            length: 0,
            envelope: Envelope::default(),
            frame_time: 0,
            last_output: 0,
            edges: Vec::new(),
        }
    }

    /// Reset to the power-on state
    pub fn reset(&mut self) {
        let clock = self.cpu_clock;
        *self = Self::with_clock(clock);
    }

    /// Write one of the four voice registers
    ///
    /// * 0: `DDLC VVVV` duty, length halt / envelope loop, constant volume, volume
    /// * 1: sweep latch (no sweep unit)
    /// * 2: timer low byte
    /// * 3: `LLLL LTTT` length index and timer high bits
    pub fn write(&mut self, register: u8, value: u8) {
        let reg = (register & 0x03) as usize;
        self.registers[reg] = value;
        match reg {
            2 => {
                self.period = (self.period & 0x0700) | value as u16;
            }
            3 => {
                self.period = (self.period & 0x00FF) | (((value & 0x07) as u16) << 8);
                if self.enabled {
                    self.length = LENGTH_TABLE[(value >> 3) as usize];
                }
                self.step = 0;
                self.envelope.start = true;
            }
            _ => {}
        }
    }

    /// Write the voice's enable bit from the chip control register
    pub fn write_control(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.length = 0;
        }
    }

    /// Last value written to a register
    pub fn register(&self, register: u8) -> u8 {
        self.registers[(register & 0x03) as usize]
    }

    /// Selected duty (0-3)
    pub fn duty(&self) -> u8 {
        self.registers[0] >> 6
    }

    /// 11-bit timer period
    pub fn period(&self) -> u16 {
        self.period
    }

    /// Remaining length counter value
    pub fn length(&self) -> u8 {
        self.length
    }

    /// Whether the voice is enabled through the control register
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn halted(&self) -> bool {
        self.registers[0] & 0x20 != 0
    }

    /// Current envelope or constant volume (0-15)
    pub fn volume(&self) -> u8 {
        if self.registers[0] & 0x10 != 0 {
            self.registers[0] & 0x0F
        } else {
            self.envelope.decay
        }
    }

    /// Current output level (0-15)
    pub fn output(&self) -> u8 {
        let active = self.length > 0 && self.period >= MIN_PERIOD;
        if active && DUTY_TABLE[self.duty() as usize][self.step] != 0 {
            self.volume()
        } else {
            0
        }
    }

    /// Run the timer for `time` CPU cycles
    pub fn process(&mut self, time: u32) {
        // The timer is clocked every other CPU cycle.
        let period_cycles = (self.period as u32 + 1) * 2;
        let mut remaining = time;
        while remaining > 0 {
            let until_step = period_cycles - self.counter.min(period_cycles - 1);
            if remaining < until_step {
                self.counter += remaining;
                self.frame_time += remaining;
                break;
            }
            remaining -= until_step;
            self.frame_time += until_step;
            self.counter = 0;
            self.step = (self.step + 1) & 0x07;
            self.push_edge();
        }
    }

    fn push_edge(&mut self) {
        let level = self.output();
        if level != self.last_output {
            self.edges.push(AmplitudeEdge {
                time: self.frame_time,
                delta: level as i8 - self.last_output as i8,
            });
            self.last_output = level;
        }
    }

    /// Close the current frame; edge times restart from zero
    ///
    /// Edges not taken during the frame are discarded.
    pub fn end_frame(&mut self) {
        self.frame_time = 0;
        self.edges.clear();
    }

    /// Drain the output level changes recorded in the current frame
    pub fn take_edges(&mut self) -> Vec<AmplitudeEdge> {
        std::mem::take(&mut self.edges)
    }

    /// Clock the length counter (half-frame)
    pub fn length_counter_update(&mut self) {
        if !self.halted() && self.length > 0 {
            self.length -= 1;
        }
    }

    /// Clock the envelope (quarter-frame)
    pub fn envelope_update(&mut self) {
        let period = self.registers[0] & 0x0F;
        let looping = self.halted();
        self.envelope.clock(period, looping);
    }

    /// Output frequency in Hz, 0.0 when the timer period is too short to sound
    pub fn frequency(&self) -> f64 {
        if self.period < MIN_PERIOD {
            return 0.0;
        }
        self.cpu_clock / (16.0 * (self.period as f64 + 1.0))
    }
}

impl Default for PulseVoice {
    fn default() -> Self {
        Self::new()
    }
}
