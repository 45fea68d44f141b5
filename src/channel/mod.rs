//! Channel state machines
//!
//! [`ChannelState`] carries the note/period machinery shared by channels:
//! note → period lookup, volume column, gate, slides, vibrato, fine pitch and
//! the `0xy` arpeggio effect. Chip-specific channels wrap it and add their
//! own registers and effects.
//!
//! Instrument handlers talk to a channel only through [`ChannelInterface`];
//! wavetable-specific operations are reached through
//! [`ChannelInterface::as_wavetable`].

pub mod effects;
pub mod n163;

use std::f64::consts::TAU;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use crate::chip::ChipKind;
use crate::tables::{LINEAR_PITCH_AMOUNT, NOTE_COUNT};
use effects::{EffectCommand, EffectType};

/// Default volume column value
pub const MAX_VOLUME: u8 = 0x0F;

/// Stable identity of a voice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId {
    /// Chip the voice belongs to
    pub chip: ChipKind,
    /// Voice index within the chip
    pub subindex: u8,
}

impl ChannelId {
    /// Create an id
    pub const fn new(chip: ChipKind, subindex: u8) -> Self {
        Self { chip, subindex }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{}", self.chip, self.subindex + 1)
    }
}

/// Pitch representation used by slides and period computation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PitchModel {
    /// Periods are note indices with 5 fractional bits
    Linear,
    /// Periods are raw register values
    #[default]
    Classic,
}

/// Operations an instrument handler may perform on its channel
pub trait ChannelInterface {
    /// Base note of the current row
    fn note(&self) -> Option<u8>;
    /// Replace the base note
    fn set_note(&mut self, note: u8);
    /// Period for a note, clamped into the playable range
    fn trigger_note(&mut self, note: i32) -> i32;
    /// Current period
    fn period(&self) -> i32;
    /// Replace the current period
    fn set_period(&mut self, period: i32);
    /// Set the instrument volume (0-15)
    fn set_volume(&mut self, volume: u8);
    /// Instrument pitch offset
    fn pitch(&self) -> i32;
    /// Replace the instrument pitch offset
    fn set_pitch(&mut self, pitch: i32);
    /// Current duty or wave index
    fn duty(&self) -> u8;
    /// Replace the duty or wave index
    fn set_duty(&mut self, duty: u8);
    /// Map a duty value of the current instrument family, `None` to ignore it
    fn convert_duty(&self, duty: u8) -> Option<u8>;
    /// Parameter of the active `0xy` effect
    fn arpeggio_param(&self) -> u8;
    /// Whether the note has been released
    fn is_releasing(&self) -> bool;
    /// Wavetable operations, `None` for channels without waveform RAM
    fn as_wavetable(&mut self) -> Option<&mut dyn WavetableInterface> {
        None
    }
}

/// Operations available on channels that play from waveform RAM
pub trait WavetableInterface {
    /// Wave length in samples (multiple of 4, 4-240)
    fn set_wave_length(&mut self, length: usize);
    /// Instrument-driven wave position in samples
    fn set_wave_position(&mut self, position: u8);
    /// Number of waves in the instrument (1-64)
    fn set_wave_count(&mut self, count: usize);
    /// Write packed samples starting at the channel's wave position
    fn fill_wave_ram(&mut self, bytes: &[u8]);
}

/// Active pitch slide
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slide {
    /// `1xx`
    Up,
    /// `2xx`
    Down,
    /// `3xx` towards the last note
    Portamento,
}

#[derive(Debug, Clone, Copy, Default)]
struct Vibrato {
    speed: u8,
    depth: u8,
    phase: u8,
}

impl Vibrato {
    fn offset(&self) -> i32 {
        if self.depth == 0 {
            return 0;
        }
        let angle = self.phase as f64 * TAU / 64.0;
        (angle.sin() * self.depth as f64 * 4.0).round() as i32
    }
}

/// Note, period and effect state of one channel
///
/// Periods follow the channel's register sense: a larger value is a higher
/// pitch under the Classic model. Under the Linear model a period is a note
/// index shifted left by 5 with sub-note precision in the low bits.
#[derive(Debug, Clone)]
pub struct ChannelState {
    id: ChannelId,
    pitch_model: PitchModel,
    max_period: i32,
    note_table: Vec<u16>,

    note: Option<u8>,
    period: i32,
    gate: bool,
    releasing: bool,

    volume: u8,
    seq_volume: u8,
    fine_pitch: i32,
    pitch: i32,
    vibrato: Vibrato,

    slide: Option<Slide>,
    porta_speed: i32,
    porta_target: i32,

    arpeggio: u8,
    arp_phase: u8,
    arp_active: bool,

    duty: u8,
    default_duty: u8,
}

impl ChannelState {
    /// Create the state of a silent channel
    pub fn new(id: ChannelId, max_period: i32) -> Self {
        Self {
            id,
            pitch_model: PitchModel::default(),
            max_period,
            note_table: Vec::new(),
            note: None,
            period: 0,
            gate: false,
            releasing: false,
            volume: MAX_VOLUME,
            seq_volume: MAX_VOLUME,
            fine_pitch: 0,
            pitch: 0,
            vibrato: Vibrato::default(),
            slide: None,
            porta_speed: 0,
            porta_target: 0,
            arpeggio: 0,
            arp_phase: 0,
            arp_active: false,
            duty: 0,
            default_duty: 0,
        }
    }

    /// Silence the channel and forget all note and effect state
    pub fn reset(&mut self) {
        let mut fresh = Self::new(self.id, self.max_period);
        fresh.pitch_model = self.pitch_model;
        fresh.note_table = std::mem::take(&mut self.note_table);
        *self = fresh;
    }

    /// Channel identity
    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Active pitch model
    pub fn pitch_model(&self) -> PitchModel {
        self.pitch_model
    }

    /// Switch pitch model
    pub fn set_pitch_model(&mut self, model: PitchModel) {
        self.pitch_model = model;
    }

    /// Whether the Linear model is active
    pub fn is_linear(&self) -> bool {
        self.pitch_model == PitchModel::Linear
    }

    /// Replace the per-note register table
    pub fn set_note_table(&mut self, table: Vec<u16>) {
        self.note_table = table;
    }

    /// Per-note register table
    pub fn note_table(&self) -> &[u16] {
        &self.note_table
    }

    /// Base period of a note under the active model
    pub fn note_period(&self, note: u8) -> i32 {
        let note = (note as usize).min(NOTE_COUNT - 1);
        match self.pitch_model {
            PitchModel::Linear => (note as i32) << LINEAR_PITCH_AMOUNT,
            PitchModel::Classic => self.note_table.get(note).copied().unwrap_or(0) as i32,
        }
    }

    /// Clamp a period into the range of the active model
    pub fn limit_period(&self, period: i32) -> i32 {
        let max = match self.pitch_model {
            PitchModel::Linear => ((NOTE_COUNT - 1) as i32) << LINEAR_PITCH_AMOUNT,
            PitchModel::Classic => self.max_period,
        };
        period.clamp(0, max)
    }

    /// Clamp a period into the hardware register range
    pub fn limit_raw_period(&self, period: i32) -> i32 {
        period.clamp(0, self.max_period)
    }

    /// Current note
    pub fn note(&self) -> Option<u8> {
        self.note
    }

    /// Current period, slides included
    pub fn period(&self) -> i32 {
        self.period
    }

    /// Whether the channel is audible
    pub fn gate(&self) -> bool {
        self.gate
    }

    /// Whether the note has been released
    pub fn is_releasing(&self) -> bool {
        self.releasing
    }

    /// Volume column value
    pub fn volume(&self) -> u8 {
        self.volume
    }

    /// Instrument volume
    pub fn seq_volume(&self) -> u8 {
        self.seq_volume
    }

    /// Fine pitch offset from `Pxx`
    pub fn fine_pitch(&self) -> i32 {
        self.fine_pitch
    }

    /// Instrument pitch offset
    pub fn pitch(&self) -> i32 {
        self.pitch
    }

    /// Current vibrato offset
    pub fn vibrato(&self) -> i32 {
        self.vibrato.offset()
    }

    /// Active slide
    pub fn slide(&self) -> Option<Slide> {
        self.slide
    }

    /// Slide speed in period units per tick
    pub fn porta_speed(&self) -> i32 {
        self.porta_speed
    }

    /// Duty or wave index
    pub fn duty(&self) -> u8 {
        self.duty
    }

    /// Duty restored on new instruments
    pub fn default_duty(&self) -> u8 {
        self.default_duty
    }

    /// Combined pitch offset: vibrato − fine pitch − instrument pitch
    pub fn detune(&self) -> i32 {
        self.vibrato() - self.fine_pitch - self.pitch
    }

    /// Output volume from the volume column and the instrument volume
    ///
    /// A non-zero product never rounds down to silence.
    pub fn calculate_volume(&self) -> u8 {
        let volume = self.volume as u32 * self.seq_volume as u32 / 15;
        if volume == 0 && self.volume > 0 && self.seq_volume > 0 {
            1
        } else {
            volume as u8
        }
    }

    /// Apply the effects every channel understands
    ///
    /// Returns `false` for effects this state does not handle.
    pub fn handle_effect(&mut self, cmd: EffectCommand) -> bool {
        match cmd.fx {
            EffectType::Arpeggio => {
                self.arpeggio = cmd.param;
                self.arp_phase = 0;
            }
            EffectType::PortaUp => self.set_slide(Slide::Up, cmd.param),
            EffectType::PortaDown => self.set_slide(Slide::Down, cmd.param),
            EffectType::Portamento => self.set_slide(Slide::Portamento, cmd.param),
            EffectType::Vibrato => {
                self.vibrato.speed = cmd.param >> 4;
                self.vibrato.depth = cmd.param & 0x0F;
                if self.vibrato.depth == 0 {
                    self.vibrato.phase = 0;
                }
            }
            EffectType::Pitch => self.fine_pitch = 0x80 - cmd.param as i32,
            EffectType::DutyCycle => {
                self.duty = cmd.param;
                self.default_duty = cmd.param;
            }
            EffectType::None | EffectType::N163WaveBuffer | EffectType::PhaseReset => return false,
        }
        true
    }

    /// Store a slide; a zero speed stops it
    pub fn set_slide(&mut self, slide: Slide, param: u8) {
        self.porta_speed = param as i32;
        self.slide = (param != 0).then_some(slide);
    }

    /// Shift the stored slide speed left
    pub fn scale_porta_speed(&mut self, shift: u32) {
        self.porta_speed <<= shift;
    }

    /// Start a note
    pub fn handle_note(&mut self, note: u8) {
        let note = note.min((NOTE_COUNT - 1) as u8);
        let period = self.note_period(note);
        if self.slide == Some(Slide::Portamento) && self.gate && self.period != 0 {
            self.porta_target = period;
        } else {
            self.period = period;
            self.porta_target = period;
        }
        self.note = Some(note);
        self.gate = true;
        self.releasing = false;
        self.arp_phase = 0;
    }

    /// Enter the release phase
    pub fn handle_release(&mut self) {
        self.releasing = true;
    }

    /// Stop the note
    pub fn handle_cut(&mut self) {
        self.gate = false;
        self.note = None;
        self.releasing = false;
    }

    /// Set the volume column
    pub fn set_volume_column(&mut self, volume: u8) {
        self.volume = volume.min(MAX_VOLUME);
    }

    /// Run one tick of slides, vibrato and the arpeggio effect
    pub fn update_effects(&mut self) {
        match self.slide {
            Some(Slide::Up) => {
                self.period = self.limit_period(self.period + self.slide_step());
            }
            Some(Slide::Down) => {
                self.period = self.limit_period(self.period - self.slide_step());
            }
            Some(Slide::Portamento) => {
                let speed = self.porta_speed;
                self.period = if self.period < self.porta_target {
                    (self.period + speed).min(self.porta_target)
                } else {
                    (self.period - speed).max(self.porta_target)
                };
            }
            None => {}
        }

        if self.vibrato.speed > 0 && self.vibrato.depth > 0 {
            self.vibrato.phase = (self.vibrato.phase + self.vibrato.speed) & 0x3F;
        }

        if let (true, Some(note)) = (self.arpeggio != 0, self.note) {
            let x = self.arpeggio >> 4;
            let y = self.arpeggio & 0x0F;
            let offset = match self.arp_phase {
                0 => 0,
                1 => x,
                _ => y,
            };
            let steps = if y == 0 { 2 } else { 3 };
            self.arp_phase = (self.arp_phase + 1) % steps;
            self.period = self.note_period(note.saturating_add(offset));
            self.arp_active = true;
        } else if self.arp_active {
            // Effect cleared: fall back to the base note
            self.arp_active = false;
            if let Some(note) = self.note {
                self.period = self.note_period(note);
            }
        }
    }

    /// Period change of one `1xx` tick
    ///
    /// Classic periods rise with pitch on these channels. Linear slides step
    /// the note-space period the other way round.
    fn slide_step(&self) -> i32 {
        match self.pitch_model {
            PitchModel::Classic => self.porta_speed,
            PitchModel::Linear => -self.porta_speed,
        }
    }
}
