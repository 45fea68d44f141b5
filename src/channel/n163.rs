//! Namco 163 wavetable channel
//!
//! Each N163 voice owns an 8-byte register block at `$40 + 8·n` of the
//! chip's internal RAM, counted down from the top (`$78` is the first
//! voice). Everything below the active register blocks is waveform memory
//! shared by all voices. RAM is reached indirectly: `$F800` selects an
//! address (bit 7 enables auto-increment) and `$4800` reads or writes the
//! byte under the cursor.
//!
//! | Offset | Contents                                   |
//! |--------|--------------------------------------------|
//! | 0, 2   | frequency bits 0-7, 8-15                   |
//! | 4      | `SSSS SSFF` wave size and frequency 16-17  |
//! | 1,3,5  | phase accumulator                          |
//! | 6      | wave position in samples                   |
//! | 7      | `-CCC VVVV` active voices − 1 and volume   |

use std::sync::Arc;

use log::{debug, warn};

use super::effects::{command_string, EffectCommand, EffectType};
use super::{ChannelId, ChannelInterface, ChannelState, ChipKind, Slide, WavetableInterface};
use crate::bus::{RegisterSink, N163_ADDRESS_PORT, N163_DATA_PORT};
use crate::config::{EngineConfig, MAX_N163_CHANNELS};
use crate::instrument::handler::{HandlerFamily, InstHandler};
use crate::instrument::{Instrument, InstrumentBank, InstrumentType, MAX_WAVE_COUNT, MAX_WAVE_SIZE};
use crate::pattern::{Note, PatternNote};
use crate::tables::{n163_period_table, CPU_CLOCK_NTSC, LINEAR_PITCH_AMOUNT, NOTE_COUNT};
use crate::{Error, Result};

/// Extra precision bits of N163 periods and slide speeds
pub const N163_PITCH_SLIDE_SHIFT: u32 = 2;
/// Largest N163 period before the precision shift
pub const N163_MAX_PERIOD: i32 = 0xFFFF;

const REGISTER_BASE: u8 = 0x40;
const PARAM_RESTORE_WAVE_POS: u8 = 0x7F;

/// One N163 voice
#[derive(Debug, Clone)]
pub struct N163Channel {
    state: ChannelState,
    handler: Option<InstHandler>,
    instrument: Option<Arc<Instrument>>,
    instrument_kind: Option<InstrumentType>,

    cpu_clock: f64,
    a4_frequency: f64,
    channels: u8,

    wave_len: usize,
    wave_pos: u8,
    wave_pos_old: u8,
    wave_count: usize,
    disable_load: bool,
    load_wave: bool,
    reset_phase: bool,
}

impl N163Channel {
    /// Create voice `subindex` (0-7) with one active voice on an NTSC clock
    pub fn new(subindex: u8) -> Self {
        debug_assert!(subindex < MAX_N163_CHANNELS);
        let mut channel = Self {
            state: ChannelState::new(ChannelId::new(ChipKind::N163, subindex), N163_MAX_PERIOD),
            handler: None,
            instrument: None,
            instrument_kind: None,
            cpu_clock: CPU_CLOCK_NTSC,
            a4_frequency: 440.0,
            channels: 1,
            wave_len: 4,
            wave_pos: 0,
            wave_pos_old: 0,
            wave_count: 0,
            disable_load: false,
            load_wave: false,
            reset_phase: false,
        };
        channel.rebuild_note_table();
        channel
    }

    /// Apply module-wide settings
    pub fn configure(&mut self, config: &EngineConfig) {
        self.state.set_pitch_model(config.pitch_model);
        self.cpu_clock = config.cpu_clock();
        self.a4_frequency = config.a4_frequency;
        self.set_channel_count(config.n163_channels);
    }

    /// Set the number of active voices (1-8)
    pub fn set_channel_count(&mut self, count: u8) {
        debug_assert!((1..=MAX_N163_CHANNELS).contains(&count));
        self.channels = count;
        self.rebuild_note_table();
    }

    fn rebuild_note_table(&mut self) {
        let table = n163_period_table(self.cpu_clock, self.channels, self.a4_frequency);
        self.state.set_note_table(table);
    }

    /// Return to the power-on state, keeping configuration
    pub fn reset_channel(&mut self) {
        self.state.reset();
        self.handler = None;
        self.instrument = None;
        self.instrument_kind = None;
        self.wave_pos = 0;
        self.wave_pos_old = 0;
        self.wave_len = 4;
        self.load_wave = false;
    }

    /// Channel identity
    pub fn id(&self) -> ChannelId {
        self.state.id()
    }

    /// Shared note and effect state
    pub fn state(&self) -> &ChannelState {
        &self.state
    }

    /// Attached instrument handler
    pub fn handler(&self) -> Option<&InstHandler> {
        self.handler.as_ref()
    }

    /// Number of active voices
    pub fn channel_count(&self) -> u8 {
        self.channels
    }

    /// Wave length in samples
    pub fn wave_length(&self) -> usize {
        self.wave_len
    }

    /// Wave position in samples currently sent to the hardware
    pub fn wave_position(&self) -> u8 {
        self.wave_pos
    }

    /// Wave position requested by the instrument
    pub fn instrument_wave_position(&self) -> u8 {
        self.wave_pos_old
    }

    /// Number of waves in the instrument
    pub fn wave_count(&self) -> usize {
        self.wave_count
    }

    /// Whether `Zxx` pinned the wave position
    pub fn is_auto_load_disabled(&self) -> bool {
        self.disable_load
    }

    /// Whether a phase reset will be written on the next refresh
    pub fn is_phase_reset_pending(&self) -> bool {
        self.reset_phase
    }

    /// Set the wave length (multiple of 4, 4-240)
    pub fn set_wave_length(&mut self, length: usize) {
        debug_assert!((4..=MAX_WAVE_SIZE).contains(&length) && length % 4 == 0);
        self.wave_len = length;
    }

    /// Set the instrument wave position (0-255)
    pub fn set_wave_position(&mut self, position: u8) {
        self.wave_pos_old = position;
    }

    /// Set the instrument wave count (1-64)
    pub fn set_wave_count(&mut self, count: usize) {
        debug_assert!((1..=MAX_WAVE_COUNT).contains(&count));
        self.wave_count = count;
    }

    /// Map an instrument duty value; sequence-only families do not select waves
    pub fn convert_duty(&self, duty: u8) -> Option<u8> {
        match self.instrument_kind {
            Some(InstrumentType::Apu | InstrumentType::Vrc6 | InstrumentType::S5b) => None,
            _ => Some(duty),
        }
    }

    fn request_wave_update(&mut self) {
        if let Some(handler) = self.handler.as_mut().and_then(InstHandler::as_wavetable_mut) {
            handler.request_wave_update();
        }
    }

    /// Apply an effect command
    ///
    /// Returns `false` when the effect has no meaning on this channel.
    pub fn handle_effect(&mut self, cmd: EffectCommand) -> bool {
        let linear = self.state.is_linear();
        match cmd.fx {
            EffectType::PortaUp | EffectType::PortaDown => {
                let up = cmd.fx == EffectType::PortaUp;
                // Linear pitch stores the opposite direction; the slide
                // export undoes the swap.
                let slide = match (linear, up) {
                    (false, true) | (true, false) => Slide::Up,
                    (false, false) | (true, true) => Slide::Down,
                };
                self.state.set_slide(slide, cmd.param);
                if !linear {
                    self.state.scale_porta_speed(N163_PITCH_SLIDE_SHIFT);
                }
            }
            EffectType::Portamento => {
                self.state.handle_effect(cmd);
                if !linear {
                    self.state.scale_porta_speed(N163_PITCH_SLIDE_SHIFT);
                }
            }
            EffectType::DutyCycle => {
                self.state.duty = cmd.param;
                self.state.default_duty = cmd.param;
                self.load_wave = true;
                self.request_wave_update();
            }
            EffectType::N163WaveBuffer => {
                if cmd.param == PARAM_RESTORE_WAVE_POS {
                    self.wave_pos = self.wave_pos_old;
                    self.disable_load = false;
                } else {
                    let budget = 0x80 - 8 * self.channels as usize;
                    if cmd.param as usize + (self.wave_len >> 1) > budget {
                        warn!("{}: wave buffer {cmd} exceeds RAM budget", self.id());
                        return true;
                    }
                    self.wave_pos = cmd.param << 1;
                    self.disable_load = true;
                }
                self.request_wave_update();
            }
            EffectType::PhaseReset => self.reset_phase = true,
            _ => return self.state.handle_effect(cmd),
        }
        true
    }

    /// Attach an instrument for the next instrument handling
    ///
    /// Returns whether the instrument differs from the current one.
    pub fn load_instrument(&mut self, instrument: Arc<Instrument>) -> Result<bool> {
        if HandlerFamily::for_instrument(instrument.kind()).is_none() {
            return Err(Error::UnsupportedInstrument {
                instrument: instrument.kind(),
                channel: self.id(),
            });
        }
        let new_instrument = self
            .instrument
            .as_ref()
            .map_or(true, |current| !Arc::ptr_eq(current, &instrument));
        self.instrument = Some(instrument);
        Ok(new_instrument)
    }

    /// Build, load and trigger the instrument handler
    ///
    /// The handler is rebuilt when the instrument family changes, which also
    /// forces a load. Returns `false` when no instrument is attached.
    pub fn handle_instrument(
        &mut self,
        trigger: bool,
        new_instrument: bool,
        bus: &mut dyn RegisterSink,
    ) -> bool {
        let Some(instrument) = self.instrument.clone() else {
            return false;
        };
        let kind = instrument.kind();
        let mut new_instrument = new_instrument;

        let family = HandlerFamily::for_instrument(kind);
        if self.handler.as_ref().map(InstHandler::family) != family {
            self.handler = InstHandler::for_instrument(kind);
            new_instrument = true;
            debug!("{}: new {:?} handler", self.id(), family);
        }
        self.instrument_kind = Some(kind);

        let Some(mut handler) = self.handler.take() else {
            return false;
        };
        {
            let mut port = N163Port { channel: self, bus };
            if new_instrument {
                handler.load_instrument(instrument, &mut port);
            }
            if trigger {
                handler.trigger(&mut port);
            }
        }
        self.handler = Some(handler);

        if !self.load_wave && new_instrument {
            self.state.duty = 0;
            self.state.default_duty = 0;
        }
        if !self.disable_load {
            self.wave_pos = self.wave_pos_old;
        }
        true
    }

    /// Enter the release phase once
    pub fn handle_release(&mut self) {
        if self.state.is_releasing() {
            return;
        }
        self.state.handle_release();
        if let Some(handler) = self.handler.as_mut() {
            handler.release();
        }
    }

    /// Stop the note
    pub fn handle_cut(&mut self) {
        self.state.handle_cut();
    }

    /// Apply one pattern row: instrument, effects, volume, note, then
    /// instrument handling
    pub fn play_row(&mut self, row: &PatternNote, bank: &InstrumentBank, bus: &mut dyn RegisterSink) {
        let mut new_instrument = false;
        if let Some(index) = row.instrument {
            match bank.get(index) {
                Some(instrument) => match self.load_instrument(instrument) {
                    Ok(is_new) => new_instrument = is_new,
                    Err(err) => warn!("{err}"),
                },
                None => warn!("{}: instrument {index:02X} does not exist", self.id()),
            }
        }

        for cmd in row.effects.iter().filter(|cmd| !cmd.is_empty()) {
            if !self.handle_effect(*cmd) {
                debug!("{}: effect {cmd} ignored", self.id());
            }
        }

        if let Some(volume) = row.volume {
            self.state.set_volume_column(volume);
        }

        let mut trigger = false;
        match row.note {
            Note::None => {}
            Note::Note(note) => {
                self.state.handle_note(note);
                trigger = true;
            }
            Note::Release => self.handle_release(),
            Note::Halt => self.handle_cut(),
        }

        if trigger || new_instrument {
            self.handle_instrument(trigger, new_instrument, bus);
        }
        self.load_wave = false;
    }

    /// Run one tick: effects, instrument sequences, register refresh
    pub fn process_tick(&mut self, bus: &mut dyn RegisterSink) {
        self.state.update_effects();
        if let Some(mut handler) = self.handler.take() {
            handler.update(&mut N163Port { channel: self, bus });
            self.handler = Some(handler);
        }
        self.refresh_channel(bus);
    }

    /// Hardware period for the current note, slides and detune
    ///
    /// Under the Linear model the note-space period is interpolated between
    /// adjacent table entries; a non-zero fraction always moves at least one
    /// register step.
    pub fn calculate_period(&self) -> i32 {
        let state = &self.state;
        let detune = state.detune();
        let mut period = state.limit_period(state.period() + (detune << 4));
        let table = state.note_table();
        if state.is_linear() && !table.is_empty() {
            period = state.limit_period(state.period() + detune);
            let note = (period >> LINEAR_PITCH_AMOUNT) as usize;
            let sub = period % (1 << LINEAR_PITCH_AMOUNT);
            let mut offset = if note < NOTE_COUNT - 1 {
                table[note + 1] as i32 - table[note] as i32
            } else {
                0
            };
            offset = (offset * sub) >> LINEAR_PITCH_AMOUNT;
            if sub != 0 && offset == 0 {
                offset = 1;
            }
            period = table[note] as i32 + offset;
        }
        state.limit_raw_period(period) << N163_PITCH_SLIDE_SHIFT
    }

    /// Write this voice's register block
    pub fn refresh_channel(&mut self, bus: &mut dyn RegisterSink) {
        let channel = 7 - self.state.id().subindex as usize;
        let wave_size = 256 - (self.wave_len >> 2);
        let frequency = self.calculate_period();
        let mut volume = self.state.calculate_volume();
        let base = REGISTER_BASE + channel as u8 * 8;

        if !self.state.gate() {
            volume = 0;
        }

        if channel + self.channels as usize >= MAX_N163_CHANNELS as usize {
            self.write_data_at(bus, base + 7, ((self.channels - 1) << 4) | volume);
            if !self.state.gate() {
                return;
            }
            self.write_data_at(bus, base, (frequency & 0xFF) as u8);
            self.write_data_at(bus, base + 2, ((frequency >> 8) & 0xFF) as u8);
            self.write_data_at(
                bus,
                base + 4,
                ((wave_size << 2) as u8) | ((frequency >> 16) & 0x03) as u8,
            );
            self.write_data_at(bus, base + 6, self.wave_pos);
        }

        if self.reset_phase {
            self.reset_phase = false;
            self.write_data_at(bus, base + 1, 0);
            self.write_data_at(bus, base + 3, 0);
            self.write_data_at(bus, base + 5, 0);
        }
    }

    /// Zero this voice's register block and its mirror in wave memory
    pub fn clear_registers(&mut self, bus: &mut dyn RegisterSink) {
        let subindex = self.state.id().subindex;
        let base = REGISTER_BASE + subindex * 8;

        for i in 0..8 {
            self.write_reg(bus, base + i, 0);
            self.write_reg(bus, base + i - REGISTER_BASE, 0);
        }

        if subindex == MAX_N163_CHANNELS - 1 {
            self.write_reg(bus, base + 7, (self.channels - 1) << 4);
        }

        self.disable_load = false;
        self.state.duty = 0;
    }

    /// Select an address and write one byte
    pub fn write_reg(&self, bus: &mut dyn RegisterSink, register: u8, value: u8) {
        bus.write_register(N163_ADDRESS_PORT, register);
        bus.write_register(N163_DATA_PORT, value);
    }

    /// Move the RAM cursor
    pub fn set_address(&self, bus: &mut dyn RegisterSink, address: u8, auto_increment: bool) {
        let inc = if auto_increment { 0x80 } else { 0x00 };
        bus.write_register(N163_ADDRESS_PORT, inc | (address & 0x7F));
    }

    /// Write a byte at the RAM cursor
    pub fn write_data(&self, bus: &mut dyn RegisterSink, data: u8) {
        bus.write_register(N163_DATA_PORT, data);
    }

    /// Write a byte at an address without auto-increment
    pub fn write_data_at(&self, bus: &mut dyn RegisterSink, address: u8, data: u8) {
        self.set_address(bus, address, false);
        self.write_data(bus, data);
    }

    /// Stream packed samples starting at the wave position
    pub fn fill_wave_ram(&self, bus: &mut dyn RegisterSink, wave: &[u8]) {
        self.set_address(bus, self.wave_pos >> 1, true);
        for &byte in wave {
            self.write_data(bus, byte);
        }
    }

    /// Effect text that recreates the active slide
    pub fn slide_effect_string(&self) -> Option<String> {
        let speed = self.state.porta_speed();
        if speed == 0 {
            return None;
        }
        let linear = self.state.is_linear();
        let param = if linear {
            speed
        } else {
            speed >> N163_PITCH_SLIDE_SHIFT
        };
        let fx = match (self.state.slide()?, linear) {
            (Slide::Up, false) | (Slide::Down, true) => EffectType::PortaUp,
            (Slide::Down, false) | (Slide::Up, true) => EffectType::PortaDown,
            (Slide::Portamento, _) => EffectType::Portamento,
        };
        Some(command_string(fx, param.clamp(0, 0xFF) as u8))
    }

    /// Effect text for the pinned wave buffer position
    pub fn custom_effect_string(&self) -> Option<String> {
        self.disable_load
            .then(|| command_string(EffectType::N163WaveBuffer, self.wave_pos >> 1))
    }
}

/// Channel view handed to the instrument handler for one call
struct N163Port<'a> {
    channel: &'a mut N163Channel,
    bus: &'a mut dyn RegisterSink,
}

impl ChannelInterface for N163Port<'_> {
    fn note(&self) -> Option<u8> {
        self.channel.state.note
    }

    fn set_note(&mut self, note: u8) {
        self.channel.state.note = Some(note);
    }

    fn trigger_note(&mut self, note: i32) -> i32 {
        let note = note.clamp(0, NOTE_COUNT as i32 - 1) as u8;
        self.channel.state.note_period(note)
    }

    fn period(&self) -> i32 {
        self.channel.state.period
    }

    fn set_period(&mut self, period: i32) {
        let state = &mut self.channel.state;
        state.period = state.limit_period(period);
    }

    fn set_volume(&mut self, volume: u8) {
        self.channel.state.seq_volume = volume.min(super::MAX_VOLUME);
    }

    fn pitch(&self) -> i32 {
        self.channel.state.pitch
    }

    fn set_pitch(&mut self, pitch: i32) {
        self.channel.state.pitch = pitch;
    }

    fn duty(&self) -> u8 {
        self.channel.state.duty
    }

    fn set_duty(&mut self, duty: u8) {
        self.channel.state.duty = duty;
    }

    fn convert_duty(&self, duty: u8) -> Option<u8> {
        self.channel.convert_duty(duty)
    }

    fn arpeggio_param(&self) -> u8 {
        self.channel.state.arpeggio
    }

    fn is_releasing(&self) -> bool {
        self.channel.state.releasing
    }

    fn as_wavetable(&mut self) -> Option<&mut dyn WavetableInterface> {
        Some(self)
    }
}

impl WavetableInterface for N163Port<'_> {
    fn set_wave_length(&mut self, length: usize) {
        self.channel.set_wave_length(length);
    }

    fn set_wave_position(&mut self, position: u8) {
        self.channel.set_wave_position(position);
    }

    fn set_wave_count(&mut self, count: usize) {
        self.channel.set_wave_count(count);
    }

    fn fill_wave_ram(&mut self, bytes: &[u8]) {
        self.channel.fill_wave_ram(self.bus, bytes);
    }
}
