//! Instrument handlers
//!
//! A handler is attached to a channel when an instrument is first used and
//! replaced only when the instrument family changes. It steps the
//! instrument's sequences once per tick and applies them to the channel
//! through [`ChannelInterface`]. The wavetable handler additionally packs
//! the selected N163 waveform and sends it to waveform RAM when it changed.

use std::sync::Arc;

use log::debug;

use super::cursor::{SequenceCursor, SequenceStep};
use super::{
    decode_arp_scheme, ArpScheme, Instrument, InstrumentType, SequenceSetting, SequenceType,
    WaveTable, MAX_WAVE_SIZE,
};
use crate::channel::{ChannelInterface, WavetableInterface};
use crate::tables::NOTE_COUNT;

/// Volume applied on trigger before the volume sequence runs
pub const DEFAULT_VOLUME: u8 = 0x0F;
/// Default duty of Sunsoft 5B instruments (tone enabled)
pub const S5B_DEFAULT_DUTY: u8 = 0x40;

/// Sequence-driven handler shared by every instrument family
#[derive(Debug, Clone)]
pub struct SequenceHandler {
    instrument: Option<Arc<Instrument>>,
    cursors: [SequenceCursor; 5],
    default_volume: u8,
    default_duty: u8,
}

impl SequenceHandler {
    /// Create a handler with the volume and duty applied on load/trigger
    pub fn new(default_volume: u8, default_duty: u8) -> Self {
        Self {
            instrument: None,
            cursors: Default::default(),
            default_volume,
            default_duty,
        }
    }

    /// Loaded instrument
    pub fn instrument(&self) -> Option<&Arc<Instrument>> {
        self.instrument.as_ref()
    }

    /// Cursor of a sequence slot
    pub fn cursor(&self, kind: SequenceType) -> &SequenceCursor {
        &self.cursors[kind.index()]
    }

    /// Duty applied when an instrument is loaded
    pub fn default_duty(&self) -> u8 {
        self.default_duty
    }

    fn bind(&mut self, instrument: Arc<Instrument>) {
        for kind in SequenceType::ALL {
            self.cursors[kind.index()].bind(instrument.sequence(kind).cloned());
        }
        debug!("loaded instrument '{}' ({:?})", instrument.name(), instrument.kind());
        self.instrument = Some(instrument);
    }

    /// Attach an instrument's sequences
    pub fn load_instrument(&mut self, instrument: Arc<Instrument>, ch: &mut dyn ChannelInterface) {
        self.bind(instrument);
        if let Some(duty) = ch.convert_duty(self.default_duty) {
            ch.set_duty(duty);
        }
    }

    /// Restart every sequence for a new note
    pub fn trigger(&mut self, ch: &mut dyn ChannelInterface) {
        for cursor in &mut self.cursors {
            cursor.reset();
        }
        ch.set_volume(self.default_volume);
        ch.set_pitch(0);
    }

    /// Jump every sequence to its release point
    pub fn release(&mut self) {
        for cursor in &mut self.cursors {
            cursor.release();
        }
    }

    /// Step all sequences once, in volume, arpeggio, pitch, hi-pitch, duty order
    pub fn update(&mut self, ch: &mut dyn ChannelInterface) {
        let releasing = ch.is_releasing();
        for kind in SequenceType::ALL {
            let cursor = &mut self.cursors[kind.index()];
            let setting = cursor
                .sequence()
                .map(|seq| seq.setting())
                .unwrap_or_default();
            match cursor.step(releasing) {
                SequenceStep::Value(value) => apply_item(kind, setting, value, ch),
                SequenceStep::Ended if kind == SequenceType::Arpeggio => {
                    // Back to the unmodified note
                    if let Some(note) = ch.note() {
                        let period = ch.trigger_note(note as i32);
                        ch.set_period(period);
                    }
                }
                SequenceStep::Ended | SequenceStep::Idle => {}
            }
        }
    }
}

fn apply_item(kind: SequenceType, setting: SequenceSetting, value: i8, ch: &mut dyn ChannelInterface) {
    match kind {
        SequenceType::Volume => ch.set_volume(value.clamp(0, 15) as u8),
        SequenceType::Arpeggio => {
            let Some(note) = ch.note() else {
                return;
            };
            let note = note as i32;
            let value = value as i32;
            let target = match setting {
                SequenceSetting::Fixed => value,
                SequenceSetting::Relative => {
                    let moved = (note + value).clamp(0, (NOTE_COUNT - 1) as i32);
                    ch.set_note(moved as u8);
                    moved
                }
                SequenceSetting::Scheme => {
                    let (mut offset, scheme) = decode_arp_scheme(value as i8);
                    let param = ch.arpeggio_param() as i32;
                    match scheme {
                        ArpScheme::None => {}
                        ArpScheme::X => offset += param >> 4,
                        ArpScheme::Y => offset += param & 0x0F,
                        ArpScheme::NegY => offset -= param & 0x0F,
                    }
                    note + offset
                }
                SequenceSetting::Default | SequenceSetting::Absolute => note + value,
            };
            let period = ch.trigger_note(target);
            ch.set_period(period);
        }
        SequenceType::Pitch => {
            let pitch = if setting == SequenceSetting::Absolute {
                value as i32
            } else {
                ch.pitch() + value as i32
            };
            ch.set_pitch(pitch);
        }
        SequenceType::HiPitch => {
            let pitch = ch.pitch() + value as i32 * 16;
            ch.set_pitch(pitch);
        }
        SequenceType::Duty => {
            if let Some(duty) = ch.convert_duty(value as u8) {
                ch.set_duty(duty);
            }
        }
    }
}

/// Sequence handler with N163 waveform transmission
#[derive(Debug, Clone)]
pub struct WavetableHandler {
    base: SequenceHandler,
    buffers: [[u8; MAX_WAVE_SIZE / 2]; 2],
    current: usize,
    force_update: bool,
}

impl WavetableHandler {
    /// Create a handler with the volume applied on trigger
    pub fn new(default_volume: u8) -> Self {
        Self {
            base: SequenceHandler::new(default_volume, 0),
            buffers: [[0; MAX_WAVE_SIZE / 2]; 2],
            current: 0,
            force_update: false,
        }
    }

    /// Underlying sequence handler
    pub fn sequences(&self) -> &SequenceHandler {
        &self.base
    }

    /// Force the next update to send the waveform even if it is unchanged
    pub fn request_wave_update(&mut self) {
        self.force_update = true;
    }

    /// Whether a forced transmission is pending
    pub fn is_update_requested(&self) -> bool {
        self.force_update
    }

    /// Packed bytes most recently computed
    pub fn current_wave(&self) -> &[u8] {
        &self.buffers[self.current]
    }

    /// Attach an N163 instrument and copy its wave layout to the channel
    pub fn load_instrument(&mut self, instrument: Arc<Instrument>, ch: &mut dyn ChannelInterface) {
        self.base.bind(Arc::clone(&instrument));
        let (Some(waves), Some(wt)) = (instrument.waves(), ch.as_wavetable()) else {
            return;
        };
        wt.set_wave_length(waves.size());
        wt.set_wave_position(waves.position());
        wt.set_wave_count(waves.count());
        self.request_wave_update();
    }

    /// Restart sequences; a fresh note always resends its waveform
    pub fn trigger(&mut self, ch: &mut dyn ChannelInterface) {
        self.base.trigger(ch);
        self.request_wave_update();
    }

    /// Step sequences, then refresh waveform RAM
    pub fn update(&mut self, ch: &mut dyn ChannelInterface) {
        self.base.update(ch);

        if let Some(instrument) = self.base.instrument.clone() {
            if let Some(waves) = instrument.waves() {
                let duty = ch.duty();
                if let Some(wt) = ch.as_wavetable() {
                    self.update_wave(waves, duty, wt);
                }
            }
        }
        self.force_update = false;
    }

    /// Pack the selected wave and send it if it differs from the last one
    ///
    /// Returns whether bytes were written.
    pub fn update_wave(
        &mut self,
        waves: &WaveTable,
        duty: u8,
        wt: &mut dyn WavetableInterface,
    ) -> bool {
        self.current ^= 1;
        let [first, second] = &mut self.buffers;
        let (current, previous) = if self.current == 0 {
            (first, second)
        } else {
            (second, first)
        };

        let index = (duty as usize).min(waves.count().saturating_sub(1));
        let count = waves.size() / 2;
        for (i, byte) in current.iter_mut().take(count).enumerate() {
            *byte = waves.sample(index, 2 * i) | waves.sample(index, 2 * i + 1) << 4;
        }

        if current[..count] != previous[..count] || self.force_update {
            wt.fill_wave_ram(&current[..count]);
            true
        } else {
            false
        }
    }
}

/// Handler kind chosen from the instrument family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerFamily {
    /// Plain sequences
    Sequence,
    /// Sequences plus waveform RAM
    Wavetable,
}

impl HandlerFamily {
    /// Family used for an instrument type, `None` when it cannot play on
    /// an expansion channel
    pub fn for_instrument(kind: InstrumentType) -> Option<Self> {
        match kind {
            InstrumentType::Apu | InstrumentType::Vrc6 | InstrumentType::S5b | InstrumentType::Fds => {
                Some(HandlerFamily::Sequence)
            }
            InstrumentType::N163 => Some(HandlerFamily::Wavetable),
            InstrumentType::Vrc7 => None,
        }
    }
}

/// Instrument handler attached to a channel
#[derive(Debug, Clone)]
pub enum InstHandler {
    /// Plain sequence handler
    Sequence(SequenceHandler),
    /// N163 handler
    Wavetable(WavetableHandler),
}

impl InstHandler {
    /// Build the handler for an instrument type
    pub fn for_instrument(kind: InstrumentType) -> Option<Self> {
        let handler = match HandlerFamily::for_instrument(kind)? {
            HandlerFamily::Sequence => {
                let duty = if kind == InstrumentType::S5b { S5B_DEFAULT_DUTY } else { 0 };
                InstHandler::Sequence(SequenceHandler::new(DEFAULT_VOLUME, duty))
            }
            HandlerFamily::Wavetable => InstHandler::Wavetable(WavetableHandler::new(DEFAULT_VOLUME)),
        };
        Some(handler)
    }

    /// Family of this handler
    pub fn family(&self) -> HandlerFamily {
        match self {
            InstHandler::Sequence(_) => HandlerFamily::Sequence,
            InstHandler::Wavetable(_) => HandlerFamily::Wavetable,
        }
    }

    /// Sequence state common to both kinds
    pub fn sequences(&self) -> &SequenceHandler {
        match self {
            InstHandler::Sequence(h) => h,
            InstHandler::Wavetable(h) => h.sequences(),
        }
    }

    /// Wavetable handler, if this is one
    pub fn as_wavetable(&self) -> Option<&WavetableHandler> {
        match self {
            InstHandler::Wavetable(h) => Some(h),
            InstHandler::Sequence(_) => None,
        }
    }

    /// Mutable wavetable handler, if this is one
    pub fn as_wavetable_mut(&mut self) -> Option<&mut WavetableHandler> {
        match self {
            InstHandler::Wavetable(h) => Some(h),
            InstHandler::Sequence(_) => None,
        }
    }

    /// Attach an instrument
    pub fn load_instrument(&mut self, instrument: Arc<Instrument>, ch: &mut dyn ChannelInterface) {
        match self {
            InstHandler::Sequence(h) => h.load_instrument(instrument, ch),
            InstHandler::Wavetable(h) => h.load_instrument(instrument, ch),
        }
    }

    /// Restart for a new note
    pub fn trigger(&mut self, ch: &mut dyn ChannelInterface) {
        match self {
            InstHandler::Sequence(h) => h.trigger(ch),
            InstHandler::Wavetable(h) => h.trigger(ch),
        }
    }

    /// Enter the release phase
    pub fn release(&mut self) {
        match self {
            InstHandler::Sequence(h) => h.release(),
            InstHandler::Wavetable(h) => h.base.release(),
        }
    }

    /// Run one tick
    pub fn update(&mut self, ch: &mut dyn ChannelInterface) {
        match self {
            InstHandler::Sequence(h) => h.update(ch),
            InstHandler::Wavetable(h) => h.update(ch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::{encode_arp_scheme, Sequence};

    /// Minimal channel recording what handlers do to it
    #[derive(Default)]
    struct MockChannel {
        note: Option<u8>,
        period: i32,
        volume: u8,
        pitch: i32,
        duty: u8,
        arp: u8,
        releasing: bool,
        accept_duty: bool,
        wavetable: Option<MockWaves>,
    }

    #[derive(Default)]
    struct MockWaves {
        length: usize,
        position: u8,
        count: usize,
        sent: Vec<Vec<u8>>,
    }

    impl WavetableInterface for MockWaves {
        fn set_wave_length(&mut self, length: usize) {
            self.length = length;
        }
        fn set_wave_position(&mut self, position: u8) {
            self.position = position;
        }
        fn set_wave_count(&mut self, count: usize) {
            self.count = count;
        }
        fn fill_wave_ram(&mut self, bytes: &[u8]) {
            self.sent.push(bytes.to_vec());
        }
    }

    impl ChannelInterface for MockChannel {
        fn note(&self) -> Option<u8> {
            self.note
        }
        fn set_note(&mut self, note: u8) {
            self.note = Some(note);
        }
        fn trigger_note(&mut self, note: i32) -> i32 {
            note.clamp(0, 95) * 10
        }
        fn period(&self) -> i32 {
            self.period
        }
        fn set_period(&mut self, period: i32) {
            self.period = period;
        }
        fn set_volume(&mut self, volume: u8) {
            self.volume = volume;
        }
        fn pitch(&self) -> i32 {
            self.pitch
        }
        fn set_pitch(&mut self, pitch: i32) {
            self.pitch = pitch;
        }
        fn duty(&self) -> u8 {
            self.duty
        }
        fn set_duty(&mut self, duty: u8) {
            self.duty = duty;
        }
        fn convert_duty(&self, duty: u8) -> Option<u8> {
            self.accept_duty.then_some(duty)
        }
        fn arpeggio_param(&self) -> u8 {
            self.arp
        }
        fn is_releasing(&self) -> bool {
            self.releasing
        }
        fn as_wavetable(&mut self) -> Option<&mut dyn WavetableInterface> {
            self.wavetable
                .as_mut()
                .map(|w| w as &mut dyn WavetableInterface)
        }
    }

    fn run(handler: &mut SequenceHandler, ch: &mut MockChannel, ticks: usize) -> Vec<i32> {
        (0..ticks)
            .map(|_| {
                handler.update(ch);
                ch.period
            })
            .collect()
    }

    fn with_arp(setting: SequenceSetting, items: &[i8]) -> Arc<Instrument> {
        Arc::new(Instrument::new(InstrumentType::Apu, "arp").with_sequence(
            SequenceType::Arpeggio,
            Sequence::from_items(items).with_setting(setting),
        ))
    }

    fn playing(note: u8) -> MockChannel {
        MockChannel {
            note: Some(note),
            accept_duty: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_absolute_arpeggio_restores_note_at_end() {
        let mut ch = playing(10);
        let mut h = SequenceHandler::new(DEFAULT_VOLUME, 0);
        h.load_instrument(with_arp(SequenceSetting::Default, &[0, 4, 7]), &mut ch);
        h.trigger(&mut ch);
        assert_eq!(run(&mut h, &mut ch, 4), vec![100, 140, 170, 100]);
    }

    #[test]
    fn test_relative_arpeggio_accumulates() {
        let mut ch = playing(10);
        let mut h = SequenceHandler::new(DEFAULT_VOLUME, 0);
        h.load_instrument(with_arp(SequenceSetting::Relative, &[1, 1, 1]), &mut ch);
        h.trigger(&mut ch);
        assert_eq!(run(&mut h, &mut ch, 3), vec![110, 120, 130]);
        assert_eq!(ch.note, Some(13));
    }

    #[test]
    fn test_fixed_arpeggio_ignores_note() {
        let mut ch = playing(10);
        let mut h = SequenceHandler::new(DEFAULT_VOLUME, 0);
        h.load_instrument(with_arp(SequenceSetting::Fixed, &[24, 36]), &mut ch);
        h.trigger(&mut ch);
        assert_eq!(run(&mut h, &mut ch, 2), vec![240, 360]);
    }

    #[test]
    fn test_scheme_arpeggio_uses_effect_param() {
        let mut ch = playing(10);
        ch.arp = 0x37;
        let items = [
            encode_arp_scheme(0, ArpScheme::X),
            encode_arp_scheme(12, ArpScheme::Y),
            encode_arp_scheme(0, ArpScheme::NegY),
        ];
        let mut h = SequenceHandler::new(DEFAULT_VOLUME, 0);
        h.load_instrument(with_arp(SequenceSetting::Scheme, &items), &mut ch);
        h.trigger(&mut ch);
        assert_eq!(run(&mut h, &mut ch, 3), vec![130, 290, 30]);
    }

    #[test]
    fn test_pitch_sequences() {
        let mut ch = playing(0);
        let inst = Arc::new(
            Instrument::new(InstrumentType::Apu, "pitch")
                .with_sequence(SequenceType::Pitch, Sequence::from_items(&[2, 2]))
                .with_sequence(SequenceType::HiPitch, Sequence::from_items(&[1])),
        );
        let mut h = SequenceHandler::new(DEFAULT_VOLUME, 0);
        h.load_instrument(inst, &mut ch);
        h.trigger(&mut ch);
        h.update(&mut ch);
        assert_eq!(ch.pitch, 18);
        h.update(&mut ch);
        assert_eq!(ch.pitch, 20);

        let absolute = Arc::new(Instrument::new(InstrumentType::Apu, "abs").with_sequence(
            SequenceType::Pitch,
            Sequence::from_items(&[5, -3]).with_setting(SequenceSetting::Absolute),
        ));
        h.load_instrument(absolute, &mut ch);
        h.trigger(&mut ch);
        h.update(&mut ch);
        h.update(&mut ch);
        assert_eq!(ch.pitch, -3);
    }

    #[test]
    fn test_trigger_resets_volume_and_pitch() {
        let mut ch = playing(0);
        ch.volume = 3;
        ch.pitch = 40;
        let mut h = SequenceHandler::new(DEFAULT_VOLUME, 0);
        h.trigger(&mut ch);
        assert_eq!(ch.volume, 15);
        assert_eq!(ch.pitch, 0);
    }

    #[test]
    fn test_duty_sequence_respects_conversion() {
        let inst = Arc::new(
            Instrument::new(InstrumentType::S5b, "tone")
                .with_sequence(SequenceType::Duty, Sequence::from_items(&[3])),
        );
        let mut ch = playing(0);
        ch.accept_duty = false;
        let mut h = InstHandler::for_instrument(InstrumentType::S5b).unwrap();
        h.load_instrument(Arc::clone(&inst), &mut ch);
        h.trigger(&mut ch);
        h.update(&mut ch);
        assert_eq!(ch.duty, 0);

        ch.accept_duty = true;
        h.load_instrument(inst, &mut ch);
        assert_eq!(ch.duty, S5B_DEFAULT_DUTY);
        h.trigger(&mut ch);
        h.update(&mut ch);
        assert_eq!(ch.duty, 3);
    }

    #[test]
    fn test_release_jumps_to_release_point() {
        let inst = Arc::new(Instrument::new(InstrumentType::Apu, "env").with_sequence(
            SequenceType::Volume,
            Sequence::from_items(&[15, 10, 5, 0]).with_release(1),
        ));
        let mut ch = playing(0);
        let mut h = SequenceHandler::new(DEFAULT_VOLUME, 0);
        h.load_instrument(inst, &mut ch);
        h.trigger(&mut ch);
        for _ in 0..5 {
            h.update(&mut ch);
        }
        assert_eq!(ch.volume, 10);
        ch.releasing = true;
        h.release();
        h.update(&mut ch);
        h.update(&mut ch);
        assert_eq!(ch.volume, 5);
        h.update(&mut ch);
        assert_eq!(ch.volume, 0);
    }

    fn wave_instrument() -> Arc<Instrument> {
        let waves = WaveTable::new(8, 2)
            .with_position(0x20)
            .with_wave(0, &[1, 2, 3, 4, 5, 6, 7, 8])
            .with_wave(1, &[0xF, 0, 0xF, 0, 0xF, 0, 0xF, 0]);
        Arc::new(Instrument::new(InstrumentType::N163, "wave").with_waves(waves))
    }

    fn wave_channel() -> MockChannel {
        MockChannel {
            note: Some(0),
            accept_duty: true,
            wavetable: Some(MockWaves::default()),
            ..Default::default()
        }
    }

    #[test]
    fn test_wavetable_load_copies_layout() {
        let mut ch = wave_channel();
        let mut h = WavetableHandler::new(DEFAULT_VOLUME);
        h.load_instrument(wave_instrument(), &mut ch);
        let waves = ch.wavetable.as_ref().unwrap();
        assert_eq!((waves.length, waves.position, waves.count), (8, 0x20, 2));
        assert!(h.is_update_requested());
    }

    #[test]
    fn test_wavetable_packs_nibbles() {
        let mut ch = wave_channel();
        let mut h = WavetableHandler::new(DEFAULT_VOLUME);
        h.load_instrument(wave_instrument(), &mut ch);
        h.trigger(&mut ch);
        h.update(&mut ch);
        let sent = &ch.wavetable.as_ref().unwrap().sent;
        assert_eq!(sent, &vec![vec![0x21, 0x43, 0x65, 0x87]]);
        assert!(!h.is_update_requested());
    }

    #[test]
    fn test_wavetable_skips_unchanged_wave() {
        let mut ch = wave_channel();
        let mut h = WavetableHandler::new(DEFAULT_VOLUME);
        h.load_instrument(wave_instrument(), &mut ch);
        h.trigger(&mut ch);
        h.update(&mut ch);
        h.update(&mut ch);
        h.update(&mut ch);
        assert_eq!(ch.wavetable.as_ref().unwrap().sent.len(), 1);

        ch.duty = 1;
        h.update(&mut ch);
        let sent = &ch.wavetable.as_ref().unwrap().sent;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1], vec![0x0F; 4]);
    }

    #[test]
    fn test_wavetable_clamps_wave_index() {
        let mut ch = wave_channel();
        ch.duty = 40;
        let mut h = WavetableHandler::new(DEFAULT_VOLUME);
        h.load_instrument(wave_instrument(), &mut ch);
        h.update(&mut ch);
        assert_eq!(ch.wavetable.as_ref().unwrap().sent[0], vec![0x0F; 4]);
    }

    #[test]
    fn test_handler_families() {
        assert_eq!(
            InstHandler::for_instrument(InstrumentType::N163).map(|h| h.family()),
            Some(HandlerFamily::Wavetable)
        );
        assert_eq!(
            InstHandler::for_instrument(InstrumentType::Vrc6).map(|h| h.family()),
            Some(HandlerFamily::Sequence)
        );
        assert!(InstHandler::for_instrument(InstrumentType::Vrc7).is_none());
    }
}
