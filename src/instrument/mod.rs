//! Instrument model
//!
//! Instruments own up to five parameter sequences and, for N163 instruments,
//! a set of 4-bit waveforms. Sequences and instruments are shared through
//! `Arc` so a running note keeps its data even if the bank is edited.

pub mod cursor;
pub mod handler;

use std::sync::Arc;

pub use cursor::{SequenceCursor, SequenceState, SequenceStep};
pub use handler::{HandlerFamily, InstHandler, SequenceHandler, WavetableHandler};

/// Maximum number of items in a sequence
pub const MAX_SEQUENCE_ITEMS: usize = 252;
/// Maximum N163 waveform length in samples
pub const MAX_WAVE_SIZE: usize = 240;
/// Maximum number of waveforms per N163 instrument
pub const MAX_WAVE_COUNT: usize = 64;
/// Number of instrument slots in a bank
pub const MAX_INSTRUMENTS: usize = 64;

/// Lowest arpeggio scheme offset
pub const ARP_SCHEME_MIN: i32 = -27;
/// Highest arpeggio scheme offset
pub const ARP_SCHEME_MAX: i32 = 36;

/// Which part of the `0xy` effect an arpeggio scheme item adds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpScheme {
    /// Offset only
    None,
    /// Offset + x
    X,
    /// Offset + y
    Y,
    /// Offset − y
    NegY,
}

/// Split a scheme arpeggio item into its offset and scheme
///
/// The low six bits hold the offset (values above 36 wrap to negative), the
/// top two bits select the scheme.
pub fn decode_arp_scheme(raw: i8) -> (i32, ArpScheme) {
    let raw = raw as u8;
    let mut offset = (raw & 0x3F) as i32;
    if offset > ARP_SCHEME_MAX {
        offset -= 64;
    }
    let scheme = match raw >> 6 {
        0 => ArpScheme::None,
        1 => ArpScheme::X,
        2 => ArpScheme::Y,
        _ => ArpScheme::NegY,
    };
    (offset, scheme)
}

/// Pack an offset and a scheme into a sequence item
pub fn encode_arp_scheme(offset: i32, scheme: ArpScheme) -> i8 {
    let flag = match scheme {
        ArpScheme::None => 0x00,
        ArpScheme::X => 0x40,
        ArpScheme::Y => 0x80,
        ArpScheme::NegY => 0xC0,
    };
    ((offset.clamp(ARP_SCHEME_MIN, ARP_SCHEME_MAX) as u8 & 0x3F) | flag) as i8
}

/// Parameter driven by a sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SequenceType {
    /// Volume envelope
    Volume = 0,
    /// Note offsets
    Arpeggio = 1,
    /// Fine period offsets
    Pitch = 2,
    /// Coarse period offsets (×16)
    HiPitch = 3,
    /// Duty cycle or wave index
    Duty = 4,
}

impl SequenceType {
    /// Every type in update order
    pub const ALL: [SequenceType; 5] = [
        SequenceType::Volume,
        SequenceType::Arpeggio,
        SequenceType::Pitch,
        SequenceType::HiPitch,
        SequenceType::Duty,
    ];

    /// Slot index inside an instrument
    pub fn index(self) -> usize {
        self as usize
    }
}

/// How a sequence's items are interpreted
///
/// The meaning depends on the sequence type: `Fixed`, `Relative` and
/// `Scheme` apply to arpeggios, `Absolute` to pitch. `Default` is an
/// absolute arpeggio or a relative pitch sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SequenceSetting {
    /// Type default
    #[default]
    Default,
    /// Arpeggio items are note indices
    Fixed,
    /// Arpeggio items accumulate into the note
    Relative,
    /// Arpeggio items combine an offset with the `0xy` effect
    Scheme,
    /// Pitch items replace the offset instead of adding to it
    Absolute,
}

/// Ordered signed-byte items with optional loop and release points
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Sequence {
    items: Vec<i8>,
    loop_point: Option<usize>,
    release_point: Option<usize>,
    setting: SequenceSetting,
}

impl Sequence {
    /// Create an empty sequence
    pub fn new(setting: SequenceSetting) -> Self {
        Self {
            setting,
            ..Self::default()
        }
    }

    /// Create a sequence from items, truncated to the maximum length
    pub fn from_items(items: &[i8]) -> Self {
        let mut seq = Self::default();
        seq.set_items(items.to_vec());
        seq
    }

    /// Builder: set the loop point
    pub fn with_loop(mut self, index: usize) -> Self {
        self.set_loop_point(Some(index));
        self
    }

    /// Builder: set the release point
    pub fn with_release(mut self, index: usize) -> Self {
        self.set_release_point(Some(index));
        self
    }

    /// Builder: set the interpretation
    pub fn with_setting(mut self, setting: SequenceSetting) -> Self {
        self.setting = setting;
        self
    }

    /// Items in playback order
    pub fn items(&self) -> &[i8] {
        &self.items
    }

    /// Item at an index, 0 past the end
    pub fn item(&self, index: usize) -> i8 {
        self.items.get(index).copied().unwrap_or(0)
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the sequence has no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Replace all items; markers past the new end are dropped
    pub fn set_items(&mut self, mut items: Vec<i8>) {
        items.truncate(MAX_SEQUENCE_ITEMS);
        self.items = items;
        let len = self.items.len();
        self.loop_point = self.loop_point.filter(|&p| p < len);
        self.release_point = self.release_point.filter(|&p| p < len);
    }

    /// Loop point, if any
    pub fn loop_point(&self) -> Option<usize> {
        self.loop_point
    }

    /// Set the loop point; indices past the end clear it
    pub fn set_loop_point(&mut self, index: Option<usize>) {
        self.loop_point = index.filter(|&p| p < self.items.len());
    }

    /// Release point, if any
    pub fn release_point(&self) -> Option<usize> {
        self.release_point
    }

    /// Set the release point; indices past the end clear it
    pub fn set_release_point(&mut self, index: Option<usize>) {
        self.release_point = index.filter(|&p| p < self.items.len());
    }

    /// Interpretation of the items
    pub fn setting(&self) -> SequenceSetting {
        self.setting
    }

    /// Change the interpretation of the items
    pub fn set_setting(&mut self, setting: SequenceSetting) {
        self.setting = setting;
    }
}

/// Instrument families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstrumentType {
    /// 2A03
    Apu,
    /// VRC6
    Vrc6,
    /// VRC7 (FM patch, no sequences)
    Vrc7,
    /// FDS
    Fds,
    /// Namco 163
    N163,
    /// Sunsoft 5B
    S5b,
}

/// N163 waveform set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaveTable {
    size: usize,
    position: u8,
    count: usize,
    samples: Vec<u8>,
}

impl WaveTable {
    /// Create `count` silent waves of `size` samples
    ///
    /// `size` must be a multiple of 4 in 4..=240 and `count` in 1..=64.
    pub fn new(size: usize, count: usize) -> Self {
        debug_assert!((4..=MAX_WAVE_SIZE).contains(&size) && size % 4 == 0);
        debug_assert!((1..=MAX_WAVE_COUNT).contains(&count));
        Self {
            size,
            position: 0,
            count,
            samples: vec![0; size * count],
        }
    }

    /// Builder: set the RAM position
    pub fn with_position(mut self, position: u8) -> Self {
        self.position = position;
        self
    }

    /// Builder: set one wave's samples
    pub fn with_wave(mut self, index: usize, samples: &[u8]) -> Self {
        self.set_wave(index, samples);
        self
    }

    /// Samples per wave
    pub fn size(&self) -> usize {
        self.size
    }

    /// RAM position in samples
    pub fn position(&self) -> u8 {
        self.position
    }

    /// Number of waves
    pub fn count(&self) -> usize {
        self.count
    }

    /// Sample value (0-15), 0 outside the table
    pub fn sample(&self, wave: usize, index: usize) -> u8 {
        if wave >= self.count || index >= self.size {
            return 0;
        }
        self.samples[wave * self.size + index]
    }

    /// Store one sample, masked to 4 bits
    pub fn set_sample(&mut self, wave: usize, index: usize, value: u8) {
        if wave < self.count && index < self.size {
            self.samples[wave * self.size + index] = value & 0x0F;
        }
    }

    /// Store a whole wave; extra samples are ignored
    pub fn set_wave(&mut self, wave: usize, samples: &[u8]) {
        for (i, &value) in samples.iter().take(self.size).enumerate() {
            self.set_sample(wave, i, value);
        }
    }
}

/// An instrument: family, sequences and optional waveforms
#[derive(Debug, Clone, PartialEq)]
pub struct Instrument {
    name: String,
    kind: InstrumentType,
    sequences: [Option<Arc<Sequence>>; 5],
    waves: Option<WaveTable>,
}

impl Instrument {
    /// Create an instrument without sequences
    pub fn new(kind: InstrumentType, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            sequences: Default::default(),
            waves: None,
        }
    }

    /// Builder: enable a sequence
    pub fn with_sequence(mut self, kind: SequenceType, sequence: Sequence) -> Self {
        self.sequences[kind.index()] = Some(Arc::new(sequence));
        self
    }

    /// Builder: attach waveforms
    pub fn with_waves(mut self, waves: WaveTable) -> Self {
        self.waves = Some(waves);
        self
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Instrument family
    pub fn kind(&self) -> InstrumentType {
        self.kind
    }

    /// Enabled sequence of a type
    pub fn sequence(&self, kind: SequenceType) -> Option<&Arc<Sequence>> {
        self.sequences[kind.index()].as_ref()
    }

    /// Waveforms of an N163 instrument
    pub fn waves(&self) -> Option<&WaveTable> {
        self.waves.as_ref()
    }
}

/// Indexed instrument slots
#[derive(Debug, Clone, Default)]
pub struct InstrumentBank {
    slots: Vec<Option<Arc<Instrument>>>,
}

impl InstrumentBank {
    /// Create an empty bank
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an instrument; indices past the last slot are ignored
    pub fn insert(&mut self, index: u8, instrument: Instrument) -> Option<Arc<Instrument>> {
        let index = index as usize;
        if index >= MAX_INSTRUMENTS {
            return None;
        }
        if self.slots.len() <= index {
            self.slots.resize(index + 1, None);
        }
        let instrument = Arc::new(instrument);
        self.slots[index] = Some(Arc::clone(&instrument));
        Some(instrument)
    }

    /// Instrument at a slot
    pub fn get(&self, index: u8) -> Option<Arc<Instrument>> {
        self.slots.get(index as usize).and_then(Clone::clone)
    }

    /// Clear a slot, returning what it held
    pub fn remove(&mut self, index: u8) -> Option<Arc<Instrument>> {
        self.slots.get_mut(index as usize).and_then(Option::take)
    }

    /// Number of occupied slots
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Whether no slot is occupied
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_markers_follow_length() {
        let mut seq = Sequence::from_items(&[1, 2, 3, 4]).with_loop(1).with_release(3);
        assert_eq!(seq.loop_point(), Some(1));
        seq.set_items(vec![1, 2, 3]);
        assert_eq!(seq.loop_point(), Some(1));
        assert_eq!(seq.release_point(), None);
        seq.set_loop_point(Some(7));
        assert_eq!(seq.loop_point(), None);
    }

    #[test]
    fn test_sequence_truncated() {
        let seq = Sequence::from_items(&[0; 300]);
        assert_eq!(seq.len(), MAX_SEQUENCE_ITEMS);
        assert_eq!(seq.item(400), 0);
    }

    #[test]
    fn test_sequence_type_index() {
        assert_eq!(SequenceType::HiPitch.index(), 3);
        for (i, kind) in SequenceType::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn test_arp_scheme_packing() {
        assert_eq!(decode_arp_scheme(encode_arp_scheme(-27, ArpScheme::Y)), (-27, ArpScheme::Y));
        assert_eq!(decode_arp_scheme(encode_arp_scheme(36, ArpScheme::None)), (36, ArpScheme::None));
        assert_eq!(encode_arp_scheme(0, ArpScheme::NegY), 0xC0u8 as i8);
        assert_eq!(decode_arp_scheme(0x7F), (-1, ArpScheme::X));
    }

    #[test]
    fn test_wave_table_samples() {
        let waves = WaveTable::new(8, 2).with_wave(1, &[0x1F, 2, 3]);
        assert_eq!(waves.sample(1, 0), 0x0F);
        assert_eq!(waves.sample(1, 2), 3);
        assert_eq!(waves.sample(0, 0), 0);
        assert_eq!(waves.sample(2, 0), 0);
        assert_eq!(waves.sample(1, 8), 0);
    }

    #[test]
    fn test_bank_slots() {
        let mut bank = InstrumentBank::new();
        assert!(bank.is_empty());
        bank.insert(3, Instrument::new(InstrumentType::N163, "wave"));
        assert_eq!(bank.len(), 1);
        assert_eq!(bank.get(3).unwrap().name(), "wave");
        assert!(bank.get(0).is_none());
        assert!(bank.insert(64, Instrument::new(InstrumentType::Apu, "x")).is_none());
        assert!(bank.remove(3).is_some());
        assert!(bank.get(3).is_none());
    }
}
