//! Pattern row storage
//!
//! A pattern holds up to [`MAX_PATTERN_ROWS`] rows but most patterns of a
//! module are never touched, so the row array is only allocated on the first
//! mutable access. Reads of an unallocated pattern see blank rows.

use std::fmt;

use crate::channel::effects::EffectCommand;
use crate::tables::note_name;

/// Rows per pattern
pub const MAX_PATTERN_ROWS: usize = 256;

/// Effect columns per row
pub const MAX_EFFECT_COLUMNS: usize = 4;

const BLANK: PatternNote = PatternNote::blank();

/// Note column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Note {
    /// Empty
    #[default]
    None,
    /// Note index (0-95)
    Note(u8),
    /// Note release `===`
    Release,
    /// Note cut `---`
    Halt,
}

/// One pattern row of one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PatternNote {
    /// Note column
    pub note: Note,
    /// Instrument column
    pub instrument: Option<u8>,
    /// Volume column (0-15)
    pub volume: Option<u8>,
    /// Effect columns
    pub effects: [EffectCommand; MAX_EFFECT_COLUMNS],
}

impl PatternNote {
    /// An empty row
    pub const fn blank() -> Self {
        Self {
            note: Note::None,
            instrument: None,
            volume: None,
            effects: [EffectCommand::EMPTY; MAX_EFFECT_COLUMNS],
        }
    }

    /// A row playing `note` with `instrument`
    pub fn note(note: u8, instrument: u8) -> Self {
        Self {
            note: Note::Note(note),
            instrument: Some(instrument),
            ..Self::blank()
        }
    }

    /// Set the volume column
    pub fn with_volume(mut self, volume: u8) -> Self {
        self.volume = Some(volume);
        self
    }

    /// Put an effect into the first free effect column
    pub fn with_effect(mut self, cmd: EffectCommand) -> Self {
        if let Some(slot) = self.effects.iter_mut().find(|slot| slot.is_empty()) {
            *slot = cmd;
        }
        self
    }

    /// Whether every column is empty
    pub fn is_blank(&self) -> bool {
        *self == BLANK
    }
}

impl fmt::Display for PatternNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.note {
            Note::None => write!(f, "...")?,
            Note::Note(n) => f.write_str(&note_name(n))?,
            Note::Release => write!(f, "===")?,
            Note::Halt => write!(f, "---")?,
        }
        match self.instrument {
            Some(inst) => write!(f, " {inst:02X}")?,
            None => write!(f, " ..")?,
        }
        match self.volume {
            Some(vol) => write!(f, " {vol:X}")?,
            None => write!(f, " .")?,
        }
        for cmd in &self.effects {
            write!(f, " {cmd}")?;
        }
        Ok(())
    }
}

/// Rows of one pattern, allocated on first write
#[derive(Debug, Clone, Default)]
pub struct PatternData {
    rows: Option<Box<[PatternNote; MAX_PATTERN_ROWS]>>,
}

impl PatternData {
    /// Create an unallocated pattern
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> &mut [PatternNote; MAX_PATTERN_ROWS] {
        self.rows
            .get_or_insert_with(|| Box::new([BLANK; MAX_PATTERN_ROWS]))
    }

    /// Whether the row array exists
    pub fn is_allocated(&self) -> bool {
        self.rows.is_some()
    }

    /// Row `row`; blank when unallocated
    pub fn get(&self, row: usize) -> &PatternNote {
        self.rows.as_ref().map_or(&BLANK, |rows| &rows[row])
    }

    /// Mutable row `row`, allocating the pattern
    pub fn get_mut(&mut self, row: usize) -> &mut PatternNote {
        &mut self.allocate()[row]
    }

    /// Replace row `row`, allocating the pattern
    pub fn set(&mut self, row: usize, note: PatternNote) {
        self.allocate()[row] = note;
    }

    /// Row capacity
    pub fn max_size(&self) -> usize {
        MAX_PATTERN_ROWS
    }

    /// The first `count` rows; empty when unallocated
    pub fn rows(&self, count: usize) -> &[PatternNote] {
        match &self.rows {
            Some(rows) => &rows[..count.min(MAX_PATTERN_ROWS)],
            None => &[],
        }
    }

    /// Non-blank rows among the first `count`
    pub fn note_count(&self, count: usize) -> usize {
        self.rows(count).iter().filter(|n| !n.is_blank()).count()
    }

    /// Whether every row is blank
    pub fn is_empty(&self) -> bool {
        self.rows(MAX_PATTERN_ROWS).iter().all(PatternNote::is_blank)
    }
}

impl PartialEq for PatternData {
    fn eq(&self, other: &Self) -> bool {
        match (&self.rows, &other.rows) {
            (None, None) => true,
            (Some(a), Some(b)) => a == b,
            _ => self.is_empty() && other.is_empty(),
        }
    }
}

impl Eq for PatternData {}
