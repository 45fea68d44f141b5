//! Sequence ↔ text conversion
//!
//! Sequences are edited as whitespace-separated terms. `|` marks the loop
//! point and `/` the release point at the position of the next item. How a
//! term maps to items depends on the sequence: a [`SeqConversion`] strategy
//! is chosen from the sequence type, its setting and the instrument family.
//!
//! ```text
//! volume    15 12'2 | 10:2:6 / 3 0
//! arpeggio  0 x y+3 -y        (scheme)
//! arpeggio  C-4 E-4 G-4       (fixed)
//! duty      15t 0tn 3e        (Sunsoft 5B)
//! ```

mod arp_fixed;
mod arp_scheme;
mod default;
mod flagged;

pub use arp_fixed::ArpFixedConversion;
pub use arp_scheme::ArpSchemeConversion;
pub use default::DefaultConversion;
pub use flagged::{FlaggedConversion, S5bMode};

use log::warn;

use crate::instrument::{InstrumentType, Sequence, SequenceSetting, SequenceType, MAX_SEQUENCE_ITEMS};

/// Loop point marker
pub const LOOP_MARKER: &str = "|";
/// Release point marker
pub const RELEASE_MARKER: &str = "/";

/// Mapping between sequence items and text terms
///
/// A term may stand for any number of items. After each call to
/// [`to_value`](Self::to_value), and before and after a whole parse, the
/// caller drains [`get_value`](Self::get_value) while
/// [`is_ready`](Self::is_ready) holds.
pub trait SeqConversion {
    /// Text of one item
    fn to_string(&self, value: i8) -> String;

    /// Stage the items of one term; `false` if the term is not understood,
    /// in which case nothing is staged
    fn to_value(&mut self, token: &str) -> bool;

    /// Whether a staged item is waiting
    fn is_ready(&self) -> bool;

    /// Take the next staged item
    fn get_value(&mut self) -> i8;

    /// Called before a parse
    fn on_start(&mut self) {}

    /// Called after a parse
    fn on_finish(&mut self) {}
}

/// Pick the conversion for a sequence
pub fn conversion_for(
    kind: SequenceType,
    setting: SequenceSetting,
    family: InstrumentType,
) -> Box<dyn SeqConversion> {
    match kind {
        SequenceType::Volume => Box::new(DefaultConversion::new(0, 15)),
        SequenceType::Arpeggio => match setting {
            SequenceSetting::Scheme => Box::new(ArpSchemeConversion::new()),
            SequenceSetting::Fixed => Box::new(ArpFixedConversion::new()),
            _ => Box::new(DefaultConversion::new(-96, 96)),
        },
        SequenceType::Pitch | SequenceType::HiPitch => Box::new(DefaultConversion::new(-128, 127)),
        SequenceType::Duty => match family {
            InstrumentType::S5b => Box::new(FlaggedConversion::new()),
            InstrumentType::N163 => Box::new(DefaultConversion::new(0, 63)),
            _ => Box::new(DefaultConversion::new(0, 7)),
        },
    }
}

/// Outcome of [`SequenceParser::parse`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseReport {
    /// Terms that were not understood, in input order
    pub skipped: Vec<String>,
    /// Items dropped because the sequence was full
    pub overflow: usize,
}

impl ParseReport {
    /// Whether every term was used
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty() && self.overflow == 0
    }
}

/// Reads and writes sequence text through a conversion strategy
pub struct SequenceParser {
    conversion: Box<dyn SeqConversion>,
}

impl SequenceParser {
    /// Use a specific conversion
    pub fn new(conversion: Box<dyn SeqConversion>) -> Self {
        Self { conversion }
    }

    /// Use the conversion matching a sequence
    pub fn for_sequence(kind: SequenceType, setting: SequenceSetting, family: InstrumentType) -> Self {
        Self::new(conversion_for(kind, setting, family))
    }

    /// Replace the conversion
    pub fn set_conversion(&mut self, conversion: Box<dyn SeqConversion>) {
        self.conversion = conversion;
    }

    /// Text of a whole sequence
    pub fn print(&self, seq: &Sequence) -> String {
        let mut terms = Vec::with_capacity(seq.len() + 2);
        for (index, &item) in seq.items().iter().enumerate() {
            if seq.loop_point() == Some(index) {
                terms.push(LOOP_MARKER.to_string());
            }
            if seq.release_point() == Some(index) {
                terms.push(RELEASE_MARKER.to_string());
            }
            terms.push(self.conversion.to_string(item));
        }
        terms.join(" ")
    }

    /// Replace the items and markers of `seq` from text
    ///
    /// Unknown terms are skipped; markers that end up past the last item are
    /// dropped. The sequence setting is left as is.
    pub fn parse(&mut self, seq: &mut Sequence, text: &str) -> ParseReport {
        let mut report = ParseReport::default();
        let mut items = Vec::new();
        let mut loop_point = None;
        let mut release_point = None;

        self.conversion.on_start();
        self.drain(&mut items, &mut report);
        for token in text.split_whitespace() {
            match token {
                LOOP_MARKER => loop_point = Some(items.len()),
                RELEASE_MARKER => release_point = Some(items.len()),
                _ => {
                    if !self.conversion.to_value(token) {
                        warn!("Skipping unrecognized sequence term '{token}'");
                        report.skipped.push(token.to_string());
                    }
                }
            }
            self.drain(&mut items, &mut report);
        }
        self.conversion.on_finish();
        self.drain(&mut items, &mut report);

        seq.set_items(items);
        seq.set_loop_point(loop_point);
        seq.set_release_point(release_point);
        report
    }

    fn drain(&mut self, items: &mut Vec<i8>, report: &mut ParseReport) {
        while self.conversion.is_ready() {
            let value = self.conversion.get_value();
            if items.len() < MAX_SEQUENCE_ITEMS {
                items.push(value);
            } else {
                report.overflow += 1;
            }
        }
    }
}

impl std::fmt::Debug for SequenceParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceParser").finish_non_exhaustive()
    }
}
