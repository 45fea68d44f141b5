//! Fixed arpeggio notation: absolute notes shown by name

use nom::branch::alt;
use nom::character::complete::one_of;
use nom::combinator::map;
use nom::sequence::tuple;
use nom::IResult;

use super::default::{number, Expander, Term};
use super::SeqConversion;
use crate::tables::{note_name, NOTE_COUNT};

fn semitone(letter: char) -> i32 {
    match letter.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        _ => 11,
    }
}

/// `C-4`, `F#2`, `Bb3`
fn note(input: &str) -> IResult<&str, i32> {
    map(
        tuple((
            one_of("CDEFGABcdefgab"),
            one_of("-#b"),
            one_of("01234567"),
        )),
        |(letter, accidental, octave)| {
            let shift = match accidental {
                '#' => 1,
                'b' => -1,
                _ => 0,
            };
            let octave = octave.to_digit(10).unwrap_or(0) as i32;
            octave * 12 + semitone(letter) + shift
        },
    )(input)
}

fn fixed_term(input: &str, hex: bool) -> IResult<&str, Term> {
    map(alt((note, |i| number(i, hex))), Term::new)(input)
}

/// Absolute note indices
#[derive(Debug, Clone)]
pub struct ArpFixedConversion {
    expander: Expander,
}

impl ArpFixedConversion {
    /// Create the fixed-note conversion
    pub fn new() -> Self {
        Self {
            expander: Expander::new(0, NOTE_COUNT as i32 - 1),
        }
    }
}

impl Default for ArpFixedConversion {
    fn default() -> Self {
        Self::new()
    }
}

impl SeqConversion for ArpFixedConversion {
    fn to_string(&self, value: i8) -> String {
        note_name(value.clamp(0, NOTE_COUNT as i8 - 1) as u8)
    }

    fn to_value(&mut self, token: &str) -> bool {
        self.expander.expand(token, fixed_term, |note, _| note as i8)
    }

    fn is_ready(&self) -> bool {
        self.expander.is_ready()
    }

    fn get_value(&mut self) -> i8 {
        self.expander.next_value()
    }

    fn on_start(&mut self) {
        self.expander.reset();
    }
}
