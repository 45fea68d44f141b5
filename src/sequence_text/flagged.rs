//! Sunsoft 5B duty notation: a 0-31 noise period with mode letters
//!
//! `t` enables the tone, `n` the noise and `e` the envelope, so `15tn` is
//! tone plus noise at noise period 15. Bare periods stay decimal after `$$`
//! since `e` is also a hex digit; `$` still marks a hex period.

use bitflags::bitflags;
use nom::character::complete::one_of;
use nom::multi::fold_many0;
use nom::sequence::pair;
use nom::IResult;

use super::default::{number, Expander, Term};
use super::SeqConversion;

bitflags! {
    /// Mode bits stored above the noise period
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct S5bMode: u8 {
        /// Envelope enable
        const ENVELOPE = 0x20;
        /// Tone enable
        const TONE = 0x40;
        /// Noise enable
        const NOISE = 0x80;
    }
}

const PERIOD_MASK: u8 = 0x1F;

fn mode_letter(letter: char) -> S5bMode {
    match letter.to_ascii_lowercase() {
        't' => S5bMode::TONE,
        'n' => S5bMode::NOISE,
        _ => S5bMode::ENVELOPE,
    }
}

fn flagged_term(input: &str, _hex: bool) -> IResult<&str, Term> {
    let (input, (value, modes)) = pair(
        |i| number(i, false),
        fold_many0(one_of("tneTNE"), S5bMode::empty, |acc, c| acc | mode_letter(c)),
    )(input)?;
    Ok((
        input,
        Term {
            value,
            flags: modes.bits(),
        },
    ))
}

/// Noise period plus tone/noise/envelope letters
#[derive(Debug, Clone)]
pub struct FlaggedConversion {
    expander: Expander,
}

impl FlaggedConversion {
    /// Create the 5B conversion
    pub fn new() -> Self {
        Self {
            expander: Expander::new(0, PERIOD_MASK as i32),
        }
    }
}

impl Default for FlaggedConversion {
    fn default() -> Self {
        Self::new()
    }
}

impl SeqConversion for FlaggedConversion {
    fn to_string(&self, value: i8) -> String {
        let raw = value as u8;
        let modes = S5bMode::from_bits_truncate(raw);
        let mut text = (raw & PERIOD_MASK).to_string();
        for (mode, letter) in [
            (S5bMode::TONE, 't'),
            (S5bMode::NOISE, 'n'),
            (S5bMode::ENVELOPE, 'e'),
        ] {
            if modes.contains(mode) {
                text.push(letter);
            }
        }
        text
    }

    fn to_value(&mut self, token: &str) -> bool {
        self.expander.expand(token, flagged_term, |value, flags| {
            (value as u8 | flags) as i8
        })
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_print_modes() {
        let conv = FlaggedConversion::new();
        assert_eq!(conv.to_string(0x40 | 3), "3t");
        assert_eq!(conv.to_string((0x80u8 | 0x40 | 0x20 | 31) as i8), "31tne");
        assert_eq!(conv.to_string(7), "7");
    }

    #[test]
    fn test_parse_modes() {
        let mut conv = FlaggedConversion::new();
        assert!(conv.to_value("15nt"));
        assert_eq!(conv.get_value(), (0x80u8 | 0x40 | 15) as i8);
        assert!(!conv.is_ready());
    }

    #[test]
    fn test_modes_apply_to_whole_ramp() {
        let mut conv = FlaggedConversion::new();
        assert!(conv.to_value("0t:1:2"));
        let mut values = Vec::new();
        while conv.is_ready() {
            values.push(conv.get_value());
        }
        assert_eq!(values, vec![0x40, 0x41, 0x42]);
    }

    #[test]
    fn test_period_clamps() {
        let mut conv = FlaggedConversion::new();
        assert!(conv.to_value("40e"));
        assert_eq!(conv.get_value(), 0x20 | 31);
    }

    #[test]
    fn test_hex_switch_keeps_envelope_letter() {
        let mut conv = FlaggedConversion::new();
        assert!(conv.to_value("$$"));
        assert!(conv.to_value("3e"));
        assert_eq!(conv.get_value(), 0x20 | 3);
        assert!(conv.to_value("$1Ft"));
        assert_eq!(conv.get_value(), 0x40 | 31);
        assert!(!conv.is_ready());
    }

    #[test]
    fn test_rejects_unknown_letter() {
        let mut conv = FlaggedConversion::new();
        assert!(!conv.to_value("3q"));
        assert!(!conv.is_ready());
    }
}
