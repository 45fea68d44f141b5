//! Arpeggio scheme notation
//!
//! Items combine a semitone offset with one of the nibbles of the `0xy`
//! effect: `x`, `y+3`, `-y-2`, or a plain offset such as `12`. The offset may
//! also come first (`3+x`).

use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::char;
use nom::combinator::{map, opt, value};
use nom::sequence::{pair, preceded};
use nom::IResult;

use super::default::{number, Expander, Term};
use super::SeqConversion;
use crate::instrument::{decode_arp_scheme, encode_arp_scheme, ArpScheme, ARP_SCHEME_MAX, ARP_SCHEME_MIN};

fn scheme_flag(scheme: ArpScheme) -> u8 {
    match scheme {
        ArpScheme::None => 0x00,
        ArpScheme::X => 0x40,
        ArpScheme::Y => 0x80,
        ArpScheme::NegY => 0xC0,
    }
}

fn flag_scheme(flags: u8) -> ArpScheme {
    match flags & 0xC0 {
        0x00 => ArpScheme::None,
        0x40 => ArpScheme::X,
        0x80 => ArpScheme::Y,
        _ => ArpScheme::NegY,
    }
}

fn scheme(input: &str) -> IResult<&str, ArpScheme> {
    alt((
        value(ArpScheme::NegY, tag("-y")),
        value(ArpScheme::X, tag("x")),
        value(ArpScheme::Y, tag("y")),
    ))(input)
}

fn signed_offset(input: &str, hex: bool) -> IResult<&str, i32> {
    alt((preceded(char('+'), |i| number(i, hex)), |i| number(i, hex)))(input)
}

fn scheme_term(input: &str, hex: bool) -> IResult<&str, Term> {
    let scheme_first = map(
        pair(scheme, opt(|i| signed_offset(i, hex))),
        |(scheme, offset)| (offset.unwrap_or(0), scheme),
    );
    let offset_first = map(
        pair(
            |i| number(i, hex),
            opt(alt((
                preceded(char('+'), scheme),
                value(ArpScheme::NegY, tag("-y")),
            ))),
        ),
        |(offset, scheme)| (offset, scheme.unwrap_or(ArpScheme::None)),
    );
    map(alt((scheme_first, offset_first)), |(value, scheme)| Term {
        value,
        flags: scheme_flag(scheme),
    })(input)
}

/// Offsets combined with the `0xy` effect nibbles
#[derive(Debug, Clone)]
pub struct ArpSchemeConversion {
    expander: Expander,
}

impl ArpSchemeConversion {
    /// Create the scheme conversion
    pub fn new() -> Self {
        Self {
            expander: Expander::new(ARP_SCHEME_MIN, ARP_SCHEME_MAX),
        }
    }
}

impl Default for ArpSchemeConversion {
    fn default() -> Self {
        Self::new()
    }
}

impl SeqConversion for ArpSchemeConversion {
    fn to_string(&self, value: i8) -> String {
        let (offset, scheme) = decode_arp_scheme(value);
        let prefix = match scheme {
            ArpScheme::None => return offset.to_string(),
            ArpScheme::X => "x",
            ArpScheme::Y => "y",
            ArpScheme::NegY => "-y",
        };
        match offset {
            0 => prefix.to_string(),
            o if o > 0 => format!("{prefix}+{o}"),
            o => format!("{prefix}{o}"),
        }
    }

    fn to_value(&mut self, token: &str) -> bool {
        self.expander.expand(token, scheme_term, |offset, flags| {
            encode_arp_scheme(offset, flag_scheme(flags))
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

    fn parse_one(token: &str) -> i8 {
        let mut conv = ArpSchemeConversion::new();
        assert!(conv.to_value(token), "token {token} rejected");
        conv.get_value()
    }

    #[test]
    fn test_print_schemes() {
        let conv = ArpSchemeConversion::new();
        assert_eq!(conv.to_string(encode_arp_scheme(0, ArpScheme::X)), "x");
        assert_eq!(conv.to_string(encode_arp_scheme(3, ArpScheme::Y)), "y+3");
        assert_eq!(conv.to_string(encode_arp_scheme(-2, ArpScheme::NegY)), "-y-2");
        assert_eq!(conv.to_string(encode_arp_scheme(12, ArpScheme::None)), "12");
        assert_eq!(conv.to_string(encode_arp_scheme(-27, ArpScheme::None)), "-27");
    }

    #[test]
    fn test_parse_schemes() {
        assert_eq!(parse_one("x"), encode_arp_scheme(0, ArpScheme::X));
        assert_eq!(parse_one("y+3"), encode_arp_scheme(3, ArpScheme::Y));
        assert_eq!(parse_one("-y-2"), encode_arp_scheme(-2, ArpScheme::NegY));
        assert_eq!(parse_one("-y"), encode_arp_scheme(0, ArpScheme::NegY));
        assert_eq!(parse_one("-4"), encode_arp_scheme(-4, ArpScheme::None));
    }

    #[test]
    fn test_offset_first() {
        assert_eq!(parse_one("3+x"), encode_arp_scheme(3, ArpScheme::X));
        assert_eq!(parse_one("5-y"), encode_arp_scheme(5, ArpScheme::NegY));
    }

    #[test]
    fn test_offset_clamps() {
        assert_eq!(parse_one("x+50"), encode_arp_scheme(ARP_SCHEME_MAX, ArpScheme::X));
        assert_eq!(parse_one("-40"), encode_arp_scheme(ARP_SCHEME_MIN, ArpScheme::None));
    }

    #[test]
    fn test_rejects_garbage() {
        let mut conv = ArpSchemeConversion::new();
        assert!(!conv.to_value("z"));
        assert!(!conv.to_value("x+"));
        assert!(!conv.is_ready());
    }
}
