//! Ranged integer notation and the term expansion shared by every strategy
//!
//! Token grammar (`term` is strategy specific):
//!
//! ```text
//! token  := "$$" | term [ ":" hold ":" term ] [ "'" repeat ]
//! number := [ "-" ] ( "$" hex | digits )
//! ```
//!
//! `a:d:b` ramps from `a` to `b` one step at a time, holding each value for
//! `d` items. `n'r` emits every value `r` times. After `$$`, bare numbers are
//! read as hexadecimal for the rest of the parse.

use std::collections::VecDeque;

use nom::branch::alt;
use nom::character::complete::{char, digit1, hex_digit1};
use nom::combinator::{all_consuming, map, map_res, opt, verify};
use nom::sequence::{pair, preceded, tuple};
use nom::IResult;

use super::SeqConversion;
use crate::instrument::MAX_SEQUENCE_ITEMS;

/// One parsed term: a number plus strategy-specific flag bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(super) struct Term {
    pub value: i32,
    pub flags: u8,
}

impl Term {
    pub fn new(value: i32) -> Self {
        Self { value, flags: 0 }
    }
}

#[derive(Debug, Clone, Copy)]
struct Expression {
    start: Term,
    ramp: Option<(usize, Term)>,
    repeat: usize,
}

impl Expression {
    fn flags(&self) -> u8 {
        self.start.flags | self.ramp.map_or(0, |(_, end)| end.flags)
    }

    fn values(&self, min: i32, max: i32) -> Vec<i32> {
        let start = self.start.value.clamp(min, max);
        let (hold, end) = match self.ramp {
            Some((hold, end)) => (hold, end.value.clamp(min, max)),
            None => (1, start),
        };
        let step = if end >= start { 1 } else { -1 };
        let per_value = hold.saturating_mul(self.repeat);

        let mut values = Vec::new();
        let mut value = start;
        loop {
            let room = MAX_SEQUENCE_ITEMS - values.len();
            values.extend(std::iter::repeat(value).take(per_value.min(room)));
            if value == end || values.len() >= MAX_SEQUENCE_ITEMS {
                break;
            }
            value += step;
        }
        values
    }
}

fn digits(input: &str, hex: bool) -> IResult<&str, &str> {
    if hex {
        hex_digit1(input)
    } else {
        digit1(input)
    }
}

/// Signed number; `$` forces hexadecimal, `hex` makes it the default
pub(super) fn number(input: &str, hex: bool) -> IResult<&str, i32> {
    let radix = if hex { 16 } else { 10 };
    let (input, negative) = opt(char('-'))(input)?;
    let (input, value) = alt((
        map_res(preceded(char('$'), hex_digit1), |s: &str| {
            i32::from_str_radix(s, 16)
        }),
        map_res(|i| digits(i, hex), |s: &str| i32::from_str_radix(s, radix)),
    ))(input)?;
    Ok((input, if negative.is_some() { -value } else { value }))
}

/// Hold or repeat count, at least 1
fn count(input: &str) -> IResult<&str, usize> {
    verify(map_res(digit1, |s: &str| s.parse::<usize>()), |n: &usize| *n > 0)(input)
}

fn expression<'a, F>(input: &'a str, hex: bool, term: &F) -> IResult<&'a str, Expression>
where
    F: Fn(&'a str, bool) -> IResult<&'a str, Term>,
{
    map(
        tuple((
            |i| term(i, hex),
            opt(preceded(
                char(':'),
                pair(count, preceded(char(':'), |i| term(i, hex))),
            )),
            opt(preceded(char('\''), count)),
        )),
        |(start, ramp, repeat)| Expression {
            start,
            ramp,
            repeat: repeat.unwrap_or(1),
        },
    )(input)
}

/// Token expansion state shared by the conversion strategies
#[derive(Debug, Clone)]
pub(super) struct Expander {
    min: i32,
    max: i32,
    hex: bool,
    pending: VecDeque<i8>,
}

impl Expander {
    pub fn new(min: i32, max: i32) -> Self {
        Self {
            min,
            max,
            hex: false,
            pending: VecDeque::new(),
        }
    }

    pub fn min(&self) -> i32 {
        self.min
    }

    pub fn max(&self) -> i32 {
        self.max
    }

    pub fn reset(&mut self) {
        self.hex = false;
        self.pending.clear();
    }

    pub fn is_ready(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn next_value(&mut self) -> i8 {
        self.pending.pop_front().unwrap_or(0)
    }

    /// Queue the items of one token
    ///
    /// `term` parses a single term, `encode` packs a clamped value and the
    /// token's flags into an item. Nothing is queued unless the whole token
    /// parses.
    pub fn expand<T, E>(&mut self, token: &str, term: T, encode: E) -> bool
    where
        T: Fn(&str, bool) -> IResult<&str, Term>,
        E: Fn(i32, u8) -> i8,
    {
        if token == "$$" {
            self.hex = true;
            return true;
        }
        let hex = self.hex;
        let Ok((_, expr)) = all_consuming(|i| expression(i, hex, &term))(token) else {
            return false;
        };
        let flags = expr.flags();
        self.pending.extend(
            expr.values(self.min, self.max)
                .into_iter()
                .map(|value| encode(value, flags)),
        );
        true
    }
}

/// Plain integers within a range
#[derive(Debug, Clone)]
pub struct DefaultConversion {
    expander: Expander,
}

impl DefaultConversion {
    /// Accept values in `min..=max`
    pub fn new(min: i32, max: i32) -> Self {
        Self {
            expander: Expander::new(min, max),
        }
    }

    /// Value range
    pub fn range(&self) -> (i32, i32) {
        (self.expander.min(), self.expander.max())
    }
}

fn plain_term(input: &str, hex: bool) -> IResult<&str, Term> {
    map(|i| number(i, hex), Term::new)(input)
}

impl SeqConversion for DefaultConversion {
    fn to_string(&self, value: i8) -> String {
        value.to_string()
    }

    fn to_value(&mut self, token: &str) -> bool {
        self.expander.expand(token, plain_term, |value, _| value as i8)
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
