//! Pattern effect commands
//!
//! Effects are stored as an id plus an 8-bit parameter and printed the way
//! they appear in a pattern column, e.g. `1A0` or `Z10`.

use std::fmt;

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

/// Effect ids understood by the channel state machines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, FromPrimitive)]
#[repr(u8)]
pub enum EffectType {
    /// Empty effect column
    #[default]
    None = 0,
    /// `0xy` arpeggio
    Arpeggio = 1,
    /// `1xx` slide up
    PortaUp = 2,
    /// `2xx` slide down
    PortaDown = 3,
    /// `3xx` automatic portamento
    Portamento = 4,
    /// `4xy` vibrato (speed x, depth y)
    Vibrato = 5,
    /// `Pxx` fine pitch, 0x80 is centered
    Pitch = 6,
    /// `Vxx` duty cycle / wave index
    DutyCycle = 7,
    /// `Zxx` N163 wave buffer position
    N163WaveBuffer = 8,
    /// `=xx` oscillator phase reset
    PhaseReset = 9,
}

impl EffectType {
    /// Column letter
    pub fn letter(self) -> char {
        match self {
            EffectType::None => '.',
            EffectType::Arpeggio => '0',
            EffectType::PortaUp => '1',
            EffectType::PortaDown => '2',
            EffectType::Portamento => '3',
            EffectType::Vibrato => '4',
            EffectType::Pitch => 'P',
            EffectType::DutyCycle => 'V',
            EffectType::N163WaveBuffer => 'Z',
            EffectType::PhaseReset => '=',
        }
    }

    /// Look up an effect by its column letter
    pub fn from_letter(letter: char) -> Option<Self> {
        let id = (1..=9u8)
            .filter_map(EffectType::from_u8)
            .find(|fx| fx.letter() == letter.to_ascii_uppercase())?;
        Some(id)
    }
}

/// One effect column entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EffectCommand {
    /// Effect id
    pub fx: EffectType,
    /// Parameter byte
    pub param: u8,
}

impl EffectCommand {
    /// Empty column
    pub const EMPTY: Self = Self::new(EffectType::None, 0);

    /// Create a command
    pub const fn new(fx: EffectType, param: u8) -> Self {
        Self { fx, param }
    }

    /// Decode a raw `(id, param)` pair, `None` for unknown ids
    pub fn from_raw(id: u8, param: u8) -> Option<Self> {
        EffectType::from_u8(id).map(|fx| Self { fx, param })
    }

    /// Whether the column is empty
    pub fn is_empty(&self) -> bool {
        self.fx == EffectType::None
    }
}

impl fmt::Display for EffectCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("...");
        }
        write!(f, "{}{:02X}", self.fx.letter(), self.param)
    }
}

/// Error parsing effect command text
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseEffectError {
    /// No text
    #[error("empty effect command")]
    Empty,

    /// First character is not an effect letter
    #[error("unknown effect '{0}'")]
    UnknownEffect(char),

    /// Parameter is not a hex byte
    #[error("invalid effect parameter '{0}'")]
    InvalidParam(String),
}

impl std::str::FromStr for EffectCommand {
    type Err = ParseEffectError;

    /// Parse `"1A0"`-style text
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let letter = chars.next().ok_or(ParseEffectError::Empty)?;
        let fx = EffectType::from_letter(letter).ok_or(ParseEffectError::UnknownEffect(letter))?;
        let param = chars.as_str();
        let param = u8::from_str_radix(param, 16)
            .map_err(|_| ParseEffectError::InvalidParam(param.to_string()))?;
        Ok(Self { fx, param })
    }
}

/// Format a command the way it appears in a pattern column
pub fn command_string(fx: EffectType, param: u8) -> String {
    EffectCommand::new(fx, param).to_string()
}
