//! Clock constants and note lookup tables

/// NTSC 2A03 CPU clock in Hz
pub const CPU_CLOCK_NTSC: f64 = 1_789_773.0;

/// PAL 2A07 CPU clock in Hz
pub const CPU_CLOCK_PAL: f64 = 1_662_607.0;

/// Number of playable notes (C-0 to B-7)
pub const NOTE_COUNT: usize = 96;

/// Note index of A-4
pub const NOTE_A4: usize = 57;

/// Sub-note bits used by linear pitch periods
pub const LINEAR_PITCH_AMOUNT: u32 = 5;

/// Length counter load values indexed by the upper five bits of register 3
pub const LENGTH_TABLE: [u8; 32] = [
    10, 254, 20, 2, 40, 4, 80, 6, 160, 8, 60, 10, 14, 12, 26, 14, 12, 16, 24, 18, 48, 20, 96, 22,
    192, 24, 72, 26, 16, 28, 32, 30,
];

/// Note names within an octave, as shown in pattern and sequence text
pub const NOTE_NAMES: [&str; 12] = [
    "C-", "C#", "D-", "D#", "E-", "F-", "F#", "G-", "G#", "A-", "A#", "B-",
];

/// Tracker name of a note index, `C-0` to `B-7`
pub fn note_name(note: u8) -> String {
    format!("{}{}", NOTE_NAMES[note as usize % 12], note / 12)
}

/// Frequency of a note index in Hz for the given A-4 reference
pub fn note_frequency(note: usize, a4_hz: f64) -> f64 {
    a4_hz * 2f64.powf((note as f64 - NOTE_A4 as f64) / 12.0)
}

/// N163 frequency-register values for every note
///
/// The N163 register grows with pitch and scales with the number of active
/// voices since they share one output slot each per update cycle.
pub fn n163_period_table(cpu_clock: f64, channels: u8, a4_hz: f64) -> Vec<u16> {
    let channels = channels.clamp(1, 8) as f64;
    (0..NOTE_COUNT)
        .map(|note| {
            let freq = note_frequency(note, a4_hz);
            let period = (freq * channels * 983_040.0 / cpu_clock) / 4.0;
            period.min(0xFFFF as f64) as u16
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_a4_reference() {
        assert_relative_eq!(note_frequency(NOTE_A4, 440.0), 440.0);
        assert_relative_eq!(note_frequency(NOTE_A4 + 12, 440.0), 880.0, max_relative = 1e-12);
    }

    #[test]
    fn test_note_name() {
        assert_eq!(note_name(0), "C-0");
        assert_eq!(note_name(NOTE_A4 as u8), "A-4");
        assert_eq!(note_name(95), "B-7");
    }

    #[test]
    fn test_n163_table_is_monotonic() {
        let table = n163_period_table(CPU_CLOCK_NTSC, 8, 440.0);
        assert_eq!(table.len(), NOTE_COUNT);
        assert!(table.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(table[NOTE_A4], 483);
    }

    #[test]
    fn test_n163_table_scales_with_channels() {
        let one = n163_period_table(CPU_CLOCK_NTSC, 1, 440.0);
        let eight = n163_period_table(CPU_CLOCK_NTSC, 8, 440.0);
        assert!(eight[NOTE_A4] > one[NOTE_A4] * 7);
    }
}
