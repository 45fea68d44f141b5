//! Sequence playback cursor
//!
//! One cursor per sequence slot of a running instrument. The cursor is
//! stepped once per tick; loop and release points are honoured the way a
//! tracker plays an envelope: the release point holds until the note is
//! released, the loop point is ignored once the note is released past a
//! release point.

use std::sync::Arc;

use super::Sequence;

/// Playback state of a cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SequenceState {
    /// No sequence bound
    #[default]
    Disabled,
    /// Emitting one item per tick
    Running,
    /// Past the last item; reported once on the next step
    End,
    /// Finished
    Halted,
}

/// Outcome of one cursor step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceStep {
    /// Item to apply this tick
    Value(i8),
    /// The sequence just finished
    Ended,
    /// Nothing to do
    Idle,
}

/// Position inside a shared sequence
#[derive(Debug, Clone, Default)]
pub struct SequenceCursor {
    sequence: Option<Arc<Sequence>>,
    position: usize,
    state: SequenceState,
}

impl SequenceCursor {
    /// Create an unbound cursor
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a sequence and rewind; empty or missing sequences disable it
    pub fn bind(&mut self, sequence: Option<Arc<Sequence>>) {
        self.sequence = sequence.filter(|seq| !seq.is_empty());
        self.reset();
    }

    /// Rewind to the first item
    pub fn reset(&mut self) {
        self.position = 0;
        self.state = if self.sequence.is_some() {
            SequenceState::Running
        } else {
            SequenceState::Disabled
        };
    }

    /// Jump to the release point, if the sequence has one
    pub fn release(&mut self) {
        let Some(release) = self.sequence.as_ref().and_then(|seq| seq.release_point()) else {
            return;
        };
        self.position = release;
        self.state = SequenceState::Running;
    }

    /// Advance one tick
    ///
    /// `releasing` is whether the note has been released.
    pub fn step(&mut self, releasing: bool) -> SequenceStep {
        let Some(seq) = self.sequence.as_ref() else {
            return SequenceStep::Idle;
        };

        match self.state {
            SequenceState::Running => {
                let value = seq.item(self.position);
                self.position += 1;

                let count = seq.len();
                let release = seq.release_point();
                let at_release = release.is_some_and(|r| self.position == r + 1);

                if at_release || self.position >= count {
                    match seq.loop_point() {
                        Some(loop_point) if !(releasing && release.is_some()) => {
                            self.position = loop_point;
                        }
                        _ if self.position >= count => {
                            self.state = SequenceState::End;
                        }
                        _ if !releasing => {
                            // Hold on the release item until the note is released
                            self.position -= 1;
                        }
                        _ => {}
                    }
                }
                SequenceStep::Value(value)
            }
            SequenceState::End => {
                self.state = SequenceState::Halted;
                SequenceStep::Ended
            }
            SequenceState::Disabled | SequenceState::Halted => SequenceStep::Idle,
        }
    }

    /// Current state
    pub fn state(&self) -> SequenceState {
        self.state
    }

    /// Index of the next item
    pub fn position(&self) -> usize {
        self.position
    }

    /// Bound sequence
    pub fn sequence(&self) -> Option<&Arc<Sequence>> {
        self.sequence.as_ref()
    }
}
