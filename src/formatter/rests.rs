//! Vertical alignment of rests to the notes around them.

use super::Formatter;
use crate::constants::REST_DEFAULT_LINE;
use crate::error::{FormatError, Result};
use crate::tickable::{mid_line, Tickable};
use crate::voice::Voice;

/// Rest line implied by the next sounding note after `index`. With
/// `compare`, the result is the midpoint of that and `current`.
fn rest_line_for_next_note_group(notes: &[Tickable], current: f64, index: usize, compare: bool) -> f64 {
    let next = notes
        .iter()
        .skip(index + 1)
        .find(|n| n.is_stave_note() && !n.is_rest() && !n.should_ignore_ticks())
        .map(Tickable::line_for_rest)
        .unwrap_or(current);
    if compare && current != next {
        mid_line(current.max(next), current.min(next))
    } else {
        next
    }
}

/// Move rests on the middle line toward their neighbours. Only beamed
/// rests move unless `align_all`; rests inside tuplets never do.
pub(crate) fn align_rests_to_notes(notes: &mut [Tickable], align_all: bool) {
    for index in 0..notes.len() {
        let current = &notes[index];
        if !current.is_rest() || current.tuplet().is_some() {
            continue;
        }
        if current.line_for_rest() != REST_DEFAULT_LINE || !(align_all || current.is_beamed()) {
            continue;
        }
        let own = current.key_line(0).unwrap_or(REST_DEFAULT_LINE);
        let line = if index == 0 {
            rest_line_for_next_note_group(notes, own, index, false)
        } else {
            let prev = &notes[index - 1];
            if !prev.is_stave_note() {
                own
            } else if prev.is_rest() {
                prev.key_line(0).unwrap_or(own)
            } else {
                rest_line_for_next_note_group(notes, prev.line_for_rest(), index, true)
            }
        };
        notes[index].set_key_line(0, line);
    }
}

impl Formatter {
    /// Align the rests of every voice to their neighbouring notes.
    pub fn align_rests(&self, voices: &mut [Voice], align_all: bool) -> Result<()> {
        if voices.is_empty() {
            return Err(FormatError::BadArgument("no voices to format rests".into()));
        }
        for voice in voices {
            align_rests_to_notes(voice.tickables_mut(), align_all);
        }
        Ok(())
    }
}
