//! Bends and vibratos, drawn to the right of the note above the stave.

use super::{ModRef, ModifierKind, ModifierState};
use crate::constants::{STAVE_LINE_DISTANCE, VIBRATO_OFFSET};
use crate::voice::Voice;

pub(super) fn format_bends(mods: &[ModRef], voices: &mut [Voice], state: &mut ModifierState) {
    let mut last_width = 0.0;
    for m in mods {
        let bend = m.get_mut(voices);
        bend.set_x_shift(last_width);
        last_width = bend.width();
        bend.set_text_line(state.top_text_line);
    }
    state.right_shift += last_width;
    state.top_text_line += 1.0;
}

/// Vibratos start just inside the right modifier space and sit under any
/// bend text on the same tick.
pub(super) fn format_vibratos(
    mods: &[ModRef],
    bends: &[ModRef],
    voices: &mut [Voice],
    state: &mut ModifierState,
) {
    let mut text_line = state.top_text_line;
    let bend_height = bends
        .iter()
        .filter_map(|b| match b.get(voices).kind() {
            ModifierKind::Bend { text_height, .. } => Some(*text_height),
            _ => None,
        })
        .reduce(f64::max);
    match bend_height {
        Some(height) => text_line -= height / STAVE_LINE_DISTANCE + 1.0,
        None => state.top_text_line += 1.0,
    }

    let mut width = 0.0;
    let mut shift = state.right_shift - VIBRATO_OFFSET;
    for m in mods {
        let vibrato = m.get_mut(voices);
        vibrato.set_x_shift(shift);
        vibrato.set_text_line(text_line);
        width += vibrato.width();
        shift += width;
    }
    state.right_shift += width;
}
