//! Modifiers that carry a voice of their own: grace-note groups and note
//! sub-groups. Each group is formatted by a nested [`Formatter`] to find
//! the room it needs in front of its note.

use super::{ModRef, ModifierKind, ModifierState, NestedVoice, Position};
use crate::constants::{GRACE_GROUP_SPACING, MIN_NOTEHEAD_PADDING};
use crate::error::Result;
use crate::formatter::Formatter;
use crate::voice::Voice;

/// Natural width of a nested voice, formatted once and cached.
fn nested_width(group: &mut NestedVoice) -> Result<f64> {
    if let Some(width) = group.width {
        return Ok(width);
    }
    let mut formatter = Formatter::new();
    let voices = std::slice::from_mut(&mut group.voice);
    formatter.join_voices(voices)?;
    formatter.format(voices, 0.0)?;
    let width = formatter.min_total_width()?;
    group.width = Some(width);
    Ok(width)
}

fn group_of<'a>(m: &ModRef, voices: &'a mut [Voice]) -> Option<&'a mut NestedVoice> {
    match m.get_mut(voices).kind_mut() {
        ModifierKind::GraceNoteGroup { group, .. } => Some(group.as_mut()),
        ModifierKind::NoteSubGroup(group) => Some(group.as_mut()),
        _ => None,
    }
}

/// Grace-note groups share one slot: the widest group sets the shift and
/// narrower ones are spaced away from the note by the difference.
pub(super) fn format_grace_groups(
    mods: &[ModRef],
    voices: &mut [Voice],
    state: &mut ModifierState,
) -> Result<()> {
    let mut group_shift = mods
        .first()
        .map(|m| m.note(voices).left_displaced_head_px())
        .unwrap_or(0.0);
    let mut left = false;
    let mut right = false;
    let mut widths = Vec::with_capacity(mods.len());
    for m in mods {
        if m.get(voices).position() == Position::Right {
            right = true;
        } else {
            left = true;
        }
        let width = match group_of(m, voices) {
            Some(group) => nested_width(group)? + MIN_NOTEHEAD_PADDING,
            None => 0.0,
        };
        m.get_mut(voices).set_width(width);
        let format_width = width + GRACE_GROUP_SPACING;
        group_shift = group_shift.max(format_width);
        widths.push(format_width);
    }

    for (m, format_width) in mods.iter().zip(widths) {
        m.get_mut(voices)
            .set_spacing_from_next(group_shift - format_width.min(group_shift) + MIN_NOTEHEAD_PADDING);
    }

    if right {
        state.right_shift += group_shift;
    }
    if left {
        state.left_shift += group_shift;
    }
    Ok(())
}

/// Sub-groups (clef or key changes inside a measure) sit side by side left
/// of the note.
pub(super) fn format_sub_groups(
    mods: &[ModRef],
    voices: &mut [Voice],
    state: &mut ModifierState,
) -> Result<()> {
    let mut width = 0.0;
    for m in mods {
        let group_width = match group_of(m, voices) {
            Some(group) => nested_width(group)?,
            None => 0.0,
        };
        let modifier = m.get_mut(voices);
        modifier.set_width(group_width);
        modifier.set_x_shift(state.left_shift + width);
        width += group_width;
    }
    state.left_shift += width;
    Ok(())
}
