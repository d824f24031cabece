//! Collision handling between notes of different voices that share a
//! modifier context: shift a voice right, flip a stem, or nudge a rest.

use super::{Category, ModifierState};
use crate::constants::{REST_HEIGHT_LINES, VOICE_SHIFT_PADDING};
use crate::tickable::{mid_line, StemDirection, TickableRef};
use crate::voice::Voice;

#[derive(Debug, Clone, Copy)]
struct NoteSettings {
    note: TickableRef,
    line: f64,
    max_line: f64,
    min_line: f64,
    is_rest: bool,
    stem_direction: StemDirection,
    has_stem: bool,
    voice_shift: f64,
    base_ticks: i64,
}

fn settings(note_ref: TickableRef, voices: &[Voice]) -> NoteSettings {
    let note = note_ref.get(voices);
    let bottom = note.line_number(false);
    let top = note.line_number(true);
    let stem_max = note.stem_lines();
    let stem_direction = note.stem_direction();

    let (max_line, min_line) = if note.is_rest() {
        (bottom + REST_HEIGHT_LINES, bottom - REST_HEIGHT_LINES)
    } else if stem_direction == StemDirection::Up {
        (top + stem_max, bottom)
    } else {
        (top, bottom - stem_max)
    };

    NoteSettings {
        note: note_ref,
        line: bottom,
        max_line,
        min_line,
        is_rest: note.is_rest(),
        stem_direction,
        has_stem: note.has_stem(),
        voice_shift: note.voice_shift_width(),
        base_ticks: crate::tables::duration_to_ticks(note.duration()).unwrap_or(0),
    }
}

fn shift_rest_vertical(rest: &mut NoteSettings, dir: f64, voices: &mut [Voice]) {
    rest.line += dir;
    rest.max_line += dir;
    rest.min_line += dir;
    let note = rest.note.get_mut(voices);
    if let Some(line) = note.key_line(0) {
        note.set_key_line(0, line + dir);
    }
}

fn center_rest(rest: &mut NoteSettings, upper: &NoteSettings, lower: &NoteSettings, voices: &mut [Voice]) {
    let delta = rest.line - mid_line(upper.min_line, lower.max_line);
    let note = rest.note.get_mut(voices);
    if let Some(line) = note.key_line(0) {
        note.set_key_line(0, line - delta);
    }
    rest.line -= delta;
    rest.max_line -= delta;
    rest.min_line -= delta;
}

fn set_stem(settings: &mut NoteSettings, direction: StemDirection, voices: &mut [Voice]) {
    settings.stem_direction = direction;
    settings.note.get_mut(voices).set_stem_direction(direction);
}

fn dots_on_first_key(note: TickableRef, voices: &[Voice]) -> usize {
    note.get(voices)
        .modifiers()
        .iter()
        .filter(|m| m.category() == Category::Dot && m.index() == 0)
        .count()
}

/// Resolve up to three visible notes sharing a tick on one stave.
pub(super) fn format(members: &[TickableRef], voices: &mut [Voice], state: &mut ModifierState) {
    if members.len() < 2 {
        return;
    }

    let visible: Vec<NoteSettings> = members
        .iter()
        .take(3)
        .filter(|m| m.get(voices).is_visible())
        .map(|&m| settings(m, voices))
        .collect();

    match visible.len() {
        2 => format_two(visible[0], visible[1], voices, state),
        3 => format_three(visible[0], visible[1], visible[2], voices, state),
        _ => {}
    }
}

fn format_two(
    first: NoteSettings,
    second: NoteSettings,
    voices: &mut [Voice],
    state: &mut ModifierState,
) {
    let (mut upper, mut lower) = (first, second);
    // keep the upper voice stem up
    if upper.stem_direction == StemDirection::Down && lower.stem_direction == StemDirection::Up {
        std::mem::swap(&mut upper, &mut lower);
    }

    let voice_x_shift = upper.voice_shift.max(lower.voice_shift);
    let mut x_shift = 0.0;

    let line_spacing =
        if upper.has_stem && lower.has_stem && upper.stem_direction == lower.stem_direction {
            0.0
        } else {
            0.5
        };

    if lower.is_rest && upper.is_rest && upper.base_ticks == lower.base_ticks {
        lower.note.get_mut(voices).hide();
    } else if upper.min_line <= lower.max_line + line_spacing {
        if upper.is_rest {
            shift_rest_vertical(&mut upper, 1.0, voices);
        } else if lower.is_rest {
            shift_rest_vertical(&mut lower, -1.0, voices);
        } else {
            let line_diff = (upper.line - lower.line).abs();
            if upper.has_stem && lower.has_stem {
                let upper_head = crate::tables::notehead_width(upper.base_ticks);
                let lower_head = crate::tables::notehead_width(lower.base_ticks);
                let dots_differ =
                    dots_on_first_key(upper.note, voices) != dots_on_first_key(lower.note, voices);
                if upper_head != lower_head || dots_differ || (line_diff < 1.0 && line_diff > 0.0) {
                    x_shift = voice_x_shift + VOICE_SHIFT_PADDING;
                    if upper.stem_direction == lower.stem_direction {
                        upper.note.get_mut(voices).set_x_shift(x_shift);
                    } else {
                        lower.note.get_mut(voices).set_x_shift(x_shift);
                    }
                } else if upper.note.voice != lower.note.voice
                    && upper.stem_direction == lower.stem_direction
                {
                    if upper.line != lower.line {
                        x_shift = voice_x_shift + VOICE_SHIFT_PADDING;
                        upper.note.get_mut(voices).set_x_shift(x_shift);
                    } else if lower.stem_direction == StemDirection::Up {
                        set_stem(&mut lower, StemDirection::Down, voices);
                    }
                }
            } else if line_diff < 1.0 {
                x_shift = voice_x_shift + VOICE_SHIFT_PADDING;
                // the longer value steps aside
                if upper.base_ticks > lower.base_ticks {
                    upper.note.get_mut(voices).set_x_shift(x_shift);
                } else {
                    lower.note.get_mut(voices).set_x_shift(x_shift);
                }
            } else if upper.has_stem {
                let flipped = upper.stem_direction.flipped();
                set_stem(&mut upper, flipped, voices);
            } else if lower.has_stem {
                let flipped = lower.stem_direction.flipped();
                set_stem(&mut lower, flipped, voices);
            }
        }
    }

    state.right_shift += x_shift;
}

fn format_three(
    mut upper: NoteSettings,
    mut middle: NoteSettings,
    mut lower: NoteSettings,
    voices: &mut [Voice],
    state: &mut ModifierState,
) {
    let voice_x_shift = upper.voice_shift.max(lower.voice_shift);
    let mut x_shift = 0.0;

    // middle voice rest between two notes
    if middle.is_rest && !upper.is_rest && !lower.is_rest {
        if upper.min_line <= middle.max_line || middle.min_line <= lower.max_line {
            let rest_height = middle.max_line - middle.min_line;
            let space = upper.min_line - lower.max_line;
            if rest_height < space {
                center_rest(&mut middle, &upper, &lower, voices);
            } else {
                x_shift = voice_x_shift + VOICE_SHIFT_PADDING;
                middle.note.get_mut(voices).set_x_shift(x_shift);
                set_stem(&mut lower, StemDirection::Down, voices);
                if upper.min_line <= lower.max_line {
                    set_stem(&mut upper, StemDirection::Up, voices);
                }
            }
            state.right_shift += x_shift;
            return;
        }
    }

    // all rests
    if upper.is_rest && middle.is_rest && lower.is_rest {
        upper.note.get_mut(voices).hide();
        lower.note.get_mut(voices).hide();
        state.right_shift += x_shift;
        return;
    }

    if middle.is_rest && upper.is_rest && middle.min_line <= lower.max_line {
        middle.note.get_mut(voices).hide();
    }
    if middle.is_rest && lower.is_rest && upper.min_line <= middle.max_line {
        middle.note.get_mut(voices).hide();
    }
    if upper.is_rest && upper.min_line <= middle.max_line {
        shift_rest_vertical(&mut upper, 1.0, voices);
    }
    if lower.is_rest && middle.min_line <= lower.max_line {
        shift_rest_vertical(&mut lower, -1.0, voices);
    }

    if upper.min_line <= middle.max_line + 0.5 || middle.min_line <= lower.max_line {
        x_shift = voice_x_shift + VOICE_SHIFT_PADDING;
        middle.note.get_mut(voices).set_x_shift(x_shift);
        set_stem(&mut lower, StemDirection::Down, voices);
        if upper.min_line <= lower.max_line {
            set_stem(&mut upper, StemDirection::Up, voices);
        }
    }

    state.right_shift += x_shift;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::NOTEHEAD_BLACK_WIDTH;
    use crate::tickable::Tickable;
    use crate::voice::VoiceMode;

    fn two_voices(a: Tickable, b: Tickable) -> Vec<Voice> {
        [a, b]
            .into_iter()
            .map(|t| {
                let mut v = Voice::common_time().with_mode(VoiceMode::Soft);
                v.add_tickable(t).unwrap();
                v
            })
            .collect()
    }

    fn members() -> Vec<TickableRef> {
        vec![TickableRef::new(0, 0), TickableRef::new(1, 0)]
    }

    #[test]
    fn separated_voices_do_not_shift() {
        let mut voices = two_voices(
            Tickable::note(&["d/5"], "4").unwrap(),
            Tickable::note(&["e/4"], "4")
                .unwrap()
                .with_stem_direction(StemDirection::Down),
        );
        let mut state = ModifierState::default();
        format(&members(), &mut voices, &mut state);
        assert_eq!(state.right_shift, 0.0);
        assert_eq!(voices[0].tickables()[0].x_shift(), 0.0);
        assert_eq!(voices[1].tickables()[0].x_shift(), 0.0);
    }

    #[test]
    fn seconds_between_voices_shift_the_lower_voice() {
        let mut voices = two_voices(
            Tickable::note(&["a/4"], "4").unwrap(),
            Tickable::note(&["g/4"], "4")
                .unwrap()
                .with_stem_direction(StemDirection::Down),
        );
        let mut state = ModifierState::default();
        format(&members(), &mut voices, &mut state);
        let expected = NOTEHEAD_BLACK_WIDTH + VOICE_SHIFT_PADDING;
        assert_eq!(state.right_shift, expected);
        assert_eq!(voices[1].tickables()[0].x_shift(), expected);
    }

    #[test]
    fn colliding_rest_moves_out_of_the_way() {
        let mut voices = two_voices(
            Tickable::rest("4").unwrap(),
            Tickable::note(&["b/4"], "4")
                .unwrap()
                .with_stem_direction(StemDirection::Down),
        );
        let mut state = ModifierState::default();
        format(&members(), &mut voices, &mut state);
        assert_eq!(voices[0].tickables()[0].key_line(0), Some(4.0));
        assert_eq!(state.right_shift, 0.0);
    }

    #[test]
    fn matching_rests_collapse() {
        let mut voices = two_voices(Tickable::rest("4").unwrap(), Tickable::rest("4").unwrap());
        let mut state = ModifierState::default();
        format(&members(), &mut voices, &mut state);
        assert!(voices[0].tickables()[0].is_visible());
        assert!(!voices[1].tickables()[0].is_visible());
    }
}
