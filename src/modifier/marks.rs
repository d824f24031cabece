//! Small glyph modifiers laid out beside the notehead: parentheses, dots,
//! fingerings, accidentals, strokes and string numbers.

use super::{by_line_desc, ModRef, ModifierState, Position};
use crate::constants::*;
use crate::tickable::TickableRef;
use crate::voice::Voice;

// ── Parentheses ──

pub(super) fn format_parentheses(mods: &[ModRef], voices: &mut [Voice], state: &mut ModifierState) {
    let mut width_left: f64 = 0.0;
    let mut width_right: f64 = 0.0;

    for m in mods {
        let note = m.note(voices);
        let modifier = m.get(voices);
        let displaced = note
            .keys()
            .get(modifier.index())
            .map(|k| k.displaced)
            .unwrap_or(false);
        let width = modifier.width();

        let shift = match modifier.position() {
            Position::Right => {
                let shift = if displaced { note.right_displaced_head_px() } else { 0.0 };
                width_right = width_right.max(shift + width);
                shift
            }
            Position::Left => {
                let base = if displaced { note.left_displaced_head_px() } else { 0.0 };
                let shift = base - note.x_shift() + width;
                width_left = width_left.max(shift + width);
                shift
            }
            _ => 0.0,
        };
        m.get_mut(voices).set_x_shift(shift);
    }

    state.left_shift += width_left;
    state.right_shift += width_right;
}

// ── Dots ──

struct DotEntry {
    dot: ModRef,
    line: f64,
    is_rest: bool,
}

/// Dots sit right of the notehead (and of a right parenthesis), one column
/// per augmentation; dots on lines move half a line into the space.
pub(super) fn format_dots(
    mods: &[ModRef],
    voices: &mut [Voice],
    state: &mut ModifierState,
    first_parenthesis: Option<f64>,
) {
    let mut max_shift: Vec<(TickableRef, f64)> = Vec::new();
    let mut entries: Vec<DotEntry> = Vec::with_capacity(mods.len());

    for m in mods {
        let note = m.note(voices);
        let index = m.get(voices).index();
        let line = note.key_line(index).unwrap_or(REST_DEFAULT_LINE);
        let mut shift = note.right_displaced_head_px();
        if let Some(width) = first_parenthesis {
            shift += width + DOT_SPACING;
        }
        match max_shift.iter_mut().find(|(n, _)| *n == m.note) {
            Some((_, s)) => *s = s.max(shift),
            None => max_shift.push((m.note, shift)),
        }
        entries.push(DotEntry {
            dot: *m,
            line,
            is_rest: note.is_rest(),
        });
    }
    entries.sort_by(|a, b| by_line_desc(a.line, b.line));

    let shift_for = |note: TickableRef| {
        max_shift
            .iter()
            .find(|(n, _)| *n == note)
            .map(|(_, s)| *s)
            .unwrap_or(0.0)
    };

    let mut dot_shift = 0.0;
    let mut x_width: f64 = 0.0;
    let mut last_line: Option<f64> = None;
    let mut last: Option<(TickableRef, bool)> = None;
    let mut prev_dotted_space: Option<f64> = None;
    let mut half_shift_y = 0.0;

    for entry in &entries {
        let note = entry.dot.note;
        if last_line != Some(entry.line) || last.map(|(n, _)| n) != Some(note) {
            dot_shift = shift_for(note);
        }

        if !entry.is_rest && last_line != Some(entry.line) {
            if (entry.line % 1.0).abs() == 0.5 {
                half_shift_y = 0.0;
            } else {
                half_shift_y = 0.5;
                let stepped_from_above = matches!(
                    (last, last_line),
                    (Some((_, false)), Some(l)) if l - entry.line == 0.5
                );
                if stepped_from_above || prev_dotted_space == Some(entry.line + half_shift_y) {
                    half_shift_y = -0.5;
                }
            }
        }

        let dot = entry.dot.get_mut(voices);
        dot.set_y_shift(-half_shift_y);
        prev_dotted_space = Some(entry.line + half_shift_y);
        dot.set_x_shift(dot_shift);
        dot_shift += dot.width() + DOT_SPACING;
        x_width = x_width.max(dot_shift);

        last_line = Some(entry.line);
        last = Some((note, entry.is_rest));
    }

    state.right_shift += x_width;
}

// ── Fingerings ──

struct SideEntry {
    m: ModRef,
    position: Position,
    line: f64,
    width: f64,
    shift_left: f64,
    shift_right: f64,
}

/// Collect left/right entries, advancing the text lines for entries placed
/// above or below the stave.
fn side_entries(
    mods: &[ModRef],
    voices: &mut [Voice],
    state: &mut ModifierState,
    vertical_space: f64,
) -> Vec<SideEntry> {
    let left_shift = state.left_shift;
    let right_shift = state.right_shift;
    let mut prev_note: Option<TickableRef> = None;
    let mut shift_left: f64 = 0.0;
    let mut shift_right: f64 = 0.0;
    let mut entries = Vec::with_capacity(mods.len());

    for m in mods {
        let position = m.get(voices).position();
        match position {
            Position::Above => {
                m.get_mut(voices).set_text_line(state.top_text_line);
                state.top_text_line += vertical_space;
            }
            Position::Below => {
                m.get_mut(voices).set_text_line(state.text_line);
                state.text_line += vertical_space;
            }
            _ => {}
        }

        let note = m.note(voices);
        if prev_note != Some(m.note) {
            if left_shift == 0.0 {
                shift_left = shift_left.max(note.left_displaced_head_px());
            }
            if right_shift == 0.0 {
                shift_right = shift_right.max(note.right_displaced_head_px());
            }
            prev_note = Some(m.note);
        }
        let modifier = m.get(voices);
        entries.push(SideEntry {
            m: *m,
            position,
            line: note.key_line(modifier.index()).unwrap_or(REST_DEFAULT_LINE),
            width: modifier.width(),
            shift_left,
            shift_right,
        });
    }
    entries.sort_by(|a, b| by_line_desc(a.line, b.line));
    entries
}

/// Lay out side entries in columns left and right of the notehead.
fn place_side_entries(entries: &[SideEntry], spacing: f64, voices: &mut [Voice], state: &mut ModifierState) {
    let mut shift_l = 0.0;
    let mut shift_r = 0.0;
    let mut width_left: f64 = 0.0;
    let mut width_right: f64 = 0.0;
    let mut last: Option<(TickableRef, f64)> = None;

    for entry in entries {
        if last != Some((entry.m.note, entry.line)) {
            shift_l = state.left_shift + entry.shift_left;
            shift_r = state.right_shift + entry.shift_right;
        }
        let width = entry.width + spacing;
        match entry.position {
            Position::Left => {
                entry.m.get_mut(voices).set_x_shift(shift_l);
                width_left = width_left.max(entry.shift_left + width);
            }
            Position::Right => {
                entry.m.get_mut(voices).set_x_shift(shift_r);
                width_right = width_right.max(entry.shift_right + width);
            }
            _ => {}
        }
        last = Some((entry.m.note, entry.line));
    }

    state.left_shift += width_left;
    state.right_shift += width_right;
}

pub(super) fn format_fingerings(mods: &[ModRef], voices: &mut [Voice], state: &mut ModifierState) {
    let text_lines = FINGERING_FONT_SIZE / STAVE_LINE_DISTANCE + 0.5;
    let entries = side_entries(mods, voices, state, text_lines);
    place_side_entries(&entries, FINGERING_SPACING, voices, state);
}

pub(super) fn format_string_numbers(mods: &[ModRef], voices: &mut [Voice], state: &mut ModifierState) {
    let text_lines = STRING_NUMBER_RADIUS * 2.0 / STAVE_LINE_DISTANCE + 0.5;
    let entries = side_entries(mods, voices, state, text_lines);
    place_side_entries(&entries, STRING_NUMBER_SPACING, voices, state);
}

// ── Accidentals ──

/// Accidentals are stacked top to bottom into columns: an accidental joins
/// the innermost column whose lowest occupant is at least
/// `ACCIDENTAL_CLEARANCE_LINES` above it.
pub(super) fn format_accidentals(mods: &[ModRef], voices: &mut [Voice], state: &mut ModifierState) {
    let mut entries: Vec<(ModRef, f64, f64)> = mods
        .iter()
        .map(|m| {
            let line = m
                .note(voices)
                .key_line(m.get(voices).index())
                .unwrap_or(REST_DEFAULT_LINE);
            (*m, line, m.get(voices).width())
        })
        .collect();
    entries.sort_by(|a, b| by_line_desc(a.1, b.1));

    let displaced_px = mods
        .iter()
        .map(|m| m.note(voices).left_displaced_head_px())
        .fold(0.0, f64::max);

    // (lowest line, widest accidental) per column
    let mut columns: Vec<(f64, f64)> = Vec::new();
    let mut placement: Vec<usize> = Vec::with_capacity(entries.len());
    for &(_, line, width) in &entries {
        let column = columns
            .iter()
            .position(|&(lowest, _)| lowest - line >= ACCIDENTAL_CLEARANCE_LINES);
        let column = match column {
            Some(c) => {
                columns[c].0 = line;
                columns[c].1 = columns[c].1.max(width);
                c
            }
            None => {
                columns.push((line, width));
                columns.len() - 1
            }
        };
        placement.push(column);
    }

    let base = state.left_shift + displaced_px + ACCIDENTAL_NOTEHEAD_PADDING;
    let mut offsets = Vec::with_capacity(columns.len());
    let mut offset = base;
    for (i, &(_, width)) in columns.iter().enumerate() {
        if i > 0 {
            offset += ACCIDENTAL_SPACING;
        }
        offsets.push(offset);
        offset += width;
    }

    for (&(m, _, _), &column) in entries.iter().zip(&placement) {
        m.get_mut(voices).set_x_shift(offsets[column]);
    }

    let total = offset - state.left_shift + ACCIDENTAL_LEFT_PADDING;
    state.left_shift += total;
}

// ── Strokes ──

pub(super) fn format_strokes(mods: &[ModRef], voices: &mut [Voice], state: &mut ModifierState) {
    let left_shift = state.left_shift;
    let mut x_shift: f64 = 0.0;
    for m in mods {
        let shift = m.note(voices).left_displaced_head_px();
        let stroke = m.get_mut(voices);
        stroke.set_x_shift(left_shift + shift);
        x_shift = x_shift.max(stroke.width() + STROKE_SPACING);
    }
    state.left_shift += x_shift;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modifier::{AccidentalType, Modifier, StrokeType};
    use crate::tickable::Tickable;
    use crate::voice::VoiceMode;

    fn voice_with(note: Tickable) -> Vec<Voice> {
        let mut voice = Voice::common_time().with_mode(VoiceMode::Soft);
        voice.add_tickable(note).unwrap();
        vec![voice]
    }

    fn refs(voices: &[Voice]) -> Vec<ModRef> {
        let note = TickableRef::new(0, 0);
        (0..note.get(voices).modifiers().len())
            .map(|modifier| ModRef { note, modifier })
            .collect()
    }

    #[test]
    fn double_dot_reserves_two_columns() {
        let mut voices = voice_with(
            Tickable::note(&["c/5"], "4dd")
                .unwrap()
                .with_modifier(Modifier::dot(), 0)
                .unwrap()
                .with_modifier(Modifier::dot(), 0)
                .unwrap(),
        );
        let mods = refs(&voices);
        let mut state = ModifierState::default();
        format_dots(&mods, &mut voices, &mut state, None);
        assert_eq!(state.right_shift, 2.0 * (DOT_WIDTH + DOT_SPACING));
        let note = &voices[0].tickables()[0];
        assert_eq!(note.modifiers()[0].x_shift(), 0.0);
        assert_eq!(note.modifiers()[1].x_shift(), DOT_WIDTH + DOT_SPACING);
    }

    #[test]
    fn dot_on_a_line_moves_into_the_space() {
        let mut voices = voice_with(
            Tickable::note(&["b/4"], "4d")
                .unwrap()
                .with_modifier(Modifier::dot(), 0)
                .unwrap(),
        );
        let mods = refs(&voices);
        let mut state = ModifierState::default();
        format_dots(&mods, &mut voices, &mut state, None);
        assert_eq!(voices[0].tickables()[0].modifiers()[0].y_shift(), -0.5);
    }

    #[test]
    fn accidentals_a_second_apart_need_two_columns() {
        let mut voices = voice_with(
            Tickable::note(&["c/4", "e/4"], "4")
                .unwrap()
                .with_modifier(Modifier::accidental(AccidentalType::Sharp), 0)
                .unwrap()
                .with_modifier(Modifier::accidental(AccidentalType::Flat), 1)
                .unwrap(),
        );
        let mods = refs(&voices);
        let mut state = ModifierState::default();
        format_accidentals(&mods, &mut voices, &mut state);
        let expected = ACCIDENTAL_NOTEHEAD_PADDING
            + ACCIDENTAL_FLAT_WIDTH
            + ACCIDENTAL_SPACING
            + ACCIDENTAL_SHARP_WIDTH
            + ACCIDENTAL_LEFT_PADDING;
        assert!((state.left_shift - expected).abs() < 1e-9);
    }

    #[test]
    fn distant_accidentals_share_a_column() {
        let mut voices = voice_with(
            Tickable::note(&["c/4", "c/5"], "4")
                .unwrap()
                .with_modifier(Modifier::accidental(AccidentalType::Sharp), 0)
                .unwrap()
                .with_modifier(Modifier::accidental(AccidentalType::Sharp), 1)
                .unwrap(),
        );
        let mods = refs(&voices);
        let mut state = ModifierState::default();
        format_accidentals(&mods, &mut voices, &mut state);
        let expected = ACCIDENTAL_NOTEHEAD_PADDING + ACCIDENTAL_SHARP_WIDTH + ACCIDENTAL_LEFT_PADDING;
        assert!((state.left_shift - expected).abs() < 1e-9);
        let note = &voices[0].tickables()[0];
        assert_eq!(note.modifiers()[0].x_shift(), note.modifiers()[1].x_shift());
    }

    #[test]
    fn strokes_stack_after_earlier_left_modifiers() {
        let mut voices = voice_with(
            Tickable::note(&["c/4"], "4")
                .unwrap()
                .with_modifier(Modifier::stroke(StrokeType::RollUp), 0)
                .unwrap(),
        );
        let mods = refs(&voices);
        let mut state = ModifierState {
            left_shift: 7.0,
            ..Default::default()
        };
        format_strokes(&mods, &mut voices, &mut state);
        assert_eq!(state.left_shift, 7.0 + STROKE_WIDTH + STROKE_SPACING);
        assert_eq!(voices[0].tickables()[0].modifiers()[0].x_shift(), 7.0);
    }

    #[test]
    fn fingering_above_claims_a_text_line() {
        let mut voices = voice_with(
            Tickable::note(&["c/4"], "4")
                .unwrap()
                .with_modifier(Modifier::fingering("1", Position::Above), 0)
                .unwrap()
                .with_modifier(Modifier::fingering("3", Position::Left), 0)
                .unwrap(),
        );
        let mods = refs(&voices);
        let mut state = ModifierState::default();
        format_fingerings(&mods, &mut voices, &mut state);
        assert!((state.top_text_line - 1.4).abs() < 1e-9);
        let width = voices[0].tickables()[0].modifiers()[1].width();
        assert_eq!(state.left_shift, width + FINGERING_SPACING);
        assert_eq!(state.right_shift, 0.0);
    }

    #[test]
    fn right_parenthesis_reserves_its_width() {
        let mut voices = voice_with(
            Tickable::note(&["c/4"], "4")
                .unwrap()
                .with_modifier(Modifier::parenthesis(Position::Right), 0)
                .unwrap(),
        );
        let mods = refs(&voices);
        let mut state = ModifierState::default();
        format_parentheses(&mods, &mut voices, &mut state);
        assert_eq!(state.right_shift, PARENTHESIS_WIDTH);
        assert_eq!(state.left_shift, 0.0);
    }
}
