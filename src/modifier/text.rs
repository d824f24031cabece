//! Modifiers stacked above or below the stave in text lines: articulations,
//! ornaments, annotations and chord symbols. These mostly claim vertical
//! room; horizontally they only reserve what overhangs the notehead.

use super::{
    HorizontalJustify, ModRef, ModifierKind, ModifierState, Position, SymbolBlockKind, VerticalJustify,
};
use crate::constants::*;
use crate::tickable::{StemDirection, Tickable, TickableKind};
use crate::voice::Voice;

fn round_to_half(f: fn(f64) -> f64, value: f64) -> f64 {
    f(value / 0.5) * 0.5
}

fn is_within_lines(line: f64, above: bool) -> bool {
    if above {
        line <= STAVE_NUM_LINES
    } else {
        line >= 1.0
    }
}

/// Ceil above the stave, floor below, plain rounding once outside it.
fn rounding_for(line: f64, above: bool) -> fn(f64) -> f64 {
    match (is_within_lines(line, above), above) {
        (true, true) => f64::ceil,
        (true, false) => f64::floor,
        (false, _) => f64::round,
    }
}

fn stem_direction_or_up(note: &Tickable) -> StemDirection {
    if note.has_stem() {
        note.stem_direction()
    } else {
        StemDirection::Up
    }
}

/// Space a centred symbol of `width` needs beyond what the notehead and
/// earlier modifiers already cover.
fn overlap(width: f64, glyph_width: f64, reserved: f64) -> f64 {
    (width - glyph_width).max(0.0).min((width - reserved).max(0.0))
}

// ── Articulations ──

pub(super) fn format_articulations(mods: &[ModRef], voices: &mut [Voice], state: &mut ModifierState) {
    let mut max_glyph_width: f64 = 0.0;
    let mut max_width: f64 = 0.0;
    let lines = STAVE_NUM_LINES;

    for m in mods {
        let note = m.note(voices);
        let modifier = m.get(voices);
        max_glyph_width = max_glyph_width.max(note.glyph_width());
        max_width = max_width.max(modifier.width());

        let (between_lines, height) = match modifier.kind() {
            ModifierKind::Articulation {
                between_lines,
                height,
                ..
            } => (*between_lines, *height),
            _ => continue,
        };
        let stem_direction = stem_direction_or_up(note);
        let stem_height = note.stem_lines();
        let needed = height / STAVE_LINE_DISTANCE + ARTICULATION_MARGIN;
        let increment_for = |line: f64, above: bool| round_to_half(rounding_for(line, above), needed);

        match modifier.position() {
            Position::Below => {
                let mut note_line = (lines - note.line_number(false)).max(0.0);
                if stem_direction == StemDirection::Down {
                    note_line += stem_height;
                }
                let mut increment = increment_for(state.text_line, false);
                let current = note_line + state.text_line + 0.5;
                if !between_lines && current < lines {
                    increment += lines - current;
                }
                let text_line = state.text_line;
                state.text_line += increment;
                m.get_mut(voices).set_text_line(text_line);
            }
            _ => {
                let mut note_line = note.line_number(true);
                if stem_direction == StemDirection::Up {
                    note_line += stem_height;
                }
                let mut increment = increment_for(state.top_text_line, true);
                let current = note_line + state.top_text_line + 0.5;
                if !between_lines && current < lines {
                    increment += lines - current;
                }
                let text_line = state.top_text_line;
                state.top_text_line += increment;
                m.get_mut(voices).set_text_line(text_line);
            }
        }
    }

    let extra = overlap(max_width, max_glyph_width, state.left_shift + state.right_shift);
    state.left_shift += extra / 2.0;
    state.right_shift += extra / 2.0;
}

// ── Ornaments ──

/// Release ornaments (falls, doits) trail the note, attack ornaments lead
/// it; both report a width. Others only stack text lines and centre their
/// glyph over the notehead.
pub(super) fn format_ornaments(mods: &[ModRef], voices: &mut [Voice], state: &mut ModifierState) {
    let mut width: f64 = 0.0;
    let mut right_shift = state.right_shift;
    let mut left_shift = state.left_shift;
    let mut y_offset = 0.0;

    for m in mods {
        let note_line = m.note(voices).line_number(false);
        let modifier = m.get_mut(voices);
        let (ornament, reported_width, height) = match modifier.kind() {
            ModifierKind::Ornament {
                ornament,
                reported_width,
                height,
            } => (*ornament, *reported_width, *height),
            _ => continue,
        };

        let mut x_shift = 0.0;
        if ornament.is_release() {
            x_shift += right_shift + ORNAMENT_JAZZ_OFFSET;
        }
        if ornament.is_attack() {
            x_shift -= left_shift + ORNAMENT_JAZZ_OFFSET;
        }
        modifier.set_x_shift(x_shift);

        if reported_width > 0.0 && x_shift < 0.0 {
            left_shift += reported_width;
        } else if reported_width > 0.0 {
            right_shift += reported_width + MIN_NOTEHEAD_PADDING;
        } else {
            width = width.max(modifier.width());
        }

        if ornament.is_articulation() {
            let above = note_line >= 3.0 || modifier.position() == Position::Above;
            modifier.set_y_shift(y_offset);
            if above {
                state.top_text_line += ORNAMENT_INCREMENT;
                y_offset -= height;
            } else {
                state.text_line += ORNAMENT_INCREMENT;
                y_offset += height;
            }
        } else if modifier.position() == Position::Below {
            modifier.set_text_line(state.text_line);
            state.text_line += ORNAMENT_INCREMENT;
        } else {
            modifier.set_text_line(state.top_text_line);
            state.top_text_line += ORNAMENT_INCREMENT;
        }
    }

    state.left_shift = left_shift + width / 2.0;
    state.right_shift = right_shift + width / 2.0;
}

// ── Annotations & chord symbols ──

/// Horizontal room requested by left/right/centre justified text.
#[derive(Default)]
struct TextExtent {
    left: f64,
    right: f64,
    max_left_glyph: f64,
    max_right_glyph: f64,
}

impl TextExtent {
    fn add(&mut self, justify: HorizontalJustify, width: f64, glyph_width: f64) {
        match justify {
            HorizontalJustify::Right => {
                self.max_left_glyph = self.max_left_glyph.max(glyph_width);
                self.left = self.left.max(width) + MIN_NOTEHEAD_PADDING;
            }
            HorizontalJustify::Left => {
                self.max_right_glyph = self.max_right_glyph.max(glyph_width);
                self.right = self.right.max(width);
            }
            HorizontalJustify::Center | HorizontalJustify::CenterStem => {
                self.left = self.left.max(width / 2.0) + MIN_NOTEHEAD_PADDING;
                self.right = self.right.max(width / 2.0);
                self.max_left_glyph = self.max_left_glyph.max(glyph_width / 2.0);
                self.max_right_glyph = self.max_right_glyph.max(glyph_width / 2.0);
            }
        }
    }

    fn apply(&self, state: &mut ModifierState) {
        let right = overlap(self.right, self.max_right_glyph, state.right_shift);
        let left = overlap(self.left, self.max_left_glyph, state.left_shift);
        state.left_shift += left;
        state.right_shift += right;
    }
}

pub(super) fn format_annotations(mods: &[ModRef], voices: &mut [Voice], state: &mut ModifierState) {
    let lines = STAVE_NUM_LINES;
    let mut extent = TextExtent::default();

    for m in mods {
        let note = m.note(voices);
        let modifier = m.get(voices);
        let (horizontal, vertical, font_size) = match modifier.kind() {
            ModifierKind::Annotation {
                horizontal,
                vertical,
                font_size,
                ..
            } => (*horizontal, *vertical, *font_size),
            _ => continue,
        };
        let text_lines = (2.0 + font_size) / STAVE_LINE_DISTANCE;
        extent.add(horizontal, modifier.width(), note.glyph_width());

        let stem_direction = stem_direction_or_up(note);
        let stem_height = if note.kind() == TickableKind::Note {
            note.stem_lines()
        } else {
            0.0
        };

        let text_line = match vertical {
            VerticalJustify::Top => {
                let mut note_line = note.line_number(true);
                if stem_direction == StemDirection::Up {
                    note_line += stem_height;
                }
                if note_line + state.top_text_line + 0.5 < lines {
                    state.top_text_line = text_lines + lines - note_line;
                    lines - note_line
                } else {
                    let line = state.top_text_line;
                    state.top_text_line += text_lines;
                    line
                }
            }
            VerticalJustify::Bottom => {
                let mut note_line = lines - note.line_number(false);
                if stem_direction == StemDirection::Down {
                    note_line += stem_height;
                }
                let bottom = note_line + state.text_line + 1.0;
                if bottom < lines {
                    state.text_line = text_lines + lines - bottom;
                    lines - bottom
                } else {
                    let line = state.text_line;
                    state.text_line += text_lines;
                    line
                }
            }
            VerticalJustify::Center | VerticalJustify::CenterStem => state.text_line,
        };
        m.get_mut(voices).set_text_line(text_line);
    }

    extent.apply(state);
}

/// Chord symbols are laid out block by block; a subscript following a
/// superscript is stacked under it instead of after it.
pub(super) fn format_chord_symbols(mods: &[ModRef], voices: &mut [Voice], state: &mut ModifierState) {
    let mut extent = TextExtent::default();

    for m in mods {
        let glyph_width = m.note(voices).glyph_width();
        let is_note = m.note(voices).kind() != TickableKind::Bar;
        let top_text_line = state.top_text_line;
        let text_line = state.text_line;
        let modifier = m.get_mut(voices);

        let mut width = 0.0;
        let mut line_spaces = 1.0;
        let (horizontal, vertical, report_width) = match modifier.kind_mut() {
            ModifierKind::ChordSymbol {
                blocks,
                horizontal,
                vertical,
                report_width,
            } => {
                for j in 0..blocks.len() {
                    let kind = blocks[j].kind;
                    blocks[j].x_shift = width;
                    if kind != SymbolBlockKind::Text {
                        line_spaces = 2.0;
                    }
                    if kind == SymbolBlockKind::Subscript && j > 0 {
                        let prev = blocks[j - 1].clone();
                        if prev.kind == SymbolBlockKind::Superscript {
                            let block = &mut blocks[j];
                            block.x_shift = width - prev.width - MIN_NOTEHEAD_PADDING;
                            block.v_align = true;
                            width += -prev.width - MIN_NOTEHEAD_PADDING
                                + (prev.width - block.width).max(0.0);
                        }
                    }
                    width += blocks[j].width + MIN_NOTEHEAD_PADDING;
                }
                (*horizontal, *vertical, *report_width)
            }
            _ => continue,
        };

        if vertical == VerticalJustify::Top {
            modifier.set_text_line(top_text_line);
            state.top_text_line += line_spaces;
        } else {
            modifier.set_text_line(text_line + 1.0);
            state.text_line += line_spaces + 1.0;
        }

        if report_width {
            if is_note {
                extent.add(horizontal, width, glyph_width);
            }
            modifier.set_width(width);
        }
    }

    extent.apply(state);
}
