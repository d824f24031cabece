//! Shared constants for the formatting core (pixel values are in stave
//! units where one stave space is 10px).

// ── Time ────────────────────────────────────────────────────────────
pub const RESOLUTION: i64 = 16384; // ticks per whole note

// ── Formatter ───────────────────────────────────────────────────────
pub(crate) const SOFTMAX_FACTOR: f64 = 10.0;
pub(crate) const MAX_ITERATIONS: usize = 5;
pub(crate) const TUNE_ALPHA: f64 = 0.5;
pub(crate) const MIN_SPACING_FRACTION: f64 = 0.05; // of the justify width, per context
pub(crate) const JUSTIFY_TOLERANCE: f64 = 1e-6; // px

// ── Stave spacing ───────────────────────────────────────────────────
pub(crate) const STAVE_PADDING: f64 = 12.0;
pub(crate) const STAVE_END_PADDING_MAX: f64 = 10.0;
pub(crate) const STAVE_END_PADDING_MIN: f64 = 5.0;
pub(crate) const UNALIGNED_NOTE_PADDING: f64 = 10.0;
pub(crate) const STAVE_LINE_DISTANCE: f64 = 10.0;
pub(crate) const STAVE_NUM_LINES: f64 = 5.0;

// ── Noteheads & rests ───────────────────────────────────────────────
pub(crate) const NOTEHEAD_BLACK_WIDTH: f64 = 11.8;
pub(crate) const NOTEHEAD_HALF_WIDTH: f64 = 11.8;
pub(crate) const NOTEHEAD_WHOLE_WIDTH: f64 = 16.9;
pub(crate) const NOTEHEAD_DOUBLE_WHOLE_WIDTH: f64 = 25.0;
pub(crate) const MIN_NOTEHEAD_PADDING: f64 = 2.0;
pub(crate) const REST_WHOLE_WIDTH: f64 = 11.3;
pub(crate) const REST_QUARTER_WIDTH: f64 = 10.8;
pub(crate) const REST_EIGHTH_WIDTH: f64 = 9.9;
pub(crate) const REST_SIXTEENTH_WIDTH: f64 = 12.8;
pub(crate) const REST_THIRTY_SECOND_WIDTH: f64 = 14.2;
pub(crate) const REST_SIXTY_FOURTH_WIDTH: f64 = 17.1;
pub(crate) const REST_DEFAULT_LINE: f64 = 3.0; // "b/4" in treble clef
pub(crate) const MIDDLE_LINE: f64 = 3.0;
pub(crate) const REST_HEIGHT_LINES: f64 = 1.0; // half-extent of a rest glyph, in lines
pub(crate) const GRACE_NOTE_SCALE: f64 = 2.0 / 3.0;
pub(crate) const STEM_HEIGHT: f64 = 35.0;

// ── Modifiers ───────────────────────────────────────────────────────
pub(crate) const DOT_WIDTH: f64 = 5.0;
pub(crate) const DOT_SPACING: f64 = 1.0;
pub(crate) const PARENTHESIS_WIDTH: f64 = 4.0;
pub(crate) const ACCIDENTAL_NOTEHEAD_PADDING: f64 = 1.0; // between notehead and first column
pub(crate) const ACCIDENTAL_LEFT_PADDING: f64 = 2.0;
pub(crate) const ACCIDENTAL_SPACING: f64 = 3.0; // between columns
pub(crate) const ACCIDENTAL_CLEARANCE_LINES: f64 = 3.0; // lines before two accidentals can share a column
pub(crate) const STROKE_WIDTH: f64 = 10.0;
pub(crate) const STROKE_SPACING: f64 = 5.0;
pub(crate) const GRACE_GROUP_SPACING: f64 = 4.0;
pub(crate) const FINGERING_FONT_SIZE: f64 = 9.0;
pub(crate) const FINGERING_SPACING: f64 = 1.0;
pub(crate) const STRING_NUMBER_RADIUS: f64 = 8.0;
pub(crate) const STRING_NUMBER_SPACING: f64 = 1.0;
pub(crate) const ARTICULATION_MARGIN: f64 = 0.5; // lines
pub(crate) const ORNAMENT_INCREMENT: f64 = 2.0; // text lines per ornament
pub(crate) const ORNAMENT_JAZZ_OFFSET: f64 = 2.0;
pub(crate) const ANNOTATION_FONT_SIZE: f64 = 10.0;
pub(crate) const CHORD_SYMBOL_FONT_SIZE: f64 = 12.0;
pub(crate) const CHORD_SYMBOL_SUPER_SUB_RATIO: f64 = 0.6;
pub(crate) const TEXT_WIDTH_PER_EM: f64 = 0.6; // average advance of one character, in ems
pub(crate) const VIBRATO_WIDTH: f64 = 20.0;
pub(crate) const VIBRATO_OFFSET: f64 = 7.0;
pub(crate) const BEND_TEXT_HEIGHT: f64 = 10.0;
pub(crate) const VOICE_SHIFT_PADDING: f64 = 2.0; // added to a displaced voice's shift

// ── Glyph widths by modifier type ───────────────────────────────────
pub(crate) const ACCIDENTAL_SHARP_WIDTH: f64 = 10.0;
pub(crate) const ACCIDENTAL_FLAT_WIDTH: f64 = 9.0;
pub(crate) const ACCIDENTAL_NATURAL_WIDTH: f64 = 6.7;
pub(crate) const ACCIDENTAL_DOUBLE_SHARP_WIDTH: f64 = 9.9;
pub(crate) const ACCIDENTAL_DOUBLE_FLAT_WIDTH: f64 = 16.4;
pub(crate) const ARTICULATION_WIDTH: f64 = 10.0;
pub(crate) const ARTICULATION_HEIGHT: f64 = 10.0;
pub(crate) const ORNAMENT_WIDTH: f64 = 16.0;
pub(crate) const ORNAMENT_HEIGHT: f64 = 10.0;
