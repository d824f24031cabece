//! Modifiers: decorations attached to a note that need horizontal room
//! (accidentals, dots, articulations, text, grace notes...).
//!
//! Modifiers are owned by their tickable. A [`ModifierContext`] resolves
//! every modifier on one stave at one tick in the order of [`FORMAT_ORDER`];
//! each category reads what earlier categories reserved and extends the
//! shared [`ModifierState`].

mod context;
mod groups;
mod marks;
mod notes;
mod tab;
mod text;

pub use context::{ModifierContext, ModifierState};

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::Result;
use crate::tables;
use crate::tickable::{Tickable, TickableRef};
use crate::voice::{Voice, VoiceMode, VoiceTime};

/// Modifier categories, declared in resolution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// The notes themselves (multi-voice collision).
    Note,
    Parenthesis,
    Dot,
    Fingering,
    Accidental,
    Stroke,
    GraceNoteGroup,
    NoteSubGroup,
    StringNumber,
    Articulation,
    Ornament,
    Annotation,
    ChordSymbol,
    Bend,
    Vibrato,
}

/// The order in which a modifier context resolves categories. Changing it
/// changes the layout of every measure.
pub const FORMAT_ORDER: [Category; 15] = [
    Category::Note,
    Category::Parenthesis,
    Category::Dot,
    Category::Fingering,
    Category::Accidental,
    Category::Stroke,
    Category::GraceNoteGroup,
    Category::NoteSubGroup,
    Category::StringNumber,
    Category::Articulation,
    Category::Ornament,
    Category::Annotation,
    Category::ChordSymbol,
    Category::Bend,
    Category::Vibrato,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    #[default]
    Center,
    Left,
    Right,
    Above,
    Below,
}

// ── Payloads ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccidentalType {
    Sharp,
    Flat,
    Natural,
    DoubleSharp,
    DoubleFlat,
}

impl AccidentalType {
    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "#" => Some(Self::Sharp),
            "b" => Some(Self::Flat),
            "n" => Some(Self::Natural),
            "##" => Some(Self::DoubleSharp),
            "bb" => Some(Self::DoubleFlat),
            _ => None,
        }
    }

    fn width(self) -> f64 {
        match self {
            Self::Sharp => ACCIDENTAL_SHARP_WIDTH,
            Self::Flat => ACCIDENTAL_FLAT_WIDTH,
            Self::Natural => ACCIDENTAL_NATURAL_WIDTH,
            Self::DoubleSharp => ACCIDENTAL_DOUBLE_SHARP_WIDTH,
            Self::DoubleFlat => ACCIDENTAL_DOUBLE_FLAT_WIDTH,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrokeType {
    BrushDown,
    BrushUp,
    RollDown,
    RollUp,
    Rasquedo,
    ArpeggioDirectionless,
}

/// Ornaments, grouped by how they claim space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrnamentType {
    Trill,
    Mordent,
    MordentInverted,
    Turn,
    TurnInverted,
    Upprall,
    // Attack: played into the note, placed before it.
    Scoop,
    // Release: played out of the note, placed after it.
    Doit,
    DoitLong,
    Fall,
    FallLong,
    JazzTurn,
    Smear,
    Flip,
    // Stackable above or below the note.
    Bend,
    PlungerClosed,
    PlungerOpen,
}

impl OrnamentType {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "tr" | "trill" => Self::Trill,
            "mordent" => Self::Mordent,
            "mordentInverted" => Self::MordentInverted,
            "turn" => Self::Turn,
            "turnInverted" => Self::TurnInverted,
            "upprall" => Self::Upprall,
            "scoop" => Self::Scoop,
            "doit" => Self::Doit,
            "doitLong" => Self::DoitLong,
            "fall" => Self::Fall,
            "fallLong" => Self::FallLong,
            "jazzTurn" => Self::JazzTurn,
            "smear" => Self::Smear,
            "flip" => Self::Flip,
            "bend" => Self::Bend,
            "plungerClosed" => Self::PlungerClosed,
            "plungerOpen" => Self::PlungerOpen,
            _ => return None,
        })
    }

    pub(crate) fn is_attack(self) -> bool {
        self == Self::Scoop
    }

    pub(crate) fn is_release(self) -> bool {
        matches!(
            self,
            Self::Doit | Self::Fall | Self::FallLong | Self::DoitLong | Self::JazzTurn | Self::Smear | Self::Flip
        )
    }

    pub(crate) fn is_articulation(self) -> bool {
        matches!(self, Self::Bend | Self::PlungerClosed | Self::PlungerOpen)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HorizontalJustify {
    Left,
    #[default]
    Center,
    Right,
    CenterStem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerticalJustify {
    #[default]
    Top,
    Center,
    Bottom,
    CenterStem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolBlockKind {
    #[default]
    Text,
    Superscript,
    Subscript,
}

/// One run of a chord symbol ("C", "7", "b9"...).
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolBlock {
    pub text: String,
    pub kind: SymbolBlockKind,
    pub width: f64,
    pub x_shift: f64,
    /// Set when a subscript is overlaid on the preceding superscript.
    pub v_align: bool,
}

impl SymbolBlock {
    pub fn new(text: &str, kind: SymbolBlockKind) -> Self {
        let size = match kind {
            SymbolBlockKind::Text => CHORD_SYMBOL_FONT_SIZE,
            _ => CHORD_SYMBOL_FONT_SIZE * CHORD_SYMBOL_SUPER_SUB_RATIO,
        };
        Self {
            text: text.to_string(),
            kind,
            width: tables::text_width(text, size),
            x_shift: 0.0,
            v_align: false,
        }
    }
}

/// A group of tickables formatted on their own to find their width.
#[derive(Debug, Clone)]
pub struct NestedVoice {
    pub(crate) voice: Voice,
    pub(crate) width: Option<f64>,
}

impl NestedVoice {
    fn new(notes: Vec<Tickable>) -> Result<Self> {
        let mut voice = Voice::new(VoiceTime::default())?.with_mode(VoiceMode::Soft);
        voice.add_tickables(notes)?;
        Ok(Self { voice, width: None })
    }

    pub fn voice(&self) -> &Voice {
        &self.voice
    }

    pub fn width(&self) -> Option<f64> {
        self.width
    }
}

#[derive(Debug, Clone)]
pub enum ModifierKind {
    Parenthesis,
    Dot,
    Fingering { finger: String },
    Accidental { accidental: AccidentalType, cautionary: bool },
    Stroke(StrokeType),
    GraceNoteGroup { group: Box<NestedVoice>, slur: bool },
    NoteSubGroup(Box<NestedVoice>),
    StringNumber { number: u32 },
    Articulation { code: String, between_lines: bool, height: f64 },
    Ornament { ornament: OrnamentType, reported_width: f64, height: f64 },
    Annotation {
        text: String,
        horizontal: HorizontalJustify,
        vertical: VerticalJustify,
        font_size: f64,
    },
    ChordSymbol {
        blocks: Vec<SymbolBlock>,
        horizontal: HorizontalJustify,
        vertical: VerticalJustify,
        report_width: bool,
    },
    Bend { text: String, text_height: f64 },
    Vibrato,
}

// ═══════════════════════════════════════════════════════════════════════
// Modifier
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct Modifier {
    kind: ModifierKind,
    index: usize,
    position: Position,
    width: f64,
    x_shift: f64,
    y_shift: f64,
    text_line: f64,
    spacing_from_next: f64,
}

impl Modifier {
    fn new(kind: ModifierKind, position: Position, width: f64) -> Self {
        Self {
            kind,
            index: 0,
            position,
            width,
            x_shift: 0.0,
            y_shift: 0.0,
            text_line: 0.0,
            spacing_from_next: 0.0,
        }
    }

    pub fn parenthesis(position: Position) -> Self {
        Self::new(ModifierKind::Parenthesis, position, PARENTHESIS_WIDTH)
    }

    pub fn dot() -> Self {
        Self::new(ModifierKind::Dot, Position::Right, DOT_WIDTH)
    }

    pub fn fingering(finger: &str, position: Position) -> Self {
        let width = tables::text_width(finger, FINGERING_FONT_SIZE);
        Self::new(
            ModifierKind::Fingering {
                finger: finger.to_string(),
            },
            position,
            width,
        )
    }

    pub fn accidental(accidental: AccidentalType) -> Self {
        Self::new(
            ModifierKind::Accidental {
                accidental,
                cautionary: false,
            },
            Position::Left,
            accidental.width(),
        )
    }

    /// Put the accidental in parentheses.
    pub fn cautionary(mut self) -> Self {
        if let ModifierKind::Accidental { cautionary, .. } = &mut self.kind {
            if !*cautionary {
                *cautionary = true;
                self.width += 2.0 * PARENTHESIS_WIDTH;
            }
        }
        self
    }

    pub fn stroke(stroke: StrokeType) -> Self {
        Self::new(ModifierKind::Stroke(stroke), Position::Left, STROKE_WIDTH)
    }

    pub fn grace_note_group(notes: Vec<Tickable>, slur: bool) -> Result<Self> {
        let group = NestedVoice::new(notes)?;
        Ok(Self::new(
            ModifierKind::GraceNoteGroup {
                group: Box::new(group),
                slur,
            },
            Position::Left,
            0.0,
        ))
    }

    pub fn note_sub_group(notes: Vec<Tickable>) -> Result<Self> {
        let group = NestedVoice::new(notes)?;
        Ok(Self::new(ModifierKind::NoteSubGroup(Box::new(group)), Position::Left, 0.0))
    }

    pub fn string_number(number: u32, position: Position) -> Self {
        Self::new(
            ModifierKind::StringNumber { number },
            position,
            STRING_NUMBER_RADIUS * 2.0 + 4.0,
        )
    }

    /// Articulation by code (`a.` staccato, `a>` accent, `a-` tenuto...),
    /// placed above the note.
    pub fn articulation(code: &str) -> Self {
        let between_lines = matches!(code, "a." | "a-" | "av" | "a|" | "ao");
        Self::new(
            ModifierKind::Articulation {
                code: code.to_string(),
                between_lines,
                height: ARTICULATION_HEIGHT,
            },
            Position::Above,
            ARTICULATION_WIDTH,
        )
    }

    pub fn ornament(ornament: OrnamentType) -> Self {
        let reported_width = if ornament.is_attack() || ornament.is_release() {
            ORNAMENT_WIDTH
        } else {
            0.0
        };
        Self::new(
            ModifierKind::Ornament {
                ornament,
                reported_width,
                height: ORNAMENT_HEIGHT,
            },
            Position::Above,
            ORNAMENT_WIDTH,
        )
    }

    pub fn annotation(text: &str) -> Self {
        Self::new(
            ModifierKind::Annotation {
                text: text.to_string(),
                horizontal: HorizontalJustify::Center,
                vertical: VerticalJustify::Top,
                font_size: ANNOTATION_FONT_SIZE,
            },
            Position::Above,
            tables::text_width(text, ANNOTATION_FONT_SIZE),
        )
    }

    pub fn chord_symbol(blocks: Vec<SymbolBlock>) -> Self {
        Self::new(
            ModifierKind::ChordSymbol {
                blocks,
                horizontal: HorizontalJustify::Left,
                vertical: VerticalJustify::Top,
                report_width: true,
            },
            Position::Above,
            0.0,
        )
    }

    pub fn bend(text: &str) -> Self {
        Self::new(
            ModifierKind::Bend {
                text: text.to_string(),
                text_height: BEND_TEXT_HEIGHT,
            },
            Position::Right,
            tables::text_width(text, ANNOTATION_FONT_SIZE).max(8.0),
        )
    }

    pub fn vibrato() -> Self {
        Self::new(ModifierKind::Vibrato, Position::Right, VIBRATO_WIDTH)
    }

    // ── Builders ──

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    pub fn with_width(mut self, width: f64) -> Self {
        self.width = width;
        self
    }

    /// Horizontal and vertical justification for annotations and chord symbols.
    pub fn with_justification(mut self, h: HorizontalJustify, v: VerticalJustify) -> Self {
        match &mut self.kind {
            ModifierKind::Annotation {
                horizontal,
                vertical,
                ..
            }
            | ModifierKind::ChordSymbol {
                horizontal,
                vertical,
                ..
            } => {
                *horizontal = h;
                *vertical = v;
            }
            _ => {}
        }
        self
    }

    pub fn with_report_width(mut self, report: bool) -> Self {
        if let ModifierKind::ChordSymbol { report_width, .. } = &mut self.kind {
            *report_width = report;
        }
        self
    }

    // ── Accessors ──

    pub fn category(&self) -> Category {
        match self.kind {
            ModifierKind::Parenthesis => Category::Parenthesis,
            ModifierKind::Dot => Category::Dot,
            ModifierKind::Fingering { .. } => Category::Fingering,
            ModifierKind::Accidental { .. } => Category::Accidental,
            ModifierKind::Stroke(_) => Category::Stroke,
            ModifierKind::GraceNoteGroup { .. } => Category::GraceNoteGroup,
            ModifierKind::NoteSubGroup(_) => Category::NoteSubGroup,
            ModifierKind::StringNumber { .. } => Category::StringNumber,
            ModifierKind::Articulation { .. } => Category::Articulation,
            ModifierKind::Ornament { .. } => Category::Ornament,
            ModifierKind::Annotation { .. } => Category::Annotation,
            ModifierKind::ChordSymbol { .. } => Category::ChordSymbol,
            ModifierKind::Bend { .. } => Category::Bend,
            ModifierKind::Vibrato => Category::Vibrato,
        }
    }

    pub fn kind(&self) -> &ModifierKind {
        &self.kind
    }

    pub(crate) fn kind_mut(&mut self) -> &mut ModifierKind {
        &mut self.kind
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub(crate) fn set_width(&mut self, width: f64) {
        self.width = width;
    }

    pub fn x_shift(&self) -> f64 {
        self.x_shift
    }

    pub(crate) fn set_x_shift(&mut self, shift: f64) {
        self.x_shift = shift;
    }

    pub fn y_shift(&self) -> f64 {
        self.y_shift
    }

    pub(crate) fn set_y_shift(&mut self, shift: f64) {
        self.y_shift = shift;
    }

    pub fn text_line(&self) -> f64 {
        self.text_line
    }

    pub(crate) fn set_text_line(&mut self, line: f64) {
        self.text_line = line;
    }

    pub fn spacing_from_next(&self) -> f64 {
        self.spacing_from_next
    }

    pub(crate) fn set_spacing_from_next(&mut self, spacing: f64) {
        self.spacing_from_next = spacing;
    }
}

/// One modifier inside the voices being formatted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ModRef {
    pub note: TickableRef,
    pub modifier: usize,
}

impl ModRef {
    pub fn get<'a>(&self, voices: &'a [Voice]) -> &'a Modifier {
        &self.note.get(voices).modifiers()[self.modifier]
    }

    pub fn get_mut<'a>(&self, voices: &'a mut [Voice]) -> &'a mut Modifier {
        &mut self.note.get_mut(voices).modifiers_mut()[self.modifier]
    }

    pub fn note<'a>(&self, voices: &'a [Voice]) -> &'a Tickable {
        self.note.get(voices)
    }
}

/// Descending by line, keeping insertion order for equal lines.
pub(crate) fn by_line_desc(a: f64, b: f64) -> std::cmp::Ordering {
    b.partial_cmp(&a).unwrap_or(std::cmp::Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_order_is_locked() {
        assert_eq!(
            FORMAT_ORDER,
            [
                Category::Note,
                Category::Parenthesis,
                Category::Dot,
                Category::Fingering,
                Category::Accidental,
                Category::Stroke,
                Category::GraceNoteGroup,
                Category::NoteSubGroup,
                Category::StringNumber,
                Category::Articulation,
                Category::Ornament,
                Category::Annotation,
                Category::ChordSymbol,
                Category::Bend,
                Category::Vibrato,
            ]
        );
    }

    #[test]
    fn format_order_matches_declaration_order() {
        let mut sorted = FORMAT_ORDER;
        sorted.sort();
        assert_eq!(sorted, FORMAT_ORDER);
        // every category appears exactly once
        sorted.windows(2).for_each(|w| assert!(w[0] < w[1]));
    }

    #[test]
    fn categories_follow_the_payload() {
        assert_eq!(Modifier::dot().category(), Category::Dot);
        assert_eq!(
            Modifier::accidental(AccidentalType::Flat).category(),
            Category::Accidental
        );
        assert_eq!(Modifier::vibrato().category(), Category::Vibrato);
        assert_eq!(
            Modifier::ornament(OrnamentType::Scoop).category(),
            Category::Ornament
        );
    }

    #[test]
    fn cautionary_accidentals_are_wider() {
        let plain = Modifier::accidental(AccidentalType::Sharp);
        let cautionary = Modifier::accidental(AccidentalType::Sharp).cautionary().cautionary();
        assert_eq!(cautionary.width(), plain.width() + 2.0 * PARENTHESIS_WIDTH);
    }

    #[test]
    fn ornament_families() {
        assert!(OrnamentType::Scoop.is_attack());
        assert!(OrnamentType::parse("fallLong").unwrap().is_release());
        assert!(OrnamentType::parse("plungerOpen").unwrap().is_articulation());
        assert!(OrnamentType::parse("nope").is_none());
    }
}
