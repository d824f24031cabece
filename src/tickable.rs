//! Tickables: anything that occupies rhythmic time in a voice.
//!
//! A tickable carries its intrinsic duration, the product of every tuplet
//! ratio applied to it, its modifiers, and the geometry the formatter
//! assigns to it (width after pre-formatting, x after justification).

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::{FormatError, Result};
use crate::fraction::Fraction;
use crate::modifier::{Category, Modifier};
use crate::tables::{self, Clef, NoteType, ParsedDuration};
use crate::voice::Voice;

// ═══════════════════════════════════════════════════════════════════════
// Supporting types
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StemDirection {
    #[default]
    Up,
    Down,
}

impl StemDirection {
    pub fn flipped(self) -> Self {
        match self {
            StemDirection::Up => StemDirection::Down,
            StemDirection::Down => StemDirection::Up,
        }
    }
}

/// One notehead of a note or chord.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyProps {
    pub key: String,
    /// Stave line, bottom line = 1, spaces at half steps.
    pub line: f64,
    pub displaced: bool,
}

/// A tuplet ratio: `num_notes` played in the time of `notes_occupied`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tuplet {
    pub num_notes: i64,
    pub notes_occupied: i64,
}

impl Tuplet {
    pub fn new(num_notes: i64, notes_occupied: i64) -> Result<Self> {
        if num_notes <= 0 || notes_occupied <= 0 {
            return Err(FormatError::BadArgument(format!(
                "tuplet {num_notes}:{notes_occupied} must be positive"
            )));
        }
        Ok(Self {
            num_notes,
            notes_occupied,
        })
    }

    /// A triplet: three notes in the time of two.
    pub fn triplet() -> Self {
        Self {
            num_notes: 3,
            notes_occupied: 2,
        }
    }

    /// Apply this tuplet to a run of tickables.
    pub fn attach(&self, tickables: &mut [Tickable]) -> Result<()> {
        for tickable in tickables {
            tickable.add_tuplet(*self)?;
        }
        Ok(())
    }
}

/// What kind of timed (or untimed) object this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickableKind {
    Note,
    Rest,
    /// Invisible; takes time but no space.
    Ghost,
    /// A fixed-width symbol such as a clef change inside a sub-group.
    Glyph,
    /// A barline. Ignores ticks.
    Bar,
    GraceNote,
}

/// Index of a tickable inside the slice of voices being formatted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TickableRef {
    pub voice: usize,
    pub index: usize,
}

impl TickableRef {
    pub fn new(voice: usize, index: usize) -> Self {
        Self { voice, index }
    }

    pub fn get<'a>(&self, voices: &'a [Voice]) -> &'a Tickable {
        &voices[self.voice].tickables()[self.index]
    }

    pub fn get_mut<'a>(&self, voices: &'a mut [Voice]) -> &'a mut Tickable {
        &mut voices[self.voice].tickables_mut()[self.index]
    }
}

/// Space reserved left and right of the notehead by the tickable's
/// modifier context.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ModifierExtent {
    pub left: f64,
    pub right: f64,
}

impl ModifierExtent {
    pub fn width(&self) -> f64 {
        self.left + self.right
    }
}

/// Horizontal metrics of a pre-formatted tickable.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct NoteMetrics {
    /// Total width including modifiers.
    pub width: f64,
    pub glyph_px: f64,
    /// Width of the note itself, without modifiers or displaced heads.
    pub note_px: f64,
    pub mod_left_px: f64,
    pub mod_right_px: f64,
    pub left_displaced_head_px: f64,
    pub right_displaced_head_px: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Freedom {
    pub left: f64,
    pub right: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Space {
    pub used: f64,
    pub mean: f64,
    pub deviation: f64,
}

/// Diagnostics written by `Formatter::evaluate`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FormatterMetrics {
    /// Simplified tick fraction used as the duration class.
    pub duration: String,
    pub freedom: Freedom,
    pub iterations: usize,
    pub space: Space,
}

// ═══════════════════════════════════════════════════════════════════════
// Tickable
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct Tickable {
    kind: TickableKind,
    duration: &'static str,
    dots: usize,
    keys: Vec<KeyProps>,
    /// Key indices ordered from the lowest line to the highest.
    sorted_keys: Vec<usize>,
    stem_direction: StemDirection,
    has_stem: bool,
    has_flag: bool,
    beamed: bool,
    displaced: bool,

    intrinsic_ticks: i64,
    tick_multiplier: Fraction,
    ticks: Fraction,
    tuplets: Vec<Tuplet>,
    ignore_ticks: bool,

    glyph_width: f64,
    width: Option<f64>,
    modifier_extent: ModifierExtent,
    x_shift: f64,
    left_displaced_head_px: f64,
    right_displaced_head_px: f64,
    align_center: bool,
    center_x_shift: f64,
    draw: bool,

    modifiers: Vec<Modifier>,
    stave: usize,
    pub(crate) modifier_context: Option<usize>,
    pub(crate) tick_context: Option<usize>,
    context_x: Option<f64>,
    formatter_metrics: FormatterMetrics,
    post_formatted: bool,
}

impl Tickable {
    fn from_duration(kind: TickableKind, parsed: &ParsedDuration, glyph_width: f64) -> Self {
        Tickable {
            kind,
            duration: parsed.code,
            dots: parsed.dots,
            keys: Vec::new(),
            sorted_keys: Vec::new(),
            stem_direction: StemDirection::Up,
            has_stem: parsed.has_stem() && matches!(kind, TickableKind::Note | TickableKind::GraceNote),
            has_flag: parsed.has_flag() && matches!(kind, TickableKind::Note | TickableKind::GraceNote),
            beamed: false,
            displaced: false,
            intrinsic_ticks: parsed.ticks,
            tick_multiplier: Fraction::one(),
            ticks: Fraction::from_integer(parsed.ticks),
            tuplets: Vec::new(),
            ignore_ticks: false,
            glyph_width,
            width: None,
            modifier_extent: ModifierExtent::default(),
            x_shift: 0.0,
            left_displaced_head_px: 0.0,
            right_displaced_head_px: 0.0,
            align_center: false,
            center_x_shift: 0.0,
            draw: true,
            modifiers: Vec::new(),
            stave: 0,
            modifier_context: None,
            tick_context: None,
            context_x: None,
            formatter_metrics: FormatterMetrics::default(),
            post_formatted: false,
        }
    }

    /// A note (or chord) in treble clef. A duration with an `r` suffix builds
    /// a rest and one with `g` a ghost note.
    pub fn note(keys: &[&str], duration: &str) -> Result<Self> {
        Self::note_in_clef(keys, duration, Clef::Treble)
    }

    pub fn note_in_clef(keys: &[&str], duration: &str, clef: Clef) -> Result<Self> {
        let parsed = tables::parse_duration(duration)?;
        match parsed.note_type {
            NoteType::Rest => return Self::rest_from(&parsed, keys, clef),
            NoteType::Ghost => return Ok(Self::from_duration(TickableKind::Ghost, &parsed, 0.0)),
            NoteType::Note => {}
        }
        if keys.is_empty() {
            return Err(FormatError::BadArgument("a note needs at least one key".into()));
        }
        let mut note = Self::from_duration(TickableKind::Note, &parsed, tables::notehead_width(parsed.base_ticks));
        note.set_keys(keys, clef)?;
        note.calc_note_displacements();
        Ok(note)
    }

    /// A rest on the default line.
    pub fn rest(duration: &str) -> Result<Self> {
        let parsed = tables::parse_duration(duration)?;
        Self::rest_from(&parsed, &[], Clef::Treble)
    }

    fn rest_from(parsed: &ParsedDuration, keys: &[&str], clef: Clef) -> Result<Self> {
        let mut rest = Self::from_duration(TickableKind::Rest, parsed, tables::rest_width(parsed.base_ticks));
        let line = match keys.first() {
            Some(key) => tables::key_line(key, clef)?,
            None if parsed.base_ticks >= RESOLUTION => REST_DEFAULT_LINE + 1.0,
            None => REST_DEFAULT_LINE,
        };
        rest.keys.push(KeyProps {
            key: keys.first().map(|k| k.to_string()).unwrap_or_else(|| "r/4".into()),
            line,
            displaced: false,
        });
        rest.sort_keys();
        Ok(rest)
    }

    /// An invisible placeholder that only takes time.
    pub fn ghost(duration: &str) -> Result<Self> {
        let parsed = tables::parse_duration(duration)?;
        Ok(Self::from_duration(TickableKind::Ghost, &parsed, 0.0))
    }

    /// A grace note: scaled notehead, no ticks of its own in the host voice.
    pub fn grace_note(keys: &[&str], duration: &str) -> Result<Self> {
        let mut note = Self::note(keys, duration)?;
        note.kind = TickableKind::GraceNote;
        note.glyph_width *= GRACE_NOTE_SCALE;
        note.calc_note_displacements();
        Ok(note)
    }

    /// A fixed-width symbol taking `duration` of time.
    pub fn glyph(duration: &str, width: f64) -> Result<Self> {
        let parsed = tables::parse_duration(duration)?;
        Ok(Self::from_duration(TickableKind::Glyph, &parsed, width))
    }

    /// A barline. Its ticks are ignored by voices and contexts.
    pub fn bar(width: f64) -> Self {
        let parsed = ParsedDuration {
            code: "1",
            base_ticks: RESOLUTION,
            dots: 0,
            ticks: 0,
            note_type: NoteType::Note,
        };
        let mut bar = Self::from_duration(TickableKind::Bar, &parsed, width);
        bar.ignore_ticks = true;
        bar
    }

    fn set_keys(&mut self, keys: &[&str], clef: Clef) -> Result<()> {
        let mut last_line: Option<f64> = None;
        for (i, key) in keys.iter().enumerate() {
            let line = tables::key_line(key, clef)?;
            let mut displaced = false;
            if let Some(last) = last_line {
                // seconds and unisons
                if (last - line).abs() < 1.0 {
                    self.displaced = true;
                    displaced = true;
                    self.keys[i - 1].displaced = true;
                }
            }
            last_line = Some(line);
            self.keys.push(KeyProps {
                key: key.to_string(),
                line,
                displaced,
            });
        }
        self.sort_keys();
        Ok(())
    }

    fn sort_keys(&mut self) {
        let keys = &self.keys;
        let mut order: Vec<usize> = (0..keys.len()).collect();
        order.sort_by(|&a, &b| keys[a].line.total_cmp(&keys[b].line));
        self.sorted_keys = order;
    }

    fn calc_note_displacements(&mut self) {
        let glyph = self.glyph_width;
        self.left_displaced_head_px = if self.displaced && self.stem_direction == StemDirection::Down {
            glyph
        } else {
            0.0
        };
        self.right_displaced_head_px =
            if !self.draws_flag() && self.displaced && self.stem_direction == StemDirection::Up {
                glyph
            } else {
                0.0
            };
    }

    fn draws_flag(&self) -> bool {
        self.has_flag && !self.beamed
    }

    // ── Builders ──

    pub fn with_stem_direction(mut self, direction: StemDirection) -> Self {
        self.set_stem_direction(direction);
        self
    }

    /// Stem down when the midpoint of the outer keys sits on or above the
    /// middle line.
    pub fn with_auto_stem(mut self) -> Self {
        if !self.keys.is_empty() {
            let decider = (self.line_number(false) + self.line_number(true)) / 2.0;
            let direction = if decider < MIDDLE_LINE {
                StemDirection::Up
            } else {
                StemDirection::Down
            };
            self.set_stem_direction(direction);
        }
        self
    }

    pub fn with_modifier(mut self, modifier: Modifier, index: usize) -> Result<Self> {
        self.add_modifier(modifier, index)?;
        Ok(self)
    }

    pub fn with_stave(mut self, stave: usize) -> Self {
        self.stave = stave;
        self
    }

    pub fn with_center_alignment(mut self, align: bool) -> Self {
        self.align_center = align;
        self
    }

    /// Mark the note as beamed; beamed notes draw no flag.
    pub fn with_beam(mut self, beamed: bool) -> Self {
        self.beamed = beamed;
        self.calc_note_displacements();
        self.width = None;
        self
    }

    // ── Ticks ──

    pub fn kind(&self) -> TickableKind {
        self.kind
    }

    pub fn duration(&self) -> &'static str {
        self.duration
    }

    pub fn dots(&self) -> usize {
        self.dots
    }

    pub fn intrinsic_ticks(&self) -> i64 {
        self.intrinsic_ticks
    }

    pub fn tick_multiplier(&self) -> Fraction {
        self.tick_multiplier
    }

    pub fn ticks(&self) -> Fraction {
        self.ticks
    }

    pub fn should_ignore_ticks(&self) -> bool {
        self.ignore_ticks
    }

    pub fn set_ignore_ticks(&mut self, ignore: bool) {
        self.ignore_ticks = ignore;
        if ignore {
            self.ticks = Fraction::zero();
        } else {
            self.ticks = Fraction::from_integer(self.intrinsic_ticks) * self.tick_multiplier;
        }
    }

    /// Innermost tuplet, if any.
    pub fn tuplet(&self) -> Option<&Tuplet> {
        self.tuplets.last()
    }

    pub fn tuplet_stack(&self) -> &[Tuplet] {
        &self.tuplets
    }

    pub fn add_tuplet(&mut self, tuplet: Tuplet) -> Result<()> {
        self.apply_tick_multiplier(tuplet.notes_occupied, tuplet.num_notes)?;
        self.tuplets.push(tuplet);
        Ok(())
    }

    pub fn clear_tuplets(&mut self) -> Result<()> {
        while let Some(tuplet) = self.tuplets.pop() {
            self.apply_tick_multiplier(tuplet.num_notes, tuplet.notes_occupied)?;
        }
        Ok(())
    }

    fn apply_tick_multiplier(&mut self, numerator: i64, denominator: i64) -> Result<()> {
        let tick_multiplier = self.tick_multiplier.multiply(numerator, denominator)?;
        let ticks = Fraction::from_integer(self.intrinsic_ticks).checked_mul(tick_multiplier)?;
        self.tick_multiplier = tick_multiplier;
        if !self.ignore_ticks {
            self.ticks = ticks;
        }
        Ok(())
    }

    // ── Keys & stems ──

    pub fn keys(&self) -> &[KeyProps] {
        &self.keys
    }

    /// Keys from the lowest line to the highest.
    pub fn sorted_keys(&self) -> impl Iterator<Item = &KeyProps> {
        self.sorted_keys.iter().map(|&i| &self.keys[i])
    }

    pub fn is_rest(&self) -> bool {
        self.kind == TickableKind::Rest
    }

    /// Notes and rests take part in multi-voice collision handling.
    pub(crate) fn is_stave_note(&self) -> bool {
        matches!(self.kind, TickableKind::Note | TickableKind::Rest)
    }

    pub fn is_beamed(&self) -> bool {
        self.beamed
    }

    pub fn has_stem(&self) -> bool {
        self.has_stem
    }

    pub fn is_displaced(&self) -> bool {
        self.displaced
    }

    pub fn stem_direction(&self) -> StemDirection {
        self.stem_direction
    }

    pub fn set_stem_direction(&mut self, direction: StemDirection) {
        self.stem_direction = direction;
        self.calc_note_displacements();
        self.width = None;
    }

    /// Stem length in stave lines.
    pub(crate) fn stem_lines(&self) -> f64 {
        if !self.has_stem {
            return 0.0;
        }
        let height = if self.kind == TickableKind::GraceNote {
            STEM_HEIGHT * GRACE_NOTE_SCALE
        } else {
            STEM_HEIGHT
        };
        height / STAVE_LINE_DISTANCE
    }

    /// Highest key line when `top` is set, lowest otherwise.
    pub fn line_number(&self, top: bool) -> f64 {
        let index = if top {
            self.sorted_keys.last()
        } else {
            self.sorted_keys.first()
        };
        index
            .and_then(|&i| self.keys.get(i))
            .map_or(REST_DEFAULT_LINE, |k| k.line)
    }

    pub fn key_line(&self, index: usize) -> Option<f64> {
        self.keys.get(index).map(|k| k.line)
    }

    pub(crate) fn set_key_line(&mut self, index: usize, line: f64) {
        if let Some(key) = self.keys.get_mut(index) {
            key.line = line;
            self.sort_keys();
        }
    }

    /// Line a rest next to this note should sit on.
    pub fn line_for_rest(&self) -> f64 {
        let Some(first) = self.keys.first() else {
            return REST_DEFAULT_LINE;
        };
        let mut rest_line = first.line;
        if self.keys.len() > 1 {
            if let Some(last) = self.keys.last() {
                let top = rest_line.max(last.line);
                let bottom = rest_line.min(last.line);
                rest_line = mid_line(top, bottom);
            }
        }
        rest_line
    }

    pub fn is_visible(&self) -> bool {
        self.draw
    }

    pub(crate) fn hide(&mut self) {
        self.draw = false;
    }

    // ── Modifiers ──

    pub fn modifiers(&self) -> &[Modifier] {
        &self.modifiers
    }

    pub(crate) fn modifiers_mut(&mut self) -> &mut [Modifier] {
        &mut self.modifiers
    }

    /// Attach a modifier to the key at `index`.
    pub fn add_modifier(&mut self, mut modifier: Modifier, index: usize) -> Result<&mut Self> {
        if index > 0 && index >= self.keys.len() {
            return Err(FormatError::BadArgument(format!(
                "modifier index {index} out of range for {} keys",
                self.keys.len()
            )));
        }
        modifier.set_index(index);
        self.modifiers.push(modifier);
        self.width = None;
        Ok(self)
    }

    pub fn has_modifier(&self, category: Category, index: usize) -> bool {
        self.modifiers
            .iter()
            .any(|m| m.category() == category && m.index() == index)
    }

    // ── Geometry ──

    pub fn stave(&self) -> usize {
        self.stave
    }

    pub fn glyph_width(&self) -> f64 {
        self.glyph_width
    }

    /// Width of the glyph block used when another voice has to step aside.
    pub fn voice_shift_width(&self) -> f64 {
        self.glyph_width * if self.displaced { 2.0 } else { 1.0 }
    }

    pub fn left_displaced_head_px(&self) -> f64 {
        self.left_displaced_head_px
    }

    pub fn right_displaced_head_px(&self) -> f64 {
        self.right_displaced_head_px
    }

    pub fn x_shift(&self) -> f64 {
        self.x_shift
    }

    pub fn set_x_shift(&mut self, shift: f64) {
        self.x_shift = shift;
    }

    pub fn is_center_aligned(&self) -> bool {
        self.align_center
    }

    pub fn center_x_shift(&self) -> f64 {
        self.center_x_shift
    }

    pub(crate) fn set_center_x_shift(&mut self, shift: f64) {
        self.center_x_shift = shift;
    }

    pub fn is_preformatted(&self) -> bool {
        self.width.is_some()
    }

    /// Compute the tickable's own width. `extent` is the space reserved by
    /// its modifier context, `None` when it was never joined to one.
    pub(crate) fn pre_format(&mut self, extent: Option<ModifierExtent>) {
        if self.width.is_some() {
            return;
        }
        let width = match self.kind {
            TickableKind::Note | TickableKind::Rest | TickableKind::GraceNote => {
                let padding = match extent {
                    Some(e) if e.width() == 0.0 => MIN_NOTEHEAD_PADDING,
                    _ => 0.0,
                };
                let mut width = self.glyph_width
                    + self.left_displaced_head_px
                    + self.right_displaced_head_px
                    + padding;
                if self.draws_flag() && self.stem_direction == StemDirection::Up {
                    width += self.glyph_width;
                }
                width
            }
            TickableKind::Ghost => 0.0,
            TickableKind::Glyph | TickableKind::Bar => self.glyph_width,
        };
        self.modifier_extent = extent.unwrap_or_default();
        self.width = Some(width);
    }

    /// Full width including modifier space.
    pub fn width(&self) -> Result<f64> {
        self.width
            .map(|w| w + self.modifier_extent.width())
            .ok_or(FormatError::UnformattedNote)
    }

    pub fn metrics(&self) -> Result<NoteMetrics> {
        let width = self.width()?;
        let mod_left_px = self.modifier_extent.left;
        let mod_right_px = self.modifier_extent.right;
        Ok(NoteMetrics {
            width,
            glyph_px: self.glyph_width,
            note_px: width
                - mod_left_px
                - mod_right_px
                - self.left_displaced_head_px
                - self.right_displaced_head_px,
            mod_left_px,
            mod_right_px,
            left_displaced_head_px: self.left_displaced_head_px,
            right_displaced_head_px: self.right_displaced_head_px,
        })
    }

    pub(crate) fn set_context_x(&mut self, x: f64) {
        self.context_x = Some(x);
    }

    /// Tick context x plus this tickable's own shift.
    pub fn x(&self) -> Result<f64> {
        self.context_x
            .map(|x| x + self.x_shift)
            .ok_or(FormatError::NoXPosition)
    }

    /// Position as drawn: centre-aligned tickables include their centre shift.
    pub fn absolute_x(&self) -> Result<f64> {
        let x = self.context_x.ok_or(FormatError::NoXPosition)?;
        Ok(if self.align_center {
            x + self.center_x_shift
        } else {
            x
        })
    }

    pub fn formatter_metrics(&self) -> &FormatterMetrics {
        &self.formatter_metrics
    }

    pub(crate) fn formatter_metrics_mut(&mut self) -> &mut FormatterMetrics {
        &mut self.formatter_metrics
    }

    /// Forget every context assignment before a fresh grouping.
    pub(crate) fn reset_tick_context(&mut self, id: usize) {
        self.tick_context = Some(id);
        self.context_x = None;
        self.width = None;
        self.post_formatted = false;
    }

    pub fn tick_context(&self) -> Option<usize> {
        self.tick_context
    }

    pub fn modifier_context(&self) -> Option<usize> {
        self.modifier_context
    }

    pub(crate) fn post_format(&mut self) {
        self.post_formatted = true;
    }

    pub fn is_post_formatted(&self) -> bool {
        self.post_formatted
    }
}

/// Middle of two lines, rounded to the nearest half line.
pub(crate) fn mid_line(top: f64, bottom: f64) -> f64 {
    let mut mid = bottom + (top - bottom) / 2.0;
    if mid % 2.0 > 0.0 {
        mid = (mid * 10.0 / 5.0).round() * 5.0 / 10.0;
    }
    mid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modifier::Modifier;

    #[test]
    fn tuplets_scale_ticks_exactly() {
        let mut note = Tickable::note(&["c/4"], "8").unwrap();
        note.add_tuplet(Tuplet::triplet()).unwrap();
        assert_eq!(note.ticks(), Fraction::new(4096, 3).unwrap());
        note.add_tuplet(Tuplet::new(5, 4).unwrap()).unwrap();
        assert_eq!(note.ticks(), Fraction::new(2048 * 8, 15).unwrap());
        assert_eq!(note.tuplet_stack().len(), 2);

        note.clear_tuplets().unwrap();
        assert_eq!(note.ticks(), Fraction::from_integer(2048));
        assert_eq!(note.tick_multiplier(), Fraction::one());
    }

    #[test]
    fn width_is_an_error_until_preformatted() {
        let mut note = Tickable::note(&["c/4"], "4").unwrap();
        assert!(matches!(note.width(), Err(FormatError::UnformattedNote)));
        assert!(matches!(note.metrics(), Err(FormatError::UnformattedNote)));
        note.pre_format(Some(ModifierExtent::default()));
        assert_eq!(note.width().unwrap(), NOTEHEAD_BLACK_WIDTH + MIN_NOTEHEAD_PADDING);
    }

    #[test]
    fn x_is_an_error_until_placed() {
        let mut note = Tickable::note(&["c/4"], "4").unwrap();
        assert!(matches!(note.x(), Err(FormatError::NoXPosition)));
        note.set_x_shift(3.0);
        note.set_context_x(10.0);
        assert_eq!(note.x().unwrap(), 13.0);
    }

    #[test]
    fn metrics_split_modifier_space_from_note_space() {
        let mut note = Tickable::note(&["c/4"], "4").unwrap();
        note.pre_format(Some(ModifierExtent { left: 8.0, right: 6.0 }));
        let m = note.metrics().unwrap();
        assert_eq!(m.width, NOTEHEAD_BLACK_WIDTH + 14.0);
        assert_eq!(m.note_px, NOTEHEAD_BLACK_WIDTH);
        assert_eq!(m.mod_left_px, 8.0);
        assert_eq!(m.mod_right_px, 6.0);
    }

    #[test]
    fn seconds_displace_a_notehead() {
        let up = Tickable::note(&["c/4", "d/4"], "4").unwrap();
        assert!(up.is_displaced());
        assert!(up.keys()[0].displaced && up.keys()[1].displaced);
        assert_eq!(up.right_displaced_head_px(), NOTEHEAD_BLACK_WIDTH);
        assert_eq!(up.left_displaced_head_px(), 0.0);

        let down = up.with_stem_direction(StemDirection::Down);
        assert_eq!(down.left_displaced_head_px(), NOTEHEAD_BLACK_WIDTH);
        assert_eq!(down.right_displaced_head_px(), 0.0);
    }

    #[test]
    fn unisons_displace_like_seconds() {
        let unison = Tickable::note(&["c/4", "c/4"], "4").unwrap();
        assert!(unison.is_displaced());
        assert_eq!(unison.right_displaced_head_px(), NOTEHEAD_BLACK_WIDTH);

        let third = Tickable::note(&["c/4", "e/4"], "4").unwrap();
        assert!(!third.is_displaced());
        assert_eq!(third.right_displaced_head_px(), 0.0);
    }

    #[test]
    fn auto_stem_follows_the_outer_keys() {
        // the average line (2.5) is below the middle line, the midpoint (3.5) above
        let chord = Tickable::note(&["c/4", "d/4", "c/6"], "4").unwrap().with_auto_stem();
        assert_eq!(chord.stem_direction(), StemDirection::Down);

        let low = Tickable::note(&["e/4", "g/4"], "4").unwrap().with_auto_stem();
        assert_eq!(low.stem_direction(), StemDirection::Up);
        let middle = Tickable::note(&["b/4"], "4").unwrap().with_auto_stem();
        assert_eq!(middle.stem_direction(), StemDirection::Down);
    }

    #[test]
    fn keys_keep_input_order_with_a_sorted_view() {
        let chord = Tickable::note(&["g/4", "c/4", "e/4"], "4").unwrap();
        let given: Vec<&str> = chord.keys().iter().map(|k| k.key.as_str()).collect();
        assert_eq!(given, vec!["g/4", "c/4", "e/4"]);
        let sorted: Vec<f64> = chord.sorted_keys().map(|k| k.line).collect();
        assert_eq!(sorted, vec![0.0, 1.0, 2.0]);
        assert_eq!(chord.line_number(false), 0.0);
        assert_eq!(chord.line_number(true), 2.0);
    }

    #[test]
    fn up_stem_flags_widen_the_note() {
        let mut eighth = Tickable::note(&["c/4"], "8").unwrap();
        eighth.pre_format(Some(ModifierExtent::default()));
        assert_eq!(
            eighth.width().unwrap(),
            2.0 * NOTEHEAD_BLACK_WIDTH + MIN_NOTEHEAD_PADDING
        );

        let mut beamed = Tickable::note(&["c/4"], "8").unwrap().with_beam(true);
        beamed.pre_format(Some(ModifierExtent::default()));
        assert_eq!(beamed.width().unwrap(), NOTEHEAD_BLACK_WIDTH + MIN_NOTEHEAD_PADDING);
    }

    #[test]
    fn rests_and_ghosts() {
        let rest = Tickable::note(&["b/4"], "4r").unwrap();
        assert!(rest.is_rest());
        assert_eq!(rest.line_number(true), 3.0);
        let whole = Tickable::rest("1").unwrap();
        assert_eq!(whole.key_line(0), Some(4.0));

        let mut ghost = Tickable::ghost("8").unwrap();
        ghost.pre_format(Some(ModifierExtent::default()));
        assert_eq!(ghost.width().unwrap(), 0.0);
        assert_eq!(ghost.ticks(), Fraction::from_integer(2048));
    }

    #[test]
    fn bars_ignore_ticks() {
        let bar = Tickable::bar(8.0);
        assert!(bar.should_ignore_ticks());
        assert!(bar.ticks().is_zero());
    }

    #[test]
    fn modifier_index_must_name_a_key() {
        let mut note = Tickable::note(&["c/4", "e/4"], "4").unwrap();
        assert!(note.add_modifier(Modifier::dot(), 1).is_ok());
        assert!(matches!(
            note.add_modifier(Modifier::dot(), 2),
            Err(FormatError::BadArgument(_))
        ));
    }

    #[test]
    fn rest_line_sits_between_chord_extremes() {
        let chord = Tickable::note(&["c/4", "g/4"], "4").unwrap();
        assert_eq!(chord.line_for_rest(), 1.0);
        assert_eq!(mid_line(5.0, 2.0), 3.5);
    }
}
