//! JSON measure description and the layout produced from it.
//!
//! A `MeasureSpec` describes one measure: time signature, formatter options
//! and a list of voices. `build_voices` turns it into real `Voice`s and
//! `MeasureLayout::collect` snapshots a finished formatting pass so it can be
//! handed back across FFI as JSON.

use serde::{Deserialize, Serialize};

use crate::error::{FormatError, Result};
use crate::formatter::{ContextGaps, Formatter, FormatterOptions, Spacing};
use crate::modifier::{
    AccidentalType, Category, HorizontalJustify, Modifier, OrnamentType, Position, StrokeType,
    SymbolBlock, SymbolBlockKind, VerticalJustify,
};
use crate::tables::Clef;
use crate::tickable::{FormatterMetrics, NoteMetrics, StemDirection, Tickable, Tuplet};
use crate::voice::{Voice, VoiceMode, VoiceTime};

// ═══════════════════════════════════════════════════════════════════════
// Input
// ═══════════════════════════════════════════════════════════════════════

/// One measure to format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasureSpec {
    pub time: VoiceTime,
    pub clef: Clef,
    /// Width to justify to. Zero keeps the natural spacing.
    pub justify_width: f64,
    pub options: FormatterOptions,
    pub spacing: Spacing,
    /// Run one `tune` pass after formatting.
    pub tune: bool,
    pub voices: Vec<VoiceSpec>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceSpec {
    pub mode: VoiceMode,
    pub notes: Vec<NoteSpec>,
    pub tuplets: Vec<TupletSpec>,
}

/// What a `NoteSpec` builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteKindSpec {
    #[default]
    Note,
    Rest,
    Ghost,
    Glyph,
    Bar,
    Grace,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NoteSpec {
    pub kind: NoteKindSpec,
    pub keys: Vec<String>,
    pub duration: String,
    /// Clef for key lookup; the measure's clef when absent.
    pub clef: Option<Clef>,
    /// Explicit stem direction. Without one the stem follows the keys.
    pub stem: Option<StemDirection>,
    pub stave: usize,
    pub beamed: bool,
    pub center: bool,
    /// Fixed width for glyphs and bars.
    pub width: f64,
    pub modifiers: Vec<ModifierSpec>,
}

impl Default for NoteSpec {
    fn default() -> Self {
        Self {
            kind: NoteKindSpec::Note,
            keys: Vec::new(),
            duration: "4".into(),
            clef: None,
            stem: None,
            stave: 0,
            beamed: false,
            center: false,
            width: 0.0,
            modifiers: Vec::new(),
        }
    }
}

/// `count` notes starting at `start` played as `num_notes` in the time of
/// `notes_occupied`. Overlapping ranges nest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TupletSpec {
    pub start: usize,
    pub count: usize,
    pub num_notes: i64,
    pub notes_occupied: i64,
}

/// A modifier attached to the key at `index`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModifierSpec {
    #[serde(default)]
    pub index: usize,
    #[serde(flatten)]
    pub kind: ModifierKindSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModifierKindSpec {
    Accidental {
        code: String,
        #[serde(default)]
        cautionary: bool,
    },
    Dot,
    Parenthesis {
        #[serde(default)]
        position: Position,
    },
    Fingering {
        finger: String,
        #[serde(default)]
        position: Position,
    },
    Stroke {
        stroke: StrokeType,
    },
    StringNumber {
        number: u32,
        #[serde(default)]
        position: Position,
    },
    Articulation {
        code: String,
        position: Option<Position>,
    },
    Ornament {
        name: String,
    },
    Annotation {
        text: String,
        #[serde(default)]
        horizontal: HorizontalJustify,
        #[serde(default)]
        vertical: VerticalJustify,
    },
    ChordSymbol {
        blocks: Vec<SymbolBlockSpec>,
    },
    Bend {
        text: String,
    },
    Vibrato,
    GraceNotes {
        notes: Vec<NoteSpec>,
        #[serde(default)]
        slur: bool,
    },
    SubGroup {
        notes: Vec<NoteSpec>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolBlockSpec {
    pub text: String,
    #[serde(default)]
    pub kind: SymbolBlockKind,
}

impl MeasureSpec {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Build one voice per `VoiceSpec`, tuplets applied before the notes
    /// are added so strict voices see their final durations.
    pub fn build_voices(&self) -> Result<Vec<Voice>> {
        self.voices
            .iter()
            .map(|spec| spec.build(self.time, self.clef))
            .collect()
    }

    /// A formatter configured with this measure's options and spacing.
    pub fn formatter(&self) -> Formatter {
        Formatter::with_options(self.options).with_spacing(self.spacing)
    }
}

impl VoiceSpec {
    pub fn build(&self, time: VoiceTime, clef: Clef) -> Result<Voice> {
        let mut notes = self
            .notes
            .iter()
            .map(|note| note.build(clef))
            .collect::<Result<Vec<_>>>()?;
        for tuplet in &self.tuplets {
            let out_of_range = || {
                FormatError::BadArgument(format!(
                    "tuplet covers {} notes from {} of a voice with {}",
                    tuplet.count,
                    tuplet.start,
                    self.notes.len()
                ))
            };
            let end = tuplet.start.checked_add(tuplet.count).ok_or_else(out_of_range)?;
            let run = notes.get_mut(tuplet.start..end).ok_or_else(out_of_range)?;
            Tuplet::new(tuplet.num_notes, tuplet.notes_occupied)?.attach(run)?;
        }
        let mut voice = Voice::new(time)?.with_mode(self.mode);
        voice.add_tickables(notes)?;
        Ok(voice)
    }
}

impl NoteSpec {
    pub fn build(&self, clef: Clef) -> Result<Tickable> {
        let keys: Vec<&str> = self.keys.iter().map(String::as_str).collect();
        let clef = self.clef.unwrap_or(clef);
        let mut tickable = match self.kind {
            NoteKindSpec::Note => Tickable::note_in_clef(&keys, &self.duration, clef)?,
            NoteKindSpec::Rest => Tickable::rest(&self.duration)?,
            NoteKindSpec::Ghost => Tickable::ghost(&self.duration)?,
            NoteKindSpec::Glyph => Tickable::glyph(&self.duration, self.width)?,
            NoteKindSpec::Bar => Tickable::bar(self.width),
            NoteKindSpec::Grace => Tickable::grace_note(&keys, &self.duration)?,
        };
        tickable = match self.stem {
            Some(direction) => tickable.with_stem_direction(direction),
            None if self.kind == NoteKindSpec::Note && !tickable.is_rest() => tickable.with_auto_stem(),
            None => tickable,
        };
        tickable = tickable
            .with_stave(self.stave)
            .with_beam(self.beamed)
            .with_center_alignment(self.center);
        for spec in &self.modifiers {
            tickable = tickable.with_modifier(spec.kind.build(clef)?, spec.index)?;
        }
        Ok(tickable)
    }
}

impl ModifierKindSpec {
    pub fn build(&self, clef: Clef) -> Result<Modifier> {
        let unknown = |what: &str, code: &str| FormatError::BadArgument(format!("unknown {what} '{code}'"));
        Ok(match self {
            Self::Accidental { code, cautionary } => {
                let accidental = AccidentalType::parse(code).ok_or_else(|| unknown("accidental", code))?;
                let modifier = Modifier::accidental(accidental);
                if *cautionary {
                    modifier.cautionary()
                } else {
                    modifier
                }
            }
            Self::Dot => Modifier::dot(),
            Self::Parenthesis { position } => Modifier::parenthesis(*position),
            Self::Fingering { finger, position } => Modifier::fingering(finger, *position),
            Self::Stroke { stroke } => Modifier::stroke(*stroke),
            Self::StringNumber { number, position } => Modifier::string_number(*number, *position),
            Self::Articulation { code, position } => {
                let modifier = Modifier::articulation(code);
                match position {
                    Some(position) => modifier.with_position(*position),
                    None => modifier,
                }
            }
            Self::Ornament { name } => {
                Modifier::ornament(OrnamentType::parse(name).ok_or_else(|| unknown("ornament", name))?)
            }
            Self::Annotation {
                text,
                horizontal,
                vertical,
            } => Modifier::annotation(text).with_justification(*horizontal, *vertical),
            Self::ChordSymbol { blocks } => Modifier::chord_symbol(
                blocks
                    .iter()
                    .map(|b| SymbolBlock::new(&b.text, b.kind))
                    .collect(),
            ),
            Self::Bend { text } => Modifier::bend(text),
            Self::Vibrato => Modifier::vibrato(),
            Self::GraceNotes { notes, slur } => {
                let notes = notes.iter().map(|n| n.build(clef)).collect::<Result<Vec<_>>>()?;
                Modifier::grace_note_group(notes, *slur)?
            }
            Self::SubGroup { notes } => {
                let notes = notes.iter().map(|n| n.build(clef)).collect::<Result<Vec<_>>>()?;
                Modifier::note_sub_group(notes)?
            }
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Output
// ═══════════════════════════════════════════════════════════════════════

/// Snapshot of a formatted measure.
#[derive(Debug, Clone, Serialize)]
pub struct MeasureLayout {
    pub justify_width: f64,
    pub target_width: f64,
    pub min_total_width: f64,
    pub iterations: usize,
    pub cost: f64,
    pub total_shift: f64,
    pub loss_history: Vec<f64>,
    pub gaps: ContextGaps,
    pub columns: Vec<ColumnLayout>,
    pub notes: Vec<NoteLayout>,
}

/// One tick context.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnLayout {
    /// Tick offset on the formatter's integer grid.
    pub tick: i64,
    pub x: f64,
    pub width: f64,
    pub note_px: f64,
    pub total_left_px: f64,
    pub total_right_px: f64,
    pub voices: Vec<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NoteLayout {
    pub voice: usize,
    pub index: usize,
    pub duration: String,
    pub x: f64,
    pub width: f64,
    pub visible: bool,
    pub stem: StemDirection,
    pub lines: Vec<f64>,
    pub x_shift: f64,
    pub center_x_shift: f64,
    pub metrics: NoteMetrics,
    pub formatter: FormatterMetrics,
    pub modifiers: Vec<ModifierLayout>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModifierLayout {
    pub category: Category,
    pub index: usize,
    pub width: f64,
    pub x_shift: f64,
    pub y_shift: f64,
    pub text_line: f64,
}

impl MeasureLayout {
    /// Read positions back out of a formatted pass. Every note must have
    /// been pre-formatted and placed.
    pub fn collect(formatter: &Formatter, voices: &[Voice]) -> Result<Self> {
        let columns = formatter
            .tick_contexts()
            .iter()
            .map(|context| {
                let metrics = context.metrics()?;
                Ok(ColumnLayout {
                    tick: context.tick_id(),
                    x: context.x()?,
                    width: metrics.width,
                    note_px: metrics.note_px,
                    total_left_px: metrics.total_left_px,
                    total_right_px: metrics.total_right_px,
                    voices: context.tickables_by_voice().keys().copied().collect(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut notes = Vec::new();
        for (v, voice) in voices.iter().enumerate() {
            for (index, note) in voice.tickables().iter().enumerate() {
                notes.push(NoteLayout {
                    voice: v,
                    index,
                    duration: note.duration().to_string(),
                    x: note.x()?,
                    width: note.width()?,
                    visible: note.is_visible(),
                    stem: note.stem_direction(),
                    lines: note.keys().iter().map(|k| k.line).collect(),
                    x_shift: note.x_shift(),
                    center_x_shift: note.center_x_shift(),
                    metrics: note.metrics()?,
                    formatter: note.formatter_metrics().clone(),
                    modifiers: note
                        .modifiers()
                        .iter()
                        .map(|m| ModifierLayout {
                            category: m.category(),
                            index: m.index(),
                            width: m.width(),
                            x_shift: m.x_shift(),
                            y_shift: m.y_shift(),
                            text_line: m.text_line(),
                        })
                        .collect(),
                });
            }
        }

        Ok(Self {
            justify_width: formatter.justify_width(),
            target_width: formatter.target_width(),
            min_total_width: formatter.min_total_width()?,
            iterations: formatter.iterations(),
            cost: formatter.total_cost(),
            total_shift: formatter.total_shift(),
            loss_history: formatter.loss_history().to_vec(),
            gaps: formatter.context_gaps().clone(),
            columns,
            notes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn minimal_measure_uses_defaults() {
        let spec = MeasureSpec::from_json(r#"{"voices":[{"notes":[{"keys":["c/4"],"duration":"1"}]}]}"#).unwrap();
        assert_eq!(spec.time, VoiceTime::default());
        assert_eq!(spec.clef, Clef::Treble);
        assert_eq!(spec.options, FormatterOptions::default());
        let voices = spec.build_voices().unwrap();
        assert_eq!(voices.len(), 1);
        assert!(voices[0].is_complete());
    }

    #[test]
    fn modifiers_are_tagged_by_type() {
        let spec: NoteSpec = serde_json::from_str(
            r##"{"keys":["c/4","e/4"],"duration":"4d","modifiers":[
                {"type":"accidental","code":"#","index":1},
                {"type":"dot"},
                {"type":"annotation","text":"pp","vertical":"bottom"}
            ]}"##,
        )
        .unwrap();
        let note = spec.build(Clef::Treble).unwrap();
        let categories: Vec<_> = note.modifiers().iter().map(|m| m.category()).collect();
        assert_eq!(
            categories,
            vec![Category::Accidental, Category::Dot, Category::Annotation]
        );
        assert_eq!(note.modifiers()[0].index(), 1);
    }

    #[test]
    fn unknown_accidental_is_rejected() {
        let spec: NoteSpec =
            serde_json::from_str(r#"{"keys":["c/4"],"modifiers":[{"type":"accidental","code":"x"}]}"#).unwrap();
        assert!(matches!(spec.build(Clef::Treble), Err(FormatError::BadArgument(_))));
    }

    #[test]
    fn tuplet_ranges_are_checked() {
        let note = NoteSpec {
            keys: vec!["g/4".into()],
            ..NoteSpec::default()
        };
        let voice = VoiceSpec {
            mode: VoiceMode::Soft,
            notes: vec![note; 2],
            tuplets: vec![TupletSpec {
                start: 1,
                count: 3,
                num_notes: 3,
                notes_occupied: 2,
            }],
        };
        assert!(matches!(
            voice.build(VoiceTime::default(), Clef::Treble),
            Err(FormatError::BadArgument(_))
        ));
    }

    #[test]
    fn triplets_fill_their_beat() {
        let eighth = NoteSpec {
            keys: vec!["b/4".into()],
            duration: "8".into(),
            ..NoteSpec::default()
        };
        let voice = VoiceSpec {
            mode: VoiceMode::Strict,
            notes: vec![eighth; 3],
            tuplets: vec![TupletSpec {
                start: 0,
                count: 3,
                num_notes: 3,
                notes_occupied: 2,
            }],
        };
        let time = VoiceTime {
            num_beats: 1,
            beat_value: 4,
        };
        assert!(voice.build(time, Clef::Treble).unwrap().is_complete());
    }
}
