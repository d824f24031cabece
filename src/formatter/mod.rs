//! The formatter: groups voices into tick contexts, works out how much room
//! each column needs, and justifies the columns across a target width.
//!
//! A formatting pass runs in this order:
//!
//! 1. `join_voices` builds one modifier context per (stave, tick).
//! 2. `create_tick_contexts` groups every tickable by exact tick offset.
//! 3. `pre_format` lays columns out at their natural width and, given a
//!    justify width, iteratively spreads them by a softmax of duration.
//! 4. `evaluate` scores the result; `tune` optionally relaxes it.
//!
//! `format` runs steps 1 to 4 (without tuning) in one call.

mod evaluate;
mod justify;
mod plot;
mod rests;

use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::{FormatError, Result};
use crate::fraction::{checked_lcm, Fraction};
use crate::modifier::ModifierContext;
use crate::tick_context::TickContext;
use crate::tickable::TickableRef;
use crate::voice::{Voice, VoiceMode};

pub use evaluate::{ContextGaps, DurationStats, Gap};

// ═══════════════════════════════════════════════════════════════════════
// Configuration
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatterOptions {
    /// Normalise the softmax over all columns instead of per voice.
    pub global_softmax: bool,
    pub softmax_factor: f64,
    pub max_iterations: usize,
    /// Move every rest on the middle line next to its neighbouring notes,
    /// not only beamed ones.
    pub align_rests: bool,
}

impl Default for FormatterOptions {
    fn default() -> Self {
        Self {
            global_softmax: false,
            softmax_factor: SOFTMAX_FACTOR,
            max_iterations: MAX_ITERATIONS,
            align_rests: false,
        }
    }
}

/// Stave paddings the justification loop works against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Spacing {
    pub stave_padding: f64,
    pub end_padding_min: f64,
    pub end_padding_max: f64,
    pub unaligned_note_padding: f64,
}

impl Default for Spacing {
    fn default() -> Self {
        Self {
            stave_padding: STAVE_PADDING,
            end_padding_min: STAVE_END_PADDING_MIN,
            end_padding_max: STAVE_END_PADDING_MAX,
            unaligned_note_padding: UNALIGNED_NOTE_PADDING,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Formatter
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default)]
pub struct Formatter {
    options: FormatterOptions,
    spacing: Spacing,

    tick_contexts: Vec<TickContext>,
    contexts_created: bool,
    resolution_multiplier: i64,
    modifier_contexts: Vec<ModifierContext>,

    min_total_width: f64,
    has_min_total_width: bool,
    total_ticks: f64,
    justify_width: f64,
    target_width: f64,
    span_limit: f64,
    end_padding: f64,
    iterations: usize,

    total_cost: f64,
    total_shift: f64,
    duration_stats: BTreeMap<String, DurationStats>,
    context_gaps: ContextGaps,
    loss_history: Vec<f64>,
}

impl Formatter {
    pub fn new() -> Self {
        Self::with_options(FormatterOptions::default())
    }

    pub fn with_options(options: FormatterOptions) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    pub fn with_spacing(mut self, spacing: Spacing) -> Self {
        self.spacing = spacing;
        self
    }

    pub fn options(&self) -> &FormatterOptions {
        &self.options
    }

    pub fn spacing(&self) -> &Spacing {
        &self.spacing
    }

    // ── Grouping ──

    /// LCM of every voice's resolution multiplier. All voices must agree
    /// on their total ticks, and strict voices must be complete.
    pub fn resolution_multiplier(voices: &[Voice]) -> Result<i64> {
        let first = voices
            .first()
            .ok_or_else(|| FormatError::BadArgument("no voices to format".into()))?;
        let total_ticks = first.total_ticks();
        let mut multiplier = 1;
        for voice in voices {
            if voice.total_ticks() != total_ticks {
                return Err(FormatError::TickMismatch);
            }
            if voice.mode() == VoiceMode::Strict && !voice.is_complete() {
                return Err(FormatError::IncompleteVoice);
            }
            multiplier = checked_lcm(multiplier, voice.resolution_multiplier())?;
        }
        Ok(multiplier)
    }

    /// Walk each voice on the shared tick grid, calling `visit` with every
    /// tickable and its integer tick offset.
    fn walk_ticks<F>(voices: &[Voice], multiplier: i64, mut visit: F) -> Result<()>
    where
        F: FnMut(TickableRef, i64),
    {
        for (v, voice) in voices.iter().enumerate() {
            let mut cursor = Fraction::zero();
            for (i, tickable) in voice.tickables().iter().enumerate() {
                visit(TickableRef::new(v, i), cursor.scaled_to(multiplier)?);
                cursor = cursor.checked_add(tickable.ticks())?;
            }
        }
        Ok(())
    }

    /// Create one modifier context per (stave, tick) for these voices and
    /// attach their tickables to it. Modifiers of different voices on the
    /// same stave and tick are laid out together.
    pub fn join_voices(&mut self, voices: &mut [Voice]) -> Result<&mut Self> {
        if voices.is_empty() {
            return Ok(self);
        }
        let multiplier = Self::resolution_multiplier(voices)?;
        let mut by_stave_tick: BTreeMap<(usize, i64), usize> = BTreeMap::new();
        let mut assignments = Vec::new();
        let first_new = self.modifier_contexts.len();
        let view: &[Voice] = voices;
        Self::walk_ticks(view, multiplier, |tref, tick| {
            let stave = tref.get(view).stave();
            let next_id = first_new + by_stave_tick.len();
            let id = *by_stave_tick.entry((stave, tick)).or_insert(next_id);
            assignments.push((tref, id));
        })?;

        self.modifier_contexts
            .resize_with(first_new + by_stave_tick.len(), ModifierContext::new);
        for (tref, id) in assignments {
            tref.get_mut(voices).modifier_context = Some(id);
            self.modifier_contexts[id].add_member(tref);
        }
        self.has_min_total_width = false;
        debug!(
            "joined {} voices into {} modifier contexts (resolution x{multiplier})",
            voices.len(),
            by_stave_tick.len()
        );
        Ok(self)
    }

    pub fn modifier_contexts(&self) -> &[ModifierContext] {
        &self.modifier_contexts
    }

    /// Voices whose tickables were never joined by this formatter.
    fn join_unjoined(&mut self, voices: &mut [Voice]) -> Result<()> {
        let count = self.modifier_contexts.len();
        let unjoined: Vec<usize> = voices
            .iter()
            .enumerate()
            .filter(|(_, v)| {
                v.tickables()
                    .iter()
                    .any(|t| t.modifier_context.map_or(true, |id| id >= count))
            })
            .map(|(i, _)| i)
            .collect();
        if unjoined.is_empty() {
            return Ok(());
        }
        if unjoined.len() == voices.len() {
            self.join_voices(voices)?;
            return Ok(());
        }
        for i in unjoined {
            self.join_voices(std::slice::from_mut(&mut voices[i]))?;
        }
        Ok(())
    }

    /// Re-index modifier context members against `voices`. Voices joined
    /// in separate calls were numbered from zero each time.
    fn attach_modifier_contexts(&mut self, voices: &[Voice]) {
        let mut members: Vec<Vec<TickableRef>> = vec![Vec::new(); self.modifier_contexts.len()];
        for (v, voice) in voices.iter().enumerate() {
            for (i, tickable) in voice.tickables().iter().enumerate() {
                if let Some(list) = tickable.modifier_context.and_then(|id| members.get_mut(id)) {
                    list.push(TickableRef::new(v, i));
                }
            }
        }
        for (mc, list) in self.modifier_contexts.iter_mut().zip(members) {
            if mc.members() != list.as_slice() {
                mc.clear_members();
                for member in list {
                    mc.add_member(member);
                }
            }
        }
    }

    /// Group every tickable of every voice into a column per exact tick
    /// offset. Columns come out sorted by offset.
    pub fn create_tick_contexts(&mut self, voices: &mut [Voice]) -> Result<&[TickContext]> {
        self.tick_contexts.clear();
        self.contexts_created = true;
        if voices.is_empty() {
            self.resolution_multiplier = 0;
            return Ok(&self.tick_contexts);
        }
        let multiplier = Self::resolution_multiplier(voices)?;
        let mut by_tick: BTreeMap<i64, Vec<TickableRef>> = BTreeMap::new();
        Self::walk_ticks(voices, multiplier, |tref, tick| {
            by_tick.entry(tick).or_default().push(tref);
        })?;

        for (index, (tick, trefs)) in by_tick.into_iter().enumerate() {
            let mut context = TickContext::new(tick);
            for tref in trefs {
                tref.get_mut(voices).reset_tick_context(index);
                context.add_tickable(tref, voices);
            }
            self.tick_contexts.push(context);
        }
        self.resolution_multiplier = multiplier;
        debug!(
            "created {} tick contexts (resolution x{multiplier})",
            self.tick_contexts.len()
        );
        Ok(&self.tick_contexts)
    }

    pub fn tick_contexts(&self) -> &[TickContext] {
        &self.tick_contexts
    }

    /// The column at `tick` on the shared grid.
    pub fn tick_context(&self, tick: i64) -> Option<&TickContext> {
        self.tick_contexts
            .binary_search_by_key(&tick, |tc| tc.tick_id())
            .ok()
            .map(|i| &self.tick_contexts[i])
    }

    /// Multiplier used to put the last grouping on an integer grid.
    pub fn grid_resolution(&self) -> i64 {
        self.resolution_multiplier
    }

    // ── Widths ──

    /// Sum of the column widths plus a padding estimate from how uneven the
    /// widths and durations are and how many columns some voice skips.
    /// Later calls return the cached bare sum until voices are rejoined.
    pub fn pre_calculate_min_total_width(&mut self, voices: &mut [Voice]) -> Result<f64> {
        if self.has_min_total_width {
            return Ok(self.min_total_width);
        }
        if voices.is_empty() {
            return Err(FormatError::BadArgument(
                "voices are required to pre-calculate the minimum width".into(),
            ));
        }
        self.attach_modifier_contexts(voices);
        self.create_tick_contexts(voices)?;

        let mut unaligned = 0usize;
        let mut widths = Vec::new();
        let mut durations = Vec::new();
        self.min_total_width = 0.0;
        for context in &mut self.tick_contexts {
            context.pre_format(voices, &mut self.modifier_contexts)?;
            if context.tickables().len() < voices.len() {
                unaligned += 1;
            }
            for tref in context.tickables() {
                let tickable = tref.get(voices);
                widths.push(tickable.metrics()?.width);
                durations.push(tickable.ticks().value());
            }
            self.min_total_width += context.width()?;
        }
        self.has_min_total_width = true;

        let padding = self.spacing.unaligned_note_padding;
        let spread = variation(&widths).max(variation(&durations));
        let padmax = spread * self.tick_contexts.len() as f64 * padding;
        let unaligned_pad = padding * unaligned as f64;
        debug!(
            "minimum width {:.1}, padding estimate {:.1}",
            self.min_total_width,
            unaligned_pad.max(padmax)
        );
        Ok(self.min_total_width + unaligned_pad.max(padmax))
    }

    pub fn min_total_width(&self) -> Result<f64> {
        if !self.has_min_total_width {
            return Err(FormatError::NoMinTotalWidth);
        }
        Ok(self.min_total_width)
    }

    // ── Formatting ──

    /// Format `voices` to `justify_width` px (`0` for natural spacing).
    /// Voices not yet joined are joined here.
    pub fn format(&mut self, voices: &mut [Voice], justify_width: f64) -> Result<&mut Self> {
        if voices.is_empty() {
            return Ok(self);
        }
        let factor = self.options.softmax_factor;
        for voice in voices.iter_mut() {
            voice.set_softmax_factor(factor);
        }
        self.join_unjoined(voices)?;
        self.align_rests(voices, self.options.align_rests)?;
        self.attach_modifier_contexts(voices);
        self.create_tick_contexts(voices)?;
        self.pre_format(voices, justify_width)?;
        Ok(self)
    }

    /// Format between a stave's note start and end x, leaving the stave's
    /// own padding, then post-format.
    pub fn format_to_stave(
        &mut self,
        voices: &mut [Voice],
        note_start_x: f64,
        note_end_x: f64,
    ) -> Result<&mut Self> {
        let justify_width =
            note_end_x - note_start_x - (self.spacing.stave_padding + self.spacing.end_padding_max);
        debug!("formatting voices to width {justify_width:.1}");
        self.format(voices, justify_width)?;
        self.post_format(voices);
        Ok(self)
    }

    pub fn post_format(&mut self, voices: &mut [Voice]) -> &mut Self {
        for mc in &mut self.modifier_contexts {
            mc.post_format(voices);
        }
        for context in &mut self.tick_contexts {
            context.post_format();
        }
        self
    }

    // ── Results ──

    pub fn total_cost(&self) -> f64 {
        self.total_cost
    }

    pub fn total_shift(&self) -> f64 {
        self.total_shift
    }

    pub fn loss_history(&self) -> &[f64] {
        &self.loss_history
    }

    pub fn duration_stats(&self) -> &BTreeMap<String, DurationStats> {
        &self.duration_stats
    }

    pub fn context_gaps(&self) -> &ContextGaps {
        &self.context_gaps
    }

    /// Width the last `pre_format` justified to.
    pub fn justify_width(&self) -> f64 {
        self.justify_width
    }

    /// Distance budget the justification loop settled on.
    pub fn target_width(&self) -> f64 {
        self.target_width
    }

    /// Widest first-to-last column span the justification loop accepts.
    pub fn span_limit(&self) -> f64 {
        self.span_limit
    }

    /// Padding the last column wanted when justification stopped. A span
    /// within this distance of `span_limit` fills the width.
    pub fn end_padding(&self) -> f64 {
        self.end_padding
    }

    /// Justification iterations spent by the last `pre_format`.
    pub fn iterations(&self) -> usize {
        self.iterations
    }
}

/// Coefficient of variation: standard deviation over mean.
fn variation(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let sum: f64 = values.iter().sum();
    let mean = if sum > 0.0 { sum / n } else { 1.0 / n };
    let var: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (var / n).sqrt() / mean
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tickable::{Tickable, Tuplet};
    use crate::voice::VoiceTime;
    use pretty_assertions::assert_eq;

    fn quarters(keys: &[&str]) -> Voice {
        let mut voice = Voice::common_time();
        for key in keys {
            voice.add_tickable(Tickable::note(&[key], "4").unwrap()).unwrap();
        }
        voice
    }

    #[test]
    fn resolution_multiplier_needs_voices() {
        assert!(matches!(
            Formatter::resolution_multiplier(&[]),
            Err(FormatError::BadArgument(_))
        ));
    }

    #[test]
    fn mismatched_and_incomplete_voices_fail() {
        let four = quarters(&["c/4", "d/4", "e/4", "f/4"]);
        let mut three_four = Voice::new(VoiceTime { num_beats: 3, beat_value: 4 }).unwrap();
        three_four
            .add_tickables((0..3).map(|_| Tickable::note(&["c/4"], "4").unwrap()))
            .unwrap();
        assert!(matches!(
            Formatter::resolution_multiplier(&[four.clone(), three_four]),
            Err(FormatError::TickMismatch)
        ));

        let short = quarters(&["c/4"]);
        assert!(matches!(
            Formatter::resolution_multiplier(&[four, short]),
            Err(FormatError::IncompleteVoice)
        ));
    }

    #[test]
    fn triplets_share_columns_only_on_exact_offsets() {
        let straight = quarters(&["c/4", "d/4", "e/4", "f/4"]);
        let mut triplets = Voice::common_time();
        let mut notes: Vec<Tickable> = (0..6).map(|_| Tickable::note(&["g/4"], "4").unwrap()).collect();
        // two groups of three quarter-note triplets fill two half notes
        for chunk in notes.chunks_mut(3) {
            Tuplet::triplet().attach(chunk).unwrap();
        }
        triplets.add_tickables(notes).unwrap();

        let mut voices = vec![straight, triplets];
        let mut formatter = Formatter::new();
        let ticks: Vec<i64> = formatter
            .create_tick_contexts(&mut voices)
            .unwrap()
            .iter()
            .map(|tc| tc.tick_id())
            .collect();
        assert_eq!(formatter.grid_resolution(), 3);
        // quarters at 0, 1, 2, 3 beats; triplets at 0, 2/3, 4/3, 2, 8/3, 10/3
        assert_eq!(ticks, vec![0, 8192, 12288, 16384, 24576, 32768, 36864, 40960]);
        let shared = formatter.tick_context(24576).unwrap();
        assert_eq!(shared.tickables().len(), 2);
    }

    #[test]
    fn modifier_contexts_are_per_stave_and_tick() {
        let mut upper = Voice::common_time();
        upper
            .add_tickables((0..4).map(|_| Tickable::note(&["c/5"], "4").unwrap()))
            .unwrap();
        let mut lower = Voice::common_time();
        lower
            .add_tickables((0..4).map(|_| Tickable::note(&["c/3"], "4").unwrap().with_stave(1)))
            .unwrap();
        let mut voices = vec![upper, lower];
        let mut formatter = Formatter::new();
        formatter.join_voices(&mut voices).unwrap();
        assert_eq!(formatter.modifier_contexts().len(), 8);
        assert!(formatter
            .modifier_contexts()
            .iter()
            .all(|mc| mc.members().len() == 1));
    }

    #[test]
    fn min_total_width_is_an_error_before_any_pass() {
        let formatter = Formatter::new();
        assert!(matches!(
            formatter.min_total_width(),
            Err(FormatError::NoMinTotalWidth)
        ));
    }

    #[test]
    fn formatting_no_voices_is_a_no_op() {
        let mut formatter = Formatter::new();
        formatter.format(&mut [], 300.0).unwrap();
        assert!(formatter.tick_contexts().is_empty());
        assert_eq!(formatter.total_cost(), 0.0);
    }

    #[test]
    fn options_fill_in_defaults_from_json() {
        let options: FormatterOptions = serde_json::from_str(r#"{"global_softmax": true}"#).unwrap();
        assert_eq!(
            options,
            FormatterOptions {
                global_softmax: true,
                ..Default::default()
            }
        );
        let spacing: Spacing = serde_json::from_str("{}").unwrap();
        assert_eq!(spacing, Spacing::default());
    }

    #[test]
    fn coefficient_of_variation() {
        assert_eq!(variation(&[5.0, 5.0, 5.0]), 0.0);
        assert_eq!(variation(&[]), 0.0);
        assert!((variation(&[1.0, 3.0]) - 0.5).abs() < 1e-12);
    }
}
