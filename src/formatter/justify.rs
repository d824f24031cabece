//! Natural layout and the justification loop.

use log::{debug, trace, warn};

use super::Formatter;
use crate::constants::{JUSTIFY_TOLERANCE, MIN_SPACING_FRACTION};
use crate::error::{FormatError, Result};
use crate::tickable::TickableRef;
use crate::voice::Voice;

/// Where a column would like to sit relative to the nearest earlier column
/// it shares a voice with.
#[derive(Debug, Clone, Copy, Default)]
struct IdealDistance {
    expected: f64,
    /// How far the column may be pulled left before notes collide.
    max_negative_shift: f64,
    /// The longest tickable of the earlier column; distances are measured
    /// from its x.
    from: Option<TickableRef>,
}

/// A span fills the width when it ends no later than `limit` and no more
/// than `padding` before it.
fn within_padding_band(span: f64, padding: f64, limit: f64) -> bool {
    span <= limit + JUSTIFY_TOLERANCE && span + padding >= limit - JUSTIFY_TOLERANCE
}

impl Formatter {
    /// Lay the tick contexts out at their natural widths and, when
    /// `justify_width` is positive, spread them across it. Returns the
    /// layout's cost.
    pub fn pre_format(&mut self, voices: &mut [Voice], justify_width: f64) -> Result<f64> {
        if !self.contexts_created {
            return Err(FormatError::NoTickContexts);
        }
        self.loss_history.clear();
        self.iterations = 0;
        self.justify_width = 0.0;
        self.target_width = 0.0;
        self.span_limit = 0.0;
        self.end_padding = 0.0;

        let mut x = 0.0;
        let mut shift = 0.0;
        let mut total_ticks = 0.0;
        for context in &mut self.tick_contexts {
            context.pre_format(voices, &mut self.modifier_contexts)?;
            let metrics = context.metrics()?;
            total_ticks += context.max_ticks().value();
            x += shift + metrics.total_left_px;
            context.set_x(x, voices);
            shift = metrics.width - metrics.total_left_px;
        }
        self.total_ticks = total_ticks;
        self.min_total_width = x + shift;
        self.has_min_total_width = true;
        debug!(
            "natural layout: {} columns, {:.1}px",
            self.tick_contexts.len(),
            self.min_total_width
        );

        if justify_width <= 0.0 {
            return self.evaluate(voices);
        }
        let (Some(first), Some(last)) = (self.tick_contexts.first(), self.tick_contexts.last()) else {
            return Ok(0.0);
        };
        let first_metrics = first.metrics()?;
        let last_metrics = last.metrics()?;
        let adjusted_width =
            justify_width - last_metrics.note_px - last_metrics.total_right_px - first_metrics.total_left_px;

        let mut target_width = adjusted_width;
        let distances = self.ideal_distances(voices, target_width)?;
        let mut actual_width = self.shift_to_ideal(voices, &distances, adjusted_width)?;
        if self.tick_contexts.len() == 1 {
            return Ok(0.0);
        }

        let min_distance = distances
            .iter()
            .skip(1)
            .map(|d| d.expected / 2.0)
            .fold(target_width / 2.0, f64::min);
        let spacing = self.spacing;
        let band = spacing.end_padding_max - spacing.end_padding_min;

        let mut padding_max = self.padding_max(voices, target_width, min_distance)?;
        let padding_min = padding_max - band;
        let max_x = adjusted_width - padding_min;

        let mut remaining = self.options.max_iterations;
        while (actual_width > max_x && remaining > 0) || (actual_width + padding_max < max_x && remaining > 1) {
            target_width -= actual_width - max_x;
            padding_max = self.padding_max(voices, target_width, min_distance)?;
            let distances = self.ideal_distances(voices, target_width)?;
            actual_width = self.shift_to_ideal(voices, &distances, adjusted_width)?;
            remaining -= 1;
            debug!(
                "justify iteration {}: target {:.1}, actual {:.1}, limit {:.1}",
                self.options.max_iterations - remaining,
                target_width,
                actual_width,
                max_x
            );
        }
        self.iterations = self.options.max_iterations - remaining;
        if !within_padding_band(actual_width, padding_max, max_x) {
            warn!(
                "justification stopped after {} iterations: {:.1}px against a limit of {:.1}px",
                self.iterations, actual_width, max_x
            );
        }

        self.justify_width = justify_width;
        self.target_width = target_width;
        self.span_limit = max_x;
        self.end_padding = padding_max;
        self.evaluate(voices)
    }

    /// Softmax distance from each column back to the closest earlier column
    /// sharing a voice, and how far it can be pulled in without collision.
    fn ideal_distances(&self, voices: &mut [Voice], target_width: f64) -> Result<Vec<IdealDistance>> {
        let contexts = &self.tick_contexts;
        let global = self.options.global_softmax;
        let factor = self.options.softmax_factor;
        let exp_total: f64 = contexts
            .iter()
            .map(|c| factor.powf(c.max_ticks().value() / self.total_ticks))
            .sum();

        let mut distances = Vec::with_capacity(contexts.len());
        for (i, context) in contexts.iter().enumerate() {
            if i == 0 {
                distances.push(IdealDistance::default());
                continue;
            }
            let prev_x = contexts[i - 1].x()?;
            let mut found = IdealDistance::default();
            for back in contexts[..i].iter().rev() {
                let shared: Vec<(TickableRef, TickableRef)> = context
                    .tickables_by_voice()
                    .iter()
                    .filter_map(|(v, &this)| back.tickable_for_voice(*v).map(|b| (this, b)))
                    .collect();
                if shared.is_empty() {
                    continue;
                }

                let mut max_ticks = 0.0;
                let mut max_negative = f64::INFINITY;
                for (this, back_ref) in shared {
                    let back_tickable = back_ref.get(voices);
                    let ticks = back_tickable.ticks().value();
                    if ticks > max_ticks {
                        found.from = Some(back_ref);
                        max_ticks = ticks;
                    }
                    let this_tickable = this.get(voices);
                    let m = this_tickable.metrics()?;
                    let inside_left = this_tickable.x()? - (m.mod_left_px + m.left_displaced_head_px);
                    let bm = back_tickable.metrics()?;
                    let inside_right = back_tickable.x()? + bm.note_px + bm.mod_right_px + bm.right_displaced_head_px;
                    max_negative = max_negative.min(inside_left - inside_right);
                }
                found.max_negative_shift =
                    max_negative.min(context.x()? - (prev_x + target_width * MIN_SPACING_FRACTION));

                if global {
                    found.expected = factor.powf(max_ticks / self.total_ticks) / exp_total * target_width;
                } else if let Some(from) = found.from {
                    found.expected = voices[from.voice].softmax(max_ticks) * target_width;
                }
                break;
            }
            distances.push(found);
        }
        Ok(distances)
    }

    /// Move each column toward its ideal distance, pulling left no further
    /// than its collision limit. Returns the span from first to last column.
    fn shift_to_ideal(
        &mut self,
        voices: &mut [Voice],
        distances: &[IdealDistance],
        adjusted_width: f64,
    ) -> Result<f64> {
        let center_x = adjusted_width / 2.0;
        let mut space_accum = 0.0;
        for (index, context) in self.tick_contexts.iter_mut().enumerate() {
            let context_x = context.x()?;
            if index > 0 {
                let ideal = distances.get(index).copied().unwrap_or_default();
                if let Some(from) = ideal.from {
                    let error = from.get(voices).x()? + ideal.expected - (context_x + space_accum);
                    if error > 0.0 {
                        space_accum += error;
                    } else if error < 0.0 {
                        space_accum -= ideal.max_negative_shift.min(error.abs());
                    }
                }
                context.set_x(context_x + space_accum, voices);
                trace!(
                    "column {} at {:.1} (accumulated shift {:.1})",
                    context.tick_id(),
                    context_x + space_accum,
                    space_accum
                );
            }
            let x = context.x()?;
            for tref in context.center_aligned_tickables(voices) {
                tref.get_mut(voices).set_center_x_shift(center_x - x);
            }
        }
        match (self.tick_contexts.first(), self.tick_contexts.last()) {
            (Some(first), Some(last)) => Ok(last.x()? - first.x()?),
            _ => Ok(0.0),
        }
    }

    /// Padding the last column wants after it: its softmax share of the
    /// target width, less its own width and the stave padding.
    fn padding_max(&self, voices: &mut [Voice], target_width: f64, min_distance: f64) -> Result<f64> {
        let configured = self.spacing.end_padding_max;
        let mut last_padding = 0.0;
        let last = self.tick_contexts.last();
        if let Some(tref) = last.and_then(|c| c.max_tickable()) {
            let voice = &voices[tref.voice];
            if voice.ticks_used() > voice.total_ticks() {
                return Ok(if configured * 2.0 < min_distance {
                    min_distance
                } else {
                    configured
                });
            }
            let tick_width = tref.get(voices).width()?;
            let ticks = last.map(|c| c.max_ticks().value()).unwrap_or(0.0);
            last_padding = voices[tref.voice].softmax(ticks) * target_width - (tick_width + self.spacing.stave_padding);
        }
        Ok(if configured * 2.0 < last_padding {
            last_padding
        } else {
            configured
        })
    }
}
