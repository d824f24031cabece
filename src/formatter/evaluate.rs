//! Layout cost and local tuning.

use std::collections::BTreeMap;

use log::{debug, trace};
use serde::Serialize;

use super::Formatter;
use crate::constants::TUNE_ALPHA;
use crate::error::Result;
use crate::voice::Voice;

/// Empty space between two adjacent columns, in formatter coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Gap {
    pub x1: f64,
    pub x2: f64,
}

impl Gap {
    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ContextGaps {
    pub total: f64,
    pub gaps: Vec<Gap>,
}

/// Spacing statistics for one duration class.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct DurationStats {
    pub mean: f64,
    pub count: usize,
    pub total: f64,
}

impl DurationStats {
    fn add(&mut self, space: f64) {
        self.count += 1;
        self.total += space;
        self.mean = self.total / self.count as f64;
    }
}

impl Formatter {
    /// Score the current layout: the root of the summed squared deviations
    /// of every tickable's spacing from the mean spacing of its duration.
    /// Also records the gaps between columns and each column's freedom.
    pub fn evaluate(&mut self, voices: &mut [Voice]) -> Result<f64> {
        let justify_width = self.justify_width;

        self.context_gaps = ContextGaps::default();
        for index in 1..self.tick_contexts.len() {
            let (before, after) = self.tick_contexts.split_at_mut(index);
            let (Some(prev), Some(context)) = (before.last_mut(), after.first_mut()) else {
                continue;
            };
            let prev_metrics = prev.metrics()?;
            let metrics = context.metrics()?;
            let inside_right = prev.x()? + prev_metrics.note_px + prev_metrics.total_right_px;
            let inside_left = context.x()? - metrics.total_left_px;
            let gap = inside_left - inside_right;
            self.context_gaps.total += gap;
            self.context_gaps.gaps.push(Gap {
                x1: inside_right,
                x2: inside_left,
            });
            context.freedom_mut().left = gap;
            prev.freedom_mut().right = gap;
        }

        let mut stats: BTreeMap<String, DurationStats> = BTreeMap::new();
        for voice in voices.iter_mut() {
            let notes = voice.tickables_mut();
            for i in 0..notes.len() {
                let note = &notes[i];
                let metrics = note.metrics()?;
                let x = note.x()?;
                let left_edge = x + metrics.note_px + metrics.mod_right_px + metrics.right_displaced_head_px;
                let (space, used) = match notes.get(i + 1) {
                    Some(right) => {
                        let rm = right.metrics()?;
                        let right_edge = right.x()? - rm.mod_left_px - rm.left_displaced_head_px;
                        (right_edge - left_edge, right.x()? - x)
                    }
                    None => (justify_width - left_edge, justify_width - x),
                };
                let duration = note.ticks().to_string();
                if let Some(right) = notes.get_mut(i + 1) {
                    right.formatter_metrics_mut().freedom.left = space;
                }
                let fm = notes[i].formatter_metrics_mut();
                fm.space.used = used;
                fm.freedom.right = space;
                stats.entry(duration).or_default().add(used);
            }
        }

        let mut total_deviation = 0.0;
        for voice in voices.iter_mut() {
            for note in voice.tickables_mut() {
                let duration = note.ticks().to_string();
                let mean = stats.get(&duration).map_or(0.0, |s| s.mean);
                let fm = note.formatter_metrics_mut();
                fm.space.mean = mean;
                fm.duration = duration;
                fm.iterations += 1;
                fm.space.deviation = fm.space.used - mean;
                total_deviation += fm.space.deviation.powi(2);
            }
        }

        self.duration_stats = stats;
        self.total_cost = total_deviation.sqrt();
        self.loss_history.push(self.total_cost);
        debug!(
            "layout cost {:.3}, total gap {:.1}",
            self.total_cost, self.context_gaps.total
        );
        Ok(self.total_cost)
    }

    /// Nudge each column by a damped share of its deviation cost, within
    /// the freedom the last evaluation found, then re-evaluate. `alpha`
    /// defaults to 0.5.
    pub fn tune(&mut self, voices: &mut [Voice], alpha: Option<f64>) -> Result<f64> {
        if self.tick_contexts.is_empty() {
            return Ok(0.0);
        }
        let alpha = alpha.unwrap_or(TUNE_ALPHA);
        let mut shift = 0.0;
        self.total_shift = 0.0;

        for index in 0..self.tick_contexts.len() {
            let (before, rest) = self.tick_contexts.split_at_mut(index);
            let Some((context, after)) = rest.split_first_mut() else {
                break;
            };
            let mut next = after.first_mut();
            context.move_by(shift, before.last_mut(), next.as_deref_mut(), voices)?;

            let cost = -context.deviation_cost(voices);
            if cost > 0.0 {
                shift = -context.freedom().right.min(cost.abs());
            } else if cost < 0.0 {
                shift = match next {
                    Some(next) => next.freedom().right.min(cost.abs()),
                    None => 0.0,
                };
            }
            shift *= alpha;
            self.total_shift += shift;
            trace!("tune column {}: shift {:.2}", context.tick_id(), shift);
        }

        self.evaluate(voices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tickable::Tickable;
    use crate::voice::VoiceMode;

    fn formatted(durations: &[&str], width: f64) -> (Formatter, Vec<Voice>) {
        let mut voice = Voice::common_time().with_mode(VoiceMode::Soft);
        for d in durations {
            voice.add_tickable(Tickable::note(&["a/4"], d).unwrap()).unwrap();
        }
        let mut voices = vec![voice];
        let mut formatter = Formatter::new();
        formatter.format(&mut voices, width).unwrap();
        (formatter, voices)
    }

    #[test]
    fn equal_durations_cost_little() {
        let (formatter, voices) = formatted(&["4", "4", "4", "4"], 300.0);
        let stats = formatter.duration_stats();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats["4096/1"].count, 4);
        let m = voices[0].tickables()[0].formatter_metrics();
        assert_eq!(m.duration, "4096/1");
        assert_eq!(m.iterations, 1);
    }

    #[test]
    fn gaps_between_columns_are_recorded() {
        let (formatter, _) = formatted(&["4", "8", "8", "2"], 300.0);
        let gaps = formatter.context_gaps();
        assert_eq!(gaps.gaps.len(), 3);
        let total: f64 = gaps.gaps.iter().map(Gap::width).sum();
        assert!((total - gaps.total).abs() < 1e-9);
        assert!(gaps.gaps.iter().all(|g| g.width() > -1e-9));
    }

    #[test]
    fn evaluate_is_idempotent() {
        let (mut formatter, mut voices) = formatted(&["4", "8", "8", "2"], 300.0);
        let first = formatter.evaluate(&mut voices).unwrap();
        let second = formatter.evaluate(&mut voices).unwrap();
        assert_eq!(first, second);
        assert_eq!(formatter.loss_history().len(), 3);
    }

    #[test]
    fn tune_keeps_columns_apart() {
        let (mut formatter, mut voices) = formatted(&["8", "8", "4", "2"], 300.0);
        formatter.tune(&mut voices, None).unwrap();
        assert!(formatter.context_gaps().gaps.iter().all(|g| g.width() > -1e-9));
        assert_eq!(formatter.loss_history().len(), 2);
    }

    #[test]
    fn tune_without_columns_is_free() {
        let mut formatter = Formatter::new();
        assert_eq!(formatter.tune(&mut [], Some(0.25)).unwrap(), 0.0);
    }
}
