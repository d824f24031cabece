//! Tick contexts: one column of simultaneous tickables across every voice
//! being formatted together.

use std::collections::BTreeMap;

use log::trace;
use serde::Serialize;

use crate::error::{FormatError, Result};
use crate::fraction::Fraction;
use crate::modifier::ModifierContext;
use crate::tickable::{Freedom, TickableRef};
use crate::voice::Voice;

/// Horizontal metrics of a pre-formatted column. Every field is the maximum
/// over the column's tickables.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct TickContextMetrics {
    pub width: f64,
    pub glyph_px: f64,
    pub note_px: f64,
    pub left_displaced_head_px: f64,
    pub right_displaced_head_px: f64,
    pub mod_left_px: f64,
    pub mod_right_px: f64,
    /// Space left of the note region: modifiers plus displaced heads.
    pub total_left_px: f64,
    pub total_right_px: f64,
}

#[derive(Debug, Clone)]
pub struct TickContext {
    tick_id: i64,
    tickables: Vec<TickableRef>,
    by_voice: BTreeMap<usize, TickableRef>,
    max_ticks: Fraction,
    max_tickable: Option<TickableRef>,
    min_ticks: Option<Fraction>,
    min_tickable: Option<TickableRef>,
    metrics: TickContextMetrics,
    x: Option<f64>,
    freedom: Freedom,
    preformatted: bool,
    post_formatted: bool,
}

impl TickContext {
    pub fn new(tick_id: i64) -> Self {
        Self {
            tick_id,
            tickables: Vec::new(),
            by_voice: BTreeMap::new(),
            max_ticks: Fraction::zero(),
            max_tickable: None,
            min_ticks: None,
            min_tickable: None,
            metrics: TickContextMetrics::default(),
            x: None,
            freedom: Freedom::default(),
            preformatted: false,
            post_formatted: false,
        }
    }

    /// Offset of this column on the shared integer tick grid.
    pub fn tick_id(&self) -> i64 {
        self.tick_id
    }

    pub fn tickables(&self) -> &[TickableRef] {
        &self.tickables
    }

    /// The tickable each voice contributes to this column.
    pub fn tickables_by_voice(&self) -> &BTreeMap<usize, TickableRef> {
        &self.by_voice
    }

    pub fn tickable_for_voice(&self, voice: usize) -> Option<TickableRef> {
        self.by_voice.get(&voice).copied()
    }

    pub fn add_tickable(&mut self, tickable: TickableRef, voices: &[Voice]) {
        let t = tickable.get(voices);
        if !t.should_ignore_ticks() {
            let ticks = t.ticks();
            if ticks > self.max_ticks {
                self.max_ticks = ticks;
                self.max_tickable = Some(tickable);
            }
            match self.min_ticks {
                Some(min) if ticks >= min => {}
                _ => {
                    self.min_ticks = Some(ticks);
                    self.min_tickable = Some(tickable);
                }
            }
        }
        self.tickables.push(tickable);
        self.by_voice.insert(tickable.voice, tickable);
        self.preformatted = false;
    }

    pub fn max_ticks(&self) -> Fraction {
        self.max_ticks
    }

    pub fn max_tickable(&self) -> Option<TickableRef> {
        self.max_tickable
    }

    pub fn min_ticks(&self) -> Option<Fraction> {
        self.min_ticks
    }

    pub fn min_tickable(&self) -> Option<TickableRef> {
        self.min_tickable
    }

    /// Format the modifier context behind each tickable, pre-format the
    /// tickables, and take the widest requirement on each side.
    pub fn pre_format(&mut self, voices: &mut [Voice], modifier_contexts: &mut [ModifierContext]) -> Result<()> {
        if self.preformatted {
            return Ok(());
        }
        let mut m = TickContextMetrics::default();
        for &tref in &self.tickables {
            let extent = match tref.get(voices).modifier_context {
                Some(id) => match modifier_contexts.get_mut(id) {
                    Some(mc) => {
                        mc.pre_format(voices)?;
                        Some(mc.extent()?)
                    }
                    None => None,
                },
                None => None,
            };
            let tickable = tref.get_mut(voices);
            tickable.pre_format(extent);
            let metrics = tickable.metrics()?;

            m.left_displaced_head_px = m.left_displaced_head_px.max(metrics.left_displaced_head_px);
            m.right_displaced_head_px = m.right_displaced_head_px.max(metrics.right_displaced_head_px);
            m.note_px = m.note_px.max(metrics.note_px);
            m.glyph_px = m.glyph_px.max(metrics.glyph_px);
            m.mod_left_px = m.mod_left_px.max(metrics.mod_left_px);
            m.mod_right_px = m.mod_right_px.max(metrics.mod_right_px);
            m.total_left_px = m.total_left_px.max(metrics.mod_left_px + metrics.left_displaced_head_px);
            m.total_right_px = m.total_right_px.max(metrics.mod_right_px + metrics.right_displaced_head_px);
        }
        m.width = m.note_px + m.total_left_px + m.total_right_px;
        self.metrics = m;
        self.preformatted = true;
        trace!(
            "tick context {}: {} tickables, width {:.1} (left {:.1}, right {:.1})",
            self.tick_id,
            self.tickables.len(),
            m.width,
            m.total_left_px,
            m.total_right_px
        );
        Ok(())
    }

    pub fn is_preformatted(&self) -> bool {
        self.preformatted
    }

    pub fn width(&self) -> Result<f64> {
        self.checked_metrics().map(|m| m.width)
    }

    pub fn metrics(&self) -> Result<TickContextMetrics> {
        self.checked_metrics()
    }

    fn checked_metrics(&self) -> Result<TickContextMetrics> {
        if !self.preformatted {
            return Err(FormatError::UnformattedMember);
        }
        Ok(self.metrics)
    }

    pub fn x(&self) -> Result<f64> {
        self.x.ok_or(FormatError::NoXPosition)
    }

    pub fn set_x(&mut self, x: f64, voices: &mut [Voice]) {
        self.x = Some(x);
        for tref in &self.tickables {
            tref.get_mut(voices).set_context_x(x);
        }
    }

    pub fn freedom(&self) -> Freedom {
        self.freedom
    }

    pub(crate) fn freedom_mut(&mut self) -> &mut Freedom {
        &mut self.freedom
    }

    /// Shift the column by `shift` px, handing the freedom it gains or loses
    /// to its neighbours.
    pub fn move_by(
        &mut self,
        shift: f64,
        prev: Option<&mut TickContext>,
        next: Option<&mut TickContext>,
        voices: &mut [Voice],
    ) -> Result<()> {
        let x = self.x()?;
        self.set_x(x + shift, voices);
        self.freedom.left += shift;
        self.freedom.right -= shift;
        if let Some(prev) = prev {
            prev.freedom.right += shift;
        }
        if let Some(next) = next {
            next.freedom.left -= shift;
        }
        Ok(())
    }

    /// Sum of the spacing deviations of this column's tickables, as left
    /// by the last evaluation.
    pub fn deviation_cost(&self, voices: &[Voice]) -> f64 {
        self.tickables
            .iter()
            .map(|t| t.get(voices).formatter_metrics().space.deviation)
            .sum()
    }

    pub fn average_deviation_cost(&self, voices: &[Voice]) -> f64 {
        if self.tickables.is_empty() {
            return 0.0;
        }
        self.deviation_cost(voices) / self.tickables.len() as f64
    }

    pub fn center_aligned_tickables(&self, voices: &[Voice]) -> Vec<TickableRef> {
        self.tickables
            .iter()
            .copied()
            .filter(|t| t.get(voices).is_center_aligned())
            .collect()
    }

    pub fn post_format(&mut self) {
        self.post_formatted = true;
    }

    pub fn is_post_formatted(&self) -> bool {
        self.post_formatted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::NOTEHEAD_BLACK_WIDTH;
    use crate::modifier::{AccidentalType, Modifier};
    use crate::tickable::Tickable;
    use crate::voice::VoiceMode;

    fn soft_voice(notes: Vec<Tickable>) -> Voice {
        let mut voice = Voice::common_time().with_mode(VoiceMode::Soft);
        voice.add_tickables(notes).unwrap();
        voice
    }

    #[test]
    fn tracks_longest_and_shortest_tickables() {
        let voices = vec![
            soft_voice(vec![Tickable::note(&["c/4"], "8").unwrap()]),
            soft_voice(vec![Tickable::note(&["e/4"], "2").unwrap()]),
            soft_voice(vec![Tickable::bar(8.0)]),
        ];
        let mut tc = TickContext::new(0);
        for v in 0..3 {
            tc.add_tickable(TickableRef::new(v, 0), &voices);
        }
        assert_eq!(tc.max_ticks(), Fraction::from_integer(8192));
        assert_eq!(tc.max_tickable(), Some(TickableRef::new(1, 0)));
        assert_eq!(tc.min_ticks(), Some(Fraction::from_integer(2048)));
        assert_eq!(tc.tickable_for_voice(2), Some(TickableRef::new(2, 0)));
    }

    #[test]
    fn metrics_are_an_error_until_preformatted() {
        let tc = TickContext::new(0);
        assert!(matches!(tc.width(), Err(FormatError::UnformattedMember)));
        assert!(matches!(tc.x(), Err(FormatError::NoXPosition)));
    }

    #[test]
    fn column_takes_the_widest_side_of_each_voice() {
        let sharp = Tickable::note(&["c/4"], "4")
            .unwrap()
            .with_modifier(Modifier::accidental(AccidentalType::Sharp), 0)
            .unwrap();
        let mut voices = vec![
            soft_voice(vec![sharp]),
            soft_voice(vec![Tickable::note(&["g/5"], "4").unwrap()]),
        ];
        voices[0].tickables_mut()[0].modifier_context = Some(0);
        let mut mcs = vec![ModifierContext::new()];
        mcs[0].add_member(TickableRef::new(0, 0));

        let mut tc = TickContext::new(0);
        tc.add_tickable(TickableRef::new(0, 0), &voices);
        tc.add_tickable(TickableRef::new(1, 0), &voices);
        tc.pre_format(&mut voices, &mut mcs).unwrap();

        let m = tc.metrics().unwrap();
        let left = mcs[0].extent().unwrap().left;
        assert!(left > 0.0);
        assert_eq!(m.total_left_px, left);
        // with modifier space the notehead needs no padding of its own
        assert_eq!(m.note_px, NOTEHEAD_BLACK_WIDTH);
        assert_eq!(m.width, m.note_px + left);
    }

    #[test]
    fn moving_hands_freedom_to_neighbours() {
        let mut voices = vec![soft_voice(vec![
            Tickable::note(&["c/4"], "4").unwrap(),
            Tickable::note(&["d/4"], "4").unwrap(),
            Tickable::note(&["e/4"], "4").unwrap(),
        ])];
        let mut contexts: Vec<TickContext> = (0..3)
            .map(|i| {
                let mut tc = TickContext::new(i as i64 * 4096);
                tc.add_tickable(TickableRef::new(0, i), &voices);
                tc
            })
            .collect();
        contexts[1].set_x(20.0, &mut voices);

        let (before, rest) = contexts.split_at_mut(1);
        let (current, after) = rest.split_at_mut(1);
        current[0]
            .move_by(3.0, before.last_mut(), after.first_mut(), &mut voices)
            .unwrap();

        assert_eq!(contexts[1].x().unwrap(), 23.0);
        assert_eq!(voices[0].tickables()[1].x().unwrap(), 23.0);
        assert_eq!(contexts[1].freedom(), Freedom { left: 3.0, right: -3.0 });
        assert_eq!(contexts[0].freedom().right, 3.0);
        assert_eq!(contexts[2].freedom().left, -3.0);
    }
}
