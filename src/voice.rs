//! Voices: one musical line of tickables measured against a time signature.

use serde::{Deserialize, Serialize};

use crate::constants::{RESOLUTION, SOFTMAX_FACTOR};
use crate::error::{FormatError, Result};
use crate::fraction::{checked_lcm, Fraction};
use crate::tickable::Tickable;

/// How strictly a voice's contents must match its time signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceMode {
    /// Ticks used must equal the total before formatting.
    #[default]
    Strict,
    /// Any amount of ticks; used for fragments.
    Soft,
    /// Never exceeds the total, but may be incomplete.
    Full,
}

/// Time signature of a voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceTime {
    pub num_beats: i64,
    pub beat_value: i64,
}

impl Default for VoiceTime {
    fn default() -> Self {
        Self {
            num_beats: 4,
            beat_value: 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Voice {
    time: VoiceTime,
    total_ticks: Fraction,
    ticks_used: Fraction,
    resolution_multiplier: i64,
    smallest_tick_count: Fraction,
    mode: VoiceMode,
    softmax_factor: f64,
    exp_ticks_used: Option<f64>,
    tickables: Vec<Tickable>,
}

impl Voice {
    pub fn new(time: VoiceTime) -> Result<Self> {
        if time.num_beats <= 0 || time.beat_value <= 0 {
            return Err(FormatError::BadArgument(format!(
                "invalid time signature {}/{}",
                time.num_beats, time.beat_value
            )));
        }
        let beats = time.num_beats.checked_mul(RESOLUTION).ok_or_else(|| {
            FormatError::BadArgument(format!("{} beats overflow the tick range", time.num_beats))
        })?;
        let total_ticks = Fraction::new(beats, time.beat_value)?;
        Ok(Self {
            time,
            total_ticks,
            ticks_used: Fraction::zero(),
            resolution_multiplier: 1,
            smallest_tick_count: total_ticks,
            mode: VoiceMode::Strict,
            softmax_factor: SOFTMAX_FACTOR,
            exp_ticks_used: None,
            tickables: Vec::new(),
        })
    }

    /// A voice in 4/4.
    pub fn common_time() -> Self {
        let time = VoiceTime::default();
        Self {
            time,
            total_ticks: Fraction::from_integer(RESOLUTION),
            ticks_used: Fraction::zero(),
            resolution_multiplier: 1,
            smallest_tick_count: Fraction::from_integer(RESOLUTION),
            mode: VoiceMode::Strict,
            softmax_factor: SOFTMAX_FACTOR,
            exp_ticks_used: None,
            tickables: Vec::new(),
        }
    }

    pub fn with_mode(mut self, mode: VoiceMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn set_mode(&mut self, mode: VoiceMode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> VoiceMode {
        self.mode
    }

    pub fn time(&self) -> VoiceTime {
        self.time
    }

    pub fn total_ticks(&self) -> Fraction {
        self.total_ticks
    }

    pub fn ticks_used(&self) -> Fraction {
        self.ticks_used
    }

    /// LCM of the reduced tick denominators of every tickable added so far.
    pub fn resolution_multiplier(&self) -> i64 {
        self.resolution_multiplier
    }

    pub fn smallest_tick_count(&self) -> Fraction {
        self.smallest_tick_count
    }

    pub fn tickables(&self) -> &[Tickable] {
        &self.tickables
    }

    pub(crate) fn tickables_mut(&mut self) -> &mut [Tickable] {
        &mut self.tickables
    }

    pub fn len(&self) -> usize {
        self.tickables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickables.is_empty()
    }

    /// Strict and full voices must fill their time signature exactly; soft
    /// voices are always complete.
    pub fn is_complete(&self) -> bool {
        match self.mode {
            VoiceMode::Strict | VoiceMode::Full => self.ticks_used == self.total_ticks,
            VoiceMode::Soft => true,
        }
    }

    pub fn add_tickable(&mut self, tickable: Tickable) -> Result<&mut Self> {
        if !tickable.should_ignore_ticks() {
            let ticks = tickable.ticks();
            let used = self.ticks_used.checked_add(ticks)?;
            if matches!(self.mode, VoiceMode::Strict | VoiceMode::Full) && used > self.total_ticks {
                return Err(FormatError::TooManyTicks {
                    total: self.total_ticks.to_string(),
                    used: self.ticks_used.to_string(),
                    adding: ticks.to_string(),
                });
            }
            let resolution_multiplier = checked_lcm(self.resolution_multiplier, ticks.denominator())?;
            self.ticks_used = used;
            self.resolution_multiplier = resolution_multiplier;
            if ticks < self.smallest_tick_count && !ticks.is_zero() {
                self.smallest_tick_count = ticks;
            }
            self.exp_ticks_used = None;
        }
        self.tickables.push(tickable);
        Ok(self)
    }

    pub fn add_tickables<I: IntoIterator<Item = Tickable>>(&mut self, tickables: I) -> Result<&mut Self> {
        for tickable in tickables {
            self.add_tickable(tickable)?;
        }
        Ok(self)
    }

    pub fn softmax_factor(&self) -> f64 {
        self.softmax_factor
    }

    pub fn set_softmax_factor(&mut self, factor: f64) {
        self.softmax_factor = factor;
        self.exp_ticks_used = None;
    }

    fn exp_ticks_used(&mut self) -> f64 {
        if let Some(exp) = self.exp_ticks_used {
            return exp;
        }
        let used = self.ticks_used.value();
        let factor = self.softmax_factor;
        let exp = self
            .tickables
            .iter()
            .map(|t| factor.powf(t.ticks().value() / used))
            .sum();
        self.exp_ticks_used = Some(exp);
        exp
    }

    /// Share of the voice's width a note of `ticks` should get:
    /// `factor^(ticks / ticksUsed)` normalised over every tickable.
    pub fn softmax(&mut self, ticks: f64) -> f64 {
        let exp = self.exp_ticks_used();
        if exp == 0.0 {
            return 0.0;
        }
        self.softmax_factor.powf(ticks / self.ticks_used.value()) / exp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tickable::Tuplet;

    fn quarter() -> Tickable {
        Tickable::note(&["c/4"], "4").unwrap()
    }

    #[test]
    fn strict_voice_rejects_overflow() {
        let mut voice = Voice::new(VoiceTime { num_beats: 2, beat_value: 4 }).unwrap();
        voice.add_tickables([quarter(), quarter()]).unwrap();
        assert!(voice.is_complete());
        assert!(matches!(
            voice.add_tickable(quarter()),
            Err(FormatError::TooManyTicks { .. })
        ));
    }

    #[test]
    fn soft_voice_accepts_anything() {
        let mut voice = Voice::new(VoiceTime { num_beats: 1, beat_value: 4 })
            .unwrap()
            .with_mode(VoiceMode::Soft);
        voice.add_tickables([quarter(), quarter(), quarter()]).unwrap();
        assert!(voice.is_complete());
        assert_eq!(voice.ticks_used(), Fraction::from_integer(3 * 4096));
    }

    #[test]
    fn full_voice_may_be_incomplete() {
        let mut voice = Voice::common_time().with_mode(VoiceMode::Full);
        voice.add_tickable(quarter()).unwrap();
        assert!(!voice.is_complete());
    }

    #[test]
    fn resolution_multiplier_tracks_tuplet_denominators() {
        let mut voice = Voice::new(VoiceTime { num_beats: 1, beat_value: 4 }).unwrap();
        let mut notes: Vec<Tickable> = (0..3)
            .map(|_| Tickable::note(&["c/4"], "8").unwrap())
            .collect();
        Tuplet::triplet().attach(&mut notes).unwrap();
        voice.add_tickables(notes).unwrap();
        assert_eq!(voice.resolution_multiplier(), 3);
        assert!(voice.is_complete());
        assert_eq!(voice.smallest_tick_count(), Fraction::new(4096, 3).unwrap());
    }

    #[test]
    fn softmax_is_not_linear_in_duration() {
        let mut voice = Voice::new(VoiceTime { num_beats: 2, beat_value: 4 }).unwrap();
        voice
            .add_tickables([
                Tickable::note(&["c/4"], "4d").unwrap(),
                Tickable::note(&["c/4"], "8").unwrap(),
            ])
            .unwrap();
        let long = voice.softmax(6144.0);
        let short = voice.softmax(2048.0);
        assert!((long + short - 1.0).abs() < 1e-9);
        let expected = 10f64.powf(0.75) / 10f64.powf(0.25);
        assert!((long / short - expected).abs() < 1e-9);

        voice.set_softmax_factor(1.0);
        assert!((voice.softmax(6144.0) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn invalid_time_signature_is_rejected() {
        assert!(Voice::new(VoiceTime { num_beats: 0, beat_value: 4 }).is_err());
    }
}
