//! Modifier contexts: every note on one stave at one tick, and the room
//! their modifiers need.

use log::trace;
use serde::Serialize;

use super::{groups, marks, notes, tab, text, Category, ModRef, FORMAT_ORDER};
use crate::error::{FormatError, Result};
use crate::tickable::{ModifierExtent, TickableRef};
use crate::voice::Voice;

/// Accumulator threaded through every category's format step.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ModifierState {
    pub left_shift: f64,
    pub right_shift: f64,
    pub text_line: f64,
    pub top_text_line: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ModifierContext {
    members: Vec<TickableRef>,
    state: ModifierState,
    formatted: bool,
    post_formatted: bool,
}

impl ModifierContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tickable (and so all of its modifiers).
    pub fn add_member(&mut self, member: TickableRef) {
        if !self.members.contains(&member) {
            self.members.push(member);
            self.formatted = false;
        }
    }

    pub fn members(&self) -> &[TickableRef] {
        &self.members
    }

    pub(crate) fn clear_members(&mut self) {
        self.members.clear();
        self.formatted = false;
    }

    pub fn state(&self) -> ModifierState {
        self.state
    }

    pub fn is_formatted(&self) -> bool {
        self.formatted
    }

    /// `left_shift + right_shift`, once formatted.
    pub fn width(&self) -> Result<f64> {
        if !self.formatted {
            return Err(FormatError::UnformattedMember);
        }
        Ok(self.state.left_shift + self.state.right_shift)
    }

    pub fn extent(&self) -> Result<ModifierExtent> {
        if !self.formatted {
            return Err(FormatError::UnformattedMember);
        }
        Ok(ModifierExtent {
            left: self.state.left_shift,
            right: self.state.right_shift,
        })
    }

    /// Modifiers of one category across all members, in registration order.
    pub(crate) fn collect(&self, category: Category, voices: &[Voice]) -> Vec<ModRef> {
        let mut found = Vec::new();
        for &member in &self.members {
            let note = member.get(voices);
            for (i, modifier) in note.modifiers().iter().enumerate() {
                if modifier.category() == category {
                    found.push(ModRef {
                        note: member,
                        modifier: i,
                    });
                }
            }
        }
        found
    }

    /// Resolve every category in [`FORMAT_ORDER`]. Runs once; later calls
    /// are no-ops until a member is added.
    pub fn pre_format(&mut self, voices: &mut [Voice]) -> Result<()> {
        if self.formatted {
            return Ok(());
        }
        let mut state = ModifierState::default();
        for category in FORMAT_ORDER {
            self.format_category(category, voices, &mut state)?;
        }
        self.state = state;
        self.formatted = true;
        trace!(
            "modifier context: {} members, left {:.1}, right {:.1}",
            self.members.len(),
            state.left_shift,
            state.right_shift
        );
        Ok(())
    }

    fn format_category(
        &self,
        category: Category,
        voices: &mut [Voice],
        state: &mut ModifierState,
    ) -> Result<()> {
        if category == Category::Note {
            let stave_notes: Vec<TickableRef> = self
                .members
                .iter()
                .copied()
                .filter(|m| m.get(voices).is_stave_note())
                .collect();
            notes::format(&stave_notes, voices, state);
            return Ok(());
        }

        let mods = self.collect(category, voices);
        if mods.is_empty() {
            return Ok(());
        }
        match category {
            Category::Note => {}
            Category::Parenthesis => marks::format_parentheses(&mods, voices, state),
            Category::Dot => {
                let first_parenthesis = self
                    .collect(Category::Parenthesis, voices)
                    .first()
                    .map(|p| p.get(voices).width());
                marks::format_dots(&mods, voices, state, first_parenthesis);
            }
            Category::Fingering => marks::format_fingerings(&mods, voices, state),
            Category::Accidental => marks::format_accidentals(&mods, voices, state),
            Category::Stroke => marks::format_strokes(&mods, voices, state),
            Category::GraceNoteGroup => groups::format_grace_groups(&mods, voices, state)?,
            Category::NoteSubGroup => groups::format_sub_groups(&mods, voices, state)?,
            Category::StringNumber => marks::format_string_numbers(&mods, voices, state),
            Category::Articulation => text::format_articulations(&mods, voices, state),
            Category::Ornament => text::format_ornaments(&mods, voices, state),
            Category::Annotation => text::format_annotations(&mods, voices, state),
            Category::ChordSymbol => text::format_chord_symbols(&mods, voices, state),
            Category::Bend => tab::format_bends(&mods, voices, state),
            Category::Vibrato => {
                let bends = self.collect(Category::Bend, voices);
                tab::format_vibratos(&mods, &bends, voices, state);
            }
        }
        Ok(())
    }

    pub fn post_format(&mut self, voices: &mut [Voice]) {
        if self.post_formatted {
            return;
        }
        for member in &self.members {
            let note = member.get_mut(voices);
            if note.is_stave_note() {
                note.post_format();
            }
        }
        self.post_formatted = true;
    }
}
