//! Duration codes, key parsing and per-duration glyph metrics.

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::{FormatError, Result};

/// How a duration code says the tickable should be drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteType {
    Note,
    Rest,
    Ghost,
}

/// A parsed duration code such as `"8"`, `"qd"` or `"4r"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDuration {
    /// Canonical code without dots or type suffix ("4", "8", "1/2", ...).
    pub code: &'static str,
    /// Ticks of the undotted value.
    pub base_ticks: i64,
    pub dots: usize,
    /// Ticks including dots.
    pub ticks: i64,
    pub note_type: NoteType,
}

impl ParsedDuration {
    pub fn has_stem(&self) -> bool {
        self.base_ticks < RESOLUTION
    }

    pub fn has_flag(&self) -> bool {
        self.base_ticks < RESOLUTION / 4
    }
}

const DURATIONS: [(&str, i64); 10] = [
    ("1/2", RESOLUTION * 2),
    ("1", RESOLUTION),
    ("2", RESOLUTION / 2),
    ("4", RESOLUTION / 4),
    ("8", RESOLUTION / 8),
    ("16", RESOLUTION / 16),
    ("32", RESOLUTION / 32),
    ("64", RESOLUTION / 64),
    ("128", RESOLUTION / 128),
    ("256", RESOLUTION / 256),
];

fn sanitize(code: &str) -> Option<(&'static str, i64)> {
    let code = match code {
        "w" => "1",
        "h" => "2",
        "q" => "4",
        "b" => "256",
        other => other,
    };
    DURATIONS.iter().find(|(c, _)| *c == code).copied()
}

/// Ticks for an undotted duration code (aliases `w`, `h`, `q`, `b` allowed).
pub fn duration_to_ticks(code: &str) -> Result<i64> {
    sanitize(code)
        .map(|(_, ticks)| ticks)
        .ok_or_else(|| FormatError::InvalidDuration(code.to_string()))
}

/// Parse `<code><d...><r|g|n>?`, e.g. `"8dd"`, `"4r"`, `"hd"`.
pub fn parse_duration(spec: &str) -> Result<ParsedDuration> {
    let invalid = || FormatError::InvalidDuration(spec.to_string());
    let mut body = spec.trim();

    let note_type = match body.chars().last() {
        Some('r') => NoteType::Rest,
        Some('g') => NoteType::Ghost,
        _ => NoteType::Note,
    };
    if matches!(body.chars().last(), Some('r' | 'g' | 'n')) {
        body = &body[..body.len() - 1];
    }

    let trimmed = body.trim_end_matches('d');
    let dots = body.len() - trimmed.len();
    let (code, base_ticks) = sanitize(trimmed).ok_or_else(invalid)?;
    let mut ticks = base_ticks;
    let mut current = base_ticks;
    for _ in 0..dots {
        if current <= 1 {
            return Err(invalid());
        }
        current /= 2;
        ticks += current;
    }

    Ok(ParsedDuration {
        code,
        base_ticks,
        dots,
        ticks,
        note_type,
    })
}

// ═══════════════════════════════════════════════════════════════════════
// Keys
// ═══════════════════════════════════════════════════════════════════════

/// Clefs understood by the key parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Clef {
    #[default]
    Treble,
    Bass,
    Alto,
    Tenor,
    Percussion,
}

impl Clef {
    fn line_shift(self) -> f64 {
        match self {
            Clef::Treble | Clef::Percussion => 0.0,
            Clef::Bass => 6.0,
            Clef::Alto => 3.0,
            Clef::Tenor => 4.0,
        }
    }
}

/// Stave line of a key like `"c/4"` or `"f#/5"`. Bottom stave line is 1,
/// each line or space is half a unit.
pub fn key_line(key: &str, clef: Clef) -> Result<f64> {
    let invalid = || FormatError::InvalidKey(key.to_string());
    let mut pieces = key.split('/');
    let name = pieces.next().ok_or_else(invalid)?.trim();
    let octave: i64 = pieces
        .next()
        .ok_or_else(invalid)?
        .trim()
        .parse()
        .map_err(|_| invalid())?;

    let step = name.chars().next().ok_or_else(invalid)?.to_ascii_lowercase();
    let index = match step {
        'c' => 0,
        'd' => 1,
        'e' => 2,
        'f' => 3,
        'g' => 4,
        'a' => 5,
        'b' => 6,
        'r' | 'x' => 6, // rest / percussion placeholder
        _ => return Err(invalid()),
    };

    let base_index = octave
        .checked_sub(4)
        .and_then(|o| o.checked_mul(7))
        .and_then(|o| o.checked_add(index))
        .ok_or_else(invalid)?;
    Ok(base_index as f64 / 2.0 + clef.line_shift())
}

// ═══════════════════════════════════════════════════════════════════════
// Glyph metrics
// ═══════════════════════════════════════════════════════════════════════

pub(crate) fn notehead_width(base_ticks: i64) -> f64 {
    if base_ticks >= RESOLUTION * 2 {
        NOTEHEAD_DOUBLE_WHOLE_WIDTH
    } else if base_ticks >= RESOLUTION {
        NOTEHEAD_WHOLE_WIDTH
    } else if base_ticks >= RESOLUTION / 2 {
        NOTEHEAD_HALF_WIDTH
    } else {
        NOTEHEAD_BLACK_WIDTH
    }
}

pub(crate) fn rest_width(base_ticks: i64) -> f64 {
    match base_ticks {
        t if t >= RESOLUTION / 2 => REST_WHOLE_WIDTH,
        t if t >= RESOLUTION / 4 => REST_QUARTER_WIDTH,
        t if t >= RESOLUTION / 8 => REST_EIGHTH_WIDTH,
        t if t >= RESOLUTION / 16 => REST_SIXTEENTH_WIDTH,
        t if t >= RESOLUTION / 32 => REST_THIRTY_SECOND_WIDTH,
        _ => REST_SIXTY_FOURTH_WIDTH,
    }
}

/// Rough advance width of a text run at `font_size` px.
pub fn text_width(text: &str, font_size: f64) -> f64 {
    text.chars().count() as f64 * font_size * TEXT_WIDTH_PER_EM
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotted_durations_add_halves() {
        let d = parse_duration("4d").unwrap();
        assert_eq!(d.code, "4");
        assert_eq!(d.dots, 1);
        assert_eq!(d.ticks, 6144);

        let dd = parse_duration("8dd").unwrap();
        assert_eq!(dd.ticks, 2048 + 1024 + 512);
    }

    #[test]
    fn aliases_and_type_suffixes() {
        assert_eq!(parse_duration("q").unwrap().ticks, 4096);
        assert_eq!(parse_duration("hd").unwrap().ticks, 12288);
        assert_eq!(parse_duration("4r").unwrap().note_type, NoteType::Rest);
        assert_eq!(parse_duration("16g").unwrap().note_type, NoteType::Ghost);
        assert_eq!(parse_duration("1/2").unwrap().ticks, 32768);
    }

    #[test]
    fn unknown_durations_fail() {
        assert!(matches!(parse_duration("3"), Err(FormatError::InvalidDuration(_))));
        assert!(matches!(parse_duration(""), Err(FormatError::InvalidDuration(_))));
        assert!(duration_to_ticks("5").is_err());
    }

    #[test]
    fn key_lines_follow_the_clef() {
        assert_eq!(key_line("c/4", Clef::Treble).unwrap(), 0.0);
        assert_eq!(key_line("e/4", Clef::Treble).unwrap(), 1.0);
        assert_eq!(key_line("b/4", Clef::Treble).unwrap(), 3.0);
        assert_eq!(key_line("f#/5", Clef::Treble).unwrap(), 5.0);
        assert_eq!(key_line("a/3", Clef::Bass).unwrap(), 5.0);
        assert_eq!(key_line("c/4", Clef::Alto).unwrap(), 3.0);
        assert!(key_line("h/4", Clef::Treble).is_err());
        assert!(key_line("c", Clef::Treble).is_err());
        assert!(matches!(
            key_line("c/9223372036854775807", Clef::Treble),
            Err(FormatError::InvalidKey(_))
        ));
    }
}
