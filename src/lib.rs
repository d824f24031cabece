//! scoreformat: rhythmic formatting and justification of music notation.
//!
//! Voices of notes, rests and other tickables are grouped into columns of
//! simultaneous events, decorated by modifiers whose horizontal room is
//! resolved in a fixed order, and spread across a target width so that
//! longer durations get proportionally (softmax) more space.
//!
//! # Example
//! ```no_run
//! use scoreformat::{Formatter, Tickable, Voice};
//!
//! let mut voice = Voice::common_time();
//! for key in ["c/4", "d/4", "e/4", "f/4"] {
//!     voice.add_tickable(Tickable::note(&[key], "4").unwrap()).unwrap();
//! }
//! let mut voices = vec![voice];
//! let mut formatter = Formatter::new();
//! formatter.format(&mut voices, 300.0).unwrap();
//! println!("cost: {}", formatter.total_cost());
//! ```

mod constants;
pub mod error;
pub mod formatter;
pub mod fraction;
pub mod model;
pub mod modifier;
pub mod svg_builder;
pub mod tables;
pub mod tick_context;
pub mod tickable;
pub mod voice;

#[cfg(target_os = "android")]
pub mod android;

use log::debug;

pub use constants::RESOLUTION;
pub use error::{FormatError, Result};
pub use formatter::{Formatter, FormatterOptions, Spacing};
pub use fraction::Fraction;
pub use model::{MeasureLayout, MeasureSpec};
pub use modifier::{Modifier, ModifierContext};
pub use tick_context::TickContext;
pub use tickable::{StemDirection, Tickable, TickableRef, Tuplet};
pub use voice::{Voice, VoiceMode, VoiceTime};

use svg_builder::SvgBuilder;

/// Build, format and (optionally) tune the voices of a measure.
fn run_measure(spec: &MeasureSpec) -> Result<(Formatter, Vec<Voice>)> {
    if spec.voices.is_empty() {
        return Err(FormatError::BadArgument("measure has no voices".into()));
    }
    let mut voices = spec.build_voices()?;
    let mut formatter = spec.formatter();
    formatter.format(&mut voices, spec.justify_width)?;
    if spec.tune {
        formatter.tune(&mut voices, None)?;
    }
    formatter.post_format(&mut voices);
    debug!(
        "formatted {} voices to {:.1}px, cost {:.3}",
        voices.len(),
        spec.justify_width,
        formatter.total_cost()
    );
    Ok((formatter, voices))
}

/// Format a measure description and return its layout.
pub fn format_measure(spec: &MeasureSpec) -> Result<MeasureLayout> {
    let (formatter, voices) = run_measure(spec)?;
    MeasureLayout::collect(&formatter, &voices)
}

/// Parse a JSON measure description and return the layout as pretty JSON.
/// Useful for passing data across FFI boundaries.
pub fn format_json(json: &str) -> Result<String> {
    let layout = format_measure(&MeasureSpec::from_json(json)?)?;
    Ok(serde_json::to_string_pretty(&layout)?)
}

const STAVE_X: f64 = 10.0;
const STAVE_TOP: f64 = 40.0;
const STAVE_LINE_GAP: f64 = 10.0;
const VOICE_COLORS: [&str; 4] = ["#1f77b4", "#d62728", "#9467bd", "#ff7f0e"];

/// Format a JSON measure description and draw it as an SVG: the stave, a box
/// per note and the formatter's gap overlay.
pub fn debug_svg(json: &str) -> Result<String> {
    let spec = MeasureSpec::from_json(json)?;
    let (formatter, voices) = run_measure(&spec)?;
    if formatter.tick_contexts().is_empty() {
        return Ok(svg_builder::empty_svg("No notes to format"));
    }

    let spacing = formatter.spacing();
    let content = spec.justify_width.max(formatter.min_total_width()?);
    let width = STAVE_X * 2.0 + spacing.stave_padding + content + spacing.end_padding_max;
    let stave_bottom = STAVE_TOP + STAVE_LINE_GAP * 4.0;
    let mut svg = SvgBuilder::new(width.ceil(), stave_bottom + 60.0);

    for i in 0..5 {
        let y = STAVE_TOP + STAVE_LINE_GAP * i as f64;
        svg.line(STAVE_X, y, width - STAVE_X, y, "#000", 1.0);
    }

    let start = STAVE_X + spacing.stave_padding;
    for (v, voice) in voices.iter().enumerate() {
        let color = VOICE_COLORS[v % VOICE_COLORS.len()];
        for note in voice.tickables() {
            if !note.is_visible() {
                continue;
            }
            let metrics = note.metrics()?;
            let x = start + note.x()? + note.center_x_shift() - metrics.mod_left_px;
            svg.rect(
                x,
                STAVE_TOP - 10.0,
                metrics.width,
                stave_bottom - STAVE_TOP + 20.0,
                "none",
                color,
                1.0,
            );
        }
    }

    formatter.plot_debugging(&mut svg, STAVE_X, STAVE_TOP - 15.0, stave_bottom + 15.0);
    Ok(svg.build())
}

// ═══════════════════════════════════════════════════════════════════════
// C FFI for iOS (static library) and Android (JNI)
// ═══════════════════════════════════════════════════════════════════════

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

unsafe fn json_arg<'a>(json: *const c_char) -> Option<&'a str> {
    if json.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(json) }.to_str().ok()
}

/// Format a JSON measure description and return the layout as a C string.
/// The caller must free the returned string with `scoreformat_free_string`.
/// Returns null on invalid input or a formatting error.
///
/// # Safety
/// `json` must be a valid null-terminated UTF-8 C string.
#[no_mangle]
pub unsafe extern "C" fn scoreformat_format_json(json: *const c_char) -> *mut c_char {
    let Some(json) = (unsafe { json_arg(json) }) else {
        return std::ptr::null_mut();
    };
    match format_json(json) {
        Ok(layout) => CString::new(layout).unwrap_or_default().into_raw(),
        Err(_) => std::ptr::null_mut(),
    }
}

/// Format a JSON measure description and return its debug SVG.
/// The caller must free the returned string with `scoreformat_free_string`.
///
/// # Safety
/// `json` must be a valid null-terminated UTF-8 C string.
#[no_mangle]
pub unsafe extern "C" fn scoreformat_debug_svg(json: *const c_char) -> *mut c_char {
    let Some(json) = (unsafe { json_arg(json) }) else {
        return std::ptr::null_mut();
    };
    match debug_svg(json) {
        Ok(svg) => CString::new(svg).unwrap_or_default().into_raw(),
        Err(_) => std::ptr::null_mut(),
    }
}

/// Free a string previously returned by scoreformat functions.
///
/// # Safety
/// `ptr` must be a string previously returned by a scoreformat function, or null.
#[no_mangle]
pub unsafe extern "C" fn scoreformat_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        unsafe {
            let _ = CString::from_raw(ptr);
        }
    }
}
