//! Error types for the formatting core.
//!
//! Precondition violations (reading a width or position before the pass that
//! produces it) and structural mismatches between voices are surfaced to the
//! caller immediately. A justification pass that runs out of iterations is
//! not an error; it returns its best layout.

use thiserror::Error;

/// Everything that can go wrong while building or formatting voices.
#[derive(Debug, Error)]
pub enum FormatError {
    /// A tickable's width or metrics were read before it was pre-formatted.
    #[error("Can't read metrics of an unformatted note")]
    UnformattedNote,

    /// A modifier context's width or state was read before it was formatted.
    #[error("Can't read the width of an unformatted modifier context")]
    UnformattedMember,

    /// `min_total_width` was requested before any width pass ran.
    #[error("Call 'pre_calculate_min_total_width' or 'pre_format' before calling 'min_total_width'")]
    NoMinTotalWidth,

    /// An x position was read before the formatter assigned one.
    #[error("No x position has been assigned yet")]
    NoXPosition,

    /// A pass that needs tick contexts ran before they were created.
    #[error("Operation requires tick contexts; call 'format' or 'create_tick_contexts' first")]
    NoTickContexts,

    /// Jointly formatted voices disagree on their total duration.
    #[error("Voices should have same total note duration in ticks")]
    TickMismatch,

    /// A strict voice does not fill its time signature.
    #[error("Voice does not have enough notes")]
    IncompleteVoice,

    /// A tickable would overflow a strict or full voice.
    #[error("Too many ticks: voice holds {total}, adding {adding} to {used}")]
    TooManyTicks {
        total: String,
        used: String,
        adding: String,
    },

    #[error("Bad argument: {0}")]
    BadArgument(String),

    /// Fraction with a zero denominator.
    #[error("Arithmetic error: {0}")]
    Arithmetic(String),

    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FormatError>;
