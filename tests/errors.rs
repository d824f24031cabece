//! Error surface: precondition violations, structural mismatches and
//! degenerate input.

use std::ffi::CString;

use scoreformat::{
    format_json, scoreformat_format_json, FormatError, Formatter, Fraction, TickContext, Tickable,
    Tuplet, Voice, VoiceMode, VoiceTime,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn quarters(time: VoiceTime, count: usize, mode: VoiceMode) -> Voice {
    let mut voice = Voice::new(time).unwrap().with_mode(mode);
    for _ in 0..count {
        voice.add_tickable(Tickable::note(&["a/4"], "4").unwrap()).unwrap();
    }
    voice
}

fn three_four() -> VoiceTime {
    VoiceTime {
        num_beats: 3,
        beat_value: 4,
    }
}

#[test]
fn voices_of_different_lengths_cannot_be_joined() {
    init_logger();
    let mut voices = vec![
        quarters(VoiceTime::default(), 4, VoiceMode::Strict),
        quarters(three_four(), 3, VoiceMode::Strict),
    ];
    let mut formatter = Formatter::new();
    let err = formatter.join_voices(&mut voices).unwrap_err();
    assert!(matches!(err, FormatError::TickMismatch));
    assert_eq!(err.to_string(), "Voices should have same total note duration in ticks");
    assert!(matches!(
        formatter.format(&mut voices, 300.0),
        Err(FormatError::TickMismatch)
    ));
}

#[test]
fn strict_voices_must_be_complete() {
    init_logger();
    let mut voices = vec![quarters(VoiceTime::default(), 3, VoiceMode::Strict)];
    let mut formatter = Formatter::new();
    assert!(matches!(
        formatter.format(&mut voices, 300.0),
        Err(FormatError::IncompleteVoice)
    ));

    // the same notes format fine in a soft voice
    let mut voices = vec![quarters(VoiceTime::default(), 3, VoiceMode::Soft)];
    assert!(Formatter::new().format(&mut voices, 300.0).is_ok());
}

#[test]
fn full_voices_may_be_incomplete() {
    init_logger();
    let mut voices = vec![quarters(VoiceTime::default(), 2, VoiceMode::Full)];
    assert!(!voices[0].is_complete());
    assert!(Formatter::new().format(&mut voices, 200.0).is_ok());
}

#[test]
fn overfull_voices_are_rejected() {
    init_logger();
    for mode in [VoiceMode::Strict, VoiceMode::Full] {
        let mut voice = quarters(VoiceTime::default(), 4, mode);
        let err = voice
            .add_tickable(Tickable::note(&["a/4"], "4").unwrap())
            .unwrap_err();
        assert!(matches!(err, FormatError::TooManyTicks { .. }));
        assert_eq!(voice.len(), 4);
    }
    let mut soft = quarters(VoiceTime::default(), 4, VoiceMode::Soft);
    soft.add_tickable(Tickable::note(&["a/4"], "4").unwrap()).unwrap();
    assert_eq!(soft.len(), 5);
}

#[test]
fn bars_do_not_count_toward_the_measure() {
    init_logger();
    let mut voice = quarters(VoiceTime::default(), 4, VoiceMode::Strict);
    voice.add_tickable(Tickable::bar(1.0)).unwrap();
    assert!(voice.is_complete());
}

#[test]
fn metrics_before_formatting_are_errors() {
    init_logger();
    let note = Tickable::note(&["c/4"], "4").unwrap();
    assert!(matches!(note.width(), Err(FormatError::UnformattedNote)));
    assert!(matches!(note.metrics(), Err(FormatError::UnformattedNote)));
    assert!(matches!(note.x(), Err(FormatError::NoXPosition)));

    let context = TickContext::new(0);
    assert!(matches!(context.width(), Err(FormatError::UnformattedMember)));
    assert!(matches!(context.x(), Err(FormatError::NoXPosition)));
}

#[test]
fn min_total_width_needs_a_width_pass() {
    init_logger();
    let formatter = Formatter::new();
    let err = formatter.min_total_width().unwrap_err();
    assert!(matches!(err, FormatError::NoMinTotalWidth));
    assert!(err.to_string().contains("pre_calculate_min_total_width"));
}

#[test]
fn pre_calculating_without_voices_is_an_error() {
    init_logger();
    let mut formatter = Formatter::new();
    assert!(matches!(
        formatter.pre_calculate_min_total_width(&mut []),
        Err(FormatError::BadArgument(_))
    ));
}

#[test]
fn bad_durations_keys_and_ratios() {
    init_logger();
    assert!(matches!(
        Tickable::note(&["c/4"], "3"),
        Err(FormatError::InvalidDuration(_))
    ));
    assert!(matches!(
        Tickable::note(&["h/4"], "4"),
        Err(FormatError::InvalidKey(_))
    ));
    assert!(matches!(Tuplet::new(0, 2), Err(FormatError::BadArgument(_))));
    assert!(matches!(
        Voice::new(VoiceTime {
            num_beats: 4,
            beat_value: 0
        }),
        Err(FormatError::BadArgument(_))
    ));
    assert!(matches!(Fraction::new(1, 0), Err(FormatError::Arithmetic(_))));
}

#[test]
fn degenerate_input_is_a_no_op() {
    init_logger();
    let mut formatter = Formatter::new();
    assert!(formatter.format(&mut [], 300.0).is_ok());
    assert!(formatter.tick_contexts().is_empty());

    let mut voices = vec![quarters(VoiceTime::default(), 1, VoiceMode::Soft)];
    formatter.format(&mut voices, 300.0).unwrap();
    assert_eq!(formatter.tick_contexts().len(), 1);
    assert_eq!(formatter.total_cost(), 0.0);
}

#[test]
fn running_out_of_iterations_is_not_an_error() {
    init_logger();
    // far too narrow to reach the padding band
    let mut voices = vec![quarters(VoiceTime::default(), 4, VoiceMode::Strict)];
    let mut formatter = Formatter::new();
    formatter.format(&mut voices, 30.0).unwrap();
    assert!(formatter.iterations() <= formatter.options().max_iterations);
    assert!(formatter.total_cost().is_finite());
}

#[test]
fn oversized_numbers_in_a_description_are_errors() {
    init_logger();
    let long_tuplet = r#"{ "voices": [{
        "notes": [{ "keys": ["c/4"], "duration": "1" }],
        "tuplets": [{ "start": 1, "count": 18446744073709551615, "num_notes": 3, "notes_occupied": 2 }]
    }] }"#;
    assert!(matches!(format_json(long_tuplet), Err(FormatError::BadArgument(_))));

    let many_beats = r#"{ "time": { "num_beats": 9223372036854775807, "beat_value": 4 },
        "voices": [{ "notes": [] }] }"#;
    assert!(matches!(format_json(many_beats), Err(FormatError::BadArgument(_))));

    let huge_ratio = r#"{ "voices": [{
        "notes": [{ "keys": ["c/4"], "duration": "8" }],
        "tuplets": [{ "start": 0, "count": 1, "num_notes": 1, "notes_occupied": 9223372036854775807 }]
    }] }"#;
    assert!(matches!(format_json(huge_ratio), Err(FormatError::Arithmetic(_))));

    let high_octave = r#"{ "voices": [{ "notes": [{ "keys": ["c/9223372036854775807"], "duration": "1" }] }] }"#;
    assert!(matches!(format_json(high_octave), Err(FormatError::InvalidKey(_))));

    // the C entry point reports these as null instead of unwinding
    for json in [long_tuplet, many_beats, huge_ratio, high_octave] {
        let input = CString::new(json).unwrap();
        assert!(unsafe { scoreformat_format_json(input.as_ptr()) }.is_null());
    }
}

#[test]
fn tick_sums_that_overflow_are_rejected() {
    init_logger();
    let mut note = Tickable::note(&["c/4"], "8").unwrap();
    note.add_tuplet(Tuplet::new(1, i64::MAX / 2048).unwrap()).unwrap();
    let mut voice = Voice::new(VoiceTime::default()).unwrap().with_mode(VoiceMode::Soft);
    voice.add_tickable(note.clone()).unwrap();
    assert!(matches!(voice.add_tickable(note), Err(FormatError::Arithmetic(_))));
    assert_eq!(voice.len(), 1);
}
