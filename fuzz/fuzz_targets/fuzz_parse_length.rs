#![no_main]
use fence_core::units::{Length, UnitMode, format_length, parse_length};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|text: &str| {
    // The length grammar must reject garbage gracefully, never panic, and
    // formatting whatever parses must parse again.
    let max = Length::from_mm(10_000);
    for mode in [UnitMode::Inch, UnitMode::Metric] {
        if let Ok(len) = parse_length(text, mode, max) {
            let rendered = format_length(len, mode, 64);
            let _ = parse_length(&rendered, mode, max);
        }
    }
});
