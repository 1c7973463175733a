#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Fuzz TOML parsing of Config and the calibration record: invalid input
    // must be rejected gracefully, never by panicking.
    if let Ok(cfg) = fence_config::load_toml(data) {
        let _ = cfg.validate();
    }
    let _ = fence_config::load_calibration_toml(data);
});
