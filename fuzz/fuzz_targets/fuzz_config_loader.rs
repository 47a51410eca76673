#![no_main]
use blescale_config::{Configuration, load_toml};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Persisted document: merging never fails and always yields a valid config
    let merged = Configuration::merge_json(data);
    assert!(merged.config.scale.is_finite() && merged.config.scale != 0.0);
    assert!(merged.config.offset.is_finite());
    assert!(merged.config.interval_ms >= 1);
    let again = Configuration::merge_json(&merged.config.to_json());
    assert_eq!(again.config, merged.config);

    // Board profile: parse or validation errors are fine, panics are not
    if let Ok(board) = load_toml(data) {
        let _ = board.validate();
    }
});
