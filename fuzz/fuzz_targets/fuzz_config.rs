//! Fuzz target: `SystemConfig::from_json` / `SystemConfig::from_bytes`
//!
//! Arbitrary bytes are parsed both as a JSON document and as a postcard
//! blob.  Neither path may panic, and anything accepted must pass
//! validation and survive a postcard round trip unchanged.
//!
//! cargo fuzz run fuzz_config

#![no_main]

use frothctl::config::SystemConfig;
use libfuzzer_sys::fuzz_target;

fn check(config: &SystemConfig) {
    assert!(config.validate().is_ok(), "accepted config must be valid");
    let bytes = config.to_bytes().expect("valid config serialises");
    let back = SystemConfig::from_bytes(&bytes).expect("own blob decodes");
    assert_eq!(&back, config);
}

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(config) = SystemConfig::from_json(text) {
            check(&config);
        }
    }
    if let Ok(config) = SystemConfig::from_bytes(data) {
        check(&config);
    }
});
