//! Fuzz target for the configuration parser.
//!
//! This target feeds arbitrary TOML strings to the config parser
//! to find crashes and panics.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_config_parser
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;
use strata_migrate::MigrationConfig;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // The parser should never panic, only return errors
        if let Ok(config) = MigrationConfig::from_toml_str(input) {
            let _ = config.scripts.baseline();
        }
    }
});
