//! Fuzz target for script identity and index ordering.
//!
//! Arbitrary relative paths go through the script factory. Every accepted
//! script must be exactly one of incremental or repeatable, and its indexes
//! must survive the canonical string round trip.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_script_names
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;
use strata_migrate::{ScriptConfig, ScriptFactory, ScriptIndexes};

fuzz_target!(|data: (&str, &str)| {
    let (first, second) = data;
    let Ok(factory) = ScriptFactory::new(&ScriptConfig::default()) else {
        return;
    };

    let scripts = [first, second]
        .iter()
        .filter_map(|name| factory.create(name, 0, "").ok())
        .collect::<Vec<_>>();

    for script in &scripts {
        assert!(script.is_incremental_script() != script.is_repeatable_script());
        if script.is_repeatable_script() {
            assert!(!script.indexes().has_any_index());
        }

        let canonical = script.indexes().to_canonical_string();
        let parsed: ScriptIndexes = canonical.parse().expect("canonical form parses");
        assert_eq!(&parsed, script.indexes());
    }

    if let [a, b] = scripts.as_slice() {
        assert_eq!(a.indexes().cmp(b.indexes()), b.indexes().cmp(a.indexes()).reverse());
    }
});
