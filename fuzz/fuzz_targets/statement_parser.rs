//! Fuzz target for the statement parser.
//!
//! Arbitrary script text is split with every dialect. The parser must never
//! panic, and splitting the same text twice must give the same result.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_statement_parser
//! ```

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use strata_migrate::{Dialect, ParserConfig, ScriptParserFactory};

#[derive(Debug, Arbitrary)]
struct Input {
    dialect: u8,
    backslash_escaping: Option<bool>,
    text: String,
}

fuzz_target!(|input: Input| {
    let dialect = Dialect::ALL[input.dialect as usize % Dialect::ALL.len()];
    let config = ParserConfig {
        dialect,
        backslash_escaping: input.backslash_escaping,
        ..Default::default()
    };
    let factory = ScriptParserFactory::new(&config);

    let first = factory.parser_for_text("fuzz.sql", &input.text).statements();
    let second = factory.parser_for_text("fuzz.sql", &input.text).statements();

    match (first, second) {
        (Ok(a), Ok(b)) => {
            assert_eq!(a, b);
            assert!(a.iter().all(|s| !s.trim().is_empty()));
        }
        (Err(a), Err(b)) => assert_eq!(a.to_string(), b.to_string()),
        _ => panic!("parser is not deterministic"),
    }
});
