//! `strata version` command - Display version information.

use strata_migrate::Dialect;

use crate::error::CliResult;
use crate::output::{self, kv};

/// Package version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name
const NAME: &str = env!("CARGO_PKG_NAME");

/// Run the version command
pub async fn run() -> CliResult<()> {
    output::logo();
    output::newline();

    kv("Version", VERSION);
    kv("Binary", NAME);

    #[cfg(debug_assertions)]
    let build_mode = "debug";
    #[cfg(not(debug_assertions))]
    let build_mode = "release";

    kv("Build", build_mode);

    let dialects = Dialect::ALL.iter().map(|d| d.as_str()).collect::<Vec<_>>();
    kv("Dialects", &dialects.join(", "));

    output::newline();

    output::section("Components");
    kv("strata-migrate", env!("CARGO_PKG_VERSION"));
    kv("strata-cli", env!("CARGO_PKG_VERSION"));

    Ok(())
}
