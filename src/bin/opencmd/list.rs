use std::io::{IsTerminal, Write};
use std::path::Path;
use std::process::ExitCode;

use opencmd::Engine;
use opencmd::config_file::Config;
use opencmd::fs::RealFs;
use opencmd::output::format_listing;
use opencmd::process::SystemRunner;

/// Print every script reachable from `cwd`, nearest project first.
pub fn run(config: &Config, cwd: &Path) -> ExitCode {
    let engine = Engine::new(config, &RealFs, &SystemRunner);
    let commands = engine.list(cwd);
    let listing = format_listing(&commands, std::io::stdout().is_terminal());

    let mut stdout = std::io::stdout().lock();
    let _ = stdout.write_all(listing.as_bytes());
    let _ = stdout.flush();
    ExitCode::SUCCESS
}
