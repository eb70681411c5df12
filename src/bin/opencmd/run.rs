use std::ffi::OsString;
use std::io::{IsTerminal, Write};
use std::path::Path;
use std::process::ExitCode;

use clap::Args;
use log::info;

use opencmd::config_file::Config;
use opencmd::fs::RealFs;
use opencmd::output::format_error;
use opencmd::process::SystemRunner;
use opencmd::{Engine, RunError};

/// Exit code used when no script matches, as shells do for unknown commands
const NOT_FOUND_EXIT: u8 = 127;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Name of the script to run
    name: String,

    /// Arguments passed on to the script (after `--`)
    #[arg(last = true)]
    args: Vec<OsString>,
}

/// Run a script and print its captured output.
pub fn run(args: &RunArgs, config: &Config, cwd: &Path) -> ExitCode {
    let engine = Engine::new(config, &RealFs, &SystemRunner);
    let color = std::io::stderr().is_terminal();

    match engine.run(cwd, &args.name, &args.args) {
        Ok(outcome) => {
            info!(
                "Ran {} via {} strategy",
                outcome.reference.path.display(),
                outcome.strategy
            );
            print_output(&outcome.output);
            match outcome.exit_code {
                Some(code) => ExitCode::from(u8::try_from(code & 0xff).unwrap_or(1)),
                None => ExitCode::FAILURE,
            }
        }
        Err(e) => {
            eprintln!("{}", format_error(&e.to_string(), color));
            match e {
                RunError::NotFound(_) => ExitCode::from(NOT_FOUND_EXIT),
                RunError::Exhausted { output, .. } => {
                    print_output(&output);
                    ExitCode::FAILURE
                }
                RunError::Classify(_) => ExitCode::FAILURE,
            }
        }
    }
}

fn print_output(output: &str) {
    let mut stdout = std::io::stdout().lock();
    let _ = stdout.write_all(output.as_bytes());
    let _ = stdout.flush();
}
