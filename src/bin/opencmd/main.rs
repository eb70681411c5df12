mod list;
mod run;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use log::debug;

use opencmd::config_file::Config;
use opencmd::load_config;
use opencmd::output::format_error;

#[derive(Parser, Debug)]
#[command(
    name = "opencmd",
    version,
    about = "Run project scripts by name from anywhere in the project"
)]
struct Cli {
    /// Path to config file (auto-detected if not specified)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Shell used for scripts without an execute bit or shebang
    #[arg(long, global = true)]
    shell: Option<PathBuf>,

    /// Log file path (written in addition to stderr)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a command
    Run(run::RunArgs),
    /// Show available commands and their paths
    List,
}

fn main() -> ExitCode {
    match try_main() {
        Ok(code) => code,
        Err(e) => {
            eprintln!(
                "{}",
                format_error(&e.to_string(), std::io::stderr().is_terminal())
            );
            ExitCode::FAILURE
        }
    }
}

fn try_main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let log_file = cli.log_file.as_ref().map(std::fs::File::create).transpose()?;
    opencmd::logger::init(cli.verbose, log_file)?;

    let cwd = std::env::current_dir()?;
    let config = with_overrides(load_config(cli.config.as_deref(), &cwd)?, cli.shell);
    config.validate()?;
    debug!("Using config: {config:?}");

    match cli.command {
        Commands::Run(ref args) => Ok(run::run(args, &config, &cwd)),
        Commands::List => Ok(list::run(&config, &cwd)),
    }
}

fn with_overrides(mut config: Config, shell: Option<PathBuf>) -> Config {
    if shell.is_some() {
        config.default_shell = shell;
    }
    config
}
