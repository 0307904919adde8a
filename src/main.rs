use std::env;
use std::io::{self, Write};

use clap::{Parser, Subcommand};
use tape_bf::commands::{repl, run};
use tape_bf::config;

fn print_top_usage_and_exit(program: &str, code: i32) -> ! {
    eprintln!(
        r#"Usage:
  {0} run  [--debug|-d] [--memory N] "<code>"  # Run a program (args are concatenated)
  {0} repl [--bare|--editor]                   # Start a REPL (read-eval-print loop)
  {0}                                          # Same as `repl`

Environment:
  BF_CONFIG      Config file path (default: <XDG config home>/bf.toml)
  BF_MEMORY      Tape length in cells
  BF_ON_FAULT    diagnostic|report
  BF_TIMEOUT_MS  Wall-clock limit for `run`, in milliseconds
  BF_LOG         Log filter for stderr diagnostics (default: warn)

Run "{0} <subcommand> --help" for more info.
"#,
        program
    );
    let _ = io::stderr().flush();
    std::process::exit(code);
}

#[derive(Parser, Debug)]
#[command(name = "bf", disable_help_flag = true, disable_help_subcommand = true)]
struct Cli {
    /// Show this help
    #[arg(short = 'h', long = "help", action = clap::ArgAction::SetTrue)]
    help: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    Run(run::RunArgs),
    Repl(repl::ReplArgs),
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("BF_LOG", "warn"))
        .format_timestamp(None)
        .init();

    // We still pull the program name for help rendering consistency
    let program = env::args().next().unwrap_or_else(|| String::from("bf"));

    let cli = Cli::parse();
    if cli.help {
        print_top_usage_and_exit(&program, 0);
    }

    let settings = match config::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{program}: {e}");
            let _ = io::stderr().flush();
            std::process::exit(2);
        }
    };
    log::debug!("settings: {settings:?}");

    let code = match cli.command {
        Some(Command::Run(args)) => run::run(&program, args, &settings),
        Some(Command::Repl(args)) => repl::run(&program, args, &settings),
        None => repl::run(&program, repl::ReplArgs::default(), &settings),
    };

    std::process::exit(code);
}
