use std::io::{self, Write};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use clap::Args;

use crate::cli_util::{self, DEBUG_TABLE_HEADER, print_outcome};
use crate::config::Settings;
use crate::{Engine, FaultPolicy, Outcome, Program};

#[derive(Args, Debug)]
#[command(disable_help_flag = true)]
pub struct RunArgs {
    /// Print a step-by-step table of operations instead of performing I/O
    #[arg(short = 'd', long = "debug")]
    pub debug: bool,

    /// Tape length in cells (fallback BF_MEMORY, then config; minimum 5)
    #[arg(short = 'm', long = "memory", value_name = "CELLS")]
    pub memory: Option<usize>,

    /// What to do on a fault: run a diagnostic program, or report on stderr
    #[arg(long = "on-fault", value_name = "POLICY")]
    pub on_fault: Option<FaultPolicy>,

    /// Wall-clock timeout in milliseconds (fallback BF_TIMEOUT_MS, then config; default none)
    #[arg(long = "timeout", value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Concatenated program parts
    #[arg(value_name = "code", trailing_var_arg = true, allow_hyphen_values = true)]
    pub code: Vec<String>,

    /// Show this help
    #[arg(short = 'h', long = "help", action = clap::ArgAction::SetTrue)]
    pub help: bool,
}

pub fn run(program: &str, args: RunArgs, settings: &Settings) -> i32 {
    if args.help {
        usage_and_exit(program, 0);
    }

    let RunArgs {
        debug,
        memory,
        on_fault,
        timeout_ms,
        code,
        ..
    } = args;

    if code.is_empty() {
        usage_and_exit(program, 2);
    }
    if let Some(flag) = misplaced_flag(&code) {
        eprintln!("{program}: option '{flag}' must come before the code");
        let _ = io::stderr().flush();
        return 2;
    }

    let source = code.join("");
    let memory_size = memory.unwrap_or(settings.memory_size);
    let policy = on_fault.unwrap_or(settings.on_fault);
    let timeout_ms = timeout_ms.or(settings.timeout_ms);

    // The engine cannot be cancelled; a timeout abandons its thread and the
    // process exits underneath it.
    let (tx, rx) = mpsc::channel::<Outcome>();
    let worker_source = source.clone();
    thread::spawn(move || {
        let mut engine = Engine::with_memory(memory_size);
        engine.set_fault_policy(policy);
        if debug {
            println!("{DEBUG_TABLE_HEADER}");
            engine.set_step_observer(|event| println!("{}", cli_util::debug_table_row(event)));
        } else {
            engine.set_input_provider(cli_util::stdin_byte);
            engine.set_output_sink(cli_util::stdout_byte);
        }
        let _ = tx.send(engine.run(&worker_source));
    });

    let received = match timeout_ms {
        Some(ms) => rx.recv_timeout(Duration::from_millis(ms)),
        None => rx.recv().map_err(|_| mpsc::RecvTimeoutError::Disconnected),
    };

    let exit_code = match received {
        Ok(Outcome::Ok) => 0,
        Ok(outcome) => {
            if policy == FaultPolicy::Report {
                let filtered = Program::parse(&source).to_string();
                print_outcome(Some(program), &filtered, &outcome);
            }
            1
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            let _ = io::stdout().flush();
            eprintln!(
                "Execution aborted: wall-clock timeout exceeded ({} ms)",
                timeout_ms.unwrap_or_default()
            );
            let _ = io::stderr().flush();
            1
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            eprintln!("{program}: interpreter thread exited unexpectedly");
            1
        }
    };

    // For readability, ensure output ends with a newline
    println!();
    let _ = io::stdout().flush();
    exit_code
}

const RUN_FLAGS: [&str; 8] = [
    "--debug", "-d", "--memory", "-m", "--on-fault", "--timeout", "--help", "-h",
];

/// Code parts are captured verbatim once the first one is seen, so an option
/// typed after the code would otherwise run as `-` instructions.
fn misplaced_flag(code: &[String]) -> Option<&str> {
    code.iter().map(String::as_str).find(|part| {
        let name = part.split_once('=').map_or(*part, |(name, _)| name);
        RUN_FLAGS.contains(&name)
    })
}

fn usage_and_exit(program: &str, code: i32) -> ! {
    eprintln!(
        r#"Usage:
  {0} run [--debug|-d] [--memory N] [--on-fault diagnostic|report] [--timeout MS] "<code>"

Options:
  --debug,  -d        Print a step-by-step table of operations instead of performing I/O
  --memory, -m <N>    Tape length in cells (minimum 5; default 30000)
  --on-fault <POLICY> diagnostic: print the problem through program output (default)
                      report:     describe the problem on stderr
  --timeout <MS>      Abort after MS milliseconds of wall-clock time
  --help,   -h        Show this help

Notes:
- Input (`,`) reads a single byte from stdin; on EOF the current cell is set to 0.
- Characters outside of ><+-.,[] are ignored.
- A fault (uneven brackets, pointer off either end of the tape) exits with code 1.
- Options go before the code; an option written after it is rejected.

Examples:
- Echo one byte:
    {0} run ",." < input.txt
"#,
        program
    );
    let _ = io::stderr().flush();
    std::process::exit(code);
}
