use std::io::{self, Read, Write};

use crate::{Outcome, StepEvent};

/// Input provider for `,` that reads a single byte from stdin; EOF gives `None`.
pub fn stdin_byte() -> Option<u8> {
    let mut buf = [0u8; 1];
    match io::stdin().read(&mut buf) {
        Ok(0) => None,
        Ok(_) => Some(buf[0]),
        Err(e) => {
            log::warn!("stdin read failed, treating as EOF: {e}");
            None
        }
    }
}

/// Output sink for `.` that writes the raw byte to stdout.
pub fn stdout_byte(byte: u8) {
    if let Err(e) = io::stdout().write_all(&[byte]) {
        log::warn!("stdout write failed: {e}");
    }
}

/// Print a faulted outcome on stderr with a caret under the offending
/// instruction of the filtered program `code`.
/// If `program` is `Some("bf")`, messages are prefixed with "bf: ...".
pub fn print_outcome(program: Option<&str>, code: &str, outcome: &Outcome) {
    let prefix_program = |msg: &str| match program {
        Some(p) => format!("{p}: {msg}"),
        None => msg.to_string(),
    };

    let (msg, pos) = match *outcome {
        Outcome::Ok => return,
        Outcome::SyntaxError { at } => (prefix_program("Parse error: uneven brackets"), at),
        Outcome::RightOverflow { at } => (
            prefix_program("Runtime error: memory overflow (pointer moved past the last cell)"),
            at,
        ),
        Outcome::LeftOverflow { at } => (
            prefix_program("Runtime error: memory underflow (pointer moved left of cell 0)"),
            at,
        ),
    };
    print_error_with_context(&msg, code, pos);
}

/// Print `prefix` with the instruction index, then a short window of `code`
/// around `pos` and a caret beneath it. `code` is filtered, so it is ASCII.
pub fn print_error_with_context(prefix: &str, code: &str, pos: usize) {
    eprintln!("{prefix} at instruction {pos}");

    const WINDOW: usize = 32;

    let start = pos.saturating_sub(WINDOW);
    let end = (pos + WINDOW + 1).min(code.len());
    if start < end {
        eprintln!("  {}", &code[start..end]);
        eprintln!("  {}^", " ".repeat(pos - start));
    }
    let _ = io::stderr().flush();
}

pub const DEBUG_TABLE_HEADER: &str = "STEP | IP  | PTR | CELL | INSTR | ACTION\n-----+-----+-----+------+-------+------------------------------------------------";

/// Render one row of the `--debug` step table.
pub fn debug_table_row(event: &StepEvent) -> String {
    use crate::Instruction::*;

    if let Some(fault) = event.fault {
        return format_row(event, &format!("Fault: {fault}; run stopped"));
    }

    let action = match event.instruction {
        Right | Left => format!("Moved pointer head to index {}", event.pointer_after),
        Increment => format!(
            "Increment cell[{}] from {} to {}",
            event.pointer_before, event.cell_before, event.cell_after
        ),
        Decrement => format!(
            "Decrement cell[{}] from {} to {}",
            event.pointer_before, event.cell_before, event.cell_after
        ),
        Output => format!("Output byte {} (suppressed in debug)", event.cell_before),
        Input => "Read byte -> no input in debug (set cell to 0)".to_string(),
        LoopOpen => match event.jump {
            Some(j) => format!("Cell is 0; jump forward to matching ']' at IP {j}"),
            None => "Enter loop (cell != 0)".to_string(),
        },
        LoopClose => match event.jump {
            Some(j) => format!("Jump back to matching '[' at IP {j}"),
            None => "Exit loop".to_string(),
        },
    };

    format_row(event, &action)
}

fn format_row(event: &StepEvent, action: &str) -> String {
    format!(
        "{:<4} | {:<3} | {:<3} | {:<4} |  {}    | {}",
        event.step, event.ip, event.pointer_before, event.cell_before, event.instruction, action
    )
}
