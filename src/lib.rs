//! A tiny eight-instruction tape interpreter.
//!
//! The [`Engine`] runs programs written with `+ - < > . , [ ]` against a
//! fixed-length tape of wrapping byte cells (30,000 by default, never fewer
//! than five). Every other character in the source is ignored.
//!
//! Features and behaviors:
//! - Memory tape initialized to 0; `+` and `-` wrap modulo 256.
//! - `,` asks the input provider for a byte; no provider or no byte stores 0.
//! - `.` hands the current cell to the output sink; no sink means no output.
//! - Faults never surface as errors. Uneven brackets, or the memory pointer
//!   running off either end of the tape, end the run with an [`Outcome`] and,
//!   by default, run a built-in diagnostic program that prints the problem
//!   through the output sink.
//!
//! Quick start:
//!
//! ```no_run
//! use std::io::Write;
//! use tape_bf::Engine;
//!
//! // Classic "Hello World!"
//! let code = "++++++++++[>+++++++>++++++++++>+++>+<<<<-]>++.>+.+++++++..+++.>++.<<+++++++++++++++.>.+++.------.--------.>+.>.";
//! let mut engine = Engine::default();
//! engine.set_output_sink(|b| {
//!     let _ = std::io::stdout().write_all(&[b]);
//! });
//! engine.run(code);
//! println!(); // ensure a trailing newline for readability
//! ```

pub mod cli_util;
pub mod commands;
pub mod config;
pub mod diagnostic;
pub mod engine;
pub mod program;
pub mod repl;

pub use diagnostic::FaultPolicy;
pub use engine::{
    DEFAULT_MEMORY, Engine, InputProvider, MIN_MEMORY, Outcome, OutputSink, StepEvent,
    StepObserver,
};
pub use program::{Instruction, LEGAL_INSTRUCTIONS, Program};
