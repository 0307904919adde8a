//! Built-in diagnostic programs and the policy deciding whether they run.
//!
//! A diagnostic program renders a fault message in the interpreted language
//! itself, through the same output sink the user program writes to. Each one
//! only touches cells 0 and 1, so it fits the smallest allowed tape, and it
//! clears its cells before finishing.

use std::fmt;
use std::str::FromStr;

/// Prints `Error: uneven brackets\n`.
pub const UNEVEN_BRACKETS: &str = ">+++++++[<++++++++++>-]<-.>+++++[<+++++++++>-]<..---.+++.>+++++++[<-------->-]<.>+++++[<----->-]<-.>+++++++[<++++++++++++>-]<+.-------.---------.>++++[<++++>-]<+.>++++[<---->-]<-.+++++++++.>++++++[<------------->-]<.>++++++[<+++++++++++>-]<.>++++[<++++>-]<.>++++[<---->-]<-.++.++++++++.------.+++++++++++++++.-.>+++++++[<--------------->-]<.[-]";

/// Prints `Error: memory overflow\n`.
pub const MEMORY_OVERFLOW: &str = ">+++++++[<++++++++++>-]<-.>+++++[<+++++++++>-]<..---.+++.>+++++++[<-------->-]<.>+++++[<----->-]<-.>+++++++[<+++++++++++>-]<.--------.++++++++.++.+++.+++++++.>++++++++[<----------->-]<-.>++++++++[<++++++++++>-]<-.+++++++.>++++[<---->-]<-.+++++++++++++.------------.++++++.+++.++++++++.>+++++++++[<------------>-]<-.[-]";

/// Prints `Error: memory underflow\n`.
pub const MEMORY_UNDERFLOW: &str = ">+++++++[<++++++++++>-]<-.>+++++[<+++++++++>-]<..---.+++.>+++++++[<-------->-]<.>+++++[<----->-]<-.>+++++++[<+++++++++++>-]<.--------.++++++++.++.+++.+++++++.>++++++++[<----------->-]<-.>+++++++[<++++++++++++>-]<+.-------.----------.+.+++++++++++++.------------.++++++.+++.++++++++.>+++++++++[<------------>-]<-.[-]";

/// What the engine does once a run ends in a fault.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FaultPolicy {
    /// Reset, then run the matching diagnostic program in place of the user's.
    #[default]
    Diagnostic,
    /// Hand the outcome back untouched; the caller decides how to present it.
    Report,
}

impl fmt::Display for FaultPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultPolicy::Diagnostic => write!(f, "diagnostic"),
            FaultPolicy::Report => write!(f, "report"),
        }
    }
}

impl FromStr for FaultPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "diagnostic" => Ok(FaultPolicy::Diagnostic),
            "report" => Ok(FaultPolicy::Report),
            other => Err(format!("invalid fault policy '{other}', must be 'diagnostic' or 'report'")),
        }
    }
}
