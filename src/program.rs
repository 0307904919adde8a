//! Program loading: filtering raw source text down to the eight legal
//! instructions and checking that its brackets balance.

use std::fmt;

/// Every character the interpreter understands, in no particular order.
pub const LEGAL_INSTRUCTIONS: [char; 8] = ['+', '-', '<', '>', '.', ',', '[', ']'];

/// One decoded instruction symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Increment,
    Decrement,
    Left,
    Right,
    Output,
    Input,
    LoopOpen,
    LoopClose,
}

impl Instruction {
    /// Decode a single character. Anything outside [`LEGAL_INSTRUCTIONS`] yields `None`.
    pub fn from_char(ch: char) -> Option<Self> {
        match ch {
            '+' => Some(Instruction::Increment),
            '-' => Some(Instruction::Decrement),
            '<' => Some(Instruction::Left),
            '>' => Some(Instruction::Right),
            '.' => Some(Instruction::Output),
            ',' => Some(Instruction::Input),
            '[' => Some(Instruction::LoopOpen),
            ']' => Some(Instruction::LoopClose),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Instruction::Increment => '+',
            Instruction::Decrement => '-',
            Instruction::Left => '<',
            Instruction::Right => '>',
            Instruction::Output => '.',
            Instruction::Input => ',',
            Instruction::LoopOpen => '[',
            Instruction::LoopClose => ']',
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// The filtered, immutable instruction sequence a run executes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    instructions: Vec<Instruction>,
}

impl Program {
    /// Keep only legal instruction characters from `source`, preserving order.
    pub fn parse(source: &str) -> Self {
        Self {
            instructions: source.chars().filter_map(Instruction::from_char).collect(),
        }
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Scan left to right with a running depth counter.
    ///
    /// Returns `None` when the brackets balance. Otherwise returns the index of
    /// an offending bracket: the first `]` that drives the depth negative (the
    /// scan stops there), or, when `[` are left open at the end, the last `[`
    /// that raised the depth to its final value and was never closed.
    pub fn check_balance(&self) -> Option<usize> {
        let mut depth: isize = 0;
        // Index of the most recent '[' that raised depth to each level.
        let mut opened_at: Vec<usize> = Vec::new();

        for (i, instr) in self.instructions.iter().enumerate() {
            match instr {
                Instruction::LoopOpen => {
                    depth += 1;
                    opened_at.truncate(depth as usize - 1);
                    opened_at.push(i);
                }
                Instruction::LoopClose => {
                    depth -= 1;
                    if depth < 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
        }

        if depth == 0 {
            None
        } else {
            opened_at.get(depth as usize - 1).copied()
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for instr in &self.instructions {
            write!(f, "{instr}")?;
        }
        Ok(())
    }
}
