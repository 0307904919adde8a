//! The interpreter engine.
//!
//! The engine owns a fixed-length tape of wrapping byte cells, three cursors
//! (instruction pointer, memory pointer, loop depth) and two optional
//! capabilities: an input provider consulted by `,` and an output sink fed by
//! `.`. It never returns errors. A run ends in an [`Outcome`]; under the
//! default [`FaultPolicy::Diagnostic`] a faulted run is followed by a built-in
//! diagnostic program that prints the fault through the output sink.
//!
//! Loop jumps are resolved by scanning the program each time, counting
//! brackets against the current loop depth. There is no precomputed jump
//! table.

use std::fmt;

use log::{debug, info, trace};

use crate::diagnostic::{self, FaultPolicy};
use crate::program::{Instruction, Program};

/// Smallest tape the engine will allocate; the diagnostic programs need it.
pub const MIN_MEMORY: usize = 5;

/// Tape length used by [`Engine::default`].
pub const DEFAULT_MEMORY: usize = 30_000;

/// Supplies one byte per `,`. Returning `None` stores 0 in the current cell.
pub type InputProvider = Box<dyn FnMut() -> Option<u8> + Send>;

/// Receives one byte per `.`.
pub type OutputSink = Box<dyn FnMut(u8) + Send>;

/// Called after every dispatched instruction.
pub type StepObserver = Box<dyn FnMut(&StepEvent) + Send>;

/// How a run ended. `at` is the index of the offending instruction in the
/// filtered program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    SyntaxError { at: usize },
    RightOverflow { at: usize },
    LeftOverflow { at: usize },
}

impl Outcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok)
    }

    /// The built-in program that renders this fault, if it is one.
    pub fn diagnostic(&self) -> Option<&'static str> {
        match self {
            Outcome::Ok => None,
            Outcome::SyntaxError { .. } => Some(diagnostic::UNEVEN_BRACKETS),
            Outcome::RightOverflow { .. } => Some(diagnostic::MEMORY_OVERFLOW),
            Outcome::LeftOverflow { .. } => Some(diagnostic::MEMORY_UNDERFLOW),
        }
    }

    /// Index of the offending instruction, if the run faulted.
    pub fn position(&self) -> Option<usize> {
        match *self {
            Outcome::Ok => None,
            Outcome::SyntaxError { at }
            | Outcome::RightOverflow { at }
            | Outcome::LeftOverflow { at } => Some(at),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Ok => write!(f, "completed"),
            Outcome::SyntaxError { at } => write!(f, "uneven brackets at instruction {at}"),
            Outcome::RightOverflow { at } => write!(f, "memory overflow at instruction {at}"),
            Outcome::LeftOverflow { at } => write!(f, "memory underflow at instruction {at}"),
        }
    }
}

/// A snapshot handed to the step observer after one instruction has applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepEvent {
    pub step: usize,
    pub ip: usize,
    pub instruction: Instruction,
    pub pointer_before: usize,
    pub pointer_after: usize,
    pub cell_before: u8,
    pub cell_after: u8,
    /// Bracket the instruction pointer was moved to, for loop jumps.
    pub jump: Option<usize>,
    /// Set on the last event of a run that stopped on this instruction.
    pub fault: Option<Outcome>,
}

/// Tape and cursors. Handlers receive this explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Machine {
    memory: Vec<u8>,
    ip: isize,
    mp: usize,
    depth: usize,
}

impl Machine {
    fn new(memory_size: usize) -> Self {
        Self {
            memory: vec![0; memory_size.max(MIN_MEMORY)],
            ip: -1,
            mp: 0,
            depth: 0,
        }
    }

    fn reset(&mut self, memory_size: Option<usize>) {
        self.rewind();
        self.mp = 0;
        match memory_size {
            Some(size) => self.memory = vec![0; size.max(MIN_MEMORY)],
            None => self.memory.fill(0),
        }
    }

    fn rewind(&mut self) {
        self.ip = -1;
        self.depth = 0;
    }

    fn cell(&self) -> u8 {
        self.memory[self.mp]
    }

    fn cell_mut(&mut self) -> &mut u8 {
        &mut self.memory[self.mp]
    }
}

/// Borrowed I/O capabilities for the duration of one execution.
struct Ports<'a> {
    input: &'a mut Option<InputProvider>,
    output: &'a mut Option<OutputSink>,
}

/// What a handler asks the run loop to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Fault(Outcome),
}

type Handler = fn(&mut Machine, &[Instruction], &mut Ports<'_>) -> Flow;

fn handler_for(instr: Instruction) -> Handler {
    match instr {
        Instruction::Increment => increment,
        Instruction::Decrement => decrement,
        Instruction::Right => move_right,
        Instruction::Left => move_left,
        Instruction::Output => output,
        Instruction::Input => input,
        Instruction::LoopOpen => loop_open,
        Instruction::LoopClose => loop_close,
    }
}

fn increment(m: &mut Machine, _: &[Instruction], _: &mut Ports<'_>) -> Flow {
    let cell = m.cell_mut();
    *cell = cell.wrapping_add(1);
    Flow::Continue
}

fn decrement(m: &mut Machine, _: &[Instruction], _: &mut Ports<'_>) -> Flow {
    let cell = m.cell_mut();
    *cell = cell.wrapping_sub(1);
    Flow::Continue
}

fn move_right(m: &mut Machine, _: &[Instruction], _: &mut Ports<'_>) -> Flow {
    if m.mp + 1 >= m.memory.len() {
        return Flow::Fault(Outcome::RightOverflow { at: m.ip as usize });
    }
    m.mp += 1;
    Flow::Continue
}

fn move_left(m: &mut Machine, _: &[Instruction], _: &mut Ports<'_>) -> Flow {
    if m.mp == 0 {
        return Flow::Fault(Outcome::LeftOverflow { at: m.ip as usize });
    }
    m.mp -= 1;
    Flow::Continue
}

fn output(m: &mut Machine, _: &[Instruction], ports: &mut Ports<'_>) -> Flow {
    if let Some(sink) = ports.output.as_mut() {
        sink(m.cell());
    }
    Flow::Continue
}

fn input(m: &mut Machine, _: &[Instruction], ports: &mut Ports<'_>) -> Flow {
    let byte = ports.input.as_mut().and_then(|provider| provider());
    *m.cell_mut() = byte.unwrap_or(0);
    Flow::Continue
}

fn loop_open(m: &mut Machine, program: &[Instruction], _: &mut Ports<'_>) -> Flow {
    m.depth += 1;
    if m.cell() != 0 {
        return Flow::Continue;
    }

    // Skip the body: walk forward to the ']' that brings depth back down.
    let target = m.depth - 1;
    let mut local = m.depth;
    let mut pos = m.ip as usize;
    while local != target {
        pos += 1;
        match program[pos] {
            Instruction::LoopOpen => local += 1,
            Instruction::LoopClose => local -= 1,
            _ => {}
        }
    }
    trace!("skip loop at {} -> {}", m.ip, pos);
    m.ip = pos as isize;
    m.depth -= 1;
    Flow::Continue
}

fn loop_close(m: &mut Machine, program: &[Instruction], _: &mut Ports<'_>) -> Flow {
    let target = m.depth - 1;
    let mut local = m.depth;
    let mut pos = m.ip as usize;
    while local != target {
        pos -= 1;
        match program[pos] {
            Instruction::LoopOpen => local -= 1,
            Instruction::LoopClose => local += 1,
            _ => {}
        }
    }
    trace!("loop back at {} -> {}", m.ip, pos);
    // Land one before '[' so the next fetch re-tests the loop condition.
    m.ip = pos as isize - 1;
    m.depth -= 1;
    Flow::Continue
}

/// The interpreter.
///
/// ```
/// use std::sync::{Arc, Mutex};
/// use tape_bf::{Engine, Outcome};
///
/// let out = Arc::new(Mutex::new(Vec::new()));
/// let sink = Arc::clone(&out);
///
/// let mut engine = Engine::with_memory(2);
/// engine.set_output_sink(move |b| sink.lock().unwrap().push(b));
///
/// assert_eq!(engine.run("++++++++[>++++++++<-]>."), Outcome::Ok);
/// assert_eq!(*out.lock().unwrap(), vec![64]);
/// ```
pub struct Engine {
    machine: Machine,
    input: Option<InputProvider>,
    output: Option<OutputSink>,
    observer: Option<StepObserver>,
    policy: FaultPolicy,
}

impl Default for Engine {
    fn default() -> Self {
        Self::with_memory(DEFAULT_MEMORY)
    }
}

impl Engine {
    /// Create an engine with the given capabilities. Either may be absent.
    /// The tape gets `max(memory_size, MIN_MEMORY)` zeroed cells.
    pub fn new(input: Option<InputProvider>, output: Option<OutputSink>, memory_size: usize) -> Self {
        Self {
            machine: Machine::new(memory_size),
            input,
            output,
            observer: None,
            policy: FaultPolicy::default(),
        }
    }

    /// Create an engine without capabilities.
    pub fn with_memory(memory_size: usize) -> Self {
        Self::new(None, None, memory_size)
    }

    /// Provide an input provider for `,`. Returning `None` stores 0.
    pub fn set_input_provider<F>(&mut self, provider: F)
    where
        F: FnMut() -> Option<u8> + Send + 'static,
    {
        self.input = Some(Box::new(provider));
    }

    /// Provide an output sink for `.`.
    pub fn set_output_sink<F>(&mut self, sink: F)
    where
        F: FnMut(u8) + Send + 'static,
    {
        self.output = Some(Box::new(sink));
    }

    /// Provide an observer called after each instruction applies.
    pub fn set_step_observer<F>(&mut self, observer: F)
    where
        F: FnMut(&StepEvent) + Send + 'static,
    {
        self.observer = Some(Box::new(observer));
    }

    /// Choose what a faulted `run` does after it stops.
    pub fn set_fault_policy(&mut self, policy: FaultPolicy) {
        self.policy = policy;
    }

    /// The policy applied to faulted runs.
    pub fn fault_policy(&self) -> FaultPolicy {
        self.policy
    }

    /// Rewind all cursors and zero the tape in place.
    pub fn reset(&mut self) {
        self.machine.reset(None);
    }

    /// Rewind all cursors and replace the tape with `max(memory_size, MIN_MEMORY)` zeroed cells.
    pub fn reset_with_memory(&mut self, memory_size: usize) {
        self.machine.reset(Some(memory_size));
    }

    pub fn memory(&self) -> &[u8] {
        &self.machine.memory
    }

    pub fn memory_pointer(&self) -> usize {
        self.machine.mp
    }

    pub fn instruction_pointer(&self) -> isize {
        self.machine.ip
    }

    pub fn loop_depth(&self) -> usize {
        self.machine.depth
    }

    /// Reset, then load and execute `source`.
    pub fn run(&mut self, source: &str) -> Outcome {
        self.run_with_reset(source, true)
    }

    /// Load and execute `source`, resetting first only when `reset_first` is set.
    ///
    /// Without a reset the tape contents and memory pointer carry over from
    /// the previous run. The instruction pointer and loop depth always start
    /// fresh for the new program.
    pub fn run_with_reset(&mut self, source: &str, reset_first: bool) -> Outcome {
        if reset_first {
            self.reset();
        }

        let program = Program::parse(source);
        debug!(
            "run: {} instructions, {} cells, mp={}",
            program.len(),
            self.machine.memory.len(),
            self.machine.mp
        );

        let outcome = self.execute(&program);
        if !outcome.is_ok() {
            info!("run faulted: {outcome}");
            if self.policy == FaultPolicy::Diagnostic {
                self.render_diagnostic(outcome);
            }
        }
        outcome
    }

    /// Execute an already-filtered program against the current tape.
    ///
    /// Validates bracket balance first. A pointer running off either end of
    /// the tape resets the engine; the observer sees that instruction once,
    /// with `fault` set, before the reset. No diagnostic is rendered here.
    pub fn execute(&mut self, program: &Program) -> Outcome {
        self.machine.rewind();

        if let Some(at) = program.check_balance() {
            return Outcome::SyntaxError { at };
        }

        let instructions = program.instructions();
        let mut ports = Ports {
            input: &mut self.input,
            output: &mut self.output,
        };
        let mut step = 0usize;

        loop {
            self.machine.ip += 1;
            // Never negative here: the lowest a jump leaves it is -1.
            let ip = self.machine.ip as usize;
            if ip >= instructions.len() {
                return Outcome::Ok;
            }

            let instr = instructions[ip];
            let (pointer_before, cell_before) = (self.machine.mp, self.machine.cell());

            let fault = match handler_for(instr)(&mut self.machine, instructions, &mut ports) {
                Flow::Continue => None,
                Flow::Fault(outcome) => Some(outcome),
            };

            if let Some(observer) = self.observer.as_mut() {
                let jump = match instr {
                    Instruction::LoopOpen if self.machine.ip != ip as isize => {
                        Some(self.machine.ip as usize)
                    }
                    Instruction::LoopClose => Some((self.machine.ip + 1) as usize),
                    _ => None,
                };
                observer(&StepEvent {
                    step,
                    ip,
                    instruction: instr,
                    pointer_before,
                    pointer_after: self.machine.mp,
                    cell_before,
                    cell_after: self.machine.cell(),
                    jump,
                    fault,
                });
            }

            if let Some(outcome) = fault {
                self.machine.reset(None);
                return outcome;
            }
            step += 1;
        }
    }

    fn render_diagnostic(&mut self, outcome: Outcome) {
        let Some(source) = outcome.diagnostic() else {
            return;
        };
        self.reset();
        // The diagnostic program is not part of the user's run.
        let observer = self.observer.take();
        let rendered = self.execute(&Program::parse(source));
        self.observer = observer;
        debug_assert!(rendered.is_ok(), "diagnostic program faulted: {rendered}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn capture(engine: &mut Engine) -> Arc<Mutex<Vec<u8>>> {
        let out = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&out);
        engine.set_output_sink(move |b| sink.lock().unwrap().push(b));
        out
    }

    fn output_of(out: &Arc<Mutex<Vec<u8>>>) -> Vec<u8> {
        out.lock().unwrap().clone()
    }

    #[test]
    fn balanced_programs_never_print_a_diagnostic() {
        for code in ["", "+-", "[]", "+[-]", "++[>+<-]>.", "+[[-]]", "nothing to see here"] {
            let mut engine = Engine::with_memory(10);
            let out = capture(&mut engine);
            assert_eq!(engine.run(code), Outcome::Ok, "program {code:?}");
            assert!(!output_of(&out).starts_with(b"Error:"), "program {code:?}");
        }
    }

    #[test]
    fn unbalanced_brackets_print_syntax_diagnostic() {
        for (code, at) in [("]", 0), ("[", 0), ("+][", 1), ("[[]", 0), ("+[->+<]]", 7)] {
            let mut engine = Engine::with_memory(10);
            let out = capture(&mut engine);
            assert_eq!(engine.run(code), Outcome::SyntaxError { at }, "program {code:?}");
            assert_eq!(output_of(&out), b"Error: uneven brackets\n");
        }
    }

    #[test]
    fn syntax_error_skips_user_program_entirely() {
        let mut engine = Engine::with_memory(10);
        let out = capture(&mut engine);
        engine.run("+++.[");
        assert_eq!(output_of(&out), b"Error: uneven brackets\n");
        assert!(engine.memory().iter().all(|&c| c == 0));
    }

    #[test]
    fn wrapping_addition() {
        let mut engine = Engine::with_memory(1);
        assert!(engine.run(&"+".repeat(256)).is_ok());
        assert_eq!(engine.memory()[0], 0);
    }

    #[test]
    fn wrapping_subtraction() {
        let mut engine = Engine::with_memory(1);
        assert!(engine.run("-").is_ok());
        assert_eq!(engine.memory()[0], 255);
    }

    #[test]
    fn clear_loop_runs_once_per_unit() {
        let decrements = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&decrements);
        let mut engine = Engine::with_memory(5);
        engine.set_step_observer(move |event| {
            if event.instruction == Instruction::Decrement {
                *counter.lock().unwrap() += 1;
            }
        });

        let value = 37;
        let code = format!("{}[-]", "+".repeat(value));
        assert!(engine.run(&code).is_ok());
        assert_eq!(engine.memory()[0], 0);
        assert_eq!(*decrements.lock().unwrap(), value);
        assert_eq!(engine.loop_depth(), 0);
    }

    #[test]
    fn right_overflow_prints_diagnostic_and_resets_memory() {
        let mut engine = Engine::with_memory(5);
        let out = capture(&mut engine);
        assert_eq!(engine.run("+>+>+>+>+>"), Outcome::RightOverflow { at: 9 });
        assert_eq!(output_of(&out), b"Error: memory overflow\n");
        assert!(engine.memory().iter().all(|&c| c == 0));
    }

    #[test]
    fn five_moves_on_five_cells_overflow() {
        let mut engine = Engine::with_memory(5);
        let out = capture(&mut engine);
        assert_eq!(engine.run(">>>>>"), Outcome::RightOverflow { at: 4 });
        assert_eq!(output_of(&out), b"Error: memory overflow\n");
        assert!(engine.memory().iter().all(|&c| c == 0));
    }

    #[test]
    fn four_moves_on_five_cells_are_fine() {
        let mut engine = Engine::with_memory(5);
        let out = capture(&mut engine);
        assert!(engine.run(">>>>+").is_ok());
        assert_eq!(engine.memory_pointer(), 4);
        assert_eq!(engine.memory()[4], 1);
        assert!(output_of(&out).is_empty());
    }

    #[test]
    fn left_overflow_prints_underflow_diagnostic() {
        let mut engine = Engine::with_memory(10);
        let out = capture(&mut engine);
        assert_eq!(engine.run("+++<"), Outcome::LeftOverflow { at: 3 });
        assert_eq!(output_of(&out), b"Error: memory underflow\n");
        assert!(engine.memory().iter().all(|&c| c == 0));
    }

    #[test]
    fn overflow_abandons_remaining_output() {
        let mut engine = Engine::with_memory(5);
        let out = capture(&mut engine);
        engine.run("+.<+.");
        let mut expected = vec![1u8];
        expected.extend_from_slice(b"Error: memory underflow\n");
        assert_eq!(output_of(&out), expected);
    }

    #[test]
    fn multiplication_loop_prints_product() {
        let mut engine = Engine::with_memory(2);
        engine.set_input_provider(|| None);
        let out = capture(&mut engine);
        assert!(engine.run("++++++++[>++++++++<-]>.").is_ok());
        assert_eq!(output_of(&out), vec![64]);
    }

    #[test]
    fn input_is_echoed() {
        let mut engine = Engine::with_memory(5);
        engine.set_input_provider(|| Some(65));
        let out = capture(&mut engine);
        assert!(engine.run(",.").is_ok());
        assert_eq!(output_of(&out), vec![65]);
    }

    #[test]
    fn missing_input_stores_zero() {
        let mut engine = Engine::with_memory(5);
        assert!(engine.run("+++,").is_ok());
        assert_eq!(engine.memory()[0], 0);

        engine.set_input_provider(|| None);
        assert!(engine.run("+++,").is_ok());
        assert_eq!(engine.memory()[0], 0);
    }

    #[test]
    fn missing_output_is_a_no_op() {
        let mut engine = Engine::with_memory(5);
        assert!(engine.run("+.>++.").is_ok());
        assert_eq!(&engine.memory()[..2], &[1, 2]);
    }

    #[test]
    fn constructor_takes_boxed_capabilities() {
        let out = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&out);
        let mut engine = Engine::new(
            Some(Box::new(|| Some(7u8))),
            Some(Box::new(move |b: u8| sink.lock().unwrap().push(b))),
            0,
        );
        assert!(engine.run(",++.").is_ok());
        assert_eq!(output_of(&out), vec![9]);
    }

    #[test]
    fn nested_loops_multiply() {
        let mut engine = Engine::with_memory(5);
        let out = capture(&mut engine);
        assert!(engine.run("++[>++[>+++<-]<-]>>.").is_ok());
        assert_eq!(output_of(&out), vec![12]);
        assert_eq!(engine.loop_depth(), 0);
    }

    #[test]
    fn nested_loop_on_zero_cell_is_skipped_whole() {
        let mut engine = Engine::with_memory(5);
        let out = capture(&mut engine);
        assert!(engine.run("[[+]+.]+.").is_ok());
        assert_eq!(output_of(&out), vec![1]);
        assert_eq!(engine.loop_depth(), 0);
    }

    #[test]
    fn run_completes_with_pointer_past_end() {
        let mut engine = Engine::with_memory(5);
        assert!(engine.run("+[-]").is_ok());
        assert_eq!(engine.instruction_pointer(), 4);
        assert_eq!(engine.loop_depth(), 0);
    }

    #[test]
    fn memory_size_is_clamped() {
        assert_eq!(Engine::with_memory(0).memory().len(), MIN_MEMORY);
        assert_eq!(Engine::with_memory(3).memory().len(), MIN_MEMORY);
        assert_eq!(Engine::with_memory(12).memory().len(), 12);
        assert_eq!(Engine::default().memory().len(), DEFAULT_MEMORY);
    }

    #[test]
    fn reset_with_memory_reallocates() {
        let mut engine = Engine::with_memory(5);
        engine.run("+>+");
        engine.reset_with_memory(8);
        assert_eq!(engine.memory(), &[0; 8]);
        engine.reset_with_memory(1);
        assert_eq!(engine.memory().len(), MIN_MEMORY);
    }

    #[test]
    fn reset_is_idempotent() {
        let mut engine = Engine::with_memory(6);
        engine.run("+++>++[");
        engine.reset();
        let once = (
            engine.memory().to_vec(),
            engine.instruction_pointer(),
            engine.memory_pointer(),
            engine.loop_depth(),
        );
        engine.reset();
        let twice = (
            engine.memory().to_vec(),
            engine.instruction_pointer(),
            engine.memory_pointer(),
            engine.loop_depth(),
        );
        assert_eq!(once, twice);
        assert_eq!(once, (vec![0; 6], -1, 0, 0));
    }

    #[test]
    fn continuation_keeps_tape_and_memory_pointer() {
        let mut engine = Engine::with_memory(5);
        assert!(engine.run("+++>").is_ok());
        assert!(engine.run_with_reset("++", false).is_ok());
        assert_eq!(&engine.memory()[..2], &[3, 2]);
        assert_eq!(engine.memory_pointer(), 1);
        // The new program ran from its own start.
        assert_eq!(engine.instruction_pointer(), 2);
    }

    #[test]
    fn run_with_reset_first_clears_previous_tape() {
        let mut engine = Engine::with_memory(5);
        engine.run("+++>");
        assert!(engine.run_with_reset("+", true).is_ok());
        assert_eq!(&engine.memory()[..2], &[1, 0]);
        assert_eq!(engine.memory_pointer(), 0);
    }

    #[test]
    fn diagnostic_fits_after_continuation_at_last_cell() {
        let mut engine = Engine::with_memory(5);
        let out = capture(&mut engine);
        assert!(engine.run(">>>>+++").is_ok());
        assert_eq!(engine.run_with_reset("[", false), Outcome::SyntaxError { at: 0 });
        assert_eq!(output_of(&out), b"Error: uneven brackets\n");
    }

    #[test]
    fn report_policy_returns_outcome_silently() {
        let mut engine = Engine::with_memory(5);
        engine.set_fault_policy(FaultPolicy::Report);
        let out = capture(&mut engine);

        assert_eq!(engine.run("]"), Outcome::SyntaxError { at: 0 });
        assert_eq!(engine.run("+<"), Outcome::LeftOverflow { at: 1 });
        assert_eq!(engine.run("+>>>>>"), Outcome::RightOverflow { at: 5 });
        assert!(output_of(&out).is_empty());
        assert!(engine.memory().iter().all(|&c| c == 0));
        assert_eq!(engine.memory_pointer(), 0);
    }

    #[test]
    fn observer_reports_loop_jumps() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let mut engine = Engine::with_memory(5);
        engine.set_step_observer(move |event| sink.lock().unwrap().push(event.clone()));

        assert!(engine.run("+[-]").is_ok());
        let events = events.lock().unwrap();
        let jumps: Vec<(usize, Option<usize>)> = events.iter().map(|e| (e.ip, e.jump)).collect();
        // '+', '[' enters, '-', ']' jumps back to 1, '[' skips to 3.
        assert_eq!(
            jumps,
            vec![(0, None), (1, None), (2, None), (3, Some(1)), (1, Some(3))]
        );
        assert_eq!(events[2].cell_before, 1);
        assert_eq!(events[2].cell_after, 0);
        assert_eq!(events.last().map(|e| e.step), Some(4));
    }

    #[test]
    fn observer_sees_faulting_move_but_not_the_diagnostic() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let mut engine = Engine::with_memory(5);
        engine.set_step_observer(move |event| sink.lock().unwrap().push(event.clone()));
        let out = capture(&mut engine);

        assert_eq!(engine.run(">>>>>"), Outcome::RightOverflow { at: 4 });
        assert_eq!(output_of(&out), b"Error: memory overflow\n");

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 5);
        assert!(events[..4].iter().all(|e| e.fault.is_none()));
        let last = &events[4];
        assert_eq!((last.step, last.ip), (4, 4));
        assert_eq!(last.fault, Some(Outcome::RightOverflow { at: 4 }));
        assert_eq!(last.pointer_before, 4);
        assert_eq!(last.pointer_after, 4);
    }

    #[test]
    fn observer_survives_a_diagnostic() {
        let count = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&count);
        let mut engine = Engine::with_memory(5);
        engine.set_step_observer(move |_| *counter.lock().unwrap() += 1);

        assert_eq!(engine.run("]"), Outcome::SyntaxError { at: 0 });
        assert_eq!(*count.lock().unwrap(), 0);
        assert!(engine.run("++").is_ok());
        assert_eq!(*count.lock().unwrap(), 2);
    }

    #[test]
    fn outcome_exposes_diagnostic_and_position() {
        assert_eq!(Outcome::Ok.diagnostic(), None);
        assert_eq!(Outcome::Ok.position(), None);
        assert_eq!(
            Outcome::RightOverflow { at: 3 }.diagnostic(),
            Some(diagnostic::MEMORY_OVERFLOW)
        );
        assert_eq!(Outcome::LeftOverflow { at: 2 }.position(), Some(2));
        assert_eq!(
            Outcome::SyntaxError { at: 4 }.to_string(),
            "uneven brackets at instruction 4"
        );
    }

    #[test]
    fn engines_are_independent_across_threads() {
        fn assert_send<T: Send>() {}
        assert_send::<Engine>();

        let handles: Vec<_> = (1..=4u8)
            .map(|n| {
                std::thread::spawn(move || {
                    let mut engine = Engine::with_memory(5);
                    engine.run(&"+".repeat(n as usize));
                    engine.memory()[0]
                })
            })
            .collect();
        let results: Vec<u8> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results, vec![1, 2, 3, 4]);
    }
}
