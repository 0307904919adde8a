use std::env;
use std::io::{self, IsTerminal, Write};

use nu_ansi_term::Style;
use reedline::{DefaultPrompt, DefaultPromptSegment, Highlighter, HistoryItem, Signal, StyledText};

use crate::config::{Colors, Settings};
use crate::{Engine, FaultPolicy, Program, cli_util};

/// Cells shown by `:dump`.
const DUMP_WINDOW: usize = 16;

/// One engine shared by every submission of a REPL session.
pub struct Session {
    engine: Engine,
    keep_memory: bool,
}

impl Session {
    pub fn new(settings: &Settings) -> Self {
        let mut engine = Engine::with_memory(settings.memory_size);
        engine.set_fault_policy(settings.on_fault);
        engine.set_input_provider(cli_util::stdin_byte);
        engine.set_output_sink(cli_util::stdout_byte);
        Self { engine, keep_memory: false }
    }

    /// Runs a submission. Output goes to stdout; under the `report` policy a
    /// fault is described on stderr. A newline always follows so the next
    /// prompt begins at column 0.
    pub fn execute(&mut self, code: &str) {
        let outcome = self.engine.run_with_reset(code, !self.keep_memory);
        if self.engine.fault_policy() == FaultPolicy::Report {
            cli_util::print_outcome(None, &Program::parse(code).to_string(), &outcome);
        }
        println!();
        let _ = io::stdout().flush();
    }

    /// Apply a meta command. Returns `false` when the session should end.
    pub fn apply(&mut self, command: MetaCommand) -> bool {
        match command {
            MetaCommand::Exit => return false,
            MetaCommand::Help => eprintln!("{META_HELP}"),
            MetaCommand::Reset => {
                self.engine.reset();
                eprintln!("tape cleared");
            }
            MetaCommand::Keep(on) => {
                self.keep_memory = on;
                eprintln!("keep memory between runs: {}", if on { "on" } else { "off" });
            }
            MetaCommand::Dump => eprintln!("{}", self.dump()),
        }
        let _ = io::stderr().flush();
        true
    }

    /// Page-aligned window of the tape around the memory pointer.
    pub fn dump(&self) -> String {
        let memory = self.engine.memory();
        let ptr = self.engine.memory_pointer();
        let base = ptr - ptr % DUMP_WINDOW;
        let end = (base + DUMP_WINDOW).min(memory.len());

        let cells: Vec<String> = memory[base..end]
            .iter()
            .enumerate()
            .map(|(i, c)| if base + i == ptr { format!("[{c}]") } else { c.to_string() })
            .collect();
        format!("ptr={ptr} cells[{base}..{end}]: {}", cells.join(" "))
    }

    pub fn keeps_memory(&self) -> bool {
        self.keep_memory
    }
}

const META_HELP: &str = r#"Meta commands (line starts with ":")
  :exit            Exit immediately (code 0)
  :help            Show this help
  :reset           Clear the tape and pointers
  :keep on|off     Keep tape contents between runs (default off)
  :dump            Print the tape around the pointer (stderr)"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaCommand {
    Exit,
    Help,
    Reset,
    Keep(bool),
    Dump,
}

/// Parse a submission starting with ':'. `Err` carries a message for the user.
pub fn parse_meta(line: &str) -> Option<Result<MetaCommand, String>> {
    let rest = line.trim().strip_prefix(':')?;
    let mut words = rest.split_whitespace();
    let command = match (words.next(), words.next()) {
        (Some("exit"), None) => Ok(MetaCommand::Exit),
        (Some("help"), None) => Ok(MetaCommand::Help),
        (Some("reset"), None) => Ok(MetaCommand::Reset),
        (Some("dump"), None) => Ok(MetaCommand::Dump),
        (Some("keep"), Some("on")) => Ok(MetaCommand::Keep(true)),
        (Some("keep"), Some("off")) => Ok(MetaCommand::Keep(false)),
        (Some("keep"), _) => Err("usage: :keep on|off".to_string()),
        _ => Err(format!("unknown meta command '{}', try :help", rest.trim())),
    };
    Some(command)
}

pub fn repl_loop(settings: &Settings) -> io::Result<()> {
    let mut editor = init_line_editor(&settings.colors);
    let mut session = Session::new(settings);

    loop {
        let Some(submission) = read_submission_interactive(&mut editor)? else {
            // EOF or editor closed. End the session cleanly.
            println!();
            io::stdout().flush()?;
            return Ok(());
        };

        let trimmed = submission.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(meta) = parse_meta(trimmed) {
            match meta {
                Ok(command) => {
                    if !session.apply(command) {
                        return Ok(());
                    }
                }
                Err(msg) => eprintln!("{msg}"),
            }
            continue;
        }

        session.execute(trimmed);

        // Test hook: if BF_REPL_ONCE=1, exit after one execution
        if env::var("BF_REPL_ONCE").ok().as_deref() == Some("1") {
            return Ok(());
        }
    }
}

fn init_line_editor(colors: &Colors) -> reedline::Reedline {
    use reedline::{
        EditCommand, Emacs, FileBackedHistory, KeyCode, KeyModifiers, Reedline, ReedlineEvent,
        default_emacs_keybindings,
    };

    // Enter inserts a newline; Ctrl+D (Ctrl+Z on Windows) submits the buffer.
    let mut keybindings = default_emacs_keybindings();
    keybindings.add_binding(
        KeyModifiers::NONE,
        KeyCode::Enter,
        ReedlineEvent::Edit(vec![EditCommand::InsertNewline]),
    );
    keybindings.add_binding(KeyModifiers::CONTROL, KeyCode::Char('d'), ReedlineEvent::Submit);
    keybindings.add_binding(KeyModifiers::CONTROL, KeyCode::Char('z'), ReedlineEvent::Submit);

    // Up/down move within the buffer; Alt or Ctrl with them walks history.
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Up, ReedlineEvent::Up);
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Down, ReedlineEvent::Down);
    keybindings.add_binding(KeyModifiers::ALT, KeyCode::Up, ReedlineEvent::PreviousHistory);
    keybindings.add_binding(KeyModifiers::CONTROL, KeyCode::Up, ReedlineEvent::PreviousHistory);
    keybindings.add_binding(KeyModifiers::ALT, KeyCode::Down, ReedlineEvent::NextHistory);
    keybindings.add_binding(KeyModifiers::CONTROL, KeyCode::Down, ReedlineEvent::NextHistory);

    let mut editor = Reedline::create()
        .with_highlighter(Box::new(InstructionHighlighter::new(colors)))
        .with_edit_mode(Box::new(Emacs::new(keybindings)));

    match FileBackedHistory::new(1_000) {
        Ok(history) => editor = editor.with_history(Box::new(history)),
        Err(e) => log::warn!("history disabled: {e}"),
    }

    editor
}

/// Collect all lines until EOF. Empty input or a read error gives `None`.
pub fn read_submission<R: io::BufRead>(stdin: &mut R) -> Option<String> {
    let mut buffer = String::new();

    loop {
        let mut line = String::new();
        match stdin.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => buffer.push_str(&line),
            Err(e) => {
                log::warn!("failed reading submission: {e}");
                return None;
            }
        }
    }

    if buffer.is_empty() { None } else { Some(buffer) }
}

fn read_submission_interactive(editor: &mut reedline::Reedline) -> io::Result<Option<String>> {
    let prompt = DefaultPrompt::new(
        DefaultPromptSegment::Basic("bf".to_string()),
        DefaultPromptSegment::Empty,
    );

    match editor.read_line(&prompt) {
        Ok(Signal::Success(buffer)) => {
            // One history item per submitted program
            if !buffer.trim().is_empty() {
                let _ = editor
                    .history_mut()
                    .save(HistoryItem::from_command_line(buffer.clone()));
            }
            Ok(Some(buffer))
        }
        Ok(Signal::CtrlC) | Ok(Signal::CtrlD) => Ok(None),
        Err(e) => {
            eprintln!("repl: editor error: {e}");
            let _ = io::stderr().flush();
            Ok(None)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplMode {
    Bare,
    Editor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeFlagOverride {
    None,
    Bare,
    Editor,
}

/// Mode resolution: flag, then `BF_REPL_MODE`, then TTY detection on stdin.
pub fn select_mode(flag: ModeFlagOverride) -> Result<ReplMode, String> {
    match flag {
        ModeFlagOverride::Bare => return Ok(ReplMode::Bare),
        ModeFlagOverride::Editor => {
            if !io::stdin().is_terminal() {
                return Err(
                    "cannot start editor: stdin is not a TTY (use --bare or BF_REPL_MODE=bare)"
                        .to_string(),
                );
            }
            return Ok(ReplMode::Editor);
        }
        ModeFlagOverride::None => {}
    }

    if let Ok(val) = env::var("BF_REPL_MODE") {
        return match val.trim().to_ascii_lowercase().as_str() {
            "bare" => Ok(ReplMode::Bare),
            "editor" => {
                if !io::stdin().is_terminal() {
                    return Err(
                        "cannot start editor: stdin is not a TTY (use BF_REPL_MODE=bare)".to_string(),
                    );
                }
                Ok(ReplMode::Editor)
            }
            _ => Err(format!("invalid BF_REPL_MODE value: {val}, must be 'bare' or 'editor'")),
        };
    }

    if io::stdin().is_terminal() {
        Ok(ReplMode::Editor)
    } else {
        Ok(ReplMode::Bare)
    }
}

/// Read stdin to EOF and run it once. Lines starting with ':' are dropped.
pub fn execute_bare_once(settings: &Settings) -> io::Result<()> {
    let mut locked = io::BufReader::new(io::stdin().lock());
    let Some(submission) = read_submission(&mut locked) else {
        return Ok(());
    };
    drop(locked);

    let code: String = submission
        .lines()
        .filter(|line| !line.trim_start().starts_with(':'))
        .collect::<Vec<_>>()
        .join("\n");
    if Program::parse(&code).is_empty() {
        return Ok(());
    }

    Session::new(settings).execute(&code);
    Ok(())
}

/// Colours each instruction character; everything else is dimmed as a comment.
struct InstructionHighlighter {
    colors: Colors,
}

impl InstructionHighlighter {
    fn new(colors: &Colors) -> Self {
        Self { colors: colors.clone() }
    }

    fn style_for(&self, ch: char) -> Style {
        Style::new().fg(self.colors.for_char(ch)).bold()
    }
}

impl Highlighter for InstructionHighlighter {
    fn highlight(&self, line: &str, _cursor: usize) -> StyledText {
        let mut out = StyledText::new();

        for ch in line.chars() {
            let style = self.style_for(ch);
            if let Some((s, run)) = out.buffer.last_mut() {
                if *s == style {
                    run.push(ch);
                    continue;
                }
            }
            out.push((style, ch.to_string()));
        }

        out
    }
}
