//! Commands typed at the `xdc>` prompt.

/// One line of user input, parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum UserCommand {
    Run,
    StepInto,
    StepOver,
    StepOut,
    Status,
    Stack,
    Context,
    /// Show one variable from the last context.
    Get(String),
    /// Show the loaded breakpoints.
    Breakpoints,
    Stop,
    Detach,
    Quit,
    Help,
}

pub(crate) const HELP: &str = "\
commands:
  run              continue to the next breakpoint
  into/over/out    step into, over or out of the current statement
  status           show the engine status
  stack            show the call stack
  context          show local variables
  get NAME         show one variable from the last context
  breakpoints      list loaded breakpoints
  stop             stop the script
  detach           let the script run without the debugger
  quit             stop debugging and exit";

impl UserCommand {
    /// Parse an input line. Blank lines give `Ok(None)`.
    pub(crate) fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word {
            "run" | "r" => Self::Run,
            "into" | "i" => Self::StepInto,
            "over" | "o" => Self::StepOver,
            "out" => Self::StepOut,
            "status" => Self::Status,
            "stack" | "bt" => Self::Stack,
            "context" | "c" => Self::Context,
            "get" | "p" => {
                if rest.is_empty() {
                    return Err("usage: get NAME".to_string());
                }
                Self::Get(rest.to_string())
            }
            "breakpoints" | "b" => Self::Breakpoints,
            "stop" => Self::Stop,
            "detach" => Self::Detach,
            "quit" | "q" | "exit" => Self::Quit,
            "help" | "?" => Self::Help,
            other => return Err(format!("unknown command: {other} (try `help`)")),
        };

        if !rest.is_empty() && !matches!(command, Self::Get(_)) {
            return Err(format!("{word} takes no arguments"));
        }
        Ok(Some(command))
    }

    /// Whether the command talks to the engine.
    pub(crate) fn needs_engine(&self) -> bool {
        !matches!(self, Self::Get(_) | Self::Breakpoints | Self::Quit | Self::Help)
    }
}
