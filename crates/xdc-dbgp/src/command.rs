//! DBGp command encoding.
//!
//! A command line has the shape
//! `<command> -i <id>[ <positional>...][ -<flag> <value>...][ -- <base64>]`.
//! Conditional breakpoint and watch expressions travel base64-encoded after
//! the `--` separator so spaces and quotes survive the space-delimited syntax.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// A command waiting to be assigned a transaction id and sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    name: String,
    args: Vec<String>,
    flags: Vec<(String, String)>,
    expression: Option<String>,
}

impl Command {
    /// Start a command with the given name (see [`crate::protocol`]).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            flags: Vec::new(),
            expression: None,
        }
    }

    /// Append a positional argument, rendered verbatim.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append a `-<flag> <value>` pair. Pairs render in insertion order.
    pub fn flag(mut self, flag: impl Into<String>, value: impl ToString) -> Self {
        self.flags.push((flag.into(), value.to_string()));
        self
    }

    /// Attach an expression payload.
    pub fn expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = Some(expression.into());
        self
    }

    /// The command name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Render the wire form for the given transaction id, without the
    /// trailing null terminator.
    pub fn encode(&self, transaction_id: u64) -> String {
        let mut parts = vec![self.name.clone(), format!("-i {transaction_id}")];
        parts.extend(self.args.iter().cloned());
        parts.extend(
            self.flags
                .iter()
                .map(|(flag, value)| format!("-{flag} {value}")),
        );

        let mut line = parts
            .iter()
            .map(|part| part.trim())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        if let Some(expression) = self.expression.as_deref().filter(|e| !e.is_empty()) {
            line.push_str(" -- ");
            line.push_str(&STANDARD.encode(expression.as_bytes()));
        }
        line
    }
}

/// Quote a command argument that contains whitespace or quotes.
///
/// Plain arguments are returned unchanged.
pub fn quote_argument(value: &str) -> String {
    if !value
        .chars()
        .any(|c| c.is_whitespace() || c == '"' || c == '\\')
    {
        return value.to_string();
    }
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}
