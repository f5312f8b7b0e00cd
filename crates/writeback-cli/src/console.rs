//! Terminal reporter and prompter

use crossterm::style::Stylize;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::{self, BufRead, IsTerminal, Write};

use writeback_core::error::{Error, Result};
use writeback_core::report::{Prompter, ReportLevel, Reporter};

/// Writes operator lines to stdout, coloured by level
#[derive(Debug, Default)]
pub struct ConsoleReporter {
    plain: bool,
}

impl ConsoleReporter {
    /// Colour only when stdout is a terminal
    pub fn new() -> Self {
        Self {
            plain: !io::stdout().is_terminal(),
        }
    }
}

impl Reporter for ConsoleReporter {
    fn report(&self, level: ReportLevel, message: &str) {
        let line = match level {
            ReportLevel::Error => format!("ERROR: {}", message),
            _ => message.to_string(),
        };
        match (level, self.plain) {
            (_, true) | (ReportLevel::Info, _) => println!("{}", line),
            (ReportLevel::Success, false) => println!("{}", line.green()),
            (ReportLevel::Error, false) => println!("{}", line.red()),
        }
    }
}

/// Reads operator answers: line editing on a terminal, plain lines when piped
pub enum ConsolePrompter {
    Editor(Box<DefaultEditor>),
    Lines(io::StdinLock<'static>),
}

impl ConsolePrompter {
    pub fn new() -> Result<Self> {
        if io::stdin().is_terminal() {
            let editor = DefaultEditor::new().map_err(readline_error)?;
            Ok(Self::Editor(Box::new(editor)))
        } else {
            Ok(Self::Lines(io::stdin().lock()))
        }
    }

    pub fn is_interactive(&self) -> bool {
        matches!(self, Self::Editor(_))
    }

    /// Wait for the operator before the process exits
    pub fn acknowledge(&mut self) {
        if let Self::Editor(editor) = self {
            println!("Press Enter to quit.");
            let _ = editor.readline("");
        }
    }
}

impl Prompter for ConsolePrompter {
    fn ask(&mut self, prompt: &str) -> Result<String> {
        println!("{}", prompt);
        match self {
            Self::Editor(editor) => match editor.readline("> ") {
                Ok(line) => Ok(line),
                Err(ReadlineError::Interrupted | ReadlineError::Eof) => Err(Error::UserCancelled),
                Err(e) => Err(readline_error(e)),
            },
            Self::Lines(stdin) => {
                io::stdout().flush()?;
                let mut line = String::new();
                if stdin.read_line(&mut line)? == 0 {
                    return Err(Error::UserCancelled);
                }
                Ok(line.trim_end_matches(['\r', '\n']).to_string())
            }
        }
    }
}

fn readline_error(e: ReadlineError) -> Error {
    match e {
        ReadlineError::Io(io) => Error::Io(io),
        other => Error::Io(io::Error::other(other.to_string())),
    }
}
