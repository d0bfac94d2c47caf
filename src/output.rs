use std::cell::Cell;
use std::io::{self, Write};

use crossterm::QueueableCommand;
use crossterm::cursor::MoveToColumn;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};
use serde::Serialize;

use crate::app::{FetchSummary, ProgressEvent, ProgressSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Progress,
    Quiet,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_summary(summary: &FetchSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

pub struct SilentProgress;

impl ProgressSink for SilentProgress {
    fn event(&self, _event: ProgressEvent) {}
}

#[derive(Default)]
pub struct TerminalProgress {
    drawn: Cell<bool>,
}

impl TerminalProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(&self) {
        if self.drawn.replace(false) {
            eprintln!();
        }
    }

    fn draw(&self, line: &str) -> io::Result<()> {
        let mut stderr = io::stderr();
        stderr
            .queue(MoveToColumn(0))?
            .queue(Clear(ClearType::CurrentLine))?
            .queue(Print(line))?;
        stderr.flush()
    }
}

impl ProgressSink for TerminalProgress {
    fn event(&self, event: ProgressEvent) {
        let line = match event.elapsed {
            Some(elapsed) => format!("{} [{:.1}s]", event.message, elapsed.as_secs_f64()),
            None => event.message,
        };
        if self.draw(&line).is_ok() {
            self.drawn.set(true);
        }
    }
}
