//! Streams step output to the terminal
//!
//! Lines are tagged with their job so output of concurrent jobs stays
//! readable. A separator is printed whenever the output switches to a
//! different job or step.

use crate::environment::OutputStream;
use crate::execution::ExecutionEvent;
use console::style;
use indicatif::ProgressBar;
use std::sync::Mutex;

/// Prints `StepLog` events as they arrive
#[derive(Debug)]
pub struct TerminalOutput {
    progress: Option<ProgressBar>,
    /// Job and step of the last printed line
    last_source: Mutex<Option<(String, usize)>>,
}

impl TerminalOutput {
    /// Print through `progress` when set so the bar is not torn
    pub fn new(progress: Option<ProgressBar>) -> Self {
        Self {
            progress,
            last_source: Mutex::new(None),
        }
    }

    pub fn on_event(&self, event: &ExecutionEvent) {
        if let ExecutionEvent::StepLog {
            job,
            step,
            stream,
            line,
        } = event
        {
            if self.switch_source(job, *step) {
                self.print(&separator(&format!("{} #{}", job, step + 1), terminal_width()));
            }
            self.print(&format_line(job, *stream, line));
        }
    }

    /// Record the line's source; true when it differs from the previous one
    fn switch_source(&self, job: &str, step: usize) -> bool {
        let mut last = self
            .last_source
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let changed = last
            .as_ref()
            .map_or(true, |(last_job, last_step)| last_job != job || *last_step != step);
        if changed {
            *last = Some((job.to_string(), step));
        }
        changed
    }

    fn print(&self, line: &str) {
        match &self.progress {
            Some(progress) => progress.println(line),
            None => println!("{}", line),
        }
    }
}

/// `[job] line`, with stderr lines highlighted
pub fn format_line(job: &str, stream: OutputStream, line: &str) -> String {
    let tag = style(format!("[{}]", job)).dim();
    match stream {
        OutputStream::Stdout => format!("{} {}", tag, line),
        OutputStream::Stderr => format!("{} {}", tag, style(line).yellow()),
    }
}

/// A horizontal rule with a label, `width` columns wide
pub fn separator(label: &str, width: usize) -> String {
    let prefix = format!("── {} ", label);
    let used = prefix.chars().count();
    format!("{}{}", prefix, "─".repeat(width.saturating_sub(used)))
}

fn terminal_width() -> usize {
    term_size::dimensions_stdout()
        .map(|(w, _)| w)
        .unwrap_or(80)
        .min(120)
}
