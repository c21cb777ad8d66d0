//! Output sinks for a run.
//!
//! The status stream carries progress, summaries and control block dumps;
//! the trace sink carries one line per mutated ISN. Writes are best effort:
//! a broken sink never changes the outcome of a run.

use std::fmt;
use std::io::Write;

use adamod_adabas::{ControlBlock, Isn};

/// The two sinks plus the verbosity that gates them.
pub struct Output<'a> {
    status: &'a mut dyn Write,
    trace: &'a mut dyn Write,
    verbosity: u8,
}

impl<'a> Output<'a> {
    /// Wrap the status and trace sinks.
    pub fn new(status: &'a mut dyn Write, trace: &'a mut dyn Write, verbosity: u8) -> Self {
        Self {
            status,
            trace,
            verbosity,
        }
    }

    /// Configured verbosity.
    pub fn verbosity(&self) -> u8 {
        self.verbosity
    }

    /// Write a full line to the status stream when verbosity allows it.
    pub fn status_line(&mut self, min_verbosity: u8, args: fmt::Arguments<'_>) {
        if self.verbosity >= min_verbosity {
            let _ = writeln!(self.status, "{args}");
        }
    }

    /// Write text without a newline and flush (running counters).
    pub fn status_inline(&mut self, min_verbosity: u8, args: fmt::Arguments<'_>) {
        if self.verbosity >= min_verbosity {
            let _ = write!(self.status, "{args}");
            let _ = self.status.flush();
        }
    }

    /// Dump a failed control block (verbosity ≥ 1).
    pub fn dump(&mut self, cb: &ControlBlock) {
        self.status_line(1, format_args!("{cb}"));
    }

    /// Record an ISN on the trace sink (verbosity ≥ 3).
    pub fn trace_isn(&mut self, isn: Isn) {
        if self.verbosity > 2 {
            let _ = writeln!(self.trace, "{isn}");
        }
    }
}

impl fmt::Debug for Output<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Output")
            .field("verbosity", &self.verbosity)
            .finish_non_exhaustive()
    }
}
