//! Message table for the final status line.

use crate::engine::RunSummary;
use crate::error::AdamodError;

/// Status code of a successful run.
pub const SUCCESS: u16 = 0;

const MESSAGES: &[(u16, &str)] = &[
    (2, "Error: invalid argument specified"),
    (3, "Error: invalid Adabas target specified"),
    (4, "Error: record ISN must be specified"),
    (5, "Error: invalid search or value buffer specified"),
    (6, "Error: invalid format or record buffer specified"),
    (7, "Error: Adabas database must be specified"),
    (8, "Error: Adabas file must be specified"),
    (11, "Error: can't open Adabas database"),
    (12, "Error: can't close Adabas database"),
    (13, "Error: record modification failed"),
    (14, "Error: record search failed"),
    (15, "Error: sequential file read failed"),
    (16, "Error: transaction commit failed"),
];

/// Text for a status code, if the table has one.
pub fn message_text(code: u16) -> Option<&'static str> {
    MESSAGES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, text)| *text)
}

/// The single line printed at the end of a run: `<text> [<code>].`
pub fn status_line(result: &Result<RunSummary, AdamodError>) -> String {
    match result {
        Ok(summary) => format!("Records processed: {} [{SUCCESS}].", summary.processed),
        Err(err) => {
            let code = err.message_code();
            let text = message_text(code).unwrap_or("Error: unknown failure");
            format!("{text} [{code}].")
        }
    }
}
