//! The record modification run: open, select, mutate, close.

use std::io::Write;
use std::time::{Duration, Instant};

use adamod_adabas::DirectCall;
use tracing::{info, warn};

use crate::error::AdamodError;
use crate::mutator::RecordMutator;
use crate::output::Output;
use crate::progress::ProgressReporter;
use crate::request::{RunRequest, Selection};
use crate::selector::RecordSelector;
use crate::session::Session;

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Records mutated (or, under dry run, selected).
    pub processed: u64,
    /// ISN quantity of the first search page, for search runs.
    pub found: Option<u32>,
    /// Wall time spent selecting and mutating.
    pub elapsed: Duration,
}

/// Apply the request's mutation to every selected record.
///
/// Records are processed one at a time, each committed on its own; the
/// first failure stops the run. The session is closed on every path after
/// a successful open, and a failed close replaces the run's result.
pub fn modify_file_records<C: DirectCall>(
    request: &RunRequest,
    call: C,
    status: &mut dyn Write,
    trace: &mut dyn Write,
) -> Result<RunSummary, AdamodError> {
    let mut out = Output::new(status, trace, request.verbosity);
    info!(
        db_id = request.target.db_id,
        file = request.target.file_number,
        dry_run = request.dry_run,
        "run started"
    );

    let selector = RecordSelector::new(&request.selection, request.page_capacity)?;
    let mut session = Session::open(call, request.target, &mut out)?;
    let result = process(request, selector, &mut session, &mut out);

    match session.close(&mut out) {
        Ok(()) => result,
        Err(close_error) => {
            if let Err(superseded) = &result {
                warn!(error = %superseded, "error superseded by close failure");
            }
            Err(close_error)
        }
    }
}

fn process<C: DirectCall>(
    request: &RunRequest,
    mut selector: RecordSelector,
    session: &mut Session<C>,
    out: &mut Output<'_>,
) -> Result<RunSummary, AdamodError> {
    let started = Instant::now();
    let mutator = RecordMutator::new(request.mutation.clone(), request.dry_run);
    // Single-ISN runs print no progress.
    let report = !matches!(request.selection, Selection::ByIdentifier(_));
    let mut progress = ProgressReporter::start(started);

    let mut processed: u64 = 0;
    while let Some(isn) = selector.next_isn(session, out)? {
        mutator.apply(session, isn, out)?;
        processed += 1;
        if report {
            progress.tick(processed, Instant::now(), out);
        }
    }

    let elapsed = if report {
        progress.finish(processed, Instant::now(), out)
    } else {
        started.elapsed()
    };
    info!(
        processed,
        pages = selector.pages_fetched(),
        elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        "run finished"
    );
    Ok(RunSummary {
        processed,
        found: selector.found(),
        elapsed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigProblem;
    use crate::request::{Mutation, SearchCriterion, Target};
    use adamod_adabas::{CommandCode, Reply, ResponseCode, ScriptedCall};

    fn request(selection: Selection) -> RunRequest {
        RunRequest::new(Target::new(12, 5).unwrap(), selection, Mutation::Delete)
    }

    #[test]
    fn identifier_run_prints_no_summary() {
        let mut script = ScriptedCall::new();
        let (mut status, mut trace) = (Vec::new(), Vec::new());
        let req = request(Selection::ByIdentifier(777)).with_verbosity(1);
        let summary = modify_file_records(&req, &mut script, &mut status, &mut trace).unwrap();
        assert_eq!(summary.processed, 1);
        assert!(status.is_empty());
    }

    #[test]
    fn search_run_prints_summary() {
        let mut script = ScriptedCall::new().with(CommandCode::S1, Reply::isns(vec![3, 8]));
        let (mut status, mut trace) = (Vec::new(), Vec::new());
        let req = request(Selection::BySearch(SearchCriterion::parse("AA.X").unwrap()))
            .with_verbosity(1);
        let summary = modify_file_records(&req, &mut script, &mut status, &mut trace).unwrap();
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.found, Some(2));
        let text = String::from_utf8(status).unwrap();
        assert!(text.starts_with("Found records: 2\nProcessed records: 2\nDone in 0:00:0"));
    }

    #[test]
    fn close_failure_replaces_earlier_error() {
        let mut script = ScriptedCall::new()
            .with(CommandCode::E1, Reply::response(ResponseCode::ISN_NOT_FOUND))
            .with(CommandCode::Cl, Reply::response(ResponseCode::NUCLEUS_NOT_ACTIVE));
        let (mut status, mut trace) = (Vec::new(), Vec::new());
        let err = modify_file_records(
            &request(Selection::ByIdentifier(1)),
            &mut script,
            &mut status,
            &mut trace,
        )
        .unwrap_err();
        assert_eq!(err.message_code(), 12);
        assert_eq!(script.count(CommandCode::Cl), 1);
    }

    #[test]
    fn zero_page_capacity_fails_before_open() {
        let mut script = ScriptedCall::new();
        let (mut status, mut trace) = (Vec::new(), Vec::new());
        let mut req = request(Selection::BySearch(SearchCriterion::parse("AA.X").unwrap()));
        req.page_capacity = 0;
        let err = modify_file_records(&req, &mut script, &mut status, &mut trace).unwrap_err();
        assert!(matches!(
            err,
            AdamodError::Configuration(ConfigProblem::InvalidPageSize(0))
        ));
        assert_eq!(err.message_code(), 2);
        assert!(script.commands().is_empty());
    }
}
