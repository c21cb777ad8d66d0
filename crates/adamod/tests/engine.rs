//! End-to-end runs of the modification engine against scripted replies and
//! against the in-process nucleus.

use adamod_adabas::{
    AdabasFile, CommandCode, Fdt, FieldDef, FieldType, Isn, Nucleus, NucleusParams, Record, Reply,
    ResponseCode, ScriptedCall,
};
use adamod_lib::{
    modify_file_records, status_line, AdamodError, Mutation, RunRequest, RunSummary,
    SearchCriterion, Selection, Target,
};

const DB: u16 = 12;
const FILE: u16 = 5;

// ── Helpers ────────────────────────────────────────────────────────

struct Run {
    result: Result<RunSummary, AdamodError>,
    status: String,
    trace: String,
}

fn run<C: adamod_adabas::DirectCall>(request: &RunRequest, call: C) -> Run {
    let (mut status, mut trace) = (Vec::new(), Vec::new());
    let result = modify_file_records(request, call, &mut status, &mut trace);
    Run {
        result,
        status: String::from_utf8(status).unwrap(),
        trace: String::from_utf8(trace).unwrap(),
    }
}

fn target() -> Target {
    Target::new(DB, FILE).unwrap()
}

fn update() -> Mutation {
    Mutation::update("AB,3.002").unwrap()
}

fn smith_search() -> Selection {
    Selection::BySearch(SearchCriterion::parse("AA.SMITH   ").unwrap())
}

/// Nucleus with file 5 holding one record per ISN; every record is a SMITH.
fn nucleus_with(isns: impl IntoIterator<Item = Isn>) -> Nucleus {
    let fdt = Fdt::from_fields([
        FieldDef::new("AA", FieldType::Alpha, 8).with_descriptor(),
        FieldDef::new("AB", FieldType::Unpacked, 3),
    ])
    .unwrap();
    let mut file = AdabasFile::new(FILE, "EMPLOYEES", fdt);
    for isn in isns {
        file.store_record(isn, Record::new().with_field("AA", "SMITH").with_field("AB", "001"))
            .unwrap();
    }
    let mut nucleus = Nucleus::new(DB, NucleusParams::new().with_command_log(true));
    nucleus.define_file(file).unwrap();
    nucleus
}

fn logged(nucleus: &Nucleus, command: &str) -> usize {
    nucleus
        .command_log
        .entries()
        .iter()
        .filter(|e| e.command_code == command)
        .count()
}

// ── Scenarios ──────────────────────────────────────────────────────

#[test]
fn scenario_a_single_isn_update() {
    let request = RunRequest::new(target(), Selection::ByIdentifier(777), update());

    let mut script = ScriptedCall::new();
    let run_result = run(&request, &mut script);
    assert_eq!(run_result.result.as_ref().unwrap().processed, 1);
    assert_eq!(
        script.commands(),
        vec![CommandCode::Op, CommandCode::A1, CommandCode::Et, CommandCode::Cl]
    );

    let mut nucleus = nucleus_with([776, 777, 778]);
    let run_result = run(&request, &mut nucleus);
    assert_eq!(
        status_line(&run_result.result),
        "Records processed: 1 [0]."
    );
    let file = nucleus.file(FILE).unwrap();
    assert_eq!(file.read_record(777).unwrap().get("AB"), Some("002"));
    assert_eq!(file.read_record(776).unwrap().get("AB"), Some("001"));
    assert!(nucleus.is_modified());
    assert!(!nucleus.is_open());
}

#[test]
fn scenario_b_paged_search() {
    let request = RunRequest::new(target(), smith_search(), update())
        .with_page_capacity(1000)
        .unwrap();

    let mut script = ScriptedCall::new().with_all(
        CommandCode::S1,
        [
            Reply::isns((1..=1000).collect()).with_quantity(2500),
            Reply::isns((1001..=2000).collect()).with_quantity(1500),
            Reply::isns((2001..=2500).collect()),
        ],
    );
    let scripted = run(&request, &mut script);
    let summary = scripted.result.unwrap();
    assert_eq!(summary.processed, 2500);
    assert_eq!(summary.found, Some(2500));
    assert_eq!(script.count(CommandCode::S1), 3);
    assert_eq!(script.count(CommandCode::A1), 2500);
    assert_eq!(script.count(CommandCode::Et), 2500);

    let mut nucleus = nucleus_with(1..=2500);
    let emulated = run(&request, &mut nucleus);
    assert_eq!(emulated.result.unwrap().processed, 2500);
    assert_eq!(logged(&nucleus, "S1"), 3);
    let file = nucleus.file(FILE).unwrap();
    assert!(file.physical_records().all(|(_, r)| r.get("AB") == Some("002")));
}

#[test]
fn scenario_c_delete_scan_of_empty_file() {
    let request = RunRequest::new(target(), Selection::FullScan, Mutation::Delete).with_verbosity(1);

    let mut script =
        ScriptedCall::new().with(CommandCode::L2, Reply::response(ResponseCode::END_OF_FILE));
    let scripted = run(&request, &mut script);
    assert_eq!(scripted.result.unwrap().processed, 0);
    assert!(scripted.status.contains("Processed records: 0\n"));

    let mut nucleus = nucleus_with(std::iter::empty());
    let emulated = run(&request, &mut nucleus);
    assert_eq!(status_line(&emulated.result), "Records processed: 0 [0].");
    assert!(!nucleus.is_modified());
}

#[test]
fn scenario_d_close_failure_after_success() {
    let request = RunRequest::new(target(), Selection::ByIdentifier(777), update());
    let mut script =
        ScriptedCall::new().with(CommandCode::Cl, Reply::response(ResponseCode::NUCLEUS_NOT_ACTIVE));
    let run_result = run(&request, &mut script);
    assert!(matches!(
        run_result.result,
        Err(AdamodError::Connection { response, .. }) if response == ResponseCode::NUCLEUS_NOT_ACTIVE
    ));
    assert_eq!(
        status_line(&run_result.result),
        "Error: can't close Adabas database [12]."
    );
}

// ── Properties ─────────────────────────────────────────────────────

#[test]
fn open_retry_ends_after_backouts() {
    let request = RunRequest::new(target(), Selection::ByIdentifier(1), Mutation::Delete);

    let mut script = ScriptedCall::new().with_all(
        CommandCode::Op,
        std::iter::repeat(Reply::response(ResponseCode::TRANSACTION_BACKED_OUT)).take(25),
    );
    assert!(run(&request, &mut script).result.is_ok());
    assert_eq!(script.count(CommandCode::Op), 26);

    let mut nucleus = nucleus_with([1]).with_transient_backouts(3);
    assert!(run(&request, &mut nucleus).result.is_ok());
    assert_eq!(logged(&nucleus, "OP"), 4);
    assert!(nucleus.file(FILE).unwrap().read_record(1).is_err());
}

#[test]
fn open_failure_is_not_followed_by_close() {
    let request = RunRequest::new(
        Target::new(99, FILE).unwrap(),
        Selection::FullScan,
        Mutation::Delete,
    );
    let mut nucleus = nucleus_with([1, 2]);
    let run_result = run(&request, &mut nucleus);
    assert_eq!(
        status_line(&run_result.result),
        "Error: can't open Adabas database [11]."
    );
    assert_eq!(logged(&nucleus, "OP"), 1);
    assert_eq!(logged(&nucleus, "CL"), 0);
}

#[test]
fn pagination_fetch_counts() {
    for (matches, capacity) in [(0u32, 5u16), (7, 3), (6, 3), (5, 5), (4, 10), (1, 1)] {
        let request = RunRequest::new(target(), smith_search(), update())
            .with_page_capacity(u32::from(capacity))
            .unwrap();
        let mut nucleus = nucleus_with(1..=matches);
        let summary = run(&request, &mut nucleus).result.unwrap();
        assert_eq!(summary.processed, u64::from(matches));
        // ⌈M/N⌉ pages, plus one empty page when N divides M.
        let expected = (matches / u32::from(capacity) + 1) as usize;
        assert_eq!(logged(&nucleus, "S1"), expected, "{matches} / {capacity}");
    }
}

#[test]
fn scan_failure_after_k_calls() {
    let request = RunRequest::new(target(), Selection::FullScan, Mutation::Delete);
    let mut script = ScriptedCall::new().with_all(
        CommandCode::L2,
        [
            Reply::isn(10),
            Reply::isn(11),
            Reply::isn(12),
            Reply::response(ResponseCode::FILE_NOT_AVAILABLE),
        ],
    );
    let run_result = run(&request, &mut script);
    assert!(matches!(run_result.result, Err(AdamodError::Scan { .. })));
    assert_eq!(script.count(CommandCode::E1), 3);
    assert_eq!(script.count(CommandCode::Cl), 1);
    assert_eq!(
        status_line(&run_result.result),
        "Error: sequential file read failed [15]."
    );
}

#[test]
fn full_scan_delete_empties_the_file() {
    let request = RunRequest::new(target(), Selection::FullScan, Mutation::Delete);
    let mut nucleus = nucleus_with([30, 10, 20]);
    let summary = run(&request, &mut nucleus).result.unwrap();
    assert_eq!(summary.processed, 3);
    assert_eq!(nucleus.file(FILE).unwrap().record_count(), 0);
    assert_eq!(logged(&nucleus, "ET"), 3);
}

#[test]
fn dry_run_selects_without_mutating() {
    let request = RunRequest::new(target(), smith_search(), Mutation::Delete)
        .with_dry_run(true)
        .with_verbosity(3)
        .with_page_capacity(2)
        .unwrap();
    let mut nucleus = nucleus_with([4, 5, 6, 7, 8]);
    let run_result = run(&request, &mut nucleus);
    assert_eq!(run_result.result.unwrap().processed, 5);
    assert_eq!(run_result.trace, "4\n5\n6\n7\n8\n");
    assert_eq!(logged(&nucleus, "E1"), 0);
    assert_eq!(logged(&nucleus, "ET"), 0);
    assert_eq!(nucleus.file(FILE).unwrap().record_count(), 5);
    assert!(!nucleus.is_modified());
}

#[test]
fn dry_run_scan_reads_to_end_without_mutating() {
    let request = RunRequest::new(target(), Selection::FullScan, Mutation::Delete)
        .with_dry_run(true)
        .with_verbosity(3);
    let mut nucleus = nucleus_with([30, 10, 20]);
    let run_result = run(&request, &mut nucleus);
    assert_eq!(run_result.result.unwrap().processed, 3);
    assert_eq!(run_result.trace, "30\n10\n20\n");
    // Three records plus the end-of-file answer.
    assert_eq!(logged(&nucleus, "L2"), 4);
    for command in ["A1", "E1", "ET"] {
        assert_eq!(logged(&nucleus, command), 0, "{command}");
    }
    assert_eq!(nucleus.file(FILE).unwrap().record_count(), 3);
    assert!(!nucleus.is_modified());
}

#[test]
fn missing_record_fails_without_commit() {
    let request =
        RunRequest::new(target(), Selection::ByIdentifier(999), update()).with_verbosity(1);
    let mut nucleus = nucleus_with([1]);
    let run_result = run(&request, &mut nucleus);
    assert!(matches!(
        run_result.result,
        Err(AdamodError::Mutate { command: CommandCode::A1, isn: 999, response })
            if response == ResponseCode::ISN_NOT_FOUND
    ));
    assert_eq!(logged(&nucleus, "ET"), 0);
    assert_eq!(logged(&nucleus, "CL"), 1);
    assert!(run_result.status.contains("cmd=A1"));
    assert_eq!(
        status_line(&run_result.result),
        "Error: record modification failed [13]."
    );
}

#[test]
fn commit_failure_stops_the_run() {
    let request = RunRequest::new(target(), Selection::FullScan, Mutation::Delete);
    let mut script = ScriptedCall::new()
        .with_all(CommandCode::L2, [Reply::isn(1), Reply::isn(2)])
        .with(CommandCode::Et, Reply::response(ResponseCode::NUCLEUS_NOT_ACTIVE));
    let run_result = run(&request, &mut script);
    assert!(matches!(run_result.result, Err(AdamodError::Commit { isn: 1, .. })));
    assert_eq!(script.count(CommandCode::E1), 1);
    assert_eq!(script.count(CommandCode::L2), 1);
}

#[test]
fn bad_search_buffer_is_select_error() {
    let request = RunRequest::new(
        target(),
        Selection::BySearch(SearchCriterion::parse("AB.001").unwrap()),
        Mutation::Delete,
    );
    let mut nucleus = nucleus_with([1]);
    let run_result = run(&request, &mut nucleus);
    assert!(matches!(run_result.result, Err(AdamodError::Select { .. })));
    assert_eq!(
        status_line(&run_result.result),
        "Error: record search failed [14]."
    );
}
