#![forbid(unsafe_code)]
//! ADABAS record modification.
//!
//! Selects records of one file by ISN, by search or by a physical scan and
//! updates or deletes each one in its own transaction:
//!
//! - **Request**: target, selection, mutation and run options
//! - **Session**: `OP`/`CL` bracketing with retry on backed-out opens
//! - **Selector**: single ISN, paged `S1` search or `L2` scan
//! - **Mutator**: `A1`/`E1` followed by `ET`
//! - **Engine**: [`modify_file_records`], the run loop
//! - **Messages**: the final status line
//!
//! Every command goes through the [`adamod_adabas::DirectCall`] seam.

pub mod config;
pub mod engine;
pub mod error;
pub mod messages;
pub mod mutator;
pub mod output;
pub mod progress;
pub mod request;
pub mod selector;
pub mod session;

pub use config::{Config, ConfigError};
pub use engine::{modify_file_records, RunSummary};
pub use error::{AdamodError, ConfigProblem, ConnectionPhase};
pub use messages::status_line;
pub use mutator::RecordMutator;
pub use output::Output;
pub use progress::ProgressReporter;
pub use request::{Mutation, RunRequest, SearchCriterion, Selection, Target};
pub use selector::RecordSelector;
pub use session::Session;
