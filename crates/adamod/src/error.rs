//! Error types for adamod.

use std::fmt;

use adamod_adabas::{CommandCode, Isn, ResponseCode};

/// Which end of the session failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// `OP` was rejected.
    Open,
    /// `CL` was rejected.
    Close,
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => f.write_str("open"),
            Self::Close => f.write_str("close"),
        }
    }
}

/// A request that cannot be run, detected before any database call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigProblem {
    /// Generic bad argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// `-t` could not be parsed.
    #[error("invalid target '{0}'")]
    InvalidTarget(String),

    /// ISN outside the valid range.
    #[error("record ISN must be a positive number")]
    InvalidIsn,

    /// Search argument without a `.` or with an empty search buffer.
    #[error("invalid search argument '{0}'")]
    InvalidSearch(String),

    /// Modify argument without a `.` or with an empty format buffer.
    #[error("invalid modify argument '{0}'")]
    InvalidModify(String),

    /// No database id from arguments or configuration.
    #[error("database id must be specified")]
    NoDatabase,

    /// No file number from arguments or configuration.
    #[error("file number must be specified")]
    NoFile,

    /// Page capacity outside 1..=16383.
    #[error("page size {0} is out of range (1..=16383)")]
    InvalidPageSize(u32),
}

/// Errors produced by a run.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum AdamodError {
    /// The request is invalid.
    #[error("configuration error: {0}")]
    #[diagnostic(code(adamod::configuration))]
    Configuration(#[from] ConfigProblem),

    /// Opening or closing the database failed.
    #[error("cannot {phase} database {db_id}: response {response}")]
    #[diagnostic(code(adamod::connection))]
    Connection {
        /// Open or close.
        phase: ConnectionPhase,
        /// Database addressed.
        db_id: u16,
        /// Response code returned.
        response: ResponseCode,
    },

    /// `S1` failed.
    #[error("search failed: response {response}")]
    #[diagnostic(code(adamod::select))]
    Select {
        /// Response code returned.
        response: ResponseCode,
    },

    /// `L2` failed with something other than end of file.
    #[error("sequential read failed: response {response}")]
    #[diagnostic(code(adamod::scan))]
    Scan {
        /// Response code returned.
        response: ResponseCode,
    },

    /// `A1` or `E1` failed.
    #[error("{command} of ISN {isn} failed: response {response}")]
    #[diagnostic(code(adamod::mutate))]
    Mutate {
        /// A1 or E1.
        command: CommandCode,
        /// Record addressed.
        isn: Isn,
        /// Response code returned.
        response: ResponseCode,
    },

    /// `ET` after a successful mutation failed.
    #[error("commit after ISN {isn} failed: response {response}")]
    #[diagnostic(code(adamod::commit))]
    Commit {
        /// Record just mutated.
        isn: Isn,
        /// Response code returned.
        response: ResponseCode,
    },
}

impl AdamodError {
    /// Status code shown in brackets on the final status line.
    pub fn message_code(&self) -> u16 {
        match self {
            Self::Configuration(problem) => match problem {
                ConfigProblem::InvalidArgument(_) | ConfigProblem::InvalidPageSize(_) => 2,
                ConfigProblem::InvalidTarget(_) => 3,
                ConfigProblem::InvalidIsn => 4,
                ConfigProblem::InvalidSearch(_) => 5,
                ConfigProblem::InvalidModify(_) => 6,
                ConfigProblem::NoDatabase => 7,
                ConfigProblem::NoFile => 8,
            },
            Self::Connection {
                phase: ConnectionPhase::Open,
                ..
            } => 11,
            Self::Connection {
                phase: ConnectionPhase::Close,
                ..
            } => 12,
            Self::Mutate { .. } => 13,
            Self::Select { .. } => 14,
            Self::Scan { .. } => 15,
            Self::Commit { .. } => 16,
        }
    }

    /// Response code reported by the database, if the error came from a call.
    pub fn response(&self) -> Option<ResponseCode> {
        match self {
            Self::Configuration(_) => None,
            Self::Connection { response, .. }
            | Self::Select { response }
            | Self::Scan { response }
            | Self::Mutate { response, .. }
            | Self::Commit { response, .. } => Some(*response),
        }
    }
}
