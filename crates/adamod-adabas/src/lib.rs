#![forbid(unsafe_code)]
//! ADABAS direct call interface.
//!
//! This crate provides:
//!
//! - **Control Block (ACB)**: command codes, response codes, buffer lengths
//! - **Direct Call seam**: the [`DirectCall`] trait every command goes through
//! - **Storage & FDT**: Data Storage, Address Converter, field definitions
//! - **Format & Search Buffers**: parsing and evaluation against a file
//! - **Transactions**: hold queue and backout log
//! - **Nucleus**: an in-process nucleus executing OP/CL/L2/S1/A1/E1/ET/BT
//! - **Utilities**: ADASAV-style JSON database images
//! - **Scripted calls**: a recording [`DirectCall`] double for tests

pub mod acb;
pub mod fdt;
pub mod nucleus;
pub mod script;
pub mod search;
pub mod storage;
pub mod transaction;
pub mod utilities;

// ── Re-exports ─────────────────────────────────────────────────────

pub use acb::{
    CallBuffers, CommandCode, ControlBlock, DirectCall, FieldRef, FormatBuffer, ResponseCode,
    COMMAND_OPTION_HOLD, ISN_ENTRY_SIZE,
};
pub use fdt::{Fdt, FieldDef, FieldType};
pub use nucleus::{Nucleus, NucleusParams};
pub use script::{CallRecord, Reply, ScriptedCall};
pub use search::{Isnlist, LogicalOp, SearchBuffer, SearchCriteria, SearchOperator};
pub use storage::{AdabasFile, Isn, Rabn, Record};
pub use transaction::{HoldQueue, TransactionLog};
pub use utilities::{DatabaseImage, FileImage, RecordImage};

// ── Error ──────────────────────────────────────────────────────────

/// Errors produced by the ADABAS subsystem.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum AdabasError {
    /// ISN not found in the address converter.
    #[error("ISN {isn} not found")]
    IsnNotFound {
        /// The ISN that was not found.
        isn: Isn,
    },

    /// ISN already present in a file.
    #[error("duplicate ISN {isn} in file {file_number}")]
    DuplicateIsn {
        /// The file number.
        file_number: u16,
        /// The duplicate ISN.
        isn: Isn,
    },

    /// ISN zero is reserved.
    #[error("ISN 0 is not a valid record identifier")]
    ZeroIsn,

    /// Duplicate field name in FDT.
    #[error("duplicate field '{name}' in FDT")]
    DuplicateField {
        /// The duplicate field name.
        name: String,
    },

    /// Field not defined in the file's FDT.
    #[error("field '{field}' is not defined in file {file_number}")]
    UnknownField {
        /// The file number.
        file_number: u16,
        /// The unknown field name.
        field: String,
    },

    /// Field is not a descriptor and cannot be searched.
    #[error("field '{field}' is not a descriptor")]
    NotDescriptor {
        /// The field name.
        field: String,
    },

    /// Invalid ACB command code.
    #[error("invalid command code '{code}'")]
    InvalidCommand {
        /// The invalid code.
        code: String,
    },

    /// Invalid format buffer specification.
    #[error("invalid format buffer: '{spec}'")]
    #[diagnostic(code(adabas::format_buffer))]
    InvalidFormatBuffer {
        /// The invalid specification.
        spec: String,
    },

    /// Invalid search buffer specification.
    #[error("invalid search buffer: '{spec}'")]
    #[diagnostic(code(adabas::search_buffer))]
    InvalidSearchBuffer {
        /// The invalid specification.
        spec: String,
    },

    /// Invalid search operator.
    #[error("invalid search operator '{op}'")]
    InvalidSearchOperator {
        /// The invalid operator.
        op: String,
    },

    /// Invalid OP record buffer.
    #[error("invalid open record buffer: '{spec}'")]
    InvalidOpenBuffer {
        /// The invalid specification.
        spec: String,
    },

    /// Record buffer shorter than the format buffer requires.
    #[error("record buffer too short: {needed} bytes needed, {available} available")]
    RecordBufferTooShort {
        /// Bytes needed.
        needed: usize,
        /// Bytes available.
        available: usize,
    },

    /// Value buffer shorter than the search buffer requires.
    #[error("value buffer too short: {needed} bytes needed, {available} available")]
    ValueBufferTooShort {
        /// Bytes needed.
        needed: usize,
        /// Bytes available.
        available: usize,
    },

    /// Buffer contents are not valid text.
    #[error("buffer for field '{field}' is not valid text")]
    InvalidText {
        /// The field being decoded.
        field: String,
    },

    /// File not found in nucleus.
    #[error("file {file_number} not found")]
    FileNotFound {
        /// The missing file number.
        file_number: u16,
    },

    /// File number outside the valid range.
    #[error("invalid file number {file_number}")]
    InvalidFileNumber {
        /// The invalid file number.
        file_number: u16,
    },

    /// File defined twice in an image.
    #[error("file {file_number} defined more than once")]
    DuplicateFile {
        /// The duplicate file number.
        file_number: u16,
    },

    /// Hold queue is full.
    #[error("hold queue full (max {max})")]
    HoldQueueFull {
        /// The maximum capacity.
        max: usize,
    },

    /// Database image could not be read or written.
    #[error("database image {}: {source}", path.display())]
    #[diagnostic(code(adabas::image_io))]
    ImageIo {
        /// The image path.
        path: std::path::PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Database image is not valid JSON for this layout.
    #[error("database image {} is malformed: {source}", path.display())]
    #[diagnostic(code(adabas::image_format))]
    ImageFormat {
        /// The image path.
        path: std::path::PathBuf,
        /// The underlying parse error.
        #[source]
        source: serde_json::Error,
    },
}

impl AdabasError {
    /// The response code a nucleus reports for this error.
    pub fn response_code(&self) -> ResponseCode {
        match self {
            Self::IsnNotFound { .. } | Self::ZeroIsn => ResponseCode::ISN_NOT_FOUND,
            Self::InvalidCommand { .. } => ResponseCode::INVALID_COMMAND,
            Self::InvalidFormatBuffer { .. }
            | Self::DuplicateField { .. }
            | Self::UnknownField { .. } => ResponseCode::FORMAT_BUFFER_ERROR,
            Self::InvalidSearchBuffer { .. } | Self::InvalidSearchOperator { .. } => {
                ResponseCode::SEARCH_BUFFER_SYNTAX
            }
            Self::NotDescriptor { .. } | Self::ValueBufferTooShort { .. } => {
                ResponseCode::SEARCH_BUFFER_ERROR
            }
            Self::InvalidOpenBuffer { .. } => ResponseCode::OPEN_BUFFER_ERROR,
            Self::RecordBufferTooShort { .. } | Self::InvalidText { .. } => {
                ResponseCode::RECORD_BUFFER_ERROR
            }
            Self::FileNotFound { .. }
            | Self::InvalidFileNumber { .. }
            | Self::DuplicateFile { .. } => ResponseCode::FILE_NOT_AVAILABLE,
            Self::HoldQueueFull { .. } => ResponseCode::HOLD_QUEUE_FULL,
            Self::DuplicateIsn { .. } | Self::ImageIo { .. } | Self::ImageFormat { .. } => {
                ResponseCode::NUCLEUS_NOT_ACTIVE
            }
        }
    }
}
