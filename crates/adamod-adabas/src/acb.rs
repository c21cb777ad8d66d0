//! Direct Call Interface: ADABAS Control Block.
//!
//! Provides the control block exchanged on every direct call, the command
//! and response codes it carries, the buffers passed alongside it, format
//! buffer parsing, and the [`DirectCall`] trait that executes a call.

use std::fmt;

use crate::fdt::{Fdt, FieldType};
use crate::storage::Isn;
use crate::AdabasError;

/// Command option 1 value requesting an exclusive hold on the record.
pub const COMMAND_OPTION_HOLD: u8 = b'H';

/// Size in bytes of one entry in an ISN buffer.
pub const ISN_ENTRY_SIZE: usize = 4;

// ── CommandCode ────────────────────────────────────────────────────

/// ADABAS command codes understood by this interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandCode {
    /// OP: Open a user session.
    Op,
    /// CL: Close the user session (implies ET).
    Cl,
    /// L2: Read physical sequential.
    L2,
    /// S1: Find records matching a search buffer.
    S1,
    /// A1: Update a record.
    A1,
    /// E1: Delete a record.
    E1,
    /// ET: End transaction (commit).
    Et,
    /// BT: Backout transaction (rollback).
    Bt,
}

impl CommandCode {
    /// Parse a two-character command code into a `CommandCode`.
    pub fn parse(code: &str) -> Result<Self, AdabasError> {
        match code.to_uppercase().as_str() {
            "OP" => Ok(Self::Op),
            "CL" => Ok(Self::Cl),
            "L2" => Ok(Self::L2),
            "S1" => Ok(Self::S1),
            "A1" => Ok(Self::A1),
            "E1" => Ok(Self::E1),
            "ET" => Ok(Self::Et),
            "BT" => Ok(Self::Bt),
            _ => Err(AdabasError::InvalidCommand {
                code: code.to_string(),
            }),
        }
    }

    /// Return the two-character string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Op => "OP",
            Self::Cl => "CL",
            Self::L2 => "L2",
            Self::S1 => "S1",
            Self::A1 => "A1",
            Self::E1 => "E1",
            Self::Et => "ET",
            Self::Bt => "BT",
        }
    }

    /// The raw bytes placed in a control block.
    pub fn to_bytes(self) -> [u8; 2] {
        let b = self.as_str().as_bytes();
        [b[0], b[1]]
    }
}

impl fmt::Display for CommandCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── ResponseCode ───────────────────────────────────────────────────

/// Response code returned in the control block after a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct ResponseCode(pub u16);

impl ResponseCode {
    /// Command completed normally.
    pub const NORMAL: Self = Self(0);
    /// End of file reached during a sequential read.
    pub const END_OF_FILE: Self = Self(3);
    /// Transaction backed out; the resource is transiently unavailable.
    pub const TRANSACTION_BACKED_OUT: Self = Self(9);
    /// File not loaded, or not opened with the required access.
    pub const FILE_NOT_AVAILABLE: Self = Self(17);
    /// Invalid command code.
    pub const INVALID_COMMAND: Self = Self(22);
    /// Maximum number of ISNs held by one user exceeded.
    pub const HOLD_QUEUE_FULL: Self = Self(47);
    /// Error in the format buffer.
    pub const FORMAT_BUFFER_ERROR: Self = Self(41);
    /// Syntax error in the OP record buffer.
    pub const OPEN_BUFFER_ERROR: Self = Self(50);
    /// Record buffer too short or not decodable.
    pub const RECORD_BUFFER_ERROR: Self = Self(53);
    /// Syntax error in the search buffer.
    pub const SEARCH_BUFFER_SYNTAX: Self = Self(60);
    /// Search buffer refers to an unusable field, or the value buffer is short.
    pub const SEARCH_BUFFER_ERROR: Self = Self(61);
    /// ISN not present in the file.
    pub const ISN_NOT_FOUND: Self = Self(113);
    /// ISN to be updated is not held by this user.
    pub const ISN_NOT_HELD: Self = Self(144);
    /// Nucleus not active for the requested database.
    pub const NUCLEUS_NOT_ACTIVE: Self = Self(148);

    /// Whether the call completed normally.
    pub fn is_normal(self) -> bool {
        self == Self::NORMAL
    }

    /// Whether a sequential read ran past the last record.
    pub fn is_end_of_file(self) -> bool {
        self == Self::END_OF_FILE
    }

    /// Whether the call may succeed when simply repeated.
    pub fn is_transient(self) -> bool {
        self == Self::TRANSACTION_BACKED_OUT
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── ControlBlock ───────────────────────────────────────────────────

/// ADABAS Control Block: the fixed-shape request/response structure of a
/// direct call.
///
/// A fresh block is zero-initialized for every call; only the fields a
/// command needs are filled in before the call, and the nucleus writes the
/// response code (plus ISN / ISN quantity where applicable) back into it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ControlBlock {
    /// Two-character command code.
    pub command_code: [u8; 2],
    /// Command identifier tying sequential commands together.
    pub command_id: [u8; 4],
    /// Database identifier.
    pub db_id: u16,
    /// File number.
    pub file_number: u16,
    /// Response code (set by the call).
    pub response_code: ResponseCode,
    /// ISN addressed by or returned from the call.
    pub isn: Isn,
    /// ISN lower limit: searches return only ISNs above this value.
    pub isn_lower_limit: Isn,
    /// Number of ISNs qualifying for a search.
    pub isn_quantity: u32,
    /// Format buffer length.
    pub format_buffer_length: u16,
    /// Record buffer length.
    pub record_buffer_length: u16,
    /// Search buffer length.
    pub search_buffer_length: u16,
    /// Value buffer length.
    pub value_buffer_length: u16,
    /// ISN buffer length in bytes.
    pub isn_buffer_length: u16,
    /// Command option 1.
    pub command_option_1: u8,
    /// Command option 2.
    pub command_option_2: u8,
}

impl ControlBlock {
    /// Create a zeroed control block for a command addressed to a database and file.
    pub fn new(command: CommandCode, db_id: u16, file_number: u16) -> Self {
        Self {
            command_code: command.to_bytes(),
            db_id,
            file_number,
            ..Self::default()
        }
    }

    /// Decode the command code.
    pub fn command(&self) -> Result<CommandCode, AdabasError> {
        CommandCode::parse(&String::from_utf8_lossy(&self.command_code))
    }

    /// Set the command identifier.
    pub fn with_command_id(mut self, id: [u8; 4]) -> Self {
        self.command_id = id;
        self
    }

    /// Set the ISN.
    pub fn with_isn(mut self, isn: Isn) -> Self {
        self.isn = isn;
        self
    }

    /// Set the ISN lower limit.
    pub fn with_isn_lower_limit(mut self, isn: Isn) -> Self {
        self.isn_lower_limit = isn;
        self
    }

    /// Request an exclusive hold on the addressed record.
    pub fn with_hold(mut self) -> Self {
        self.command_option_1 = COMMAND_OPTION_HOLD;
        self
    }

    /// Fill every buffer length field from the buffers that go with the call.
    pub fn with_buffer_lengths(mut self, buffers: &CallBuffers<'_>) -> Self {
        self.format_buffer_length = clamp_length(buffers.format.len());
        self.record_buffer_length = clamp_length(buffers.record.len());
        self.search_buffer_length = clamp_length(buffers.search.len());
        self.value_buffer_length = clamp_length(buffers.value.len());
        self.isn_buffer_length = clamp_length(buffers.isn.len() * ISN_ENTRY_SIZE);
        self
    }

    /// Whether command option 1 requests a hold.
    pub fn hold_requested(&self) -> bool {
        self.command_option_1 == COMMAND_OPTION_HOLD
    }
}

fn clamp_length(len: usize) -> u16 {
    u16::try_from(len).unwrap_or(u16::MAX)
}

fn printable(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| if b.is_ascii_graphic() { b as char } else { '.' })
        .collect()
}

/// One-line diagnostic dump of the block.
impl fmt::Display for ControlBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ACB cmd={} cid={} db={} file={} rsp={} isn={} isl={} isq={} \
             fbl={} rbl={} sbl={} vbl={} ibl={} cop1={} cop2={}",
            printable(&self.command_code),
            printable(&self.command_id),
            self.db_id,
            self.file_number,
            self.response_code,
            self.isn,
            self.isn_lower_limit,
            self.isn_quantity,
            self.format_buffer_length,
            self.record_buffer_length,
            self.search_buffer_length,
            self.value_buffer_length,
            self.isn_buffer_length,
            printable(&[self.command_option_1]),
            printable(&[self.command_option_2]),
        )
    }
}

// ── CallBuffers ────────────────────────────────────────────────────

/// The buffers passed alongside a control block.
///
/// Format, record, search and value buffers are inputs. The ISN buffer is
/// filled by search commands.
#[derive(Debug, Default)]
pub struct CallBuffers<'a> {
    /// Format buffer.
    pub format: &'a [u8],
    /// Record buffer.
    pub record: &'a [u8],
    /// Search buffer.
    pub search: &'a [u8],
    /// Value buffer.
    pub value: &'a [u8],
    /// ISN buffer.
    pub isn: &'a mut [Isn],
}

impl<'a> CallBuffers<'a> {
    /// Buffers for a command that only needs a record buffer.
    pub fn record(record: &'a [u8]) -> Self {
        Self {
            record,
            ..Self::default()
        }
    }

    /// Buffers for a command that writes fields (format + record buffer).
    pub fn update(format: &'a [u8], record: &'a [u8]) -> Self {
        Self {
            format,
            record,
            ..Self::default()
        }
    }
}

// ── DirectCall ─────────────────────────────────────────────────────

/// Executes ADABAS direct calls.
///
/// A call never fails at the Rust level: the outcome is the response code
/// written into the control block.
pub trait DirectCall {
    /// Execute the command described by `cb`.
    fn call(&mut self, cb: &mut ControlBlock, buffers: CallBuffers<'_>);
}

impl<T: DirectCall + ?Sized> DirectCall for &mut T {
    fn call(&mut self, cb: &mut ControlBlock, buffers: CallBuffers<'_>) {
        (**self).call(cb, buffers);
    }
}

impl<T: DirectCall + ?Sized> DirectCall for Box<T> {
    fn call(&mut self, cb: &mut ControlBlock, buffers: CallBuffers<'_>) {
        (**self).call(cb, buffers);
    }
}

// ── FieldRef ───────────────────────────────────────────────────────

/// A reference to a field within a format buffer specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRef {
    /// The field name (2 characters).
    pub name: String,
    /// Optional length override.
    pub length: Option<u16>,
    /// Optional format override.
    pub format: Option<FieldType>,
}

// ── FormatBuffer ───────────────────────────────────────────────────

/// Parsed format buffer specifying which fields a command writes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FormatBuffer {
    /// The field references in order.
    pub fields: Vec<FieldRef>,
}

impl FormatBuffer {
    /// Parse a format buffer (e.g. `"AA,8,A,AB."`).
    ///
    /// Comma-separated two-character field names, each optionally followed
    /// by a length and a format code, terminated by a period. `"."` alone
    /// selects no fields.
    pub fn parse(spec: &[u8]) -> Result<Self, AdabasError> {
        let text = String::from_utf8_lossy(spec);
        let invalid = || AdabasError::InvalidFormatBuffer {
            spec: text.to_string(),
        };

        let body = text.trim().strip_suffix('.').ok_or_else(invalid)?;
        let mut buffer = Self::default();
        if body.trim().is_empty() {
            return Ok(buffer);
        }

        for token in body.split(',').map(|t| t.trim().to_uppercase()) {
            if is_field_name(&token) {
                buffer.fields.push(FieldRef {
                    name: token,
                    length: None,
                    format: None,
                });
                continue;
            }

            let current = buffer.fields.last_mut().ok_or_else(invalid)?;
            if let Ok(length) = token.parse::<u16>() {
                if length == 0 || current.length.is_some() || current.format.is_some() {
                    return Err(invalid());
                }
                current.length = Some(length);
            } else if let Some(format) = single_char(&token).and_then(FieldType::from_code) {
                if current.format.is_some() {
                    return Err(invalid());
                }
                current.format = Some(format);
            } else {
                return Err(invalid());
            }
        }

        Ok(buffer)
    }

    /// Whether no fields are selected.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Cut a record buffer into `(field, value)` pairs following this format
    /// buffer, with lengths and formats defaulting to the FDT.
    pub fn split_record(
        &self,
        fdt: &Fdt,
        file_number: u16,
        record: &[u8],
    ) -> Result<Vec<(String, String)>, AdabasError> {
        let mut values = Vec::with_capacity(self.fields.len());
        let mut offset = 0usize;

        for field_ref in &self.fields {
            let def = fdt.get_field(&field_ref.name).ok_or_else(|| AdabasError::UnknownField {
                file_number,
                field: field_ref.name.clone(),
            })?;
            let length = usize::from(field_ref.length.unwrap_or(def.length));
            let format = field_ref.format.unwrap_or(def.field_type);

            let end = offset + length;
            if end > record.len() {
                return Err(AdabasError::RecordBufferTooShort {
                    needed: end,
                    available: record.len(),
                });
            }
            let raw = std::str::from_utf8(&record[offset..end]).map_err(|_| {
                AdabasError::InvalidText {
                    field: field_ref.name.clone(),
                }
            })?;
            values.push((field_ref.name.clone(), format.normalize(raw)));
            offset = end;
        }

        Ok(values)
    }
}

/// Whether a token is a two-character field name (`AA`, `B1`).
pub(crate) fn is_field_name(token: &str) -> bool {
    let b = token.as_bytes();
    b.len() == 2 && b[0].is_ascii_alphabetic() && b[1].is_ascii_alphanumeric()
}

pub(crate) fn single_char(token: &str) -> Option<char> {
    let mut chars = token.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

// ── Tests ──────────────────────────────────────────────────────────
