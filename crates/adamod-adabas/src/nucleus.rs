//! ADA-108: Nucleus & Command Log.
//!
//! Provides the in-process database engine (`Nucleus`) that executes direct
//! calls against loaded files, the per-user session state it keeps between
//! calls, the command log (CLOG) and the nucleus parameters.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::{debug, warn};

use crate::acb::{
    CallBuffers, CommandCode, ControlBlock, DirectCall, FormatBuffer, ResponseCode, ISN_ENTRY_SIZE,
};
use crate::search::SearchBuffer;
use crate::storage::{AdabasFile, Isn, Rabn};
use crate::transaction::{HoldQueue, LogOperation, TransactionLog};
use crate::AdabasError;

// ── NucleusParams ──────────────────────────────────────────────────

/// Configuration parameters for the ADABAS nucleus.
#[derive(Debug, Clone)]
pub struct NucleusParams {
    /// Maximum records held per user (NISNHQ).
    pub max_holds: usize,
    /// Whether executed commands are recorded in the command log (off by default).
    pub command_log_enabled: bool,
}

impl NucleusParams {
    /// Create default nucleus parameters.
    pub fn new() -> Self {
        Self {
            max_holds: 1000,
            command_log_enabled: false,
        }
    }

    /// Turn the command log on or off.
    pub fn with_command_log(mut self, enabled: bool) -> Self {
        self.command_log_enabled = enabled;
        self
    }

    /// Set the hold queue limit.
    pub fn with_max_holds(mut self, max_holds: usize) -> Self {
        self.max_holds = max_holds;
        self
    }
}

impl Default for NucleusParams {
    fn default() -> Self {
        Self::new()
    }
}

// ── CommandLog ─────────────────────────────────────────────────────

/// Command log (CLOG): audit trail of all executed commands.
#[derive(Debug, Clone)]
pub struct CommandLog {
    /// Log entries.
    entries: Vec<CommandLogEntry>,
    /// Whether the log is active.
    pub active: bool,
}

/// A single command log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLogEntry {
    /// Sequence number.
    pub sequence: u64,
    /// Command code that was executed.
    pub command_code: String,
    /// File number.
    pub file_number: u16,
    /// ISN involved.
    pub isn: Isn,
    /// Response code returned.
    pub response_code: ResponseCode,
}

impl CommandLog {
    /// Create a new command log.
    pub fn new(active: bool) -> Self {
        Self {
            entries: Vec::new(),
            active,
        }
    }

    /// Record a command execution.
    pub fn record(&mut self, cb: &ControlBlock) {
        if !self.active {
            return;
        }
        let seq = self.entries.len() as u64 + 1;
        self.entries.push(CommandLogEntry {
            sequence: seq,
            command_code: String::from_utf8_lossy(&cb.command_code).into_owned(),
            file_number: cb.file_number,
            isn: cb.isn,
            response_code: cb.response_code,
        });
    }

    /// Return all log entries.
    pub fn entries(&self) -> &[CommandLogEntry] {
        &self.entries
    }

    /// Return the number of entries.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

// ── OpenRequest ────────────────────────────────────────────────────

/// File access requested by an OP record buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct OpenRequest {
    access: BTreeSet<u16>,
    update: BTreeSet<u16>,
}

#[derive(Clone, Copy)]
enum OpenMode {
    Access,
    Update,
}

/// Parse an OP record buffer such as `UPD=12,13;ACC=4.`.
///
/// An empty buffer (or `.`) opens every file for read access.
fn parse_open_buffer(record: &[u8]) -> Result<OpenRequest, AdabasError> {
    let text = String::from_utf8_lossy(record);
    let invalid = || AdabasError::InvalidOpenBuffer {
        spec: text.to_string(),
    };

    let body = text.trim();
    let body = body.strip_suffix('.').unwrap_or(body);
    let mut request = OpenRequest::default();
    let mut mode = None;

    for raw in body.split([',', ';']) {
        let token = raw.trim().to_uppercase();
        if token.is_empty() {
            if body.trim().is_empty() {
                continue;
            }
            return Err(invalid());
        }
        let number = match token.split_once('=') {
            Some((key, rest)) => {
                mode = Some(match key.trim() {
                    "ACC" => OpenMode::Access,
                    "UPD" | "EXU" | "EXF" => OpenMode::Update,
                    _ => return Err(invalid()),
                });
                rest.trim().to_string()
            }
            None => token,
        };
        let file_number = number
            .parse::<u16>()
            .ok()
            .filter(|&n| n > 0)
            .ok_or_else(invalid)?;
        match mode.ok_or_else(invalid)? {
            OpenMode::Access => request.access.insert(file_number),
            OpenMode::Update => request.update.insert(file_number),
        };
    }
    Ok(request)
}

// ── UserSession ────────────────────────────────────────────────────

/// State the nucleus keeps for the (single) user between calls.
#[derive(Debug)]
struct UserSession {
    open: OpenRequest,
    hold_queue: HoldQueue,
    log: TransactionLog,
    /// Last RABN returned per (command id, file) for L2 sequences.
    sequences: HashMap<([u8; 4], u16), Rabn>,
}

impl UserSession {
    fn new(max_holds: usize, open: OpenRequest) -> Self {
        Self {
            open,
            hold_queue: HoldQueue::new(max_holds),
            log: TransactionLog::new(),
            sequences: HashMap::new(),
        }
    }

    fn can_read(&self, file_number: u16) -> bool {
        self.open.access.is_empty()
            || self.open.access.contains(&file_number)
            || self.open.update.contains(&file_number)
    }

    fn can_update(&self, file_number: u16) -> bool {
        self.open.update.contains(&file_number)
    }
}

// ── Nucleus ────────────────────────────────────────────────────────

/// In-process ADABAS database engine answering direct calls.
#[derive(Debug)]
pub struct Nucleus {
    /// Nucleus configuration.
    pub params: NucleusParams,
    /// Command log (audit trail).
    pub command_log: CommandLog,
    db_id: u16,
    files: BTreeMap<u16, AdabasFile>,
    session: Option<UserSession>,
    /// OP calls still to be answered with a transient backout.
    transient_backouts: u32,
    /// Whether any transaction has been committed since load.
    committed: bool,
}

fn rsp(err: AdabasError) -> ResponseCode {
    err.response_code()
}

fn limit(buffer: &[u8], length: u16) -> &[u8] {
    &buffer[..buffer.len().min(usize::from(length))]
}

impl Nucleus {
    /// Create a nucleus for a database with no files loaded.
    pub fn new(db_id: u16, params: NucleusParams) -> Self {
        let log_active = params.command_log_enabled;
        Self {
            params,
            command_log: CommandLog::new(log_active),
            db_id,
            files: BTreeMap::new(),
            session: None,
            transient_backouts: 0,
            committed: false,
        }
    }

    /// Answer the next `count` OP calls with response 9.
    pub fn with_transient_backouts(mut self, count: u32) -> Self {
        self.transient_backouts = count;
        self
    }

    /// The database id this nucleus serves.
    pub fn db_id(&self) -> u16 {
        self.db_id
    }

    /// Load a file into the database.
    pub fn define_file(&mut self, file: AdabasFile) -> Result<(), AdabasError> {
        let file_number = file.file_number;
        if file_number == 0 {
            return Err(AdabasError::InvalidFileNumber { file_number });
        }
        if self.files.contains_key(&file_number) {
            return Err(AdabasError::DuplicateFile { file_number });
        }
        self.files.insert(file_number, file);
        Ok(())
    }

    /// Get a reference to a file.
    pub fn file(&self, file_number: u16) -> Result<&AdabasFile, AdabasError> {
        self.files
            .get(&file_number)
            .ok_or(AdabasError::FileNotFound { file_number })
    }

    /// All loaded files in file-number order.
    pub fn files(&self) -> impl Iterator<Item = &AdabasFile> + '_ {
        self.files.values()
    }

    /// Whether a transaction has been committed since the nucleus was loaded.
    pub fn is_modified(&self) -> bool {
        self.committed
    }

    /// Whether a user session is currently open.
    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    fn execute(&mut self, cb: &mut ControlBlock, buffers: CallBuffers<'_>) -> Result<(), ResponseCode> {
        if cb.db_id != self.db_id {
            return Err(ResponseCode::NUCLEUS_NOT_ACTIVE);
        }
        match cb.command().map_err(rsp)? {
            CommandCode::Op => self.open(limit(buffers.record, cb.record_buffer_length)),
            CommandCode::Cl => {
                self.end_transaction();
                self.session = None;
                Ok(())
            }
            CommandCode::L2 => self.read_physical(cb),
            CommandCode::S1 => self.find(cb, buffers),
            CommandCode::A1 => {
                let format = limit(buffers.format, cb.format_buffer_length);
                let record = limit(buffers.record, cb.record_buffer_length);
                self.update(cb, format, record)
            }
            CommandCode::E1 => self.delete(cb),
            CommandCode::Et => {
                self.end_transaction();
                Ok(())
            }
            CommandCode::Bt => {
                self.backout();
                Ok(())
            }
        }
    }

    fn open(&mut self, record: &[u8]) -> Result<(), ResponseCode> {
        if self.transient_backouts > 0 {
            self.transient_backouts -= 1;
            return Err(ResponseCode::TRANSACTION_BACKED_OUT);
        }
        let request = parse_open_buffer(record).map_err(rsp)?;
        let unknown = request
            .access
            .iter()
            .chain(&request.update)
            .any(|n| !self.files.contains_key(n));
        if unknown {
            return Err(ResponseCode::FILE_NOT_AVAILABLE);
        }
        if self.session.is_some() {
            self.end_transaction();
        }
        self.session = Some(UserSession::new(self.params.max_holds, request));
        Ok(())
    }

    fn read_physical(&mut self, cb: &mut ControlBlock) -> Result<(), ResponseCode> {
        let max_holds = self.params.max_holds;
        let session = self
            .session
            .get_or_insert_with(|| UserSession::new(max_holds, OpenRequest::default()));
        let file = self
            .files
            .get(&cb.file_number)
            .filter(|_| session.can_read(cb.file_number))
            .ok_or(ResponseCode::FILE_NOT_AVAILABLE)?;

        let key = (cb.command_id, cb.file_number);
        let after = session.sequences.get(&key).copied();
        match file.next_physical(after) {
            Some((rabn, isn)) => {
                session.sequences.insert(key, rabn);
                cb.isn = isn;
                Ok(())
            }
            None => {
                session.sequences.remove(&key);
                Err(ResponseCode::END_OF_FILE)
            }
        }
    }

    fn find(&mut self, cb: &mut ControlBlock, mut buffers: CallBuffers<'_>) -> Result<(), ResponseCode> {
        let max_holds = self.params.max_holds;
        let session = self
            .session
            .get_or_insert_with(|| UserSession::new(max_holds, OpenRequest::default()));
        let file = self
            .files
            .get(&cb.file_number)
            .filter(|_| session.can_read(cb.file_number))
            .ok_or(ResponseCode::FILE_NOT_AVAILABLE)?;

        let search = SearchBuffer::parse(
            limit(buffers.search, cb.search_buffer_length),
            limit(buffers.value, cb.value_buffer_length),
            file,
        )
        .map_err(|e| match e {
            // Unknown search fields are value errors, not format errors.
            AdabasError::UnknownField { .. } => ResponseCode::SEARCH_BUFFER_ERROR,
            other => rsp(other),
        })?;
        let found = search.evaluate(file);
        let qualifying = found.above(cb.isn_lower_limit);

        let capacity = buffers
            .isn
            .len()
            .min(usize::from(cb.isn_buffer_length) / ISN_ENTRY_SIZE);
        let delivered = capacity.min(qualifying.len());
        buffers.isn[..delivered].copy_from_slice(&qualifying[..delivered]);

        cb.isn_quantity = u32::try_from(qualifying.len()).unwrap_or(u32::MAX);
        cb.isn = qualifying.first().copied().unwrap_or(0);
        Ok(())
    }

    fn update(&mut self, cb: &ControlBlock, format: &[u8], record: &[u8]) -> Result<(), ResponseCode> {
        let max_holds = self.params.max_holds;
        let session = self
            .session
            .get_or_insert_with(|| UserSession::new(max_holds, OpenRequest::default()));
        let file = self
            .files
            .get_mut(&cb.file_number)
            .filter(|_| session.can_update(cb.file_number))
            .ok_or(ResponseCode::FILE_NOT_AVAILABLE)?;
        if !file.contains(cb.isn) {
            return Err(ResponseCode::ISN_NOT_FOUND);
        }

        if cb.hold_requested() {
            session.hold_queue.hold(cb.file_number, cb.isn).map_err(rsp)?;
        } else if !session.hold_queue.is_held(cb.file_number, cb.isn) {
            return Err(ResponseCode::ISN_NOT_HELD);
        }

        let values = FormatBuffer::parse(format)
            .and_then(|fb| fb.split_record(&file.fdt, cb.file_number, record))
            .map_err(rsp)?;
        let before = file.update_fields(cb.isn, values).map_err(rsp)?;
        session.log.log_update(cb.file_number, cb.isn, before);
        Ok(())
    }

    fn delete(&mut self, cb: &ControlBlock) -> Result<(), ResponseCode> {
        let max_holds = self.params.max_holds;
        let session = self
            .session
            .get_or_insert_with(|| UserSession::new(max_holds, OpenRequest::default()));
        let file = self
            .files
            .get_mut(&cb.file_number)
            .filter(|_| session.can_update(cb.file_number))
            .ok_or(ResponseCode::FILE_NOT_AVAILABLE)?;
        if !file.contains(cb.isn) {
            return Err(ResponseCode::ISN_NOT_FOUND);
        }

        session.hold_queue.hold(cb.file_number, cb.isn).map_err(rsp)?;
        let (rabn, before) = file.delete_record(cb.isn).map_err(rsp)?;
        session.log.log_delete(cb.file_number, cb.isn, rabn, before);
        Ok(())
    }

    fn end_transaction(&mut self) {
        if let Some(session) = self.session.as_mut() {
            if !session.log.is_empty() {
                debug!(entries = session.log.entry_count(), "transaction committed");
                self.committed = true;
            }
            session.log.clear();
            session.hold_queue.release_all();
        }
    }

    fn backout(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        for entry in session.log.drain_for_rollback() {
            let Some(file) = self.files.get_mut(&entry.file_number) else {
                continue;
            };
            match entry.operation {
                LogOperation::Update => {
                    if let Err(e) = file.replace_record(entry.isn, entry.before_image) {
                        warn!(isn = entry.isn, error = %e, "backout could not restore record");
                    }
                }
                LogOperation::Delete { rabn } => {
                    file.restore_record(entry.isn, rabn, entry.before_image);
                }
            }
        }
        session.hold_queue.release_all();
    }
}

impl DirectCall for Nucleus {
    fn call(&mut self, cb: &mut ControlBlock, buffers: CallBuffers<'_>) {
        cb.response_code = match self.execute(cb, buffers) {
            Ok(()) => ResponseCode::NORMAL,
            Err(response) => response,
        };
        debug!(
            command = %String::from_utf8_lossy(&cb.command_code),
            file = cb.file_number,
            isn = cb.isn,
            response = %cb.response_code,
            "nucleus call"
        );
        self.command_log.record(cb);
    }
}

// ── Tests ──────────────────────────────────────────────────────────
