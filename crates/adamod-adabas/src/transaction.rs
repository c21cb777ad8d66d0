//! ADA-107: Transaction Management.
//!
//! Provides the hold queue and the before-image log that ET (end
//! transaction) discards and BT (backout transaction) replays.

use std::collections::HashSet;

use crate::storage::{Isn, Rabn, Record};
use crate::AdabasError;

// ── TransactionLogEntry ────────────────────────────────────────────

/// An entry in the transaction log recording a before-image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionLogEntry {
    /// The file number.
    pub file_number: u16,
    /// The ISN affected.
    pub isn: Isn,
    /// The operation type.
    pub operation: LogOperation,
    /// Record contents before the modification.
    pub before_image: Record,
}

/// The type of operation logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOperation {
    /// An existing record was updated.
    Update,
    /// A record was deleted from the given RABN.
    Delete {
        /// Physical position the record occupied.
        rabn: Rabn,
    },
}

// ── TransactionLog ─────────────────────────────────────────────────

/// Transaction log: before-images for rollback support.
#[derive(Debug, Clone, Default)]
pub struct TransactionLog {
    /// Entries in chronological order.
    entries: Vec<TransactionLogEntry>,
}

impl TransactionLog {
    /// Create a new transaction log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Log an update operation.
    pub fn log_update(&mut self, file_number: u16, isn: Isn, before_image: Record) {
        self.entries.push(TransactionLogEntry {
            file_number,
            isn,
            operation: LogOperation::Update,
            before_image,
        });
    }

    /// Log a delete operation.
    pub fn log_delete(&mut self, file_number: u16, isn: Isn, rabn: Rabn, before_image: Record) {
        self.entries.push(TransactionLogEntry {
            file_number,
            isn,
            operation: LogOperation::Delete { rabn },
            before_image,
        });
    }

    /// Drain the entries newest first, leaving the log empty.
    pub fn drain_for_rollback(&mut self) -> impl Iterator<Item = TransactionLogEntry> + '_ {
        self.entries.drain(..).rev()
    }

    /// Forget every entry (on ET).
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Return the number of log entries.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been logged since the last ET/BT.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ── HoldQueue ──────────────────────────────────────────────────────

/// Records held for update during a transaction.
#[derive(Debug, Clone)]
pub struct HoldQueue {
    /// Set of (file_number, ISN) pairs currently held.
    held: HashSet<(u16, Isn)>,
    /// Maximum number of records that can be held.
    max_holds: usize,
}

impl HoldQueue {
    /// Create a new hold queue with a maximum capacity.
    pub fn new(max_holds: usize) -> Self {
        Self {
            held: HashSet::new(),
            max_holds,
        }
    }

    /// Place a hold on a record. Holding an already-held record is a no-op.
    pub fn hold(&mut self, file_number: u16, isn: Isn) -> Result<(), AdabasError> {
        if self.is_held(file_number, isn) {
            return Ok(());
        }
        if self.held.len() >= self.max_holds {
            return Err(AdabasError::HoldQueueFull {
                max: self.max_holds,
            });
        }
        self.held.insert((file_number, isn));
        Ok(())
    }

    /// Check whether a record is currently held.
    pub fn is_held(&self, file_number: u16, isn: Isn) -> bool {
        self.held.contains(&(file_number, isn))
    }

    /// Release all holds (on ET or BT).
    pub fn release_all(&mut self) {
        self.held.clear();
    }
}

// ── Tests ──────────────────────────────────────────────────────────
