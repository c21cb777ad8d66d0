//! Scripted direct calls.
//!
//! [`ScriptedCall`] is a [`DirectCall`] that answers from per-command reply
//! queues and records every exchange, so callers of the interface can be
//! exercised without a nucleus.

use std::collections::{HashMap, VecDeque};

use crate::acb::{CallBuffers, CommandCode, ControlBlock, DirectCall, ResponseCode};
use crate::storage::Isn;

// ── Reply ──────────────────────────────────────────────────────────

/// What a scripted call writes back into the control block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reply {
    /// Response code.
    pub response: ResponseCode,
    /// ISN returned in the control block.
    pub isn: Isn,
    /// ISN quantity returned in the control block.
    pub isn_quantity: u32,
    /// ISNs copied into the ISN buffer (truncated to its size).
    pub isns: Vec<Isn>,
}

impl Reply {
    /// A normal response carrying nothing.
    pub fn normal() -> Self {
        Self::default()
    }

    /// A bare response code.
    pub fn response(response: ResponseCode) -> Self {
        Self {
            response,
            ..Self::default()
        }
    }

    /// A normal response returning one ISN (a physical read).
    pub fn isn(isn: Isn) -> Self {
        Self {
            isn,
            ..Self::default()
        }
    }

    /// A normal search response whose quantity equals the ISNs delivered.
    pub fn isns(isns: Vec<Isn>) -> Self {
        let isn_quantity = u32::try_from(isns.len()).unwrap_or(u32::MAX);
        Self {
            isn: isns.first().copied().unwrap_or(0),
            isn_quantity,
            isns,
            ..Self::default()
        }
    }

    /// Override the reported ISN quantity.
    pub fn with_quantity(mut self, isn_quantity: u32) -> Self {
        self.isn_quantity = isn_quantity;
        self
    }
}

// ── CallRecord ─────────────────────────────────────────────────────

/// One recorded exchange: the control block as sent and copies of the
/// input buffers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    /// Control block before the reply was applied.
    pub control_block: ControlBlock,
    /// Response that was returned.
    pub response: ResponseCode,
    /// Format buffer.
    pub format: Vec<u8>,
    /// Record buffer.
    pub record: Vec<u8>,
    /// Search buffer.
    pub search: Vec<u8>,
    /// Value buffer.
    pub value: Vec<u8>,
    /// Number of entries the ISN buffer could hold.
    pub isn_capacity: usize,
}

impl CallRecord {
    /// Decoded command code, if valid.
    pub fn command(&self) -> Option<CommandCode> {
        self.control_block.command().ok()
    }
}

// ── ScriptedCall ───────────────────────────────────────────────────

/// A recording [`DirectCall`] answering from queued replies.
///
/// Commands with an empty queue are answered normally.
#[derive(Debug, Default)]
pub struct ScriptedCall {
    replies: HashMap<CommandCode, VecDeque<Reply>>,
    calls: Vec<CallRecord>,
}

impl ScriptedCall {
    /// Create a script with no queued replies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for a command, builder style.
    pub fn with(mut self, command: CommandCode, reply: Reply) -> Self {
        self.push(command, reply);
        self
    }

    /// Queue several replies for a command, builder style.
    pub fn with_all(mut self, command: CommandCode, replies: impl IntoIterator<Item = Reply>) -> Self {
        for reply in replies {
            self.push(command, reply);
        }
        self
    }

    /// Queue a reply for a command.
    pub fn push(&mut self, command: CommandCode, reply: Reply) {
        self.replies.entry(command).or_default().push_back(reply);
    }

    /// Every recorded exchange in call order.
    pub fn calls(&self) -> &[CallRecord] {
        &self.calls
    }

    /// Command codes in call order.
    pub fn commands(&self) -> Vec<CommandCode> {
        self.calls.iter().filter_map(CallRecord::command).collect()
    }

    /// Number of calls made with a command.
    pub fn count(&self, command: CommandCode) -> usize {
        self.calls
            .iter()
            .filter(|c| c.command() == Some(command))
            .count()
    }

    /// Recorded exchanges for one command.
    pub fn calls_of(&self, command: CommandCode) -> Vec<&CallRecord> {
        self.calls
            .iter()
            .filter(|c| c.command() == Some(command))
            .collect()
    }
}

impl DirectCall for ScriptedCall {
    fn call(&mut self, cb: &mut ControlBlock, buffers: CallBuffers<'_>) {
        let sent = cb.clone();
        let reply = match cb.command() {
            Ok(command) => self
                .replies
                .get_mut(&command)
                .and_then(VecDeque::pop_front)
                .unwrap_or_default(),
            Err(_) => Reply::response(ResponseCode::INVALID_COMMAND),
        };

        let delivered = reply.isns.len().min(buffers.isn.len());
        buffers.isn[..delivered].copy_from_slice(&reply.isns[..delivered]);
        cb.response_code = reply.response;
        cb.isn = reply.isn;
        cb.isn_quantity = reply.isn_quantity;

        self.calls.push(CallRecord {
            control_block: sent,
            response: reply.response,
            format: buffers.format.to_vec(),
            record: buffers.record.to_vec(),
            search: buffers.search.to_vec(),
            value: buffers.value.to_vec(),
            isn_capacity: buffers.isn.len(),
        });
    }
}

// ── Tests ──────────────────────────────────────────────────────────
