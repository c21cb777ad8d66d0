//! Per-record mutation: `A1` or `E1`, then `ET`.

use adamod_adabas::{CallBuffers, CommandCode, ControlBlock, DirectCall, Isn};
use tracing::{debug, warn};

use crate::error::AdamodError;
use crate::output::Output;
use crate::request::Mutation;
use crate::session::Session;

/// Applies one mutation to each selected record and commits it.
#[derive(Debug, Clone)]
pub struct RecordMutator {
    mutation: Mutation,
    dry_run: bool,
}

impl RecordMutator {
    /// Create a mutator.
    pub fn new(mutation: Mutation, dry_run: bool) -> Self {
        Self { mutation, dry_run }
    }

    /// Mutate and commit one record.
    pub fn apply<C: DirectCall>(
        &self,
        session: &mut Session<C>,
        isn: Isn,
        out: &mut Output<'_>,
    ) -> Result<(), AdamodError> {
        out.trace_isn(isn);
        if self.dry_run {
            debug!(isn, "dry run, record left unchanged");
            return Ok(());
        }

        let target = session.target();
        let (command, buffers) = match &self.mutation {
            Mutation::Update {
                format_buffer,
                record_buffer,
            } => (
                CommandCode::A1,
                CallBuffers::update(format_buffer, record_buffer),
            ),
            Mutation::Delete => (CommandCode::E1, CallBuffers::default()),
        };
        let mut cb = ControlBlock::new(command, target.db_id, target.file_number)
            .with_isn(isn)
            .with_buffer_lengths(&buffers);
        if command == CommandCode::A1 {
            cb = cb.with_hold();
        }

        let response = session.exchange(&mut cb, buffers);
        if !response.is_normal() {
            out.dump(&cb);
            warn!(%command, isn, response = %response, "mutation failed");
            return Err(AdamodError::Mutate {
                command,
                isn,
                response,
            });
        }

        let mut et = ControlBlock::new(CommandCode::Et, target.db_id, target.file_number);
        let response = session.exchange(&mut et, CallBuffers::default());
        if !response.is_normal() {
            out.dump(&et);
            warn!(isn, response = %response, "commit failed");
            return Err(AdamodError::Commit { isn, response });
        }
        Ok(())
    }
}
