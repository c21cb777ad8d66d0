//! Database session: `OP` on open, `CL` on close or drop.

use adamod_adabas::{CallBuffers, CommandCode, ControlBlock, DirectCall, ResponseCode};
use tracing::{debug, info, warn};

use crate::error::{AdamodError, ConnectionPhase};
use crate::output::Output;
use crate::request::Target;

/// An open connection to one database, opened for update on one file.
///
/// Every command of a run goes through [`Session::exchange`]. The session
/// is closed exactly once, either by [`Session::close`] or on drop.
pub struct Session<C: DirectCall> {
    call: C,
    target: Target,
    open: bool,
}

impl<C: DirectCall> Session<C> {
    /// Open the target database for update of the target file.
    ///
    /// Response 9 (transaction backed out) is retried until the nucleus
    /// answers otherwise.
    pub fn open(mut call: C, target: Target, out: &mut Output<'_>) -> Result<Self, AdamodError> {
        let open_buffer = format!("UPD={}.", target.file_number);
        let mut retries: u64 = 0;

        loop {
            let buffers = CallBuffers::record(open_buffer.as_bytes());
            let mut cb =
                ControlBlock::new(CommandCode::Op, target.db_id, 0).with_buffer_lengths(&buffers);
            call.call(&mut cb, buffers);

            if cb.response_code.is_transient() {
                retries += 1;
                debug!(db_id = target.db_id, retries, "open backed out, retrying");
                continue;
            }
            if !cb.response_code.is_normal() {
                out.dump(&cb);
                warn!(db_id = target.db_id, response = %cb.response_code, "open failed");
                return Err(AdamodError::Connection {
                    phase: ConnectionPhase::Open,
                    db_id: target.db_id,
                    response: cb.response_code,
                });
            }

            info!(
                db_id = target.db_id,
                file = target.file_number,
                retries,
                "session opened"
            );
            return Ok(Self {
                call,
                target,
                open: true,
            });
        }
    }

    /// Database and file this session addresses.
    pub fn target(&self) -> Target {
        self.target
    }

    /// Send one command and return its response code.
    pub fn exchange(&mut self, cb: &mut ControlBlock, buffers: CallBuffers<'_>) -> ResponseCode {
        self.call.call(cb, buffers);
        debug!(
            command = %String::from_utf8_lossy(&cb.command_code),
            isn = cb.isn,
            response = %cb.response_code,
            "exchange"
        );
        cb.response_code
    }

    /// Close the session and report the outcome of `CL`.
    pub fn close(mut self, out: &mut Output<'_>) -> Result<(), AdamodError> {
        self.open = false;
        let cb = self.send_close();
        if cb.response_code.is_normal() {
            info!(db_id = self.target.db_id, "session closed");
            return Ok(());
        }
        out.dump(&cb);
        warn!(db_id = self.target.db_id, response = %cb.response_code, "close failed");
        Err(AdamodError::Connection {
            phase: ConnectionPhase::Close,
            db_id: self.target.db_id,
            response: cb.response_code,
        })
    }

    fn send_close(&mut self) -> ControlBlock {
        let mut cb = ControlBlock::new(CommandCode::Cl, self.target.db_id, 0);
        self.call.call(&mut cb, CallBuffers::default());
        cb
    }
}

impl<C: DirectCall> Drop for Session<C> {
    fn drop(&mut self) {
        if self.open {
            self.open = false;
            let cb = self.send_close();
            if !cb.response_code.is_normal() {
                warn!(db_id = self.target.db_id, response = %cb.response_code, "close on drop failed");
            }
        }
    }
}
