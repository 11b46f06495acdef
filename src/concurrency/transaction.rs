use std::time::Instant;

use tracing::{debug, warn};

use crate::{
    storage::buffer_pool::BufferPool,
    types::{TransactionId, error::DatabaseError},
};

/// Convenience wrapper around a [`TransactionId`]. The buffer pool remains the
/// coordinator; this only makes the end of a transaction explicit.
#[derive(Debug)]
pub struct Transaction {
    tid: TransactionId,
    started: Instant,
}

impl Transaction {
    pub fn begin() -> Self {
        let tid = TransactionId::new();
        debug!(tid = %tid, "transaction started");
        Self {
            tid,
            started: Instant::now(),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.tid
    }

    /// Flushes the pages this transaction dirtied and releases its locks.
    ///
    /// If the flush fails, the pages not yet written are reverted and the
    /// locks released before the commit error is returned. Pages written
    /// before the failure stay durable: without a log, a failed commit can be
    /// partially applied.
    pub fn commit(self, pool: &BufferPool) -> Result<(), DatabaseError> {
        match pool.transaction_complete(self.tid, true) {
            Ok(()) => {
                debug!(tid = %self.tid, elapsed = ?self.started.elapsed(), "transaction committed");
                Ok(())
            }
            Err(err) => {
                warn!(tid = %self.tid, error = %err, "commit failed, aborting");
                if let Err(abort_err) = pool.transaction_complete(self.tid, false) {
                    warn!(tid = %self.tid, error = %abort_err, "abort after failed commit also failed");
                }
                Err(err)
            }
        }
    }

    pub fn abort(self, pool: &BufferPool) -> Result<(), DatabaseError> {
        pool.transaction_complete(self.tid, false)?;
        debug!(tid = %self.tid, elapsed = ?self.started.elapsed(), "transaction aborted");
        Ok(())
    }
}
