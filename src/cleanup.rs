use crate::compressor::Compressor;
use crate::error::EncodeError;

/// Owns a response's compressor and closes it exactly once.
///
/// `close` surfaces the failure to the caller. If the guard is dropped before
/// anyone closed it (connection torn down, body dropped mid-stream), `Drop`
/// closes it and can only log a failure.
pub(crate) struct CompressorGuard {
    compressor: Box<dyn Compressor>,
    closed: bool,
}

impl CompressorGuard {
    pub(crate) fn new(compressor: Box<dyn Compressor>) -> Self {
        Self {
            compressor,
            closed: false,
        }
    }

    pub(crate) fn compressor(&mut self) -> &mut dyn Compressor {
        self.compressor.as_mut()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }

    /// Closes the compressor unless it was already closed.
    ///
    /// A failed close still counts as the one close; it is never retried.
    pub(crate) fn close(&mut self) -> Result<(), EncodeError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.compressor
            .close()
            .map_err(EncodeError::CompressorClose)
    }
}

impl Drop for CompressorGuard {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(err) = self.compressor.close() {
            tracing::warn!(error = %err, "compressor failed to close on teardown");
        }
    }
}

impl std::fmt::Debug for CompressorGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompressorGuard")
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}
