use crate::cleanup::CompressorGuard;
use crate::compressor::Compressor;
use crate::error::EncodeError;
use crate::negotiate::SkipReason;
use bytes::{Bytes, BytesMut};
use http::HeaderValue;

/// How a response body is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Representation {
    /// Body arrives as separate chunks.
    Streamed,
    /// Body arrives as one buffer together with the head.
    Aggregate,
}

/// Encoding state for a single response, from its head to its last chunk.
///
/// Either the cycle is skipped and never owns a compressor, or it owns
/// exactly one, which is finished and then closed before the cycle ends.
#[derive(Debug)]
pub struct ResponseCycle {
    skip_reason: Option<SkipReason>,
    encoding_label: Option<HeaderValue>,
    compressor: Option<CompressorGuard>,
    representation: Representation,
    finished: bool,
}

impl ResponseCycle {
    pub(crate) fn skipped(reason: SkipReason, representation: Representation) -> Self {
        Self {
            skip_reason: Some(reason),
            encoding_label: None,
            compressor: None,
            representation,
            finished: false,
        }
    }

    pub(crate) fn encoded(
        label: HeaderValue,
        compressor: Box<dyn Compressor>,
        representation: Representation,
    ) -> Self {
        Self {
            skip_reason: None,
            encoding_label: Some(label),
            compressor: Some(CompressorGuard::new(compressor)),
            representation,
            finished: false,
        }
    }

    /// Whether the body passes through untouched.
    pub fn is_skip(&self) -> bool {
        self.compressor.is_none()
    }

    /// Why the body passes through, when it does.
    pub fn skip_reason(&self) -> Option<SkipReason> {
        self.skip_reason
    }

    /// The `Content-Encoding` applied to the body.
    pub fn encoding_label(&self) -> Option<&HeaderValue> {
        self.encoding_label.as_ref()
    }

    /// How the body is delivered.
    pub fn representation(&self) -> Representation {
        self.representation
    }

    /// Whether the last piece of the body has been handled.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Whether the compressor has been closed. Always false for skipped cycles.
    pub fn is_closed(&self) -> bool {
        self.compressor.as_ref().is_some_and(CompressorGuard::is_closed)
    }

    pub(crate) fn mark_finished(&mut self) {
        self.finished = true;
    }

    /// Feeds one piece of body into the compressor.
    pub(crate) fn compress(&mut self, input: Bytes) -> Result<Bytes, EncodeError> {
        match self.compressor.as_mut() {
            Some(guard) => guard
                .compressor()
                .compress(input)
                .map_err(EncodeError::Compression),
            None => Ok(input),
        }
    }

    /// Compresses the last piece of body and appends the compressor's final
    /// output, then finishes the cycle and closes the compressor.
    pub(crate) fn compress_last(&mut self, input: Bytes) -> Result<Bytes, EncodeError> {
        let head = self.compress(input)?;
        let tail = self.finish()?;

        Ok(match (head.is_empty(), tail.is_empty()) {
            (_, true) => head,
            (true, false) => tail,
            (false, false) => {
                let mut merged = BytesMut::with_capacity(head.len() + tail.len());
                merged.extend_from_slice(&head);
                merged.extend_from_slice(&tail);
                merged.freeze()
            }
        })
    }

    /// Flushes the compressor, marks the cycle finished and closes it.
    ///
    /// The compressor is closed even when finishing fails; the finish error
    /// then takes precedence over a close error.
    pub(crate) fn finish(&mut self) -> Result<Bytes, EncodeError> {
        self.finished = true;
        let Some(guard) = self.compressor.as_mut() else {
            return Ok(Bytes::new());
        };

        let compressor = guard.compressor();
        let output = if compressor.is_finished() {
            Ok(Bytes::new())
        } else {
            compressor.finish().map_err(EncodeError::Compression)
        };

        match output {
            Ok(output) => {
                guard.close()?;
                tracing::trace!(
                    encoding = ?self.encoding_label,
                    "response encoding complete"
                );
                Ok(output)
            }
            Err(err) => {
                if let Err(close_err) = guard.close() {
                    tracing::warn!(error = %close_err, "compressor failed to close after finish error");
                }
                Err(err)
            }
        }
    }

    /// Closes the compressor if the cycle still holds an open one.
    pub(crate) fn close(&mut self) -> Result<(), EncodeError> {
        match self.compressor.as_mut() {
            Some(guard) => guard.close(),
            None => Ok(()),
        }
    }
}
