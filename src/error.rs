use std::io;
use thiserror::Error;

/// Errors raised while encoding a response.
///
/// Every variant is terminal for the connection: nothing is retried, because a
/// compressor that has consumed part of its input cannot be replayed.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The message sequence broke HTTP request/response pairing.
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),

    /// The compressor failed while encoding or finishing a body.
    #[error("compression failed")]
    Compression(#[source] io::Error),

    /// The compressor failed to close.
    #[error("failed to close compressor")]
    CompressorClose(#[source] io::Error),

    /// The encoder already failed fatally and accepts no further messages.
    #[error("encoder terminated by an earlier fatal error")]
    Terminated,
}

impl From<EncodeError> for io::Error {
    fn from(err: EncodeError) -> Self {
        io::Error::other(err)
    }
}
