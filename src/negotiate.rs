use crate::compressor::Compressor;
use crate::cycle::{Representation, ResponseCycle};
use crate::message::ResponseHead;
use crate::tracker::RequestRecord;
use http::{HeaderValue, Version, header};

/// Chooses whether and how to encode a response.
///
/// Called at most once per response, and only after the protocol rules that
/// forbid encoding have been ruled out.
pub trait EncodeDecision {
    /// Returns the encoding label and a fresh compressor, or `None` to send
    /// the response unencoded.
    fn begin_encode(&self, head: &ResponseHead, accept_encoding: Option<&str>) -> Option<Encoding>;
}

impl<F> EncodeDecision for F
where
    F: Fn(&ResponseHead, Option<&str>) -> Option<Encoding>,
{
    fn begin_encode(&self, head: &ResponseHead, accept_encoding: Option<&str>) -> Option<Encoding> {
        self(head, accept_encoding)
    }
}

/// A `Content-Encoding` label paired with the compressor producing it.
pub struct Encoding {
    label: HeaderValue,
    compressor: Box<dyn Compressor>,
}

impl Encoding {
    /// Pairs a label with its compressor.
    pub fn new(label: HeaderValue, compressor: impl Compressor + 'static) -> Self {
        Self {
            label,
            compressor: Box::new(compressor),
        }
    }

    /// The `Content-Encoding` value.
    pub fn label(&self) -> &HeaderValue {
        &self.label
    }

    pub(crate) fn into_parts(self) -> (HeaderValue, Box<dyn Compressor>) {
        (self.label, self.compressor)
    }
}

impl std::fmt::Debug for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encoding")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// How the response body reaches the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// Body follows as separate chunks; its length is not known yet.
    Streamed,
    /// Body is fully buffered with the given length.
    Aggregate {
        /// Body length in bytes.
        len: usize,
    },
}

impl BodyKind {
    fn representation(self) -> Representation {
        match self {
            BodyKind::Streamed => Representation::Streamed,
            BodyKind::Aggregate { .. } => Representation::Aggregate,
        }
    }
}

/// Why a response is passed through unencoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Responses to `HEAD` carry no body.
    HeadRequest,
    /// A successful `CONNECT` turns the connection into a tunnel.
    ConnectEstablished,
    /// 1xx, 204 and 304 responses carry no body.
    BodylessStatus,
    /// The producer already chose a `Content-Encoding`.
    AlreadyEncoded,
    /// The body is known to be empty.
    EmptyBody,
    /// HTTP/1.0 cannot use chunked framing.
    LegacyVersion,
    /// The encode decision declined.
    Declined,
}

/// Applies the protocol rules that forbid encoding, in order.
pub fn skip_reason(head: &ResponseHead, record: &RequestRecord, body: BodyKind) -> Option<SkipReason> {
    let status = head.status;

    if record.is_head() {
        return Some(SkipReason::HeadRequest);
    }
    if record.is_connect() && status.is_success() {
        return Some(SkipReason::ConnectEstablished);
    }
    if status.is_informational()
        || status == http::StatusCode::NO_CONTENT
        || status == http::StatusCode::NOT_MODIFIED
    {
        return Some(SkipReason::BodylessStatus);
    }
    if head.headers.contains_key(header::CONTENT_ENCODING) {
        return Some(SkipReason::AlreadyEncoded);
    }
    if matches!(body, BodyKind::Aggregate { len: 0 }) {
        return Some(SkipReason::EmptyBody);
    }
    if head.version < Version::HTTP_11 {
        return Some(SkipReason::LegacyVersion);
    }
    None
}

/// Decides how the response described by `head` is encoded.
///
/// The decision function is consulted only when no skip rule matches, so a
/// skipped response never constructs a compressor.
pub fn negotiate<D>(
    head: &ResponseHead,
    record: &RequestRecord,
    body: BodyKind,
    decision: &D,
) -> ResponseCycle
where
    D: EncodeDecision + ?Sized,
{
    let representation = body.representation();

    let reason = match skip_reason(head, record, body) {
        Some(reason) => reason,
        None => match decision.begin_encode(head, record.accept_encoding()) {
            Some(encoding) => {
                let (label, compressor) = encoding.into_parts();
                return ResponseCycle::encoded(label, compressor, representation);
            }
            None => SkipReason::Declined,
        },
    };

    tracing::trace!(status = %head.status, ?reason, "passing response through unencoded");
    ResponseCycle::skipped(reason, representation)
}
