use bytes::Bytes;
use http::{HeaderMap, StatusCode, Version};

/// Start line and headers of an outbound response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    /// Protocol version of the response.
    pub version: Version,
    /// Response status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
}

impl ResponseHead {
    /// Creates an HTTP/1.1 response head with no headers.
    pub fn new(status: StatusCode) -> Self {
        Self {
            version: Version::HTTP_11,
            status,
            headers: HeaderMap::new(),
        }
    }
}

/// One piece of a streamed response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyChunk {
    /// Bytes carried by this chunk.
    pub payload: Bytes,
    /// Whether this chunk terminates the body.
    pub is_last: bool,
    /// Trailer fields, only meaningful on the last chunk.
    pub trailing_headers: Option<HeaderMap>,
}

impl BodyChunk {
    /// A non-terminal chunk.
    pub fn data(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            is_last: false,
            trailing_headers: None,
        }
    }

    /// A terminal chunk.
    pub fn last(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            is_last: true,
            trailing_headers: None,
        }
    }

    /// An empty terminal chunk.
    pub fn empty_last() -> Self {
        Self::last(Bytes::new())
    }

    /// Attaches trailer fields to this chunk.
    pub fn with_trailers(mut self, trailers: HeaderMap) -> Self {
        self.trailing_headers = Some(trailers);
        self
    }
}

/// A response whose whole body is available up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateMessage {
    /// Start line and headers.
    pub head: ResponseHead,
    /// The complete body.
    pub payload: Bytes,
    /// Trailer fields sent after the body.
    pub trailing_headers: Option<HeaderMap>,
}

impl AggregateMessage {
    /// Creates an aggregate response without trailers.
    pub fn new(head: ResponseHead, payload: impl Into<Bytes>) -> Self {
        Self {
            head,
            payload: payload.into(),
            trailing_headers: None,
        }
    }
}

/// Outbound messages handled by [`ContentEncoder`](crate::ContentEncoder).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Start of a streamed response; body chunks follow.
    Head(ResponseHead),
    /// A body chunk of the current streamed response.
    Chunk(BodyChunk),
    /// A complete response with its body.
    Aggregate(AggregateMessage),
}

impl Message {
    /// Returns the response head if this message starts a response.
    pub fn head(&self) -> Option<&ResponseHead> {
        match self {
            Message::Head(head) => Some(head),
            Message::Aggregate(msg) => Some(&msg.head),
            Message::Chunk(_) => None,
        }
    }

    /// Returns the chunk if this message is one.
    pub fn as_chunk(&self) -> Option<&BodyChunk> {
        match self {
            Message::Chunk(chunk) => Some(chunk),
            _ => None,
        }
    }
}

impl From<ResponseHead> for Message {
    fn from(head: ResponseHead) -> Self {
        Message::Head(head)
    }
}

impl From<BodyChunk> for Message {
    fn from(chunk: BodyChunk) -> Self {
        Message::Chunk(chunk)
    }
}

impl From<AggregateMessage> for Message {
    fn from(msg: AggregateMessage) -> Self {
        Message::Aggregate(msg)
    }
}
