use crate::error::EncodeError;
use http::{Method, Request, header};
use std::collections::VecDeque;

/// What a response needs to know about the request it answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestRecord {
    method: Method,
    accept_encoding: Option<String>,
}

impl RequestRecord {
    /// Creates a record from a request method and its `Accept-Encoding` value.
    pub fn new(method: Method, accept_encoding: Option<String>) -> Self {
        Self {
            method,
            accept_encoding,
        }
    }

    /// Builds a record from an observed request.
    ///
    /// A non-ASCII `Accept-Encoding` value is treated as absent.
    pub fn from_request<B>(req: &Request<B>) -> Self {
        let accept_encoding = req
            .headers()
            .get(header::ACCEPT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        Self::new(req.method().clone(), accept_encoding)
    }

    /// The request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Whether the request was a `CONNECT`.
    pub fn is_connect(&self) -> bool {
        self.method == Method::CONNECT
    }

    /// Whether the request was a `HEAD`.
    pub fn is_head(&self) -> bool {
        self.method == Method::HEAD
    }

    /// The request's `Accept-Encoding` value, if any.
    pub fn accept_encoding(&self) -> Option<&str> {
        self.accept_encoding.as_deref()
    }
}

/// FIFO of requests still waiting for their response.
///
/// Pipelined connections may have several requests outstanding; responses
/// are matched to them strictly in arrival order.
#[derive(Debug, Default)]
pub struct RequestTracker {
    pending: VecDeque<RequestRecord>,
}

impl RequestTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record for a newly observed request.
    pub fn record(&mut self, record: RequestRecord) {
        self.pending.push_back(record);
    }

    /// Removes the oldest unmatched record.
    pub fn next(&mut self) -> Result<RequestRecord, EncodeError> {
        self.pending
            .pop_front()
            .ok_or(EncodeError::ProtocolViolation(
                "response has no matching request",
            ))
    }

    /// Returns the oldest unmatched record without consuming it.
    pub fn peek(&self) -> Result<&RequestRecord, EncodeError> {
        self.pending.front().ok_or(EncodeError::ProtocolViolation(
            "interim response has no matching request",
        ))
    }

    /// Number of requests awaiting a response.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no request is awaiting a response.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drops every pending record.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
