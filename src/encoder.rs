use crate::codec::CodecSelector;
use crate::cycle::ResponseCycle;
use crate::error::EncodeError;
use crate::framing::{self, Framing};
use crate::message::{AggregateMessage, BodyChunk, Message, ResponseHead};
use crate::negotiate::{BodyKind, EncodeDecision, negotiate};
use crate::tracker::{RequestRecord, RequestTracker};
use crate::transform::{transform_aggregate, transform_chunk};
use http::{Request, StatusCode};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Active,
    Failed,
    Inactive,
}

/// Response content-encoding stage for one HTTP/1.x connection.
///
/// Requests are observed on the way in, responses are written on the way out
/// and the transformed messages are read back with
/// [`read_outbound`](Self::read_outbound). The stage is driven from a single
/// task; every call runs to completion synchronously.
///
/// Any error returned by [`write`](Self::write) is fatal: buffered output is
/// released, the compressor is closed and further writes fail with
/// [`EncodeError::Terminated`]. The owner is expected to tear the connection
/// down and call [`connection_inactive`](Self::connection_inactive).
#[derive(Debug)]
pub struct ContentEncoder<D = CodecSelector> {
    decision: D,
    requests: RequestTracker,
    cycle: Option<ResponseCycle>,
    outbound: VecDeque<Message>,
    lifecycle: Lifecycle,
}

impl Default for ContentEncoder<CodecSelector> {
    fn default() -> Self {
        Self::new(CodecSelector::default())
    }
}

impl<D: EncodeDecision> ContentEncoder<D> {
    /// Creates a stage that asks `decision` how to encode each response.
    pub fn new(decision: D) -> Self {
        Self {
            decision,
            requests: RequestTracker::new(),
            cycle: None,
            outbound: VecDeque::new(),
            lifecycle: Lifecycle::Active,
        }
    }

    /// Records an inbound request so its response can be matched later.
    pub fn observe_request<B>(&mut self, req: &Request<B>) {
        self.record(RequestRecord::from_request(req));
    }

    /// Records an already extracted request record.
    pub fn record(&mut self, record: RequestRecord) {
        self.requests.record(record);
    }

    /// Number of requests still waiting for a response.
    pub fn pending_requests(&self) -> usize {
        self.requests.len()
    }

    /// The streamed response currently being written, if any.
    pub fn active_cycle(&self) -> Option<&ResponseCycle> {
        self.cycle.as_ref()
    }

    /// Writes one outbound message through the stage.
    pub fn write(&mut self, msg: impl Into<Message>) -> Result<(), EncodeError> {
        if self.lifecycle != Lifecycle::Active {
            return Err(EncodeError::Terminated);
        }

        let result = match msg.into() {
            Message::Head(head) => self.write_head(head),
            Message::Chunk(chunk) => self.write_chunk(chunk),
            Message::Aggregate(msg) => self.write_aggregate(msg),
        };

        if let Err(err) = &result {
            self.fail(err);
        }
        result
    }

    /// Takes the next transformed message.
    pub fn read_outbound(&mut self) -> Option<Message> {
        self.outbound.pop_front()
    }

    /// Takes every transformed message written so far.
    pub fn drain_outbound(&mut self) -> impl Iterator<Item = Message> + '_ {
        self.outbound.drain(..)
    }

    /// Handles the connection becoming inactive.
    ///
    /// Closes a compressor left open by an unfinished response, then forwards
    /// the notification through `notify`, exactly once per stage. A close
    /// failure releases the buffered output before the notification and is
    /// returned after it.
    pub fn connection_inactive<F: FnOnce()>(&mut self, notify: F) -> Result<(), EncodeError> {
        if self.lifecycle == Lifecycle::Inactive {
            return Ok(());
        }

        let result = match self.cycle.take() {
            Some(mut cycle) => {
                if !cycle.is_finished() {
                    tracing::trace!("connection closed mid-response");
                }
                cycle.close()
            }
            None => Ok(()),
        };
        self.requests.clear();

        if let Err(err) = &result {
            tracing::warn!(error = %err, "releasing buffered output after close failure");
            self.outbound.clear();
        }

        self.lifecycle = Lifecycle::Inactive;
        notify();
        result
    }

    fn write_head(&mut self, mut head: ResponseHead) -> Result<(), EncodeError> {
        let cycle = self.start_cycle(&head, BodyKind::Streamed)?;
        if let Some(label) = cycle.encoding_label() {
            framing::rewrite(&mut head.headers, label, Framing::Chunked);
        }

        self.outbound.push_back(Message::Head(head));
        self.cycle = Some(cycle);
        Ok(())
    }

    fn write_chunk(&mut self, chunk: BodyChunk) -> Result<(), EncodeError> {
        let cycle = self.cycle.as_mut().ok_or(EncodeError::ProtocolViolation(
            "body chunk without a response head",
        ))?;

        transform_chunk(cycle, chunk, &mut self.outbound)?;
        if cycle.is_finished() {
            self.cycle = None;
        }
        Ok(())
    }

    fn write_aggregate(&mut self, mut msg: AggregateMessage) -> Result<(), EncodeError> {
        let body = BodyKind::Aggregate {
            len: msg.payload.len(),
        };
        let mut cycle = self.start_cycle(&msg.head, body)?;

        let framing = Framing::for_aggregate(&msg.head.headers);
        if let Some(label) = cycle.encoding_label() {
            framing::rewrite(&mut msg.head.headers, label, framing);
        }

        transform_aggregate(&mut cycle, msg, framing, &mut self.outbound)
    }

    /// Matches a response head to its request and negotiates its encoding.
    ///
    /// Interim responses (1xx other than 101) leave the request queued, since
    /// the final response to the same request still follows.
    fn start_cycle(&mut self, head: &ResponseHead, body: BodyKind) -> Result<ResponseCycle, EncodeError> {
        if self.cycle.is_some() {
            return Err(EncodeError::ProtocolViolation(
                "response started before the previous body finished",
            ));
        }

        let interim = head.status.is_informational() && head.status != StatusCode::SWITCHING_PROTOCOLS;
        let cycle = if interim {
            negotiate(head, self.requests.peek()?, body, &self.decision)
        } else {
            let record = self.requests.next()?;
            negotiate(head, &record, body, &self.decision)
        };
        Ok(cycle)
    }

    fn fail(&mut self, err: &EncodeError) {
        tracing::warn!(error = %err, "content encoding failed");

        if let Some(mut cycle) = self.cycle.take() {
            if let Err(close_err) = cycle.close() {
                tracing::warn!(error = %close_err, "compressor failed to close after error");
            }
        }
        self.outbound.clear();
        self.lifecycle = Lifecycle::Failed;
    }
}
