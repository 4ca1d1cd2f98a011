use crate::cycle::ResponseCycle;
use crate::error::EncodeError;
use crate::framing::{self, Framing};
use crate::message::{AggregateMessage, BodyChunk, Message};
use bytes::Bytes;
use http::HeaderMap;
use std::collections::VecDeque;

/// Runs one streamed body chunk through the cycle.
///
/// Each input chunk yields at most one data chunk; compressor output that is
/// empty is dropped, since an empty chunk would end a chunked body early.
/// The last chunk additionally yields an empty terminal chunk carrying the
/// original trailers.
pub(crate) fn transform_chunk(
    cycle: &mut ResponseCycle,
    chunk: BodyChunk,
    out: &mut VecDeque<Message>,
) -> Result<(), EncodeError> {
    if cycle.is_skip() {
        if chunk.is_last {
            cycle.mark_finished();
        }
        out.push_back(Message::Chunk(chunk));
        return Ok(());
    }

    let BodyChunk {
        payload,
        is_last,
        trailing_headers,
    } = chunk;

    if !is_last {
        let encoded = cycle.compress(payload)?;
        push_data(out, encoded);
        return Ok(());
    }

    let encoded = cycle.compress_last(payload)?;
    push_data(out, encoded);
    push_terminal(out, trailing_headers);
    Ok(())
}

/// Encodes a fully buffered response in one step.
///
/// Emits the head, the encoded body as one data chunk, and an empty terminal
/// chunk with the original trailers. With length framing the head's
/// `Content-Length` is set to the encoded size.
pub(crate) fn transform_aggregate(
    cycle: &mut ResponseCycle,
    msg: AggregateMessage,
    framing: Framing,
    out: &mut VecDeque<Message>,
) -> Result<(), EncodeError> {
    if cycle.is_skip() {
        cycle.mark_finished();
        out.push_back(Message::Aggregate(msg));
        return Ok(());
    }

    let AggregateMessage {
        mut head,
        payload,
        trailing_headers,
    } = msg;

    let encoded = cycle.compress_last(payload)?;
    if framing == Framing::Length {
        framing::set_content_length(&mut head.headers, encoded.len());
    }

    out.push_back(Message::Head(head));
    push_data(out, encoded);
    push_terminal(out, trailing_headers);
    Ok(())
}

fn push_data(out: &mut VecDeque<Message>, data: Bytes) {
    if !data.is_empty() {
        out.push_back(Message::Chunk(BodyChunk::data(data)));
    }
}

fn push_terminal(out: &mut VecDeque<Message>, trailers: Option<HeaderMap>) {
    out.push_back(Message::Chunk(BodyChunk {
        payload: Bytes::new(),
        is_last: true,
        trailing_headers: trailers,
    }));
}
