use crate::body::EncodedBody;
use crate::framing::{self, Framing};
use crate::message::ResponseHead;
use crate::negotiate::{BodyKind, EncodeDecision, negotiate};
use crate::tracker::RequestRecord;
use http::Response;
use http_body::Body;
use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

pin_project! {
    /// Future for compression service responses.
    pub struct ResponseFuture<F, D> {
        #[pin]
        inner: F,
        record: RequestRecord,
        decision: D,
    }
}

impl<F, D> ResponseFuture<F, D> {
    pub(crate) fn new(inner: F, record: RequestRecord, decision: D) -> Self {
        Self {
            inner,
            record,
            decision,
        }
    }
}

impl<F, D, B, E> Future for ResponseFuture<F, D>
where
    F: Future<Output = Result<Response<B>, E>>,
    D: EncodeDecision,
    B: Body,
{
    type Output = Result<Response<EncodedBody<B>>, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        match this.inner.poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
            Poll::Ready(Ok(response)) => {
                let response = wrap_response(response, this.record, this.decision);
                Poll::Ready(Ok(response))
            }
        }
    }
}

/// Wraps the response body with encoding if appropriate.
fn wrap_response<B, D>(
    response: Response<B>,
    record: &RequestRecord,
    decision: &D,
) -> Response<EncodedBody<B>>
where
    B: Body,
    D: EncodeDecision + ?Sized,
{
    let (mut parts, body) = response.into_parts();

    let mut head = ResponseHead {
        version: parts.version,
        status: parts.status,
        headers: std::mem::take(&mut parts.headers),
    };

    // A body that is already complete and empty is known not to need encoding
    let body_kind = if body.is_end_stream() || body.size_hint().exact() == Some(0) {
        BodyKind::Aggregate { len: 0 }
    } else {
        BodyKind::Streamed
    };

    let cycle = negotiate(&head, record, body_kind, decision);
    if let Some(label) = cycle.encoding_label() {
        // The connection picks chunked or HTTP/2 framing for the unknown length
        framing::rewrite(&mut head.headers, label, Framing::Delegated);
    }
    parts.headers = head.headers;

    let body = if cycle.is_skip() {
        EncodedBody::passthrough(body)
    } else {
        EncodedBody::encoded(body, cycle)
    };

    Response::from_parts(parts, body)
}
