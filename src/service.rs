use crate::body::EncodedBody;
use crate::codec::CodecSelector;
use crate::future::ResponseFuture;
use crate::negotiate::EncodeDecision;
use crate::tracker::RequestRecord;
use http::Request;
use http_body::Body;
use std::task::{Context, Poll};
use tower::Service;

/// A Tower service that encodes HTTP response bodies.
#[derive(Debug, Clone)]
pub struct CompressionService<S, D = CodecSelector> {
    inner: S,
    decision: D,
}

impl<S, D> CompressionService<S, D> {
    /// Creates a new compression service wrapping the given inner service.
    pub fn new(inner: S, decision: D) -> Self {
        Self { inner, decision }
    }

    /// Returns a reference to the inner service.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Returns a mutable reference to the inner service.
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Consumes this service, returning the inner service.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S, D, ReqBody, ResBody> Service<Request<ReqBody>> for CompressionService<S, D>
where
    S: Service<Request<ReqBody>, Response = http::Response<ResBody>>,
    D: EncodeDecision + Clone,
    ResBody: Body,
{
    type Response = http::Response<EncodedBody<ResBody>>;
    type Error = S::Error;
    type Future = ResponseFuture<S::Future, D>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        // Each call pairs exactly one request with its response
        let record = RequestRecord::from_request(&req);

        let inner = self.inner.call(req);

        ResponseFuture::new(inner, record, self.decision.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Probe, length_encoding};
    use bytes::Bytes;
    use http::{Method, Response, header};
    use http_body_util::Full;
    use std::convert::Infallible;
    use std::future::{Future, ready};
    use std::pin::Pin;
    use tower::service_fn;

    fn block_on<F: Future + Unpin>(mut fut: F) -> F::Output {
        let waker = std::task::Waker::noop();
        let mut cx = Context::from_waker(waker);
        match Pin::new(&mut fut).poll(&mut cx) {
            Poll::Ready(output) => output,
            Poll::Pending => panic!("future not ready"),
        }
    }

    fn hello(_req: Request<()>) -> std::future::Ready<Result<Response<Full<Bytes>>, Infallible>> {
        ready(Ok(Response::new(Full::new(Bytes::from_static(b"hello world")))))
    }

    #[test]
    fn test_service_encodes_get() {
        let probe = Probe::default();
        let mut svc = CompressionService::new(service_fn(hello), length_encoding(probe.clone()));

        let req = Request::get("/")
            .header(header::ACCEPT_ENCODING, "gzip")
            .body(())
            .unwrap();
        let response = block_on(svc.call(req)).unwrap();

        assert_eq!(
            response.headers().get(header::CONTENT_ENCODING).unwrap(),
            "test"
        );
        assert!(matches!(response.body(), EncodedBody::Encoded { .. }));
    }

    #[test]
    fn test_service_skips_head() {
        let probe = Probe::default();
        let mut svc = CompressionService::new(service_fn(hello), length_encoding(probe.clone()));

        let req = Request::builder()
            .method(Method::HEAD)
            .uri("/")
            .body(())
            .unwrap();
        let response = block_on(svc.call(req)).unwrap();

        assert!(response.headers().get(header::CONTENT_ENCODING).is_none());
        assert!(matches!(response.body(), EncodedBody::Passthrough { .. }));
        assert_eq!(probe.created(), 0);
    }

    #[test]
    fn test_into_inner() {
        let probe = Probe::default();
        let svc = CompressionService::new(service_fn(hello), length_encoding(probe));
        let _ = svc.inner();
        let _inner = svc.into_inner();
    }
}
