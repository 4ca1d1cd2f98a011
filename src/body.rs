use crate::cycle::ResponseCycle;
use bytes::{Buf, Bytes};
use http::{HeaderMap, HeaderValue};
use http_body::{Body, Frame};
use pin_project_lite::pin_project;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

pin_project! {
    /// A response body that may be encoded.
    ///
    /// This type wraps an inner body and either runs it through the response's
    /// compressor or passes it through unchanged. Dropping an encoded body
    /// before it completes closes the compressor.
    #[project = EncodedBodyProj]
    #[allow(missing_docs)]
    pub enum EncodedBody<B> {
        /// Encoded body driving a compressor.
        Encoded {
            #[pin]
            inner: B,
            state: EncodedState,
        },
        /// Passthrough body without encoding.
        Passthrough {
            #[pin]
            inner: B,
        },
    }
}

/// Encoding progress of a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    /// Reading data from inner body and compressing.
    Reading,
    /// Finishing compression after inner body is done.
    Finishing,
    /// Emitting buffered trailers.
    Trailers,
    /// Compression is complete.
    Done,
}

/// Cycle and buffers for an actively encoded body.
#[derive(Debug)]
pub struct EncodedState {
    cycle: ResponseCycle,
    phase: Phase,
    pending_trailers: Option<HeaderMap>,
}

impl EncodedState {
    fn new(cycle: ResponseCycle) -> Self {
        Self {
            cycle,
            phase: Phase::Reading,
            pending_trailers: None,
        }
    }

    pub(crate) fn phase(&self) -> Phase {
        self.phase
    }

    /// The `Content-Encoding` applied to the body.
    pub fn encoding(&self) -> Option<&HeaderValue> {
        self.cycle.encoding_label()
    }

    /// Stops encoding after an error; the compressor is closed right away.
    fn abort(&mut self, err: io::Error) -> Poll<Option<Result<Frame<Bytes>, io::Error>>> {
        self.phase = Phase::Done;
        self.pending_trailers = None;
        if let Err(close_err) = self.cycle.close() {
            tracing::warn!(error = %close_err, "compressor failed to close after body error");
        }
        Poll::Ready(Some(Err(err)))
    }

    fn after_finish(&self) -> Phase {
        if self.pending_trailers.is_some() {
            Phase::Trailers
        } else {
            Phase::Done
        }
    }

    /// Polls the inner body and encodes data.
    fn poll_encoded<B>(
        &mut self,
        cx: &mut Context<'_>,
        mut inner: Pin<&mut B>,
    ) -> Poll<Option<Result<Frame<Bytes>, io::Error>>>
    where
        B: Body,
        B::Data: Buf,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        loop {
            match self.phase {
                Phase::Done => return Poll::Ready(None),

                Phase::Trailers => {
                    self.phase = Phase::Done;
                    if let Some(trailers) = self.pending_trailers.take() {
                        return Poll::Ready(Some(Ok(Frame::trailers(trailers))));
                    }
                }

                Phase::Finishing => match self.cycle.finish() {
                    Ok(data) => {
                        self.phase = self.after_finish();
                        if !data.is_empty() {
                            return Poll::Ready(Some(Ok(Frame::data(data))));
                        }
                    }
                    Err(err) => return self.abort(err.into()),
                },

                Phase::Reading => match inner.as_mut().poll_frame(cx) {
                    Poll::Pending => return Poll::Pending,
                    Poll::Ready(None) => self.phase = Phase::Finishing,
                    Poll::Ready(Some(Err(e))) => return self.abort(io::Error::other(e.into())),
                    Poll::Ready(Some(Ok(frame))) => match frame.into_data() {
                        Ok(mut data) => {
                            let input = data.copy_to_bytes(data.remaining());
                            match self.cycle.compress(input) {
                                Ok(output) if output.is_empty() => {}
                                Ok(output) => return Poll::Ready(Some(Ok(Frame::data(output)))),
                                Err(err) => return self.abort(err.into()),
                            }
                        }
                        Err(frame) => {
                            if let Ok(trailers) = frame.into_trailers() {
                                // Buffer trailers and finish compression first
                                self.pending_trailers = Some(trailers);
                                self.phase = Phase::Finishing;
                            }
                        }
                    },
                },
            }
        }
    }
}

impl<B> EncodedBody<B> {
    /// Creates a body encoded by the given cycle's compressor.
    pub(crate) fn encoded(inner: B, cycle: ResponseCycle) -> Self {
        Self::Encoded {
            inner,
            state: EncodedState::new(cycle),
        }
    }

    /// Creates a passthrough body without encoding.
    pub fn passthrough(inner: B) -> Self {
        Self::Passthrough { inner }
    }
}

impl<B> Body for EncodedBody<B>
where
    B: Body,
    B::Data: Buf,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match self.project() {
            EncodedBodyProj::Passthrough { inner } => match inner.poll_frame(cx) {
                Poll::Pending => Poll::Pending,
                Poll::Ready(None) => Poll::Ready(None),
                Poll::Ready(Some(Ok(frame))) => Poll::Ready(Some(Ok(
                    frame.map_data(|mut data| data.copy_to_bytes(data.remaining()))
                ))),
                Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(io::Error::other(e.into())))),
            },
            EncodedBodyProj::Encoded { inner, state } => state.poll_encoded(cx, inner),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            EncodedBody::Passthrough { inner } => inner.is_end_stream(),
            EncodedBody::Encoded { state, .. } => state.phase() == Phase::Done,
        }
    }

    fn size_hint(&self) -> http_body::SizeHint {
        match self {
            EncodedBody::Passthrough { inner } => inner.size_hint(),
            // Encoded size is unknown
            EncodedBody::Encoded { .. } => http_body::SizeHint::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycle::Representation;
    use crate::testing::{LengthCompressor, Probe};
    use std::collections::VecDeque;

    /// A test body that yields predefined frames.
    struct TestBody {
        frames: VecDeque<Result<Frame<Bytes>, io::Error>>,
    }

    impl TestBody {
        fn new(frames: Vec<Frame<Bytes>>) -> Self {
            Self {
                frames: frames.into_iter().map(Ok).collect(),
            }
        }

        fn failing_after(frames: Vec<Frame<Bytes>>) -> Self {
            let mut body = Self::new(frames);
            body.frames.push_back(Err(io::Error::other("upstream reset")));
            body
        }
    }

    impl Body for TestBody {
        type Data = Bytes;
        type Error = io::Error;

        fn poll_frame(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
            Poll::Ready(self.frames.pop_front())
        }
    }

    fn poll_body<B: Body + Unpin>(body: &mut B) -> Option<Result<Frame<B::Data>, B::Error>> {
        let waker = std::task::Waker::noop();
        let mut cx = Context::from_waker(waker);
        match Pin::new(body).poll_frame(&mut cx) {
            Poll::Ready(result) => result,
            Poll::Pending => None,
        }
    }

    fn encoded(inner: TestBody, compressor: LengthCompressor) -> EncodedBody<TestBody> {
        let cycle = ResponseCycle::encoded(
            HeaderValue::from_static("test"),
            Box::new(compressor),
            Representation::Streamed,
        );
        EncodedBody::encoded(inner, cycle)
    }

    fn data_frames(body: &mut EncodedBody<TestBody>) -> Vec<Bytes> {
        let mut out = Vec::new();
        while let Some(Ok(frame)) = poll_body(body) {
            if let Ok(data) = frame.into_data() {
                out.push(data);
            }
        }
        out
    }

    #[test]
    fn test_passthrough_data() {
        let inner = TestBody::new(vec![Frame::data(Bytes::from("hello world"))]);
        let mut body = EncodedBody::passthrough(inner);

        let frame = poll_body(&mut body).unwrap().unwrap();
        assert!(frame.is_data());
        assert_eq!(frame.into_data().unwrap(), Bytes::from("hello world"));

        assert!(poll_body(&mut body).is_none());
    }

    #[test]
    fn test_passthrough_trailers() {
        let mut trailers = HeaderMap::new();
        trailers.insert("x-checksum", "abc123".parse().unwrap());

        let inner = TestBody::new(vec![
            Frame::data(Bytes::from("data")),
            Frame::trailers(trailers.clone()),
        ]);
        let mut body = EncodedBody::passthrough(inner);

        let frame = poll_body(&mut body).unwrap().unwrap();
        assert!(frame.is_data());

        let frame = poll_body(&mut body).unwrap().unwrap();
        assert!(frame.is_trailers());
        let received_trailers = frame.into_trailers().unwrap();
        assert_eq!(received_trailers.get("x-checksum").unwrap(), "abc123");

        assert!(poll_body(&mut body).is_none());
    }

    #[test]
    fn test_encoded_frames_follow_input() {
        let probe = Probe::default();
        let inner = TestBody::new(vec![
            Frame::data(Bytes::from("hello")),
            Frame::data(Bytes::from("world!")),
        ]);
        let mut body = encoded(inner, LengthCompressor::with_probe(probe.clone()));

        assert_eq!(data_frames(&mut body), vec!["5", "6"]);
        assert!(body.is_end_stream());
        assert_eq!(probe.finishes(), 1);
        assert_eq!(probe.closes(), 1);
    }

    #[test]
    fn test_encoded_with_trailers() {
        let probe = Probe::default();
        let mut trailers = HeaderMap::new();
        trailers.insert("x-checksum", "abc123".parse().unwrap());

        let inner = TestBody::new(vec![
            Frame::data(Bytes::from("hello world")),
            Frame::trailers(trailers),
        ]);
        let mut body = encoded(inner, LengthCompressor::with_probe(probe.clone()));

        let mut data_frames = 0;
        let mut trailer_frame = None;
        while let Some(Ok(frame)) = poll_body(&mut body) {
            if frame.is_data() {
                data_frames += 1;
            } else if frame.is_trailers() {
                trailer_frame = Some(frame);
            }
        }

        assert_eq!(data_frames, 1);
        let trailers = trailer_frame
            .expect("Expected trailers frame")
            .into_trailers()
            .unwrap();
        assert_eq!(trailers.get("x-checksum").unwrap(), "abc123");
        assert_eq!(probe.closes(), 1);
    }

    #[test]
    fn test_drop_mid_stream_closes_compressor() {
        let probe = Probe::default();
        let inner = TestBody::new(vec![
            Frame::data(Bytes::from("a")),
            Frame::data(Bytes::from("b")),
        ]);
        let mut body = encoded(inner, LengthCompressor::with_probe(probe.clone()));
        assert!(poll_body(&mut body).is_some());

        drop(body);
        assert_eq!(probe.finishes(), 0);
        assert_eq!(probe.closes(), 1);
    }

    #[test]
    fn test_inner_error_closes_compressor() {
        let probe = Probe::default();
        let inner = TestBody::failing_after(vec![Frame::data(Bytes::from("abc"))]);
        let mut body = encoded(inner, LengthCompressor::with_probe(probe.clone()));

        assert!(poll_body(&mut body).unwrap().is_ok());
        assert!(poll_body(&mut body).unwrap().is_err());
        assert_eq!(probe.closes(), 1);
        assert!(poll_body(&mut body).is_none());
    }

    #[test]
    fn test_close_failure_surfaces_as_error() {
        let probe = Probe::default();
        let inner = TestBody::new(vec![Frame::data(Bytes::from("abc"))]);
        let mut body = encoded(
            inner,
            LengthCompressor::with_probe(probe.clone()).failing_close(),
        );

        assert!(poll_body(&mut body).unwrap().is_ok());
        let err = poll_body(&mut body).unwrap().unwrap_err();
        assert!(err.get_ref().is_some());
        assert!(poll_body(&mut body).is_none());
        drop(body);
        assert_eq!(probe.closes(), 1);
    }

    #[test]
    #[cfg(feature = "gzip")]
    fn test_gzip_body_produces_output() {
        use crate::codec::Codec;
        use crate::compressor::CodecCompressor;

        let cycle = ResponseCycle::encoded(
            HeaderValue::from_static("gzip"),
            Box::new(CodecCompressor::new(Codec::Gzip, false)),
            Representation::Streamed,
        );
        let inner = TestBody::new(vec![Frame::data(Bytes::from("hello world"))]);
        let mut body = EncodedBody::encoded(inner, cycle);

        let mut output = Vec::new();
        while let Some(Ok(frame)) = poll_body(&mut body) {
            output.extend_from_slice(&frame.into_data().unwrap());
        }
        // gzip header starts with 0x1f 0x8b
        assert_eq!(&output[..2], &[0x1f, 0x8b]);
    }
}
