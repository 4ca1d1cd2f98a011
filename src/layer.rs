use crate::codec::CodecSelector;
use crate::service::CompressionService;
use tower::Layer;

/// A Tower layer that encodes HTTP response bodies.
///
/// This layer wraps services and compresses response bodies as chosen by its
/// [`EncodeDecision`](crate::EncodeDecision), by default a [`CodecSelector`]
/// driven by the client's Accept-Encoding header.
#[derive(Debug, Clone)]
pub struct CompressionLayer<D = CodecSelector> {
    decision: D,
}

impl CompressionLayer {
    /// Creates a new compression layer with default settings.
    ///
    /// The default minimum size for compression is 860 bytes.
    pub fn new() -> Self {
        Self {
            decision: CodecSelector::new(),
        }
    }

    /// Sets the minimum body size required for compression.
    ///
    /// Responses with a known Content-Length smaller than this value
    /// will not be compressed.
    pub fn min_size(mut self, size: usize) -> Self {
        self.decision = self.decision.min_size(size);
        self
    }
}

impl<D> CompressionLayer<D> {
    /// Creates a layer that encodes as `decision` chooses.
    pub fn with_decision(decision: D) -> Self {
        Self { decision }
    }
}

impl Default for CompressionLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, D: Clone> Layer<S> for CompressionLayer<D> {
    type Service = CompressionService<S, D>;

    fn layer(&self, inner: S) -> Self::Service {
        CompressionService::new(inner, self.decision.clone())
    }
}
