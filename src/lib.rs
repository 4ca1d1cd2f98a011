//! Response content encoding for HTTP/1.x pipelines.
//!
//! [`ContentEncoder`] is an outbound pipeline stage that compresses response
//! bodies while keeping HTTP/1.x framing correct. Requests are observed as
//! they arrive and matched to responses in arrival order, so pipelined
//! connections work. Each response is either passed through untouched or
//! encoded by a [`Compressor`] obtained from an [`EncodeDecision`].
//!
//! # Example
//!
//! ```ignore
//! use http_content_encoder::{BodyChunk, ContentEncoder, ResponseHead};
//!
//! let mut encoder = ContentEncoder::default();
//! encoder.observe_request(&request);
//! encoder.write(ResponseHead::new(StatusCode::OK))?;
//! encoder.write(BodyChunk::last(body))?;
//! while let Some(msg) = encoder.read_outbound() {
//!     connection.send(msg);
//! }
//! ```
//!
//! The same core is available as Tower middleware:
//!
//! ```ignore
//! use http_content_encoder::CompressionLayer;
//! use tower::ServiceBuilder;
//!
//! let service = ServiceBuilder::new()
//!     .layer(CompressionLayer::new())
//!     .service(my_service);
//! ```
//!
//! # Encoding Rules
//!
//! A response is **never** encoded when:
//! - It answers a `HEAD` request
//! - It is a 2xx answer to a `CONNECT` request
//! - Its status is 1xx, 204 or 304
//! - `Content-Encoding` header is already set
//! - Its body is fully buffered and empty
//! - It uses HTTP/1.0
//!
//! Otherwise the [`EncodeDecision`] is asked. The default [`CodecSelector`]
//! additionally declines when:
//! - No supported `Accept-Encoding` is present in the request
//! - `Content-Range` header is present (range responses)
//! - `Content-Type` starts with `image/` (except `image/svg+xml`)
//! - `Content-Type` starts with `application/grpc` (except `application/grpc-web`)
//! - `Content-Length` is below the minimum size threshold (default: 860 bytes)
//!
//! # Response Modifications
//!
//! When a response is encoded:
//! - `Content-Encoding` header is set to the chosen label
//! - Streamed bodies lose `Content-Length` and gain `Transfer-Encoding: chunked`
//! - Buffered bodies keep length framing, with `Content-Length` set to the
//!   encoded size, or switch to chunked when no length was declared
//! - `Accept-Ranges` header is removed
//! - `Vary` header includes `Accept-Encoding`

#![deny(missing_docs)]

mod body;
mod cleanup;
mod codec;
mod compressor;
mod cycle;
mod encoder;
mod error;
mod framing;
mod future;
mod layer;
mod message;
mod negotiate;
mod service;
mod tracker;
mod transform;

#[cfg(test)]
mod testing;

pub use body::{EncodedBody, EncodedState};
pub use codec::{Codec, CodecSelector, DEFAULT_MIN_SIZE};
pub use compressor::{CodecCompressor, Compressor};
pub use cycle::{Representation, ResponseCycle};
pub use encoder::ContentEncoder;
pub use error::EncodeError;
pub use framing::Framing;
pub use future::ResponseFuture;
pub use layer::CompressionLayer;
pub use message::{AggregateMessage, BodyChunk, Message, ResponseHead};
pub use negotiate::{BodyKind, EncodeDecision, Encoding, SkipReason, negotiate, skip_reason};
pub use service::CompressionService;
pub use tracker::{RequestRecord, RequestTracker};
