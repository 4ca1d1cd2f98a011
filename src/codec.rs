use crate::compressor::CodecCompressor;
use crate::message::ResponseHead;
use crate::negotiate::{EncodeDecision, Encoding};
#[cfg(feature = "brotli")]
use compression_codecs::brotli::{BrotliEncoder, params::EncoderParams as BrotliParams};
#[cfg(feature = "deflate")]
use compression_codecs::deflate::DeflateEncoder;
#[cfg(feature = "gzip")]
use compression_codecs::gzip::GzipEncoder;
#[cfg(feature = "zstd")]
use compression_codecs::zstd::ZstdEncoder;
use compression_codecs::EncodeV2;
#[cfg(any(feature = "gzip", feature = "deflate"))]
use compression_core::Level;
use http::{HeaderMap, HeaderValue, header};

/// Default minimum body size for compression (approximately 1 MTU).
pub const DEFAULT_MIN_SIZE: usize = 860;

/// Supported compression codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// Zstd compression.
    #[cfg(feature = "zstd")]
    Zstd,
    /// Brotli compression.
    #[cfg(feature = "brotli")]
    Brotli,
    /// Gzip compression.
    #[cfg(feature = "gzip")]
    Gzip,
    /// Deflate compression.
    #[cfg(feature = "deflate")]
    Deflate,
}

impl Codec {
    /// Returns the Content-Encoding header value for this codec.
    pub fn content_encoding(&self) -> &'static str {
        match *self {
            #[cfg(feature = "zstd")]
            Codec::Zstd => "zstd",
            #[cfg(feature = "brotli")]
            Codec::Brotli => "br",
            #[cfg(feature = "gzip")]
            Codec::Gzip => "gzip",
            #[cfg(feature = "deflate")]
            Codec::Deflate => "deflate",
        }
    }

    /// Creates a new encoder for this codec.
    pub fn encoder(&self) -> Box<dyn EncodeV2 + Send> {
        match *self {
            #[cfg(feature = "zstd")]
            Codec::Zstd => Box::new(ZstdEncoder::new(3)), // level 3 is a good default
            #[cfg(feature = "brotli")]
            Codec::Brotli => Box::new(BrotliEncoder::new(BrotliParams::default())),
            #[cfg(feature = "gzip")]
            Codec::Gzip => Box::new(GzipEncoder::new(Level::Default.into())),
            #[cfg(feature = "deflate")]
            Codec::Deflate => Box::new(DeflateEncoder::new(Level::Default.into())),
        }
    }

    /// Tie-break order when two codecs share a quality value; lower wins.
    fn priority(&self) -> u8 {
        match *self {
            #[cfg(feature = "zstd")]
            Codec::Zstd => 0,
            #[cfg(feature = "brotli")]
            Codec::Brotli => 1,
            #[cfg(feature = "gzip")]
            Codec::Gzip => 2,
            #[cfg(feature = "deflate")]
            Codec::Deflate => 3,
        }
    }

    fn from_token(token: &str) -> Option<Codec> {
        match token.to_ascii_lowercase().as_str() {
            #[cfg(feature = "zstd")]
            "zstd" => Some(Codec::Zstd),
            #[cfg(feature = "brotli")]
            "br" | "brotli" => Some(Codec::Brotli),
            #[cfg(feature = "gzip")]
            "gzip" | "x-gzip" => Some(Codec::Gzip),
            #[cfg(feature = "deflate")]
            "deflate" => Some(Codec::Deflate),
            _ => None,
        }
    }

    /// Parses the Accept-Encoding header and returns the best supported codec.
    ///
    /// The header value is expected to be comma-separated encodings with optional
    /// quality values (e.g., "gzip, br;q=1.0, zstd;q=0.8").
    pub fn from_accept_encoding(header: &str) -> Option<Codec> {
        let mut best: Option<(Codec, f32)> = None;

        for part in header.split(',') {
            let (encoding, quality) = parse_encoding_with_quality(part.trim());

            if quality <= 0.0 {
                continue;
            }
            let Some(codec) = Codec::from_token(encoding) else {
                continue;
            };

            let better = match best {
                None => true,
                Some((current, best_quality)) => {
                    quality > best_quality
                        || (quality == best_quality && codec.priority() < current.priority())
                }
            };
            if better {
                best = Some((codec, quality));
            }
        }

        best.map(|(codec, _)| codec)
    }
}

/// Parses an encoding entry like "gzip" or "br;q=0.8" into (encoding, quality).
fn parse_encoding_with_quality(s: &str) -> (&str, f32) {
    let mut parts = s.splitn(2, ';');
    let encoding = parts.next().unwrap_or("").trim();

    let quality = parts
        .next()
        .and_then(|q| {
            let q = q.trim();
            q.strip_prefix("q=")
                .or_else(|| q.strip_prefix("Q="))
                .and_then(|v| v.trim().parse::<f32>().ok())
        })
        .unwrap_or(1.0);

    (encoding, quality)
}

/// The default [`EncodeDecision`]: picks a [`Codec`] from `Accept-Encoding`.
///
/// Declines to encode range responses, images other than SVG, gRPC other
/// than gRPC-web, and bodies whose declared length is below the minimum size.
#[derive(Debug, Clone, Copy)]
pub struct CodecSelector {
    min_size: usize,
}

impl CodecSelector {
    /// Creates a selector with the default minimum size of 860 bytes.
    pub fn new() -> Self {
        Self {
            min_size: DEFAULT_MIN_SIZE,
        }
    }

    /// Sets the minimum body size required for compression.
    ///
    /// Responses with a known Content-Length smaller than this value
    /// will not be compressed.
    pub fn min_size(mut self, size: usize) -> Self {
        self.min_size = size;
        self
    }

    /// Picks the codec for a response, or `None` to leave it unencoded.
    pub fn select(&self, head: &ResponseHead, accept_encoding: Option<&str>) -> Option<Codec> {
        let codec = Codec::from_accept_encoding(accept_encoding?)?;

        let eligible = !has_content_range(&head.headers)
            && !is_uncompressible_content_type(&head.headers)
            && !is_below_min_size(&head.headers, self.min_size);

        eligible.then_some(codec)
    }
}

impl Default for CodecSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl EncodeDecision for CodecSelector {
    fn begin_encode(&self, head: &ResponseHead, accept_encoding: Option<&str>) -> Option<Encoding> {
        let codec = self.select(head, accept_encoding)?;
        let always_flush = needs_flush(&head.headers);

        tracing::debug!(
            encoding = codec.content_encoding(),
            always_flush,
            "selected response codec"
        );

        Some(Encoding::new(
            HeaderValue::from_static(codec.content_encoding()),
            CodecCompressor::new(codec, always_flush),
        ))
    }
}

/// Checks if Content-Range header is present (range response).
fn has_content_range(headers: &HeaderMap) -> bool {
    headers.contains_key(header::CONTENT_RANGE)
}

/// Checks if the content type should not be compressed.
fn is_uncompressible_content_type(headers: &HeaderMap) -> bool {
    let Some(content_type) = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
    else {
        return false;
    };

    // Skip all images except SVG
    if content_type.starts_with("image/") {
        return !content_type.starts_with("image/svg+xml");
    }

    // Skip gRPC except grpc-web
    if content_type.starts_with("application/grpc") {
        return !content_type.starts_with("application/grpc-web");
    }

    false
}

/// Whether every chunk must be flushed as it is compressed.
fn needs_flush(headers: &HeaderMap) -> bool {
    let unbuffered = headers
        .get("x-accel-buffering")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("no"));

    unbuffered
        || headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| {
                ct.starts_with("text/event-stream") || ct.starts_with("application/grpc-web")
            })
}

/// Checks if Content-Length is below the minimum size.
fn is_below_min_size(headers: &HeaderMap, min_size: usize) -> bool {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
        .is_some_and(|len| len < min_size)
}
