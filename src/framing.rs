use http::{HeaderMap, HeaderValue, header};

/// How an encoded body is delimited on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// `Content-Length`, rewritten once the encoded size is known.
    Length,
    /// `Transfer-Encoding: chunked`.
    Chunked,
    /// No length header; the connection chooses the framing.
    Delegated,
}

impl Framing {
    /// Framing for a fully buffered body: keep length framing when the
    /// producer declared a length, otherwise fall back to chunked.
    pub fn for_aggregate(headers: &HeaderMap) -> Self {
        if headers.contains_key(header::CONTENT_LENGTH) {
            Framing::Length
        } else {
            Framing::Chunked
        }
    }
}

/// Rewrites the headers of a response that is about to be encoded.
///
/// Never called for pass-through responses: their headers, including any
/// transfer framing the producer chose, are left exactly as they are.
pub fn rewrite(headers: &mut HeaderMap, label: &HeaderValue, framing: Framing) {
    match framing {
        // The value is replaced once the encoded body length is known.
        Framing::Length => {}
        Framing::Chunked => {
            headers.remove(header::CONTENT_LENGTH);
            headers.insert(
                header::TRANSFER_ENCODING,
                HeaderValue::from_static("chunked"),
            );
        }
        Framing::Delegated => {
            headers.remove(header::CONTENT_LENGTH);
        }
    }

    headers.insert(header::CONTENT_ENCODING, label.clone());

    // Byte ranges of the identity body do not apply to the encoded one
    headers.remove(header::ACCEPT_RANGES);

    add_vary_accept_encoding(headers);
}

/// Sets `Content-Length` to the encoded body size.
pub fn set_content_length(headers: &mut HeaderMap, len: usize) {
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
}

/// Adds Accept-Encoding to the Vary header if not already present.
fn add_vary_accept_encoding(headers: &mut HeaderMap) {
    let covered = headers
        .get_all(header::VARY)
        .iter()
        .filter_map(|vary| vary.to_str().ok())
        .flat_map(|vary| vary.split(','))
        .map(str::trim)
        .any(|v| v.eq_ignore_ascii_case("*") || v.eq_ignore_ascii_case("accept-encoding"));

    if !covered {
        headers.append(
            header::VARY,
            HeaderValue::from_static("accept-encoding"),
        );
    }
}
