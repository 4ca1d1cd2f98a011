//! Test compressors and helpers shared by the unit tests.

use crate::compressor::Compressor;
use crate::message::ResponseHead;
use crate::negotiate::Encoding;
use bytes::Bytes;
use http::HeaderValue;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Counts lifecycle calls made on a test compressor.
#[derive(Debug, Default, Clone)]
pub(crate) struct Probe {
    created: Arc<AtomicUsize>,
    compresses: Arc<AtomicUsize>,
    finishes: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl Probe {
    pub(crate) fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub(crate) fn compresses(&self) -> usize {
        self.compresses.load(Ordering::SeqCst)
    }

    pub(crate) fn finishes(&self) -> usize {
        self.finishes.load(Ordering::SeqCst)
    }

    pub(crate) fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// Emits the decimal length of each input; `finish` emits nothing.
#[derive(Debug, Default)]
pub(crate) struct LengthCompressor {
    probe: Probe,
    echo: bool,
    fail_compress: bool,
    fail_close: bool,
    finished: bool,
    closed: bool,
}

impl LengthCompressor {
    pub(crate) fn with_probe(probe: Probe) -> Self {
        probe.created.fetch_add(1, Ordering::SeqCst);
        Self {
            probe,
            ..Self::default()
        }
    }

    /// Copies the input instead of printing its length.
    pub(crate) fn echo(mut self) -> Self {
        self.echo = true;
        self
    }

    pub(crate) fn failing_compress(mut self) -> Self {
        self.fail_compress = true;
        self
    }

    pub(crate) fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }
}

impl Compressor for LengthCompressor {
    fn compress(&mut self, input: Bytes) -> io::Result<Bytes> {
        self.probe.compresses.fetch_add(1, Ordering::SeqCst);
        if self.fail_compress {
            return Err(io::Error::other("compress failed"));
        }
        if self.echo {
            Ok(Bytes::copy_from_slice(&input))
        } else {
            Ok(Bytes::from(input.len().to_string()))
        }
    }

    fn finish(&mut self) -> io::Result<Bytes> {
        self.probe.finishes.fetch_add(1, Ordering::SeqCst);
        self.finished = true;
        Ok(Bytes::new())
    }

    fn is_finished(&self) -> bool {
        self.finished
    }

    fn close(&mut self) -> io::Result<()> {
        self.probe.closes.fetch_add(1, Ordering::SeqCst);
        self.closed = true;
        if self.fail_close {
            Err(io::Error::other("close failed"))
        } else {
            Ok(())
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Decision function labelling every response `test`.
pub(crate) fn length_encoding(
    probe: Probe,
) -> impl Fn(&ResponseHead, Option<&str>) -> Option<Encoding> + Clone {
    move |_, _| {
        Some(Encoding::new(
            HeaderValue::from_static("test"),
            LengthCompressor::with_probe(probe.clone()),
        ))
    }
}

struct Tracked {
    data: Vec<u8>,
    released: Arc<AtomicBool>,
}

impl AsRef<[u8]> for Tracked {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

/// A zeroed payload whose release can be observed through the returned flag.
pub(crate) fn tracked_payload(len: usize) -> (Bytes, Arc<AtomicBool>) {
    let released = Arc::new(AtomicBool::new(false));
    let bytes = Bytes::from_owner(Tracked {
        data: vec![0; len],
        released: released.clone(),
    });
    (bytes, released)
}
