use crate::codec::Codec;
use bytes::{Bytes, BytesMut};
use compression_codecs::EncodeV2;
use compression_core::util::{PartialBuffer, WriteBuffer};
use std::io;

const OUTPUT_BUFFER_SIZE: usize = 8 * 1024; // 8KB output buffer

/// A stateful compression engine for one response body.
///
/// The encoder drives it as `compress`* → `finish` → `close`, and calls
/// `close` exactly once even when `finish` is never reached.
pub trait Compressor: Send {
    /// Compresses `input`, returning whatever output is ready.
    ///
    /// Ownership of `input` moves into the compressor; it is released once
    /// the call returns.
    fn compress(&mut self, input: Bytes) -> io::Result<Bytes>;

    /// Flushes the remaining output and ends the compressed stream.
    fn finish(&mut self) -> io::Result<Bytes>;

    /// Whether `finish` has completed.
    fn is_finished(&self) -> bool;

    /// Releases the compressor's resources.
    fn close(&mut self) -> io::Result<()>;

    /// Whether `close` has been called.
    fn is_closed(&self) -> bool;
}

impl<C: Compressor + ?Sized> Compressor for Box<C> {
    fn compress(&mut self, input: Bytes) -> io::Result<Bytes> {
        (**self).compress(input)
    }

    fn finish(&mut self) -> io::Result<Bytes> {
        (**self).finish()
    }

    fn is_finished(&self) -> bool {
        (**self).is_finished()
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }

    fn is_closed(&self) -> bool {
        (**self).is_closed()
    }
}

/// [`Compressor`] backed by a `compression-codecs` encoder.
pub struct CodecCompressor {
    encoder: Option<Box<dyn EncodeV2 + Send>>,
    output_buffer: Vec<u8>,
    always_flush: bool,
    finished: bool,
}

impl CodecCompressor {
    /// Creates a compressor for the given codec.
    ///
    /// With `always_flush`, every `compress` call flushes the encoder so each
    /// input chunk is decodable on arrival (event streams, gRPC-web).
    pub fn new(codec: Codec, always_flush: bool) -> Self {
        Self {
            encoder: Some(codec.encoder()),
            output_buffer: vec![0u8; OUTPUT_BUFFER_SIZE],
            always_flush,
            finished: false,
        }
    }

    /// Returns whether always flush is enabled.
    pub fn always_flush(&self) -> bool {
        self.always_flush
    }

    fn encoder(&mut self) -> io::Result<&mut Box<dyn EncodeV2 + Send>> {
        self.encoder
            .as_mut()
            .ok_or_else(|| io::Error::other("compressor is closed"))
    }
}

impl Compressor for CodecCompressor {
    fn compress(&mut self, input: Bytes) -> io::Result<Bytes> {
        if self.finished {
            return Err(io::Error::other("compressor already finished"));
        }

        let mut input_buf = PartialBuffer::new(&input[..]);
        let mut all_output = BytesMut::new();
        let Self {
            encoder,
            output_buffer,
            always_flush,
            ..
        } = self;
        let encoder = encoder
            .as_mut()
            .ok_or_else(|| io::Error::other("compressor is closed"))?;

        // Keep encoding until all input is consumed
        loop {
            let mut output = WriteBuffer::new_initialized(output_buffer.as_mut_slice());
            encoder.encode(&mut input_buf, &mut output)?;

            let written = output.written_len();
            if written > 0 {
                all_output.extend_from_slice(&output_buffer[..written]);
            }

            if input_buf.written_len() >= input.len() {
                break;
            }

            // Safety check to prevent infinite loop
            if written == 0 && input_buf.written_len() == 0 {
                break;
            }
        }

        if *always_flush {
            loop {
                let mut output = WriteBuffer::new_initialized(output_buffer.as_mut_slice());
                let done = encoder.flush(&mut output)?;
                let written = output.written_len();
                if written > 0 {
                    all_output.extend_from_slice(&output_buffer[..written]);
                }
                if done {
                    break;
                }
            }
        }

        Ok(all_output.freeze())
    }

    fn finish(&mut self) -> io::Result<Bytes> {
        if self.finished {
            return Ok(Bytes::new());
        }

        let mut all_output = BytesMut::new();
        loop {
            let mut buffer = std::mem::take(&mut self.output_buffer);
            let mut output = WriteBuffer::new_initialized(buffer.as_mut_slice());
            let result = self.encoder().and_then(|encoder| encoder.finish(&mut output));
            let written = output.written_len();
            all_output.extend_from_slice(&buffer[..written]);
            self.output_buffer = buffer;

            if result? {
                break;
            }
        }

        self.finished = true;
        Ok(all_output.freeze())
    }

    fn is_finished(&self) -> bool {
        self.finished
    }

    fn close(&mut self) -> io::Result<()> {
        self.encoder = None;
        self.output_buffer = Vec::new();
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.encoder.is_none()
    }
}
