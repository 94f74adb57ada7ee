//! Frame-level reads and writes on an async stream.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;
use veil_core::{encode_frame, FrameDecoder, Framing};

use crate::error::ChannelError;

const READ_CHUNK: usize = 4096;

/// A byte stream plus the framing state needed to read whole messages.
pub struct FramedStream<S> {
    stream: S,
    decoder: FrameDecoder,
    framing: Framing,
    max_frame_len: usize,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, framing: Framing, max_frame_len: usize) -> Self {
        Self {
            stream,
            decoder: FrameDecoder::new(framing, max_frame_len),
            framing,
            max_frame_len,
        }
    }

    /// Delimit and write one frame, then flush.
    pub async fn write_frame(&mut self, payload: &[u8]) -> Result<(), ChannelError> {
        let frame = encode_frame(self.framing, payload, self.max_frame_len)?;
        self.stream.write_all(&frame).await?;
        self.stream.flush().await?;
        debug!("sent frame ({} bytes)", payload.len());
        Ok(())
    }

    /// Read until one complete frame is buffered and return it.
    ///
    /// EOF before a complete frame is `ChannelError::Closed`.
    pub async fn read_frame(&mut self) -> Result<Vec<u8>, ChannelError> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if let Some(frame) = self.decoder.next_frame()? {
                return Ok(frame.to_vec());
            }

            let n = self.stream.read(&mut chunk).await?;
            if n == 0 {
                if self.decoder.buffered_len() > 0 {
                    debug!(
                        "connection closed with {} bytes of partial frame",
                        self.decoder.buffered_len()
                    );
                }
                return Err(ChannelError::Closed);
            }
            self.decoder.push(&chunk[..n]);
        }
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}
