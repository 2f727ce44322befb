//! Decoder for the engine's multiplexed stdout/stderr stream.
//!
//! When a container runs without a TTY the engine interleaves stdout and
//! stderr on one connection, prefixing every chunk with an 8-byte header:
//!
//! ```text
//! [stream_type: u8, 0, 0, 0, payload_len: u32 big-endian] payload...
//! ```
//!
//! `stream_type` is 0 (stdin), 1 (stdout) or 2 (stderr). The header must be
//! stripped before the payload is forwarded, otherwise every chunk starts
//! with eight bytes of binary garbage.

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::Decoder;

const HEADER_LEN: usize = 8;

/// Largest payload accepted from a frame header.
pub const MAX_FRAME_LEN: usize = 8 * 1024 * 1024;

/// Which standard stream a frame belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdStream {
    Stdin,
    Stdout,
    Stderr,
}

impl StdStream {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Self::Stdin),
            1 => Some(Self::Stdout),
            2 => Some(Self::Stderr),
            _ => None,
        }
    }
}

/// One de-framed payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StdFrame {
    pub stream: StdStream,
    pub payload: Bytes,
}

/// Streaming decoder; frames split across reads are reassembled.
#[derive(Debug, Default)]
pub struct StdFrameDecoder {
    /// Header of the frame currently being assembled.
    pending: Option<(StdStream, usize)>,
}

impl Decoder for StdFrameDecoder {
    type Item = StdFrame;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let (stream, len) = match self.pending {
            Some(header) => header,
            None => {
                if src.len() < HEADER_LEN {
                    return Ok(None);
                }
                let stream = StdStream::from_byte(src[0]).ok_or_else(|| {
                    std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        format!("unknown stream type {} in log frame header", src[0]),
                    )
                })?;
                let len = u32::from_be_bytes([src[4], src[5], src[6], src[7]]) as usize;
                if len > MAX_FRAME_LEN {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        format!("log frame of {len} bytes exceeds {MAX_FRAME_LEN}"),
                    ));
                }
                src.advance(HEADER_LEN);
                self.pending = Some((stream, len));
                (stream, len)
            }
        };

        if src.len() < len {
            src.reserve(len - src.len());
            return Ok(None);
        }
        self.pending = None;
        Ok(Some(StdFrame {
            stream,
            payload: src.split_to(len).freeze(),
        }))
    }
}
