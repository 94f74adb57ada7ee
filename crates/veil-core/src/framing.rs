//! Message framing over byte streams.
//!
//! A stream transport gives no guarantee that one write arrives as one read,
//! so message boundaries have to be recovered on the receiving side. Three
//! strategies are supported:
//!
//! ```text
//! NulDelimited:    [json bytes][0x00]
//! LengthPrefixed:  [4 bytes: big-endian length][json bytes]
//! Unframed:        [json object][json object]...
//! ```
//!
//! `Unframed` writes bare JSON objects back to back, as peers that send one
//! `json.dumps(..)` per socket write do, and finds boundaries by parsing.
//!
//! `FrameDecoder` accumulates arbitrary chunks and yields complete frames,
//! so a message split across reads, or several messages in one read, decode
//! the same way.

use std::fmt;
use std::str::FromStr;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::de::IgnoredAny;
use thiserror::Error;
use tracing::debug;

/// Default upper bound on a single frame (1 MiB).
pub const DEFAULT_MAX_FRAME_LEN: usize = 1024 * 1024;

const LENGTH_PREFIX_LEN: usize = 4;
const NUL: u8 = 0x00;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame of {len} bytes exceeds limit of {max}")]
    TooLarge { len: usize, max: usize },

    #[error("payload contains a NUL byte and cannot be NUL-delimited")]
    EmbeddedNul,

    #[error("unknown framing: {0}")]
    UnknownFraming(String),

    #[error("invalid JSON in unframed stream: {0}")]
    InvalidJson(String),
}

/// How frames are delimited on the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Framing {
    /// Payload followed by a single `0x00` byte.
    #[default]
    NulDelimited,
    /// 4-byte big-endian length followed by the payload.
    LengthPrefixed,
    /// Bare JSON objects with no delimiter.
    Unframed,
}

impl FromStr for Framing {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nul" | "nul-delimited" => Ok(Framing::NulDelimited),
            "length" | "length-prefixed" => Ok(Framing::LengthPrefixed),
            "json" | "unframed" => Ok(Framing::Unframed),
            other => Err(FrameError::UnknownFraming(other.to_string())),
        }
    }
}

impl fmt::Display for Framing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Framing::NulDelimited => f.write_str("nul-delimited"),
            Framing::LengthPrefixed => f.write_str("length-prefixed"),
            Framing::Unframed => f.write_str("unframed"),
        }
    }
}

/// Delimit `payload` for writing to the stream.
pub fn encode_frame(framing: Framing, payload: &[u8], max_len: usize) -> Result<Bytes, FrameError> {
    if payload.len() > max_len {
        return Err(FrameError::TooLarge {
            len: payload.len(),
            max: max_len,
        });
    }

    match framing {
        Framing::NulDelimited => {
            if payload.contains(&NUL) {
                return Err(FrameError::EmbeddedNul);
            }
            let mut buf = BytesMut::with_capacity(payload.len() + 1);
            buf.put_slice(payload);
            buf.put_u8(NUL);
            Ok(buf.freeze())
        }
        Framing::LengthPrefixed => {
            let len = u32::try_from(payload.len()).map_err(|_| FrameError::TooLarge {
                len: payload.len(),
                max: u32::MAX as usize,
            })?;
            let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_LEN + payload.len());
            buf.put_u32(len);
            buf.put_slice(payload);
            Ok(buf.freeze())
        }
        Framing::Unframed => {
            // The decoder only recognises objects.
            match payload.iter().find(|b| !b.is_ascii_whitespace()) {
                Some(&b'{') => Ok(Bytes::copy_from_slice(payload)),
                _ => Err(FrameError::InvalidJson("payload is not a JSON object".into())),
            }
        }
    }
}

/// Incremental frame decoder.
pub struct FrameDecoder {
    framing: Framing,
    max_frame_len: usize,
    buf: BytesMut,
    /// Prefix of `buf` already searched without finding a frame end.
    scanned: usize,
}

impl FrameDecoder {
    pub fn new(framing: Framing, max_frame_len: usize) -> Self {
        Self {
            framing,
            max_frame_len,
            buf: BytesMut::new(),
            scanned: 0,
        }
    }

    /// Append a chunk read from the stream.
    pub fn push(&mut self, chunk: &[u8]) {
        debug!("received chunk of {} bytes", chunk.len());
        self.buf.extend_from_slice(chunk);
    }

    /// Bytes buffered but not yet returned as a frame.
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    /// Pop the next complete frame, if one is buffered.
    ///
    /// Returns `Ok(None)` when more input is needed. A `TooLarge` error is
    /// not recoverable: the stream position is lost and the decoder should
    /// be discarded.
    pub fn next_frame(&mut self) -> Result<Option<Bytes>, FrameError> {
        match self.framing {
            Framing::NulDelimited => self.next_nul_delimited(),
            Framing::LengthPrefixed => self.next_length_prefixed(),
            Framing::Unframed => self.next_json_object(),
        }
    }

    fn next_nul_delimited(&mut self) -> Result<Option<Bytes>, FrameError> {
        let found = self.buf[self.scanned..]
            .iter()
            .position(|&b| b == NUL)
            .map(|i| self.scanned + i);

        match found {
            Some(end) => {
                if end > self.max_frame_len {
                    return Err(FrameError::TooLarge {
                        len: end,
                        max: self.max_frame_len,
                    });
                }
                let frame = self.buf.split_to(end).freeze();
                self.buf.advance(1);
                self.scanned = 0;
                debug!("complete frame found ({} bytes)", frame.len());
                Ok(Some(frame))
            }
            None => {
                self.scanned = self.buf.len();
                self.check_incomplete_len()
            }
        }
    }

    fn next_json_object(&mut self) -> Result<Option<Bytes>, FrameError> {
        let start = self.buf.iter().position(|b| !b.is_ascii_whitespace());
        match start {
            None => {
                self.buf.clear();
                self.scanned = 0;
                return Ok(None);
            }
            Some(start) => {
                self.buf.advance(start);
                self.scanned = self.scanned.saturating_sub(start);
            }
        }

        if self.buf[0] != b'{' {
            return Err(FrameError::InvalidJson("expected a JSON object".into()));
        }

        // An object can only have completed if a closing brace arrived
        // since the last attempt.
        let closed = self.buf[self.scanned..].contains(&b'}');
        self.scanned = self.buf.len();
        if !closed {
            return self.check_incomplete_len();
        }

        let parsed = {
            let mut values =
                serde_json::Deserializer::from_slice(&self.buf).into_iter::<IgnoredAny>();
            match values.next() {
                Some(Ok(_)) => Ok(Some(values.byte_offset())),
                Some(Err(e)) if e.is_eof() => Ok(None),
                Some(Err(e)) => Err(FrameError::InvalidJson(e.to_string())),
                None => Ok(None),
            }
        };

        match parsed? {
            Some(end) => {
                if end > self.max_frame_len {
                    return Err(FrameError::TooLarge {
                        len: end,
                        max: self.max_frame_len,
                    });
                }
                let frame = self.buf.split_to(end).freeze();
                self.scanned = 0;
                debug!("complete frame found ({} bytes)", frame.len());
                Ok(Some(frame))
            }
            None => self.check_incomplete_len(),
        }
    }

    /// No complete frame is buffered; fail once the partial one is too big.
    fn check_incomplete_len(&self) -> Result<Option<Bytes>, FrameError> {
        if self.buf.len() > self.max_frame_len {
            return Err(FrameError::TooLarge {
                len: self.buf.len(),
                max: self.max_frame_len,
            });
        }
        Ok(None)
    }

    fn next_length_prefixed(&mut self) -> Result<Option<Bytes>, FrameError> {
        if self.buf.len() < LENGTH_PREFIX_LEN {
            return Ok(None);
        }

        let mut prefix = [0u8; LENGTH_PREFIX_LEN];
        prefix.copy_from_slice(&self.buf[..LENGTH_PREFIX_LEN]);
        let len = u32::from_be_bytes(prefix) as usize;

        if len > self.max_frame_len {
            return Err(FrameError::TooLarge {
                len,
                max: self.max_frame_len,
            });
        }

        if self.buf.len() < LENGTH_PREFIX_LEN + len {
            self.buf.reserve(LENGTH_PREFIX_LEN + len - self.buf.len());
            return Ok(None);
        }

        self.buf.advance(LENGTH_PREFIX_LEN);
        let frame = self.buf.split_to(len).freeze();
        debug!("complete frame found ({} bytes)", frame.len());
        Ok(Some(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(decoder: &mut FrameDecoder) -> Vec<Bytes> {
        let mut frames = Vec::new();
        while let Some(frame) = decoder.next_frame().unwrap() {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn test_nul_frame_layout() {
        let frame = encode_frame(Framing::NulDelimited, b"{}", DEFAULT_MAX_FRAME_LEN).unwrap();
        assert_eq!(&frame[..], b"{}\0");
    }

    #[test]
    fn test_length_prefixed_layout() {
        let frame = encode_frame(Framing::LengthPrefixed, b"{}", DEFAULT_MAX_FRAME_LEN).unwrap();
        assert_eq!(&frame[..], &[0, 0, 0, 2, b'{', b'}']);
    }

    #[test]
    fn test_nul_frame_split_across_chunks() {
        let frame = encode_frame(
            Framing::NulDelimited,
            br#"{"event":"handshake","publicKey":"AQID"}"#,
            DEFAULT_MAX_FRAME_LEN,
        )
        .unwrap();

        let mut decoder = FrameDecoder::new(Framing::NulDelimited, DEFAULT_MAX_FRAME_LEN);
        let mid = frame.len() / 2;

        decoder.push(&frame[..mid]);
        assert_eq!(decoder.next_frame().unwrap(), None);

        decoder.push(&frame[mid..]);
        let decoded = decoder.next_frame().unwrap().unwrap();
        assert_eq!(&decoded[..], &frame[..frame.len() - 1]);
        assert_eq!(decoder.buffered_len(), 0);
    }

    #[test]
    fn test_several_frames_in_one_chunk() {
        for framing in [Framing::NulDelimited, Framing::LengthPrefixed] {
            let mut wire = Vec::new();
            for payload in [&b"first"[..], b"second", b"third"] {
                wire.extend_from_slice(&encode_frame(framing, payload, 64).unwrap());
            }

            let mut decoder = FrameDecoder::new(framing, 64);
            decoder.push(&wire);
            let frames = decode_all(&mut decoder);

            assert_eq!(frames.len(), 3, "{framing}");
            assert_eq!(&frames[0][..], b"first");
            assert_eq!(&frames[1][..], b"second");
            assert_eq!(&frames[2][..], b"third");
        }
    }

    #[test]
    fn test_length_prefixed_byte_by_byte() {
        let frame = encode_frame(Framing::LengthPrefixed, b"hello", 64).unwrap();
        let mut decoder = FrameDecoder::new(Framing::LengthPrefixed, 64);

        for (i, byte) in frame.iter().enumerate() {
            decoder.push(&[*byte]);
            let next = decoder.next_frame().unwrap();
            if i + 1 < frame.len() {
                assert!(next.is_none());
            } else {
                assert_eq!(&next.unwrap()[..], b"hello");
            }
        }
    }

    #[test]
    fn test_embedded_nul_rejected() {
        assert_eq!(
            encode_frame(Framing::NulDelimited, b"a\0b", 64),
            Err(FrameError::EmbeddedNul)
        );
        // Length prefixing has no such restriction.
        assert!(encode_frame(Framing::LengthPrefixed, b"a\0b", 64).is_ok());
    }

    #[test]
    fn test_oversized_payload_rejected_on_encode() {
        let payload = vec![b'x'; 65];
        assert!(matches!(
            encode_frame(Framing::LengthPrefixed, &payload, 64),
            Err(FrameError::TooLarge { len: 65, max: 64 })
        ));
    }

    #[test]
    fn test_unterminated_nul_stream_bounded() {
        let mut decoder = FrameDecoder::new(Framing::NulDelimited, 16);
        decoder.push(&[b'x'; 16]);
        assert_eq!(decoder.next_frame().unwrap(), None);
        decoder.push(b"x");
        assert!(matches!(
            decoder.next_frame(),
            Err(FrameError::TooLarge { len: 17, max: 16 })
        ));
    }

    #[test]
    fn test_oversized_length_prefix_rejected_early() {
        let mut decoder = FrameDecoder::new(Framing::LengthPrefixed, 1024);
        decoder.push(&u32::MAX.to_be_bytes());
        assert!(matches!(
            decoder.next_frame(),
            Err(FrameError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_framing_from_str() {
        assert_eq!("nul".parse::<Framing>().unwrap(), Framing::NulDelimited);
        assert_eq!(
            "Length-Prefixed".parse::<Framing>().unwrap(),
            Framing::LengthPrefixed
        );
        assert_eq!("json".parse::<Framing>().unwrap(), Framing::Unframed);
        assert!("carrier-pigeon".parse::<Framing>().is_err());
        assert_eq!(Framing::default(), Framing::NulDelimited);
    }

    #[test]
    fn test_nul_search_resumes_after_scanned_prefix() {
        let mut decoder = FrameDecoder::new(Framing::NulDelimited, 1024);
        for _ in 0..10 {
            decoder.push(&[b'x'; 50]);
            assert_eq!(decoder.next_frame().unwrap(), None);
            assert_eq!(decoder.scanned, decoder.buffered_len());
        }

        decoder.push(b"y\0{}");
        let frame = decoder.next_frame().unwrap().unwrap();
        assert_eq!(frame.len(), 501);
        assert_eq!(decoder.scanned, 0);
        assert_eq!(decoder.buffered_len(), 2);
    }

    #[test]
    fn test_unframed_writes_bare_json() {
        let frame = encode_frame(Framing::Unframed, br#"{"event":"handshake"}"#, 64).unwrap();
        assert_eq!(&frame[..], br#"{"event":"handshake"}"#);

        assert!(matches!(
            encode_frame(Framing::Unframed, b"[1,2]", 64),
            Err(FrameError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_unframed_objects_back_to_back_byte_by_byte() {
        let wire = br#"{"a":{"b":"}"}}  {"c":[1,2]}"#;
        let mut decoder = FrameDecoder::new(Framing::Unframed, 64);
        let mut frames = Vec::new();

        for byte in wire.iter() {
            decoder.push(&[*byte]);
            frames.extend(decode_all(&mut decoder));
        }

        assert_eq!(frames.len(), 2);
        assert_eq!(&frames[0][..], br#"{"a":{"b":"}"}}"#);
        assert_eq!(&frames[1][..], br#"{"c":[1,2]}"#);
        assert_eq!(decoder.buffered_len(), 0);
    }

    #[test]
    fn test_unframed_several_objects_in_one_chunk() {
        let mut decoder = FrameDecoder::new(Framing::Unframed, 64);
        decoder.push(b"{\"n\":1}{\"n\":2}\n{\"n\":");
        let frames = decode_all(&mut decoder);

        assert_eq!(frames.len(), 2);
        assert_eq!(&frames[1][..], b"{\"n\":2}");
        assert_eq!(decoder.next_frame().unwrap(), None);

        decoder.push(b"3}");
        assert_eq!(&decoder.next_frame().unwrap().unwrap()[..], b"{\"n\":3}");
    }

    #[test]
    fn test_unframed_rejects_garbage() {
        let mut decoder = FrameDecoder::new(Framing::Unframed, 64);
        decoder.push(b"hello");
        assert!(matches!(
            decoder.next_frame(),
            Err(FrameError::InvalidJson(_))
        ));

        let mut decoder = FrameDecoder::new(Framing::Unframed, 64);
        decoder.push(b"{\"a\" 1}");
        assert!(matches!(
            decoder.next_frame(),
            Err(FrameError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_unframed_incomplete_object_bounded() {
        let mut decoder = FrameDecoder::new(Framing::Unframed, 16);
        decoder.push(b"{\"pad\":\"");
        decoder.push(&[b'x'; 7]);
        assert_eq!(decoder.next_frame().unwrap(), None);

        decoder.push(b"xx");
        assert!(matches!(
            decoder.next_frame(),
            Err(FrameError::TooLarge { len: 17, max: 16 })
        ));
    }
}
