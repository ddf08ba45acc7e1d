use bytes::BufMut;
use thiserror::Error;

use crate::VarInt;

/// An HTTP/3 frame type, carried as a leading varint on DATA/HEADERS/control streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Frame(pub VarInt);

macro_rules! frames {
    {$($name:ident = $val:expr,)*} => {
        impl Frame {
            $(pub const $name: Frame = Frame(VarInt::from_u32($val));)*
        }
    }
}

frames! {
    DATA = 0x00,
    HEADERS = 0x01,
    SETTINGS = 0x04,
    MAX_PUSH_ID = 0x0D,
    WEBTRANSPORT_STREAM = 0x41,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// The buffer doesn't yet hold a whole frame; the caller should buffer
    /// more bytes from the stream and retry.
    #[error("short read")]
    Incomplete,

    /// The declared frame length overflows a usize on this platform.
    #[error("frame too large")]
    TooLarge,
}

/// A frame parsed out of a byte slice, borrowing its payload from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedFrame<'a> {
    pub typ: Frame,
    pub payload: &'a [u8],
    /// Number of bytes of `buf` this frame occupied, header included.
    pub consumed: usize,
}

/// Parse a single frame from the front of `buf`.
///
/// This is a pure function: it never blocks and never mutates `buf`. A
/// truncated frame returns [`FrameError::Incomplete`]; the caller is
/// responsible for buffering more bytes from the stream and retrying with
/// the same prefix reparsed (see the per-stream accumulators in
/// `webtransport-quinn`).
pub fn parse(buf: &[u8]) -> Result<ParsedFrame<'_>, FrameError> {
    let mut cursor = buf;

    let typ = VarInt::decode(&mut cursor).map_err(|_| FrameError::Incomplete)?;
    let len = VarInt::decode(&mut cursor).map_err(|_| FrameError::Incomplete)?;

    let header_len = buf.len() - cursor.len();
    let len: usize = len.into_inner().try_into().map_err(|_| FrameError::TooLarge)?;

    if cursor.len() < len {
        return Err(FrameError::Incomplete);
    }

    Ok(ParsedFrame {
        typ: Frame(typ),
        payload: &cursor[..len],
        consumed: header_len + len,
    })
}

/// Encode a complete frame (header + payload) into `buf`.
pub fn encode<B: BufMut>(typ: Frame, payload: &[u8], buf: &mut B) {
    typ.0.encode(buf);
    VarInt::try_from(payload.len())
        .expect("frame payload larger than a varint can address")
        .encode(buf);
    buf.put_slice(payload);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let payload = b"hello";
        let mut buf = Vec::new();
        encode(Frame::HEADERS, payload, &mut buf);

        let parsed = parse(&buf).unwrap();
        assert_eq!(parsed.typ, Frame::HEADERS);
        assert_eq!(parsed.payload, payload);
        assert_eq!(parsed.consumed, buf.len());
    }

    #[test]
    fn truncated_payload_is_incomplete() {
        // HEADERS, len=5, but only 2 payload bytes present.
        let buf = [0x01, 0x05, 0x00, 0x01];
        assert_eq!(parse(&buf), Err(FrameError::Incomplete));

        let buf = [0x01, 0x05, 0x00, 0x01, 0x02, 0x03];
        assert_eq!(parse(&buf), Err(FrameError::Incomplete));

        let buf = [0x01, 0x05, 0x00, 0x01, 0x02, 0x03, 0x04];
        let parsed = parse(&buf).unwrap();
        assert_eq!(parsed.payload, &[0x00, 0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn unknown_type_still_parses() {
        let mut buf = Vec::new();
        encode(Frame(VarInt::from_u32(0x21)), b"grease", &mut buf);
        let parsed = parse(&buf).unwrap();
        assert_eq!(parsed.typ, Frame(VarInt::from_u32(0x21)));
    }
}
