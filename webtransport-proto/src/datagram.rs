use bytes::{Buf, BufMut, Bytes};
use thiserror::Error;

use crate::VarInt;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DatagramError {
    #[error("short read")]
    Incomplete,

    #[error("quarter stream id does not correspond to a client-initiated bidirectional stream")]
    InvalidQuarterStreamId,
}

/// An HTTP/3 DATAGRAM, per RFC 9297: a QUIC DATAGRAM frame payload prefixed
/// with the quarter stream id of the session's CONNECT stream.
#[derive(Debug, Clone)]
pub struct Datagram {
    pub quarter_stream_id: VarInt,
    pub payload: Bytes,
}

impl Datagram {
    pub fn new(session_stream_id: u64, payload: Bytes) -> Self {
        Datagram {
            quarter_stream_id: VarInt::from_u32((session_stream_id / 4) as u32),
            payload,
        }
    }

    pub fn session_stream_id(&self) -> u64 {
        self.quarter_stream_id.into_inner() * 4
    }

    pub fn decode(mut buf: Bytes) -> Result<Self, DatagramError> {
        let quarter_stream_id = VarInt::decode(&mut buf).map_err(|_| DatagramError::Incomplete)?;
        Ok(Datagram {
            quarter_stream_id,
            payload: buf,
        })
    }

    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        self.quarter_stream_id.encode(buf);
        buf.put_slice(&self.payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let datagram = Datagram::new(0, Bytes::from_static(b"hello"));

        let mut buf = Vec::new();
        datagram.encode(&mut buf);

        let decoded = Datagram::decode(Bytes::from(buf)).unwrap();
        assert_eq!(decoded.session_stream_id(), 0);
        assert_eq!(&decoded.payload[..], b"hello");
    }

    #[test]
    fn quarter_stream_id_recovers_session_stream_id() {
        // Client-initiated bidi stream 40 -> quarter id 10.
        let datagram = Datagram::new(40, Bytes::new());
        let mut buf = Vec::new();
        datagram.encode(&mut buf);

        assert_eq!(buf[0], 10);
        assert_eq!(Datagram::decode(Bytes::from(buf)).unwrap().session_stream_id(), 40);
    }

    #[test]
    fn truncated_is_incomplete() {
        assert_eq!(Datagram::decode(Bytes::new()), Err(DatagramError::Incomplete));
    }
}
