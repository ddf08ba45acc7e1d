use bytes::{Buf, BufMut};

use crate::{VarInt, VarIntUnexpectedEnd};

/// Sent as the first varint of a unidirectional stream to identify its type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamUni(pub VarInt);

macro_rules! streams_uni {
    {$($name:ident = $val:expr,)*} => {
        impl StreamUni {
            $(pub const $name: StreamUni = StreamUni(VarInt::from_u32($val));)*
        }
    }
}

streams_uni! {
    CONTROL = 0x00,
    PUSH = 0x01,
    QPACK_ENCODER = 0x02,
    QPACK_DECODER = 0x03,
    WEBTRANSPORT = 0x54,
}

impl StreamUni {
    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self, VarIntUnexpectedEnd> {
        Ok(StreamUni(VarInt::decode(buf)?))
    }

    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        self.0.encode(buf)
    }

    /// HTTP/3 reserves `0x1f * N + 0x21` stream types for protocol greasing;
    /// a conforming receiver tolerates and ignores them instead of faulting.
    pub fn is_grease(&self) -> bool {
        let val = self.0.into_inner();
        val >= 0x21 && (val - 0x21) % 0x1f == 0
    }
}

/// The class of a QUIC stream, derived from the two low bits of its ID.
/// See RFC 9000 section 2.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamClass {
    ClientBidi,
    ServerBidi,
    ClientUni,
    ServerUni,
}

impl StreamClass {
    pub fn of(stream_id: u64) -> Self {
        match stream_id % 4 {
            0 => StreamClass::ClientBidi,
            1 => StreamClass::ServerBidi,
            2 => StreamClass::ClientUni,
            3 => StreamClass::ServerUni,
            _ => unreachable!(),
        }
    }

    pub fn is_bidi(&self) -> bool {
        matches!(self, StreamClass::ClientBidi | StreamClass::ServerBidi)
    }

    pub fn is_client_initiated(&self) -> bool {
        matches!(self, StreamClass::ClientBidi | StreamClass::ClientUni)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_class_from_id() {
        assert_eq!(StreamClass::of(0), StreamClass::ClientBidi);
        assert_eq!(StreamClass::of(1), StreamClass::ServerBidi);
        assert_eq!(StreamClass::of(2), StreamClass::ClientUni);
        assert_eq!(StreamClass::of(3), StreamClass::ServerUni);
        assert_eq!(StreamClass::of(4), StreamClass::ClientBidi);
    }

    #[test]
    fn grease_detection() {
        assert!(!StreamUni::CONTROL.is_grease());
        assert!(StreamUni(VarInt::from_u32(0x21)).is_grease());
        assert!(StreamUni(VarInt::from_u32(0x21 + 0x1f)).is_grease());
        assert!(!StreamUni(VarInt::from_u32(0x22)).is_grease());
    }
}
