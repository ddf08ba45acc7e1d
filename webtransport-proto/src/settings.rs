use std::collections::HashMap;

use bytes::{Buf, BufMut};
use thiserror::Error;

use crate::{frame, Frame, StreamUni, VarInt};

/// A SETTINGS identifier, carried as a varint key in the id/value pairs of a
/// SETTINGS frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Setting(pub VarInt);

macro_rules! settings {
    {$($name:ident = $val:expr,)*} => {
        impl Setting {
            $(pub const $name: Setting = Setting(VarInt::from_u32($val));)*
        }
    }
}

settings! {
    QPACK_MAX_TABLE_CAPACITY = 0x01,
    MAX_FIELD_SECTION_SIZE = 0x06,
    ENABLE_WEBTRANSPORT = 0x2B603742,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    #[error("short read")]
    Incomplete,

    #[error("frame too large")]
    TooLarge,

    #[error("control stream did not start with the control stream type")]
    WrongStreamType,

    #[error("control stream did not start with a SETTINGS frame")]
    MissingSettings,

    #[error("a SETTINGS frame was received more than once on the control stream")]
    Duplicate,

    #[error("a frame type that isn't permitted on the control stream was received")]
    UnexpectedFrame,
}

impl From<frame::FrameError> for SettingsError {
    fn from(e: frame::FrameError) -> Self {
        match e {
            frame::FrameError::Incomplete => SettingsError::Incomplete,
            frame::FrameError::TooLarge => SettingsError::TooLarge,
        }
    }
}

/// The id/value pairs of a SETTINGS frame.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Settings(HashMap<Setting, VarInt>);

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: Setting) -> Option<VarInt> {
        self.0.get(&id).copied()
    }

    pub fn insert(&mut self, id: Setting, value: VarInt) {
        self.0.insert(id, value);
    }

    /// Set the one flag a WebTransport session actually cares about.
    pub fn enable_webtransport(&mut self) {
        self.0.insert(Setting::ENABLE_WEBTRANSPORT, VarInt::from_u32(1));
    }

    pub fn supports_webtransport(&self) -> bool {
        self.get(Setting::ENABLE_WEBTRANSPORT).map(|v| v.into_inner()) == Some(1)
    }

    /// Decode a SETTINGS frame body: a sequence of (id, value) varint pairs
    /// filling the buffer exactly.
    pub fn decode_payload(mut payload: &[u8]) -> Self {
        let mut settings = HashMap::new();

        while payload.has_remaining() {
            let id = match VarInt::decode(&mut payload) {
                Ok(id) => id,
                Err(_) => break,
            };
            let value = match VarInt::decode(&mut payload) {
                Ok(value) => value,
                Err(_) => break,
            };
            settings.insert(Setting(id), value);
        }

        Self(settings)
    }

    pub fn encode_payload<B: BufMut>(&self, buf: &mut B) {
        for (id, value) in &self.0 {
            id.0.encode(buf);
            value.encode(buf);
        }
    }

    /// Encode the control-stream preamble: the CONTROL stream type byte
    /// followed by a SETTINGS frame carrying these values.
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        StreamUni::CONTROL.encode(buf);

        let mut payload = Vec::new();
        self.encode_payload(&mut payload);
        frame::encode(Frame::SETTINGS, &payload, buf);
    }

    /// Parse the control-stream preamble out of `buf`, which must hold a
    /// complete stream-type byte and SETTINGS frame. Returns the settings and
    /// the number of bytes consumed.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize), SettingsError> {
        let mut cursor = buf;

        let stream_type = StreamUni::decode(&mut cursor).map_err(|_| SettingsError::Incomplete)?;
        if stream_type != StreamUni::CONTROL {
            return Err(SettingsError::WrongStreamType);
        }
        let stream_header_len = buf.len() - cursor.len();

        let parsed = frame::parse(cursor)?;
        if parsed.typ != Frame::SETTINGS {
            return Err(SettingsError::MissingSettings);
        }

        let settings = Self::decode_payload(parsed.payload);
        Ok((settings, stream_header_len + parsed.consumed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let mut settings = Settings::new();
        settings.enable_webtransport();
        settings.insert(Setting::MAX_FIELD_SECTION_SIZE, VarInt::from_u32(16384));

        let mut buf = Vec::new();
        settings.encode(&mut buf);

        let (decoded, consumed) = Settings::decode(&buf).unwrap();
        assert_eq!(consumed, buf.len());
        assert!(decoded.supports_webtransport());
        assert_eq!(
            decoded.get(Setting::MAX_FIELD_SECTION_SIZE),
            Some(VarInt::from_u32(16384))
        );
    }

    #[test]
    fn minimal_encoding() {
        // CONTROL(0x00) SETTINGS(0x04) len(3) ENABLE_WEBTRANSPORT-as-varint(1) value(1)
        // ENABLE_WEBTRANSPORT = 0x2B603742 needs the 4-byte varint form.
        let mut settings = Settings::new();
        settings.enable_webtransport();

        let mut buf = Vec::new();
        settings.encode(&mut buf);

        assert_eq!(buf[0], 0x00); // control stream type
        assert_eq!(buf[1], 0x04); // SETTINGS frame type

        let (decoded, consumed) = Settings::decode(&buf).unwrap();
        assert_eq!(consumed, buf.len());
        assert!(decoded.supports_webtransport());
    }

    #[test]
    fn wrong_stream_type_is_rejected() {
        let mut buf = Vec::new();
        StreamUni::QPACK_ENCODER.encode(&mut buf);
        frame::encode(Frame::SETTINGS, &[], &mut buf);

        assert_eq!(Settings::decode(&buf), Err(SettingsError::WrongStreamType));
    }

    #[test]
    fn missing_settings_frame_is_rejected() {
        let mut buf = Vec::new();
        StreamUni::CONTROL.encode(&mut buf);
        frame::encode(Frame::DATA, &[], &mut buf);

        assert_eq!(Settings::decode(&buf), Err(SettingsError::MissingSettings));
    }

    #[test]
    fn unknown_ids_are_ignored() {
        let mut payload = Vec::new();
        VarInt::from_u32(0x1234).encode(&mut payload);
        VarInt::from_u32(7).encode(&mut payload);

        let settings = Settings::decode_payload(&payload);
        assert_eq!(settings.get(Setting(VarInt::from_u32(0x1234))), Some(VarInt::from_u32(7)));
        assert!(!settings.supports_webtransport());
    }
}
