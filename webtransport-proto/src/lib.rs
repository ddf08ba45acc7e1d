//! Wire-format core for WebTransport over HTTP/3: varints, QPACK over the
//! static table, typed HTTP/3 frames, SETTINGS, and Extended CONNECT.
//!
//! This crate is transport-agnostic - it has no knowledge of QUIC streams or
//! connections, only of bytes. `webtransport-quinn` drives it against a real
//! `quinn::Connection`.

mod connect;
mod datagram;
mod error;
mod frame;
mod qpack;
mod settings;
mod stream;
mod varint;

pub use connect::{ConnectError, ConnectRequest, ConnectResponse};
pub use datagram::{Datagram, DatagramError};
pub use error::{error_from_http3, error_to_http3};
pub use frame::{parse as parse_frame, Frame, FrameError, ParsedFrame};
pub use qpack::{DecodeError as QpackError, Headers};
pub use settings::{Setting, Settings, SettingsError};
pub use stream::{StreamClass, StreamUni};
pub use varint::{VarInt, VarIntBoundsExceeded, VarIntUnexpectedEnd};
