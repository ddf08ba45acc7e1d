//! WebTransport over HTTP/3, running on [`quinn`].
//!
//! This crate drives the `webtransport-proto` wire format against a real
//! `quinn::Connection`: the control-stream SETTINGS exchange, the
//! bidirectional Extended CONNECT request, and the resulting [`Session`]
//! handle for opening/accepting streams and exchanging datagrams.
//!
//! Scope is intentionally narrow: one WebTransport session per QUIC
//! connection, for the lifetime of that connection.

mod client;
mod connect;
mod error;
mod server;
mod session;
mod settings;
mod state;
mod stream;

pub use client::{connect, connect_with, ClientError};
pub use connect::{Connect, ConnectError};
pub use error::{CloseError, RecvError, SendError, WebTransportError};
pub use server::{accept, Request, ServerError};
pub use session::{Session, SessionError};
pub use settings::{ControlStream, SettingsError};
pub use state::{SessionProgress, SessionState};
pub use stream::{RecvStream, SendStream};

/// The ALPN token negotiated during the QUIC/TLS handshake for HTTP/3.
pub static ALPN: &[u8] = b"h3";
