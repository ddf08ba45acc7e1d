use thiserror::Error;

use webtransport_proto::{parse_frame, Frame, FrameError, Settings as SettingsFrame, SettingsError as SettingsFrameError};

use crate::SendStream;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to open control stream: {0}")]
    Write(#[from] quinn::WriteError),

    #[error("failed to read control stream: {0}")]
    Read(#[from] quinn::ReadError),

    #[error("connection closed: {0}")]
    Connection(#[from] quinn::ConnectionError),

    #[error("invalid control stream: {0}")]
    Decode(#[from] SettingsFrameError),

    #[error("peer did not enable webtransport")]
    WebTransportDisabled,
}

/// HTTP/3 error codes used to close the connection on a control-stream
/// protocol violation. See RFC 9114 section 8.1.
const H3_FRAME_UNEXPECTED: u32 = 0x105;
const H3_EXCESSIVE_LOAD: u32 = 0x107;

/// Drives the control-stream handshake: both peers open a unidirectional
/// control stream and exchange a single SETTINGS frame enabling WebTransport.
/// Once established, a background task keeps reading the peer's control
/// stream for the life of the connection: a second SETTINGS frame, or a
/// DATA/HEADERS frame, is a fatal protocol error there.
pub struct ControlStream {
    /// Kept alive only so quinn doesn't reset our half of the stream the
    /// moment this handle is dropped.
    #[allow(dead_code)]
    send: SendStream,
}

impl ControlStream {
    /// Open our control stream and accept the peer's, concurrently.
    pub async fn connect(conn: &quinn::Connection) -> Result<Self, SettingsError> {
        let (send, (recv, buf)) = futures::try_join!(Self::open(conn), Self::accept(conn))?;
        tokio::spawn(watch(conn.clone(), recv, buf));
        Ok(Self { send })
    }

    async fn open(conn: &quinn::Connection) -> Result<SendStream, SettingsError> {
        let mut send = conn.open_uni().await?;

        let mut settings = SettingsFrame::new();
        settings.enable_webtransport();

        let mut buf = Vec::new();
        settings.encode(&mut buf);
        send.write_all(&buf).await?;

        Ok(SendStream::new(send))
    }

    /// Accept the peer's control stream and read its first (and only
    /// permitted) SETTINGS frame, returning the raw stream and any
    /// already-buffered bytes past that frame for `watch` to keep reading.
    async fn accept(conn: &quinn::Connection) -> Result<(quinn::RecvStream, Vec<u8>), SettingsError> {
        let mut recv = conn.accept_uni().await?;

        let mut buf = Vec::new();
        let (settings, consumed) = loop {
            match SettingsFrame::decode(&buf) {
                Ok(pair) => break pair,
                Err(SettingsFrameError::Incomplete) => {
                    let chunk = recv.read_chunk(1024, true).await?;
                    match chunk {
                        Some(chunk) => buf.extend_from_slice(&chunk.bytes),
                        None => return Err(SettingsFrameError::Incomplete.into()),
                    }
                }
                Err(e) => return Err(e.into()),
            }
        };

        if !settings.supports_webtransport() {
            return Err(SettingsError::WebTransportDisabled);
        }

        buf.drain(..consumed);
        Ok((recv, buf))
    }
}

/// Reads whatever follows the first SETTINGS frame on the peer's control
/// stream for the rest of the connection's life, closing it the moment the
/// peer violates the "exactly one SETTINGS frame, nothing else but control
/// frames" invariant. Unknown/greased frame types are tolerated.
async fn watch(conn: quinn::Connection, mut recv: quinn::RecvStream, mut buf: Vec<u8>) {
    loop {
        match parse_frame(&buf) {
            Ok(parsed) => {
                match parsed.typ {
                    Frame::SETTINGS => {
                        log::error!("{}", SettingsFrameError::Duplicate);
                        conn.close(
                            quinn::VarInt::from_u32(H3_FRAME_UNEXPECTED),
                            b"duplicate SETTINGS frame on control stream",
                        );
                        return;
                    }
                    Frame::DATA | Frame::HEADERS => {
                        log::error!("{}", SettingsFrameError::UnexpectedFrame);
                        conn.close(
                            quinn::VarInt::from_u32(H3_FRAME_UNEXPECTED),
                            b"unexpected frame on control stream",
                        );
                        return;
                    }
                    _ => {}
                }
                buf.drain(..parsed.consumed);
            }
            Err(FrameError::TooLarge) => {
                conn.close(
                    quinn::VarInt::from_u32(H3_EXCESSIVE_LOAD),
                    b"control stream frame too large",
                );
                return;
            }
            Err(FrameError::Incomplete) => match recv.read_chunk(1024, true).await {
                Ok(Some(chunk)) => buf.extend_from_slice(&chunk.bytes),
                Ok(None) => return,
                Err(_) => return,
            },
        }
    }
}
