use thiserror::Error;
use url::Url;

use webtransport_proto::{
    ConnectError as ConnectFrameError, ConnectRequest, ConnectResponse, VarInt,
};

use crate::{RecvStream, SendStream};

#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("failed to open connect stream: {0}")]
    Write(#[from] quinn::WriteError),

    #[error("failed to read connect stream: {0}")]
    Read(#[from] quinn::ReadError),

    #[error("connection closed: {0}")]
    Connection(#[from] quinn::ConnectionError),

    #[error("invalid connect exchange: {0}")]
    Decode(#[from] ConnectFrameError),
}

/// The bidirectional Extended CONNECT exchange that establishes a
/// WebTransport session on top of an already-negotiated control stream.
pub struct Connect {
    pub(crate) send: SendStream,
    pub(crate) recv: RecvStream,
    pub url: Url,
}

impl Connect {
    /// Client-side: open a new bidi stream and issue the CONNECT request.
    pub async fn open(conn: &quinn::Connection, url: Url) -> Result<Self, ConnectError> {
        let (mut send, mut recv) = conn.open_bi().await?;

        let request = ConnectRequest { url: url.clone() };
        let mut buf = Vec::new();
        request.encode(&mut buf);
        send.write_all(&buf).await?;

        let response = read_frame(&mut recv, ConnectResponse::decode).await?;
        log::debug!("connect response: {response:?}");

        Ok(Self {
            send: SendStream::new(send),
            recv: RecvStream::new(recv),
            url,
        })
    }

    /// Server-side: accept an incoming bidi stream and parse the CONNECT
    /// request, without yet responding.
    pub async fn accept(conn: &quinn::Connection) -> Result<Self, ConnectError> {
        let (send, mut recv) = conn.accept_bi().await?;

        let request = read_frame(&mut recv, ConnectRequest::decode).await?;
        log::debug!("connect request: {} on stream {:?}", request.url, recv.id());

        Ok(Self {
            send: SendStream::new(send),
            recv: RecvStream::new(recv),
            url: request.url,
        })
    }

    /// Server-side: respond to the CONNECT request with the given status.
    pub async fn respond(&mut self, status: u32) -> Result<(), ConnectError> {
        let response = ConnectResponse { status };
        let mut buf = Vec::new();
        response.encode(&mut buf);
        self.send.write_all(&buf).await?;
        Ok(())
    }

    /// The quarter stream id used to prefix HTTP/3 DATAGRAMs for this session.
    ///
    /// The CONNECT stream is always a client-initiated bidirectional stream,
    /// so its `index()` (the stream number within its type) is already the
    /// stream id divided by four - no extra arithmetic needed.
    pub fn session_id(&self) -> VarInt {
        VarInt::from_u32(self.recv.id().index() as u32)
    }
}

async fn read_frame<T, E>(
    recv: &mut quinn::RecvStream,
    decode: impl Fn(&[u8]) -> Result<(T, usize), E>,
) -> Result<T, ConnectError>
where
    ConnectError: From<E>,
    E: IsIncomplete,
{
    let mut buf = Vec::new();
    loop {
        match decode(&buf) {
            Ok((value, _consumed)) => return Ok(value),
            Err(e) if e.is_incomplete() => match recv.read_chunk(4096, true).await? {
                Some(chunk) => buf.extend_from_slice(&chunk.bytes),
                None => return Err(e.into()),
            },
            Err(e) => return Err(e.into()),
        }
    }
}

trait IsIncomplete {
    fn is_incomplete(&self) -> bool;
}

impl IsIncomplete for ConnectFrameError {
    fn is_incomplete(&self) -> bool {
        matches!(self, ConnectFrameError::Incomplete)
    }
}
