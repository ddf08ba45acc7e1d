use std::ops::Deref;
use std::sync::{Arc, Mutex as StdMutex};

use bytes::{Bytes, BytesMut};
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use thiserror::Error;
use tokio::sync::Mutex;

use webtransport_proto::{error_to_http3, Datagram, Frame, StreamUni, VarInt};

use crate::{CloseError, RecvStream, SendStream, SessionProgress, SessionState};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("connection closed: {0}")]
    Connection(#[from] quinn::ConnectionError),

    #[error("failed to write stream header: {0}")]
    Write(#[from] quinn::WriteError),

    #[error("failed to read stream header: {0}")]
    Read(#[from] quinn::ReadError),

    #[error("failed to send datagram: {0}")]
    SendDatagram(#[from] quinn::SendDatagramError),

    #[error("session is closed")]
    SessionClosed,
}

/// An established WebTransport session: a bidirectional handle for opening
/// and accepting unidirectional and bidirectional streams, and for sending
/// and receiving datagrams, all scoped to this session's CONNECT stream.
///
/// Mirrors the underlying QUIC connection one-to-one; this crate only
/// supports a single WebTransport session per connection.
#[derive(Clone)]
pub struct Session {
    conn: quinn::Connection,
    accept: Arc<Mutex<SessionAccept>>,
    session_id: VarInt,
    header_uni: Bytes,
    header_bi: Bytes,
    progress: Arc<StdMutex<SessionProgress>>,
}

impl Session {
    /// `progress` reflects how the handshake leading up to this session was
    /// actually driven (see `client::connect_with`/`server::Request::ok`) -
    /// by the time a `Session` exists, both Established preconditions have
    /// already been satisfied.
    pub(crate) fn new(conn: quinn::Connection, session_id: VarInt, progress: SessionProgress) -> Self {
        let mut header_uni = Vec::new();
        StreamUni::WEBTRANSPORT.encode(&mut header_uni);
        session_id.encode(&mut header_uni);

        let mut header_bi = Vec::new();
        Frame::WEBTRANSPORT_STREAM.0.encode(&mut header_bi);
        session_id.encode(&mut header_bi);

        Self {
            accept: Arc::new(Mutex::new(SessionAccept::new(session_id))),
            conn,
            session_id,
            header_uni: header_uni.into(),
            header_bi: header_bi.into(),
            progress: Arc::new(StdMutex::new(progress)),
        }
    }

    pub fn session_id(&self) -> VarInt {
        self.session_id
    }

    /// The session's current position in the handshake/close lifecycle.
    pub fn state(&self) -> SessionState {
        self.progress.lock().unwrap().state()
    }

    fn check_open(&self) -> Result<(), SessionError> {
        if self.progress.lock().unwrap().state().is_terminal() {
            return Err(SessionError::SessionClosed);
        }
        Ok(())
    }

    /// Open a new unidirectional WebTransport stream.
    pub async fn open_uni(&self) -> Result<SendStream, SessionError> {
        self.check_open()?;
        let mut send = self.conn.open_uni().await?;
        send.write_all(&self.header_uni).await?;
        Ok(SendStream::new(send))
    }

    /// Open a new bidirectional WebTransport stream.
    pub async fn open_bi(&self) -> Result<(SendStream, RecvStream), SessionError> {
        self.check_open()?;
        let (mut send, recv) = self.conn.open_bi().await?;
        send.write_all(&self.header_bi).await?;
        Ok((SendStream::new(send), RecvStream::new(recv)))
    }

    /// Accept the next incoming unidirectional WebTransport stream, ignoring
    /// (but not faulting on) any other stream type that arrives first.
    pub async fn accept_uni(&self) -> Result<RecvStream, SessionError> {
        let mut accept = self.accept.lock().await;
        accept.accept_uni(&self.conn).await
    }

    /// Accept the next incoming bidirectional WebTransport stream.
    pub async fn accept_bi(&self) -> Result<(SendStream, RecvStream), SessionError> {
        let mut accept = self.accept.lock().await;
        accept.accept_bi(&self.conn).await
    }

    /// The largest datagram payload (excluding the quarter stream id prefix)
    /// that the peer is currently willing to accept.
    pub fn max_datagram_size(&self) -> Option<usize> {
        self.conn
            .max_datagram_size()
            .map(|max| max.saturating_sub(varint_len(self.session_id)))
    }

    pub fn send_datagram(&self, payload: Bytes) -> Result<(), SessionError> {
        self.check_open()?;
        let datagram = Datagram::new(self.session_id.into_inner() * 4, payload);
        let mut buf = BytesMut::new();
        datagram.encode(&mut buf);
        self.conn.send_datagram(buf.freeze())?;
        Ok(())
    }

    pub async fn read_datagram(&self) -> Result<Bytes, SessionError> {
        loop {
            let raw = self.conn.read_datagram().await?;
            let datagram = match Datagram::decode(raw) {
                Ok(d) => d,
                Err(_) => continue,
            };

            if datagram.quarter_stream_id == self.session_id {
                return Ok(datagram.payload);
            }
            // Datagram for a session we don't track (only one session per
            // connection is supported); drop it and keep waiting.
        }
    }

    pub fn close(&self, code: u32, reason: &str) {
        self.progress.lock().unwrap().close();
        let code = quinn::VarInt::try_from(error_to_http3(code)).expect("error code overflowed a varint");
        self.conn.close(code, reason.as_bytes());
    }

    pub async fn closed(&self) -> CloseError {
        let err: CloseError = self.conn.closed().await.into();
        self.progress.lock().unwrap().close();
        err
    }

    pub fn close_reason(&self) -> Option<CloseError> {
        let reason = self.conn.close_reason().map(Into::into);
        if reason.is_some() {
            self.progress.lock().unwrap().close();
        }
        reason
    }
}

impl Deref for Session {
    type Target = quinn::Connection;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

fn varint_len(v: VarInt) -> usize {
    let mut buf = Vec::new();
    v.encode(&mut buf);
    buf.len()
}

/// Dispatches freshly-accepted raw QUIC streams: reads the leading
/// stream-type byte (uni) or frame type (bi), matches it against
/// `StreamUni::WEBTRANSPORT` / `Frame::WEBTRANSPORT_STREAM` with the
/// session's id, and otherwise tolerates and discards the stream (QPACK
/// encoder/decoder streams, greasing, anything else reserved).
struct SessionAccept {
    session_id: VarInt,
    pending_uni: FuturesUnordered<PendingUni>,
    pending_bi: FuturesUnordered<PendingBi>,
}

type PendingUni = std::pin::Pin<
    Box<dyn std::future::Future<Output = Result<Option<quinn::RecvStream>, SessionError>> + Send>,
>;
type PendingBi = std::pin::Pin<
    Box<
        dyn std::future::Future<
                Output = Result<Option<(quinn::SendStream, quinn::RecvStream)>, SessionError>,
            > + Send,
    >,
>;

impl SessionAccept {
    fn new(session_id: VarInt) -> Self {
        Self {
            session_id,
            pending_uni: FuturesUnordered::new(),
            pending_bi: FuturesUnordered::new(),
        }
    }

    async fn accept_uni(&mut self, conn: &quinn::Connection) -> Result<RecvStream, SessionError> {
        loop {
            let raw = conn.accept_uni().await?;
            let session_id = self.session_id;
            self.pending_uni
                .push(Box::pin(async move { decode_uni(raw, session_id).await }));

            while let Some(result) = self.pending_uni.next().await {
                if let Some(recv) = result? {
                    return Ok(RecvStream::new(recv));
                }
                // Tolerated/ignored stream (QPACK control streams, grease,
                // anything not understood); keep waiting.
                if self.pending_uni.is_empty() {
                    break;
                }
            }
        }
    }

    async fn accept_bi(
        &mut self,
        conn: &quinn::Connection,
    ) -> Result<(SendStream, RecvStream), SessionError> {
        loop {
            let (send, recv) = conn.accept_bi().await?;
            let session_id = self.session_id;
            self.pending_bi
                .push(Box::pin(async move { decode_bi(send, recv, session_id).await }));

            while let Some(result) = self.pending_bi.next().await {
                if let Some((send, recv)) = result? {
                    return Ok((SendStream::new(send), RecvStream::new(recv)));
                }
                if self.pending_bi.is_empty() {
                    break;
                }
            }
        }
    }
}

/// Read varints one at a time off a growing buffer, pulling more bytes from
/// `recv` whenever the buffer doesn't yet hold a complete one. Returns `None`
/// on a clean stream close before a varint completes.
async fn read_two_varints(
    recv: &mut quinn::RecvStream,
    buf: &mut Vec<u8>,
) -> Result<Option<(VarInt, VarInt)>, SessionError> {
    loop {
        let mut cursor = &buf[..];
        if let Ok(first) = VarInt::decode(&mut cursor) {
            if let Ok(second) = VarInt::decode(&mut cursor) {
                return Ok(Some((first, second)));
            }
        }

        match recv.read_chunk(16, true).await? {
            Some(chunk) => buf.extend_from_slice(&chunk.bytes),
            None => return Ok(None),
        }
    }
}

async fn decode_uni(
    mut recv: quinn::RecvStream,
    session_id: VarInt,
) -> Result<Option<quinn::RecvStream>, SessionError> {
    let mut buf = Vec::new();
    let (typ, id) = match read_two_varints(&mut recv, &mut buf).await? {
        Some(pair) => pair,
        None => return Ok(None),
    };

    if StreamUni(typ) != StreamUni::WEBTRANSPORT || id != session_id {
        // Grease, QPACK encoder/decoder streams, or a stream for a session
        // we don't track: this core never needs to read from them.
        return Ok(None);
    }

    Ok(Some(recv))
}

async fn decode_bi(
    send: quinn::SendStream,
    mut recv: quinn::RecvStream,
    session_id: VarInt,
) -> Result<Option<(quinn::SendStream, quinn::RecvStream)>, SessionError> {
    let mut buf = Vec::new();
    let (typ, id) = match read_two_varints(&mut recv, &mut buf).await? {
        Some(pair) => pair,
        None => return Ok(None),
    };

    if Frame(typ) != Frame::WEBTRANSPORT_STREAM || id != session_id {
        return Ok(None);
    }

    Ok(Some((send, recv)))
}
