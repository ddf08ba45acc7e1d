use thiserror::Error;
use url::Url;

use crate::{Connect, ConnectError, ControlStream, Session, SessionProgress, SettingsError};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("failed to connect: {0}")]
    Connect(#[from] quinn::ConnectError),

    #[error("connection closed: {0}")]
    Connection(#[from] quinn::ConnectionError),

    #[error("settings exchange failed: {0}")]
    Settings(#[from] SettingsError),

    #[error("connect request failed: {0}")]
    ConnectRequest(#[from] ConnectError),

    #[error("connect request rejected")]
    Rejected,
}

/// Establish a WebTransport session to `url` over `client`, resolving the
/// host and issuing the QUIC handshake before driving the HTTP/3 layer.
pub async fn connect(client: &quinn::Endpoint, url: &Url) -> Result<Session, ClientError> {
    let host = url
        .host_str()
        .ok_or_else(|| ClientError::InvalidUrl(url.to_string()))?;
    let port = url.port().unwrap_or(443);

    let remote = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| ClientError::InvalidUrl(e.to_string()))?
        .next()
        .ok_or_else(|| ClientError::InvalidUrl(format!("no addresses found for {host}")))?;

    let conn = client.connect(remote, host)?.await?;
    connect_with(conn, url).await
}

/// Drive the HTTP/3 handshake over an already-established QUIC connection.
pub async fn connect_with(conn: quinn::Connection, url: &Url) -> Result<Session, ClientError> {
    let (_control, connect) = futures::try_join!(
        async { ControlStream::connect(&conn).await.map_err(ClientError::from) },
        async { Connect::open(&conn, url.clone()).await.map_err(ClientError::from) },
    )?;

    let mut progress = SessionProgress::new();
    progress.settings_exchanged();
    progress.connect_accepted();

    let session_id = connect.session_id();
    Ok(Session::new(conn, session_id, progress))
}
