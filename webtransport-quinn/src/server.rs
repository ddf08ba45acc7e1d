use thiserror::Error;
use url::Url;

use crate::{Connect, ConnectError, ControlStream, Session, SessionProgress, SettingsError};

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("connection closed: {0}")]
    Connection(#[from] quinn::ConnectionError),

    #[error("settings exchange failed: {0}")]
    Settings(#[from] SettingsError),

    #[error("connect request failed: {0}")]
    ConnectRequest(#[from] ConnectError),
}

/// Accept the control stream and the Extended CONNECT request on a freshly
/// accepted QUIC connection, without yet responding to it.
pub async fn accept(conn: quinn::Connection) -> Result<Request, ServerError> {
    let (_control, connect) = futures::try_join!(
        async { ControlStream::connect(&conn).await.map_err(ServerError::from) },
        async { Connect::accept(&conn).await.map_err(ServerError::from) },
    )?;

    Ok(Request { conn, connect })
}

/// A pending Extended CONNECT request, not yet accepted or rejected.
pub struct Request {
    conn: quinn::Connection,
    connect: Connect,
}

impl Request {
    pub fn url(&self) -> &Url {
        &self.connect.url
    }

    /// Accept the request, responding with a 200 and returning the established session.
    pub async fn ok(mut self) -> Result<Session, ServerError> {
        self.connect.respond(200).await?;

        let mut progress = SessionProgress::new();
        progress.settings_exchanged();
        progress.connect_accepted();

        let session_id = self.connect.session_id();
        Ok(Session::new(self.conn, session_id, progress))
    }

    /// Reject the request with the given (non-2xx) status, closing it out
    /// without establishing a session.
    pub async fn close(mut self, status: u32) -> Result<(), ServerError> {
        self.connect.respond(status).await?;
        Ok(())
    }
}
