use thiserror::Error;

use webtransport_proto::error_from_http3;

/// The reason a WebTransport session ended.
#[derive(Error, Debug, Clone)]
pub enum CloseError {
    #[error("webtransport error: {0}")]
    WebTransportError(#[from] WebTransportError),

    #[error("quic connection error: {0}")]
    ConnectionError(#[from] quinn::ConnectionError),
}

impl CloseError {
    /// The application-level error code, if the session was closed with one.
    pub fn code(&self) -> Option<u32> {
        match self {
            CloseError::WebTransportError(e) => Some(e.0),
            CloseError::ConnectionError(quinn::ConnectionError::ApplicationClosed(closed)) => {
                error_from_http3(closed.error_code.into())
            }
            CloseError::ConnectionError(_) => None,
        }
    }
}

/// An application-level WebTransport session close, carrying the app error code.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("webtransport session closed with code {0}")]
pub struct WebTransportError(pub u32);

/// A `quinn::WriteError` that might carry an application error code.
#[derive(Debug, Clone)]
pub struct SendError(pub quinn::WriteError);

impl std::fmt::Display for SendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for SendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl SendError {
    pub fn code(&self) -> Option<u32> {
        match &self.0 {
            quinn::WriteError::Stopped(code) => error_from_http3((*code).into()),
            _ => None,
        }
    }
}

impl From<quinn::WriteError> for SendError {
    fn from(e: quinn::WriteError) -> Self {
        SendError(e)
    }
}

/// A `quinn::ReadError` that might carry an application error code.
#[derive(Debug, Clone)]
pub struct RecvError(pub quinn::ReadError);

impl std::fmt::Display for RecvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for RecvError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl RecvError {
    pub fn code(&self) -> Option<u32> {
        match &self.0 {
            quinn::ReadError::Reset(code) => error_from_http3((*code).into()),
            _ => None,
        }
    }
}

impl From<quinn::ReadError> for RecvError {
    fn from(e: quinn::ReadError) -> Self {
        RecvError(e)
    }
}
