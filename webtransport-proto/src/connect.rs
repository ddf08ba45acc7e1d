use url::Url;

use thiserror::Error;

use crate::{frame, qpack, Frame, Headers};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    #[error("short read")]
    Incomplete,

    #[error("frame too large")]
    TooLarge,

    #[error("expected a HEADERS frame")]
    WrongFrameType,

    #[error("qpack decode error: {0}")]
    Qpack(#[from] qpack::DecodeError),

    #[error("missing required pseudo-header: {0}")]
    MissingHeader(&'static str),

    #[error("unexpected :method, expected CONNECT")]
    WrongMethod,

    #[error("unexpected :protocol, expected webtransport")]
    WrongProtocol,

    #[error("unsupported :scheme")]
    WrongScheme,

    #[error("malformed request URL")]
    MalformedUrl,

    #[error("non-success :status: {0}")]
    ErrorStatus(u32),

    #[error("malformed :status")]
    MalformedStatus,
}

impl From<frame::FrameError> for ConnectError {
    fn from(e: frame::FrameError) -> Self {
        match e {
            frame::FrameError::Incomplete => ConnectError::Incomplete,
            frame::FrameError::TooLarge => ConnectError::TooLarge,
        }
    }
}

/// An Extended CONNECT request establishing a WebTransport session, per
/// RFC 9220 / the WebTransport HTTP/3 draft.
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    pub url: Url,
}

impl ConnectRequest {
    pub fn encode<B: bytes::BufMut>(&self, buf: &mut B) {
        let mut headers = Headers::default();
        headers.set(":method", "CONNECT");
        headers.set(":protocol", "webtransport");
        headers.set(":scheme", self.url.scheme());
        headers.set(":authority", authority(&self.url));
        headers.set(":path", path(&self.url));

        let mut payload = Vec::new();
        headers.encode(&mut payload);
        frame::encode(Frame::HEADERS, &payload, buf);
    }

    /// Parse a HEADERS frame carrying an Extended CONNECT request.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize), ConnectError> {
        let parsed = frame::parse(buf)?;
        if parsed.typ != Frame::HEADERS {
            return Err(ConnectError::WrongFrameType);
        }

        let headers = Headers::decode(&mut &parsed.payload[..])?;

        let method = headers.get(":method").ok_or(ConnectError::MissingHeader(":method"))?;
        if method != "CONNECT" {
            return Err(ConnectError::WrongMethod);
        }

        let protocol = headers
            .get(":protocol")
            .ok_or(ConnectError::MissingHeader(":protocol"))?;
        if protocol != "webtransport" {
            return Err(ConnectError::WrongProtocol);
        }

        let scheme = headers.get(":scheme").ok_or(ConnectError::MissingHeader(":scheme"))?;
        if scheme != "https" && scheme != "http" {
            return Err(ConnectError::WrongScheme);
        }

        let authority = headers
            .get(":authority")
            .ok_or(ConnectError::MissingHeader(":authority"))?;
        let path = headers.get(":path").ok_or(ConnectError::MissingHeader(":path"))?;

        let url = Url::parse(&format!("{scheme}://{authority}{path}"))
            .map_err(|_| ConnectError::MalformedUrl)?;

        Ok((ConnectRequest { url }, parsed.consumed))
    }
}

/// The response to an Extended CONNECT request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectResponse {
    pub status: u32,
}

impl ConnectResponse {
    pub const OK: ConnectResponse = ConnectResponse { status: 200 };

    pub fn encode<B: bytes::BufMut>(&self, buf: &mut B) {
        let mut headers = Headers::default();
        headers.set(":status", self.status.to_string());

        let mut payload = Vec::new();
        headers.encode(&mut payload);
        frame::encode(Frame::HEADERS, &payload, buf);
    }

    pub fn decode(buf: &[u8]) -> Result<(Self, usize), ConnectError> {
        let parsed = frame::parse(buf)?;
        if parsed.typ != Frame::HEADERS {
            return Err(ConnectError::WrongFrameType);
        }

        let headers = Headers::decode(&mut &parsed.payload[..])?;
        let status = headers.get(":status").ok_or(ConnectError::MissingHeader(":status"))?;
        let status: u32 = status.parse().map_err(|_| ConnectError::MalformedStatus)?;

        if status != 200 {
            return Err(ConnectError::ErrorStatus(status));
        }

        Ok((ConnectResponse { status }, parsed.consumed))
    }
}

fn authority(url: &Url) -> String {
    match url.port() {
        Some(port) => format!("{}:{}", url.host_str().unwrap_or_default(), port),
        None => url.host_str().unwrap_or_default().to_string(),
    }
}

fn path(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trips() {
        let request = ConnectRequest {
            url: Url::parse("https://localhost:4443/session?id=1").unwrap(),
        };

        let mut buf = Vec::new();
        request.encode(&mut buf);

        let (decoded, consumed) = ConnectRequest::decode(&buf).unwrap();
        assert_eq!(consumed, buf.len());
        assert_eq!(decoded.url.as_str(), "https://localhost:4443/session?id=1");
    }

    #[test]
    fn response_round_trips() {
        let mut buf = Vec::new();
        ConnectResponse::OK.encode(&mut buf);

        let (decoded, consumed) = ConnectResponse::decode(&buf).unwrap();
        assert_eq!(consumed, buf.len());
        assert_eq!(decoded.status, 200);
    }

    #[test]
    fn non_success_status_is_an_error() {
        let mut headers = Headers::default();
        headers.set(":status", "404");
        let mut payload = Vec::new();
        headers.encode(&mut payload);

        let mut buf = Vec::new();
        frame::encode(Frame::HEADERS, &payload, &mut buf);

        assert_eq!(ConnectResponse::decode(&buf), Err(ConnectError::ErrorStatus(404)));
    }

    #[test]
    fn wrong_protocol_is_rejected() {
        let mut headers = Headers::default();
        headers.set(":method", "CONNECT");
        headers.set(":protocol", "something-else");
        headers.set(":scheme", "https");
        headers.set(":authority", "localhost");
        headers.set(":path", "/");
        let mut payload = Vec::new();
        headers.encode(&mut payload);

        let mut buf = Vec::new();
        frame::encode(Frame::HEADERS, &payload, &mut buf);

        assert_eq!(ConnectRequest::decode(&buf), Err(ConnectError::WrongProtocol));
    }
}
