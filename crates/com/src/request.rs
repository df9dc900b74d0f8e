use {
    crate::ComError,
    http::{HeaderMap, HeaderName, HeaderValue, Method, header},
    std::time::Duration,
    tokio::net::TcpStream,
};

/// Largest request head accepted before the connection is refused.
pub const MAX_HEAD_SIZE: usize = 8192;

const PEEK_INTERVAL: Duration = Duration::from_millis(5);

/// Request line and headers of an incoming HTTP/1.1 request.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Method,
    /// Request target without the query string.
    pub path: String,
    pub headers: HeaderMap,
}

impl RequestHead {
    pub fn parse(bytes: &[u8]) -> Result<Self, ComError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| ComError::Handshake("request head is not UTF-8".to_string()))?;
        let mut lines = text.split("\r\n");

        let request_line = lines
            .next()
            .ok_or_else(|| ComError::Handshake("empty request".to_string()))?;
        let mut parts = request_line.split_whitespace();
        let (Some(method), Some(target), Some(version)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(ComError::Handshake(format!(
                "malformed request line: {request_line:?}"
            )));
        };
        if !version.starts_with("HTTP/1.") {
            return Err(ComError::Handshake(format!("unsupported version {version}")));
        }
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|_| ComError::Handshake(format!("invalid method {method:?}")))?;
        let path = target.split('?').next().unwrap_or(target).to_string();

        let mut headers = HeaderMap::new();
        for line in lines.take_while(|line| !line.is_empty()) {
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| ComError::Handshake(format!("malformed header {line:?}")))?;
            let name = HeaderName::from_bytes(name.trim().as_bytes())
                .map_err(|_| ComError::Handshake(format!("invalid header name {name:?}")))?;
            let value = HeaderValue::from_str(value.trim())
                .map_err(|_| ComError::Handshake(format!("invalid value for {name}")))?;
            headers.append(name, value);
        }

        Ok(Self {
            method,
            path,
            headers,
        })
    }

    pub fn header(&self, name: impl http::header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn origin(&self) -> Option<&str> {
        self.header(header::ORIGIN)
    }

    pub fn is_websocket_upgrade(&self) -> bool {
        self.header(header::UPGRADE)
            .is_some_and(|value| value.eq_ignore_ascii_case("websocket"))
    }
}

fn find_head_end(bytes: &[u8]) -> Option<usize> {
    bytes
        .windows(4)
        .position(|window| window == b"\r\n\r\n")
        .map(|index| index + 4)
}

/// Peek at the request head without consuming it, so the stream can still be
/// handed to the WebSocket handshake. Returns the head and its length in
/// bytes. Callers should bound this with a timeout.
pub async fn sniff(stream: &TcpStream) -> Result<(RequestHead, usize), ComError> {
    let mut buffer = vec![0u8; MAX_HEAD_SIZE];
    let mut seen = 0;
    loop {
        let n = stream.peek(&mut buffer).await?;
        if n == 0 {
            return Err(ComError::ConnectionClosed);
        }
        if let Some(end) = find_head_end(&buffer[..n]) {
            return Ok((RequestHead::parse(&buffer[..end])?, end));
        }
        if n >= MAX_HEAD_SIZE {
            return Err(ComError::Handshake("request head too large".to_string()));
        }
        // peek returns immediately while the buffered data is unchanged
        if n == seen {
            tokio::time::sleep(PEEK_INTERVAL).await;
        }
        seen = n;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UPGRADE: &[u8] = b"GET /ws/process_video?token=1 HTTP/1.1\r\n\
        Host: localhost:3000\r\n\
        upgrade: WebSocket\r\n\
        Connection: Upgrade\r\n\
        Origin: http://localhost:5173\r\n\r\n";

    #[test]
    fn test_parse_upgrade_request() {
        let head = RequestHead::parse(UPGRADE).unwrap();
        assert_eq!(head.method, Method::GET);
        assert_eq!(head.path, "/ws/process_video");
        assert!(head.is_websocket_upgrade());
        assert_eq!(head.origin(), Some("http://localhost:5173"));
        assert_eq!(head.header("HOST"), Some("localhost:3000"));
    }

    #[test]
    fn test_parse_plain_get() {
        let head = RequestHead::parse(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();
        assert_eq!(head.path, "/");
        assert!(!head.is_websocket_upgrade());
        assert!(head.origin().is_none());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(RequestHead::parse(b"hello\r\n\r\n").is_err());
        assert!(RequestHead::parse(b"GET / SPDY/3\r\n\r\n").is_err());
        assert!(RequestHead::parse(b"GET / HTTP/1.1\r\nno-colon\r\n\r\n").is_err());
    }

    #[test]
    fn test_find_head_end() {
        assert_eq!(find_head_end(b"GET / HTTP/1.1\r\n\r\nbody"), Some(18));
        assert_eq!(find_head_end(b"GET / HTTP/1.1\r\n"), None);
    }
}
