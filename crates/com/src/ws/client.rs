use {
    crate::ComError,
    futures_util::{SinkExt, StreamExt},
    std::net::SocketAddr,
    tokio_websockets::{ClientBuilder, MaybeTlsStream, Message, WebSocketStream},
};

/// Text WebSocket client, mostly for tests and tooling.
pub struct WsClient {
    stream: WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
}

impl WsClient {
    /// Connect to `ws://<addr><path>`.
    pub async fn connect(addr: SocketAddr, path: &str) -> Result<Self, ComError> {
        let uri: http::Uri = format!("ws://{addr}{path}").parse().map_err(|e| {
            ComError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid WebSocket URI: {e}"),
            ))
        })?;
        let (stream, _response) = ClientBuilder::from_uri(uri).connect().await?;
        Ok(Self { stream })
    }

    pub async fn send(&mut self, text: impl Into<String>) -> Result<(), ComError> {
        self.stream.send(Message::text(text.into())).await?;
        Ok(())
    }

    /// Next text message. `ComError::ConnectionClosed` once the server closes.
    pub async fn recv(&mut self) -> Result<String, ComError> {
        loop {
            match self.stream.next().await {
                Some(Ok(message)) => {
                    if let Some(text) = message.as_text() {
                        return Ok(text.to_string());
                    }
                    if message.is_close() {
                        return Err(ComError::ConnectionClosed);
                    }
                }
                Some(Err(error)) => return Err(ComError::from(error)),
                None => return Err(ComError::ConnectionClosed),
            }
        }
    }

    pub async fn close(&mut self) -> Result<(), ComError> {
        self.stream.close().await?;
        Ok(())
    }
}
