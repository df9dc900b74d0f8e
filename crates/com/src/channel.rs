use {
    crate::ComError,
    tokio::sync::mpsc,
};

/// Ordered, bidirectional stream of text messages with a single owner.
#[allow(async_fn_in_trait)]
pub trait TextChannel {
    /// Next inbound message. `Ok(None)` once the peer has closed.
    async fn recv(&mut self) -> Result<Option<String>, ComError>;

    async fn send(&mut self, text: String) -> Result<(), ComError>;

    /// Close the channel. Safe to call more than once.
    async fn close(&mut self);
}

/// In-process channel end held by the server side.
pub struct LocalChannel {
    inbound: mpsc::UnboundedReceiver<Result<String, ComError>>,
    outbound: Option<mpsc::UnboundedSender<String>>,
}

/// The client side of a `LocalChannel`.
pub struct LocalPeer {
    to_server: Option<mpsc::UnboundedSender<Result<String, ComError>>>,
    from_server: mpsc::UnboundedReceiver<String>,
}

pub fn local_channel() -> (LocalChannel, LocalPeer) {
    let (to_server, inbound) = mpsc::unbounded_channel();
    let (outbound, from_server) = mpsc::unbounded_channel();
    (
        LocalChannel {
            inbound,
            outbound: Some(outbound),
        },
        LocalPeer {
            to_server: Some(to_server),
            from_server,
        },
    )
}

impl TextChannel for LocalChannel {
    async fn recv(&mut self) -> Result<Option<String>, ComError> {
        match self.inbound.recv().await {
            Some(Ok(text)) => Ok(Some(text)),
            Some(Err(error)) => Err(error),
            None => Ok(None),
        }
    }

    async fn send(&mut self, text: String) -> Result<(), ComError> {
        let outbound = self.outbound.as_ref().ok_or(ComError::ConnectionClosed)?;
        outbound.send(text).map_err(|_| ComError::ConnectionClosed)
    }

    async fn close(&mut self) {
        self.outbound = None;
        self.inbound.close();
    }
}

impl LocalPeer {
    pub fn send(&self, text: impl Into<String>) -> Result<(), ComError> {
        let to_server = self.to_server.as_ref().ok_or(ComError::ConnectionClosed)?;
        to_server
            .send(Ok(text.into()))
            .map_err(|_| ComError::ConnectionClosed)
    }

    /// Make the server's next `recv` fail with `error`.
    pub fn inject_error(&self, error: ComError) -> Result<(), ComError> {
        let to_server = self.to_server.as_ref().ok_or(ComError::ConnectionClosed)?;
        to_server
            .send(Err(error))
            .map_err(|_| ComError::ConnectionClosed)
    }

    /// Next message from the server, `None` once the server closed and
    /// everything it sent has been read.
    pub async fn recv(&mut self) -> Option<String> {
        self.from_server.recv().await
    }

    /// A message the server already sent, without waiting.
    pub fn try_recv(&mut self) -> Option<String> {
        self.from_server.try_recv().ok()
    }

    /// Close the client-to-server direction.
    pub fn close(&mut self) {
        self.to_server = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_channel_exchange() {
        let (mut channel, mut peer) = local_channel();
        peer.send("hello").unwrap();
        assert_eq!(channel.recv().await.unwrap().as_deref(), Some("hello"));

        channel.send("world".to_string()).await.unwrap();
        assert_eq!(peer.recv().await.as_deref(), Some("world"));
    }

    #[tokio::test]
    async fn test_peer_close_ends_recv() {
        let (mut channel, mut peer) = local_channel();
        peer.send("last").unwrap();
        peer.close();
        assert_eq!(channel.recv().await.unwrap().as_deref(), Some("last"));
        assert!(channel.recv().await.unwrap().is_none());
        assert!(peer.send("late").is_err());
    }

    #[tokio::test]
    async fn test_server_close_drains_then_ends() {
        let (mut channel, mut peer) = local_channel();
        channel.send("bye".to_string()).await.unwrap();
        channel.close().await;
        channel.close().await;

        assert_eq!(peer.recv().await.as_deref(), Some("bye"));
        assert!(peer.recv().await.is_none());
        assert!(matches!(
            channel.send("again".to_string()).await,
            Err(ComError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_injected_error_surfaces_once() {
        let (mut channel, peer) = local_channel();
        peer.inject_error(ComError::Handshake("reset".to_string()))
            .unwrap();
        peer.send("after").unwrap();
        assert!(matches!(channel.recv().await, Err(ComError::Handshake(_))));
        assert_eq!(channel.recv().await.unwrap().as_deref(), Some("after"));
    }
}
