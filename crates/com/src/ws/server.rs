use {
    crate::{ComError, RequestHead, TextChannel, sniff},
    base::log,
    futures_util::{SinkExt, StreamExt},
    http::{Method, StatusCode},
    std::{net::SocketAddr, sync::Arc, time::Duration},
    tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::{TcpListener, TcpStream, ToSocketAddrs},
        sync::mpsc,
        task::JoinHandle,
    },
    tokio_websockets::{Message, ServerBuilder, WebSocketStream},
};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Routing rules applied to every incoming request before the handshake.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Origins allowed for browser clients. `"*"` allows any origin. Requests
    /// without an `Origin` header are always allowed.
    pub allowed_origins: Vec<String>,
    /// Path answered with `health_body` as a plain HTTP 200.
    pub health_path: String,
    pub health_body: String,
    /// Paths that accept WebSocket upgrades.
    pub websocket_paths: Vec<String>,
}

impl ServerOptions {
    pub fn origin_allowed(&self, origin: Option<&str>) -> bool {
        match origin {
            None => true,
            Some(origin) => self
                .allowed_origins
                .iter()
                .any(|allowed| allowed == "*" || allowed == origin),
        }
    }
}

/// Accepts WebSocket connections on the configured paths and answers the
/// health check. Accepted connections are handed out by `accept`.
pub struct WsServer {
    rx: mpsc::Receiver<WsConnection>,
    accept_task: JoinHandle<()>,
    local_addr: SocketAddr,
}

impl WsServer {
    /// Bind a TCP listener and start the background accept loop. Every
    /// connection is routed on its own task, so a slow or broken client never
    /// holds up the others.
    pub async fn bind(addr: impl ToSocketAddrs, options: ServerOptions) -> Result<Self, ComError> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let options = Arc::new(options);
        let (tx, rx) = mpsc::channel(64);

        let accept_task = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((tcp, peer)) => {
                        let tx = tx.clone();
                        let options = Arc::clone(&options);
                        tokio::spawn(async move {
                            match route(tcp, peer, &options).await {
                                Ok(Some(connection)) => {
                                    if tx.send(connection).await.is_err() {
                                        log::debug!("server dropped, discarding connection from {peer}");
                                    }
                                }
                                Ok(None) => {}
                                Err(error) => log::warn!("connection from {peer} failed: {error}"),
                            }
                        });
                    }
                    Err(error) => {
                        log::warn!("accept error: {error}");
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                }
            }
        });

        Ok(Self {
            rx,
            accept_task,
            local_addr,
        })
    }

    /// Wait for the next established WebSocket connection.
    pub async fn accept(&mut self) -> Result<WsConnection, ComError> {
        self.rx.recv().await.ok_or(ComError::ConnectionClosed)
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Drop for WsServer {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn route(
    mut tcp: TcpStream,
    peer: SocketAddr,
    options: &ServerOptions,
) -> Result<Option<WsConnection>, ComError> {
    let (head, head_len) = tokio::time::timeout(HANDSHAKE_TIMEOUT, sniff(&tcp))
        .await
        .map_err(|_| ComError::Handshake("timed out reading request head".to_string()))??;

    let origin = head.origin().map(str::to_string);
    if !options.origin_allowed(origin.as_deref()) {
        log::warn!(
            "refusing {} {} from {peer}: origin {:?} not allowed",
            head.method,
            head.path,
            origin.as_deref().unwrap_or_default()
        );
        respond(
            &mut tcp,
            head_len,
            &head.method,
            StatusCode::FORBIDDEN,
            None,
            r#"{"detail":"Forbidden"}"#,
        )
        .await?;
        return Ok(None);
    }

    if head.is_websocket_upgrade() {
        if !options.websocket_paths.iter().any(|path| *path == head.path) {
            respond(
                &mut tcp,
                head_len,
                &head.method,
                StatusCode::NOT_FOUND,
                None,
                r#"{"detail":"Not Found"}"#,
            )
            .await?;
            return Ok(None);
        }
        let (_request, stream) = ServerBuilder::new().accept(tcp).await?;
        log::info!("{peer} connected to {}", head.path);
        return Ok(Some(WsConnection {
            path: head.path,
            peer,
            stream,
        }));
    }

    if is_health_request(&head, options) {
        respond(
            &mut tcp,
            head_len,
            &head.method,
            StatusCode::OK,
            origin.as_deref(),
            &options.health_body,
        )
        .await?;
    } else {
        respond(
            &mut tcp,
            head_len,
            &head.method,
            StatusCode::NOT_FOUND,
            None,
            r#"{"detail":"Not Found"}"#,
        )
        .await?;
    }
    Ok(None)
}

fn is_health_request(head: &RequestHead, options: &ServerOptions) -> bool {
    (head.method == Method::GET || head.method == Method::HEAD) && head.path == options.health_path
}

// Consume the request head, then write a small JSON response and close.
// Responses to HEAD carry no body.
async fn respond(
    tcp: &mut TcpStream,
    head_len: usize,
    method: &Method,
    status: StatusCode,
    allow_origin: Option<&str>,
    body: &str,
) -> Result<(), ComError> {
    let mut head = vec![0u8; head_len];
    tcp.read_exact(&mut head).await?;

    let mut response = format!(
        "HTTP/1.1 {} {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n",
        status.as_u16(),
        status.canonical_reason().unwrap_or(""),
        body.len()
    );
    if let Some(origin) = allow_origin {
        response.push_str(&format!("access-control-allow-origin: {origin}\r\nvary: Origin\r\n"));
    }
    response.push_str("\r\n");
    if *method != Method::HEAD {
        response.push_str(body);
    }

    tcp.write_all(response.as_bytes()).await?;
    tcp.shutdown().await?;
    Ok(())
}

/// One accepted WebSocket, owned by exactly one session task.
pub struct WsConnection {
    path: String,
    peer: SocketAddr,
    stream: WebSocketStream<TcpStream>,
}

impl WsConnection {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl TextChannel for WsConnection {
    async fn recv(&mut self) -> Result<Option<String>, ComError> {
        loop {
            match self.stream.next().await {
                Some(Ok(message)) => {
                    if let Some(text) = message.as_text() {
                        return Ok(Some(text.to_string()));
                    }
                    if message.is_close() {
                        return Ok(None);
                    }
                    // binary, ping and pong frames are not part of the protocol
                }
                Some(Err(error)) => return Err(ComError::from(error)),
                None => return Ok(None),
            }
        }
    }

    async fn send(&mut self, text: String) -> Result<(), ComError> {
        self.stream.send(Message::text(text)).await?;
        Ok(())
    }

    async fn close(&mut self) {
        if let Err(error) = self.stream.close().await {
            log::debug!("closing connection to {}: {error}", self.peer);
        }
    }
}
