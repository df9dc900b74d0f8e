use {
    crate::{ChatStage, Config, Stage, VideoStage, run_session},
    base::log,
    com::{ComError, ServerOptions, WsConnection, WsServer},
    inference::{ChatModel, Detector},
    std::sync::Arc,
};

pub const CHAT_PATH: &str = "/ws";
pub const VIDEO_PATH: &str = "/ws/process_video";
pub const HEALTH_PATH: &str = "/";
pub const HEALTH_BODY: &str = r#"{"message":"Robot Backend is Live!"}"#;

pub fn server_options(config: &Config) -> ServerOptions {
    ServerOptions {
        allowed_origins: config.allowed_origins.clone(),
        health_path: HEALTH_PATH.to_string(),
        health_body: HEALTH_BODY.to_string(),
        websocket_paths: vec![CHAT_PATH.to_string(), VIDEO_PATH.to_string()],
    }
}

/// Accept connections forever, one local task per connection. Must run
/// inside a `tokio::task::LocalSet`.
pub async fn serve<D, M>(
    mut server: WsServer,
    video: Arc<VideoStage<D>>,
    chat: Arc<ChatStage<M>>,
) -> Result<(), ComError>
where
    D: Detector + Send + Sync + 'static,
    M: ChatModel + Send + Sync + 'static,
{
    log::info!("listening on {}", server.local_addr());
    loop {
        let connection = server.accept().await?;
        match connection.path() {
            VIDEO_PATH => spawn_session(connection, Arc::clone(&video)),
            CHAT_PATH => spawn_session(connection, Arc::clone(&chat)),
            other => log::warn!("no stage for {other}, dropping connection"),
        }
    }
}

fn spawn_session<S: Stage + 'static>(connection: WsConnection, stage: Arc<S>) {
    tokio::task::spawn_local(async move {
        let peer = connection.peer();
        log::info!("{peer} opened {} session", stage.name());
        let end = run_session(connection, stage.as_ref()).await;
        log::info!("{peer} left {} session: {end:?}", stage.name());
    });
}
