use {
    crate::Stage,
    base::log,
    com::TextChannel,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The client closed the connection or the stream ended.
    ClientClosed,
    TransportError,
    /// The stage refused to open.
    Rejected,
}

/// Serve one connection until it ends. Replies go out in request order and
/// the channel is closed on every exit path.
pub async fn run_session<C: TextChannel, S: Stage>(mut channel: C, stage: &S) -> SessionEnd {
    let end = serve(&mut channel, stage).await;
    channel.close().await;
    log::debug!("{} session ended: {end:?}", stage.name());
    end
}

async fn serve<C: TextChannel, S: Stage>(channel: &mut C, stage: &S) -> SessionEnd {
    if let Err(message) = stage.open().await {
        log::error!("{} stage refused connection: {message}", stage.name());
        if let Err(error) = channel.send(message).await {
            log::debug!("could not report refusal: {error}");
        }
        return SessionEnd::Rejected;
    }

    // at most one message read ahead while the previous one is processed
    let mut pending: Option<String> = None;
    loop {
        let message = match pending.take() {
            Some(message) => message,
            None => match channel.recv().await {
                Ok(Some(message)) => message,
                Ok(None) => return SessionEnd::ClientClosed,
                Err(error) => {
                    log::warn!("{} receive failed: {error}", stage.name());
                    return SessionEnd::TransportError;
                }
            },
        };

        // keep listening while processing, so a departed client is noticed
        let mut client_closed = false;
        let process = stage.process(message);
        tokio::pin!(process);
        let replies = loop {
            tokio::select! {
                replies = &mut process => break replies,
                next = channel.recv(), if pending.is_none() && !client_closed => match next {
                    Ok(Some(message)) => pending = Some(message),
                    Ok(None) if stage.cancel_on_disconnect() => {
                        log::info!("{} client left, abandoning request", stage.name());
                        return SessionEnd::ClientClosed;
                    }
                    Ok(None) => client_closed = true,
                    Err(error) => {
                        log::warn!("{} receive failed: {error}", stage.name());
                        return SessionEnd::TransportError;
                    }
                },
            }
        };

        for reply in replies {
            if let Err(error) = channel.send(reply).await {
                log::warn!("{} send failed: {error}", stage.name());
                return SessionEnd::TransportError;
            }
        }
        if client_closed {
            return SessionEnd::ClientClosed;
        }

        if let Some(pause) = stage.pause() {
            tokio::time::sleep(pause).await;
        }
    }
}
