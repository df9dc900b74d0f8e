use {
    crate::RobotCommand,
    base::log,
    tokio::sync::mpsc,
};

/// A resolved command on its way to the arm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchEvent {
    pub command: RobotCommand,
    pub utterance: String,
}

/// Sending half of the command channel. Cloned into every chat session.
#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    tx: mpsc::UnboundedSender<DispatchEvent>,
}

impl CommandDispatcher {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<DispatchEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Returns false when nothing is listening any more.
    pub fn dispatch(&self, event: DispatchEvent) -> bool {
        match self.tx.send(event) {
            Ok(()) => true,
            Err(mpsc::error::SendError(event)) => {
                log::warn!("no actuator listening, dropping {:?}", event.command);
                false
            }
        }
    }
}

/// Stand-in actuator: logs each command until every dispatcher is gone.
pub async fn log_actuator(mut rx: mpsc::UnboundedReceiver<DispatchEvent>) -> usize {
    let mut count = 0;
    while let Some(event) = rx.recv().await {
        count += 1;
        log::info!("actuator: {} (from {:?})", event.command, event.utterance);
    }
    count
}
