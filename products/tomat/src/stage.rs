use {
    crate::{
        AnnotateError, Backends, CommandDispatcher, Config, IntentResolver, Resource, ResourceCache,
        annotate,
    },
    base::log,
    image::{ImageError, decode_frame_async, encode_frame_async},
    inference::{ChatModel, Detector},
    std::{fmt, sync::Arc, time::Duration},
};

/// Sent when the video channel cannot get a detector.
pub const DETECTOR_UNAVAILABLE: &str = "Error: object detector failed to load.";

/// Per-connection message handler behind a channel path.
#[allow(async_fn_in_trait)]
pub trait Stage {
    fn name(&self) -> &'static str;

    /// Called once per connection before any message. `Err` carries the
    /// text sent to the client before the connection is closed.
    async fn open(&self) -> Result<(), String>;

    /// Messages to send back for one inbound message, in order.
    async fn process(&self, message: String) -> Vec<String>;

    /// Pause after each message so other connections get a turn.
    fn pause(&self) -> Option<Duration> {
        None
    }

    /// Drop the message being processed when the client leaves, instead of
    /// finishing it and sending the replies.
    fn cancel_on_disconnect(&self) -> bool {
        false
    }
}

/// Why a single video frame produced no annotated frame.
#[derive(Debug)]
pub enum FrameError {
    Decode(ImageError),
    Inference(AnnotateError),
    Encode(ImageError),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Decode(error) => write!(f, "could not decode frame: {error}"),
            FrameError::Inference(error) => write!(f, "{error}"),
            FrameError::Encode(error) => write!(f, "could not encode frame: {error}"),
        }
    }
}

impl std::error::Error for FrameError {}

/// Decode, annotate, re-encode.
pub struct VideoStage<D> {
    detector: Arc<ResourceCache<D>>,
    confidence_floor: f32,
    jpeg_quality: u8,
    pause: Duration,
}

impl<D: Detector + Send + Sync + 'static> VideoStage<D> {
    pub fn new(
        detector: Arc<ResourceCache<D>>,
        confidence_floor: f32,
        jpeg_quality: u8,
        pause: Duration,
    ) -> Self {
        Self {
            detector,
            confidence_floor,
            jpeg_quality,
            pause,
        }
    }

    async fn process_frame(&self, detector: &D, encoded: String) -> Result<String, FrameError> {
        let frame = decode_frame_async(encoded).await.map_err(FrameError::Decode)?;
        let annotated = annotate(detector, frame, self.confidence_floor)
            .await
            .map_err(FrameError::Inference)?;
        encode_frame_async(annotated, self.jpeg_quality)
            .await
            .map_err(FrameError::Encode)
    }
}

impl<D: Detector + Send + Sync + 'static> Stage for VideoStage<D> {
    fn name(&self) -> &'static str {
        "video"
    }

    async fn open(&self) -> Result<(), String> {
        match self.detector.get_or_init().await {
            Resource::Ready(_) => Ok(()),
            Resource::Unavailable => Err(DETECTOR_UNAVAILABLE.to_string()),
        }
    }

    async fn process(&self, message: String) -> Vec<String> {
        // memoized, so this only waits on the first frame of the process
        let Resource::Ready(detector) = self.detector.get_or_init().await else {
            return vec![DETECTOR_UNAVAILABLE.to_string()];
        };
        match self.process_frame(&detector, message).await {
            Ok(encoded) => vec![encoded],
            Err(error) => {
                log::warn!("frame dropped: {error}");
                vec![format!("Error: {error}")]
            }
        }
    }

    fn pause(&self) -> Option<Duration> {
        Some(self.pause)
    }
}

/// Utterance in, reply out.
pub struct ChatStage<M> {
    resolver: IntentResolver<M>,
}

impl<M> ChatStage<M> {
    pub fn new(resolver: IntentResolver<M>) -> Self {
        Self { resolver }
    }
}

impl<M: ChatModel + Send + Sync + 'static> Stage for ChatStage<M> {
    fn name(&self) -> &'static str {
        "chat"
    }

    async fn open(&self) -> Result<(), String> {
        Ok(())
    }

    async fn process(&self, message: String) -> Vec<String> {
        vec![self.resolver.resolve(&message).await.reply]
    }

    // a command for a client that is gone must not reach the arm
    fn cancel_on_disconnect(&self) -> bool {
        true
    }
}

impl<D, M> Backends<D, M>
where
    D: Detector + Send + Sync + 'static,
    M: ChatModel + Send + Sync + 'static,
{
    /// Video and chat stages sharing these backends.
    pub fn into_stages(
        self,
        config: &Config,
        dispatcher: CommandDispatcher,
    ) -> (Arc<VideoStage<D>>, Arc<ChatStage<M>>) {
        let video = VideoStage::new(
            self.detector,
            config.confidence_floor,
            config.jpeg_quality,
            config.fairness_pause,
        );
        let chat = ChatStage::new(IntentResolver::new(self.oracle, dispatcher));
        (Arc::new(video), Arc::new(chat))
    }
}
