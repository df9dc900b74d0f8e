#![allow(dead_code)]

use {
    base::{Rect, Vec2},
    image::{Image, PixelFormat},
    inference::{ChatModel, ChatRequest, Detection, Detector, InferError},
    std::{sync::Mutex, time::Duration},
    tomat::RobotCommand,
};

/// Follows the persona rules the way a well-behaved model would, after
/// `delay`.
#[derive(Default)]
pub struct PersonaOracle {
    pub requests: Mutex<Vec<ChatRequest>>,
    pub delay: Duration,
}

impl ChatModel for PersonaOracle {
    fn model(&self) -> &str {
        "persona"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<String, InferError> {
        self.requests.lock().unwrap().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let utterance = request
            .messages
            .last()
            .map(|message| message.content.to_lowercase())
            .unwrap_or_default();

        let wants_pick = ["pick", "get", "grab"].iter().any(|word| utterance.contains(word));
        let reply = if !wants_pick {
            serde_json::json!({"chat_reply": "Hello! Ask me to pick a tomato.", "command": null})
        } else if ["unripe", "green", "bad"].iter().any(|word| utterance.contains(word)) {
            serde_json::json!({
                "chat_reply": "Sure, grabbing that unripe tomato.",
                "command": RobotCommand::PickUnripe.as_str(),
            })
        } else {
            serde_json::json!({
                "chat_reply": "You got it! Going for the red one.",
                "command": RobotCommand::PickRipe.as_str(),
            })
        };
        Ok(reply.to_string())
    }
}

/// Answers every request with the same scripted outcome.
pub struct ScriptedOracle {
    pub answer: fn() -> Result<String, InferError>,
}

impl ChatModel for ScriptedOracle {
    fn model(&self) -> &str {
        "scripted-model"
    }

    async fn chat(&self, _request: &ChatRequest) -> Result<String, InferError> {
        (self.answer)()
    }
}

/// Returns the same detections for every frame and remembers its inputs.
pub struct FixedDetector {
    pub order: PixelFormat,
    pub detections: Vec<Detection>,
    pub seen: Mutex<Vec<Image>>,
}

impl FixedDetector {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self {
            order: PixelFormat::Rgb8,
            detections,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

impl Detector for FixedDetector {
    fn color_order(&self) -> PixelFormat {
        self.order
    }

    async fn detect(&self, image: Image) -> Result<Vec<Detection>, InferError> {
        self.seen.lock().unwrap().push(image);
        Ok(self.detections.clone())
    }
}

pub struct FailingDetector;

impl Detector for FailingDetector {
    async fn detect(&self, _image: Image) -> Result<Vec<Detection>, InferError> {
        Err(InferError::Runtime("forward pass failed".to_string()))
    }
}

pub fn detection(x: f32, y: f32, size: f32, class_id: usize, confidence: f32) -> Detection {
    Detection {
        bbox: Rect::new(Vec2::new(x, y), Vec2::new(size, size)),
        class_id,
        label: format!("class{class_id}"),
        confidence,
    }
}

pub fn gray_frame(width: usize, height: usize) -> Image {
    Image::new(
        Vec2::new(width, height),
        vec![90; width * height * 3],
        PixelFormat::Rgb8,
    )
}

pub fn pixel(frame: &Image, x: usize, y: usize) -> [u8; 3] {
    let offset = (y * frame.width() + x) * 3;
    [frame.data[offset], frame.data[offset + 1], frame.data[offset + 2]]
}
