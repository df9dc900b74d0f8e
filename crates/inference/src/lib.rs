pub mod detector;
pub use detector::{Detection, Detector, ObjectDetector};

mod error;
pub use error::*;

mod inference;
pub use inference::Inference;

pub mod llm;
pub use llm::{ChatMessage, ChatModel, ChatRequest, OllamaClient, OllamaConfig};
