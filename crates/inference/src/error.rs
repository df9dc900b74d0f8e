use std::fmt;

#[derive(Debug)]
pub enum InferError {
    Candle(String),
    Shape(String),
    Io(String),
    Runtime(String),
    /// The chat backend could not be reached or did not answer in time.
    Transport(String),
    /// The chat backend rejected the credentials.
    Unauthorized(String),
    /// The chat backend does not know the requested model.
    ModelNotFound(String),
    Backend { status: u16, message: String },
    /// The chat backend answered with an unexpected envelope.
    Decode(String),
}

impl fmt::Display for InferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InferError::Candle(msg) => write!(f, "candle error: {msg}"),
            InferError::Shape(msg) => write!(f, "shape error: {msg}"),
            InferError::Io(msg) => write!(f, "io error: {msg}"),
            InferError::Runtime(msg) => write!(f, "runtime error: {msg}"),
            InferError::Transport(msg) => write!(f, "transport error: {msg}"),
            InferError::Unauthorized(msg) => write!(f, "unauthorized: {msg}"),
            InferError::ModelNotFound(model) => write!(f, "model not found: {model}"),
            InferError::Backend { status, message } => {
                write!(f, "backend error ({status}): {message}")
            }
            InferError::Decode(msg) => write!(f, "decode error: {msg}"),
        }
    }
}

impl std::error::Error for InferError {}

impl From<candle_core::Error> for InferError {
    fn from(err: candle_core::Error) -> Self {
        InferError::Candle(err.to_string())
    }
}

impl From<std::io::Error> for InferError {
    fn from(err: std::io::Error) -> Self {
        InferError::Io(err.to_string())
    }
}

impl From<reqwest::Error> for InferError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            InferError::Decode(err.to_string())
        } else {
            InferError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for InferError {
    fn from(err: serde_json::Error) -> Self {
        InferError::Decode(err.to_string())
    }
}
