//! Tomat: chat and live-video control server for a tomato-picking arm.
//!
//! Two WebSocket channels share one cooperative runtime. `/ws` turns
//! utterances into replies and, when warranted, a `RobotCommand`;
//! `/ws/process_video` annotates camera frames with detections.

mod annotator;
pub use annotator::*;

mod command;
pub use command::*;

mod config;
pub use config::*;

mod dispatch;
pub use dispatch::*;

mod resolver;
pub use resolver::*;

mod resources;
pub use resources::*;

mod server;
pub use server::*;

mod session;
pub use session::*;

mod stage;
pub use stage::*;
