pub mod logging;
pub use logging::{FileLogger, StdoutLogger, init_file_logger, init_stdout_logger};

mod rect;
pub use rect::*;

mod vec2;
pub use vec2::*;

// downstream crates log through `base::log::{info, warn, ...}`
pub use log;
