mod channel;
pub use channel::*;

mod error;
pub use error::*;

mod request;
pub use request::*;

pub mod ws;
pub use ws::{ServerOptions, WsClient, WsConnection, WsServer};
