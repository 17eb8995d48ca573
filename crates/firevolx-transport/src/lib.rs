//! Transport channel between the session manager and the relay.
//!
//! Provides:
//! - Wire protocol (JSON, base64 output chunks)
//! - `ChannelConnector` - Opens one message-framed channel per session
//! - WebSocket channel client (feature: websocket)

pub mod channel;
pub mod protocol;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use channel::{Channel, ChannelConnector, TransportError};
pub use protocol::{ClientEvent, RelayEvent};

#[cfg(feature = "websocket")]
pub use websocket::WsConnector;
