//! Client-side session manager for the Firevolx terminal bridge.
//!
//! Provides:
//! - `SessionManager` - Connect, command and disconnect device sessions through a relay
//! - `HandlerSlots` - Single-slot message subscriber registry
//! - `SessionConfig` / `RelayEndpoint` - Where the relay lives and how long to wait for it

pub mod config;
pub mod manager;
pub mod subscriber;

pub use config::{DEFAULT_RELAY_PORT, RelayEndpoint, SessionConfig};
pub use manager::{SessionError, SessionManager};
pub use subscriber::{HandlerSlots, MessageHandler};
