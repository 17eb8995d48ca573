//! Remote-shell device connections.
//!
//! Provides:
//! - `DeviceConnector` / `DeviceSession` - The seam the relay drives devices through
//! - `TelnetConnector` - Interactive Telnet with login and prompt detection
//! - `SimulatedConnector` - Canned robot shell for demos and tests

pub mod prompt;
pub mod simulated;
pub mod telnet;
pub mod traits;

pub use prompt::DEFAULT_SHELL_PROMPT;
pub use simulated::SimulatedConnector;
pub use telnet::{TelnetConnector, TelnetSession};
pub use traits::{DeviceConnector, DeviceError, DeviceParams, DeviceSession};
