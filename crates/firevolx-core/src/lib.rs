//! Core types for the Firevolx terminal bridge.
//!
//! This crate provides the building blocks shared by both sides of the bridge:
//! - `ConnectTarget` - Device address and credentials for a session
//! - `Session` / `SessionStatus` - Client-side session snapshot and lifecycle
//! - `Message` - Typed event delivered to a session subscriber
//! - `DeviceCatalog` - Read-only list of known robots
//! - `logging` - Tracing subscriber setup for the binaries

pub mod catalog;
pub mod logging;
pub mod message;
pub mod session;
pub mod target;

pub use catalog::{CatalogError, DeviceCatalog, DeviceRecord};
pub use message::{Message, MessageKind};
pub use session::{ConnectionId, Session, SessionStatus};
pub use target::{ConnectTarget, DEFAULT_TELNET_PORT, TargetError};
