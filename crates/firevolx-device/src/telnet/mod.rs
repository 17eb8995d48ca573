//! Telnet device connections.
//!
//! `client` drives the login and command exchange, `negotiation` strips IAC
//! sequences from the byte stream and answers option requests.

mod client;
pub mod negotiation;

pub use client::{TelnetConnector, TelnetSession};
