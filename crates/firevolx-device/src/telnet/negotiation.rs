//! Telnet command stripping and option negotiation.
//!
//! The decoder keeps its state between reads, so an IAC sequence split across
//! two TCP segments is still recognised.

use std::collections::HashSet;

/// Interpret As Command.
pub const IAC: u8 = 0xFF;
const DONT: u8 = 0xFE;
const DO: u8 = 0xFD;
const WONT: u8 = 0xFC;
const WILL: u8 = 0xFB;
/// Subnegotiation begin.
const SB: u8 = 0xFA;
/// Subnegotiation end.
const SE: u8 = 0xF0;

const OPT_ECHO: u8 = 1;
const OPT_SUPPRESS_GO_AHEAD: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum State {
    #[default]
    Data,
    Iac,
    Option(u8),
    Sub,
    SubIac,
}

/// Output of one decode step.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Decoded {
    /// Payload bytes with all Telnet commands removed.
    pub data: Vec<u8>,
    /// Negotiation answers to write back to the server.
    pub replies: Vec<u8>,
}

/// Stateful Telnet stream decoder.
///
/// Accepts the server echoing and suppressing go-ahead, refuses every other
/// option, and answers each request at most once so negotiation cannot loop.
#[derive(Debug, Default)]
pub struct TelnetDecoder {
    state: State,
    answered: HashSet<(u8, u8)>,
}

impl TelnetDecoder {
    /// Create a decoder in the data state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one chunk read from the socket.
    pub fn decode(&mut self, input: &[u8]) -> Decoded {
        let mut out = Decoded {
            data: Vec::with_capacity(input.len()),
            replies: Vec::new(),
        };

        for &byte in input {
            self.state = match (self.state, byte) {
                (State::Data, IAC) => State::Iac,
                (State::Data, b) => {
                    out.data.push(b);
                    State::Data
                }
                (State::Iac, IAC) => {
                    out.data.push(IAC);
                    State::Data
                }
                (State::Iac, verb @ (WILL | WONT | DO | DONT)) => State::Option(verb),
                (State::Iac, SB) => State::Sub,
                // NOP, GA, AYT and the other two-byte commands.
                (State::Iac, _) => State::Data,
                (State::Option(verb), option) => {
                    self.answer(verb, option, &mut out.replies);
                    State::Data
                }
                (State::Sub, IAC) => State::SubIac,
                (State::Sub, _) => State::Sub,
                (State::SubIac, SE) => State::Data,
                (State::SubIac, _) => State::Sub,
            };
        }

        out
    }

    fn answer(&mut self, verb: u8, option: u8, replies: &mut Vec<u8>) {
        let reply = match verb {
            WILL if matches!(option, OPT_ECHO | OPT_SUPPRESS_GO_AHEAD) => DO,
            WILL => DONT,
            DO if option == OPT_SUPPRESS_GO_AHEAD => WILL,
            DO => WONT,
            // We never enable anything the server could ask us to turn off.
            _ => return,
        };
        if self.answered.insert((verb, option)) {
            replies.extend_from_slice(&[IAC, reply, option]);
        }
    }
}

/// Escape payload bytes for sending (double every IAC).
#[must_use]
pub fn escape(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for &b in data {
        if b == IAC {
            out.push(IAC);
        }
        out.push(b);
    }
    out
}
