//! Script definitions
//!
//! The in-memory form of a parsed conversation script.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use crate::protocol::{BoltVersion, Message, Role};

/// A `!:` line
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// `!: BOLT 3` pins the protocol version
    BoltVersion(BoltVersion),

    /// `!: AUTO HELLO` relaxes field matching for a message name
    Auto(String),

    /// `!: HANDSHAKE 00 00 00 03` replaces the raw handshake reply
    Handshake(Vec<u8>),
}

/// An expected client message and the line it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Expect {
    pub line_no: usize,
    pub message: Message,
}

/// Something the server does while playing a Server step
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Send a message
    Send(Message),

    /// `<EXIT>`: end the conversation successfully
    Exit,

    /// `<RAW> 00 01 ...`: write bytes verbatim
    Raw(Vec<u8>),

    /// `<SLEEP> 0.5`: pause before the next action
    Sleep(Duration),

    /// `<NOOP>`: write an empty keep-alive chunk
    Noop,
}

/// A scripted server action and the line it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub line_no: usize,
    pub action: Action,
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.action {
            Action::Send(message) => write!(f, "{}", message),
            Action::Exit => f.write_str("<EXIT>"),
            Action::Raw(bytes) => write!(f, "<RAW> {}", crate::protocol::codec::hex(bytes)),
            Action::Sleep(delay) => write!(f, "<SLEEP> {}", delay.as_secs_f64()),
            Action::Noop => f.write_str("<NOOP>"),
        }
    }
}

/// A contiguous block of same-role lines
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Client(Vec<Expect>),
    Server(Vec<Reply>),
}

impl Step {
    pub fn role(&self) -> Role {
        match self {
            Step::Client(_) => Role::Client,
            Step::Server(_) => Role::Server,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Step::Client(lines) => lines.len(),
            Step::Server(lines) => lines.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A parsed conversation script
///
/// Immutable once built; a [`crate::engine::Conversation`] walks it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Script {
    pub(crate) steps: Vec<Step>,
    pub(crate) directives: Vec<Directive>,
}

impl Script {
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Protocol version pinned by a `BOLT` directive (last one wins)
    pub fn bolt_version(&self) -> Option<BoltVersion> {
        self.directives.iter().rev().find_map(|d| match d {
            Directive::BoltVersion(v) => Some(*v),
            _ => None,
        })
    }

    /// Raw handshake reply from a `HANDSHAKE` directive (last one wins)
    pub fn handshake_override(&self) -> Option<&[u8]> {
        self.directives.iter().rev().find_map(|d| match d {
            Directive::Handshake(bytes) => Some(bytes.as_slice()),
            _ => None,
        })
    }

    /// Names registered with `AUTO`
    pub fn auto_names(&self) -> BTreeSet<&str> {
        self.directives
            .iter()
            .filter_map(|d| match d {
                Directive::Auto(name) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn is_auto(&self, name: &str) -> bool {
        self.directives
            .iter()
            .any(|d| matches!(d, Directive::Auto(n) if n == name))
    }
}
