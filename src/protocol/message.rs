//! Message definitions
//!
//! Protocol versions and the name ↔ tag tables for client and server
//! messages in each version.

use std::fmt;
use std::str::FromStr;

use super::Value;

/// Which side of the conversation sends a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Client,
    Server,
}

impl Role {
    /// Prefix used for this role in scripts and logs
    pub fn prefix(&self) -> &'static str {
        match self {
            Role::Client => "C:",
            Role::Server => "S:",
        }
    }
}

/// A protocol version negotiated during the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BoltVersion {
    pub major: u8,
    pub minor: u8,
}

impl BoltVersion {
    pub const V1: BoltVersion = BoltVersion::new(1, 0);
    pub const V2: BoltVersion = BoltVersion::new(2, 0);
    pub const V3: BoltVersion = BoltVersion::new(3, 0);
    pub const V4_0: BoltVersion = BoltVersion::new(4, 0);
    pub const V4_1: BoltVersion = BoltVersion::new(4, 1);

    /// Versions this server speaks, highest first
    pub const SUPPORTED: [BoltVersion; 5] = [
        BoltVersion::V4_1,
        BoltVersion::V4_0,
        BoltVersion::V3,
        BoltVersion::V2,
        BoltVersion::V1,
    ];

    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// Handshake word: `00 00 minor major`
    pub fn to_word(self) -> u32 {
        ((self.minor as u32) << 8) | self.major as u32
    }

    /// Interpret a proposal word from the handshake; zero is an empty slot
    pub fn from_word(word: u32) -> Option<Self> {
        if word == 0 {
            return None;
        }
        Some(Self::new((word & 0xFF) as u8, ((word >> 8) & 0xFF) as u8))
    }

    pub fn is_supported(self) -> bool {
        Self::SUPPORTED.contains(&self)
    }

    /// Message name ↔ tag table for the given role in this version
    pub fn table(self, role: Role) -> &'static [(&'static str, u8)] {
        match role {
            Role::Server => SERVER_MESSAGES,
            Role::Client => match self.major {
                1 | 2 => CLIENT_MESSAGES_V1,
                3 => CLIENT_MESSAGES_V3,
                _ => CLIENT_MESSAGES_V4,
            },
        }
    }

    /// Look up the structure tag for a message name
    pub fn tag_for(self, role: Role, name: &str) -> Option<u8> {
        self.table(role)
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, tag)| *tag)
    }

    /// Look up the message name for a structure tag
    pub fn name_for(self, role: Role, tag: u8) -> Option<&'static str> {
        self.table(role)
            .iter()
            .find(|(_, t)| *t == tag)
            .map(|(name, _)| *name)
    }
}

impl fmt::Display for BoltVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for BoltVersion {
    type Err = String;

    /// Accepts `4` or `4.1`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (major, minor) = match s.split_once('.') {
            Some((major, minor)) => (major, minor),
            None => (s, "0"),
        };
        let major = major
            .trim()
            .parse::<u8>()
            .map_err(|_| format!("invalid protocol version {:?}", s))?;
        let minor = minor
            .trim()
            .parse::<u8>()
            .map_err(|_| format!("invalid protocol version {:?}", s))?;
        Ok(Self::new(major, minor))
    }
}

// =============================================================================
// Message Tables
// =============================================================================

const CLIENT_MESSAGES_V1: &[(&str, u8)] = &[
    ("INIT", 0x01),
    ("ACK_FAILURE", 0x0E),
    ("RESET", 0x0F),
    ("RUN", 0x10),
    ("DISCARD_ALL", 0x2F),
    ("PULL_ALL", 0x3F),
];

const CLIENT_MESSAGES_V3: &[(&str, u8)] = &[
    ("HELLO", 0x01),
    ("GOODBYE", 0x02),
    ("RESET", 0x0F),
    ("RUN", 0x10),
    ("BEGIN", 0x11),
    ("COMMIT", 0x12),
    ("ROLLBACK", 0x13),
    ("DISCARD_ALL", 0x2F),
    ("PULL_ALL", 0x3F),
];

const CLIENT_MESSAGES_V4: &[(&str, u8)] = &[
    ("HELLO", 0x01),
    ("GOODBYE", 0x02),
    ("RESET", 0x0F),
    ("RUN", 0x10),
    ("BEGIN", 0x11),
    ("COMMIT", 0x12),
    ("ROLLBACK", 0x13),
    ("DISCARD", 0x2F),
    ("PULL", 0x3F),
];

const SERVER_MESSAGES: &[(&str, u8)] = &[
    ("SUCCESS", 0x70),
    ("RECORD", 0x71),
    ("IGNORED", 0x7E),
    ("FAILURE", 0x7F),
];

/// True if some supported version knows `name` for `role`
pub fn is_known_name(role: Role, name: &str) -> bool {
    BoltVersion::SUPPORTED
        .iter()
        .any(|v| v.tag_for(role, name).is_some())
}

// =============================================================================
// Message
// =============================================================================

/// A named protocol message
///
/// The name is symbolic; the tag is resolved against the negotiated
/// version only when the message hits the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub name: String,
    pub fields: Vec<Value>,
}

impl Message {
    pub fn new(name: impl Into<String>, fields: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }
}

impl fmt::Display for Message {
    /// Renders the way a script line spells it: `RUN "RETURN 1" {}`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for field in &self.fields {
            write!(f, " {}", field)?;
        }
        Ok(())
    }
}
