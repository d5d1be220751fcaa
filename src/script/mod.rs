//! Script Module
//!
//! Parses conversation scripts into an immutable [`Script`].
//!
//! ## Responsibilities
//! - Directives (`!: AUTO`, `!: BOLT`, `!: HANDSHAKE`)
//! - Client and server blocks, merged across consecutive same-role lines
//! - Field literals in JSON syntax
//! - Fail fast with the offending line number

mod types;
mod parser;

pub use types::{Action, Directive, Expect, Reply, Script, Step};
pub use parser::{load, parse};
