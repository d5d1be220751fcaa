//! Conversation Engine
//!
//! Walks an immutable [`Script`] against the messages a client sends.
//!
//! ## States
//! ```text
//!                 ┌──────────── block matched, next is Client ───┐
//!                 ▼                                              │
//!   ──► AwaitingClient ── block matched, next is Server ──► SendingServer
//!          │    ▲                                              │
//!          │    └────────── block sent, next is Client ────────┘
//!          │
//!          ├── mismatch / close / timeout ──► Failed(reason)
//!          └── script exhausted ────────────► Completed
//! ```
//!
//! The engine does no I/O. The connection reads, writes and reports what
//! happened; the engine only moves the cursor and decides the state.

use std::time::Duration;

use thiserror::Error;

use crate::protocol::Message;
use crate::script::{Expect, Reply, Script, Step};

/// Why a conversation failed
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Failure {
    #[error(
        "Message mismatch at script line {line}: expected <{want}>, received <{got}>",
        line = .expected.line_no,
        want = .expected.message
    )]
    Mismatch { expected: Expect, got: Message },

    #[error("Client disconnected with {remaining} script lines remaining")]
    Incomplete { remaining: usize },

    #[error("Timed out after {0:?} of inactivity")]
    Timeout(Duration),

    #[error("Failed to write to client: {0}")]
    WriteError(String),

    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Conversation state
#[derive(Debug, Clone, PartialEq)]
pub enum State {
    /// Waiting for the next client message of the current block
    AwaitingClient,

    /// The current block is a server block that should be played now
    SendingServer,

    /// Script exhausted (or `<EXIT>` reached)
    Completed,

    /// Terminal failure
    Failed(Failure),
}

impl State {
    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Completed | State::Failed(_))
    }
}

/// One scripted conversation in progress
///
/// The cursor is `(step, offset)`: the current block and, for client
/// blocks, how many of its messages are already consumed.
#[derive(Debug)]
pub struct Conversation<'a> {
    script: &'a Script,
    step: usize,
    offset: usize,
    state: State,
}

impl<'a> Conversation<'a> {
    /// Start at the first step of `script`
    pub fn new(script: &'a Script) -> Self {
        let mut conversation = Self {
            script,
            step: 0,
            offset: 0,
            state: State::Completed,
        };
        conversation.state = conversation.state_at_cursor();
        conversation
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn into_state(self) -> State {
        self.state
    }

    pub fn script(&self) -> &'a Script {
        self.script
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn is_awaiting_client(&self) -> bool {
        self.state == State::AwaitingClient
    }

    pub fn is_sending_server(&self) -> bool {
        self.state == State::SendingServer
    }

    /// Current cursor as `(step index, offset in block)`
    pub fn cursor(&self) -> (usize, usize) {
        (self.step, self.offset)
    }

    /// The next client message the script expects, if any
    pub fn expected(&self) -> Option<&'a Expect> {
        match self.script.steps().get(self.step) {
            Some(Step::Client(block)) => block.get(self.offset),
            _ => None,
        }
    }

    /// The server block to play, when in `SendingServer`
    pub fn replies(&self) -> Option<&'a [Reply]> {
        if self.state != State::SendingServer {
            return None;
        }
        match self.script.steps().get(self.step) {
            Some(Step::Server(block)) => Some(block.as_slice()),
            _ => None,
        }
    }

    /// Number of script lines not yet consumed or sent
    pub fn remaining(&self) -> usize {
        self.script
            .steps()
            .iter()
            .skip(self.step)
            .map(Step::len)
            .sum::<usize>()
            - self.offset
    }

    /// Feed one client message
    ///
    /// Only meaningful while awaiting the client; in any other state the
    /// message is ignored and the state is returned unchanged.
    pub fn receive(&mut self, message: Message) -> &State {
        if self.state != State::AwaitingClient {
            return &self.state;
        }
        let expected = match self.expected() {
            Some(expected) => expected,
            None => return &self.state,
        };

        if !self.matches(expected, &message) {
            tracing::debug!("C: {}", message);
            self.state = State::Failed(Failure::Mismatch {
                expected: expected.clone(),
                got: message,
            });
            return &self.state;
        }

        if self.script.is_auto(&message.name) {
            tracing::debug!("C: (AUTO) {}", message);
        } else {
            tracing::debug!("C: {}", message);
        }

        self.offset += 1;
        let block_len = self.script.steps().get(self.step).map(Step::len).unwrap_or(0);
        if self.offset >= block_len {
            self.advance();
        }
        &self.state
    }

    /// The current server block has been played in full
    pub fn replies_sent(&mut self) -> &State {
        if self.state == State::SendingServer {
            self.advance();
        }
        &self.state
    }

    /// `<EXIT>`: skip whatever is left and complete
    pub fn exit(&mut self) -> &State {
        if !self.is_terminal() {
            self.step = self.script.steps().len();
            self.offset = 0;
            self.state = State::Completed;
        }
        &self.state
    }

    /// The client closed its end of the connection
    pub fn disconnected(&mut self) -> &State {
        if self.is_terminal() {
            return &self.state;
        }
        let remaining = self.remaining();
        self.state = if remaining == 0 {
            State::Completed
        } else {
            State::Failed(Failure::Incomplete { remaining })
        };
        &self.state
    }

    /// Record a failure detected outside the engine (timeouts, bad bytes)
    pub fn fail(&mut self, failure: Failure) -> &State {
        if !self.is_terminal() {
            self.state = State::Failed(failure);
        }
        &self.state
    }

    /// Names match, then fields match unless the name is AUTO
    fn matches(&self, expected: &Expect, message: &Message) -> bool {
        expected.message.name == message.name
            && (self.script.is_auto(&message.name) || expected.message.fields == message.fields)
    }

    fn advance(&mut self) {
        self.step += 1;
        self.offset = 0;
        self.state = self.state_at_cursor();
    }

    fn state_at_cursor(&self) -> State {
        match self.script.steps().get(self.step) {
            Some(Step::Client(_)) => State::AwaitingClient,
            Some(Step::Server(_)) => State::SendingServer,
            None => State::Completed,
        }
    }
}
