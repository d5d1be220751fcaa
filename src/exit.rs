//! Exit Controller
//!
//! Maps how a run ended to the process exit status.
//!
//! | Outcome                                              | Code |
//! |------------------------------------------------------|------|
//! | Completed                                            | 0    |
//! | Mismatch, Incomplete, WriteError, Handshake, Protocol | 1    |
//! | Timeout                                              | 2    |
//! | Setup failure (script, bind, listener I/O)           | 99   |

use std::process::ExitCode;

use crate::engine::{Failure, State};
use crate::error::StubError;

/// Process exit status of a stub run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitStatus {
    Ok = 0,
    OffScript = 1,
    Timeout = 2,
    Unknown = 99,
}

impl ExitStatus {
    /// Status for a conversation that reached a terminal state
    pub fn from_state(state: &State) -> Self {
        match state {
            State::Completed => ExitStatus::Ok,
            State::Failed(failure) => Self::from_failure(failure),
            // A run only ends in a terminal state
            State::AwaitingClient | State::SendingServer => ExitStatus::Unknown,
        }
    }

    pub fn from_failure(failure: &Failure) -> Self {
        match failure {
            Failure::Timeout(_) => ExitStatus::Timeout,
            Failure::Mismatch { .. }
            | Failure::Incomplete { .. }
            | Failure::WriteError(_)
            | Failure::Handshake(_)
            | Failure::Protocol(_) => ExitStatus::OffScript,
        }
    }

    /// Status for an error raised before or around the conversation
    pub fn from_error(error: &StubError) -> Self {
        if error.is_timeout() {
            ExitStatus::Timeout
        } else {
            ExitStatus::Unknown
        }
    }

    /// Status for a whole run, reporting failures on the diagnostic channel
    pub fn report(outcome: &crate::Result<State>) -> Self {
        match outcome {
            Ok(State::Completed) => tracing::info!("Script completed"),
            Ok(State::Failed(failure)) => tracing::error!("Conversation failed: {}", failure),
            Ok(_) => {}
            Err(e) => tracing::error!("{}", e),
        }

        let status = match outcome {
            Ok(state) => Self::from_state(state),
            Err(e) => Self::from_error(e),
        };
        tracing::info!("Exiting with code {}", status.code());
        status
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn is_success(self) -> bool {
        self == ExitStatus::Ok
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status.code())
    }
}
