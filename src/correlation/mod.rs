//! # Correlation
//!
//! The [`Synchronizer`] turns a one-way event channel into a request/response call.
//! Outgoing requests are stamped with a correlation id carried in an extension
//! attribute; the response that later arrives with the same id is handed back to the
//! task that is still waiting on the request.
//!
//! ## Dispatch
//!
//! ```text
//!                    ┌──────────────────────┐
//!   inbound ───────▶ │ correlation id set?  │
//!                    └──────────┬───────────┘
//!                 no            │            yes
//!         ┌─────────────────────┴─────────────────────┐
//!         ▼                                           ▼
//!  ┌─────────────┐  forward   ┌──────┐         ┌─────────────┐
//!  │   Request   │ ─────────▶ │ sink │         │  Response   │
//!  │ add session │            └──────┘         │  resolve(id)│
//!  └──────┬──────┘                             └──────┬──────┘
//!         │ wait: forward failure | response |        │ non-blocking
//!         │       timeout | shutdown                  │ handoff
//!         ▼                                           ▼
//!    reply / SyncError  ◀─────── oneshot ───────  Ack / SyncError
//! ```
//!
//! ## Outcomes
//!
//! Failures are returned to the immediate caller and never retried here. Each
//! [`SyncError`] carries an HTTP-analogous status for transports that can express one:
//!
//! | Outcome                         | Status |
//! |---------------------------------|--------|
//! | duplicate session id            | 500    |
//! | request could not be forwarded  | 400    |
//! | no response in time             | 504    |
//! | unknown session / closed client | 502    |
//! | too many pending sessions       | 503    |
//! | shutting down                   | 503    |

pub mod key;
pub mod sender;
pub mod session;
pub mod stats;
pub mod synchronizer;

use thiserror::Error;

pub use key::{CorrelationKey, CorrelationKeyError};
pub use sender::{DeliveryError, EventSender};
pub use session::{Session, SessionTable};
pub use stats::{StatsSnapshot, SyncStats};
pub use synchronizer::Synchronizer;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    #[error("Client session {0} already exists")]
    DuplicateSession(String),

    #[error("Unable to forward the request: {0}")]
    ForwardFailed(DeliveryError),

    #[error("Backend did not respond in time to session {0}")]
    Timeout(String),

    #[error("Client session {0} does not exist")]
    UnknownSession(String),

    #[error("Client connection of session {0} is closed")]
    ConnectionClosed(String),

    #[error("Too many pending sessions (limit {limit})")]
    Overloaded { limit: usize },

    #[error("Synchronizer is shutting down")]
    ShuttingDown,
}

impl SyncError {
    pub fn status_code(&self) -> u16 {
        match self {
            SyncError::DuplicateSession(_) => 500,
            SyncError::ForwardFailed(_) => 400,
            SyncError::Timeout(_) => 504,
            SyncError::UnknownSession(_) | SyncError::ConnectionClosed(_) => 502,
            SyncError::Overloaded { .. } | SyncError::ShuttingDown => 503,
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (SyncError::DuplicateSession("a".into()), 500),
            (
                SyncError::ForwardFailed(DeliveryError::Transport("refused".into())),
                400,
            ),
            (SyncError::Timeout("a".into()), 504),
            (SyncError::UnknownSession("a".into()), 502),
            (SyncError::ConnectionClosed("a".into()), 502),
            (SyncError::Overloaded { limit: 1 }, 503),
            (SyncError::ShuttingDown, 503),
        ];
        for (error, status) in cases {
            assert_eq!(error.status_code(), status, "{}", error);
        }
    }
}
