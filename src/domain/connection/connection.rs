//! The `Connection` record owned by the transport connector.

use serde::Serialize;
use std::time::Duration;

use super::ConnectionState;
use crate::domain::foundation::{DomainError, StateMachine, Timestamp, ValidationError};

/// Externally visible link status.
///
/// Published on every transition; `live` is true only while `Connected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LinkStatus {
    pub state: ConnectionState,
    pub live: bool,
    pub retry_count: u32,
}

/// One logical subscription to the push endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub address: String,
    pub state: ConnectionState,
    /// Failed attempts since the last successful open.
    pub retry_count: u32,
    /// Delay scheduled before the next attempt while `Reconnecting`.
    pub next_retry_delay: Option<Duration>,
    pub connected_at: Option<Timestamp>,
    pub last_error: Option<DomainError>,
}

impl Connection {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            state: ConnectionState::Disconnected,
            retry_count: 0,
            next_retry_delay: None,
            connected_at: None,
            last_error: None,
        }
    }

    pub fn is_live(&self) -> bool {
        self.state.is_live()
    }

    pub fn status(&self) -> LinkStatus {
        LinkStatus {
            state: self.state,
            live: self.state.is_live(),
            retry_count: self.retry_count,
        }
    }

    /// `Disconnected`/`Reconnecting` -> `Connecting`.
    pub fn begin_connect(&mut self) -> Result<(), ValidationError> {
        self.state = self.state.transition_to(ConnectionState::Connecting)?;
        self.next_retry_delay = None;
        Ok(())
    }

    /// Open succeeded: `Connected`, retry count reset.
    pub fn mark_connected(&mut self) -> Result<(), ValidationError> {
        self.state = self.state.transition_to(ConnectionState::Connected)?;
        self.retry_count = 0;
        self.next_retry_delay = None;
        self.connected_at = Some(Timestamp::now());
        self.last_error = None;
        Ok(())
    }

    /// Open or stream failed: `Reconnecting`, retry count incremented.
    ///
    /// Returns the new retry count.
    pub fn mark_failed(&mut self, reason: DomainError) -> Result<u32, ValidationError> {
        self.state = self.state.transition_to(ConnectionState::Reconnecting)?;
        self.retry_count = self.retry_count.saturating_add(1);
        self.connected_at = None;
        self.last_error = Some(reason);
        Ok(self.retry_count)
    }

    pub fn schedule_retry(&mut self, delay: Duration) {
        self.next_retry_delay = Some(delay);
    }

    /// Explicit teardown. The next `begin_connect` starts a fresh lifecycle
    /// with no failure history.
    pub fn mark_closed(&mut self) {
        if self.state.is_active() {
            self.state = ConnectionState::Disconnected;
        }
        self.retry_count = 0;
        self.next_retry_delay = None;
        self.connected_at = None;
        self.last_error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ErrorCode;

    fn refused() -> DomainError {
        DomainError::new(ErrorCode::TransportError, "connection refused")
    }

    #[test]
    fn new_connection_is_disconnected() {
        let conn = Connection::new("http://stream.local/events");
        assert_eq!(conn.state, ConnectionState::Disconnected);
        assert!(!conn.status().live);
    }

    #[test]
    fn failures_count_up_and_success_resets() {
        let mut conn = Connection::new("addr");
        conn.begin_connect().unwrap();
        assert_eq!(conn.mark_failed(refused()).unwrap(), 1);
        conn.schedule_retry(Duration::from_secs(1));
        assert_eq!(conn.next_retry_delay, Some(Duration::from_secs(1)));

        conn.begin_connect().unwrap();
        assert_eq!(conn.next_retry_delay, None);
        assert_eq!(conn.mark_failed(refused()).unwrap(), 2);

        conn.begin_connect().unwrap();
        conn.mark_connected().unwrap();
        assert_eq!(conn.retry_count, 0);
        assert!(conn.is_live());
        assert!(conn.last_error.is_none());
    }

    #[test]
    fn close_from_any_state_is_allowed_and_idempotent() {
        let mut conn = Connection::new("addr");
        conn.begin_connect().unwrap();
        conn.mark_connected().unwrap();
        conn.mark_closed();
        assert_eq!(conn.state, ConnectionState::Disconnected);

        conn.mark_closed();
        assert_eq!(conn.state, ConnectionState::Disconnected);
        assert!(conn.begin_connect().is_ok());
    }

    #[test]
    fn close_clears_failure_history() {
        let mut conn = Connection::new("addr");
        conn.begin_connect().unwrap();
        conn.mark_failed(refused()).unwrap();
        conn.begin_connect().unwrap();
        conn.mark_failed(refused()).unwrap();
        assert_eq!(conn.retry_count, 2);

        conn.mark_closed();

        assert_eq!(conn.retry_count, 0);
        assert!(conn.last_error.is_none());
        assert_eq!(conn.status().retry_count, 0);
        conn.begin_connect().unwrap();
        assert_eq!(conn.mark_failed(refused()).unwrap(), 1);
    }

    #[test]
    fn cannot_mark_connected_without_connecting() {
        let mut conn = Connection::new("addr");
        assert!(conn.mark_connected().is_err());
    }
}
