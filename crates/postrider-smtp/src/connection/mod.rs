//! Connection management: the stream and the per-session configuration.

mod stream;

pub use stream::{SmtpStream, connect, connect_tls};

use std::time::Duration;

/// Time budgets for one session.
///
/// Each budget applies to a single checkpoint (one connect, one read, one
/// write), never to the session as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Budget for establishing the TCP (and TLS) connection.
    pub connect_timeout: Duration,
    /// Budget for each read or write checkpoint.
    pub io_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            io_timeout: Duration::from_secs(60),
        }
    }
}

impl SessionConfig {
    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the per-checkpoint I/O timeout.
    #[must_use]
    pub const fn io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.io_timeout, Duration::from_secs(60));
    }

    #[test]
    fn builder_overrides() {
        let config = SessionConfig::default()
            .connect_timeout(Duration::from_secs(10))
            .io_timeout(Duration::from_secs(5));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.io_timeout, Duration::from_secs(5));
    }
}
