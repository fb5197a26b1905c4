use std::fmt::{Debug, Display};

use crossbeam::atomic::AtomicCell;

static CONNECTION_COUNTER: AtomicCell<u64> = AtomicCell::new(1);

/// Identifies a single transport connection for as long as it stays open.
///
/// Ids are handed out from a process-wide counter and never reused, so a client
/// that reconnects always gets a fresh id.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocates the next connection id.
    pub fn next() -> Self {
        Self(CONNECTION_COUNTER.fetch_add(1))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl Debug for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
