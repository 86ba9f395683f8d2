/*!
Counters of datagrams that pass through onion socket.

Incoming and outgoing datagrams are counted by `OnionCodec`, dropped ones by
`run_socket`.
*/

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Handle to counters shared between codec and socket loop.
#[derive(Clone, Default)]
pub struct Stats {
    /// incoming/outgoing/dropped counters
    pub counters: Arc<Counters>
}

impl Stats {
    /// New Stats object
    pub fn new() -> Self {
        Default::default()
    }
}

#[derive(Default)]
/// Datagram counters.
pub struct Counters {
    /// Datagrams received from socket.
    incoming: AtomicU64,
    /// Datagrams written to socket.
    outgoing: AtomicU64,
    /// Received datagrams that were silently discarded.
    dropped: AtomicU64,
}

impl Counters {
    /// Add 1 to incoming counter
    pub fn increase_incoming(&self) {
        self.incoming.fetch_add(1, Ordering::Relaxed);
    }

    /// Add 1 to outgoing counter
    pub fn increase_outgoing(&self) {
        self.outgoing.fetch_add(1, Ordering::Relaxed);
    }

    /// Add 1 to dropped counter
    pub fn increase_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Get incoming counter
    pub fn incoming(&self) -> u64 {
        self.incoming.load(Ordering::Relaxed)
    }

    /// Get outgoing counter
    pub fn outgoing(&self) -> u64 {
        self.outgoing.load(Ordering::Relaxed)
    }

    /// Get dropped counter
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
