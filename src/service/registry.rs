//! Registry of live connection handlers.
//!
//! All mutation is serialized by one mutex: insertion in the accept loop
//! before a connection task is spawned, self-removal at the end of each
//! task, and the shutdown sweep. The sweep holds the lock for its entire
//! iterate-force-close-clear pass, so it can never interleave with a
//! terminating task's deregistration.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::protocol::ServerProtocol;
use crate::service::handler::ConnectionHandler;

/// Connection ids only need uniqueness, not ordering guarantees.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection, used as registry key and in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub(crate) fn next() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Mutex-guarded set of currently live connection handlers.
#[derive(Debug)]
pub struct ClientRegistry<P: ServerProtocol> {
    clients: Mutex<HashMap<ConnectionId, Arc<ConnectionHandler<P>>>>,
}

impl<P: ServerProtocol> ClientRegistry<P> {
    pub(crate) fn new() -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionId, Arc<ConnectionHandler<P>>>> {
        // A poisoning panic can only come from application callbacks; the
        // map itself is left consistent by every operation here.
        self.clients.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn insert(&self, handler: Arc<ConnectionHandler<P>>) {
        self.lock().insert(handler.id(), handler);
    }

    pub(crate) fn remove(&self, id: ConnectionId) {
        self.lock().remove(&id);
    }

    /// Number of currently registered handlers.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Force-close every registered handler and clear the registry, as one
    /// critical section.
    pub(crate) fn close_all(&self) {
        let mut clients = self.lock();
        for (_, handler) in clients.drain() {
            handler.force_close();
        }
    }
}
