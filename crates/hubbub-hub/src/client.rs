//! The hub's and rooms' handle to one connected subscriber.
//!
//! A [`Client`] owns the sending side of a bounded outbound queue and the
//! set of room names it currently belongs to. The receiving side
//! ([`Outbound`]) goes to the connection's writer pump. Membership is
//! recorded by name only; the hub resolves names through its room
//! registry, so a client never keeps a room alive.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hubbub_protocol::Event;
use tokio::sync::{mpsc, watch};

use crate::{ClientConfig, DeliveryError};

/// Counter for generating unique client IDs.
static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique client identifier. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl ClientId {
    fn next() -> Self {
        Self(NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// Receiving side of a client's outbound queue.
pub type Outbound = mpsc::Receiver<Arc<Event>>;

/// Room membership plus the closed flag, guarded together so a room can
/// never admit a client the hub has already torn down.
#[derive(Debug)]
pub(crate) struct Membership {
    pub(crate) closed: bool,
    pub(crate) rooms: HashSet<String>,
}

/// One connected subscriber/publisher.
#[derive(Debug)]
pub struct Client {
    id: ClientId,
    outbound: Mutex<Option<mpsc::Sender<Arc<Event>>>>,
    membership: Mutex<Membership>,
    closed: watch::Sender<bool>,
}

impl Client {
    /// Creates a client that is not yet attached to any hub or transport.
    ///
    /// Returns the client handle and the receiving side of its outbound
    /// queue.
    pub fn new(config: &ClientConfig) -> (Arc<Self>, Outbound) {
        let (tx, rx) = mpsc::channel(config.outbound_queue.max(1));
        let (closed, _) = watch::channel(false);
        let client = Self {
            id: ClientId::next(),
            outbound: Mutex::new(Some(tx)),
            membership: Mutex::new(Membership {
                closed: false,
                rooms: HashSet::with_capacity(config.room_capacity),
            }),
            closed,
        };
        (Arc::new(client), rx)
    }

    /// Returns this client's ID.
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Attempts to enqueue an event without waiting.
    ///
    /// # Errors
    /// [`DeliveryError::Full`] if the outbound queue is at capacity,
    /// [`DeliveryError::Closed`] once the client has been unregistered.
    pub fn try_send(&self, event: Arc<Event>) -> Result<(), DeliveryError> {
        let outbound = lock(&self.outbound);
        let Some(tx) = outbound.as_ref() else {
            return Err(DeliveryError::Closed);
        };
        tx.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Full,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    /// Names of the rooms this client currently belongs to, sorted.
    pub fn rooms(&self) -> Vec<String> {
        let mut rooms: Vec<String> =
            lock(&self.membership).rooms.iter().cloned().collect();
        rooms.sort();
        rooms
    }

    /// Returns `true` if the client is a member of `room`.
    pub fn in_room(&self, room: &str) -> bool {
        lock(&self.membership).rooms.contains(room)
    }

    /// Returns `true` once the hub has unregistered this client.
    pub fn is_closed(&self) -> bool {
        lock(&self.membership).closed
    }

    /// Runs `f` with the membership lock held.
    pub(crate) fn with_membership<R>(
        &self,
        f: impl FnOnce(&mut Membership) -> R,
    ) -> R {
        f(&mut lock(&self.membership))
    }

    /// Marks the client closed, detaches it from every room, closes the
    /// outbound queue and signals the connection pumps to stop.
    ///
    /// `detach` is called once per room name while the membership lock is
    /// held. Returns `false` if the client was already closed.
    pub(crate) fn close(&self, mut detach: impl FnMut(&str)) -> bool {
        let first = self.with_membership(|m| {
            if m.closed {
                return false;
            }
            m.closed = true;
            for room in m.rooms.drain() {
                detach(&room);
            }
            true
        });
        if first {
            lock(&self.outbound).take();
            self.closed.send_replace(true);
        }
        first
    }

    /// Subscribes to the close signal raised by [`Client::close`].
    pub(crate) fn closed_signal(&self) -> watch::Receiver<bool> {
        self.closed.subscribe()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
