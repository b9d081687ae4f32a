//! Business handler plumbing.
//!
//! A handler receives the hub, the client whose reader produced the event,
//! and the event itself. It runs on that client's reader task, so events
//! from one connection are handled one at a time and a slow handler only
//! delays its own connection.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use hubbub_protocol::Event;

use crate::{Client, Hub};

/// Type-erased event handler as stored in the hub's registry.
pub type EventHandler =
    Arc<dyn Fn(Hub, Arc<Client>, Event) -> BoxFuture<'static, ()> + Send + Sync>;

pub(crate) fn boxed<F, Fut>(handler: F) -> EventHandler
where
    F: Fn(Hub, Arc<Client>, Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |hub, client, event| Box::pin(handler(hub, client, event)))
}
