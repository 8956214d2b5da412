//! Bridge from a push-style [`RemoteCollection`] listener to a pull-based
//! stream of [`QueryEvent`]s.
//!
//! A [`LiveQuery`] is single use and moves through three states:
//!
//! - `Idle`: nothing open.
//! - `Active`: one listener registered, one [`QueryStream`] handed out.
//! - `Closed`: listener disposed, channel closed. Terminal.
//!
//! Every listener callback becomes exactly one event, in arrival order. A
//! callback that races with teardown is dropped: the sender lives behind the
//! same mutex the callback takes, and teardown removes it before returning.

use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use crate::domain::models::{Category, QuerySnapshot};
use crate::remote::{ListenerRegistration, RemoteCollection, RemoteError, SnapshotResult};

#[derive(Debug, Clone, PartialEq)]
pub enum QueryEvent {
    Success(QuerySnapshot),
    Failure(RemoteError),
}

impl From<SnapshotResult> for QueryEvent {
    fn from(result: SnapshotResult) -> Self {
        match result {
            Ok(books) => QueryEvent::Success(QuerySnapshot::new(books)),
            Err(e) => QueryEvent::Failure(e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Idle,
    Active,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LiveQueryError {
    #[error("live query for {0} already has a subscriber")]
    AlreadySubscribed(Category),
    #[error("live query for {0} is closed")]
    Closed(Category),
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Write side shared with the listener callback.
struct Gate {
    sender: Mutex<Option<mpsc::UnboundedSender<QueryEvent>>>,
}

impl Gate {
    fn deliver(&self, category: Category, result: SnapshotResult) {
        let sender = lock(&self.sender);
        match sender.as_ref() {
            Some(tx) => {
                if tx.send(QueryEvent::from(result)).is_err() {
                    tracing::trace!(%category, "consumer gone, dropping event");
                }
            }
            None => tracing::trace!(%category, "late callback after close dropped"),
        }
    }
}

struct Lifecycle {
    state: QueryState,
    registration: Option<ListenerRegistration>,
}

struct Shared {
    category: Category,
    gate: Arc<Gate>,
    lifecycle: Mutex<Lifecycle>,
}

impl Shared {
    fn state(&self) -> QueryState {
        lock(&self.lifecycle).state
    }

    fn close(&self) {
        let registration = {
            let mut lifecycle = lock(&self.lifecycle);
            if lifecycle.state == QueryState::Closed {
                return;
            }
            lifecycle.state = QueryState::Closed;
            lifecycle.registration.take()
        };
        // waits for an in-flight callback to finish its send
        lock(&self.gate.sender).take();
        if let Some(registration) = registration {
            registration.dispose();
        }
        tracing::debug!(category = %self.category, "live query closed");
    }
}

/// Observes one category of a [`RemoteCollection`].
pub struct LiveQuery<C: RemoteCollection + ?Sized> {
    collection: Arc<C>,
    shared: Arc<Shared>,
}

impl<C: RemoteCollection + ?Sized> LiveQuery<C> {
    pub fn new(collection: Arc<C>, category: Category) -> Self {
        Self {
            collection,
            shared: Arc::new(Shared {
                category,
                gate: Arc::new(Gate {
                    sender: Mutex::new(None),
                }),
                lifecycle: Mutex::new(Lifecycle {
                    state: QueryState::Idle,
                    registration: None,
                }),
            }),
        }
    }

    pub fn category(&self) -> Category {
        self.shared.category
    }

    pub fn state(&self) -> QueryState {
        self.shared.state()
    }

    /// Attach the one consumer and open the remote listener.
    #[tracing::instrument(level = "debug", skip(self), fields(category = %self.shared.category))]
    pub fn subscribe(&self) -> Result<QueryStream, LiveQueryError> {
        let category = self.shared.category;
        let mut lifecycle = lock(&self.shared.lifecycle);
        match lifecycle.state {
            QueryState::Idle => {}
            QueryState::Active => return Err(LiveQueryError::AlreadySubscribed(category)),
            QueryState::Closed => return Err(LiveQueryError::Closed(category)),
        }

        let (tx, rx) = mpsc::unbounded_channel();
        *lock(&self.shared.gate.sender) = Some(tx);

        let gate = self.shared.gate.clone();
        let registration = self.collection.observe(
            category,
            Box::new(move |result| gate.deliver(category, result)),
        );
        lifecycle.registration = Some(registration);
        lifecycle.state = QueryState::Active;
        drop(lifecycle);
        tracing::debug!("live query active");

        Ok(QueryStream {
            receiver: rx,
            shared: self.shared.clone(),
        })
    }

    /// Close the query. The remote listener is released before this returns.
    /// Safe to call repeatedly and from any state.
    pub fn dispose(&self) {
        self.shared.close();
    }
}

/// Consumer side of a [`LiveQuery`]. Dropping it cancels the subscription.
pub struct QueryStream {
    receiver: mpsc::UnboundedReceiver<QueryEvent>,
    shared: Arc<Shared>,
}

impl QueryStream {
    /// Wait for the next event; `None` once the query is closed.
    pub async fn next_event(&mut self) -> Option<QueryEvent> {
        if self.shared.state() == QueryState::Closed {
            return None;
        }
        let event = self.receiver.recv().await?;
        // an event buffered before close must not surface after it
        (self.shared.state() != QueryState::Closed).then_some(event)
    }

    pub fn category(&self) -> Category {
        self.shared.category
    }

    pub fn close(&self) {
        self.shared.close();
    }
}

impl Stream for QueryStream {
    type Item = QueryEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.shared.state() == QueryState::Closed {
            return Poll::Ready(None);
        }
        match self.receiver.poll_recv(cx) {
            Poll::Ready(Some(_)) if self.shared.state() == QueryState::Closed => Poll::Ready(None),
            other => other,
        }
    }
}

impl Drop for QueryStream {
    fn drop(&mut self) {
        self.shared.close();
    }
}
