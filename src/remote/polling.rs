// Live subscription emulated by re-reading the collection on an interval

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use super::{
    CollectionReader, ListenerRegistration, RemoteCollection, RemoteError, SnapshotCallback,
};
use crate::domain::models::{BookRecord, Category};

/// Last outcome handed to the listener; an identical next outcome is not re-sent.
enum Emitted {
    Books(Vec<BookRecord>),
    Failure(RemoteError),
}

pub struct PollingCollection<R> {
    reader: Arc<R>,
    interval: Duration,
}

impl<R: CollectionReader + 'static> PollingCollection<R> {
    pub fn new(reader: Arc<R>, interval: Duration) -> Self {
        Self { reader, interval }
    }
}

impl<R: CollectionReader + 'static> RemoteCollection for PollingCollection<R> {
    #[tracing::instrument(level = "debug", skip(self, callback))]
    fn observe(&self, category: Category, callback: SnapshotCallback) -> ListenerRegistration {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!(error = %e, "cannot start listener outside a tokio runtime");
                callback(Err(RemoteError::transport(format!(
                    "listener needs a tokio runtime: {e}"
                ))));
                return ListenerRegistration::new(|| {});
            }
        };

        let reader = self.reader.clone();
        let interval = self.interval;
        let path = category.collection_path();
        let task = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last: Option<Emitted> = None;
            loop {
                ticker.tick().await;
                match reader.read_books(&path).await {
                    Ok(books) => {
                        if matches!(&last, Some(Emitted::Books(prev)) if *prev == books) {
                            tracing::trace!(%path, "collection unchanged");
                            continue;
                        }
                        tracing::debug!(%path, count = books.len(), "collection changed");
                        callback(Ok(books.clone()));
                        last = Some(Emitted::Books(books));
                    }
                    Err(e) => {
                        if matches!(&last, Some(Emitted::Failure(prev)) if *prev == e) {
                            continue;
                        }
                        tracing::warn!(%path, error = %e, "collection read failed");
                        callback(Err(e.clone()));
                        last = Some(Emitted::Failure(e));
                    }
                }
            }
        });

        ListenerRegistration::new(move || {
            tracing::debug!(%category, "removing collection listener");
            task.abort();
        })
    }
}
