use std::sync::Arc;

use futures::StreamExt;
use poem_openapi::payload::{EventStream, Json};

use crate::{
    books_api::models::{BookDto, BooksResponse, ErrorDto, QueryEventDto, WatchResponse},
    domain::models::Category,
    live_query::{LiveQuery, QueryEvent},
    remote::RemoteCollection,
};

pub struct BooksService<'a> {
    pub collection: &'a Arc<dyn RemoteCollection>,
}

impl<'a> BooksService<'a> {
    pub fn new(collection: &'a Arc<dyn RemoteCollection>) -> Self {
        Self { collection }
    }

    fn unknown_category(label: &str) -> ErrorDto {
        ErrorDto {
            message: format!("unknown category: {}", label),
        }
    }

    /// Open a live query, wait for its first event and close it again.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn current_books(&self, label: &str) -> BooksResponse {
        let Ok(category) = label.parse::<Category>() else {
            return BooksResponse::NotFound(Json(Self::unknown_category(label)));
        };
        let query = LiveQuery::new(self.collection.clone(), category);
        let mut stream = match query.subscribe() {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "failed to start live query");
                return BooksResponse::BadGateway(Json(ErrorDto::retry_later()));
            }
        };
        let event = stream.next_event().await;
        query.dispose();

        match event {
            Some(QueryEvent::Success(snapshot)) => {
                tracing::debug!(%category, count = snapshot.books.len(), "books loaded");
                BooksResponse::Ok(Json(
                    snapshot.books.into_iter().map(BookDto::from).collect(),
                ))
            }
            Some(QueryEvent::Failure(e)) => {
                tracing::error!(error = %e, %category, "failed to load books");
                BooksResponse::BadGateway(Json(ErrorDto::retry_later()))
            }
            None => BooksResponse::BadGateway(Json(ErrorDto::retry_later())),
        }
    }

    /// Hand the live query over to an SSE stream; the query lives until the client disconnects.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn watch_books(&self, label: &str) -> WatchResponse {
        let Ok(category) = label.parse::<Category>() else {
            return WatchResponse::NotFound(Json(Self::unknown_category(label)));
        };
        let query = LiveQuery::new(self.collection.clone(), category);
        match query.subscribe() {
            Ok(stream) => {
                tracing::info!(%category, "watcher attached");
                WatchResponse::Ok(EventStream::new(
                    stream.map(QueryEventDto::from).boxed(),
                ))
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to start live query");
                WatchResponse::BadGateway(Json(ErrorDto::retry_later()))
            }
        }
    }
}
