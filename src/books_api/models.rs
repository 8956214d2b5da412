use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use poem_openapi::{ApiResponse, Object, payload::EventStream, payload::Json};

use crate::domain::models::BookRecord;
use crate::live_query::QueryEvent;

/// Message shown for any remote failure
pub const RETRY_LATER_MESSAGE: &str = "Please try after sometime";

#[derive(Debug, Clone, PartialEq, Object)]
pub struct BookDto {
    pub name: String,
    pub author: String,
    /// Cover image URI or resource identifier
    pub image: String,
    pub description: String,
    /// Purchase link, opened externally by clients
    pub link: String,
    pub category: String,
}

impl From<BookRecord> for BookDto {
    fn from(b: BookRecord) -> Self {
        BookDto {
            name: b.name,
            author: b.author,
            image: b.image,
            description: b.description,
            link: b.link,
            category: b.category,
        }
    }
}

#[derive(Debug, Clone, Object)]
pub struct ErrorDto {
    /// Human-readable error message
    pub message: String,
}

impl ErrorDto {
    pub fn retry_later() -> Self {
        ErrorDto {
            message: RETRY_LATER_MESSAGE.to_string(),
        }
    }
}

/// One live-query event as sent over server-sent events
#[derive(Debug, Clone, PartialEq, Object)]
pub struct QueryEventDto {
    /// "success" or "failure"
    pub status: String,
    pub books: Vec<BookDto>,
    pub message: Option<String>,
    pub received_at: Option<DateTime<Utc>>,
}

impl From<QueryEvent> for QueryEventDto {
    fn from(event: QueryEvent) -> Self {
        match event {
            QueryEvent::Success(snapshot) => QueryEventDto {
                status: "success".into(),
                books: snapshot.books.into_iter().map(BookDto::from).collect(),
                message: None,
                received_at: Some(snapshot.received_at),
            },
            QueryEvent::Failure(e) => {
                tracing::warn!(error = %e, "remote failure forwarded to watcher");
                QueryEventDto {
                    status: "failure".into(),
                    books: vec![],
                    message: Some(RETRY_LATER_MESSAGE.into()),
                    received_at: None,
                }
            }
        }
    }
}

#[derive(ApiResponse)]
pub enum BooksResponse {
    /// Current books of the category
    #[oai(status = 200)]
    Ok(Json<Vec<BookDto>>),

    /// Unknown category
    #[oai(status = 404)]
    NotFound(Json<ErrorDto>),

    /// Upstream store error
    #[oai(status = 502)]
    BadGateway(Json<ErrorDto>),
}

#[derive(ApiResponse)]
pub enum WatchResponse {
    /// Stream of query events, one per change of the collection
    #[oai(status = 200)]
    Ok(EventStream<BoxStream<'static, QueryEventDto>>),

    /// Unknown category
    #[oai(status = 404)]
    NotFound(Json<ErrorDto>),

    /// Query could not be started
    #[oai(status = 502)]
    BadGateway(Json<ErrorDto>),
}
