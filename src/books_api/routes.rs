use std::sync::Arc;

use poem_openapi::{
    OpenApi,
    param::Path,
    payload::{Json, PlainText},
};

use super::models::{BooksResponse, WatchResponse};
use super::services::books::BooksService;
use crate::domain::models::Category;
use crate::remote::RemoteCollection;

pub struct BooksApi {
    pub collection: Arc<dyn RemoteCollection>,
}

#[OpenApi]
impl BooksApi {
    #[oai(path = "/health", method = "get")]
    async fn health(&self) -> PlainText<String> {
        PlainText("ok".to_string())
    }

    /// Categories that can be browsed
    #[oai(path = "/v1/categories", method = "get")]
    #[tracing::instrument(level = "debug", skip(self))]
    async fn list_categories(&self) -> Json<Vec<String>> {
        Json(
            Category::ALL
                .iter()
                .map(|c| c.label().to_string())
                .collect(),
        )
    }

    /// Current books of a category
    #[oai(path = "/v1/categories/:category/books", method = "get")]
    #[tracing::instrument(level = "debug", skip(self, category))]
    async fn list_books(&self, category: Path<String>) -> BooksResponse {
        let category = category.0;
        tracing::debug!(%category, "handling list_books");
        BooksService::new(&self.collection)
            .current_books(&category)
            .await
    }

    /// Live updates of a category as server-sent events
    #[oai(path = "/v1/categories/:category/books/watch", method = "get")]
    #[tracing::instrument(level = "debug", skip(self, category))]
    async fn watch_books(&self, category: Path<String>) -> WatchResponse {
        let category = category.0;
        tracing::debug!(%category, "handling watch_books");
        BooksService::new(&self.collection).watch_books(&category)
    }
}
