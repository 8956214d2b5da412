// Domain models shared by the remote client, the live-query adapter and the HTTP layer

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Collection path template; `{category}` is replaced by the category label.
pub const COLLECTION_PATH_PREFIX: &str = "books/affiliate_books";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Juniors,
    Professionals,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Juniors, Category::Professionals];

    /// The literal label used both for display and as the remote path segment.
    pub fn label(self) -> &'static str {
        match self {
            Category::Juniors => "Juniors",
            Category::Professionals => "Professionals",
        }
    }

    pub fn collection_path(self) -> String {
        format!("{}/{}", COLLECTION_PATH_PREFIX, self.label())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.label() == s || c.label().to_ascii_lowercase() == s)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

/// A recommended book as stored in the remote collection.
///
/// Every field defaults to an empty string so partially populated documents
/// still decode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookRecord {
    pub name: String,
    pub author: String,
    /// Cover image URI or resource identifier
    pub image: String,
    pub description: String,
    /// Purchase link
    pub link: String,
    pub category: String,
}

/// Full result set for a category at the time of one listener callback.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySnapshot {
    pub books: Vec<BookRecord>,
    pub received_at: DateTime<Utc>,
}

impl QuerySnapshot {
    pub fn new(books: Vec<BookRecord>) -> Self {
        Self {
            books,
            received_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}
