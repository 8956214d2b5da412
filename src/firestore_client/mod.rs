use std::collections::{HashMap, HashSet};
use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;

use crate::domain::mapping::map_document_to_book;
use crate::remote::{CollectionReader, RemoteError, RemoteErrorKind, SnapshotResult};

pub const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com/v1";
const DEFAULT_DATABASE: &str = "(default)";

#[derive(Clone, Debug)]
pub struct FirestoreClient {
    base_url: String,
    project_id: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl FirestoreClient {
    /// Create a new client for the given REST base URL (e.g. "https://firestore.googleapis.com/v1").
    /// `timeout` bounds both connecting and each whole request.
    pub fn new(
        base_url: impl Into<String>,
        project_id: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;
        let base_url_str = base_url.into();
        let project_id = project_id.into();
        tracing::debug!(base_url = %base_url_str, %project_id, timeout_ms = timeout.as_millis() as u64, "creating FirestoreClient");
        Ok(FirestoreClient {
            base_url: base_url_str.trim_end_matches('/').to_string(),
            project_id,
            api_key: None,
            client,
        })
    }

    /// Return a client that sends the provided web API key with every request
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let api_key = api_key.into();
        self.api_key = (!api_key.is_empty()).then_some(api_key);
        self
    }

    /// Build the documents URL for a collection path such as "books/affiliate_books/Juniors".
    /// This does not perform a request.
    pub fn collection_url(&self, collection_path: &str) -> String {
        format!(
            "{}/projects/{}/databases/{}/documents/{}",
            self.base_url,
            self.project_id,
            DEFAULT_DATABASE,
            collection_path.trim_matches('/')
        )
    }

    /// GET {collection}: one page of documents
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn list_documents(
        &self,
        collection_path: &str,
        page_token: Option<&str>,
    ) -> Result<ListDocumentsResponse, RemoteError> {
        let url = self.collection_url(collection_path);
        tracing::debug!(%url, page_token = page_token.unwrap_or(""), "GET documents");
        let mut q: Vec<(&str, &str)> = vec![];
        if let Some(key) = self.api_key.as_deref() {
            q.push(("key", key));
        }
        if let Some(token) = page_token {
            q.push(("pageToken", token));
        }
        let resp = self
            .client
            .get(&url)
            .query(&q)
            .send()
            .await
            .map_err(|e| RemoteError::transport(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| RemoteError::transport(e.to_string()))?;
        if !status.is_success() {
            return Err(error_from_status(status, &body));
        }

        match serde_json::from_str::<ListDocumentsResponse>(&body) {
            Ok(parsed) => Ok(parsed),
            Err(e) => {
                let snippet_len = body.len().min(2000);
                let snippet = body.get(..snippet_len).unwrap_or(&body);
                tracing::error!(error = %e, body_snippet = %snippet, "failed to parse ListDocumentsResponse");
                Err(RemoteError::new(RemoteErrorKind::Decode, e.to_string()))
            }
        }
    }

    /// Read every document of the collection, following page tokens.
    /// A token the server already handed out is a decode error, not a loop.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn list_all_documents(
        &self,
        collection_path: &str,
    ) -> Result<Vec<Document>, RemoteError> {
        let mut documents = vec![];
        let mut seen_tokens = HashSet::new();
        let mut page_token: Option<String> = None;
        loop {
            let page = self
                .list_documents(collection_path, page_token.as_deref())
                .await?;
            documents.extend(page.documents);
            match page.next_page_token {
                Some(token) if !token.is_empty() => {
                    if !seen_tokens.insert(token.clone()) {
                        tracing::error!(%token, "server repeated a page token");
                        return Err(RemoteError::new(
                            RemoteErrorKind::Decode,
                            format!("page token repeated: {}", token),
                        ));
                    }
                    page_token = Some(token);
                }
                _ => break,
            }
        }
        Ok(documents)
    }
}

#[async_trait::async_trait]
impl CollectionReader for FirestoreClient {
    async fn read_books(&self, collection_path: &str) -> SnapshotResult {
        let documents = self.list_all_documents(collection_path).await?;
        Ok(documents.iter().map(map_document_to_book).collect())
    }
}

fn error_from_status(status: StatusCode, body: &str) -> RemoteError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| status.to_string());
    let kind = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteErrorKind::Permission,
        StatusCode::NOT_FOUND => RemoteErrorKind::NotFound,
        _ => RemoteErrorKind::Transport,
    };
    RemoteError::new(kind, message)
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListDocumentsResponse {
    // an empty collection comes back as `{}`
    #[serde(default)]
    pub documents: Vec<Document>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Full resource name, e.g. "projects/p/databases/(default)/documents/books/affiliate_books/Juniors/abc"
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub fields: HashMap<String, Value>,
    // createTime, updateTime
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// A Firestore typed value. Only strings are modelled; other kinds are kept raw.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Value {
    pub string_value: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    /// Serve canned HTTP responses on 127.0.0.1; `respond` maps the request line to a JSON body.
    async fn stub_server(respond: fn(&str) -> String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                tokio::spawn(async move {
                    let mut request = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => request.extend_from_slice(&buf[..n]),
                        }
                    }
                    let request = String::from_utf8_lossy(&request);
                    let request_line = request.lines().next().unwrap_or_default();
                    let body = respond(request_line);
                    let response = format!(
                        "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                });
            }
        });
        format!("http://{}", addr)
    }

    fn doc(name: &str) -> String {
        format!(r#"{{ "name": "d/{name}", "fields": {{ "name": {{ "stringValue": "{name}" }} }} }}"#)
    }

    #[tokio::test]
    async fn stalled_server_times_out_as_transport() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = vec![];
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        let c = FirestoreClient::new(format!("http://{}", addr), "p", Duration::from_millis(200))
            .unwrap();

        let result = tokio::time::timeout(TIMEOUT, c.read_books("books/affiliate_books/Juniors"))
            .await
            .expect("read did not give up on a silent server");

        assert!(matches!(result, Err(e) if e.kind == RemoteErrorKind::Transport));
    }

    #[tokio::test]
    async fn list_all_documents_follows_page_tokens() {
        let base = stub_server(|line| {
            if line.contains("pageToken=p2") {
                format!(r#"{{ "documents": [{}] }}"#, doc("second"))
            } else {
                format!(r#"{{ "documents": [{}], "nextPageToken": "p2" }}"#, doc("first"))
            }
        })
        .await;
        let c = FirestoreClient::new(base, "p", TIMEOUT).unwrap();

        let books = c.read_books("books/affiliate_books/Juniors").await.unwrap();

        let names: Vec<&str> = books.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn repeated_page_token_is_an_error() {
        let base = stub_server(|_| {
            format!(r#"{{ "documents": [{}], "nextPageToken": "again" }}"#, doc("loop"))
        })
        .await;
        let c = FirestoreClient::new(base, "p", TIMEOUT).unwrap();

        let result = tokio::time::timeout(TIMEOUT, c.list_all_documents("books/affiliate_books/Juniors"))
            .await
            .expect("paging did not stop");

        assert!(matches!(result, Err(e) if e.kind == RemoteErrorKind::Decode));
    }

    #[test]
    fn build_collection_url() {
        let c = FirestoreClient::new("https://firestore.googleapis.com/v1/", "tech-books", TIMEOUT)
            .unwrap();
        assert_eq!(
            c.collection_url("books/affiliate_books/Juniors"),
            "https://firestore.googleapis.com/v1/projects/tech-books/databases/(default)/documents/books/affiliate_books/Juniors"
        );
    }

    #[test]
    fn empty_api_key_is_ignored() {
        let c = FirestoreClient::new(DEFAULT_BASE_URL, "p", TIMEOUT)
            .unwrap()
            .with_api_key("");
        assert!(c.api_key.is_none());
    }

    #[test]
    fn empty_collection_deserialize() {
        let parsed: ListDocumentsResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.documents.is_empty());
        assert!(parsed.next_page_token.is_none());
    }

    #[test]
    fn list_documents_deserialize_example() {
        let json = r#"{
    "documents": [
        {
            "name": "projects/tech-books/databases/(default)/documents/books/affiliate_books/Juniors/8Xf2",
            "fields": {
                "name": { "stringValue": "Life Skills for Teens: How to Cook" },
                "author": { "stringValue": "who knows" },
                "image": { "stringValue": "https://img.example/cover.jpg" },
                "link": { "stringValue": "https://amzn.to/3DYpg0K" },
                "category": { "stringValue": "Juniors" },
                "rank": { "integerValue": "3" }
            },
            "createTime": "2021-10-02T10:11:12.123456Z",
            "updateTime": "2021-10-02T10:11:12.123456Z"
        }
    ],
    "nextPageToken": "AFTOeJw"
}"#;
        let parsed: ListDocumentsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.documents.len(), 1);
        assert_eq!(parsed.next_page_token.as_deref(), Some("AFTOeJw"));
        let doc = &parsed.documents[0];
        assert_eq!(
            doc.fields["author"].string_value.as_deref(),
            Some("who knows")
        );
        assert!(doc.fields["rank"].string_value.is_none());
        assert!(!doc.fields.contains_key("description"));
        assert!(doc.extra.contains_key("createTime"));
    }

    #[test]
    fn status_errors_map_to_kinds() {
        let body = r#"{ "error": { "code": 403, "message": "Missing or insufficient permissions.", "status": "PERMISSION_DENIED" } }"#;
        let e = error_from_status(StatusCode::FORBIDDEN, body);
        assert_eq!(e.kind, RemoteErrorKind::Permission);
        assert_eq!(e.message, "Missing or insufficient permissions.");

        let e = error_from_status(StatusCode::NOT_FOUND, "");
        assert_eq!(e.kind, RemoteErrorKind::NotFound);
        assert_eq!(e.message, "404 Not Found");

        let e = error_from_status(StatusCode::SERVICE_UNAVAILABLE, "<html>");
        assert_eq!(e.kind, RemoteErrorKind::Transport);
    }
}
