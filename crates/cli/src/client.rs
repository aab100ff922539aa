//! HTTP client for the Books API.

use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Default request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Deserialize)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub year: i64,
    pub price: f64,
}

#[derive(Debug, Serialize)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub year: i64,
    pub price: f64,
}

/// Only the fields that are `Some` are sent.
#[derive(Debug, Default, Serialize)]
pub struct BookUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

impl BookUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.author.is_none() && self.year.is_none() && self.price.is_none()
    }
}

#[derive(Debug, Deserialize)]
pub struct Deleted {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Debug, Error)]
pub enum ClientError {
    /// The API could not be reached at all.
    #[error("{0}")]
    Connect(#[source] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("{detail}")]
    Api { status: StatusCode, detail: String },

    /// The API answered 2xx with a body we could not read.
    #[error("unexpected response from API: {0}")]
    Decode(#[source] reqwest::Error),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::Api { status, .. } if *status == StatusCode::NOT_FOUND)
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Credentials attached to every request when present.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub api_key: Option<String>,
    pub token: Option<String>,
}

pub struct BooksClient {
    client: reqwest::Client,
    base_url: String,
    credentials: Credentials,
}

impl BooksClient {
    pub fn new(base_url: &str, credentials: Credentials) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn create(&self, book: &NewBook) -> ClientResult<Book> {
        self.send(self.request(Method::POST, "/books/").json(book))
            .await
    }

    pub async fn list(&self, q: Option<&str>, limit: u32, offset: u32) -> ClientResult<Vec<Book>> {
        let mut query = vec![("limit", limit.to_string()), ("offset", offset.to_string())];
        if let Some(q) = q.filter(|q| !q.is_empty()) {
            query.push(("q", q.to_string()));
        }

        self.send(self.request(Method::GET, "/books/").query(&query))
            .await
    }

    pub async fn get(&self, id: i64) -> ClientResult<Book> {
        self.send(self.request(Method::GET, &format!("/books/{id}")))
            .await
    }

    pub async fn update(&self, id: i64, update: &BookUpdate) -> ClientResult<Book> {
        self.send(self.request(Method::PUT, &format!("/books/{id}")).json(update))
            .await
    }

    pub async fn delete(&self, id: i64) -> ClientResult<Deleted> {
        self.send(self.request(Method::DELETE, &format!("/books/{id}")))
            .await
    }

    pub async fn login(&self, username: &str, password: &str) -> ClientResult<Token> {
        self.send(
            self.request(Method::POST, "/auth/token")
                .query(&[("username", username), ("password", password)]),
        )
        .await
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(key) = &self.credentials.api_key {
            builder = builder.header("X-API-Key", key);
        }
        if let Some(token) = &self.credentials.token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> ClientResult<T> {
        let response = builder.send().await.map_err(ClientError::Connect)?;
        tracing::debug!(status = %response.status(), url = %response.url(), "api response");

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        response.json().await.map_err(ClientError::Decode)
    }
}

async fn api_error(response: Response) -> ClientError {
    let status = response.status();
    let detail = match response.json::<Value>().await {
        Ok(body) => describe_detail(&body["detail"]),
        Err(_) => None,
    }
    .unwrap_or_else(|| "Unknown error".to_string());

    ClientError::Api { status, detail }
}

/// Flatten the server's `detail` (a string or a list of field violations).
fn describe_detail(detail: &Value) -> Option<String> {
    match detail {
        Value::String(message) => Some(message.clone()),
        Value::Array(items) if !items.is_empty() => Some(
            items
                .iter()
                .map(|item| match (item["field"].as_str(), item["error"].as_str()) {
                    (Some(field), Some(error)) => format!("{field}: {error}"),
                    _ => item.to_string(),
                })
                .collect::<Vec<_>>()
                .join("; "),
        ),
        _ => None,
    }
}
