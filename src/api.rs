use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::normalize::fields::pluck;

const BODY_PREVIEW_CHARS: usize = 300;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{url} returned HTTP {status}: {body}")]
    Status { url: String, status: u16, body: String },
    #[error("{url} answered with `{content_type}` instead of JSON: {body}")]
    NotJson {
        url: String,
        content_type: String,
        body: String,
    },
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("invalid JSON from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("unexpected response shape from {url}: {reason}")]
    Malformed { url: String, reason: String },
    #[error("invalid endpoint `{url}`: {reason}")]
    InvalidEndpoint { url: String, reason: String },
}

/// One window of search results.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub hits: Vec<Value>,
    pub total: Option<u64>,
}

impl SearchPage {
    /// `hits.total` is a bare number on older clusters and `{"value": n}` on newer ones.
    pub fn from_envelope(body: Value, url: &str) -> Result<Self, ApiError> {
        let total = pluck(&body, &["hits", "total"]).and_then(|t| {
            t.as_u64()
                .or_else(|| pluck(t, &["value"]).and_then(Value::as_u64))
        });

        let hits = match body {
            Value::Object(mut map) => map
                .remove("hits")
                .and_then(|mut h| h.get_mut("hits").map(Value::take)),
            _ => None,
        };
        match hits {
            Some(Value::Array(hits)) => Ok(SearchPage { hits, total }),
            _ => Err(ApiError::Malformed {
                url: url.to_string(),
                reason: "missing `hits.hits` array".to_string(),
            }),
        }
    }
}

/// Where course records come from. The harvester only needs these two reads.
pub trait CourseSource {
    fn fetch_page(&self, from: usize, size: usize) -> Result<SearchPage, ApiError>;
    fn fetch_detail(&self, id: &str) -> Result<Value, ApiError>;
}

impl<T: CourseSource + ?Sized> CourseSource for &T {
    fn fetch_page(&self, from: usize, size: usize) -> Result<SearchPage, ApiError> {
        (**self).fetch_page(from, size)
    }

    fn fetch_detail(&self, id: &str) -> Result<Value, ApiError> {
        (**self).fetch_detail(id)
    }
}

/// Blocking client for the course search API.
pub struct HttpCourseSource {
    client: Client,
    endpoint: Url,
}

impl HttpCourseSource {
    pub fn new(endpoint: &str, timeout: Duration, user_agent: &str) -> Result<Self, ApiError> {
        let parsed = Url::parse(endpoint).map_err(|e| ApiError::InvalidEndpoint {
            url: endpoint.to_string(),
            reason: e.to_string(),
        })?;
        if parsed.cannot_be_a_base() {
            return Err(ApiError::InvalidEndpoint {
                url: endpoint.to_string(),
                reason: "not a hierarchical URL".to_string(),
            });
        }
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|source| ApiError::Transport {
                url: endpoint.to_string(),
                source,
            })?;
        Ok(HttpCourseSource {
            client,
            endpoint: parsed,
        })
    }

    fn get_json(&self, url: &str, request: RequestBuilder) -> Result<Value, ApiError> {
        let transport = |source| ApiError::Transport {
            url: url.to_string(),
            source,
        };

        let response = request.send().map_err(transport)?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response.text().map_err(transport)?;

        if !status.is_success() {
            return Err(ApiError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body: preview(&body),
            });
        }
        if !content_type.starts_with("application/json") {
            return Err(ApiError::NotJson {
                url: url.to_string(),
                content_type,
                body: preview(&body),
            });
        }

        serde_json::from_str(&body).map_err(|source| ApiError::Decode {
            url: url.to_string(),
            source,
        })
    }
}

impl CourseSource for HttpCourseSource {
    fn fetch_page(&self, from: usize, size: usize) -> Result<SearchPage, ApiError> {
        debug!(from, size, endpoint = %self.endpoint, "requesting page");
        let request = self
            .client
            .get(self.endpoint.clone())
            .query(&[("size", size), ("from", from)]);
        let body = self.get_json(self.endpoint.as_str(), request)?;
        SearchPage::from_envelope(body, self.endpoint.as_str())
    }

    fn fetch_detail(&self, id: &str) -> Result<Value, ApiError> {
        let url = detail_url(&self.endpoint, id);
        let request = self.client.get(url.clone());
        self.get_json(url.as_str(), request)
    }
}

/// Detail documents live next to the search endpoint: `<index>/_search` → `<index>/<id>`.
/// The id is pushed as a single percent-encoded path segment.
pub fn detail_url(endpoint: &Url, id: &str) -> Url {
    let mut url = endpoint.clone();
    url.set_query(None);
    url.set_fragment(None);
    let is_search = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        == Some("_search");
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty();
        if is_search {
            segments.pop();
        }
        segments.push(id);
    }
    url
}

fn preview(body: &str) -> String {
    let mut out: String = body.chars().take(BODY_PREVIEW_CHARS).collect();
    if body.chars().count() > BODY_PREVIEW_CHARS {
        out.push_str("...");
    }
    out
}
