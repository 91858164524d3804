//! HTTP client for Elasticsearch compatible stores.

use std::time::Duration;

use async_trait::async_trait;
use ferry_schema::{IndexBody, Settings};
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url, header::CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde_json::Value;
use snafu::ResultExt;
use tracing::debug;

use crate::{
    ClientSnafu, DecodeSnafu, EncodeSnafu, IndexAlreadyExistsSnafu, IndexNotFoundSnafu, InvalidEndpointSnafu, RequestSnafu,
    Result, StoreError,
    bulk::{BulkRequest, BulkResponse},
    store::{CreateIndexResponse, SearchStore, StoreVersion},
};

const NDJSON: &str = "application/x-ndjson";

/// Connection options for [`HttpSearchStore`].
#[derive(Debug, Clone, Default)]
pub struct HttpStoreOptions {
    /// Base address, with or without scheme. `http://` is assumed when missing.
    pub endpoint: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout: Option<Duration>,
}

/// A [`SearchStore`] backed by the store's REST API.
#[derive(Debug, Clone)]
pub struct HttpSearchStore {
    client: reqwest::Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
}

#[derive(serde::Deserialize)]
struct RootResponse {
    version: StoreVersion,
}

impl HttpSearchStore {
    pub fn new(options: HttpStoreOptions) -> Result<Self> {
        let base_url = normalize_endpoint(&options.endpoint)?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context(ClientSnafu {})?;

        Ok(Self {
            client,
            base_url,
            username: options.username.filter(|u| !u.is_empty()),
            password: options.password,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let builder = self.client.request(method, url);
        match &self.username {
            Some(username) => builder.basic_auth(username, self.password.as_deref()),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder, operation: &'static str) -> Result<Response> {
        let response = builder.send().await.context(RequestSnafu { operation })?;
        debug!(operation, status = %response.status(), "store responded");
        Ok(response)
    }

    async fn json<T: DeserializeOwned>(response: Response, operation: &'static str) -> Result<T> {
        let response = Self::check(response, operation).await?;
        let body = response.bytes().await.context(RequestSnafu { operation })?;
        serde_json::from_slice(&body).context(DecodeSnafu { operation })
    }

    async fn check(response: Response, operation: &'static str) -> Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        Err(StoreError::Response {
            operation,
            status,
            message: error_message(&body),
        })
    }
}

#[async_trait]
impl SearchStore for HttpSearchStore {
    async fn version(&self) -> Result<StoreVersion> {
        let response = self.send(self.request(Method::GET, "/"), "version").await?;
        let root: RootResponse = Self::json(response, "version").await?;
        Ok(root.version)
    }

    async fn index_exists(&self, index: &str) -> Result<bool> {
        let response = self
            .send(self.request(Method::HEAD, index), "index_exists")
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            _ => Self::check(response, "index_exists").await.map(|_| true),
        }
    }

    async fn get_mapping(&self, index: &str) -> Result<Value> {
        let response = self
            .send(
                self.request(Method::GET, &format!("{index}/_mapping")),
                "get_mapping",
            )
            .await?;
        let mut body: Value = Self::json(response, "get_mapping").await?;

        let mappings = body
            .get_mut(index)
            .and_then(|entry| entry.get_mut("mappings"))
            .map(Value::take);

        Ok(mappings.unwrap_or(body))
    }

    async fn get_settings(&self, index: &str) -> Result<Settings> {
        let response = self
            .send(
                self.request(Method::GET, &format!("{index}/_settings")),
                "get_settings",
            )
            .await?;
        let mut body: Value = Self::json(response, "get_settings").await?;

        let settings = body
            .get_mut(index)
            .and_then(|entry| entry.get_mut("settings"))
            .map(Value::take);

        match settings {
            Some(Value::Object(settings)) => Ok(settings),
            _ => Ok(Settings::new()),
        }
    }

    async fn delete_index(&self, index: &str) -> Result<()> {
        let response = self
            .send(self.request(Method::DELETE, index), "delete_index")
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return IndexNotFoundSnafu { index }.fail();
        }

        Self::check(response, "delete_index").await?;
        Ok(())
    }

    async fn create_index(&self, index: &str, body: &IndexBody) -> Result<CreateIndexResponse> {
        let response = self
            .send(self.request(Method::PUT, index).json(body), "create_index")
            .await?;

        if response.status() == StatusCode::BAD_REQUEST {
            let body = response.text().await.unwrap_or_default();
            if body.contains("resource_already_exists_exception") {
                return IndexAlreadyExistsSnafu { index }.fail();
            }
            return Err(StoreError::Response {
                operation: "create_index",
                status: StatusCode::BAD_REQUEST,
                message: error_message(&body),
            });
        }

        Self::json(response, "create_index").await
    }

    async fn bulk(&self, request: &BulkRequest) -> Result<BulkResponse> {
        let body = request.to_ndjson().context(EncodeSnafu {})?;

        let builder = self
            .request(Method::POST, "_bulk")
            .query(&request.params)
            .header(CONTENT_TYPE, NDJSON)
            .body(body);

        let response = self.send(builder, "bulk").await?;
        Self::json(response, "bulk").await
    }
}

fn normalize_endpoint(endpoint: &str) -> Result<String> {
    let endpoint = endpoint.trim().trim_end_matches('/');
    let with_scheme = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("http://{endpoint}")
    };

    let url = Url::parse(&with_scheme).map_err(|err| StoreError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        message: err.to_string(),
    })?;

    if url.host_str().is_none_or(str::is_empty) {
        return InvalidEndpointSnafu {
            endpoint,
            message: "missing host",
        }
        .fail();
    }

    Ok(with_scheme)
}

/// Extracts `error.reason` from an error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    let reason = serde_json::from_str::<Value>(body).ok().and_then(|value| {
        let error = value.get("error")?;
        error
            .get("reason")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| error.as_str().map(str::to_string))
    });

    reason.unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(
            normalize_endpoint("localhost:9200").unwrap(),
            "http://localhost:9200"
        );
        assert_eq!(
            normalize_endpoint("https://es.internal:9243/").unwrap(),
            "https://es.internal:9243"
        );
        assert!(normalize_endpoint("").is_err());
    }

    #[test]
    fn test_error_message() {
        let body = r#"{"error":{"type":"resource_already_exists_exception","reason":"index [people] already exists"},"status":400}"#;
        assert_eq!(error_message(body), "index [people] already exists");
        assert_eq!(error_message("Bad Gateway"), "Bad Gateway");
    }
}
