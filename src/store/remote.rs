//! Remote key-value service over HTTP
//!
//! `GET {base}/kv/{key}` returns the raw value (404 when absent),
//! `PUT {base}/kv/{key}` replaces it. An optional bearer token is sent on
//! every request.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;

use super::KvBackend;
use crate::config::mask_url;
use crate::error::{Error, Result};

pub struct HttpKvBackend {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpKvBackend {
    pub fn new(base_url: impl Into<String>, token: Option<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/kv/{}", self.base_url, key)
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

#[async_trait]
impl KvBackend for HttpKvBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let resp = self
            .authorized(self.client.get(self.url_for(key)))
            .send()
            .await
            .map_err(|e| Error::Store(format!("GET {}: {}", key, e)))?;

        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body = resp
                    .text()
                    .await
                    .map_err(|e| Error::Store(format!("GET {} body: {}", key, e)))?;
                Ok(Some(body))
            }
            status => {
                let text = resp.text().await.unwrap_or_default();
                Err(Error::Store(format!("GET {} -> HTTP {}: {}", key, status, text)))
            }
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let resp = self
            .authorized(self.client.put(self.url_for(key)))
            .header("Content-Type", "application/json")
            .body(value.to_string())
            .send()
            .await
            .map_err(|e| Error::Store(format!("PUT {}: {}", key, e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::Store(format!("PUT {} -> HTTP {}: {}", key, status, text)));
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("remote:{}", mask_url(&self.base_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_get_present_and_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/kv/strategy:low"))
            .and(header("Authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"a\":1}"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/kv/strategy:high"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let backend =
            HttpKvBackend::new(server.uri(), Some("secret".into()), Duration::from_secs(5));
        assert_eq!(
            backend.get("strategy:low").await.unwrap().as_deref(),
            Some("{\"a\":1}")
        );
        assert_eq!(backend.get("strategy:high").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_sends_body() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/kv/strategy:low"))
            .and(body_string("{\"b\":2}"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let backend = HttpKvBackend::new(server.uri(), None, Duration::from_secs(5));
        backend.set("strategy:low", "{\"b\":2}").await.unwrap();
    }

    #[tokio::test]
    async fn test_server_error_is_store_error() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let backend = HttpKvBackend::new(server.uri(), None, Duration::from_secs(5));
        assert!(matches!(
            backend.set("strategy:low", "{}").await,
            Err(Error::Store(_))
        ));
    }
}
