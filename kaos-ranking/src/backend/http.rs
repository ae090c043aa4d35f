//! Ranking service client over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::{BackendPage, BackendResult, RankingBackend};
use crate::error::BackendError;

/// [`RankingBackend`] backed by the ranking service's REST API.
///
/// # Example
///
/// ```rust,no_run
/// use kaos_ranking::backend::HttpBackend;
///
/// let backend = HttpBackend::builder()
///     .host("ranking.example.com")
///     .port(443)
///     .use_ssl(true)
///     .api_key("secret")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct HttpBackend {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpBackend {
    /// Create a new client with default options.
    pub fn new(host: &str, port: u16) -> BackendResult<Self> {
        Self::builder().host(host).port(port).build()
    }

    pub fn builder() -> HttpBackendBuilder {
        HttpBackendBuilder::default()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `/api/leaderboards/{table_id}/records[/{player_id}]`, each id
    /// percent-encoded as a single path segment.
    fn records_url(&self, table_id: &str, player_id: Option<&str>) -> BackendResult<Url> {
        let mut url = parse_base(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| BackendError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(["api", "leaderboards", table_id, "records"])
            .extend(player_id);
        Ok(url)
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        url: Url,
        body: Option<impl Serialize>,
    ) -> BackendResult<Option<T>> {
        let mut req = self.http.request(method, url);

        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }
        if let Some(b) = body {
            req = req.json(&b);
        }

        let resp = req.send().await?;
        let status = resp.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();

            // Try to parse error message from JSON
            let message = serde_json::from_str::<serde_json::Value>(&text)
                .ok()
                .and_then(|json| json.get("error").and_then(|e| e.as_str()).map(str::to_string))
                .unwrap_or(text);

            if status == StatusCode::SERVICE_UNAVAILABLE || status == StatusCode::BAD_GATEWAY {
                return Err(BackendError::Unavailable(message));
            }
            return Err(BackendError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = resp.bytes().await?;
        // Submissions may answer with an empty body.
        let body: &[u8] = if bytes.is_empty() { b"null" } else { &bytes };
        serde_json::from_slice(body)
            .map(Some)
            .map_err(|e| BackendError::Decode(e.to_string()))
    }
}

#[derive(Serialize)]
struct SubmitRequest<'a> {
    player_id: &'a str,
    score: i64,
}

#[derive(Deserialize)]
struct RankResponse {
    rank: Option<u32>,
}

#[async_trait]
impl RankingBackend for HttpBackend {
    async fn submit(&self, table_id: &str, player_id: &str, score: i64) -> BackendResult<()> {
        let url = self.records_url(table_id, None)?;
        let resp: Option<serde_json::Value> = self
            .request(reqwest::Method::POST, url, Some(SubmitRequest { player_id, score }))
            .await?;

        match resp {
            Some(_) => Ok(()),
            None => Err(BackendError::UnknownTable(table_id.to_string())),
        }
    }

    async fn fetch_page(&self, table_id: &str, offset: u32, limit: u32) -> BackendResult<BackendPage> {
        let mut url = self.records_url(table_id, None)?;
        url.query_pairs_mut()
            .append_pair("offset", &offset.to_string())
            .append_pair("limit", &limit.to_string());
        let page: Option<BackendPage> = self
            .request(reqwest::Method::GET, url, None::<()>)
            .await?;

        page.ok_or_else(|| BackendError::UnknownTable(table_id.to_string()))
    }

    async fn fetch_player_rank(&self, table_id: &str, player_id: &str) -> BackendResult<Option<u32>> {
        let url = self.records_url(table_id, Some(player_id))?;
        let resp: Option<RankResponse> = self
            .request(reqwest::Method::GET, url, None::<()>)
            .await?;

        Ok(resp.and_then(|r| r.rank))
    }
}

/// Builder for [`HttpBackend`].
#[derive(Debug, Clone)]
pub struct HttpBackendBuilder {
    host: String,
    port: u16,
    use_ssl: bool,
    api_key: Option<String>,
    timeout: Duration,
}

impl Default for HttpBackendBuilder {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7350,
            use_ssl: false,
            api_key: None,
            timeout: Duration::from_secs(10),
        }
    }
}

impl HttpBackendBuilder {
    pub fn host(mut self, host: &str) -> Self {
        self.host = host.to_string();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn use_ssl(mut self, use_ssl: bool) -> Self {
        self.use_ssl = use_ssl;
        self
    }

    pub fn api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    /// Transport-level timeout; the core applies its own bound on top.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> BackendResult<HttpBackend> {
        let protocol = if self.use_ssl { "https" } else { "http" };
        let base_url = format!("{}://{}:{}", protocol, self.host, self.port);
        parse_base(&base_url)?;

        let http = Client::builder().timeout(self.timeout).build()?;

        Ok(HttpBackend {
            http,
            base_url,
            api_key: self.api_key,
        })
    }
}

fn parse_base(base_url: &str) -> BackendResult<Url> {
    Url::parse(base_url).map_err(|e| BackendError::InvalidUrl(format!("{base_url}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_urls() {
        let backend = HttpBackend::builder()
            .host("ranking.example.com")
            .port(8443)
            .use_ssl(true)
            .build()
            .unwrap();
        assert_eq!(backend.base_url(), "https://ranking.example.com:8443");

        let backend = HttpBackend::new("localhost", 7350).unwrap();
        assert_eq!(backend.base_url(), "http://localhost:7350");
    }

    #[test]
    fn test_records_url() {
        let backend = HttpBackend::new("localhost", 7350).unwrap();
        assert_eq!(
            backend.records_url("global_total_wins_weekly", None).unwrap().as_str(),
            "http://localhost:7350/api/leaderboards/global_total_wins_weekly/records"
        );
    }

    #[test]
    fn test_player_id_is_one_segment() {
        let backend = HttpBackend::new("localhost", 7350).unwrap();
        let url = backend.records_url("t", Some("a/b?c#d")).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:7350/api/leaderboards/t/records/a%2Fb%3Fc%23d"
        );
        assert_eq!(url.path_segments().unwrap().last(), Some("a%2Fb%3Fc%23d"));
        assert!(url.query().is_none());
        assert!(url.fragment().is_none());
    }

    #[test]
    fn test_invalid_host_rejected() {
        assert!(matches!(
            HttpBackend::new("bad host", 80),
            Err(BackendError::InvalidUrl(_))
        ));
    }
}
