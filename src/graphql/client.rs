use std::time::Duration;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::StatusCode;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::graphql::auth::Authenticator;
use crate::graphql::pagination::PaginatedQuery;
use crate::graphql::query::{substitute_placeholders, Query, Substitutions};
use crate::queries::cost::{QueryCost, RateLimitQuery};
use crate::util;

const RETRY_ATTEMPTS: u32 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Points deliberately left unspent when gating against the remote quota.
const RATE_LIMIT_MARGIN: i64 = 5;
/// Extra wait beyond the advertised quota reset time.
const RESET_GRACE: Duration = Duration::from_secs(5);

static QUERY_BODY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"query\s*\{(?P<body>.+)\}").expect("query body pattern is valid"));

/// Remote quota reading taken once per executed query, before the query
/// itself is sent.
#[derive(Debug, Clone)]
pub struct RateLimitSnapshot {
    pub cost: i64,
    pub remaining: i64,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitSnapshot {
    pub fn from_response(data: &Value) -> Result<Self> {
        let limit = data
            .get("rateLimit")
            .ok_or_else(|| Error::Parse("response has no rateLimit field".to_string()))?;
        let cost = limit
            .get("cost")
            .and_then(Value::as_i64)
            .ok_or_else(|| Error::Parse("rateLimit.cost is missing".to_string()))?;
        let remaining = limit
            .get("remaining")
            .and_then(Value::as_i64)
            .ok_or_else(|| Error::Parse("rateLimit.remaining is missing".to_string()))?;
        let reset_at = limit
            .get("resetAt")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Parse("rateLimit.resetAt is missing".to_string()))?;
        Ok(Self {
            cost,
            remaining,
            reset_at: util::parse_timestamp(reset_at)?,
        })
    }

    /// The upcoming query may not fit in the remaining quota.
    pub fn must_wait(&self) -> bool {
        self.cost > self.remaining - RATE_LIMIT_MARGIN
    }

    fn until_reset(&self) -> Duration {
        (self.reset_at - Utc::now()).to_std().unwrap_or(Duration::ZERO)
    }
}

pub struct ClientBuilder {
    protocol: String,
    host: String,
    is_enterprise: bool,
    timeout: Duration,
    authenticator: Option<Box<dyn Authenticator>>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            protocol: "https".to_string(),
            host: "api.github.com".to_string(),
            is_enterprise: false,
            timeout: REQUEST_TIMEOUT,
            authenticator: None,
        }
    }
}

impl ClientBuilder {
    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Enterprise instances serve GraphQL under `/api/graphql`.
    pub fn enterprise(mut self, is_enterprise: bool) -> Self {
        self.is_enterprise = is_enterprise;
        self
    }

    /// Per-attempt request budget. Retries use the same budget each attempt.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn authenticator(mut self, authenticator: impl Authenticator + 'static) -> Self {
        self.authenticator = Some(Box::new(authenticator));
        self
    }

    pub fn build(self) -> Result<Client> {
        let authenticator = self
            .authenticator
            .ok_or_else(|| Error::Config("an authenticator must be provided".to_string()))?;
        let base = if self.is_enterprise {
            "/api/graphql"
        } else {
            "/graphql"
        };
        let endpoint = format!("{}://{}{}", self.protocol, self.host, base);
        let http = reqwest::Client::builder()
            .user_agent("gitminer/0.1")
            .build()?;
        Ok(Client {
            http,
            endpoint,
            timeout: self.timeout,
            authenticator,
        })
    }
}

/// Rate-limit-aware GraphQL client. Every executed query pays one extra
/// round trip: a dry-run cost estimate that gates on the remaining quota
/// before the real call goes out. Execution is strictly sequential.
pub struct Client {
    http: reqwest::Client,
    endpoint: String,
    timeout: Duration,
    authenticator: Box<dyn Authenticator>,
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Executes a single-shot query and returns the `data` payload.
    pub async fn execute(&self, query: &Query, subs: &Substitutions) -> Result<Value> {
        let text = query.substitute(subs)?;
        self.gate_on_rate_limit(&text).await?;
        self.post_query(&text).await
    }

    /// Reads the current quota snapshot. Sent as a dry run so the probe
    /// itself spends nothing, and without the usual cost pre-check, which
    /// would nest a second `rateLimit` selection into the same query.
    pub async fn rate_limit(&self) -> Result<RateLimitSnapshot> {
        let text = RateLimitQuery::query()
            .substitute(&Substitutions::new().bind("dryrun", true))?;
        let data = self.post_query(&text).await?;
        RateLimitSnapshot::from_response(&data)
    }

    /// Starts a lazy page-by-page execution of a paginated query. Pages are
    /// fetched on demand; the stream ends when the remote reports no
    /// further page.
    pub fn execute_paginated<'c, 'q>(
        &'c self,
        query: &'q mut PaginatedQuery,
        subs: Substitutions,
    ) -> PageStream<'c, 'q> {
        PageStream {
            client: self,
            query,
            subs,
        }
    }

    /// Cost pre-check: wraps the query body in a dry-run `rateLimit`
    /// selection, reads the quota snapshot, and blocks until reset when the
    /// estimated cost would not fit.
    async fn gate_on_rate_limit(&self, text: &str) -> Result<()> {
        let body = QUERY_BODY
            .captures(text)
            .and_then(|captures| captures.name("body"))
            .ok_or_else(|| Error::InvalidQuery("query has no selectable body".to_string()))?;
        let cost_text = QueryCost::query(body.as_str())
            .substitute(&Substitutions::new().bind("dryrun", true))?;
        let data = self.post_query(&cost_text).await?;
        let snapshot = RateLimitSnapshot::from_response(&data)?;

        if snapshot.must_wait() {
            let wait = snapshot.until_reset() + RESET_GRACE;
            tracing::info!(
                cost = snapshot.cost,
                remaining = snapshot.remaining,
                reset_at = %snapshot.reset_at,
                "quota too low for query, waiting {:?} for reset",
                wait
            );
            tokio::time::sleep(wait).await;
        }
        Ok(())
    }

    async fn post_query(&self, text: &str) -> Result<Value> {
        let response = self.retry_request(text).await?;
        let status = response.status();
        let body = response.text().await?;

        if status != StatusCode::OK {
            return Err(Error::QueryFailed {
                status: status.as_u16(),
                body,
                query: Some(text.to_string()),
            });
        }

        let mut json: Value = match serde_json::from_str(&body) {
            Ok(json) => json,
            Err(_) => {
                return Err(Error::QueryFailed {
                    status: status.as_u16(),
                    body,
                    query: Some(text.to_string()),
                })
            }
        };

        if json.get("errors").is_some() {
            return Err(Error::QueryFailed {
                status: status.as_u16(),
                body,
                query: Some(text.to_string()),
            });
        }

        Ok(json.get_mut("data").map(Value::take).unwrap_or(Value::Null))
    }

    /// Retries absorb transient network timeouts only; every other failure,
    /// including the first non-200 response, is raised immediately.
    async fn retry_request(&self, text: &str) -> Result<reqwest::Response> {
        for attempt in 1..=RETRY_ATTEMPTS {
            let result = self
                .http
                .post(&self.endpoint)
                .headers(self.authenticator.headers()?)
                .timeout(self.timeout)
                .json(&serde_json::json!({ "query": text }))
                .send()
                .await;
            match result {
                Ok(response) => return Ok(response),
                Err(e) if e.is_timeout() => {
                    tracing::warn!(attempt, "request timed out, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(Error::RetriesExhausted {
            attempts: RETRY_ATTEMPTS,
        })
    }
}

/// Pull-based page sequence over one paginated query. Each `next_page`
/// executes the query with the current cursor, walks the response along the
/// discovered path, feeds `pageInfo` back into the paginator, and only then
/// yields the full page.
pub struct PageStream<'c, 'q> {
    client: &'c Client,
    query: &'q mut PaginatedQuery,
    subs: Substitutions,
}

impl PageStream<'_, '_> {
    pub async fn next_page(&mut self) -> Result<Option<Value>> {
        if !self.query.has_next() {
            return Ok(None);
        }

        let text = self.query.substitute(&self.subs)?;
        self.client.gate_on_rate_limit(&text).await?;
        let data = self.client.post_query(&text).await?;

        let mut node = &data;
        for segment in self.query.path() {
            // Path segments may themselves be templated.
            let key = substitute_placeholders(segment, &self.subs)?;
            node = node.get(&key).ok_or_else(|| {
                Error::Parse(format!("response is missing field `{key}` on the pagination path"))
            })?;
        }
        let info = node
            .get("pageInfo")
            .ok_or_else(|| Error::Parse("response is missing pageInfo".to_string()))?;
        let has_next_page = info
            .get("hasNextPage")
            .and_then(Value::as_bool)
            .ok_or_else(|| Error::Parse("pageInfo.hasNextPage is missing".to_string()))?;
        let end_cursor = info.get("endCursor").and_then(Value::as_str);

        self.query.update(has_next_page, end_cursor);
        Ok(Some(data))
    }

    pub async fn collect_pages(mut self) -> Result<Vec<Value>> {
        let mut pages = Vec::new();
        while let Some(page) = self.next_page().await? {
            pages.push(page);
        }
        Ok(pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphql::auth::PersonalAccessTokenAuthenticator;
    use crate::graphql::query::QueryNode;
    use mockito::Matcher;
    use serde_json::json;

    fn test_client(server: &mockito::ServerGuard) -> Client {
        Client::builder()
            .protocol("http")
            .host(server.host_with_port())
            .authenticator(PersonalAccessTokenAuthenticator::new("test-token"))
            .build()
            .unwrap()
    }

    fn viewer_query() -> Query {
        Query::new().child(QueryNode::new("viewer").field("login"))
    }

    fn cost_response() -> String {
        json!({
            "data": {
                "rateLimit": {"cost": 1, "remaining": 5000, "resetAt": "2099-01-01T00:00:00Z"}
            }
        })
        .to_string()
    }

    #[test]
    fn missing_authenticator_is_a_config_error() {
        let result = Client::builder().build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn gating_decision() {
        let reset_at = Utc::now();
        let low = RateLimitSnapshot { cost: 10, remaining: 14, reset_at };
        assert!(low.must_wait());
        let plenty = RateLimitSnapshot { cost: 1, remaining: 5000, reset_at };
        assert!(!plenty.must_wait());
    }

    #[tokio::test]
    async fn non_timeout_failure_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/graphql")
            .with_status(500)
            .with_body("boom")
            .expect(1)
            .create_async()
            .await;

        let client = test_client(&server);
        let err = client.post_query("query { viewer { login } }").await.unwrap_err();
        assert!(matches!(err, Error::QueryFailed { status: 500, .. }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn graphql_errors_fail_despite_200() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_body(json!({"errors": [{"message": "not found"}]}).to_string())
            .create_async()
            .await;

        let client = test_client(&server);
        let err = client.post_query("query { viewer { login } }").await.unwrap_err();
        assert!(matches!(err, Error::QueryFailed { status: 200, .. }));
    }

    #[tokio::test]
    async fn unparsable_body_fails_as_query_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_body("<html>not json</html>")
            .create_async()
            .await;

        let client = test_client(&server);
        let err = client.post_query("query { viewer { login } }").await.unwrap_err();
        assert!(matches!(err, Error::QueryFailed { status: 200, .. }));
    }

    #[tokio::test]
    async fn silent_server_exhausts_retries() {
        // A listener that accepts but never answers makes every attempt
        // time out.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _hold = tokio::spawn(async move {
            // Accepted sockets are kept open; dropping them would close the
            // connection and fail the request without a timeout.
            let mut open = Vec::new();
            loop {
                if let Ok((socket, _)) = listener.accept().await {
                    open.push(socket);
                }
            }
        });

        let client = Client::builder()
            .protocol("http")
            .host(addr.to_string())
            .timeout(Duration::from_millis(100))
            .authenticator(PersonalAccessTokenAuthenticator::new("test-token"))
            .build()
            .unwrap();

        let err = client.post_query("query { viewer { login } }").await.unwrap_err();
        assert!(matches!(err, Error::RetriesExhausted { attempts: 3 }));
    }

    #[tokio::test]
    async fn timed_out_attempts_recover_on_a_later_response() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        // The first two connections stall past the client timeout; the
        // third answers normally, and that answer must come back as the
        // result.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _serve = tokio::spawn(async move {
            for attempt in 0.. {
                let (mut socket, _) = listener.accept().await.unwrap();
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    let _ = socket.read(&mut buf).await;
                    if attempt < 2 {
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        return;
                    }
                    let body = json!({"data": {"viewer": {"login": "octocat"}}}).to_string();
                    let response = format!(
                        "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                });
            }
        });

        let client = Client::builder()
            .protocol("http")
            .host(addr.to_string())
            .timeout(Duration::from_millis(100))
            .authenticator(PersonalAccessTokenAuthenticator::new("test-token"))
            .build()
            .unwrap();

        let data = client.post_query("query { viewer { login } }").await.unwrap();
        assert_eq!(data["viewer"]["login"], "octocat");
    }

    #[tokio::test]
    async fn execute_runs_cost_precheck_then_query() {
        let mut server = mockito::Server::new_async().await;
        // Mockito serves the first-created mock that is still short of its
        // expected hits, and cost pre-checks wrap the query body, so the
        // dry-run cost mock must come before the overlapping data mock.
        let cost_mock = server
            .mock("POST", "/graphql")
            .match_body(Matcher::Regex(r"rateLimit\(dryRun: true\)".to_string()))
            .with_status(200)
            .with_body(cost_response())
            .expect(1)
            .create_async()
            .await;
        let data_mock = server
            .mock("POST", "/graphql")
            .match_body(Matcher::Regex("viewer".to_string()))
            .with_status(200)
            .with_body(json!({"data": {"viewer": {"login": "octocat"}}}).to_string())
            .expect(1)
            .create_async()
            .await;

        let client = test_client(&server);
        let data = client.execute(&viewer_query(), &Substitutions::new()).await.unwrap();
        assert_eq!(data["viewer"]["login"], "octocat");
        cost_mock.assert_async().await;
        data_mock.assert_async().await;
    }

    #[tokio::test]
    async fn page_stream_walks_cursors_until_exhausted() {
        let mut server = mockito::Server::new_async().await;
        let page = |nodes: Value, cursor: Value, has_next: bool| {
            json!({
                "data": {
                    "user": {
                        "login": "octocat",
                        "gists": {
                            "totalCount": 3,
                            "nodes": nodes,
                            "pageInfo": {"endCursor": cursor, "hasNextPage": has_next}
                        }
                    }
                }
            })
            .to_string()
        };

        // Cost pre-checks wrap the paginated body, so they would match the
        // page mocks too; the cost mock comes first to take precedence.
        server
            .mock("POST", "/graphql")
            .match_body(Matcher::Regex(r"rateLimit\(dryRun: true\)".to_string()))
            .with_status(200)
            .with_body(cost_response())
            .expect(2)
            .create_async()
            .await;
        server
            .mock("POST", "/graphql")
            .match_body(Matcher::Regex(r"gists\(".to_string()))
            .with_status(200)
            .with_body(page(
                json!([{"createdAt": "2021-01-01T00:00:00Z"}, {"createdAt": "2020-06-01T00:00:00Z"}]),
                json!("CUR1"),
                true,
            ))
            .create_async()
            .await;
        server
            .mock("POST", "/graphql")
            .match_body(Matcher::Regex("CUR1".to_string()))
            .with_status(200)
            .with_body(page(json!([{"createdAt": "2019-01-01T00:00:00Z"}]), json!(null), false))
            .create_async()
            .await;

        let client = test_client(&server);
        let mut query = crate::queries::contributions::UserGists::query().unwrap();
        let subs = Substitutions::new().bind("user", "octocat").bind("pg_size", 100);
        let pages = client.execute_paginated(&mut query, subs).collect_pages().await.unwrap();

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0]["user"]["gists"]["pageInfo"]["endCursor"], "CUR1");
        assert!(!query.has_next());
    }
}
