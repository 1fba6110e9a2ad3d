use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client as ReqwestClient, Method, Response};
use serde_json::{Map, Value};
use storesync_common::{audit_body, sanitize_headers, BackoffPolicy, CircuitBreaker, Clock, SystemClock};
use storesync_core::{RequestAuditRepository, RequestContext};
use storesync_domain::constants::{DEFAULT_HTTP_MAX_RETRIES, DEFAULT_HTTP_TIMEOUT_SECS};
use storesync_domain::{
    new_record_id, Driver, ExternalRequestRecord, HttpConfig, RequestOutcome, Result,
    StoreSyncError,
};
use tracing::{debug, warn};
use url::Url;

use crate::errors::InfraError;

/// One logical call. The body is serialised once and replayed on retries.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl TransportRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), query: Vec::new(), headers: Vec::new(), body: None }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    #[must_use]
    pub fn query(mut self, name: &str, value: impl ToString) -> Self {
        self.query.push((name.to_string(), value.to_string()));
        self
    }

    #[must_use]
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Final answer to a call that was not rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    /// Decoded body; an empty body is `null`.
    pub fn json(&self) -> Result<Value> {
        if self.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&self.body).map_err(|err| {
            StoreSyncError::InvalidInput(format!("response body is not valid JSON: {err}"))
        })
    }
}

enum AttemptResult {
    Answered { status: u16, headers: Value, body: String },
    Failed(reqwest::Error),
}

/// HTTP client for one remote service with retry, audit logging and the
/// shared circuit gate.
///
/// Every attempt, including the rejected ones, is written to the request
/// audit log. A 5xx, a 429 or a transport error is retried until
/// `max_attempts` is reached; any other answer is final.
#[derive(Clone)]
pub struct RetryingTransport {
    client: ReqwestClient,
    driver: Driver,
    base_url: Url,
    default_headers: Vec<(String, String)>,
    backoff: BackoffPolicy,
    max_attempts: u32,
    breaker: Option<CircuitBreaker>,
    audit: Arc<dyn RequestAuditRepository>,
    clock: Arc<dyn Clock>,
}

impl RetryingTransport {
    pub fn builder(
        driver: Driver,
        base_url: &str,
        audit: Arc<dyn RequestAuditRepository>,
    ) -> RetryingTransportBuilder {
        RetryingTransportBuilder::new(driver, base_url, audit)
    }

    pub const fn driver(&self) -> Driver {
        self.driver
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Issue `request`, retrying transient failures.
    ///
    /// 2xx, 3xx and 409 come back as `Ok`; any other status ends as
    /// [`StoreSyncError::Remote`] carrying the response body.
    pub async fn send(
        &self,
        request: &TransportRequest,
        ctx: &RequestContext,
    ) -> Result<TransportResponse> {
        let url = self.resolve(&request.path)?;
        let service = self.driver.service_key();

        if let Some(breaker) = &self.breaker {
            let open = breaker.is_open(service).await.unwrap_or_else(|err| {
                warn!(service, error = %err, "circuit state unavailable, treating as closed");
                false
            });
            if open {
                let mut record = self.base_record(request, &url, ctx, 1);
                record.outcome = RequestOutcome::CircuitOpen;
                self.write_audit(record).await;
                return Err(StoreSyncError::CircuitOpen(service.to_string()));
            }
        }

        let headers = self.header_map(request)?;
        let body = match &request.body {
            Some(body) => Some(serde_json::to_string(body).map_err(|err| {
                StoreSyncError::InvalidInput(format!("request body could not be encoded: {err}"))
            })?),
            None => None,
        };
        let attempts = self.max_attempts.max(1);

        let mut attempt = 1;
        loop {
            let mut builder = self
                .client
                .request(request.method.clone(), url.clone())
                .headers(headers.clone())
                .query(&request.query);
            if let Some(body) = &body {
                builder = builder.body(body.clone());
            }

            debug!(attempt, method = %request.method, %url, "sending request");
            let started = Instant::now();
            let result = match builder.send().await {
                Ok(response) => read_response(response).await,
                Err(err) => AttemptResult::Failed(err),
            };
            let duration_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);

            let more_left = attempt < attempts;
            let mut record = self.base_record(request, &url, ctx, attempt);
            record.request_headers = Some(sanitize_header_map(&headers));
            record.request_body = body.as_deref().and_then(audit_body);
            record.duration_ms = Some(duration_ms);

            match result {
                AttemptResult::Answered { status, headers: response_headers, body: response_body } => {
                    let retryable = status >= 500 || status == 429;
                    let accepted = status < 400 || status == 409;
                    record.response_status = Some(status);
                    record.response_headers = Some(response_headers);
                    record.response_body = audit_body(&response_body);
                    record.outcome = if accepted {
                        RequestOutcome::Success
                    } else if retryable && more_left {
                        RequestOutcome::Retry
                    } else {
                        RequestOutcome::Fail
                    };
                    self.write_audit(record).await;

                    if retryable && more_left {
                        self.pause(attempt).await;
                        attempt += 1;
                        continue;
                    }

                    if accepted {
                        debug!(attempt, status, %url, "request accepted");
                        self.note_success().await;
                        return Ok(TransportResponse { status, body: response_body });
                    }

                    let err = StoreSyncError::remote(
                        status,
                        url.path().trim_start_matches('/'),
                        (!response_body.is_empty()).then_some(response_body),
                    );
                    if retryable {
                        self.note_failure().await;
                    } else {
                        self.note_success().await;
                    }
                    warn!(attempt, status, %url, "request failed");
                    return Err(err);
                }
                AttemptResult::Failed(err) => {
                    record.outcome = if err.is_timeout() || err.is_connect() {
                        RequestOutcome::Timeout
                    } else if more_left {
                        RequestOutcome::Retry
                    } else {
                        RequestOutcome::Fail
                    };
                    record.response_body = audit_body(&err.to_string());
                    self.write_audit(record).await;

                    if more_left && is_retryable_error(&err) {
                        debug!(attempt, %url, error = %err, "transport error, retrying");
                        self.pause(attempt).await;
                        attempt += 1;
                        continue;
                    }

                    warn!(attempt, %url, error = %err, "request could not be completed");
                    self.note_failure().await;
                    return Err(InfraError::from(err).into());
                }
            }
        }
    }

    fn resolve(&self, path: &str) -> Result<Url> {
        self.base_url.join(path.trim_start_matches('/')).map_err(|err| {
            StoreSyncError::InvalidInput(format!("invalid request path '{path}': {err}"))
        })
    }

    fn header_map(&self, request: &TransportRequest) -> Result<HeaderMap> {
        let mut map = HeaderMap::new();
        for (name, value) in self.default_headers.iter().chain(request.headers.iter()) {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|err| {
                StoreSyncError::InvalidInput(format!("invalid header name '{name}': {err}"))
            })?;
            let value = HeaderValue::from_str(value).map_err(|err| {
                StoreSyncError::InvalidInput(format!("invalid value for header '{name}': {err}"))
            })?;
            map.insert(name, value);
        }
        Ok(map)
    }

    fn base_record(
        &self,
        request: &TransportRequest,
        url: &Url,
        ctx: &RequestContext,
        attempt: u32,
    ) -> ExternalRequestRecord {
        let query = (!request.query.is_empty()).then(|| {
            Value::Object(
                request
                    .query
                    .iter()
                    .map(|(name, value)| (name.clone(), Value::String(value.clone())))
                    .collect::<Map<_, _>>(),
            )
        });
        ExternalRequestRecord {
            id: new_record_id(),
            run_id: ctx.run_id.clone(),
            driver: self.driver,
            method: request.method.as_str().to_string(),
            url: url.to_string(),
            query,
            request_headers: None,
            request_body: None,
            response_status: None,
            response_headers: None,
            response_body: None,
            duration_ms: None,
            attempt,
            outcome: RequestOutcome::Fail,
            idempotency_key: ctx.idempotency_key.clone(),
            created_at: self.clock.now(),
        }
    }

    async fn write_audit(&self, record: ExternalRequestRecord) {
        if let Err(err) = self.audit.record(&record).await {
            warn!(driver = %self.driver, attempt = record.attempt, error = %err, "failed to write request audit record");
        }
    }

    async fn pause(&self, attempt: u32) {
        let delay = self.backoff.delay(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    async fn note_success(&self) {
        if let Some(breaker) = &self.breaker {
            if let Err(err) = breaker.record_success(self.driver.service_key()).await {
                warn!(driver = %self.driver, error = %err, "failed to record circuit success");
            }
        }
    }

    async fn note_failure(&self) {
        if let Some(breaker) = &self.breaker {
            match breaker.record_failure(self.driver.service_key()).await {
                Ok(state) => debug!(driver = %self.driver, state = state.as_str(), "circuit failure recorded"),
                Err(err) => warn!(driver = %self.driver, error = %err, "failed to record circuit failure"),
            }
        }
    }
}

impl std::fmt::Debug for RetryingTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingTransport")
            .field("driver", &self.driver)
            .field("base_url", &self.base_url.as_str())
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

async fn read_response(response: Response) -> AttemptResult {
    let status = response.status().as_u16();
    let headers = sanitize_header_map(response.headers());
    match response.text().await {
        Ok(body) => AttemptResult::Answered { status, headers, body },
        Err(err) => AttemptResult::Failed(err),
    }
}

fn sanitize_header_map(headers: &HeaderMap) -> Value {
    sanitize_headers(
        headers
            .iter()
            .map(|(name, value)| (name.as_str(), value.to_str().unwrap_or("<binary>"))),
    )
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request() || err.is_body()
}

/// Builder for [`RetryingTransport`].
pub struct RetryingTransportBuilder {
    driver: Driver,
    base_url: String,
    audit: Arc<dyn RequestAuditRepository>,
    timeout: Duration,
    max_attempts: u32,
    backoff: BackoffPolicy,
    breaker: Option<CircuitBreaker>,
    clock: Arc<dyn Clock>,
    default_headers: Vec<(String, String)>,
}

impl RetryingTransportBuilder {
    fn new(driver: Driver, base_url: &str, audit: Arc<dyn RequestAuditRepository>) -> Self {
        Self {
            driver,
            base_url: base_url.to_string(),
            audit,
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            max_attempts: DEFAULT_HTTP_MAX_RETRIES.saturating_add(1),
            backoff: BackoffPolicy::default(),
            breaker: None,
            clock: Arc::new(SystemClock),
            default_headers: Vec::new(),
        }
    }

    /// Timeout, attempt budget and backoff from the `[http]` config section.
    pub fn http_config(self, config: &HttpConfig) -> Self {
        self.timeout(Duration::from_secs(config.timeout_secs))
            .retries(config.retries)
            .backoff(BackoffPolicy::new(config.retry_backoff_ms, config.retry_backoff_max_ms))
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Total attempts per call, the first one included.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Retries after the first attempt, so `retries(3)` sends at most four requests.
    pub fn retries(self, retries: u32) -> Self {
        self.max_attempts(retries.saturating_add(1))
    }

    pub fn backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn breaker(mut self, breaker: CircuitBreaker) -> Self {
        self.breaker = Some(breaker);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sent on every request. Later values replace earlier ones.
    pub fn default_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.default_headers.push((name.to_string(), value.into()));
        self
    }

    pub fn build(self) -> Result<RetryingTransport> {
        let mut base = self.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base).map_err(|err| {
            StoreSyncError::Config(format!("invalid base url '{}': {err}", self.base_url))
        })?;

        let client = ReqwestClient::builder()
            .timeout(self.timeout)
            .connect_timeout(self.timeout)
            .no_proxy()
            .build()
            .map_err(|err| StoreSyncError::from(InfraError::from(err)))?;

        Ok(RetryingTransport {
            client,
            driver: self.driver,
            base_url,
            default_headers: self.default_headers,
            backoff: self.backoff,
            max_attempts: self.max_attempts,
            breaker: self.breaker,
            audit: self.audit,
            clock: self.clock,
        })
    }
}
