use crate::error::{check_response, Error, RateLimitError};
use crate::links::{Links, Meta};
use crate::rate::Rate;
use crate::tags::Tags;
use crate::timestamp::Timestamp;
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use url::Url;

const DEFAULT_BASE_URL: &str = "https://api.digitalocean.com/";
const MEDIA_TYPE: &str = "application/json";

fn default_user_agent() -> String {
    format!("docean/{}", env!("CARGO_PKG_VERSION"))
}

/// Metadata for one completed (or locally refused) exchange.
///
/// Every response-derived outcome carries one of these, success and
/// error alike, so callers can always inspect rate and pagination state.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Rate state derived from this response's headers; absent headers
    /// leave fields at zero.
    pub rate: Rate,
    /// Pagination links, populated by list service ops from the body.
    pub links: Option<Links>,
    /// Collection totals, populated by list service ops from the body.
    pub meta: Option<Meta>,
}

impl Response {
    pub(crate) fn new(status: StatusCode, headers: HeaderMap) -> Response {
        let rate = Rate::from_headers(&headers);
        Response {
            status,
            headers,
            rate,
            links: None,
            meta: None,
        }
    }
}

/// Paging controls shared by every list endpoint. Zero means "let the
/// server pick" and is omitted from the query string entirely.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ListOptions {
    #[serde(skip_serializing_if = "is_zero")]
    pub page: u64,
    #[serde(skip_serializing_if = "is_zero")]
    pub per_page: u64,
}

#[allow(clippy::trivially_copy_pass_by_ref)] // serde passes references
fn is_zero(n: &u64) -> bool {
    *n == 0
}

/// Append serialized options to a request path.
pub(crate) fn add_options<T: Serialize>(path: &str, opts: &T) -> Result<String, Error> {
    let query = serde_urlencoded::to_string(opts).map_err(Error::Options)?;
    if query.is_empty() {
        return Ok(path.to_string());
    }
    let sep = if path.contains('?') { '&' } else { '?' };
    Ok(format!("{}{}{}", path, sep, query))
}

/// API client: request construction, execution, rate tracking.
///
/// Safe for concurrent use; share one instance (behind an `Arc` if
/// needed) so all calls see the same rate-limit state. The client never
/// retries — when the cached quota is exhausted it refuses to send
/// until the window resets, surfacing [`Error::RateLimit`] without a
/// round trip.
#[derive(Debug)]
pub struct Client {
    http: reqwest::Client,
    base_url: Url,
    user_agent: String,
    headers: HeaderMap,
    // Sole shared mutable state; held only for copy-in/copy-out, never
    // across an await point.
    rate: Mutex<Rate>,
}

impl Client {
    /// Client against the public API with a default transport.
    pub fn new() -> Client {
        ClientBuilder::new()
            .build()
            .expect("default configuration is valid")
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Handle for the tags endpoints.
    pub fn tags(&self) -> Tags<'_> {
        Tags::new(self)
    }

    /// Base URL requests are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Snapshot of the most recently observed rate limit.
    pub fn rate(&self) -> Rate {
        *self.rate_cell()
    }

    // A poisoned lock only means some thread panicked mid-copy; the
    // triple is still consistent, so keep serving it.
    fn rate_cell(&self) -> MutexGuard<'_, Rate> {
        self.rate.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Build a request against the configured base URL.
    ///
    /// `path` is joined onto the base URL (use relative paths like
    /// `"v2/tags"`). Bodies are serialized for POST/PUT/PATCH only;
    /// retrieval-style methods never serialize, even if a body value is
    /// supplied. `Accept`, `User-Agent` and any static headers are set
    /// on every request; `Content-Type` only when a body was written.
    pub fn new_request<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<reqwest::Request, Error>
    where
        B: Serialize + ?Sized,
    {
        let url = self.base_url.join(path)?;
        let takes_body = matches!(method.as_str(), "POST" | "PUT" | "PATCH");
        let mut builder = self
            .http
            .request(method, url)
            .headers(self.headers.clone())
            .header(ACCEPT, MEDIA_TYPE)
            .header(USER_AGENT, self.user_agent.as_str());
        if takes_body {
            if let Some(body) = body {
                let buf = serde_json::to_vec(body).map_err(Error::Encode)?;
                builder = builder.header(CONTENT_TYPE, MEDIA_TYPE).body(buf);
            }
        }
        Ok(builder.build()?)
    }

    /// Send a request and decode the JSON success body into `T`.
    ///
    /// Classified failures carry the same [`Response`] envelope via
    /// [`Error::response`]. Use [`Client::execute_unit`] when there is
    /// no body to decode.
    pub async fn execute<T: DeserializeOwned>(
        &self,
        req: reqwest::Request,
    ) -> Result<(T, Response), Error> {
        let (body, response) = self.dispatch(req).await?;
        match serde_json::from_slice(&body) {
            Ok(value) => Ok((value, response)),
            Err(source) => Err(Error::Decode {
                source,
                response: Box::new(response),
            }),
        }
    }

    /// Send a request, discarding any success body (DELETE-style calls).
    pub async fn execute_unit(&self, req: reqwest::Request) -> Result<Response, Error> {
        let (_, response) = self.dispatch(req).await?;
        Ok(response)
    }

    // The pipeline shared by every call: admission control, send, body
    // drain, rate reconciliation, classification. Cancellation is the
    // caller dropping the returned future; timeouts belong to the
    // transport handle. Both surface as Error::Transport.
    async fn dispatch(&self, req: reqwest::Request) -> Result<(Vec<u8>, Response), Error> {
        let method = req.method().clone();
        let url = req.url().clone();

        if let Some(refused) = self.check_rate_before_send(&method, &url) {
            warn!(
                "{} {}: refused locally, rate limit exhausted until {}",
                method, url, refused.rate.reset
            );
            return Err(Error::RateLimit(Box::new(refused)));
        }

        debug!("{} {}", method, url);
        let raw = self.http.execute(req).await?;
        let status = raw.status();
        let headers = raw.headers().clone();
        // Reading the whole body up front doubles as the drain that
        // hands the connection back to the pool on every exit path;
        // classification and decoding both work from this one buffer.
        // An unreadable body degrades to empty instead of failing the
        // exchange outright.
        let body = raw.bytes().await.map(|b| b.to_vec()).unwrap_or_default();

        let response = Response::new(status, headers);
        // Unconditional, error paths included: throttling state must
        // stay current after failed calls too.
        self.rate_cell().reconcile(&response.headers);

        debug!("{} {} -> {}", method, url, status);
        if let Some(err) = check_response(&method, &url, &response, &body) {
            return Err(err);
        }
        Ok((body, response))
    }

    // Admission control: refuse to send while the cached window is
    // exhausted and has not reset. Synthesizes a 403 envelope so the
    // caller sees the same shape a server-side refusal produces.
    fn check_rate_before_send(&self, method: &Method, url: &Url) -> Option<RateLimitError> {
        let rate = self.rate();
        if !rate.is_exhausted(Timestamp::now()) {
            return None;
        }
        let mut response = Response::new(StatusCode::FORBIDDEN, HeaderMap::new());
        response.rate = rate;
        Some(RateLimitError {
            method: method.clone(),
            url: url.clone(),
            rate,
            message: format!("request refused: rate limit exhausted until {}", rate.reset),
            response,
        })
    }
}

impl Default for Client {
    fn default() -> Self {
        Client::new()
    }
}

/// Configures a [`Client`]: transport handle, base URL, user agent,
/// static headers.
#[derive(Debug, Default)]
pub struct ClientBuilder {
    http: Option<reqwest::Client>,
    base_url: Option<String>,
    user_agent: Option<String>,
    headers: HeaderMap,
}

impl ClientBuilder {
    pub fn new() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Use a caller-supplied transport. Timeouts, proxies and pooling
    /// are configured there, not here.
    pub fn http_client(mut self, http: reqwest::Client) -> ClientBuilder {
        self.http = Some(http);
        self
    }

    /// Override the API base URL. A trailing slash is appended if
    /// missing so that relative paths join as expected.
    pub fn base_url(mut self, base: impl Into<String>) -> ClientBuilder {
        self.base_url = Some(base.into());
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> ClientBuilder {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Add a static header sent with every request.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> ClientBuilder {
        self.headers.insert(name, value);
        self
    }

    pub fn build(self) -> Result<Client, Error> {
        let base_url = match self.base_url {
            Some(mut base) => {
                if !base.ends_with('/') {
                    base.push('/');
                }
                Url::parse(&base)?
            }
            None => Url::parse(DEFAULT_BASE_URL).expect("default base URL parses"),
        };
        Ok(Client {
            http: self.http.unwrap_or_default(),
            base_url,
            user_agent: self.user_agent.unwrap_or_else(default_user_agent),
            headers: self.headers,
            rate: Mutex::new(Rate::default()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serializer;

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("always fails"))
        }
    }

    fn test_client() -> Client {
        Client::builder()
            .base_url("https://api.example.com")
            .build()
            .unwrap()
    }

    #[test]
    fn post_with_body_sets_content_type() {
        let client = test_client();
        let body = serde_json::json!({"name": "backend"});
        let req = client
            .new_request(Method::POST, "v2/tags", Some(&body))
            .unwrap();
        assert_eq!(req.headers().get(CONTENT_TYPE).unwrap(), MEDIA_TYPE);
        assert_eq!(
            req.body().and_then(|b| b.as_bytes()),
            Some(br#"{"name":"backend"}"#.as_ref())
        );
    }

    #[test]
    fn post_without_body_sends_nothing() {
        let client = test_client();
        let req = client
            .new_request::<()>(Method::POST, "v2/tags", None)
            .unwrap();
        assert!(req.headers().get(CONTENT_TYPE).is_none());
        assert!(req.body().is_none());
    }

    #[test]
    fn retrieval_methods_never_serialize() {
        let client = test_client();
        // A body value that cannot serialize must not matter for GET.
        let req = client
            .new_request(Method::GET, "v2/tags", Some(&Unserializable))
            .unwrap();
        assert!(req.body().is_none());
        assert!(req.headers().get(CONTENT_TYPE).is_none());

        let err = client
            .new_request(Method::POST, "v2/tags", Some(&Unserializable))
            .unwrap_err();
        assert!(matches!(err, Error::Encode(_)));
    }

    #[test]
    fn every_request_carries_accept_and_user_agent() {
        let client = Client::builder()
            .base_url("https://api.example.com")
            .user_agent("custom-agent/1.0")
            .header(
                HeaderName::from_static("x-team"),
                HeaderValue::from_static("platform"),
            )
            .build()
            .unwrap();
        let req = client
            .new_request::<()>(Method::GET, "v2/tags", None)
            .unwrap();
        assert_eq!(req.headers().get(ACCEPT).unwrap(), MEDIA_TYPE);
        assert_eq!(req.headers().get(USER_AGENT).unwrap(), "custom-agent/1.0");
        assert_eq!(req.headers().get("x-team").unwrap(), "platform");
        assert_eq!(req.url().as_str(), "https://api.example.com/v2/tags");
    }

    #[test]
    fn unresolvable_path_is_a_url_error() {
        let client = test_client();
        let err = client
            .new_request::<()>(Method::GET, "https://", None)
            .unwrap_err();
        assert!(matches!(err, Error::Url(_)));
    }

    #[test]
    fn add_options_omits_zero_fields() {
        let all_zero = ListOptions::default();
        assert_eq!(add_options("v2/tags", &all_zero).unwrap(), "v2/tags");

        let paged = ListOptions {
            page: 2,
            per_page: 25,
        };
        assert_eq!(
            add_options("v2/tags", &paged).unwrap(),
            "v2/tags?page=2&per_page=25"
        );

        let partial = ListOptions {
            page: 0,
            per_page: 50,
        };
        assert_eq!(
            add_options("v2/tags?kind=all", &partial).unwrap(),
            "v2/tags?kind=all&per_page=50"
        );
    }

    #[test]
    fn exhausted_cache_refuses_before_sending() {
        let client = test_client();
        *client.rate_cell() = Rate {
            limit: 5000,
            remaining: 0,
            reset: Timestamp::from_unix(Timestamp::now().unix() + 3600).unwrap(),
        };
        let url = Url::parse("https://api.example.com/v2/tags").unwrap();
        let refused = client.check_rate_before_send(&Method::GET, &url).unwrap();
        assert_eq!(refused.response.status, StatusCode::FORBIDDEN);
        assert_eq!(refused.rate.remaining, 0);

        // Once the window has passed, sending is allowed again.
        *client.rate_cell() = Rate {
            limit: 5000,
            remaining: 0,
            reset: Timestamp::from_unix(1).unwrap(),
        };
        assert!(client.check_rate_before_send(&Method::GET, &url).is_none());
    }

    #[test]
    fn fresh_client_has_zero_rate() {
        let client = test_client();
        assert_eq!(client.rate(), Rate::default());
    }
}
