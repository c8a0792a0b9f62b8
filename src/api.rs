// API client module: the RPC capability the rest of the crate talks to, and
// a small blocking XRPC client that implements it against a PDS. Everything
// runs on one thread, so the client is synchronous like the rest of the tool.

use crate::model::{ListEntry, ListPage, ListUri, RecordHandle, Session};
use chrono::{SecondsFormat, Utc};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Collection that holds list membership records.
pub const LIST_ITEM_COLLECTION: &str = "app.bsky.graph.listitem";

/// Rate-limit metadata the server attached to a failed response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimit {
    /// Unix timestamp (seconds) at which the quota resets.
    pub reset_at: Option<i64>,
    pub remaining: Option<u64>,
}

impl RateLimit {
    /// Read the `ratelimit-reset` / `ratelimit-remaining` headers. Returns
    /// `None` when neither header is present or parseable.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let number = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<i64>().ok())
        };
        let limit = RateLimit {
            reset_at: number("ratelimit-reset"),
            remaining: number("ratelimit-remaining").and_then(|n| u64::try_from(n).ok()),
        };
        (limit != RateLimit::default()).then_some(limit)
    }
}

/// Failure of a single RPC call.
#[derive(Debug, Clone, Error)]
pub enum RpcError {
    #[error("request failed: {0}")]
    Transport(String),

    /// The access token is stale; a refreshed session may succeed.
    #[error("access token expired: {0}")]
    ExpiredToken(String),

    #[error("{status} {}: {message}", .error.as_deref().unwrap_or("error"))]
    Remote {
        status: u16,
        error: Option<String>,
        message: String,
        rate_limit: Option<RateLimit>,
    },

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl RpcError {
    /// Transport failures, timeouts, throttling and server-side errors are
    /// worth another attempt. Client errors and expired tokens are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            RpcError::Transport(_) => true,
            RpcError::Remote { status, .. } => {
                *status == 408 || *status == 429 || (500..600).contains(status)
            }
            RpcError::ExpiredToken(_) | RpcError::Decode(_) => false,
        }
    }

    pub fn is_expired_token(&self) -> bool {
        matches!(self, RpcError::ExpiredToken(_))
    }

    pub fn rate_limit(&self) -> Option<&RateLimit> {
        match self {
            RpcError::Remote { rate_limit, .. } => rate_limit.as_ref(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for RpcError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RpcError::Decode(err.to_string())
        } else {
            RpcError::Transport(err.to_string())
        }
    }
}

#[derive(Deserialize)]
struct XrpcErrorBody {
    error: Option<String>,
    message: Option<String>,
}

/// Turn a non-success response into an [`RpcError`]. This is the only
/// place that looks at raw error payloads and headers.
pub fn error_from_response(status: StatusCode, headers: &HeaderMap, body: &str) -> RpcError {
    let parsed: Option<XrpcErrorBody> = serde_json::from_str(body).ok();
    let (error, message) = match parsed {
        Some(b) => (b.error, b.message.unwrap_or_default()),
        None => (None, body.trim().to_string()),
    };
    if error.as_deref() == Some("ExpiredToken") {
        return RpcError::ExpiredToken(message);
    }
    RpcError::Remote {
        status: status.as_u16(),
        error,
        message,
        rate_limit: RateLimit::from_headers(headers),
    }
}

/// Remote operations the tool needs. The production implementation is
/// [`XrpcClient`]; tests substitute an in-memory fake.
pub trait ListService {
    fn create_session(&self, identifier: &str, password: &str) -> Result<Session, RpcError>;

    fn refresh_session(&self, session: &Session) -> Result<Session, RpcError>;

    /// Resolve a handle to a DID.
    fn resolve_handle(&self, handle: &str) -> Result<String, RpcError>;

    fn get_list_page(
        &self,
        session: &Session,
        list: &ListUri,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<ListPage, RpcError>;

    /// Create a listitem record in the caller's repo; returns its handle.
    fn create_list_item(
        &self,
        session: &Session,
        subject: &str,
        list: &ListUri,
    ) -> Result<RecordHandle, RpcError>;

    fn delete_list_item(&self, session: &Session, record: &RecordHandle) -> Result<(), RpcError>;
}

/// Blocking XRPC client bound to one PDS.
#[derive(Clone)]
pub struct XrpcClient {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct CreateSessionRequest<'a> {
    identifier: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct ResolveHandleResponse {
    did: String,
}

#[derive(Deserialize)]
struct GetListResponse {
    cursor: Option<String>,
    #[serde(default)]
    items: Vec<ListItemView>,
}

#[derive(Deserialize)]
struct ListItemView {
    uri: Option<String>,
    subject: Option<ProfileRef>,
}

#[derive(Deserialize)]
struct ProfileRef {
    did: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateRecordRequest<'a> {
    repo: &'a str,
    collection: &'a str,
    record: ListItemRecord<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListItemRecord<'a> {
    #[serde(rename = "$type")]
    kind: &'a str,
    subject: &'a str,
    list: &'a str,
    created_at: String,
}

#[derive(Deserialize)]
struct CreateRecordResponse {
    uri: String,
}

#[derive(Serialize)]
struct DeleteRecordRequest<'a> {
    repo: &'a str,
    collection: &'a str,
    rkey: &'a str,
}

impl XrpcClient {
    /// Create a client for the PDS at `base_url`, e.g. `https://bsky.social`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, RpcError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("list-pusher/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RpcError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(XrpcClient {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, nsid: &str) -> String {
        format!("{}/xrpc/{}", self.base_url, nsid)
    }

    /// Send a request and check the status; error bodies go through
    /// [`error_from_response`].
    fn send(&self, req: RequestBuilder) -> Result<Response, RpcError> {
        let res = req.send()?;
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }
        let headers = res.headers().clone();
        let body = res.text().unwrap_or_default();
        Err(error_from_response(status, &headers, &body))
    }

    fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, RpcError> {
        let res = self.send(req)?;
        res.json::<T>().map_err(|e| RpcError::Decode(e.to_string()))
    }
}

impl ListService for XrpcClient {
    fn create_session(&self, identifier: &str, password: &str) -> Result<Session, RpcError> {
        debug!(host = %self.base_url, identifier, "creating session");
        let req = self
            .client
            .post(self.url("com.atproto.server.createSession"))
            .json(&CreateSessionRequest {
                identifier,
                password,
            });
        self.send_json(req)
    }

    fn refresh_session(&self, session: &Session) -> Result<Session, RpcError> {
        let req = self
            .client
            .post(self.url("com.atproto.server.refreshSession"))
            .bearer_auth(&session.refresh_jwt);
        self.send_json(req)
    }

    fn resolve_handle(&self, handle: &str) -> Result<String, RpcError> {
        let req = self
            .client
            .get(self.url("com.atproto.identity.resolveHandle"))
            .query(&[("handle", handle)]);
        let resp: ResolveHandleResponse = self.send_json(req)?;
        Ok(resp.did)
    }

    fn get_list_page(
        &self,
        session: &Session,
        list: &ListUri,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<ListPage, RpcError> {
        let mut req = self
            .client
            .get(self.url("app.bsky.graph.getList"))
            .bearer_auth(&session.access_jwt)
            .query(&[("list", list.as_str())])
            .query(&[("limit", limit)]);
        if let Some(c) = cursor {
            req = req.query(&[("cursor", c)]);
        }
        let resp: GetListResponse = self.send_json(req)?;
        let entries = resp
            .items
            .into_iter()
            .map(|item| ListEntry {
                subject: item.subject.and_then(|s| s.did),
                uri: item.uri,
            })
            .collect();
        Ok(ListPage {
            entries,
            cursor: resp.cursor,
        })
    }

    fn create_list_item(
        &self,
        session: &Session,
        subject: &str,
        list: &ListUri,
    ) -> Result<RecordHandle, RpcError> {
        let body = CreateRecordRequest {
            repo: &session.did,
            collection: LIST_ITEM_COLLECTION,
            record: ListItemRecord {
                kind: LIST_ITEM_COLLECTION,
                subject,
                list: list.as_str(),
                created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            },
        };
        let req = self
            .client
            .post(self.url("com.atproto.repo.createRecord"))
            .bearer_auth(&session.access_jwt)
            .json(&body);
        let resp: CreateRecordResponse = self.send_json(req)?;
        RecordHandle::from_uri(&resp.uri)
            .ok_or_else(|| {
                RpcError::Decode(format!("created record has no record key: {}", resp.uri))
            })
    }

    fn delete_list_item(&self, session: &Session, record: &RecordHandle) -> Result<(), RpcError> {
        let body = DeleteRecordRequest {
            repo: &session.did,
            collection: LIST_ITEM_COLLECTION,
            rkey: record.rkey(),
        };
        let req = self
            .client
            .post(self.url("com.atproto.repo.deleteRecord"))
            .bearer_auth(&session.access_jwt)
            .json(&body);
        self.send(req)?;
        Ok(())
    }
}
