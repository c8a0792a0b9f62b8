//! Shared fixtures for integration tests: an in-memory `ListService`, a
//! manual clock and a scripted console.

#![allow(dead_code)]

use list_pusher::api::{ListService, RateLimit, RpcError};
use list_pusher::clock::Clock;
use list_pusher::model::{ListEntry, ListPage, ListUri, RecordHandle, Session};
use list_pusher::reconcile::{Console, Event};
use list_pusher::Result;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

pub const OWNER: &str = "did:plc:owner";
pub const LIST: &str = "at://did:plc:owner/app.bsky.graph.list/blocklist";

pub fn list_uri() -> ListUri {
    LIST.parse().unwrap()
}

pub fn item_uri(rkey: &str) -> String {
    format!("at://{OWNER}/app.bsky.graph.listitem/{rkey}")
}

pub fn entry(subject: &str, rkey: &str) -> ListEntry {
    ListEntry {
        subject: Some(subject.to_string()),
        uri: Some(item_uri(rkey)),
    }
}

pub fn page(entries: Vec<ListEntry>, cursor: Option<&str>) -> ListPage {
    ListPage {
        entries,
        cursor: cursor.map(str::to_string),
    }
}

pub fn server_error() -> RpcError {
    RpcError::Remote {
        status: 503,
        error: None,
        message: "service unavailable".into(),
        rate_limit: None,
    }
}

pub fn rate_limited(reset_at: i64) -> RpcError {
    RpcError::Remote {
        status: 429,
        error: Some("RateLimitExceeded".into()),
        message: "Rate Limit Exceeded".into(),
        rate_limit: Some(RateLimit {
            reset_at: Some(reset_at),
            remaining: Some(0),
        }),
    }
}

pub fn expired() -> RpcError {
    RpcError::ExpiredToken("Token has expired".into())
}

pub fn rejected() -> RpcError {
    RpcError::Remote {
        status: 400,
        error: Some("InvalidRequest".into()),
        message: "Input/subject must be a valid did".into(),
        rate_limit: None,
    }
}

/// Everything the fake observed.
#[derive(Debug, Default)]
pub struct Calls {
    pub logins: usize,
    pub refreshes: usize,
    pub resolves: Vec<String>,
    /// Cursor passed to each getList call.
    pub page_cursors: Vec<Option<String>>,
    pub page_limits: Vec<u32>,
    /// (subject, access token) per createRecord attempt.
    pub creates: Vec<(String, String)>,
    /// Record keys per deleteRecord attempt.
    pub deletes: Vec<String>,
    /// Every write attempt in call order, as `create:<subject>` or
    /// `delete:<rkey>`.
    pub writes: Vec<String>,
}

/// In-memory list service with scripted failures.
#[derive(Default)]
pub struct FakeService {
    pages: RefCell<VecDeque<std::result::Result<ListPage, RpcError>>>,
    login_results: RefCell<VecDeque<std::result::Result<(), RpcError>>>,
    refresh_results: RefCell<VecDeque<std::result::Result<(), RpcError>>>,
    create_results: RefCell<VecDeque<std::result::Result<(), RpcError>>>,
    delete_results: RefCell<VecDeque<std::result::Result<(), RpcError>>>,
    handles: HashMap<String, String>,
    sessions: RefCell<usize>,
    pub calls: RefCell<Calls>,
}

impl FakeService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pages(self, pages: Vec<ListPage>) -> Self {
        self.pages.borrow_mut().extend(pages.into_iter().map(Ok));
        self
    }

    /// Serve `members` (subject, rkey) split into pages of `per_page`.
    pub fn with_members(self, members: &[(&str, &str)], per_page: usize) -> Self {
        let chunks: Vec<_> = members.chunks(per_page.max(1)).collect();
        let mut pages = Vec::new();
        for (i, chunk) in chunks.iter().enumerate() {
            let entries = chunk.iter().map(|(s, r)| entry(s, r)).collect();
            let cursor = (i + 1 < chunks.len()).then(|| format!("cursor-{}", i + 1));
            pages.push(page(entries, cursor.as_deref()));
        }
        if pages.is_empty() {
            pages.push(page(Vec::new(), None));
        }
        self.with_pages(pages)
    }

    pub fn with_page_error(self, err: RpcError) -> Self {
        self.pages.borrow_mut().push_back(Err(err));
        self
    }

    pub fn with_handle(mut self, handle: &str, did: &str) -> Self {
        self.handles.insert(handle.to_string(), did.to_string());
        self
    }

    pub fn fail_login(self, err: RpcError) -> Self {
        self.login_results.borrow_mut().push_back(Err(err));
        self
    }

    pub fn fail_refresh(self, err: RpcError) -> Self {
        self.refresh_results.borrow_mut().push_back(Err(err));
        self
    }

    /// Queue failures for the next create attempts; later attempts succeed.
    pub fn fail_creates(self, errors: impl IntoIterator<Item = RpcError>) -> Self {
        self.create_results
            .borrow_mut()
            .extend(errors.into_iter().map(Err));
        self
    }

    pub fn fail_deletes(self, errors: impl IntoIterator<Item = RpcError>) -> Self {
        self.delete_results
            .borrow_mut()
            .extend(errors.into_iter().map(Err));
        self
    }

    /// Make the first create of `count` successive attempts succeed, so
    /// failures queued afterwards land on later entries.
    pub fn succeed_creates(self, count: usize) -> Self {
        self.create_results
            .borrow_mut()
            .extend(std::iter::repeat_with(|| Ok(())).take(count));
        self
    }

    fn next_session(&self, prefix: &str) -> Session {
        let mut n = self.sessions.borrow_mut();
        *n += 1;
        Session {
            access_jwt: format!("{prefix}-access-{n}"),
            refresh_jwt: format!("{prefix}-refresh-{n}"),
            handle: "owner.example".into(),
            did: OWNER.into(),
        }
    }

    pub fn created_subjects(&self) -> Vec<String> {
        self.calls.borrow().creates.iter().map(|(s, _)| s.clone()).collect()
    }
}

impl ListService for FakeService {
    fn create_session(
        &self,
        _identifier: &str,
        _password: &str,
    ) -> std::result::Result<Session, RpcError> {
        self.calls.borrow_mut().logins += 1;
        if let Some(Err(err)) = self.login_results.borrow_mut().pop_front() {
            return Err(err);
        }
        Ok(self.next_session("login"))
    }

    fn refresh_session(&self, _session: &Session) -> std::result::Result<Session, RpcError> {
        self.calls.borrow_mut().refreshes += 1;
        if let Some(Err(err)) = self.refresh_results.borrow_mut().pop_front() {
            return Err(err);
        }
        Ok(self.next_session("refreshed"))
    }

    fn resolve_handle(&self, handle: &str) -> std::result::Result<String, RpcError> {
        self.calls.borrow_mut().resolves.push(handle.to_string());
        self.handles.get(handle).cloned().ok_or_else(|| RpcError::Remote {
            status: 400,
            error: Some("InvalidRequest".into()),
            message: "Unable to resolve handle".into(),
            rate_limit: None,
        })
    }

    fn get_list_page(
        &self,
        _session: &Session,
        _list: &ListUri,
        cursor: Option<&str>,
        limit: u32,
    ) -> std::result::Result<ListPage, RpcError> {
        {
            let mut calls = self.calls.borrow_mut();
            calls.page_cursors.push(cursor.map(str::to_string));
            calls.page_limits.push(limit);
        }
        self.pages
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok(ListPage::default()))
    }

    fn create_list_item(
        &self,
        session: &Session,
        subject: &str,
        _list: &ListUri,
    ) -> std::result::Result<RecordHandle, RpcError> {
        {
            let mut calls = self.calls.borrow_mut();
            calls
                .creates
                .push((subject.to_string(), session.access_jwt.clone()));
            calls.writes.push(format!("create:{subject}"));
        }
        if let Some(Err(err)) = self.create_results.borrow_mut().pop_front() {
            return Err(err);
        }
        let rkey = format!("rk-{}", self.calls.borrow().creates.len());
        Ok(RecordHandle::from_uri(&item_uri(&rkey)).unwrap())
    }

    fn delete_list_item(
        &self,
        _session: &Session,
        record: &RecordHandle,
    ) -> std::result::Result<(), RpcError> {
        {
            let mut calls = self.calls.borrow_mut();
            calls.deletes.push(record.rkey().to_string());
            calls.writes.push(format!("delete:{}", record.rkey()));
        }
        if let Some(Err(err)) = self.delete_results.borrow_mut().pop_front() {
            return Err(err);
        }
        Ok(())
    }
}

/// Clock that never blocks; sleeping advances time.
#[derive(Debug)]
pub struct ManualClock {
    pub now: i64,
    pub sleeps: Vec<Duration>,
}

impl ManualClock {
    pub fn at(now: i64) -> Self {
        ManualClock {
            now,
            sleeps: Vec::new(),
        }
    }

    pub fn slept_secs(&self) -> Vec<u64> {
        self.sleeps.iter().map(Duration::as_secs).collect()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now
    }

    fn sleep(&mut self, duration: Duration) {
        self.sleeps.push(duration);
        self.now += duration.as_secs() as i64;
    }
}

/// Console that answers every confirmation with a fixed string and keeps the
/// events it saw, formatted with `Debug`.
#[derive(Debug)]
pub struct ScriptedConsole {
    pub answer: String,
    pub questions: Vec<String>,
    pub events: Vec<String>,
}

impl ScriptedConsole {
    pub fn answering(answer: &str) -> Self {
        ScriptedConsole {
            answer: answer.to_string(),
            questions: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn saw(&self, event: &str) -> bool {
        self.events.iter().any(|e| e.starts_with(event))
    }
}

impl Console for ScriptedConsole {
    fn confirm(&mut self, question: &str) -> Result<String> {
        self.questions.push(question.to_string());
        Ok(self.answer.clone())
    }

    fn report(&mut self, event: Event<'_>) {
        self.events.push(format!("{event:?}"));
    }
}
