// Domain types shared by the API client, the list reader and the driver.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// AT-URI of the moderation list being managed, e.g.
/// `at://did:plc:xyz/app.bsky.graph.list/3k...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListUri(String);

impl ListUri {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ListUri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if !trimmed.starts_with("at://") || trimmed.len() == "at://".len() {
            return Err(Error::Config(
                "list identifier should be an AT-URI starting with 'at://'".into(),
            ));
        }
        Ok(ListUri(trimmed.to_string()))
    }
}

impl fmt::Display for ListUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to a stored `app.bsky.graph.listitem` record. This is the only
/// way to delete a membership later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHandle(String);

impl RecordHandle {
    /// Accepts `at://<repo>/<collection>/<rkey>`; anything without a record
    /// key cannot be targeted for removal and yields `None`.
    pub fn from_uri(uri: &str) -> Option<Self> {
        let rest = uri.strip_prefix("at://")?;
        let parts: Vec<&str> = rest.split('/').collect();
        match parts.as_slice() {
            [repo, collection, rkey] if [repo, collection, rkey].iter().all(|p| !p.is_empty()) => {
                Some(RecordHandle(uri.to_string()))
            }
            _ => None,
        }
    }

    pub fn uri(&self) -> &str {
        &self.0
    }

    /// Record key, the last path segment of the URI.
    pub fn rkey(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }
}

/// One subject's membership in the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipRecord {
    pub subject: String,
    pub record: RecordHandle,
    pub list: ListUri,
}

/// Tokens returned by createSession/refreshSession. A refresh yields a new
/// value that replaces the old one.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub access_jwt: String,
    pub refresh_jwt: String,
    pub handle: String,
    pub did: String,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("handle", &self.handle)
            .field("did", &self.did)
            .finish_non_exhaustive()
    }
}

/// Raw entry from one getList page. Either field may be missing in the
/// remote response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListEntry {
    pub subject: Option<String>,
    pub uri: Option<String>,
}

/// One page of getList output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub entries: Vec<ListEntry>,
    pub cursor: Option<String>,
}

/// Current membership of a list, keyed by subject DID.
#[derive(Debug, Clone, Default)]
pub struct CurrentSet {
    records: HashMap<String, MembershipRecord>,
}

impl CurrentSet {
    /// Insert unless the subject is already present; the first record seen
    /// wins.
    pub fn insert(&mut self, record: MembershipRecord) -> bool {
        if self.records.contains_key(&record.subject) {
            return false;
        }
        self.records.insert(record.subject.clone(), record);
        true
    }

    pub fn get(&self, subject: &str) -> Option<&MembershipRecord> {
        self.records.get(subject)
    }

    pub fn contains(&self, subject: &str) -> bool {
        self.records.contains_key(subject)
    }

    pub fn subjects(&self) -> impl Iterator<Item = &String> {
        self.records.keys()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
