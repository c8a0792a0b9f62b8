// Full walk of a list's membership through paginated getList calls.

use crate::api::ListService;
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::model::{CurrentSet, ListEntry, ListUri, MembershipRecord, RecordHandle, Session};
use std::time::Duration;
use tracing::debug;

/// Paging parameters for [`fetch_membership`].
#[derive(Debug, Clone)]
pub struct PageOptions {
    pub page_size: u32,
    /// Pause between page requests to stay under the server's throttling.
    pub pause: Duration,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            page_size: 100,
            pause: Duration::from_millis(100),
        }
    }
}

/// Turn a raw entry into a record; entries without a subject DID or a
/// usable record URI cannot be removed later and are dropped.
fn to_record(entry: ListEntry, list: &ListUri) -> Option<MembershipRecord> {
    let subject = entry.subject.filter(|s| !s.is_empty())?;
    let record = RecordHandle::from_uri(entry.uri.as_deref()?)?;
    Some(MembershipRecord {
        subject,
        record,
        list: list.clone(),
    })
}

/// Read every page of `list` and return the complete membership.
///
/// Stops when a page comes back without a cursor (or with an empty one). Any
/// page failure aborts the walk and nothing collected so far is returned.
pub fn fetch_membership<S, C>(
    service: &S,
    session: &Session,
    list: &ListUri,
    options: &PageOptions,
    clock: &mut C,
) -> Result<CurrentSet>
where
    S: ListService,
    C: Clock,
{
    let mut current = CurrentSet::default();
    let mut cursor: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = service
            .get_list_page(session, list, cursor.as_deref(), options.page_size)
            .map_err(Error::Fetch)?;
        pages += 1;

        let received = page.entries.len();
        let mut kept = 0usize;
        for record in page.entries.into_iter().filter_map(|e| to_record(e, list)) {
            if current.insert(record) {
                kept += 1;
            }
        }
        debug!(page = pages, received, kept, total = current.len(), "fetched list page");

        match page.cursor.filter(|c| !c.is_empty()) {
            Some(next) => cursor = Some(next),
            None => break,
        }
        clock.sleep(options.pause);
    }

    debug!(pages, members = current.len(), "list walk complete");
    Ok(current)
}
