// Reconciliation driver.
//
// A run is strictly ordered: check the request, log in, resolve handles,
// walk the current membership once, compute the delta, ask for
// confirmation, then apply each entry through the retry policy. Per-entry
// failures are counted and never stop the batch; everything before the
// apply loop is fatal.

use crate::api::{ListService, RpcError};
use crate::auth::{AuthSession, Credentials};
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::idset::{deduplicate, difference};
use crate::listing::{fetch_membership, PageOptions};
use crate::model::{CurrentSet, ListUri, MembershipRecord};
use crate::retry::{Mutation, RetryPolicy};
use std::fmt;
use std::time::Duration;
use tracing::{info, warn};

/// Identifiers to add to and remove from the list.
///
/// With `resolve_handles` set, anything not starting with `did:` is looked up
/// as a handle first. Without it every identifier is used as a subject
/// verbatim, so a malformed one still reaches the list service and is
/// counted as a failed entry.
#[derive(Debug, Clone, Default)]
pub struct Request {
    pub additions: Vec<String>,
    pub removals: Vec<String>,
    pub resolve_handles: bool,
}

impl Request {
    /// Subjects from the desired-set file, taken as-is.
    pub fn add(subjects: Vec<String>) -> Self {
        Request {
            additions: subjects,
            ..Request::default()
        }
    }

    /// Handles or DIDs to take off the list.
    pub fn remove(targets: Vec<String>) -> Self {
        Request {
            removals: targets,
            resolve_handles: true,
            ..Request::default()
        }
    }

    /// Handles or DIDs in both directions, from the manual-changes file.
    pub fn sync(additions: Vec<String>, removals: Vec<String>) -> Self {
        Request {
            additions,
            removals,
            resolve_handles: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty()
    }
}

/// Everything a run needs besides the service, the clock and the console.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub list: ListUri,
    pub retry: RetryPolicy,
    pub paging: PageOptions,
    /// Pause between handle resolutions and between applied entries.
    pub pause: Duration,
}

impl RunOptions {
    pub fn new(list: ListUri) -> Self {
        RunOptions {
            list,
            retry: RetryPolicy::default(),
            paging: PageOptions::default(),
            pause: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Add,
    Remove,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Add => f.write_str("Adding"),
            Action::Remove => f.write_str("Removing"),
        }
    }
}

/// Progress notifications for the operator.
#[derive(Debug)]
pub enum Event<'a> {
    Requested { additions: usize, removals: usize },
    Authenticated { did: &'a str },
    Resolved { handle: &'a str, did: &'a str },
    Unresolved { handle: &'a str, error: &'a RpcError },
    FetchStarted,
    Fetched { members: usize },
    Planned { additions: usize, removals: usize },
    NothingToDo,
    Cancelled,
    Applying { action: Action, index: usize, total: usize, subject: &'a str },
    Applied { action: Action, subject: &'a str },
    Failed { action: Action, subject: &'a str, error: &'a Error },
}

/// Operator interaction needed by a run.
pub trait Console {
    /// Ask `question` and return the raw answer.
    fn confirm(&mut self, question: &str) -> Result<String>;

    fn report(&mut self, event: Event<'_>);
}

/// Only a literal "y" (any case, surrounding whitespace ignored) proceeds.
pub fn is_affirmative(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("y")
}

/// Changes to make, computed once per run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub additions: Vec<String>,
    pub removals: Vec<MembershipRecord>,
}

impl Plan {
    /// Additions are wanted subjects not yet listed; removals are requested
    /// subjects that are listed, paired with their records.
    pub fn compute(additions: &[String], removals: &[String], current: &CurrentSet) -> Self {
        let additions = difference(&deduplicate(additions.iter().cloned()), current.subjects());
        let removals = deduplicate(removals.iter().cloned())
            .iter()
            .filter_map(|subject| current.get(subject).cloned())
            .collect();
        Plan {
            additions,
            removals,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty()
    }

    fn question(&self, list: &ListUri) -> String {
        match (self.additions.len(), self.removals.len()) {
            (n, 0) => format!("Add {n} users to list {list}? (y/N)"),
            (0, m) => format!("Remove {m} users from list {list}? (y/N)"),
            (n, m) => format!("Add {n} and remove {m} users on list {list}? (y/N)"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub added: Tally,
    pub removed: Tally,
}

impl Summary {
    pub fn succeeded(&self) -> usize {
        self.added.succeeded + self.removed.succeeded
    }

    pub fn failed(&self) -> usize {
        self.added.failed + self.removed.failed
    }
}

/// How a run ended. All three are successful exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    NothingToDo,
    Cancelled,
    Completed(Summary),
}

fn is_did(identifier: &str) -> bool {
    identifier.starts_with("did:")
}

/// Map handles to DIDs, passing DIDs through untouched. Handles that fail to
/// resolve are reported and skipped.
fn resolve_all<S, C, U>(
    service: &S,
    identifiers: &[String],
    pause: Duration,
    clock: &mut C,
    console: &mut U,
) -> Vec<String>
where
    S: ListService,
    C: Clock,
    U: Console,
{
    let mut resolved = Vec::with_capacity(identifiers.len());
    let mut lookups = 0usize;
    for identifier in identifiers {
        if is_did(identifier) {
            resolved.push(identifier.clone());
            continue;
        }
        if lookups > 0 {
            clock.sleep(pause);
        }
        lookups += 1;
        match service.resolve_handle(identifier) {
            Ok(did) => {
                console.report(Event::Resolved {
                    handle: identifier,
                    did: &did,
                });
                resolved.push(did);
            }
            Err(error) => {
                warn!(handle = %identifier, error = %error, "failed to resolve handle, skipping");
                console.report(Event::Unresolved {
                    handle: identifier,
                    error: &error,
                });
            }
        }
    }
    resolved
}

/// Execute one reconciliation run against `options.list`.
pub fn run<S, C, U>(
    service: &S,
    credentials: Credentials,
    request: &Request,
    options: &RunOptions,
    clock: &mut C,
    console: &mut U,
) -> Result<Outcome>
where
    S: ListService,
    C: Clock,
    U: Console,
{
    if request.is_empty() {
        return Err(Error::Config("no identifiers provided".into()));
    }
    console.report(Event::Requested {
        additions: request.additions.len(),
        removals: request.removals.len(),
    });

    let mut auth = AuthSession::login(service, credentials)?;
    console.report(Event::Authenticated { did: auth.did() });

    let (additions, removals) = if request.resolve_handles {
        let additions = resolve_all(service, &request.additions, options.pause, clock, console);
        let removals = resolve_all(service, &request.removals, options.pause, clock, console);
        if additions.is_empty() && removals.is_empty() {
            return Err(Error::Config("no identifiers could be resolved to DIDs".into()));
        }
        (additions, removals)
    } else {
        (request.additions.clone(), request.removals.clone())
    };

    console.report(Event::FetchStarted);
    let current = fetch_membership(service, auth.session(), &options.list, &options.paging, clock)?;
    console.report(Event::Fetched {
        members: current.len(),
    });

    let plan = Plan::compute(&additions, &removals, &current);
    info!(
        members = current.len(),
        additions = plan.additions.len(),
        removals = plan.removals.len(),
        "computed delta"
    );
    console.report(Event::Planned {
        additions: plan.additions.len(),
        removals: plan.removals.len(),
    });

    if plan.is_empty() {
        console.report(Event::NothingToDo);
        return Ok(Outcome::NothingToDo);
    }

    let answer = console.confirm(&plan.question(&options.list))?;
    if !is_affirmative(&answer) {
        console.report(Event::Cancelled);
        return Ok(Outcome::Cancelled);
    }

    let summary = apply(service, &mut auth, &plan, options, clock, console);
    info!(
        added = summary.added.succeeded,
        add_failures = summary.added.failed,
        removed = summary.removed.succeeded,
        remove_failures = summary.removed.failed,
        "run complete"
    );
    Ok(Outcome::Completed(summary))
}

/// Apply every entry of `plan` in order: additions, then removals.
fn apply<S, C, U>(
    service: &S,
    auth: &mut AuthSession,
    plan: &Plan,
    options: &RunOptions,
    clock: &mut C,
    console: &mut U,
) -> Summary
where
    S: ListService,
    C: Clock,
    U: Console,
{
    let mut summary = Summary::default();
    let total = plan.additions.len() + plan.removals.len();
    let mutations = plan
        .additions
        .iter()
        .map(|subject| {
            (
                Action::Add,
                Mutation::Create {
                    subject: subject.as_str(),
                },
            )
        })
        .chain(
            plan.removals
                .iter()
                .map(|record| (Action::Remove, Mutation::Delete { record })),
        );

    for (index, (action, mutation)) in mutations.enumerate() {
        if index > 0 {
            clock.sleep(options.pause);
        }
        let subject = match mutation {
            Mutation::Create { subject } => subject,
            Mutation::Delete { record } => record.subject.as_str(),
        };
        console.report(Event::Applying {
            action,
            index: index + 1,
            total,
            subject,
        });

        let result = options
            .retry
            .apply(service, auth, &options.list, mutation, clock);
        let tally = match action {
            Action::Add => &mut summary.added,
            Action::Remove => &mut summary.removed,
        };
        match result {
            Ok(_) => {
                tally.succeeded += 1;
                console.report(Event::Applied { action, subject });
            }
            Err(error) => {
                tally.failed += 1;
                console.report(Event::Failed {
                    action,
                    subject,
                    error: &error,
                });
            }
        }
    }
    summary
}
