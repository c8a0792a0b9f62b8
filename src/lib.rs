// Library root
// -----------
// This crate exposes the library surface behind the `list-pusher` binary,
// which adds or removes accounts on a Bluesky moderation list.
//
// Module responsibilities:
// - `api`: the `ListService` RPC capability and the blocking XRPC client
//   that implements it, including the error/rate-limit adapter.
// - `auth`: holds the login credentials and the current session, and
//   refreshes it when the access token expires.
// - `listing`: walks the paginated getList endpoint into a `CurrentSet`.
// - `retry`: retry policy and backoff for membership writes.
// - `reconcile`: the run driver (login, diff, confirm, apply, summarize).
// - `idset`: ordered dedup and difference helpers.
// - `input`: readers for the desired-set JSON and manual-changes TOML files.
// - `config`: validated run configuration.
// - `ui`: terminal prompts and progress output.
//
// Everything below `ui` is free of terminal I/O, so the driver can be tested
// with a fake service, a manual clock and a scripted console.
pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod idset;
pub mod input;
pub mod listing;
pub mod model;
pub mod reconcile;
pub mod retry;
pub mod ui;

pub use error::{Error, Result};
