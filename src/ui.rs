// UI layer: terminal prompts using `dialoguer` and progress output for a run.
// The driver never prints; it reports `Event`s and this module turns them
// into lines on stdout.

use crate::config::{Config, Settings};
use crate::error::{Error, Result};
use crate::reconcile::{Console, Event, Outcome};
use crossterm::style::Stylize;
use dialoguer::{Input, Password};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Prompt for whatever the flags and environment did not provide, then
/// validate the result.
pub fn complete_config(mut settings: Settings) -> anyhow::Result<Config> {
    if settings.handle.is_none() {
        let handle: String = Input::new()
            .with_prompt("Enter your Bluesky handle (e.g., username.bsky.social)")
            .interact_text()?;
        settings.handle = Some(handle);
    }
    if settings.password.is_none() {
        // `Password` hides input in terminal for passwords.
        let password = Password::new().with_prompt("Enter your app password").interact()?;
        settings.password = Some(password);
    }
    if settings.list.is_none() {
        let list: String = Input::new()
            .with_prompt("Enter the list URI or AT-URI (starts with at://)")
            .interact_text()?;
        settings.list = Some(list);
    }
    Ok(Config::try_from(settings)?)
}

/// Console backed by the terminal. A spinner is shown while the list is
/// being read.
#[derive(Default)]
pub struct TerminalConsole {
    spinner: Option<ProgressBar>,
}

impl TerminalConsole {
    pub fn new() -> Self {
        Self::default()
    }

    fn start_spinner(&mut self, message: &'static str) {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(message);
        spinner.enable_steady_tick(Duration::from_millis(100));
        self.spinner = Some(spinner);
    }

    fn stop_spinner(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }
}

impl Console for TerminalConsole {
    fn confirm(&mut self, question: &str) -> Result<String> {
        Input::<String>::new()
            .with_prompt(question)
            .allow_empty(true)
            .interact_text()
            .map_err(|e| Error::Prompt(e.to_string()))
    }

    fn report(&mut self, event: Event<'_>) {
        match event {
            Event::Requested {
                additions,
                removals,
            } => {
                if additions > 0 {
                    println!("\nFound {additions} identifiers to add to the list.");
                }
                if removals > 0 {
                    println!("\nFound {removals} identifiers to remove from the list.");
                }
                println!("\nConnecting to Bluesky...");
            }
            Event::Authenticated { did } => {
                println!("{} Successfully authenticated as {did}", "✓".green());
            }
            Event::Resolved { handle, did } => println!("  {handle} → {did}"),
            Event::Unresolved { handle, error } => {
                println!("{} Failed to resolve {handle}: {error} (skipping)", "✗".red());
            }
            Event::FetchStarted => self.start_spinner("Fetching existing list entries..."),
            Event::Fetched { members } => {
                self.stop_spinner();
                println!("List already contains {members} accounts");
            }
            Event::Planned {
                additions,
                removals,
            } => {
                if additions > 0 {
                    println!("Accounts to be added to list: {additions}");
                }
                if removals > 0 {
                    println!("Accounts found in list to remove: {removals}");
                }
            }
            Event::NothingToDo => println!("The list already matches the request. Nothing to do."),
            Event::Cancelled => println!("Operation cancelled."),
            Event::Applying {
                action,
                index,
                total,
                subject,
            } => println!("{action} user {index}/{total}: {subject}"),
            Event::Applied { .. } => println!("{} Done", "✓".green()),
            Event::Failed {
                subject, error, ..
            } => println!("{} Failed for {subject}: {error}", "✗".red()),
        }
    }
}

/// Final lines for a finished run.
pub fn print_outcome(outcome: &Outcome) {
    let Outcome::Completed(summary) = outcome else {
        return;
    };
    println!("\nOperation complete!");
    if summary.added != Default::default() {
        println!("Successfully added: {}", summary.added.succeeded);
        println!("Failed to add: {}", summary.added.failed);
    }
    if summary.removed != Default::default() {
        println!("Successfully removed: {}", summary.removed.succeeded);
        println!("Failed to remove: {}", summary.removed.failed);
    }
    if summary.succeeded() > 0 {
        println!("\n{} {} list changes applied.", "✓".green(), summary.succeeded());
    }
}
