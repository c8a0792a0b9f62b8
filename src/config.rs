// Run configuration. Values come from command-line flags or environment
// variables; `ui` prompts for whatever is still missing before `Config` is
// built, so construction here only validates.

use crate::auth::Credentials;
use crate::error::{Error, Result};
use crate::model::ListUri;

pub const DEFAULT_PDS_URL: &str = "https://bsky.social";

/// Environment variable holding the app password. It is never accepted as a
/// flag so it does not end up in shell history.
pub const APP_PASSWORD_ENV: &str = "BLUESKY_APP_PASSWORD";

/// Partially known settings, before prompting.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub pds_url: String,
    pub handle: Option<String>,
    pub password: Option<String>,
    pub list: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub pds_url: String,
    pub credentials: Credentials,
    pub list: ListUri,
}

fn required(value: Option<String>, what: &str) -> Result<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::Config(format!("{what} is required")))
}

impl TryFrom<Settings> for Config {
    type Error = Error;

    fn try_from(settings: Settings) -> Result<Self> {
        let handle = required(settings.handle, "handle")?;
        let password = required(settings.password, "app password")?;
        let list: ListUri = required(settings.list, "list URI")?.parse()?;
        let pds_url = required(Some(settings.pds_url), "PDS URL")?;
        Ok(Config {
            pds_url,
            credentials: Credentials::new(handle, password),
            list,
        })
    }
}
