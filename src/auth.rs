// Authenticated session holder. One value lives for the whole run; a refresh
// swaps in a new `Session` so every later call uses the new tokens.

use crate::api::ListService;
use crate::error::{Error, Result};
use crate::model::Session;
use std::fmt;
use tracing::{info, warn};

/// Login identifier (handle or DID) and app password.
#[derive(Clone)]
pub struct Credentials {
    pub identifier: String,
    pub password: String,
}

impl Credentials {
    pub fn new(identifier: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials {
            identifier: identifier.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug)]
pub struct AuthSession {
    credentials: Credentials,
    session: Session,
}

impl AuthSession {
    /// Create a session with the given credentials.
    pub fn login<S: ListService>(service: &S, credentials: Credentials) -> Result<Self> {
        let session = service
            .create_session(&credentials.identifier, &credentials.password)
            .map_err(Error::Auth)?;
        info!(did = %session.did, "authenticated");
        Ok(AuthSession {
            credentials,
            session,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn did(&self) -> &str {
        &self.session.did
    }

    /// Replace the held session: use the refresh token first, and fall back
    /// to a full login if the refresh is rejected.
    pub fn refresh<S: ListService>(&mut self, service: &S) -> Result<()> {
        let fresh = match service.refresh_session(&self.session) {
            Ok(session) => session,
            Err(err) => {
                warn!(error = %err, "session refresh failed, logging in again");
                service
                    .create_session(&self.credentials.identifier, &self.credentials.password)
                    .map_err(Error::Auth)?
            }
        };
        info!(did = %fresh.did, "session refreshed");
        self.session = fresh;
        Ok(())
    }
}
