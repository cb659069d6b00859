//! Authentication state.
//!
//! A `Session` owns the backend client and knows who is logged in. Login
//! persists the session cookies; logout and any 401 drop them.

mod store;

pub use store::{SessionStore, StoredSession};

use anyhow::Result;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::api::{
    ApiError, ApiResult, BackendClient, LoginRequest, MessageResponse, SignupRequest,
};
use crate::models::Profile;

pub struct Session {
    client: BackendClient,
    store: SessionStore,
    user: Option<Profile>,
    loading: bool,
}

impl Session {
    /// Create a session, picking up cookies saved by an earlier run.
    pub fn new(client: BackendClient, store: SessionStore) -> Self {
        if let Some(saved) = store.load(client.server_url().as_str()) {
            debug!(username = ?saved.username, saved_at = %saved.saved_at, "Restoring session");
            client.restore_cookies(&saved.cookies);
        }

        Self {
            client,
            store,
            user: None,
            loading: true,
        }
    }

    pub fn client(&self) -> &BackendClient {
        &self.client
    }

    pub fn user(&self) -> Option<&Profile> {
        self.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Initial auth check: any failure means not logged in.
    pub async fn check_auth(&mut self) -> Option<&Profile> {
        match self.client.get_profile().await {
            Ok(profile) => self.user = Some(profile),
            Err(e) => {
                debug!(error = %e, "Auth check failed");
                if e.is_unauthorized() {
                    self.forget_stored();
                }
                self.user = None;
            }
        }
        self.loading = false;
        self.user.as_ref()
    }

    /// Re-fetch the profile. Only a 401 clears the user; other failures
    /// leave the current state alone.
    pub async fn refresh_profile(&mut self) {
        match self.client.get_profile().await {
            Ok(profile) => self.user = Some(profile),
            Err(e) => self.handle_error(&e),
        }
    }

    /// Log in, persist the new cookies, then refresh the profile.
    pub async fn login(&mut self, request: &LoginRequest) -> ApiResult<()> {
        self.client.login(request).await?;

        match self.client.session_cookies() {
            Some(cookies) => {
                let stored = StoredSession {
                    server_url: self.client.server_url().to_string(),
                    cookies,
                    username: Some(request.username.clone()),
                    saved_at: Utc::now(),
                };
                if let Err(e) = self.store.save(&stored) {
                    warn!(error = %e, "Session will not survive this run");
                }
            }
            None => warn!("Login succeeded but the backend set no session cookie"),
        }

        self.refresh_profile().await;
        self.loading = false;
        info!(username = %request.username, "Logged in");
        Ok(())
    }

    pub async fn signup(&self, request: &SignupRequest) -> ApiResult<MessageResponse> {
        self.client.signup(request).await
    }

    /// Forget the user and every credential, locally and on disk.
    pub fn logout(&mut self) -> Result<()> {
        self.user = None;
        self.client.clear_cookies()?;
        self.store.clear()?;
        info!("Logged out");
        Ok(())
    }

    /// React to a failed call: a 401 ends the session.
    pub fn handle_error(&mut self, error: &ApiError) {
        if error.is_unauthorized() {
            info!("Session expired");
            self.user = None;
            self.forget_stored();
        }
    }

    fn forget_stored(&mut self) {
        if let Err(e) = self.client.clear_cookies() {
            warn!(error = %e, "Failed to reset cookie jar");
        }
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to remove session file");
        }
    }
}
