//! Trading backend client: auth, profile, balance, and trade operations.
//!
//! All authenticated calls ride on the session cookie the backend sets on
//! login. The cookie jar can be exported and restored so a session
//! survives across process runs.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::error::{ApiError, ApiResult, DEFAULT_ERROR_MESSAGE};
use super::types::*;
use crate::models::{Asset, Profile, Trade};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the trading backend REST API (`<server>/api/v1`).
pub struct BackendClient {
    client: Client,
    jar: Arc<Jar>,
    server_url: Url,
    api_base: Url,
}

impl BackendClient {
    /// Create a client for the backend at `server_url` with an empty session.
    pub fn new(server_url: &str) -> Result<Self> {
        let mut server_url = Url::parse(server_url).context("Invalid backend server URL")?;
        if !server_url.path().ends_with('/') {
            let path = format!("{}/", server_url.path());
            server_url.set_path(&path);
        }
        let api_base = server_url
            .join("api/v1/")
            .context("Invalid backend API base")?;
        let jar = Arc::new(Jar::default());
        let client = build_client(jar.clone())?;

        Ok(Self {
            client,
            jar,
            server_url,
            api_base,
        })
    }

    pub fn server_url(&self) -> &Url {
        &self.server_url
    }

    /// Cookie header currently held for the API, if any.
    pub fn session_cookies(&self) -> Option<String> {
        self.jar
            .cookies(&self.api_base)
            .and_then(|value| value.to_str().ok().map(str::to_string))
            .filter(|value| !value.is_empty())
    }

    /// Load a previously exported cookie header into the jar.
    pub fn restore_cookies(&self, header: &str) {
        for pair in header.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            self.jar
                .add_cookie_str(&format!("{}; Path=/", pair), &self.api_base);
        }
    }

    /// Drop every cookie by swapping in a fresh jar.
    pub fn clear_cookies(&mut self) -> Result<()> {
        self.jar = Arc::new(Jar::default());
        self.client = build_client(self.jar.clone())?;
        Ok(())
    }

    fn endpoint(&self, path: &str) -> ApiResult<Url> {
        self.api_base
            .join(path)
            .map_err(|e| ApiError::Decode(format!("bad endpoint {}: {}", path, e)))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let url = self.endpoint(path)?;
        debug!(url = %url, "GET");
        let response = self.client.get(url).send().await?;
        handle_response(response).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> ApiResult<T> {
        let url = self.endpoint(path)?;
        debug!(url = %url, "POST");
        let response = self.client.post(url).json(body).send().await?;
        handle_response(response).await
    }

    pub async fn signup(&self, request: &SignupRequest) -> ApiResult<MessageResponse> {
        self.post("signup", request).await
    }

    /// Log in; on success the backend's session cookie lands in the jar.
    pub async fn login(&self, request: &LoginRequest) -> ApiResult<MessageResponse> {
        self.post("login", request).await
    }

    pub async fn get_profile(&self) -> ApiResult<Profile> {
        let response: ProfileResponse = self.get("profile").await?;
        Ok(response.profile)
    }

    pub async fn get_balance(&self) -> ApiResult<BalanceResponse> {
        self.get("balance").await
    }

    pub async fn get_active_trades(&self) -> ApiResult<Vec<Trade>> {
        let response: TradesResponse = self.get("trade/active-trades").await?;
        Ok(response.message)
    }

    pub async fn get_all_trades(&self) -> ApiResult<Vec<Trade>> {
        let response: TradesResponse = self.get("trade/trades").await?;
        Ok(response.message)
    }

    pub async fn create_trade(&self, request: &CreateTradeRequest) -> ApiResult<MessageResponse> {
        self.post("trade/create", request).await
    }

    pub async fn liquidate_trade(&self, request: &LiquidateRequest) -> ApiResult<MessageResponse> {
        self.post("trade/liquidate-asset", request).await
    }

    /// Public listing; works without a session.
    pub async fn get_supported_assets(&self) -> ApiResult<Vec<Asset>> {
        let response: SupportedAssetsResponse = self.get("supportedAssets").await?;
        Ok(response.assets)
    }

    /// Ping the backend root.
    pub async fn health_check(&self) -> ApiResult<MessageResponse> {
        debug!(url = %self.server_url, "Health check");
        let response = self.client.get(self.server_url.clone()).send().await?;
        handle_response(response).await
    }
}

fn build_client(jar: Arc<Jar>) -> Result<Client> {
    Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .cookie_provider(jar)
        .build()
        .context("Failed to create HTTP client")
}

/// Decode a backend response, turning non-success statuses into
/// `ApiError::Http` with the body's `message`.
async fn handle_response<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
    let status = response.status();
    let body = response.bytes().await?;

    if !status.is_success() {
        let message = serde_json::from_slice::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string());
        return Err(ApiError::Http { status, message });
    }

    serde_json::from_slice(&body).map_err(|e| ApiError::Decode(e.to_string()))
}
