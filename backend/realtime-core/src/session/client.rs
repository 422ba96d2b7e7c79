use crate::error::session::SessionError;

use common::RedactedToken;
use models::{ApiResponse, AuthResponse, LoginRequest, RefreshTokenRequest};

use std::time::Duration;

use log::{debug, info};
use reqwest::Client;
use serde::Serialize;
use url::Url;

const DEFAULT_TIMEOUT_DURATION: Duration = Duration::from_secs(30);
const AUTH_LOGIN_ENDPOINT: &str = "api/auth/login";
const AUTH_REFRESH_ENDPOINT: &str = "api/auth/refresh-token";
const AUTH_LOGOUT_ENDPOINT: &str = "api/auth/logout";

/// Client for the backend's `/api/auth/*` endpoints.
#[derive(Clone)]
pub struct AuthClient {
    base_url: Url,
    client: Client,
}

impl AuthClient {
    pub fn new(base_url_str: &str) -> Result<Self, SessionError> {
        let mut base_url = Url::parse(base_url_str)?;
        // Url::join drops the last segment of a base path without trailing slash.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT_DURATION)
            .build()?;

        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<AuthResponse, SessionError> {
        let body = LoginRequest { username, password };
        let response = self.post_auth(AUTH_LOGIN_ENDPOINT, &body).await?;
        info!("Logged in as '{username}'");
        Ok(response)
    }

    pub async fn refresh_token(
        &self,
        refresh_token: &RedactedToken,
    ) -> Result<AuthResponse, SessionError> {
        let body = RefreshTokenRequest::new(refresh_token);
        let response = self.post_auth(AUTH_REFRESH_ENDPOINT, &body).await?;
        info!("Access token refreshed");
        Ok(response)
    }

    pub async fn logout(&self, access_token: &RedactedToken) -> Result<(), SessionError> {
        let url = self.base_url.join(AUTH_LOGOUT_ENDPOINT)?;
        let response = self
            .client
            .post(url)
            .bearer_auth(access_token.expose())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SessionError::from_http_response(
                status.as_u16(),
                response.text().await.unwrap_or_default(),
            ));
        }

        info!("Logged out");
        Ok(())
    }

    async fn post_auth<B: Serialize>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<AuthResponse, SessionError> {
        let url = self.base_url.join(endpoint)?;
        debug!("POST {url}");

        let response = self.client.post(url).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SessionError::from_http_response(
                status.as_u16(),
                response.text().await.unwrap_or_default(),
            ));
        }

        let envelope: ApiResponse<AuthResponse> = response.json().await?;
        Ok(envelope.data)
    }
}
