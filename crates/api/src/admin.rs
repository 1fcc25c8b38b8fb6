use std::fmt;

use crate::client::ApiClient;
use crate::error::{ApiResult, LoginRequiredSnafu};
use crate::types::{AdminOverview, AdminToken, BgStatus};

#[derive(Clone, PartialEq, Eq)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

impl AdminCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for AdminCredentials {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AdminCredentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Authenticated admin access.
///
/// A refused token is discarded; with credentials configured the session logs in
/// again once and retries, otherwise the caller gets `LoginRequired`. A token
/// issued during the same call is never renewed; its refusal is returned as is.
#[derive(Debug, Clone)]
pub struct AdminSession {
    client: ApiClient,
    token: Option<AdminToken>,
    credentials: Option<AdminCredentials>,
}

impl AdminSession {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            token: None,
            credentials: None,
        }
    }

    pub fn with_token(mut self, token: Option<AdminToken>) -> Self {
        self.token = token;
        self
    }

    pub fn with_credentials(mut self, credentials: Option<AdminCredentials>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn token(&self) -> Option<&AdminToken> {
        self.token.as_ref()
    }

    pub async fn overview(&mut self) -> ApiResult<AdminOverview> {
        let (token, issued) = self.acquire_token().await?;
        match self.client.admin_overview(&token).await {
            Err(error) if error.needs_login() && issued => {
                self.token = None;
                Err(error)
            }
            Err(error) if error.needs_login() => {
                let token = self.renew_token().await?;
                self.client.admin_overview(&token).await
            }
            result => result,
        }
    }

    pub async fn bg_status(&mut self, user_id: &str, request_id: &str) -> ApiResult<BgStatus> {
        let (token, issued) = self.acquire_token().await?;
        match self.client.bg_status(&token, user_id, request_id).await {
            Err(error) if error.needs_login() && issued => {
                self.token = None;
                Err(error)
            }
            Err(error) if error.needs_login() => {
                let token = self.renew_token().await?;
                self.client.bg_status(&token, user_id, request_id).await
            }
            result => result,
        }
    }

    /// The stored token, or a fresh one from the credentials. The flag is set
    /// when the token was issued by this call.
    async fn acquire_token(&mut self) -> ApiResult<(AdminToken, bool)> {
        if let Some(token) = &self.token {
            return Ok((token.clone(), false));
        }
        let Some(credentials) = &self.credentials else {
            return LoginRequiredSnafu {
                stage: "admin-token",
            }
            .fail();
        };

        let token = self
            .client
            .login(&credentials.username, &credentials.password)
            .await?;
        self.token = Some(token.clone());
        Ok((token, true))
    }

    async fn renew_token(&mut self) -> ApiResult<AdminToken> {
        tracing::info!("admin token refused; logging in again");
        self.token = None;
        let (token, _) = self.acquire_token().await?;
        Ok(token)
    }
}
