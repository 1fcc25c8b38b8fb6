use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use snafu::{ResultExt, ensure};
use url::Url;

use crate::error::{
    ApiResult, DecodeSnafu, InvalidBaseUrlSnafu, InvalidCredentialsSnafu,
    MissingTokenSnafu, RejectedSnafu, RequestSnafu, UnauthorizedSnafu, UnsupportedBaseUrlSnafu,
};
use crate::types::{
    AdminOverview, AdminToken, BgStatus, JobAccepted, JobRequest, LoginRequest, present_text,
};

/// Thin client for the movie service's REST endpoints.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base: Url,
}

impl ApiClient {
    pub fn new(base: Url) -> ApiResult<Self> {
        Self::with_http(Client::new(), base)
    }

    pub fn with_http(http: Client, base: Url) -> ApiResult<Self> {
        ensure!(
            !base.cannot_be_a_base(),
            UnsupportedBaseUrlSnafu {
                stage: "api-client-new",
                raw: base.to_string(),
            }
        );
        Ok(Self { http, base })
    }

    pub fn parse(raw: &str) -> ApiResult<Self> {
        let base = Url::parse(raw.trim()).context(InvalidBaseUrlSnafu {
            stage: "api-client-parse",
            raw: raw.to_string(),
        })?;
        Self::new(base)
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// `POST /movie`.
    pub async fn submit_job(&self, request: &JobRequest) -> ApiResult<JobAccepted> {
        let url = self.url(&["movie"]);
        tracing::info!(url = %url, topic = request.topic(), "submitting movie job");
        let response = self
            .http
            .post(url.clone())
            .json(request)
            .send()
            .await
            .context(RequestSnafu {
                stage: "submit-job",
                url: url.to_string(),
            })?;
        let (status, body) = read_body(response, "submit-job", &url).await?;
        interpret_submission(status, &body)
    }

    /// `POST /admin/login`.
    pub async fn login(&self, username: &str, password: &str) -> ApiResult<AdminToken> {
        let url = self.url(&["admin", "login"]);
        tracing::info!(url = %url, username, "logging in as admin");
        let response = self
            .http
            .post(url.clone())
            .json(&LoginRequest { username, password })
            .send()
            .await
            .context(RequestSnafu {
                stage: "admin-login",
                url: url.to_string(),
            })?;
        let (status, body) = read_body(response, "admin-login", &url).await?;
        interpret_login(status, &body)
    }

    /// `GET /admin`.
    pub async fn admin_overview(&self, token: &AdminToken) -> ApiResult<AdminOverview> {
        let url = self.url(&["admin"]);
        self.get_authorized(url, token, "admin-overview", "admin data")
            .await
    }

    /// `GET /bgstatus/{user_id}/{request_id}`.
    pub async fn bg_status(
        &self,
        token: &AdminToken,
        user_id: &str,
        request_id: &str,
    ) -> ApiResult<BgStatus> {
        let url = self.url(&["bgstatus", user_id, request_id]);
        self.get_authorized(url, token, "bg-status", "BG status")
            .await
    }

    async fn get_authorized<T: DeserializeOwned>(
        &self,
        url: Url,
        token: &AdminToken,
        stage: &'static str,
        what: &'static str,
    ) -> ApiResult<T> {
        tracing::debug!(url = %url, stage, "fetching admin resource");
        let response = self
            .http
            .get(url.clone())
            .bearer_auth(token.as_str())
            .send()
            .await
            .context(RequestSnafu {
                stage,
                url: url.to_string(),
            })?;
        let (status, body) = read_body(response, stage, &url).await?;
        interpret_authorized(status, &body, stage, what)
    }
}

async fn read_body(
    response: reqwest::Response,
    stage: &'static str,
    url: &Url,
) -> ApiResult<(StatusCode, String)> {
    let status = response.status();
    let body = response.text().await.context(RequestSnafu {
        stage,
        url: url.to_string(),
    })?;
    Ok((status, body))
}

/// Outcome of `POST /movie` given its status and raw body.
pub fn interpret_submission(status: StatusCode, body: &str) -> ApiResult<JobAccepted> {
    let parsed = serde_json::from_str::<Value>(body).ok();
    let object = parsed.as_ref().and_then(Value::as_object);

    if !status.is_success() {
        let message = object
            .and_then(|object| object.get("message"))
            .and_then(present_text)
            .unwrap_or_else(|| format!("Request failed with status code {}", status.as_u16()));
        return RejectedSnafu {
            stage: "submit-job",
            status: status.as_u16(),
            message,
        }
        .fail();
    }

    let empty = Map::new();
    Ok(JobAccepted::from_body(object.unwrap_or(&empty)))
}

/// Outcome of `POST /admin/login` given its status and raw body.
pub fn interpret_login(status: StatusCode, body: &str) -> ApiResult<AdminToken> {
    ensure!(
        status.is_success(),
        InvalidCredentialsSnafu {
            stage: "admin-login"
        }
    );
    let body: Value = serde_json::from_str(body).context(DecodeSnafu {
        stage: "admin-login",
    })?;
    match body.get("access_token").and_then(Value::as_str) {
        Some(token) if !token.is_empty() => Ok(AdminToken::new(token)),
        _ => MissingTokenSnafu {
            stage: "admin-login",
        }
        .fail(),
    }
}

/// Outcome of an authenticated `GET` given its status and raw body.
pub fn interpret_authorized<T: DeserializeOwned>(
    status: StatusCode,
    body: &str,
    stage: &'static str,
    what: &'static str,
) -> ApiResult<T> {
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        return UnauthorizedSnafu {
            stage,
            status: status.as_u16(),
        }
        .fail();
    }
    if !status.is_success() {
        return RejectedSnafu {
            stage,
            status: status.as_u16(),
            message: format!("Failed to fetch {what}"),
        }
        .fail();
    }
    serde_json::from_str(body).context(DecodeSnafu { stage })
}
