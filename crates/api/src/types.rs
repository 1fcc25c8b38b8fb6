use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use snafu::ensure;

use crate::error::{ApiResult, InvalidEmailSnafu, MissingTopicSnafu};

pub const DEFAULT_ACCEPTED_MESSAGE: &str = "Request submitted successfully.";

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email.trim())
}

/// Validated body of `POST /movie`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobRequest {
    email: String,
    topic: String,
}

impl JobRequest {
    pub fn new(email: &str, topic: &str) -> ApiResult<Self> {
        ensure!(is_valid_email(email), InvalidEmailSnafu { stage: "job-request" });
        ensure!(!topic.trim().is_empty(), MissingTopicSnafu { stage: "job-request" });
        Ok(Self {
            email: email.trim().to_string(),
            topic: topic.trim().to_string(),
        })
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

/// Successful submission: the ids to subscribe with, when the service sent them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobAccepted {
    pub message: String,
    pub user_id: Option<String>,
    pub request_id: Option<String>,
}

impl JobAccepted {
    pub(crate) fn from_body(body: &Map<String, Value>) -> Self {
        let message = body
            .get("message")
            .and_then(present_text)
            .unwrap_or_else(|| DEFAULT_ACCEPTED_MESSAGE.to_string());
        Self {
            message,
            user_id: first_id(body, &["user_id", "userId", "id"]),
            request_id: first_id(body, &["request_id", "requestId"]),
        }
    }
}

/// First key holding a usable id. Empty strings, zero and `null` count as absent.
fn first_id(body: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| body.get(*key).and_then(present_text))
}

pub(crate) fn present_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Number(number) if number.as_f64() != Some(0.0) => Some(number.to_string()),
        _ => None,
    }
}

/// Bearer token issued by `POST /admin/login`.
#[derive(Clone, PartialEq, Eq)]
pub struct AdminToken(String);

impl AdminToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AdminToken {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("AdminToken(..)")
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminOverview {
    #[serde(default, deserialize_with = "list_or_empty")]
    pub users: Vec<UserSummary>,
    #[serde(default, deserialize_with = "count_or_zero")]
    pub total_users: u64,
    #[serde(default, deserialize_with = "count_or_zero")]
    pub total_requests: u64,
    #[serde(default, deserialize_with = "count_or_zero")]
    pub unique_ip_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    #[serde(default, deserialize_with = "lenient_text")]
    pub user_id: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub email_address: String,
    #[serde(default, deserialize_with = "list_or_empty")]
    pub requests: Vec<RequestRecord>,
}

impl UserSummary {
    /// The service lists requests oldest first.
    pub fn requests_newest_first(&self) -> impl Iterator<Item = &RequestRecord> {
        self.requests.iter().rev()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRecord {
    #[serde(default, deserialize_with = "lenient_text")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub ip: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub topic: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub created_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BgStatus {
    #[serde(default, deserialize_with = "lenient_text")]
    pub bg_status: String,
    #[serde(default, deserialize_with = "list_or_empty")]
    pub logs: Vec<BgLogRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BgLogRecord {
    #[serde(default, deserialize_with = "lenient_text")]
    pub asctime: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub levelname: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub message: String,
}

impl BgLogRecord {
    pub fn is_error(&self) -> bool {
        self.levelname == "ERROR"
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(text) => text,
        other => other.to_string(),
    })
}

fn count_or_zero<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Value::deserialize(deserializer)?.as_u64().unwrap_or_default())
}

fn list_or_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn job_request_trims_and_validates() {
        let request = JobRequest::new("  ada@example.com ", "  neon city ").unwrap();
        assert_eq!(request.email(), "ada@example.com");
        assert_eq!(request.topic(), "neon city");

        let error = JobRequest::new("not-an-email", "topic").unwrap_err();
        assert_eq!(error.to_string(), "Please enter a valid email address.");
        let error = JobRequest::new("a@b.co", "   ").unwrap_err();
        assert_eq!(error.to_string(), "Please add a topic.");
        assert!(JobRequest::new("a b@c.de", "x").is_err());
    }

    #[test]
    fn accepted_ids_follow_key_precedence() {
        let body = json!({"userId": 9, "id": "ignored", "requestId": "r-1"});
        let accepted = JobAccepted::from_body(body.as_object().unwrap());
        assert_eq!(accepted.user_id.as_deref(), Some("9"));
        assert_eq!(accepted.request_id.as_deref(), Some("r-1"));
        assert_eq!(accepted.message, DEFAULT_ACCEPTED_MESSAGE);

        let body = json!({"user_id": "", "id": 12, "message": "queued"});
        let accepted = JobAccepted::from_body(body.as_object().unwrap());
        assert_eq!(accepted.user_id.as_deref(), Some("12"));
        assert_eq!(accepted.request_id, None);
        assert_eq!(accepted.message, "queued");
    }

    #[test]
    fn overview_defaults_missing_fields() {
        let overview: AdminOverview = serde_json::from_value(json!({
            "users": [{"user_id": 3, "email_address": "a@b.co", "requests": [
                {"id": 1, "ip": "10.0.0.1", "topic": "first", "created_at": "2024-01-01"},
                {"id": 2, "ip": "10.0.0.1", "topic": "second", "created_at": null}
            ]}],
            "total_users": null
        }))
        .unwrap();

        assert_eq!(overview.total_users, 0);
        assert_eq!(overview.total_requests, 0);
        let user = &overview.users[0];
        assert_eq!(user.user_id, "3");
        let topics = user
            .requests_newest_first()
            .map(|request| request.topic.as_str())
            .collect::<Vec<_>>();
        assert_eq!(topics, vec!["second", "first"]);
        assert_eq!(user.requests[1].created_at, "");

        let empty: AdminOverview = serde_json::from_value(json!({"users": null})).unwrap();
        assert_eq!(empty, AdminOverview::default());
    }

    #[test]
    fn bg_log_levels() {
        let status: BgStatus = serde_json::from_value(json!({
            "bg_status": "running",
            "logs": [
                {"asctime": "12:00", "levelname": "INFO", "message": "start"},
                {"asctime": "12:01", "levelname": "ERROR", "message": "boom"}
            ]
        }))
        .unwrap();
        assert_eq!(status.bg_status, "running");
        assert!(!status.logs[0].is_error());
        assert!(status.logs[1].is_error());
    }

    #[test]
    fn token_debug_is_redacted() {
        assert_eq!(format!("{:?}", AdminToken::new("secret")), "AdminToken(..)");
    }
}
