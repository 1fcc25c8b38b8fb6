use snafu::Snafu;

pub(crate) const NETWORK_ERROR: &str = "Network error.";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ApiError {
    #[snafu(display("Please enter a valid email address."))]
    InvalidEmail { stage: &'static str },
    #[snafu(display("Please add a topic."))]
    MissingTopic { stage: &'static str },
    #[snafu(display("API base URL '{raw}' is invalid"))]
    InvalidBaseUrl {
        stage: &'static str,
        raw: String,
        source: url::ParseError,
    },
    #[snafu(display("API base URL '{raw}' cannot carry path segments"))]
    UnsupportedBaseUrl { stage: &'static str, raw: String },
    #[snafu(display("request to {url} failed on `{stage}`, {source}"))]
    Request {
        stage: &'static str,
        url: String,
        source: reqwest::Error,
    },
    #[snafu(display("{message}"))]
    Rejected {
        stage: &'static str,
        status: u16,
        message: String,
    },
    #[snafu(display("Invalid credentials"))]
    InvalidCredentials { stage: &'static str },
    #[snafu(display("No token received"))]
    MissingToken { stage: &'static str },
    #[snafu(display("admin request was refused with status {status}"))]
    Unauthorized { stage: &'static str, status: u16 },
    #[snafu(display("admin login required"))]
    LoginRequired { stage: &'static str },
    #[snafu(display("unexpected response body on `{stage}`, {source}"))]
    Decode {
        stage: &'static str,
        source: serde_json::Error,
    },
}

impl ApiError {
    /// 401/403 from an authenticated endpoint, or no token to send at all.
    pub fn needs_login(&self) -> bool {
        matches!(self, Self::Unauthorized { .. } | Self::LoginRequired { .. })
    }

    /// Message suitable for showing to the person who triggered the request.
    pub fn user_message(&self) -> String {
        match self {
            Self::Request { source, .. } => {
                let text = source.to_string();
                if text.trim().is_empty() {
                    NETWORK_ERROR.to_string()
                } else {
                    text
                }
            }
            other => other.to_string(),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
