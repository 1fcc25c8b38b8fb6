use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StreamError {
    #[snafu(display("stream base URL '{raw}' is invalid"))]
    InvalidBaseUrl {
        stage: &'static str,
        raw: String,
        source: url::ParseError,
    },
    #[snafu(display("stream base URL '{raw}' cannot carry path segments"))]
    UnsupportedBaseUrl { stage: &'static str, raw: String },
    #[snafu(display("failed to connect stream at {url} on `{stage}`, {source}"))]
    Connect {
        stage: &'static str,
        url: String,
        source: tokio_tungstenite::tungstenite::Error,
    },
    #[snafu(display("stream receive failed on `{stage}`, {source}"))]
    Receive {
        stage: &'static str,
        source: tokio_tungstenite::tungstenite::Error,
    },
    #[snafu(display("stream transport refused {url}: {details}"))]
    Refused {
        stage: &'static str,
        url: String,
        details: String,
    },
}

pub type StreamResult<T> = Result<T, StreamError>;
