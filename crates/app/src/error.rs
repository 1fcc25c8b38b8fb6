use reel_api::ApiError;
use reel_stream::StreamError;
use snafu::Snafu;

use crate::settings::SettingsError;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AppError {
    #[snafu(display("{source}"))]
    Settings {
        stage: &'static str,
        source: SettingsError,
    },
    #[snafu(display("{}", source.user_message()))]
    Api {
        stage: &'static str,
        source: ApiError,
    },
    #[snafu(display("stream endpoint is unusable on `{stage}`: {source}"))]
    Stream {
        stage: &'static str,
        source: StreamError,
    },
    #[snafu(display("the service accepted the job but sent no user id to follow"))]
    MissingSubject { stage: &'static str },
    #[snafu(display("'{user}' is not a usable user id"))]
    InvalidSubject { stage: &'static str, user: String },
    #[snafu(display("admin login required: pass --username with --password, or --token"))]
    LoginRequired { stage: &'static str },
    #[snafu(display("failed to write output on `{stage}`: {source}"))]
    Output {
        stage: &'static str,
        source: std::io::Error,
    },
    #[snafu(display("failed to listen for Ctrl-C on `{stage}`: {source}"))]
    Signal {
        stage: &'static str,
        source: std::io::Error,
    },
}

pub type AppResult<T> = Result<T, AppError>;
