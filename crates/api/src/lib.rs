//! REST collaborators of the movie service: job submission and admin queries.

pub mod admin;
pub mod client;
pub mod error;
pub mod types;

pub use admin::{AdminCredentials, AdminSession};
pub use client::ApiClient;
pub use error::{ApiError, ApiResult};
pub use types::{
    AdminOverview, AdminToken, BgLogRecord, BgStatus, JobAccepted, JobRequest, RequestRecord,
    UserSummary,
};
