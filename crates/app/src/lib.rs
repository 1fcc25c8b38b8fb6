#![deny(unsafe_code)]

/// Command dispatch for one CLI invocation.
pub mod app;
pub mod cli;
/// Subject ownership across the story and log channels.
pub mod controller;
pub mod error;
/// Terminal output.
pub mod render;
/// Settings persistence.
pub mod settings;

pub use cli::Cli;
pub use controller::{MovieController, MovieUpdate};
pub use error::{AppError, AppResult};
