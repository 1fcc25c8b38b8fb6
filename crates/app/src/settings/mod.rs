pub mod state;

pub use state::{ChannelSettings, Settings, SettingsError, SettingsStore};
