use std::fmt;

/// Connection lifecycle of one stream session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No key is set.
    #[default]
    Idle,
    Connecting,
    /// The only state in which inbound frames are expected.
    Open,
    Closed,
    /// Waiting for the backoff timer before the next connect attempt.
    Reconnecting,
}

impl ConnectionState {
    pub fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Reconnecting => "reconnecting",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.label())
    }
}
