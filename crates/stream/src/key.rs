use std::fmt;

/// Identity of one streaming subscription.
///
/// The primary id names the subject (a user), the optional secondary id narrows
/// it further (a request of that user). Ids are trimmed on construction so that
/// whitespace-only ids behave exactly like missing ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    primary: String,
    secondary: Option<String>,
}

impl SubscriptionKey {
    /// Builds a key for a primary subject id.
    pub fn new(primary: impl Into<String>) -> Self {
        Self {
            primary: primary.into().trim().to_string(),
            secondary: None,
        }
    }

    /// Builds a key from optional parts, as they arrive from upstream payloads.
    ///
    /// Returns `None` when the result would not be a valid key.
    pub fn from_parts(primary: Option<&str>, secondary: Option<&str>) -> Option<Self> {
        let key = Self::new(primary.unwrap_or_default());
        let key = match secondary {
            Some(secondary) => key.with_secondary(secondary),
            None => key,
        };
        key.into_valid()
    }

    pub fn with_secondary(mut self, secondary: impl Into<String>) -> Self {
        let secondary = secondary.into().trim().to_string();
        self.secondary = if secondary.is_empty() {
            None
        } else {
            Some(secondary)
        };
        self
    }

    pub fn primary(&self) -> &str {
        &self.primary
    }

    pub fn secondary(&self) -> Option<&str> {
        self.secondary.as_deref()
    }

    /// A key with an empty primary id means "no active subscription".
    pub fn is_valid(&self) -> bool {
        !self.primary.is_empty()
    }

    pub fn into_valid(self) -> Option<Self> {
        self.is_valid().then_some(self)
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.secondary {
            Some(secondary) => write!(formatter, "{}/{}", self.primary, secondary),
            None => write!(formatter, "{}", self.primary),
        }
    }
}

/// Token minted each time a session opens or closes.
///
/// Updates tagged with an older generation come from a superseded transport and
/// must be dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct StreamGeneration(pub u64);

impl StreamGeneration {
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for StreamGeneration {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "#{}", self.0)
    }
}
