use snafu::{ResultExt, ensure};
use url::Url;

use crate::error::{InvalidBaseUrlSnafu, StreamResult, UnsupportedBaseUrlSnafu};
use crate::key::SubscriptionKey;

/// Which streaming route of the service a session subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// `{base}/data/{user}`: story and script fragments.
    Data,
    /// `{base}/logs/{user}/{request}`: status log lines.
    Logs,
}

impl Route {
    pub fn segment(self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::Logs => "logs",
        }
    }
}

/// Resolves subscription keys to stream URLs for one route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base: Url,
    route: Route,
}

impl Endpoint {
    pub fn new(base: Url, route: Route) -> StreamResult<Self> {
        ensure!(
            !base.cannot_be_a_base(),
            UnsupportedBaseUrlSnafu {
                stage: "endpoint-new",
                raw: base.to_string(),
            }
        );
        Ok(Self { base, route })
    }

    pub fn parse(raw: &str, route: Route) -> StreamResult<Self> {
        let base = Url::parse(raw.trim()).context(InvalidBaseUrlSnafu {
            stage: "endpoint-parse",
            raw: raw.to_string(),
        })?;
        Self::new(base, route)
    }

    pub fn route(&self) -> Route {
        self.route
    }

    /// URL for `key`, or `None` when the key cannot address this route.
    ///
    /// The log route needs both ids; a key without a request id has no log stream.
    pub fn url_for(&self, key: &SubscriptionKey) -> Option<Url> {
        if !key.is_valid() {
            return None;
        }

        let mut segments = vec![self.route.segment(), key.primary()];
        match (self.route, key.secondary()) {
            (Route::Data, _) => {}
            (Route::Logs, Some(secondary)) => segments.push(secondary),
            (Route::Logs, None) => return None,
        }

        let mut url = self.base.clone();
        // `cannot_be_a_base` was rejected in `new`, so segments are always available.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        Some(url)
    }
}
