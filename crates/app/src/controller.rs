use std::sync::Arc;

use reel_api::{ApiClient, JobAccepted, JobRequest};
use reel_stream::{
    ConnectionState, ContentBuffers, ContentEvent, Endpoint, LiveChannel, LogChannel, LogLine,
    LogList, Route, SessionOptions, SessionUpdate, StoryChannel, StreamSession, SubscriptionKey,
    Transport, content_decoder, log_decoder,
};
use snafu::ResultExt;
use url::Url;

use crate::error::{ApiSnafu, AppResult, SettingsSnafu, StreamSnafu};
use crate::settings::Settings;

/// One update from either live channel, tagged with its origin.
#[derive(Debug, Clone, PartialEq)]
pub enum MovieUpdate {
    Story(SessionUpdate<ContentEvent>),
    Logs(SessionUpdate<LogLine>),
}

/// Owns the current subject and feeds it to the story and log channels.
///
/// The subject's primary id is the user, the secondary id the request; the story
/// channel only follows the user.
pub struct MovieController {
    story: StoryChannel,
    logs: LogChannel,
    subject: Option<SubscriptionKey>,
}

impl MovieController {
    pub fn new(
        stream_base: Url,
        story_options: SessionOptions,
        log_options: SessionOptions,
        transport: Arc<dyn Transport>,
    ) -> AppResult<Self> {
        let story_endpoint = Endpoint::new(stream_base.clone(), Route::Data)
            .context(StreamSnafu { stage: "story-endpoint" })?;
        let log_endpoint = Endpoint::new(stream_base, Route::Logs)
            .context(StreamSnafu { stage: "log-endpoint" })?;

        Ok(Self {
            story: LiveChannel::new(StreamSession::new(
                story_endpoint,
                story_options,
                transport.clone(),
                content_decoder(),
            )),
            logs: LiveChannel::new(StreamSession::new(
                log_endpoint,
                log_options,
                transport,
                log_decoder(),
            )),
            subject: None,
        })
    }

    pub fn from_settings(settings: &Settings, transport: Arc<dyn Transport>) -> AppResult<Self> {
        let stream_base = settings
            .stream_url()
            .context(SettingsSnafu { stage: "stream-base-url" })?;
        Self::new(
            stream_base,
            settings.story.session_options(),
            settings.logs.session_options(),
            transport,
        )
    }

    pub fn subject(&self) -> Option<&SubscriptionKey> {
        self.subject.as_ref()
    }

    pub fn story(&self) -> &ContentBuffers {
        self.story.content()
    }

    pub fn logs(&self) -> &LogList {
        self.logs.content()
    }

    pub fn story_state(&self) -> ConnectionState {
        self.story.state()
    }

    pub fn log_state(&self) -> ConnectionState {
        self.logs.state()
    }

    /// Points both channels at `subject`. Returns `false` when nothing changed.
    ///
    /// An absent or blank subject closes both channels and drops their content.
    pub async fn set_subject(&mut self, subject: Option<SubscriptionKey>) -> bool {
        let subject = subject.and_then(SubscriptionKey::into_valid);
        if subject == self.subject {
            return false;
        }

        match &subject {
            Some(subject) => tracing::info!(subject = %subject, "following subject"),
            None => tracing::info!("subject cleared"),
        }
        let story_key = subject
            .as_ref()
            .map(|subject| SubscriptionKey::new(subject.primary()));
        self.story.reconfigure(story_key).await;
        self.logs.reconfigure(subject.clone()).await;
        self.subject = subject;
        true
    }

    /// Submits a job and, when the service names the new subject, follows it.
    pub async fn submit(
        &mut self,
        client: &ApiClient,
        request: &JobRequest,
    ) -> AppResult<JobAccepted> {
        let accepted = client
            .submit_job(request)
            .await
            .context(ApiSnafu { stage: "submit-job" })?;

        match subject_for(&accepted) {
            Some(subject) => {
                self.set_subject(Some(subject)).await;
            }
            None => tracing::warn!("job accepted without a user id; nothing to follow"),
        }
        Ok(accepted)
    }

    /// Empties the story and script buffers. The connection is left alone.
    pub fn clear_story(&mut self) {
        self.story.clear();
    }

    /// Empties the log list; later entries keep counting from the last id.
    pub fn clear_logs(&mut self) {
        self.logs.clear();
    }

    /// Next update from whichever channel produces one first.
    ///
    /// Returns `None` once neither channel can produce anything more.
    pub async fn next_update(&mut self) -> Option<MovieUpdate> {
        tokio::select! {
            Some(update) = self.story.next_update() => Some(MovieUpdate::Story(update)),
            Some(update) = self.logs.next_update() => Some(MovieUpdate::Logs(update)),
            else => None,
        }
    }

    pub async fn shutdown(&mut self) {
        self.story.close().await;
        self.logs.close().await;
    }
}

pub fn subject_for(accepted: &JobAccepted) -> Option<SubscriptionKey> {
    SubscriptionKey::from_parts(accepted.user_id.as_deref(), accepted.request_id.as_deref())
}
