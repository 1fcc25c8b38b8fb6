use std::io::{self, Write};

use owo_colors::OwoColorize;
use reel_api::{AdminOverview, BgStatus, JobAccepted};
use reel_stream::{ConnectionState, ContentEvent, LogEntry, LogLevel, SessionUpdate};

use crate::controller::{MovieController, MovieUpdate};
use crate::settings::Settings;

/// Writes what the controller and the admin endpoints produce to a terminal.
pub struct Renderer<W: Write> {
    out: W,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn accepted(&mut self, accepted: &JobAccepted) -> io::Result<()> {
        writeln!(self.out, "{} {}", "✓".green().bold(), accepted.message)?;
        if let Some(user_id) = &accepted.user_id {
            write!(self.out, "  user {}", user_id.bold())?;
            if let Some(request_id) = &accepted.request_id {
                write!(self.out, "  request {}", request_id.bold())?;
            }
            writeln!(self.out)?;
        }
        Ok(())
    }

    /// Renders one update; log events are rendered from the controller's list so
    /// they carry their sequence id and arrival time.
    pub fn update(&mut self, update: &MovieUpdate, controller: &MovieController) -> io::Result<()> {
        match update {
            MovieUpdate::Story(SessionUpdate::State(state)) => self.state("story", *state),
            MovieUpdate::Logs(SessionUpdate::State(state)) => self.state("logs", *state),
            MovieUpdate::Story(SessionUpdate::Event(event)) => self.fragment(event),
            MovieUpdate::Logs(SessionUpdate::Event(_)) => match controller.logs().last() {
                Some(entry) => self.log_entry(entry),
                None => Ok(()),
            },
        }
    }

    fn state(&mut self, channel: &str, state: ConnectionState) -> io::Result<()> {
        let label = match state {
            ConnectionState::Open => state.label().green().to_string(),
            ConnectionState::Connecting | ConnectionState::Reconnecting => {
                state.label().yellow().to_string()
            }
            ConnectionState::Closed => state.label().red().to_string(),
            ConnectionState::Idle => state.label().dimmed().to_string(),
        };
        writeln!(self.out, "{} {channel} {label}", "•".dimmed())
    }

    fn fragment(&mut self, event: &ContentEvent) -> io::Result<()> {
        match event {
            ContentEvent::StoryFragment(text) => {
                writeln!(self.out, "{}", "story".magenta().bold())?;
                writeln!(self.out, "{text}")?;
            }
            ContentEvent::ScriptFragment(text) => {
                writeln!(self.out, "{}", "script".cyan().bold())?;
                writeln!(self.out, "{text}")?;
            }
        }
        writeln!(self.out)
    }

    pub fn log_entry(&mut self, entry: &LogEntry) -> io::Result<()> {
        let time = entry.received_at.format("%H:%M:%S").to_string();
        let text = match entry.level {
            LogLevel::Success => entry.text.green().to_string(),
            LogLevel::Error => entry.text.red().to_string(),
            LogLevel::Info => entry.text.blue().to_string(),
        };
        writeln!(
            self.out,
            "{} {} {text}",
            format!("#{:<4}", entry.sequence_id).dimmed(),
            time.dimmed()
        )
    }

    pub fn overview(&mut self, overview: &AdminOverview) -> io::Result<()> {
        writeln!(
            self.out,
            "{} users  {} requests  {} unique IPs",
            overview.total_users.bold(),
            overview.total_requests.bold(),
            overview.unique_ip_count.bold()
        )?;

        for user in &overview.users {
            writeln!(self.out)?;
            writeln!(
                self.out,
                "{} {}  {}",
                "user".dimmed(),
                user.user_id.bold(),
                user.email_address
            )?;
            if user.requests.is_empty() {
                writeln!(self.out, "  {}", "no requests".dimmed())?;
            }
            for request in user.requests_newest_first() {
                writeln!(
                    self.out,
                    "  {:<8} {:<16} {:<20} {}",
                    request.id,
                    request.ip,
                    request.created_at.dimmed(),
                    request.topic
                )?;
            }
        }
        Ok(())
    }

    pub fn bg_status(&mut self, status: &BgStatus) -> io::Result<()> {
        let bg_status = if status.bg_status.is_empty() {
            "unknown".dimmed().to_string()
        } else {
            status.bg_status.bold().to_string()
        };
        writeln!(self.out, "status {bg_status}")?;

        for log in &status.logs {
            let level = if log.is_error() {
                log.levelname.red().to_string()
            } else {
                log.levelname.blue().to_string()
            };
            writeln!(self.out, "  {}  {level:<7}  {}", log.asctime.dimmed(), log.message)?;
        }
        Ok(())
    }

    pub fn settings(&mut self, settings: &Settings, path: &std::path::Path) -> io::Result<()> {
        writeln!(self.out, "{} {}", "#".dimmed(), path.display().dimmed())?;
        let json = serde_json::to_string_pretty(settings).map_err(io::Error::other)?;
        writeln!(self.out, "{json}")
    }

    pub fn notice(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.out, "{} {message}", "•".dimmed())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use reel_api::{RequestRecord, UserSummary};

    use super::*;

    fn rendered(render: impl FnOnce(&mut Renderer<Vec<u8>>) -> io::Result<()>) -> String {
        let mut renderer = Renderer::new(Vec::new());
        render(&mut renderer).unwrap();
        String::from_utf8(renderer.into_inner()).unwrap()
    }

    #[test]
    fn overview_lists_requests_newest_first() {
        let overview = AdminOverview {
            users: vec![UserSummary {
                user_id: "7".to_string(),
                email_address: "ada@example.com".to_string(),
                requests: vec![
                    RequestRecord {
                        id: "1".to_string(),
                        topic: "older topic".to_string(),
                        ..RequestRecord::default()
                    },
                    RequestRecord {
                        id: "2".to_string(),
                        topic: "newer topic".to_string(),
                        ..RequestRecord::default()
                    },
                ],
            }],
            total_users: 1,
            total_requests: 2,
            unique_ip_count: 1,
        };

        let output = rendered(|renderer| renderer.overview(&overview));
        assert!(output.contains("ada@example.com"));
        let newer = output.find("newer topic").unwrap();
        let older = output.find("older topic").unwrap();
        assert!(newer < older);
    }

    #[test]
    fn log_entries_show_sequence_and_text() {
        let entry = LogEntry {
            sequence_id: 3,
            text: "render started".to_string(),
            received_at: Utc::now(),
            level: LogLevel::Success,
        };
        let output = rendered(|renderer| renderer.log_entry(&entry));
        assert!(output.contains("#3"));
        assert!(output.contains("render started"));
    }

    #[test]
    fn accepted_job_shows_ids() {
        let accepted = JobAccepted {
            message: "Request submitted successfully.".to_string(),
            user_id: Some("7".to_string()),
            request_id: Some("100".to_string()),
        };
        let output = rendered(|renderer| renderer.accepted(&accepted));
        assert!(output.contains("Request submitted successfully."));
        assert!(output.contains("7"));
        assert!(output.contains("100"));
    }

    #[test]
    fn empty_bg_status_reads_unknown() {
        let output = rendered(|renderer| renderer.bg_status(&BgStatus::default()));
        assert!(output.contains("unknown"));
    }
}
