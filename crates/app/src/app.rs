use std::io::{BufRead, Write};
use std::sync::Arc;

use reel_api::{AdminCredentials, AdminSession, AdminToken, ApiClient, ApiError, JobRequest};
use reel_stream::{SubscriptionKey, WebSocketTransport};
use snafu::{OptionExt, ResultExt};
use tokio::sync::mpsc;

use crate::cli::{AdminAuth, AdminCommand, Cli, Command, ConfigCommand};
use crate::controller::MovieController;
use crate::error::{
    ApiSnafu, AppError, AppResult, InvalidSubjectSnafu, LoginRequiredSnafu, MissingSubjectSnafu,
    OutputSnafu, SettingsSnafu, SignalSnafu,
};
use crate::render::Renderer;
use crate::settings::{Settings, SettingsStore};

/// Runs one CLI invocation against the effective settings.
pub async fn run<W: Write>(cli: Cli, store: SettingsStore, out: W) -> AppResult<()> {
    let settings = effective_settings(&store, cli.base_url.as_deref());
    let mut renderer = Renderer::new(out);

    match cli.command {
        Command::Watch { email, topic } => {
            let request = JobRequest::new(&email, &topic).context(ApiSnafu {
                stage: "validate-job",
            })?;
            let client = api_client(&settings)?;
            let mut controller =
                MovieController::from_settings(&settings, Arc::new(WebSocketTransport))?;

            let accepted = controller.submit(&client, &request).await?;
            renderer.accepted(&accepted).context(OutputSnafu {
                stage: "render-accepted",
            })?;
            if controller.subject().is_none() {
                return MissingSubjectSnafu { stage: "watch" }.fail();
            }
            follow(&mut controller, &mut renderer).await
        }
        Command::Attach { user, request } => {
            let subject = SubscriptionKey::from_parts(Some(&user), request.as_deref())
                .context(InvalidSubjectSnafu {
                    stage: "attach",
                    user: user.clone(),
                })?;
            let mut controller =
                MovieController::from_settings(&settings, Arc::new(WebSocketTransport))?;
            controller.set_subject(Some(subject)).await;
            follow(&mut controller, &mut renderer).await
        }
        Command::Admin { auth, command } => {
            let mut session = admin_session(&settings, auth)?;
            match command {
                AdminCommand::Overview => {
                    let overview = session.overview().await.map_err(login_hint)?;
                    renderer.overview(&overview).context(OutputSnafu {
                        stage: "render-overview",
                    })
                }
                AdminCommand::Status { user, request } => {
                    let status = session
                        .bg_status(&user, &request)
                        .await
                        .map_err(login_hint)?;
                    renderer.bg_status(&status).context(OutputSnafu {
                        stage: "render-bg-status",
                    })
                }
            }
        }
        Command::Config { command } => match command {
            ConfigCommand::Show => renderer
                .settings(&settings, store.config_path())
                .context(OutputSnafu {
                    stage: "render-settings",
                }),
            ConfigCommand::Init { force } => {
                if store.config_path().exists() && !force {
                    return renderer
                        .notice(&format!(
                            "{} already exists; pass --force to overwrite",
                            store.config_path().display()
                        ))
                        .context(OutputSnafu {
                            stage: "render-notice",
                        });
                }
                store.update(settings).context(SettingsSnafu {
                    stage: "init-settings",
                })?;
                renderer
                    .notice(&format!("wrote {}", store.config_path().display()))
                    .context(OutputSnafu {
                        stage: "render-notice",
                    })
            }
        },
    }
}

fn effective_settings(store: &SettingsStore, base_url: Option<&str>) -> Settings {
    let mut settings = (*store.settings()).clone();
    if let Some(base_url) = base_url {
        settings.api_base_url = base_url.to_string();
    }
    settings.normalized()
}

fn api_client(settings: &Settings) -> AppResult<ApiClient> {
    let base = settings.api_url().context(SettingsSnafu {
        stage: "api-base-url",
    })?;
    ApiClient::new(base).context(ApiSnafu {
        stage: "api-client",
    })
}

fn admin_session(settings: &Settings, auth: AdminAuth) -> AppResult<AdminSession> {
    let username = auth.username.or_else(|| settings.admin_username.clone());
    let credentials = match (username, auth.password) {
        (Some(username), Some(password)) => Some(AdminCredentials::new(username, password)),
        _ => None,
    };
    Ok(AdminSession::new(api_client(settings)?)
        .with_token(auth.token.map(AdminToken::new))
        .with_credentials(credentials))
}

fn login_hint(error: ApiError) -> AppError {
    match error {
        ApiError::LoginRequired { .. } => AppError::LoginRequired { stage: "admin" },
        source => AppError::Api {
            stage: "admin",
            source,
        },
    }
}

/// A line typed while following.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FollowCommand {
    Clear,
    ClearStory,
    ClearLogs,
}

impl FollowCommand {
    fn parse(line: &str) -> Option<Self> {
        let words = line.split_whitespace().collect::<Vec<_>>();
        match words.as_slice() {
            ["clear"] => Some(Self::Clear),
            ["clear", "story" | "script"] => Some(Self::ClearStory),
            ["clear", "logs"] => Some(Self::ClearLogs),
            _ => None,
        }
    }

    fn apply(self, controller: &mut MovieController) -> &'static str {
        match self {
            Self::Clear => {
                controller.clear_story();
                controller.clear_logs();
                "cleared story, script and logs"
            }
            Self::ClearStory => {
                controller.clear_story();
                "cleared story and script"
            }
            Self::ClearLogs => {
                controller.clear_logs();
                "cleared logs"
            }
        }
    }
}

/// Forwards stdin lines from a plain thread; a blocking read there cannot hold
/// up runtime shutdown.
fn stdin_lines() -> mpsc::UnboundedReceiver<String> {
    let (lines_tx, lines_rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if lines_tx.send(line).is_err() {
                break;
            }
        }
    });
    lines_rx
}

/// Streams controller updates to the renderer until Ctrl-C or until both
/// channels have stopped for good. `clear`, `clear story` and `clear logs` on
/// stdin empty the accumulated content without touching the connections.
async fn follow<W: Write>(
    controller: &mut MovieController,
    renderer: &mut Renderer<W>,
) -> AppResult<()> {
    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);
    let mut commands = stdin_lines();
    let mut reading = true;

    loop {
        tokio::select! {
            signal = &mut interrupted => {
                signal.context(SignalSnafu { stage: "follow" })?;
                tracing::info!("interrupted; closing streams");
                break;
            }
            line = commands.recv(), if reading => {
                let Some(line) = line else {
                    reading = false;
                    continue;
                };
                let notice = match FollowCommand::parse(&line) {
                    Some(command) => command.apply(controller),
                    None if line.trim().is_empty() => continue,
                    None => "unknown command; try `clear`, `clear story` or `clear logs`",
                };
                renderer.notice(notice).context(OutputSnafu {
                    stage: "render-notice",
                })?;
            }
            update = controller.next_update() => {
                let Some(update) = update else {
                    tracing::info!("no stream left to follow");
                    break;
                };
                renderer.update(&update, controller).context(OutputSnafu {
                    stage: "render-update",
                })?;
            }
        }
    }

    controller.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(directory: &tempfile::TempDir) -> SettingsStore {
        SettingsStore::without_env(directory.path().join("settings.json"))
    }

    async fn run_to_string(cli: Cli, store: SettingsStore) -> AppResult<String> {
        let mut out = Vec::new();
        run(cli, store, &mut out).await?;
        Ok(String::from_utf8(out).unwrap())
    }

    fn parse(args: &[&str]) -> Cli {
        use clap::Parser;
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn base_url_flag_overrides_settings() {
        let directory = tempfile::tempdir().unwrap();
        let settings = effective_settings(&store_in(&directory), Some(" http://10.0.0.5:8000 "));
        assert_eq!(settings.api_base_url, "http://10.0.0.5:8000");
        assert_eq!(
            settings.stream_url().unwrap().as_str(),
            "ws://10.0.0.5:8000/"
        );
    }

    #[tokio::test]
    async fn config_init_writes_once_unless_forced() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("settings.json");

        let output = run_to_string(parse(&["reel", "config", "init"]), store_in(&directory))
            .await
            .unwrap();
        assert!(output.contains("wrote"));
        assert!(path.exists());

        let output = run_to_string(parse(&["reel", "config", "init"]), store_in(&directory))
            .await
            .unwrap();
        assert!(output.contains("--force"));

        let output = run_to_string(parse(&["reel", "config", "show"]), store_in(&directory))
            .await
            .unwrap();
        assert!(output.contains("\"api_base_url\""));
    }

    #[tokio::test]
    async fn invalid_job_is_rejected_before_any_request() {
        let directory = tempfile::tempdir().unwrap();
        let error = run_to_string(
            parse(&["reel", "watch", "--email", "nope", "--topic", "neon city"]),
            store_in(&directory),
        )
        .await
        .unwrap_err();
        assert_eq!(error.to_string(), "Please enter a valid email address.");
    }

    #[tokio::test]
    async fn admin_without_token_or_credentials_asks_for_login() {
        let directory = tempfile::tempdir().unwrap();
        let cli = Cli {
            config: None,
            base_url: None,
            command: Command::Admin {
                auth: AdminAuth {
                    username: None,
                    password: None,
                    token: None,
                },
                command: AdminCommand::Overview,
            },
        };
        let error = run_to_string(cli, store_in(&directory)).await.unwrap_err();
        assert!(matches!(error, AppError::LoginRequired { .. }));
    }

    #[test]
    fn follow_commands_parse_from_typed_lines() {
        assert_eq!(FollowCommand::parse("clear"), Some(FollowCommand::Clear));
        assert_eq!(FollowCommand::parse("  clear   logs "), Some(FollowCommand::ClearLogs));
        assert_eq!(FollowCommand::parse("clear script"), Some(FollowCommand::ClearStory));
        assert_eq!(FollowCommand::parse("clear everything"), None);
        assert_eq!(FollowCommand::parse(""), None);
    }

    #[tokio::test]
    async fn blank_attach_user_is_rejected() {
        let directory = tempfile::tempdir().unwrap();
        let error = run_to_string(parse(&["reel", "attach", "--user", " "]), store_in(&directory))
            .await
            .unwrap_err();
        assert!(matches!(error, AppError::InvalidSubject { .. }));
    }
}
