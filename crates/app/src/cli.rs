use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "reel")]
#[command(about = "Follow short-movie generation jobs as they stream in", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Settings file to use instead of the per-user one.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Overrides `api_base_url` from settings.
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Submit a job, then stream its story, script and logs until Ctrl-C.
    Watch {
        #[arg(long)]
        email: String,

        #[arg(long)]
        topic: String,
    },

    /// Stream an existing job.
    Attach {
        #[arg(long)]
        user: String,

        /// Also stream the job's status log.
        #[arg(long)]
        request: Option<String>,
    },

    Admin {
        #[command(flatten)]
        auth: AdminAuth,

        #[command(subcommand)]
        command: AdminCommand,
    },

    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Debug, Clone, Args)]
pub struct AdminAuth {
    /// Falls back to `admin_username` from settings.
    #[arg(long, global = true)]
    pub username: Option<String>,

    #[arg(long, global = true, env = "REEL_ADMIN_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Use an existing bearer token instead of logging in.
    #[arg(long, global = true, env = "REEL_ADMIN_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum AdminCommand {
    /// Users, their requests and aggregate counts.
    Overview,

    /// Background status and logs of one request.
    Status { user: String, request: String },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective settings.
    Show,

    /// Write the effective settings to the settings file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn attach_takes_optional_request() {
        let cli = Cli::try_parse_from(["reel", "attach", "--user", "7", "--request", "100"]).unwrap();
        match cli.command {
            Command::Attach { user, request } => {
                assert_eq!(user, "7");
                assert_eq!(request.as_deref(), Some("100"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn admin_flags_may_follow_the_subcommand() {
        let cli = Cli::try_parse_from([
            "reel",
            "--base-url",
            "http://10.0.0.5:8000",
            "admin",
            "status",
            "7",
            "100",
            "--username",
            "admin",
        ])
        .unwrap();

        assert_eq!(cli.base_url.as_deref(), Some("http://10.0.0.5:8000"));
        match cli.command {
            Command::Admin { auth, command: AdminCommand::Status { user, request } } => {
                assert_eq!(auth.username.as_deref(), Some("admin"));
                assert_eq!((user.as_str(), request.as_str()), ("7", "100"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn watch_requires_email_and_topic() {
        assert!(Cli::try_parse_from(["reel", "watch", "--email", "a@b.co"]).is_err());
    }
}
