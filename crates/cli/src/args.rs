use clap::{Args, Parser, Subcommand};
use lists_jobs_core::config::DEFAULT_API_URL;
use lists_jobs_core::{ClientConfig, TrackerConfig};
use lists_jobs_types::JobKind;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "lists-jobs", about = "Start, watch and cancel list refresh and export jobs")]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct ConnectionArgs {
    /// Base URL of the list service
    #[arg(long, global = true, env = "LISTS_API_URL", default_value = DEFAULT_API_URL)]
    pub url: String,
    /// Tenant sent as X-Okapi-Tenant
    #[arg(long, global = true, env = "LISTS_TENANT")]
    pub tenant: Option<String>,
    /// Token sent as X-Okapi-Token
    #[arg(long, global = true, env = "LISTS_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
    /// Delay between status checks, in milliseconds
    #[arg(long, global = true, env = "LISTS_POLL_INTERVAL_MS")]
    pub poll_interval_ms: Option<u64>,
}

impl ConnectionArgs {
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(self.url.trim_end_matches('/'));
        if let Some(tenant) = self.tenant.as_deref().filter(|t| !t.trim().is_empty()) {
            config = config.with_tenant(tenant);
        }
        if let Some(token) = self.token.as_deref().filter(|t| !t.trim().is_empty()) {
            config = config.with_token(token);
        }
        config
    }

    pub fn tracker_config(&self) -> TrackerConfig {
        let config = TrackerConfig::default();
        match self.poll_interval_ms.filter(|ms| *ms > 0) {
            Some(ms) => config.with_poll_interval(Duration::from_millis(ms)),
            None => config,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Refresh a list and wait for the result
    Refresh {
        list_id: String,
    },
    /// Export a list and wait for the file to be ready
    Export {
        list_id: String,
    },
    /// Follow a job that is already running
    Watch {
        list_id: String,
        #[arg(long, default_value = "refresh")]
        kind: JobKind,
        /// Job to follow. Defaults to the list's in-progress refresh.
        #[arg(long)]
        job_id: Option<String>,
    },
    /// Cancel a running job and wait for confirmation
    Cancel {
        list_id: String,
        #[arg(long, default_value = "refresh")]
        kind: JobKind,
        #[arg(long)]
        job_id: String,
    },
}

impl Command {
    pub fn list_id(&self) -> &str {
        match self {
            Self::Refresh { list_id }
            | Self::Export { list_id }
            | Self::Watch { list_id, .. }
            | Self::Cancel { list_id, .. } => list_id,
        }
    }

    pub fn kind(&self) -> JobKind {
        match self {
            Self::Refresh { .. } => JobKind::Refresh,
            Self::Export { .. } => JobKind::Export,
            Self::Watch { kind, .. } | Self::Cancel { kind, .. } => *kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_watch_export() {
        let cli = Cli::try_parse_from([
            "lists-jobs",
            "watch",
            "L1",
            "--kind",
            "export",
            "--job-id",
            "E1",
            "--url",
            "http://lists.local/",
        ])
        .unwrap();
        assert_eq!(cli.command.list_id(), "L1");
        assert_eq!(cli.command.kind(), JobKind::Export);
        assert_eq!(cli.connection.client_config().base_url, "http://lists.local");
    }

    #[test]
    fn test_cancel_requires_job_id() {
        assert!(Cli::try_parse_from(["lists-jobs", "cancel", "L1"]).is_err());
    }

    #[test]
    fn test_poll_interval_flag() {
        let cli = Cli::try_parse_from(["lists-jobs", "refresh", "L1", "--poll-interval-ms", "250"])
            .unwrap();
        assert_eq!(
            cli.connection.tracker_config().poll_interval,
            Duration::from_millis(250)
        );
        assert_eq!(cli.command.kind(), JobKind::Refresh);
    }

    #[test]
    fn test_unknown_kind_rejected() {
        assert!(Cli::try_parse_from(["lists-jobs", "watch", "L1", "--kind", "delete"]).is_err());
    }
}
