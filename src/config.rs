//! Command-line and environment configuration.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::Notify;

use crate::error::{ExportError, Result};
use crate::export::ExportRequest;
use crate::variomedia::DEFAULT_API_URL;

// ============================================================
// CLI Definition
// ============================================================

#[derive(Parser)]
#[command(name = "variomedia-export")]
#[command(about = "Exports Variomedia DNS address records to CSV", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Base URL of the Variomedia API
    #[arg(long, env = "VARIOMEDIA_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// API token sent as `Authorization: token <value>`
    #[arg(long, env = "VARIOMEDIA_API_TOKEN", hide_env_values = true)]
    pub api_token: String,

    /// Directory CSV files are written to
    #[arg(long, env = "CSV_EXPORT_PATH", default_value = "./exports")]
    pub export_path: PathBuf,

    /// Base filename; files are numbered `<stem>_<n>.csv`
    #[arg(long, env = "CSV_EXPORT_FILENAME", default_value = "variomedia_export.csv")]
    pub export_filename: String,

    /// Data rows per CSV file before rotating to the next one
    #[arg(
        long,
        env = "CSV_EXPORT_MAX_ROWS",
        default_value_t = 5000,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub max_rows: u64,

    /// Pause between customers, in milliseconds
    #[arg(long, env = "CSV_EXPORT_PAUSE_MS", default_value_t = 1000)]
    pub pause_ms: u64,

    /// Upstream request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Address the HTTP endpoint listens on
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Run the startup export and exit without serving HTTP
    #[arg(long)]
    pub once: bool,

    /// Do not run an export at startup
    #[arg(long, conflicts_with = "once")]
    pub skip_startup_export: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    pub json_logs: bool,
}

impl Cli {
    pub fn export_settings(&self) -> Result<ExportSettings> {
        ExportSettings::new(
            self.export_path.clone(),
            self.export_filename.clone(),
            self.max_rows,
            Duration::from_millis(self.pause_ms),
        )
    }

    pub fn api_settings(&self) -> ApiSettings {
        ApiSettings {
            base_url: self.api_url.clone(),
            token: self.api_token.clone(),
            timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

// ============================================================
// Settings
// ============================================================

/// Upstream connection settings.
#[derive(Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub token: String,
    pub timeout: Duration,
}

impl fmt::Debug for ApiSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiSettings")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Validated export settings shared by both triggers.
#[derive(Debug, Clone)]
pub struct ExportSettings {
    pub export_path: PathBuf,
    pub export_filename: String,
    pub max_rows: u64,
    pub pause: Duration,
    /// Shared by every run built from these settings.
    pub interrupt: Arc<Notify>,
}

impl ExportSettings {
    pub fn new(
        export_path: PathBuf,
        export_filename: String,
        max_rows: u64,
        pause: Duration,
    ) -> Result<Self> {
        if max_rows == 0 {
            return Err(ExportError::Config(
                "max rows per file must be at least 1".to_string(),
            ));
        }
        if !export_filename.ends_with(".csv") || export_filename.len() == ".csv".len() {
            return Err(ExportError::Config(format!(
                "export filename must look like <name>.csv, got {export_filename:?}"
            )));
        }
        if export_filename.contains(['/', '\\']) {
            return Err(ExportError::Config(format!(
                "export filename must not contain a path, got {export_filename:?}"
            )));
        }

        Ok(Self {
            export_path,
            export_filename,
            max_rows,
            pause,
            interrupt: Arc::new(Notify::new()),
        })
    }

    /// Use `interrupt` to cut courtesy pauses short.
    pub fn with_interrupt(mut self, interrupt: Arc<Notify>) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Build a run request writing files named after `base_filename`.
    pub fn request(&self, base_filename: String) -> ExportRequest {
        ExportRequest {
            directory: self.export_path.clone(),
            base_filename,
            max_rows: self.max_rows,
            pause: self.pause,
            interrupt: Arc::clone(&self.interrupt),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> std::result::Result<Cli, clap::Error> {
        let mut argv = vec!["variomedia-export", "--api-token", "secret"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv)
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&[]).unwrap();
        let settings = cli.export_settings().unwrap();

        assert_eq!(settings.max_rows, 5000);
        assert_eq!(settings.pause, Duration::from_secs(1));
        assert_eq!(settings.export_filename, "variomedia_export.csv");
        assert_eq!(cli.listen.port(), 8080);
        assert!(!cli.once);
    }

    #[test]
    fn test_zero_max_rows_rejected_by_parser() {
        assert!(parse(&["--max-rows", "0"]).is_err());
    }

    #[test]
    fn test_once_conflicts_with_skip() {
        assert!(parse(&["--once", "--skip-startup-export"]).is_err());
    }

    #[test]
    fn test_filename_validation() {
        let ok = ExportSettings::new("out".into(), "dns.csv".into(), 10, Duration::ZERO);
        assert!(ok.is_ok());

        for bad in ["dns.txt", ".csv", "sub/dns.csv"] {
            let err = ExportSettings::new("out".into(), bad.into(), 10, Duration::ZERO);
            assert!(matches!(err, Err(ExportError::Config(_))), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_requests_share_the_interrupt() {
        let interrupt = Arc::new(Notify::new());
        let settings = ExportSettings::new("out".into(), "dns.csv".into(), 10, Duration::ZERO)
            .unwrap()
            .with_interrupt(Arc::clone(&interrupt));

        let request = settings.request("dns.csv".to_string());
        assert!(Arc::ptr_eq(&request.interrupt, &interrupt));
    }

    #[test]
    fn test_token_redacted_in_debug() {
        let cli = parse(&[]).unwrap();
        let debug = format!("{:?}", cli.api_settings());
        assert!(!debug.contains("secret"));
        assert!(debug.contains("<redacted>"));
    }
}
