//! Command-line argument parsing

use crate::config::{
    Credentials, ENV_HOSTNAME, ENV_PASSWORD, ENV_USERNAME, RegistryConfig,
};
use crate::error::{RegistryError, Result};
use crate::reconcile::{FailurePolicy, ReconcileOptions};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "registry-sync")]
#[command(about = "Delete every registry repository and tag that is not declared")]
#[command(version)]
pub struct Args {
    /// Registry hostname
    #[arg(
        long = "registry",
        short = 'r',
        help = "Registry hostname, optionally with a scheme (env: REGISTRY_SYNC_HOSTNAME)"
    )]
    pub registry: Option<String>,

    /// Registry username
    #[arg(
        long = "username",
        short = 'u',
        help = "Username for the registry token endpoint (env: REGISTRY_SYNC_USERNAME)"
    )]
    pub username: Option<String>,

    /// Registry password
    #[arg(
        long = "password",
        short = 'p',
        help = "Password for the registry token endpoint (env: REGISTRY_SYNC_PASSWORD)"
    )]
    pub password: Option<String>,

    /// Desired state file
    #[arg(
        long = "file",
        short = 'f',
        help = "YAML or JSON file mapping repositories to their image_tags"
    )]
    pub file: PathBuf,

    #[arg(
        long = "dry-run",
        short = 'n',
        help = "Report what would be deleted without deleting anything"
    )]
    pub dry_run: bool,

    #[arg(
        long = "continue-on-error",
        help = "Record failed deletions and keep going instead of aborting"
    )]
    pub continue_on_error: bool,

    #[arg(
        long = "skip-vanished",
        help = "Skip tags that disappear between listing and deletion"
    )]
    pub skip_vanished: bool,

    #[arg(
        long = "protect-shared-digests",
        help = "Keep undeclared tags that point at the same manifest as a declared tag"
    )]
    pub protect_shared_digests: bool,

    #[arg(
        long = "skip-tls",
        short = 'k',
        help = "Skip TLS certificate verification"
    )]
    pub skip_tls: bool,

    #[arg(
        long = "timeout",
        short = 't',
        help = "Per-request timeout in seconds (default: 30)"
    )]
    pub timeout: Option<u64>,

    #[arg(
        long = "page-size",
        help = "Page size requested from the catalog and tag list endpoints"
    )]
    pub page_size: Option<usize>,

    #[arg(
        long = "token-ttl",
        help = "Reuse scoped tokens for up to this many seconds"
    )]
    pub token_ttl: Option<u64>,

    #[arg(long = "verbose", short = 'v', help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(
        long = "quiet",
        short = 'q',
        conflicts_with = "verbose",
        help = "Only print errors and the final report"
    )]
    pub quiet: bool,

    #[arg(
        long = "output",
        short = 'o',
        default_value = "text",
        help = "Report format: text, json"
    )]
    pub output: String,
}

impl Args {
    pub fn parse_args() -> Self {
        Args::parse()
    }

    pub fn validate(&self) -> Result<()> {
        if !self.file.is_file() {
            return Err(RegistryError::Config(format!(
                "Desired state file does not exist: {}",
                self.file.display()
            )));
        }

        match self.output.as_str() {
            "text" | "json" => Ok(()),
            _ => Err(RegistryError::Config(
                "Output format must be one of: text, json".to_string(),
            )),
        }
    }

    /// Flags take precedence over `REGISTRY_SYNC_*` environment variables
    pub fn credentials(&self) -> Result<Credentials> {
        self.credentials_with(Credentials::from_env())
    }

    pub fn credentials_with(
        &self,
        env: (Option<String>, Option<String>, Option<String>),
    ) -> Result<Credentials> {
        let (env_hostname, env_username, env_password) = env;

        let hostname = self
            .registry
            .clone()
            .or(env_hostname)
            .ok_or_else(|| missing("--registry", ENV_HOSTNAME))?;
        let username = self
            .username
            .clone()
            .or(env_username)
            .ok_or_else(|| missing("--username", ENV_USERNAME))?;
        let password = self
            .password
            .clone()
            .or(env_password)
            .ok_or_else(|| missing("--password", ENV_PASSWORD))?;

        let credentials = Credentials::new(hostname, username, password);
        credentials.validate()?;
        Ok(credentials)
    }

    pub fn registry_config(&self) -> RegistryConfig {
        self.registry_config_with(RegistryConfig::from_env())
    }

    pub fn registry_config_with(&self, env: RegistryConfig) -> RegistryConfig {
        RegistryConfig::new()
            .with_skip_tls(self.skip_tls || env.skip_tls)
            .with_timeout(self.timeout.unwrap_or(env.timeout))
            .with_page_size(self.page_size.or(env.page_size))
            .with_token_ttl(self.token_ttl.or(env.token_ttl))
    }

    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            dry_run: self.dry_run,
            failure_policy: if self.continue_on_error {
                FailurePolicy::Continue
            } else {
                FailurePolicy::Abort
            },
            skip_vanished: self.skip_vanished,
            protect_retained_digests: self.protect_shared_digests,
        }
    }
}

fn missing(flag: &str, env: &str) -> RegistryError {
    RegistryError::Config(format!("{} is required (or set {})", flag, env))
}
