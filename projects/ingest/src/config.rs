//! Process configuration, read from the environment (and `.env` via dotenvy).
//!
//! Nothing secret has a default: `DB_PASSWORD` must be provided.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_METRICS_PORT: u16 = 9091;
pub const DEFAULT_DB_PORT: u16 = 5432;
pub const DEFAULT_GITHUB_DB_NAME: &str = "GitHubDB";
pub const DEFAULT_STACK_DB_NAME: &str = "StackoverflowDB";

pub const DEFAULT_REPOSITORIES: &[(&str, &str)] = &[
    ("prometheus", "prometheus"),
    ("SeleniumHQ", "selenium"),
    ("openai", "openai-python"),
    ("docker", "compose"),
    ("milvus-io", "milvus"),
    ("golang", "go"),
];

pub const DEFAULT_QUERY_TERMS: &[&str] =
    &["prometheus", "selenium", "openai", "docker", "milvus", "golang"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("MissingVar: {name} must be set")]
    MissingVar { name: &'static str },

    #[error("InvalidVar: {name}={value:?}: {reason}")]
    InvalidVar {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub github_db: DatabaseConfig,
    pub stack_db: DatabaseConfig,
    pub ingest: IngestConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub metrics_port: u16,
}

#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database_name: String,
    pub user: String,
    pub password: String,
    pub tls_mode: TlsMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    pub repositories: Vec<RepoTarget>,
    pub query_terms: Vec<String>,
    pub failure_policy: FailurePolicy,
    /// `None` runs the pipelines once at startup.
    pub interval: Option<Duration>,
    /// `None` lets outbound requests block indefinitely.
    pub http_timeout: Option<Duration>,
    pub github_api_url: String,
    pub stackexchange_api_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    Disable,
    Prefer,
    Require,
}

/// What the driver does when one target fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop at the first failing target and report it.
    Abort,
    /// Log and record the failure, then move on to the next target.
    Continue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoTarget {
    pub owner: String,
    pub repo: String,
}

impl Config {
    /// Loads `.env` (if present) and reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let server = ServerConfig {
            port: parse_or(&var, "PORT", DEFAULT_PORT)?,
            metrics_port: parse_or(&var, "METRICS_PORT", DEFAULT_METRICS_PORT)?,
        };

        let base_db = DatabaseConfig {
            host: var("DB_HOST").unwrap_or_else(|| "localhost".to_owned()),
            port: parse_or(&var, "DB_PORT", DEFAULT_DB_PORT)?,
            database_name: String::new(),
            user: var("DB_USER").unwrap_or_else(|| "postgres".to_owned()),
            password: var("DB_PASSWORD").ok_or(ConfigError::MissingVar { name: "DB_PASSWORD" })?,
            tls_mode: parse_or(&var, "DB_SSLMODE", TlsMode::Disable)?,
        };

        let github_db = base_db.with_database(
            var("GITHUB_DB_NAME").unwrap_or_else(|| DEFAULT_GITHUB_DB_NAME.to_owned()),
        );
        let stack_db = base_db.with_database(
            var("STACK_DB_NAME").unwrap_or_else(|| DEFAULT_STACK_DB_NAME.to_owned()),
        );

        let repositories = match var("INGEST_REPOSITORIES") {
            Some(value) => split_list(&value)
                .map(|item| parse_value("INGEST_REPOSITORIES", item))
                .collect::<Result<Vec<RepoTarget>, _>>()?,
            None => DEFAULT_REPOSITORIES
                .iter()
                .map(|(owner, repo)| RepoTarget::new(*owner, *repo))
                .collect(),
        };

        let query_terms = match var("INGEST_QUERY_TERMS") {
            Some(value) => split_list(&value).map(str::to_owned).collect(),
            None => DEFAULT_QUERY_TERMS.iter().map(|term| (*term).to_owned()).collect(),
        };

        let ingest = IngestConfig {
            repositories,
            query_terms,
            failure_policy: parse_or(&var, "INGEST_FAILURE_POLICY", FailurePolicy::Abort)?,
            interval: parse_secs(&var, "INGEST_INTERVAL_SECS")?,
            http_timeout: parse_secs(&var, "HTTP_TIMEOUT_SECS")?,
            github_api_url: var("GITHUB_API_URL")
                .unwrap_or_else(|| interfaces_github_issues::index::DEFAULT_API_BASE.to_owned()),
            stackexchange_api_url: var("STACKEXCHANGE_API_URL").unwrap_or_else(|| {
                interfaces_stackexchange_search::index::DEFAULT_API_BASE.to_owned()
            }),
        };

        Ok(Self {
            server,
            github_db,
            stack_db,
            ingest,
        })
    }
}

impl DatabaseConfig {
    pub fn with_database(&self, database_name: String) -> Self {
        Self {
            database_name,
            ..self.clone()
        }
    }

    /// libpq keyword/value form, every value quoted.
    pub fn connection_string(&self) -> String {
        format!(
            "host={} port={} dbname={} user={} password={} sslmode={}",
            quote(&self.host),
            self.port,
            quote(&self.database_name),
            quote(&self.user),
            quote(&self.password),
            self.tls_mode.as_str(),
        )
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_name", &self.database_name)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("tls_mode", &self.tls_mode)
            .finish()
    }
}

impl TlsMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TlsMode::Disable => "disable",
            TlsMode::Prefer => "prefer",
            TlsMode::Require => "require",
        }
    }
}

impl FromStr for TlsMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "disable" => Ok(TlsMode::Disable),
            "prefer" => Ok(TlsMode::Prefer),
            "require" => Ok(TlsMode::Require),
            _ => Err("expected disable, prefer or require".to_owned()),
        }
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(FailurePolicy::Abort),
            "continue" => Ok(FailurePolicy::Continue),
            _ => Err("expected abort or continue".to_owned()),
        }
    }
}

impl RepoTarget {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }
}

impl FromStr for RepoTarget {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().split_once('/') {
            Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => {
                Ok(RepoTarget::new(owner, repo))
            }
            _ => Err("expected owner/repo".to_owned()),
        }
    }
}

impl fmt::Display for RepoTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|item| !item.is_empty())
}

fn parse_value<T>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value.parse().map_err(|err: T::Err| ConfigError::InvalidVar {
        name,
        value: value.to_owned(),
        reason: err.to_string(),
    })
}

fn parse_or<T, F>(var: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match var(name) {
        Some(value) => parse_value(name, &value),
        None => Ok(default),
    }
}

fn parse_secs<F>(var: &F, name: &'static str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(value) => match parse_value::<u64>(name, &value)? {
            0 => Err(ConfigError::InvalidVar {
                name,
                value,
                reason: "must be greater than zero".to_owned(),
            }),
            secs => Ok(Some(Duration::from_secs(secs))),
        },
        None => Ok(None),
    }
}
