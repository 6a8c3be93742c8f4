//! Configuration loading and management.
//!
//! Loads configuration from embedded config.toml with environment variable overrides.
//! Identity credentials must come from the environment; ticketing credentials are optional.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use url::Url;
use zeroize::Zeroizing;

use crate::error::ConfigError;
use crate::pim::policy::Policy;

/// Embedded configuration file content.
const CONFIG_TOML: &str = include_str!("../config.toml");

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub api: ApiConfig,
    pub policy: Policy,
    pub http: HttpConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,

    /// Filled from `TENANT_ID`, `CLIENT_ID` and `CLIENT_SECRET`.
    #[serde(skip)]
    pub identity: IdentityCredentials,

    /// Filled from the `GITHUB_*` variables. `None` means dry-run ticketing.
    #[serde(skip)]
    pub github: Option<GitHubTarget>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub name: String,
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub graph_base_url: String,
    pub login_base_url: String,
    pub github_api_url: String,
    pub graph_scope: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub timeout_seconds: u64,
    pub preflight_timeout_seconds: u64,
    pub connect_timeout_seconds: u64,
    pub page_size: u32,
    pub default_retry_after_seconds: u64,
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn preflight_timeout(&self) -> Duration {
        Duration::from_secs(self.preflight_timeout_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    pub fn default_retry_after(&self) -> Duration {
        Duration::from_secs(self.default_retry_after_seconds)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    pub evidence_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

/// Application (client credentials) identity for the directory API.
#[derive(Clone, Default)]
pub struct IdentityCredentials {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: Zeroizing<String>,
}

impl fmt::Debug for IdentityCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityCredentials")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Repository that receives one issue per violation.
#[derive(Clone)]
pub struct GitHubTarget {
    pub owner: String,
    pub repo: String,
    pub token: Option<Zeroizing<String>>,
}

impl GitHubTarget {
    /// `owner/repo` slug for log lines.
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

impl fmt::Debug for GitHubTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubTarget")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Config {
    /// Load configuration from embedded config.toml with environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|name| env::var(name).ok())
    }

    /// Load configuration using `lookup` in place of the process environment.
    pub fn load_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: Config = toml::from_str(CONFIG_TOML)
            .map_err(|e| ConfigError::Parse(format!("embedded config.toml: {}", e)))?;

        // Blank values count as unset, like an empty line in .env
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |name: &'static str| var(name).ok_or(ConfigError::MissingVar(name));

        config.identity = IdentityCredentials {
            tenant_id: required("TENANT_ID")?,
            client_id: required("CLIENT_ID")?,
            client_secret: Zeroizing::new(required("CLIENT_SECRET")?),
        };

        config.github = match (var("GITHUB_REPO_OWNER"), var("GITHUB_REPO_NAME")) {
            (Some(owner), Some(repo)) => Some(GitHubTarget {
                owner,
                repo,
                token: var("GITHUB_TOKEN").map(Zeroizing::new),
            }),
            _ => None,
        };

        if let Some(url) = var("GRAPH_BASE_URL") {
            config.api.graph_base_url = url;
        }
        if let Some(url) = var("LOGIN_BASE_URL") {
            config.api.login_base_url = url;
        }
        if let Some(url) = var("GITHUB_API_URL") {
            config.api.github_api_url = url;
        }
        if let Some(dir) = var("PIM_EVIDENCE_DIR") {
            config.output.evidence_dir = PathBuf::from(dir);
        }
        if let Some(level) = var("RUST_LOG") {
            config.logging.level = level;
        }

        config.validate()?;

        Ok(config)
    }

    /// Validate base URLs and policy thresholds.
    fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("api.graph_base_url", &self.api.graph_base_url),
            ("api.login_base_url", &self.api.login_base_url),
            ("api.github_api_url", &self.api.github_api_url),
        ] {
            Url::parse(value)
                .map_err(|e| ConfigError::Invalid(format!("{} = {:?}: {}", name, value, e)))?;
        }

        if self.policy.window_days == 0 {
            return Err(ConfigError::Invalid(
                "policy.window_days must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Token endpoint for the client-credentials flow.
    pub fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.api.login_base_url.trim_end_matches('/'),
            self.identity.tenant_id
        )
    }
}
