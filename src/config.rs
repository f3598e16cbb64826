//! Provider configuration
//!
//! Explicit settings (from the provider block or CLI flags) win over the
//! `PRISM_*` environment variables. Resolution collects every problem at once
//! so the host can report them together.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use url::Url;

pub const ENV_SUBDOMAIN: &str = "PRISM_SUBDOMAIN";
pub const ENV_API_TOKEN: &str = "PRISM_API_TOKEN";
pub const ENV_REGION: &str = "PRISM_REGION";
pub const ENV_BASE_URL: &str = "PRISM_BASE_URL";

/// Prism API region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Region {
    #[default]
    #[serde(rename = "prism")]
    Prism,
    #[serde(rename = "prism-eu")]
    PrismEu,
}

impl Region {
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Prism => "prism",
            Region::PrismEu => "prism-eu",
        }
    }

    pub fn base_url(&self) -> String {
        format!("https://{}.cloudkeeper.com:8090", self.as_str())
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prism" => Ok(Region::Prism),
            "prism-eu" => Ok(Region::PrismEu),
            other => Err(ConfigError::InvalidRegion(other.to_string())),
        }
    }
}

/// Configuration problems, each tied to the setting it concerns
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("missing Prism subdomain: set prism_subdomain or the {ENV_SUBDOMAIN} environment variable")]
    MissingSubdomain,

    #[error("missing API token: set api_token or the {ENV_API_TOKEN} environment variable")]
    MissingToken,

    #[error("invalid region '{0}': must be either 'prism' or 'prism-eu'")]
    InvalidRegion(String),

    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

impl ConfigError {
    /// The provider attribute this error belongs to
    pub fn attribute(&self) -> &'static str {
        match self {
            ConfigError::MissingSubdomain => "prism_subdomain",
            ConfigError::MissingToken => "api_token",
            ConfigError::InvalidRegion(_) => "region",
            ConfigError::InvalidBaseUrl { .. } => "base_url",
        }
    }

    /// Headline used when reporting the error as a diagnostic
    pub fn summary(&self) -> &'static str {
        match self {
            ConfigError::MissingSubdomain => "Missing CloudKeeper Prism Subdomain",
            ConfigError::MissingToken => "Missing CloudKeeper API Token",
            ConfigError::InvalidRegion(_) => "Invalid CloudKeeper Region",
            ConfigError::InvalidBaseUrl { .. } => "Invalid CloudKeeper Base URL",
        }
    }
}

/// Settings as written in the provider block; every field is optional
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default)]
    pub prism_subdomain: Option<String>,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Fully resolved connection configuration
#[derive(Clone, PartialEq)]
pub struct ProviderConfig {
    pub subdomain: String,
    pub token: String,
    pub region: Region,
    pub base_url: String,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("subdomain", &self.subdomain)
            .field("token", &"<redacted>")
            .field("region", &self.region)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl ProviderConfig {
    /// Resolve against the process environment
    pub fn resolve(settings: &ProviderSettings) -> Result<Self, Vec<ConfigError>> {
        Self::resolve_with(settings, |key| std::env::var(key).ok())
    }

    /// Resolve with a custom environment lookup
    pub fn resolve_with<F>(settings: &ProviderSettings, env: F) -> Result<Self, Vec<ConfigError>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |explicit: &Option<String>, key: &str| -> Option<String> {
            explicit
                .clone()
                .or_else(|| env(key))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut errors = Vec::new();

        let subdomain = pick(&settings.prism_subdomain, ENV_SUBDOMAIN);
        if subdomain.is_none() {
            errors.push(ConfigError::MissingSubdomain);
        }

        let token = pick(&settings.api_token, ENV_API_TOKEN);
        if token.is_none() {
            errors.push(ConfigError::MissingToken);
        }

        let region = match pick(&settings.region, ENV_REGION) {
            Some(raw) => match raw.parse::<Region>() {
                Ok(region) => region,
                Err(err) => {
                    errors.push(err);
                    Region::default()
                }
            },
            None => Region::default(),
        };

        let base_url = match pick(&settings.base_url, ENV_BASE_URL) {
            Some(raw) => match validate_base_url(&raw) {
                Ok(url) => url,
                Err(err) => {
                    errors.push(err);
                    String::new()
                }
            },
            None => region.base_url(),
        };

        match (subdomain, token) {
            (Some(subdomain), Some(token)) if errors.is_empty() => Ok(Self {
                subdomain,
                token,
                region,
                base_url,
            }),
            _ => Err(errors),
        }
    }
}

/// Check that a base URL is absolute http(s) and strip any trailing slash
pub fn validate_base_url(raw: &str) -> Result<String, ConfigError> {
    let parsed = Url::parse(raw).map_err(|e| ConfigError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(ConfigError::InvalidBaseUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }

    Ok(raw.trim_end_matches('/').to_string())
}
