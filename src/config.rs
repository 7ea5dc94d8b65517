//! Job configuration.
//!
//! Loaded once at process start from a TOML file into an immutable
//! [`Config`] that every component borrows. The sites file (YAML) and
//! transport credentials (environment) are resolved at the same time, and
//! all validation is eager: a run never starts with a half-valid config.
//!
//! ```toml
//! [sites]
//! file = "./config/sites.yaml"
//!
//! [window]
//! start = "2020-12-01"
//! end = "2021-04-12"
//!
//! [api]
//! url_template = "https://bookings.example.org/api/availability/{site}?start={start}&end={end}"
//!
//! [warehouse]
//! path = "./data/site-tracker.sqlite"
//!
//! [notify]
//! contact_email = "me@example.org"
//! contact_name = "Me"
//! ```

use serde::Deserialize;
use site_tracker_core::diff::MissingPrevious;
use site_tracker_core::models::{AvailabilityWindow, Site};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// Environment variable holding the Mailjet API key.
pub const MAILJET_API_KEY_ENV: &str = "MAILJET_API_KEY";
/// Environment variable holding the Mailjet API secret.
pub const MAILJET_API_SECRET_ENV: &str = "MAILJET_API_SECRET";

/// Configuration failures. Distinct from runtime errors so callers can tell
/// "never started" apart from "started and failed".
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to read sites file {}", path.display())]
    SitesRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse sites file {}", path.display())]
    SitesParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("environment variable {0} is not set")]
    MissingEnv(&'static str),

    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(rename = "sites")]
    pub sites_file: SitesConfig,
    pub window: AvailabilityWindow,
    pub api: ApiConfig,
    #[serde(default)]
    pub diff: DiffConfig,
    pub warehouse: WarehouseConfig,
    pub notify: NotifyConfig,
    #[serde(default)]
    pub server: ServerConfig,

    /// Sites resolved from [`SitesConfig::file`], in file order.
    #[serde(skip)]
    pub sites: Vec<Site>,
    /// Present iff `notify.transport = "mailjet"`.
    #[serde(skip)]
    pub mailjet: Option<MailjetCredentials>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SitesConfig {
    pub file: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    /// Must contain `{site}`, `{start}` and `{end}`.
    pub url_template: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DiffConfig {
    #[serde(default)]
    pub missing_previous: MissingPrevious,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WarehouseConfig {
    pub path: PathBuf,
    #[serde(default = "default_table")]
    pub table: String,
}

fn default_table() -> String {
    "availability".to_string()
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    #[default]
    Mailjet,
    Log,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotifyConfig {
    #[serde(default)]
    pub transport: Transport,
    /// Sender address; also the recipient unless `recipient` is set.
    pub contact_email: String,
    pub contact_name: String,
    #[serde(default)]
    pub recipient: Option<String>,
    /// Display name for `recipient`. Ignored when `recipient` is unset.
    #[serde(default)]
    pub recipient_name: Option<String>,
}

impl NotifyConfig {
    pub fn recipient(&self) -> &str {
        self.recipient.as_deref().unwrap_or(&self.contact_email)
    }

    /// Display name for [`recipient`](Self::recipient); empty when a
    /// separate recipient was given without a name.
    pub fn recipient_name(&self) -> &str {
        match &self.recipient {
            Some(_) => self.recipient_name.as_deref().unwrap_or(""),
            None => &self.contact_name,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

#[derive(Clone)]
pub struct MailjetCredentials {
    pub api_key: String,
    pub api_secret: String,
}

impl fmt::Debug for MailjetCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailjetCredentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// The part of the configuration needed to send email.
///
/// Loadable on its own, so a failure in the rest of the file can still be
/// reported by email.
#[derive(Debug, Clone)]
pub struct NotifySettings {
    pub notify: NotifyConfig,
    /// Present iff `notify.transport = "mailjet"`.
    pub mailjet: Option<MailjetCredentials>,
}

#[derive(Deserialize)]
struct NotifySection {
    notify: NotifyConfig,
}

/// Load and validate the configuration, reading credentials from the
/// process environment.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Like [`load_config`], with an injectable environment lookup.
pub fn load_config_with_env<F>(path: &Path, env: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let content = read_config_file(path)?;
    let settings = parse_notify(&content, path, &env)?;

    let mut config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.mailjet = settings.mailjet;

    validate_url_template(&config.api.url_template)?;

    if config.api.timeout_secs == 0 {
        return Err(invalid("api.timeout_secs must be > 0"));
    }

    if !is_identifier(&config.warehouse.table) {
        return Err(invalid(format!(
            "warehouse.table must be a plain SQL identifier, got '{}'",
            config.warehouse.table
        )));
    }

    config.sites = load_sites(&config.sites_file.file)?;

    Ok(config)
}

/// Load only `[notify]` and the transport credentials.
pub fn load_notify(path: &Path) -> Result<NotifySettings, ConfigError> {
    load_notify_with_env(path, |key| std::env::var(key).ok())
}

/// Like [`load_notify`], with an injectable environment lookup.
pub fn load_notify_with_env<F>(path: &Path, env: F) -> Result<NotifySettings, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let content = read_config_file(path)?;
    parse_notify(&content, path, &env)
}

fn read_config_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_notify<F>(content: &str, path: &Path, env: &F) -> Result<NotifySettings, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let section: NotifySection = toml::from_str(content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let notify = section.notify;

    if !notify.contact_email.contains('@') {
        return Err(invalid("notify.contact_email must be an email address"));
    }
    if !notify.recipient().contains('@') {
        return Err(invalid("notify.recipient must be an email address"));
    }

    let mailjet = match notify.transport {
        Transport::Mailjet => Some(MailjetCredentials {
            api_key: require_env(env, MAILJET_API_KEY_ENV)?,
            api_secret: require_env(env, MAILJET_API_SECRET_ENV)?,
        }),
        Transport::Log => None,
    };

    Ok(NotifySettings { notify, mailjet })
}

/// Read the sites file: a YAML mapping of site id → display name.
///
/// Ids may be written as YAML strings or integers.
pub fn load_sites(path: &Path) -> Result<Vec<Site>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::SitesRead {
        path: path.to_path_buf(),
        source,
    })?;

    let mapping: serde_yaml::Mapping =
        serde_yaml::from_str(&content).map_err(|source| ConfigError::SitesParse {
            path: path.to_path_buf(),
            source,
        })?;

    let mut seen = HashSet::new();
    let mut sites = Vec::with_capacity(mapping.len());
    for (key, value) in mapping {
        let id = yaml_scalar(&key)
            .ok_or_else(|| invalid(format!("site id must be a string or number: {:?}", key)))?;
        let name = yaml_scalar(&value)
            .ok_or_else(|| invalid(format!("display name for site '{}' must be a string", id)))?;
        if !seen.insert(id.clone()) {
            return Err(invalid(format!("site '{}' is listed twice", id)));
        }
        sites.push(Site::new(id, name));
    }

    if sites.is_empty() {
        return Err(invalid(format!("no sites listed in {}", path.display())));
    }

    Ok(sites)
}

fn yaml_scalar(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn validate_url_template(template: &str) -> Result<(), ConfigError> {
    if !(template.starts_with("http://") || template.starts_with("https://")) {
        return Err(invalid("api.url_template must be an http(s) URL"));
    }
    for placeholder in ["{site}", "{start}", "{end}"] {
        if !template.contains(placeholder) {
            return Err(invalid(format!(
                "api.url_template is missing the {} placeholder",
                placeholder
            )));
        }
    }
    Ok(())
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn require_env<F>(env: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    env(key)
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::MissingEnv(key))
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(msg.into())
}
