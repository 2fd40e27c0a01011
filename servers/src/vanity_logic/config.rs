use anyhow::{Context, Result, bail};
use clap::Parser;
use lib_vanity::core::entry::NO_SCOPE;
use lib_vanity::core::requests::RequestContext;
use lib_vanity::core::scheduler::DEFAULT_CHECK_INTERVAL;
use lib_vanity::error::ConfigError;
use lib_vanity::retrieve::proxy_pool::{ProxyDescriptor, ProxyPool};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG_FILE: &str = "vanity_monitor.conf";
const DEFAULT_API_BASE_URL: &str = "https://discord.com/api/v10/";
const MIN_TIMEOUT_SECS: u64 = 5;
const MAX_TIMEOUT_SECS: u64 = 10;

#[derive(Parser, Deserialize, Serialize, Clone, Default)]
#[clap(about = "Vanity URL monitor and auto-claimer", version)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[clap(long, env = "VANITY_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "DISCORD_TOKEN", hide_env_values = true, help = "Bot token used for claims, lookups and notifications.")]
    #[serde(skip_serializing)]
    pub discord_token: Option<String>,

    #[clap(long, env = "VANITY_API_BASE_URL", help = "Base URL of the remote API.")]
    pub api_base_url: Option<String>,

    #[clap(long, env = "VANITY_PROXY_FILE", help = "File with one host:port:user:pass proxy per line.")]
    pub proxy_file: Option<PathBuf>,

    #[clap(long, env = "VANITY_PROXIES", hide_env_values = true, help = "Comma separated host:port:user:pass proxies.")]
    #[serde(skip_serializing)]
    pub proxies: Option<String>,

    #[clap(long, env = "VANITY_CHECK_INTERVAL_SECONDS", help = "Seconds between two scans of the registries.")]
    pub check_interval_seconds: Option<u64>,

    #[clap(long, env = "VANITY_REQUEST_TIMEOUT_SECONDS", help = "Per-request timeout in seconds (clamped to 5-10).")]
    pub request_timeout_seconds: Option<u64>,

    #[clap(long, env = "VANITY_WATCH_REGISTRY", help = "Path of the watch registry JSON file.")]
    pub watch_registry_path: Option<PathBuf>,

    #[clap(long, env = "VANITY_AUTOCLAIM_REGISTRY", help = "Path of the auto-claim registry JSON file.")]
    pub autoclaim_registry_path: Option<PathBuf>,

    #[clap(long, env = "VANITY_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "VANITY_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error, fatal).")]
    pub log_level: Option<String>,

    #[clap(long, env = "VANITY_NOTIFY", help = "Notification delivery: 'rest' (channel messages) or 'log'.")]
    pub notify: Option<String>,

    #[clap(long, env = "VANITY_CONSOLE_SCOPE", help = "Scope id the local console acts in.")]
    pub console_scope_id: Option<String>,

    #[clap(long, env = "VANITY_CONSOLE_REQUESTER", help = "Requester id the local console acts as.")]
    pub console_requester_id: Option<String>,

    #[clap(long, env = "VANITY_CONSOLE_CHANNEL", help = "Channel notified for entries added from the console.")]
    pub console_channel_id: Option<String>,
}

impl Config {
    // Merge two Config structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            config_path: other.config_path.or(self.config_path),
            discord_token: other.discord_token.or(self.discord_token),
            api_base_url: other.api_base_url.or(self.api_base_url),
            proxy_file: other.proxy_file.or(self.proxy_file),
            proxies: other.proxies.or(self.proxies),
            check_interval_seconds: other.check_interval_seconds.or(self.check_interval_seconds),
            request_timeout_seconds: other.request_timeout_seconds.or(self.request_timeout_seconds),
            watch_registry_path: other.watch_registry_path.or(self.watch_registry_path),
            autoclaim_registry_path: other.autoclaim_registry_path.or(self.autoclaim_registry_path),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            notify: other.notify.or(self.notify),
            console_scope_id: other.console_scope_id.or(self.console_scope_id),
            console_requester_id: other.console_requester_id.or(self.console_requester_id),
            console_channel_id: other.console_channel_id.or(self.console_channel_id),
        }
    }

    fn defaults() -> Config {
        Config {
            api_base_url: Some(DEFAULT_API_BASE_URL.to_string()),
            check_interval_seconds: Some(DEFAULT_CHECK_INTERVAL.as_secs()),
            request_timeout_seconds: Some(MAX_TIMEOUT_SECS),
            watch_registry_path: Some(PathBuf::from("./vanity_data.json")),
            autoclaim_registry_path: Some(PathBuf::from("./autoswap_data.json")),
            log_dir: Some(PathBuf::from("./logs")),
            log_level: Some("info".to_string()),
            notify: Some("rest".to_string()),
            console_scope_id: Some(NO_SCOPE.to_string()),
            console_requester_id: Some("console".to_string()),
            ..Default::default()
        }
    }

    /// Validates the merged configuration.
    pub fn into_settings(self) -> Result<Settings> {
        let token = self
            .discord_token
            .filter(|t| !t.trim().is_empty())
            .context("DISCORD_TOKEN is required (environment, .env, config file or --discord-token)")?;

        let notify = match self.notify.as_deref().unwrap_or("rest").to_lowercase().as_str() {
            "rest" => NotifyMode::Rest,
            "log" => NotifyMode::Log,
            other => bail!("Unknown notify mode '{}': expected 'rest' or 'log'", other),
        };

        let requester_id = self.console_requester_id.unwrap_or_else(|| "console".to_string());
        let console = RequestContext {
            scope_id: self.console_scope_id.unwrap_or_else(|| NO_SCOPE.to_string()),
            notify_target_id: self.console_channel_id.unwrap_or_else(|| requester_id.clone()),
            requester_id,
        };

        let timeout_secs = self.request_timeout_seconds.unwrap_or(MAX_TIMEOUT_SECS);

        Ok(Settings {
            token,
            api_base_url: self.api_base_url.unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            proxy_file: self.proxy_file,
            inline_proxies: self
                .proxies
                .map(|list| list.split(',').map(str::trim).filter(|p| !p.is_empty()).map(String::from).collect())
                .unwrap_or_default(),
            check_interval: Duration::from_secs(self.check_interval_seconds.unwrap_or(30).max(1)),
            request_timeout: Duration::from_secs(timeout_secs.clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS)),
            watch_registry_path: self.watch_registry_path.unwrap_or_else(|| PathBuf::from("./vanity_data.json")),
            autoclaim_registry_path: self
                .autoclaim_registry_path
                .unwrap_or_else(|| PathBuf::from("./autoswap_data.json")),
            log_dir: self.log_dir.unwrap_or_else(|| PathBuf::from("./logs")),
            log_level: self.log_level.unwrap_or_else(|| "info".to_string()),
            notify,
            console,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyMode {
    Rest,
    Log,
}

/// Resolved runtime settings.
#[derive(Clone)]
pub struct Settings {
    pub token: String,
    pub api_base_url: String,
    pub proxy_file: Option<PathBuf>,
    pub inline_proxies: Vec<String>,
    pub check_interval: Duration,
    pub request_timeout: Duration,
    pub watch_registry_path: PathBuf,
    pub autoclaim_registry_path: PathBuf,
    pub log_dir: PathBuf,
    pub log_level: String,
    pub notify: NotifyMode,
    pub console: RequestContext,
}

// Keep the token and proxy credentials out of logs.
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("token", &"*****")
            .field("api_base_url", &self.api_base_url)
            .field("proxy_file", &self.proxy_file)
            .field("inline_proxies", &self.inline_proxies.len())
            .field("check_interval", &self.check_interval)
            .field("request_timeout", &self.request_timeout)
            .field("watch_registry_path", &self.watch_registry_path)
            .field("autoclaim_registry_path", &self.autoclaim_registry_path)
            .field("log_dir", &self.log_dir)
            .field("log_level", &self.log_level)
            .field("notify", &self.notify)
            .field("console", &self.console)
            .finish()
    }
}

impl Settings {
    /// Builds the proxy pool from the proxy file followed by the inline list.
    ///
    /// # Errors
    /// Any unreadable file or malformed descriptor fails the whole pool.
    pub fn load_proxies(&self) -> Result<ProxyPool, ConfigError> {
        let mut proxies: Vec<ProxyDescriptor> = Vec::new();
        if let Some(path) = &self.proxy_file {
            proxies.extend(ProxyPool::from_file(path)?.proxies().iter().cloned());
        }
        proxies.extend(ProxyPool::parse(self.inline_proxies.iter().map(String::as_str))?.proxies().iter().cloned());
        Ok(ProxyPool::new(proxies))
    }
}

fn read_config_file(path: &Path) -> Option<Config> {
    if !path.exists() {
        log::info!("Config file not found at {}. Using defaults and environment/CLI variables.", path.display());
        return None;
    }
    match fs::read_to_string(path) {
        Ok(config_str) => match serde_json::from_str::<Config>(&config_str) {
            Ok(file_config) => Some(file_config),
            Err(e) => {
                log::warn!("Failed to parse config file {}: {}. Falling back to other sources.", path.display(), e);
                None
            }
        },
        Err(e) => {
            log::warn!("Failed to read config file {}: {}. Falling back to other sources.", path.display(), e);
            None
        }
    }
}

/// Defaults, then the config file, then environment variables and CLI flags.
pub fn resolve(cli_args: Config) -> Config {
    let config_file_path = cli_args
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let mut current_config = Config::defaults();
    if let Some(file_config) = read_config_file(&config_file_path) {
        current_config = current_config.merge(file_config);
    }
    current_config.merge(cli_args)
}

pub fn load_config() -> Config {
    resolve(Config::parse())
}
