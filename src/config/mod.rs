//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;
#[cfg(test)]
mod tests;

use std::{
    collections::{BTreeMap, HashSet},
    net::SocketAddr,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::pipeline::AssetKind;

pub use cli::{AssetOverrides, CliArgs, Command, RenderArgs, ServeArgs, ServeOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "bundler";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_WEB_ROOT: &str = "public";
const DEFAULT_CACHE_ENTRY_LIMIT: usize = 256;
const DEFAULT_CULTURE: &str = "en";

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub assets: AssetSettings,
    pub cache: CacheSettings,
    pub localization: LocalizationSettings,
    pub bundles: Vec<BundleSettings>,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct AssetSettings {
    pub web_root: PathBuf,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enable_cache: bool,
    pub entry_limit: usize,
    pub max_age_seconds: u64,
}

/// String tables for `{{key}}` substitution, keyed by culture.
#[derive(Debug, Clone)]
pub struct LocalizationSettings {
    pub default_culture: String,
    pub strings: BTreeMap<String, BTreeMap<String, String>>,
}

/// One `[[bundles]]` entry.
#[derive(Debug, Clone)]
pub struct BundleSettings {
    pub route: String,
    pub kind: AssetKind,
    pub files: Vec<String>,
    pub localize: bool,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("BUNDLER").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Render(args)) => raw.apply_asset_overrides(&args.assets),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    assets: RawAssetSettings,
    cache: RawCacheSettings,
    localization: RawLocalizationSettings,
    bundles: Vec<RawBundleSettings>,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(enable) = overrides.cache_enable {
            self.cache.enable_cache = Some(enable);
        }
        if let Some(limit) = overrides.cache_entry_limit {
            self.cache.entry_limit = Some(limit);
        }
        if let Some(max_age) = overrides.cache_max_age_seconds {
            self.cache.max_age_seconds = Some(max_age);
        }

        self.apply_asset_overrides(&overrides.assets);
    }

    fn apply_asset_overrides(&mut self, overrides: &AssetOverrides) {
        if let Some(root) = overrides.web_root.as_ref() {
            self.assets.web_root = Some(root.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            assets,
            cache,
            localization,
            bundles,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let assets = build_asset_settings(assets)?;
        let cache = build_cache_settings(cache)?;
        let localization = build_localization_settings(localization)?;
        let bundles = build_bundle_settings(bundles)?;

        Ok(Self {
            server,
            logging,
            assets,
            cache,
            localization,
            bundles,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_asset_settings(assets: RawAssetSettings) -> Result<AssetSettings, LoadError> {
    let web_root = assets
        .web_root
        .unwrap_or_else(|| PathBuf::from(DEFAULT_WEB_ROOT));
    if web_root.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "assets.web_root",
            "web root cannot be empty",
        ));
    }
    Ok(AssetSettings { web_root })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let entry_limit = cache.entry_limit.unwrap_or(DEFAULT_CACHE_ENTRY_LIMIT);
    if entry_limit == 0 {
        return Err(LoadError::invalid(
            "cache.entry_limit",
            "must be greater than zero",
        ));
    }

    Ok(CacheSettings {
        enable_cache: cache.enable_cache.unwrap_or(true),
        entry_limit,
        max_age_seconds: cache.max_age_seconds.unwrap_or(0),
    })
}

fn build_localization_settings(
    localization: RawLocalizationSettings,
) -> Result<LocalizationSettings, LoadError> {
    let default_culture = localization
        .default_culture
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| DEFAULT_CULTURE.to_string());
    if default_culture.is_empty() {
        return Err(LoadError::invalid(
            "localization.default_culture",
            "culture cannot be empty",
        ));
    }

    Ok(LocalizationSettings {
        default_culture,
        strings: localization.strings,
    })
}

fn build_bundle_settings(bundles: Vec<RawBundleSettings>) -> Result<Vec<BundleSettings>, LoadError> {
    let mut routes = HashSet::with_capacity(bundles.len());
    bundles
        .into_iter()
        .map(|bundle| {
            let route = bundle.route.trim().to_string();
            if route.is_empty() {
                return Err(LoadError::invalid("bundles.route", "route cannot be empty"));
            }
            if !routes.insert(route.clone()) {
                return Err(LoadError::invalid(
                    "bundles.route",
                    format!("route `{route}` is declared more than once"),
                ));
            }
            if bundle.files.is_empty() {
                return Err(LoadError::invalid(
                    "bundles.files",
                    format!("bundle `{route}` lists no source files"),
                ));
            }

            let kind = parse_kind(&route, bundle.kind.as_deref(), bundle.content_type)?;
            Ok(BundleSettings {
                route,
                kind,
                files: bundle.files,
                localize: bundle.localize.unwrap_or(false),
            })
        })
        .collect()
}

fn parse_kind(
    route: &str,
    kind: Option<&str>,
    content_type: Option<String>,
) -> Result<AssetKind, LoadError> {
    let kind = match kind.map(|value| value.trim().to_ascii_lowercase()) {
        Some(kind) => kind,
        None => infer_kind(route).to_string(),
    };

    match kind.as_str() {
        "javascript" | "js" => Ok(AssetKind::JavaScript),
        "css" => Ok(AssetKind::Css),
        "generic" => Ok(match content_type {
            Some(content_type) if !content_type.trim().is_empty() => AssetKind::Generic {
                content_type: content_type.trim().to_string(),
            },
            _ => AssetKind::generic_for(route),
        }),
        other => Err(LoadError::invalid(
            "bundles.kind",
            format!("unknown bundle kind `{other}` for `{route}`"),
        )),
    }
}

fn infer_kind(route: &str) -> &'static str {
    let extension = route
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("js" | "mjs") => "javascript",
        Some("css") => "css",
        _ => "generic",
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAssetSettings {
    web_root: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enable_cache: Option<bool>,
    entry_limit: Option<usize>,
    max_age_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLocalizationSettings {
    default_culture: Option<String>,
    strings: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBundleSettings {
    route: String,
    kind: Option<String>,
    content_type: Option<String>,
    files: Vec<String>,
    localize: Option<bool>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}
