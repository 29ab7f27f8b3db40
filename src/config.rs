use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::loader::LoadOptions;

/// Service settings, read once at startup.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub loader: LoaderConfig,
}

impl AppConfig {
    /// Reads every setting from the process environment; missing or invalid
    /// values fall back to defaults.
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig::from_env(),
            loader: LoaderConfig::from_env(),
        }
    }
}

/// Where the HTTP service listens.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    bind_ip: IpAddr,
    display_host: String,
    port: u16,
}

impl ApiConfig {
    const DEFAULT_HOST: &'static str = "0.0.0.0";
    const DEFAULT_PORT: u16 = 8080;
    const HOST_VAR: &'static str = "PALLET_LOADER_API_HOST";
    const PORT_VAR: &'static str = "PALLET_LOADER_API_PORT";

    fn from_env() -> Self {
        let host_value =
            env_string(Self::HOST_VAR).unwrap_or_else(|| Self::DEFAULT_HOST.to_string());
        let (bind_ip, display_host) = match host_value.parse::<IpAddr>() {
            Ok(ip) => (ip, host_value),
            Err(err) => {
                log::warn!(
                    "⚠️ Could not parse {} ('{}'): {}. Using {}.",
                    Self::HOST_VAR,
                    host_value,
                    err,
                    Self::DEFAULT_HOST
                );
                (
                    IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                    Self::DEFAULT_HOST.to_string(),
                )
            }
        };

        let port = env_string(Self::PORT_VAR)
            .and_then(|raw| parse_port(&raw))
            .unwrap_or(Self::DEFAULT_PORT);

        Self {
            bind_ip,
            display_host,
            port,
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Host as configured, for startup messages.
    pub fn display_host(&self) -> &str {
        &self.display_host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn binds_to_all_interfaces(&self) -> bool {
        self.bind_ip.is_unspecified()
    }

    pub fn uses_default_host(&self) -> bool {
        self.display_host == Self::DEFAULT_HOST
    }
}

/// Default loading options applied when a request does not override them.
#[derive(Clone, Debug)]
pub struct LoaderConfig {
    options: LoadOptions,
}

impl LoaderConfig {
    const PADDING_VAR: &'static str = "PALLET_LOADER_PADDING";
    const CENTER_LOADING_VAR: &'static str = "PALLET_LOADER_CENTER_LOADING";
    const ALLOW_ROTATION_VAR: &'static str = "PALLET_LOADER_ALLOW_ROTATION";

    fn from_env() -> Self {
        let padding = load_f64_with_warning(
            Self::PADDING_VAR,
            LoadOptions::DEFAULT_PADDING,
            |value| value.is_finite() && value >= 0.0,
            "must be a finite value >= 0",
            "Warning: Padding reduces the usable loading area",
        );

        let center_loading = env_string(Self::CENTER_LOADING_VAR)
            .and_then(|raw| parse_bool(&raw, Self::CENTER_LOADING_VAR))
            .unwrap_or(LoadOptions::DEFAULT_CENTER_LOADING);

        let allow_rotation = env_string(Self::ALLOW_ROTATION_VAR)
            .and_then(|raw| parse_bool(&raw, Self::ALLOW_ROTATION_VAR))
            .unwrap_or(LoadOptions::DEFAULT_ALLOW_ROTATION);

        let options = LoadOptions::builder()
            .padding(padding)
            .center_loading(center_loading)
            .allow_rotation(allow_rotation)
            .build();

        Self { options }
    }

    /// Returns the configured default LoadOptions.
    pub fn load_options(&self) -> LoadOptions {
        self.options
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            options: LoadOptions::default(),
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            log::warn!(
                "⚠️ {} is not readable ({}), ignoring it.",
                name,
                err
            );
            None
        }
    }
}

fn parse_port(raw: &str) -> Option<u16> {
    match raw.parse::<u16>() {
        Ok(0) => {
            log::warn!("⚠️ {} must not be 0.", ApiConfig::PORT_VAR);
            None
        }
        Ok(value) => Some(value),
        Err(err) => {
            log::warn!(
                "⚠️ Could not parse {} ('{}'): {}.",
                ApiConfig::PORT_VAR,
                raw,
                err
            );
            None
        }
    }
}

fn parse_bool(raw: &str, var_name: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        other => {
            log::warn!(
                "⚠️ {} expects a yes/no value, got '{}'. Keeping the default.",
                var_name,
                other
            );
            None
        }
    }
}

fn parse_f64_with_warning(
    var_name: &str,
    raw: &str,
    default: f64,
    validator: impl Fn(f64) -> bool,
    invalid_hint: &str,
    warning: &str,
) -> f64 {
    match raw.parse::<f64>() {
        Ok(value) if !validator(value) => {
            log::warn!(
                "⚠️ {}={} rejected ({}), falling back to {}.",
                var_name,
                raw,
                invalid_hint,
                default
            );
            default
        }
        Ok(value) => {
            if (value - default).abs() > f64::EPSILON * default.abs().max(1.0) {
                log::info!("⚠️ {} ({} = {}).", warning, var_name, value);
            }
            value
        }
        Err(err) => {
            log::warn!(
                "⚠️ {}={} is not a number ({}), falling back to {}.",
                var_name,
                raw,
                err,
                default
            );
            default
        }
    }
}

fn load_f64_with_warning(
    var_name: &str,
    default: f64,
    validator: impl Fn(f64) -> bool,
    invalid_hint: &str,
    warning: &str,
) -> f64 {
    match env_string(var_name) {
        Some(raw) => {
            parse_f64_with_warning(var_name, &raw, default, validator, invalid_hint, warning)
        }
        None => default,
    }
}
