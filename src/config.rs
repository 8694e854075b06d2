//! Environment-driven service configuration.

use std::{net::IpAddr, path::PathBuf, str::FromStr};
use thiserror::Error;

use crate::model::{default_candidates, Candidate};

pub const DEFAULT_SECRET_KEY: &str = "dev-secret-key-change-in-production";
const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("unknown APP_ENV {0:?} (expected development, production, testing or default)")]
    UnknownMode(String),
    #[error("invalid PORT {0:?}")]
    InvalidPort(String),
    #[error("invalid HOST {0:?}")]
    InvalidHost(String),
}

/// Deployment mode selecting the debug/testing flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Development,
    Production,
    Testing,
}

impl Mode {
    pub fn debug(self) -> bool {
        matches!(self, Mode::Development | Mode::Testing)
    }

    pub fn testing(self) -> bool {
        self == Mode::Testing
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Development => "development",
            Mode::Production => "production",
            Mode::Testing => "testing",
        }
    }
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "default" | "" => Ok(Mode::Development),
            "production" => Ok(Mode::Production),
            "testing" => Ok(Mode::Testing),
            _ => Err(ConfigError::UnknownMode(s.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub mode: Mode,
    pub secret_key: String,
    pub host: IpAddr,
    pub port: u16,
    /// Extra artifact directory tried before the defaults.
    pub model_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: Mode::Development,
            secret_key: DEFAULT_SECRET_KEY.to_string(),
            host: IpAddr::from([0, 0, 0, 0]),
            port: DEFAULT_PORT,
            model_dir: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup so tests need not touch the process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Config::default();
        if let Some(mode) = lookup("APP_ENV") {
            cfg.mode = mode.parse()?;
        }
        if let Some(key) = lookup("SECRET_KEY") {
            cfg.secret_key = key;
        }
        if let Some(host) = lookup("HOST") {
            cfg.host = host
                .parse()
                .map_err(|_| ConfigError::InvalidHost(host.clone()))?;
        }
        if let Some(port) = lookup("PORT") {
            cfg.port = port
                .parse()
                .map_err(|_| ConfigError::InvalidPort(port.clone()))?;
        }
        cfg.model_dir = lookup("FWI_MODEL_DIR")
            .filter(|d| !d.trim().is_empty())
            .map(PathBuf::from);
        Ok(cfg)
    }

    pub fn uses_default_secret(&self) -> bool {
        self.secret_key == DEFAULT_SECRET_KEY
    }

    /// Log filter used when RUST_LOG is unset.
    pub fn default_log_filter(&self) -> &'static str {
        if self.mode.debug() {
            "fwi_predictor=debug,tower_http=debug,info"
        } else {
            "info"
        }
    }

    pub fn candidates(&self) -> Vec<Candidate> {
        let mut out = Vec::new();
        if let Some(dir) = &self.model_dir {
            out.push(Candidate::in_dir(dir));
        }
        out.extend(default_candidates());
        out
    }
}
