use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_TMDB_BASE: &str = "https://api.themoviedb.org/3";
pub const DEFAULT_IMAGE_BASE: &str = "https://image.tmdb.org/t/p";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_FAVORITES_DIR: &str = "data";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: '{value}' ({message})")]
    Invalid {
        var: &'static str,
        value: String,
        message: String,
    },
}

#[derive(Debug, Clone)]
pub struct TmdbConfig {
    /// Absent keys are not fatal; every fetch reports them instead.
    pub api_key: Option<String>,
    pub base_url: String,
    pub image_base_url: String,
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_TMDB_BASE.to_string(),
            image_base_url: DEFAULT_IMAGE_BASE.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub tmdb: TmdbConfig,
    pub favorites_dir: PathBuf,
    pub bind_addr: SocketAddr,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = var("TMDB_API_KEY");
        if api_key.is_none() {
            warn!("TMDB_API_KEY is not set - movie lists will show a configuration error");
        }

        let base_url = var("TMDB_BASE_URL")
            .unwrap_or_else(|| DEFAULT_TMDB_BASE.to_string())
            .trim_end_matches('/')
            .to_string();
        let image_base_url = var("TMDB_IMAGE_BASE_URL")
            .unwrap_or_else(|| DEFAULT_IMAGE_BASE.to_string())
            .trim_end_matches('/')
            .to_string();

        let favorites_dir = PathBuf::from(
            var("FAVORITES_DIR").unwrap_or_else(|| DEFAULT_FAVORITES_DIR.to_string()),
        );

        let bind_raw = var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                var: "BIND_ADDR",
                value: bind_raw.clone(),
                message: e.to_string(),
            })?;

        info!(
            "Configuration loaded: favorites in {:?}, binding {}",
            favorites_dir, bind_addr
        );
        Ok(Self {
            tmdb: TmdbConfig {
                api_key,
                base_url,
                image_base_url,
            },
            favorites_dir,
            bind_addr,
        })
    }
}
